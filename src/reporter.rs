use anyhow::{Context, Result};
use colored::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

use crate::error::PipelineWarning;
use crate::fix_applier::{ApplyReport, FixOutcome};
use crate::models::{CodebaseProfile, SeoIssue, Severity};
use crate::tracker::SweepReport;

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub pages: usize,
    pub critical: usize,
    pub warnings: usize,
    pub info: usize,
    pub auto_fixable: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub profile: CodebaseProfile,
    pub issues: Vec<SeoIssue>,
    pub warnings: Vec<PipelineWarning>,
    pub summary: ScanSummary,
    pub generated_at: String,
}

/// Output format for every command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{}', expected text or json", other)),
        }
    }
}

pub struct Reporter;

impl Reporter {
    pub fn scan_report(profile: CodebaseProfile, issues: Vec<SeoIssue>, warnings: Vec<PipelineWarning>) -> ScanReport {
        let summary = Self::calculate_summary(&profile, &issues);
        let generated_at = chrono::Utc::now().to_rfc3339();

        ScanReport {
            profile,
            issues,
            warnings,
            summary,
            generated_at,
        }
    }

    fn calculate_summary(profile: &CodebaseProfile, issues: &[SeoIssue]) -> ScanSummary {
        let count = |severity: Severity| issues.iter().filter(|i| i.severity == severity).count();

        ScanSummary {
            pages: profile.pages.len(),
            critical: count(Severity::Critical),
            warnings: count(Severity::Warning),
            info: count(Severity::Info),
            auto_fixable: issues.iter().filter(|i| i.auto_fixable).count(),
        }
    }

    fn severity_label(severity: Severity) -> ColoredString {
        match severity {
            Severity::Critical => "CRIT".bright_red(),
            Severity::Warning => "WARN".yellow(),
            Severity::Info => "INFO".bright_cyan(),
        }
    }

    fn count_colored(count: usize, bad: fn(String) -> ColoredString) -> ColoredString {
        if count > 0 {
            bad(count.to_string())
        } else {
            count.to_string().bright_green()
        }
    }

    pub fn print_scan_report(report: &ScanReport) {
        let profile = &report.profile;

        println!("\n{}", "=".repeat(80).bright_blue());
        println!("{}", "seopilot - Scan Report".bright_cyan().bold());
        println!("{}", "=".repeat(80).bright_blue());
        println!();

        println!("{}: {}", "Repository".bright_white().bold(), profile.repo_id);
        println!("{}: {}", "Commit".bright_white().bold(), profile.commit_hash);
        println!(
            "{}: {} {} ({:?} confidence)",
            "Framework".bright_white().bold(),
            profile.framework.to_string().bright_green(),
            profile.framework_version.as_deref().unwrap_or(""),
            profile.confidence
        );
        println!("{}: {}", "Timestamp".bright_white().bold(), report.generated_at);
        println!();

        println!("{}", "Summary".bright_yellow().bold().underline());
        println!("  Pages Scanned:  {}", report.summary.pages.to_string().bright_green());
        println!(
            "  Critical:       {}",
            Self::count_colored(report.summary.critical, |s| s.bright_red())
        );
        println!(
            "  Warnings:       {}",
            Self::count_colored(report.summary.warnings, |s| s.yellow())
        );
        println!("  Info:           {}", report.summary.info.to_string().bright_cyan());
        println!("  Auto-fixable:   {}", report.summary.auto_fixable);
        println!(
            "  Sitemap:        {}",
            profile
                .seo_patterns
                .sitemap_path
                .as_deref()
                .map(|p| p.bright_green())
                .unwrap_or_else(|| "missing".bright_red())
        );
        println!(
            "  robots.txt:     {}",
            profile
                .seo_patterns
                .robots_path
                .as_deref()
                .map(|p| p.bright_green())
                .unwrap_or_else(|| "missing".bright_red())
        );
        println!();

        let global: Vec<_> = report.issues.iter().filter(|i| i.page.is_none()).collect();
        if !global.is_empty() {
            println!("{}", "Site-wide Issues".bright_yellow().bold().underline());
            for issue in global {
                println!(
                    "  [{}] {} {}",
                    Self::severity_label(issue.severity),
                    issue.description,
                    format!("({})", issue.id).dimmed()
                );
            }
            println!();
        }

        let mut current_page: Option<&str> = None;
        let page_issues: Vec<_> = report.issues.iter().filter(|i| i.page.is_some()).collect();
        if !page_issues.is_empty() {
            println!("{}", "Pages with Issues".bright_yellow().bold().underline());
        }
        for issue in page_issues {
            let page = issue.scope();
            if current_page != Some(page) {
                println!();
                println!("  {} {}", "Page:".bright_white().bold(), page);
                if let Some(file) = &issue.file {
                    println!("    File: {}", file.dimmed());
                }
                current_page = Some(page);
            }
            println!("    [{}] {}", Self::severity_label(issue.severity), issue.description);
        }

        Self::print_warnings(&report.warnings);

        println!();
        println!("{}", "=".repeat(80).bright_blue());
    }

    pub fn print_apply_report(report: &ApplyReport) {
        println!("{}", "Applied Fixes".bright_yellow().bold().underline());
        for applied in &report.applied {
            let outcome = match applied.outcome {
                FixOutcome::Created => "created".bright_green(),
                FixOutcome::Modified => "modified".bright_green(),
                FixOutcome::Deleted => "deleted".yellow(),
                FixOutcome::AlreadyAbsent => "absent".dimmed(),
            };
            println!("  [{}] {} {}", outcome, applied.fix.file, format!("({})", applied.fix.issue_id).dimmed());
        }
        println!(
            "  {} applied, {} skipped",
            report.applied.len().to_string().bright_green(),
            Self::count_colored(report.skipped.len(), |s| s.yellow())
        );

        if !report.skipped.is_empty() {
            println!();
            println!("{}", "Skipped Fixes".bright_yellow().bold().underline());
            for skipped in &report.skipped {
                println!("  [{}] {}", "SKIP".yellow(), skipped.warning);
            }
        }
    }

    pub fn print_sweep_report(report: &SweepReport) {
        println!("{}", "Impact Measurement".bright_yellow().bold().underline());
        for measured in &report.measured {
            let change = match measured.impact.percent_change() {
                Some(pct) if pct >= 0.0 => format!("+{:.1}%", pct).bright_green(),
                Some(pct) => format!("{:.1}%", pct).bright_red(),
                None => "n/a".dimmed(),
            };
            println!(
                "  {} {}: {:.1} -> {:.1} clicks/day over {} days ({})",
                measured.change_id.dimmed(),
                measured.file,
                measured.impact.clicks_before,
                measured.impact.clicks_after,
                measured.impact.measurement_period,
                change
            );
        }
        println!(
            "  {} measured, {} deferred, {} failed",
            report.measured.len().to_string().bright_green(),
            report.deferred.len(),
            Self::count_colored(report.failed.len(), |s| s.bright_red())
        );
        for failed in &report.failed {
            println!("  [{}] {}: {}", "FAIL".bright_red(), failed.change_id, failed.reason);
        }
    }

    fn print_warnings(warnings: &[PipelineWarning]) {
        if warnings.is_empty() {
            return;
        }
        println!();
        println!("{}", "Warnings".bright_yellow().bold().underline());
        for warning in warnings {
            println!("  [{}] {}", "WARN".yellow(), warning);
        }
    }

    /// Pretty JSON to `filename`
    pub fn save_json<T: Serialize>(value: &T, filename: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
        let mut file = File::create(filename).with_context(|| format!("Failed to create {}", filename))?;
        file.write_all(json.as_bytes())?;
        println!("Report saved to: {}", filename.bright_green());
        Ok(())
    }
}
