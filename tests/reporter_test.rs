use chrono::{TimeZone, Utc};
use seopilot::error::PipelineWarning;
use seopilot::fix_applier::{ApplyReport, AppliedFix, FixOutcome, SkippedFix};
use seopilot::models::{
    BuildSystem, CodeFix, CodebaseProfile, Confidence, FixAction, FrameworkType, MeasuredImpact, MetaStrategy,
    PageInfo, ProjectStructure, SeoIssue, SeoPatterns,
};
use seopilot::reporter::{OutputFormat, Reporter, ScanReport};
use seopilot::seo_analyzer::SeoIssueEngine;
use seopilot::tracker::{FailedMeasurement, MeasuredChange, SweepReport};
use std::fs;

fn create_test_profile(pages: Vec<PageInfo>) -> CodebaseProfile {
    CodebaseProfile {
        repo_id: "acme/site".to_string(),
        scanned_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        commit_hash: "abc123".to_string(),
        framework: FrameworkType::Astro,
        framework_version: Some("4.5.0".to_string()),
        confidence: Confidence::High,
        structure: ProjectStructure::default(),
        seo_patterns: SeoPatterns {
            meta_strategy: MetaStrategy::AstroHead,
            sitemap_path: None,
            robots_path: None,
            robots_sitemaps: vec![],
            robots_disallow: vec![],
            schema_types: vec![],
            has_og_images: false,
        },
        build_system: BuildSystem::default(),
        pages,
        safe_zones: vec!["src/pages".to_string()],
        danger_zones: vec!["package.json".to_string()],
    }
}

fn create_test_report() -> ScanReport {
    let mut home = PageInfo::new("/", "src/pages/index.astro");
    home.internal_links = vec!["/about".to_string()];
    let about = PageInfo::new("/about", "src/pages/about.astro");

    let profile = create_test_profile(vec![home, about]);
    let issues = SeoIssueEngine::default().analyze(&profile);
    let warnings = vec![PipelineWarning::FileUnreadable {
        path: "src/pages/broken.astro".to_string(),
        reason: "invalid UTF-8".to_string(),
    }];

    Reporter::scan_report(profile, issues, warnings)
}

fn create_test_fix(file: &str) -> CodeFix {
    CodeFix {
        issue_id: "missing-meta-title:/about".to_string(),
        file: file.to_string(),
        action: FixAction::Modify,
        search: Some("<Layout>".to_string()),
        replace: Some("<Layout title=\"About\">".to_string()),
        content: None,
        description: "Add a title".to_string(),
    }
}

#[test]
fn test_scan_report_summary_counts() {
    let report = create_test_report();

    assert_eq!(report.summary.pages, 2);
    let total = report.summary.critical + report.summary.warnings + report.summary.info;
    assert_eq!(total, report.issues.len());
    assert!(report.summary.critical >= 2, "both pages lack a title");
    assert_eq!(
        report.summary.auto_fixable,
        report.issues.iter().filter(|i| i.auto_fixable).count()
    );
    assert_eq!(report.warnings.len(), 1);
    assert!(chrono::DateTime::parse_from_rfc3339(&report.generated_at).is_ok());
}

#[test]
fn test_scan_report_without_issues() {
    let report = Reporter::scan_report(create_test_profile(vec![]), vec![], vec![]);

    assert_eq!(report.summary.pages, 0);
    assert_eq!(report.summary.critical, 0);
    assert_eq!(report.summary.auto_fixable, 0);

    Reporter::print_scan_report(&report);
}

#[test]
fn test_print_scan_report_with_issues() {
    let report = create_test_report();
    Reporter::print_scan_report(&report);
}

#[test]
fn test_print_apply_report() {
    let report = ApplyReport {
        applied: vec![AppliedFix {
            fix: create_test_fix("src/pages/about.astro"),
            outcome: FixOutcome::Modified,
        }],
        skipped: vec![SkippedFix {
            fix: create_test_fix("src/pages/team.astro"),
            warning: PipelineWarning::MutationTargetMissing {
                path: "src/pages/team.astro".to_string(),
            },
        }],
    };
    Reporter::print_apply_report(&report);
    Reporter::print_apply_report(&ApplyReport::default());
}

#[test]
fn test_print_sweep_report() {
    let report = SweepReport {
        measured: vec![
            MeasuredChange {
                change_id: "c1".to_string(),
                file: "src/pages/about.astro".to_string(),
                impact: MeasuredImpact {
                    clicks_before: 10.0,
                    clicks_after: 25.0,
                    measurement_period: 7,
                },
            },
            MeasuredChange {
                change_id: "c2".to_string(),
                file: "src/pages/new.astro".to_string(),
                impact: MeasuredImpact {
                    clicks_before: 0.0,
                    clicks_after: 3.0,
                    measurement_period: 7,
                },
            },
        ],
        deferred: vec![PipelineWarning::MeasurementNotEligible {
            change_id: "c3".to_string(),
            ready_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }],
        failed: vec![FailedMeasurement {
            change_id: "c4".to_string(),
            reason: "metrics error".to_string(),
        }],
    };
    Reporter::print_sweep_report(&report);
}

#[test]
fn test_save_json_report() {
    let report = create_test_report();
    let dir = tempfile::tempdir().unwrap();
    let filename = dir.path().join("report.json");
    let filename = filename.to_str().unwrap();

    Reporter::save_json(&report, filename).unwrap();

    let json_content = fs::read_to_string(filename).expect("Failed to read file");
    let value: serde_json::Value = serde_json::from_str(&json_content).expect("Failed to parse");
    assert_eq!(value["profile"]["repo_id"], "acme/site");
    assert_eq!(value["profile"]["framework"], serde_json::to_value(FrameworkType::Astro).unwrap());
    assert_eq!(value["summary"]["pages"], 2);
    assert_eq!(value["warnings"][0]["kind"], "file_unreadable");

    let issues: Vec<SeoIssue> = serde_json::from_value(value["issues"].clone()).unwrap();
    assert_eq!(issues, report.issues);
}

#[test]
fn test_save_json_to_missing_directory_fails() {
    let report = create_test_report();
    assert!(Reporter::save_json(&report, "/definitely/not/here/report.json").is_err());
}

#[test]
fn test_output_format_from_str() {
    assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
    assert_eq!("TEXT".parse::<OutputFormat>(), Ok(OutputFormat::Text));
    assert!("yaml".parse::<OutputFormat>().is_err());
}
