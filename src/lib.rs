pub mod cli;
pub mod config;
pub mod detector;
pub mod error;
pub mod extract;
pub mod fix_applier;
pub mod handlers;
pub mod http_client;
pub mod metrics;
pub mod models;
pub mod profiler;
pub mod reporter;
pub mod robots;
pub mod schema;
pub mod seo_analyzer;
pub mod sitemap;
pub mod source;
pub mod tracker;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use cli::{ApplyArgs, Cli, Command, GenerateArgs, GenerateKind, MeasureArgs, ScanArgs, TargetArgs};
use colored::*;
use config::{Config, Settings};
use fix_applier::{CodeFixApplier, FixOutcome};
use handlers::{GeneratedFile, HandlerRegistry};
use metrics::{HttpMetricsSource, MetricsSource, StaticMetricsSource};
use models::{CodeFix, SeoIssue};
use profiler::{CodebaseProfiler, ProfileOutcome, ProfilerOptions};
use reporter::{OutputFormat, Reporter};
use robots::RobotsTxt;
use schema::SchemaMarkup;
use seo_analyzer::{JsonIssueFile, SeoIssueEngine, SupplementalAnalyzer, parse_issues};
use source::{FsTree, SourceTree, read_commit_hash};
use std::path::Path;
use tracker::{ChangeTracker, JsonFileChangeStore};

pub async fn run(args: Cli) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let settings = config.merge_with_cli(&args);

    match &args.command {
        Command::Scan(scan) => run_scan(scan, &settings).await,
        Command::Profile(target) => run_profile(target, &settings).await,
        Command::Apply(apply) => run_apply(apply, &settings).await,
        Command::Generate(generate) => run_generate(generate, &settings).await,
        Command::Measure(measure) => run_measure(measure, &settings).await,
    }
}

async fn profile_project(
    root: &Path,
    commit: Option<&str>,
    settings: &Settings,
    show_progress: bool,
) -> Result<ProfileOutcome> {
    let commit_hash = commit
        .map(str::to_string)
        .or_else(|| read_commit_hash(root))
        .unwrap_or_else(|| "unknown".to_string());

    let options = ProfilerOptions {
        repo_id: settings.repo_id.clone().unwrap_or_else(|| "local".to_string()),
        commit_hash,
        exclude: settings.exclude.clone(),
        domain: settings.domain.clone(),
        show_progress,
    };

    let registry = HandlerRegistry::standard();
    let tree = FsTree::new(root);
    CodebaseProfiler::new(&registry, options)
        .profile(&tree)
        .await
        .with_context(|| format!("Failed to profile {}", root.display()))
}

async fn run_scan(args: &ScanArgs, settings: &Settings) -> Result<()> {
    let target = &args.target;
    if settings.output == OutputFormat::Text {
        println!("{}", "seopilot - SEO Profiler & Fixer".bright_cyan().bold());
        println!("{}", "=".repeat(50).bright_blue());
        println!();
    }

    let show_progress = settings.output == OutputFormat::Text && !settings.verbose;
    let outcome = profile_project(&target.path, target.commit.as_deref(), settings, show_progress).await?;

    if settings.verbose && settings.output == OutputFormat::Text {
        println!(
            "{} {} ({} pages)",
            "Detected:".bright_white().bold(),
            outcome.profile.framework,
            outcome.profile.pages.len()
        );
        println!("{}", "Analyzing SEO...".bright_yellow());
    }

    let engine = SeoIssueEngine::new(settings.thresholds);
    let supplemental = args.supplemental.clone().map(JsonIssueFile::new);
    let analysis = engine
        .analyze_with(
            &outcome.profile,
            supplemental.as_ref().map(|s| s as &dyn SupplementalAnalyzer),
        )
        .await;

    let mut warnings = outcome.warnings;
    warnings.extend(analysis.warnings);
    let report = Reporter::scan_report(outcome.profile, analysis.issues, warnings);

    match settings.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => Reporter::print_scan_report(&report),
    }

    if let Some(filename) = &settings.save {
        Reporter::save_json(&report, filename)?;
    }

    Ok(())
}

async fn run_profile(target: &TargetArgs, settings: &Settings) -> Result<()> {
    let outcome = profile_project(&target.path, target.commit.as_deref(), settings, false).await?;

    for warning in &outcome.warnings {
        tracing::warn!(warning = %warning, "Profiling warning");
    }

    println!("{}", serde_json::to_string_pretty(&outcome.profile)?);

    if let Some(filename) = &settings.save {
        Reporter::save_json(&outcome.profile, filename)?;
    }

    Ok(())
}

async fn run_apply(args: &ApplyArgs, settings: &Settings) -> Result<()> {
    let raw = tokio::fs::read_to_string(&args.fixes)
        .await
        .with_context(|| format!("Failed to read fixes file: {}", args.fixes.display()))?;
    let fixes: Vec<CodeFix> = serde_json::from_str(&raw).context("Failed to parse fixes JSON")?;

    let issues: Vec<SeoIssue> = match &args.issues {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read issues file: {}", path.display()))?;
            parse_issues(&raw)?
        }
        None => Vec::new(),
    };

    let outcome = profile_project(&args.path, args.commit_sha.as_deref(), settings, false).await?;
    let commit_sha = outcome.profile.commit_hash.clone();
    let repo_id = outcome.profile.repo_id.clone();

    let mut tree = FsTree::new(&args.path);
    let report = CodeFixApplier::new()
        .with_danger_zones(outcome.profile.danger_zones.clone())
        .apply_all(&mut tree, &fixes)
        .await;

    let mut recorded = Vec::new();
    if let Some(changes_path) = &args.changes {
        let tracker = ChangeTracker::new(JsonFileChangeStore::new(changes_path.clone()), settings.tracker);
        let now = Utc::now();
        for applied in report
            .applied
            .iter()
            .filter(|a| a.outcome != FixOutcome::AlreadyAbsent)
        {
            let issue = issues.iter().find(|i| i.id == applied.fix.issue_id);
            let change = tracker
                .record_fix(&repo_id, &applied.fix, issue, &commit_sha, now)
                .await?;
            recorded.push(change);
        }
    }

    match settings.output {
        OutputFormat::Json => {
            let value = serde_json::json!({ "report": report, "changes": recorded });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            Reporter::print_apply_report(&report);
            if !recorded.is_empty() {
                println!("  {} changes recorded", recorded.len().to_string().bright_green());
            }
        }
    }

    if let Some(filename) = &settings.save {
        Reporter::save_json(&report, filename)?;
    }

    Ok(())
}

fn site_name(domain: &str) -> String {
    url::Url::parse(domain)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| domain.to_string())
}

async fn run_generate(args: &GenerateArgs, settings: &Settings) -> Result<()> {
    let Some(domain) = settings.domain.as_deref() else {
        bail!("A site origin is required: pass --domain or set `domain` in the config file");
    };

    let outcome = profile_project(&args.path, None, settings, false).await?;
    let profile = &outcome.profile;
    let registry = HandlerRegistry::standard();
    let handler = registry.get(profile.framework);

    let generated = match args.kind {
        GenerateKind::Sitemap => {
            let robots = match &profile.seo_patterns.robots_path {
                Some(path) => FsTree::new(&args.path)
                    .read_to_string(path)
                    .await
                    .ok()
                    .map(|content| RobotsTxt::parse(&content)),
                None => None,
            };
            let entries = sitemap::build_entries(&profile.pages, domain, robots.as_ref(), Utc::now().date_naive());
            GeneratedFile {
                path: handler.sitemap_path(&profile.structure),
                content: handler.generate_sitemap_code(&entries),
            }
        }
        GenerateKind::Robots => GeneratedFile {
            path: handler.robots_path(&profile.structure),
            content: handler.generate_robots_code(domain, &settings.disallow),
        },
        GenerateKind::Schema => {
            let markup = SchemaMarkup::Organization {
                name: args.name.clone().unwrap_or_else(|| site_name(domain)),
                url: domain.to_string(),
                logo: None,
                same_as: Vec::new(),
            };
            GeneratedFile {
                path: handler.schema_location(&profile.structure),
                content: handler.generate_schema_code(&markup.to_json_ld()),
            }
        }
    };

    match settings.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&generated)?),
        OutputFormat::Text => {
            println!(
                "{} {} ({})",
                "File:".bright_white().bold(),
                generated.path.bright_green(),
                handler.name()
            );
            println!();
            println!("{}", generated.content);
        }
    }

    if let Some(filename) = &settings.save {
        Reporter::save_json(&generated, filename)?;
    }

    Ok(())
}

async fn run_measure(args: &MeasureArgs, settings: &Settings) -> Result<()> {
    let source: Box<dyn MetricsSource> = match (&args.metrics_url, &args.metrics_file) {
        (Some(url), _) => Box::new(HttpMetricsSource::new(url, settings.rate_limit)?),
        (None, Some(file)) => Box::new(StaticMetricsSource::from_json_file(file).await?),
        (None, None) => bail!("Either --metrics-url or --metrics-file is required"),
    };

    let tracker = ChangeTracker::new(JsonFileChangeStore::new(args.changes.clone()), settings.tracker);
    let report = tracker.sweep(source.as_ref(), Utc::now()).await?;

    match settings.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => Reporter::print_sweep_report(&report),
    }

    if let Some(filename) = &settings.save {
        Reporter::save_json(&report, filename)?;
    }

    Ok(())
}
