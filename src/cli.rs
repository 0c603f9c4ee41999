use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::reporter::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "seopilot")]
#[command(
    about = "Framework-aware SEO profiler, fixer and change-impact tracker",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format: text or json
    #[arg(short, long, global = true)]
    pub output: Option<OutputFormat>,

    /// Save the JSON report to a file
    #[arg(short, long, global = true)]
    pub save: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Public site origin, e.g. https://example.com
    #[arg(long, global = true)]
    pub domain: Option<String>,

    /// Path to configuration file (JSON, TOML, or YAML)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Profile a project and report SEO issues
    Scan(ScanArgs),

    /// Print the codebase profile only
    Profile(TargetArgs),

    /// Apply a batch of code fixes
    Apply(ApplyArgs),

    /// Print the sitemap, robots.txt or schema code for the detected framework
    Generate(GenerateArgs),

    /// Measure the impact of recorded changes
    Measure(MeasureArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Project root
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Repository identifier recorded in the profile
    #[arg(long)]
    pub repo_id: Option<String>,

    /// Commit hash (read from .git when omitted)
    #[arg(long)]
    pub commit: Option<String>,

    /// Extra exclude pattern (repeatable)
    #[arg(short = 'x', long)]
    pub exclude: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// JSON file with additional issues to merge
    #[arg(long, value_name = "FILE")]
    pub supplemental: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Project root
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// JSON array of code fixes
    #[arg(long, value_name = "FILE")]
    pub fixes: PathBuf,

    /// Change store to record applied fixes in
    #[arg(long, value_name = "FILE")]
    pub changes: Option<PathBuf>,

    /// Commit the fixes will land in
    #[arg(long)]
    pub commit_sha: Option<String>,

    #[arg(long)]
    pub repo_id: Option<String>,

    /// Issues JSON used to resolve affected pages
    #[arg(long, value_name = "FILE")]
    pub issues: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateKind {
    Sitemap,
    Robots,
    Schema,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(value_enum)]
    pub kind: GenerateKind,

    /// Project root
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Organization name for schema markup
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct MeasureArgs {
    /// Change store JSON file
    #[arg(long, value_name = "FILE")]
    pub changes: PathBuf,

    /// Metrics endpoint base URL
    #[arg(long, conflicts_with = "metrics_file", required_unless_present = "metrics_file")]
    pub metrics_url: Option<String>,

    /// JSON array of daily metrics
    #[arg(long, value_name = "FILE")]
    pub metrics_file: Option<PathBuf>,

    /// Rate limit for metrics requests per second
    #[arg(short = 'r', long)]
    pub rate_limit: Option<f64>,

    /// Number of concurrent metrics requests
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,
}
