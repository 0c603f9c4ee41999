use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::{Cli, Command};
use crate::reporter::OutputFormat;
use crate::seo_analyzer::IssueThresholds;
use crate::tracker::TrackerConfig;

/// Configuration file structure.
/// All fields are optional to allow partial configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Output format: text or json
    pub output: Option<OutputFormat>,

    /// Save report to file
    pub save: Option<String>,

    /// Verbose output
    pub verbose: Option<bool>,

    /// Public site origin
    pub domain: Option<String>,

    /// Repository identifier used in profiles and change records
    pub repo_id: Option<String>,

    /// Extra exclude patterns for scans
    pub exclude: Option<Vec<String>>,

    /// Paths to disallow in generated robots.txt
    pub disallow: Option<Vec<String>>,

    pub title_max_length: Option<usize>,

    pub description_max_length: Option<usize>,

    /// Pages with fewer words are thin
    pub thin_content_words: Option<usize>,

    /// Days a change must age before it is measured
    pub min_dwell_days: Option<i64>,

    pub days_before: Option<u32>,

    pub days_after: Option<u32>,

    /// Concurrent metrics requests
    pub concurrency: Option<usize>,

    /// Rate limit for metrics requests per second
    pub rate_limit: Option<f64>,
}

/// Effective settings after merging defaults, the config file and CLI flags
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub output: OutputFormat,
    pub save: Option<String>,
    pub verbose: bool,
    pub domain: Option<String>,
    pub repo_id: Option<String>,
    pub exclude: Vec<String>,
    pub disallow: Vec<String>,
    pub thresholds: IssueThresholds,
    pub tracker: TrackerConfig,
    pub rate_limit: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output: OutputFormat::Text,
            save: None,
            verbose: false,
            domain: None,
            repo_id: None,
            exclude: Vec::new(),
            disallow: Vec::new(),
            thresholds: IssueThresholds::default(),
            tracker: TrackerConfig::default(),
            rate_limit: None,
        }
    }
}

/// Configuration file format based on file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                "toml" => Some(ConfigFormat::Toml),
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                _ => None,
            })
    }

    pub fn extensions(&self) -> &[&str] {
        match self {
            ConfigFormat::Json => &["json"],
            ConfigFormat::Toml => &["toml"],
            ConfigFormat::Yaml => &["yaml", "yml"],
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let format = ConfigFormat::from_path(path)
            .with_context(|| format!("Unsupported config file format: {}", path.display()))?;

        let config = match format {
            ConfigFormat::Json => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            ConfigFormat::Toml => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            ConfigFormat::Yaml => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
        };

        Ok(config)
    }

    /// Paths checked in order: current directory, then the user config directory
    pub fn default_paths() -> Vec<PathBuf> {
        let formats = [ConfigFormat::Json, ConfigFormat::Toml, ConfigFormat::Yaml];
        let mut paths = Vec::new();

        for format in &formats {
            for ext in format.extensions() {
                paths.push(PathBuf::from(format!("seopilot.{}", ext)));
            }
        }

        // XDG_CONFIG_HOME if set, otherwise ~/.config
        let config_home = std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")));

        if let Some(config_home) = config_home {
            let config_dir = config_home.join("seopilot");
            for format in &formats {
                for ext in format.extensions() {
                    paths.push(config_dir.join(format!("config.{}", ext)));
                }
            }
        }

        paths
    }

    /// First configuration file found, or None if no config exists
    pub fn from_default_paths() -> Result<Option<Self>> {
        for path in Self::default_paths() {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading config file");
                return Ok(Some(Self::from_file(&path)?));
            }
        }
        Ok(None)
    }

    /// The explicit `--config` file, else the first default path, else empty
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(Path::new(path)),
            None => Ok(Self::from_default_paths()?.unwrap_or_default()),
        }
    }

    /// CLI arguments take precedence over config file values, which take
    /// precedence over defaults
    pub fn merge_with_cli(&self, cli: &Cli) -> Settings {
        let defaults = Settings::default();

        let mut exclude = self.exclude.clone().unwrap_or_default();
        let (repo_id, rate_limit, concurrency) = match &cli.command {
            Command::Scan(args) => {
                exclude.extend(args.target.exclude.iter().cloned());
                (args.target.repo_id.clone(), None, None)
            }
            Command::Profile(target) => {
                exclude.extend(target.exclude.iter().cloned());
                (target.repo_id.clone(), None, None)
            }
            Command::Apply(args) => (args.repo_id.clone(), None, None),
            Command::Generate(_) => (None, None, None),
            Command::Measure(args) => (None, args.rate_limit, args.concurrency),
        };

        let requested = TrackerConfig {
            min_dwell_days: self.min_dwell_days.unwrap_or(defaults.tracker.min_dwell_days),
            days_before: self.days_before.unwrap_or(defaults.tracker.days_before),
            days_after: self.days_after.unwrap_or(defaults.tracker.days_after),
            fetch_concurrency: concurrency
                .or(self.concurrency)
                .unwrap_or(defaults.tracker.fetch_concurrency),
        };
        let tracker = requested.clamped();
        if tracker != requested {
            tracing::warn!(?requested, effective = ?tracker, "Tracker settings out of range, clamped");
        }

        Settings {
            output: cli.output.or(self.output).unwrap_or(defaults.output),
            save: cli.save.clone().or_else(|| self.save.clone()),
            verbose: cli.verbose || self.verbose.unwrap_or(defaults.verbose),
            domain: cli.domain.clone().or_else(|| self.domain.clone()),
            repo_id: repo_id.or_else(|| self.repo_id.clone()),
            exclude,
            disallow: self.disallow.clone().unwrap_or_default(),
            thresholds: IssueThresholds {
                title_max_length: self
                    .title_max_length
                    .unwrap_or(defaults.thresholds.title_max_length),
                description_max_length: self
                    .description_max_length
                    .unwrap_or(defaults.thresholds.description_max_length),
                thin_content_words: self
                    .thin_content_words
                    .unwrap_or(defaults.thresholds.thin_content_words),
            },
            tracker,
            rate_limit: rate_limit.or(self.rate_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.json")),
            Some(ConfigFormat::Json)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.TOML")),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("config.yml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(ConfigFormat::from_path(Path::new("config.txt")), None);
    }

    #[test]
    fn test_load_json_config() {
        let json_content = r#"
{
    "output": "json",
    "domain": "https://example.com",
    "exclude": ["drafts"],
    "title_max_length": 70,
    "min_dwell_days": 21
}
        "#;

        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path().with_extension("json");
        fs::write(&temp_path, json_content).unwrap();

        let config = Config::from_file(&temp_path).unwrap();
        assert_eq!(config.output, Some(OutputFormat::Json));
        assert_eq!(config.domain.as_deref(), Some("https://example.com"));
        assert_eq!(config.exclude, Some(vec!["drafts".to_string()]));
        assert_eq!(config.title_max_length, Some(70));
        assert_eq!(config.min_dwell_days, Some(21));

        fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_load_toml_config() {
        let toml_content = r#"
domain = "https://example.com"
disallow = ["/admin", "/api/"]
thin_content_words = 150
days_before = 14
        "#;

        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path().with_extension("toml");
        fs::write(&temp_path, toml_content).unwrap();

        let config = Config::from_file(&temp_path).unwrap();
        assert_eq!(config.disallow, Some(vec!["/admin".to_string(), "/api/".to_string()]));
        assert_eq!(config.thin_content_words, Some(150));
        assert_eq!(config.days_before, Some(14));
        assert_eq!(config.output, None);

        fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_load_yaml_config() {
        let yaml_content = r#"
output: text
verbose: true
concurrency: 8
rate_limit: 2.5
        "#;

        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path().with_extension("yaml");
        fs::write(&temp_path, yaml_content).unwrap();

        let config = Config::from_file(&temp_path).unwrap();
        assert_eq!(config.output, Some(OutputFormat::Text));
        assert_eq!(config.verbose, Some(true));
        assert_eq!(config.concurrency, Some(8));
        assert_eq!(config.rate_limit, Some(2.5));

        fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_invalid_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path().with_extension("json");
        fs::write(&temp_path, "{ invalid json }").unwrap();
        assert!(Config::from_file(&temp_path).is_err());
        fs::remove_file(temp_path).ok();

        let temp_path = temp_file.path().with_extension("txt");
        fs::write(&temp_path, "content").unwrap();
        assert!(Config::from_file(&temp_path).is_err());
        fs::remove_file(temp_path).ok();
    }

    #[test]
    fn test_merge_defaults() {
        let cli = Cli::parse_from(["seopilot", "scan", "."]);
        let settings = Config::default().merge_with_cli(&cli);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_merge_file_values() {
        let config = Config {
            output: Some(OutputFormat::Json),
            domain: Some("https://file.dev".to_string()),
            exclude: Some(vec!["drafts".to_string()]),
            title_max_length: Some(70),
            concurrency: Some(2),
            ..Default::default()
        };
        let cli = Cli::parse_from(["seopilot", "scan", ".", "--exclude", "legacy"]);

        let settings = config.merge_with_cli(&cli);
        assert_eq!(settings.output, OutputFormat::Json);
        assert_eq!(settings.domain.as_deref(), Some("https://file.dev"));
        assert_eq!(settings.exclude, vec!["drafts".to_string(), "legacy".to_string()]);
        assert_eq!(settings.thresholds.title_max_length, 70);
        assert_eq!(settings.thresholds.description_max_length, 160);
        assert_eq!(settings.tracker.fetch_concurrency, 2);
    }

    #[test]
    fn test_merge_cli_overrides() {
        let config = Config {
            output: Some(OutputFormat::Json),
            domain: Some("https://file.dev".to_string()),
            concurrency: Some(2),
            rate_limit: Some(1.0),
            ..Default::default()
        };
        let cli = Cli::parse_from([
            "seopilot",
            "measure",
            "--changes",
            "changes.json",
            "--metrics-file",
            "metrics.json",
            "--output",
            "text",
            "--domain",
            "https://cli.dev",
            "--concurrency",
            "9",
            "--rate-limit",
            "3",
        ]);

        let settings = config.merge_with_cli(&cli);
        assert_eq!(settings.output, OutputFormat::Text);
        assert_eq!(settings.domain.as_deref(), Some("https://cli.dev"));
        assert_eq!(settings.tracker.fetch_concurrency, 9);
        assert_eq!(settings.rate_limit, Some(3.0));
    }

    #[test]
    fn test_merge_clamps_tracker_days() {
        let config = Config {
            min_dwell_days: Some(i64::MAX),
            days_before: Some(u32::MAX),
            days_after: Some(0),
            concurrency: Some(0),
            ..Default::default()
        };
        let cli = Cli::parse_from(["seopilot", "scan", "."]);

        let tracker = config.merge_with_cli(&cli).tracker;
        assert_eq!(tracker.min_dwell_days, crate::tracker::MAX_DWELL_DAYS);
        assert_eq!(tracker.days_before, crate::tracker::MAX_WINDOW_DAYS);
        assert_eq!(tracker.days_after, 1);
        assert_eq!(tracker.fetch_concurrency, 1);

        let negative = Config {
            min_dwell_days: Some(-5),
            ..Default::default()
        };
        assert_eq!(negative.merge_with_cli(&cli).tracker.min_dwell_days, 0);
    }

    #[test]
    fn test_default_paths_exists() {
        let paths = Config::default_paths();
        assert!(paths.iter().any(|p| p.to_string_lossy().contains("seopilot.json")));
        assert!(paths.iter().any(|p| p.to_string_lossy().contains("seopilot.toml")));
        assert!(paths.iter().any(|p| p.to_string_lossy().contains("seopilot.yml")));
    }

    #[test]
    #[serial]
    fn test_default_paths_with_xdg_config_home() {
        use std::env;

        unsafe {
            env::set_var("XDG_CONFIG_HOME", "/custom/config/path");
        }

        let paths = Config::default_paths();
        assert!(
            paths
                .iter()
                .any(|p| p.to_string_lossy().contains("/custom/config/path/seopilot"))
        );

        unsafe {
            env::remove_var("XDG_CONFIG_HOME");
        }
    }

    #[test]
    #[serial]
    fn test_load_explicit_path_wins() {
        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path().with_extension("toml");
        fs::write(&temp_path, "repo_id = \"acme/site\"\n").unwrap();

        let config = Config::load(temp_path.to_str()).unwrap();
        assert_eq!(config.repo_id.as_deref(), Some("acme/site"));

        fs::remove_file(temp_path).ok();
    }
}
