use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameworkType {
    NextApp,
    NextPages,
    Astro,
    Nuxt,
    Gatsby,
    Remix,
    Sveltekit,
    ViteReact,
    ViteVue,
    Html,
    Unknown,
}

impl FrameworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameworkType::NextApp => "next-app",
            FrameworkType::NextPages => "next-pages",
            FrameworkType::Astro => "astro",
            FrameworkType::Nuxt => "nuxt",
            FrameworkType::Gatsby => "gatsby",
            FrameworkType::Remix => "remix",
            FrameworkType::Sveltekit => "sveltekit",
            FrameworkType::ViteReact => "vite-react",
            FrameworkType::ViteVue => "vite-vue",
            FrameworkType::Html => "html",
            FrameworkType::Unknown => "unknown",
        }
    }

    /// How this framework conventionally declares page metadata
    pub fn meta_strategy(&self) -> MetaStrategy {
        match self {
            FrameworkType::NextApp => MetaStrategy::NextMetadata,
            FrameworkType::NextPages => MetaStrategy::NextHead,
            FrameworkType::Astro => MetaStrategy::AstroHead,
            FrameworkType::Nuxt => MetaStrategy::NuxtUseHead,
            FrameworkType::Gatsby => MetaStrategy::GatsbyHead,
            FrameworkType::Remix => MetaStrategy::RemixMeta,
            FrameworkType::Sveltekit => MetaStrategy::SvelteHead,
            FrameworkType::ViteReact => MetaStrategy::ReactHelmet,
            FrameworkType::ViteVue => MetaStrategy::VueUseHead,
            FrameworkType::Html | FrameworkType::Unknown => MetaStrategy::HtmlMeta,
        }
    }
}

impl fmt::Display for FrameworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetaStrategy {
    NextMetadata,
    NextHead,
    AstroHead,
    NuxtUseHead,
    GatsbyHead,
    RemixMeta,
    SvelteHead,
    ReactHelmet,
    VueUseHead,
    HtmlMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub framework: FrameworkType,
    pub meta_strategy: MetaStrategy,
    pub version: Option<String>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStructure {
    pub pages_dir: Option<String>,
    pub components_dir: Option<String>,
    pub public_dir: Option<String>,
    pub content_dir: Option<String>,
    pub layout_files: Vec<String>,
    pub config_files: Vec<String>,
    pub total_files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoPatterns {
    pub meta_strategy: MetaStrategy,
    pub sitemap_path: Option<String>,
    pub robots_path: Option<String>,
    pub robots_sitemaps: Vec<String>,
    pub robots_disallow: Vec<String>,
    pub schema_types: Vec<String>,
    pub has_og_images: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSystem {
    pub package_manager: Option<PackageManager>,
    pub build_command: Option<String>,
    pub output_dir: Option<String>,
    pub has_lockfile: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub path: String,
    pub file_path: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub has_og_image: bool,
    pub has_schema: bool,
    pub schema_types: Vec<String>,
    pub images: Vec<ImageRef>,
    pub internal_links: Vec<String>,
    pub word_count: usize,
    pub last_modified: Option<DateTime<Utc>>,
}

impl PageInfo {
    /// Minimal page used by callers that build profiles by hand
    pub fn new(path: &str, file_path: &str) -> Self {
        Self {
            path: path.to_string(),
            file_path: file_path.to_string(),
            title: None,
            description: None,
            has_og_image: false,
            has_schema: false,
            schema_types: vec![],
            images: vec![],
            internal_links: vec![],
            word_count: 0,
            last_modified: None,
        }
    }

    /// Dynamic routes use bracket segments (`/blog/[slug]`)
    pub fn is_dynamic(&self) -> bool {
        is_dynamic_route(&self.path)
    }
}

pub fn is_dynamic_route(path: &str) -> bool {
    path.contains('[') || path.contains(']')
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodebaseProfile {
    pub repo_id: String,
    pub scanned_at: DateTime<Utc>,
    pub commit_hash: String,
    pub framework: FrameworkType,
    pub framework_version: Option<String>,
    pub confidence: Confidence,
    pub structure: ProjectStructure,
    pub seo_patterns: SeoPatterns,
    pub build_system: BuildSystem,
    pub pages: Vec<PageInfo>,
    pub safe_zones: Vec<String>,
    pub danger_zones: Vec<String>,
}

impl CodebaseProfile {
    /// A cached profile is only valid for the commit it was scanned at
    pub fn is_current_for(&self, repo_id: &str, commit_hash: &str) -> bool {
        self.repo_id == repo_id && self.commit_hash == commit_hash
    }

    pub fn page(&self, path: &str) -> Option<&PageInfo> {
        self.pages.iter().find(|page| page.path == path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueType {
    MissingMetaTitle,
    MissingMetaDescription,
    DuplicateTitle,
    DuplicateDescription,
    TitleTooLong,
    DescriptionTooLong,
    MissingOgImage,
    MissingSitemap,
    MissingRobots,
    MissingOrganizationSchema,
    MissingArticleSchema,
    MissingAltText,
    ThinContent,
    OrphanPage,
    Custom(String),
}

impl IssueType {
    pub const RULE_TYPES: [IssueType; 14] = [
        IssueType::MissingMetaTitle,
        IssueType::MissingMetaDescription,
        IssueType::DuplicateTitle,
        IssueType::DuplicateDescription,
        IssueType::TitleTooLong,
        IssueType::DescriptionTooLong,
        IssueType::MissingOgImage,
        IssueType::MissingSitemap,
        IssueType::MissingRobots,
        IssueType::MissingOrganizationSchema,
        IssueType::MissingArticleSchema,
        IssueType::MissingAltText,
        IssueType::ThinContent,
        IssueType::OrphanPage,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            IssueType::MissingMetaTitle => "missing-meta-title",
            IssueType::MissingMetaDescription => "missing-meta-description",
            IssueType::DuplicateTitle => "duplicate-title",
            IssueType::DuplicateDescription => "duplicate-description",
            IssueType::TitleTooLong => "title-too-long",
            IssueType::DescriptionTooLong => "description-too-long",
            IssueType::MissingOgImage => "missing-og-image",
            IssueType::MissingSitemap => "missing-sitemap",
            IssueType::MissingRobots => "missing-robots",
            IssueType::MissingOrganizationSchema => "missing-organization-schema",
            IssueType::MissingArticleSchema => "missing-article-schema",
            IssueType::MissingAltText => "missing-alt-text",
            IssueType::ThinContent => "thin-content",
            IssueType::OrphanPage => "orphan-page",
            IssueType::Custom(name) => name,
        }
    }

    /// True for every type the rule engine itself can produce
    pub fn is_rule_based(&self) -> bool {
        !matches!(self, IssueType::Custom(_))
    }
}

impl From<String> for IssueType {
    fn from(value: String) -> Self {
        IssueType::RULE_TYPES
            .iter()
            .find(|rule| rule.as_str() == value)
            .cloned()
            .unwrap_or(IssueType::Custom(value))
    }
}

impl From<&str> for IssueType {
    fn from(value: &str) -> Self {
        IssueType::from(value.to_string())
    }
}

impl From<IssueType> for String {
    fn from(value: IssueType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// Scope used in issue ids for site-wide problems
pub const GLOBAL_SCOPE: &str = "global";

/// Stable `<type>:<scope>` key used for dedup and change correlation
pub fn issue_id(issue_type: &IssueType, scope: Option<&str>) -> String {
    format!("{}:{}", issue_type, scope.unwrap_or(GLOBAL_SCOPE))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoIssue {
    pub id: String,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub page: Option<String>,
    pub file: Option<String>,
    pub description: String,
    pub recommendation: String,
    pub auto_fixable: bool,
}

impl SeoIssue {
    /// Scope segment of the id (`/about` or `global`)
    pub fn scope(&self) -> &str {
        self.page.as_deref().unwrap_or(GLOBAL_SCOPE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixAction {
    Create,
    Modify,
    Delete,
}

impl fmt::Display for FixAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FixAction::Create => "create",
            FixAction::Modify => "modify",
            FixAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeFix {
    pub issue_id: String,
    pub file: String,
    pub action: FixAction,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub replace: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Meta,
    Sitemap,
    Robots,
    Schema,
    Content,
    Images,
    Links,
    Other,
}

impl ChangeType {
    pub fn from_issue_type(issue_type: &IssueType) -> Self {
        match issue_type {
            IssueType::MissingMetaTitle
            | IssueType::MissingMetaDescription
            | IssueType::DuplicateTitle
            | IssueType::DuplicateDescription
            | IssueType::TitleTooLong
            | IssueType::DescriptionTooLong
            | IssueType::MissingOgImage => ChangeType::Meta,
            IssueType::MissingSitemap => ChangeType::Sitemap,
            IssueType::MissingRobots => ChangeType::Robots,
            IssueType::MissingOrganizationSchema | IssueType::MissingArticleSchema => {
                ChangeType::Schema
            }
            IssueType::MissingAltText => ChangeType::Images,
            IssueType::ThinContent => ChangeType::Content,
            IssueType::OrphanPage => ChangeType::Links,
            IssueType::Custom(_) => ChangeType::Other,
        }
    }

    pub fn expected_impact(&self) -> &'static str {
        match self {
            ChangeType::Meta => "Higher click-through rate from search result snippets",
            ChangeType::Sitemap => "Faster discovery and indexing of site pages",
            ChangeType::Robots => "Crawlers directed to indexable pages",
            ChangeType::Schema => "Eligibility for rich results in search",
            ChangeType::Content => "Better ranking for long-tail queries",
            ChangeType::Images => "Image search visibility and accessibility",
            ChangeType::Links => "Improved crawl depth and link equity distribution",
            ChangeType::Other => "General search visibility improvement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredImpact {
    pub clicks_before: f64,
    pub clicks_after: f64,
    pub measurement_period: u32,
}

impl MeasuredImpact {
    /// Relative change in percent, `None` when there was no baseline traffic
    pub fn percent_change(&self) -> Option<f64> {
        if self.clicks_before <= 0.0 {
            return None;
        }
        Some((self.clicks_after - self.clicks_before) / self.clicks_before * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub id: String,
    pub repo_id: String,
    pub timestamp: DateTime<Utc>,
    pub change_type: ChangeType,
    pub file: String,
    pub description: String,
    pub commit_sha: String,
    pub affected_pages: Vec<String>,
    pub expected_impact: String,
    pub measured_impact: Option<MeasuredImpact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageClicks {
    pub page: String,
    pub clicks: f64,
}

/// One day of search traffic for a site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub total_clicks: f64,
    #[serde(default)]
    pub pages: Vec<PageClicks>,
}
