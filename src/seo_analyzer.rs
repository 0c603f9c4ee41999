use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::error::PipelineWarning;
use crate::models::{CodebaseProfile, IssueType, PageInfo, SeoIssue, Severity, issue_id};
use crate::schema::{ARTICLE_SCHEMA_TYPES, SITE_SCHEMA_TYPES};
use crate::sitemap::is_blog_post;

/// Paths that are not content and never count as thin
pub const THIN_CONTENT_DENYLIST: [&str; 13] = [
    "/api/",
    "/admin",
    "/login",
    "/logout",
    "/signin",
    "/signup",
    "/register",
    "/auth",
    "/dashboard",
    "/account",
    "/settings",
    "/404",
    "/500",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueThresholds {
    pub title_max_length: usize,
    pub description_max_length: usize,
    pub thin_content_words: usize,
}

impl Default for IssueThresholds {
    fn default() -> Self {
        Self {
            title_max_length: 60,
            description_max_length: 160,
            thin_content_words: 300,
        }
    }
}

/// Additional issues from outside the rule engine
#[async_trait]
pub trait SupplementalAnalyzer: Send + Sync {
    async fn analyze(&self, profile: &CodebaseProfile, rule_issues: &[SeoIssue]) -> Result<Vec<SeoIssue>>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisOutcome {
    pub issues: Vec<SeoIssue>,
    pub warnings: Vec<PipelineWarning>,
}

pub struct SeoIssueEngine {
    thresholds: IssueThresholds,
}

impl Default for SeoIssueEngine {
    fn default() -> Self {
        Self::new(IssueThresholds::default())
    }
}

impl SeoIssueEngine {
    pub fn new(thresholds: IssueThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &IssueThresholds {
        &self.thresholds
    }

    /// Run every rule. Pages are visited in path order and the site-wide
    /// checks come last, so the output order is stable.
    pub fn analyze(&self, profile: &CodebaseProfile) -> Vec<SeoIssue> {
        let mut pages: Vec<&PageInfo> = profile.pages.iter().collect();
        pages.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.file_path.cmp(&b.file_path)));

        let duplicate_titles = duplicates(&pages, |page| page.title.as_deref());
        let duplicate_descriptions = duplicates(&pages, |page| page.description.as_deref());
        let linked = inbound_links(&pages);

        let mut issues = Vec::new();
        for page in &pages {
            self.check_title(page, &duplicate_titles, &mut issues);
            self.check_description(page, &duplicate_descriptions, &mut issues);
            check_og_image(page, &mut issues);
            check_alt_text(page, &mut issues);
            self.check_thin_content(page, &mut issues);
            check_article_schema(page, &mut issues);
            check_orphan(page, &linked, &mut issues);
        }

        check_site(profile, &mut issues);

        merge_issues(issues, Vec::new())
    }

    /// Rule issues plus whatever `supplemental` contributes. A failing
    /// supplemental pass becomes a warning and the rule issues still come back.
    pub async fn analyze_with(
        &self,
        profile: &CodebaseProfile,
        supplemental: Option<&dyn SupplementalAnalyzer>,
    ) -> AnalysisOutcome {
        let issues = self.analyze(profile);
        let mut warnings = Vec::new();

        let Some(analyzer) = supplemental else {
            return AnalysisOutcome { issues, warnings };
        };

        let extra = match analyzer.analyze(profile, &issues).await {
            Ok(extra) => extra,
            Err(e) => {
                tracing::warn!(error = %e, "Supplemental analysis failed, keeping rule-based issues");
                warnings.push(PipelineWarning::SupplementalAnalysisFailed {
                    reason: format!("{:#}", e),
                });
                Vec::new()
            }
        };

        let before = extra.len();
        let extra: Vec<SeoIssue> = extra
            .into_iter()
            .filter(|issue| !issue.issue_type.is_rule_based())
            .collect();
        if extra.len() < before {
            tracing::debug!(
                discarded = before - extra.len(),
                "Dropped supplemental issues that duplicate rule types"
            );
        }

        AnalysisOutcome {
            issues: merge_issues(issues, extra),
            warnings,
        }
    }

    fn check_title(&self, page: &PageInfo, duplicates: &HashSet<String>, issues: &mut Vec<SeoIssue>) {
        match non_blank(page.title.as_deref()) {
            None => issues.push(page_issue(
                IssueType::MissingMetaTitle,
                Severity::Critical,
                page,
                format!("Page {} has no title", page.path),
                "Add a unique, descriptive title of 50-60 characters",
            )),
            Some(title) => {
                if duplicates.contains(title) {
                    issues.push(page_issue(
                        IssueType::DuplicateTitle,
                        Severity::Warning,
                        page,
                        format!("Title \"{}\" is used by more than one page", title),
                        "Give every page its own title",
                    ));
                }
                let length = title.chars().count();
                if length > self.thresholds.title_max_length {
                    issues.push(page_issue(
                        IssueType::TitleTooLong,
                        Severity::Warning,
                        page,
                        format!(
                            "Title is {} characters (max {})",
                            length, self.thresholds.title_max_length
                        ),
                        "Shorten the title so search results do not truncate it",
                    ));
                }
            }
        }
    }

    fn check_description(&self, page: &PageInfo, duplicates: &HashSet<String>, issues: &mut Vec<SeoIssue>) {
        match non_blank(page.description.as_deref()) {
            None => issues.push(page_issue(
                IssueType::MissingMetaDescription,
                Severity::Critical,
                page,
                format!("Page {} has no meta description", page.path),
                "Add a meta description of 150-160 characters summarising the page",
            )),
            Some(description) => {
                if duplicates.contains(description) {
                    issues.push(page_issue(
                        IssueType::DuplicateDescription,
                        Severity::Warning,
                        page,
                        "Meta description is shared with another page".to_string(),
                        "Write a distinct description for each page",
                    ));
                }
                let length = description.chars().count();
                if length > self.thresholds.description_max_length {
                    issues.push(page_issue(
                        IssueType::DescriptionTooLong,
                        Severity::Warning,
                        page,
                        format!(
                            "Meta description is {} characters (max {})",
                            length, self.thresholds.description_max_length
                        ),
                        "Trim the description to fit in search result snippets",
                    ));
                }
            }
        }
    }

    fn check_thin_content(&self, page: &PageInfo, issues: &mut Vec<SeoIssue>) {
        if page.is_dynamic() || is_denylisted(&page.path) {
            return;
        }
        if page.word_count < self.thresholds.thin_content_words {
            let mut issue = page_issue(
                IssueType::ThinContent,
                Severity::Warning,
                page,
                format!(
                    "Page has {} words (minimum {})",
                    page.word_count, self.thresholds.thin_content_words
                ),
                "Expand the page with useful, original content",
            );
            issue.auto_fixable = false;
            issues.push(issue);
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn is_denylisted(path: &str) -> bool {
    THIN_CONTENT_DENYLIST.iter().any(|pattern| path.contains(pattern))
}

/// Trimmed values shared by two or more pages
fn duplicates<'p>(pages: &[&'p PageInfo], value: impl Fn(&'p PageInfo) -> Option<&'p str>) -> HashSet<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for page in pages {
        if let Some(v) = non_blank(value(*page)) {
            *counts.entry(v).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .map(|(v, _)| v.to_string())
        .collect()
}

/// Paths some other page links to
fn inbound_links(pages: &[&PageInfo]) -> HashSet<String> {
    let mut linked = HashSet::new();
    for page in pages {
        for link in &page.internal_links {
            if link != &page.path {
                linked.insert(link.clone());
            }
        }
    }
    linked
}

fn page_issue(
    issue_type: IssueType,
    severity: Severity,
    page: &PageInfo,
    description: String,
    recommendation: &str,
) -> SeoIssue {
    SeoIssue {
        id: issue_id(&issue_type, Some(&page.path)),
        issue_type,
        severity,
        page: Some(page.path.clone()),
        file: Some(page.file_path.clone()),
        description,
        recommendation: recommendation.to_string(),
        auto_fixable: true,
    }
}

fn global_issue(issue_type: IssueType, severity: Severity, description: &str, recommendation: &str) -> SeoIssue {
    SeoIssue {
        id: issue_id(&issue_type, None),
        issue_type,
        severity,
        page: None,
        file: None,
        description: description.to_string(),
        recommendation: recommendation.to_string(),
        auto_fixable: true,
    }
}

fn check_og_image(page: &PageInfo, issues: &mut Vec<SeoIssue>) {
    if !page.has_og_image {
        issues.push(page_issue(
            IssueType::MissingOgImage,
            Severity::Warning,
            page,
            "Page has no Open Graph image".to_string(),
            "Add an og:image so shared links render a preview",
        ));
    }
}

fn check_alt_text(page: &PageInfo, issues: &mut Vec<SeoIssue>) {
    // alt="" marks a decorative image and is fine
    let missing = page.images.iter().filter(|image| image.alt.is_none()).count();
    if missing > 0 {
        issues.push(page_issue(
            IssueType::MissingAltText,
            Severity::Warning,
            page,
            format!("{} image(s) without an alt attribute", missing),
            "Describe each image with alt text",
        ));
    }
}

fn check_article_schema(page: &PageInfo, issues: &mut Vec<SeoIssue>) {
    if !is_blog_post(&page.path) || page.is_dynamic() {
        return;
    }
    let has_article = page
        .schema_types
        .iter()
        .any(|t| ARTICLE_SCHEMA_TYPES.contains(&t.as_str()));
    if !has_article {
        issues.push(page_issue(
            IssueType::MissingArticleSchema,
            Severity::Info,
            page,
            "Blog post has no Article or BlogPosting structured data".to_string(),
            "Add BlogPosting JSON-LD with headline, date and author",
        ));
    }
}

fn check_orphan(page: &PageInfo, linked: &HashSet<String>, issues: &mut Vec<SeoIssue>) {
    if page.path == "/" || page.is_dynamic() || linked.contains(&page.path) {
        return;
    }
    let mut issue = page_issue(
        IssueType::OrphanPage,
        Severity::Info,
        page,
        "No other page links to this page".to_string(),
        "Link to it from navigation or related pages",
    );
    issue.auto_fixable = false;
    issues.push(issue);
}

fn check_site(profile: &CodebaseProfile, issues: &mut Vec<SeoIssue>) {
    let patterns = &profile.seo_patterns;

    if patterns.sitemap_path.is_none() {
        issues.push(global_issue(
            IssueType::MissingSitemap,
            Severity::Critical,
            "No sitemap found",
            "Generate a sitemap listing every public page",
        ));
    }

    if patterns.robots_path.is_none() {
        issues.push(global_issue(
            IssueType::MissingRobots,
            Severity::Warning,
            "No robots.txt found",
            "Add a robots.txt that points crawlers at the sitemap",
        ));
    }

    let has_site_schema = patterns
        .schema_types
        .iter()
        .chain(profile.pages.iter().flat_map(|page| page.schema_types.iter()))
        .any(|t| SITE_SCHEMA_TYPES.contains(&t.as_str()));
    if !has_site_schema {
        issues.push(global_issue(
            IssueType::MissingOrganizationSchema,
            Severity::Info,
            "No Organization or WebSite structured data found",
            "Add Organization JSON-LD to the root layout",
        ));
    }
}

/// Concatenate and dedup by id, first occurrence wins. Ids are recomputed
/// from type and page so foreign issues follow the same key format.
pub fn merge_issues(rule_issues: Vec<SeoIssue>, supplemental: Vec<SeoIssue>) -> Vec<SeoIssue> {
    let mut seen = HashSet::new();
    rule_issues
        .into_iter()
        .chain(supplemental)
        .map(|mut issue| {
            issue.id = issue_id(&issue.issue_type, issue.page.as_deref());
            issue
        })
        .filter(|issue| seen.insert(issue.id.clone()))
        .collect()
}

fn default_severity() -> Severity {
    Severity::Info
}

/// Issue shape accepted from files; ids are derived, not trusted
#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(alias = "type")]
    issue_type: IssueType,
    #[serde(default = "default_severity")]
    severity: Severity,
    #[serde(default)]
    page: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    recommendation: String,
    #[serde(default)]
    auto_fixable: bool,
}

impl From<RawIssue> for SeoIssue {
    fn from(raw: RawIssue) -> Self {
        SeoIssue {
            id: issue_id(&raw.issue_type, raw.page.as_deref()),
            issue_type: raw.issue_type,
            severity: raw.severity,
            page: raw.page,
            file: raw.file,
            description: raw.description,
            recommendation: raw.recommendation,
            auto_fixable: raw.auto_fixable,
        }
    }
}

/// Parse a JSON array of issues
pub fn parse_issues(raw: &str) -> Result<Vec<SeoIssue>> {
    let issues: Vec<RawIssue> = serde_json::from_str(raw).context("Failed to parse issues JSON")?;
    Ok(issues.into_iter().map(SeoIssue::from).collect())
}

/// Supplemental issues read from a JSON file written by another tool
pub struct JsonIssueFile {
    path: PathBuf,
}

impl JsonIssueFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SupplementalAnalyzer for JsonIssueFile {
    async fn analyze(&self, _profile: &CodebaseProfile, _rule_issues: &[SeoIssue]) -> Result<Vec<SeoIssue>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        parse_issues(&raw)
    }
}
