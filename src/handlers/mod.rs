//! Framework handlers: one capability implementation per framework family.
//!
//! The registry is an explicit value. Build it once (usually with
//! [`HandlerRegistry::standard`]) and pass it to whatever needs a handler.

mod astro;
mod html;
mod next_app;
mod next_pages;

pub use astro::AstroHandler;
pub use html::HtmlHandler;
pub use next_app::NextAppHandler;
pub use next_pages::NextPagesHandler;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::extract::{attribute, escape_html};
use crate::models::{FrameworkType, ProjectStructure};
use crate::sitemap::SitemapEntry;

/// Statically extractable metadata of one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub og_image: Option<String>,
    pub canonical: Option<String>,
}

impl PageMeta {
    /// `None` unless a title or description was found
    pub fn into_option(self) -> Option<Self> {
        if self.title.is_some() || self.description.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

/// Metadata to render into framework code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInput {
    pub title: String,
    pub description: String,
    pub og_image: Option<String>,
    pub canonical: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub title: String,
    pub description: String,
    pub slug: Option<String>,
    pub date: NaiveDate,
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image: Option<String>,
    pub body: String,
}

impl BlogPost {
    pub fn slug(&self) -> String {
        match &self.slug {
            Some(slug) if !slug.is_empty() => slug.clone(),
            _ => crate::extract::slugify(&self.title),
        }
    }
}

/// A file a handler wants written, relative to the project root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Capability set every framework handler provides
pub trait FrameworkHandler: Send + Sync {
    /// Framework types this handler serves
    fn frameworks(&self) -> &'static [FrameworkType];

    fn name(&self) -> &'static str;

    fn page_files(&self, files: &[String]) -> Vec<String>;

    fn layout_files(&self, files: &[String]) -> Vec<String>;

    /// Canonical leading-slash route for a page file
    fn url_path(&self, file_path: &str) -> String;

    /// Routes for a whole page set, in order. Handlers whose routing depends
    /// on the other pages (a shared serving root) override this.
    fn url_paths(&self, page_files: &[String]) -> Vec<String> {
        page_files.iter().map(|file| self.url_path(file)).collect()
    }

    /// `None` when no static title or description exists
    fn extract_meta(&self, content: &str) -> Option<PageMeta>;

    fn generate_meta_code(&self, meta: &MetaInput) -> String;

    fn generate_sitemap_code(&self, entries: &[SitemapEntry]) -> String;

    fn generate_robots_code(&self, domain: &str, disallow: &[String]) -> String;

    fn generate_schema_code(&self, schema: &Value) -> String;

    fn sitemap_path(&self, structure: &ProjectStructure) -> String;

    fn robots_path(&self, structure: &ProjectStructure) -> String;

    /// File where site-wide structured data belongs
    fn schema_location(&self, structure: &ProjectStructure) -> String;

    fn blog_directory(&self, structure: &ProjectStructure) -> String;

    fn format_blog_post(&self, post: &BlogPost, structure: &ProjectStructure) -> GeneratedFile;
}

/// Framework type to handler table with one fixed fallback
pub struct HandlerRegistry {
    handlers: HashMap<FrameworkType, usize>,
    slots: Vec<Box<dyn FrameworkHandler>>,
    fallback: Box<dyn FrameworkHandler>,
}

impl HandlerRegistry {
    pub fn new(fallback: Box<dyn FrameworkHandler>) -> Self {
        Self {
            handlers: HashMap::new(),
            slots: Vec::new(),
            fallback,
        }
    }

    /// Next.js (both routers) and Astro, with plain HTML as the fallback
    pub fn standard() -> Self {
        let mut registry = Self::new(Box::new(HtmlHandler));
        registry.register(Box::new(NextAppHandler));
        registry.register(Box::new(NextPagesHandler));
        registry.register(Box::new(AstroHandler));
        registry
    }

    /// Register a handler for every framework it declares, replacing any
    /// previous registration for those frameworks
    pub fn register(&mut self, handler: Box<dyn FrameworkHandler>) {
        let slot = self.slots.len();
        for framework in handler.frameworks() {
            self.handlers.insert(*framework, slot);
        }
        self.slots.push(handler);
    }

    pub fn is_registered(&self, framework: FrameworkType) -> bool {
        self.handlers.contains_key(&framework)
    }

    pub fn get(&self, framework: FrameworkType) -> &dyn FrameworkHandler {
        match self.handlers.get(&framework) {
            Some(slot) => self.slots[*slot].as_ref(),
            None => self.fallback.as_ref(),
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

static TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title tag regex should be valid"));
static META_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<meta\b[^>]*>").expect("meta tag regex should be valid"));
static LINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<link\b[^>]*>").expect("link tag regex should be valid"));
static PROPS_COMPONENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:Seo|SEO|NextSeo|Layout|BaseLayout|PageLayout|BlogLayout|BaseHead|Meta)\b[^>]*>")
        .expect("props component regex should be valid")
});

/// Literal text of a title or attribute value. JSX string expressions are
/// unwrapped; anything interpolated counts as dynamic and yields `None`.
pub(crate) fn static_text(raw: &str) -> Option<String> {
    let mut text = raw.trim();
    if let Some(inner) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        let inner = inner.trim();
        let unquoted = ['"', '\'', '`']
            .iter()
            .find_map(|q| inner.strip_prefix(*q).and_then(|t| t.strip_suffix(*q)))?;
        if unquoted.contains("${") {
            return None;
        }
        text = unquoted;
    }
    if text.is_empty() || text.contains('{') || text.contains('}') {
        return None;
    }
    Some(text.to_string())
}

/// `<title>`, `<meta>`, `<link rel="canonical">` and SEO component props
pub(crate) fn extract_tag_meta(content: &str) -> PageMeta {
    let mut meta = PageMeta {
        title: TITLE_TAG
            .captures(content)
            .and_then(|caps| caps.get(1))
            .and_then(|m| static_text(m.as_str())),
        ..PageMeta::default()
    };

    for tag in META_TAG.find_iter(content) {
        let tag = tag.as_str();
        let key = attribute(tag, "name").or_else(|| attribute(tag, "property"));
        let value = attribute(tag, "content").and_then(|v| static_text(&v));
        match (key.as_deref(), value) {
            (Some("description"), Some(v)) if meta.description.is_none() => meta.description = Some(v),
            (Some("og:image"), Some(v)) if meta.og_image.is_none() => meta.og_image = Some(v),
            _ => {}
        }
    }

    for tag in LINK_TAG.find_iter(content) {
        let tag = tag.as_str();
        if attribute(tag, "rel").as_deref() == Some("canonical") {
            meta.canonical = attribute(tag, "href").and_then(|v| static_text(&v));
            break;
        }
    }

    for tag in PROPS_COMPONENT.find_iter(content) {
        let tag = tag.as_str();
        if meta.title.is_none() {
            meta.title = attribute(tag, "title").and_then(|v| static_text(&v));
        }
        if meta.description.is_none() {
            meta.description = attribute(tag, "description").and_then(|v| static_text(&v));
        }
        if meta.og_image.is_none() {
            meta.og_image = attribute(tag, "image")
                .or_else(|| attribute(tag, "ogImage"))
                .and_then(|v| static_text(&v));
        }
    }

    meta
}

/// Literal meta tags for an HTML `<head>`, one per line
pub(crate) fn html_meta_tags(meta: &MetaInput, indent: &str) -> String {
    let title = escape_html(&meta.title);
    let description = escape_html(&meta.description);
    let mut lines = vec![
        format!("<title>{}</title>", title),
        format!("<meta name=\"description\" content=\"{}\" />", description),
        format!("<meta property=\"og:title\" content=\"{}\" />", title),
        format!("<meta property=\"og:description\" content=\"{}\" />", description),
    ];
    if let Some(image) = &meta.og_image {
        lines.push(format!("<meta property=\"og:image\" content=\"{}\" />", escape_html(image)));
    }
    if let Some(canonical) = &meta.canonical {
        lines.push(format!("<link rel=\"canonical\" href=\"{}\" />", escape_html(canonical)));
    }
    lines
        .iter()
        .map(|line| format!("{}{}\n", indent, line))
        .collect()
}

/// Public assets directory, defaulting to `public`
pub(crate) fn public_dir(structure: &ProjectStructure) -> String {
    structure
        .public_dir
        .clone()
        .unwrap_or_else(|| "public".to_string())
}

/// Strip a known directory prefix and the extension, collapse `index`
pub(crate) fn route_from_file(file_path: &str, prefixes: &[&str]) -> String {
    let mut rest = file_path;
    for prefix in prefixes {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            break;
        }
    }

    let without_ext = match rest.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => rest,
    };

    let mut segments: Vec<&str> = without_ext
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.last() == Some(&"index") {
        segments.pop();
    }

    crate::extract::normalize_route(&segments.join("/"))
}

/// First layout-looking file, or a default location
pub(crate) fn first_or(files: &[String], default: &str) -> String {
    files
        .first()
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

pub(crate) fn has_extension(file: &str, extensions: &[&str]) -> bool {
    file.rsplit_once('.')
        .is_some_and(|(_, ext)| extensions.contains(&ext))
}
