//! Regex-based extraction over raw page sources (HTML, JSX/TSX, Astro, MDX).
//!
//! None of this parses a real AST. Attributes built at runtime or nested
//! braces containing `>` will be missed or cut short.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value as YamlValue};
use std::collections::BTreeSet;
use url::Url;

use crate::models::ImageRef;

static IMG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:img|Image)\b[^>]*>").expect("img tag regex should be valid"));
static LINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:a|Link|NuxtLink)\b[^>]*>").expect("link tag regex should be valid"));
static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]*\]\(([^)\s]+)(?:\s+[^)]*)?\)").expect("markdown link regex should be valid")
});
static FRONTMATTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---\r?\n?").expect("frontmatter regex should be valid")
});
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?```").expect("code fence regex should be valid"));
static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(?:script|style)>")
        .expect("script/style regex should be valid")
});
static ESM_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:import|export)\b.*$").expect("esm statement regex should be valid")
});
static HTML_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex should be valid"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex should be valid"));
static JSX_EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("jsx expression regex should be valid"));
/// One `name=value` pair: groups 1 name, 2-3 quoted, 4-6 JSX string, 7 other `{expr}`
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)(?:^|[\s<])([A-Za-z_:@][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|\{\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'|`((?:[^`\\]|\\.)*)`)\s*\}|(\{[^}]*\}))"#,
    )
    .expect("attribute regex should be valid")
});
static SCHEMA_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']?@type["']?\s*:\s*["']([A-Za-z]+)["']"#).expect("schema type regex should be valid")
});

/// Read one attribute from a single tag. Quoted values are returned verbatim,
/// JSX string expressions are unwrapped and any other `{expr}` is returned
/// with its braces so callers can tell it was dynamic.
pub fn attribute(tag: &str, name: &str) -> Option<String> {
    ATTRIBUTE
        .captures_iter(tag)
        .find(|caps| caps.get(1).is_some_and(|m| m.as_str() == name))
        .and_then(|caps| {
            if let Some(m) = caps.get(2).or_else(|| caps.get(3)) {
                return Some(m.as_str().to_string());
            }
            if let Some(m) = (4..=6).find_map(|i| caps.get(i)) {
                return Some(unescape_js_string(m.as_str()));
            }
            caps.get(7).map(|m| m.as_str().to_string())
        })
}

/// `<img>` and `<Image>` sources with their alt text
pub fn images(content: &str) -> Vec<ImageRef> {
    IMG_TAG
        .find_iter(content)
        .filter_map(|tag| {
            let tag = tag.as_str();
            let src = attribute(tag, "src")?;
            Some(ImageRef {
                src,
                alt: attribute(tag, "alt"),
            })
        })
        .collect()
}

/// Same-origin link targets with query and fragment removed, sorted and unique.
/// Absolute URLs count as internal only when they point at `domain`.
pub fn internal_links(content: &str, domain: Option<&Url>) -> Vec<String> {
    let mut links = BTreeSet::new();

    let hrefs = LINK_TAG
        .find_iter(content)
        .filter_map(|tag| attribute(tag.as_str(), "href").or_else(|| attribute(tag.as_str(), "to")));
    let markdown = MARKDOWN_LINK
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));

    for href in hrefs.chain(markdown) {
        if let Some(path) = internal_path(&href, domain) {
            links.insert(path);
        }
    }

    links.into_iter().collect()
}

fn internal_path(href: &str, domain: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.starts_with('{') {
        return None;
    }

    let path = if href.starts_with("//") {
        return None;
    } else if href.starts_with('/') {
        href.to_string()
    } else if href.starts_with("http://") || href.starts_with("https://") {
        let parsed = Url::parse(href).ok()?;
        let domain = domain?;
        if parsed.host_str() != domain.host_str() {
            return None;
        }
        parsed.path().to_string()
    } else {
        return None;
    };

    let end = path.find(['?', '#']).unwrap_or(path.len());
    Some(normalize_route(&path[..end]))
}

/// Canonical leading-slash path without a trailing slash (except the root)
pub fn normalize_route(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Word count after removing frontmatter, code, scripts, markup and JSX expressions
pub fn word_count(content: &str) -> usize {
    let text = FRONTMATTER.replace(content, "");
    let text = CODE_FENCE.replace_all(&text, " ");
    let text = SCRIPT_STYLE.replace_all(&text, " ");
    let text = HTML_COMMENT.replace_all(&text, " ");
    let text = ESM_STATEMENT.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    let text = JSX_EXPRESSION.replace_all(&text, " ");

    text.split_whitespace()
        .filter(|word| word.chars().any(|c| c.is_alphanumeric()))
        .filter(|word| !word.contains(['{', '}', '(', ')', ';', '=']))
        .count()
}

/// Split `---` YAML frontmatter from the body
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let caps = FRONTMATTER.captures(content)?;
    let full = caps.get(0)?;
    let yaml = caps.get(1)?;
    Some((yaml.as_str(), &content[full.end()..]))
}

/// YAML frontmatter parsed once. Anything that is not a YAML mapping, such
/// as the JavaScript in an `.astro` component fence, reads as empty.
#[derive(Debug, Clone, Default)]
pub struct Frontmatter {
    fields: Mapping,
}

impl Frontmatter {
    pub fn parse(yaml: &str) -> Self {
        if yaml.trim().is_empty() {
            return Self::default();
        }
        match serde_yaml::from_str::<Mapping>(yaml) {
            Ok(fields) => Self { fields },
            Err(e) => {
                tracing::debug!(error = %e, "Frontmatter is not a YAML mapping");
                Self::default()
            }
        }
    }

    /// Top-level scalar as trimmed text; `None` when missing, blank or nested
    pub fn text(&self, key: &str) -> Option<String> {
        let text = match self.fields.get(key)? {
            YamlValue::String(s) => s.trim().to_string(),
            YamlValue::Number(n) => n.to_string(),
            YamlValue::Bool(b) => b.to_string(),
            _ => return None,
        };
        if text.is_empty() { None } else { Some(text) }
    }
}

/// JSON-LD `@type` values declared anywhere in the source
pub fn schema_types(content: &str) -> Vec<String> {
    let types: BTreeSet<String> = SCHEMA_TYPE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect();
    types.into_iter().collect()
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn escape_js_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
}

/// Undo backslash escapes in the body of a JS string literal
pub fn unescape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Escape a string for double-quoted YAML values
pub fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Lowercase, hyphen-separated slug
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}
