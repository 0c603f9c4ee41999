//! Sitemap entry construction, priority rules and `urlset` XML.

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::extract::escape_html;
use crate::models::{PageInfo, is_dynamic_route};
use crate::robots::RobotsTxt;

/// First path segments treated as a blog
pub const BLOG_PREFIXES: [&str; 4] = ["blog", "posts", "articles", "news"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFrequency {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFrequency::Always => "always",
            ChangeFrequency::Hourly => "hourly",
            ChangeFrequency::Daily => "daily",
            ChangeFrequency::Weekly => "weekly",
            ChangeFrequency::Monthly => "monthly",
            ChangeFrequency::Yearly => "yearly",
            ChangeFrequency::Never => "never",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "always" => Some(ChangeFrequency::Always),
            "hourly" => Some(ChangeFrequency::Hourly),
            "daily" => Some(ChangeFrequency::Daily),
            "weekly" => Some(ChangeFrequency::Weekly),
            "monthly" => Some(ChangeFrequency::Monthly),
            "yearly" => Some(ChangeFrequency::Yearly),
            "never" => Some(ChangeFrequency::Never),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub url: String,
    pub lastmod: NaiveDate,
    pub changefreq: ChangeFrequency,
    pub priority: f32,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn is_blog_segment(segment: &str) -> bool {
    BLOG_PREFIXES.contains(&segment)
}

/// True for `/blog/<slug>` style paths (not the blog index)
pub fn is_blog_post(path: &str) -> bool {
    let segs = segments(path);
    segs.len() >= 2 && is_blog_segment(segs[0])
}

/// Priority by position in the site: home 1.0, top-level 0.8, blog index 0.7,
/// blog post 0.6, docs 0.7/0.6 by depth, anything three levels deep 0.4.
pub fn page_priority(path: &str) -> f32 {
    let segs = segments(path);
    match segs.as_slice() {
        [] => 1.0,
        [first] if is_blog_segment(first) => 0.7,
        [first, _] if is_blog_segment(first) => 0.6,
        ["docs"] => 0.7,
        ["docs", _] => 0.6,
        segs if segs.len() >= 3 => 0.4,
        [_] => 0.8,
        _ => 0.5,
    }
}

pub fn change_frequency(path: &str) -> ChangeFrequency {
    let segs = segments(path);
    match segs.as_slice() {
        [] => ChangeFrequency::Daily,
        [first] if is_blog_segment(first) => ChangeFrequency::Daily,
        ["docs", ..] => ChangeFrequency::Weekly,
        _ => ChangeFrequency::Monthly,
    }
}

fn join_url(domain: &str, path: &str) -> String {
    let domain = domain.trim_end_matches('/');
    if path == "/" {
        format!("{}/", domain)
    } else {
        format!("{}{}", domain, path)
    }
}

/// Sort by priority descending, ties broken by URL ascending
pub fn sort_entries(entries: &mut [SitemapEntry]) {
    entries.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.url.cmp(&b.url))
    });
}

/// Build entries for every static page. Dynamic routes and paths the
/// project's robots.txt disallows are left out.
pub fn build_entries(
    pages: &[PageInfo],
    domain: &str,
    robots: Option<&RobotsTxt>,
    today: NaiveDate,
) -> Vec<SitemapEntry> {
    let mut entries: Vec<SitemapEntry> = pages
        .iter()
        .filter(|page| !is_dynamic_route(&page.path))
        .filter(|page| robots.is_none_or(|robots| robots.is_allowed(&page.path, "*")))
        .map(|page| SitemapEntry {
            url: join_url(domain, &page.path),
            lastmod: page
                .last_modified
                .map(|ts| ts.date_naive())
                .unwrap_or(today),
            changefreq: change_frequency(&page.path),
            priority: page_priority(&page.path),
        })
        .collect();

    entries.dedup_by(|a, b| a.url == b.url);
    sort_entries(&mut entries);
    entries
}

pub fn render_xml(entries: &[SitemapEntry]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape_html(&entry.url)));
        xml.push_str(&format!("    <lastmod>{}</lastmod>\n", entry.lastmod.format("%Y-%m-%d")));
        xml.push_str(&format!("    <changefreq>{}</changefreq>\n", entry.changefreq));
        xml.push_str(&format!("    <priority>{:.1}</priority>\n", entry.priority));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Raw child text of one `<url>` element
#[derive(Default)]
struct UrlFields {
    loc: String,
    lastmod: String,
    changefreq: String,
    priority: String,
}

impl UrlFields {
    fn push(&mut self, field: &str, text: &str) {
        let target = match field {
            "loc" => &mut self.loc,
            "lastmod" => &mut self.lastmod,
            "changefreq" => &mut self.changefreq,
            "priority" => &mut self.priority,
            _ => return,
        };
        target.push_str(text);
    }

    fn into_entry(self) -> Option<SitemapEntry> {
        let url = self.loc.trim();
        if url.is_empty() {
            return None;
        }
        let lastmod = self
            .lastmod
            .trim()
            .get(..10)
            .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())
            .unwrap_or_default();
        let changefreq = ChangeFrequency::parse(&self.changefreq).unwrap_or(ChangeFrequency::Monthly);
        let priority = self.priority.trim().parse::<f32>().unwrap_or(0.5);
        Some(SitemapEntry {
            url: url.to_string(),
            lastmod,
            changefreq,
            priority,
        })
    }
}

/// Parse a `urlset` document back into entries. Element prefixes are
/// ignored, so `<sm:url>` reads like `<url>`; only direct children of a
/// `<url>` count, so `<image:loc>` never replaces the page location.
/// `<url>` elements without a `<loc>` are skipped and missing optional
/// fields take sitemap-protocol defaults. Parsing stops at the first
/// malformed token, keeping the entries read so far.
pub fn parse_xml(xml: &str) -> Vec<SitemapEntry> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<UrlFields> = None;
    // Element depth below the open <url>, and the direct child being read
    let mut depth = 0usize;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if current.is_some() {
                    depth += 1;
                    field = (depth == 1).then_some(name);
                } else if name == "url" {
                    current = Some(UrlFields::default());
                    depth = 0;
                    field = None;
                }
            }
            Ok(Event::End(e)) => {
                if current.is_none() {
                    continue;
                }
                if depth == 0 && e.local_name().as_ref() == b"url" {
                    if let Some(entry) = current.take().and_then(UrlFields::into_entry) {
                        entries.push(entry);
                    }
                } else {
                    depth = depth.saturating_sub(1);
                    field = None;
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(fields), Some(name)) = (current.as_mut(), field.as_deref()) {
                    match e.unescape() {
                        Ok(text) => fields.push(name, &text),
                        Err(err) => tracing::debug!(field = name, error = %err, "Skipping undecodable sitemap text"),
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(fields), Some(name)) = (current.as_mut(), field.as_deref()) {
                    fields.push(name, &String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(position = reader.buffer_position(), error = %e, "Stopping at malformed sitemap XML");
                break;
            }
            _ => {}
        }
    }

    entries
}
