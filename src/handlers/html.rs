use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

use super::{
    BlogPost, FrameworkHandler, GeneratedFile, MetaInput, PageMeta, has_extension, html_meta_tags,
    route_from_file,
};
use crate::extract::escape_html;
use crate::models::{FrameworkType, ProjectStructure};
use crate::robots::render_robots;
use crate::schema::script_tag;
use crate::sitemap::{SitemapEntry, render_xml};

const HTML_EXTENSIONS: [&str; 2] = ["html", "htm"];
const PARTIAL_DIRS: [&str; 3] = ["_includes", "_layouts", "partials"];
const ROOT_PREFIXES: [&str; 3] = ["public/", "static/", "src/"];

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("title selector should be valid"));
static META_DESC_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[name='description']").expect("meta description selector should be valid")
});
static OG_IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("meta[property='og:image']").expect("og:image selector should be valid")
});
static CANONICAL_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("link[rel='canonical']").expect("canonical selector should be valid")
});

/// Plain HTML, and the fallback for every framework without its own handler
pub struct HtmlHandler;

fn is_partial(file: &str) -> bool {
    file.split('/').any(|segment| PARTIAL_DIRS.contains(&segment))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The root directory every page sits under, if they all share one. Pages
/// at the project root or spread over several roots are served as-is, so
/// `about.html` and `public/about.html` never collapse onto one route.
fn serving_root<'a>(page_files: impl IntoIterator<Item = &'a str>) -> Option<&'static str> {
    let mut shared = None;
    for file in page_files {
        let root = ROOT_PREFIXES.iter().copied().find(|prefix| file.starts_with(prefix))?;
        match shared {
            None => shared = Some(root),
            Some(existing) if existing == root => {}
            Some(_) => return None,
        }
    }
    shared
}

fn route_under(file_path: &str, root: Option<&str>) -> String {
    let prefixes: Vec<&str> = root.into_iter().collect();
    route_from_file(file_path, &prefixes)
}

/// Static files live at the root unless the project has a public directory
fn asset_path(structure: &ProjectStructure, name: &str) -> String {
    match &structure.public_dir {
        Some(dir) => format!("{}/{}", dir, name),
        None => name.to_string(),
    }
}

impl FrameworkHandler for HtmlHandler {
    fn frameworks(&self) -> &'static [FrameworkType] {
        &[FrameworkType::Html, FrameworkType::Unknown]
    }

    fn name(&self) -> &'static str {
        "html"
    }

    fn page_files(&self, files: &[String]) -> Vec<String> {
        files
            .iter()
            .filter(|f| has_extension(f, &HTML_EXTENSIONS) && !is_partial(f))
            .cloned()
            .collect()
    }

    fn layout_files(&self, files: &[String]) -> Vec<String> {
        files
            .iter()
            .filter(|f| has_extension(f, &HTML_EXTENSIONS) && is_partial(f))
            .cloned()
            .collect()
    }

    /// A lone file is taken to be served from its own root directory
    fn url_path(&self, file_path: &str) -> String {
        route_under(file_path, serving_root([file_path]))
    }

    fn url_paths(&self, page_files: &[String]) -> Vec<String> {
        let root = serving_root(page_files.iter().map(String::as_str));
        page_files.iter().map(|file| route_under(file, root)).collect()
    }

    fn extract_meta(&self, content: &str) -> Option<PageMeta> {
        let document = Html::parse_document(content);

        let title = document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|el| el.text().collect::<String>());
        let attr = |selector: &Selector, name: &str| {
            non_empty(document.select(selector).next().and_then(|el| el.value().attr(name)))
        };

        PageMeta {
            title: non_empty(title.as_deref()),
            description: attr(&META_DESC_SELECTOR, "content"),
            og_image: attr(&OG_IMAGE_SELECTOR, "content"),
            canonical: attr(&CANONICAL_SELECTOR, "href"),
        }
        .into_option()
    }

    fn generate_meta_code(&self, meta: &MetaInput) -> String {
        html_meta_tags(meta, "")
    }

    fn generate_sitemap_code(&self, entries: &[SitemapEntry]) -> String {
        render_xml(entries)
    }

    fn generate_robots_code(&self, domain: &str, disallow: &[String]) -> String {
        render_robots(domain, disallow)
    }

    fn generate_schema_code(&self, schema: &Value) -> String {
        format!("{}\n", script_tag(schema))
    }

    fn sitemap_path(&self, structure: &ProjectStructure) -> String {
        asset_path(structure, "sitemap.xml")
    }

    fn robots_path(&self, structure: &ProjectStructure) -> String {
        asset_path(structure, "robots.txt")
    }

    fn schema_location(&self, structure: &ProjectStructure) -> String {
        asset_path(structure, "index.html")
    }

    fn blog_directory(&self, structure: &ProjectStructure) -> String {
        asset_path(structure, "blog")
    }

    fn format_blog_post(&self, post: &BlogPost, structure: &ProjectStructure) -> GeneratedFile {
        let meta = MetaInput {
            title: post.title.clone(),
            description: post.description.clone(),
            og_image: post.image.clone(),
            canonical: None,
        };

        let mut content = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        content.push_str("  <meta charset=\"utf-8\" />\n");
        content.push_str(&html_meta_tags(&meta, "  "));
        if let Some(author) = &post.author {
            content.push_str(&format!(
                "  <meta name=\"author\" content=\"{}\" />\n",
                escape_html(author)
            ));
        }
        content.push_str("</head>\n<body>\n<article>\n");
        content.push_str(&format!("  <h1>{}</h1>\n", escape_html(&post.title)));
        content.push_str(&format!(
            "  <time datetime=\"{0}\">{0}</time>\n",
            post.date.format("%Y-%m-%d")
        ));
        for paragraph in post
            .body
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
        {
            content.push_str(&format!("  <p>{}</p>\n", escape_html(paragraph)));
        }
        content.push_str("</article>\n</body>\n</html>\n");

        GeneratedFile {
            path: format!("{}/{}.html", self.blog_directory(structure), post.slug()),
            content,
        }
    }
}
