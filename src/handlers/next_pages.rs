use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{
    BlogPost, FrameworkHandler, GeneratedFile, MetaInput, PageMeta, extract_tag_meta, has_extension,
    html_meta_tags, public_dir, route_from_file,
};
use crate::extract::{Frontmatter, escape_js_string, split_frontmatter};
use crate::models::{FrameworkType, ProjectStructure};
use crate::robots::render_robots;
use crate::schema::json_literal;
use crate::sitemap::{SitemapEntry, render_xml};

const PAGE_EXTENSIONS: [&str; 5] = ["tsx", "jsx", "ts", "js", "mdx"];
const PAGE_PREFIXES: [&str; 2] = ["src/pages/", "pages/"];
const SPECIAL_PAGES: [&str; 5] = ["_app", "_document", "_error", "404", "500"];

static HEAD_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<Head>(.*?)</Head>").expect("head block regex should be valid"));
static COMPONENT_LAYOUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|/)components/(?:.*/)?[A-Za-z]*[Ll]ayout[A-Za-z]*\.(?:tsx|jsx|ts|js)$")
        .expect("layout component regex should be valid")
});

/// Next.js Pages Router (`pages/**`, `next/head`)
pub struct NextPagesHandler;

fn strip_pages_prefix(file: &str) -> Option<&str> {
    PAGE_PREFIXES
        .iter()
        .find_map(|prefix| file.strip_prefix(prefix))
}

fn stem(file: &str) -> &str {
    let name = file.rsplit('/').next().unwrap_or(file);
    name.split_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

/// `pages` or `src/pages`, whichever the project uses
fn pages_dir(structure: &ProjectStructure) -> String {
    match structure.pages_dir.as_deref() {
        Some(dir) if dir == "pages" || dir == "src/pages" => dir.to_string(),
        _ => "pages".to_string(),
    }
}

impl FrameworkHandler for NextPagesHandler {
    fn frameworks(&self) -> &'static [FrameworkType] {
        &[FrameworkType::NextPages]
    }

    fn name(&self) -> &'static str {
        "next-pages"
    }

    fn page_files(&self, files: &[String]) -> Vec<String> {
        files
            .iter()
            .filter(|f| {
                strip_pages_prefix(f).is_some_and(|rest| {
                    !rest.starts_with("api/")
                        && has_extension(rest, &PAGE_EXTENSIONS)
                        && !SPECIAL_PAGES.contains(&stem(rest))
                })
            })
            .cloned()
            .collect()
    }

    fn layout_files(&self, files: &[String]) -> Vec<String> {
        let mut layouts: Vec<String> = files
            .iter()
            .filter(|f| {
                strip_pages_prefix(f).is_some_and(|rest| {
                    matches!(stem(rest), "_app" | "_document") && !rest.contains('/')
                })
            })
            .cloned()
            .collect();
        layouts.extend(
            files
                .iter()
                .filter(|f| COMPONENT_LAYOUT.is_match(f))
                .cloned(),
        );
        layouts
    }

    fn url_path(&self, file_path: &str) -> String {
        route_from_file(file_path, &PAGE_PREFIXES)
    }

    fn extract_meta(&self, content: &str) -> Option<PageMeta> {
        let head = HEAD_BLOCK
            .captures(content)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or(content);

        let mut meta = extract_tag_meta(head);

        // MDX pages may carry their metadata as frontmatter instead
        if let Some((yaml, _)) = split_frontmatter(content) {
            let frontmatter = Frontmatter::parse(yaml);
            meta.title = meta.title.or_else(|| frontmatter.text("title"));
            meta.description = meta.description.or_else(|| frontmatter.text("description"));
        }

        meta.into_option()
    }

    fn generate_meta_code(&self, meta: &MetaInput) -> String {
        let mut code = String::from("import Head from 'next/head'\n\n<Head>\n");
        code.push_str(&html_meta_tags(meta, "  "));
        code.push_str("</Head>\n");
        code
    }

    fn generate_sitemap_code(&self, entries: &[SitemapEntry]) -> String {
        render_xml(entries)
    }

    fn generate_robots_code(&self, domain: &str, disallow: &[String]) -> String {
        render_robots(domain, disallow)
    }

    fn generate_schema_code(&self, schema: &Value) -> String {
        let json = json_literal(schema)
            .lines()
            .collect::<Vec<_>>()
            .join("\n      ");
        format!(
            "<Head>\n  <script\n    type=\"application/ld+json\"\n    dangerouslySetInnerHTML={{{{\n      __html: JSON.stringify({}),\n    }}}}\n  />\n</Head>\n",
            json
        )
    }

    fn sitemap_path(&self, structure: &ProjectStructure) -> String {
        format!("{}/sitemap.xml", public_dir(structure))
    }

    fn robots_path(&self, structure: &ProjectStructure) -> String {
        format!("{}/robots.txt", public_dir(structure))
    }

    fn schema_location(&self, structure: &ProjectStructure) -> String {
        let root = pages_dir(structure);
        structure
            .layout_files
            .iter()
            .find(|f| {
                f.strip_prefix(&root)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .is_some_and(|rest| stem(rest) == "_document" && !rest.contains('/'))
            })
            .cloned()
            .unwrap_or_else(|| format!("{}/_document.tsx", root))
    }

    fn blog_directory(&self, structure: &ProjectStructure) -> String {
        format!("{}/blog", pages_dir(structure))
    }

    fn format_blog_post(&self, post: &BlogPost, structure: &ProjectStructure) -> GeneratedFile {
        let mut content = String::from("import Head from 'next/head'\n\n");
        content.push_str("export const meta = {\n");
        content.push_str(&format!("  title: '{}',\n", escape_js_string(&post.title)));
        content.push_str(&format!("  description: '{}',\n", escape_js_string(&post.description)));
        content.push_str(&format!("  date: '{}',\n", post.date.format("%Y-%m-%d")));
        if let Some(author) = &post.author {
            content.push_str(&format!("  author: '{}',\n", escape_js_string(author)));
        }
        if !post.tags.is_empty() {
            let tags = post
                .tags
                .iter()
                .map(|t| format!("'{}'", escape_js_string(t)))
                .collect::<Vec<_>>()
                .join(", ");
            content.push_str(&format!("  tags: [{}],\n", tags));
        }
        content.push_str("}\n\n<Head>\n");
        content.push_str(&html_meta_tags(
            &MetaInput {
                title: post.title.clone(),
                description: post.description.clone(),
                og_image: post.image.clone(),
                canonical: None,
            },
            "  ",
        ));
        content.push_str("</Head>\n\n");
        content.push_str(&format!("# {}\n\n", post.title));
        content.push_str(post.body.trim());
        content.push('\n');

        GeneratedFile {
            path: format!("{}/{}.mdx", self.blog_directory(structure), post.slug()),
            content,
        }
    }
}
