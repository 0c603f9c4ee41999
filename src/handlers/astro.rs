use serde_json::Value;

use super::{
    BlogPost, FrameworkHandler, GeneratedFile, MetaInput, PageMeta, extract_tag_meta, first_or,
    has_extension, html_meta_tags, public_dir, route_from_file,
};
use crate::extract::{Frontmatter, escape_yaml_string, split_frontmatter};
use crate::models::{FrameworkType, ProjectStructure};
use crate::robots::render_robots;
use crate::schema::json_literal;
use crate::sitemap::{SitemapEntry, render_xml};

const PAGES_PREFIX: &str = "src/pages/";
const LAYOUTS_PREFIX: &str = "src/layouts/";
const PAGE_EXTENSIONS: [&str; 3] = ["astro", "md", "mdx"];

/// Astro (`src/pages/**`, component frontmatter and layout props)
pub struct AstroHandler;

impl FrameworkHandler for AstroHandler {
    fn frameworks(&self) -> &'static [FrameworkType] {
        &[FrameworkType::Astro]
    }

    fn name(&self) -> &'static str {
        "astro"
    }

    fn page_files(&self, files: &[String]) -> Vec<String> {
        files
            .iter()
            .filter(|f| {
                f.strip_prefix(PAGES_PREFIX).is_some_and(|rest| {
                    has_extension(rest, &PAGE_EXTENSIONS)
                        && !rest.split('/').any(|segment| segment.starts_with('_'))
                })
            })
            .cloned()
            .collect()
    }

    fn layout_files(&self, files: &[String]) -> Vec<String> {
        files
            .iter()
            .filter(|f| f.starts_with(LAYOUTS_PREFIX) && has_extension(f, &["astro"]))
            .cloned()
            .collect()
    }

    fn url_path(&self, file_path: &str) -> String {
        route_from_file(file_path, &[PAGES_PREFIX])
    }

    fn extract_meta(&self, content: &str) -> Option<PageMeta> {
        let (yaml, body) = split_frontmatter(content).unwrap_or(("", content));
        let frontmatter = Frontmatter::parse(yaml);

        // Markdown frontmatter first, then markup and layout props
        let mut meta = PageMeta {
            title: frontmatter.text("title"),
            description: frontmatter.text("description"),
            og_image: frontmatter
                .text("image")
                .or_else(|| frontmatter.text("heroImage")),
            canonical: frontmatter.text("canonical"),
        };

        let tags = extract_tag_meta(body);
        meta.title = meta.title.or(tags.title);
        meta.description = meta.description.or(tags.description);
        meta.og_image = meta.og_image.or(tags.og_image);
        meta.canonical = meta.canonical.or(tags.canonical);

        meta.into_option()
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
        format!(
            "<script type=\"application/ld+json\" set:html={{JSON.stringify({})}} />\n",
            json_literal(schema)
        )
    }

    fn sitemap_path(&self, structure: &ProjectStructure) -> String {
        format!("{}/sitemap.xml", public_dir(structure))
    }

    fn robots_path(&self, structure: &ProjectStructure) -> String {
        format!("{}/robots.txt", public_dir(structure))
    }

    fn schema_location(&self, structure: &ProjectStructure) -> String {
        let layouts: Vec<String> = structure
            .layout_files
            .iter()
            .filter(|f| f.starts_with(LAYOUTS_PREFIX))
            .cloned()
            .collect();
        first_or(&layouts, "src/layouts/Layout.astro")
    }

    fn blog_directory(&self, structure: &ProjectStructure) -> String {
        let content = structure.content_dir.as_deref().unwrap_or("src/content");
        format!("{}/blog", content)
    }

    fn format_blog_post(&self, post: &BlogPost, structure: &ProjectStructure) -> GeneratedFile {
        let mut content = String::from("---\n");
        content.push_str(&format!("title: \"{}\"\n", escape_yaml_string(&post.title)));
        content.push_str(&format!("description: \"{}\"\n", escape_yaml_string(&post.description)));
        content.push_str(&format!("pubDate: {}\n", post.date.format("%Y-%m-%d")));
        if let Some(author) = &post.author {
            content.push_str(&format!("author: \"{}\"\n", escape_yaml_string(author)));
        }
        if !post.tags.is_empty() {
            let tags = post
                .tags
                .iter()
                .map(|t| format!("\"{}\"", escape_yaml_string(t)))
                .collect::<Vec<_>>()
                .join(", ");
            content.push_str(&format!("tags: [{}]\n", tags));
        }
        if let Some(image) = &post.image {
            content.push_str(&format!("heroImage: \"{}\"\n", escape_yaml_string(image)));
        }
        content.push_str("---\n\n");
        content.push_str(post.body.trim());
        content.push('\n');

        GeneratedFile {
            path: format!("{}/{}.md", self.blog_directory(structure), post.slug()),
            content,
        }
    }
}
