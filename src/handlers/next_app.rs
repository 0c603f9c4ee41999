use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{BlogPost, FrameworkHandler, GeneratedFile, MetaInput, PageMeta};
use crate::extract::{escape_js_string, unescape_js_string};
use crate::models::{FrameworkType, ProjectStructure};
use crate::schema::json_literal;
use crate::sitemap::SitemapEntry;

const PAGE_EXTENSIONS: [&str; 5] = ["tsx", "jsx", "ts", "js", "mdx"];

static STATIC_METADATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+const\s+metadata\b[^=]*=\s*\{").expect("metadata export regex should be valid")
});

/// A JS string literal in any of the three quote styles, escapes allowed.
/// Exactly one of its three groups participates in a match.
const JS_STRING: &str = r#"(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'|`((?:[^`\\]|\\.)*)`)"#;

static TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\btitle\s*:\s*(?:{js}|\{{[^}}]*?\bdefault\s*:\s*{js})",
        js = JS_STRING
    ))
    .expect("title regex should be valid")
});
static DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\bdescription\s*:\s*{}", JS_STRING)).expect("description regex should be valid")
});
static OG_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?s)openGraph\s*:\s*\{{.*?\bimages\s*:\s*\[?\s*(?:\{{\s*url\s*:\s*)?{}",
        JS_STRING
    ))
    .expect("og image regex should be valid")
});
static CANONICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\bcanonical\s*:\s*{}", JS_STRING)).expect("canonical regex should be valid")
});

/// Next.js App Router (`app/**/page.tsx`, `export const metadata`)
pub struct NextAppHandler;

/// `app` or `src/app`, whichever the project uses
fn app_dir(structure: &ProjectStructure) -> String {
    match structure.pages_dir.as_deref() {
        Some(dir) if dir == "app" || dir == "src/app" => dir.to_string(),
        _ => "app".to_string(),
    }
}

fn strip_app_prefix(file: &str) -> Option<&str> {
    file.strip_prefix("src/app/")
        .or_else(|| file.strip_prefix("app/"))
}

fn is_named(file: &str, stem: &str, extensions: &[&str]) -> bool {
    let name = file.rsplit('/').next().unwrap_or(file);
    name.strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|ext| extensions.contains(&ext))
}

/// Slice of `content` from the `{` at `open` to its matching `}`
pub(crate) fn balanced_block(content: &str, open: usize) -> &str {
    let mut depth = 0usize;
    for (offset, c) in content[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &content[open..open + offset + 1];
                }
            }
            _ => {}
        }
    }
    &content[open..]
}

/// First participating group as a literal string. Template literals with
/// `${..}` interpolation are dynamic and yield `None`.
pub(crate) fn capture(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    let raw = (1..caps.len()).find_map(|i| caps.get(i))?.as_str();
    if raw.contains("${") {
        return None;
    }
    let value = unescape_js_string(raw).trim().to_string();
    if value.is_empty() { None } else { Some(value) }
}

impl FrameworkHandler for NextAppHandler {
    fn frameworks(&self) -> &'static [FrameworkType] {
        &[FrameworkType::NextApp]
    }

    fn name(&self) -> &'static str {
        "next-app"
    }

    fn page_files(&self, files: &[String]) -> Vec<String> {
        files
            .iter()
            .filter(|f| strip_app_prefix(f).is_some())
            .filter(|f| is_named(f, "page", &PAGE_EXTENSIONS))
            .filter(|f| !f.contains("/api/"))
            .cloned()
            .collect()
    }

    fn layout_files(&self, files: &[String]) -> Vec<String> {
        files
            .iter()
            .filter(|f| strip_app_prefix(f).is_some())
            .filter(|f| is_named(f, "layout", &["tsx", "jsx", "ts", "js"]))
            .cloned()
            .collect()
    }

    fn url_path(&self, file_path: &str) -> String {
        let rest = strip_app_prefix(file_path).unwrap_or(file_path);
        let segments: Vec<&str> = rest
            .split('/')
            .filter(|s| !s.is_empty())
            .filter(|s| !(s.starts_with('(') && s.ends_with(')')))
            .filter(|s| !s.starts_with('@'))
            .filter(|s| !is_named(s, "page", &PAGE_EXTENSIONS))
            .collect();
        crate::extract::normalize_route(&segments.join("/"))
    }

    fn extract_meta(&self, content: &str) -> Option<PageMeta> {
        // Metadata computed in generateMetadata() cannot be read statically
        let start = STATIC_METADATA.find(content)?;
        let block = balanced_block(content, start.end() - 1);

        PageMeta {
            title: capture(&TITLE, block),
            description: capture(&DESCRIPTION, block),
            og_image: capture(&OG_IMAGE, block),
            canonical: capture(&CANONICAL, block),
        }
        .into_option()
    }

    fn generate_meta_code(&self, meta: &MetaInput) -> String {
        let title = escape_js_string(&meta.title);
        let description = escape_js_string(&meta.description);

        let mut code = String::from("import type { Metadata } from 'next'\n\n");
        code.push_str("export const metadata: Metadata = {\n");
        code.push_str(&format!("  title: '{}',\n", title));
        code.push_str(&format!("  description: '{}',\n", description));
        code.push_str("  openGraph: {\n");
        code.push_str(&format!("    title: '{}',\n", title));
        code.push_str(&format!("    description: '{}',\n", description));
        if let Some(image) = &meta.og_image {
            code.push_str(&format!("    images: [{{ url: '{}' }}],\n", escape_js_string(image)));
        }
        code.push_str("  },\n");
        if let Some(canonical) = &meta.canonical {
            code.push_str("  alternates: {\n");
            code.push_str(&format!("    canonical: '{}',\n", escape_js_string(canonical)));
            code.push_str("  },\n");
        }
        code.push_str("}\n");
        code
    }

    fn generate_sitemap_code(&self, entries: &[SitemapEntry]) -> String {
        let mut code = String::from("import type { MetadataRoute } from 'next'\n\n");
        code.push_str("export default function sitemap(): MetadataRoute.Sitemap {\n");
        code.push_str("  return [\n");
        for entry in entries {
            code.push_str("    {\n");
            code.push_str(&format!("      url: '{}',\n", escape_js_string(&entry.url)));
            code.push_str(&format!(
                "      lastModified: new Date('{}'),\n",
                entry.lastmod.format("%Y-%m-%d")
            ));
            code.push_str(&format!("      changeFrequency: '{}',\n", entry.changefreq));
            code.push_str(&format!("      priority: {:.1},\n", entry.priority));
            code.push_str("    },\n");
        }
        code.push_str("  ]\n}\n");
        code
    }

    fn generate_robots_code(&self, domain: &str, disallow: &[String]) -> String {
        let disallow = disallow
            .iter()
            .map(|path| format!("'{}'", escape_js_string(path)))
            .collect::<Vec<_>>()
            .join(", ");

        let mut code = String::from("import type { MetadataRoute } from 'next'\n\n");
        code.push_str("export default function robots(): MetadataRoute.Robots {\n");
        code.push_str("  return {\n");
        code.push_str("    rules: {\n");
        code.push_str("      userAgent: '*',\n");
        code.push_str("      allow: '/',\n");
        if !disallow.is_empty() {
            code.push_str(&format!("      disallow: [{}],\n", disallow));
        }
        code.push_str("    },\n");
        code.push_str(&format!(
            "    sitemap: '{}/sitemap.xml',\n",
            escape_js_string(domain.trim_end_matches('/'))
        ));
        code.push_str("  }\n}\n");
        code
    }

    fn generate_schema_code(&self, schema: &Value) -> String {
        format!(
            "const jsonLd = {}\n\n<script\n  type=\"application/ld+json\"\n  dangerouslySetInnerHTML={{{{ __html: JSON.stringify(jsonLd) }}}}\n/>\n",
            json_literal(schema)
        )
    }

    fn sitemap_path(&self, structure: &ProjectStructure) -> String {
        format!("{}/sitemap.ts", app_dir(structure))
    }

    fn robots_path(&self, structure: &ProjectStructure) -> String {
        format!("{}/robots.ts", app_dir(structure))
    }

    fn schema_location(&self, structure: &ProjectStructure) -> String {
        let root = app_dir(structure);
        structure
            .layout_files
            .iter()
            .find(|f| {
                f.strip_prefix(&root)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .is_some_and(|rest| {
                        !rest.contains('/') && is_named(rest, "layout", &["tsx", "jsx", "ts", "js"])
                    })
            })
            .cloned()
            .unwrap_or_else(|| format!("{}/layout.tsx", root))
    }

    fn blog_directory(&self, structure: &ProjectStructure) -> String {
        format!("{}/blog", app_dir(structure))
    }

    fn format_blog_post(&self, post: &BlogPost, structure: &ProjectStructure) -> GeneratedFile {
        let mut content = String::from("export const metadata = {\n");
        content.push_str(&format!("  title: '{}',\n", escape_js_string(&post.title)));
        content.push_str(&format!("  description: '{}',\n", escape_js_string(&post.description)));
        if let Some(author) = &post.author {
            content.push_str(&format!("  authors: [{{ name: '{}' }}],\n", escape_js_string(author)));
        }
        if !post.tags.is_empty() {
            let tags = post
                .tags
                .iter()
                .map(|t| format!("'{}'", escape_js_string(t)))
                .collect::<Vec<_>>()
                .join(", ");
            content.push_str(&format!("  keywords: [{}],\n", tags));
        }
        content.push_str("  openGraph: {\n");
        content.push_str("    type: 'article',\n");
        content.push_str(&format!("    publishedTime: '{}',\n", post.date.format("%Y-%m-%d")));
        if let Some(image) = &post.image {
            content.push_str(&format!("    images: ['{}'],\n", escape_js_string(image)));
        }
        content.push_str("  },\n}\n\n");
        content.push_str(&format!("# {}\n\n", post.title));
        content.push_str(post.body.trim());
        content.push('\n');

        GeneratedFile {
            path: format!("{}/{}/page.mdx", self.blog_directory(structure), post.slug()),
            content,
        }
    }
}
