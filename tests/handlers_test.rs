use chrono::NaiveDate;
use seopilot::handlers::{BlogPost, HandlerRegistry, MetaInput};
use seopilot::models::{FrameworkType, ProjectStructure};
use seopilot::sitemap::{ChangeFrequency, SitemapEntry};
use serde_json::json;

fn files(list: &[&str]) -> Vec<String> {
    list.iter().map(|f| f.to_string()).collect()
}

fn post() -> BlogPost {
    BlogPost {
        title: "Shipping Faster: Our 2024 Roadmap".to_string(),
        description: "What we are building next".to_string(),
        slug: None,
        date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        author: Some("Sam Doe".to_string()),
        tags: vec!["roadmap".to_string()],
        image: Some("/images/roadmap.png".to_string()),
        body: "First paragraph.\n\nSecond paragraph.".to_string(),
    }
}

fn entry(url: &str) -> SitemapEntry {
    SitemapEntry {
        url: url.to_string(),
        lastmod: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        changefreq: ChangeFrequency::Monthly,
        priority: 0.8,
    }
}

#[test]
fn test_next_app_pages_and_routes() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::NextApp);
    assert_eq!(handler.name(), "next-app");

    let tree = files(&[
        "app/page.tsx",
        "app/(marketing)/about/page.tsx",
        "app/blog/[slug]/page.tsx",
        "app/api/health/route.ts",
        "app/api/docs/page.tsx",
        "app/layout.tsx",
        "components/Header.tsx",
    ]);
    let pages = handler.page_files(&tree);
    assert_eq!(pages.len(), 3);
    assert_eq!(handler.layout_files(&tree), vec!["app/layout.tsx".to_string()]);

    assert_eq!(handler.url_path("app/page.tsx"), "/");
    assert_eq!(handler.url_path("app/(marketing)/about/page.tsx"), "/about");
    assert_eq!(handler.url_path("src/app/blog/[slug]/page.tsx"), "/blog/[slug]");
}

#[test]
fn test_next_app_extract_meta() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::NextApp);

    let content = r#"
import type { Metadata } from 'next'

export const metadata: Metadata = {
  title: 'About Acme',
  description: "We build rockets",
  openGraph: {
    images: [{ url: '/og/about.png' }],
  },
  alternates: { canonical: 'https://acme.dev/about' },
}

export default function Page() { return <main>About</main> }
"#;
    let meta = handler.extract_meta(content).unwrap();
    assert_eq!(meta.title.as_deref(), Some("About Acme"));
    assert_eq!(meta.description.as_deref(), Some("We build rockets"));
    assert_eq!(meta.og_image.as_deref(), Some("/og/about.png"));
    assert_eq!(meta.canonical.as_deref(), Some("https://acme.dev/about"));

    let template = "export const metadata = { title: { default: 'Acme', template: '%s | Acme' } }";
    assert_eq!(
        handler.extract_meta(template).unwrap().title.as_deref(),
        Some("Acme")
    );

    let dynamic = "export async function generateMetadata() { return { title: 'x' } }";
    assert!(handler.extract_meta(dynamic).is_none());
}

#[test]
fn test_next_app_generated_code() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::NextApp);
    let structure = ProjectStructure {
        pages_dir: Some("src/app".to_string()),
        layout_files: vec!["src/app/layout.tsx".to_string(), "src/app/blog/layout.tsx".to_string()],
        ..Default::default()
    };

    let meta = handler.generate_meta_code(&MetaInput {
        title: "Acme's Blog".to_string(),
        description: "News".to_string(),
        og_image: Some("/og.png".to_string()),
        canonical: None,
    });
    assert!(meta.contains("export const metadata: Metadata"));
    assert!(meta.contains("title: 'Acme\\'s Blog'"));
    assert!(meta.contains("images: [{ url: '/og.png' }]"));
    assert!(!meta.contains("alternates"));

    let sitemap = handler.generate_sitemap_code(&[entry("https://acme.dev/about")]);
    assert!(sitemap.contains("url: 'https://acme.dev/about'"));
    assert!(sitemap.contains("lastModified: new Date('2024-01-02')"));

    let robots = handler.generate_robots_code("https://acme.dev/", &["/admin".to_string()]);
    assert!(robots.contains("disallow: ['/admin']"));
    assert!(robots.contains("sitemap: 'https://acme.dev/sitemap.xml'"));

    let schema = handler.generate_schema_code(&json!({"@type": "Organization", "name": "Acme"}));
    assert!(schema.contains("application/ld+json"));
    assert!(schema.contains("\"Organization\""));

    assert_eq!(handler.sitemap_path(&structure), "src/app/sitemap.ts");
    assert_eq!(handler.robots_path(&structure), "src/app/robots.ts");
    assert_eq!(handler.schema_location(&structure), "src/app/layout.tsx");
    assert_eq!(handler.blog_directory(&structure), "src/app/blog");

    let file = handler.format_blog_post(&post(), &structure);
    assert_eq!(file.path, "src/app/blog/shipping-faster-our-2024-roadmap/page.mdx");
    assert!(file.content.contains("publishedTime: '2024-03-15'"));
    assert!(file.content.contains("# Shipping Faster: Our 2024 Roadmap"));
}

#[test]
fn test_next_pages_routes_skip_special_files() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::NextPages);
    assert_eq!(handler.name(), "next-pages");

    let tree = files(&[
        "pages/index.tsx",
        "pages/about.tsx",
        "pages/blog/[slug].tsx",
        "pages/_app.tsx",
        "pages/_document.tsx",
        "pages/404.tsx",
        "pages/api/hello.ts",
        "components/layout/MainLayout.tsx",
    ]);
    let mut pages = handler.page_files(&tree);
    pages.sort();
    assert_eq!(
        pages,
        vec!["pages/about.tsx", "pages/blog/[slug].tsx", "pages/index.tsx"]
    );

    let layouts = handler.layout_files(&tree);
    assert!(layouts.contains(&"pages/_app.tsx".to_string()));
    assert!(layouts.contains(&"components/layout/MainLayout.tsx".to_string()));

    assert_eq!(handler.url_path("pages/index.tsx"), "/");
    assert_eq!(handler.url_path("src/pages/docs/index.tsx"), "/docs");
}

#[test]
fn test_next_pages_extract_meta_from_head() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::NextPages);

    let content = r#"
import Head from 'next/head'

export default function About() {
  return (
    <>
      <Head>
        <title>About us</title>
        <meta name="description" content="Who we are" />
        <meta property="og:image" content="/og/about.png" />
      </Head>
      <main>Hello</main>
    </>
  )
}
"#;
    let meta = handler.extract_meta(content).unwrap();
    assert_eq!(meta.title.as_deref(), Some("About us"));
    assert_eq!(meta.description.as_deref(), Some("Who we are"));
    assert_eq!(meta.og_image.as_deref(), Some("/og/about.png"));

    let interpolated = "<Head><title>{`${post.title} | Blog`}</title></Head>";
    assert!(handler.extract_meta(interpolated).is_none());
}

#[test]
fn test_next_pages_generated_code() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::NextPages);
    let structure = ProjectStructure {
        pages_dir: Some("pages".to_string()),
        public_dir: Some("public".to_string()),
        ..Default::default()
    };

    let meta = handler.generate_meta_code(&MetaInput {
        title: "Pricing".to_string(),
        description: "Plans & prices".to_string(),
        og_image: None,
        canonical: Some("https://acme.dev/pricing".to_string()),
    });
    assert!(meta.contains("import Head from 'next/head'"));
    assert!(meta.contains("<title>Pricing</title>"));
    assert!(meta.contains("Plans &amp; prices"));
    assert!(meta.contains("rel=\"canonical\""));

    assert_eq!(handler.sitemap_path(&structure), "public/sitemap.xml");
    assert_eq!(handler.robots_path(&structure), "public/robots.txt");
    assert_eq!(handler.schema_location(&structure), "pages/_document.tsx");
    assert_eq!(handler.blog_directory(&structure), "pages/blog");

    let sitemap = handler.generate_sitemap_code(&[entry("https://acme.dev/")]);
    assert!(sitemap.contains("<loc>https://acme.dev/</loc>"));
}

#[test]
fn test_astro_pages_and_meta() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::Astro);
    assert_eq!(handler.name(), "astro");

    let tree = files(&[
        "src/pages/index.astro",
        "src/pages/blog/first-post.md",
        "src/pages/_drafts/wip.md",
        "src/pages/rss.xml.js",
        "src/layouts/Base.astro",
    ]);
    let mut pages = handler.page_files(&tree);
    pages.sort();
    assert_eq!(pages, vec!["src/pages/blog/first-post.md", "src/pages/index.astro"]);
    assert_eq!(handler.layout_files(&tree), vec!["src/layouts/Base.astro".to_string()]);
    assert_eq!(handler.url_path("src/pages/blog/first-post.md"), "/blog/first-post");

    let markdown = "---\ntitle: \"First post\"\ndescription: Notes from launch\nheroImage: /hero.png\n---\n\n# Hello\n";
    let meta = handler.extract_meta(markdown).unwrap();
    assert_eq!(meta.title.as_deref(), Some("First post"));
    assert_eq!(meta.description.as_deref(), Some("Notes from launch"));
    assert_eq!(meta.og_image.as_deref(), Some("/hero.png"));

    let component = "---\nimport Layout from '../layouts/Base.astro'\n---\n<Layout title=\"Home\" description=\"Welcome\">\n  <h1>Hi</h1>\n</Layout>\n";
    let meta = handler.extract_meta(component).unwrap();
    assert_eq!(meta.title.as_deref(), Some("Home"));
    assert_eq!(meta.description.as_deref(), Some("Welcome"));
}

#[test]
fn test_astro_blog_post_frontmatter() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::Astro);
    let structure = ProjectStructure::default();

    let file = handler.format_blog_post(&post(), &structure);
    assert_eq!(file.path, "src/content/blog/shipping-faster-our-2024-roadmap.md");
    assert!(file.content.starts_with("---\n"));
    assert!(file.content.contains("title: \"Shipping Faster: Our 2024 Roadmap\""));
    assert!(file.content.contains("pubDate: 2024-03-15"));
    assert!(file.content.contains("tags: [\"roadmap\"]"));

    // The generated post reads back through the same handler
    let meta = handler.extract_meta(&file.content).unwrap();
    assert_eq!(meta.title.as_deref(), Some("Shipping Faster: Our 2024 Roadmap"));
    assert_eq!(meta.og_image.as_deref(), Some("/images/roadmap.png"));

    assert_eq!(handler.schema_location(&structure), "src/layouts/Layout.astro");
}

#[test]
fn test_html_handler_is_fallback() {
    let registry = HandlerRegistry::standard();
    for framework in [FrameworkType::Html, FrameworkType::Unknown, FrameworkType::Nuxt, FrameworkType::Gatsby] {
        assert_eq!(registry.get(framework).name(), "html");
    }
}

#[test]
fn test_html_pages_and_meta() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::Html);

    let tree = files(&["index.html", "about/index.html", "contact.htm", "partials/header.html", "style.css"]);
    let mut pages = handler.page_files(&tree);
    pages.sort();
    assert_eq!(pages, vec!["about/index.html", "contact.htm", "index.html"]);
    assert_eq!(handler.layout_files(&tree), vec!["partials/header.html".to_string()]);
    assert_eq!(handler.url_path("public/about/index.html"), "/about");

    let html = r#"<!DOCTYPE html>
<html><head>
  <title> Contact </title>
  <meta name="description" content="Get in touch">
  <link rel="canonical" href="https://acme.dev/contact">
</head><body></body></html>"#;
    let meta = handler.extract_meta(html).unwrap();
    assert_eq!(meta.title.as_deref(), Some("Contact"));
    assert_eq!(meta.description.as_deref(), Some("Get in touch"));
    assert_eq!(meta.canonical.as_deref(), Some("https://acme.dev/contact"));
    assert_eq!(meta.og_image, None);

    assert!(handler.extract_meta("<html><body><p>no head</p></body></html>").is_none());
}

#[test]
fn test_html_asset_locations() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::Html);

    let bare = ProjectStructure::default();
    assert_eq!(handler.sitemap_path(&bare), "sitemap.xml");
    assert_eq!(handler.schema_location(&bare), "index.html");

    let with_public = ProjectStructure {
        public_dir: Some("public".to_string()),
        ..Default::default()
    };
    assert_eq!(handler.robots_path(&with_public), "public/robots.txt");

    let file = handler.format_blog_post(&post(), &bare);
    assert_eq!(file.path, "blog/shipping-faster-our-2024-roadmap.html");
    assert!(file.content.contains("<p>First paragraph.</p>"));
    assert!(file.content.contains("<p>Second paragraph.</p>"));
    assert!(file.content.contains("<meta name=\"author\" content=\"Sam Doe\" />"));

    let robots = handler.generate_robots_code("https://acme.dev", &["/private".to_string()]);
    assert!(robots.contains("Disallow: /private"));
    assert!(robots.contains("Sitemap: https://acme.dev/sitemap.xml"));
}

#[test]
fn test_next_app_meta_with_quotes_inside_values() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::NextApp);

    let meta = handler
        .extract_meta(r#"export const metadata = { title: "Don't Panic: A Guide", description: "We're hiring" }"#)
        .unwrap();
    assert_eq!(meta.title.as_deref(), Some("Don't Panic: A Guide"));
    assert_eq!(meta.description.as_deref(), Some("We're hiring"));

    let escaped = handler
        .extract_meta(r#"export const metadata = { title: { default: 'Acme\'s Blog', template: '%s' }, alternates: { canonical: `https://acme.dev/blog` } }"#)
        .unwrap();
    assert_eq!(escaped.title.as_deref(), Some("Acme's Blog"));
    assert_eq!(escaped.canonical.as_deref(), Some("https://acme.dev/blog"));

    // Interpolated template literals are not static
    assert!(
        handler
            .extract_meta("export const metadata = { title: `${site.name} | Blog` }")
            .is_none()
    );
}

#[test]
fn test_next_pages_meta_with_quotes_inside_values() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::NextPages);

    let content = r#"
import Head from 'next/head'

export default function Careers() {
  return (
    <Head>
      <title>{"Don't Panic"}</title>
      <meta name="description" content={"We're hiring"} />
    </Head>
  )
}
"#;
    let meta = handler.extract_meta(content).unwrap();
    assert_eq!(meta.title.as_deref(), Some("Don't Panic"));
    assert_eq!(meta.description.as_deref(), Some("We're hiring"));
}

#[test]
fn test_astro_frontmatter_yaml_scalars() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::Astro);

    let content = "---\ntitle: 'It''s launch day'\ndescription: >-\n  Everything we shipped\n  this quarter\nseo:\n  title: Ignored\n---\n\nBody text.\n";
    let meta = handler.extract_meta(content).unwrap();
    assert_eq!(meta.title.as_deref(), Some("It's launch day"));
    assert_eq!(meta.description.as_deref(), Some("Everything we shipped this quarter"));
}

#[test]
fn test_html_routes_keep_serving_roots_apart() {
    let registry = HandlerRegistry::standard();
    let handler = registry.get(FrameworkType::Html);

    let mixed = files(&["about.html", "public/about.html", "src/about.html"]);
    assert_eq!(handler.url_paths(&mixed), vec!["/about", "/public/about", "/src/about"]);

    let served_from_public = files(&["public/index.html", "public/about.html", "public/blog/index.html"]);
    assert_eq!(handler.url_paths(&served_from_public), vec!["/", "/about", "/blog"]);
}

#[test]
fn test_routes_are_unique_within_a_page_set() {
    let registry = HandlerRegistry::standard();
    let cases = [
        (
            FrameworkType::NextApp,
            files(&[
                "app/page.tsx",
                "app/about/page.tsx",
                "app/(marketing)/pricing/page.tsx",
                "app/blog/page.tsx",
                "app/blog/[slug]/page.tsx",
                "app/@modal/login/page.tsx",
            ]),
        ),
        (
            FrameworkType::NextPages,
            files(&["pages/index.tsx", "pages/about.tsx", "pages/blog/index.tsx", "pages/blog/[slug].tsx", "pages/docs/intro.mdx"]),
        ),
        (
            FrameworkType::Astro,
            files(&["src/pages/index.astro", "src/pages/about.astro", "src/pages/blog/index.astro", "src/pages/blog/first.md", "src/pages/docs/setup.mdx"]),
        ),
        (
            FrameworkType::Html,
            files(&["index.html", "about.html", "about/team.html", "public/about.html", "src/about.html", "docs/index.html"]),
        ),
    ];

    for (framework, tree) in cases {
        let handler = registry.get(framework);
        let pages = handler.page_files(&tree);
        assert_eq!(pages.len(), tree.len(), "{} dropped a page", framework);

        let routes = handler.url_paths(&pages);
        let unique: std::collections::HashSet<&String> = routes.iter().collect();
        assert_eq!(unique.len(), routes.len(), "{} routes collide: {:?}", framework, routes);
    }
}
