use anyhow::{Context, Result};
use chrono::Utc;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::collections::BTreeSet;
use url::Url;

use crate::detector::FrameworkDetector;
use crate::error::PipelineWarning;
use crate::extract;
use crate::handlers::{FrameworkHandler, HandlerRegistry};
use crate::models::{
    BuildSystem, CodebaseProfile, Confidence, FrameworkType, PackageManager, PageInfo,
    ProjectStructure, SeoPatterns,
};
use crate::robots::RobotsTxt;
use crate::source::SourceTree;

/// Always skipped. A leading `/` anchors the pattern to the project root.
pub const DEFAULT_EXCLUDES: [&str; 15] = [
    "node_modules",
    ".git",
    ".next",
    ".nuxt",
    ".svelte-kit",
    ".astro",
    ".output",
    ".vercel",
    ".netlify",
    ".turbo",
    ".cache",
    "/dist",
    "/build",
    "/out",
    "/coverage",
];

const COMPONENT_CANDIDATES: [&str; 4] = ["src/components", "components", "app/components", "src/lib/components"];
const PUBLIC_CANDIDATES: [&str; 3] = ["public", "static", "src/public"];
const CONTENT_CANDIDATES: [&str; 6] = ["src/content", "content", "posts", "_posts", "src/posts", "data"];

const SITEMAP_CANDIDATES: [&str; 10] = [
    "public/sitemap.xml",
    "sitemap.xml",
    "static/sitemap.xml",
    "public/sitemap-index.xml",
    "app/sitemap.ts",
    "app/sitemap.js",
    "app/sitemap.xml",
    "src/app/sitemap.ts",
    "src/app/sitemap.js",
    "next-sitemap.config.js",
];
const ROBOTS_CANDIDATES: [&str; 7] = [
    "public/robots.txt",
    "robots.txt",
    "static/robots.txt",
    "app/robots.ts",
    "app/robots.js",
    "src/app/robots.ts",
    "src/app/robots.js",
];
/// Packages that emit a sitemap at build time
const SITEMAP_INTEGRATIONS: [&str; 3] = ["@astrojs/sitemap", "next-sitemap", "gatsby-plugin-sitemap"];

const DANGER_DIRS: [&str; 18] = [
    "lib",
    "src/lib",
    "utils",
    "src/utils",
    "server",
    "src/server",
    "api",
    "src/api",
    "pages/api",
    "src/pages/api",
    "app/api",
    "src/app/api",
    "hooks",
    "src/hooks",
    "middleware",
    "src/middleware",
    "prisma",
    "db",
];

const LOCKFILES: [(&str, PackageManager); 5] = [
    ("pnpm-lock.yaml", PackageManager::Pnpm),
    ("yarn.lock", PackageManager::Yarn),
    ("bun.lockb", PackageManager::Bun),
    ("bun.lock", PackageManager::Bun),
    ("package-lock.json", PackageManager::Npm),
];

pub struct ProfilerOptions {
    pub repo_id: String,
    pub commit_hash: String,
    /// Extra exclude patterns on top of [`DEFAULT_EXCLUDES`]
    pub exclude: Vec<String>,
    /// Site origin, used to recognise absolute same-origin links
    pub domain: Option<String>,
    pub show_progress: bool,
}

impl Default for ProfilerOptions {
    fn default() -> Self {
        Self {
            repo_id: "local".to_string(),
            commit_hash: "unknown".to_string(),
            exclude: Vec::new(),
            domain: None,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileOutcome {
    pub profile: CodebaseProfile,
    pub warnings: Vec<PipelineWarning>,
}

/// Builds a [`CodebaseProfile`] from one pass over a [`SourceTree`]
pub struct CodebaseProfiler<'a> {
    registry: &'a HandlerRegistry,
    options: ProfilerOptions,
}

impl<'a> CodebaseProfiler<'a> {
    pub fn new(registry: &'a HandlerRegistry, options: ProfilerOptions) -> Self {
        Self { registry, options }
    }

    /// Only a failure to list the tree is an error. Unreadable files become
    /// warnings and the scan carries on without them.
    pub async fn profile(&self, tree: &dyn SourceTree) -> Result<ProfileOutcome> {
        let mut warnings = Vec::new();

        let patterns: Vec<String> = DEFAULT_EXCLUDES
            .iter()
            .map(|p| p.to_string())
            .chain(self.options.exclude.iter().cloned())
            .collect();
        let excludes = ExcludeMatcher::new(&patterns)?;
        let mut files: Vec<String> = tree
            .list_files()
            .await
            .context("Failed to list project files")?
            .into_iter()
            .filter(|f| !excludes.is_excluded(f))
            .collect();
        files.sort();
        files.dedup();

        let manifest = if files.iter().any(|f| f == "package.json") {
            match tree.read_to_string("package.json").await {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!(path = "package.json", error = %e, "Manifest unreadable, continuing without it");
                    warnings.push(PipelineWarning::FileUnreadable {
                        path: "package.json".to_string(),
                        reason: format!("{:#}", e),
                    });
                    None
                }
            }
        } else {
            None
        };
        let manifest_json: Option<Value> = manifest.as_deref().and_then(|raw| serde_json::from_str(raw).ok());

        let detection = FrameworkDetector::detect(&files, manifest.as_deref());
        if detection.confidence == Confidence::Low {
            tracing::warn!(framework = %detection.framework, "Framework detection is ambiguous");
            warnings.push(PipelineWarning::DetectionAmbiguous {
                framework: detection.framework,
            });
        }

        let handler = self.registry.get(detection.framework);
        tracing::debug!(framework = %detection.framework, handler = handler.name(), "Selected handler");

        let structure = resolve_structure(&files, detection.framework, handler);
        let build_system = resolve_build_system(&files, manifest_json.as_ref(), detection.framework);

        let domain = self.options.domain.as_deref().and_then(|d| Url::parse(d).ok());
        let mut pages = self.scan_pages(tree, handler, &files, domain.as_ref(), &mut warnings).await;

        // Site-wide signals declared once in a layout
        let mut site_schema: BTreeSet<String> = BTreeSet::new();
        let mut layout_og_image = false;
        for layout in &structure.layout_files {
            let content = match tree.read_to_string(layout).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(path = %layout, error = %e, "Skipping unreadable layout");
                    warnings.push(PipelineWarning::FileUnreadable {
                        path: layout.clone(),
                        reason: format!("{:#}", e),
                    });
                    continue;
                }
            };
            site_schema.extend(extract::schema_types(&content));
            layout_og_image |= has_og_image(handler, &content);
        }
        if layout_og_image {
            for page in &mut pages {
                page.has_og_image = true;
            }
        }
        for page in &pages {
            site_schema.extend(page.schema_types.iter().cloned());
        }

        let sitemap_path = find_artifact(&files, &handler.sitemap_path(&structure), &SITEMAP_CANDIDATES)
            .or_else(|| sitemap_integration(manifest_json.as_ref()));
        let robots_path = find_artifact(&files, &handler.robots_path(&structure), &ROBOTS_CANDIDATES);

        let mut robots_sitemaps = Vec::new();
        let mut robots_disallow = Vec::new();
        if let Some(path) = robots_path.as_deref().filter(|p| p.ends_with(".txt")) {
            match tree.read_to_string(path).await {
                Ok(content) => {
                    let robots = RobotsTxt::parse(&content);
                    robots_sitemaps = robots.sitemaps().to_vec();
                    robots_disallow = robots.disallowed_for_all();
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Skipping unreadable robots.txt");
                    warnings.push(PipelineWarning::FileUnreadable {
                        path: path.to_string(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        let seo_patterns = SeoPatterns {
            meta_strategy: detection.meta_strategy,
            sitemap_path,
            robots_path,
            robots_sitemaps,
            robots_disallow,
            schema_types: site_schema.into_iter().collect(),
            has_og_images: pages.iter().any(|p| p.has_og_image),
        };

        let safe_zones = safe_zones(&files, &structure, handler);
        let danger_zones = danger_zones(&files, &structure);

        let profile = CodebaseProfile {
            repo_id: self.options.repo_id.clone(),
            scanned_at: Utc::now(),
            commit_hash: self.options.commit_hash.clone(),
            framework: detection.framework,
            framework_version: detection.version,
            confidence: detection.confidence,
            structure,
            seo_patterns,
            build_system,
            pages,
            safe_zones,
            danger_zones,
        };

        tracing::info!(
            framework = %profile.framework,
            pages = profile.pages.len(),
            warnings = warnings.len(),
            "Profile complete"
        );

        Ok(ProfileOutcome { profile, warnings })
    }

    async fn scan_pages(
        &self,
        tree: &dyn SourceTree,
        handler: &dyn FrameworkHandler,
        files: &[String],
        domain: Option<&Url>,
        warnings: &mut Vec<PipelineWarning>,
    ) -> Vec<PageInfo> {
        let page_files = handler.page_files(files);

        let progress_bar = self.options.show_progress.then(|| {
            let pb = ProgressBar::new(page_files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:30.cyan/blue} Scanning: {pos}/{len} pages")
                    .expect("Progress bar template should be valid"),
            );
            pb
        });

        let routes = handler.url_paths(&page_files);

        let mut pages = Vec::with_capacity(page_files.len());
        for (file, route) in page_files.iter().zip(&routes) {
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }

            let content = match tree.read_to_string(file).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(path = %file, error = %e, "Skipping unreadable page");
                    warnings.push(PipelineWarning::FileUnreadable {
                        path: file.clone(),
                        reason: format!("{:#}", e),
                    });
                    continue;
                }
            };

            let mut page = PageInfo::new(route, file);
            let meta = handler.extract_meta(&content);
            if let Some(meta) = &meta {
                page.title = meta.title.clone();
                page.description = meta.description.clone();
            }
            page.has_og_image = meta.as_ref().is_some_and(|m| m.og_image.is_some()) || has_og_image(handler, &content);
            page.schema_types = extract::schema_types(&content);
            page.has_schema = !page.schema_types.is_empty();
            page.images = extract::images(&content);
            page.internal_links = extract::internal_links(&content, domain);
            page.word_count = extract::word_count(&content);
            page.last_modified = tree.last_modified(file).await;

            pages.push(page);
        }

        if let Some(ref pb) = progress_bar {
            pb.finish_with_message(format!("Scanned {} pages", pages.len()));
        }

        pages.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.file_path.cmp(&b.file_path)));
        pages
    }
}

/// Compiled exclude patterns. A pattern matches a whole path segment, a
/// path prefix when it starts with or contains `/`, and may use glob
/// wildcards (`*`, `?`, `[..]`, `{a,b}`) within a segment.
pub struct ExcludeMatcher {
    globs: GlobSet,
}

impl ExcludeMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let anchored = pattern.starts_with('/');
            let trimmed = pattern.trim_matches('/');
            if trimmed.is_empty() {
                continue;
            }

            let body = if trimmed.contains(['*', '?', '[', '{']) {
                trimmed.to_string()
            } else {
                globset::escape(trimmed)
            };
            let variants = if anchored || trimmed.contains('/') {
                vec![body.clone(), format!("{}/**", body)]
            } else {
                vec![format!("**/{}", body), format!("**/{}/**", body)]
            };

            for variant in variants {
                let glob = GlobBuilder::new(&variant)
                    .literal_separator(true)
                    .build()
                    .with_context(|| format!("Invalid exclude pattern: {}", pattern))?;
                builder.add(glob);
            }
        }

        let globs = builder.build().context("Failed to compile exclude patterns")?;
        Ok(Self { globs })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.globs.is_match(path)
    }
}

fn has_dir(files: &[String], dir: &str) -> bool {
    let prefix = format!("{}/", dir);
    files.iter().any(|f| f.starts_with(&prefix))
}

/// First candidate directory that exists in the tree
fn first_dir(files: &[String], candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|dir| has_dir(files, dir))
        .map(|dir| dir.to_string())
}

fn page_candidates(framework: FrameworkType) -> &'static [&'static str] {
    match framework {
        FrameworkType::NextApp => &["src/app", "app"],
        FrameworkType::NextPages => &["src/pages", "pages"],
        FrameworkType::Astro | FrameworkType::Gatsby => &["src/pages"],
        FrameworkType::Nuxt => &["pages", "src/pages"],
        FrameworkType::Sveltekit => &["src/routes"],
        FrameworkType::Remix => &["app/routes"],
        _ => &["src/pages", "pages", "src/app", "app", "src"],
    }
}

fn is_config_file(file: &str) -> bool {
    if file.contains('/') {
        return false;
    }
    matches!(
        file,
        "package.json" | "tsconfig.json" | "jsconfig.json" | "vercel.json" | "netlify.toml"
    ) || file.contains(".config.")
        || file.starts_with("gatsby-")
        || file.starts_with(".env")
}

fn resolve_structure(files: &[String], framework: FrameworkType, handler: &dyn FrameworkHandler) -> ProjectStructure {
    ProjectStructure {
        pages_dir: first_dir(files, page_candidates(framework)),
        components_dir: first_dir(files, &COMPONENT_CANDIDATES),
        public_dir: first_dir(files, &PUBLIC_CANDIDATES),
        content_dir: first_dir(files, &CONTENT_CANDIDATES),
        layout_files: handler.layout_files(files),
        config_files: files.iter().filter(|f| is_config_file(f)).cloned().collect(),
        total_files: files.len(),
    }
}

fn package_manager_command(manager: PackageManager) -> &'static str {
    match manager {
        PackageManager::Npm => "npm",
        PackageManager::Yarn => "yarn",
        PackageManager::Pnpm => "pnpm",
        PackageManager::Bun => "bun",
    }
}

fn output_dir(framework: FrameworkType) -> Option<&'static str> {
    match framework {
        FrameworkType::NextApp | FrameworkType::NextPages => Some(".next"),
        FrameworkType::Astro | FrameworkType::ViteReact | FrameworkType::ViteVue => Some("dist"),
        FrameworkType::Nuxt => Some(".output"),
        FrameworkType::Gatsby => Some("public"),
        FrameworkType::Sveltekit => Some(".svelte-kit"),
        FrameworkType::Remix => Some("build"),
        FrameworkType::Html | FrameworkType::Unknown => None,
    }
}

fn resolve_build_system(files: &[String], manifest: Option<&Value>, framework: FrameworkType) -> BuildSystem {
    let lockfile = LOCKFILES
        .iter()
        .find(|(name, _)| files.iter().any(|f| f == name))
        .map(|(_, manager)| *manager);

    // `"packageManager": "pnpm@9.0.0"` when there is no lockfile
    let declared = manifest
        .and_then(|m| m.get("packageManager"))
        .and_then(Value::as_str)
        .and_then(|spec| match spec.split('@').next() {
            Some("npm") => Some(PackageManager::Npm),
            Some("yarn") => Some(PackageManager::Yarn),
            Some("pnpm") => Some(PackageManager::Pnpm),
            Some("bun") => Some(PackageManager::Bun),
            _ => None,
        });

    let package_manager = lockfile.or(declared).or(manifest.map(|_| PackageManager::Npm));

    let has_build_script = manifest
        .and_then(|m| m.get("scripts"))
        .and_then(|s| s.get("build"))
        .and_then(Value::as_str)
        .is_some();
    let build_command = match (has_build_script, package_manager) {
        (true, Some(manager)) => Some(format!("{} run build", package_manager_command(manager))),
        _ => None,
    };

    BuildSystem {
        package_manager,
        build_command,
        output_dir: output_dir(framework).map(str::to_string),
        has_lockfile: lockfile.is_some(),
    }
}

fn has_og_image(handler: &dyn FrameworkHandler, content: &str) -> bool {
    handler
        .extract_meta(content)
        .is_some_and(|meta| meta.og_image.is_some())
        || content.contains("og:image")
        || content.contains("opengraph-image")
}

/// The handler's preferred location first, then the common ones
fn find_artifact(files: &[String], preferred: &str, candidates: &[&str]) -> Option<String> {
    std::iter::once(preferred)
        .chain(candidates.iter().copied())
        .find(|candidate| files.iter().any(|f| f == candidate))
        .map(str::to_string)
}

fn sitemap_integration(manifest: Option<&Value>) -> Option<String> {
    let manifest = manifest?;
    SITEMAP_INTEGRATIONS
        .iter()
        .find(|name| {
            ["dependencies", "devDependencies"]
                .iter()
                .any(|section| manifest.get(section).and_then(|deps| deps.get(**name)).is_some())
        })
        .map(|name| name.to_string())
}

fn safe_zones(files: &[String], structure: &ProjectStructure, handler: &dyn FrameworkHandler) -> Vec<String> {
    let mut zones: BTreeSet<String> = [&structure.public_dir, &structure.content_dir, &structure.pages_dir]
        .into_iter()
        .flatten()
        .cloned()
        .collect();

    let blog = handler.blog_directory(structure);
    if has_dir(files, &blog) {
        zones.insert(blog);
    }

    zones.into_iter().collect()
}

fn danger_zones(files: &[String], structure: &ProjectStructure) -> Vec<String> {
    let mut zones: BTreeSet<String> = structure.config_files.iter().cloned().collect();
    zones.extend(
        DANGER_DIRS
            .iter()
            .filter(|dir| has_dir(files, dir))
            .map(|dir| dir.to_string()),
    );
    for file in ["middleware.ts", "middleware.js", "src/middleware.ts", "src/middleware.js"] {
        if files.iter().any(|f| f == file) {
            zones.insert(file.to_string());
        }
    }
    zones.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    fn matcher(list: &[&str]) -> ExcludeMatcher {
        ExcludeMatcher::new(list).unwrap()
    }

    #[test]
    fn test_default_excludes() {
        let defaults = matcher(&DEFAULT_EXCLUDES);
        assert!(defaults.is_excluded("node_modules/react/index.js"));
        assert!(defaults.is_excluded("packages/web/node_modules/x.js"));
        assert!(defaults.is_excluded(".next/server/app.js"));
        assert!(defaults.is_excluded("dist/index.html"));
        // Build-output names only count at the root
        assert!(!defaults.is_excluded("app/build/page.tsx"));
        assert!(!defaults.is_excluded("app/page.tsx"));
        assert!(!defaults.is_excluded("src/node_modules_notes.md"));
    }

    #[test]
    fn test_custom_patterns() {
        let custom = matcher(&["drafts", "src/legacy", "*.test.tsx"]);
        assert!(custom.is_excluded("content/drafts/post.md"));
        assert!(custom.is_excluded("src/legacy/old.tsx"));
        assert!(!custom.is_excluded("legacy/old.tsx"));
        assert!(custom.is_excluded("app/page.test.tsx"));
        assert!(custom.is_excluded("page.test.tsx"));
        assert!(!custom.is_excluded("app/page.tsx"));
    }

    #[test]
    fn test_wildcards_stay_within_a_segment() {
        let custom = matcher(&["/docs/*.md", "draft-*"]);
        assert!(custom.is_excluded("docs/intro.md"));
        assert!(!custom.is_excluded("docs/guides/intro.md"));
        assert!(custom.is_excluded("content/draft-launch/index.md"));
        assert!(!custom.is_excluded("content/drafts.md"));
    }

    #[test]
    fn test_literal_patterns_are_not_globs() {
        let custom = matcher(&["app/blog/[slug]"]);
        assert!(custom.is_excluded("app/blog/[slug]/page.tsx"));
        assert!(!custom.is_excluded("app/blog/s/page.tsx"));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        assert!(ExcludeMatcher::new(&["src/{a,b"]).is_err());
    }

    #[test]
    fn test_build_system_from_lockfile() {
        let files = strings(&["package.json", "pnpm-lock.yaml"]);
        let manifest: Value = serde_json::json!({ "scripts": { "build": "next build" } });
        let build = resolve_build_system(&files, Some(&manifest), FrameworkType::NextApp);
        assert_eq!(build.package_manager, Some(PackageManager::Pnpm));
        assert_eq!(build.build_command.as_deref(), Some("pnpm run build"));
        assert_eq!(build.output_dir.as_deref(), Some(".next"));
        assert!(build.has_lockfile);
    }

    #[test]
    fn test_build_system_without_manifest() {
        let build = resolve_build_system(&strings(&["index.html"]), None, FrameworkType::Html);
        assert_eq!(build, BuildSystem::default());
    }
}
