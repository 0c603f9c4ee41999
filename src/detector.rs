use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::{Confidence, DetectionResult, FrameworkType};

const LAYOUT_EXTENSIONS: [&str; 4] = ["tsx", "jsx", "ts", "js"];

/// Dependencies from `dependencies` and `devDependencies`
struct Manifest {
    deps: BTreeMap<String, String>,
}

impl Manifest {
    fn parse(raw: &str) -> Option<Self> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed manifest");
                return None;
            }
        };

        let mut deps = BTreeMap::new();
        for section in ["dependencies", "devDependencies"] {
            if let Some(map) = value.get(section).and_then(Value::as_object) {
                for (name, version) in map {
                    deps.entry(name.clone())
                        .or_insert_with(|| version.as_str().unwrap_or_default().to_string());
                }
            }
        }

        Some(Self { deps })
    }

    fn has(&self, name: &str) -> bool {
        self.deps.contains_key(name)
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        self.deps.keys().any(|name| name.starts_with(prefix))
    }

    fn version(&self, name: &str) -> Option<String> {
        self.deps.get(name).and_then(|range| clean_version(range))
    }

    fn version_of_prefix(&self, prefix: &str) -> Option<String> {
        self.deps
            .iter()
            .find(|(name, _)| name.starts_with(prefix))
            .and_then(|(_, range)| clean_version(range))
    }
}

/// Strip range operators from a manifest version (`^14.1.0` -> `14.1.0`)
pub fn clean_version(range: &str) -> Option<String> {
    let cleaned = range
        .trim()
        .trim_start_matches(['^', '~', '>', '<', '=', 'v', ' ']);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn major_version(version: Option<&str>) -> Option<u32> {
    version?.split('.').next()?.trim().parse().ok()
}

/// Classifies a project from its file list and optional `package.json`
pub struct FrameworkDetector;

impl FrameworkDetector {
    /// Never fails: a malformed manifest is treated as missing, and a tree
    /// with no recognizable signal comes back as `unknown` with low confidence.
    pub fn detect(files: &[String], manifest: Option<&str>) -> DetectionResult {
        let manifest = manifest.and_then(Manifest::parse);

        if let Some(manifest) = &manifest
            && let Some(result) = Self::detect_from_dependencies(files, manifest)
        {
            return result;
        }

        if let Some(result) = Self::detect_from_structure(files) {
            return result;
        }

        if Self::has_html_entry(files) {
            let confidence = if manifest.is_some() {
                Confidence::Medium
            } else {
                Confidence::High
            };
            return result(FrameworkType::Html, None, confidence);
        }

        result(FrameworkType::Unknown, None, Confidence::Low)
    }

    fn detect_from_dependencies(files: &[String], manifest: &Manifest) -> Option<DetectionResult> {
        if manifest.has("next") {
            let version = manifest.version("next");
            let (framework, structural) = Self::next_router(files, version.as_deref());
            let confidence = if structural {
                Confidence::High
            } else {
                Confidence::Low
            };
            return Some(result(framework, version, confidence));
        }

        let simple = [
            ("astro", FrameworkType::Astro),
            ("nuxt", FrameworkType::Nuxt),
            ("gatsby", FrameworkType::Gatsby),
            ("@sveltejs/kit", FrameworkType::Sveltekit),
        ];
        if let Some((name, framework)) = simple.iter().find(|(name, _)| manifest.has(name)) {
            return Some(result(*framework, manifest.version(name), Confidence::High));
        }

        if manifest.has_prefix("@remix-run/") {
            return Some(result(
                FrameworkType::Remix,
                manifest.version_of_prefix("@remix-run/"),
                Confidence::High,
            ));
        }

        if manifest.has("vite") {
            let version = manifest.version("vite");
            if manifest.has("vue") {
                return Some(result(FrameworkType::ViteVue, version, Confidence::High));
            }
            if manifest.has("react") || manifest.has("@vitejs/plugin-react") {
                return Some(result(FrameworkType::ViteReact, version, Confidence::High));
            }
        }

        None
    }

    /// App router vs pages router. The flag is false when only the version
    /// number decided it.
    fn next_router(files: &[String], version: Option<&str>) -> (FrameworkType, bool) {
        let has_layout = files.iter().any(|f| is_app_layout(f));
        let has_app_dir = has_dir(files, "app") || has_dir(files, "src/app");
        let major = major_version(version);

        if has_layout || (major.is_some_and(|m| m >= 13) && has_app_dir) {
            return (FrameworkType::NextApp, true);
        }

        if has_dir(files, "pages") || has_dir(files, "src/pages") {
            return (FrameworkType::NextPages, true);
        }

        // Unparseable ranges such as "latest" count as modern
        match major {
            Some(m) if m < 13 => (FrameworkType::NextPages, false),
            _ => (FrameworkType::NextApp, false),
        }
    }

    fn detect_from_structure(files: &[String]) -> Option<DetectionResult> {
        if has_root_config(files, "next.config") {
            let (framework, structural) = Self::next_router(files, None);
            let confidence = if structural {
                Confidence::Medium
            } else {
                Confidence::Low
            };
            return Some(result(framework, None, confidence));
        }

        let configs = [
            ("astro.config", FrameworkType::Astro),
            ("nuxt.config", FrameworkType::Nuxt),
            ("gatsby-config", FrameworkType::Gatsby),
            ("svelte.config", FrameworkType::Sveltekit),
            ("remix.config", FrameworkType::Remix),
        ];
        if let Some((_, framework)) = configs
            .iter()
            .find(|(stem, _)| has_root_config(files, stem))
        {
            return Some(result(*framework, None, Confidence::Medium));
        }

        if has_root_config(files, "vite.config") {
            let framework = if files.iter().any(|f| f.ends_with(".vue")) {
                FrameworkType::ViteVue
            } else {
                FrameworkType::ViteReact
            };
            return Some(result(framework, None, Confidence::Low));
        }

        None
    }

    fn has_html_entry(files: &[String]) -> bool {
        files
            .iter()
            .any(|f| f == "index.html" || (!f.contains('/') && f.ends_with(".html")))
    }
}

fn result(framework: FrameworkType, version: Option<String>, confidence: Confidence) -> DetectionResult {
    DetectionResult {
        framework,
        meta_strategy: framework.meta_strategy(),
        version,
        confidence,
    }
}

fn has_dir(files: &[String], dir: &str) -> bool {
    let prefix = format!("{}/", dir);
    files.iter().any(|f| f.starts_with(&prefix))
}

/// Root or segment `layout` file below `app/` or `src/app/`
fn is_app_layout(file: &str) -> bool {
    let rest = file
        .strip_prefix("src/app/")
        .or_else(|| file.strip_prefix("app/"));
    let Some(rest) = rest else {
        return false;
    };
    let name = rest.rsplit('/').next().unwrap_or(rest);
    name.strip_prefix("layout.")
        .is_some_and(|ext| LAYOUT_EXTENSIONS.contains(&ext))
}

/// `<stem>.js`, `<stem>.mjs`, `<stem>.ts`... at the project root
fn has_root_config(files: &[String], stem: &str) -> bool {
    files.iter().any(|f| {
        !f.contains('/')
            && f.strip_prefix(stem)
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|ext| ["js", "mjs", "cjs", "ts", "mts"].contains(&ext))
    })
}
