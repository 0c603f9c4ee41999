//! Working-tree access for the profiler and the fix applier.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Directories never worth walking into
pub const PRUNED_DIRS: [&str; 3] = ["node_modules", ".git", ".hg"];

/// File access relative to a project root. Paths always use `/` separators.
#[async_trait]
pub trait SourceTree: Send + Sync {
    async fn list_files(&self) -> Result<Vec<String>>;

    async fn read_to_string(&self, path: &str) -> Result<String>;

    async fn last_modified(&self, path: &str) -> Option<DateTime<Utc>>;

    async fn exists(&self, path: &str) -> bool;

    /// Write a file, creating parent directories as needed
    async fn write(&mut self, path: &str, content: &str) -> Result<()>;

    async fn remove(&mut self, path: &str) -> Result<()>;
}

/// Relative paths only, no `..` or root components
pub fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

/// The real filesystem below `root`
#[derive(Debug, Clone)]
pub struct FsTree {
    root: PathBuf,
}

impl FsTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if !is_safe_relative(path) {
            bail!("path escapes the working tree: {}", path);
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl SourceTree for FsTree {
    async fn list_files(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            bail!("{} is not a directory", self.root.display());
        }

        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let walker = WalkDir::new(&root).follow_links(false).into_iter();

            for entry in walker.filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                e.depth() == 0
                    || !(e.file_type().is_dir() && PRUNED_DIRS.iter().any(|dir| *dir == name))
            }) {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::debug!(error = %e, "Skipping inaccessible entry");
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }

                if let Ok(relative) = entry.path().strip_prefix(&root) {
                    let relative = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    files.push(relative);
                }
            }

            files.sort();
            files
        })
        .await
        .context("File listing task failed")
    }

    async fn read_to_string(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .with_context(|| format!("Failed to read {}", full.display()))
    }

    async fn last_modified(&self, path: &str) -> Option<DateTime<Utc>> {
        let full = self.resolve(path).ok()?;
        let metadata = tokio::fs::metadata(full).await.ok()?;
        metadata.modified().ok().map(DateTime::<Utc>::from)
    }

    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn write(&mut self, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        tokio::fs::write(&full, content)
            .await
            .with_context(|| format!("Failed to write {}", full.display()))
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        tokio::fs::remove_file(&full)
            .await
            .with_context(|| format!("Failed to remove {}", full.display()))
    }
}

/// In-memory tree, ordered by path
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    files: BTreeMap<String, String>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }
}

impl<P: AsRef<str>, C: AsRef<str>> FromIterator<(P, C)> for MemoryTree {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        Self {
            files: iter
                .into_iter()
                .map(|(p, c)| (p.as_ref().to_string(), c.as_ref().to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl SourceTree for MemoryTree {
    async fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    async fn read_to_string(&self, path: &str) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("No such file: {}", path))
    }

    async fn last_modified(&self, _path: &str) -> Option<DateTime<Utc>> {
        None
    }

    async fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    async fn write(&mut self, path: &str, content: &str) -> Result<()> {
        if !is_safe_relative(path) {
            bail!("path escapes the working tree: {}", path);
        }
        self.files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn remove(&mut self, path: &str) -> Result<()> {
        self.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow!("No such file: {}", path))
    }
}

/// Resolve the commit `HEAD` points at by reading `.git` directly.
/// Returns `None` outside a git checkout or when the ref cannot be found.
pub fn read_commit_hash(root: &Path) -> Option<String> {
    let git_dir = root.join(".git");
    let head = std::fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let head = head.trim();

    let Some(reference) = head.strip_prefix("ref:") else {
        return Some(head.to_string());
    };
    let reference = reference.trim();

    if let Ok(sha) = std::fs::read_to_string(git_dir.join(reference)) {
        return Some(sha.trim().to_string());
    }

    let packed = std::fs::read_to_string(git_dir.join("packed-refs")).ok()?;
    packed
        .lines()
        .filter(|line| !line.starts_with('#') && !line.starts_with('^'))
        .find_map(|line| {
            let (sha, name) = line.split_once(' ')?;
            (name.trim() == reference).then(|| sha.to_string())
        })
}
