use serde::Serialize;

use crate::error::PipelineWarning;
use crate::models::{CodeFix, FixAction};
use crate::source::{SourceTree, is_safe_relative};

/// What happened to one applied fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixOutcome {
    Created,
    Modified,
    Deleted,
    /// Delete of a file that was already gone
    AlreadyAbsent,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedFix {
    pub fix: CodeFix,
    pub outcome: FixOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFix {
    pub fix: CodeFix,
    pub warning: PipelineWarning,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyReport {
    pub applied: Vec<AppliedFix>,
    pub skipped: Vec<SkippedFix>,
}

impl ApplyReport {
    pub fn warnings(&self) -> Vec<&PipelineWarning> {
        self.skipped.iter().map(|s| &s.warning).collect()
    }
}

/// Applies create/modify/delete fixes one at a time. A fix that cannot be
/// applied is skipped with a warning and the rest of the batch continues.
#[derive(Debug, Clone, Default)]
pub struct CodeFixApplier {
    danger_zones: Vec<String>,
}

impl CodeFixApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to touch files in these paths (files or directory prefixes)
    pub fn with_danger_zones(mut self, zones: Vec<String>) -> Self {
        self.danger_zones = zones;
        self
    }

    pub async fn apply_all(&self, tree: &mut dyn SourceTree, fixes: &[CodeFix]) -> ApplyReport {
        let mut report = ApplyReport::default();

        for fix in fixes {
            match self.apply(tree, fix).await {
                Ok(outcome) => {
                    tracing::info!(file = %fix.file, action = %fix.action, issue = %fix.issue_id, "Applied fix");
                    report.applied.push(AppliedFix {
                        fix: fix.clone(),
                        outcome,
                    });
                }
                Err(warning) => {
                    tracing::warn!(file = %fix.file, issue = %fix.issue_id, reason = %warning, "Skipping fix");
                    report.skipped.push(SkippedFix {
                        fix: fix.clone(),
                        warning,
                    });
                }
            }
        }

        report
    }

    pub async fn apply(&self, tree: &mut dyn SourceTree, fix: &CodeFix) -> Result<FixOutcome, PipelineWarning> {
        let path = fix.file.trim();
        if !is_safe_relative(path) {
            return Err(PipelineWarning::UnsafePath {
                path: fix.file.clone(),
            });
        }
        if let Some(zone) = self.danger_zone_for(path) {
            return Err(PipelineWarning::DangerZone {
                path: path.to_string(),
                zone: zone.to_string(),
            });
        }

        match fix.action {
            FixAction::Create => {
                let content = fix
                    .content
                    .as_deref()
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| invalid(path, "create requires non-empty content"))?;
                tree.write(path, content)
                    .await
                    .map_err(|e| invalid(path, &format!("{:#}", e)))?;
                Ok(FixOutcome::Created)
            }
            FixAction::Modify => {
                let search = fix
                    .search
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| invalid(path, "modify requires a search string"))?;
                let replace = fix
                    .replace
                    .as_deref()
                    .ok_or_else(|| invalid(path, "modify requires a replacement"))?;

                if !tree.exists(path).await {
                    return Err(PipelineWarning::MutationTargetMissing {
                        path: path.to_string(),
                    });
                }
                let current = tree
                    .read_to_string(path)
                    .await
                    .map_err(|e| PipelineWarning::FileUnreadable {
                        path: path.to_string(),
                        reason: format!("{:#}", e),
                    })?;

                // Exact match only, the first occurrence
                if !current.contains(search) {
                    return Err(PipelineWarning::MutationAnchorNotFound {
                        path: path.to_string(),
                    });
                }
                let updated = current.replacen(search, replace, 1);
                tree.write(path, &updated)
                    .await
                    .map_err(|e| invalid(path, &format!("{:#}", e)))?;
                Ok(FixOutcome::Modified)
            }
            FixAction::Delete => {
                if !tree.exists(path).await {
                    return Ok(FixOutcome::AlreadyAbsent);
                }
                tree.remove(path)
                    .await
                    .map_err(|e| invalid(path, &format!("{:#}", e)))?;
                Ok(FixOutcome::Deleted)
            }
        }
    }

    fn danger_zone_for(&self, path: &str) -> Option<&str> {
        let path = path.trim_start_matches("./");
        self.danger_zones
            .iter()
            .map(|zone| zone.trim_end_matches('/'))
            .find(|zone| path == *zone || path.starts_with(&format!("{}/", zone)))
    }
}

fn invalid(path: &str, reason: &str) -> PipelineWarning {
    PipelineWarning::InvalidFix {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
