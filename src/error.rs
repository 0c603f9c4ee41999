//! Error and warning types shared across the pipeline.
//!
//! `PipelineWarning` covers everything that skips a single unit of work (one
//! file, one fix, one change) while the surrounding run keeps going. Callers
//! get these back alongside partial results instead of an early return.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::FrameworkType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    #[error("framework detection is ambiguous, continuing as {framework}")]
    DetectionAmbiguous { framework: FrameworkType },

    #[error("could not read {path}: {reason}")]
    FileUnreadable { path: String, reason: String },

    #[error("target file {path} does not exist")]
    MutationTargetMissing { path: String },

    #[error("search text not found in {path}, the file may have changed")]
    MutationAnchorNotFound { path: String },

    #[error("invalid fix for {path}: {reason}")]
    InvalidFix { path: String, reason: String },

    #[error("refusing to write outside the working tree: {path}")]
    UnsafePath { path: String },

    #[error("{path} is inside a protected zone ({zone})")]
    DangerZone { path: String, zone: String },

    #[error("supplemental analysis failed: {reason}")]
    SupplementalAnalysisFailed { reason: String },

    #[error("change {change_id} cannot be measured before {ready_at}")]
    MeasurementNotEligible {
        change_id: String,
        ready_at: DateTime<Utc>,
    },

    #[error("no metrics for {date}: {reason}")]
    MetricsUnavailable { date: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("change {0} not found")]
    NotFound(String),

    #[error("change {0} already has a measured impact")]
    AlreadyMeasured(String),

    #[error("change {change_id} is not eligible for measurement until {ready_at}")]
    NotEligible {
        change_id: String,
        ready_at: DateTime<Utc>,
    },

    #[error("change store error: {0}")]
    Store(anyhow::Error),

    #[error("metrics error: {0}")]
    Metrics(anyhow::Error),
}
