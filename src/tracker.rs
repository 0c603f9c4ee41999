//! Change records and before/after impact measurement.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{PipelineWarning, TrackerError};
use crate::metrics::{MetricsSource, fetch_days};
use crate::models::{
    Change, ChangeType, CodeFix, DailyMetrics, GLOBAL_SCOPE, IssueType, MeasuredImpact, SeoIssue,
};

/// Longest accepted dwell time, about ten years
pub const MAX_DWELL_DAYS: i64 = 3650;
/// Longest accepted before/after window
pub const MAX_WINDOW_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub min_dwell_days: i64,
    pub days_before: u32,
    pub days_after: u32,
    pub fetch_concurrency: usize,
}

impl TrackerConfig {
    /// Pull every day count into its supported range
    pub fn clamped(self) -> Self {
        Self {
            min_dwell_days: self.min_dwell_days.clamp(0, MAX_DWELL_DAYS),
            days_before: self.days_before.clamp(1, MAX_WINDOW_DAYS),
            days_after: self.days_after.clamp(1, MAX_WINDOW_DAYS),
            fetch_concurrency: self.fetch_concurrency.max(1),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_dwell_days: 14,
            days_before: 7,
            days_after: 7,
            fetch_concurrency: 4,
        }
    }
}

/// Before and after day ranges around a change, both inclusive. The day of
/// the change and one cooldown day on each side belong to neither window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementWindows {
    pub before_start: NaiveDate,
    pub before_end: NaiveDate,
    pub after_start: NaiveDate,
    pub after_end: NaiveDate,
}

impl MeasurementWindows {
    pub fn around(timestamp: DateTime<Utc>, days_before: u32, days_after: u32) -> Self {
        let day = timestamp.date_naive();
        let days_before = days_before.min(MAX_WINDOW_DAYS);
        let days_after = days_after.min(MAX_WINDOW_DAYS);
        Self {
            before_start: day - Duration::days(1 + i64::from(days_before)),
            before_end: day - Duration::days(2),
            after_start: day + Duration::days(2),
            after_end: day + Duration::days(1 + i64::from(days_after)),
        }
    }

    pub fn before_dates(&self) -> Vec<NaiveDate> {
        dates_between(self.before_start, self.before_end)
    }

    pub fn after_dates(&self) -> Vec<NaiveDate> {
        dates_between(self.after_start, self.after_end)
    }

    pub fn in_before(&self, date: NaiveDate) -> bool {
        date >= self.before_start && date <= self.before_end
    }

    pub fn in_after(&self, date: NaiveDate) -> bool {
        date >= self.after_start && date <= self.after_end
    }
}

fn dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Mean daily clicks for one window. Only pages whose URL contains an
/// affected page count; when none of them appear, the site-wide total is used.
pub fn window_clicks(affected_pages: &[String], days: &[DailyMetrics]) -> f64 {
    if days.is_empty() {
        return 0.0;
    }

    let is_affected = |page: &str| affected_pages.iter().any(|affected| page.contains(affected.as_str()));
    let any_match = days
        .iter()
        .any(|day| day.pages.iter().any(|p| is_affected(&p.page)));

    let total: f64 = if any_match {
        days.iter()
            .flat_map(|day| day.pages.iter())
            .filter(|p| is_affected(&p.page))
            .map(|p| p.clicks)
            .sum()
    } else {
        days.iter().map(|day| day.total_clicks).sum()
    };

    total / days.len() as f64
}

pub fn compute_impact(
    affected_pages: &[String],
    before: &[DailyMetrics],
    after: &[DailyMetrics],
    days_after: u32,
) -> MeasuredImpact {
    MeasuredImpact {
        clicks_before: window_clicks(affected_pages, before),
        clicks_after: window_clicks(affected_pages, after),
        measurement_period: days_after,
    }
}

/// Persistence for change records
#[async_trait]
pub trait ChangeStore: Send + Sync {
    async fn insert(&self, change: Change) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Change>>;

    /// Every change, in insertion order
    async fn all(&self) -> Result<Vec<Change>>;

    /// Set the impact once. A change that already has one is left untouched.
    async fn set_measured_impact(&self, id: &str, impact: MeasuredImpact) -> Result<(), TrackerError>;
}

fn set_impact(changes: &mut [Change], id: &str, impact: MeasuredImpact) -> Result<(), TrackerError> {
    let change = changes
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
    if change.measured_impact.is_some() {
        return Err(TrackerError::AlreadyMeasured(id.to_string()));
    }
    change.measured_impact = Some(impact);
    Ok(())
}

fn ensure_unique(changes: &[Change], change: &Change) -> Result<()> {
    if changes.iter().any(|c| c.id == change.id) {
        bail!("change {} already recorded", change.id);
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryChangeStore {
    changes: Mutex<Vec<Change>>,
}

impl MemoryChangeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChangeStore for MemoryChangeStore {
    async fn insert(&self, change: Change) -> Result<()> {
        let mut changes = self.changes.lock().await;
        ensure_unique(&changes, &change)?;
        changes.push(change);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Change>> {
        Ok(self.changes.lock().await.iter().find(|c| c.id == id).cloned())
    }

    async fn all(&self) -> Result<Vec<Change>> {
        Ok(self.changes.lock().await.clone())
    }

    async fn set_measured_impact(&self, id: &str, impact: MeasuredImpact) -> Result<(), TrackerError> {
        set_impact(&mut self.changes.lock().await, id, impact)
    }
}

/// Changes kept as a pretty-printed JSON array in one file
#[derive(Debug)]
pub struct JsonFileChangeStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileChangeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Change>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read change store: {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse change store: {}", self.path.display()))
    }

    async fn save(&self, changes: &[Change]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(changes).context("Failed to serialize changes")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write change store: {}", self.path.display()))
    }
}

#[async_trait]
impl ChangeStore for JsonFileChangeStore {
    async fn insert(&self, change: Change) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut changes = self.load().await?;
        ensure_unique(&changes, &change)?;
        changes.push(change);
        self.save(&changes).await
    }

    async fn get(&self, id: &str) -> Result<Option<Change>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|c| c.id == id))
    }

    async fn all(&self) -> Result<Vec<Change>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn set_measured_impact(&self, id: &str, impact: MeasuredImpact) -> Result<(), TrackerError> {
        let _guard = self.lock.lock().await;
        let mut changes = self.load().await.map_err(TrackerError::Store)?;
        set_impact(&mut changes, id, impact)?;
        self.save(&changes).await.map_err(TrackerError::Store)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MeasurementState {
    Measured,
    Pending { ready_at: DateTime<Utc> },
    Eligible,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasuredChange {
    pub change_id: String,
    pub file: String,
    pub impact: MeasuredImpact,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedMeasurement {
    pub change_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub measured: Vec<MeasuredChange>,
    /// Changes still inside their dwell time
    pub deferred: Vec<PipelineWarning>,
    pub failed: Vec<FailedMeasurement>,
}

pub struct ChangeTracker<S: ChangeStore> {
    store: S,
    config: TrackerConfig,
}

impl<S: ChangeStore> ChangeTracker<S> {
    pub fn new(store: S, config: TrackerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub async fn record(&self, change: Change) -> Result<Change> {
        self.store.insert(change.clone()).await?;
        tracing::info!(change_id = %change.id, file = %change.file, "Recorded change");
        Ok(change)
    }

    /// Record an applied fix. The change type and affected page come from
    /// the issue id (`<type>:<scope>`), or from `issue` when given.
    pub async fn record_fix(
        &self,
        repo_id: &str,
        fix: &CodeFix,
        issue: Option<&SeoIssue>,
        commit_sha: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Change> {
        let (type_part, scope) = fix
            .issue_id
            .split_once(':')
            .unwrap_or((fix.issue_id.as_str(), GLOBAL_SCOPE));

        let issue_type = issue
            .map(|i| i.issue_type.clone())
            .unwrap_or_else(|| IssueType::from(type_part));
        let change_type = ChangeType::from_issue_type(&issue_type);

        let affected_page = match issue {
            Some(issue) => issue.page.clone(),
            None if scope != GLOBAL_SCOPE && scope.starts_with('/') => Some(scope.to_string()),
            None => None,
        };

        let change = Change {
            id: Uuid::new_v4().to_string(),
            repo_id: repo_id.to_string(),
            timestamp,
            change_type,
            file: fix.file.clone(),
            description: fix.description.clone(),
            commit_sha: commit_sha.to_string(),
            affected_pages: affected_page.into_iter().collect(),
            expected_impact: change_type.expected_impact().to_string(),
            measured_impact: None,
        };

        self.record(change).await
    }

    /// Saturates at the maximum timestamp instead of overflowing
    pub fn ready_at(&self, change: &Change) -> DateTime<Utc> {
        Duration::try_days(self.config.min_dwell_days)
            .and_then(|dwell| change.timestamp.checked_add_signed(dwell))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn state(&self, change: &Change, now: DateTime<Utc>) -> MeasurementState {
        if change.measured_impact.is_some() {
            return MeasurementState::Measured;
        }
        let ready_at = self.ready_at(change);
        if now < ready_at {
            MeasurementState::Pending { ready_at }
        } else {
            MeasurementState::Eligible
        }
    }

    /// Measure one change. Never re-measures: an existing impact is an error.
    pub async fn measure(
        &self,
        id: &str,
        source: &dyn MetricsSource,
        now: DateTime<Utc>,
    ) -> Result<MeasuredImpact, TrackerError> {
        let change = self
            .store
            .get(id)
            .await
            .map_err(TrackerError::Store)?
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;

        match self.state(&change, now) {
            MeasurementState::Measured => return Err(TrackerError::AlreadyMeasured(change.id)),
            MeasurementState::Pending { ready_at } => {
                return Err(TrackerError::NotEligible {
                    change_id: change.id,
                    ready_at,
                });
            }
            MeasurementState::Eligible => {}
        }

        let windows = MeasurementWindows::around(change.timestamp, self.config.days_before, self.config.days_after);
        let dates: Vec<NaiveDate> = windows
            .before_dates()
            .into_iter()
            .chain(windows.after_dates())
            .collect();

        let fetched = fetch_days(source, &change.repo_id, &dates, self.config.fetch_concurrency).await;
        // A partial window would be stored for good, so wait for the next sweep
        if let Some(first) = fetched.unavailable.first() {
            return Err(TrackerError::Metrics(anyhow!(
                "metrics unavailable for {} of {} days ({}), leaving change unmeasured",
                fetched.unavailable.len(),
                dates.len(),
                first
            )));
        }
        if fetched.days.is_empty() {
            return Err(TrackerError::Metrics(anyhow!(
                "no metrics available between {} and {}",
                windows.before_start,
                windows.after_end
            )));
        }

        let (before, after): (Vec<DailyMetrics>, Vec<DailyMetrics>) = fetched
            .days
            .into_iter()
            .filter(|day| windows.in_before(day.date) || windows.in_after(day.date))
            .partition(|day| windows.in_before(day.date));

        let impact = compute_impact(&change.affected_pages, &before, &after, self.config.days_after);
        self.store.set_measured_impact(&change.id, impact.clone()).await?;

        tracing::info!(
            change_id = %change.id,
            clicks_before = impact.clicks_before,
            clicks_after = impact.clicks_after,
            "Measured change impact"
        );

        Ok(impact)
    }

    /// Measure every unmeasured change past its dwell time. Younger changes
    /// are deferred, not failed.
    pub async fn sweep(&self, source: &dyn MetricsSource, now: DateTime<Utc>) -> Result<SweepReport> {
        let changes = self.store.all().await?;
        let mut report = SweepReport::default();

        for change in changes {
            match self.state(&change, now) {
                MeasurementState::Measured => continue,
                MeasurementState::Pending { ready_at } => {
                    tracing::debug!(change_id = %change.id, ready_at = %ready_at, "Change not yet eligible");
                    report.deferred.push(PipelineWarning::MeasurementNotEligible {
                        change_id: change.id,
                        ready_at,
                    });
                }
                MeasurementState::Eligible => match self.measure(&change.id, source, now).await {
                    Ok(impact) => report.measured.push(MeasuredChange {
                        change_id: change.id,
                        file: change.file,
                        impact,
                    }),
                    Err(e) => {
                        tracing::warn!(change_id = %change.id, error = %e, "Failed to measure change");
                        report.failed.push(FailedMeasurement {
                            change_id: change.id,
                            reason: e.to_string(),
                        });
                    }
                },
            }
        }

        Ok(report)
    }
}
