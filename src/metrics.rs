//! Daily search-traffic metrics, fetched per day from an external source.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed};
use reqwest::StatusCode;
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::path::Path;
use url::Url;

use crate::error::PipelineWarning;
use crate::http_client::build_http_client;
use crate::models::DailyMetrics;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// `Ok(None)` when the source has no data for that day
    async fn daily_metrics(&self, repo_id: &str, date: NaiveDate) -> Result<Option<DailyMetrics>>;
}

/// `GET <base>/<repo_id>/<YYYY-MM-DD>` returning one [`DailyMetrics`] as JSON
pub struct HttpMetricsSource {
    client: reqwest::Client,
    base_url: Url,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl HttpMetricsSource {
    pub fn new(base_url: &str, requests_per_second: Option<f64>) -> Result<Self> {
        let base_url = Url::parse(base_url).context("Invalid metrics URL")?;

        match base_url.scheme() {
            "http" | "https" => {}
            scheme => bail!(
                "Invalid URL scheme '{}': only http and https are supported",
                scheme
            ),
        }

        let rate_limiter = requests_per_second
            .and_then(|rps| NonZeroU32::new(rps.ceil().max(0.0) as u32))
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            client: build_http_client(30)?,
            base_url,
            rate_limiter,
        })
    }

    fn endpoint(&self, repo_id: &str, date: NaiveDate) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Metrics URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .push(repo_id)
            .push(&date.format("%Y-%m-%d").to_string());
        Ok(url)
    }
}

#[async_trait]
impl MetricsSource for HttpMetricsSource {
    async fn daily_metrics(&self, repo_id: &str, date: NaiveDate) -> Result<Option<DailyMetrics>> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let url = self.endpoint(repo_id, date)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let metrics = response
            .error_for_status()
            .with_context(|| format!("Metrics endpoint {} returned an error", url))?
            .json::<DailyMetrics>()
            .await
            .with_context(|| format!("Invalid metrics payload from {}", url))?;

        Ok(Some(metrics))
    }
}

/// Metrics held in memory, keyed by date. Ignores the repository id.
#[derive(Debug, Clone, Default)]
pub struct StaticMetricsSource {
    days: BTreeMap<NaiveDate, DailyMetrics>,
}

impl StaticMetricsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metrics: DailyMetrics) {
        self.days.insert(metrics.date, metrics);
    }

    /// Load a JSON array of [`DailyMetrics`]
    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read metrics file: {}", path.display()))?;
        let days: Vec<DailyMetrics> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse metrics file: {}", path.display()))?;
        Ok(days.into_iter().collect())
    }
}

impl FromIterator<DailyMetrics> for StaticMetricsSource {
    fn from_iter<I: IntoIterator<Item = DailyMetrics>>(iter: I) -> Self {
        Self {
            days: iter.into_iter().map(|m| (m.date, m)).collect(),
        }
    }
}

#[async_trait]
impl MetricsSource for StaticMetricsSource {
    async fn daily_metrics(&self, _repo_id: &str, date: NaiveDate) -> Result<Option<DailyMetrics>> {
        Ok(self.days.get(&date).cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchedMetrics {
    /// Sorted by date
    pub days: Vec<DailyMetrics>,
    /// Days that failed to load
    pub unavailable: Vec<PipelineWarning>,
}

/// Fetch several days concurrently. Failed days are logged and dropped;
/// days the source has no data for are dropped silently.
pub async fn fetch_days(
    source: &dyn MetricsSource,
    repo_id: &str,
    dates: &[NaiveDate],
    concurrency: usize,
) -> FetchedMetrics {
    let results = stream::iter(dates.iter().copied())
        .map(|date| async move { (date, source.daily_metrics(repo_id, date).await) })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut fetched = FetchedMetrics::default();
    for (date, result) in results {
        match result {
            Ok(Some(metrics)) => fetched.days.push(metrics),
            Ok(None) => tracing::debug!(repo_id = %repo_id, date = %date, "No metrics for day"),
            Err(e) => {
                tracing::warn!(repo_id = %repo_id, date = %date, error = %e, "Failed to fetch metrics");
                fetched.unavailable.push(PipelineWarning::MetricsUnavailable {
                    date: date.to_string(),
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    fetched.days.sort_by_key(|m| m.date);
    fetched
}
