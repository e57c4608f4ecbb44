// src/fetcher.rs
//! Fetch orchestration: admission wait, bounded retrieval, per-entry
//! validation with batch-level failure policy.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tokio::time::Instant;
use tracing::Instrument;
use url::Url;

use crate::admission::DomainAdmission;
use crate::config::{AdmissionConfig, FetchConfig};
use crate::context::CallContext;
use crate::error::{AdmissionError, FetchError, RetrievalError, ValidationError};
use crate::source::{FeedSource, HttpFeedSource, RawFeed};
use crate::validate::{validate_entry, AcceptedItem};

pub const DEFAULT_COMPONENT: &str = "feed_fetcher";

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_fetch_total", "Feed fetch invocations.");
        describe_counter!(
            "feed_fetch_errors_total",
            "Feed fetches that ended in an error, by kind."
        );
        describe_counter!("feed_items_accepted_total", "Entries accepted by validation.");
        describe_counter!(
            "feed_items_skipped_total",
            "Entries dropped by entry-scoped validation failures, by reason."
        );
        describe_counter!(
            "feed_batch_aborted_total",
            "Batches abandoned because of an unrecognized date format."
        );
        describe_histogram!("feed_download_ms", "Feed retrieval time in milliseconds.");
        describe_histogram!(
            "feed_admission_wait_ms",
            "Time spent waiting for an origin token in milliseconds."
        );
    });
}

/// Fetches a feed and turns its entries into [`AcceptedItem`]s.
///
/// Cheap to clone. Every `with_*` returns a new fetcher with one setting
/// changed; the source and the admission registry stay shared.
#[derive(Clone)]
pub struct FeedFetcher {
    config: FetchConfig,
    source: Arc<dyn FeedSource>,
    admission: Arc<DomainAdmission>,
    component: String,
}

impl fmt::Debug for FeedFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedFetcher")
            .field("config", &self.config)
            .field("source", &self.source.name())
            .field("component", &self.component)
            .finish()
    }
}

impl FeedFetcher {
    pub fn new<S: FeedSource + 'static>(config: FetchConfig, source: S) -> Self {
        Self::from_shared(config, Arc::new(source))
    }

    pub fn from_shared(config: FetchConfig, source: Arc<dyn FeedSource>) -> Self {
        let admission = Arc::new(DomainAdmission::new(config.admission()));
        Self {
            config,
            source,
            admission,
            component: DEFAULT_COMPONENT.to_string(),
        }
    }

    pub fn with_defaults<S: FeedSource + 'static>(source: S) -> Self {
        Self::new(FetchConfig::default(), source)
    }

    /// Fetcher backed by [`HttpFeedSource`].
    pub fn http(config: FetchConfig) -> Self {
        Self::new(config, HttpFeedSource::new())
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn admission(&self) -> &Arc<DomainAdmission> {
        &self.admission
    }

    fn derive(&self, config: FetchConfig) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    /// Label attached to every event this fetcher emits.
    pub fn with_component(&self, component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..self.clone()
        }
    }

    pub fn with_user_agent(&self, user_agent: impl Into<String>) -> Self {
        self.derive(self.config.clone().with_user_agent(user_agent))
    }

    pub fn with_request_timeout(&self, timeout: Duration) -> Self {
        self.derive(self.config.clone().with_request_timeout(timeout))
    }

    pub fn with_max_items(&self, max_items: i64) -> Self {
        self.derive(self.config.clone().with_max_items(max_items))
    }

    pub fn with_max_heading_length(&self, length: usize) -> Self {
        self.derive(self.config.clone().with_max_heading_length(length))
    }

    pub fn with_max_age(&self, max_age: Duration) -> Self {
        self.derive(self.config.clone().with_max_age(max_age))
    }

    pub fn with_future_drift_tolerance(&self, tolerance: Duration) -> Self {
        self.derive(self.config.clone().with_future_drift_tolerance(tolerance))
    }

    /// New rate settings need their own registry; the old one keeps serving
    /// the fetchers that still hold it.
    pub fn with_admission(&self, admission: AdmissionConfig) -> Self {
        Self {
            config: self.config.clone().with_admission(admission),
            admission: Arc::new(DomainAdmission::new(admission)),
            ..self.clone()
        }
    }

    /// Share one admission registry between independently built fetchers.
    pub fn with_shared_admission(&self, admission: Arc<DomainAdmission>) -> Self {
        Self {
            config: self.config.clone().with_admission(*admission.config()),
            admission,
            ..self.clone()
        }
    }

    /// Fetch `feed_url` and return its accepted entries in feed order.
    ///
    /// Entry-scoped rejections are dropped silently. An unrecognized date
    /// format, a failed admission wait or a failed retrieval aborts the whole
    /// batch; no partial result is returned alongside an error.
    pub async fn fetch_and_process(
        &self,
        feed_url: &str,
        ctx: &CallContext,
    ) -> Result<Vec<AcceptedItem>, FetchError> {
        ensure_metrics_described();
        counter!("feed_fetch_total").increment(1);

        let span = tracing::info_span!(
            target: "feed_fetcher::fetch",
            "fetch_feed",
            component = %self.component,
            url = %feed_url
        );
        let res = self.run(feed_url, ctx).instrument(span).await;
        if let Err(e) = &res {
            counter!("feed_fetch_errors_total", "kind" => error_kind(e)).increment(1);
        }
        res
    }

    async fn run(&self, feed_url: &str, ctx: &CallContext) -> Result<Vec<AcceptedItem>, FetchError> {
        if ctx.is_canceled() {
            return Err(FetchError::Canceled {
                url: feed_url.to_string(),
            });
        }

        self.wait_for_admission(feed_url, ctx).await?;

        let parsed = Url::parse(feed_url.trim()).map_err(|e| FetchError::InvalidUrl {
            url: feed_url.to_string(),
            reason: e.to_string(),
        })?;

        let feed = self.download(feed_url, &parsed, ctx).await?;
        self.extract_items(&parsed, feed)
    }

    async fn wait_for_admission(&self, feed_url: &str, ctx: &CallContext) -> Result<(), FetchError> {
        let started = Instant::now();
        let res = self.admission.wait_for_origin(feed_url, ctx).await;
        histogram!("feed_admission_wait_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

        res.map_err(|e| {
            let url = feed_url.to_string();
            match e {
                AdmissionError::InvalidUrl(reason) => FetchError::InvalidUrl { url, reason },
                AdmissionError::Canceled => {
                    tracing::warn!(target: "feed_fetcher::admission", "admission wait canceled");
                    FetchError::Canceled { url }
                }
                AdmissionError::DeadlineExceeded => {
                    let timeout = ctx
                        .deadline()
                        .map(|d| d.saturating_duration_since(started))
                        .unwrap_or_default();
                    tracing::error!(target: "feed_fetcher::admission", "deadline exceeded before admission");
                    FetchError::DeadlineExceeded { url, timeout }
                }
            }
        })
    }

    async fn download(
        &self,
        feed_url: &str,
        parsed: &Url,
        ctx: &CallContext,
    ) -> Result<RawFeed, FetchError> {
        let started = Instant::now();
        let deadline = ctx.tighter_deadline(started + self.config.request_timeout());
        let budget = deadline.saturating_duration_since(started);

        tracing::debug!(target: "feed_fetcher::fetch", source = self.source.name(), "downloading feed");

        let retrieval = self.source.retrieve(parsed, self.config.user_agent());
        let result = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(RetrievalError::Canceled),
            r = tokio::time::timeout_at(deadline, retrieval) => r.unwrap_or(Err(RetrievalError::Timeout)),
        };

        let url = feed_url.to_string();
        match result {
            Ok(feed) => {
                let ms = started.elapsed().as_secs_f64() * 1_000.0;
                histogram!("feed_download_ms").record(ms);
                tracing::debug!(
                    target: "feed_fetcher::fetch",
                    duration_ms = ms,
                    items = feed.items.len(),
                    "feed downloaded successfully"
                );
                Ok(feed)
            }
            Err(RetrievalError::Timeout) => {
                tracing::error!(target: "feed_fetcher::fetch", timeout = ?budget, "deadline exceeded");
                Err(FetchError::DeadlineExceeded { url, timeout: budget })
            }
            Err(RetrievalError::Canceled) => {
                tracing::warn!(target: "feed_fetcher::fetch", "request was canceled");
                Err(FetchError::Canceled { url })
            }
            Err(source) => {
                tracing::error!(target: "feed_fetcher::fetch", error = %source, "failed to retrieve feed");
                Err(FetchError::RetrievalFailed { url, source })
            }
        }
    }

    fn extract_items(&self, feed_url: &Url, feed: RawFeed) -> Result<Vec<AcceptedItem>, FetchError> {
        let mut entries = feed.items;
        let max = self.config.max_items();
        if max > 0 {
            entries.truncate(max);
        }

        let now = Utc::now();
        let mut out = Vec::with_capacity(entries.len());
        for (index, mut entry) in entries.into_iter().enumerate() {
            match validate_entry(feed_url, &mut entry, &self.config, now) {
                Ok(item) => out.push(item),
                Err(ValidationError::InvalidDateFormat(e)) => {
                    // Siblings almost always share the format; the batch is dropped.
                    tracing::warn!(
                        target: "feed_fetcher::fetch",
                        index,
                        error = %e,
                        "unrecognized publication date format, aborting batch"
                    );
                    counter!("feed_batch_aborted_total").increment(1);
                    return Err(FetchError::InvalidDateFormat(e));
                }
                Err(e) => {
                    tracing::debug!(
                        target: "feed_fetcher::fetch",
                        index,
                        reason = e.kind(),
                        link = %entry.link,
                        "skipping entry"
                    );
                    counter!("feed_items_skipped_total", "reason" => e.kind()).increment(1);
                }
            }
        }

        counter!("feed_items_accepted_total").increment(out.len() as u64);
        Ok(out)
    }
}

fn error_kind(e: &FetchError) -> &'static str {
    match e {
        FetchError::InvalidUrl { .. } => "invalid_url",
        FetchError::Canceled { .. } => "canceled",
        FetchError::DeadlineExceeded { .. } => "deadline_exceeded",
        FetchError::RetrievalFailed { .. } => "retrieval_failed",
        FetchError::InvalidDateFormat(_) => "invalid_date_format",
    }
}
