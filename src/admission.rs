// src/admission.rs
//! Per-origin admission control: one token bucket per normalized hostname.
//!
//! The registry only grows. Its lock is held for the map lookup or insert,
//! never while a caller waits for a token; each bucket has its own mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use crate::config::AdmissionConfig;
use crate::context::CallContext;
use crate::error::AdmissionError;

/// Token bucket holding up to `burst` tokens, refilled continuously at `rate`
/// tokens per second.
///
/// Waiters reserve a token up front (the balance may go negative) and sleep
/// until their slot, so grants are handed out in arrival order and nobody
/// starves.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    /// A non-positive or non-finite `rate_per_sec` disables throttling;
    /// `burst` is at least one.
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate: rate_per_sec,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }

    fn unlimited(&self) -> bool {
        !(self.rate.is_finite() && self.rate > 0.0)
    }

    fn refill(&self, st: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(st.last).as_secs_f64();
        st.tokens = (st.tokens + elapsed * self.rate).min(self.burst);
        st.last = now;
    }

    /// Take a token now if one is banked, without reserving a future one.
    pub fn try_acquire(&self) -> bool {
        if self.unlimited() {
            return true;
        }
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut st, Instant::now());
        if st.tokens >= 1.0 {
            st.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Reserve a token and return how long the caller has to wait for it.
    /// `None` when the wait does not fit in a `Duration` (vanishingly small rates).
    fn reserve(&self, now: Instant) -> Option<Duration> {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut st, now);
        st.tokens -= 1.0;
        if st.tokens >= 0.0 {
            Some(Duration::ZERO)
        } else {
            Duration::try_from_secs_f64(-st.tokens / self.rate).ok()
        }
    }

    fn release(&self) {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut st, Instant::now());
        st.tokens = (st.tokens + 1.0).min(self.burst);
    }

    /// Wait for a token, honoring the caller's cancellation and deadline.
    ///
    /// Cancellation wins over a token that becomes available at the same
    /// moment. A wait that cannot finish before the deadline fails at once.
    pub async fn acquire(&self, ctx: &CallContext) -> Result<(), AdmissionError> {
        if ctx.is_canceled() {
            return Err(AdmissionError::Canceled);
        }
        if self.unlimited() {
            return Ok(());
        }

        let now = Instant::now();
        let wait = self.reserve(now);
        if wait == Some(Duration::ZERO) {
            return Ok(());
        }
        // None: the slot lies beyond anything an Instant can express
        let wake = wait.and_then(|w| now.checked_add(w));

        if let Some(deadline) = ctx.deadline() {
            if wake.map_or(true, |w| w > deadline) {
                self.release();
                return Err(AdmissionError::DeadlineExceeded);
            }
        }

        let Some(wake) = wake else {
            ctx.cancelled().await;
            self.release();
            return Err(AdmissionError::Canceled);
        };

        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                self.release();
                Err(AdmissionError::Canceled)
            }
            _ = tokio::time::sleep_until(wake) => Ok(()),
        }
    }
}

/// Hostname-keyed registry of token buckets shared by all fetchers built
/// from the same controller.
#[derive(Debug)]
pub struct DomainAdmission {
    config: AdmissionConfig,
    buckets: RwLock<HashMap<String, Arc<TokenBucket>>>,
}

impl DomainAdmission {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Number of distinct origins seen so far.
    pub fn tracked_origins(&self) -> usize {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn bucket(&self, host: &str) -> Arc<TokenBucket> {
        if let Some(b) = self
            .buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
        {
            return Arc::clone(b);
        }

        let mut map = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have inserted between the two locks.
        let bucket = map.entry(host.to_string()).or_insert_with(|| {
            tracing::debug!(target: "feed_fetcher::admission", host, "new origin bucket");
            Arc::new(TokenBucket::new(self.config.rate_per_sec, self.config.burst))
        });
        Arc::clone(bucket)
    }

    /// Block until `url`'s origin may be contacted again.
    pub async fn wait_for_origin(&self, url: &str, ctx: &CallContext) -> Result<(), AdmissionError> {
        let host = origin_key(url)?;
        self.bucket(&host).acquire(ctx).await
    }
}

impl Default for DomainAdmission {
    fn default() -> Self {
        Self::new(AdmissionConfig::default())
    }
}

/// Admission key for `url`: its hostname with one leading `www.` removed.
pub fn origin_key(url: &str) -> Result<String, AdmissionError> {
    let parsed = Url::parse(url.trim()).map_err(|e| AdmissionError::InvalidUrl(format!("{url}: {e}")))?;
    let host = parsed.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        return Err(AdmissionError::InvalidUrl(format!("empty host in url: {url}")));
    }
    Ok(host.to_string())
}
