// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "FEED_FETCHER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/fetcher.toml";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; ReddotWatchBot/1.0; +https://reddot.watch/bot)";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_ITEMS: usize = 1000;
pub const DEFAULT_MAX_HEADING_LENGTH: usize = 250;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 3600);
pub const DEFAULT_FUTURE_DRIFT_TOLERANCE: Duration = Duration::from_secs(24 * 3600);

/// Per-origin token bucket settings: `rate_per_sec` refill, `burst` banked tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionConfig {
    pub rate_per_sec: f64,
    pub burst: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        // 1 req/sec per origin with a burst of 3
        Self {
            rate_per_sec: 1.0,
            burst: 3,
        }
    }
}

/// Immutable fetch settings. Every `with_*` consumes the value and hands back
/// a modified copy; clone first to keep the original around.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    user_agent: String,
    request_timeout: Duration,
    max_items: usize,
    max_heading_length: usize,
    max_age: Duration,
    future_drift_tolerance: Duration,
    admission: AdmissionConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_items: DEFAULT_MAX_ITEMS,
            max_heading_length: DEFAULT_MAX_HEADING_LENGTH,
            max_age: DEFAULT_MAX_AGE,
            future_drift_tolerance: DEFAULT_FUTURE_DRIFT_TOLERANCE,
            admission: AdmissionConfig::default(),
        }
    }
}

impl FetchConfig {
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Batch cap; 0 means unbounded.
    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Headline cap in Unicode code points.
    pub fn max_heading_length(&self) -> usize {
        self.max_heading_length
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn future_drift_tolerance(&self) -> Duration {
        self.future_drift_tolerance
    }

    pub fn admission(&self) -> AdmissionConfig {
        self.admission
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Zero or a negative value fetches every available item.
    #[must_use]
    pub fn with_max_items(mut self, max_items: i64) -> Self {
        self.max_items = usize::try_from(max_items).unwrap_or(0);
        self
    }

    #[must_use]
    pub fn with_max_heading_length(mut self, length: usize) -> Self {
        self.max_heading_length = length;
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    #[must_use]
    pub fn with_future_drift_tolerance(mut self, tolerance: Duration) -> Self {
        self.future_drift_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_admission(mut self, admission: AdmissionConfig) -> Self {
        self.admission = admission;
        self
    }

    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(s).context("parsing fetcher config toml")?;
        Ok(file.into_config())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading fetcher config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration using env var + fallbacks:
    /// 1) $FEED_FETCHER_CONFIG
    /// 2) config/fetcher.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default())
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    user_agent: Option<String>,
    request_timeout_secs: Option<f64>,
    max_items: Option<i64>,
    max_heading_length: Option<i64>,
    max_age_secs: Option<u64>,
    future_drift_tolerance_secs: Option<u64>,
    admission: Option<FileAdmission>,
}

#[derive(Debug, Default, Deserialize)]
struct FileAdmission {
    rate_per_sec: Option<f64>,
    burst: Option<u32>,
}

impl FileConfig {
    fn into_config(self) -> FetchConfig {
        let mut cfg = FetchConfig::default();
        if let Some(ua) = self.user_agent.filter(|s| !s.trim().is_empty()) {
            cfg = cfg.with_user_agent(ua.trim());
        }
        if let Some(timeout) = self
            .request_timeout_secs
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
        {
            cfg = cfg.with_request_timeout(timeout);
        }
        if let Some(n) = self.max_items {
            cfg = cfg.with_max_items(n);
        }
        // non-positive lengths would reject every headline
        if let Some(n) = self.max_heading_length.and_then(|n| usize::try_from(n).ok()) {
            if n > 0 {
                cfg = cfg.with_max_heading_length(n);
            }
        }
        if let Some(secs) = self.max_age_secs {
            cfg = cfg.with_max_age(Duration::from_secs(secs));
        }
        if let Some(secs) = self.future_drift_tolerance_secs {
            cfg = cfg.with_future_drift_tolerance(Duration::from_secs(secs));
        }
        if let Some(adm) = self.admission {
            let base = AdmissionConfig::default();
            cfg = cfg.with_admission(AdmissionConfig {
                rate_per_sec: adm.rate_per_sec.unwrap_or(base.rate_per_sec),
                burst: adm.burst.unwrap_or(base.burst),
            });
        }
        cfg
    }
}
