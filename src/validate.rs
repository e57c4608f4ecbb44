// src/validate.rs
//! Per-entry checks turning a [`RawEntry`] into an [`AcceptedItem`].
//!
//! Order matters and short-circuits: link, publication date (presence,
//! format, freshness window), headline, body. Every check is a free function
//! so it can be exercised on its own.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::config::FetchConfig;
use crate::dates::normalize_timestamp;
use crate::error::ValidationError;
use crate::source::RawEntry;

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// A validated feed item. Only the validator constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedItem {
    feed_url: String,
    url: String,
    headline: String,
    body: String,
    published_at: DateTime<Utc>,
}

impl AcceptedItem {
    /// The feed this item came from.
    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Absolute item link.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headline(&self) -> &str {
        &self.headline
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

/// Resolve an entry link against the feed URL. Relative links become absolute.
pub fn resolve_url(base: &Url, raw: &str) -> Result<Url, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::InvalidUrl("empty link".into()));
    }
    base.join(raw)
        .map_err(|e| ValidationError::InvalidUrl(format!("{raw}: {e}")))
}

/// Collapse whitespace runs, trim, and cap the length in code points.
pub fn sanitize_headline(raw: &str, max_len: usize) -> Result<String, ValidationError> {
    let headline = WS_RE.replace_all(raw, " ");
    let headline = headline.trim();
    if headline.is_empty() {
        return Err(ValidationError::EmptyHeadline);
    }
    let len = headline.chars().count();
    if len > max_len {
        return Err(ValidationError::HeadlineTooLong { len, max: max_len });
    }
    Ok(headline.to_string())
}

/// Resolve the entry's publication instant and check it against the
/// freshness window around `now`.
///
/// A successful parse of `published_raw` is cached in `published_parsed`;
/// a failed one leaves the entry untouched.
pub fn resolve_published_at(
    entry: &mut RawEntry,
    max_age: Duration,
    future_tolerance: Duration,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ValidationError> {
    let published = match entry.published_parsed {
        Some(ts) => ts,
        None => {
            if entry.published_raw.trim().is_empty() {
                return Err(ValidationError::MissingPublishDate);
            }
            let ts = normalize_timestamp(&entry.published_raw)
                .map_err(ValidationError::InvalidDateFormat)?;
            entry.published_parsed = Some(ts);
            ts
        }
    };

    if published - now > to_chrono(future_tolerance) {
        return Err(ValidationError::FuturePublication);
    }
    if now - published > to_chrono(max_age) {
        return Err(ValidationError::TooOld);
    }
    Ok(published)
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Trimmed description, else trimmed content. May be empty.
pub fn extract_body(entry: &RawEntry) -> String {
    let description = entry.description.trim();
    if !description.is_empty() {
        return description.to_string();
    }
    entry.content.trim().to_string()
}

/// Run every check against `entry` with an explicit clock.
pub fn validate_entry(
    feed_url: &Url,
    entry: &mut RawEntry,
    config: &FetchConfig,
    now: DateTime<Utc>,
) -> Result<AcceptedItem, ValidationError> {
    let url = resolve_url(feed_url, &entry.link)?;
    let published_at = resolve_published_at(
        entry,
        config.max_age(),
        config.future_drift_tolerance(),
        now,
    )?;
    let headline = sanitize_headline(&entry.title, config.max_heading_length())?;
    let body = extract_body(entry);

    Ok(AcceptedItem {
        feed_url: feed_url.to_string(),
        url: url.into(),
        headline,
        body,
        published_at,
    })
}

/// [`validate_entry`] against the current wall clock.
pub fn validate(
    feed_url: &Url,
    entry: &mut RawEntry,
    config: &FetchConfig,
) -> Result<AcceptedItem, ValidationError> {
    validate_entry(feed_url, entry, config, Utc::now())
}
