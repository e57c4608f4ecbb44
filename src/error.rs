// src/error.rs
//! Error taxonomy shared by the normalizer, validator, admission controller
//! and the fetch orchestrator.

use std::time::Duration;
use thiserror::Error;

/// Raised by the timestamp normalizer when no rule recognizes the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("unable to parse date: {0}")]
    FormatUnrecognized(String),
}

/// Why a single raw entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("empty headline")]
    EmptyHeadline,

    #[error("headline exceeds maximum length ({len} > {max})")]
    HeadlineTooLong { len: usize, max: usize },

    #[error("missing publication date")]
    MissingPublishDate,

    #[error("publication date format is invalid: {0}")]
    InvalidDateFormat(#[source] TimestampError),

    #[error("publication date exceeds maximum age")]
    TooOld,

    #[error("publication date is in the future beyond allowed tolerance")]
    FuturePublication,
}

impl ValidationError {
    /// A systemic failure invalidates the rest of the batch, not just the entry.
    ///
    /// Only an unrecognized date format qualifies: sibling entries of the same
    /// feed are assumed to share the format, so continuing would only repeat
    /// the failure. This is a heuristic and can drop valid siblings.
    pub fn is_systemic(&self) -> bool {
        matches!(self, ValidationError::InvalidDateFormat(_))
    }

    /// Stable label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::InvalidUrl(_) => "invalid_url",
            ValidationError::EmptyHeadline => "empty_headline",
            ValidationError::HeadlineTooLong { .. } => "headline_too_long",
            ValidationError::MissingPublishDate => "missing_publish_date",
            ValidationError::InvalidDateFormat(_) => "invalid_date_format",
            ValidationError::TooOld => "too_old",
            ValidationError::FuturePublication => "future_publication",
        }
    }
}

/// Failure while waiting for an origin's admission token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("invalid url for rate limiting: {0}")]
    InvalidUrl(String),

    #[error("admission wait canceled")]
    Canceled,

    #[error("admission wait would exceed the caller deadline")]
    DeadlineExceeded,
}

/// Errors reported by a [`crate::source::FeedSource`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("retrieval timed out")]
    Timeout,

    #[error("retrieval canceled")]
    Canceled,

    #[error("network error: {0}")]
    Network(String),

    #[error("feed format error: {0}")]
    Format(String),
}

/// Error surfaced by [`crate::FeedFetcher::fetch_and_process`] for a whole batch.
///
/// Timeout, cancellation and content/transport failures are distinct so a
/// caller can decide between retrying, giving up, or treating the feed as
/// broken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid feed url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("feed fetch canceled for {url}")]
    Canceled { url: String },

    #[error("timed out after {timeout:?} fetching feed {url}")]
    DeadlineExceeded { url: String, timeout: Duration },

    #[error("failed to retrieve feed {url}: {source}")]
    RetrievalFailed {
        url: String,
        #[source]
        source: RetrievalError,
    },

    #[error(transparent)]
    InvalidDateFormat(TimestampError),
}

impl FetchError {
    /// Only a timeout is worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::DeadlineExceeded { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, FetchError::Canceled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_date_format_is_systemic() {
        let fmt = ValidationError::InvalidDateFormat(TimestampError::FormatUnrecognized(
            "yesterday-ish".into(),
        ));
        assert!(fmt.is_systemic());
        assert!(!ValidationError::EmptyHeadline.is_systemic());
        assert!(!ValidationError::TooOld.is_systemic());
        assert!(!ValidationError::MissingPublishDate.is_systemic());
    }

    #[test]
    fn timeout_is_the_only_retryable_fetch_error() {
        let timeout = FetchError::DeadlineExceeded {
            url: "https://example.com/rss".into(),
            timeout: Duration::from_secs(10),
        };
        let canceled = FetchError::Canceled {
            url: "https://example.com/rss".into(),
        };
        assert!(timeout.is_retryable());
        assert!(!canceled.is_retryable());
        assert!(canceled.is_canceled());
    }
}
