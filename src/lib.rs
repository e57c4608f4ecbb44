// src/lib.rs
// Public library surface for integration tests and the demo binary.

pub mod admission;
pub mod config;
pub mod context;
pub mod dates;
pub mod error;
pub mod fetcher;
pub mod source;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::admission::{origin_key, DomainAdmission, TokenBucket};
pub use crate::config::{AdmissionConfig, FetchConfig};
pub use crate::context::CallContext;
pub use crate::dates::{normalize_timestamp, normalize_timestamp_on, parse_timestamp, ParsedTimestamp};
pub use crate::error::{AdmissionError, FetchError, RetrievalError, TimestampError, ValidationError};
pub use crate::fetcher::FeedFetcher;
pub use crate::source::{parse_feed, FeedSource, HttpFeedSource, RawEntry, RawFeed};
pub use crate::validate::AcceptedItem;
