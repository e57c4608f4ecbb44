// src/source/mod.rs
pub mod http;
pub mod types;

pub use http::{parse_feed, HttpFeedSource};
pub use types::{FeedSource, RawEntry, RawFeed};
