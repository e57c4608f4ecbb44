// src/source/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::error::RetrievalError;

/// One decoded feed entry, as handed over by a [`FeedSource`].
///
/// Absent fields are empty strings. `published_parsed` is filled when the
/// source already recognized a standard date; the validator also caches its
/// own successful parse here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub link: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub published_raw: String,
    pub published_parsed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeed {
    pub title: Option<String>,
    pub items: Vec<RawEntry>,
}

/// Retrieval + decoding collaborator used by the fetcher.
///
/// Implementations only report *what* went wrong; the fetcher enforces the
/// request deadline and the caller's cancellation around `retrieve`.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn retrieve(&self, url: &Url, user_agent: &str) -> Result<RawFeed, RetrievalError>;
    fn name(&self) -> &'static str;
}
