// src/source/http.rs
//! Default [`FeedSource`]: plain HTTP GET plus RSS 2.0 / Atom decoding.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use url::Url;

use crate::error::RetrievalError;
use crate::source::types::{FeedSource, RawEntry, RawFeed};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    content_encoded: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    title: Option<AtomText>,
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(default)]
    link: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Atom text constructs carry a `type` attribute next to their text.
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

impl AtomEntry {
    fn alternate_link(&self) -> Option<&str> {
        let alternate = self
            .link
            .iter()
            .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"));
        alternate
            .or_else(|| self.link.first())
            .and_then(|l| l.href.as_deref())
    }
}

/// Recognize standard RFC 2822 / RFC 3339 stamps up front; anything else is
/// left to the timestamp normalizer.
fn parse_standard_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn text(v: Option<String>) -> String {
    v.unwrap_or_default()
}

fn atom_text(v: Option<AtomText>) -> String {
    v.map(|t| t.value).unwrap_or_default()
}

impl From<Item> for RawEntry {
    fn from(it: Item) -> Self {
        let published_raw = it.pub_date.or(it.dc_date).unwrap_or_default();
        RawEntry {
            link: text(it.link),
            title: text(it.title),
            description: text(it.description),
            content: text(it.content_encoded),
            published_parsed: parse_standard_date(&published_raw),
            published_raw,
        }
    }
}

impl From<AtomEntry> for RawEntry {
    fn from(e: AtomEntry) -> Self {
        let link = e.alternate_link().unwrap_or_default().to_string();
        let published_raw = e.published.or(e.updated).unwrap_or_default();
        RawEntry {
            link,
            title: atom_text(e.title),
            description: atom_text(e.summary),
            content: atom_text(e.content),
            published_parsed: parse_standard_date(&published_raw),
            published_raw,
        }
    }
}

/// Decode an RSS 2.0 or Atom document.
pub fn parse_feed(xml: &str) -> Result<RawFeed, RetrievalError> {
    let xml = scrub_html_entities_for_xml(xml);

    if let Ok(rss) = from_str::<Rss>(&xml) {
        return Ok(RawFeed {
            title: rss.channel.title,
            items: rss.channel.item.into_iter().map(RawEntry::from).collect(),
        });
    }

    match from_str::<AtomFeed>(&xml) {
        Ok(atom) if atom.title.is_some() || !atom.entry.is_empty() => Ok(RawFeed {
            title: atom.title.map(|t| t.value),
            items: atom.entry.into_iter().map(RawEntry::from).collect(),
        }),
        Ok(_) => Err(RetrievalError::Format("document is neither RSS nor Atom".into())),
        Err(e) => Err(RetrievalError::Format(e.to_string())),
    }
}

/// HTML entities that feeds routinely leak into XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[derive(Debug, Clone, Default)]
pub struct HttpFeedSource {
    client: reqwest::Client,
}

impl HttpFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse a preconfigured client (proxies, TLS roots, pools).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(e: reqwest::Error) -> RetrievalError {
    if e.is_timeout() {
        RetrievalError::Timeout
    } else {
        RetrievalError::Network(e.to_string())
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn retrieve(&self, url: &Url, user_agent: &str) -> Result<RawFeed, RetrievalError> {
        let resp = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(target: "feed_fetcher::fetch", url = %url, %status, "non-success status");
            return Err(RetrievalError::Network(format!("http status {status}")));
        }

        let body = resp.text().await.map_err(classify)?;
        parse_feed(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
