// tests/fetch_pipeline.rs
//! End-to-end orchestration against an in-memory feed source.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use feed_fetcher::{
    AdmissionConfig, CallContext, DomainAdmission, FeedFetcher, FeedSource, FetchConfig, FetchError, RawEntry,
    RawFeed, RetrievalError, TimestampError,
};
use tokio::time::Instant;
use url::Url;

/// Serves a fixed entry list and counts calls; optionally stalls first.
struct StaticSource {
    items: Vec<RawEntry>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticSource {
    fn new(items: Vec<RawEntry>) -> Self {
        Self {
            items,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn stalled(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    async fn retrieve(&self, _url: &Url, _user_agent: &str) -> Result<RawFeed, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        Ok(RawFeed {
            title: Some("synthetic".into()),
            items: self.items.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Entry published `hours_ago` hours before now, with an RFC 2822 raw date
/// so the normalizer is exercised.
fn entry(title: &str, link: &str, hours_ago: i64) -> RawEntry {
    let published = Utc::now() - chrono::Duration::hours(hours_ago);
    RawEntry {
        link: link.into(),
        title: title.into(),
        description: format!("about {title}"),
        published_raw: published.to_rfc2822(),
        ..Default::default()
    }
}

fn unthrottled() -> AdmissionConfig {
    AdmissionConfig {
        rate_per_sec: 0.0,
        burst: 1,
    }
}

fn fetcher(items: Vec<RawEntry>) -> FeedFetcher {
    FeedFetcher::new(FetchConfig::default().with_admission(unthrottled()), StaticSource::new(items))
}

const FEED: &str = "https://news.example.com/feed";

#[tokio::test]
async fn date_format_failure_aborts_the_whole_batch() {
    let mut bad = entry("Second", "/two", 1);
    bad.published_raw = "the day after tomorrow".into();
    let items = vec![entry("First", "/one", 1), bad, entry("Third", "/three", 1)];

    let res = fetcher(items).fetch_and_process(FEED, &CallContext::new()).await;
    assert_eq!(
        res,
        Err(FetchError::InvalidDateFormat(TimestampError::FormatUnrecognized(
            "the day after tomorrow".into()
        )))
    );
}

#[tokio::test]
async fn entry_scoped_failures_are_skipped() {
    let items = vec![
        entry("Kept one", "/1", 1),
        entry("   ", "/2", 1),
        entry("Too old", "/3", 48),
        entry("Kept two", "/4", 2),
        entry("Kept three", "https://cdn.example.org/5", 3),
    ];

    let out = fetcher(items)
        .fetch_and_process(FEED, &CallContext::new())
        .await
        .unwrap();

    let headlines: Vec<_> = out.iter().map(|i| i.headline()).collect();
    assert_eq!(headlines, ["Kept one", "Kept two", "Kept three"]);
    assert_eq!(out[0].url(), "https://news.example.com/1");
    assert_eq!(out[2].url(), "https://cdn.example.org/5");
    assert!(out.iter().all(|i| i.feed_url() == FEED));
}

#[tokio::test]
async fn missing_link_future_and_missing_date_are_skipped() {
    let mut no_date = entry("No date", "/a", 1);
    no_date.published_raw.clear();
    let items = vec![
        entry("No link", "", 1),
        entry("From the future", "/b", -48),
        no_date,
        entry("Fine", "/c", 1),
    ];
    let out = fetcher(items)
        .fetch_and_process(FEED, &CallContext::new())
        .await
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].headline(), "Fine");
}

#[tokio::test]
async fn truncation_keeps_feed_order_and_hides_later_entries() {
    let mut bad = entry("Bad date", "/x", 1);
    bad.published_raw = "??".into();
    let items = vec![entry("A", "/a", 1), entry("B", "/b", 1), bad];

    let out = fetcher(items)
        .with_max_items(2)
        .fetch_and_process(FEED, &CallContext::new())
        .await
        .unwrap();
    let headlines: Vec<_> = out.iter().map(|i| i.headline()).collect();
    assert_eq!(headlines, ["A", "B"]);
}

#[tokio::test]
async fn headline_limit_comes_from_the_derived_fetcher() {
    let items = vec![entry("short", "/a", 1), entry("a much longer headline", "/b", 1)];
    let base = fetcher(items);
    let strict = base.with_max_heading_length(10);

    assert_eq!(base.fetch_and_process(FEED, &CallContext::new()).await.unwrap().len(), 2);
    assert_eq!(strict.fetch_and_process(FEED, &CallContext::new()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn pre_canceled_call_never_reaches_the_source() {
    let source = StaticSource::new(vec![entry("A", "/a", 1)]);
    let calls = Arc::clone(&source.calls);
    let f = FeedFetcher::new(FetchConfig::default().with_admission(unthrottled()), source);

    let ctx = CallContext::new();
    ctx.cancel();
    let err = f.fetch_and_process(FEED, &ctx).await.unwrap_err();
    assert_eq!(err, FetchError::Canceled { url: FEED.into() });
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_retrieval_is_not_a_timeout() {
    let f = FeedFetcher::new(
        FetchConfig::default().with_admission(unthrottled()),
        StaticSource::stalled(Duration::from_secs(5)),
    );
    let ctx = CallContext::new();
    let canceler = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceler.cancel();
    });

    let err = f.fetch_and_process(FEED, &ctx).await.unwrap_err();
    assert!(err.is_canceled());
    assert!(!err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn stalled_retrieval_times_out() {
    let f = FeedFetcher::new(
        FetchConfig::default()
            .with_admission(unthrottled())
            .with_request_timeout(Duration::from_secs(3)),
        StaticSource::stalled(Duration::from_secs(30)),
    );
    let start = Instant::now();
    let err = f.fetch_and_process(FEED, &CallContext::new()).await.unwrap_err();
    assert_eq!(
        err,
        FetchError::DeadlineExceeded {
            url: FEED.into(),
            timeout: Duration::from_secs(3),
        }
    );
    assert!(err.is_retryable());
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn derived_fetchers_share_admission() {
    let base = FeedFetcher::new(
        FetchConfig::default().with_admission(AdmissionConfig {
            rate_per_sec: 1.0,
            burst: 1,
        }),
        StaticSource::new(vec![entry("A", "/a", 1)]),
    );
    let other = base.with_component("second");

    let start = Instant::now();
    base.fetch_and_process(FEED, &CallContext::new()).await.unwrap();
    other.fetch_and_process(FEED, &CallContext::new()).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn independent_fetchers_can_share_one_registry() {
    let shared = Arc::new(DomainAdmission::new(AdmissionConfig {
        rate_per_sec: 1.0,
        burst: 1,
    }));
    let first = FeedFetcher::new(
        FetchConfig::default(),
        StaticSource::new(vec![entry("A", "/a", 1)]),
    )
    .with_shared_admission(Arc::clone(&shared));
    let second = FeedFetcher::new(
        FetchConfig::default(),
        StaticSource::new(vec![entry("B", "/b", 1)]),
    )
    .with_shared_admission(Arc::clone(&shared));
    assert!(Arc::ptr_eq(first.admission(), second.admission()));
    assert_eq!(second.config().admission().burst, 1);

    let start = Instant::now();
    first.fetch_and_process(FEED, &CallContext::new()).await.unwrap();
    second.fetch_and_process(FEED, &CallContext::new()).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(shared.tracked_origins(), 1);
}

#[tokio::test]
async fn invalid_feed_url_is_reported() {
    let err = fetcher(vec![])
        .fetch_and_process("not a url", &CallContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl { .. }));
}
