//! One discovery pass: pagination, dedup against the cache, per-chapter
//! resolution and tracking, rate-limit interleaving.

use crate::cursor::paginate;
use crate::error::{ErrorKind, Result};
use crate::event::{WatchEvent, log_event};
use crate::ratelimit::RateLimiter;
use crate::settings::FetchSettings;
use crate::track::Tracker;
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use mdwatch_cache::{CachedPair, Repository};
use mdwatch_feed::{Feed, FeedChapter, PageLocations};
use std::collections::HashMap;
use time::UtcDateTime;
use tokio_util::sync::CancellationToken;

/// How far back the first pass looks when the cache is empty.
const DEFAULT_LOOKBACK: time::Duration = time::Duration::hours(4);

pub(crate) const NO_SERIES: &str = "no series relationship on chapter";
pub(crate) const EXTERNAL_SKIPPED: &str = "external URL detected, skipping";
pub(crate) const NO_PAGES: &str = "no pages found for chapter";

/// Run one full discovery pass.
///
/// This is the engine's public entry point: it walks the feed from the
/// cache's watermark, processes every page, logs each event, counts
/// requests against the rate-limit budgets, and interleaves the pauses
/// those budgets demand. The stream ends when the feed is exhausted, an
/// infrastructure error is yielded, or `cancel` fires.
pub fn latest<'a, F>(
    feed: &'a F,
    repo: &'a Repository,
    settings: &'a FetchSettings,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = Result<WatchEvent>> + 'a
where
    F: Feed + ?Sized,
{
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let mut limiter = RateLimiter::new(settings);
        for await event in discover(feed, repo, settings, cancel) {
            if let Ok(evt) = &event {
                log_event(evt);
                limiter.record(evt);
            }
            yield event;
            if cancel.is_cancelled() {
                return;
            }
            for await pause in limiter.check_and_wait(cancel) {
                log_event(&pause);
                yield Ok(pause);
            }
        }
    })
}

/// The un-throttled pass: watermark, pagination, page processing.
fn discover<'a, F>(
    feed: &'a F,
    repo: &'a Repository,
    settings: &'a FetchSettings,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = Result<WatchEvent>> + 'a
where
    F: Feed + ?Sized,
{
    stream!({
        if cancel.is_cancelled() {
            return;
        }

        let since = match repo.last_watermark().await.or_raise(|| ErrorKind::Cache) {
            Ok(Some(watermark)) => watermark,
            Ok(None) => UtcDateTime::now() - DEFAULT_LOOKBACK,
            Err(e) => {
                yield Err(e);
                return;
            },
        };

        for await event in paginate(feed, settings, since, cancel) {
            match event {
                Ok(WatchEvent::Page(chapters)) => {
                    yield Ok(WatchEvent::Page(chapters.clone()));
                    for await evt in process_page(feed, repo, settings, chapters, cancel) {
                        yield evt;
                    }
                },
                other => yield other,
            }
        }
    })
}

/// Process one page of chapters: a single batch existence lookup, then the
/// per-chapter state machine.
fn process_page<'a, F>(
    feed: &'a F,
    repo: &'a Repository,
    settings: &'a FetchSettings,
    chapters: Vec<FeedChapter>,
    cancel: &'a CancellationToken,
) -> impl Stream<Item = Result<WatchEvent>> + 'a
where
    F: Feed + ?Sized,
{
    stream!({
        let ids: Vec<String> = chapters.iter().map(|c| c.id.clone()).collect();
        let existing: HashMap<String, CachedPair> =
            match repo.find_by_source_ids(&ids).await.or_raise(|| ErrorKind::Cache) {
                Ok(pairs) => {
                    pairs.into_iter().map(|pair| (pair.chapter.source_id.clone(), pair)).collect()
                },
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };

        for chapter in chapters {
            if cancel.is_cancelled() {
                return;
            }
            for await event in process_chapter(feed, repo, settings, chapter, &existing) {
                if cancel.is_cancelled() {
                    return;
                }
                yield event;
            }
        }
    })
}

/// The per-chapter state machine.
///
/// In order: a chapter with no resolved series relation errors out; a
/// cached chapter is skipped silently unless reindexing; an external
/// chapter is either rejected by policy or tracked with no pages; anything
/// left gets its page locations fetched and is tracked.
fn process_chapter<'a, F>(
    feed: &'a F,
    repo: &'a Repository,
    settings: &'a FetchSettings,
    chapter: FeedChapter,
    existing: &'a HashMap<String, CachedPair>,
) -> impl Stream<Item = Result<WatchEvent>> + 'a
where
    F: Feed + ?Sized,
{
    stream!({
        let series = chapter.series.as_ref().and_then(|stub| stub.detail.clone());
        let Some(series) = series else {
            yield Ok(WatchEvent::Error { message: NO_SERIES, cause: None, chapter: Some(chapter) });
            return;
        };

        // Already cached: nothing to say unless a reindex was asked for.
        if existing.contains_key(&chapter.id) && !settings.reindex {
            return;
        }

        let tracker = Tracker::new(repo);
        if chapter.is_external() {
            if !settings.include_external {
                yield Ok(WatchEvent::Error {
                    message: EXTERNAL_SKIPPED,
                    cause: None,
                    chapter: Some(chapter),
                });
                return;
            }
            // Tracked for completeness, but there are no pages to resolve.
            match tracker.track(&chapter, &series, PageLocations::default()).await {
                Ok(fetched) => yield Ok(WatchEvent::Fetched(Box::new(fetched))),
                Err(e) => yield Err(e),
            }
            return;
        }

        let locations = feed.pages(&chapter.id).await;
        yield Ok(WatchEvent::PageRequest { chapter_id: chapter.id.clone() });
        match locations {
            Err(cause) => {
                yield Ok(WatchEvent::Error {
                    message: NO_PAGES,
                    cause: Some(cause),
                    chapter: Some(chapter),
                });
            },
            Ok(locations) if locations.is_empty() => {
                yield Ok(WatchEvent::Error {
                    message: NO_PAGES,
                    cause: None,
                    chapter: Some(chapter),
                });
            },
            Ok(locations) => match tracker.track(&chapter, &series, locations).await {
                Ok(fetched) => yield Ok(WatchEvent::Fetched(Box::new(fetched))),
                Err(e) => yield Err(e),
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MockFeed, feed_chapter, feed_series, page_locations, unlimited_settings,
    };
    use futures::StreamExt;
    use mdwatch_cache::Database;

    async fn run_pass(feed: &MockFeed, repo: &Repository, settings: &FetchSettings) -> Vec<WatchEvent> {
        let cancel = CancellationToken::new();
        let stream = latest(feed, repo, settings, &cancel);
        futures::pin_mut!(stream);
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event.unwrap());
        }
        events
    }

    fn single_chapter_feed() -> MockFeed {
        MockFeed {
            total: 1,
            chapters: vec![feed_chapter("chap-1", Some("series-a"))],
            series: vec![feed_series("series-a")],
            pages: [("chap-1".to_string(), page_locations(3))].into(),
            ..MockFeed::default()
        }
    }

    async fn fresh_repo() -> Repository {
        Repository::from(&Database::connect_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_new_chapter_is_fetched_and_tracked() {
        let feed = single_chapter_feed();
        let repo = fresh_repo().await;
        let events = run_pass(&feed, &repo, &unlimited_settings()).await;

        let fetched: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                WatchEvent::Fetched(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].chapter.id, "chap-1");
        assert_eq!(fetched[0].pages.len(), 3);
        assert!(events.iter().any(|e| matches!(e, WatchEvent::PageRequest { .. })));

        // The row is really there.
        let pairs = repo.find_by_source_ids(&["chap-1".to_string()]).await.unwrap();
        assert_eq!(pairs.len(), 1);
    }

    #[tokio::test]
    async fn test_cached_chapter_is_skipped_silently() {
        let feed = single_chapter_feed();
        let repo = fresh_repo().await;
        run_pass(&feed, &repo, &unlimited_settings()).await;

        // Second pass sees the same chapter already cached: no Fetched, no
        // Error, no page request.
        let before = feed.calls.lock().unwrap().len();
        let events = run_pass(&feed, &repo, &unlimited_settings()).await;
        assert!(!events.iter().any(|e| matches!(e, WatchEvent::Fetched(_))));
        assert!(!events.iter().any(|e| matches!(e, WatchEvent::Error { .. })));
        assert!(!events.iter().any(|e| matches!(e, WatchEvent::PageRequest { .. })));
        let pages_calls =
            feed.calls.lock().unwrap()[before..].iter().filter(|c| **c == "pages").count();
        assert_eq!(pages_calls, 0);
    }

    #[tokio::test]
    async fn test_reindex_processes_cached_chapters_again() {
        let feed = single_chapter_feed();
        let repo = fresh_repo().await;
        run_pass(&feed, &repo, &unlimited_settings()).await;

        let settings = FetchSettings { reindex: true, ..unlimited_settings() };
        let events = run_pass(&feed, &repo, &settings).await;
        assert!(events.iter().any(|e| matches!(e, WatchEvent::Fetched(_))));
    }

    #[tokio::test]
    async fn test_chapter_without_series_relation_errors() {
        let feed = MockFeed {
            total: 1,
            chapters: vec![feed_chapter("chap-1", None)],
            ..MockFeed::default()
        };
        let repo = fresh_repo().await;
        let events = run_pass(&feed, &repo, &unlimited_settings()).await;
        assert!(events.iter().any(
            |e| matches!(e, WatchEvent::Error { message, .. } if *message == NO_SERIES)
        ));
        assert!(!events.iter().any(|e| matches!(e, WatchEvent::Fetched(_))));
    }

    #[tokio::test]
    async fn test_external_chapter_rejected_by_default() {
        let mut external = feed_chapter("chap-1", Some("series-a"));
        external.external_url = Some("https://example.org/read".to_string());
        let feed = MockFeed {
            total: 1,
            chapters: vec![external],
            series: vec![feed_series("series-a")],
            ..MockFeed::default()
        };
        let repo = fresh_repo().await;
        let events = run_pass(&feed, &repo, &unlimited_settings()).await;

        // Exactly one error, and no page request was ever made for it.
        let errors: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, WatchEvent::Error { message, .. } if *message == EXTERNAL_SKIPPED))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(!events.iter().any(|e| matches!(e, WatchEvent::PageRequest { .. })));
    }

    #[tokio::test]
    async fn test_external_chapter_tracked_with_empty_pages_when_included() {
        let mut external = feed_chapter("chap-1", Some("series-a"));
        external.external_url = Some("https://example.org/read".to_string());
        let feed = MockFeed {
            total: 1,
            chapters: vec![external],
            series: vec![feed_series("series-a")],
            ..MockFeed::default()
        };
        let repo = fresh_repo().await;
        let settings = FetchSettings { include_external: true, ..unlimited_settings() };
        let events = run_pass(&feed, &repo, &settings).await;

        let fetched: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                WatchEvent::Fetched(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(fetched.len(), 1);
        assert!(fetched[0].pages.is_empty());
        assert!(!events.iter().any(|e| matches!(e, WatchEvent::PageRequest { .. })));
    }

    #[tokio::test]
    async fn test_chapter_without_pages_errors_after_page_request() {
        // No entry in `pages`, so the mock answers 404.
        let feed = MockFeed {
            total: 1,
            chapters: vec![feed_chapter("chap-1", Some("series-a"))],
            series: vec![feed_series("series-a")],
            ..MockFeed::default()
        };
        let repo = fresh_repo().await;
        let events = run_pass(&feed, &repo, &unlimited_settings()).await;

        assert!(events.iter().any(|e| matches!(e, WatchEvent::PageRequest { .. })));
        assert!(events.iter().any(
            |e| matches!(e, WatchEvent::Error { message, cause: Some(_), .. } if *message == NO_PAGES)
        ));
        assert!(!events.iter().any(|e| matches!(e, WatchEvent::Fetched(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_pairs_interleave_after_threshold() {
        let feed = single_chapter_feed();
        let repo = fresh_repo().await;
        let settings = FetchSettings {
            general_requests: crate::settings::RateLimit::new(1, std::time::Duration::ZERO),
            ..unlimited_settings()
        };
        let events = run_pass(&feed, &repo, &settings).await;

        let mut depth = 0i32;
        let mut pairs = 0;
        for event in &events {
            match event {
                WatchEvent::RatelimitStart => {
                    depth += 1;
                    assert_eq!(depth, 1, "rate limit pauses must not nest");
                },
                WatchEvent::RatelimitStop => {
                    depth -= 1;
                    pairs += 1;
                },
                _ => {},
            }
        }
        assert_eq!(depth, 0);
        assert!(pairs >= 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_pass_yields_nothing() {
        let feed = single_chapter_feed();
        let repo = fresh_repo().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let settings = unlimited_settings();
        let stream = latest(&feed, &repo, &settings, &cancel);
        futures::pin_mut!(stream);
        assert!(stream.next().await.is_none());
        assert!(feed.calls.lock().unwrap().is_empty());
    }
}
