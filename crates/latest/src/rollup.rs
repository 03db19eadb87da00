//! Rolls the event stream up into batches bounded by rate-limit pauses.

use crate::error::Result;
use crate::event::{FetchedChapter, WatchEvent};
use async_stream::stream;
use futures::Stream;
use tokio_util::sync::CancellationToken;

/// Collect the [`WatchEvent::Fetched`] payloads of `events` into batches.
///
/// A batch is everything fetched since the previous rate-limit pause: when
/// a `RatelimitStart` goes by and the buffer is non-empty, the buffer is
/// flushed as one batch (the boundary event itself belongs to no batch).
/// Whatever remains at end-of-stream is flushed last. Empty batches are
/// never yielded, order within a batch is arrival order, and stream-level
/// errors pass straight through. Cancellation discards the buffer.
pub fn rollup<S>(
    events: S,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Vec<FetchedChapter>>>
where
    S: Stream<Item = Result<WatchEvent>>,
{
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let mut buffer: Vec<FetchedChapter> = Vec::new();
        for await event in events {
            if cancel.is_cancelled() {
                return;
            }
            match event {
                Ok(WatchEvent::RatelimitStart) if !buffer.is_empty() => {
                    yield Ok(std::mem::take(&mut buffer));
                },
                Ok(WatchEvent::Fetched(fetched)) => buffer.push(*fetched),
                Ok(_) => {},
                Err(e) => yield Err(e),
            }
        }
        // Cancellation may land between the last event and end-of-stream;
        // the buffer is still discarded then, not flushed.
        if !cancel.is_cancelled() && !buffer.is_empty() {
            yield Ok(buffer);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{feed_chapter, feed_series};
    use futures::StreamExt;
    use mdwatch_cache::{CachedPair, ChapterRecord, ChapterState, SeriesRecord};
    use time::UtcDateTime;

    fn fetched(id: &str) -> WatchEvent {
        let chapter = feed_chapter(id, Some("series-a"));
        let series = feed_series("series-a");
        let pair = CachedPair {
            series: SeriesRecord {
                id: 1,
                hash_id: "mangadex-series-series-a".to_string(),
                title: series.title.clone(),
                source_id: series.id.clone(),
                provider: "mangadex".to_string(),
                url: String::new(),
                cover: String::new(),
                description: String::new(),
                alt_titles: vec![],
                tags: vec![],
                nsfw: false,
                created_at: UtcDateTime::now(),
                updated_at: UtcDateTime::now(),
                deleted_at: None,
            },
            chapter: ChapterRecord {
                id: 1,
                series_id: 1,
                title: String::new(),
                url: String::new(),
                source_id: id.to_string(),
                ordinal: 1.0,
                volume: None,
                language: "en".to_string(),
                pages: vec![],
                external_url: None,
                state: ChapterState::NotIndexed,
                created_at: UtcDateTime::now(),
                updated_at: UtcDateTime::now(),
                deleted_at: None,
            },
        };
        WatchEvent::Fetched(Box::new(FetchedChapter {
            chapter,
            series,
            pages: vec![],
            data_saver: vec![],
            cache: pair,
        }))
    }

    async fn collect(events: Vec<Result<WatchEvent>>) -> Vec<Result<Vec<FetchedChapter>>> {
        rollup(futures::stream::iter(events), CancellationToken::new()).collect().await
    }

    fn ids(batch: &[FetchedChapter]) -> Vec<&str> {
        batch.iter().map(|f| f.chapter.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_flushes_on_rate_limit_boundary() {
        let batches = collect(vec![
            Ok(fetched("chap-1")),
            Ok(fetched("chap-2")),
            Ok(WatchEvent::RatelimitStart),
            Ok(WatchEvent::RatelimitStop),
            Ok(fetched("chap-3")),
        ])
        .await;
        let batches: Vec<_> = batches.into_iter().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(ids(&batches[0]), vec!["chap-1", "chap-2"]);
        assert_eq!(ids(&batches[1]), vec!["chap-3"]);
    }

    #[tokio::test]
    async fn test_boundary_with_empty_buffer_produces_nothing() {
        let batches = collect(vec![
            Ok(WatchEvent::RatelimitStart),
            Ok(WatchEvent::RatelimitStop),
            Ok(WatchEvent::GeneralRequest { scope: "latest", endpoint: "chapters" }),
        ])
        .await;
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_non_entry_events_are_transparent() {
        let batches = collect(vec![
            Ok(WatchEvent::Page(vec![])),
            Ok(fetched("chap-1")),
            Ok(WatchEvent::PageRequest { chapter_id: "chap-2".to_string() }),
            Ok(WatchEvent::Error { message: "no pages found for chapter", cause: None, chapter: None }),
            Ok(fetched("chap-3")),
        ])
        .await;
        let batches: Vec<_> = batches.into_iter().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(ids(&batches[0]), vec!["chap-1", "chap-3"]);
    }

    fn cache_error() -> Result<WatchEvent> {
        exn::bail!(ErrorKind::Cache)
    }

    #[tokio::test]
    async fn test_stream_errors_are_forwarded() {
        let results =
            collect(vec![Ok(fetched("chap-1")), cache_error(), Ok(fetched("chap-2"))]).await;
        assert!(results[0].is_err());
        assert_eq!(ids(results[1].as_ref().unwrap()), vec!["chap-1", "chap-2"]);
    }

    #[tokio::test]
    async fn test_cancellation_discards_the_buffer() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events = futures::stream::iter(vec![Ok(fetched("chap-1")), Ok(fetched("chap-2"))]);
        let batches: Vec<_> = rollup(events, cancel).collect().await;
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_after_the_last_event_suppresses_the_final_flush() {
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        let events = stream!({
            yield Ok(fetched("chap-1"));
            canceller.cancel();
        });
        let batches: Vec<_> = rollup(events, cancel).collect().await;
        assert!(batches.is_empty());
    }
}
