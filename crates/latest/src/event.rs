//! The tagged event protocol a discovery pass speaks.
//!
//! A pass produces one lazy, finite, single-consumer stream of
//! `Result<WatchEvent>`. `Ok` items narrate progress; `Err` items are
//! reserved for infrastructure failures (cache, feed transport) and
//! terminate the pass. Anything recoverable at the level of one chapter is
//! an [`WatchEvent::Error`] entry, not a stream error.

use mdwatch_cache::CachedPair;
use mdwatch_feed::{FeedChapter, FeedSeries};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

/// A chapter that has been fully resolved and written to the cache during
/// this pass: the feed's view of it, its page image URLs, and the cache
/// rows tracking gave it. This is what rides the notification bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedChapter {
    pub chapter: FeedChapter,
    pub series: FeedSeries,
    /// Full-resolution page URLs; empty for externally hosted chapters.
    pub pages: Vec<String>,
    /// Reduced-quality page URLs; empty for externally hosted chapters.
    pub data_saver: Vec<String>,
    pub cache: CachedPair,
}

/// The bus payload: everything tracked between two rate-limit boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterBatch {
    #[serde(with = "unix_ts")]
    pub timestamp: UtcDateTime,
    pub chapters: Vec<FetchedChapter>,
}

impl ChapterBatch {
    pub fn new(chapters: Vec<FetchedChapter>) -> Self {
        Self { timestamp: UtcDateTime::now(), chapters }
    }
}

/// One entry in a discovery pass's event stream.
///
/// `RatelimitStart`/`RatelimitStop` always arrive as a non-interleaving
/// pair bracketing a pause, except that cancellation during the pause ends
/// the stream without the `RatelimitStop`. Consumers must tolerate variants
/// they don't know about.
#[derive(Debug)]
#[non_exhaustive]
pub enum WatchEvent {
    /// One page of the chapter listing, newest first, covers enriched.
    Page(Vec<FeedChapter>),
    /// A chapter was resolved and written to the cache.
    Fetched(Box<FetchedChapter>),
    /// A rate-limit pause has begun.
    RatelimitStart,
    /// The rate-limit pause has ended; counters have been reset.
    RatelimitStop,
    /// A page-location request was made (counted against the heavy budget).
    PageRequest { chapter_id: String },
    /// A listing or series request was made (counted against the light budget).
    GeneralRequest { scope: &'static str, endpoint: &'static str },
    /// One chapter could not be processed; the pass continues.
    Error {
        message: &'static str,
        cause: Option<mdwatch_feed::error::Error>,
        chapter: Option<FeedChapter>,
    },
}

/// Log a single event. Logging is the caller's concern, not the protocol's;
/// the engine calls this once per event before yielding it.
pub fn log_event(event: &WatchEvent) {
    match event {
        WatchEvent::Page(chapters) => {
            tracing::debug!(count = chapters.len(), "received a page of chapters");
        },
        WatchEvent::Fetched(fetched) => {
            tracing::info!(
                chapter = %fetched.chapter.id,
                series = %fetched.series.title,
                pages = fetched.pages.len(),
                "tracked chapter",
            );
        },
        WatchEvent::RatelimitStart => tracing::info!("rate limit reached, pausing"),
        WatchEvent::RatelimitStop => tracing::info!("rate limit pause over"),
        WatchEvent::PageRequest { chapter_id } => {
            tracing::debug!(chapter = %chapter_id, "requested page locations");
        },
        WatchEvent::GeneralRequest { scope, endpoint } => {
            tracing::debug!(scope, endpoint, "issued feed request");
        },
        WatchEvent::Error { message, cause, chapter } => {
            let chapter_id = chapter.as_ref().map_or("-", |c| c.id.as_str());
            match cause {
                Some(cause) => tracing::warn!(chapter = chapter_id, cause = %cause, "{message}"),
                None => tracing::warn!(chapter = chapter_id, "{message}"),
            }
        },
    }
}

mod unix_ts {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::UtcDateTime;

    pub(super) fn serialize<S: Serializer>(ts: &UtcDateTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_i64(ts.unix_timestamp())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<UtcDateTime, D::Error> {
        let seconds = i64::deserialize(de)?;
        UtcDateTime::from_unix_timestamp(seconds).map_err(serde::de::Error::custom)
    }
}
