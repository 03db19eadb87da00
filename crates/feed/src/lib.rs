//! MangaDex feed client.
//!
//! This crate defines the [`Feed`] contract the discovery engine pulls
//! chapters through, the domain models that cross it, and an HTTP
//! implementation ([`HttpFeed`]) speaking the MangaDex REST API.
//!
//! The engine never sees the wire format: the `wire` module maps the API's
//! localized-string soup into the flat models here.

mod client;
pub mod error;
mod models;
mod wire;

pub use crate::client::HttpFeed;
pub use crate::models::{ChapterFilter, ChapterPage, FeedChapter, FeedSeries, PageLocations, SeriesStub};

use crate::error::Result;
use async_trait::async_trait;

/// Where chapter and series URLs point when none is given by the feed.
pub const HOME_URL: &str = "https://mangadex.org";
/// Provider tag stored on every cache row written from this feed.
pub const PROVIDER: &str = "mangadex";
/// Preferred language for titles, descriptions and tag names.
pub const DEFAULT_LANGUAGE: &str = "en";

/// The paginated chapter feed the watcher discovers new chapters from.
///
/// Implementations must be cheap to call repeatedly; the engine performs its
/// own rate limiting and will interleave calls with cooperative delays.
#[async_trait]
pub trait Feed: Send + Sync {
    /// Fetch one page of chapters matching `filter`, newest first.
    async fn chapters(&self, filter: &ChapterFilter) -> Result<ChapterPage>;

    /// Bulk-fetch series detail for the given series ids.
    ///
    /// Ids unknown to the feed are simply absent from the result.
    async fn series(&self, ids: &[String]) -> Result<Vec<FeedSeries>>;

    /// Resolve the page image locations for a single chapter.
    async fn pages(&self, chapter_id: &str) -> Result<PageLocations>;
}
