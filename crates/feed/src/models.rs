use serde::{Deserialize, Serialize};
use time::UtcDateTime;

/// Filter for one page of the chapter listing.
///
/// Ordering is always descending by update time; the engine relies on
/// newest-first pages and never re-sorts.
#[derive(Debug, Clone)]
pub struct ChapterFilter {
    /// Only chapters updated at or after this instant are returned.
    pub updated_since: UtcDateTime,
    /// Page size.
    pub limit: u32,
    /// Offset into the full result set.
    pub offset: u32,
    /// Translated languages to include; empty means all languages.
    pub languages: Vec<String>,
    /// Whether to include chapters hosted off-site.
    pub include_external: bool,
}

/// One page of the chapter listing.
#[derive(Debug, Clone)]
pub struct ChapterPage {
    pub items: Vec<FeedChapter>,
    /// Total number of chapters matching the filter across all pages.
    pub total: u32,
    pub offset: u32,
    pub limit: u32,
}

/// A chapter as served by the feed. Read-only input to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedChapter {
    pub id: String,
    pub title: Option<String>,
    /// Volume label, e.g. `"2"`. Not always numeric on the wire.
    pub volume: Option<String>,
    /// Chapter label, e.g. `"12.5"`. Not always numeric on the wire.
    pub chapter: Option<String>,
    /// Translated language tag, e.g. `"en"`.
    pub language: String,
    /// Set when the chapter is hosted off-site; such chapters have no pages
    /// on the feed itself.
    pub external_url: Option<String>,
    /// The series this chapter belongs to, if the feed provided a relation.
    pub series: Option<SeriesStub>,
}

/// Reference from a chapter to its series, with detail attached lazily.
///
/// The chapter listing only carries the series id; the cover enricher fills
/// in `detail` with one bulk lookup per page. A stub whose detail is still
/// `None` after enrichment simply didn't resolve; that is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStub {
    pub id: String,
    pub detail: Option<FeedSeries>,
}

/// Series detail as served by the feed, flattened from the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSeries {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Resolved cover image URL, empty when the feed has no cover art.
    pub cover: String,
    pub alt_titles: Vec<String>,
    pub tags: Vec<String>,
    pub nsfw: bool,
}

/// Page image locations for one chapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLocations {
    /// Full-resolution image URLs, in reading order.
    pub pages: Vec<String>,
    /// Reduced-quality image URLs, in reading order.
    pub data_saver: Vec<String>,
}

impl PageLocations {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl FeedChapter {
    /// The chapter ordinal parsed as a number, when the label allows it.
    pub fn ordinal(&self) -> Option<f64> {
        self.chapter.as_deref().and_then(|c| c.parse().ok())
    }

    /// The volume parsed as a number, when the label allows it.
    pub fn volume_number(&self) -> Option<f64> {
        self.volume.as_deref().and_then(|v| v.parse().ok())
    }

    /// Whether the chapter is hosted off-site.
    pub fn is_external(&self) -> bool {
        self.external_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}
