//! Wire format of the MangaDex REST API.
//!
//! Everything in here is `pub(crate)`: the rest of the workspace only ever
//! sees the flattened models in [`models`](crate::models). The API wraps
//! most human-readable fields in localized-string maps (language tag to
//! text); flattening prefers [`DEFAULT_LANGUAGE`] and falls back to the
//! first available entry, the same way a reader browsing the site would.

use crate::models::{FeedChapter, FeedSeries, PageLocations, SeriesStub};
use crate::{DEFAULT_LANGUAGE, HOME_URL};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Language tag to text. BTreeMap so "first entry" fallbacks are stable.
pub(crate) type Localized = BTreeMap<String, String>;

/// Content ratings the feed considers not-safe-for-work.
const NSFW_RATINGS: [&str; 3] = ["erotica", "suggestive", "pornographic"];

fn preferred(localized: &Localized) -> Option<&str> {
    localized
        .iter()
        .find(|(lang, _)| lang.eq_ignore_ascii_case(DEFAULT_LANGUAGE))
        .or_else(|| localized.iter().next())
        .map(|(_, text)| text.as_str())
}

#[derive(Debug, Deserialize)]
pub(crate) struct Relationship {
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) attributes: Option<serde_json::Value>,
}

// =============================================================================
// GET /chapter
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ChapterListBody {
    pub(crate) data: Vec<ChapterBody>,
    pub(crate) total: u32,
    pub(crate) offset: u32,
    pub(crate) limit: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChapterBody {
    pub(crate) id: String,
    pub(crate) attributes: ChapterAttributes,
    #[serde(default)]
    pub(crate) relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChapterAttributes {
    pub(crate) title: Option<String>,
    pub(crate) volume: Option<String>,
    pub(crate) chapter: Option<String>,
    pub(crate) translated_language: Option<String>,
    pub(crate) external_url: Option<String>,
}

impl From<ChapterBody> for FeedChapter {
    fn from(body: ChapterBody) -> Self {
        let series = body
            .relationships
            .into_iter()
            .find(|rel| rel.kind == "manga")
            .map(|rel| SeriesStub { id: rel.id, detail: None });
        Self {
            id: body.id,
            title: body.attributes.title,
            volume: body.attributes.volume,
            chapter: body.attributes.chapter,
            language: body.attributes.translated_language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            external_url: body.attributes.external_url.filter(|url| !url.is_empty()),
            series,
        }
    }
}

// =============================================================================
// GET /manga
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct SeriesListBody {
    pub(crate) data: Vec<SeriesBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeriesBody {
    pub(crate) id: String,
    pub(crate) attributes: SeriesAttributes,
    #[serde(default)]
    pub(crate) relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SeriesAttributes {
    #[serde(default)]
    pub(crate) title: Localized,
    #[serde(default)]
    pub(crate) alt_titles: Vec<Localized>,
    #[serde(default)]
    pub(crate) description: Localized,
    #[serde(default)]
    pub(crate) tags: Vec<TagBody>,
    #[serde(default)]
    pub(crate) content_rating: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagBody {
    pub(crate) attributes: TagAttributes,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagAttributes {
    #[serde(default)]
    pub(crate) name: Localized,
}

impl SeriesBody {
    /// The display title: the default-language entry of `title`, falling
    /// back to an alternative title carrying the default language, falling
    /// back to whatever title entry comes first.
    fn title(&self) -> String {
        if let Some((_, text)) = self
            .attributes
            .title
            .iter()
            .find(|(lang, _)| lang.eq_ignore_ascii_case(DEFAULT_LANGUAGE))
        {
            return text.clone();
        }
        if let Some(alt) = self
            .attributes
            .alt_titles
            .iter()
            .find_map(|alt| alt.get(DEFAULT_LANGUAGE))
        {
            return alt.clone();
        }
        self.attributes.title.values().next().cloned().unwrap_or_default()
    }

    /// Resolved cover image URL from the `cover_art` relationship, when the
    /// relationship was expanded by the feed.
    fn cover(&self) -> String {
        self.relationships
            .iter()
            .find(|rel| rel.kind == "cover_art")
            .and_then(|rel| rel.attributes.as_ref())
            .and_then(|attrs| attrs.get("fileName"))
            .and_then(|file| file.as_str())
            .map(|file| format!("{HOME_URL}/covers/{}/{file}", self.id))
            .unwrap_or_default()
    }
}

impl From<SeriesBody> for FeedSeries {
    fn from(body: SeriesBody) -> Self {
        let title = body.title();
        let cover = body.cover();
        let alt_titles = {
            let mut titles: Vec<String> =
                body.attributes.alt_titles.iter().flat_map(|alt| alt.values().cloned()).collect();
            titles.dedup();
            titles
        };
        let tags = body
            .attributes
            .tags
            .iter()
            .filter_map(|tag| preferred(&tag.attributes.name).map(str::to_string))
            .collect();
        let nsfw = body
            .attributes
            .content_rating
            .as_deref()
            .is_some_and(|rating| NSFW_RATINGS.contains(&rating));
        Self {
            id: body.id,
            title,
            description: preferred(&body.attributes.description).unwrap_or_default().to_string(),
            cover,
            alt_titles,
            tags,
            nsfw,
        }
    }
}

// =============================================================================
// GET /at-home/server/{chapter}
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AtHomeBody {
    pub(crate) base_url: String,
    pub(crate) chapter: AtHomeChapter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AtHomeChapter {
    pub(crate) hash: String,
    #[serde(default)]
    pub(crate) data: Vec<String>,
    #[serde(default)]
    pub(crate) data_saver: Vec<String>,
}

impl From<AtHomeBody> for PageLocations {
    fn from(body: AtHomeBody) -> Self {
        let base = body.base_url.trim_end_matches('/');
        let hash = &body.chapter.hash;
        Self {
            pages: body.chapter.data.iter().map(|file| format!("{base}/data/{hash}/{file}")).collect(),
            data_saver: body
                .chapter
                .data_saver
                .iter()
                .map(|file| format!("{base}/data-saver/{hash}/{file}"))
                .collect(),
        }
    }
}
