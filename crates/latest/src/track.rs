//! Tracking: converting feed models to cache records and upserting them.

use crate::error::{ErrorKind, Result};
use crate::event::FetchedChapter;
use exn::ResultExt;
use mdwatch_cache::{
    CachedPair, ChapterRecord, ChapterState, Repository, SeriesRecord,
};
use mdwatch_feed::{FeedChapter, FeedSeries, HOME_URL, PROVIDER, PageLocations};
use rslug::slugify;
use time::UtcDateTime;

/// Writes observed chapters through to the cache.
///
/// Tracking is a pair of fake-upserts, series first so the chapter row can
/// reference the series' stable id. Tracking the same chapter twice is
/// idempotent: both rows keep the ids they were first given.
pub(crate) struct Tracker<'a> {
    repo: &'a Repository,
}

impl<'a> Tracker<'a> {
    pub(crate) fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    /// Upsert `series` and `chapter` and assemble the [`FetchedChapter`]
    /// that represents the observation downstream.
    ///
    /// External chapters pass [`PageLocations::default()`]; their cache row
    /// carries an empty page list and the external URL instead.
    pub(crate) async fn track(
        &self,
        chapter: &FeedChapter,
        series: &FeedSeries,
        locations: PageLocations,
    ) -> Result<FetchedChapter> {
        let mut series_record = series_record(series);
        series_record.id =
            self.repo.upsert_series(&series_record).await.or_raise(|| ErrorKind::Cache)?;

        let mut chapter_record = chapter_record(chapter, series_record.id, &locations.pages);
        chapter_record.id =
            self.repo.upsert_chapter(&chapter_record).await.or_raise(|| ErrorKind::Cache)?;

        Ok(FetchedChapter {
            chapter: chapter.clone(),
            series: series.clone(),
            pages: locations.pages,
            data_saver: locations.data_saver,
            cache: CachedPair { series: series_record, chapter: chapter_record },
        })
    }
}

fn series_record(series: &FeedSeries) -> SeriesRecord {
    SeriesRecord {
        id: 0,
        hash_id: slugify!(&format!("{PROVIDER}-{}", series.title)),
        title: series.title.clone(),
        source_id: series.id.clone(),
        provider: PROVIDER.to_string(),
        url: format!("{HOME_URL}/title/{}", series.id),
        cover: series.cover.clone(),
        description: series.description.clone(),
        alt_titles: series.alt_titles.clone(),
        tags: series.tags.clone(),
        nsfw: series.nsfw,
        created_at: UtcDateTime::now(),
        updated_at: UtcDateTime::now(),
        deleted_at: None,
    }
}

fn chapter_record(chapter: &FeedChapter, series_id: i64, pages: &[String]) -> ChapterRecord {
    ChapterRecord {
        id: 0,
        series_id,
        title: chapter.title.clone().unwrap_or_default(),
        url: format!("{HOME_URL}/chapter/{}", chapter.id),
        source_id: chapter.id.clone(),
        ordinal: chapter.ordinal().unwrap_or(0.0),
        volume: chapter.volume_number(),
        language: chapter.language.clone(),
        pages: pages.to_vec(),
        external_url: chapter.external_url.clone(),
        state: ChapterState::NotIndexed,
        created_at: UtcDateTime::now(),
        updated_at: UtcDateTime::now(),
        deleted_at: None,
    }
}
