//! Hand-rolled mock collaborators shared by the engine's tests.

use crate::error::Result;
use crate::event::ChapterBatch;
use crate::settings::{FetchSettings, RateLimit};
use crate::watcher::Notify;
use async_trait::async_trait;
use mdwatch_feed::error::{ErrorKind as FeedErrorKind, Result as FeedResult};
use mdwatch_feed::{
    ChapterFilter, ChapterPage, Feed, FeedChapter, FeedSeries, PageLocations, SeriesStub,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory [`Feed`] backed by a fixed result set. Pages out of
/// `chapters` by offset/limit and records every endpoint it was asked for.
#[derive(Default)]
pub(crate) struct MockFeed {
    pub(crate) total: u32,
    pub(crate) chapters: Vec<FeedChapter>,
    pub(crate) series: Vec<FeedSeries>,
    /// Page locations by chapter id; absent ids answer with HTTP 404.
    pub(crate) pages: HashMap<String, PageLocations>,
    pub(crate) calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl Feed for MockFeed {
    async fn chapters(&self, filter: &ChapterFilter) -> FeedResult<ChapterPage> {
        self.calls.lock().unwrap().push("chapters");
        let start = (filter.offset as usize).min(self.chapters.len());
        let end = ((filter.offset + filter.limit) as usize).min(self.chapters.len());
        Ok(ChapterPage {
            items: self.chapters[start..end].to_vec(),
            total: self.total,
            offset: filter.offset,
            limit: filter.limit,
        })
    }

    async fn series(&self, ids: &[String]) -> FeedResult<Vec<FeedSeries>> {
        self.calls.lock().unwrap().push("series");
        Ok(self.series.iter().filter(|s| ids.contains(&s.id)).cloned().collect())
    }

    async fn pages(&self, chapter_id: &str) -> FeedResult<PageLocations> {
        self.calls.lock().unwrap().push("pages");
        match self.pages.get(chapter_id) {
            Some(locations) => Ok(locations.clone()),
            None => exn::bail!(FeedErrorKind::Status(404)),
        }
    }
}

/// A [`Notify`] that remembers everything published through it.
#[derive(Default)]
pub(crate) struct RecordingNotify {
    pub(crate) batches: Mutex<Vec<ChapterBatch>>,
}

#[async_trait]
impl Notify for RecordingNotify {
    async fn publish(&self, _channel: &str, batch: &ChapterBatch) -> Result<()> {
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }
}

pub(crate) fn feed_chapter(id: &str, series: Option<&str>) -> FeedChapter {
    FeedChapter {
        id: id.to_string(),
        title: Some(format!("Chapter {id}")),
        volume: None,
        chapter: Some("1".to_string()),
        language: "en".to_string(),
        external_url: None,
        series: series.map(|sid| SeriesStub { id: sid.to_string(), detail: None }),
    }
}

pub(crate) fn feed_series(id: &str) -> FeedSeries {
    FeedSeries {
        id: id.to_string(),
        title: format!("Series {id}"),
        description: String::new(),
        cover: String::new(),
        alt_titles: vec![],
        tags: vec![],
        nsfw: false,
    }
}

pub(crate) fn page_locations(count: usize) -> PageLocations {
    PageLocations {
        pages: (1..=count).map(|n| format!("https://uploads.example.org/data/h/{n}.png")).collect(),
        data_saver: vec![],
    }
}

/// Settings with both rate limits disabled, so tests never sleep.
pub(crate) fn unlimited_settings() -> FetchSettings {
    FetchSettings {
        page_requests: RateLimit::unlimited(),
        general_requests: RateLimit::unlimited(),
        ..FetchSettings::default()
    }
}
