//! HTTP implementation of the [`Feed`] trait against the MangaDex REST API.

use crate::error::{ErrorKind, Result};
use crate::models::{ChapterFilter, ChapterPage, FeedChapter, FeedSeries, PageLocations};
use crate::wire::{AtHomeBody, ChapterListBody, SeriesListBody};
use crate::Feed;
use async_trait::async_trait;
use exn::ResultExt;
use serde::de::DeserializeOwned;
use std::time::Duration;
use time::UtcDateTime;

/// Production endpoint of the API.
pub const API_URL: &str = "https://api.mangadex.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// MangaDex REST client.
///
/// Does no rate limiting of its own; callers are expected to pace their
/// requests. One instance can be shared freely, the underlying connection
/// pool is reference counted.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: reqwest::Client,
    api_url: String,
}

impl HttpFeed {
    pub fn new() -> Result<Self> {
        Self::with_api_url(API_URL)
    }

    /// Point the client at a different endpoint, for tests and mirrors.
    pub fn with_api_url(api_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .or_raise(|| ErrorKind::Transport)?;
        Ok(Self { client, api_url: api_url.into() })
    }

    async fn get_json<T>(&self, path: &str, query: &[(String, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.api_url);
        tracing::debug!(%url, params = query.len(), "requesting feed resource");
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .or_raise(|| ErrorKind::Transport)?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status(status.as_u16()));
        }
        response.json::<T>().await.or_raise(|| ErrorKind::Decode)
    }
}

/// The API accepts timestamps as `YYYY-MM-DDTHH:MM:SS`, without an offset.
fn timestamp_param(ts: UtcDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
    )
}

fn flag(value: bool) -> String {
    if value { "1".to_string() } else { "0".to_string() }
}

#[async_trait]
impl Feed for HttpFeed {
    async fn chapters(&self, filter: &ChapterFilter) -> Result<ChapterPage> {
        let mut query = vec![
            ("limit".to_string(), filter.limit.to_string()),
            ("offset".to_string(), filter.offset.to_string()),
            ("order[updatedAt]".to_string(), "desc".to_string()),
            ("updatedAtSince".to_string(), timestamp_param(filter.updated_since)),
            ("includeExternalUrl".to_string(), flag(filter.include_external)),
            ("includeEmptyPages".to_string(), flag(false)),
            ("includeFutureUpdates".to_string(), flag(false)),
            ("includeFuturePublishAt".to_string(), flag(false)),
        ];
        for language in &filter.languages {
            query.push(("translatedLanguage[]".to_string(), language.clone()));
        }
        let body: ChapterListBody = self.get_json("/chapter", &query).await?;
        Ok(ChapterPage {
            items: body.data.into_iter().map(FeedChapter::from).collect(),
            total: body.total,
            offset: body.offset,
            limit: body.limit,
        })
    }

    async fn series(&self, ids: &[String]) -> Result<Vec<FeedSeries>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = vec![
            ("limit".to_string(), ids.len().to_string()),
            ("includes[]".to_string(), "cover_art".to_string()),
        ];
        for id in ids {
            query.push(("ids[]".to_string(), id.clone()));
        }
        let body: SeriesListBody = self.get_json("/manga", &query).await?;
        Ok(body.data.into_iter().map(FeedSeries::from).collect())
    }

    async fn pages(&self, chapter_id: &str) -> Result<PageLocations> {
        let path = format!("/at-home/server/{chapter_id}");
        let body: AtHomeBody = self.get_json(&path, &[]).await?;
        Ok(PageLocations::from(body))
    }
}
