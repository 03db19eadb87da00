use crate::error::{Error, ErrorKind};
use crate::models::unix_ts;
use crate::schema::{TableSchema, Upsertable};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

/// A series tracked in the cache database.
///
/// `id` is assigned by the database on first insert and never changes for
/// the same `(source_id, provider)` pair, no matter how many times the
/// series is re-upserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub id: i64,
    /// Slug derived from the provider and title, used by downstream consumers.
    pub hash_id: String,
    pub title: String,
    /// Identifier of the series on the external feed.
    pub source_id: String,
    pub provider: String,
    pub url: String,
    pub cover: String,
    pub description: String,
    pub alt_titles: Vec<String>,
    pub tags: Vec<String>,
    pub nsfw: bool,
    #[serde(with = "unix_ts")]
    pub created_at: UtcDateTime,
    #[serde(with = "unix_ts")]
    pub updated_at: UtcDateTime,
    #[serde(with = "unix_ts::option")]
    pub deleted_at: Option<UtcDateTime>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct SeriesRow {
    pub(crate) id: i64,
    pub(crate) hash_id: String,
    pub(crate) title: String,
    pub(crate) source_id: String,
    pub(crate) provider: String,
    pub(crate) url: String,
    pub(crate) cover: String,
    pub(crate) description: String,
    pub(crate) alt_titles: String,
    pub(crate) tags: String,
    pub(crate) nsfw: bool,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
    pub(crate) deleted_at: Option<i64>,
}

impl Upsertable for SeriesRow {
    const SCHEMA: TableSchema = TableSchema {
        table: "series_cache",
        key: &["source_id", "provider"],
        data: &["hash_id", "title", "url", "cover", "description", "alt_titles", "tags", "nsfw"],
    };
}

impl TryFrom<&SeriesRecord> for SeriesRow {
    type Error = Error;
    fn try_from(record: &SeriesRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            hash_id: record.hash_id.clone(),
            title: record.title.clone(),
            source_id: record.source_id.clone(),
            provider: record.provider.clone(),
            url: record.url.clone(),
            cover: record.cover.clone(),
            description: record.description.clone(),
            alt_titles: serde_json::to_string(&record.alt_titles)
                .or_raise(|| ErrorKind::InvalidData("alt titles"))?,
            tags: serde_json::to_string(&record.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
            nsfw: record.nsfw,
            created_at: record.created_at.unix_timestamp(),
            updated_at: record.updated_at.unix_timestamp(),
            deleted_at: record.deleted_at.map(|at| at.unix_timestamp()),
        })
    }
}

impl TryFrom<SeriesRow> for SeriesRecord {
    type Error = Error;
    fn try_from(row: SeriesRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            hash_id: row.hash_id,
            title: row.title,
            source_id: row.source_id,
            provider: row.provider,
            url: row.url,
            cover: row.cover,
            description: row.description,
            alt_titles: serde_json::from_str(&row.alt_titles)
                .or_raise(|| ErrorKind::InvalidData("alt titles"))?,
            tags: serde_json::from_str(&row.tags).or_raise(|| ErrorKind::InvalidData("tags"))?,
            nsfw: row.nsfw,
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("update date"))?,
            deleted_at: row
                .deleted_at
                .map(UtcDateTime::from_unix_timestamp)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("deletion date"))?,
        })
    }
}
