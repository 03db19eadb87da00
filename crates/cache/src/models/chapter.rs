use crate::error::{Error, ErrorKind};
use crate::models::unix_ts;
use crate::schema::{TableSchema, Upsertable};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

/// Indexing state of a cached chapter.
///
/// The watcher only ever writes [`NotIndexed`](Self::NotIndexed); the
/// indexer that consumes the notification bus moves chapters through the
/// remaining states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChapterState {
    #[default]
    NotIndexed,
    Indexed,
    Errored,
}

impl From<ChapterState> for i64 {
    fn from(state: ChapterState) -> Self {
        match state {
            ChapterState::NotIndexed => 0,
            ChapterState::Indexed => 1,
            ChapterState::Errored => 2,
        }
    }
}

impl TryFrom<i64> for ChapterState {
    type Error = Error;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NotIndexed),
            1 => Ok(Self::Indexed),
            2 => Ok(Self::Errored),
            _ => exn::bail!(ErrorKind::InvalidData("chapter state")),
        }
    }
}

/// A translated chapter tracked in the cache database.
///
/// `id` is assigned by the database on first insert and never changes for
/// the same `(series_id, source_id, language)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub id: i64,
    /// Cache id of the parent [`SeriesRecord`](crate::SeriesRecord).
    pub series_id: i64,
    pub title: String,
    pub url: String,
    /// Identifier of the chapter on the external feed.
    pub source_id: String,
    pub ordinal: f64,
    pub volume: Option<f64>,
    pub language: String,
    /// Full-resolution page image URLs.
    pub pages: Vec<String>,
    /// Set when the chapter is hosted off-site instead of on the feed.
    pub external_url: Option<String>,
    pub state: ChapterState,
    #[serde(with = "unix_ts")]
    pub created_at: UtcDateTime,
    #[serde(with = "unix_ts")]
    pub updated_at: UtcDateTime,
    #[serde(with = "unix_ts::option")]
    pub deleted_at: Option<UtcDateTime>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ChapterRow {
    pub(crate) id: i64,
    pub(crate) series_id: i64,
    pub(crate) title: String,
    pub(crate) url: String,
    pub(crate) source_id: String,
    pub(crate) ordinal: f64,
    pub(crate) volume: Option<f64>,
    pub(crate) language: String,
    pub(crate) pages: String,
    pub(crate) external_url: Option<String>,
    pub(crate) state: i64,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
    pub(crate) deleted_at: Option<i64>,
}

impl Upsertable for ChapterRow {
    const SCHEMA: TableSchema = TableSchema {
        table: "chapter_cache",
        key: &["series_id", "source_id", "language"],
        data: &["title", "url", "ordinal", "volume", "pages", "external_url", "state"],
    };
}

impl TryFrom<&ChapterRecord> for ChapterRow {
    type Error = Error;
    fn try_from(record: &ChapterRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            series_id: record.series_id,
            title: record.title.clone(),
            url: record.url.clone(),
            source_id: record.source_id.clone(),
            ordinal: record.ordinal,
            volume: record.volume,
            language: record.language.clone(),
            pages: serde_json::to_string(&record.pages).or_raise(|| ErrorKind::InvalidData("pages"))?,
            external_url: record.external_url.clone(),
            state: record.state.into(),
            created_at: record.created_at.unix_timestamp(),
            updated_at: record.updated_at.unix_timestamp(),
            deleted_at: record.deleted_at.map(|at| at.unix_timestamp()),
        })
    }
}

impl TryFrom<ChapterRow> for ChapterRecord {
    type Error = Error;
    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            series_id: row.series_id,
            title: row.title,
            url: row.url,
            source_id: row.source_id,
            ordinal: row.ordinal,
            volume: row.volume,
            language: row.language,
            pages: serde_json::from_str(&row.pages).or_raise(|| ErrorKind::InvalidData("pages"))?,
            external_url: row.external_url,
            state: ChapterState::try_from(row.state)?,
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
