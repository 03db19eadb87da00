use crate::error::Error;
use crate::models::{ChapterRecord, ChapterRow, SeriesRecord, SeriesRow};
use serde::{Deserialize, Serialize};
use sqlx::Row;

/// A series and one of its chapters, as stored in the cache database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPair {
    pub series: SeriesRecord,
    pub chapter: ChapterRecord,
}

/// Joined row for `find_existing.sql`.
///
/// The two tables share column names (`id`, `title`, `source_id`, ...), so
/// the query aliases every column with an `s_`/`c_` prefix and this type
/// decodes the row by hand rather than relying on `#[sqlx(flatten)]`.
pub(crate) struct CachedPairRow {
    pub(crate) series: SeriesRow,
    pub(crate) chapter: ChapterRow,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for CachedPairRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        let series = SeriesRow {
            id: row.try_get("s_id")?,
            hash_id: row.try_get("s_hash_id")?,
            title: row.try_get("s_title")?,
            source_id: row.try_get("s_source_id")?,
            provider: row.try_get("s_provider")?,
            url: row.try_get("s_url")?,
            cover: row.try_get("s_cover")?,
            description: row.try_get("s_description")?,
            alt_titles: row.try_get("s_alt_titles")?,
            tags: row.try_get("s_tags")?,
            nsfw: row.try_get("s_nsfw")?,
            created_at: row.try_get("s_created_at")?,
            updated_at: row.try_get("s_updated_at")?,
            deleted_at: row.try_get("s_deleted_at")?,
        };
        let chapter = ChapterRow {
            id: row.try_get("c_id")?,
            series_id: row.try_get("c_series_id")?,
            title: row.try_get("c_title")?,
            url: row.try_get("c_url")?,
            source_id: row.try_get("c_source_id")?,
            ordinal: row.try_get("c_ordinal")?,
            volume: row.try_get("c_volume")?,
            language: row.try_get("c_language")?,
            pages: row.try_get("c_pages")?,
            external_url: row.try_get("c_external_url")?,
            state: row.try_get("c_state")?,
            created_at: row.try_get("c_created_at")?,
            updated_at: row.try_get("c_updated_at")?,
            deleted_at: row.try_get("c_deleted_at")?,
        };
        Ok(Self { series, chapter })
    }
}

impl TryFrom<CachedPairRow> for CachedPair {
    type Error = Error;
    fn try_from(row: CachedPairRow) -> Result<Self, Self::Error> {
        Ok(Self { series: row.series.try_into()?, chapter: row.chapter.try_into()? })
    }
}
