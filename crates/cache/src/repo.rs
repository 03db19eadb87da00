//! Combined repository for series and chapter cache rows.
//!
//! They're tightly coupled: a chapter row cannot exist without its parent
//! series row, and the watcher always writes them as a unit (series first,
//! then chapter, so the chapter can reference the series id).

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    CachedPair, CachedPairRow, ChapterRecord, ChapterRow, ChapterState, SeriesRecord, SeriesRow,
};
use crate::schema::{SqlSet, statements};
use exn::ResultExt;
use sqlx::SqlitePool;
use time::UtcDateTime;

/// Repository for managing series and chapter entries in the cache database.
///
/// # Fake upsert
///
/// [`upsert_series`](Self::upsert_series) and
/// [`upsert_chapter`](Self::upsert_chapter) deliberately avoid SQLite's
/// `ON CONFLICT DO UPDATE`: a conflicting insert advances the AUTOINCREMENT
/// sequence even when it resolves to an update, and most "inserts" here are
/// re-observations of rows that already exist. Instead each upsert selects
/// by the natural unique key and either inserts (returning the fresh id) or
/// updates in place (returning the existing id, unchanged).
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Upsert
    // =========================================================================

    /// Insert or update a series, returning its stable cache id.
    ///
    /// The natural key is `(source_id, provider)`. The caller's `id`,
    /// `created_at` and `updated_at` fields are ignored; timestamps are
    /// written by the repository.
    pub async fn upsert_series(&self, series: &SeriesRecord) -> Result<i64> {
        let row = SeriesRow::try_from(series)?;
        let sql: &SqlSet = statements::<SeriesRow>();
        let now = UtcDateTime::now().unix_timestamp();
        let existing: Option<i64> = sqlx::query_scalar(&sql.select)
            .bind(&row.source_id)
            .bind(&row.provider)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        // Bind order mirrors SeriesRow::SCHEMA (key, data, timestamps).
        match existing {
            None => sqlx::query_scalar(&sql.insert)
                .bind(&row.source_id)
                .bind(&row.provider)
                .bind(&row.hash_id)
                .bind(&row.title)
                .bind(&row.url)
                .bind(&row.cover)
                .bind(&row.description)
                .bind(&row.alt_titles)
                .bind(&row.tags)
                .bind(row.nsfw)
                .bind(now)
                .bind(now)
                .fetch_one(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database),
            Some(id) => {
                sqlx::query(&sql.update)
                    .bind(&row.hash_id)
                    .bind(&row.title)
                    .bind(&row.url)
                    .bind(&row.cover)
                    .bind(&row.description)
                    .bind(&row.alt_titles)
                    .bind(&row.tags)
                    .bind(row.nsfw)
                    .bind(now)
                    .bind(&row.source_id)
                    .bind(&row.provider)
                    .execute(&self.pool)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                Ok(id)
            },
        }
    }

    /// Insert or update a chapter, returning its stable cache id.
    ///
    /// The natural key is `(series_id, source_id, language)`, so the parent
    /// series must have been upserted first.
    pub async fn upsert_chapter(&self, chapter: &ChapterRecord) -> Result<i64> {
        let row = ChapterRow::try_from(chapter)?;
        let sql: &SqlSet = statements::<ChapterRow>();
        let now = UtcDateTime::now().unix_timestamp();
        let existing: Option<i64> = sqlx::query_scalar(&sql.select)
            .bind(row.series_id)
            .bind(&row.source_id)
            .bind(&row.language)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        // Bind order mirrors ChapterRow::SCHEMA (key, data, timestamps).
        match existing {
            None => sqlx::query_scalar(&sql.insert)
                .bind(row.series_id)
                .bind(&row.source_id)
                .bind(&row.language)
                .bind(&row.title)
                .bind(&row.url)
                .bind(row.ordinal)
                .bind(row.volume)
                .bind(&row.pages)
                .bind(&row.external_url)
                .bind(row.state)
                .bind(now)
                .bind(now)
                .fetch_one(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database),
            Some(id) => {
                sqlx::query(&sql.update)
                    .bind(&row.title)
                    .bind(&row.url)
                    .bind(row.ordinal)
                    .bind(row.volume)
                    .bind(&row.pages)
                    .bind(&row.external_url)
                    .bind(row.state)
                    .bind(now)
                    .bind(row.series_id)
                    .bind(&row.source_id)
                    .bind(&row.language)
                    .execute(&self.pool)
                    .await
                    .or_raise(|| ErrorKind::Database)?;
                Ok(id)
            },
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Find the cached series/chapter pairs for a batch of chapter source ids.
    ///
    /// Used once per feed page to partition a batch into already-known and
    /// new chapters. Ids with no cached chapter are simply absent from the
    /// result.
    pub async fn find_by_source_ids(&self, source_ids: &[String]) -> Result<Vec<CachedPair>> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = sqlx::QueryBuilder::new(include_str!("../queries/find_existing.sql"));
        builder.push(" (");
        let mut separated = builder.separated(", ");
        for id in source_ids {
            separated.push_bind(id);
        }
        builder.push(")");
        let rows: Vec<CachedPairRow> =
            builder.build_query_as().fetch_all(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(CachedPair::try_from).collect()
    }

    /// The timestamp of the most recently tracked chapter, if any.
    ///
    /// Used as the lower bound for the next discovery pass's pagination.
    pub async fn last_watermark(&self) -> Result<Option<UtcDateTime>> {
        let seconds: Option<i64> = sqlx::query_scalar(include_str!("../queries/last_watermark.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        seconds
            .map(UtcDateTime::from_unix_timestamp)
            .transpose()
            .or_raise(|| ErrorKind::InvalidData("watermark"))
    }

    /// Update the indexing state of a cached chapter.
    pub async fn set_chapter_state(&self, id: i64, state: ChapterState) -> Result<()> {
        sqlx::query("UPDATE chapter_cache SET state = ?, updated_at = ? WHERE id = ?")
            .bind(i64::from(state))
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn make_series(source_id: &str, title: &str) -> SeriesRecord {
        SeriesRecord {
            id: 0,
            hash_id: format!("mangadex-{}", title.to_lowercase().replace(' ', "-")),
            title: title.to_string(),
            source_id: source_id.to_string(),
            provider: "mangadex".to_string(),
            url: format!("https://mangadex.org/title/{source_id}"),
            cover: String::new(),
            description: String::new(),
            alt_titles: vec![],
            tags: vec!["Comedy".to_string()],
            nsfw: false,
            created_at: UtcDateTime::now(),
            updated_at: UtcDateTime::now(),
            deleted_at: None,
        }
    }

    fn make_chapter(series_id: i64, source_id: &str, ordinal: f64) -> ChapterRecord {
        ChapterRecord {
            id: 0,
            series_id,
            title: format!("Chapter {ordinal}"),
            url: format!("https://mangadex.org/chapter/{source_id}"),
            source_id: source_id.to_string(),
            ordinal,
            volume: None,
            language: "en".to_string(),
            pages: vec!["https://example.org/1.png".to_string()],
            external_url: None,
            state: ChapterState::NotIndexed,
            created_at: UtcDateTime::now(),
            updated_at: UtcDateTime::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_series_is_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let series = make_series("series-a", "Honey Heist");
        let first = repo.upsert_series(&series).await.unwrap();
        let second = repo.upsert_series(&series).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_upsert_does_not_burn_sequence_values() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let a = repo.upsert_series(&make_series("series-a", "Honey Heist")).await.unwrap();
        // Re-upserting must not advance the AUTOINCREMENT sequence...
        for _ in 0..5 {
            repo.upsert_series(&make_series("series-a", "Honey Heist")).await.unwrap();
        }
        // ...so the next distinct series gets the very next id.
        let b = repo.upsert_series(&make_series("series-b", "Teatime Cookbook")).await.unwrap();
        assert_eq!(b, a + 1);
    }

    #[tokio::test]
    async fn test_upsert_updates_data_in_place() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let series_id = repo.upsert_series(&make_series("series-a", "Honey Heist")).await.unwrap();
        let chapter_id = repo.upsert_chapter(&make_chapter(series_id, "chap-1", 1.0)).await.unwrap();

        let mut updated = make_chapter(series_id, "chap-1", 1.0);
        updated.title = "Chapter 1 (revised)".to_string();
        updated.pages = vec!["https://example.org/1.png".to_string(), "https://example.org/2.png".to_string()];
        let second_id = repo.upsert_chapter(&updated).await.unwrap();
        assert_eq!(chapter_id, second_id);

        let pairs = repo.find_by_source_ids(&["chap-1".to_string()]).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].chapter.title, "Chapter 1 (revised)");
        assert_eq!(pairs[0].chapter.pages.len(), 2);
    }

    #[tokio::test]
    async fn test_same_chapter_in_other_language_is_distinct() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let series_id = repo.upsert_series(&make_series("series-a", "Honey Heist")).await.unwrap();
        let en = repo.upsert_chapter(&make_chapter(series_id, "chap-1", 1.0)).await.unwrap();
        let mut fr = make_chapter(series_id, "chap-1", 1.0);
        fr.language = "fr".to_string();
        let fr = repo.upsert_chapter(&fr).await.unwrap();
        assert_ne!(en, fr);
    }

    #[tokio::test]
    async fn test_find_by_source_ids_partitions_batch() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let series_id = repo.upsert_series(&make_series("series-a", "Honey Heist")).await.unwrap();
        repo.upsert_chapter(&make_chapter(series_id, "chap-1", 1.0)).await.unwrap();
        repo.upsert_chapter(&make_chapter(series_id, "chap-2", 2.0)).await.unwrap();

        let batch =
            vec!["chap-1".to_string(), "chap-2".to_string(), "chap-3".to_string()];
        let pairs = repo.find_by_source_ids(&batch).await.unwrap();
        let mut found: Vec<_> = pairs.iter().map(|p| p.chapter.source_id.as_str()).collect();
        found.sort_unstable();
        assert_eq!(found, vec!["chap-1", "chap-2"]);
    }

    #[tokio::test]
    async fn test_find_by_source_ids_empty_batch_is_noop() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        assert!(repo.find_by_source_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_watermark() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        assert!(repo.last_watermark().await.unwrap().is_none());

        let series_id = repo.upsert_series(&make_series("series-a", "Honey Heist")).await.unwrap();
        repo.upsert_chapter(&make_chapter(series_id, "chap-1", 1.0)).await.unwrap();
        let watermark = repo.last_watermark().await.unwrap().unwrap();
        assert!((UtcDateTime::now() - watermark).whole_seconds() < 5);
    }

    #[tokio::test]
    async fn test_set_chapter_state() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let series_id = repo.upsert_series(&make_series("series-a", "Honey Heist")).await.unwrap();
        let chapter_id = repo.upsert_chapter(&make_chapter(series_id, "chap-1", 1.0)).await.unwrap();
        repo.set_chapter_state(chapter_id, ChapterState::Indexed).await.unwrap();
        let pairs = repo.find_by_source_ids(&["chap-1".to_string()]).await.unwrap();
        assert_eq!(pairs[0].chapter.state, ChapterState::Indexed);
    }
}
