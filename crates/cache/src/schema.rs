//! Generated statement text for the fake-upsert.
//!
//! SQLite's native `INSERT ... ON CONFLICT DO UPDATE` advances the
//! AUTOINCREMENT sequence even when the conflict resolves to an update,
//! which over time punches large holes into the id space. The repository
//! avoids it entirely: select by the natural key, then either insert or
//! update in place. The three statements involved are a pure function of a
//! table's schema, so they are generated once per row type and memoized for
//! the lifetime of the process.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

/// Static description of a cached table: its natural unique key and the
/// data columns the fake-upsert writes.
///
/// The integer primary key and the timestamp columns are deliberately
/// absent; `id` is never written and the timestamps are appended by the
/// statement generator (`created_at`/`updated_at` on insert, `updated_at`
/// on update).
pub(crate) struct TableSchema {
    pub(crate) table: &'static str,
    pub(crate) key: &'static [&'static str],
    pub(crate) data: &'static [&'static str],
}

/// The statement triple backing one fake-upsert.
pub(crate) struct SqlSet {
    /// `SELECT id FROM table WHERE key = ?` — bind the key columns.
    pub(crate) select: String,
    /// `INSERT ... RETURNING id` — bind key, data, then two timestamps.
    pub(crate) insert: String,
    /// `UPDATE ... WHERE key = ?` — bind data, one timestamp, then key.
    pub(crate) update: String,
}

impl TableSchema {
    fn build(&self) -> SqlSet {
        let key_filter =
            self.key.iter().map(|col| format!("{col} = ?")).collect::<Vec<_>>().join(" AND ");
        let select = format!("SELECT id FROM {} WHERE {} LIMIT 1", self.table, key_filter);

        let columns = self
            .key
            .iter()
            .chain(self.data.iter())
            .copied()
            .chain(["created_at", "updated_at"])
            .collect::<Vec<_>>();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
            self.table,
            columns.join(", "),
            placeholders,
        );

        let assignments = self
            .data
            .iter()
            .copied()
            .chain(["updated_at"])
            .map(|col| format!("{col} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let update = format!("UPDATE {} SET {} WHERE {}", self.table, assignments, key_filter);

        SqlSet { select, insert, update }
    }
}

/// Row types that can be written through the fake-upsert.
pub(crate) trait Upsertable: 'static {
    const SCHEMA: TableSchema;
}

static STATEMENTS: LazyLock<Mutex<HashMap<TypeId, &'static SqlSet>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Read-through cache of generated statement text, keyed by row type.
///
/// The generated sets are leaked on first request; they are pure derived
/// data and live for the rest of the process, so no teardown is needed.
pub(crate) fn statements<T: Upsertable>() -> &'static SqlSet {
    let mut cache = STATEMENTS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *cache.entry(TypeId::of::<T>()).or_insert_with(|| Box::leak(Box::new(T::SCHEMA.build())))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample;
    impl Upsertable for Sample {
        const SCHEMA: TableSchema = TableSchema {
            table: "sample",
            key: &["source_id", "provider"],
            data: &["title", "nsfw"],
        };
    }

    #[test]
    fn test_generated_select() {
        let sql = statements::<Sample>();
        assert_eq!(sql.select, "SELECT id FROM sample WHERE source_id = ? AND provider = ? LIMIT 1");
    }

    #[test]
    fn test_generated_insert_returns_id() {
        let sql = statements::<Sample>();
        assert_eq!(
            sql.insert,
            "INSERT INTO sample (source_id, provider, title, nsfw, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id"
        );
    }

    #[test]
    fn test_generated_update_keeps_key_out_of_assignments() {
        let sql = statements::<Sample>();
        assert_eq!(
            sql.update,
            "UPDATE sample SET title = ?, nsfw = ?, updated_at = ? WHERE source_id = ? AND provider = ?"
        );
    }

    #[test]
    fn test_statements_are_memoized() {
        let first: *const SqlSet = statements::<Sample>();
        let second: *const SqlSet = statements::<Sample>();
        assert!(std::ptr::eq(first, second));
    }
}
