//! Message persistence storage
//!
//! Keyset queries over the `messages` table. Every read returns rows in the
//! global order `(sort_key DESC, id DESC)`; row-value comparisons
//! `(sort_key, id) < (?, ?)` express the exclusive cursor boundaries.

use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use tracing::warn;

use super::database::{Database, FOLD_CASE_FN};
use crate::cursor::Cursor;
use crate::types::Item;

const COLUMNS: &str = "id, sort_key, text, group_id";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        sort_key: row.get(1)?,
        text: row.get(2)?,
        group_id: row.get(3)?,
    })
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Message persistence store
pub struct MessageStore<'a> {
    db: &'a Database,
}

impl<'a> MessageStore<'a> {
    /// Create a new message store with database reference
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert items in one transaction; existing ids are left untouched
    ///
    /// Ids a cursor cannot carry are skipped. Returns the number of rows
    /// actually inserted.
    pub fn insert_items(&self, items: &[Item]) -> Result<usize> {
        let tx = self.db.conn().unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO messages (id, group_id, sort_key, text)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for item in items {
                if !Cursor::is_encodable_id(&item.id) {
                    warn!(id = %item.id, "Skipping message whose id cannot be paged");
                    continue;
                }
                inserted += stmt.execute(params![item.id, item.group_id, item.sort_key, item.text])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Total number of messages
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Newest `limit` messages
    pub fn head(&self, limit: usize) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM messages ORDER BY sort_key DESC, id DESC LIMIT ?1"
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt.query_map([sql_limit(limit)], item_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Up to `limit` messages strictly older than the boundary, newest first
    pub fn older_than(&self, sort_key: &str, id: &str, limit: usize) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM messages
             WHERE (sort_key, id) < (?1, ?2)
             ORDER BY sort_key DESC, id DESC LIMIT ?3"
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![sort_key, id, sql_limit(limit)], item_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Up to `limit` messages strictly newer than the boundary and closest to it,
    /// returned newest first
    pub fn newer_than(&self, sort_key: &str, id: &str, limit: usize) -> Result<Vec<Item>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM messages
             WHERE (sort_key, id) > (?1, ?2)
             ORDER BY sort_key ASC, id ASC LIMIT ?3"
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![sort_key, id, sql_limit(limit)], item_from_row)?;
        let mut items = rows.collect::<Result<Vec<_>, _>>()?;
        items.reverse();
        Ok(items)
    }

    /// Whether anything newer than the boundary exists
    pub fn exists_newer(&self, sort_key: &str, id: &str) -> Result<bool> {
        let exists: bool = self.db.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE (sort_key, id) > (?1, ?2))",
            params![sort_key, id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Whether anything older than the boundary exists
    pub fn exists_older(&self, sort_key: &str, id: &str) -> Result<bool> {
        let exists: bool = self.db.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE (sort_key, id) < (?1, ?2))",
            params![sort_key, id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Look up one message by id
    pub fn find(&self, id: &str) -> Result<Option<Item>> {
        let sql = format!("SELECT {COLUMNS} FROM messages WHERE id = ?1");
        self.db
            .conn()
            .query_row(&sql, [id], item_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// Message at a zero-based position of the global order
    pub fn nth(&self, index: usize) -> Result<Option<Item>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM messages ORDER BY sort_key DESC, id DESC LIMIT 1 OFFSET ?1"
        );
        self.db
            .conn()
            .query_row(&sql, [sql_limit(index)], item_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// Case-insensitive substring search on `text`, global order
    ///
    /// `needle` must already be lowercased (Unicode-aware, like
    /// [`str::to_lowercase`]); empty matches everything.
    pub fn search(&self, needle: &str, limit: usize) -> Result<Vec<Item>> {
        if needle.is_empty() {
            return self.head(limit);
        }

        let sql = format!(
            "SELECT {COLUMNS} FROM messages
             WHERE instr({FOLD_CASE_FN}(text), ?1) > 0
             ORDER BY sort_key DESC, id DESC LIMIT ?2"
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![needle, sql_limit(limit)], item_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete all messages of a group
    pub fn delete_group(&self, group_id: &str) -> Result<usize> {
        Ok(self
            .db
            .conn()
            .execute("DELETE FROM messages WHERE group_id = ?1", [group_id])?)
    }
}

#[cfg(test)]
mod tests {
    use super::MessageStore;
    use crate::source::demo_messages;
    use crate::storage::Database;
    use crate::types::Item;

    fn create_test_db() -> Database {
        Database::in_memory().expect("Failed to create database")
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_insert_and_count() {
        let db = create_test_db();
        let store = MessageStore::new(&db);

        let inserted = store.insert_items(&demo_messages(30)).expect("insert");
        assert_eq!(inserted, 30);
        // Re-inserting the same ids is a no-op
        let again = store.insert_items(&demo_messages(30)).expect("insert");
        assert_eq!(again, 0);
        assert_eq!(store.count().expect("count"), 30);
    }

    #[test]
    fn test_keyset_neighbours() {
        let db = create_test_db();
        let store = MessageStore::new(&db);
        store.insert_items(&demo_messages(30)).expect("insert");

        let pivot = store.find("m-0015").expect("find").expect("exists");
        let older = store
            .older_than(&pivot.sort_key, &pivot.id, 3)
            .expect("older");
        assert_eq!(ids(&older), vec!["m-0014", "m-0013", "m-0012"]);

        let newer = store
            .newer_than(&pivot.sort_key, &pivot.id, 3)
            .expect("newer");
        assert_eq!(ids(&newer), vec!["m-0018", "m-0017", "m-0016"]);

        assert!(store.exists_newer(&pivot.sort_key, &pivot.id).expect("exists"));
        let oldest = store.find("m-0001").expect("find").expect("exists");
        assert!(!store.exists_older(&oldest.sort_key, &oldest.id).expect("exists"));
    }

    #[test]
    fn test_nth_and_search() {
        let db = create_test_db();
        let store = MessageStore::new(&db);
        store.insert_items(&demo_messages(100)).expect("insert");

        let first = store.nth(0).expect("nth").expect("exists");
        assert_eq!(first.id, "m-0100");
        assert!(store.nth(100).expect("nth").is_none());

        let hits = store.search("needle", 10).expect("search");
        // 37, 53 and 74 carry the keyword below 100
        assert_eq!(ids(&hits), vec!["m-0074", "m-0053", "m-0037"]);
    }

    #[test]
    fn test_delete_group() {
        let db = create_test_db();
        let store = MessageStore::new(&db);
        store.insert_items(&demo_messages(5)).expect("insert");
        assert_eq!(store.delete_group("chat-1").expect("delete"), 5);
        assert_eq!(store.count().expect("count"), 0);
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let db = create_test_db();
        let store = MessageStore::new(&db);
        store
            .insert_items(&[
                Item::new("m-1", "2026-01-01T00:01:00.000Z", "Ärger im Büro", "chat-1"),
                Item::new("m-2", "2026-01-01T00:02:00.000Z", "alles gut", "chat-1"),
                Item::new("m-3", "2026-01-01T00:03:00.000Z", "ÄRGER wieder", "chat-1"),
            ])
            .expect("insert");

        let hits = store.search("ärger", 10).expect("search");
        assert_eq!(ids(&hits), vec!["m-3", "m-1"]);
        assert_eq!(ids(&store.search("büro", 10).expect("search")), vec!["m-1"]);
    }

    #[test]
    fn test_insert_skips_unpageable_ids() {
        let db = create_test_db();
        let store = MessageStore::new(&db);
        let inserted = store
            .insert_items(&[
                Item::new("", "2026-01-01T00:01:00.000Z", "no id", "chat-1"),
                Item::new("a::b", "2026-01-01T00:02:00.000Z", "separator", "chat-1"),
                Item::new("m-3", "2026-01-01T00:03:00.000Z", "fine", "chat-1"),
            ])
            .expect("insert");
        assert_eq!(inserted, 1);
        assert_eq!(store.count().expect("count"), 1);
    }
}
