//! SQLite-backed data source
//!
//! Runs each query on tokio's blocking pool against the shared connection.
//! Page cursors come from EXISTS probes at the slice edges rather than
//! offsets, so pages stay valid while the table grows.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{normalize_query, DataSource};
use crate::cursor::Cursor;
use crate::error::SourceError;
use crate::storage::{MessageStore, SharedDatabase};
use crate::types::{AroundPage, Direction, Item, Page};

/// [`DataSource`] over a SQLite message store
#[derive(Clone)]
pub struct SqliteSource {
    db: SharedDatabase,
    default_anchor_id: Option<String>,
}

impl SqliteSource {
    pub fn new(db: SharedDatabase) -> Self {
        Self {
            db,
            default_anchor_id: None,
        }
    }

    /// Anchor used when a requested anchor is missing or unknown
    pub fn with_default_anchor(mut self, id: Option<String>) -> Self {
        self.default_anchor_id = id;
        self
    }

    /// Run `f` against the store on the blocking pool
    async fn with_store<T, F>(&self, f: F) -> Result<T, SourceError>
    where
        T: Send + 'static,
        F: FnOnce(&MessageStore<'_>) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || {
            let guard = db.lock();
            let store = MessageStore::new(&guard);
            f(&store)
        })
        .await?;
        result.map_err(SourceError::from)
    }
}

/// Attach cursors to a contiguous slice by probing past its edges
fn page_from_items(store: &MessageStore<'_>, items: Vec<Item>) -> Result<Page> {
    let (Some(first), Some(last)) = (items.first(), items.last()) else {
        return Ok(Page::empty());
    };

    let prev_cursor = store
        .exists_newer(&first.sort_key, &first.id)?
        .then(|| Cursor::for_item(first));
    let next_cursor = store
        .exists_older(&last.sort_key, &last.id)?
        .then(|| Cursor::for_item(last));

    Ok(Page {
        items,
        prev_cursor,
        next_cursor,
    })
}

fn resolve_anchor(
    store: &MessageStore<'_>,
    anchor_id: Option<&str>,
    default_anchor_id: Option<&str>,
) -> Result<Option<Item>> {
    for id in [anchor_id, default_anchor_id].into_iter().flatten() {
        if let Some(item) = store.find(id)? {
            return Ok(Some(item));
        }
    }

    let count = store.count()?;
    if count == 0 {
        return Ok(None);
    }
    store.nth(count / 2)
}

#[async_trait]
impl DataSource for SqliteSource {
    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        direction: Direction,
        limit: usize,
    ) -> Result<Page, SourceError> {
        let boundary = match cursor {
            None => None,
            Some(cursor) => match cursor.parts() {
                Some(parts) => Some(parts),
                None => {
                    debug!(cursor = %cursor, "Malformed cursor, returning empty page");
                    return Ok(Page::empty());
                }
            },
        };

        self.with_store(move |store| {
            let items = match (boundary, direction) {
                (None, Direction::Older) => store.head(limit)?,
                (None, Direction::Newer) => return Ok(Page::empty()),
                (Some((key, id)), Direction::Older) => store.older_than(&key, &id, limit)?,
                (Some((key, id)), Direction::Newer) => store.newer_than(&key, &id, limit)?,
            };
            page_from_items(store, items)
        })
        .await
    }

    async fn fetch_around(
        &self,
        anchor_id: Option<&str>,
        radius: usize,
    ) -> Result<AroundPage, SourceError> {
        let anchor_id = anchor_id.map(str::to_string);
        let default_anchor_id = self.default_anchor_id.clone();

        self.with_store(move |store| {
            let Some(anchor) =
                resolve_anchor(store, anchor_id.as_deref(), default_anchor_id.as_deref())?
            else {
                return Ok(AroundPage::default());
            };

            let mut items = store.newer_than(&anchor.sort_key, &anchor.id, radius)?;
            let older = store.older_than(&anchor.sort_key, &anchor.id, radius)?;
            let resolved = anchor.id.clone();
            items.push(anchor);
            items.extend(older);

            debug!(requested = ?anchor_id, resolved = %resolved, items = items.len(), "sqlite fetch_around");

            Ok(AroundPage {
                page: page_from_items(store, items)?,
                resolved_anchor_id: Some(resolved),
                total_matches: store.count()?,
            })
        })
        .await
    }

    async fn fetch_subset(&self, query: &str, limit: usize) -> Result<Vec<Item>, SourceError> {
        let needle = normalize_query(query);
        self.with_store(move |store| store.search(&needle, limit))
            .await
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::source::{demo_messages, MemorySource};
    use crate::storage::Database;

    fn seeded(total: usize) -> (SqliteSource, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = Database::new(&temp_dir.path().join("test.db")).expect("Failed to create database");
        MessageStore::new(&db)
            .insert_items(&demo_messages(total))
            .expect("seed");
        let source = SqliteSource::new(db.into_shared())
            .with_default_anchor(Some("m-0500".to_string()));
        (source, temp_dir)
    }

    #[tokio::test]
    async fn test_head_page() {
        let (source, _temp) = seeded(1000);
        let page = source
            .fetch_page(None, Direction::Older, 20)
            .await
            .expect("page");

        assert_eq!(page.items.len(), 20);
        assert_eq!(page.items[0].id, "m-1000");
        assert!(page.prev_cursor.is_none());
        assert_eq!(page.next_cursor, Some(Cursor::for_item(&page.items[19])));
    }

    #[tokio::test]
    async fn test_around_matches_memory_source() {
        let (source, _temp) = seeded(1000);
        let memory = MemorySource::demo(1000);

        let sql = source.fetch_around(Some("m-0500"), 20).await.expect("around");
        let mem = memory.fetch_around(Some("m-0500"), 20).await.expect("around");

        assert_eq!(sql.page.items.len(), 41);
        assert_eq!(sql.resolved_anchor_id.as_deref(), Some("m-0500"));
        assert_eq!(sql, mem);
    }

    #[tokio::test]
    async fn test_around_default_and_middle() {
        let (source, _temp) = seeded(1000);
        let around = source.fetch_around(None, 2).await.expect("around");
        assert_eq!(around.resolved_anchor_id.as_deref(), Some("m-0500"));

        let no_default = source.clone().with_default_anchor(None);
        let middle = no_default.fetch_around(Some("missing"), 2).await.expect("around");
        // Index 500 of newest-first m-1000..m-0001
        assert_eq!(middle.resolved_anchor_id.as_deref(), Some("m-0500"));
    }

    #[tokio::test]
    async fn test_paging_agrees_with_memory_source() {
        let (source, _temp) = seeded(95);
        let memory = MemorySource::new(demo_messages(95));

        let mut sql_cursor = None;
        let mut mem_cursor = None;
        loop {
            let sql = source
                .fetch_page(sql_cursor.as_ref(), Direction::Older, 20)
                .await
                .expect("page");
            let mem = memory
                .fetch_page(mem_cursor.as_ref(), Direction::Older, 20)
                .await
                .expect("page");
            assert_eq!(sql, mem);

            if sql.next_cursor.is_none() {
                break;
            }
            sql_cursor = sql.next_cursor;
            mem_cursor = mem.next_cursor;
        }
    }

    #[tokio::test]
    async fn test_malformed_cursor_and_newer_head() {
        let (source, _temp) = seeded(10);
        let garbage = Cursor::from_token("not a cursor");
        let page = source
            .fetch_page(Some(&garbage), Direction::Older, 5)
            .await
            .expect("page");
        assert!(page.is_empty());

        let newer = source
            .fetch_page(None, Direction::Newer, 5)
            .await
            .expect("page");
        assert!(newer.is_empty());
    }

    #[tokio::test]
    async fn test_subset() {
        let (source, _temp) = seeded(1000);
        let hits = source.fetch_subset("NeEdLe", 120).await.expect("subset");
        let memory = MemorySource::demo(1000)
            .fetch_subset("needle", 120)
            .await
            .expect("subset");
        assert_eq!(hits, memory);
    }

    #[tokio::test]
    async fn test_subset_folds_case_like_memory() {
        let rows = vec![
            Item::new("m-1", "2026-01-01T00:01:00.000Z", "Ärger im Büro", "chat-1"),
            Item::new("m-2", "2026-01-01T00:02:00.000Z", "kein ärger", "chat-1"),
            Item::new("m-3", "2026-01-01T00:03:00.000Z", "Arger ohne Umlaut", "chat-1"),
        ];
        let db = Database::in_memory().expect("Failed to create database");
        MessageStore::new(&db).insert_items(&rows).expect("seed");
        let source = SqliteSource::new(db.into_shared());

        let hits = source.fetch_subset("ÄRGER", 10).await.expect("subset");
        let memory = MemorySource::new(rows)
            .fetch_subset("ÄRGER", 10)
            .await
            .expect("subset");
        assert_eq!(hits, memory);
        assert_eq!(
            hits.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["m-2", "m-1"]
        );
    }
}
