//! Data sources
//!
//! The ordered dataset the window pages through. The engine only talks to
//! the [`DataSource`] trait; two backends ship with the crate:
//! - [`MemorySource`]: sorted in-memory rows, optional simulated latency
//! - [`SqliteSource`]: keyset queries over a SQLite message store

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::cursor::Cursor;
use crate::error::SourceError;
use crate::types::{compare_desc, AroundPage, Direction, Item, Page};

mod memory;
mod sqlite;

pub use memory::{demo_messages, MemorySource, DEMO_GROUP_ID};
pub use sqlite::SqliteSource;

/// Range-scan, around-anchor and substring queries over the ordered dataset
///
/// Calls may overlap and complete in any order; implementations must not
/// assume a single outstanding request.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Up to `limit` items strictly on `direction`'s side of `cursor`
    ///
    /// `None` + `Older` is the head of the dataset, `None` + `Newer` is empty.
    /// A malformed cursor yields an empty page.
    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        direction: Direction,
        limit: usize,
    ) -> Result<Page, SourceError>;

    /// The `2 * radius + 1` slice centered on `anchor_id`
    ///
    /// Unknown or missing anchors fall back to the default anchor, then to
    /// the middle item.
    async fn fetch_around(
        &self,
        anchor_id: Option<&str>,
        radius: usize,
    ) -> Result<AroundPage, SourceError>;

    /// Case-insensitive substring matches on `text`, in global order
    async fn fetch_subset(&self, query: &str, limit: usize) -> Result<Vec<Item>, SourceError>;
}

/// Normalize a substring query; empty means "match everything"
pub(crate) fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Where `row` sits relative to a `(sort_key, id)` boundary
fn relative_to(row: &Item, sort_key: &str, id: &str) -> Ordering {
    compare_desc(&row.sort_key, &row.id, sort_key, id)
}

/// Index of the first row strictly older than the boundary
pub(crate) fn older_start(rows: &[Item], sort_key: &str, id: &str) -> usize {
    rows.partition_point(|row| relative_to(row, sort_key, id) != Ordering::Greater)
}

/// One past the last row strictly newer than the boundary
pub(crate) fn newer_end(rows: &[Item], sort_key: &str, id: &str) -> usize {
    rows.partition_point(|row| relative_to(row, sort_key, id) == Ordering::Less)
}

/// Page for `rows[start..end]`, cursors derived from the slice's true position
pub(crate) fn page_from_range(rows: &[Item], start: usize, end: usize) -> Page {
    let end = end.min(rows.len());
    if start >= end {
        return Page::empty();
    }

    let items = rows[start..end].to_vec();
    let prev_cursor = (start > 0).then(|| Cursor::for_item(&items[0]));
    let next_cursor = (end < rows.len()).then(|| Cursor::for_item(&items[items.len() - 1]));

    Page {
        items,
        prev_cursor,
        next_cursor,
    }
}

/// Slice bounds of the around window for `anchor_index`, clipped to the dataset
pub(crate) fn around_bounds(len: usize, anchor_index: usize, radius: usize) -> (usize, usize) {
    let start = anchor_index.saturating_sub(radius);
    let end = anchor_index.saturating_add(radius).saturating_add(1).min(len);
    (start, end)
}

/// Cursor page over sorted rows; shared by the in-memory source
pub(crate) fn slice_page(
    rows: &[Item],
    cursor: Option<&Cursor>,
    direction: Direction,
    limit: usize,
) -> Page {
    let Some(cursor) = cursor else {
        return match direction {
            Direction::Older => page_from_range(rows, 0, limit),
            Direction::Newer => Page::empty(),
        };
    };

    let Some((sort_key, id)) = cursor.parts() else {
        tracing::debug!(cursor = %cursor, "Malformed cursor, returning empty page");
        return Page::empty();
    };

    match direction {
        Direction::Older => {
            let start = older_start(rows, &sort_key, &id);
            page_from_range(rows, start, start.saturating_add(limit))
        }
        Direction::Newer => {
            let end = newer_end(rows, &sort_key, &id);
            page_from_range(rows, end.saturating_sub(limit), end)
        }
    }
}
