//! Data model shared by sources, the window and the controller

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;

/// One immutable entry of the ordered dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Globally unique id
    pub id: String,
    /// Monotonic timestamp (RFC 3339); primary ordering key
    pub sort_key: String,
    pub text: String,
    /// Conversation the item belongs to
    pub group_id: String,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        sort_key: impl Into<String>,
        text: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sort_key: sort_key.into(),
            text: text.into(),
            group_id: group_id.into(),
        }
    }
}

/// Global order: newest first, ties on `sort_key` broken by `id` descending
pub fn compare_desc(a_key: &str, a_id: &str, b_key: &str, b_id: &str) -> Ordering {
    b_key.cmp(a_key).then_with(|| b_id.cmp(a_id))
}

/// [`compare_desc`] over two items
pub fn compare_items(a: &Item, b: &Item) -> Ordering {
    compare_desc(&a.sort_key, &a.id, &b.sort_key, &b.id)
}

/// Side of a cursor a page is fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards the tail (smaller sort keys)
    Older,
    /// Towards the head (larger sort keys)
    Newer,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Older => write!(f, "older"),
            Direction::Newer => write!(f, "newer"),
        }
    }
}

/// A contiguous slice of the global order plus its boundary cursors
///
/// `prev_cursor` is `None` when nothing newer exists beyond the page,
/// `next_cursor` is `None` when nothing older exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<Item>,
    pub prev_cursor: Option<Cursor>,
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of an around-anchor fetch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AroundPage {
    pub page: Page,
    /// Id the slice is centered on; `None` only for an empty dataset
    pub resolved_anchor_id: Option<String>,
    /// Size of the whole dataset
    pub total_matches: usize,
}

/// Identifier of one query+anchor session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(pub u64);

impl RunId {
    pub fn next(self) -> Self {
        RunId(self.0 + 1)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, key: &str) -> Item {
        Item::new(id, key, "", "g")
    }

    #[test]
    fn test_newest_sorts_first() {
        let mut items = vec![
            item("a", "2026-01-01T00:01:00Z"),
            item("b", "2026-01-01T00:03:00Z"),
            item("c", "2026-01-01T00:02:00Z"),
        ];
        items.sort_by(compare_items);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_ties_broken_by_id_desc() {
        let mut items = vec![
            item("m-1", "2026-01-01T00:00:00Z"),
            item("m-3", "2026-01-01T00:00:00Z"),
            item("m-2", "2026-01-01T00:00:00Z"),
        ];
        items.sort_by(compare_items);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["m-3", "m-2", "m-1"]);
    }

    #[test]
    fn test_run_id_increments() {
        assert_eq!(RunId(4).next(), RunId(5));
        assert!(RunId(5) > RunId(4));
    }

    #[test]
    fn test_page_json_shape() {
        let item = item("m-2", "2026-01-01T00:02:00.000Z");
        let page = Page {
            next_cursor: Some(Cursor::for_item(&item)),
            items: vec![item],
            prev_cursor: None,
        };

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["next_cursor"], "2026-01-01T00:02:00.000Z::m-2");
        assert!(json["prev_cursor"].is_null());
        assert_eq!(json["items"][0]["sort_key"], "2026-01-01T00:02:00.000Z");

        let back: Page = serde_json::from_value(json).unwrap();
        assert_eq!(back, page);
    }
}
