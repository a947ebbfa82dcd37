//! In-memory data source
//!
//! Holds the whole dataset sorted in global order. Used by tests, the demo
//! dataset, and as a reference for what other backends must return.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use tracing::{debug, warn};

use super::{around_bounds, normalize_query, page_from_range, slice_page, DataSource};
use crate::cursor::Cursor;
use crate::error::SourceError;
use crate::types::{compare_items, AroundPage, Direction, Item, Page};

/// Group id of the demo conversation
pub const DEMO_GROUP_ID: &str = "chat-1";

/// Sorted in-memory rows behind the [`DataSource`] interface
pub struct MemorySource {
    rows: Vec<Item>,
    default_anchor_id: Option<String>,
    latency: Option<Duration>,
}

impl MemorySource {
    /// Build from rows in any order; duplicates by id keep the first occurrence
    ///
    /// Rows whose id cannot be carried by a cursor are dropped.
    pub fn new(mut rows: Vec<Item>) -> Self {
        let mut seen = std::collections::HashSet::new();
        rows.retain(|row| {
            if !Cursor::is_encodable_id(&row.id) {
                warn!(id = %row.id, "Dropping row whose id cannot be paged");
                return false;
            }
            seen.insert(row.id.clone())
        });
        rows.sort_by(compare_items);
        Self {
            rows,
            default_anchor_id: None,
            latency: None,
        }
    }

    /// Demo conversation of `total` messages with the stock default anchor
    pub fn demo(total: usize) -> Self {
        Self::new(demo_messages(total))
            .with_default_anchor(crate::constants::paging::DEFAULT_ANCHOR_ID)
    }

    /// Anchor used when a requested anchor is missing or unknown
    pub fn with_default_anchor(mut self, id: impl Into<String>) -> Self {
        self.default_anchor_id = Some(id.into());
        self
    }

    /// Delay every call, like a remote store would
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn rows(&self) -> &[Item] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.id == id)
    }

    /// Requested anchor, then default anchor, then the middle row
    fn resolve_anchor_index(&self, anchor_id: Option<&str>) -> Option<usize> {
        if self.rows.is_empty() {
            return None;
        }
        anchor_id
            .and_then(|id| self.position(id))
            .or_else(|| {
                self.default_anchor_id
                    .as_deref()
                    .and_then(|id| self.position(id))
            })
            .or(Some(self.rows.len() / 2))
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn fetch_page(
        &self,
        cursor: Option<&Cursor>,
        direction: Direction,
        limit: usize,
    ) -> Result<Page, SourceError> {
        self.simulate_latency().await;
        let page = slice_page(&self.rows, cursor, direction, limit);
        debug!(%direction, limit, items = page.items.len(), "memory fetch_page");
        Ok(page)
    }

    async fn fetch_around(
        &self,
        anchor_id: Option<&str>,
        radius: usize,
    ) -> Result<AroundPage, SourceError> {
        self.simulate_latency().await;

        let Some(anchor_index) = self.resolve_anchor_index(anchor_id) else {
            return Ok(AroundPage::default());
        };

        let (start, end) = around_bounds(self.rows.len(), anchor_index, radius);
        let resolved = self.rows[anchor_index].id.clone();
        debug!(requested = ?anchor_id, resolved = %resolved, start, end, "memory fetch_around");

        Ok(AroundPage {
            page: page_from_range(&self.rows, start, end),
            resolved_anchor_id: Some(resolved),
            total_matches: self.rows.len(),
        })
    }

    async fn fetch_subset(&self, query: &str, limit: usize) -> Result<Vec<Item>, SourceError> {
        self.simulate_latency().await;

        let needle = normalize_query(query);
        Ok(self
            .rows
            .iter()
            .filter(|row| needle.is_empty() || row.text.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Demo conversation: `m-0001..` one minute apart from 2026-01-01T00:00Z
///
/// Items 500 and every multiple of 37 or 53 carry the keyword `needle`;
/// item 500 also has a long unbroken token that stresses row wrapping.
pub fn demo_messages(total: usize) -> Vec<Item> {
    let start: DateTime<Utc> = Utc
        .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default();

    let mut rows: Vec<Item> = (1..=total)
        .map(|i| {
            let created_at = start + chrono::Duration::minutes(i as i64);
            let keyword = if i == 500 || i % 37 == 0 || i % 53 == 0 {
                " needle"
            } else {
                ""
            };
            let long_token = if i == 500 {
                " longtoken_without_breakpoints_longtoken_without_breakpoints"
            } else {
                ""
            };

            Item {
                id: format!("m-{i:04}"),
                sort_key: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                text: format!("Message {i}{keyword} lorem ipsum dolor sit amet{long_token}"),
                group_id: DEMO_GROUP_ID.to_string(),
            }
        })
        .collect();

    rows.sort_by(compare_items);
    rows
}
