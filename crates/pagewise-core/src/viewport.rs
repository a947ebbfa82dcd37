//! Viewport abstraction
//!
//! The engine never renders; it drives whatever scroll surface the host
//! provides through [`Viewport`]. [`VirtualList`] is a headless
//! implementation with estimated and measured row heights, used by the CLI
//! and the tests in place of a real renderer.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::types::Item;

/// Where a row should land when scrolled to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
}

/// Host scroll surface over the window's rows (index = position in the window)
pub trait Viewport {
    /// Current scroll offset in pixels (0 = top)
    fn scroll_offset(&self) -> f32;

    /// Set the scroll offset; implementations clamp to their scrollable range
    fn set_scroll_offset(&mut self, offset: f32);

    /// Scroll so that row `index` sits at `align`
    fn scroll_to_index(&mut self, index: usize, align: Align);

    /// Rows at least partially visible
    fn visible_range(&self) -> Range<usize>;

    fn viewport_height(&self) -> f32;

    /// Height of all rows laid out
    fn content_height(&self) -> f32;

    /// Whether row `index` currently occupies the `align` position
    fn is_aligned(&self, index: usize, align: Align) -> bool {
        let range = self.visible_range();
        match align {
            Align::Start => range.start == index,
            Align::End => range.end == index + 1,
            Align::Center => range.contains(&index),
        }
    }
}

/// Headless virtualized list keyed by item id
///
/// Rows without a measurement are laid out at the estimate. Measuring a row
/// shifts everything below it, just like a real renderer discovering true
/// heights, so a single `scroll_to_index` can miss its target.
#[derive(Debug, Clone)]
pub struct VirtualList {
    keys: Vec<String>,
    measured: HashMap<String, f32>,
    estimate: f32,
    viewport_height: f32,
    offset: f32,
}

impl VirtualList {
    pub fn new(estimate: f32, viewport_height: f32) -> Self {
        Self {
            keys: Vec::new(),
            measured: HashMap::new(),
            estimate,
            viewport_height: viewport_height.max(0.0),
            offset: 0.0,
        }
    }

    /// Replace the rows; measurements are kept by id, the offset is untouched
    ///
    /// The offset is only clamped on the next `set_scroll_offset`, so a
    /// correction owed for rows evicted above still starts from the old
    /// position.
    pub fn sync_items(&mut self, items: &[Item]) {
        self.keys = items.iter().map(|item| item.id.clone()).collect();
    }

    /// Forget all rows and measurements (new run)
    pub fn reset(&mut self) {
        self.keys.clear();
        self.measured.clear();
        self.offset = 0.0;
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Record a row's real height
    pub fn measure(&mut self, id: &str, height: f32) {
        self.measured.insert(id.to_string(), height.max(0.0));
    }

    /// Measure every visible row that has not been measured yet
    ///
    /// Returns the new measurements so the host can forward them to the
    /// controller's height cache.
    pub fn render(&mut self, true_height: impl Fn(&str) -> f32) -> Vec<(String, f32)> {
        let fresh: Vec<(String, f32)> = self.keys[self.visible_range()]
            .iter()
            .filter(|id| !self.measured.contains_key(*id))
            .map(|id| (id.clone(), true_height(id)))
            .collect();

        for (id, height) in &fresh {
            self.measure(id, *height);
        }
        fresh
    }

    fn height_at(&self, index: usize) -> f32 {
        self.keys
            .get(index)
            .and_then(|id| self.measured.get(id))
            .copied()
            .unwrap_or(self.estimate)
    }

    /// Top edge of row `index`
    pub fn row_start(&self, index: usize) -> f32 {
        (0..index.min(self.keys.len())).map(|i| self.height_at(i)).sum()
    }

    fn max_offset(&self) -> f32 {
        (self.content_height() - self.viewport_height).max(0.0)
    }
}

impl Viewport for VirtualList {
    fn scroll_offset(&self) -> f32 {
        self.offset
    }

    fn set_scroll_offset(&mut self, offset: f32) {
        self.offset = offset.clamp(0.0, self.max_offset());
    }

    fn scroll_to_index(&mut self, index: usize, align: Align) {
        if self.keys.is_empty() {
            return;
        }
        let index = index.min(self.keys.len() - 1);
        let start = self.row_start(index);
        let height = self.height_at(index);
        let target = match align {
            Align::Start => start,
            Align::Center => start - (self.viewport_height - height) / 2.0,
            Align::End => start + height - self.viewport_height,
        };
        self.set_scroll_offset(target);
    }

    fn visible_range(&self) -> Range<usize> {
        let top = self.offset;
        let bottom = self.offset + self.viewport_height;
        let mut first = None;
        let mut end = 0;
        let mut y = 0.0;

        for index in 0..self.keys.len() {
            let height = self.height_at(index);
            let row_end = y + height;
            if row_end > top && y < bottom {
                first.get_or_insert(index);
                end = index + 1;
            } else if y >= bottom {
                break;
            }
            y = row_end;
        }

        match first {
            Some(first) => first..end,
            None => 0..0,
        }
    }

    fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    fn content_height(&self) -> f32 {
        (0..self.keys.len()).map(|i| self.height_at(i)).sum()
    }

    fn is_aligned(&self, index: usize, align: Align) -> bool {
        if index >= self.keys.len() {
            return false;
        }
        let start = self.row_start(index);
        let height = self.height_at(index);
        let expected = match align {
            Align::Start => start,
            Align::Center => start - (self.viewport_height - height) / 2.0,
            Align::End => start + height - self.viewport_height,
        }
        .clamp(0.0, self.max_offset());
        (self.offset - expected).abs() < 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::demo_messages;

    fn list(rows: usize) -> VirtualList {
        let mut list = VirtualList::new(50.0, 200.0);
        list.sync_items(&demo_messages(rows));
        list
    }

    #[test]
    fn test_visible_range_at_top() {
        let list = list(20);
        assert_eq!(list.visible_range(), 0..4);
        assert_eq!(list.content_height(), 1000.0);
    }

    #[test]
    fn test_scroll_to_index_start() {
        let mut list = list(20);
        list.scroll_to_index(5, Align::Start);
        assert_eq!(list.scroll_offset(), 250.0);
        assert_eq!(list.visible_range().start, 5);
        assert!(list.is_aligned(5, Align::Start));
    }

    #[test]
    fn test_offset_clamps() {
        let mut list = list(20);
        list.set_scroll_offset(-10.0);
        assert_eq!(list.scroll_offset(), 0.0);
        list.set_scroll_offset(10_000.0);
        assert_eq!(list.scroll_offset(), 800.0);
    }

    #[test]
    fn test_measuring_rows_above_breaks_alignment() {
        let mut list = list(20);
        list.scroll_to_index(5, Align::Start);
        let first = list.keys[0].clone();
        list.measure(&first, 120.0);
        assert!(!list.is_aligned(5, Align::Start));
        list.scroll_to_index(5, Align::Start);
        assert!(list.is_aligned(5, Align::Start));
    }

    #[test]
    fn test_render_measures_visible_rows_once() {
        let mut list = list(20);
        let first = list.render(|_| 40.0);
        assert_eq!(first.len(), 4);
        // Rows shrank, so more became visible; only those are fresh
        let second = list.render(|_| 40.0);
        assert_eq!(second.len(), 1);
        assert!(list.render(|_| 40.0).is_empty());
    }

    #[test]
    fn test_sync_keeps_measurements_by_id() {
        let rows = demo_messages(10);
        let mut list = VirtualList::new(50.0, 100.0);
        list.sync_items(&rows[2..]);
        list.measure(&rows[2].id, 80.0);
        list.sync_items(&rows);
        assert_eq!(list.row_start(3), 50.0 + 50.0 + 80.0);
    }

    #[test]
    fn test_sync_leaves_offset_for_correction() {
        let rows = demo_messages(20);
        let mut list = VirtualList::new(50.0, 200.0);
        list.sync_items(&rows);
        list.set_scroll_offset(800.0);

        // Top eight rows evicted: the old offset minus their height keeps row 16
        list.sync_items(&rows[8..]);
        assert_eq!(list.scroll_offset(), 800.0);
        list.set_scroll_offset(list.scroll_offset() - 400.0);
        assert_eq!(list.scroll_offset(), 400.0);
        assert_eq!(list.visible_range().start, 8);
    }
}
