//! Scroll anchoring across page merges
//!
//! Splicing a page into the window must not move rows already on screen.
//! Every edge fetch announces its intent up front (prepend for newer pages,
//! append for older ones); the merge records which rows were inserted above,
//! or evicted from above, and the next frame moves the offset by their
//! heights as measured by then.

use std::collections::{HashMap, HashSet};

use crate::types::RunId;

/// Last measured pixel height per item id, scoped to one run
#[derive(Debug, Clone)]
pub struct RowHeights {
    heights: HashMap<String, f32>,
    estimate: f32,
}

impl RowHeights {
    pub fn new(estimate: f32) -> Self {
        Self {
            heights: HashMap::new(),
            estimate,
        }
    }

    /// Record a row's rendered height
    pub fn record(&mut self, id: &str, height: f32) {
        if height.is_finite() && height >= 0.0 {
            self.heights.insert(id.to_string(), height);
        }
    }

    /// Measured height, if the row was ever rendered
    pub fn measured(&self, id: &str) -> Option<f32> {
        self.heights.get(id).copied()
    }

    /// Measured height or the estimate
    pub fn height_of(&self, id: &str) -> f32 {
        self.measured(id).unwrap_or(self.estimate)
    }

    pub fn sum<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> f32 {
        ids.into_iter().map(|id| self.height_of(id)).sum()
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    pub fn clear(&mut self) {
        self.heights.clear();
    }
}

/// What an edge fetch will do to the head of the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeIntent {
    /// Newer rows go in above the current first row
    Prepend,
    /// Older rows go in at the bottom; retention may evict rows from the top
    Append,
}

/// Rows that moved in or out above the first surviving row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowShift {
    pub inserted_above: Vec<String>,
    pub removed_above: Vec<String>,
}

impl RowShift {
    pub fn is_empty(&self) -> bool {
        self.inserted_above.is_empty() && self.removed_above.is_empty()
    }

    /// Signed offset delta with the heights known right now
    pub fn delta(&self, heights: &RowHeights) -> f32 {
        heights.sum(self.inserted_above.iter().map(String::as_str))
            - heights.sum(self.removed_above.iter().map(String::as_str))
    }

    pub fn extend(&mut self, other: RowShift) {
        self.inserted_above.extend(other.inserted_above);
        self.removed_above.extend(other.removed_above);
    }
}

/// Offset correction owed to the viewport, resolved on the next frame
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCorrection {
    pub run: RunId,
    pub shift: RowShift,
}

impl PendingCorrection {
    /// Fold another merge of the same run into this one
    pub fn absorb(&mut self, shift: RowShift) {
        self.shift.extend(shift);
    }
}

/// Position of the first element of `probe` that also appears in `reference`,
/// as `(index_in_probe, index_in_reference)`
fn first_common(probe: &[&str], reference: &[&str]) -> Option<(usize, usize)> {
    let positions: HashMap<&str, usize> = reference
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();

    probe
        .iter()
        .enumerate()
        .find_map(|(index, id)| positions.get(id).map(|other| (index, *other)))
}

/// Scroll offset bookkeeping for page merges
pub struct ScrollAnchor;

impl ScrollAnchor {
    /// Rows shifted above the viewport by a merge from `old_ids` to `new_ids`
    ///
    /// Prepend: the first surviving old row's index in the new sequence counts
    /// the rows inserted above it. Append: the first new row's index in the
    /// old sequence counts the rows evicted above it.
    pub fn shift(intent: MergeIntent, old_ids: &[&str], new_ids: &[&str]) -> RowShift {
        let mut shift = RowShift::default();
        match intent {
            MergeIntent::Prepend => {
                if let Some((_, inserted)) = first_common(old_ids, new_ids) {
                    let kept: HashSet<&str> = old_ids.iter().copied().collect();
                    shift.inserted_above = new_ids[..inserted]
                        .iter()
                        .filter(|id| !kept.contains(*id))
                        .map(|id| id.to_string())
                        .collect();
                }
            }
            MergeIntent::Append => {
                if let Some((_, removed)) = first_common(new_ids, old_ids) {
                    let kept: HashSet<&str> = new_ids.iter().copied().collect();
                    shift.removed_above = old_ids[..removed]
                        .iter()
                        .filter(|id| !kept.contains(*id))
                        .map(|id| id.to_string())
                        .collect();
                }
            }
        }
        shift
    }

    /// New offset after applying `delta`, never above the top
    pub fn apply_correction(offset: f32, delta: f32) -> f32 {
        (offset + delta).max(0.0)
    }
}
