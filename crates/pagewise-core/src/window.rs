//! Window manager
//!
//! Owns the materialized window: the deduplicated, ordered concatenation of
//! the retained pages. Fetches are modelled as [`FetchRequest`] tickets
//! handed out by `start_run` / `request_older` / `request_newer` and resolved
//! by [`WindowManager::apply`], so the manager itself stays synchronous and
//! can decide, when a result arrives, whether it may still be merged.
//!
//! State machine:
//! `Idle -> LoadingInitial -> Ready` with independent older/newer in-flight
//! flags while `Ready`; `Error` from any loading state.
//!
//! Retention: at most `max_pages` pages and `max_pages * page_size` items.
//! Growth on one edge evicts whole pages from the other. An edge fetch is
//! only merged while the page it was cut from is still that edge's page, so
//! the window always stays a contiguous run of the global order.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use crate::anchor::MergeIntent;
use crate::cursor::Cursor;
use crate::error::SourceError;
use crate::types::{AroundPage, Item, Page, RunId};

/// Coarse window state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Idle,
    LoadingInitial,
    Ready,
    Error,
}

/// Which part of the window a fetch feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Initial,
    Older,
    Newer,
}

impl Edge {
    /// Scroll intent announced for fetches on this edge
    pub fn intent(self) -> Option<MergeIntent> {
        match self {
            Edge::Initial => None,
            Edge::Older => Some(MergeIntent::Append),
            Edge::Newer => Some(MergeIntent::Prepend),
        }
    }
}

/// What to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchKind {
    /// First page of a run: around `anchor`, or the head when `None`
    Initial { anchor: Option<String> },
    Older { cursor: Cursor },
    Newer { cursor: Cursor },
}

/// A fetch ticket tagged with the run that issued it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub run: RunId,
    pub kind: FetchKind,
}

impl FetchRequest {
    pub fn edge(&self) -> Edge {
        match self.kind {
            FetchKind::Initial { .. } => Edge::Initial,
            FetchKind::Older { .. } => Edge::Older,
            FetchKind::Newer { .. } => Edge::Newer,
        }
    }
}

/// Page returned for a [`FetchRequest`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    pub page: Page,
    pub resolved_anchor_id: Option<String>,
    pub total_matches: Option<usize>,
}

impl From<Page> for FetchedPage {
    fn from(page: Page) -> Self {
        Self {
            page,
            ..Default::default()
        }
    }
}

impl From<AroundPage> for FetchedPage {
    fn from(around: AroundPage) -> Self {
        Self {
            page: around.page,
            resolved_anchor_id: around.resolved_anchor_id,
            total_matches: Some(around.total_matches),
        }
    }
}

/// A finished fetch, successful or not
#[derive(Debug, Clone)]
pub struct FetchCompletion {
    pub request: FetchRequest,
    pub result: Result<FetchedPage, SourceError>,
}

/// Why a completion was dropped without touching the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Issued by a run that has since been replaced
    StaleRun,
    /// The edge is no longer loading (window errored, or already resolved)
    NotInFlight,
    /// The page the request continued from was evicted in the meantime
    BaseEvicted,
}

/// Successful merge summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub run: RunId,
    pub edge: Edge,
    /// Window ids before the merge
    pub previous_ids: Vec<String>,
    pub added: usize,
    pub evicted_pages: usize,
}

/// Result of [`WindowManager::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Merged(MergeOutcome),
    Failed(SourceError),
    Discarded(DiscardReason),
}

/// Paged, bounded window over the ordered dataset
#[derive(Debug)]
pub struct WindowManager {
    max_pages: usize,
    page_size: usize,
    run: RunId,
    state: WindowState,
    pages: VecDeque<Page>,
    items: Vec<Item>,
    has_older: bool,
    has_newer: bool,
    older_in_flight: bool,
    newer_in_flight: bool,
    resolved_anchor_id: Option<String>,
    total_matches: Option<usize>,
    error: Option<SourceError>,
}

impl WindowManager {
    pub fn new(max_pages: usize, page_size: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
            page_size: page_size.max(1),
            run: RunId::default(),
            state: WindowState::Idle,
            pages: VecDeque::new(),
            items: Vec::new(),
            has_older: false,
            has_newer: false,
            older_in_flight: false,
            newer_in_flight: false,
            resolved_anchor_id: None,
            total_matches: None,
            error: None,
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Discard the window and issue the initial fetch of `run`
    pub fn start_run(&mut self, run: RunId, anchor: Option<String>) -> FetchRequest {
        *self = Self::new(self.max_pages, self.page_size);
        self.run = run;
        self.state = WindowState::LoadingInitial;
        FetchRequest {
            run,
            kind: FetchKind::Initial { anchor },
        }
    }

    /// Ticket for the next older page, unless one is pointless or already in flight
    pub fn request_older(&mut self) -> Option<FetchRequest> {
        if self.state != WindowState::Ready || !self.has_older || self.older_in_flight {
            return None;
        }
        let cursor = self.pages.back()?.next_cursor.clone()?;
        self.older_in_flight = true;
        debug!(run = %self.run, cursor = %cursor, "Requesting older page");
        Some(FetchRequest {
            run: self.run,
            kind: FetchKind::Older { cursor },
        })
    }

    /// Ticket for the next newer page, unless one is pointless or already in flight
    pub fn request_newer(&mut self) -> Option<FetchRequest> {
        if self.state != WindowState::Ready || !self.has_newer || self.newer_in_flight {
            return None;
        }
        let cursor = self.pages.front()?.prev_cursor.clone()?;
        self.newer_in_flight = true;
        debug!(run = %self.run, cursor = %cursor, "Requesting newer page");
        Some(FetchRequest {
            run: self.run,
            kind: FetchKind::Newer { cursor },
        })
    }

    // =========================================================================
    // Completions
    // =========================================================================

    /// Merge a completion if it still belongs here
    ///
    /// Only successful completions of the current run for an edge that is
    /// still loading change the window. Failures leave the items untouched
    /// and move the window to `Error`.
    pub fn apply(&mut self, completion: FetchCompletion) -> ApplyOutcome {
        let FetchCompletion { request, result } = completion;
        let edge = request.edge();

        if request.run != self.run {
            debug!(run = %request.run, current = %self.run, ?edge, "Discarding stale completion");
            return ApplyOutcome::Discarded(DiscardReason::StaleRun);
        }

        let in_flight = match edge {
            Edge::Initial => self.state == WindowState::LoadingInitial,
            Edge::Older => self.state == WindowState::Ready && self.older_in_flight,
            Edge::Newer => self.state == WindowState::Ready && self.newer_in_flight,
        };
        if !in_flight {
            debug!(run = %self.run, ?edge, state = ?self.state, "Discarding completion with no matching request");
            return ApplyOutcome::Discarded(DiscardReason::NotInFlight);
        }

        if !self.continues_edge(&request.kind) {
            debug!(run = %self.run, ?edge, "Discarding completion whose base page was evicted");
            return ApplyOutcome::Discarded(DiscardReason::BaseEvicted);
        }

        match edge {
            Edge::Older => self.older_in_flight = false,
            Edge::Newer => self.newer_in_flight = false,
            Edge::Initial => {}
        }

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(run = %self.run, ?edge, error = %err, "Fetch failed");
                self.state = WindowState::Error;
                self.error = Some(err.clone());
                return ApplyOutcome::Failed(err);
            }
        };

        let previous_ids: Vec<String> = self.items.iter().map(|item| item.id.clone()).collect();
        let added = fetched.page.items.len();
        let evicted_pages = match edge {
            Edge::Initial => {
                self.merge_initial(fetched);
                0
            }
            Edge::Older => self.merge_older(fetched.page),
            Edge::Newer => self.merge_newer(fetched.page),
        };
        self.rebuild();

        debug!(
            run = %self.run,
            ?edge,
            added,
            evicted_pages,
            pages = self.pages.len(),
            items = self.items.len(),
            has_older = self.has_older,
            has_newer = self.has_newer,
            "Merged page"
        );

        ApplyOutcome::Merged(MergeOutcome {
            run: self.run,
            edge,
            previous_ids,
            added,
            evicted_pages,
        })
    }

    /// Whether an edge ticket still continues the page currently on that edge
    fn continues_edge(&self, kind: &FetchKind) -> bool {
        match kind {
            FetchKind::Initial { .. } => true,
            FetchKind::Older { cursor } => self
                .pages
                .back()
                .is_some_and(|page| page.next_cursor.as_ref() == Some(cursor)),
            FetchKind::Newer { cursor } => self
                .pages
                .front()
                .is_some_and(|page| page.prev_cursor.as_ref() == Some(cursor)),
        }
    }

    fn max_items(&self) -> usize {
        self.max_pages * self.page_size
    }

    fn retained_items(&self) -> usize {
        self.pages.iter().map(|page| page.items.len()).sum()
    }

    /// Over either cap, with more than the newest-merged page left to drop
    fn over_capacity(&self) -> bool {
        self.pages.len() > 1
            && (self.pages.len() > self.max_pages || self.retained_items() > self.max_items())
    }

    fn merge_initial(&mut self, fetched: FetchedPage) {
        self.has_older = fetched.page.next_cursor.is_some();
        self.has_newer = fetched.page.prev_cursor.is_some();
        self.resolved_anchor_id = fetched.resolved_anchor_id;
        self.total_matches = fetched.total_matches;
        if !fetched.page.is_empty() {
            self.pages.push_back(fetched.page);
        }
        self.state = WindowState::Ready;
    }

    /// Append at the tail; evict from the head while over the cap
    fn merge_older(&mut self, page: Page) -> usize {
        self.has_older = page.next_cursor.is_some();
        if page.is_empty() {
            return 0;
        }
        self.pages.push_back(page);

        let mut evicted = 0;
        while self.over_capacity() {
            self.pages.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            // A pending newer fetch continued the page that just went away
            self.newer_in_flight = false;
        }
        if let Some(front) = self.pages.front() {
            self.has_newer = front.prev_cursor.is_some();
        }
        evicted
    }

    /// Prepend at the head; evict from the tail while over the cap
    fn merge_newer(&mut self, page: Page) -> usize {
        self.has_newer = page.prev_cursor.is_some();
        if page.is_empty() {
            return 0;
        }
        self.pages.push_front(page);

        let mut evicted = 0;
        while self.over_capacity() {
            self.pages.pop_back();
            evicted += 1;
        }
        if evicted > 0 {
            // A pending older fetch continued the page that just went away
            self.older_in_flight = false;
        }
        if let Some(back) = self.pages.back() {
            self.has_older = back.next_cursor.is_some();
        }
        evicted
    }

    /// Concatenate retained pages, first occurrence of an id wins
    fn rebuild(&mut self) {
        let mut seen = HashSet::new();
        self.items = self
            .pages
            .iter()
            .flat_map(|page| page.items.iter())
            .filter(|item| seen.insert(item.id.as_str()))
            .cloned()
            .collect();
    }

    // =========================================================================
    // Observable state
    // =========================================================================

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn has_older(&self) -> bool {
        self.has_older
    }

    pub fn has_newer(&self) -> bool {
        self.has_newer
    }

    pub fn is_loading_initial(&self) -> bool {
        self.state == WindowState::LoadingInitial
    }

    pub fn is_loading_older(&self) -> bool {
        self.older_in_flight
    }

    pub fn is_loading_newer(&self) -> bool {
        self.newer_in_flight
    }

    pub fn resolved_anchor_id(&self) -> Option<&str> {
        self.resolved_anchor_id.as_deref()
    }

    pub fn total_matches(&self) -> Option<usize> {
        self.total_matches
    }

    pub fn error(&self) -> Option<&SourceError> {
        self.error.as_ref()
    }
}
