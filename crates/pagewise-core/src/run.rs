//! Run controller
//!
//! Owns the lifecycle of a search run (query + anchor) and wires the window,
//! scroll anchor, centering loop and preview index to the data source.
//!
//! Data source calls run as tokio tasks and report back over a channel; the
//! host feeds those events through [`RunController::handle`] one at a time,
//! and calls [`RunController::on_frame`] after each render. State therefore
//! only changes on the host's own task, in the order it handles events, and
//! every completion is checked against the current run before it is merged.
//!
//! Named event handlers and when they fire:
//! - `on_run_started`: `run_search`, `load_latest` or `jump_to_candidate`
//! - `on_page_merged`: a fetch of the current run was merged into the window
//! - `on_frame`: the host finished laying out a frame
//! - `on_proximity`: from `on_frame`, once the run is centered

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::anchor::ScrollAnchor;
use crate::centering::{CenteringLoop, CenteringStep};
use crate::config::PagingConfig;
use crate::constants::viewport::FILL_SLACK_PX;
use crate::error::SourceError;
use crate::preview::{PreviewCompletion, PreviewIndex};
use crate::session::RunSession;
use crate::source::DataSource;
use crate::types::{Direction, Item, RunId};
use crate::viewport::Viewport;
use crate::window::{
    ApplyOutcome, FetchCompletion, FetchKind, FetchRequest, FetchedPage, MergeOutcome,
    WindowManager, WindowState,
};

/// Asynchronous result delivered back to the controller
#[derive(Debug)]
pub enum EngineEvent {
    Fetch(FetchCompletion),
    Preview(PreviewCompletion),
}

/// What handling an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Window(ApplyOutcome),
    Preview { applied: bool },
}

/// What one frame step did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Offset was reset to the top for a new run
    pub scroll_reset: bool,
    /// Deferred merge correction that was applied
    pub correction: Option<f32>,
    /// Centering loop progress, while one is active
    pub centering: Option<CenteringStep>,
    pub requested_older: bool,
    pub requested_newer: bool,
}

/// Resolve a fetch ticket against the source
async fn fetch(
    source: &dyn DataSource,
    kind: FetchKind,
    page_size: usize,
    around_count: usize,
) -> Result<FetchedPage, SourceError> {
    match kind {
        FetchKind::Initial { anchor: None } => source
            .fetch_page(None, Direction::Older, page_size)
            .await
            .map(FetchedPage::from),
        FetchKind::Initial {
            anchor: Some(anchor),
        } => source
            .fetch_around(Some(&anchor), around_count)
            .await
            .map(FetchedPage::from),
        FetchKind::Older { cursor } => source
            .fetch_page(Some(&cursor), Direction::Older, page_size)
            .await
            .map(FetchedPage::from),
        FetchKind::Newer { cursor } => source
            .fetch_page(Some(&cursor), Direction::Newer, page_size)
            .await
            .map(FetchedPage::from),
    }
}

/// Search-run lifecycle and the operations exposed to the UI layer
pub struct RunController {
    source: Arc<dyn DataSource>,
    config: PagingConfig,
    window: WindowManager,
    preview: PreviewIndex,
    session: RunSession,
    search_input: String,
    active_term: String,
    active_anchor: Option<String>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl RunController {
    pub fn new(source: Arc<dyn DataSource>, config: PagingConfig) -> Self {
        let config = config.validate();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            source,
            window: WindowManager::new(config.max_pages(), config.page_size),
            preview: PreviewIndex::new(config.candidate_limit),
            session: RunSession::new(RunId::default(), config.estimated_row_height),
            config,
            search_input: String::new(),
            active_term: String::new(),
            active_anchor: None,
            events_tx,
            events_rx,
        }
    }

    // =========================================================================
    // UI operations
    // =========================================================================

    /// Start a run for `term` centered on `anchor`
    ///
    /// An empty term shows the latest items instead. A blank anchor falls
    /// back to the configured default anchor.
    pub fn run_search(&mut self, term: &str, anchor: Option<&str>) -> RunId {
        let term = term.trim();
        if term.is_empty() {
            return self.load_latest();
        }

        let anchor = anchor
            .map(str::trim)
            .filter(|anchor| !anchor.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.default_anchor_id.clone());

        self.active_term = term.to_string();
        self.active_anchor = anchor.clone();
        self.on_run_started(anchor)
    }

    /// Start an unanchored run at the head of the dataset
    pub fn load_latest(&mut self) -> RunId {
        self.active_term.clear();
        self.active_anchor = None;
        self.on_run_started(None)
    }

    /// Start a run anchored on a preview candidate
    ///
    /// Ignored while the search input is empty.
    pub fn jump_to_candidate(&mut self, id: &str) -> Option<RunId> {
        let term = self.search_input.trim().to_string();
        if term.is_empty() {
            return None;
        }

        self.active_term = term;
        self.active_anchor = Some(id.to_string());
        Some(self.on_run_started(Some(id.to_string())))
    }

    /// Fetch the next older page; false if nothing was requested
    pub fn load_older(&mut self) -> bool {
        match self.window.request_older() {
            Some(request) => {
                self.spawn_fetch(request);
                true
            }
            None => false,
        }
    }

    /// Fetch the next newer page; false if nothing was requested
    pub fn load_newer(&mut self) -> bool {
        match self.window.request_newer() {
            Some(request) => {
                self.spawn_fetch(request);
                true
            }
            None => false,
        }
    }

    /// Update the raw search text; refreshes the candidate list when the
    /// normalized query changes
    pub fn set_search_input(&mut self, text: &str) {
        self.search_input = text.to_string();
        let Some((request, token)) = self.preview.update(text) else {
            return;
        };

        let source = Arc::clone(&self.source);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let generation = request.generation;
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(generation, "Preview fetch superseded");
                }
                result = source.fetch_subset(&request.query, request.limit) => {
                    let _ = tx.send(EngineEvent::Preview(PreviewCompletion { generation, result }));
                }
            }
        });
    }

    /// Record a rendered row's height for scroll corrections
    pub fn measure_row(&mut self, id: &str, height: f32) {
        self.session.heights.record(id, height);
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Wait for the next asynchronous result
    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events_rx.recv().await
    }

    /// Next result if one is already waiting
    pub fn try_next_event(&mut self) -> Option<EngineEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Wait for and handle the next asynchronous result
    pub async fn handle_next(&mut self) -> Option<EventOutcome> {
        let event = self.next_event().await?;
        Some(self.handle(event))
    }

    /// Handle every result that is already waiting; returns how many
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.try_next_event() {
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Apply one asynchronous result
    pub fn handle(&mut self, event: EngineEvent) -> EventOutcome {
        match event {
            EngineEvent::Fetch(completion) => {
                let outcome = self.window.apply(completion);
                if let ApplyOutcome::Merged(merge) = &outcome {
                    self.on_page_merged(merge);
                }
                EventOutcome::Window(outcome)
            }
            EngineEvent::Preview(completion) => EventOutcome::Preview {
                applied: self.preview.apply(completion),
            },
        }
    }

    /// Next-render signal from the host
    ///
    /// Applies the top-of-run reset and any deferred merge correction, steps
    /// the centering loop, then checks edge proximity.
    pub fn on_frame(&mut self, viewport: &mut dyn Viewport) -> FrameReport {
        let mut report = FrameReport::default();

        if self.session.scroll_reset_pending {
            self.session.scroll_reset_pending = false;
            viewport.set_scroll_offset(0.0);
            report.scroll_reset = true;
        }

        if let Some(pending) = self.session.pending_correction.take() {
            if pending.run == self.session.run() {
                // Heights measured since the merge count
                let delta = pending.shift.delta(self.session.heights());
                let offset = ScrollAnchor::apply_correction(viewport.scroll_offset(), delta);
                viewport.set_scroll_offset(offset);
                report.correction = Some(delta);
            }
        }

        if let Some(mut centering) = self.session.centering.take() {
            let step = if centering.run() == self.session.run() {
                let index = self.window.index_of(centering.target_id());
                centering.step(viewport, index)
            } else {
                CenteringStep::Cancelled
            };

            match step {
                CenteringStep::Pending => self.session.centering = Some(centering),
                CenteringStep::Done {
                    converged,
                    attempts,
                } => {
                    self.session.centered = true;
                    info!(
                        run = %self.session.run(),
                        anchor = %centering.target_id(),
                        converged,
                        attempts,
                        "Centered on anchor"
                    );
                }
                CenteringStep::Cancelled => {}
            }
            report.centering = Some(step);
        }

        let (older, newer) = self.on_proximity(&*viewport);
        report.requested_older = older;
        report.requested_newer = newer;
        report
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Bump the run, replace the session, issue the initial fetch
    fn on_run_started(&mut self, anchor: Option<String>) -> RunId {
        self.session.cancel();
        let run = self.session.run().next();
        self.session = RunSession::new(run, self.config.estimated_row_height);

        info!(%run, term = %self.active_term, anchor = ?anchor, "Starting run");
        let request = self.window.start_run(run, anchor);
        self.spawn_fetch(request);
        run
    }

    /// Queue the scroll correction for an edge merge, or start centering
    /// after the initial page
    fn on_page_merged(&mut self, merge: &MergeOutcome) {
        if merge.run != self.session.run() {
            return;
        }

        match merge.edge.intent() {
            Some(intent) => {
                let previous: Vec<&str> = merge.previous_ids.iter().map(String::as_str).collect();
                let shift = ScrollAnchor::shift(intent, &previous, &self.window.ids());
                debug!(
                    run = %merge.run,
                    ?intent,
                    inserted = shift.inserted_above.len(),
                    removed = shift.removed_above.len(),
                    "Scroll correction owed"
                );
                self.session.owe_correction(shift);
            }
            None => self.begin_centering(),
        }
    }

    fn begin_centering(&mut self) {
        let target = self
            .active_anchor
            .as_ref()
            .and_then(|_| self.window.resolved_anchor_id())
            .filter(|id| self.window.contains(id))
            .map(str::to_string);

        match target {
            Some(target) => {
                debug!(run = %self.session.run(), anchor = %target, "Centering on anchor");
                self.session.centering = Some(CenteringLoop::new(
                    self.session.run(),
                    target,
                    self.config.anchor_align,
                    self.config.centering_attempts,
                    self.session.token(),
                ));
            }
            None => self.session.centered = true,
        }
    }

    /// Request pages when the viewport nears an edge
    ///
    /// Suppressed until the run is centered so an anchored jump is not
    /// pulled away by fetches around the window's initial top. Also fills a
    /// viewport that the content does not cover yet.
    fn on_proximity(&mut self, viewport: &dyn Viewport) -> (bool, bool) {
        if !self.session.centered || self.window.state() != WindowState::Ready {
            return (false, false);
        }
        let len = self.window.len();
        if len == 0 {
            return (false, false);
        }

        let range = viewport.visible_range();
        let near_top = range.start < self.config.top_trigger_rows.max(1);
        let near_bottom = range.end + self.config.bottom_trigger_rows.max(1) > len;
        let underfilled = viewport.content_height() <= viewport.viewport_height() + FILL_SLACK_PX;

        let newer = near_top && self.load_newer();
        let older = (near_bottom || underfilled) && self.load_older();
        (older, newer)
    }

    fn spawn_fetch(&self, request: FetchRequest) {
        let source = Arc::clone(&self.source);
        let tx = self.events_tx.clone();
        let token = self.session.token();
        let page_size = self.config.page_size;
        let around_count = self.config.around_count;

        tokio::spawn(async move {
            let kind = request.kind.clone();
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(run = %request.run, edge = ?request.edge(), "Fetch abandoned for newer run");
                }
                result = fetch(source.as_ref(), kind, page_size, around_count) => {
                    let _ = tx.send(EngineEvent::Fetch(FetchCompletion { request, result }));
                }
            }
        });
    }

    // =========================================================================
    // Observable state
    // =========================================================================

    pub fn config(&self) -> &PagingConfig {
        &self.config
    }

    pub fn run_id(&self) -> RunId {
        self.session.run()
    }

    pub fn session(&self) -> &RunSession {
        &self.session
    }

    pub fn window(&self) -> &WindowManager {
        &self.window
    }

    pub fn items(&self) -> &[Item] {
        self.window.items()
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn active_term(&self) -> &str {
        &self.active_term
    }

    pub fn active_anchor(&self) -> Option<&str> {
        self.active_anchor.as_deref()
    }

    /// Anchor the view is focused on while a term is active
    pub fn focused_id(&self) -> Option<&str> {
        if self.active_term.is_empty() {
            return None;
        }
        self.window
            .resolved_anchor_id()
            .or(self.active_anchor.as_deref())
    }

    /// Number of candidates while a term is active
    pub fn total_matches(&self) -> Option<usize> {
        (!self.active_term.is_empty()).then(|| self.preview.candidates().len())
    }

    pub fn candidates(&self) -> &[Item] {
        self.preview.candidates()
    }

    pub fn preview(&self) -> &PreviewIndex {
        &self.preview
    }

    pub fn is_loading(&self) -> bool {
        self.window.is_loading_initial()
    }

    pub fn is_error(&self) -> bool {
        self.window.state() == WindowState::Error
    }

    pub fn error(&self) -> Option<&SourceError> {
        self.window.error()
    }

    pub fn has_older(&self) -> bool {
        self.window.has_older()
    }

    pub fn has_newer(&self) -> bool {
        self.window.has_newer()
    }

    pub fn is_centered(&self) -> bool {
        self.session.is_centered()
    }
}
