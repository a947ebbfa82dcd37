//! Per-run session state
//!
//! Everything that must not outlive a run lives here and is replaced
//! wholesale when a new run starts: the row height cache, the centered
//! marker, the centering loop, the deferred offset correction and the
//! cancellation token shared by the run's in-flight fetches.

use tokio_util::sync::CancellationToken;

use crate::anchor::{PendingCorrection, RowHeights, RowShift};
use crate::centering::CenteringLoop;
use crate::types::RunId;

#[derive(Debug)]
pub struct RunSession {
    run: RunId,
    pub(crate) heights: RowHeights,
    pub(crate) centered: bool,
    pub(crate) centering: Option<CenteringLoop>,
    pub(crate) pending_correction: Option<PendingCorrection>,
    pub(crate) scroll_reset_pending: bool,
    token: CancellationToken,
}

impl RunSession {
    pub fn new(run: RunId, estimated_row_height: f32) -> Self {
        Self {
            run,
            heights: RowHeights::new(estimated_row_height),
            centered: false,
            centering: None,
            pending_correction: None,
            scroll_reset_pending: true,
            token: CancellationToken::new(),
        }
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn heights(&self) -> &RowHeights {
        &self.heights
    }

    pub fn is_centered(&self) -> bool {
        self.centered
    }

    pub fn is_centering(&self) -> bool {
        self.centering.is_some()
    }

    pub fn pending_correction(&self) -> Option<&PendingCorrection> {
        self.pending_correction.as_ref()
    }

    /// Token cancelled when this run is superseded
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Queue a row shift for the next frame to correct
    pub(crate) fn owe_correction(&mut self, shift: RowShift) {
        if shift.is_empty() {
            return;
        }
        match &mut self.pending_correction {
            Some(pending) => pending.absorb(shift),
            None => {
                self.pending_correction = Some(PendingCorrection {
                    run: self.run,
                    shift,
                })
            }
        }
    }

    /// Abandon the run: stops its fetches and centering loop
    pub(crate) fn cancel(&mut self) {
        self.token.cancel();
        self.centering = None;
        self.pending_correction = None;
    }
}
