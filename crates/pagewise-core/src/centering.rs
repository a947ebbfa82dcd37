//! Anchor centering loop
//!
//! Row heights are estimates until rows render, so one `scroll_to_index`
//! can land off target. The loop scrolls, waits one frame for the host to
//! lay rows out, checks the position, and retries up to a fixed budget.
//! It is stepped by the host's frame signal rather than recursing, and
//! checks its run's cancellation token before touching the viewport.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::RunId;
use crate::viewport::{Align, Viewport};

/// Result of one frame step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CenteringStep {
    /// Scrolled, waiting for the next frame to verify
    Pending,
    /// Finished; `converged` is false when the budget ran out first
    Done { converged: bool, attempts: u32 },
    /// The run was superseded; nothing was touched
    Cancelled,
}

#[derive(Debug)]
pub struct CenteringLoop {
    run: RunId,
    target_id: String,
    align: Align,
    attempts: u32,
    max_attempts: u32,
    awaiting_check: bool,
    token: CancellationToken,
}

impl CenteringLoop {
    pub fn new(
        run: RunId,
        target_id: impl Into<String>,
        align: Align,
        max_attempts: u32,
        token: CancellationToken,
    ) -> Self {
        Self {
            run,
            target_id: target_id.into(),
            align,
            attempts: 0,
            max_attempts,
            awaiting_check: false,
            token,
        }
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Advance by one frame
    ///
    /// `target_index` is the target's current position in the window, or
    /// `None` if it is no longer materialized (the loop then gives up).
    pub fn step(&mut self, viewport: &mut dyn Viewport, target_index: Option<usize>) -> CenteringStep {
        if self.token.is_cancelled() {
            debug!(run = %self.run, "Centering cancelled by newer run");
            return CenteringStep::Cancelled;
        }

        let Some(index) = target_index else {
            return CenteringStep::Done {
                converged: false,
                attempts: self.attempts,
            };
        };

        if !self.awaiting_check {
            viewport.scroll_to_index(index, self.align);
            self.awaiting_check = true;
            return CenteringStep::Pending;
        }

        if viewport.is_aligned(index, self.align) {
            return CenteringStep::Done {
                converged: true,
                attempts: self.attempts,
            };
        }

        if self.attempts >= self.max_attempts {
            debug!(run = %self.run, anchor = %self.target_id, "Centering budget exhausted");
            return CenteringStep::Done {
                converged: false,
                attempts: self.attempts,
            };
        }

        self.attempts += 1;
        viewport.scroll_to_index(index, self.align);
        CenteringStep::Pending
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use super::*;
    use crate::source::demo_messages;
    use crate::viewport::VirtualList;

    /// A viewport whose rows keep moving, so alignment never holds
    #[derive(Default)]
    struct Jittery {
        offset: f32,
        scrolls: u32,
    }

    impl Viewport for Jittery {
        fn scroll_offset(&self) -> f32 {
            self.offset
        }
        fn set_scroll_offset(&mut self, offset: f32) {
            self.offset = offset;
        }
        fn scroll_to_index(&mut self, index: usize, _align: Align) {
            self.scrolls += 1;
            self.offset = index as f32 * 10.0;
        }
        fn visible_range(&self) -> Range<usize> {
            // Always one row short of wherever we were asked to go
            let start = (self.offset / 10.0) as usize + 1;
            start..start + 5
        }
        fn viewport_height(&self) -> f32 {
            50.0
        }
        fn content_height(&self) -> f32 {
            10_000.0
        }
    }

    #[test]
    fn test_converges_on_stable_layout() {
        let mut list = VirtualList::new(50.0, 200.0);
        list.sync_items(&demo_messages(50));
        let mut centering =
            CenteringLoop::new(RunId(1), "m-0030", Align::Start, 6, CancellationToken::new());

        assert_eq!(centering.step(&mut list, Some(20)), CenteringStep::Pending);
        assert_eq!(
            centering.step(&mut list, Some(20)),
            CenteringStep::Done {
                converged: true,
                attempts: 0
            }
        );
        assert_eq!(list.visible_range().start, 20);
    }

    #[test]
    fn test_retries_after_measurement_shift() {
        let rows = demo_messages(50);
        let mut list = VirtualList::new(50.0, 200.0);
        list.sync_items(&rows);
        let mut centering =
            CenteringLoop::new(RunId(1), "m-0030", Align::Start, 6, CancellationToken::new());

        centering.step(&mut list, Some(20));
        // Rows above the target turn out taller than estimated
        for row in &rows[..5] {
            list.measure(&row.id, 90.0);
        }
        assert_eq!(centering.step(&mut list, Some(20)), CenteringStep::Pending);
        assert_eq!(centering.attempts(), 1);
        assert_eq!(
            centering.step(&mut list, Some(20)),
            CenteringStep::Done {
                converged: true,
                attempts: 1
            }
        );
    }

    #[test]
    fn test_terminates_within_budget_without_convergence() {
        let mut viewport = Jittery::default();
        let mut centering =
            CenteringLoop::new(RunId(3), "m-0001", Align::Start, 6, CancellationToken::new());

        let mut frames = 0;
        let outcome = loop {
            frames += 1;
            match centering.step(&mut viewport, Some(7)) {
                CenteringStep::Pending => continue,
                other => break other,
            }
        };

        assert_eq!(
            outcome,
            CenteringStep::Done {
                converged: false,
                attempts: 6
            }
        );
        // One initial scroll plus one per retry
        assert_eq!(viewport.scrolls, 7);
        assert_eq!(frames, 8);
    }

    #[test]
    fn test_cancelled_loop_never_touches_viewport() {
        let token = CancellationToken::new();
        let mut viewport = Jittery::default();
        let mut centering = CenteringLoop::new(RunId(1), "m-0001", Align::Start, 6, token.clone());

        centering.step(&mut viewport, Some(4));
        token.cancel();
        viewport.offset = 123.0;

        assert_eq!(centering.step(&mut viewport, Some(4)), CenteringStep::Cancelled);
        assert_eq!(viewport.offset, 123.0);
        assert_eq!(viewport.scrolls, 1);
    }

    #[test]
    fn test_missing_target_gives_up() {
        let mut viewport = Jittery::default();
        let mut centering =
            CenteringLoop::new(RunId(1), "gone", Align::Start, 6, CancellationToken::new());
        assert_eq!(
            centering.step(&mut viewport, None),
            CenteringStep::Done {
                converged: false,
                attempts: 0
            }
        );
        assert_eq!(viewport.scrolls, 0);
    }
}
