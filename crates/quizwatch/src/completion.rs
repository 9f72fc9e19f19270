//! Completion Detector
//!
//! A run is solved-eligible once every in-scope component has resolved or
//! no monitor is still running. It is declared solved only after the pool
//! has been observed empty for `settle_ticks` consecutive ticks, which
//! catches a monitor that was mid-submission on the first empty tick.

/// What the detector sees on one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionProbe {
    pub resolved: usize,
    pub total_in_scope: usize,
    pub active_monitors: usize,
    pub pool_empty: bool,
    /// No item displayed and no feedback playing
    pub session_idle: bool,
    /// No submissions waiting in the channel
    pub inbox_empty: bool,
}

impl CompletionProbe {
    fn is_quiet(&self) -> bool {
        let work_done = self.resolved == self.total_in_scope || self.active_monitors == 0;
        work_done && self.pool_empty && self.session_idle && self.inbox_empty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Work remains
    Pending,
    /// Quiet, but not yet for long enough
    Settling { quiet: u32, required: u32 },
    /// Emitted exactly once, on the tick the run becomes solved
    Solved,
    /// Already solved on an earlier tick
    Finished,
}

#[derive(Debug)]
pub struct CompletionDetector {
    settle_ticks: u32,
    quiet: u32,
    solved: bool,
}

impl CompletionDetector {
    #[must_use]
    pub fn new(settle_ticks: u32) -> Self {
        Self {
            settle_ticks: settle_ticks.max(1),
            quiet: 0,
            solved: false,
        }
    }

    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.solved
    }

    pub fn tick(&mut self, probe: CompletionProbe) -> Completion {
        if self.solved {
            return Completion::Finished;
        }
        if !probe.is_quiet() {
            if self.quiet > 0 {
                tracing::trace!(quiet = self.quiet, "completion settle reset");
            }
            self.quiet = 0;
            return Completion::Pending;
        }

        self.quiet += 1;
        if self.quiet < self.settle_ticks {
            return Completion::Settling {
                quiet: self.quiet,
                required: self.settle_ticks,
            };
        }

        self.solved = true;
        tracing::info!(
            resolved = probe.resolved,
            total = probe.total_in_scope,
            active_monitors = probe.active_monitors,
            "run solved"
        );
        Completion::Solved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(resolved: usize, total: usize, active: usize, pool_empty: bool) -> CompletionProbe {
        CompletionProbe {
            resolved,
            total_in_scope: total,
            active_monitors: active,
            pool_empty,
            session_idle: true,
            inbox_empty: true,
        }
    }

    #[test]
    fn solved_exactly_once_after_two_empty_ticks() {
        let mut detector = CompletionDetector::new(2);
        assert_eq!(
            detector.tick(probe(3, 3, 0, true)),
            Completion::Settling {
                quiet: 1,
                required: 2
            }
        );
        assert_eq!(detector.tick(probe(3, 3, 0, true)), Completion::Solved);
        assert_eq!(detector.tick(probe(3, 3, 0, true)), Completion::Finished);
        assert!(detector.is_solved());
    }

    #[test]
    fn late_submission_resets_settling() {
        let mut detector = CompletionDetector::new(2);
        detector.tick(probe(3, 3, 1, true));
        assert_eq!(detector.tick(probe(3, 3, 0, false)), Completion::Pending);
        assert!(matches!(
            detector.tick(probe(3, 3, 0, true)),
            Completion::Settling { quiet: 1, .. }
        ));
        assert_eq!(detector.tick(probe(3, 3, 0, true)), Completion::Solved);
    }

    #[test]
    fn unresolved_with_live_monitors_is_pending() {
        let mut detector = CompletionDetector::new(1);
        assert_eq!(detector.tick(probe(2, 3, 1, true)), Completion::Pending);
    }

    #[test]
    fn no_active_monitors_completes_even_if_unresolved() {
        let mut detector = CompletionDetector::new(1);
        assert_eq!(detector.tick(probe(1, 3, 0, true)), Completion::Solved);
    }

    #[test]
    fn busy_session_blocks_completion() {
        let mut detector = CompletionDetector::new(1);
        let mut busy = probe(3, 3, 0, true);
        busy.session_idle = false;
        assert_eq!(detector.tick(busy), Completion::Pending);
    }
}
