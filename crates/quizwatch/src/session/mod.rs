//! Quiz Session state machine
//!
//! `Idle -> Displaying -> Correct | Wrong -> Idle`. At most one item is
//! displayed at a time; a choice only counts while an item is displayed and
//! the index is in range. Wrong answers apply exactly one penalty and play
//! a fixed-count reveal that only a whole-session abort can interrupt.

use crate::config::ObserverConfig;
use crate::error::SessionError;
use crate::host::{Host, Presenter};
use crate::quiz::QuizItem;
use crate::types::ComponentRef;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Idle,
    Displaying,
    Correct,
    Wrong,
}

impl SessionPhase {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Displaying => "Displaying",
            Self::Correct => "Correct",
            Self::Wrong => "Wrong",
        }
    }
}

/// Legal successor phases
#[must_use]
pub fn allowed_transitions(from: SessionPhase) -> Vec<SessionPhase> {
    use SessionPhase::*;
    match from {
        Idle => vec![Displaying],
        Displaying => vec![Correct, Wrong],
        Correct => vec![Idle],
        Wrong => vec![Idle],
    }
}

/// Validates a session transition.
///
/// Illegal transitions are core bugs. They are logged at error level and,
/// with the `strict-debug` feature, panic.
#[cfg_attr(feature = "strict-debug", allow(unreachable_code))]
pub fn validate_transition(from: SessionPhase, to: SessionPhase) -> Result<(), SessionError> {
    if allowed_transitions(from).contains(&to) {
        return Ok(());
    }
    tracing::error!(from = from.name(), to = to.name(), "illegal session transition");
    #[cfg(feature = "strict-debug")]
    panic!("Illegal session transition attempted: {from:?} -> {to:?}");

    Err(SessionError::IllegalTransition {
        from: from.name(),
        to: to.name(),
    })
}

/// Outcome of a registered choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Wrong { chosen: usize, correct: usize },
}

/// How feedback playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackEnd {
    Completed,
    Aborted,
}

/// The single displayed item and its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Displayed {
    pub owner: ComponentRef,
    pub item: QuizItem,
}

#[derive(Debug)]
pub struct QuizSession {
    phase: SessionPhase,
    current: Option<Displayed>,
    served: u64,
    correct: u64,
    penalties: u64,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            current: None,
            served: 0,
            correct: 0,
            penalties: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.phase == SessionPhase::Idle
    }

    #[must_use]
    pub fn current(&self) -> Option<&Displayed> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn served(&self) -> u64 {
        self.served
    }

    #[must_use]
    pub fn correct_count(&self) -> u64 {
        self.correct
    }

    #[must_use]
    pub fn penalties(&self) -> u64 {
        self.penalties
    }

    fn transition(&mut self, to: SessionPhase) -> Result<(), SessionError> {
        validate_transition(self.phase, to)?;
        tracing::trace!(from = self.phase.name(), to = to.name(), "session transition");
        self.phase = to;
        Ok(())
    }

    /// Display `item`. Only legal while idle.
    pub fn present(&mut self, owner: ComponentRef, item: QuizItem) -> Result<(), SessionError> {
        self.transition(SessionPhase::Displaying)?;
        self.current = Some(Displayed { owner, item });
        self.served += 1;
        Ok(())
    }

    /// Register the operator's choice
    ///
    /// Returns `None` (choice ignored) unless an item is displayed and
    /// `index` addresses one of its answers.
    pub fn choose(&mut self, index: usize) -> Option<Verdict> {
        if self.phase != SessionPhase::Displaying {
            tracing::debug!(index, phase = self.phase.name(), "choice ignored");
            return None;
        }
        let displayed = self.current.as_ref()?;
        if index >= displayed.item.answers.len() {
            tracing::debug!(index, answers = displayed.item.answers.len(), "choice out of range");
            return None;
        }

        let correct = displayed.item.correct_index;
        if index == correct {
            self.transition(SessionPhase::Correct).ok()?;
            self.correct += 1;
            Some(Verdict::Correct)
        } else {
            self.transition(SessionPhase::Wrong).ok()?;
            self.penalties += 1;
            Some(Verdict::Wrong {
                chosen: index,
                correct,
            })
        }
    }

    /// Leave Correct/Wrong for Idle once feedback finishes
    pub fn finish_feedback(&mut self) -> Result<Displayed, SessionError> {
        self.transition(SessionPhase::Idle)?;
        self.current.take().ok_or(SessionError::IllegalTransition {
            from: "feedback",
            to: SessionPhase::Idle.name(),
        })
    }

    /// Whole-session abort: drop whatever is displayed
    pub fn abort(&mut self) -> Option<Displayed> {
        self.phase = SessionPhase::Idle;
        self.current.take()
    }

    /// Play the feedback for `verdict` and return to Idle
    ///
    /// Wrong answers apply one penalty before the reveal starts.
    pub async fn play_feedback(
        &mut self,
        verdict: Verdict,
        config: &ObserverConfig,
        host: &dyn Host,
        presenter: &dyn Presenter,
        abort: &CancellationToken,
    ) -> Result<FeedbackEnd, SessionError> {
        let Some(displayed) = self.current.clone() else {
            return Err(SessionError::IllegalTransition {
                from: self.phase.name(),
                to: "feedback",
            });
        };

        let end = match verdict {
            Verdict::Correct => {
                presenter.acknowledge_correct(&displayed.item);
                sleep_or_abort(config.correct_ack(), abort).await
            }
            Verdict::Wrong { .. } => {
                host.apply_penalty(&displayed.owner);
                let mut end = FeedbackEnd::Completed;
                for blink in 0..config.blink_count {
                    presenter.reveal_correct(&displayed.item, blink % 2 == 0);
                    if sleep_or_abort(config.blink_interval(), abort).await == FeedbackEnd::Aborted {
                        end = FeedbackEnd::Aborted;
                        break;
                    }
                }
                end
            }
        };

        match end {
            FeedbackEnd::Completed => {
                self.finish_feedback()?;
                presenter.clear();
            }
            FeedbackEnd::Aborted => {
                self.abort();
            }
        }
        Ok(end)
    }
}

async fn sleep_or_abort(duration: std::time::Duration, abort: &CancellationToken) -> FeedbackEnd {
    tokio::select! {
        () = abort.cancelled() => FeedbackEnd::Aborted,
        () = tokio::time::sleep(duration) => FeedbackEnd::Completed,
    }
}
