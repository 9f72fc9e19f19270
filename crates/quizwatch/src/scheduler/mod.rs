//! Admission Scheduler
//!
//! Decides, once per tick while the quiz session is idle, whether a pooled
//! batch may be served. A batch only becomes eligible after at least one
//! more component has resolved since it was submitted, and nothing is
//! served until a minimum number of batches are eligible. Both rules relax
//! in end-game, when every in-scope component has resolved or no monitor
//! is left that could still submit.

use crate::config::ObserverConfig;
use crate::pool::BatchPool;
use crate::quiz::QuizItem;
use crate::types::ComponentRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Why a tick served nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Fewer eligible batches than the fairness floor
    BelowFairnessFloor { eligible: usize, floor: usize },
    /// Nothing eligible
    NothingEligible,
}

/// Result of one scheduler tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Serve { owner: ComponentRef, item: QuizItem },
    Wait(WaitReason),
}

impl Admission {
    #[must_use]
    pub fn is_serve(&self) -> bool {
        matches!(self, Self::Serve { .. })
    }
}

/// Counts the scheduler needs from the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickCounts {
    pub resolved: usize,
    pub total_in_scope: usize,
    /// Every monitor has finished and its submission has been pooled
    pub monitors_drained: bool,
}

impl TickCounts {
    /// Nothing more will be resolved or submitted that could change the pool
    #[must_use]
    pub fn is_end_game(&self) -> bool {
        self.resolved >= self.total_in_scope || self.monitors_drained
    }
}

/// Fairness-constrained batch selection
#[derive(Debug)]
pub struct AdmissionScheduler {
    fairness_floor: usize,
    end_game_relaxation: bool,
    rng: StdRng,
}

impl AdmissionScheduler {
    #[must_use]
    pub fn new(config: &ObserverConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            fairness_floor: config.fairness_floor,
            end_game_relaxation: config.end_game_relaxation,
            rng,
        }
    }

    /// Run one admission tick against `pool`
    pub fn tick(&mut self, pool: &mut BatchPool, counts: TickCounts) -> Admission {
        let end_game = self.end_game_relaxation && counts.is_end_game();
        let eligible = pool.eligible(counts.resolved, end_game);

        if !end_game && eligible.len() < self.fairness_floor {
            if !eligible.is_empty() {
                tracing::trace!(
                    eligible = eligible.len(),
                    floor = self.fairness_floor,
                    "below fairness floor"
                );
            }
            return Admission::Wait(if eligible.is_empty() {
                WaitReason::NothingEligible
            } else {
                WaitReason::BelowFairnessFloor {
                    eligible: eligible.len(),
                    floor: self.fairness_floor,
                }
            });
        }
        if eligible.is_empty() {
            return Admission::Wait(WaitReason::NothingEligible);
        }

        let chosen = eligible[self.rng.gen_range(0..eligible.len())];
        let Some(batch) = pool.take(chosen) else {
            return Admission::Wait(WaitReason::NothingEligible);
        };
        let owner = batch.owner().clone();
        let mut items = batch.into_items();
        let item = items.swap_remove(self.rng.gen_range(0..items.len()));

        tracing::info!(
            component = %owner,
            tag = %item.tag,
            resolved = counts.resolved,
            end_game,
            remaining = pool.len(),
            "serving quiz item"
        );
        Admission::Serve { owner, item }
    }
}
