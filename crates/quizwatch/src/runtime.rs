//! Observer runtime
//!
//! Owns the scheduler state for one run. Monitors feed batches in through
//! the session's submission channel; this loop is the single consumer.
//! Each tick it drains submissions into the pool, refreshes resolution
//! counts, lets the scheduler serve an item while the session is idle,
//! and asks the completion detector whether the run is over. Operator
//! choices arrive through a [`ChoiceHandle`].

use crate::completion::{Completion, CompletionDetector, CompletionProbe};
use crate::component::Component;
use crate::config::ObserverConfig;
use crate::context::SessionContext;
use crate::error::{ConfigError, SessionError};
use crate::host::{Host, Presenter};
use crate::journal::RunEvent;
use crate::monitor::{spawn_monitor, AdapterRegistry, MonitorReport};
use crate::pool::BatchPool;
use crate::quiz::{QuestionBank, QuizItem};
use crate::scheduler::{Admission, AdmissionScheduler, TickCounts};
use crate::session::{FeedbackEnd, QuizSession, Verdict};
use crate::types::{ComponentRef, QuestionBatch, RunId};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Registers operator choices with a running observer
#[derive(Debug, Clone)]
pub struct ChoiceHandle {
    tx: mpsc::UnboundedSender<usize>,
}

impl ChoiceHandle {
    /// Submit the index of the chosen answer
    ///
    /// Returns `false` once the run has ended. Choices that arrive while
    /// nothing is displayed, or that are out of range, are ignored.
    pub fn choose(&self, index: usize) -> bool {
        self.tx.send(index).is_ok()
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Solved,
    Aborted,
}

/// What happened during a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    pub ticks: u64,
    pub total_in_scope: usize,
    pub resolved: usize,
    pub out_of_scope: usize,
    pub unmonitored: usize,
    pub batches_pooled: usize,
    pub items_served: u64,
    pub correct: u64,
    pub penalties: u64,
    pub dropped_batches: usize,
    pub monitors: Vec<MonitorReport>,
}

impl RunSummary {
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.outcome == RunOutcome::Solved
    }
}

/// Drives one observer run
pub struct Observer {
    session: SessionContext,
    registry: AdapterRegistry,
    host: Arc<dyn Host>,
    presenter: Arc<dyn Presenter>,
    choice_tx: mpsc::UnboundedSender<usize>,
    choice_rx: mpsc::UnboundedReceiver<usize>,
}

impl Observer {
    pub fn new(
        config: ObserverConfig,
        bank: QuestionBank,
        registry: AdapterRegistry,
        host: Arc<dyn Host>,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (choice_tx, choice_rx) = mpsc::unbounded_channel();
        Ok(Self {
            session: SessionContext::new(config, bank),
            registry,
            host,
            presenter,
            choice_tx,
            choice_rx,
        })
    }

    /// Context shared with the host; use it to allocate component ids and
    /// to raise global or per-component aborts
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    #[must_use]
    pub fn choice_handle(&self) -> ChoiceHandle {
        ChoiceHandle {
            tx: self.choice_tx.clone(),
        }
    }

    /// Watch `components` until the run is solved or aborted
    pub async fn run(mut self, components: Vec<Arc<dyn Component>>) -> RunSummary {
        let session = self.session.clone();
        let config = session.config().clone();
        let abort = session.abort_token().clone();
        let mut inbox = match session.take_inbox() {
            Some(inbox) => inbox,
            None => {
                tracing::error!(run = %session.run_id(), "submission inbox already taken");
                let (_, rx) = mpsc::unbounded_channel::<QuestionBatch>();
                rx
            }
        };

        let mut monitors: JoinSet<MonitorReport> = JoinSet::new();
        let mut out_of_scope = 0;
        let mut unmonitored = 0;
        for component in components {
            if !session.is_in_scope(component.kind()) {
                tracing::debug!(component = %component.scope(), "out of scope");
                out_of_scope += 1;
                continue;
            }
            session.tracker().track(Arc::clone(&component));
            match self.registry.get(component.kind()) {
                Some(adapter) => spawn_monitor(&mut monitors, &session, component, adapter),
                None => {
                    tracing::info!(component = %component.scope(), "no adapter registered; counted but not monitored");
                    unmonitored += 1;
                }
            }
        }
        tracing::info!(
            run = %session.run_id(),
            in_scope = session.total_in_scope(),
            monitors = session.active_monitors(),
            out_of_scope,
            unmonitored,
            "observer run started"
        );

        let mut pool = BatchPool::new();
        let mut scheduler = AdmissionScheduler::new(&config);
        let mut detector = CompletionDetector::new(config.settle_ticks);
        let mut quiz = QuizSession::new();
        let mut reports = Vec::new();
        let mut batches_pooled = 0;
        let mut ticks = 0u64;

        let mut ticker = tokio::time::interval(config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                biased;

                () = abort.cancelled() => break RunOutcome::Aborted,

                Some(joined) = monitors.join_next(), if !monitors.is_empty() => {
                    session.monitor_finished();
                    match joined {
                        Ok(report) => reports.push(report),
                        Err(err) => tracing::error!(error = %err, "monitor task failed outside its boundary"),
                    }
                }

                Some(index) = self.choice_rx.recv() => {
                    let Some(verdict) = quiz.choose(index) else { continue };
                    let Some(owner) = quiz.current().map(|d| d.owner.clone()) else { continue };
                    session.journal().record(RunEvent::Answered {
                        component: owner.clone(),
                        correct: verdict == Verdict::Correct,
                    });
                    if matches!(verdict, Verdict::Wrong { .. }) {
                        session.journal().record(RunEvent::PenaltyApplied { component: owner });
                    }

                    let played = quiz
                        .play_feedback(verdict, &config, self.host.as_ref(), self.presenter.as_ref(), &abort)
                        .await;
                    match played {
                        Ok(FeedbackEnd::Completed) => {
                            // Choices made during feedback never apply to the next item
                            while self.choice_rx.try_recv().is_ok() {}
                        }
                        Ok(FeedbackEnd::Aborted) => {}
                        Err(err) => tracing::error!(error = %err, "feedback failed"),
                    }
                }

                _ = ticker.tick() => {
                    ticks += 1;
                    while let Ok(batch) = inbox.try_recv() {
                        pool.submit(batch);
                        batches_pooled += 1;
                    }
                    session.tracker().refresh();
                    let counts = TickCounts {
                        resolved: session.resolved_count(),
                        total_in_scope: session.total_in_scope(),
                        monitors_drained: monitors.is_empty() && inbox.is_empty(),
                    };

                    if quiz.is_idle() {
                        if let Admission::Serve { owner, item } = scheduler.tick(&mut pool, counts) {
                            session.journal().record(RunEvent::ItemServed {
                                component: owner.clone(),
                                tag: item.tag.clone(),
                                resolved: counts.resolved,
                            });
                            if let Err(err) = present_item(&mut quiz, self.presenter.as_ref(), owner, item) {
                                tracing::error!(error = %err, "item could not be presented");
                            }
                        }
                    }

                    let probe = CompletionProbe {
                        resolved: counts.resolved,
                        total_in_scope: counts.total_in_scope,
                        active_monitors: session.active_monitors(),
                        pool_empty: pool.is_empty(),
                        session_idle: quiz.is_idle(),
                        inbox_empty: inbox.is_empty(),
                    };
                    if detector.tick(probe) == Completion::Solved {
                        break RunOutcome::Solved;
                    }
                }
            }
        };

        let mut dropped_batches = 0;
        match outcome {
            RunOutcome::Solved => {
                session.journal().record(RunEvent::Solved);
                self.host.declare_finished();
            }
            RunOutcome::Aborted => {
                inbox.close();
                while inbox.try_recv().is_ok() {
                    dropped_batches += 1;
                }
                dropped_batches += pool.clear();
                if quiz.abort().is_some() {
                    self.presenter.clear();
                }
                session.journal().record(RunEvent::Aborted { dropped_batches });
                tracing::warn!(dropped_batches, "observer run aborted");
            }
        }

        // Monitors still waiting on components that never resolved
        session.stop_monitors();
        while let Some(joined) = monitors.join_next().await {
            session.monitor_finished();
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => tracing::error!(error = %err, "monitor task failed outside its boundary"),
            }
        }

        let summary = RunSummary {
            run_id: session.run_id(),
            outcome,
            ticks,
            total_in_scope: session.total_in_scope(),
            resolved: session.resolved_count(),
            out_of_scope,
            unmonitored,
            batches_pooled,
            items_served: quiz.served(),
            correct: quiz.correct_count(),
            penalties: quiz.penalties(),
            dropped_batches,
            monitors: reports,
        };
        tracing::info!(
            run = %summary.run_id,
            outcome = ?summary.outcome,
            ticks,
            served = summary.items_served,
            penalties = summary.penalties,
            "observer run finished"
        );
        summary
    }
}

/// Track `item` in the session, then show it; nothing is shown if the
/// session rejects it
fn present_item(
    quiz: &mut QuizSession,
    presenter: &dyn Presenter,
    owner: ComponentRef,
    item: QuizItem,
) -> Result<(), SessionError> {
    quiz.present(owner, item)?;
    if let Some(displayed) = quiz.current() {
        presenter.display_item(&displayed.item);
    }
    Ok(())
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("session", &self.session)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
