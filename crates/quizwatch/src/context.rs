//! Per-run session context
//!
//! Everything a run shares between the host, the monitors and the runtime
//! loop lives here instead of in process-wide globals: id allocation,
//! scope and resolution counts, the batch submission channel, and the
//! abort tokens. Cheap to clone.

use crate::component::ResolutionTracker;
use crate::config::ObserverConfig;
use crate::error::MonitorError;
use crate::journal::{RunEvent, RunJournal};
use crate::quiz::QuestionBank;
use crate::types::{ComponentId, ComponentRef, Fact, QuestionBatch, RunId};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct ContextInner {
    run_id: RunId,
    config: ObserverConfig,
    next_id: AtomicU64,
    tracker: ResolutionTracker,
    active_monitors: AtomicUsize,
    bank: QuestionBank,
    rng: Mutex<StdRng>,
    submissions: mpsc::UnboundedSender<QuestionBatch>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<QuestionBatch>>>,
    abort: CancellationToken,
    component_tokens: Mutex<HashMap<ComponentId, CancellationToken>>,
    declared_empty: Mutex<HashSet<ComponentId>>,
    journal: RunJournal,
}

/// Shared state of one observer run
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<ContextInner>,
}

impl SessionContext {
    #[must_use]
    pub fn new(config: ObserverConfig, bank: QuestionBank) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        let (submissions, inbox) = mpsc::unbounded_channel();
        let run_id = RunId::new();
        tracing::debug!(run = %run_id, templates = bank.len(), "session context created");

        Self {
            inner: Arc::new(ContextInner {
                run_id,
                config,
                next_id: AtomicU64::new(1),
                tracker: ResolutionTracker::new(),
                active_monitors: AtomicUsize::new(0),
                bank,
                rng: Mutex::new(rng),
                submissions,
                inbox: Mutex::new(Some(inbox)),
                abort: CancellationToken::new(),
                component_tokens: Mutex::new(HashMap::new()),
                declared_empty: Mutex::new(HashSet::new()),
                journal: RunJournal::default(),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.inner.run_id
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ObserverConfig {
        &self.inner.config
    }

    #[inline]
    #[must_use]
    pub fn journal(&self) -> &RunJournal {
        &self.inner.journal
    }

    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &ResolutionTracker {
        &self.inner.tracker
    }

    /// Hand out the next component id for this run
    pub fn allocate_id(&self) -> ComponentId {
        ComponentId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn is_in_scope(&self, kind: &str) -> bool {
        self.inner.config.is_in_scope(kind)
    }

    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.inner.tracker.resolved_count()
    }

    #[must_use]
    pub fn total_in_scope(&self) -> usize {
        self.inner.tracker.total()
    }

    #[must_use]
    pub fn active_monitors(&self) -> usize {
        self.inner.active_monitors.load(Ordering::SeqCst)
    }

    pub(crate) fn monitor_started(&self) {
        self.inner.active_monitors.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn monitor_finished(&self) {
        let previous = self.inner.active_monitors.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "monitor count underflow");
    }

    /// Build quiz items from `facts` and submit them as one batch
    ///
    /// The batch is stamped with the resolved count at this moment. Returns
    /// the number of items submitted; nothing is submitted for an empty fact
    /// list or after a global abort. Only the monitor driver submits, once,
    /// after its adapter succeeded.
    pub(crate) fn submit_batch(&self, component: &ComponentRef, facts: &[Fact]) -> Result<usize, MonitorError> {
        if facts.is_empty() {
            return Ok(0);
        }
        if self.is_aborted() {
            tracing::debug!(component = %component, "submission after abort discarded");
            return Ok(0);
        }

        let answer_count = self.inner.config.answer_count;
        let items = {
            let mut rng = self.inner.rng.lock();
            facts
                .iter()
                .map(|fact| self.inner.bank.build(fact, answer_count, &mut *rng))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| MonitorError::unbuildable(component, &err))?
        };

        let stamp = self.resolved_count();
        let count = items.len();
        let Some(batch) = QuestionBatch::new(component.clone(), items, stamp) else {
            return Ok(0);
        };
        self.inner
            .submissions
            .send(batch)
            .map_err(|_| MonitorError::unexpected(component, "run is no longer accepting batches"))?;

        tracing::debug!(component = %component, items = count, stamp, "batch submitted");
        self.inner.journal.record(RunEvent::BatchSubmitted {
            component: component.clone(),
            items: count,
            stamp,
        });
        Ok(count)
    }

    /// Record that `id` legitimately has nothing to ask about
    pub fn declare_intentionally_empty(&self, id: ComponentId) {
        self.inner.declared_empty.lock().insert(id);
    }

    #[must_use]
    pub fn is_declared_empty(&self, id: ComponentId) -> bool {
        self.inner.declared_empty.lock().contains(&id)
    }

    pub(crate) fn take_inbox(&self) -> Option<mpsc::UnboundedReceiver<QuestionBatch>> {
        self.inner.inbox.lock().take()
    }

    /// Root token; cancelled by a global abort
    #[must_use]
    pub fn abort_token(&self) -> &CancellationToken {
        &self.inner.abort
    }

    /// Token that stops the monitor of `id`, derived from the root token
    pub fn component_token(&self, id: ComponentId) -> CancellationToken {
        self.inner
            .component_tokens
            .lock()
            .entry(id)
            .or_insert_with(|| self.inner.abort.child_token())
            .clone()
    }

    /// Abort every monitor and the run itself
    pub fn abort(&self) {
        if !self.inner.abort.is_cancelled() {
            tracing::warn!(run = %self.inner.run_id, "global abort requested");
        }
        self.inner.abort.cancel();
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.inner.abort.is_cancelled()
    }

    /// Stop every monitor without aborting the run
    pub(crate) fn stop_monitors(&self) {
        for token in self.inner.component_tokens.lock().values() {
            token.cancel();
        }
    }

    /// Abort only the monitor of `id`
    pub fn abort_component(&self, id: ComponentId) {
        tracing::info!(component = %id, "component abort requested");
        self.component_token(id).cancel();
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("run_id", &self.inner.run_id)
            .field("tracker", &self.inner.tracker)
            .field("active_monitors", &self.active_monitors())
            .field("aborted", &self.is_aborted())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuestionTemplate;

    fn bank() -> QuestionBank {
        QuestionBank::new().with(QuestionTemplate::new(
            "color",
            "Colour of wire {0}?",
            ["red", "blue", "white", "black", "yellow"],
        ))
    }

    fn context() -> SessionContext {
        SessionContext::new(ObserverConfig::new().with_seed(3), bank())
    }

    #[test]
    fn ids_are_unique_per_run() {
        let cx = context();
        let a = cx.allocate_id();
        let b = cx.allocate_id();
        assert_ne!(a, b);
        // Separate runs do not share a counter
        assert_eq!(context().allocate_id(), a);
    }

    #[tokio::test]
    async fn submit_batch_stamps_and_sends() {
        let cx = context();
        let mut inbox = cx.take_inbox().unwrap();
        let owner = ComponentRef::new(cx.allocate_id(), "wires");
        let facts = vec![Fact::new("color", "red").arg("1"), Fact::new("color", "blue").arg("2")];

        assert_eq!(cx.submit_batch(&owner, &facts).unwrap(), 2);
        let batch = inbox.recv().await.unwrap();
        assert_eq!(batch.owner(), &owner);
        assert_eq!(batch.items().len(), 2);
        assert_eq!(batch.submitted_at_resolved_count(), 0);
        assert_eq!(batch.items()[0].answers.len(), 4);
    }

    #[test]
    fn unbuildable_fact_abandons() {
        let cx = context();
        let owner = ComponentRef::new(cx.allocate_id(), "wires");
        let err = cx.submit_batch(&owner, &[Fact::new("nope", "x")]).unwrap_err();
        assert!(err.is_abandon());
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn abort_discards_submissions() {
        let cx = context();
        let owner = ComponentRef::new(cx.allocate_id(), "wires");
        cx.abort();
        assert_eq!(cx.submit_batch(&owner, &[Fact::new("color", "red").arg("1")]).unwrap(), 0);
    }

    #[test]
    fn component_abort_is_scoped() {
        let cx = context();
        let a = cx.allocate_id();
        let b = cx.allocate_id();
        let token_a = cx.component_token(a);
        let token_b = cx.component_token(b);
        cx.abort_component(a);
        assert!(token_a.is_cancelled());
        assert!(!token_b.is_cancelled());

        cx.abort();
        assert!(token_b.is_cancelled());
    }

    #[test]
    fn inbox_taken_once() {
        let cx = context();
        assert!(cx.take_inbox().is_some());
        assert!(cx.take_inbox().is_none());
    }
}
