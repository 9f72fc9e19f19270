use crate::monitor::MonitorOutcome;
use crate::types::ComponentRef;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Instant;

/// Something that happened during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    MonitorStarted {
        component: ComponentRef,
    },
    MonitorFinished {
        component: ComponentRef,
        outcome: MonitorOutcome,
    },
    BatchSubmitted {
        component: ComponentRef,
        items: usize,
        stamp: usize,
    },
    ItemServed {
        component: ComponentRef,
        tag: String,
        resolved: usize,
    },
    Answered {
        component: ComponentRef,
        correct: bool,
    },
    PenaltyApplied {
        component: ComponentRef,
    },
    Solved,
    Aborted {
        dropped_batches: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub event: RunEvent,
}

/// Append-only record of a run
#[derive(Debug)]
pub struct RunJournal {
    started: Instant,
    inner: Mutex<Vec<JournalEntry>>,
}

impl Default for RunJournal {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            inner: Mutex::new(Vec::new()),
        }
    }
}

impl RunJournal {
    pub fn record(&self, event: RunEvent) -> u64 {
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let mut guard = self.inner.lock();
        let seq = guard.len() as u64;
        guard.push(JournalEntry {
            seq,
            elapsed_ms,
            event,
        });
        seq
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.inner.lock().clone()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.inner.lock().iter().map(|e| e.event.clone()).collect()
    }

    pub fn count(&self, pred: impl Fn(&RunEvent) -> bool) -> usize {
        self.inner.lock().iter().filter(|e| pred(&e.event)).count()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentId;

    #[test]
    fn sequence_numbers_are_dense() {
        let journal = RunJournal::default();
        let c = ComponentRef::new(ComponentId(1), "wires");
        assert_eq!(journal.record(RunEvent::MonitorStarted { component: c.clone() }), 0);
        assert_eq!(journal.record(RunEvent::PenaltyApplied { component: c }), 1);
        assert_eq!(journal.record(RunEvent::Solved), 2);
        let seqs: Vec<u64> = journal.entries().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(journal.count(|e| matches!(e, RunEvent::Solved)), 1);
    }

    #[test]
    fn serializes_with_event_tag() {
        let journal = RunJournal::default();
        journal.record(RunEvent::Aborted { dropped_batches: 2 });
        let json = serde_json::to_value(&journal.entries()[0]).unwrap();
        assert_eq!(json["event"], "aborted");
        assert_eq!(json["dropped_batches"], 2);
    }
}
