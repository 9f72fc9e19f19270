//! Pool of not-yet-served question batches

use crate::types::QuestionBatch;

/// Pending batches awaiting admission
///
/// Batches are immutable while pooled and leave the pool exactly once,
/// either through [`BatchPool::take`] or a global [`BatchPool::clear`].
#[derive(Debug, Default)]
pub struct BatchPool {
    batches: Vec<QuestionBatch>,
}

impl BatchPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stamped batch
    pub fn submit(&mut self, batch: QuestionBatch) {
        tracing::debug!(
            component = %batch.owner(),
            items = batch.items().len(),
            stamp = batch.submitted_at_resolved_count(),
            pooled = self.batches.len() + 1,
            "batch pooled"
        );
        self.batches.push(batch);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Indices of batches that may be served
    ///
    /// Outside end-game a batch is eligible only once more components have
    /// resolved than had resolved when it was submitted. In end-game every
    /// batch is eligible.
    #[must_use]
    pub fn eligible(&self, resolved_count: usize, end_game: bool) -> Vec<usize> {
        self.batches
            .iter()
            .enumerate()
            .filter(|(_, b)| end_game || b.submitted_at_resolved_count() < resolved_count)
            .map(|(i, _)| i)
            .collect()
    }

    /// Remove and return the batch at `index`
    pub fn take(&mut self, index: usize) -> Option<QuestionBatch> {
        (index < self.batches.len()).then(|| self.batches.swap_remove(index))
    }

    /// Drop every pending batch, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.batches.len();
        self.batches.clear();
        dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionBatch> {
        self.batches.iter()
    }
}
