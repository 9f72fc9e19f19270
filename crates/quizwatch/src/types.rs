//! Core types shared across the observer
//!
//! Defines the identifiers and immutable data that flow from monitors
//! into the batch pool and out to the quiz session:
//! - Component identifiers and scoped references
//! - Facts extracted from resolved components
//! - Question batches stamped at submission time

use crate::quiz::QuizItem;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Component identifier, allocated by the [`SessionContext`](crate::context::SessionContext)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of one observer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a fresh run id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Component scope attached to every diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRef {
    pub id: ComponentId,
    pub kind: String,
}

impl ComponentRef {
    #[inline]
    #[must_use]
    pub fn new(id: ComponentId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.id)
    }
}

/// One immutable piece of knowledge about a resolved component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// Question template tag
    pub tag: String,
    /// Positional arguments for the template's prompt
    pub args: Vec<String>,
    /// Acceptable correct answers (one is picked per item)
    pub correct: Vec<String>,
    /// Distractors tried before the template's answer domain
    pub preferred_wrong: Vec<String>,
}

impl Fact {
    /// Create a fact with a single correct answer
    #[must_use]
    pub fn new(tag: impl Into<String>, correct: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            args: Vec::new(),
            correct: vec![correct.into()],
            preferred_wrong: Vec::new(),
        }
    }

    /// Append a prompt argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add another acceptable answer
    #[must_use]
    pub fn also_correct(mut self, answer: impl Into<String>) -> Self {
        self.correct.push(answer.into());
        self
    }

    /// Add preferred wrong answers
    #[must_use]
    pub fn prefer_wrong<I, S>(mut self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_wrong
            .extend(answers.into_iter().map(Into::into));
        self
    }
}

/// The quiz items produced from one component's facts
///
/// Immutable while pooled. `submitted_at_resolved_count` is stamped once,
/// when the batch is created, and never reinterpreted.
#[derive(Debug, Clone)]
pub struct QuestionBatch {
    owner: ComponentRef,
    items: Vec<QuizItem>,
    submitted_at_resolved_count: usize,
}

impl QuestionBatch {
    /// Create a batch. Returns `None` when `items` is empty.
    #[must_use]
    pub fn new(
        owner: ComponentRef,
        items: Vec<QuizItem>,
        submitted_at_resolved_count: usize,
    ) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        Some(Self {
            owner,
            items,
            submitted_at_resolved_count,
        })
    }

    #[inline]
    #[must_use]
    pub fn owner(&self) -> &ComponentRef {
        &self.owner
    }

    #[inline]
    #[must_use]
    pub fn items(&self) -> &[QuizItem] {
        &self.items
    }

    #[inline]
    #[must_use]
    pub fn submitted_at_resolved_count(&self) -> usize {
        self.submitted_at_resolved_count
    }

    /// Consume the batch, yielding its items
    #[inline]
    #[must_use]
    pub fn into_items(self) -> Vec<QuizItem> {
        self.items
    }
}
