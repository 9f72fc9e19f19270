//! Outbound interfaces: the host environment and the presentation layer

use crate::quiz::QuizItem;
use crate::types::ComponentRef;

/// Calls the core makes into the host environment
pub trait Host: Send + Sync {
    /// Apply one penalty for a wrong answer about `component`
    fn apply_penalty(&self, component: &ComponentRef);

    /// Every in-scope fact has been dealt with
    fn declare_finished(&self);
}

/// Calls the core makes into the presentation layer
///
/// Choices come back through a [`ChoiceHandle`](crate::runtime::ChoiceHandle).
pub trait Presenter: Send + Sync {
    fn display_item(&self, item: &QuizItem);

    fn acknowledge_correct(&self, item: &QuizItem);

    /// Toggle highlighting of the correct answer
    fn reveal_correct(&self, item: &QuizItem, blink_on: bool);

    /// Return to the idle display
    fn clear(&self);
}
