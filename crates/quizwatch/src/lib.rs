//! Quizwatch - observer core for resolving components
//!
//! Watches many independently resolving components at once. When one
//! resolves, its adapter reads the final state through validated accessors
//! and turns it into facts; facts become multiple-choice quiz items that
//! are served to an operator one at a time, and only after enough other
//! components have resolved that answering takes real recall.
//!
//! - [`accessor`]: validated handles over opaque foreign objects
//! - [`monitor`]: one isolated task per component
//! - [`pool`] / [`scheduler`]: fairness-constrained admission
//! - [`session`]: the quiz state machine
//! - [`completion`]: deciding when the run is over
//! - [`runtime`]: wiring it all together
//!
//! # Example
//!
//! ```rust,ignore
//! use quizwatch::prelude::*;
//!
//! let observer = Observer::new(config, bank, registry, host, presenter)?;
//! presenter.attach(observer.choice_handle());
//! let summary = observer.run(components).await;
//! assert!(summary.is_solved());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod accessor;
pub mod completion;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod harness;
pub mod host;
pub mod journal;
pub mod logging;
pub mod monitor;
pub mod pool;
pub mod quiz;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod types;

pub use accessor::{ArrayHandle, DynValue, Inspectable, MemberInfo, MethodHandle, ValueHandle, Visibility};
pub use component::{Component, ObserverChain, ResolutionObserver, ResolutionTracker};
pub use config::ObserverConfig;
pub use context::SessionContext;
pub use error::{AccessError, ConfigError, MemberKind, MonitorError, QuizBuildError, SessionError};
pub use host::{Host, Presenter};
pub use journal::{JournalEntry, RunEvent, RunJournal};
pub use monitor::{AdapterRegistry, FactAdapter, MonitorContext, MonitorOutcome, MonitorReport};
pub use quiz::{QuestionBank, QuestionTemplate, QuizItem, RenderHint};
pub use runtime::{ChoiceHandle, Observer, RunOutcome, RunSummary};
pub use types::{ComponentId, ComponentRef, Fact, QuestionBatch, RunId};

/// Re-export the simulator for the binary and external harnesses
pub use harness::{run_simulator, SimulatorConfig, SimulatorReport};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for hosts and adapter authors
    pub use crate::{
        AccessError, AdapterRegistry, ChoiceHandle, Component, ComponentId, ComponentRef, Fact,
        FactAdapter, Host, Inspectable, MemberInfo, MonitorContext, MonitorError, Observer,
        ObserverConfig, Presenter, QuestionBank, QuestionTemplate, QuizItem, RunOutcome,
        RunSummary, Visibility,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
