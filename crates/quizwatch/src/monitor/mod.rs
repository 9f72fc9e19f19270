//! Component Monitor
//!
//! One task per in-scope component with a registered adapter. The task
//! drives the adapter to completion and submits a single batch on success.
//! This is the only place adapter failures are caught: an abandon, any
//! other error, or a panic ends this monitor and nothing else.

mod adapter;
mod registry;

pub use adapter::{FactAdapter, MonitorContext};
pub use registry::AdapterRegistry;

use crate::component::Component;
use crate::context::SessionContext;
use crate::error::MonitorError;
use crate::journal::RunEvent;
use crate::types::ComponentRef;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// How a monitor ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitorOutcome {
    /// One batch with this many items went to the pool
    Submitted { items: usize },
    /// Completed without facts, as declared by the adapter
    IntentionallyEmpty,
    /// Completed without facts and without declaring why
    NoFacts,
    /// The adapter gave up
    Abandoned { reason: String },
    /// The adapter failed in some other way, including a panic
    Failed { message: String },
    /// Cancelled by a per-component or global abort
    Aborted,
}

impl MonitorOutcome {
    #[must_use]
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }

    fn from_error(err: MonitorError) -> Self {
        match err {
            MonitorError::Abandon { reason, .. } => Self::Abandoned { reason },
            MonitorError::Unexpected { message, .. } => Self::Failed { message },
        }
    }
}

/// Result of one monitor task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    pub component: ComponentRef,
    pub outcome: MonitorOutcome,
}

/// Spawn the monitor for `component` onto `set`
///
/// The active-monitor count is raised here, before the task runs; the
/// owner of `set` lowers it when the report is joined.
pub fn spawn_monitor(
    set: &mut JoinSet<MonitorReport>,
    session: &SessionContext,
    component: Arc<dyn Component>,
    adapter: Arc<dyn FactAdapter>,
) {
    let scope = component.scope();
    session.monitor_started();
    session.journal().record(RunEvent::MonitorStarted {
        component: scope.clone(),
    });
    tracing::debug!(component = %scope, "monitor started");

    let token = session.component_token(scope.id);
    let session = session.clone();
    set.spawn(async move {
        let outcome = drive(&session, component, adapter, token).await;
        log_outcome(&scope, &outcome);
        session.journal().record(RunEvent::MonitorFinished {
            component: scope.clone(),
            outcome: outcome.clone(),
        });
        MonitorReport {
            component: scope,
            outcome,
        }
    });
}

async fn drive(
    session: &SessionContext,
    component: Arc<dyn Component>,
    adapter: Arc<dyn FactAdapter>,
    token: CancellationToken,
) -> MonitorOutcome {
    let scope = component.scope();
    if token.is_cancelled() {
        return MonitorOutcome::Aborted;
    }

    let mut cx = MonitorContext::new(component, session.clone());
    // Run the adapter as its own task so a panic surfaces as a JoinError
    let mut adapter_task = AbortOnDrop(tokio::spawn(async move {
        let result = adapter.extract(&mut cx).await;
        (cx, result)
    }));

    let joined = tokio::select! {
        () = token.cancelled() => return MonitorOutcome::Aborted,
        joined = &mut adapter_task.0 => joined,
    };

    let (cx, result) = match joined {
        Ok(done) => done,
        Err(err) if err.is_panic() => {
            let err = MonitorError::unexpected(&scope, panic_message(err.into_panic()));
            return MonitorOutcome::from_error(err);
        }
        Err(_) => return MonitorOutcome::Aborted,
    };

    if let Err(err) = result {
        return MonitorOutcome::from_error(err);
    }
    if token.is_cancelled() {
        return MonitorOutcome::Aborted;
    }

    let (facts, declared) = cx.into_parts();
    let intentionally_empty = declared || session.is_declared_empty(scope.id);
    if facts.is_empty() {
        return if intentionally_empty {
            MonitorOutcome::IntentionallyEmpty
        } else {
            MonitorOutcome::NoFacts
        };
    }

    match session.submit_batch(&scope, &facts) {
        Ok(0) => MonitorOutcome::Aborted,
        Ok(items) => MonitorOutcome::Submitted { items },
        Err(err) => MonitorOutcome::from_error(err),
    }
}

/// Aborts the adapter task when the monitor is dropped or cancelled
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn log_outcome(scope: &ComponentRef, outcome: &MonitorOutcome) {
    match outcome {
        MonitorOutcome::Submitted { items } => {
            tracing::debug!(component = %scope, items, "monitor finished");
        }
        MonitorOutcome::IntentionallyEmpty => {
            tracing::debug!(component = %scope, "monitor finished with nothing to ask");
        }
        MonitorOutcome::NoFacts => {
            tracing::warn!(
                component = %scope,
                "monitor finished without facts or an empty declaration; adapter is likely defective"
            );
        }
        MonitorOutcome::Abandoned { reason } => {
            tracing::warn!(component = %scope, %reason, "monitor abandoned");
        }
        MonitorOutcome::Failed { message } => {
            tracing::warn!(component = %scope, %message, "monitor failed unexpectedly");
        }
        MonitorOutcome::Aborted => {
            tracing::debug!(component = %scope, "monitor aborted");
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with non-string payload".to_string()
    }
}
