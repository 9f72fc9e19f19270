//! Fact adapter interface and the context handed to it

use crate::accessor::{self, ArrayHandle, Inspectable, MethodHandle, ValueHandle, Visibility};
use crate::component::Component;
use crate::context::SessionContext;
use crate::error::{AccessError, MonitorError};
use crate::types::{ComponentRef, Fact};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Extracts facts from one kind of component
///
/// Implementations usually wait for resolution, read the final state
/// through accessors, and [`emit`](MonitorContext::emit) facts in the
/// order they should be asked. Returning an error abandons only this
/// component.
#[async_trait]
pub trait FactAdapter: Send + Sync {
    /// Component kind this adapter understands
    fn kind(&self) -> &str;

    async fn extract(&self, cx: &mut MonitorContext) -> Result<(), MonitorError>;
}

/// Per-monitor view of the run
pub struct MonitorContext {
    component: Arc<dyn Component>,
    scope: ComponentRef,
    session: SessionContext,
    facts: Vec<Fact>,
    intentionally_empty: bool,
}

impl MonitorContext {
    pub(crate) fn new(component: Arc<dyn Component>, session: SessionContext) -> Self {
        let scope = component.scope();
        Self {
            component,
            scope,
            session,
            facts: Vec::new(),
            intentionally_empty: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> &ComponentRef {
        &self.scope
    }

    #[inline]
    #[must_use]
    pub fn component(&self) -> &Arc<dyn Component> {
        &self.component
    }

    #[inline]
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    #[must_use]
    pub fn target(&self) -> Arc<dyn Inspectable> {
        self.component.target()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.session.tracker().is_resolved(self.scope.id) || self.component.is_resolved()
    }

    /// Suspend until this component resolves
    pub async fn wait_until_resolved(&self) {
        self.session.tracker().wait_resolved(self.scope.id).await;
    }

    /// Suspend for one tick
    pub async fn next_tick(&self) {
        tokio::time::sleep(self.session.config().tick_interval()).await;
    }

    /// Queue a fact for this component's batch
    pub fn emit(&mut self, fact: Fact) {
        tracing::trace!(component = %self.scope, tag = %fact.tag, "fact emitted");
        self.facts.push(fact);
    }

    /// This component has nothing worth asking about
    pub fn declare_intentionally_empty(&mut self) {
        self.intentionally_empty = true;
        self.session.declare_intentionally_empty(self.scope.id);
    }

    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    #[must_use]
    pub fn is_intentionally_empty(&self) -> bool {
        self.intentionally_empty
    }

    /// Build an abandon error scoped to this component
    pub fn abandon(&self, reason: impl Into<String>) -> MonitorError {
        MonitorError::abandon(&self.scope, reason)
    }

    pub fn field<T: Any + Send>(&self, name: &str, visibility: Visibility) -> Result<ValueHandle<T>, AccessError> {
        accessor::get_field(&self.target(), name, visibility)
    }

    pub fn property<T: Any + Send>(
        &self,
        name: &str,
        visibility: Visibility,
    ) -> Result<ValueHandle<T>, AccessError> {
        accessor::get_property(&self.target(), name, visibility)
    }

    pub fn array<T: Any + Send>(&self, name: &str, visibility: Visibility) -> Result<ArrayHandle<T>, AccessError> {
        accessor::get_array(&self.target(), name, visibility)
    }

    pub fn method(
        &self,
        name: &str,
        visibility: Visibility,
        arity: Option<usize>,
    ) -> Result<MethodHandle, AccessError> {
        accessor::get_method(&self.target(), name, visibility, arity)
    }

    pub(crate) fn into_parts(self) -> (Vec<Fact>, bool) {
        (self.facts, self.intentionally_empty)
    }
}

impl std::fmt::Debug for MonitorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorContext")
            .field("scope", &self.scope)
            .field("facts", &self.facts.len())
            .field("intentionally_empty", &self.intentionally_empty)
            .finish()
    }
}
