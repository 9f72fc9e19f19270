//! Host components and resolution tracking
//!
//! The core sees a component only through [`Component`]: its kind, whether
//! it has resolved, an observer hook, and an inspectable target for the
//! accessor layer. [`ResolutionTracker`] turns the observer hook into a
//! resolved count and per-component wake-ups.

use crate::accessor::Inspectable;
use crate::types::{ComponentId, ComponentRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Callback fired when a component resolves
pub type ResolutionObserver = Box<dyn Fn(ComponentId) + Send + Sync>;

/// One independently resolving unit in the host environment
pub trait Component: Send + Sync {
    fn id(&self) -> ComponentId;

    fn kind(&self) -> &str;

    /// Whether the component has reached its terminal state
    fn is_resolved(&self) -> bool;

    /// Register a resolution observer
    ///
    /// Implementations must keep previously registered observers; the core
    /// never assumes it is the only one listening.
    fn subscribe(&self, observer: ResolutionObserver);

    /// Object adapters read through the accessor layer
    fn target(&self) -> Arc<dyn Inspectable>;

    fn scope(&self) -> ComponentRef {
        ComponentRef::new(self.id(), self.kind())
    }
}

/// Chain of resolution observers, for host implementations
#[derive(Default)]
pub struct ObserverChain {
    observers: RwLock<Vec<ResolutionObserver>>,
}

impl ObserverChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer; earlier observers stay registered
    pub fn push(&self, observer: ResolutionObserver) {
        self.observers.write().push(observer);
    }

    /// Fire every observer in registration order
    pub fn notify(&self, id: ComponentId) {
        for observer in self.observers.read().iter() {
            observer(id);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObserverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverChain")
            .field("observers", &self.len())
            .finish()
    }
}

struct Tracked {
    component: Arc<dyn Component>,
    resolved: watch::Sender<bool>,
}

#[derive(Default)]
struct TrackerShared {
    entries: RwLock<HashMap<ComponentId, Tracked>>,
    resolved: AtomicUsize,
}

impl TrackerShared {
    /// Unresolved -> Resolved happens at most once per component
    fn mark_resolved(&self, id: ComponentId) -> bool {
        let entries = self.entries.read();
        let Some(entry) = entries.get(&id) else {
            return false;
        };
        let first = entry.resolved.send_if_modified(|resolved| {
            if *resolved {
                false
            } else {
                *resolved = true;
                true
            }
        });
        if first {
            let count = self.resolved.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(component = %entry.component.scope(), resolved = count, "component resolved");
        }
        first
    }
}

/// Counts in-scope resolutions and wakes monitors waiting on them
#[derive(Clone, Default)]
pub struct ResolutionTracker {
    shared: Arc<TrackerShared>,
}

impl ResolutionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a component. Tracking the same id twice is a no-op.
    pub fn track(&self, component: Arc<dyn Component>) {
        let id = component.id();
        {
            let mut entries = self.shared.entries.write();
            if entries.contains_key(&id) {
                return;
            }
            let (resolved, _) = watch::channel(false);
            entries.insert(
                id,
                Tracked {
                    component: Arc::clone(&component),
                    resolved,
                },
            );
        }

        let weak: Weak<TrackerShared> = Arc::downgrade(&self.shared);
        component.subscribe(Box::new(move |reported| {
            if reported != id {
                tracing::debug!(component = %id, reported = %reported, "resolution reported under another id");
            }
            if let Some(shared) = weak.upgrade() {
                shared.mark_resolved(id);
            }
        }));

        if component.is_resolved() {
            self.shared.mark_resolved(id);
        }
    }

    /// Re-read every component's resolved flag
    ///
    /// Catches hosts whose observers fired before tracking began.
    pub fn refresh(&self) {
        let pending: Vec<ComponentId> = self
            .shared
            .entries
            .read()
            .iter()
            .filter(|(_, e)| !*e.resolved.borrow() && e.component.is_resolved())
            .map(|(id, _)| *id)
            .collect();
        for id in pending {
            self.shared.mark_resolved(id);
        }
    }

    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.shared.resolved.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.shared.entries.read().len()
    }

    #[must_use]
    pub fn is_resolved(&self, id: ComponentId) -> bool {
        self.shared
            .entries
            .read()
            .get(&id)
            .is_some_and(|e| *e.resolved.borrow())
    }

    /// Wait until `id` resolves. Returns immediately for untracked ids.
    pub async fn wait_resolved(&self, id: ComponentId) {
        let receiver = self
            .shared
            .entries
            .read()
            .get(&id)
            .map(|e| e.resolved.subscribe());
        if let Some(mut rx) = receiver {
            // Sender lives as long as the tracker entry
            let _ = rx.wait_for(|resolved| *resolved).await;
        }
    }
}

impl std::fmt::Debug for ResolutionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionTracker")
            .field("resolved", &self.resolved_count())
            .field("total", &self.total())
            .finish()
    }
}
