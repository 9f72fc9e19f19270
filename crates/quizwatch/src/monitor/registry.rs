//! Adapter registry keyed by component kind

use super::FactAdapter;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps a component kind to the adapter that extracts its facts
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn FactAdapter>>,
}

impl AdapterRegistry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own kind, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn FactAdapter>) {
        let kind = adapter.kind().to_string();
        if self.adapters.insert(kind.clone(), adapter).is_some() {
            tracing::debug!(%kind, "adapter replaced");
        }
    }

    #[must_use]
    pub fn with(mut self, adapter: Arc<dyn FactAdapter>) -> Self {
        self.register(adapter);
        self
    }

    #[inline]
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<Arc<dyn FactAdapter>> {
        self.adapters.get(kind).cloned()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.adapters.contains_key(kind)
    }

    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;
    use crate::monitor::MonitorContext;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl FactAdapter for Named {
        fn kind(&self) -> &str {
            self.0
        }
        async fn extract(&self, _cx: &mut MonitorContext) -> Result<(), MonitorError> {
            Ok(())
        }
    }

    #[test]
    fn lookup_by_kind() {
        let registry = AdapterRegistry::new()
            .with(Arc::new(Named("wires")))
            .with(Arc::new(Named("keypad")));
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("wires"));
        assert!(registry.get("maze").is_none());
        assert_eq!(registry.kinds(), vec!["keypad", "wires"]);
    }

    #[test]
    fn register_replaces_same_kind() {
        let registry = AdapterRegistry::new()
            .with(Arc::new(Named("wires")))
            .with(Arc::new(Named("wires")));
        assert_eq!(registry.len(), 1);
    }
}
