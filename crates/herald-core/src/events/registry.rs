//! Event registry

use std::collections::HashMap;
use std::sync::Arc;

use herald_common::{Error, Result};
use tracing::debug;

use super::builtin;
use super::descriptor::EventDescriptor;

/// Process-wide map of event keys to descriptors.
///
/// Filled during startup, then shared behind an `Arc` so lookups on the
/// dispatch path take no locks.
#[derive(Default)]
pub struct EventRegistry {
    descriptors: HashMap<String, Arc<dyn EventDescriptor>>,
}

impl EventRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    /// A registry pre-loaded with the built-in event library.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin::all() {
            registry
                .register(descriptor)
                .expect("built-in event keys are unique");
        }
        registry
    }

    /// Register a descriptor under its key.
    pub fn register(&mut self, descriptor: Arc<dyn EventDescriptor>) -> Result<()> {
        let key = descriptor.key().to_string();
        if self.descriptors.contains_key(&key) {
            return Err(Error::DuplicateEventKey(key));
        }
        debug!(event_key = %key, "Registered event descriptor");
        self.descriptors.insert(key, descriptor);
        Ok(())
    }

    /// Look up the descriptor for a key.
    pub fn resolve(&self, key: &str) -> Option<Arc<dyn EventDescriptor>> {
        self.descriptors.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.descriptors.contains_key(key)
    }

    /// Registered keys, sorted for stable listings.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.descriptors.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_common::types::{Entity, EventParams, OptionsBlob};
    use pretty_assertions::assert_eq;

    /// Stand-in for a descriptor contributed by another module.
    struct OrderCompleteEvent;

    impl EventDescriptor for OrderCompleteEvent {
        fn key(&self) -> &str {
            "orders.complete"
        }

        fn title(&self) -> &str {
            "When an order completes"
        }

        fn description(&self) -> &str {
            "Triggered when an order reaches the completed state."
        }

        fn prepare_options(&self, _raw: &serde_json::Value) -> Result<OptionsBlob> {
            Ok(OptionsBlob::empty())
        }

        fn validate(
            &self,
            _options: &OptionsBlob,
            _entity: &Entity,
            _params: &EventParams,
        ) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = EventRegistry::new();
        let descriptor: Arc<dyn EventDescriptor> = Arc::new(OrderCompleteEvent);

        registry.register(descriptor.clone()).unwrap();

        let resolved = registry.resolve("orders.complete").unwrap();
        assert!(Arc::ptr_eq(&resolved, &descriptor));
        assert!(registry.contains("orders.complete"));
        assert!(registry.resolve("orders.refund").is_none());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut registry = EventRegistry::new();
        registry.register(Arc::new(OrderCompleteEvent)).unwrap();

        let err = registry.register(Arc::new(OrderCompleteEvent)).unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_EVENT_KEY");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_with_builtins_carries_the_event_library() {
        let registry = EventRegistry::with_builtins();

        assert_eq!(
            registry.keys(),
            vec![
                "entries.delete",
                "entries.save",
                "users.activate",
                "users.delete",
                "users.login",
                "users.save",
            ]
        );
    }

    #[test]
    fn test_builtins_coexist_with_external_descriptors() {
        let mut registry = EventRegistry::with_builtins();
        registry.register(Arc::new(OrderCompleteEvent)).unwrap();

        assert!(registry.contains("entries.save"));
        assert!(registry.contains("orders.complete"));
        assert_eq!(registry.len(), 7);
    }
}
