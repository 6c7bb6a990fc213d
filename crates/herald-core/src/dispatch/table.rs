//! Binding table
//!
//! In-memory map of event key to enabled bindings, rebuilt from the
//! store whenever configuration changes. Dispatch reads from the table
//! only, so a fired event never queries the bindings table itself.

use std::collections::HashMap;
use std::sync::Arc;

use herald_common::Result;
use herald_storage::models::Binding;
use herald_storage::store::BindingStore;
use tokio::sync::RwLock;
use tracing::info;

pub struct BindingTable {
    store: Arc<dyn BindingStore>,
    by_event: RwLock<HashMap<String, Vec<Binding>>>,
}

impl BindingTable {
    /// An empty table; call [`reload`](Self::reload) to populate it.
    pub fn new(store: Arc<dyn BindingStore>) -> Self {
        Self {
            store,
            by_event: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild the table from the store.
    ///
    /// Disabled bindings are dropped here so dispatch never sees them.
    /// Within one key, creation order is preserved.
    pub async fn reload(&self) -> Result<()> {
        let all = self.store.list_all().await?;

        let mut by_event: HashMap<String, Vec<Binding>> = HashMap::new();
        let mut enabled = 0usize;
        for binding in all {
            if !binding.enabled {
                continue;
            }
            enabled += 1;
            by_event
                .entry(binding.event_key.clone())
                .or_default()
                .push(binding);
        }

        info!(
            bindings = enabled,
            events = by_event.len(),
            "Binding table reloaded"
        );
        *self.by_event.write().await = by_event;
        Ok(())
    }

    /// Enabled bindings for an event key, in creation order.
    pub async fn bindings_for(&self, event_key: &str) -> Vec<Binding> {
        self.by_event
            .read()
            .await
            .get(event_key)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of event keys with at least one enabled binding.
    pub async fn event_count(&self) -> usize {
        self.by_event.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_common::types::OptionsBlob;
    use herald_storage::memory::MemoryBindingStore;
    use herald_storage::models::CreateBinding;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn create(event_key: &str, enabled: bool) -> CreateBinding {
        CreateBinding {
            event_key: event_key.to_string(),
            campaign_id: Uuid::new_v4(),
            options: OptionsBlob::empty(),
            enabled,
        }
    }

    #[tokio::test]
    async fn test_reload_keeps_enabled_bindings_in_creation_order() {
        let store = MemoryBindingStore::new();
        let first = store.create(create("entries.save", true)).await.unwrap();
        store.create(create("entries.save", false)).await.unwrap();
        let third = store.create(create("entries.save", true)).await.unwrap();
        store.create(create("users.login", true)).await.unwrap();

        let table = BindingTable::new(Arc::new(store));
        table.reload().await.unwrap();

        let bindings = table.bindings_for("entries.save").await;
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].id, first.id);
        assert_eq!(bindings[1].id, third.id);
        assert_eq!(table.event_count().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_key_yields_empty() {
        let table = BindingTable::new(Arc::new(MemoryBindingStore::new()));
        table.reload().await.unwrap();
        assert!(table.bindings_for("entries.save").await.is_empty());
    }

    #[tokio::test]
    async fn test_store_changes_apply_on_next_reload() {
        let store = MemoryBindingStore::new();
        let binding = store.create(create("entries.save", true)).await.unwrap();

        let table = BindingTable::new(Arc::new(store.clone()));
        table.reload().await.unwrap();
        assert_eq!(table.bindings_for("entries.save").await.len(), 1);

        store.set_enabled(binding.id, false).await.unwrap();
        // The table is a snapshot until reloaded.
        assert_eq!(table.bindings_for("entries.save").await.len(), 1);

        table.reload().await.unwrap();
        assert!(table.bindings_for("entries.save").await.is_empty());
    }
}
