use super::model::{CreateItem, Item};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use trellis::prelude::*;

/// In-memory item store.
#[derive(Default, Injectable)]
pub struct ItemsService {
    items: RwLock<Vec<Item>>,
    next_id: AtomicU64,
}

impl ItemsService {
    pub fn list(&self, limit: Option<usize>) -> Vec<Item> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.iter().take(limit.unwrap_or(usize::MAX)).cloned().collect()
    }

    pub fn find(&self, id: u64) -> Option<Item> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.iter().find(|item| item.id == id).cloned()
    }

    pub fn create(&self, input: CreateItem) -> Item {
        let item = Item {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            name: input.name,
            price: input.price,
        };
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.push(item.clone());
        tracing::info!(id = item.id, "Item created");
        item
    }

    pub fn remove(&self, id: u64) -> bool {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        let before = items.len();
        items.retain(|item| item.id != id);
        items.len() != before
    }
}

#[async_trait]
impl OnModuleDestroy for ItemsService {
    async fn on_module_destroy(&self) -> Result<(), LifecycleError> {
        let count = self.items.read().map(|items| items.len()).unwrap_or(0);
        tracing::info!(count, "Dropping in-memory items");
        Ok(())
    }
}
