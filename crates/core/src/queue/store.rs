//! Item storage shared between the orchestrator and its host.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::types::{ItemId, QueueItem};

/// Live view over the queue.
///
/// The orchestrator calls back into this instead of owning the list, so any
/// host (UI model, CLI, tests) can supply its own storage. Every mutation
/// goes through [`ItemStore::update`] under the store's own lock.
pub trait ItemStore: Send + Sync {
    /// Snapshot of all items in insertion order.
    fn list(&self) -> Vec<QueueItem>;

    /// Returns a copy of one item.
    fn get(&self, id: &ItemId) -> Option<QueueItem>;

    /// Appends an item at the end of the queue.
    fn insert(&self, item: QueueItem);

    /// Applies a mutation to one item. Returns false if the id is unknown.
    fn update(&self, id: &ItemId, mutation: &mut dyn FnMut(&mut QueueItem)) -> bool;

    /// Removes one item, returning it.
    fn remove(&self, id: &ItemId) -> Option<QueueItem>;

    /// Removes everything.
    fn clear(&self);
}

/// Vector-backed store guarded by an `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    items: RwLock<Vec<QueueItem>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with items.
    pub fn with_items(items: Vec<QueueItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<QueueItem>> {
        self.items.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<QueueItem>> {
        self.items.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ItemStore for InMemoryItemStore {
    fn list(&self) -> Vec<QueueItem> {
        self.read().clone()
    }

    fn get(&self, id: &ItemId) -> Option<QueueItem> {
        self.read().iter().find(|i| &i.id == id).cloned()
    }

    fn insert(&self, item: QueueItem) {
        self.write().push(item);
    }

    fn update(&self, id: &ItemId, mutation: &mut dyn FnMut(&mut QueueItem)) -> bool {
        let mut items = self.write();
        match items.iter_mut().find(|i| &i.id == id) {
            Some(item) => {
                mutation(item);
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: &ItemId) -> Option<QueueItem> {
        let mut items = self.write();
        let idx = items.iter().position(|i| &i.id == id)?;
        Some(items.remove(idx))
    }

    fn clear(&self) {
        self.write().clear();
    }
}
