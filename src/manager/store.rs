// Copyright 2025 Cowboy AI, LLC.

//! Shared flow-objective store
//!
//! Pipeliners record the device-specific form of each next objective here
//! once it is installed. The manager waits on the store's events to release
//! forwarding objectives that reference a next group before it exists.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::identifiers::NextId;

const EVENT_CAPACITY: usize = 256;

/// Device-specific representation of an installed next objective
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NextGroup {
    data: Vec<u8>,
}

impl NextGroup {
    /// Wrap pipeliner-defined bytes
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Pipeliner-defined bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// What happened to a next group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveEventKind {
    /// The next group is now available
    Add,
    /// The next group was removed
    Remove,
}

/// Store notification about one next group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveEvent {
    /// What happened
    pub kind: ObjectiveEventKind,
    /// The next id the event is about
    pub subject: NextId,
}

/// Next-id allocation and next-group storage shared by all devices
#[async_trait]
pub trait FlowObjectiveStore: Send + Sync {
    /// Hand out a fresh next id
    fn allocate_next_id(&self) -> NextId;

    /// Stored group for `next_id`
    async fn next_group(&self, next_id: NextId) -> Option<NextGroup>;

    /// Store a group; emits [`ObjectiveEventKind::Add`] after it is visible
    async fn put_next_group(&self, next_id: NextId, group: NextGroup);

    /// Drop a group; emits [`ObjectiveEventKind::Remove`] if one was stored
    async fn remove_next_group(&self, next_id: NextId) -> Option<NextGroup>;

    /// Receive future events
    fn subscribe(&self) -> broadcast::Receiver<ObjectiveEvent>;
}

/// Process-local [`FlowObjectiveStore`]
#[derive(Debug)]
pub struct InMemoryFlowObjectiveStore {
    next_id: AtomicU32,
    groups: RwLock<HashMap<NextId, NextGroup>>,
    events: broadcast::Sender<ObjectiveEvent>,
}

impl Default for InMemoryFlowObjectiveStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFlowObjectiveStore {
    /// Create an empty store; next ids start at 1
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            next_id: AtomicU32::new(1),
            groups: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn emit(&self, kind: ObjectiveEventKind, subject: NextId) {
        // No receivers is fine
        let _ = self.events.send(ObjectiveEvent { kind, subject });
    }
}

#[async_trait]
impl FlowObjectiveStore for InMemoryFlowObjectiveStore {
    fn allocate_next_id(&self) -> NextId {
        NextId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn next_group(&self, next_id: NextId) -> Option<NextGroup> {
        self.groups.read().await.get(&next_id).cloned()
    }

    async fn put_next_group(&self, next_id: NextId, group: NextGroup) {
        self.groups.write().await.insert(next_id, group);
        debug!(next_id = %next_id, "next group stored");
        self.emit(ObjectiveEventKind::Add, next_id);
    }

    async fn remove_next_group(&self, next_id: NextId) -> Option<NextGroup> {
        let removed = self.groups.write().await.remove(&next_id);
        if removed.is_some() {
            self.emit(ObjectiveEventKind::Remove, next_id);
        }
        removed
    }

    fn subscribe(&self) -> broadcast::Receiver<ObjectiveEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_monotonic() {
        let store = InMemoryFlowObjectiveStore::new();
        let first = store.allocate_next_id();
        let second = store.allocate_next_id();
        assert_eq!(first, NextId::new(1));
        assert_eq!(second, NextId::new(2));
    }

    #[tokio::test]
    async fn test_put_emits_after_store() {
        let store = InMemoryFlowObjectiveStore::new();
        let mut events = store.subscribe();
        let id = store.allocate_next_id();

        assert!(store.next_group(id).await.is_none());
        store.put_next_group(id, NextGroup::new(vec![1, 2])).await;

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            ObjectiveEvent {
                kind: ObjectiveEventKind::Add,
                subject: id
            }
        );
        assert_eq!(store.next_group(id).await.unwrap().data(), &[1, 2]);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = InMemoryFlowObjectiveStore::new();
        let id = store.allocate_next_id();
        assert!(store.remove_next_group(id).await.is_none());

        store.put_next_group(id, NextGroup::default()).await;
        let mut events = store.subscribe();
        assert!(store.remove_next_group(id).await.is_some());
        assert_eq!(events.recv().await.unwrap().kind, ObjectiveEventKind::Remove);
    }
}
