//! Forwarding objectives waiting for their next group

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::store::FlowObjectiveStore;
use crate::identifiers::{DeviceId, NextId};
use crate::objective::ForwardingObjective;

/// A forwarding objective parked until its next group exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingForward {
    /// Device the objective was submitted for
    pub device_id: DeviceId,
    /// The parked objective
    pub objective: ForwardingObjective,
    /// When it was parked
    pub parked_at: DateTime<Utc>,
}

/// Outcome of [`PendingForwards::park_if_missing`]
#[derive(Debug)]
pub(crate) enum Parking {
    /// The group is missing; the objective is held
    Parked,
    /// The group exists; the objective is handed back
    Ready(ForwardingObjective),
}

/// Parked forwarding objectives keyed by the next id they wait for
#[derive(Debug, Default)]
pub(crate) struct PendingForwards {
    entries: Mutex<HashMap<NextId, Vec<PendingForward>>>,
}

impl PendingForwards {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Park `objective` unless the store already has `next_id`
    ///
    /// The lookup and the insertion happen under one lock, and
    /// [`take`](Self::take) uses the same lock, so a group that appears in
    /// between cannot strand the objective.
    pub(crate) async fn park_if_missing(
        &self,
        store: &dyn FlowObjectiveStore,
        next_id: NextId,
        device_id: &DeviceId,
        objective: ForwardingObjective,
    ) -> Parking {
        let mut entries = self.entries.lock().await;
        if store.next_group(next_id).await.is_some() {
            return Parking::Ready(objective);
        }
        entries.entry(next_id).or_default().push(PendingForward {
            device_id: device_id.clone(),
            objective,
            parked_at: Utc::now(),
        });
        Parking::Parked
    }

    /// Remove and return everything parked on `next_id`
    pub(crate) async fn take(&self, next_id: NextId) -> Vec<PendingForward> {
        self.entries
            .lock()
            .await
            .remove(&next_id)
            .unwrap_or_default()
    }

    /// Remove and return everything parked on a next id the store already has
    ///
    /// Covers groups whose completion events never arrived.
    pub(crate) async fn take_ready(
        &self,
        store: &dyn FlowObjectiveStore,
    ) -> Vec<(NextId, Vec<PendingForward>)> {
        let mut entries = self.entries.lock().await;
        let mut ready = Vec::new();
        for next_id in entries.keys().copied().collect::<Vec<_>>() {
            if store.next_group(next_id).await.is_some() {
                if let Some(waiting) = entries.remove(&next_id) {
                    ready.push((next_id, waiting));
                }
            }
        }
        ready
    }

    /// Remove and return what `device_id` parked on `next_id`
    pub(crate) async fn take_for_device(
        &self,
        next_id: NextId,
        device_id: &DeviceId,
    ) -> Vec<PendingForward> {
        let mut entries = self.entries.lock().await;
        let Some(waiting) = entries.get_mut(&next_id) else {
            return Vec::new();
        };
        let (taken, kept): (Vec<_>, Vec<_>) = waiting
            .drain(..)
            .partition(|pending| &pending.device_id == device_id);
        if kept.is_empty() {
            entries.remove(&next_id);
        } else {
            *waiting = kept;
        }
        taken
    }

    pub(crate) async fn snapshot(&self) -> HashMap<NextId, Vec<PendingForward>> {
        self.entries.lock().await.clone()
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.values().map(Vec::len).sum()
    }

    pub(crate) async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::ApplicationId;
    use crate::manager::store::{InMemoryFlowObjectiveStore, NextGroup};

    fn waiting_on(next_id: NextId, priority: i32) -> ForwardingObjective {
        ForwardingObjective::builder(ApplicationId::new(1))
            .with_priority(priority)
            .next_step(next_id)
            .add()
    }

    #[tokio::test]
    async fn test_parks_until_group_exists() {
        let store = InMemoryFlowObjectiveStore::new();
        let pending = PendingForwards::new();
        let device = DeviceId::from("of:1");
        let next_id = store.allocate_next_id();

        let first = pending
            .park_if_missing(&store, next_id, &device, waiting_on(next_id, 1))
            .await;
        let second = pending
            .park_if_missing(&store, next_id, &device, waiting_on(next_id, 2))
            .await;
        assert!(matches!(first, Parking::Parked));
        assert!(matches!(second, Parking::Parked));
        assert_eq!(pending.len().await, 2);

        store.put_next_group(next_id, NextGroup::default()).await;
        let ready = pending
            .park_if_missing(&store, next_id, &device, waiting_on(next_id, 3))
            .await;
        assert!(matches!(ready, Parking::Ready(_)));

        let released = pending.take(next_id).await;
        assert_eq!(released.len(), 2);
        assert_eq!(pending.len().await, 0);
        assert!(pending.take(next_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_take_for_device_keeps_others() {
        let store = InMemoryFlowObjectiveStore::new();
        let pending = PendingForwards::new();
        let next_id = store.allocate_next_id();
        let a = DeviceId::from("of:a");
        let b = DeviceId::from("of:b");

        pending.park_if_missing(&store, next_id, &a, waiting_on(next_id, 1)).await;
        pending.park_if_missing(&store, next_id, &b, waiting_on(next_id, 1)).await;

        let taken = pending.take_for_device(next_id, &a).await;
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].device_id, a);
        assert_eq!(pending.snapshot().await[&next_id][0].device_id, b);

        pending.take_for_device(next_id, &b).await;
        assert!(pending.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_take_ready_releases_only_stored_groups() {
        let store = InMemoryFlowObjectiveStore::new();
        let pending = PendingForwards::new();
        let device = DeviceId::from("of:1");
        let stored = store.allocate_next_id();
        let missing = store.allocate_next_id();

        pending.park_if_missing(&store, stored, &device, waiting_on(stored, 1)).await;
        pending.park_if_missing(&store, stored, &device, waiting_on(stored, 2)).await;
        pending.park_if_missing(&store, missing, &device, waiting_on(missing, 1)).await;
        store.put_next_group(stored, NextGroup::default()).await;

        let ready = pending.take_ready(&store).await;
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].0, stored);
        assert_eq!(ready[0].1.len(), 2);
        assert_eq!(pending.len().await, 1);
        assert!(pending.take_ready(&store).await.is_empty());
    }
}
