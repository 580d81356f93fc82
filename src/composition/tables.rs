//! Per-node objective tables
//!
//! Every composition-tree node keeps a filter, forward and next table. The
//! forward table also remembers which composed (parent) objectives each child
//! objective helped produce, so removing the child can retract them.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::identifiers::{NextId, ObjectiveId};
use crate::objective::{FilteringObjective, ForwardingObjective, NextObjective, Operation};

/// An objective that can live in an [`ObjectiveTable`]
pub trait TableEntry: Clone + PartialEq {
    /// Table key
    type Key: Clone + Eq + Hash + Debug;

    /// Key this entry is stored under
    fn table_key(&self) -> Self::Key;

    /// Requested operation
    fn operation(&self) -> Operation;
}

impl TableEntry for FilteringObjective {
    type Key = ObjectiveId;

    fn table_key(&self) -> ObjectiveId {
        self.id()
    }

    fn operation(&self) -> Operation {
        FilteringObjective::operation(self)
    }
}

impl TableEntry for ForwardingObjective {
    type Key = ObjectiveId;

    fn table_key(&self) -> ObjectiveId {
        self.id()
    }

    fn operation(&self) -> Operation {
        ForwardingObjective::operation(self)
    }
}

impl TableEntry for NextObjective {
    type Key = NextId;

    fn table_key(&self) -> NextId {
        self.id()
    }

    fn operation(&self) -> Operation {
        NextObjective::operation(self)
    }
}

/// Insertion-ordered objective store
#[derive(Debug, Clone)]
pub struct ObjectiveTable<T: TableEntry> {
    entries: IndexMap<T::Key, T>,
}

impl<T: TableEntry> Default for ObjectiveTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TableEntry> ObjectiveTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Apply an ADD or REMOVE
    ///
    /// Returns the objective when the table changed and nothing when the
    /// request was a no-op (ADD of an identical entry, REMOVE of an absent key).
    pub fn update(&mut self, objective: T) -> Vec<T> {
        let key = objective.table_key();
        match objective.operation() {
            Operation::Add => {
                if self.entries.get(&key) == Some(&objective) {
                    return Vec::new();
                }
                self.entries.insert(key, objective.clone());
                vec![objective]
            }
            Operation::Remove => match self.entries.shift_remove(&key) {
                Some(_) => vec![objective],
                None => Vec::new(),
            },
        }
    }

    /// Look up an entry
    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.entries.get(key)
    }

    /// True when `key` is present
    pub fn contains(&self, key: &T::Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries in insertion order
    pub fn objectives(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Filtering objectives keyed by content identity
pub type FilterTable = ObjectiveTable<FilteringObjective>;

/// Next objectives keyed by next id
pub type NextTable = ObjectiveTable<NextObjective>;

/// Forwarding objectives plus child-to-parent provenance
#[derive(Debug, Clone, Default)]
pub struct ForwardTable {
    table: ObjectiveTable<ForwardingObjective>,
    generated_parents: HashMap<ObjectiveId, Vec<ForwardingObjective>>,
}

impl ForwardTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an ADD or REMOVE, see [`ObjectiveTable::update`]
    pub fn update(&mut self, objective: ForwardingObjective) -> Vec<ForwardingObjective> {
        self.table.update(objective)
    }

    /// Remember that `child` contributed to `parent`
    pub fn record_parent(&mut self, child: ObjectiveId, parent: &ForwardingObjective) {
        let parents = self.generated_parents.entry(child).or_default();
        if !parents.iter().any(|p| p.id() == parent.id()) {
            parents.push(parent.clone());
        }
    }

    /// REMOVE copies of every parent `child` contributed to
    ///
    /// The provenance entry itself stays until [`forget_child`](Self::forget_child).
    pub fn remove_updates_for(&self, child: &ObjectiveId) -> Vec<ForwardingObjective> {
        self.generated_parents
            .get(child)
            .map(|parents| parents.iter().map(ForwardingObjective::as_remove).collect())
            .unwrap_or_default()
    }

    /// Drop the provenance entry of `child`
    pub fn forget_child(&mut self, child: &ObjectiveId) {
        self.generated_parents.remove(child);
    }

    /// Drop a removed parent from every remaining provenance list
    pub fn purge_parent(&mut self, parent: &ObjectiveId) {
        self.generated_parents.retain(|_, parents| {
            parents.retain(|p| p.id() != *parent);
            !parents.is_empty()
        });
    }

    /// Parents recorded for `child`
    pub fn generated_parents(&self, child: &ObjectiveId) -> &[ForwardingObjective] {
        self.generated_parents
            .get(child)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of children with recorded provenance
    pub fn provenance_len(&self) -> usize {
        self.generated_parents.len()
    }

    /// Look up an entry
    pub fn get(&self, id: &ObjectiveId) -> Option<&ForwardingObjective> {
        self.table.get(id)
    }

    /// True when `id` is present
    pub fn contains(&self, id: &ObjectiveId) -> bool {
        self.table.contains(id)
    }

    /// Entries in insertion order
    pub fn objectives(&self) -> impl Iterator<Item = &ForwardingObjective> {
        self.table.objectives()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::ApplicationId;
    use crate::objective::{NextType, TrafficSelector, TrafficTreatment};
    use pretty_assertions::assert_eq;

    fn fo(priority: i32) -> ForwardingObjective {
        ForwardingObjective::builder(ApplicationId::new(1))
            .with_priority(priority)
            .add()
    }

    #[test]
    fn test_update_reports_effect() {
        let mut table = ForwardTable::new();
        assert_eq!(table.update(fo(1)), vec![fo(1)]);
        assert!(table.update(fo(1)).is_empty());
        assert_eq!(table.len(), 1);

        assert_eq!(table.update(fo(1).as_remove()), vec![fo(1).as_remove()]);
        assert!(table.update(fo(1).as_remove()).is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_next_table_replaces_changed_entry() {
        let mut table = NextTable::new();
        let simple = NextObjective::builder(NextId::new(1), ApplicationId::new(1)).add();
        let hashed = NextObjective::builder(NextId::new(1), ApplicationId::new(1))
            .with_type(NextType::Hashed)
            .add_treatment(TrafficTreatment::empty())
            .add();

        assert_eq!(table.update(simple.clone()).len(), 1);
        assert!(table.update(simple).is_empty());
        assert_eq!(table.update(hashed.clone()).len(), 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&NextId::new(1)), Some(&hashed));
    }

    #[test]
    fn test_filter_table_keys_by_identity() {
        let mut table = FilterTable::new();
        let filter = FilteringObjective::builder(ApplicationId::new(1)).add();
        table.update(filter.clone());
        assert!(table.contains(&filter.id()));
        assert_eq!(table.update(filter.as_remove()).len(), 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_provenance_lifecycle() {
        let mut table = ForwardTable::new();
        let child = fo(1);
        let parent_a = fo(10);
        let parent_b = ForwardingObjective::builder(ApplicationId::new(1))
            .with_selector(TrafficSelector::builder().match_tcp_dst(80).build())
            .add();

        table.record_parent(child.id(), &parent_a);
        table.record_parent(child.id(), &parent_a);
        table.record_parent(child.id(), &parent_b);
        assert_eq!(table.generated_parents(&child.id()).len(), 2);

        let removes = table.remove_updates_for(&child.id());
        assert_eq!(removes, vec![parent_a.as_remove(), parent_b.as_remove()]);
        assert_eq!(table.provenance_len(), 1);

        table.forget_child(&child.id());
        assert!(table.generated_parents(&child.id()).is_empty());
        assert_eq!(table.provenance_len(), 0);
    }

    #[test]
    fn test_purge_parent_drops_empty_entries() {
        let mut table = ForwardTable::new();
        let parent = fo(10);
        table.record_parent(fo(1).id(), &parent);
        table.record_parent(fo(2).id(), &parent);
        table.record_parent(fo(2).id(), &fo(20));

        table.purge_parent(&parent.id());
        assert!(table.generated_parents(&fo(1).id()).is_empty());
        assert_eq!(table.generated_parents(&fo(2).id()), &[fo(20)]);
        assert_eq!(table.provenance_len(), 1);
    }
}
