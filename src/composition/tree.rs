// Copyright 2025 Cowboy AI, LLC.

//! Per-device composition tree
//!
//! Leaves own the objectives of one application. Internal nodes combine the
//! forward tables of their two children with a [`CompositionOperator`] and
//! keep the composed result in their own tables. Each `update_*` call walks
//! the whole tree and returns the delta observed at the node it was called on,
//! so calling it on the root yields exactly what has to change on the device.

use std::fmt;
use tracing::trace;

use super::algebra::{compose_override, compose_parallel, compose_sequential};
use super::tables::{FilterTable, ForwardTable, NextTable};
use crate::identifiers::{ApplicationId, ObjectiveId};
use crate::objective::{
    ContextRef, FilteringObjective, ForwardingObjective, NextObjective, Operation,
};

/// Default left-priority multiplier of sequential composition
pub const DEFAULT_PRIORITY_MULTIPLIER: i32 = 10;

/// Default priority bonus of the left branch of override composition
pub const DEFAULT_PRIORITY_ADDEND: i32 = 10;

/// How an internal node combines its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionOperator {
    /// `+`: both applications act on every packet
    Parallel,
    /// `>`: the right application sees the left one's output
    Sequential,
    /// `/`: the left application takes precedence
    Override,
}

impl CompositionOperator {
    /// Operator symbol in policy expressions
    pub fn symbol(self) -> char {
        match self {
            CompositionOperator::Parallel => '+',
            CompositionOperator::Sequential => '>',
            CompositionOperator::Override => '/',
        }
    }

    /// Operator for a policy expression symbol
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(CompositionOperator::Parallel),
            '>' => Some(CompositionOperator::Sequential),
            '/' => Some(CompositionOperator::Override),
            _ => None,
        }
    }

    /// Binding strength; higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            CompositionOperator::Parallel => 1,
            CompositionOperator::Sequential => 2,
            CompositionOperator::Override => 3,
        }
    }
}

impl fmt::Display for CompositionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf(ApplicationId),
    Operator {
        operator: CompositionOperator,
        left: Box<CompositionTree>,
        right: Box<CompositionTree>,
    },
}

/// A node of the composition tree together with its subtree
///
/// Children are owned exclusively. Cloning copies table state; use
/// [`fresh_copy`](Self::fresh_copy) for an empty tree of the same shape.
#[derive(Debug, Clone)]
pub struct CompositionTree {
    kind: NodeKind,
    filter_table: FilterTable,
    forward_table: ForwardTable,
    next_table: NextTable,
    priority_multiplier: i32,
    priority_addend: i32,
}

impl CompositionTree {
    /// A leaf bound to one application
    pub fn leaf(app_id: ApplicationId) -> Self {
        Self::with_kind(NodeKind::Leaf(app_id))
    }

    /// An internal node combining two subtrees
    pub fn node(operator: CompositionOperator, left: Self, right: Self) -> Self {
        Self::with_kind(NodeKind::Operator {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            filter_table: FilterTable::new(),
            forward_table: ForwardTable::new(),
            next_table: NextTable::new(),
            priority_multiplier: DEFAULT_PRIORITY_MULTIPLIER,
            priority_addend: DEFAULT_PRIORITY_ADDEND,
        }
    }

    /// Set the sequential multiplier and override addend on every node
    pub fn with_priorities(mut self, multiplier: i32, addend: i32) -> Self {
        self.set_priorities(multiplier, addend);
        self
    }

    fn set_priorities(&mut self, multiplier: i32, addend: i32) {
        self.priority_multiplier = multiplier;
        self.priority_addend = addend;
        if let NodeKind::Operator { left, right, .. } = &mut self.kind {
            left.set_priorities(multiplier, addend);
            right.set_priorities(multiplier, addend);
        }
    }

    /// Same shape and tunables, empty tables
    pub fn fresh_copy(&self) -> Self {
        let kind = match &self.kind {
            NodeKind::Leaf(app_id) => NodeKind::Leaf(*app_id),
            NodeKind::Operator {
                operator,
                left,
                right,
            } => NodeKind::Operator {
                operator: *operator,
                left: Box::new(left.fresh_copy()),
                right: Box::new(right.fresh_copy()),
            },
        };
        Self {
            priority_multiplier: self.priority_multiplier,
            priority_addend: self.priority_addend,
            ..Self::with_kind(kind)
        }
    }

    /// Operator of an internal node, `None` for a leaf
    pub fn operator(&self) -> Option<CompositionOperator> {
        match &self.kind {
            NodeKind::Leaf(_) => None,
            NodeKind::Operator { operator, .. } => Some(*operator),
        }
    }

    /// Application of a leaf, `None` for an internal node
    pub fn leaf_app(&self) -> Option<ApplicationId> {
        match &self.kind {
            NodeKind::Leaf(app_id) => Some(*app_id),
            NodeKind::Operator { .. } => None,
        }
    }

    /// True for a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// Left subtree
    pub fn left(&self) -> Option<&CompositionTree> {
        match &self.kind {
            NodeKind::Leaf(_) => None,
            NodeKind::Operator { left, .. } => Some(left),
        }
    }

    /// Right subtree
    pub fn right(&self) -> Option<&CompositionTree> {
        match &self.kind {
            NodeKind::Leaf(_) => None,
            NodeKind::Operator { right, .. } => Some(right),
        }
    }

    /// Sequential multiplier of this node
    pub fn priority_multiplier(&self) -> i32 {
        self.priority_multiplier
    }

    /// Override addend of this node
    pub fn priority_addend(&self) -> i32 {
        self.priority_addend
    }

    /// Filtering objectives held at this node
    pub fn filter_objectives(&self) -> impl Iterator<Item = &FilteringObjective> {
        self.filter_table.objectives()
    }

    /// Forwarding objectives held at this node
    pub fn forward_objectives(&self) -> impl Iterator<Item = &ForwardingObjective> {
        self.forward_table.objectives()
    }

    /// Next objectives held at this node
    pub fn next_objectives(&self) -> impl Iterator<Item = &NextObjective> {
        self.next_table.objectives()
    }

    /// Composed objectives `child` contributed to, as recorded at this node
    pub fn generated_parents(&self, child: &ObjectiveId) -> &[ForwardingObjective] {
        self.forward_table.generated_parents(child)
    }

    /// Apply a filtering objective; returns the change at this node
    pub fn update_filter(&mut self, objective: FilteringObjective) -> Vec<FilteringObjective> {
        match &mut self.kind {
            NodeKind::Leaf(app_id) => {
                if objective.app_id() == *app_id {
                    self.filter_table.update(objective)
                } else {
                    Vec::new()
                }
            }
            NodeKind::Operator { left, right, .. } => {
                let mut incoming = left.update_filter(objective.clone());
                incoming.extend(right.update_filter(objective));
                incoming
                    .into_iter()
                    .flat_map(|o| self.filter_table.update(o))
                    .collect()
            }
        }
    }

    /// Apply a next objective; returns the change at this node
    pub fn update_next(&mut self, objective: NextObjective) -> Vec<NextObjective> {
        match &mut self.kind {
            NodeKind::Leaf(app_id) => {
                if objective.app_id() == *app_id {
                    self.next_table.update(objective)
                } else {
                    Vec::new()
                }
            }
            NodeKind::Operator { left, right, .. } => {
                let mut incoming = left.update_next(objective.clone());
                incoming.extend(right.update_next(objective));
                incoming
                    .into_iter()
                    .flat_map(|o| self.next_table.update(o))
                    .collect()
            }
        }
    }

    /// Apply a forwarding objective; returns the change at this node
    ///
    /// Removals come first in the returned delta, then additions.
    ///
    /// Provenance is keyed by parent identity. When two child pairs compose
    /// to the same parent, removing either contributing child retracts that
    /// parent and purges it from every provenance list, even though the
    /// other pair would still produce it.
    pub fn update_forward(&mut self, objective: ForwardingObjective) -> Vec<ForwardingObjective> {
        let multiplier = self.priority_multiplier;
        let addend = self.priority_addend;
        let context = objective.context().cloned();

        let (operator, left, right) = match &mut self.kind {
            NodeKind::Leaf(app_id) => {
                return if objective.app_id() == *app_id {
                    self.forward_table.update(objective)
                } else {
                    Vec::new()
                };
            }
            NodeKind::Operator {
                operator,
                left,
                right,
            } => (*operator, left, right),
        };

        let (left_adds, left_removes) = split(left.update_forward(objective.clone()));
        let (right_adds, right_removes) = split(right.update_forward(objective));

        let mut removes = Vec::new();
        for child in left_removes {
            removes.extend(retract_parents(&mut left.forward_table, &child.id(), &context));
        }
        for child in right_removes {
            removes.extend(retract_parents(&mut right.forward_table, &child.id(), &context));
        }

        let adds = match operator {
            CompositionOperator::Parallel | CompositionOperator::Sequential => {
                let compose = |a: &ForwardingObjective, b: &ForwardingObjective| match operator {
                    CompositionOperator::Sequential => compose_sequential(a, b, multiplier),
                    _ => compose_parallel(a, b),
                };
                let mut composed = Vec::new();
                for l in &left_adds {
                    for r in right.forward_table.objectives() {
                        composed.extend(compose_pair(l, r, &compose));
                    }
                }
                for l in left.forward_table.objectives() {
                    if left_adds.iter().any(|added| added.id() == l.id()) {
                        continue;
                    }
                    for r in &right_adds {
                        composed.extend(compose_pair(l, r, &compose));
                    }
                }
                composed
                    .into_iter()
                    .map(|(left_id, right_id, parent)| {
                        let parent = parent.with_context(context.clone());
                        left.forward_table.record_parent(left_id, &parent);
                        right.forward_table.record_parent(right_id, &parent);
                        parent
                    })
                    .collect::<Vec<_>>()
            }
            CompositionOperator::Override => {
                let mut lifted = Vec::new();
                for fo in &left_adds {
                    let parent = compose_override(fo, addend).with_context(context.clone());
                    left.forward_table.record_parent(fo.id(), &parent);
                    lifted.push(parent);
                }
                for fo in &right_adds {
                    let parent = compose_override(fo, 0).with_context(context.clone());
                    right.forward_table.record_parent(fo.id(), &parent);
                    lifted.push(parent);
                }
                lifted
            }
        };

        let mut delta = Vec::new();
        for parent in removes {
            let applied = self.forward_table.update(parent);
            for removed in &applied {
                left.forward_table.purge_parent(&removed.id());
                right.forward_table.purge_parent(&removed.id());
            }
            delta.extend(applied);
        }
        for parent in adds {
            delta.extend(self.forward_table.update(parent));
        }
        delta
    }
}

/// Partition a child delta into (adds, removes)
fn split(delta: Vec<ForwardingObjective>) -> (Vec<ForwardingObjective>, Vec<ForwardingObjective>) {
    delta
        .into_iter()
        .partition(|fo| fo.operation() == Operation::Add)
}

/// REMOVE copies of the parents of `child`, after which its provenance is dropped
fn retract_parents(
    table: &mut ForwardTable,
    child: &ObjectiveId,
    context: &Option<ContextRef>,
) -> Vec<ForwardingObjective> {
    let removes = table
        .remove_updates_for(child)
        .into_iter()
        .map(|parent| parent.with_context(context.clone()))
        .collect();
    table.forget_child(child);
    removes
}

fn compose_pair<F>(
    left: &ForwardingObjective,
    right: &ForwardingObjective,
    compose: &F,
) -> Option<(ObjectiveId, ObjectiveId, ForwardingObjective)>
where
    F: Fn(&ForwardingObjective, &ForwardingObjective) -> Option<ForwardingObjective>,
{
    match compose(left, right) {
        Some(parent) => {
            trace!(left = %left.id(), right = %right.id(), parent = %parent.id(), "composed pair");
            Some((left.id(), right.id(), parent))
        }
        None => {
            trace!(left = %left.id(), right = %right.id(), "pair does not compose");
            None
        }
    }
}

impl fmt::Display for CompositionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Leaf(app_id) => write!(f, "{app_id}"),
            NodeKind::Operator {
                operator,
                left,
                right,
            } => write!(f, "({left}{operator}{right})"),
        }
    }
}
