//! Next objectives (next-hop groups)

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ContextRef, Operation, TrafficSelector, TrafficTreatment};
use crate::identifiers::{ApplicationId, NextId};

/// Group semantics of a next objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NextType {
    /// Hash across the treatments
    Hashed,
    /// Replicate to every treatment
    Broadcast,
    /// Single treatment
    Simple,
    /// First live treatment wins
    Failover,
}

/// A next-hop group, addressed by a store-allocated [`NextId`]
#[derive(Clone, Serialize)]
pub struct NextObjective {
    id: NextId,
    operation: Operation,
    app_id: ApplicationId,
    next_type: NextType,
    treatments: Vec<TrafficTreatment>,
    meta: Option<TrafficSelector>,
    #[serde(skip)]
    context: Option<ContextRef>,
}

impl NextObjective {
    /// Start building a next objective for `id`
    pub fn builder(id: NextId, app_id: ApplicationId) -> NextObjectiveBuilder {
        NextObjectiveBuilder {
            id,
            app_id,
            next_type: NextType::Simple,
            treatments: Vec::new(),
            meta: None,
        }
    }

    /// Group id
    pub fn id(&self) -> NextId {
        self.id
    }

    /// Requested operation
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Owning application
    pub fn app_id(&self) -> ApplicationId {
        self.app_id
    }

    /// Group semantics
    pub fn next_type(&self) -> NextType {
        self.next_type
    }

    /// Group buckets
    pub fn treatments(&self) -> &[TrafficTreatment] {
        &self.treatments
    }

    /// Selector hint for the pipeline
    pub fn meta(&self) -> Option<&TrafficSelector> {
        self.meta.as_ref()
    }

    /// Completion callback
    pub fn context(&self) -> Option<&ContextRef> {
        self.context.as_ref()
    }

    /// The same objective with a REMOVE operation
    pub fn as_remove(&self) -> Self {
        let mut copy = self.clone();
        copy.operation = Operation::Remove;
        copy
    }
}

impl PartialEq for NextObjective {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.operation == other.operation
            && self.app_id == other.app_id
            && self.next_type == other.next_type
            && self.treatments == other.treatments
            && self.meta == other.meta
    }
}

impl Eq for NextObjective {}

impl fmt::Debug for NextObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NextObjective")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("app_id", &self.app_id)
            .field("next_type", &self.next_type)
            .field("treatments", &self.treatments)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

impl fmt::Display for NextObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NextObjective{{id={}, op={}, app={}, type={:?}, buckets={}}}",
            self.id,
            self.operation,
            self.app_id,
            self.next_type,
            self.treatments.len()
        )
    }
}

/// Builder for [`NextObjective`]
#[derive(Debug, Clone)]
pub struct NextObjectiveBuilder {
    id: NextId,
    app_id: ApplicationId,
    next_type: NextType,
    treatments: Vec<TrafficTreatment>,
    meta: Option<TrafficSelector>,
}

impl NextObjectiveBuilder {
    /// Set the group semantics
    pub fn with_type(mut self, next_type: NextType) -> Self {
        self.next_type = next_type;
        self
    }

    /// Add a bucket
    pub fn add_treatment(mut self, treatment: TrafficTreatment) -> Self {
        self.treatments.push(treatment);
        self
    }

    /// Attach a selector hint
    pub fn with_meta(mut self, meta: TrafficSelector) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Build an ADD objective
    pub fn add(self) -> NextObjective {
        self.build(Operation::Add, None)
    }

    /// Build a REMOVE objective
    pub fn remove(self) -> NextObjective {
        self.build(Operation::Remove, None)
    }

    /// Build an ADD objective with a completion callback
    pub fn add_with_context(self, context: ContextRef) -> NextObjective {
        self.build(Operation::Add, Some(context))
    }

    fn build(self, operation: Operation, context: Option<ContextRef>) -> NextObjective {
        NextObjective {
            id: self.id,
            operation,
            app_id: self.app_id,
            next_type: self.next_type,
            treatments: self.treatments,
            meta: self.meta,
            context,
        }
    }
}
