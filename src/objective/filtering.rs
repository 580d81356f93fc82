//! Filtering objectives

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{content_id, ContextRef, Criterion, Operation, TrafficTreatment};
use crate::identifiers::{ApplicationId, ObjectiveId};

/// Whether matching traffic is admitted or dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    /// Admit matching traffic into the pipeline
    Permit,
    /// Drop matching traffic
    Deny,
}

/// Admit or drop traffic on a key (usually a port) under extra conditions
#[derive(Clone, Serialize)]
pub struct FilteringObjective {
    id: ObjectiveId,
    operation: Operation,
    app_id: ApplicationId,
    priority: i32,
    filter_type: FilterType,
    key: Option<Criterion>,
    conditions: Vec<Criterion>,
    meta: Option<TrafficTreatment>,
    permanent: bool,
    timeout: u32,
    #[serde(skip)]
    context: Option<ContextRef>,
}

impl FilteringObjective {
    /// Start building a filtering objective owned by `app_id`
    pub fn builder(app_id: ApplicationId) -> FilteringObjectiveBuilder {
        FilteringObjectiveBuilder {
            app_id,
            priority: 0,
            filter_type: FilterType::Permit,
            key: None,
            conditions: Vec::new(),
            meta: None,
            permanent: true,
            timeout: 0,
        }
    }

    /// Content-derived identity (operation excluded)
    pub fn id(&self) -> ObjectiveId {
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

    /// Rule priority
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Permit or deny
    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    /// Filter key
    pub fn key(&self) -> Option<&Criterion> {
        self.key.as_ref()
    }

    /// Additional match conditions
    pub fn conditions(&self) -> &[Criterion] {
        &self.conditions
    }

    /// Treatment hint for the pipeline
    pub fn meta(&self) -> Option<&TrafficTreatment> {
        self.meta.as_ref()
    }

    /// True when the rule never expires
    pub fn is_permanent(&self) -> bool {
        self.permanent
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

impl PartialEq for FilteringObjective {
    fn eq(&self, other: &Self) -> bool {
        self.operation == other.operation
            && self.app_id == other.app_id
            && self.priority == other.priority
            && self.filter_type == other.filter_type
            && self.key == other.key
            && self.conditions == other.conditions
            && self.meta == other.meta
            && self.permanent == other.permanent
            && self.timeout == other.timeout
    }
}

impl Eq for FilteringObjective {}

impl fmt::Debug for FilteringObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteringObjective")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("app_id", &self.app_id)
            .field("priority", &self.priority)
            .field("filter_type", &self.filter_type)
            .field("key", &self.key)
            .field("conditions", &self.conditions)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

impl fmt::Display for FilteringObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FilteringObjective{{id={}, op={}, app={}, type={:?}, priority={}",
            self.id, self.operation, self.app_id, self.filter_type, self.priority
        )?;
        if let Some(key) = &self.key {
            write!(f, ", key={key}")?;
        }
        f.write_str("}")
    }
}

/// Builder for [`FilteringObjective`]
#[derive(Debug, Clone)]
pub struct FilteringObjectiveBuilder {
    app_id: ApplicationId,
    priority: i32,
    filter_type: FilterType,
    key: Option<Criterion>,
    conditions: Vec<Criterion>,
    meta: Option<TrafficTreatment>,
    permanent: bool,
    timeout: u32,
}

impl FilteringObjectiveBuilder {
    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Admit matching traffic
    pub fn permit(mut self) -> Self {
        self.filter_type = FilterType::Permit;
        self
    }

    /// Drop matching traffic
    pub fn deny(mut self) -> Self {
        self.filter_type = FilterType::Deny;
        self
    }

    /// Set the filter key
    pub fn with_key(mut self, key: Criterion) -> Self {
        self.key = Some(key);
        self
    }

    /// Add a match condition
    pub fn add_condition(mut self, condition: Criterion) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Attach a treatment hint
    pub fn with_meta(mut self, meta: TrafficTreatment) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Rule expires after `timeout` idle seconds
    pub fn make_temporary(mut self, timeout: u32) -> Self {
        self.permanent = false;
        self.timeout = timeout;
        self
    }

    /// Build an ADD objective
    pub fn add(self) -> FilteringObjective {
        self.build(Operation::Add, None)
    }

    /// Build a REMOVE objective
    pub fn remove(self) -> FilteringObjective {
        self.build(Operation::Remove, None)
    }

    /// Build an ADD objective with a completion callback
    pub fn add_with_context(self, context: ContextRef) -> FilteringObjective {
        self.build(Operation::Add, Some(context))
    }

    fn build(self, operation: Operation, context: Option<ContextRef>) -> FilteringObjective {
        let id = content_id(&(
            &self.key,
            &self.conditions,
            self.filter_type,
            self.permanent,
            self.timeout,
            self.app_id,
            self.priority,
            &self.meta,
        ));
        FilteringObjective {
            id,
            operation,
            app_id: self.app_id,
            priority: self.priority,
            filter_type: self.filter_type,
            key: self.key,
            conditions: self.conditions,
            meta: self.meta,
            permanent: self.permanent,
            timeout: self.timeout,
            context,
        }
    }
}
