//! Forwarding objectives

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{content_id, ContextRef, Operation, TrafficSelector, TrafficTreatment};
use crate::identifiers::{ApplicationId, NextId, ObjectiveId};

/// How specific the match of a forwarding objective is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForwardingFlag {
    /// Destination-based match the pipeline may place in a specific table
    Specific,
    /// Arbitrary match, usually an ACL-style table
    Versatile,
}

/// Match a selector and apply a treatment, or hand off to a next group
#[derive(Clone, Serialize)]
pub struct ForwardingObjective {
    id: ObjectiveId,
    operation: Operation,
    app_id: ApplicationId,
    priority: i32,
    selector: TrafficSelector,
    treatment: TrafficTreatment,
    next_id: Option<NextId>,
    flag: ForwardingFlag,
    permanent: bool,
    timeout: u32,
    #[serde(skip)]
    context: Option<ContextRef>,
}

impl ForwardingObjective {
    /// Start building an objective owned by `app_id`
    pub fn builder(app_id: ApplicationId) -> ForwardingObjectiveBuilder {
        ForwardingObjectiveBuilder::new(app_id)
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

    /// Match criteria
    pub fn selector(&self) -> &TrafficSelector {
        &self.selector
    }

    /// Instructions
    pub fn treatment(&self) -> &TrafficTreatment {
        &self.treatment
    }

    /// Next group this objective forwards to
    pub fn next_id(&self) -> Option<NextId> {
        self.next_id
    }

    /// Match flag
    pub fn flag(&self) -> ForwardingFlag {
        self.flag
    }

    /// True when the rule never expires
    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// Idle timeout in seconds for temporary rules
    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    /// Completion callback
    pub fn context(&self) -> Option<&ContextRef> {
        self.context.as_ref()
    }

    /// A builder pre-filled with this objective's fields (context not copied)
    pub fn to_builder(&self) -> ForwardingObjectiveBuilder {
        ForwardingObjectiveBuilder {
            app_id: self.app_id,
            priority: self.priority,
            selector: self.selector.clone(),
            treatment: self.treatment.clone(),
            next_id: self.next_id,
            flag: self.flag,
            permanent: self.permanent,
            timeout: self.timeout,
        }
    }

    /// The same objective with a REMOVE operation
    pub fn as_remove(&self) -> Self {
        let mut copy = self.clone();
        copy.operation = Operation::Remove;
        copy
    }

    /// The same objective with a different completion callback
    pub fn with_context(mut self, context: Option<ContextRef>) -> Self {
        self.context = context;
        self
    }

    fn identity(&self) -> ObjectiveId {
        content_id(&(
            &self.selector,
            self.flag,
            self.permanent,
            self.timeout,
            self.app_id,
            self.priority,
            self.next_id,
            &self.treatment,
        ))
    }
}

impl PartialEq for ForwardingObjective {
    fn eq(&self, other: &Self) -> bool {
        self.operation == other.operation
            && self.app_id == other.app_id
            && self.priority == other.priority
            && self.flag == other.flag
            && self.permanent == other.permanent
            && self.timeout == other.timeout
            && self.next_id == other.next_id
            && self.selector == other.selector
            && self.treatment == other.treatment
    }
}

impl Eq for ForwardingObjective {}

impl fmt::Debug for ForwardingObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingObjective")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("app_id", &self.app_id)
            .field("priority", &self.priority)
            .field("selector", &self.selector)
            .field("treatment", &self.treatment)
            .field("next_id", &self.next_id)
            .field("flag", &self.flag)
            .field("permanent", &self.permanent)
            .field("timeout", &self.timeout)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

impl fmt::Display for ForwardingObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ForwardingObjective{{id={}, op={}, app={}, priority={}, selector={}, treatment={}",
            self.id, self.operation, self.app_id, self.priority, self.selector, self.treatment
        )?;
        if let Some(next_id) = self.next_id {
            write!(f, ", next={next_id}")?;
        }
        f.write_str("}")
    }
}

/// Builder for [`ForwardingObjective`]
#[derive(Debug, Clone)]
pub struct ForwardingObjectiveBuilder {
    app_id: ApplicationId,
    priority: i32,
    selector: TrafficSelector,
    treatment: TrafficTreatment,
    next_id: Option<NextId>,
    flag: ForwardingFlag,
    permanent: bool,
    timeout: u32,
}

impl ForwardingObjectiveBuilder {
    fn new(app_id: ApplicationId) -> Self {
        Self {
            app_id,
            priority: 0,
            selector: TrafficSelector::empty(),
            treatment: TrafficTreatment::empty(),
            next_id: None,
            flag: ForwardingFlag::Versatile,
            permanent: true,
            timeout: 0,
        }
    }

    /// Change the owning application
    pub fn from_app(mut self, app_id: ApplicationId) -> Self {
        self.app_id = app_id;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the selector
    pub fn with_selector(mut self, selector: TrafficSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Set the treatment
    pub fn with_treatment(mut self, treatment: TrafficTreatment) -> Self {
        self.treatment = treatment;
        self
    }

    /// Forward to a next group
    pub fn next_step(mut self, next_id: NextId) -> Self {
        self.next_id = Some(next_id);
        self
    }

    /// Set the match flag
    pub fn with_flag(mut self, flag: ForwardingFlag) -> Self {
        self.flag = flag;
        self
    }

    /// Rule never expires
    pub fn make_permanent(mut self) -> Self {
        self.permanent = true;
        self.timeout = 0;
        self
    }

    /// Rule expires after `timeout` idle seconds
    pub fn make_temporary(mut self, timeout: u32) -> Self {
        self.permanent = false;
        self.timeout = timeout;
        self
    }

    /// Build an ADD objective
    pub fn add(self) -> ForwardingObjective {
        self.build(Operation::Add, None)
    }

    /// Build a REMOVE objective
    pub fn remove(self) -> ForwardingObjective {
        self.build(Operation::Remove, None)
    }

    /// Build an ADD objective with a completion callback
    pub fn add_with_context(self, context: ContextRef) -> ForwardingObjective {
        self.build(Operation::Add, Some(context))
    }

    /// Build a REMOVE objective with a completion callback
    pub fn remove_with_context(self, context: ContextRef) -> ForwardingObjective {
        self.build(Operation::Remove, Some(context))
    }

    fn build(self, operation: Operation, context: Option<ContextRef>) -> ForwardingObjective {
        let mut objective = ForwardingObjective {
            id: ObjectiveId::from_raw(0),
            operation,
            app_id: self.app_id,
            priority: self.priority,
            selector: self.selector,
            treatment: self.treatment,
            next_id: self.next_id,
            flag: self.flag,
            permanent: self.permanent,
            timeout: self.timeout,
            context,
        };
        objective.id = objective.identity();
        objective
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::PortNumber;

    fn sample() -> ForwardingObjectiveBuilder {
        ForwardingObjective::builder(ApplicationId::new(31))
            .with_priority(1)
            .with_selector(
                TrafficSelector::builder()
                    .match_ip_dst("2.0.0.1/32".parse().unwrap())
                    .build(),
            )
            .with_treatment(
                TrafficTreatment::builder()
                    .set_output(PortNumber::new(1))
                    .build(),
            )
    }

    #[test]
    fn test_identity_ignores_operation() {
        let add = sample().add();
        let remove = sample().remove();
        assert_eq!(add.id(), remove.id());
        assert_ne!(add, remove);
        assert_eq!(add.as_remove(), remove);
    }

    #[test]
    fn test_identity_tracks_content() {
        let base = sample().add();
        assert_ne!(base.id(), sample().with_priority(2).add().id());
        assert_ne!(base.id(), sample().next_step(NextId::new(4)).add().id());
        assert_ne!(base.id(), sample().make_temporary(30).add().id());
        assert_eq!(base.id(), base.to_builder().add().id());
    }

    #[test]
    fn test_display_is_readable() {
        let rendered = sample().add().to_string();
        assert!(rendered.contains("op=ADD"));
        assert!(rendered.contains("IPV4_DST:2.0.0.1/32"));
        assert!(rendered.contains("OUTPUT:1"));
    }
}
