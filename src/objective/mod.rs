// Copyright 2025 Cowboy AI, LLC.

//! Flow objectives
//!
//! Applications express device intents as three kinds of objective:
//! - **Filtering**: admit or drop traffic before the forwarding pipeline
//! - **Forwarding**: match a [`TrafficSelector`] and apply a [`TrafficTreatment`]
//!   (or hand off to a next-hop group)
//! - **Next**: define a next-hop group referenced by forwarding objectives
//!
//! Filtering and forwarding objectives carry a content-derived
//! [`ObjectiveId`](crate::identifiers::ObjectiveId) that ignores the
//! operation, so an ADD and the matching REMOVE address the same entry.

pub mod criterion;
pub mod filtering;
pub mod forwarding;
pub mod instruction;
pub mod next;
pub mod selector;
pub mod treatment;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::errors::ObjectiveError;
use crate::identifiers::{ApplicationId, ObjectiveId};

pub use criterion::{
    AddressParseError, Criterion, CriterionType, GridType, IpPrefix, MacAddress, OchSignal,
    OduSignalId,
};
pub use filtering::{FilterType, FilteringObjective, FilteringObjectiveBuilder};
pub use forwarding::{ForwardingFlag, ForwardingObjective, ForwardingObjectiveBuilder};
pub use instruction::{FieldModification, Instruction};
pub use next::{NextObjective, NextObjectiveBuilder, NextType};
pub use selector::{TrafficSelector, TrafficSelectorBuilder};
pub use treatment::{TrafficTreatment, TrafficTreatmentBuilder};

/// What an objective asks the device to do with its entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Install the entry
    Add,
    /// Remove the entry
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add => f.write_str("ADD"),
            Operation::Remove => f.write_str("REMOVE"),
        }
    }
}

/// Completion callback attached to an objective
///
/// Pipeliners report success or failure of device writes through the
/// context; the manager reports [`ObjectiveError::NoPipeliner`] when no
/// pipeliner could be found.
pub trait ObjectiveContext: Send + Sync {
    /// The objective was installed on the device
    fn on_success(&self, _objective: &Objective) {}

    /// The objective could not be installed
    fn on_error(&self, _objective: &Objective, _error: ObjectiveError) {}
}

/// Shared handle to a completion callback
pub type ContextRef = Arc<dyn ObjectiveContext>;

/// Any of the three objective kinds
#[derive(Debug, Clone)]
pub enum Objective {
    /// A filtering objective
    Filter(FilteringObjective),
    /// A forwarding objective
    Forward(ForwardingObjective),
    /// A next objective
    Next(NextObjective),
}

impl Objective {
    /// Short name of the objective kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Objective::Filter(_) => "filter",
            Objective::Forward(_) => "forward",
            Objective::Next(_) => "next",
        }
    }

    /// Owning application
    pub fn app_id(&self) -> ApplicationId {
        match self {
            Objective::Filter(o) => o.app_id(),
            Objective::Forward(o) => o.app_id(),
            Objective::Next(o) => o.app_id(),
        }
    }

    /// Requested operation
    pub fn operation(&self) -> Operation {
        match self {
            Objective::Filter(o) => o.operation(),
            Objective::Forward(o) => o.operation(),
            Objective::Next(o) => o.operation(),
        }
    }

    /// Attached completion callback
    pub fn context(&self) -> Option<&ContextRef> {
        match self {
            Objective::Filter(o) => o.context(),
            Objective::Forward(o) => o.context(),
            Objective::Next(o) => o.context(),
        }
    }

    /// Deliver `error` to the completion callback, if one is attached
    pub fn notify_error(&self, error: ObjectiveError) {
        if let Some(context) = self.context() {
            context.on_error(self, error);
        }
    }

    /// Deliver success to the completion callback, if one is attached
    pub fn notify_success(&self) {
        if let Some(context) = self.context() {
            context.on_success(self);
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Objective::Filter(o) => write!(f, "{o}"),
            Objective::Forward(o) => write!(f, "{o}"),
            Objective::Next(o) => write!(f, "{o}"),
        }
    }
}

/// Hash identity fields into an [`ObjectiveId`]
///
/// The fields are written as canonical JSON into a Blake3 hasher and the
/// first eight digest bytes become the id, so identities are stable across
/// builds and platforms.
pub(crate) fn content_id<T: Serialize + ?Sized>(fields: &T) -> ObjectiveId {
    let mut hasher = blake3::Hasher::new();
    if let Err(error) = serde_json::to_writer(&mut hasher, fields) {
        tracing::error!(%error, "objective identity fields failed to serialize");
    }
    let digest = hasher.finalize();
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&digest.as_bytes()[..8]);
    ObjectiveId::from_raw(u64::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingContext {
        errors: Mutex<Vec<ObjectiveError>>,
    }

    impl ObjectiveContext for RecordingContext {
        fn on_error(&self, _objective: &Objective, error: ObjectiveError) {
            self.errors.lock().unwrap().push(error);
        }
    }

    #[test]
    fn test_notify_error_reaches_context() {
        let context = Arc::new(RecordingContext::default());
        let objective = Objective::Forward(
            ForwardingObjective::builder(ApplicationId::new(1))
                .with_priority(5)
                .add_with_context(context.clone()),
        );
        objective.notify_error(ObjectiveError::NoPipeliner);
        objective.notify_success();
        assert_eq!(*context.errors.lock().unwrap(), vec![ObjectiveError::NoPipeliner]);
    }

    #[test]
    fn test_content_id_is_blake3_of_canonical_json() {
        let digest = blake3::hash(br#"[7,"web",true]"#);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest.as_bytes()[..8]);

        assert_eq!(
            content_id(&(7u32, "web", true)),
            ObjectiveId::from_raw(u64::from_le_bytes(raw))
        );
        assert_ne!(content_id(&(7u32, "web", true)), content_id(&(7u32, "web", false)));
    }

    #[test]
    fn test_forward_identity_ignores_criteria_order_and_operation() {
        let port = crate::identifiers::PortNumber::new(3);
        let a = ForwardingObjective::builder(ApplicationId::new(1))
            .with_selector(TrafficSelector::builder().match_tcp_dst(80).match_in_port(port).build())
            .add();
        let b = ForwardingObjective::builder(ApplicationId::new(1))
            .with_selector(TrafficSelector::builder().match_in_port(port).match_tcp_dst(80).build())
            .add();

        assert_eq!(a.id(), b.id());
        assert_eq!(a.id(), a.as_remove().id());
        assert_ne!(a.id(), a.to_builder().with_priority(9).add().id());
    }

    #[test]
    fn test_notify_without_context_is_noop() {
        let objective = Objective::Forward(ForwardingObjective::builder(ApplicationId::new(1)).add());
        objective.notify_error(ObjectiveError::Unknown);
        assert_eq!(objective.kind(), "forward");
        assert_eq!(objective.operation(), Operation::Add);
    }
}
