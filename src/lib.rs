//! # CIM Flow Composition
//!
//! Flow-objective composition for software-defined network devices.
//!
//! Independent applications submit filtering, forwarding and next-hop
//! objectives for a device without knowing about each other. A policy
//! expression such as `(1+2)>3/4` says how their objectives combine, and the
//! engine keeps the single consistent objective set each device should carry:
//! - **Objectives**: selectors, treatments and the three objective kinds
//! - **Algebra**: parallel, sequential and override composition
//! - **Composition Tree**: per-device evaluator with provenance-driven removal
//! - **Policy Parser**: policy expressions to trees
//! - **Manager**: per-device trees, retrying installation, pending next groups
//!
//! ## Design Principles
//!
//! 1. **Pure Algebra**: composition never fails; an impossible pair yields nothing
//! 2. **Identity by Content**: ADD and REMOVE of the same objective share an id
//! 3. **Deltas Up the Tree**: every update returns exactly what changed at the root
//! 4. **Explicit Ownership**: one tree per device, each behind its own lock
//! 5. **Collaborators as Traits**: drivers, stores and inventory are injected

#![warn(missing_docs)]

mod config;
mod errors;
mod identifiers;
pub mod composition;
pub mod manager;
pub mod objective;

pub use config::CompositionConfig;
pub use errors::{
    CompositionError, CompositionResult, ObjectiveError, ParseError, PipelinerError,
};
pub use identifiers::{ApplicationId, DeviceId, GroupId, NextId, ObjectiveId, PortNumber};

pub use objective::{
    ContextRef, Criterion, CriterionType, FieldModification, FilterType, FilteringObjective,
    ForwardingFlag, ForwardingObjective, Instruction, IpPrefix, MacAddress, NextObjective,
    NextType, Objective, ObjectiveContext, Operation, TrafficSelector, TrafficTreatment,
};

pub use composition::{
    compose_override, compose_parallel, compose_sequential, intersect_selector,
    revert_selector_through_treatment, union_treatment, CompositionOperator, CompositionTree,
    PolicyParser,
};

pub use manager::{
    CompositionManager, CompositionMetrics, DeviceEvent, DeviceService, FlowObjectiveStore,
    InMemoryFlowObjectiveStore, MastershipEvent, MastershipRole, NextGroup, ObjectiveEvent,
    ObjectiveEventKind, PendingForward, Pipeliner, PipelinerContext, PipelinerProvider,
};
