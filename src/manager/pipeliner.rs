//! Device pipeliner collaborator
//!
//! A pipeliner turns objectives into the flow and group writes of one device
//! pipeline. It reports the outcome of each write through the objective's
//! [`ObjectiveContext`](crate::objective::ObjectiveContext).

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::store::FlowObjectiveStore;
use crate::errors::PipelinerError;
use crate::identifiers::DeviceId;
use crate::objective::{FilteringObjective, ForwardingObjective, NextObjective};

/// What a pipeliner receives when it is bound to a device
#[derive(Clone)]
pub struct PipelinerContext {
    store: Arc<dyn FlowObjectiveStore>,
}

impl PipelinerContext {
    /// Context backed by `store`
    pub fn new(store: Arc<dyn FlowObjectiveStore>) -> Self {
        Self { store }
    }

    /// Where next groups are recorded
    pub fn store(&self) -> &Arc<dyn FlowObjectiveStore> {
        &self.store
    }
}

impl fmt::Debug for PipelinerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelinerContext").finish_non_exhaustive()
    }
}

/// Driver behaviour for one device pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Pipeliner: Send + Sync {
    /// Bind to `device_id`
    async fn init(&self, device_id: DeviceId, context: PipelinerContext)
        -> Result<(), PipelinerError>;

    /// Install or remove a filtering objective
    async fn filter(&self, objective: FilteringObjective) -> Result<(), PipelinerError>;

    /// Install or remove a forwarding objective
    async fn forward(&self, objective: ForwardingObjective) -> Result<(), PipelinerError>;

    /// Install or remove a next objective
    async fn next(&self, objective: NextObjective) -> Result<(), PipelinerError>;
}

/// Finds the pipeliner for a device's driver
pub trait PipelinerProvider: Send + Sync {
    /// A fresh pipeliner for `device_id`, `None` if its driver has none
    fn pipeliner(&self, device_id: &DeviceId) -> Option<Arc<dyn Pipeliner>>;
}
