//! Installer pool
//!
//! Every composed objective is installed by its own task. A semaphore bounds
//! how many tasks talk to devices at once; a task keeps its permit while it
//! sleeps between pipeliner lookups.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock, Semaphore};
use tracing::{debug, warn};

use super::metrics::{
    CompositionMetrics, DRIVER_FAILURES, INSTALLS, INSTALL_ATTEMPTS, NO_PIPELINER,
};
use super::pending::PendingForwards;
use super::pipeliner::Pipeliner;
use crate::config::CompositionConfig;
use crate::errors::ObjectiveError;
use crate::identifiers::DeviceId;
use crate::objective::{Objective, Operation};

/// Device to bound pipeliner
pub(crate) type PipelinerRegistry = Arc<RwLock<HashMap<DeviceId, Arc<dyn Pipeliner>>>>;

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count even if the task panics
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn new(in_flight: Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub(crate) struct Installer {
    pipeliners: PipelinerRegistry,
    pending: Arc<PendingForwards>,
    metrics: CompositionMetrics,
    permits: Arc<Semaphore>,
    in_flight: Arc<InFlight>,
    attempts: u32,
    delay: Duration,
}

impl Installer {
    pub(crate) fn new(
        config: &CompositionConfig,
        pipeliners: PipelinerRegistry,
        pending: Arc<PendingForwards>,
        metrics: CompositionMetrics,
    ) -> Self {
        Self {
            pipeliners,
            pending,
            metrics,
            permits: Arc::new(Semaphore::new(config.installer_workers)),
            in_flight: Arc::new(InFlight::default()),
            attempts: config.install_retry_attempts,
            delay: config.install_retry_delay(),
        }
    }

    /// Queue `objective` for installation on `device_id`
    pub(crate) fn install(&self, device_id: DeviceId, objective: Objective) {
        let guard = InFlightGuard::new(self.in_flight.clone());
        let installer = self.clone();
        tokio::spawn(async move {
            installer.run(device_id, objective).await;
            drop(guard);
        });
    }

    /// Resolves once no installation task is running
    pub(crate) async fn wait_idle(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            if self.in_flight.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }

    async fn run(&self, device_id: DeviceId, objective: Objective) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };

        for attempt in 1..=self.attempts {
            self.metrics.increment(INSTALL_ATTEMPTS).await;
            let pipeliner = self.pipeliners.read().await.get(&device_id).cloned();
            if let Some(pipeliner) = pipeliner {
                self.dispatch(&device_id, pipeliner, objective).await;
                return;
            }
            if attempt < self.attempts {
                warn!(
                    device_id = %device_id,
                    attempt,
                    kind = objective.kind(),
                    "no pipeliner bound, retrying"
                );
                tokio::time::sleep(self.delay).await;
            }
        }

        warn!(
            device_id = %device_id,
            attempts = self.attempts,
            kind = objective.kind(),
            "no pipeliner bound, giving up"
        );
        self.metrics.increment(NO_PIPELINER).await;
        self.fail(&device_id, objective, ObjectiveError::NoPipeliner)
            .await;
    }

    async fn dispatch(&self, device_id: &DeviceId, pipeliner: Arc<dyn Pipeliner>, objective: Objective) {
        let kind = objective.kind();
        let operation = objective.operation();
        self.metrics.increment(INSTALLS).await;

        let timer = self.metrics.timer("install");
        let result = match objective {
            Objective::Filter(o) => pipeliner.filter(o).await,
            Objective::Forward(o) => pipeliner.forward(o).await,
            Objective::Next(o) => pipeliner.next(o).await,
        };
        timer.record().await;

        match result {
            Ok(()) => debug!(device_id = %device_id, kind, %operation, "objective handed to pipeliner"),
            Err(error) => {
                self.metrics.increment(DRIVER_FAILURES).await;
                warn!(device_id = %device_id, kind, %operation, %error, "pipeliner rejected objective");
            }
        }
    }

    /// Report `error` and fail whatever waited on a failed next objective
    async fn fail(&self, device_id: &DeviceId, objective: Objective, error: ObjectiveError) {
        objective.notify_error(error);

        if let Objective::Next(next) = &objective {
            if next.operation() == Operation::Add {
                for pending in self.pending.take_for_device(next.id(), device_id).await {
                    debug!(
                        device_id = %device_id,
                        next_id = %next.id(),
                        "failing forwarding objective parked on failed next objective"
                    );
                    Objective::Forward(pending.objective).notify_error(error);
                }
            }
        }
    }
}
