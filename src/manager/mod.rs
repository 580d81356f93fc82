// Copyright 2025 Cowboy AI, LLC.

//! Composition manager
//!
//! The application-facing entry point. It keeps one composition tree per
//! device, hands every composed change to the installer pool, parks
//! forwarding objectives whose next group does not exist yet, and binds
//! device pipeliners as devices and mastership come and go.

pub mod device;
mod installer;
pub mod metrics;
mod pending;
pub mod pipeliner;
pub mod store;

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::composition::{CompositionTree, PolicyParser};
use crate::config::CompositionConfig;
use crate::errors::{CompositionError, CompositionResult};
use crate::identifiers::{DeviceId, NextId};
use crate::objective::{FilteringObjective, ForwardingObjective, NextObjective, Objective};

pub use device::{DeviceEvent, DeviceService, MastershipEvent, MastershipRole};
pub use metrics::CompositionMetrics;
pub use pending::PendingForward;
pub use pipeliner::{Pipeliner, PipelinerContext, PipelinerProvider};
pub use store::{
    FlowObjectiveStore, InMemoryFlowObjectiveStore, NextGroup, ObjectiveEvent,
    ObjectiveEventKind,
};

use installer::{Installer, PipelinerRegistry};
use pending::{Parking, PendingForwards};

type DeviceTree = Arc<Mutex<CompositionTree>>;

struct ManagerInner {
    config: CompositionConfig,
    store: Arc<dyn FlowObjectiveStore>,
    provider: Arc<dyn PipelinerProvider>,
    devices: Arc<dyn DeviceService>,
    policy: RwLock<Option<CompositionTree>>,
    trees: RwLock<HashMap<DeviceId, DeviceTree>>,
    pipeliners: PipelinerRegistry,
    pending: Arc<PendingForwards>,
    installer: Installer,
    metrics: CompositionMetrics,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Composes application objectives per device and installs the result
///
/// Cloning is cheap; clones share all state.
///
/// Each device tree sits behind its own mutex, so objectives for one device
/// are composed one at a time while different devices proceed in parallel.
#[derive(Clone)]
pub struct CompositionManager {
    inner: Arc<ManagerInner>,
}

impl CompositionManager {
    /// Create a manager; nothing is composed until [`init_policy`](Self::init_policy)
    pub fn new(
        config: CompositionConfig,
        store: Arc<dyn FlowObjectiveStore>,
        provider: Arc<dyn PipelinerProvider>,
        devices: Arc<dyn DeviceService>,
    ) -> CompositionResult<Self> {
        config.validate()?;
        let pipeliners: PipelinerRegistry = Arc::new(RwLock::new(HashMap::new()));
        let pending = Arc::new(PendingForwards::new());
        let metrics = CompositionMetrics::new();
        let installer = Installer::new(&config, pipeliners.clone(), pending.clone(), metrics.clone());

        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                store,
                provider,
                devices,
                policy: RwLock::new(None),
                trees: RwLock::new(HashMap::new()),
                pipeliners,
                pending,
                installer,
                metrics,
                listener: Mutex::new(None),
            }),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &CompositionConfig {
        &self.inner.config
    }

    /// Installation counters
    pub fn metrics(&self) -> &CompositionMetrics {
        &self.inner.metrics
    }

    /// The shared flow-objective store
    pub fn store(&self) -> &Arc<dyn FlowObjectiveStore> {
        &self.inner.store
    }

    /// Start listening for store events and bind pipeliners of mastered devices
    pub async fn activate(&self) {
        let mut listener = self.inner.listener.lock().await;
        if listener.is_some() {
            return;
        }
        let events = self.inner.store.subscribe();
        *listener = Some(tokio::spawn(listen(Arc::downgrade(&self.inner), events)));
        drop(listener);

        let mastered: Vec<DeviceId> = self
            .inner
            .devices
            .available_devices()
            .into_iter()
            .filter(|device_id| self.inner.devices.is_local_master(device_id))
            .collect();
        let bound = join_all(mastered.iter().map(|d| self.bind_pipeliner(d))).await;
        info!(
            devices = mastered.len(),
            bound = bound.iter().filter(|ok| **ok).count(),
            "composition manager activated"
        );
    }

    /// Stop listening and drop all trees, parked objectives and pipeliner bindings
    pub async fn shutdown(&self) {
        if let Some(handle) = self.inner.listener.lock().await.take() {
            handle.abort();
        }
        let mut policy = self.inner.policy.write().await;
        let mut trees = self.inner.trees.write().await;
        *policy = None;
        trees.clear();
        drop(trees);
        drop(policy);
        self.inner.pending.clear().await;
        self.inner.pipeliners.write().await.clear();
        info!("composition manager shut down");
    }

    /// Compile `expression` and give every known device a fresh tree
    ///
    /// On a parse error the previous policy and trees stay in place.
    pub async fn init_policy(&self, expression: &str) -> CompositionResult<()> {
        let template = PolicyParser::parse(expression)?.with_priorities(
            self.inner.config.priority_multiplier,
            self.inner.config.priority_addend,
        );

        let fresh: HashMap<DeviceId, DeviceTree> = self
            .inner
            .devices
            .available_devices()
            .into_iter()
            .map(|device_id| (device_id, Arc::new(Mutex::new(template.fresh_copy()))))
            .collect();

        let mut policy = self.inner.policy.write().await;
        let mut trees = self.inner.trees.write().await;
        info!(policy = %template, devices = fresh.len(), "composition policy installed");
        *trees = fresh;
        *policy = Some(template);
        Ok(())
    }

    /// Installed policy rendered as an expression
    pub async fn policy(&self) -> Option<String> {
        self.inner.policy.read().await.as_ref().map(ToString::to_string)
    }

    /// Compose a filtering objective on `device_id` and install the change
    pub async fn submit_filter(
        &self,
        device_id: &DeviceId,
        objective: FilteringObjective,
    ) -> CompositionResult<()> {
        let tree = self.tree_for(device_id).await?;
        let delta = tree.lock().await.update_filter(objective);
        debug!(device_id = %device_id, changes = delta.len(), "filtering objective composed");
        for composed in delta {
            self.inner
                .installer
                .install(device_id.clone(), Objective::Filter(composed));
        }
        Ok(())
    }

    /// Compose a forwarding objective on `device_id` and install the change
    ///
    /// An objective whose next group is not in the store yet is parked and
    /// installed once the store reports the group.
    pub async fn submit_forward(
        &self,
        device_id: &DeviceId,
        objective: ForwardingObjective,
    ) -> CompositionResult<()> {
        let tree = self.tree_for(device_id).await?;

        let objective = match objective.next_id() {
            Some(next_id) => {
                let parking = self
                    .inner
                    .pending
                    .park_if_missing(self.inner.store.as_ref(), next_id, device_id, objective)
                    .await;
                match parking {
                    Parking::Parked => {
                        self.inner.metrics.increment(metrics::PARKED).await;
                        debug!(device_id = %device_id, next_id = %next_id, "forwarding objective parked");
                        return Ok(());
                    }
                    Parking::Ready(objective) => objective,
                }
            }
            None => objective,
        };

        let delta = tree.lock().await.update_forward(objective);
        debug!(device_id = %device_id, changes = delta.len(), "forwarding objective composed");
        for composed in delta {
            self.inner
                .installer
                .install(device_id.clone(), Objective::Forward(composed));
        }
        Ok(())
    }

    /// Compose a next objective on `device_id` and install the change
    pub async fn submit_next(
        &self,
        device_id: &DeviceId,
        objective: NextObjective,
    ) -> CompositionResult<()> {
        let tree = self.tree_for(device_id).await?;
        let delta = tree.lock().await.update_next(objective);
        debug!(device_id = %device_id, changes = delta.len(), "next objective composed");
        for composed in delta {
            self.inner
                .installer
                .install(device_id.clone(), Objective::Next(composed));
        }
        Ok(())
    }

    /// Reserve a next id from the shared store
    pub fn allocate_next_id(&self) -> NextId {
        self.inner.store.allocate_next_id()
    }

    /// Release forwarding objectives parked on a next group that appeared
    ///
    /// Released objectives go straight to the installer without passing
    /// through the composition tree.
    pub async fn handle_objective_event(&self, event: ObjectiveEvent) {
        if event.kind != ObjectiveEventKind::Add {
            return;
        }
        let released = self.inner.pending.take(event.subject).await;
        self.release(event.subject, released).await;
    }

    /// Release everything parked on a next group the store already holds
    ///
    /// Recovers objectives whose completion event was never delivered, for
    /// example after the store subscription lagged. Returns how many
    /// objectives were handed to the installer.
    pub async fn release_ready(&self) -> usize {
        let ready = self
            .inner
            .pending
            .take_ready(self.inner.store.as_ref())
            .await;
        let mut total = 0;
        for (next_id, released) in ready {
            total += released.len();
            self.release(next_id, released).await;
        }
        total
    }

    async fn release(&self, next_id: NextId, released: Vec<PendingForward>) {
        if released.is_empty() {
            return;
        }
        debug!(next_id = %next_id, released = released.len(), "releasing parked forwarding objectives");
        self.inner
            .metrics
            .add(metrics::RELEASED, released.len() as u64)
            .await;
        for pending in released {
            self.inner
                .installer
                .install(pending.device_id, Objective::Forward(pending.objective));
        }
    }

    /// React to inventory changes
    pub async fn handle_device_event(&self, event: DeviceEvent) {
        let device_id = event.device_id();
        if event.makes_available() {
            if self.inner.devices.is_local_master(device_id) {
                self.bind_pipeliner(device_id).await;
            }
        } else if self.inner.pipeliners.write().await.remove(device_id).is_some() {
            info!(device_id = %device_id, "pipeliner unbound");
        }
    }

    /// React to mastership changes
    pub async fn handle_mastership_event(&self, event: MastershipEvent) {
        match &event {
            MastershipEvent::RoleChanged {
                device_id,
                role: MastershipRole::Master,
            } => {
                self.bind_pipeliner(device_id).await;
            }
            MastershipEvent::RoleChanged { device_id, role } => {
                debug!(device_id = %device_id, ?role, "mastership change ignored");
            }
        }
    }

    /// Bind a pipeliner to `device_id` unless one is bound already
    ///
    /// Returns `true` when a pipeliner is bound afterwards.
    pub async fn bind_pipeliner(&self, device_id: &DeviceId) -> bool {
        if self.inner.pipeliners.read().await.contains_key(device_id) {
            return true;
        }

        let Some(pipeliner) = self.inner.provider.pipeliner(device_id) else {
            warn!(device_id = %device_id, "driver provides no pipeliner");
            return false;
        };
        let context = PipelinerContext::new(self.inner.store.clone());
        if let Err(error) = pipeliner.init(device_id.clone(), context).await {
            warn!(device_id = %device_id, %error, "pipeliner initialization failed");
            return false;
        }

        self.inner
            .pipeliners
            .write()
            .await
            .entry(device_id.clone())
            .or_insert(pipeliner);
        info!(device_id = %device_id, "pipeliner bound");

        match self.tree_for(device_id).await {
            Ok(_) => {}
            Err(CompositionError::NoPolicy) => {
                debug!(device_id = %device_id, "no policy installed; tree deferred");
            }
            Err(error) => {
                warn!(device_id = %device_id, %error, "composition tree unavailable");
            }
        }
        true
    }

    /// True when a pipeliner is bound to `device_id`
    pub async fn is_bound(&self, device_id: &DeviceId) -> bool {
        self.inner.pipeliners.read().await.contains_key(device_id)
    }

    /// Resolves once every queued installation has finished
    pub async fn wait_idle(&self) {
        self.inner.installer.wait_idle().await;
    }

    /// Parked forwarding objectives by awaited next id
    pub async fn pending_forwards(&self) -> HashMap<NextId, Vec<PendingForward>> {
        self.inner.pending.snapshot().await
    }

    /// Number of parked forwarding objectives
    pub async fn pending_count(&self) -> usize {
        self.inner.pending.len().await
    }

    /// Devices that have a composition tree
    pub async fn devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.inner.trees.read().await.keys().cloned().collect();
        devices.sort();
        devices
    }

    /// Policy of `device_id`'s tree rendered as an expression
    pub async fn device_policy(&self, device_id: &DeviceId) -> Option<String> {
        let tree = self.inner.trees.read().await.get(device_id).cloned()?;
        let rendered = tree.lock().await.to_string();
        Some(rendered)
    }

    /// Composed forwarding objectives at the root of `device_id`'s tree
    pub async fn forward_objectives(&self, device_id: &DeviceId) -> Vec<ForwardingObjective> {
        let Some(tree) = self.inner.trees.read().await.get(device_id).cloned() else {
            return Vec::new();
        };
        let tree = tree.lock().await;
        tree.forward_objectives().cloned().collect()
    }

    /// The device's tree, created from the policy on first use
    async fn tree_for(&self, device_id: &DeviceId) -> CompositionResult<DeviceTree> {
        let existing = self.inner.trees.read().await.get(device_id).cloned();
        if let Some(tree) = existing {
            return Ok(tree);
        }

        let policy = self.inner.policy.read().await;
        let template = policy.as_ref().ok_or(CompositionError::NoPolicy)?;
        let mut trees = self.inner.trees.write().await;
        let tree = trees
            .entry(device_id.clone())
            .or_insert_with(|| {
                debug!(device_id = %device_id, "composition tree created");
                Arc::new(Mutex::new(template.fresh_copy()))
            })
            .clone();
        Ok(tree)
    }
}

async fn listen(
    inner: Weak<ManagerInner>,
    mut events: tokio::sync::broadcast::Receiver<ObjectiveEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                CompositionManager { inner }
                    .handle_objective_event(event)
                    .await;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "objective store events dropped");
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let released = CompositionManager { inner }.release_ready().await;
                if released > 0 {
                    info!(released, "parked forwarding objectives recovered after lag");
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pipeliner::MockPipeliner;
    use super::*;
    use crate::identifiers::ApplicationId;
    use crate::objective::TrafficSelector;
    use std::time::Duration;

    struct SingleDevice(DeviceId);

    impl DeviceService for SingleDevice {
        fn available_devices(&self) -> Vec<DeviceId> {
            vec![self.0.clone()]
        }

        fn is_local_master(&self, _device_id: &DeviceId) -> bool {
            true
        }
    }

    struct FixedProvider(Arc<dyn Pipeliner>);

    impl PipelinerProvider for FixedProvider {
        fn pipeliner(&self, _device_id: &DeviceId) -> Option<Arc<dyn Pipeliner>> {
            Some(self.0.clone())
        }
    }

    fn manager(pipeliner: MockPipeliner) -> CompositionManager {
        let config = CompositionConfig::default().with_install_retry(2, Duration::from_millis(5));
        CompositionManager::new(
            config,
            Arc::new(InMemoryFlowObjectiveStore::new()),
            Arc::new(FixedProvider(Arc::new(pipeliner))),
            Arc::new(SingleDevice(DeviceId::from("of:1"))),
        )
        .unwrap()
    }

    fn forward(app: u16) -> ForwardingObjective {
        ForwardingObjective::builder(ApplicationId::new(app))
            .with_priority(1)
            .with_selector(TrafficSelector::builder().match_tcp_dst(80).build())
            .add()
    }

    #[tokio::test]
    async fn test_submit_before_policy_fails() {
        let manager = manager(MockPipeliner::new());
        let err = manager
            .submit_forward(&DeviceId::from("of:1"), forward(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CompositionError::NoPolicy));
    }

    #[tokio::test]
    async fn test_composed_objective_reaches_pipeliner() {
        let mut pipeliner = MockPipeliner::new();
        pipeliner.expect_init().times(1).returning(|_, _| Ok(()));
        pipeliner
            .expect_forward()
            .withf(|fo| fo.app_id() == ApplicationId::new(1) && fo.priority() == 2)
            .times(1)
            .returning(|_| Ok(()));

        let manager = manager(pipeliner);
        let device = DeviceId::from("of:1");
        manager.init_policy("1+2").await.unwrap();
        manager.activate().await;

        manager.submit_forward(&device, forward(1)).await.unwrap();
        manager.submit_forward(&device, forward(2)).await.unwrap();
        manager.wait_idle().await;

        assert_eq!(manager.metrics().get_counter(metrics::INSTALLS).await, 1);
        assert_eq!(manager.forward_objectives(&device).await.len(), 1);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_driver_failure_is_counted_not_retried() {
        let mut pipeliner = MockPipeliner::new();
        pipeliner.expect_init().returning(|_, _| Ok(()));
        pipeliner
            .expect_forward()
            .times(1)
            .returning(|_| Err(crate::errors::PipelinerError::Driver("table full".into())));

        let manager = manager(pipeliner);
        let device = DeviceId::from("of:1");
        manager.init_policy("1").await.unwrap();
        assert!(manager.bind_pipeliner(&device).await);

        manager.submit_forward(&device, forward(1)).await.unwrap();
        manager.wait_idle().await;

        assert_eq!(manager.metrics().get_counter(metrics::DRIVER_FAILURES).await, 1);
        assert_eq!(manager.metrics().get_counter(metrics::INSTALL_ATTEMPTS).await, 1);
    }

    #[tokio::test]
    async fn test_failed_init_leaves_device_unbound() {
        let mut pipeliner = MockPipeliner::new();
        pipeliner
            .expect_init()
            .times(1)
            .returning(|_, _| Err(crate::errors::PipelinerError::Unsupported("pipeline".into())));

        let manager = manager(pipeliner);
        let device = DeviceId::from("of:1");
        assert!(!manager.bind_pipeliner(&device).await);
        assert!(!manager.is_bound(&device).await);
    }
}
