//! Device inventory and mastership collaborators

use serde::{Deserialize, Serialize};

use crate::identifiers::DeviceId;

/// Inventory view the manager needs
pub trait DeviceService: Send + Sync {
    /// Devices currently available
    fn available_devices(&self) -> Vec<DeviceId>;

    /// True when this instance is master for `device_id`
    fn is_local_master(&self, device_id: &DeviceId) -> bool;
}

/// Inventory change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// A device was discovered
    DeviceAdded {
        /// The device
        device_id: DeviceId,
        /// Whether it is reachable
        available: bool,
    },
    /// A device became reachable or unreachable
    AvailabilityChanged {
        /// The device
        device_id: DeviceId,
        /// Whether it is reachable
        available: bool,
    },
    /// A device left the inventory
    DeviceRemoved {
        /// The device
        device_id: DeviceId,
    },
}

impl DeviceEvent {
    /// Device the event is about
    pub fn device_id(&self) -> &DeviceId {
        match self {
            DeviceEvent::DeviceAdded { device_id, .. }
            | DeviceEvent::AvailabilityChanged { device_id, .. }
            | DeviceEvent::DeviceRemoved { device_id } => device_id,
        }
    }

    /// True when the event leaves the device usable
    pub fn makes_available(&self) -> bool {
        match self {
            DeviceEvent::DeviceAdded { available, .. }
            | DeviceEvent::AvailabilityChanged { available, .. } => *available,
            DeviceEvent::DeviceRemoved { .. } => false,
        }
    }
}

/// Role of this instance for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MastershipRole {
    /// This instance controls the device
    Master,
    /// Backup
    Standby,
    /// No relationship
    None,
}

/// Mastership change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MastershipEvent {
    /// The local role for a device changed
    RoleChanged {
        /// The device
        device_id: DeviceId,
        /// New local role
        role: MastershipRole,
    },
}

impl MastershipEvent {
    /// Device the event is about
    pub fn device_id(&self) -> &DeviceId {
        match self {
            MastershipEvent::RoleChanged { device_id, .. } => device_id,
        }
    }
}
