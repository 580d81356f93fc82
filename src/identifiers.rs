//! Identifier types for devices, applications and objectives

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device identifier (e.g. `of:0000000000000001`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device id from its URI form
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Get the underlying URI
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

/// Application identifier
///
/// Policy leaves name applications by this numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(u16);

impl ApplicationId {
    /// Create an application id
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Get the numeric id
    pub const fn id(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a next-hop group, allocated by the shared store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NextId(u32);

impl NextId {
    /// Create a next id
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the numeric id
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content-derived identity of a filtering or forwarding objective
///
/// Two objectives that differ only in their operation share an id, so an
/// ADD and its matching REMOVE address the same table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectiveId(u64);

impl ObjectiveId {
    /// Wrap a raw hash value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw hash value
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Switch port number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortNumber(u64);

impl PortNumber {
    /// Create a port number
    pub const fn new(port: u64) -> Self {
        Self(port)
    }

    /// Get the numeric port
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Group table entry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(u32);

impl GroupId {
    /// Create a group id
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
