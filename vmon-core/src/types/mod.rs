//! Inventory model shared by the store, the registries and the resolver.

pub mod datastore;
pub mod event;
pub mod host;
pub mod inventory;
pub mod snapshot;
pub mod vm;

pub use datastore::{AccessDenial, AccessFlags, Datastore, DiskExtent, HostAccess};
pub use event::Event;
pub use host::{DatastoreMount, Duplex, Host, HostProperty, PathRecord, PhysicalNic};
pub use inventory::{Cluster, Datacenter, DvSwitch, ResourcePool};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use vm::{CustomAttribute, DeviceKind, FileSystem, NicInfo, VirtualMachine, VmDevice, VmProperty};

use crate::error::CheckError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Managed object type a counter or custom query is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    HostSystem,
    VirtualMachine,
    Datastore,
    ClusterComputeResource,
    DistributedVirtualSwitch,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::HostSystem => "HostSystem",
            EntityKind::VirtualMachine => "VirtualMachine",
            EntityKind::Datastore => "Datastore",
            EntityKind::ClusterComputeResource => "ClusterComputeResource",
            EntityKind::DistributedVirtualSwitch => "VmwareDistributedVirtualSwitch",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of management endpoint the snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// A vCenter managing many hosts.
    VCenter,
    /// A standalone ESXi host.
    VSphere,
}

/// API version reported by the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Compact form used by feature gates: 6.5 becomes 65.
    pub fn as_number(&self) -> u32 {
        self.major * 10 + self.minor
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A successful check result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MetricValue {
    Uint(u64),
    Float(f64),
    /// Short string value.
    Str(String),
    /// Multi-line or JSON text.
    Text(String),
}

impl MetricValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MetricValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Float(v) => Some(*v),
            MetricValue::Uint(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Str(s) | MetricValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Uint(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Str(s) | MetricValue::Text(s) => f.write_str(s),
        }
    }
}

/// Outcome of a metric check.
///
/// `Ok(None)` means "no value yet": the data is still being collected and the
/// request must not be reported as broken.
pub type CheckResult = std::result::Result<Option<MetricValue>, CheckError>;

/// Map a health color to its numeric code.
///
/// gray and unknown map to 0, green to 1, yellow to 2, red to 3.
pub fn health_color_code(value: &str) -> std::result::Result<u64, CheckError> {
    match value {
        "gray" | "unknown" => Ok(0),
        "green" => Ok(1),
        "yellow" => Ok(2),
        "red" => Ok(3),
        other => Err(CheckError::UnexpectedStatus(other.to_string())),
    }
}
