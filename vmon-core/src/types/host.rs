//! Hypervisor (host system) inventory.

use super::vm::VirtualMachine;
use crate::index::{SortKey, SortedVec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Properties the collector gathers for every host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostProperty {
    Name,
    ConnectionState,
    /// Aggregated CPU usage in MHz.
    OverallCpuUsage,
    FullName,
    HwNumCpuCores,
    HwCpuMhz,
    HwCpuModel,
    HwNumCpuThreads,
    /// Physical memory in bytes.
    HwMemorySize,
    HwModel,
    HwSerialNumber,
    HwUuid,
    HwVendor,
    /// Memory used in MiB.
    MemoryUsed,
    HealthState,
    Status,
    Maintenance,
    /// Seconds since boot.
    Uptime,
    Version,
    Sensors,
    HwSensors,
    NetName,
}

/// Physical NIC duplex mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Duplex {
    Full,
    Half,
}

impl Duplex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Duplex::Full => "full",
            Duplex::Half => "half",
        }
    }
}

/// Physical network interface of a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalNic {
    pub name: String,
    /// Link speed in Mbit/s.
    pub speed: u64,
    pub duplex: Duplex,
    pub driver: Option<String>,
    pub mac: Option<String>,
}

impl SortKey for PhysicalNic {
    type Key = str;

    fn sort_key(&self) -> &str {
        &self.name
    }
}

/// Storage path statistics of one partition backing a datastore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecord {
    pub partition_id: u64,
    pub multipath_active: u32,
    pub multipath_total: u32,
}

impl SortKey for PathRecord {
    type Key = u64;

    fn sort_key(&self) -> &u64 {
        &self.partition_id
    }
}

/// A datastore as seen from one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatastoreMount {
    pub name: String,
    #[serde(default)]
    pub paths: SortedVec<PathRecord>,
}

impl DatastoreMount {
    pub fn active_paths(&self) -> u64 {
        self.paths.iter().map(|p| u64::from(p.multipath_active)).sum()
    }

    pub fn total_paths(&self) -> u64 {
        self.paths.iter().map(|p| u64::from(p.multipath_total)).sum()
    }
}

impl SortKey for DatastoreMount {
    type Key = str;

    fn sort_key(&self) -> &str {
        &self.name
    }
}

/// A hypervisor with the VMs it currently runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub uuid: String,
    /// Management object reference, used to key performance counters.
    pub id: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub props: HashMap<HostProperty, String>,
    #[serde(default)]
    pub cluster_id: Option<String>,
    #[serde(default)]
    pub datacenter_name: String,
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub parent_type: String,
    #[serde(default)]
    pub vms: Vec<VirtualMachine>,
    #[serde(default)]
    pub nics: SortedVec<PhysicalNic>,
    #[serde(default)]
    pub datastore_mounts: SortedVec<DatastoreMount>,
}

impl Host {
    pub fn new(uuid: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            id: id.into(),
            ip: None,
            props: HashMap::new(),
            cluster_id: None,
            datacenter_name: String::new(),
            parent_name: String::new(),
            parent_type: String::new(),
            vms: Vec::new(),
            nics: SortedVec::new(),
            datastore_mounts: SortedVec::new(),
        }
    }

    pub fn with_prop(mut self, prop: HostProperty, value: impl Into<String>) -> Self {
        self.props.insert(prop, value.into());
        self
    }

    pub fn prop(&self, prop: HostProperty) -> Option<&str> {
        self.props.get(&prop).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.prop(HostProperty::Name)
    }
}
