//! Virtual machine inventory.

use crate::index::{SortKey, SortedVec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Properties the collector gathers for every virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmProperty {
    Name,
    CpuNum,
    ConsolidationNeeded,
    /// CPU usage in MHz.
    CpuUsage,
    /// Configured memory in MiB.
    MemorySize,
    MemorySizeBallooned,
    MemorySizeCompressed,
    MemorySizeSwapped,
    MemorySizeUsageGuest,
    MemorySizeUsageHost,
    MemorySizePrivate,
    MemorySizeShared,
    PowerState,
    Snapshot,
    State,
    StorageCommitted,
    StorageUnshared,
    StorageUncommitted,
    ToolsVersion,
    ToolsRunningStatus,
    Uptime,
    IpAddress,
    GuestHostName,
    GuestFamily,
    GuestFullName,
    Folder,
    /// Management reference of the VM's datastore.
    DatastoreId,
    /// Management reference of the VM's resource pool.
    ResourcePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Nic,
    Disk,
}

/// NIC-specific device details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NicInfo {
    pub mac: Option<String>,
    pub connected: Option<String>,
    pub kind: Option<String>,
    pub backing_device: Option<String>,
    pub dvswitch_uuid: Option<String>,
    pub dvswitch_portgroup: Option<String>,
    pub dvswitch_port: Option<String>,
}

/// A virtual device attached to a VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmDevice {
    pub kind: DeviceKind,
    /// Counter instance name, e.g. "4000" for a NIC or "scsi0:0" for a disk.
    pub instance: Option<String>,
    pub label: Option<String>,
    #[serde(default)]
    pub nic: NicInfo,
}

/// A guest file system reported by VM tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystem {
    pub path: String,
    pub capacity: u64,
    pub free_space: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAttribute {
    pub name: String,
    pub value: String,
}

impl SortKey for CustomAttribute {
    type Key = str;

    fn sort_key(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub uuid: String,
    /// Management object reference, used to key performance counters.
    pub id: String,
    #[serde(default)]
    pub props: HashMap<VmProperty, String>,
    #[serde(default)]
    pub devices: Vec<VmDevice>,
    #[serde(default)]
    pub file_systems: Vec<FileSystem>,
    #[serde(default)]
    pub custom_attributes: SortedVec<CustomAttribute>,
    #[serde(default)]
    pub snapshot_count: u64,
}

impl VirtualMachine {
    pub fn new(uuid: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            id: id.into(),
            props: HashMap::new(),
            devices: Vec::new(),
            file_systems: Vec::new(),
            custom_attributes: SortedVec::new(),
            snapshot_count: 0,
        }
    }

    pub fn with_prop(mut self, prop: VmProperty, value: impl Into<String>) -> Self {
        self.props.insert(prop, value.into());
        self
    }

    pub fn prop(&self, prop: VmProperty) -> Option<&str> {
        self.props.get(&prop).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.prop(VmProperty::Name)
    }

    pub fn devices_of(&self, kind: DeviceKind) -> impl Iterator<Item = &VmDevice> {
        self.devices.iter().filter(move |d| d.kind == kind)
    }
}
