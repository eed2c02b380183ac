//! Virtual machine checks.

use super::discovery::{self, VmAttributeRow, VmDiskRow, VmFsRow, VmNicRow, VmRow};
use super::session::Session;
use super::{optional, parse_u64, require, Endpoint, MetricResolver};
use crate::counters::{Scaling, KIBIBYTE, MEBIBYTE};
use crate::error::CheckError;
use crate::types::{
    CheckResult, DeviceKind, EntityKind, Host, HostProperty, MetricValue, VirtualMachine,
    VmProperty,
};
use std::str::FromStr;
use tracing::{instrument, warn};

/// Unit of a VM network interface check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetIfMode {
    #[default]
    Bps,
    Pps,
}

impl FromStr for NetIfMode {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "bps" => Ok(NetIfMode::Bps),
            "pps" => Ok(NetIfMode::Pps),
            _ => Err(CheckError::InvalidParameter("fourth")),
        }
    }
}

/// Unit of a VM disk device check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiskIoMode {
    #[default]
    Bps,
    Ops,
}

impl FromStr for DiskIoMode {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "bps" => Ok(DiskIoMode::Bps),
            "ops" => Ok(DiskIoMode::Ops),
            _ => Err(CheckError::InvalidParameter("fourth")),
        }
    }
}

/// Guest file system figure to report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FsSizeMode {
    #[default]
    Total,
    Free,
    Used,
    PFree,
    PUsed,
}

impl FromStr for FsSizeMode {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "total" => Ok(FsSizeMode::Total),
            "free" => Ok(FsSizeMode::Free),
            "used" => Ok(FsSizeMode::Used),
            "pfree" => Ok(FsSizeMode::PFree),
            "pused" => Ok(FsSizeMode::PUsed),
            _ => Err(CheckError::InvalidParameter("fourth")),
        }
    }
}

/// VM tools fact to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolsMode {
    Version,
    Status,
}

impl FromStr for ToolsMode {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err(CheckError::InvalidParameter("third")),
            "version" => Ok(ToolsMode::Version),
            "status" => Ok(ToolsMode::Status),
            _ => Err(CheckError::InvalidParameterValue("third")),
        }
    }
}

/// Leading decimal digits of `value`, or 0 when there are none.
fn leading_u64(value: &str) -> u64 {
    let trimmed = value.trim_start();
    let end = trimmed.find(|c: char| !c.is_ascii_digit()).unwrap_or(trimmed.len());
    trimmed[..end].parse().unwrap_or(0)
}

fn prop_str(vm: &VirtualMachine, prop: VmProperty) -> CheckResult {
    let value = vm.prop(prop).ok_or(CheckError::ValueUnavailable)?;
    Ok(Some(MetricValue::Str(value.to_string())))
}

fn prop_scaled(vm: &VirtualMachine, prop: VmProperty, factor: u64) -> CheckResult {
    let value = vm.prop(prop).ok_or(CheckError::ValueUnavailable)?;
    Ok(Some(MetricValue::Uint(parse_u64(value)?.saturating_mul(factor))))
}

/// Generates checks that report a VM property verbatim.
macro_rules! vm_prop_checks {
    ($($name:ident => $prop:ident;)*) => {
        impl MetricResolver {
            $(
                pub fn $name(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
                    self.vm_check(stringify!($name), endpoint, uuid, |_, vm, _| {
                        prop_str(vm, VmProperty::$prop)
                    })
                }
            )*
        }
    };
}

vm_prop_checks! {
    vm_cpu_num => CpuNum;
    vm_consolidation_needed => ConsolidationNeeded;
    vm_snapshot => Snapshot;
    vm_state => State;
    vm_storage_committed => StorageCommitted;
    vm_storage_unshared => StorageUnshared;
    vm_storage_uncommitted => StorageUncommitted;
    vm_uptime => Uptime;
}

/// Generates memory checks whose property is reported in MiB.
macro_rules! vm_memory_checks {
    ($($name:ident => $prop:ident;)*) => {
        impl MetricResolver {
            $(
                /// Value in bytes.
                pub fn $name(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
                    self.vm_check(stringify!($name), endpoint, uuid, |_, vm, _| {
                        prop_scaled(vm, VmProperty::$prop, MEBIBYTE)
                    })
                }
            )*
        }
    };
}

vm_memory_checks! {
    vm_memory_size => MemorySize;
    vm_memory_size_ballooned => MemorySizeBallooned;
    vm_memory_size_compressed => MemorySizeCompressed;
    vm_memory_size_swapped => MemorySizeSwapped;
    vm_memory_size_usage_guest => MemorySizeUsageGuest;
    vm_memory_size_usage_host => MemorySizeUsageHost;
    vm_memory_size_private => MemorySizePrivate;
    vm_memory_size_shared => MemorySizeShared;
}

/// Generates checks backed by one VM counter on a fixed instance.
macro_rules! vm_counter_checks {
    ($($name:ident => $path:literal, $scaling:expr;)*) => {
        impl MetricResolver {
            $(
                pub fn $name(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
                    self.vm_check(stringify!($name), endpoint, uuid, |s, vm, _| {
                        s.read_counter(EntityKind::VirtualMachine, &vm.id, $path, "", $scaling)
                    })
                }
            )*
        }
    };
}

vm_counter_checks! {
    vm_cpu_ready => "cpu/ready[summation]", Scaling::Coefficient(1);
    vm_cpu_usage_perf => "cpu/usage[average]", Scaling::ByUnit;
    vm_cpu_latency => "cpu/latency[average]", Scaling::ByUnit;
    vm_memory_usage => "mem/usage[average]", Scaling::ByUnit;
    vm_memory_size_consumed => "mem/consumed[average]", Scaling::Coefficient(KIBIBYTE);
    vm_guest_memory_size_swapped => "mem/swapped[average]", Scaling::Coefficient(KIBIBYTE);
    vm_guest_uptime => "sys/osUptime[latest]", Scaling::Coefficient(1);
}

/// Generates virtual disk checks that require a device instance.
macro_rules! vm_disk_counter_checks {
    ($($name:ident => $path:literal;)*) => {
        impl MetricResolver {
            $(
                pub fn $name(&self, endpoint: &Endpoint, uuid: &str, instance: &str) -> CheckResult {
                    let instance = require(instance, "third")?;
                    self.vm_check(stringify!($name), endpoint, uuid, |s, vm, _| {
                        s.read_counter(
                            EntityKind::VirtualMachine,
                            &vm.id,
                            $path,
                            instance,
                            Scaling::Coefficient(1),
                        )
                    })
                }
            )*
        }
    };
}

vm_disk_counter_checks! {
    vm_storage_readoio => "virtualDisk/readOIO[latest]";
    vm_storage_writeoio => "virtualDisk/writeOIO[latest]";
    vm_storage_totalreadlatency => "virtualDisk/totalReadLatency[average]";
    vm_storage_totalwritelatency => "virtualDisk/totalWriteLatency[average]";
}

impl MetricResolver {
    /// Resolve a VM and its host by uuid and run `f` against them.
    pub(crate) fn vm_check(
        &self,
        check: &'static str,
        endpoint: &Endpoint,
        uuid: &str,
        f: impl FnOnce(&mut Session<'_>, &VirtualMachine, &Host) -> CheckResult,
    ) -> CheckResult {
        let uuid = require(uuid, "second")?;
        self.run(check, endpoint, |s| {
            let (vm, host) = s.vm(uuid)?;
            f(s, vm, host)
        })
    }

    fn vm_counter(
        &self,
        check: &'static str,
        endpoint: &Endpoint,
        uuid: &str,
        path: &'static str,
        instance: &str,
        scaling: Scaling,
    ) -> CheckResult {
        self.vm_check(check, endpoint, uuid, |s, vm, _| {
            s.read_counter(EntityKind::VirtualMachine, &vm.id, path, instance, scaling)
        })
    }

    #[instrument(skip(self, endpoint), fields(url = %endpoint.url))]
    pub fn vm_discovery(&self, endpoint: &Endpoint) -> CheckResult {
        self.run("vm_discovery", endpoint, |s| {
            let snapshot = s.snapshot;
            let mut hosts: Vec<&Host> = snapshot.hosts().collect();
            hosts.sort_by(|a, b| a.uuid.cmp(&b.uuid));

            let mut rows = Vec::new();
            for host in hosts {
                let (Some(hv_name), Some(hv_uuid)) = (host.name(), host.prop(HostProperty::HwUuid))
                else {
                    continue;
                };

                for vm in &host.vms {
                    let Some(name) = vm.name() else {
                        continue;
                    };
                    let datastore_id = vm.prop(VmProperty::DatastoreId).unwrap_or("");
                    let Some(datastore) = snapshot.datastore_by_id(datastore_id) else {
                        warn!(vm_uuid = %vm.uuid, datastore_id, "Unknown datastore of virtual machine, skipping");
                        continue;
                    };
                    let pool_id = vm.prop(VmProperty::ResourcePool).unwrap_or("");
                    let pool_path = snapshot
                        .resource_pool_by_id(pool_id)
                        .map(|p| p.path.as_str())
                        .unwrap_or("");

                    rows.push(VmRow {
                        uuid: &vm.uuid,
                        id: &vm.id,
                        name,
                        hv_name,
                        hv_uuid,
                        hv_id: &host.id,
                        datacenter: &host.datacenter_name,
                        cluster: s.cluster_name(host),
                        ip: vm.prop(VmProperty::IpAddress).unwrap_or(""),
                        dns: vm.prop(VmProperty::GuestHostName).unwrap_or(""),
                        guest_family: vm.prop(VmProperty::GuestFamily).unwrap_or(""),
                        guest_full_name: vm.prop(VmProperty::GuestFullName).unwrap_or(""),
                        folder: vm.prop(VmProperty::Folder).unwrap_or(""),
                        snapshot_count: vm.snapshot_count,
                        tools_status: vm.prop(VmProperty::ToolsRunningStatus).unwrap_or(""),
                        power_state: vm.prop(VmProperty::PowerState).unwrap_or(""),
                        datastore: &datastore.name,
                        datastore_uuid: datastore.uuid.as_deref().unwrap_or(""),
                        resource_pool_id: pool_id,
                        resource_pool_path: pool_path,
                        custom_attributes: vm
                            .custom_attributes
                            .iter()
                            .map(VmAttributeRow::from)
                            .collect(),
                    });
                }
            }
            discovery::to_json(&rows)
        })
    }

    pub fn vm_attribute(&self, endpoint: &Endpoint, uuid: &str, name: &str) -> CheckResult {
        let name = require(name, "third")?;
        self.vm_check("vm_attribute", endpoint, uuid, |_, vm, _| {
            let attribute = vm.custom_attribute(name).ok_or(CheckError::CustomAttributeUnavailable)?;
            Ok(Some(MetricValue::Str(attribute.value.clone())))
        })
    }

    pub fn vm_cluster_name(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.vm_check("vm_cluster_name", endpoint, uuid, |s, _, host| {
            Ok(Some(MetricValue::Str(s.cluster_name(host).to_string())))
        })
    }

    pub fn vm_datacenter_name(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.vm_check("vm_datacenter_name", endpoint, uuid, |_, _, host| {
            Ok(Some(MetricValue::Str(host.datacenter_name.clone())))
        })
    }

    pub fn vm_hv_name(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.vm_check("vm_hv_name", endpoint, uuid, |_, _, host| {
            let name = host.name().ok_or(CheckError::HypervisorNameUnavailable)?;
            Ok(Some(MetricValue::Str(name.to_string())))
        })
    }

    /// CPU usage in Hz.
    pub fn vm_cpu_usage(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.vm_check("vm_cpu_usage", endpoint, uuid, |_, vm, _| {
            prop_scaled(vm, VmProperty::CpuUsage, 1_000_000)
        })
    }

    pub fn vm_cpu_readiness(&self, endpoint: &Endpoint, uuid: &str, instance: Option<&str>) -> CheckResult {
        let instance = optional(instance).unwrap_or("");
        self.vm_counter("vm_cpu_readiness", endpoint, uuid, "cpu/readiness[average]", instance, Scaling::ByUnit)
    }

    pub fn vm_cpu_swapwait(&self, endpoint: &Endpoint, uuid: &str, instance: Option<&str>) -> CheckResult {
        let instance = optional(instance).unwrap_or("");
        self.vm_counter("vm_cpu_swapwait", endpoint, uuid, "cpu/swapwait[summation]", instance, Scaling::ByUnit)
    }

    /// Network usage of one interface, or of all when no instance is given.
    pub fn vm_net_if_usage(&self, endpoint: &Endpoint, uuid: &str, instance: Option<&str>) -> CheckResult {
        let instance = optional(instance).unwrap_or("");
        self.vm_counter(
            "vm_net_if_usage",
            endpoint,
            uuid,
            "net/usage[average]",
            instance,
            Scaling::Coefficient(KIBIBYTE),
        )
    }

    pub fn vm_net_if_in(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        instance: &str,
        mode: Option<&str>,
    ) -> CheckResult {
        let instance = require(instance, "third")?;
        let (path, scaling) = match mode.unwrap_or_default().parse::<NetIfMode>()? {
            NetIfMode::Bps => ("net/received[average]", Scaling::Coefficient(KIBIBYTE)),
            NetIfMode::Pps => ("net/packetsRx[summation]", Scaling::Coefficient(1)),
        };
        self.vm_counter("vm_net_if_in", endpoint, uuid, path, instance, scaling)
    }

    pub fn vm_net_if_out(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        instance: &str,
        mode: Option<&str>,
    ) -> CheckResult {
        let instance = require(instance, "third")?;
        let (path, scaling) = match mode.unwrap_or_default().parse::<NetIfMode>()? {
            NetIfMode::Bps => ("net/transmitted[average]", Scaling::Coefficient(KIBIBYTE)),
            NetIfMode::Pps => ("net/packetsTx[summation]", Scaling::Coefficient(1)),
        };
        self.vm_counter("vm_net_if_out", endpoint, uuid, path, instance, scaling)
    }

    pub fn vm_vfs_dev_read(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        instance: &str,
        mode: Option<&str>,
    ) -> CheckResult {
        let instance = require(instance, "third")?;
        let (path, scaling) = match mode.unwrap_or_default().parse::<DiskIoMode>()? {
            DiskIoMode::Bps => ("virtualDisk/read[average]", Scaling::Coefficient(KIBIBYTE)),
            DiskIoMode::Ops => ("virtualDisk/numberReadAveraged[average]", Scaling::Coefficient(1)),
        };
        self.vm_counter("vm_vfs_dev_read", endpoint, uuid, path, instance, scaling)
    }

    pub fn vm_vfs_dev_write(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        instance: &str,
        mode: Option<&str>,
    ) -> CheckResult {
        let instance = require(instance, "third")?;
        let (path, scaling) = match mode.unwrap_or_default().parse::<DiskIoMode>()? {
            DiskIoMode::Bps => ("virtualDisk/write[average]", Scaling::Coefficient(KIBIBYTE)),
            DiskIoMode::Ops => ("virtualDisk/numberWriteAveraged[average]", Scaling::Coefficient(1)),
        };
        self.vm_counter("vm_vfs_dev_write", endpoint, uuid, path, instance, scaling)
    }

    /// Power state: 0 powered off, 1 powered on, 2 suspended.
    pub fn vm_powerstate(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.vm_check("vm_powerstate", endpoint, uuid, |_, vm, _| {
            let state = vm.prop(VmProperty::PowerState).ok_or(CheckError::ValueUnavailable)?;
            let code = match state {
                "poweredOff" => 0,
                "poweredOn" => 1,
                "suspended" => 2,
                other => return Err(CheckError::UnexpectedStatus(other.to_string())),
            };
            Ok(Some(MetricValue::Uint(code)))
        })
    }

    pub fn vm_tools(&self, endpoint: &Endpoint, uuid: &str, mode: Option<&str>) -> CheckResult {
        let mode: ToolsMode = mode.unwrap_or_default().parse()?;
        self.vm_check("vm_tools", endpoint, uuid, |_, vm, _| match mode {
            ToolsMode::Version => {
                let value = vm.prop(VmProperty::ToolsVersion).ok_or(CheckError::ValueUnavailable)?;
                Ok(Some(MetricValue::Uint(leading_u64(value))))
            }
            ToolsMode::Status => prop_str(vm, VmProperty::ToolsRunningStatus),
        })
    }

    pub fn vm_net_if_discovery(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.vm_check("vm_net_if_discovery", endpoint, uuid, |_, vm, _| {
            let rows: Vec<VmNicRow<'_>> = vm
                .devices_of(DeviceKind::Nic)
                .map(|dev| VmNicRow {
                    name: dev.instance.as_deref().unwrap_or(""),
                    description: dev.label.as_deref().unwrap_or(""),
                    mac: dev.nic.mac.as_deref().unwrap_or(""),
                    connected: dev.nic.connected.as_deref().unwrap_or("").into(),
                    kind: dev.nic.kind.as_deref().unwrap_or(""),
                    backing_device: dev.nic.backing_device.as_deref().unwrap_or(""),
                    dvswitch_uuid: dev.nic.dvswitch_uuid.as_deref().unwrap_or(""),
                    dvswitch_portgroup: dev.nic.dvswitch_portgroup.as_deref().unwrap_or(""),
                    dvswitch_port: dev.nic.dvswitch_port.as_deref().unwrap_or(""),
                })
                .collect();
            discovery::to_json(&rows)
        })
    }

    pub fn vm_vfs_dev_discovery(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.vm_check("vm_vfs_dev_discovery", endpoint, uuid, |_, vm, _| {
            let rows: Vec<VmDiskRow<'_>> = vm
                .devices_of(DeviceKind::Disk)
                .map(|dev| VmDiskRow {
                    name: dev.instance.as_deref().unwrap_or(""),
                    description: dev.label.as_deref().unwrap_or(""),
                })
                .collect();
            discovery::to_json(&rows)
        })
    }

    pub fn vm_vfs_fs_discovery(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.vm_check("vm_vfs_fs_discovery", endpoint, uuid, |_, vm, _| {
            let rows: Vec<VmFsRow<'_>> =
                vm.file_systems.iter().map(|fs| VmFsRow { name: &fs.path }).collect();
            discovery::to_json(&rows)
        })
    }

    /// Size of a guest file system in bytes, or its free/used share in percent.
    ///
    /// A file system with zero capacity reads as 0% free and 100% used.
    pub fn vm_vfs_fs_size(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        fsname: &str,
        mode: Option<&str>,
    ) -> CheckResult {
        let fsname = require(fsname, "third")?;
        let mode: FsSizeMode = mode.unwrap_or_default().parse()?;
        self.vm_check("vm_vfs_fs_size", endpoint, uuid, |_, vm, _| {
            let fs = vm
                .file_systems
                .iter()
                .find(|fs| fs.path == fsname)
                .ok_or(CheckError::UnknownFileSystem)?;

            let percent_free = |capacity: u64, free: u64| {
                if capacity == 0 {
                    0.0
                } else {
                    free as f64 / capacity as f64 * 100.0
                }
            };
            let value = match mode {
                FsSizeMode::Total => MetricValue::Uint(fs.capacity),
                FsSizeMode::Free => MetricValue::Uint(fs.free_space),
                FsSizeMode::Used => MetricValue::Uint(fs.capacity.saturating_sub(fs.free_space)),
                FsSizeMode::PFree => MetricValue::Float(percent_free(fs.capacity, fs.free_space)),
                FsSizeMode::PUsed => {
                    MetricValue::Float(100.0 - percent_free(fs.capacity, fs.free_space))
                }
            };
            Ok(Some(value))
        })
    }

    /// Raw value of any VM counter, registered on first request.
    pub fn vm_perfcounter(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        path: &str,
        instance: Option<&str>,
    ) -> CheckResult {
        let path = require(path, "third")?;
        self.vm_check("vm_perfcounter", endpoint, uuid, |s, vm, _| {
            let info = s.counter(path)?;
            s.perf_counter(EntityKind::VirtualMachine, &vm.id, info, optional(instance).unwrap_or(""))
        })
    }
}
