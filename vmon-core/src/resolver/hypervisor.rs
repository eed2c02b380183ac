//! Hypervisor checks.

use super::discovery::{self, HostDatastoreRow, HostNicRow, HostRow};
use super::session::Session;
use super::{optional, parse_u64, require, Endpoint, MetricResolver};
use crate::counters::{Scaling, KIBIBYTE, MEBIBYTE};
use crate::error::CheckError;
use crate::types::{
    health_color_code, CheckResult, EntityKind, Host, HostProperty, MetricValue, VmProperty,
};
use std::str::FromStr;
use tracing::instrument;

/// Traffic counters a host network check can report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetworkMode {
    #[default]
    Bps,
    Packets,
    Dropped,
    Errors,
    Broadcast,
}

impl FromStr for NetworkMode {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "bps" => Ok(NetworkMode::Bps),
            "packets" => Ok(NetworkMode::Packets),
            "dropped" => Ok(NetworkMode::Dropped),
            "errors" => Ok(NetworkMode::Errors),
            "broadcast" => Ok(NetworkMode::Broadcast),
            _ => Err(CheckError::InvalidParameter("third")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    In,
    Out,
}

impl NetworkMode {
    fn counter(self, direction: Direction) -> (&'static str, Scaling) {
        use Direction::{In, Out};
        match (self, direction) {
            (NetworkMode::Bps, In) => ("net/received[average]", Scaling::Coefficient(KIBIBYTE)),
            (NetworkMode::Bps, Out) => ("net/transmitted[average]", Scaling::Coefficient(KIBIBYTE)),
            (NetworkMode::Packets, In) => ("net/packetsRx[summation]", Scaling::ByUnit),
            (NetworkMode::Packets, Out) => ("net/packetsTx[summation]", Scaling::ByUnit),
            (NetworkMode::Dropped, In) => ("net/droppedRx[summation]", Scaling::ByUnit),
            (NetworkMode::Dropped, Out) => ("net/droppedTx[summation]", Scaling::ByUnit),
            (NetworkMode::Errors, In) => ("net/errorsRx[summation]", Scaling::ByUnit),
            (NetworkMode::Errors, Out) => ("net/errorsTx[summation]", Scaling::ByUnit),
            (NetworkMode::Broadcast, In) => ("net/broadcastRx[summation]", Scaling::ByUnit),
            (NetworkMode::Broadcast, Out) => ("net/broadcastTx[summation]", Scaling::ByUnit),
        }
    }
}

/// Host property as a string value.
fn prop_str(host: &Host, prop: HostProperty) -> CheckResult {
    let value = host.prop(prop).ok_or(CheckError::ValueUnavailable)?;
    Ok(Some(MetricValue::Str(value.to_string())))
}

/// Numeric host property multiplied into base units.
fn prop_scaled(host: &Host, prop: HostProperty, factor: u64) -> CheckResult {
    let value = host.prop(prop).ok_or(CheckError::ValueUnavailable)?;
    Ok(Some(MetricValue::Uint(parse_u64(value)?.saturating_mul(factor))))
}

fn prop_health(host: &Host, prop: HostProperty) -> CheckResult {
    let value = host.prop(prop).ok_or(CheckError::ValueUnavailable)?;
    Ok(Some(MetricValue::Uint(health_color_code(value)?)))
}

/// Generates checks that report a host property verbatim.
macro_rules! host_prop_checks {
    ($($(#[$doc:meta])* $name:ident => $prop:ident;)*) => {
        impl MetricResolver {
            $(
                $(#[$doc])*
                pub fn $name(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
                    self.host_check(stringify!($name), endpoint, uuid, |_, host| {
                        prop_str(host, HostProperty::$prop)
                    })
                }
            )*
        }
    };
}

host_prop_checks! {
    hv_connection_state => ConnectionState;
    hv_fullname => FullName;
    hv_hw_cpu_num => HwNumCpuCores;
    hv_hw_cpu_model => HwCpuModel;
    hv_hw_cpu_threads => HwNumCpuThreads;
    /// Physical memory in bytes.
    hv_hw_memory => HwMemorySize;
    hv_hw_model => HwModel;
    hv_hw_serial_number => HwSerialNumber;
    hv_hw_uuid => HwUuid;
    hv_hw_vendor => HwVendor;
    hv_uptime => Uptime;
    hv_version => Version;
    hv_sensors => Sensors;
    hv_hw_sensors => HwSensors;
}

impl MetricResolver {
    /// Resolve a host by uuid and run `f` against it.
    pub(crate) fn host_check(
        &self,
        check: &'static str,
        endpoint: &Endpoint,
        uuid: &str,
        f: impl FnOnce(&mut Session<'_>, &Host) -> CheckResult,
    ) -> CheckResult {
        let uuid = require(uuid, "second")?;
        self.run(check, endpoint, |s| {
            let host = s.host(uuid)?;
            f(s, host)
        })
    }

    #[instrument(skip(self, endpoint), fields(url = %endpoint.url))]
    pub fn hv_discovery(&self, endpoint: &Endpoint) -> CheckResult {
        self.run("hv_discovery", endpoint, |s| {
            let mut hosts: Vec<&Host> = s.snapshot.hosts().collect();
            hosts.sort_by(|a, b| a.uuid.cmp(&b.uuid));

            let rows: Vec<HostRow<'_>> = hosts
                .into_iter()
                .filter_map(|host| {
                    let name = host.name()?;
                    Some(HostRow {
                        uuid: &host.uuid,
                        id: &host.id,
                        name,
                        ip: host.ip.as_deref().unwrap_or(""),
                        datacenter: &host.datacenter_name,
                        cluster: s.cluster_name(host),
                        parent_name: &host.parent_name,
                        parent_type: &host.parent_type,
                        net_name: host.prop(HostProperty::NetName).unwrap_or(""),
                    })
                })
                .collect();
            discovery::to_json(&rows)
        })
    }

    pub fn hv_cluster_name(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_cluster_name", endpoint, uuid, |s, host| {
            Ok(Some(MetricValue::Str(s.cluster_name(host).to_string())))
        })
    }

    /// Aggregated CPU usage in Hz.
    pub fn hv_cpu_usage(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_cpu_usage", endpoint, uuid, |_, host| {
            prop_scaled(host, HostProperty::OverallCpuUsage, 1_000_000)
        })
    }

    pub fn hv_cpu_usage_perf(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_cpu_usage_perf", endpoint, uuid, |s, host| {
            s.read_counter(EntityKind::HostSystem, &host.id, "cpu/usage[average]", "", Scaling::ByUnit)
        })
    }

    pub fn hv_cpu_utilization(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_cpu_utilization", endpoint, uuid, |s, host| {
            s.read_counter(
                EntityKind::HostSystem,
                &host.id,
                "cpu/utilization[average]",
                "",
                Scaling::ByUnit,
            )
        })
    }

    /// Power draw in watts, or the power cap when `mode` is `max`.
    pub fn hv_power(&self, endpoint: &Endpoint, uuid: &str, mode: Option<&str>) -> CheckResult {
        let path = match optional(mode) {
            None => "power/power[average]",
            Some("max") => "power/powerCap[average]",
            Some(_) => return Err(CheckError::InvalidParameter("third")),
        };
        self.host_check("hv_power", endpoint, uuid, |s, host| {
            s.read_counter(EntityKind::HostSystem, &host.id, path, "", Scaling::Coefficient(1))
        })
    }

    /// CPU frequency in Hz.
    pub fn hv_hw_cpu_freq(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_hw_cpu_freq", endpoint, uuid, |_, host| {
            prop_scaled(host, HostProperty::HwCpuMhz, 1_000_000)
        })
    }

    /// Memory used in bytes.
    pub fn hv_memory_used(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_memory_used", endpoint, uuid, |_, host| {
            prop_scaled(host, HostProperty::MemoryUsed, MEBIBYTE)
        })
    }

    /// Memory ballooned by all VMs of the host, in bytes.
    ///
    /// VMs without a numeric value are left out of the sum.
    pub fn hv_memory_size_ballooned(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_memory_size_ballooned", endpoint, uuid, |_, host| {
            let total: u64 = host
                .vms
                .iter()
                .filter_map(|vm| vm.prop(VmProperty::MemorySizeBallooned))
                .filter_map(|value| parse_u64(value).ok())
                .sum();
            Ok(Some(MetricValue::Uint(total.saturating_mul(MEBIBYTE))))
        })
    }

    pub fn hv_sensor_health_state(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_sensor_health_state", endpoint, uuid, |_, host| {
            prop_health(host, HostProperty::HealthState)
        })
    }

    pub fn hv_status(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_status", endpoint, uuid, |_, host| prop_health(host, HostProperty::Status))
    }

    /// 1 while the host is in maintenance mode.
    pub fn hv_maintenance(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_maintenance", endpoint, uuid, |_, host| {
            let value = host.prop(HostProperty::Maintenance).ok_or(CheckError::ValueUnavailable)?;
            Ok(Some(MetricValue::Uint(u64::from(value != "false"))))
        })
    }

    pub fn hv_vm_num(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_vm_num", endpoint, uuid, |_, host| {
            Ok(Some(MetricValue::Uint(host.vms.len() as u64)))
        })
    }

    pub fn hv_network_in(&self, endpoint: &Endpoint, uuid: &str, mode: Option<&str>) -> CheckResult {
        self.hv_network("hv_network_in", endpoint, uuid, mode, Direction::In)
    }

    pub fn hv_network_out(&self, endpoint: &Endpoint, uuid: &str, mode: Option<&str>) -> CheckResult {
        self.hv_network("hv_network_out", endpoint, uuid, mode, Direction::Out)
    }

    fn hv_network(
        &self,
        check: &'static str,
        endpoint: &Endpoint,
        uuid: &str,
        mode: Option<&str>,
        direction: Direction,
    ) -> CheckResult {
        let mode: NetworkMode = mode.unwrap_or_default().parse()?;
        let (path, scaling) = mode.counter(direction);
        self.host_check(check, endpoint, uuid, |s, host| {
            s.read_counter(EntityKind::HostSystem, &host.id, path, "", scaling)
        })
    }

    pub fn hv_net_if_discovery(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_net_if_discovery", endpoint, uuid, |_, host| {
            let rows: Vec<HostNicRow<'_>> = host.nics.iter().map(HostNicRow::from).collect();
            discovery::to_json(&rows)
        })
    }

    /// Link speed of a physical NIC in Mbit/s.
    pub fn hv_network_linkspeed(&self, endpoint: &Endpoint, uuid: &str, ifname: &str) -> CheckResult {
        let ifname = require(ifname, "third")?;
        self.host_check("hv_network_linkspeed", endpoint, uuid, |_, host| {
            let nic = host.nic_by_name(ifname).ok_or(CheckError::UnknownNic)?;
            Ok(Some(MetricValue::Uint(nic.speed)))
        })
    }

    pub fn hv_datacenter_name(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_datacenter_name", endpoint, uuid, |_, host| {
            Ok(Some(MetricValue::Str(host.datacenter_name.clone())))
        })
    }

    pub fn hv_datastore_discovery(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_datastore_discovery", endpoint, uuid, |_, host| {
            let rows: Vec<HostDatastoreRow<'_>> =
                host.datastore_mounts.iter().map(HostDatastoreRow::from).collect();
            discovery::to_json(&rows)
        })
    }

    /// Names of the datastores mounted on the host, one per line.
    pub fn hv_datastore_list(&self, endpoint: &Endpoint, uuid: &str) -> CheckResult {
        self.host_check("hv_datastore_list", endpoint, uuid, |_, host| {
            let names: Vec<&str> = host.datastore_mounts.iter().map(|m| m.name.as_str()).collect();
            Ok(Some(MetricValue::Text(names.join("\n"))))
        })
    }

    /// Active storage paths of the host.
    ///
    /// Without a datastore all mounts are summed. A partition narrows the
    /// count to one path record and requires a datastore.
    pub fn hv_datastore_multipath(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        datastore: Option<&str>,
        partition: Option<&str>,
    ) -> CheckResult {
        let datastore = optional(datastore);
        let partition = match optional(partition) {
            None => None,
            Some(_) if datastore.is_none() => return Err(CheckError::InvalidParameter("fourth")),
            Some(p) => Some(parse_u64(p).map_err(|_| CheckError::InvalidParameter("fourth"))?),
        };

        self.host_check("hv_datastore_multipath", endpoint, uuid, |s, host| {
            let Some(name) = datastore else {
                let total: u64 = host.datastore_mounts.iter().map(|m| m.active_paths()).sum();
                return Ok(Some(MetricValue::Uint(total)));
            };

            let ds = s.datastore(name)?;
            let mount = host
                .datastore_mount_by_name(name)
                .ok_or_else(|| CheckError::DatastoreNotOnHost { datastore: name.to_string() })?;
            if ds.uuid.is_none() {
                return Err(CheckError::DatastoreWithoutUuid);
            }

            let active = match partition {
                Some(id) => {
                    let record = mount.path_by_partition(id).ok_or(CheckError::UnknownPartition(id))?;
                    u64::from(record.multipath_active)
                }
                None => mount.active_paths(),
            };
            Ok(Some(MetricValue::Uint(active)))
        })
    }

    /// Raw value of any host counter, registered on first request.
    pub fn hv_perfcounter(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        path: &str,
        instance: Option<&str>,
    ) -> CheckResult {
        let path = require(path, "third")?;
        self.host_check("hv_perfcounter", endpoint, uuid, |s, host| {
            let info = s.counter(path)?;
            s.perf_counter(EntityKind::HostSystem, &host.id, info, optional(instance).unwrap_or(""))
        })
    }
}
