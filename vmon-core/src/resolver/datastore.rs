//! Datastore checks, both datastore-wide and through one hypervisor.
//!
//! Datastore-wide latency and request rates are aggregated over every host
//! with sufficient access rights. Hosts without access are skipped; the first
//! host whose counter cannot be read aborts the aggregation with an error
//! naming that host.

use super::discovery::{self, DatastoreRow};
use super::session::{counter_u64, Session};
use super::{require, Endpoint, MetricResolver};
use crate::counters::{Scaling, KIBIBYTE};
use crate::error::CheckError;
use crate::index::AccessCheck;
use crate::types::{
    AccessFlags, CheckResult, Datastore, EntityKind, MetricValue, PlatformKind,
};
use std::str::FromStr;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoDirection {
    Read,
    Write,
}

impl IoDirection {
    fn filter(self) -> AccessFlags {
        match self {
            IoDirection::Read => AccessFlags::READ_FILTER,
            IoDirection::Write => AccessFlags::WRITE_FILTER,
        }
    }
}

/// Datastore-wide I/O figure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DatastoreMetric {
    /// Mean latency over all hosts.
    #[default]
    Latency,
    /// Highest latency of any host.
    MaxLatency,
    /// Mean requests per second over all hosts.
    Rps,
}

impl FromStr for DatastoreMetric {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "latency" => Ok(DatastoreMetric::Latency),
            "maxlatency" => Ok(DatastoreMetric::MaxLatency),
            "rps" => Ok(DatastoreMetric::Rps),
            _ => Err(CheckError::InvalidParameter("third")),
        }
    }
}

impl DatastoreMetric {
    fn counter(self, direction: IoDirection) -> &'static str {
        match (self, direction) {
            (DatastoreMetric::Latency | DatastoreMetric::MaxLatency, IoDirection::Read) => {
                "datastore/totalReadLatency[average]"
            }
            (DatastoreMetric::Latency | DatastoreMetric::MaxLatency, IoDirection::Write) => {
                "datastore/totalWriteLatency[average]"
            }
            (DatastoreMetric::Rps, IoDirection::Read) => "datastore/numberReadAveraged[average]",
            (DatastoreMetric::Rps, IoDirection::Write) => "datastore/numberWriteAveraged[average]",
        }
    }
}

/// I/O figure of a datastore as seen by one hypervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HvDatastoreMetric {
    #[default]
    Latency,
    Rps,
}

impl FromStr for HvDatastoreMetric {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "latency" => Ok(HvDatastoreMetric::Latency),
            "rps" => Ok(HvDatastoreMetric::Rps),
            _ => Err(CheckError::InvalidParameter("fourth")),
        }
    }
}

impl HvDatastoreMetric {
    fn counter(self, direction: IoDirection) -> &'static str {
        let metric = match self {
            HvDatastoreMetric::Latency => DatastoreMetric::Latency,
            HvDatastoreMetric::Rps => DatastoreMetric::Rps,
        };
        metric.counter(direction)
    }
}

/// Datastore size figure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SizeMode {
    /// Capacity in bytes.
    #[default]
    Total,
    /// Free space in bytes.
    Free,
    /// Free space in percent of capacity.
    PFree,
    /// Provisioned but not yet written space in bytes.
    Uncommitted,
}

impl SizeMode {
    /// Parse a size mode given as the request parameter at `position`.
    pub fn parse_at(s: &str, position: &'static str) -> Result<Self, CheckError> {
        match s {
            "" | "total" => Ok(SizeMode::Total),
            "free" => Ok(SizeMode::Free),
            "pfree" => Ok(SizeMode::PFree),
            "uncommitted" => Ok(SizeMode::Uncommitted),
            _ => Err(CheckError::InvalidParameter(position)),
        }
    }
}

impl FromStr for SizeMode {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeMode::parse_at(s, "third")
    }
}

const CAPACITY: &str = "disk/capacity[latest]";
const PROVISIONED: &str = "disk/provisioned[latest]";
const USED: &str = "disk/used[latest]";

impl MetricResolver {
    pub fn datastore_discovery(&self, endpoint: &Endpoint) -> CheckResult {
        self.run("datastore_discovery", endpoint, |s| {
            let rows: Vec<DatastoreRow<'_>> =
                s.snapshot.datastores().iter().map(DatastoreRow::from).collect();
            discovery::to_json(&rows)
        })
    }

    pub fn datastore_read(&self, endpoint: &Endpoint, name: &str, mode: Option<&str>) -> CheckResult {
        self.datastore_io("datastore_read", endpoint, name, mode, IoDirection::Read)
    }

    pub fn datastore_write(&self, endpoint: &Endpoint, name: &str, mode: Option<&str>) -> CheckResult {
        self.datastore_io("datastore_write", endpoint, name, mode, IoDirection::Write)
    }

    #[instrument(skip(self, endpoint, mode), fields(url = %endpoint.url))]
    fn datastore_io(
        &self,
        check: &'static str,
        endpoint: &Endpoint,
        name: &str,
        mode: Option<&str>,
        direction: IoDirection,
    ) -> CheckResult {
        let name = require(name, "second")?;
        let metric: DatastoreMetric = mode.unwrap_or_default().parse()?;
        self.run(check, endpoint, |s| aggregate_hosts(s, name, metric, direction))
    }

    /// Size of a datastore.
    ///
    /// Standalone hosts report sizes as datastore properties; vCenter
    /// endpoints report them as datastore counters in KiB.
    pub fn datastore_size(&self, endpoint: &Endpoint, name: &str, mode: Option<&str>) -> CheckResult {
        let name = require(name, "second")?;
        let mode = SizeMode::parse_at(mode.unwrap_or_default(), "third")?;
        self.run("datastore_size", endpoint, |s| {
            let datastore = s.datastore(name)?;
            size_of(s, datastore, mode)
        })
    }

    /// Names of the hosts attached to a datastore, one per line.
    ///
    /// A host without a name is listed by uuid.
    pub fn datastore_hv_list(&self, endpoint: &Endpoint, name: &str) -> CheckResult {
        let name = require(name, "second")?;
        self.run("datastore_hv_list", endpoint, |s| {
            let datastore = s.datastore(name)?;
            let mut names = Vec::with_capacity(datastore.host_access.len());
            for access in &datastore.host_access {
                let host = s.host(&access.host_uuid)?;
                names.push(host.name().unwrap_or(&host.uuid));
            }
            Ok(Some(MetricValue::Text(names.join("\n"))))
        })
    }

    pub fn hv_datastore_read(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        datastore: &str,
        mode: Option<&str>,
    ) -> CheckResult {
        self.hv_datastore_io("hv_datastore_read", endpoint, uuid, datastore, mode, IoDirection::Read)
    }

    pub fn hv_datastore_write(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        datastore: &str,
        mode: Option<&str>,
    ) -> CheckResult {
        self.hv_datastore_io("hv_datastore_write", endpoint, uuid, datastore, mode, IoDirection::Write)
    }

    fn hv_datastore_io(
        &self,
        check: &'static str,
        endpoint: &Endpoint,
        uuid: &str,
        datastore: &str,
        mode: Option<&str>,
        direction: IoDirection,
    ) -> CheckResult {
        let datastore = require(datastore, "third")?;
        let metric: HvDatastoreMetric = mode.unwrap_or_default().parse()?;
        let path = metric.counter(direction);

        self.host_check(check, endpoint, uuid, |s, host| {
            let ds = s.datastore(datastore)?;
            if host.datastore_mount_by_name(datastore).is_none() {
                return Err(CheckError::DatastoreNotOnHost { datastore: datastore.to_string() });
            }
            let ds_uuid = ds.uuid.as_deref().ok_or(CheckError::DatastoreWithoutUuid)?;

            match ds.check_access(&host.uuid, direction.filter()) {
                Ok(()) => {}
                Err(AccessCheck::HostAbsent) => {
                    return Err(CheckError::HostNotOnDatastore {
                        host: host.name().unwrap_or("").to_string(),
                        datastore: ds.name.clone(),
                    });
                }
                Err(AccessCheck::Denied(denial)) => {
                    return Err(CheckError::DatastoreAccessDenied(denial));
                }
            }

            s.read_counter(EntityKind::HostSystem, &host.id, path, ds_uuid, Scaling::Coefficient(1))
        })
    }

    pub fn hv_datastore_size(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        datastore: &str,
        mode: Option<&str>,
    ) -> CheckResult {
        let mode = SizeMode::parse_at(mode.unwrap_or_default(), "fourth")?;
        // Membership is checked against the datastore's access list alone; the
        // host itself need not be resolvable.
        self.run("hv_datastore_size", endpoint, |s| {
            let ds = s.datastore(datastore)?;
            if ds.access_for(uuid).is_none() {
                return Err(CheckError::HypervisorNotOnDatastore { uuid: uuid.to_string() });
            }
            size_of(s, ds, mode)
        })
    }
}

fn lowercase_first(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Mean or maximum of one host counter over the hosts of a datastore.
///
/// Hosts that have no sample yet count as attached but do not contribute a
/// value; when none contributes the result is empty.
fn aggregate_hosts(
    session: &mut Session<'_>,
    name: &str,
    metric: DatastoreMetric,
    direction: IoDirection,
) -> CheckResult {
    let datastore = session.datastore(name)?;
    let ds_uuid = datastore.uuid.as_deref().ok_or(CheckError::DatastoreWithoutUuid)?;
    let path = metric.counter(direction);
    let info = session.counter(path)?;

    let mut attached = 0usize;
    let mut sampled = 0u64;
    let mut sum = 0u64;
    let mut max: Option<u64> = None;

    for access in &datastore.host_access {
        if let Err(denial) = access.flags.check(direction.filter()) {
            debug!(
                datastore = %datastore.name,
                host_uuid = %access.host_uuid,
                reason = %denial,
                "Skipping host without datastore access"
            );
            continue;
        }

        let host = session.host(&access.host_uuid)?;
        let value = session
            .read_registered(EntityKind::HostSystem, &host.id, info, ds_uuid, Scaling::Coefficient(1))
            .map_err(|e| CheckError::AggregateCounterFailed {
                counter: path.to_string(),
                datastore: datastore.name.clone(),
                host: host.name().unwrap_or("").to_string(),
                reason: lowercase_first(&e.to_string()),
            })?;
        attached += 1;

        let Some(value) = counter_u64(value) else {
            continue;
        };
        sampled += 1;
        sum = sum.saturating_add(value);
        max = Some(max.map_or(value, |m| m.max(value)));
    }

    if attached == 0 {
        return Err(CheckError::NoDatastores);
    }

    let result = match metric {
        DatastoreMetric::MaxLatency => max,
        DatastoreMetric::Latency | DatastoreMetric::Rps => (sampled > 0).then(|| sum / sampled),
    };
    Ok(result.map(MetricValue::Uint))
}

fn size_of(session: &mut Session<'_>, datastore: &Datastore, mode: SizeMode) -> CheckResult {
    match session.snapshot.platform() {
        PlatformKind::VSphere => size_from_properties(datastore, mode),
        PlatformKind::VCenter => size_from_counters(session, datastore, mode),
    }
}

fn percent(part: u64, whole: u64) -> Result<f64, CheckError> {
    if whole == 0 {
        return Err(CheckError::CapacityZero);
    }
    Ok(part as f64 / whole as f64 * 100.0)
}

fn size_from_properties(datastore: &Datastore, mode: SizeMode) -> CheckResult {
    let field = |value: Option<u64>, name: &'static str| {
        value.ok_or(CheckError::DatastoreFieldUnavailable(name))
    };

    let value = match mode {
        SizeMode::Total => MetricValue::Uint(field(datastore.capacity, "capacity")?),
        SizeMode::Free => MetricValue::Uint(field(datastore.free_space, "free space")?),
        SizeMode::Uncommitted => MetricValue::Uint(field(datastore.uncommitted, "uncommitted")?),
        SizeMode::PFree => {
            let capacity = field(datastore.capacity, "capacity")?;
            let free = field(datastore.free_space, "free space")?;
            MetricValue::Float(percent(free, capacity)?)
        }
    };
    Ok(Some(value))
}

fn read_kib(session: &mut Session<'_>, datastore: &Datastore, path: &str) -> Result<Option<u64>, CheckError> {
    session
        .read_counter(EntityKind::Datastore, &datastore.id, path, "", Scaling::Coefficient(KIBIBYTE))
        .map(counter_u64)
}

/// Every counter the mode needs is registered before any of them is checked,
/// so a fresh request gets all of them collected in the same cycle.
fn size_from_counters(session: &mut Session<'_>, datastore: &Datastore, mode: SizeMode) -> CheckResult {
    let provisioned = match mode {
        SizeMode::Uncommitted => read_kib(session, datastore, PROVISIONED),
        _ => Ok(Some(0)),
    };
    let used = match mode {
        SizeMode::Total => Ok(Some(0)),
        _ => read_kib(session, datastore, USED),
    };
    let capacity = match mode {
        SizeMode::Uncommitted => Ok(Some(0)),
        _ => read_kib(session, datastore, CAPACITY),
    };

    let (Some(provisioned), Some(used), Some(capacity)) = (provisioned?, used?, capacity?) else {
        return Ok(None);
    };

    let value = match mode {
        SizeMode::Total => MetricValue::Uint(capacity),
        SizeMode::Free => MetricValue::Uint(capacity.saturating_sub(used)),
        SizeMode::Uncommitted => MetricValue::Uint(provisioned.saturating_sub(used)),
        SizeMode::PFree => MetricValue::Float(percent(capacity.saturating_sub(used), capacity)?),
    };
    Ok(Some(value))
}
