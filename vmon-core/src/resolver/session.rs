//! Per-request view of one endpoint entry.

use crate::counters::{CounterInfo, CounterRegistry, Registration, Scaling};
use crate::error::CheckError;
use crate::queries::CustomQueryRegistry;
use crate::store::{EndpointEntry, EndpointState, EventlogCursor};
use crate::types::{
    CheckResult, Datastore, EntityKind, Host, MetricValue, Snapshot, VirtualMachine,
};

/// Borrowed state of a ready endpoint for the duration of one check.
///
/// The snapshot is shared while the counter, query and event tables are
/// borrowed mutably, so entity references stay valid across registrations.
pub(crate) struct Session<'a> {
    pub snapshot: &'a Snapshot,
    pub counters: &'a mut CounterRegistry,
    pub queries: &'a mut CustomQueryRegistry,
    pub eventlog: &'a mut EventlogCursor,
    instance_glob: &'a str,
}

impl<'a> Session<'a> {
    /// `Ok(None)` while the collector has not produced a snapshot yet.
    pub fn open(
        entry: &'a mut EndpointEntry,
        instance_glob: &'a str,
    ) -> Result<Option<Self>, CheckError> {
        let EndpointEntry { state, snapshot, counters, queries, eventlog, .. } = entry;
        match state {
            EndpointState::Failed(message) => Err(CheckError::upstream(message.as_deref())),
            EndpointState::Pending => Ok(None),
            EndpointState::Ready => Ok(snapshot.as_deref().map(|snapshot| Session {
                snapshot,
                counters,
                queries,
                eventlog,
                instance_glob,
            })),
        }
    }

    pub fn host(&self, uuid: &str) -> Result<&'a Host, CheckError> {
        let snapshot: &'a Snapshot = self.snapshot;
        snapshot.host_by_uuid(uuid).ok_or(CheckError::UnknownHypervisor)
    }

    pub fn vm(&self, uuid: &str) -> Result<(&'a VirtualMachine, &'a Host), CheckError> {
        let snapshot: &'a Snapshot = self.snapshot;
        snapshot.vm_by_uuid(uuid).ok_or(CheckError::UnknownVm)
    }

    pub fn datastore(&self, name: &str) -> Result<&'a Datastore, CheckError> {
        let snapshot: &'a Snapshot = self.snapshot;
        snapshot.datastore_by_name(name).ok_or(CheckError::UnknownDatastore)
    }

    /// Name of the cluster a host belongs to, empty when it has none.
    pub fn cluster_name(&self, host: &Host) -> &'a str {
        let snapshot: &'a Snapshot = self.snapshot;
        snapshot.cluster_of(host).map(|c| c.name.as_str()).unwrap_or("")
    }

    pub fn counter(&self, path: &str) -> Result<CounterInfo, CheckError> {
        self.snapshot.catalog().resolve(path)
    }

    /// Read a standard counter by path, registering interest in it.
    pub fn read_counter(
        &mut self,
        kind: EntityKind,
        id: &str,
        path: &str,
        instance: &str,
        scaling: Scaling,
    ) -> CheckResult {
        let info = self.counter(path)?;
        self.read_registered(kind, id, info, instance, scaling)
    }

    pub fn read_registered(
        &mut self,
        kind: EntityKind,
        id: &str,
        info: CounterInfo,
        instance: &str,
        scaling: Scaling,
    ) -> CheckResult {
        self.counters.ensure_registered(kind, id, info.id, self.instance_glob);
        self.counters.read_value(kind, id, info.id, instance, scaling, info.unit)
    }

    /// Read a counter requested by path from the caller.
    ///
    /// The first request only registers it; later ones read the raw value.
    pub fn perf_counter(
        &mut self,
        kind: EntityKind,
        id: &str,
        info: CounterInfo,
        instance: &str,
    ) -> CheckResult {
        match self.counters.ensure_registered(kind, id, info.id, self.instance_glob) {
            Registration::NewlyRegistered => Ok(None),
            Registration::AlreadyRegistered => self.counters.read_value(
                kind,
                id,
                info.id,
                instance,
                Scaling::Coefficient(1),
                info.unit,
            ),
        }
    }
}

/// Unsigned value of a counter read, which is always integral for coefficient scaling.
pub(crate) fn counter_u64(value: Option<MetricValue>) -> Option<u64> {
    value.as_ref().and_then(MetricValue::as_u64)
}
