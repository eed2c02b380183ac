//! Immutable inventory snapshot of one endpoint.

use super::{
    ApiVersion, Cluster, Datacenter, Datastore, DvSwitch, Event, Host, PlatformKind, ResourcePool,
};
use crate::counters::{CounterCatalog, Unit};
use crate::index::SortedVec;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;

/// Where a VM lives inside the host table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VmLocation {
    pub(crate) host_uuid: String,
    pub(crate) position: usize,
}

/// Complete inventory of one endpoint as of one collection cycle.
///
/// Built once through [`SnapshotBuilder`] and never mutated afterwards; the
/// collector publishes a fresh one each cycle.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub(crate) platform: PlatformKind,
    pub(crate) version: ApiVersion,
    pub(crate) product_version: Option<String>,
    pub(crate) full_name: Option<String>,
    pub(crate) catalog: CounterCatalog,
    pub(crate) hosts: HashMap<String, Host>,
    pub(crate) vm_index: HashMap<String, VmLocation>,
    pub(crate) clusters: Vec<Cluster>,
    pub(crate) datastores: SortedVec<Datastore>,
    pub(crate) dv_switches: SortedVec<DvSwitch>,
    pub(crate) datacenters: Vec<Datacenter>,
    pub(crate) resource_pools: SortedVec<ResourcePool>,
    /// Newest first.
    pub(crate) events: Vec<Event>,
    pub(crate) collected_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn builder(platform: PlatformKind) -> SnapshotBuilder {
        SnapshotBuilder::new(platform)
    }

    pub fn platform(&self) -> PlatformKind {
        self.platform
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    pub fn product_version(&self) -> Option<&str> {
        self.product_version.as_deref()
    }

    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    pub fn catalog(&self) -> &CounterCatalog {
        &self.catalog
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn datastores(&self) -> &SortedVec<Datastore> {
        &self.datastores
    }

    pub fn dv_switches(&self) -> &SortedVec<DvSwitch> {
        &self.dv_switches
    }

    pub fn datacenters(&self) -> &[Datacenter] {
        &self.datacenters
    }

    pub fn resource_pools(&self) -> &SortedVec<ResourcePool> {
        &self.resource_pools
    }

    /// Events, newest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn vm_count(&self) -> usize {
        self.vm_index.len()
    }

    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }
}

/// Assembles a [`Snapshot`] and builds its indices.
#[derive(Debug)]
pub struct SnapshotBuilder {
    platform: PlatformKind,
    version: ApiVersion,
    product_version: Option<String>,
    full_name: Option<String>,
    catalog: CounterCatalog,
    hosts: Vec<Host>,
    clusters: Vec<Cluster>,
    datastores: Vec<Datastore>,
    dv_switches: Vec<DvSwitch>,
    datacenters: Vec<Datacenter>,
    resource_pools: Vec<ResourcePool>,
    events: Vec<Event>,
    collected_at: Option<DateTime<Utc>>,
}

impl SnapshotBuilder {
    pub fn new(platform: PlatformKind) -> Self {
        Self {
            platform,
            version: ApiVersion::default(),
            product_version: None,
            full_name: None,
            catalog: CounterCatalog::new(),
            hosts: Vec::new(),
            clusters: Vec::new(),
            datastores: Vec::new(),
            dv_switches: Vec::new(),
            datacenters: Vec::new(),
            resource_pools: Vec::new(),
            events: Vec::new(),
            collected_at: None,
        }
    }

    pub fn version(mut self, major: u32, minor: u32) -> Self {
        self.version = ApiVersion::new(major, minor);
        self
    }

    pub fn product(mut self, version: impl Into<String>, full_name: impl Into<String>) -> Self {
        self.product_version = Some(version.into());
        self.full_name = Some(full_name.into());
        self
    }

    pub fn catalog(mut self, catalog: CounterCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Add one catalog entry.
    pub fn counter(mut self, path: impl Into<String>, id: u64, unit: Unit) -> Self {
        self.catalog.insert(path, id, unit);
        self
    }

    pub fn host(mut self, host: Host) -> Self {
        self.hosts.push(host);
        self
    }

    pub fn cluster(mut self, cluster: Cluster) -> Self {
        self.clusters.push(cluster);
        self
    }

    pub fn datastore(mut self, datastore: Datastore) -> Self {
        self.datastores.push(datastore);
        self
    }

    pub fn dv_switch(mut self, dv_switch: DvSwitch) -> Self {
        self.dv_switches.push(dv_switch);
        self
    }

    pub fn datacenter(mut self, datacenter: Datacenter) -> Self {
        self.datacenters.push(datacenter);
        self
    }

    pub fn resource_pool(mut self, pool: ResourcePool) -> Self {
        self.resource_pools.push(pool);
        self
    }

    pub fn event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn collected_at(mut self, at: DateTime<Utc>) -> Self {
        self.collected_at = Some(at);
        self
    }

    pub fn build(self) -> Snapshot {
        let mut hosts = HashMap::with_capacity(self.hosts.len());
        let mut vm_index = HashMap::new();

        for host in self.hosts {
            for (position, vm) in host.vms.iter().enumerate() {
                let location = VmLocation { host_uuid: host.uuid.clone(), position };
                if let Some(previous) = vm_index.insert(vm.uuid.clone(), location) {
                    warn!(
                        vm_uuid = %vm.uuid,
                        previous_host = %previous.host_uuid,
                        host_uuid = %host.uuid,
                        "VM reported by more than one host, keeping the last"
                    );
                }
            }
            if let Some(previous) = hosts.insert(host.uuid.clone(), host) {
                warn!(host_uuid = %previous.uuid, "Duplicate host uuid, keeping the last");
            }
        }

        // A replaced host leaves stale index entries behind.
        vm_index.retain(|uuid, location| {
            hosts
                .get(&location.host_uuid)
                .and_then(|h| h.vms.get(location.position))
                .is_some_and(|vm| &vm.uuid == uuid)
        });

        let mut events = self.events;
        events.sort_by(|a, b| b.key.cmp(&a.key));
        events.dedup_by_key(|e| e.key);

        Snapshot {
            platform: self.platform,
            version: self.version,
            product_version: self.product_version,
            full_name: self.full_name,
            catalog: self.catalog,
            hosts,
            vm_index,
            clusters: self.clusters,
            datastores: self.datastores.into(),
            dv_switches: self.dv_switches.into(),
            datacenters: self.datacenters,
            resource_pools: self.resource_pools.into(),
            events,
            collected_at: self.collected_at.unwrap_or_else(Utc::now),
        }
    }
}
