//! Entity resolution over a snapshot.
//!
//! Hosts and VMs are found through hash lookups by UUID. Everything else that
//! is looked up by name or identifier lives in a [`SortedVec`] and is found by
//! binary search. Clusters are few, so they are scanned linearly.
//!
//! Every lookup returns `Option`; callers translate absence into the
//! domain-specific "unknown X" error.

mod sorted;

pub use sorted::{SortKey, SortedVec};

use crate::types::{
    AccessDenial, AccessFlags, Cluster, CustomAttribute, Datastore, DatastoreMount, DvSwitch,
    Host, PathRecord, PhysicalNic, ResourcePool, Snapshot, VirtualMachine,
};

/// Outcome of an access check that did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessCheck {
    /// The host has no access record for the datastore at all.
    HostAbsent,
    /// The host has a record, but it lacks the requested rights.
    Denied(AccessDenial),
}

impl Snapshot {
    pub fn host_by_uuid(&self, uuid: &str) -> Option<&Host> {
        self.hosts.get(uuid)
    }

    /// Find a VM together with the host that currently owns it.
    pub fn vm_by_uuid(&self, uuid: &str) -> Option<(&VirtualMachine, &Host)> {
        let location = self.vm_index.get(uuid)?;
        let host = self.hosts.get(&location.host_uuid)?;
        let vm = host.vms.get(location.position)?;
        Some((vm, host))
    }

    pub fn cluster_by_id(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    pub fn cluster_by_name(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    /// Cluster a host belongs to; a dangling id reads as "no cluster".
    pub fn cluster_of(&self, host: &Host) -> Option<&Cluster> {
        host.cluster_id.as_deref().and_then(|id| self.cluster_by_id(id))
    }

    pub fn datastore_by_name(&self, name: &str) -> Option<&Datastore> {
        self.datastores.find(name)
    }

    /// Datastore by management reference. Linear, used by discovery only.
    pub fn datastore_by_id(&self, id: &str) -> Option<&Datastore> {
        self.datastores.iter().find(|d| d.id == id)
    }

    pub fn dv_switch_by_uuid(&self, uuid: &str) -> Option<&DvSwitch> {
        self.dv_switches.find(uuid)
    }

    pub fn resource_pool_by_id(&self, id: &str) -> Option<&ResourcePool> {
        self.resource_pools.find(id)
    }
}

impl Host {
    pub fn nic_by_name(&self, name: &str) -> Option<&PhysicalNic> {
        self.nics.find(name)
    }

    pub fn datastore_mount_by_name(&self, name: &str) -> Option<&DatastoreMount> {
        self.datastore_mounts.find(name)
    }
}

impl DatastoreMount {
    pub fn path_by_partition(&self, partition_id: u64) -> Option<&PathRecord> {
        self.paths.find(&partition_id)
    }
}

impl VirtualMachine {
    pub fn custom_attribute(&self, name: &str) -> Option<&CustomAttribute> {
        self.custom_attributes.find(name)
    }
}

impl Datastore {
    pub fn access_for(&self, host_uuid: &str) -> Option<AccessFlags> {
        self.host_access.find(host_uuid).map(|a| a.flags)
    }

    /// Test whether `host_uuid` holds the `required` rights on this datastore.
    pub fn check_access(&self, host_uuid: &str, required: AccessFlags) -> Result<(), AccessCheck> {
        let flags = self.access_for(host_uuid).ok_or(AccessCheck::HostAbsent)?;
        flags.check(required).map_err(AccessCheck::Denied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CustomAttribute, Duplex, PlatformKind};

    fn nic(name: &str, speed: u64) -> PhysicalNic {
        PhysicalNic { name: name.to_string(), speed, duplex: Duplex::Full, driver: None, mac: None }
    }

    fn sample_snapshot() -> Snapshot {
        let mut host = Host::new("hv-1", "host-10");
        host.cluster_id = Some("domain-c7".to_string());
        host.nics = vec![nic("vmnic2", 1000), nic("vmnic0", 10000), nic("vmnic1", 100)].into();
        host.datastore_mounts = vec![
            DatastoreMount {
                name: "ssd".to_string(),
                paths: vec![
                    PathRecord { partition_id: 3, multipath_active: 2, multipath_total: 2 },
                    PathRecord { partition_id: 1, multipath_active: 1, multipath_total: 4 },
                ]
                .into(),
            },
            DatastoreMount { name: "hdd".to_string(), paths: SortedVec::new() },
        ]
        .into();
        let mut vm = VirtualMachine::new("vm-1", "vm-100");
        vm.custom_attributes = vec![
            CustomAttribute { name: "owner".into(), value: "ops".into() },
            CustomAttribute { name: "env".into(), value: "prod".into() },
        ]
        .into();
        host.vms.push(vm);

        let mut dangling = Host::new("hv-2", "host-11");
        dangling.cluster_id = Some("domain-missing".to_string());

        Snapshot::builder(PlatformKind::VCenter)
            .host(host)
            .host(dangling)
            .cluster(Cluster::new("domain-c7", "prod"))
            .datastore(Datastore::new("zeta", "ds-3"))
            .datastore(Datastore::new("alpha", "ds-1").with_access(
                "hv-1",
                AccessFlags::MOUNTED | AccessFlags::ACCESSIBLE | AccessFlags::READ,
            ))
            .datastore(Datastore::new("mid", "ds-2"))
            .dv_switch(DvSwitch { uuid: "50 2a".into(), id: "dvs-1".into(), name: "dvs".into() })
            .resource_pool(ResourcePool { id: "resgroup-9".into(), path: "Resources".into(), parent_id: None })
            .build()
    }

    #[test]
    fn test_hash_lookups() {
        let snapshot = sample_snapshot();

        assert_eq!(snapshot.host_by_uuid("hv-1").map(|h| h.id.as_str()), Some("host-10"));
        assert!(snapshot.host_by_uuid("hv-404").is_none());

        let (vm, host) = snapshot.vm_by_uuid("vm-1").unwrap();
        assert_eq!(vm.id, "vm-100");
        assert_eq!(host.uuid, "hv-1");
        assert!(snapshot.vm_by_uuid("vm-").is_none());
    }

    #[test]
    fn test_sorted_lookups() {
        let snapshot = sample_snapshot();

        assert!(snapshot.datastores().is_sorted());
        for name in ["alpha", "mid", "zeta"] {
            assert_eq!(snapshot.datastore_by_name(name).map(|d| d.name.as_str()), Some(name));
        }
        assert!(snapshot.datastore_by_name("beta").is_none());
        assert!(snapshot.dv_switch_by_uuid("50 2a").is_some());
        assert!(snapshot.resource_pool_by_id("resgroup-9").is_some());
        assert!(snapshot.resource_pool_by_id("resgroup-1").is_none());

        let host = snapshot.host_by_uuid("hv-1").unwrap();
        assert_eq!(host.nic_by_name("vmnic0").map(|n| n.speed), Some(10000));
        assert!(host.nic_by_name("vmnic9").is_none());

        let mount = host.datastore_mount_by_name("ssd").unwrap();
        assert_eq!(mount.path_by_partition(3).map(|p| p.multipath_active), Some(2));
        assert!(mount.path_by_partition(2).is_none());
        assert_eq!(mount.active_paths(), 3);
        assert_eq!(mount.total_paths(), 6);

        let (vm, _) = snapshot.vm_by_uuid("vm-1").unwrap();
        assert_eq!(vm.custom_attribute("owner").map(|a| a.value.as_str()), Some("ops"));
        assert!(vm.custom_attribute("team").is_none());
    }

    #[test]
    fn test_cluster_resolution() {
        let snapshot = sample_snapshot();

        assert_eq!(snapshot.cluster_by_name("prod").map(|c| c.id.as_str()), Some("domain-c7"));
        let host = snapshot.host_by_uuid("hv-1").unwrap();
        assert_eq!(snapshot.cluster_of(host).map(|c| c.name.as_str()), Some("prod"));

        let dangling = snapshot.host_by_uuid("hv-2").unwrap();
        assert!(snapshot.cluster_of(dangling).is_none());
    }

    #[test]
    fn test_access_check_distinguishes_absent_host() {
        let snapshot = sample_snapshot();
        let ds = snapshot.datastore_by_name("alpha").unwrap();

        assert_eq!(ds.check_access("hv-1", AccessFlags::READ_FILTER), Ok(()));
        assert_eq!(
            ds.check_access("hv-1", AccessFlags::WRITE_FILTER),
            Err(AccessCheck::Denied(AccessDenial::ReadOnly))
        );
        assert_eq!(ds.check_access("hv-2", AccessFlags::READ_FILTER), Err(AccessCheck::HostAbsent));
    }
}
