//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use vmon_core::types::{
    AccessFlags, Cluster, Datacenter, Datastore, DatastoreMount, DeviceKind, DiskExtent, DvSwitch,
    Duplex, Event, FileSystem, Host, HostProperty, NicInfo, PathRecord, PhysicalNic, ResourcePool,
    VirtualMachine, VmDevice, VmProperty,
};
use vmon_core::{
    EntityKind, Endpoint, MetricResolver, PerfSample, PlatformKind, Snapshot, SnapshotStore, Unit,
};

pub const URL: &str = "https://vcenter.example.com/sdk";
pub const USER: &str = "monitor";
pub const PASSWORD: &str = "secret";

pub const CPU_USAGE: u64 = 2;
pub const POWER: u64 = 3;
pub const NET_RECEIVED: u64 = 4;
pub const NET_PACKETS_RX: u64 = 5;
pub const DS_READ_LATENCY: u64 = 10;
pub const DS_WRITE_LATENCY: u64 = 11;
pub const DS_READ_RPS: u64 = 12;
pub const DISK_CAPACITY: u64 = 20;
pub const DISK_USED: u64 = 21;
pub const DISK_PROVISIONED: u64 = 22;
pub const VM_CPU_READY: u64 = 30;
pub const VM_NET_USAGE: u64 = 31;
pub const VM_READ_OIO: u64 = 32;
pub const VM_MEM_CONSUMED: u64 = 33;
pub const CLUSTER_CPU: u64 = 40;
pub const GPU_MEMORY: u64 = 50;

pub const FULL_ACCESS: AccessFlags = AccessFlags::from_bits(0x0f);
pub const READ_ONLY: AccessFlags = AccessFlags::from_bits(0x07);

pub fn endpoint() -> Endpoint {
    Endpoint::new(URL, USER, PASSWORD)
}

fn nic(name: &str, speed: u64) -> PhysicalNic {
    PhysicalNic {
        name: name.to_string(),
        speed,
        duplex: Duplex::Full,
        driver: Some("ixgben".to_string()),
        mac: Some("00:50:56:aa:bb:01".to_string()),
    }
}

fn vm_web() -> VirtualMachine {
    let mut vm = VirtualMachine::new("vm-web", "vm-101")
        .with_prop(VmProperty::Name, "web01")
        .with_prop(VmProperty::CpuNum, "4")
        .with_prop(VmProperty::CpuUsage, "1200")
        .with_prop(VmProperty::MemorySize, "8192")
        .with_prop(VmProperty::MemorySizeBallooned, "100")
        .with_prop(VmProperty::PowerState, "poweredOn")
        .with_prop(VmProperty::ToolsVersion, "12294")
        .with_prop(VmProperty::ToolsRunningStatus, "guestToolsRunning")
        .with_prop(VmProperty::IpAddress, "10.0.0.21")
        .with_prop(VmProperty::GuestHostName, "web01.example.com")
        .with_prop(VmProperty::GuestFamily, "linuxGuest")
        .with_prop(VmProperty::GuestFullName, "Ubuntu Linux (64-bit)")
        .with_prop(VmProperty::Folder, "Production/Web")
        .with_prop(VmProperty::DatastoreId, "datastore-1")
        .with_prop(VmProperty::ResourcePool, "resgroup-9");
    vm.snapshot_count = 2;
    vm.devices = vec![
        VmDevice {
            kind: DeviceKind::Nic,
            instance: Some("4000".to_string()),
            label: Some("Network adapter 1".to_string()),
            nic: NicInfo {
                mac: Some("00:50:56:01:02:03".to_string()),
                connected: Some("1".to_string()),
                kind: Some("VirtualVmxnet3".to_string()),
                backing_device: Some("VM Network".to_string()),
                ..NicInfo::default()
            },
        },
        VmDevice {
            kind: DeviceKind::Disk,
            instance: Some("scsi0:0".to_string()),
            label: Some("Hard disk 1".to_string()),
            nic: NicInfo::default(),
        },
    ];
    vm.file_systems = vec![
        FileSystem { path: "/".to_string(), capacity: 1000, free_space: 250 },
        FileSystem { path: "/boot".to_string(), capacity: 0, free_space: 0 },
    ];
    vm.custom_attributes = vec![vmon_core::types::CustomAttribute {
        name: "owner".to_string(),
        value: "web-team".to_string(),
    }]
    .into();
    vm
}

fn vm_db() -> VirtualMachine {
    VirtualMachine::new("vm-db", "vm-102")
        .with_prop(VmProperty::Name, "db01")
        .with_prop(VmProperty::MemorySizeBallooned, "not reported")
        .with_prop(VmProperty::PowerState, "unknownState")
        .with_prop(VmProperty::DatastoreId, "datastore-404")
}

fn host(uuid: &str, id: &str, name: &str) -> Host {
    Host::new(uuid, id)
        .with_prop(HostProperty::Name, name)
        .with_prop(HostProperty::HwUuid, format!("{}-hw", uuid))
}

/// A vCenter inventory with three hosts sharing one datastore.
pub fn vcenter_snapshot() -> Snapshot {
    let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

    let mut esx1 = host("hv-1", "host-10", "esx1.example.com")
        .with_prop(HostProperty::OverallCpuUsage, "2400")
        .with_prop(HostProperty::HwCpuMhz, "2600")
        .with_prop(HostProperty::MemoryUsed, "4096")
        .with_prop(HostProperty::Status, "green")
        .with_prop(HostProperty::HealthState, "yellow")
        .with_prop(HostProperty::Maintenance, "false")
        .with_prop(HostProperty::Version, "7.0.3")
        .with_prop(HostProperty::NetName, "esx1");
    esx1.ip = Some("10.0.0.11".to_string());
    esx1.cluster_id = Some("domain-c7".to_string());
    esx1.datacenter_name = "DC1".to_string();
    esx1.parent_name = "prod".to_string();
    esx1.parent_type = "ClusterComputeResource".to_string();
    esx1.nics = vec![nic("vmnic0", 10000), nic("vmnic1", 1000)].into();
    esx1.datastore_mounts = vec![
        DatastoreMount {
            name: "ssd".to_string(),
            paths: vec![
                PathRecord { partition_id: 1, multipath_active: 2, multipath_total: 4 },
                PathRecord { partition_id: 3, multipath_active: 1, multipath_total: 2 },
            ]
            .into(),
        },
        DatastoreMount {
            name: "nfs".to_string(),
            paths: vec![PathRecord { partition_id: 1, multipath_active: 1, multipath_total: 1 }]
                .into(),
        },
        DatastoreMount { name: "offline".to_string(), paths: Default::default() },
    ]
    .into();
    esx1.vms = vec![vm_web(), vm_db()];

    let mut esx2 = host("hv-2", "host-20", "esx2.example.com").with_prop(HostProperty::Maintenance, "true");
    esx2.datastore_mounts =
        vec![DatastoreMount { name: "ssd".to_string(), paths: Default::default() }].into();
    let esx3 = host("hv-3", "host-30", "esx3.example.com");
    let unnamed = Host::new("hv-4", "host-40");

    let mut ssd = Datastore::new("ssd", "datastore-1")
        .with_uuid("ds-uuid-1")
        .with_access("hv-1", FULL_ACCESS)
        .with_access("hv-2", FULL_ACCESS)
        .with_access("hv-3", READ_ONLY);
    ssd.extents = vec![DiskExtent { disk_name: "naa.600a".to_string(), partition_id: 1 }];

    let nfs = Datastore::new("nfs", "datastore-2").with_access("hv-1", FULL_ACCESS);
    let offline = Datastore::new("offline", "datastore-3")
        .with_uuid("ds-uuid-3")
        .with_access("hv-1", AccessFlags::MOUNTED);

    Snapshot::builder(PlatformKind::VCenter)
        .version(7, 0)
        .product("7.0.3", "VMware vCenter Server 7.0.3 build-19480866")
        .counter("cpu/usage[average]", CPU_USAGE, Unit::Percent)
        .counter("power/power[average]", POWER, Unit::Watt)
        .counter("net/received[average]", NET_RECEIVED, Unit::KilobytesPerSecond)
        .counter("net/packetsRx[summation]", NET_PACKETS_RX, Unit::Number)
        .counter("datastore/totalReadLatency[average]", DS_READ_LATENCY, Unit::Millisecond)
        .counter("datastore/totalWriteLatency[average]", DS_WRITE_LATENCY, Unit::Millisecond)
        .counter("datastore/numberReadAveraged[average]", DS_READ_RPS, Unit::Number)
        .counter("disk/capacity[latest]", DISK_CAPACITY, Unit::Kilobyte)
        .counter("disk/used[latest]", DISK_USED, Unit::Kilobyte)
        .counter("disk/provisioned[latest]", DISK_PROVISIONED, Unit::Kilobyte)
        .counter("cpu/ready[summation]", VM_CPU_READY, Unit::Millisecond)
        .counter("net/usage[average]", VM_NET_USAGE, Unit::KilobytesPerSecond)
        .counter("virtualDisk/readOIO[latest]", VM_READ_OIO, Unit::Number)
        .counter("mem/consumed[average]", VM_MEM_CONSUMED, Unit::Kilobyte)
        .counter("cpu/usagemhz[average]", CLUSTER_CPU, Unit::Megahertz)
        .counter("gpu/mem[average]", GPU_MEMORY, Unit::Unknown)
        .host(esx1)
        .host(esx2)
        .host(esx3)
        .host(unnamed)
        .cluster(Cluster::new("domain-c7", "prod").with_status("yellow"))
        .cluster(Cluster::new("domain-c9", "lab"))
        .datastore(ssd)
        .datastore(nfs)
        .datastore(offline)
        .dv_switch(DvSwitch {
            uuid: "50 2a 1b".to_string(),
            id: "dvs-21".to_string(),
            name: "dvs-prod".to_string(),
        })
        .datacenter(Datacenter { id: "datacenter-2".to_string(), name: "DC1".to_string() })
        .resource_pool(ResourcePool {
            id: "resgroup-9".to_string(),
            path: "Resources/prod".to_string(),
            parent_id: None,
        })
        .event(Event::new(1, ts, "User monitor logged in"))
        .event(Event::new(2, ts, "Alarm created"))
        .event(Event::new(3, ts, "Task: Power On virtual machine"))
        .event(Event::new(4, ts, "web01 on esx1 is powered on"))
        .event(Event::new(5, ts, "User monitor logged out"))
        .build()
}

/// A resolver whose endpoint already holds `snapshot`.
pub fn ready_resolver(snapshot: Snapshot) -> MetricResolver {
    let store = Arc::new(SnapshotStore::new());
    store.with_endpoint(URL, USER, PASSWORD, |_| ());
    assert!(store.publish(URL, USER, snapshot));
    MetricResolver::new(store)
}

/// Store samples for a registered counter, as the collector would.
pub fn collect(
    resolver: &MetricResolver,
    kind: EntityKind,
    id: &str,
    counter_id: u64,
    samples: Vec<PerfSample>,
) {
    let stored = resolver
        .store()
        .with_entry_mut(URL, USER, |entry| entry.counters.record_samples(kind, id, counter_id, samples))
        .unwrap();
    assert!(stored, "counter {counter_id} of {id} was not registered");
}

pub fn sample(instance: &str, value: u64) -> PerfSample {
    PerfSample::new(instance, Some(value))
}
