//! Low-level discovery rows.
//!
//! Each row type serializes to one JSON object whose keys are the macro names
//! the monitoring templates expect.

use crate::error::CheckError;
use crate::types::{
    Cluster, CustomAttribute, Datacenter, Datastore, DatastoreMount, DvSwitch, PhysicalNic,
    CheckResult, MetricValue,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Serialize discovery rows into a text result.
pub(crate) fn to_json<T: Serialize>(rows: &[T]) -> CheckResult {
    let json = serde_json::to_string(rows).map_err(CheckError::from)?;
    Ok(Some(MetricValue::Text(json)))
}

#[derive(Debug, Serialize)]
pub struct ClusterRow<'a> {
    #[serde(rename = "{#CLUSTER.ID}")]
    pub id: &'a str,
    #[serde(rename = "{#CLUSTER.NAME}")]
    pub name: &'a str,
}

impl<'a> From<&'a Cluster> for ClusterRow<'a> {
    fn from(cluster: &'a Cluster) -> Self {
        Self { id: &cluster.id, name: &cluster.name }
    }
}

#[derive(Debug, Serialize)]
pub struct DatacenterRow<'a> {
    #[serde(rename = "{#DATACENTER}")]
    pub name: &'a str,
    #[serde(rename = "{#DATACENTERID}")]
    pub id: &'a str,
}

impl<'a> From<&'a Datacenter> for DatacenterRow<'a> {
    fn from(datacenter: &'a Datacenter) -> Self {
        Self { name: &datacenter.name, id: &datacenter.id }
    }
}

#[derive(Debug, Serialize)]
pub struct HostRow<'a> {
    #[serde(rename = "{#HV.UUID}")]
    pub uuid: &'a str,
    #[serde(rename = "{#HV.ID}")]
    pub id: &'a str,
    #[serde(rename = "{#HV.NAME}")]
    pub name: &'a str,
    #[serde(rename = "{#HV.IP}")]
    pub ip: &'a str,
    #[serde(rename = "{#DATACENTER.NAME}")]
    pub datacenter: &'a str,
    #[serde(rename = "{#CLUSTER.NAME}")]
    pub cluster: &'a str,
    #[serde(rename = "{#PARENT.NAME}")]
    pub parent_name: &'a str,
    #[serde(rename = "{#PARENT.TYPE}")]
    pub parent_type: &'a str,
    #[serde(rename = "{#HV.NETNAME}")]
    pub net_name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct VmAttributeRow<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> From<&'a CustomAttribute> for VmAttributeRow<'a> {
    fn from(attribute: &'a CustomAttribute) -> Self {
        Self { name: &attribute.name, value: &attribute.value }
    }
}

#[derive(Debug, Serialize)]
pub struct VmRow<'a> {
    #[serde(rename = "{#VM.UUID}")]
    pub uuid: &'a str,
    #[serde(rename = "{#VM.ID}")]
    pub id: &'a str,
    #[serde(rename = "{#VM.NAME}")]
    pub name: &'a str,
    #[serde(rename = "{#HV.NAME}")]
    pub hv_name: &'a str,
    #[serde(rename = "{#HV.UUID}")]
    pub hv_uuid: &'a str,
    #[serde(rename = "{#HV.ID}")]
    pub hv_id: &'a str,
    #[serde(rename = "{#DATACENTER.NAME}")]
    pub datacenter: &'a str,
    #[serde(rename = "{#CLUSTER.NAME}")]
    pub cluster: &'a str,
    #[serde(rename = "{#VM.IP}")]
    pub ip: &'a str,
    #[serde(rename = "{#VM.DNS}")]
    pub dns: &'a str,
    #[serde(rename = "{#VM.GUESTFAMILY}")]
    pub guest_family: &'a str,
    #[serde(rename = "{#VM.GUESTFULLNAME}")]
    pub guest_full_name: &'a str,
    #[serde(rename = "{#VM.FOLDER}")]
    pub folder: &'a str,
    #[serde(rename = "{#VM.SNAPSHOT.COUNT}")]
    pub snapshot_count: u64,
    #[serde(rename = "{#VM.TOOLS.STATUS}")]
    pub tools_status: &'a str,
    #[serde(rename = "{#VM.POWERSTATE}")]
    pub power_state: &'a str,
    #[serde(rename = "{#DATASTORE.NAME}")]
    pub datastore: &'a str,
    #[serde(rename = "{#DATASTORE.UUID}")]
    pub datastore_uuid: &'a str,
    #[serde(rename = "{#VM.RPOOL.ID}")]
    pub resource_pool_id: &'a str,
    #[serde(rename = "{#VM.RPOOL.PATH}")]
    pub resource_pool_path: &'a str,
    #[serde(rename = "vm.customattribute")]
    pub custom_attributes: Vec<VmAttributeRow<'a>>,
}

#[derive(Debug, Serialize)]
pub struct HostNicRow<'a> {
    #[serde(rename = "{#IFNAME}")]
    pub name: &'a str,
    #[serde(rename = "{#IFDRIVER}")]
    pub driver: &'a str,
    #[serde(rename = "{#IFSPEED}")]
    pub speed: u64,
    #[serde(rename = "{#IFDUPLEX}")]
    pub duplex: &'static str,
    #[serde(rename = "{#IFMAC}")]
    pub mac: &'a str,
}

impl<'a> From<&'a PhysicalNic> for HostNicRow<'a> {
    fn from(nic: &'a PhysicalNic) -> Self {
        Self {
            name: &nic.name,
            driver: nic.driver.as_deref().unwrap_or(""),
            speed: nic.speed,
            duplex: nic.duplex.as_str(),
            mac: nic.mac.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HostDatastoreRow<'a> {
    #[serde(rename = "{#DATASTORE}")]
    pub name: &'a str,
    #[serde(rename = "{#MULTIPATH.COUNT}")]
    pub multipath_count: u64,
    #[serde(rename = "{#MULTIPATH.PARTITION.COUNT}")]
    pub partition_count: usize,
}

impl<'a> From<&'a DatastoreMount> for HostDatastoreRow<'a> {
    fn from(mount: &'a DatastoreMount) -> Self {
        Self {
            name: &mount.name,
            multipath_count: mount.total_paths(),
            partition_count: mount.paths.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatastoreRow<'a> {
    #[serde(rename = "{#DATASTORE}")]
    pub name: &'a str,
    #[serde(rename = "{#DATASTORE.EXTENT}")]
    pub extents: BTreeMap<&'a str, u64>,
}

impl<'a> From<&'a Datastore> for DatastoreRow<'a> {
    fn from(datastore: &'a Datastore) -> Self {
        Self {
            name: &datastore.name,
            extents: datastore
                .extents
                .iter()
                .map(|e| (e.disk_name.as_str(), e.partition_id))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DvSwitchRow<'a> {
    #[serde(rename = "{#DVSWITCH.UUID}")]
    pub uuid: &'a str,
    #[serde(rename = "{#DVSWITCH.NAME}")]
    pub name: &'a str,
}

impl<'a> From<&'a DvSwitch> for DvSwitchRow<'a> {
    fn from(dv_switch: &'a DvSwitch) -> Self {
        Self { uuid: &dv_switch.uuid, name: &dv_switch.name }
    }
}

/// Connection flag of a VM NIC: numeric when the collector stored a number.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Connected<'a> {
    Number(u64),
    Text(&'a str),
}

impl<'a> From<&'a str> for Connected<'a> {
    fn from(value: &'a str) -> Self {
        value.parse().map(Connected::Number).unwrap_or(Connected::Text(value))
    }
}

#[derive(Debug, Serialize)]
pub struct VmNicRow<'a> {
    #[serde(rename = "{#IFNAME}")]
    pub name: &'a str,
    #[serde(rename = "{#IFDESC}")]
    pub description: &'a str,
    #[serde(rename = "{#IFMAC}")]
    pub mac: &'a str,
    #[serde(rename = "{#IFCONNECTED}")]
    pub connected: Connected<'a>,
    #[serde(rename = "{#IFTYPE}")]
    pub kind: &'a str,
    #[serde(rename = "{#IFBACKINGDEVICE}")]
    pub backing_device: &'a str,
    #[serde(rename = "{#IFDVSWITCH.UUID}")]
    pub dvswitch_uuid: &'a str,
    #[serde(rename = "{#IFDVSWITCH.PORTGROUP}")]
    pub dvswitch_portgroup: &'a str,
    #[serde(rename = "{#IFDVSWITCH.PORT}")]
    pub dvswitch_port: &'a str,
}

#[derive(Debug, Serialize)]
pub struct VmDiskRow<'a> {
    #[serde(rename = "{#DISKNAME}")]
    pub name: &'a str,
    #[serde(rename = "{#DISKDESC}")]
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
pub struct VmFsRow<'a> {
    #[serde(rename = "{#FSNAME}")]
    pub name: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DiskExtent;

    #[test]
    fn test_cluster_row_keys() {
        let cluster = Cluster::new("domain-c7", "prod");
        let json = serde_json::to_value(ClusterRow::from(&cluster)).unwrap();
        assert_eq!(json, serde_json::json!({"{#CLUSTER.ID}": "domain-c7", "{#CLUSTER.NAME}": "prod"}));
    }

    #[test]
    fn test_datastore_extents_are_an_object() {
        let mut datastore = Datastore::new("ssd", "ds-1");
        datastore.extents = vec![
            DiskExtent { disk_name: "naa.600a".into(), partition_id: 1 },
            DiskExtent { disk_name: "naa.600b".into(), partition_id: 3 },
        ];
        let json = serde_json::to_value(DatastoreRow::from(&datastore)).unwrap();
        assert_eq!(json["{#DATASTORE}"], "ssd");
        assert_eq!(json["{#DATASTORE.EXTENT}"], serde_json::json!({"naa.600a": 1, "naa.600b": 3}));
    }

    #[test]
    fn test_connected_flag_prefers_numbers() {
        assert_eq!(serde_json::to_string(&Connected::from("1")).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Connected::from("yes")).unwrap(), "\"yes\"");
    }

    #[test]
    fn test_to_json_wraps_array_in_text() {
        let rows: Vec<VmFsRow<'_>> = vec![VmFsRow { name: "/" }, VmFsRow { name: "/var" }];
        assert_eq!(
            to_json(&rows),
            Ok(Some(MetricValue::Text(r#"[{"{#FSNAME}":"/"},{"{#FSNAME}":"/var"}]"#.to_string())))
        );
    }
}
