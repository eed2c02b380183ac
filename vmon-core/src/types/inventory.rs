//! Clusters, distributed switches, datacenters and resource pools.

use crate::index::SortKey;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    /// Overall health color; `None` when the endpoint did not report one.
    #[serde(default)]
    pub status: Option<String>,
}

impl Cluster {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), status: None }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// A distributed virtual switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DvSwitch {
    pub uuid: String,
    pub id: String,
    pub name: String,
}

impl SortKey for DvSwitch {
    type Key = str;

    fn sort_key(&self) -> &str {
        &self.uuid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datacenter {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub id: String,
    /// Slash separated path from the datacenter root, e.g. "Resources/prod".
    pub path: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl SortKey for ResourcePool {
    type Key = str;

    fn sort_key(&self) -> &str {
        &self.id
    }
}
