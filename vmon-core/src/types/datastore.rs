//! Datastores and per-host access rights.

use crate::index::{SortKey, SortedVec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per (datastore, host) access bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessFlags(u8);

impl AccessFlags {
    pub const NONE: AccessFlags = AccessFlags(0);
    pub const MOUNTED: AccessFlags = AccessFlags(0x01);
    pub const ACCESSIBLE: AccessFlags = AccessFlags(0x02);
    pub const READ: AccessFlags = AccessFlags(0x04);
    pub const WRITE: AccessFlags = AccessFlags(0x08);
    pub const READ_WRITE: AccessFlags = AccessFlags(0x04 | 0x08);

    /// Required bits for reading from a datastore through a host.
    pub const READ_FILTER: AccessFlags = AccessFlags(0x01 | 0x02 | 0x04);
    /// Required bits for writing to a datastore through a host.
    pub const WRITE_FILTER: AccessFlags = AccessFlags(0x01 | 0x02 | 0x04 | 0x08);

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        AccessFlags(bits & 0x0f)
    }

    pub const fn union(self, other: AccessFlags) -> Self {
        AccessFlags(self.0 | other.0)
    }

    pub const fn contains(&self, other: AccessFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check `required`, explaining the first missing capability.
    pub fn check(&self, required: AccessFlags) -> Result<(), AccessDenial> {
        if self.contains(required) {
            return Ok(());
        }
        Err(if !self.contains(Self::MOUNTED) {
            AccessDenial::Unmounted
        } else if !self.contains(Self::ACCESSIBLE) {
            AccessDenial::Inaccessible
        } else if self.0 & Self::READ_WRITE.0 == Self::READ.0 {
            AccessDenial::ReadOnly
        } else {
            AccessDenial::Unknown
        })
    }
}

impl std::ops::BitOr for AccessFlags {
    type Output = AccessFlags;

    fn bitor(self, rhs: AccessFlags) -> AccessFlags {
        self.union(rhs)
    }
}

/// Why a host may not use a datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenial {
    Unmounted,
    Inaccessible,
    ReadOnly,
    Unknown,
}

impl fmt::Display for AccessDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessDenial::Unmounted => "unmounted",
            AccessDenial::Inaccessible => "inaccessible",
            AccessDenial::ReadOnly => "readOnly",
            AccessDenial::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAccess {
    pub host_uuid: String,
    pub flags: AccessFlags,
}

impl SortKey for HostAccess {
    type Key = str;

    fn sort_key(&self) -> &str {
        &self.host_uuid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskExtent {
    pub disk_name: String,
    pub partition_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datastore {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    /// Management object reference, used to key performance counters.
    pub id: String,
    /// Bytes; `None` when the endpoint did not report it.
    #[serde(default)]
    pub capacity: Option<u64>,
    #[serde(default)]
    pub free_space: Option<u64>,
    #[serde(default)]
    pub uncommitted: Option<u64>,
    #[serde(default)]
    pub host_access: SortedVec<HostAccess>,
    #[serde(default)]
    pub extents: Vec<DiskExtent>,
}

impl Datastore {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: None,
            id: id.into(),
            capacity: None,
            free_space: None,
            uncommitted: None,
            host_access: SortedVec::new(),
            extents: Vec::new(),
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_access(mut self, host_uuid: impl Into<String>, flags: AccessFlags) -> Self {
        self.host_access.insert(HostAccess { host_uuid: host_uuid.into(), flags });
        self
    }
}

impl SortKey for Datastore {
    type Key = str;

    fn sort_key(&self) -> &str {
        &self.name
    }
}
