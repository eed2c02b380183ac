//! Error types for vmon.
//!
//! Two error families live here. [`VmonError`] covers process-level failures
//! (configuration, I/O, observability setup). [`CheckError`] is the
//! request-scoped failure returned by every metric check; its `Display` text
//! is the message shown to the operator, so the wording is part of the
//! contract with the polling layer.

use crate::types::AccessDenial;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for process-level vmon operations.
pub type Result<T> = std::result::Result<T, VmonError>;

/// Process-level error type.
#[derive(Error, Debug)]
pub enum VmonError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Observability setup failed: {reason}")]
    Observability { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VmonError {
    /// Create an internal error with a message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Broad class of a [`CheckError`], used for metric labels and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing request parameters.
    Input,
    /// The requested entity, counter or instance does not exist.
    Resolution,
    /// The collector's last refresh failed, or it stored a per-entity error.
    Upstream,
    /// The shared cache could not buffer more data.
    ResourceExhausted,
    /// The counter catalog or inventory carried a value outside the known set.
    CatalogCorruption,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Input => "input",
            ErrorKind::Resolution => "resolution",
            ErrorKind::Upstream => "upstream",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::CatalogCorruption => "catalog_corruption",
        }
    }
}

/// Request-scoped failure of a metric check.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    // Input errors
    #[error("Invalid {0} parameter.")]
    InvalidParameter(&'static str),

    #[error("Invalid {0} parameter value.")]
    InvalidParameterValue(&'static str),

    #[error("Unknown format of vmware DistributedVirtualSwitchPortCriteria.")]
    InvalidPortCriteria,

    // Resolution errors
    #[error("Unknown hypervisor uuid.")]
    UnknownHypervisor,

    #[error("Unknown virtual machine uuid.")]
    UnknownVm,

    #[error("Unknown cluster name.")]
    UnknownClusterName,

    #[error("Invalid cluster id.")]
    UnknownClusterId,

    #[error("Unknown datastore name.")]
    UnknownDatastore,

    #[error("Unknown datastore uuid.")]
    DatastoreWithoutUuid,

    #[error("Unknown DVSwitch uuid.")]
    UnknownDvSwitch,

    #[error("Unknown physical network interface name")]
    UnknownNic,

    #[error("Unknown file system path.")]
    UnknownFileSystem,

    #[error("Unknown partition id:{0}")]
    UnknownPartition(u64),

    #[error("Datastore \"{datastore}\" not found on this hypervisor.")]
    DatastoreNotOnHost { datastore: String },

    #[error("Unknown hypervisor \"{host}\" for datastore \"{datastore}\".")]
    HostNotOnDatastore { host: String, datastore: String },

    #[error("Hypervisor '{uuid}' not found on this datastore.")]
    HypervisorNotOnDatastore { uuid: String },

    #[error("Datastore is not available for hypervisor: {0}")]
    DatastoreAccessDenied(AccessDenial),

    #[error("No hypervisor name found.")]
    HypervisorNameUnavailable,

    #[error("Value is not available.")]
    ValueUnavailable,

    #[error("Custom attribute is not available.")]
    CustomAttributeUnavailable,

    #[error("Datastore \"{0}\" is not available.")]
    DatastoreFieldUnavailable(&'static str),

    #[error("Datastore \"capacity\" is zero.")]
    CapacityZero,

    #[error("No datastores available.")]
    NoDatastores,

    #[error("Performance counter is not available.")]
    CounterUnavailable,

    #[error("Performance counter data was not found.")]
    CounterDataNotFound,

    #[error("Performance counter data is not available.")]
    CounterDataUnavailable,

    #[error("Performance counter instance was not found.")]
    CounterInstanceNotFound,

    // Aggregation
    #[error("Counter {counter} for datastore {datastore} is not available for hypervisor {host}: {reason}")]
    AggregateCounterFailed { counter: String, datastore: String, host: String, reason: String },

    // Upstream errors
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    EntityRefresh(String),

    #[error("{0}")]
    QueryFailed(String),

    // Resource exhaustion
    #[error("Not enough shared memory to store VMware events.")]
    EventBufferExhausted,

    #[error("Too old events requested.")]
    EventsTooOld,

    // Catalog corruption
    #[error("Performance counter type of unitInfo is unknown. Counter id:{0}")]
    UnknownUnit(u64),

    #[error("Unexpected status value \"{0}\".")]
    UnexpectedStatus(String),

    #[error("Value \"{0}\" is not numeric.")]
    NotNumeric(String),

    #[error("Cannot serialize discovery data: {0}")]
    Serialization(String),
}

impl CheckError {
    /// Message used when the collector failed without recording a reason.
    pub const UNKNOWN_SERVICE_ERROR: &'static str = "Unknown VMware service error.";

    /// Classify the error for metrics and logs.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckError::InvalidParameter(_)
            | CheckError::InvalidParameterValue(_)
            | CheckError::InvalidPortCriteria => ErrorKind::Input,
            CheckError::Upstream(_)
            | CheckError::EntityRefresh(_)
            | CheckError::QueryFailed(_)
            | CheckError::AggregateCounterFailed { .. } => ErrorKind::Upstream,
            CheckError::EventBufferExhausted => ErrorKind::ResourceExhausted,
            CheckError::UnknownUnit(_)
            | CheckError::UnexpectedStatus(_)
            | CheckError::NotNumeric(_)
            | CheckError::Serialization(_) => ErrorKind::CatalogCorruption,
            _ => ErrorKind::Resolution,
        }
    }

    /// Upstream failure of the whole endpoint, with a fallback message.
    pub fn upstream(message: Option<&str>) -> Self {
        CheckError::Upstream(message.unwrap_or(Self::UNKNOWN_SERVICE_ERROR).to_string())
    }
}

impl From<serde_json::Error> for CheckError {
    fn from(err: serde_json::Error) -> Self {
        CheckError::Serialization(err.to_string())
    }
}
