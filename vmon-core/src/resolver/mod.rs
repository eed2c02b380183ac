//! Metric resolution: the public request surface.
//!
//! Every check follows the same shape. Lock the store, resolve the endpoint,
//! resolve the entity, register or read counters and queries, compute the
//! result, unlock. Checks are split by the entity they target:
//!
//! - [`service`]: endpoint-wide facts, clusters, datacenters and the event log
//! - [`hypervisor`]: host systems
//! - [`vm`]: virtual machines
//! - [`datastore`]: datastores, including aggregation across hosts
//! - [`dvswitch`]: distributed switches and their port queries
//!
//! Discovery checks return JSON text built from the row types in [`discovery`].

pub mod datastore;
pub mod discovery;
pub mod dvswitch;
pub mod hypervisor;
pub mod service;
pub mod vm;

mod session;

pub use datastore::{DatastoreMetric, HvDatastoreMetric, SizeMode};
pub use service::{LogEvent, SkipMode};

use crate::config::Config;
use crate::error::CheckError;
use crate::store::SnapshotStore;
use session::Session;
use std::sync::Arc;
use tracing::debug;

/// Connection identity of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Endpoint {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self { url: url.into(), username: username.into(), password: password.into() }
    }
}

/// Answers metric checks against the snapshot store.
#[derive(Debug, Clone)]
pub struct MetricResolver {
    store: Arc<SnapshotStore>,
    instance_glob: String,
}

impl MetricResolver {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store, instance_glob: Config::default().perf_instance_glob }
    }

    pub fn with_config(store: Arc<SnapshotStore>, config: &Config) -> Self {
        Self { store, instance_glob: config.perf_instance_glob.clone() }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Run one check inside a session.
    ///
    /// An endpoint the collector has not served yet yields `R::default()`,
    /// which is the empty result for every check.
    fn run<R: Default>(
        &self,
        check: &'static str,
        endpoint: &Endpoint,
        f: impl FnOnce(&mut Session<'_>) -> Result<R, CheckError>,
    ) -> Result<R, CheckError> {
        let (result, outcome) = self.store.with_endpoint(
            &endpoint.url,
            &endpoint.username,
            &endpoint.password,
            |entry| match Session::open(entry, &self.instance_glob) {
                Ok(Some(mut session)) => {
                    let result = f(&mut session);
                    let outcome = match &result {
                        Ok(_) => "ok",
                        Err(e) => e.kind().as_str(),
                    };
                    (result, outcome)
                }
                Ok(None) => (Ok(R::default()), "pending"),
                Err(e) => {
                    let outcome = e.kind().as_str();
                    (Err(e), outcome)
                }
            },
        );

        if let Err(e) = &result {
            debug!(check, url = %endpoint.url, error = %e, "Check failed");
        }
        metrics::counter!("vmon_requests_total", "check" => check, "outcome" => outcome)
            .increment(1);
        result
    }
}

/// Reject an empty required identifier.
pub(crate) fn require<'p>(value: &'p str, position: &'static str) -> Result<&'p str, CheckError> {
    if value.is_empty() {
        Err(CheckError::InvalidParameter(position))
    } else {
        Ok(value)
    }
}

/// `None` and the empty string both select a parameter's default.
pub(crate) fn optional(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

pub(crate) fn parse_u64(value: &str) -> Result<u64, CheckError> {
    value.trim().parse().map_err(|_| CheckError::NotNumeric(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        assert_eq!(require("hv-1", "second"), Ok("hv-1"));
        assert_eq!(require("", "second"), Err(CheckError::InvalidParameter("second")));
    }

    #[test]
    fn test_optional() {
        assert_eq!(optional(None), None);
        assert_eq!(optional(Some("")), None);
        assert_eq!(optional(Some("max")), Some("max"));
    }

    #[test]
    fn test_parse_u64() {
        assert_eq!(parse_u64("2048"), Ok(2048));
        assert_eq!(parse_u64(" 12 "), Ok(12));
        assert_eq!(parse_u64("12MB"), Err(CheckError::NotNumeric("12MB".to_string())));
    }
}
