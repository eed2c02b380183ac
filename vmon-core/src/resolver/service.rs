//! Endpoint-wide checks: product facts, clusters, datacenters and the event log.

use super::discovery::{self, ClusterRow, DatacenterRow};
use super::session::Session;
use super::{optional, require, Endpoint, MetricResolver};
use crate::error::CheckError;
use crate::types::{health_color_code, CheckResult, EntityKind, Event, MetricValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, instrument};

/// One event handed to the caller's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub key: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl From<&Event> for LogEvent {
    fn from(event: &Event) -> Self {
        Self { key: event.key, timestamp: event.timestamp, message: event.message.clone() }
    }
}

/// What to do with events that predate the first request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkipMode {
    /// Deliver the backlog.
    #[default]
    All,
    /// Start after the newest event when the caller has no log position yet.
    Skip,
}

impl FromStr for SkipMode {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(SkipMode::All),
            "skip" => Ok(SkipMode::Skip),
            _ => Err(CheckError::InvalidParameter("second")),
        }
    }
}

impl MetricResolver {
    pub fn version(&self, endpoint: &Endpoint) -> CheckResult {
        self.run("version", endpoint, |s| {
            let version = s.snapshot.product_version().ok_or(CheckError::ValueUnavailable)?;
            Ok(Some(MetricValue::Str(version.to_string())))
        })
    }

    pub fn fullname(&self, endpoint: &Endpoint) -> CheckResult {
        self.run("fullname", endpoint, |s| {
            let name = s.snapshot.full_name().ok_or(CheckError::ValueUnavailable)?;
            Ok(Some(MetricValue::Str(name.to_string())))
        })
    }

    /// Deliver new events after `last_log_size`, oldest first.
    ///
    /// The first request of an endpoint only positions the cursor. With
    /// [`SkipMode::Skip`] and an empty caller log the cursor is re-positioned
    /// on every request until the caller has stored something.
    #[instrument(skip(self, endpoint), fields(url = %endpoint.url))]
    pub fn eventlog(
        &self,
        endpoint: &Endpoint,
        skip_mode: Option<&str>,
        last_log_size: u64,
    ) -> Result<Vec<LogEvent>, CheckError> {
        let mode: SkipMode = skip_mode.unwrap_or_default().parse()?;
        let skip_old = mode == SkipMode::Skip && last_log_size == 0;
        self.run("eventlog", endpoint, |s| deliver_events(s, last_log_size, skip_old))
    }

    pub fn cluster_discovery(&self, endpoint: &Endpoint) -> CheckResult {
        self.run("cluster_discovery", endpoint, |s| {
            let rows: Vec<ClusterRow<'_>> = s.snapshot.clusters().iter().map(ClusterRow::from).collect();
            discovery::to_json(&rows)
        })
    }

    pub fn cluster_status(&self, endpoint: &Endpoint, name: &str) -> CheckResult {
        let name = require(name, "second")?;
        self.run("cluster_status", endpoint, |s| {
            let cluster = s.snapshot.cluster_by_name(name).ok_or(CheckError::UnknownClusterName)?;
            let status = cluster.status.as_deref().ok_or(CheckError::ValueUnavailable)?;
            Ok(Some(MetricValue::Uint(health_color_code(status)?)))
        })
    }

    /// Raw value of any cluster counter, registered on first request.
    pub fn cluster_perfcounter(
        &self,
        endpoint: &Endpoint,
        id: &str,
        path: &str,
        instance: Option<&str>,
    ) -> CheckResult {
        let id = require(id, "second")?;
        let path = require(path, "third")?;
        self.run("cluster_perfcounter", endpoint, |s| {
            let info = s.counter(path)?;
            let cluster = s.snapshot.cluster_by_id(id).ok_or(CheckError::UnknownClusterId)?;
            s.perf_counter(
                EntityKind::ClusterComputeResource,
                &cluster.id,
                info,
                optional(instance).unwrap_or(""),
            )
        })
    }

    pub fn datacenter_discovery(&self, endpoint: &Endpoint) -> CheckResult {
        self.run("datacenter_discovery", endpoint, |s| {
            let rows: Vec<DatacenterRow<'_>> =
                s.snapshot.datacenters().iter().map(DatacenterRow::from).collect();
            discovery::to_json(&rows)
        })
    }
}

fn deliver_events(
    session: &mut Session<'_>,
    last_log_size: u64,
    skip_old: bool,
) -> Result<Vec<LogEvent>, CheckError> {
    let cursor = &mut *session.eventlog;

    let reposition = match cursor.last_key {
        None => true,
        Some(key) => skip_old && key != 0,
    };
    if reposition {
        debug!(last_log_size, skip_old, "Positioned event cursor");
        cursor.last_key = Some(last_log_size);
        cursor.skip_old = skip_old;
        return Ok(Vec::new());
    }

    if cursor.oom {
        return Err(CheckError::EventBufferExhausted);
    }
    if cursor.last_key.is_some_and(|key| last_log_size < key) && last_log_size != 0 {
        return Err(CheckError::EventsTooOld);
    }

    let events = session.snapshot.events();
    let Some(newest) = events.first() else {
        return Ok(Vec::new());
    };

    let delivered: Vec<LogEvent> = events
        .iter()
        .rev()
        .filter(|e| e.key > last_log_size)
        .map(LogEvent::from)
        .collect();
    cursor.last_key = Some(newest.key);
    Ok(delivered)
}
