//! Process-wide cache of endpoint snapshots.
//!
//! One mutex guards every endpoint entry. Requests hold it for the whole
//! resolve-read sequence so that a host lookup and the counter read that
//! follows it see the same snapshot. The collector takes the same lock to
//! publish snapshots and to fill counter and query tables; it never holds it
//! across network I/O.

use crate::counters::CounterRegistry;
use crate::queries::CustomQueryRegistry;
use crate::types::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Identity of a monitored endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointKey {
    pub url: String,
    pub username: String,
}

impl EndpointKey {
    pub fn new(url: impl Into<String>, username: impl Into<String>) -> Self {
        Self { url: url.into(), username: username.into() }
    }
}

/// Outcome of the collector's latest attempt for an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "message")]
pub enum EndpointState {
    /// Registered, no collection attempt finished yet.
    Pending,
    Ready,
    /// The latest attempt failed; the message is absent when the collector had none.
    Failed(Option<String>),
}

impl EndpointState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointState::Pending => "pending",
            EndpointState::Ready => "ready",
            EndpointState::Failed(_) => "failed",
        }
    }
}

/// Delivery cursor of the endpoint's event log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventlogCursor {
    /// Newest key handed to a consumer; `None` until the first request.
    pub last_key: Option<u64>,
    /// Set when the consumer asked to skip events older than its first request.
    pub skip_old: bool,
    /// Set by the collector when events could not be buffered.
    pub oom: bool,
}

/// Everything the cache keeps for one endpoint.
#[derive(Debug)]
pub struct EndpointEntry {
    pub(crate) password: String,
    pub(crate) state: EndpointState,
    pub(crate) snapshot: Option<Arc<Snapshot>>,
    pub counters: CounterRegistry,
    pub queries: CustomQueryRegistry,
    pub eventlog: EventlogCursor,
    pub(crate) registered_at: DateTime<Utc>,
    pub(crate) last_access: DateTime<Utc>,
}

impl EndpointEntry {
    fn new(password: &str) -> Self {
        let now = Utc::now();
        Self {
            password: password.to_string(),
            state: EndpointState::Pending,
            snapshot: None,
            counters: CounterRegistry::new(),
            queries: CustomQueryRegistry::new(),
            eventlog: EventlogCursor::default(),
            registered_at: now,
            last_access: now,
        }
    }

    pub fn state(&self) -> &EndpointState {
        &self.state
    }

    /// Latest published snapshot, kept even after a failed refresh.
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.snapshot.as_ref()
    }

    /// Credentials the collector should log in with.
    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        self.last_access
    }
}

/// Short view of one endpoint for health reporting and the collector's work list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub key: EndpointKey,
    pub state: EndpointState,
    pub collected_at: Option<DateTime<Utc>>,
    pub last_access: DateTime<Utc>,
}

/// Snapshot cache shared by request workers and the collector.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    endpoints: Mutex<HashMap<EndpointKey, EndpointEntry>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the cache. A worker that panicked while holding the lock leaves
    /// the map consistent, so poisoning is cleared rather than propagated.
    fn lock(&self) -> MutexGuard<'_, HashMap<EndpointKey, EndpointEntry>> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the endpoint's entry under the cache lock.
    ///
    /// Unknown endpoints are registered as pending so the collector picks
    /// them up on its next cycle.
    #[instrument(skip(self, password, f), fields(url = %url, username = %username))]
    pub fn with_endpoint<R>(
        &self,
        url: &str,
        username: &str,
        password: &str,
        f: impl FnOnce(&mut EndpointEntry) -> R,
    ) -> R {
        let mut endpoints = self.lock();
        let key = EndpointKey::new(url, username);
        let entry = endpoints.entry(key).or_insert_with(|| {
            info!("Registered endpoint");
            EndpointEntry::new(password)
        });

        if entry.password != password {
            debug!("Endpoint credentials changed");
            entry.password = password.to_string();
        }
        entry.last_access = Utc::now();

        let result = f(entry);
        publish_endpoint_gauges(&endpoints);
        result
    }

    /// Replace the endpoint's snapshot and mark it ready.
    ///
    /// Returns `false` when the endpoint was never requested.
    #[instrument(skip(self, snapshot), fields(url = %url, username = %username))]
    pub fn publish(&self, url: &str, username: &str, snapshot: Snapshot) -> bool {
        let mut endpoints = self.lock();
        let Some(entry) = endpoints.get_mut(&EndpointKey::new(url, username)) else {
            warn!("Snapshot published for unknown endpoint");
            return false;
        };

        info!(
            hosts = snapshot.hosts.len(),
            vms = snapshot.vm_count(),
            datastores = snapshot.datastores().len(),
            events = snapshot.events().len(),
            "Published snapshot"
        );
        entry.snapshot = Some(Arc::new(snapshot));
        entry.state = EndpointState::Ready;
        metrics::counter!("vmon_snapshot_publish_total", "outcome" => "ready").increment(1);
        publish_endpoint_gauges(&endpoints);
        true
    }

    /// Record that the collector's latest attempt failed.
    ///
    /// The previous snapshot is kept for the collector; requests see the failure.
    #[instrument(skip(self, message), fields(url = %url, username = %username))]
    pub fn mark_failed(&self, url: &str, username: &str, message: Option<String>) -> bool {
        let mut endpoints = self.lock();
        let Some(entry) = endpoints.get_mut(&EndpointKey::new(url, username)) else {
            warn!("Failure reported for unknown endpoint");
            return false;
        };

        warn!(error = message.as_deref().unwrap_or("unknown"), "Endpoint refresh failed");
        entry.state = EndpointState::Failed(message);
        metrics::counter!("vmon_snapshot_publish_total", "outcome" => "failed").increment(1);
        publish_endpoint_gauges(&endpoints);
        true
    }

    /// Mutate an existing entry without registering it.
    pub fn with_entry_mut<R>(
        &self,
        url: &str,
        username: &str,
        f: impl FnOnce(&mut EndpointEntry) -> R,
    ) -> Option<R> {
        let mut endpoints = self.lock();
        endpoints.get_mut(&EndpointKey::new(url, username)).map(f)
    }

    /// Drop endpoints nobody requested since `cutoff`. Returns how many were removed.
    pub fn remove_idle(&self, cutoff: DateTime<Utc>) -> usize {
        let mut endpoints = self.lock();
        let before = endpoints.len();
        endpoints.retain(|key, entry| {
            let keep = entry.last_access >= cutoff;
            if !keep {
                info!(url = %key.url, username = %key.username, "Removed idle endpoint");
            }
            keep
        });
        let removed = before - endpoints.len();
        if removed > 0 {
            publish_endpoint_gauges(&endpoints);
        }
        removed
    }

    /// Known endpoints, sorted by key.
    pub fn endpoints(&self) -> Vec<EndpointSummary> {
        let endpoints = self.lock();
        let mut summaries: Vec<EndpointSummary> = endpoints
            .iter()
            .map(|(key, entry)| EndpointSummary {
                key: key.clone(),
                state: entry.state.clone(),
                collected_at: entry.snapshot.as_ref().map(|s| s.collected_at()),
                last_access: entry.last_access,
            })
            .collect();
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        summaries
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn publish_endpoint_gauges(endpoints: &HashMap<EndpointKey, EndpointEntry>) {
    let (mut pending, mut ready, mut failed) = (0usize, 0usize, 0usize);
    for entry in endpoints.values() {
        match entry.state {
            EndpointState::Pending => pending += 1,
            EndpointState::Ready => ready += 1,
            EndpointState::Failed(_) => failed += 1,
        }
    }
    metrics::gauge!("vmon_endpoints", "state" => "pending").set(pending as f64);
    metrics::gauge!("vmon_endpoints", "state" => "ready").set(ready as f64);
    metrics::gauge!("vmon_endpoints", "state" => "failed").set(failed as f64);
}
