//! Custom query table of one endpoint.

use super::criteria::QueryParam;
use crate::error::CheckError;
use crate::types::{EntityKind, MetricValue};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// What a custom query asks the collector to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustomQueryKind {
    /// Ports of a distributed switch matching port criteria.
    DvSwitchFetchPorts,
}

impl CustomQueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomQueryKind::DvSwitchFetchPorts => "dvswitch_fetch_ports",
        }
    }
}

/// How much of the query result the caller wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Only the state portion of each matching object.
    #[default]
    State,
    /// The complete objects.
    Full,
}

/// Parses an explicitly given mode. Callers map an absent mode to the default
/// themselves; an empty string is rejected.
impl FromStr for QueryMode {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "state" => Ok(QueryMode::State),
            "full" => Ok(QueryMode::Full),
            _ => Err(CheckError::InvalidParameter("fourth")),
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryMode::State => "state",
            QueryMode::Full => "full",
        })
    }
}

/// Identity of a custom query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomQueryKey {
    pub entity_kind: EntityKind,
    pub entity_id: String,
    /// Raw, unparsed query key as given by the caller.
    pub key: String,
    pub query_kind: CustomQueryKind,
    pub mode: QueryMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryState {
    Pending,
    Ready(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomQuery {
    pub state: QueryState,
    /// Set by the collector when it stops refreshing an unread query.
    pub paused: bool,
    pub last_access: DateTime<Utc>,
    pub params: Vec<QueryParam>,
}

/// Custom queries registered against one endpoint.
#[derive(Debug, Clone, Default)]
pub struct CustomQueryRegistry {
    queries: HashMap<CustomQueryKey, CustomQuery>,
}

impl CustomQueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the query's current result, registering it on first use.
    ///
    /// `params` is only evaluated when the query is not yet known, so an
    /// existing query is served without re-validating its key. Reading a
    /// pending or ready query clears the paused flag and refreshes the access
    /// timestamp; a failed query is left untouched so the collector can
    /// sweep it.
    pub fn get_or_register(
        &mut self,
        key: CustomQueryKey,
        params: impl FnOnce() -> Result<Vec<QueryParam>, CheckError>,
        now: DateTime<Utc>,
    ) -> Result<Option<MetricValue>, CheckError> {
        match self.queries.entry(key) {
            Entry::Occupied(mut entry) => {
                let query = entry.get_mut();
                if let QueryState::Failed(message) = &query.state {
                    return Err(CheckError::QueryFailed(message.clone()));
                }
                query.paused = false;
                query.last_access = now;
                match &query.state {
                    QueryState::Ready(value) => Ok(Some(MetricValue::Text(value.clone()))),
                    _ => Ok(None),
                }
            }
            Entry::Vacant(entry) => {
                let params = params()?;
                debug!(
                    kind = %entry.key().query_kind.as_str(),
                    entity_id = %entry.key().entity_id,
                    key = %entry.key().key,
                    "Registered custom query"
                );
                metrics::counter!(
                    "vmon_custom_query_registrations_total",
                    "kind" => entry.key().query_kind.as_str()
                )
                .increment(1);
                entry.insert(CustomQuery {
                    state: QueryState::Pending,
                    paused: false,
                    last_access: now,
                    params,
                });
                Ok(None)
            }
        }
    }

    /// Store the collector's result for a query. Returns `false` if the query is unknown.
    pub fn fulfil(&mut self, key: &CustomQueryKey, result: Result<String, String>) -> bool {
        match self.queries.get_mut(key) {
            Some(query) => {
                query.state = match result {
                    Ok(value) => QueryState::Ready(value),
                    Err(message) => QueryState::Failed(message),
                };
                true
            }
            None => false,
        }
    }

    /// Pause queries that were not read within `idle`.
    ///
    /// A paused query that is read again is resumed by [`Self::get_or_register`].
    pub fn pause_idle(&mut self, now: DateTime<Utc>, idle: Duration) -> usize {
        let mut paused = 0;
        for query in self.queries.values_mut() {
            if !query.paused && now - query.last_access > idle {
                query.paused = true;
                paused += 1;
            }
        }
        paused
    }

    /// Remove queries that stayed paused. Returns how many were removed.
    pub fn sweep_paused(&mut self) -> usize {
        let before = self.queries.len();
        self.queries.retain(|_, query| !query.paused);
        before - self.queries.len()
    }

    /// Pause every query.
    ///
    /// The collector calls this at the start of a cycle; queries read before
    /// the next [`Self::sweep_paused`] are resumed and survive it.
    pub fn pause_all(&mut self) {
        for query in self.queries.values_mut() {
            query.paused = true;
        }
    }

    /// Queries the collector should run this cycle.
    pub fn pending(&self) -> impl Iterator<Item = (&CustomQueryKey, &CustomQuery)> {
        self.queries.iter().filter(|(_, q)| !q.paused)
    }

    pub fn get(&self, key: &CustomQueryKey) -> Option<&CustomQuery> {
        self.queries.get(key)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
