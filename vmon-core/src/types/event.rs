//! Endpoint events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One event from the endpoint's event log.
///
/// Keys grow monotonically on the endpoint, so they double as delivery cursors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub key: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl Event {
    pub fn new(key: u64, timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self { key, timestamp, message: message.into() }
    }
}
