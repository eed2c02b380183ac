//! Counter catalog: path strings to numeric ids and units.

use crate::error::CheckError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Counter path format: `<group>/<key>[<rollup>]`, e.g. `cpu/usage[average]`.
static COUNTER_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)\[([A-Za-z]+)\]$")
        .expect("Invalid counter path regex")
});

/// A parsed counter path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterPath {
    pub group: String,
    pub key: String,
    pub rollup: String,
}

impl CounterPath {
    pub fn parse(path: &str) -> Option<Self> {
        let caps = COUNTER_PATH_REGEX.captures(path)?;
        Some(Self { group: caps[1].to_string(), key: caps[2].to_string(), rollup: caps[3].to_string() })
    }
}

impl fmt::Display for CounterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}[{}]", self.group, self.key, self.rollup)
    }
}

/// Semantic unit of a counter, as declared by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Unit {
    Joule,
    #[serde(rename = "kiloBytes")]
    Kilobyte,
    #[serde(rename = "kiloBytesPerSecond")]
    KilobytesPerSecond,
    #[serde(rename = "megaBytes")]
    Megabyte,
    #[serde(rename = "megaBytesPerSecond")]
    MegabytesPerSecond,
    #[serde(rename = "megaHertz")]
    Megahertz,
    Microsecond,
    Millisecond,
    Number,
    Percent,
    Second,
    #[serde(rename = "teraBytes")]
    Terabyte,
    Watt,
    Celsius,
    /// A unit key this crate does not know how to scale.
    #[serde(other)]
    Unknown,
}

impl FromStr for Unit {
    type Err = std::convert::Infallible;

    /// Parse the endpoint's unit key; unrecognised keys map to [`Unit::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "joule" => Unit::Joule,
            "kiloBytes" => Unit::Kilobyte,
            "kiloBytesPerSecond" => Unit::KilobytesPerSecond,
            "megaBytes" => Unit::Megabyte,
            "megaBytesPerSecond" => Unit::MegabytesPerSecond,
            "megaHertz" => Unit::Megahertz,
            "microsecond" => Unit::Microsecond,
            "millisecond" => Unit::Millisecond,
            "number" => Unit::Number,
            "percent" => Unit::Percent,
            "second" => Unit::Second,
            "teraBytes" => Unit::Terabyte,
            "watt" => Unit::Watt,
            "celsius" => Unit::Celsius,
            _ => Unit::Unknown,
        })
    }
}

/// Catalog entry for one counter path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterInfo {
    pub id: u64,
    pub unit: Unit,
}

/// The endpoint's counter catalog, maintained by the collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterCatalog {
    by_path: HashMap<String, CounterInfo>,
}

impl CounterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, id: u64, unit: Unit) {
        self.by_path.insert(path.into(), CounterInfo { id, unit });
    }

    /// Resolve a counter path to its id and unit.
    ///
    /// Malformed and unknown paths fail alike: either way the counter cannot
    /// be collected from this endpoint.
    pub fn resolve(&self, path: &str) -> Result<CounterInfo, CheckError> {
        if CounterPath::parse(path).is_none() {
            return Err(CheckError::CounterUnavailable);
        }
        self.by_path.get(path).copied().ok_or(CheckError::CounterUnavailable)
    }

    /// Reverse lookup, used when reporting pending counters to the collector.
    pub fn path_of(&self, id: u64) -> Option<&str> {
        self.by_path.iter().find(|(_, info)| info.id == id).map(|(path, _)| path.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counter_path() {
        let path = CounterPath::parse("datastore/totalReadLatency[average]").unwrap();
        assert_eq!(path.group, "datastore");
        assert_eq!(path.key, "totalReadLatency");
        assert_eq!(path.rollup, "average");
        assert_eq!(path.to_string(), "datastore/totalReadLatency[average]");

        assert!(CounterPath::parse("cpu/usage").is_none());
        assert!(CounterPath::parse("cpu[average]").is_none());
        assert!(CounterPath::parse("/usage[average]").is_none());
        assert!(CounterPath::parse("cpu/usage[average] ").is_none());
    }

    #[test]
    fn test_resolve() {
        let mut catalog = CounterCatalog::new();
        catalog.insert("cpu/usage[average]", 2, Unit::Percent);

        assert_eq!(catalog.resolve("cpu/usage[average]"), Ok(CounterInfo { id: 2, unit: Unit::Percent }));
        assert_eq!(catalog.resolve("cpu/usage[maximum]"), Err(CheckError::CounterUnavailable));
        assert_eq!(catalog.resolve("garbage"), Err(CheckError::CounterUnavailable));
        assert_eq!(catalog.path_of(2), Some("cpu/usage[average]"));
    }

    #[test]
    fn test_unit_keys() {
        assert_eq!("kiloBytesPerSecond".parse::<Unit>(), Ok(Unit::KilobytesPerSecond));
        assert_eq!("teraBytes".parse::<Unit>(), Ok(Unit::Terabyte));
        assert_eq!("furlongs".parse::<Unit>(), Ok(Unit::Unknown));

        let unit: Unit = serde_json::from_str("\"megaHertz\"").unwrap();
        assert_eq!(unit, Unit::Megahertz);
        let unit: Unit = serde_json::from_str("\"furlongs\"").unwrap();
        assert_eq!(unit, Unit::Unknown);
    }
}
