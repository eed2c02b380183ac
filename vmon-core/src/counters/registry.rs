//! Per-entity performance counter tables.
//!
//! A table records *interest* in counters for one (entity kind, entity id)
//! pair. Requests register counters here; the collector fills in samples on
//! its next cycle. Tables outlive snapshots and are only dropped by
//! [`CounterRegistry::purge_idle`].

use super::catalog::Unit;
use super::scale::Scaling;
use crate::error::CheckError;
use crate::index::{SortKey, SortedVec};
use crate::types::{CheckResult, EntityKind};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifies the entity a counter table belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PerfEntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl PerfEntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// One sampled value of a counter instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfSample {
    /// Instance name; empty for the aggregate instance.
    pub instance: String,
    /// `None` when the endpoint produced no sample this period.
    pub value: Option<u64>,
}

impl PerfSample {
    pub fn new(instance: impl Into<String>, value: Option<u64>) -> Self {
        Self { instance: instance.into(), value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfCounter {
    pub counter_id: u64,
    /// Instance filter the collector should query with.
    pub instance_glob: String,
    /// Set once the collector has queried this counter at least once.
    pub ready: bool,
    pub samples: Vec<PerfSample>,
}

impl PerfCounter {
    fn pending(counter_id: u64, instance_glob: &str) -> Self {
        Self { counter_id, instance_glob: instance_glob.to_string(), ready: false, samples: Vec::new() }
    }
}

impl SortKey for PerfCounter {
    type Key = u64;

    fn sort_key(&self) -> &u64 {
        &self.counter_id
    }
}

/// Counter table of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfEntity {
    pub counters: SortedVec<PerfCounter>,
    /// Error recorded by the collector's last refresh of this entity.
    pub error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub last_access: DateTime<Utc>,
}

impl PerfEntity {
    fn new(now: DateTime<Utc>) -> Self {
        Self { counters: SortedVec::new(), error: None, refreshed_at: None, last_access: now }
    }
}

/// Result of [`CounterRegistry::ensure_registered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    AlreadyRegistered,
    NewlyRegistered,
}

/// A registered counter the collector still has to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCounter {
    pub entity: PerfEntityKey,
    pub counter_id: u64,
    pub instance_glob: String,
}

/// All counter tables of one endpoint.
#[derive(Debug, Clone, Default)]
pub struct CounterRegistry {
    entities: std::collections::HashMap<PerfEntityKey, PerfEntity>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `counter_id` for an entity.
    ///
    /// Idempotent: a second call with the same entity and counter finds the
    /// existing entry and changes nothing.
    pub fn ensure_registered(
        &mut self,
        kind: EntityKind,
        id: &str,
        counter_id: u64,
        instance_glob: &str,
    ) -> Registration {
        let now = Utc::now();
        let entity = self
            .entities
            .entry(PerfEntityKey::new(kind, id))
            .or_insert_with(|| PerfEntity::new(now));
        entity.last_access = now;

        let (_, inserted) = entity
            .counters
            .get_or_insert_with(&counter_id, || PerfCounter::pending(counter_id, instance_glob));

        if inserted {
            debug!(kind = %kind, entity_id = %id, counter_id, "Registered performance counter");
            metrics::counter!("vmon_counter_registrations_total", "kind" => kind.as_str())
                .increment(1);
            Registration::NewlyRegistered
        } else {
            Registration::AlreadyRegistered
        }
    }

    /// Read the scaled value of one counter instance.
    ///
    /// `Ok(None)` means the value is not collected yet; that state is expected
    /// right after registration and must not be reported as a failure.
    pub fn read_value(
        &mut self,
        kind: EntityKind,
        id: &str,
        counter_id: u64,
        instance: &str,
        scaling: Scaling,
        unit: Unit,
    ) -> CheckResult {
        let key = PerfEntityKey::new(kind, id);
        let Some(entity) = self.entities.get_mut(&key) else {
            return Ok(None);
        };
        entity.last_access = Utc::now();

        if let Some(error) = &entity.error {
            return Err(CheckError::EntityRefresh(error.clone()));
        }

        let counter = entity.counters.find(&counter_id).ok_or(CheckError::CounterDataNotFound)?;
        if !counter.ready {
            return Ok(None);
        }
        if counter.samples.is_empty() {
            return Err(CheckError::CounterDataUnavailable);
        }

        let sample = counter
            .samples
            .iter()
            .find(|s| s.instance == instance)
            .ok_or(CheckError::CounterInstanceNotFound)?;

        match sample.value {
            None => Ok(None),
            Some(raw) => scaling.apply(raw, unit, counter_id).map(Some),
        }
    }

    /// Store the samples the collector gathered for a counter.
    ///
    /// Marks the counter ready and clears any entity error. Samples for
    /// counters nobody registered are dropped.
    pub fn record_samples(
        &mut self,
        kind: EntityKind,
        id: &str,
        counter_id: u64,
        samples: Vec<PerfSample>,
    ) -> bool {
        let Some(entity) = self.entities.get_mut(&PerfEntityKey::new(kind, id)) else {
            return false;
        };
        let Some(counter) = entity.counters.find_mut(&counter_id) else {
            return false;
        };
        counter.ready = true;
        counter.samples = samples;
        entity.error = None;
        entity.refreshed_at = Some(Utc::now());
        true
    }

    /// Record that the collector failed to refresh an entity.
    pub fn record_entity_error(&mut self, kind: EntityKind, id: &str, message: impl Into<String>) {
        if let Some(entity) = self.entities.get_mut(&PerfEntityKey::new(kind, id)) {
            entity.error = Some(message.into());
            entity.refreshed_at = Some(Utc::now());
        }
    }

    /// Counters that have never been collected.
    pub fn pending(&self) -> Vec<PendingCounter> {
        let mut pending: Vec<PendingCounter> = self
            .entities
            .iter()
            .flat_map(|(key, entity)| {
                entity.counters.iter().filter(|c| !c.ready).map(move |c| PendingCounter {
                    entity: key.clone(),
                    counter_id: c.counter_id,
                    instance_glob: c.instance_glob.clone(),
                })
            })
            .collect();
        pending.sort_by(|a, b| a.entity.cmp(&b.entity).then(a.counter_id.cmp(&b.counter_id)));
        pending
    }

    /// Drop tables nobody read within `idle`. Returns how many were dropped.
    pub fn purge_idle(&mut self, now: DateTime<Utc>, idle: Duration) -> usize {
        let before = self.entities.len();
        self.entities.retain(|_, entity| now - entity.last_access <= idle);
        before - self.entities.len()
    }

    pub fn entity(&self, kind: EntityKind, id: &str) -> Option<&PerfEntity> {
        self.entities.get(&PerfEntityKey::new(kind, id))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::scale::KIBIBYTE;
    use crate::types::MetricValue;

    const HOST: EntityKind = EntityKind::HostSystem;

    fn read(registry: &mut CounterRegistry, instance: &str, unit: Unit) -> CheckResult {
        registry.read_value(HOST, "host-1", 7, instance, Scaling::ByUnit, unit)
    }

    #[test]
    fn test_ensure_registered_is_idempotent() {
        let mut registry = CounterRegistry::new();

        assert_eq!(registry.ensure_registered(HOST, "host-1", 7, "*"), Registration::NewlyRegistered);
        assert_eq!(registry.ensure_registered(HOST, "host-1", 7, "*"), Registration::AlreadyRegistered);
        assert_eq!(registry.entity(HOST, "host-1").unwrap().counters.len(), 1);
        assert_eq!(registry.pending().len(), 1);
    }

    #[test]
    fn test_registrations_stay_sorted() {
        let mut registry = CounterRegistry::new();
        for id in [9, 3, 12, 1, 3, 7] {
            registry.ensure_registered(HOST, "host-1", id, "*");
            assert!(registry.entity(HOST, "host-1").unwrap().counters.is_sorted());
        }
        assert_eq!(registry.entity(HOST, "host-1").unwrap().counters.len(), 5);
    }

    #[test]
    fn test_read_unknown_entity_is_empty() {
        let mut registry = CounterRegistry::new();
        assert_eq!(read(&mut registry, "", Unit::Number), Ok(None));
    }

    #[test]
    fn test_read_freshly_registered_is_empty() {
        let mut registry = CounterRegistry::new();
        registry.ensure_registered(HOST, "host-1", 7, "*");
        assert_eq!(read(&mut registry, "", Unit::Kilobyte), Ok(None));
    }

    #[test]
    fn test_read_entity_error_surfaces_message() {
        let mut registry = CounterRegistry::new();
        registry.ensure_registered(HOST, "host-1", 7, "*");
        registry.record_entity_error(HOST, "host-1", "Object was deleted");

        assert_eq!(
            read(&mut registry, "", Unit::Number),
            Err(CheckError::EntityRefresh("Object was deleted".into()))
        );
    }

    #[test]
    fn test_read_failure_ladder() {
        let mut registry = CounterRegistry::new();
        registry.ensure_registered(HOST, "host-1", 7, "*");

        assert_eq!(
            registry.read_value(HOST, "host-1", 8, "", Scaling::ByUnit, Unit::Number),
            Err(CheckError::CounterDataNotFound)
        );

        registry.record_samples(HOST, "host-1", 7, Vec::new());
        assert_eq!(read(&mut registry, "", Unit::Number), Err(CheckError::CounterDataUnavailable));

        registry.record_samples(HOST, "host-1", 7, vec![PerfSample::new("vmnic0", Some(1))]);
        assert_eq!(read(&mut registry, "vmnic1", Unit::Number), Err(CheckError::CounterInstanceNotFound));
        assert_eq!(read(&mut registry, "vmnic0", Unit::Number), Ok(Some(MetricValue::Uint(1))));
    }

    #[test]
    fn test_missing_sample_is_empty_for_any_scaling() {
        let mut registry = CounterRegistry::new();
        registry.ensure_registered(HOST, "host-1", 7, "*");
        registry.record_samples(HOST, "host-1", 7, vec![PerfSample::new("", None)]);

        for unit in [Unit::Kilobyte, Unit::Percent, Unit::Unknown] {
            assert_eq!(read(&mut registry, "", unit), Ok(None));
        }
        assert_eq!(
            registry.read_value(HOST, "host-1", 7, "", Scaling::Coefficient(KIBIBYTE), Unit::Number),
            Ok(None)
        );
    }

    #[test]
    fn test_read_scales_by_unit() {
        let mut registry = CounterRegistry::new();
        registry.ensure_registered(HOST, "host-1", 7, "*");
        registry.record_samples(HOST, "host-1", 7, vec![PerfSample::new("", Some(4200))]);

        assert_eq!(read(&mut registry, "", Unit::Percent), Ok(Some(MetricValue::Float(42.0))));
        assert_eq!(
            read(&mut registry, "", Unit::Unknown),
            Err(CheckError::UnknownUnit(7))
        );
    }

    #[test]
    fn test_samples_for_unregistered_counter_are_dropped() {
        let mut registry = CounterRegistry::new();
        assert!(!registry.record_samples(HOST, "host-1", 7, vec![PerfSample::new("", Some(1))]));
        registry.ensure_registered(HOST, "host-1", 7, "*");
        assert!(!registry.record_samples(HOST, "host-1", 8, vec![PerfSample::new("", Some(1))]));
    }

    #[test]
    fn test_purge_idle() {
        let mut registry = CounterRegistry::new();
        registry.ensure_registered(HOST, "host-1", 7, "*");
        registry.ensure_registered(EntityKind::VirtualMachine, "vm-1", 7, "*");

        let now = Utc::now();
        assert_eq!(registry.purge_idle(now, Duration::hours(1)), 0);
        assert_eq!(registry.purge_idle(now + Duration::hours(2), Duration::hours(1)), 2);
        assert!(registry.is_empty());
    }
}
