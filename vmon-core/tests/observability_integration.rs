//! Integration tests for observability infrastructure.
//!
//! These tests validate that tracing, metrics, and health checks work
//! end-to-end against a real snapshot store.
//!
//! # Running Tests
//!
//! Run all observability tests:
//! ```bash
//! cargo test --test observability_integration
//! ```
//!
//! Run with output to see tracing logs:
//! ```bash
//! cargo test --test observability_integration -- --nocapture
//! ```
//!
//! # Setup Requirements
//!
//! These tests do NOT require external services. No Prometheus listener is
//! started; the metrics macros are no-ops without an installed recorder.

mod common;

use common::*;
use std::sync::Arc;
use tempfile::TempDir;
use vmon_core::observability::health::HealthStatus;
use vmon_core::{init_observability, Config, HealthChecker, MetricResolver, SnapshotStore, VmonError};

/// Health follows the lifecycle of an endpoint.
///
/// Validates:
/// - A requested endpoint is degraded until its first snapshot
/// - Publishing makes it healthy and ready
/// - A failed refresh makes it unhealthy with the collector's message
#[test]
fn test_health_tracks_endpoint_lifecycle() {
    let store = Arc::new(SnapshotStore::new());
    let resolver = MetricResolver::new(store.clone());
    let checker = HealthChecker::new(store.clone());

    assert_eq!(checker.get_health().status, HealthStatus::Healthy);

    resolver.version(&endpoint()).unwrap();
    let health = checker.get_health();
    assert_eq!(health.status, HealthStatus::Degraded);
    assert_eq!(health.subsystems[0].name, format!("{}@{}", USER, URL));
    assert!(!checker.is_ready());

    store.publish(URL, USER, vcenter_snapshot());
    assert_eq!(checker.get_health().status, HealthStatus::Healthy);
    assert!(checker.is_ready());

    store.mark_failed(URL, USER, Some("Connection timed out".into()));
    let health = checker.get_health();
    assert_eq!(health.status, HealthStatus::Unhealthy);
    assert_eq!(health.subsystems[0].message.as_deref(), Some("Connection timed out"));
    assert!(checker.is_alive());
}

/// The configured instance glob is handed to the collector with each counter.
#[test]
fn test_config_glob_reaches_registrations() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"perf_instance_glob": "vmhba*"}"#).unwrap();
    let config = Config::load_from(&path).unwrap();

    let store = Arc::new(SnapshotStore::new());
    store.with_endpoint(URL, USER, PASSWORD, |_| ());
    store.publish(URL, USER, vcenter_snapshot());
    let resolver = MetricResolver::with_config(store.clone(), &config);

    resolver.hv_power(&endpoint(), "hv-1", None).unwrap();
    let pending = store.with_entry_mut(URL, USER, |e| e.counters.pending()).unwrap();
    assert_eq!(pending[0].instance_glob, "vmhba*");
}

/// Observability installs the global subscriber exactly once.
#[test]
fn test_init_observability_once() {
    let config = Config { log_level: "vmon_core=debug".to_string(), ..Config::default() };

    init_observability(&config).unwrap();
    tracing::info!(component = "test", "Observability initialized for tests");

    let resolver = ready_resolver(vcenter_snapshot());
    assert!(resolver.hv_status(&endpoint(), "hv-1").is_ok());

    let err = init_observability(&config).unwrap_err();
    assert!(matches!(err, VmonError::Observability { .. }));
}
