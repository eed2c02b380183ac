//! Integration tests for concurrent request workers sharing one store.
//!
//! Every check runs under the store lock, so duplicate registrations from
//! parallel workers must collapse into a single entry.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test concurrency
//! ```

mod common;

use common::*;
use std::thread;
use vmon_core::{EntityKind, MetricValue};

const WORKERS: usize = 8;

#[test]
fn test_parallel_counter_registration_collapses() {
    let resolver = ready_resolver(vcenter_snapshot());

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let resolver = resolver.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    assert_eq!(resolver.hv_cpu_usage_perf(&endpoint(), "hv-1"), Ok(None));
                    assert_eq!(resolver.hv_power(&endpoint(), "hv-1", None), Ok(None));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let pending = resolver.store().with_entry_mut(URL, USER, |e| e.counters.pending()).unwrap();
    let ids: Vec<u64> = pending.iter().map(|p| p.counter_id).collect();
    assert_eq!(ids, vec![CPU_USAGE, POWER]);
}

#[test]
fn test_parallel_query_registration_collapses() {
    let resolver = ready_resolver(vcenter_snapshot());

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let resolver = resolver.clone();
            thread::spawn(move || {
                resolver.dvswitch_fetchports(&endpoint(), "50 2a 1b", Some("active:true"), None)
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ok(None));
    }

    let queries = resolver.store().with_entry_mut(URL, USER, |e| e.queries.len()).unwrap();
    assert_eq!(queries, 1);
}

#[test]
fn test_readers_see_collector_updates() {
    let resolver = ready_resolver(vcenter_snapshot());
    resolver.hv_power(&endpoint(), "hv-1", None).unwrap();

    let collector = {
        let resolver = resolver.clone();
        thread::spawn(move || {
            for value in 1..=100u64 {
                collect(&resolver, EntityKind::HostSystem, "host-10", POWER, vec![sample("", value)]);
            }
        })
    };

    let readers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let resolver = resolver.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    match resolver.hv_power(&endpoint(), "hv-1", None) {
                        Ok(None) => {}
                        Ok(Some(MetricValue::Uint(v))) => assert!((1..=100).contains(&v)),
                        other => panic!("unexpected result {other:?}"),
                    }
                }
            })
        })
        .collect();

    collector.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(resolver.hv_power(&endpoint(), "hv-1", None), Ok(Some(MetricValue::Uint(100))));
}

#[test]
fn test_endpoints_are_isolated() {
    let resolver = ready_resolver(vcenter_snapshot());
    let other = vmon_core::Endpoint::new(URL, "auditor", PASSWORD);

    assert_eq!(resolver.hv_power(&endpoint(), "hv-1", None), Ok(None));
    assert_eq!(resolver.hv_power(&other, "hv-1", None), Ok(None));

    let other_counters =
        resolver.store().with_entry_mut(URL, "auditor", |e| e.counters.is_empty()).unwrap();
    assert!(other_counters, "a pending endpoint registers nothing");
    assert_eq!(resolver.store().len(), 2);
}
