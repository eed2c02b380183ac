//! vmon core library
//!
//! Query layer of a virtualization monitoring collector. A background
//! collector publishes inventory snapshots per endpoint into a
//! [`SnapshotStore`]; request workers answer metric checks against them
//! through a [`MetricResolver`], registering the performance counters and
//! custom queries the collector should fetch next.

pub mod config;
pub mod counters;
pub mod error;
pub mod index;
pub mod observability;
pub mod paths;
pub mod queries;
pub mod resolver;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use config::Config;
pub use counters::{CounterCatalog, CounterRegistry, PerfSample, Scaling, Unit};
pub use error::{CheckError, ErrorKind, Result, VmonError};
pub use observability::{health::HealthChecker, init as init_observability};
pub use queries::{CustomQueryKey, CustomQueryRegistry, QueryMode, QueryState};
pub use resolver::{Endpoint, LogEvent, MetricResolver};
pub use store::{EndpointState, SnapshotStore};
pub use types::{CheckResult, EntityKind, MetricValue, PlatformKind, Snapshot};
