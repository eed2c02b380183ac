//! Performance counters: catalog resolution, registration and value reads.

pub mod catalog;
pub mod registry;
pub mod scale;

pub use catalog::{CounterCatalog, CounterInfo, CounterPath, Unit};
pub use registry::{
    CounterRegistry, PendingCounter, PerfCounter, PerfEntity, PerfEntityKey, PerfSample,
    Registration,
};
pub use scale::{Scaling, KIBIBYTE, MEBIBYTE, TEBIBYTE};
