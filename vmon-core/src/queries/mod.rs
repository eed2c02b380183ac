//! Custom queries: parameterized requests with their own lifecycle.
//!
//! A custom query follows the same lazy-registration pattern as performance
//! counters, but carries validated parameters and can be paused by the
//! collector when nobody reads it.

pub mod criteria;
pub mod registry;

pub use criteria::{parse_params, validate_port_criteria, QueryParam};
pub use registry::{
    CustomQuery, CustomQueryKey, CustomQueryKind, CustomQueryRegistry, QueryMode, QueryState,
};
