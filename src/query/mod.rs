#![forbid(unsafe_code)]

//! Query engine: fetch-spec compilation, execution and result materialization.
//!
//! A query flows through three stages. [`compile`] validates a fetch spec
//! and registers the physical columns it needs in a [`FetchInfo`];
//! [`Executor::execute`] asks the store for those columns over a collection;
//! [`Materializer`] folds the raw rows into the requested [`Value`] shape.

/// Aggregate accumulators.
mod aggregate;

/// Fetch-spec compiler.
pub mod compile;

/// Query execution against a store state.
pub mod executor;

/// Per-query physical column registry.
pub mod fetch_info;

/// Result-tree construction.
pub mod materialize;

/// Per-phase timing counters.
pub mod profile;

/// Compiled fetch specification types.
pub mod spec;

/// Output value tree.
pub mod value;

pub use compile::compile;
pub use executor::Executor;
pub use fetch_info::{FetchInfo, NodeId, ID_COLUMN};
pub use materialize::Materializer;
pub use profile::{query_profile_snapshot, QueryProfileSnapshot};
pub use spec::{Aggregate, ClusterBy, CompiledSpec, GetField};
pub use value::{Dict, Value};
