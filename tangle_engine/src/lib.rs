//! The tangle engine.
//!
//! Algorithms over the symbol graph: version/dependency updates with
//! staleness propagation, static chain resolution, the precheck walker,
//! the cross-cell staleness linker, the cell-dependency slicer, and the
//! namespace/symbol collector. [`DependencyTracker`] is the facade the
//! execution layer and front end talk to.
//!
//! # Execution model
//!
//! Strictly sequential: one cell executes at a time, to completion, and
//! structural events arrive synchronously in program order. The engine
//! never blocks; the only lock in the system guards the pending-garbage
//! set shared with the host's expiry callbacks. Collection is deferred to
//! statement and cell boundaries.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collect;
pub mod config;
pub mod linker;
pub mod precheck;
pub mod propagate;
pub mod resolve;
pub mod slice;
pub mod store;
pub mod tracker;
pub mod upsert;

pub use config::{MutableFlags, TrackerConfig};
pub use linker::{BatchEntry, CellFreshness};
pub use precheck::PrecheckReport;
pub use propagate::DepUpdate;
pub use resolve::{CellResolution, ChainResolution, ResolvedRefs};
pub use tracker::{DependencyTracker, MutationRecord, PrecheckOutcome};
pub use upsert::UpsertFlags;
