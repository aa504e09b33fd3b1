//! Reference host runtime for the tangle engine.
//!
//! The engine tracks dependencies for objects it does not own; the real
//! objects live in whatever runtime is executing the cells. This crate is
//! an in-memory implementation of that boundary — a mirror object graph
//! with attribute-bearing, key-indexed, and position-indexed objects plus
//! the liveness side channel — used by embedders that need a standalone
//! runtime and by the engine's own tests.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod heap;
pub mod object;

pub use heap::MirrorHeap;
pub use object::{ObjectRecord, ObjectStore};
