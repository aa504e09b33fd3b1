//! The tangle data model.
//!
//! Everything the engine mutates lives here: the versioned symbol graph, the
//! scope tree with its namespace scopes, the alias table mapping object
//! identities to the symbols bound to them, and the [`GraphContext`] that
//! owns all of it.
//!
//! # Ownership
//!
//! Symbols and scopes are arena-allocated and addressed by typed ids.
//! Dependency edges between symbols are plain id sets — parents own no
//! lifetime guarantee over children, and a dangling id after collection
//! simply resolves to nothing. The context is an explicit value passed into
//! every algorithm; there is no ambient global state.
//!
//! # Write discipline
//!
//! Exactly one unit executes at a time and all mutation goes through the
//! thread running it. The only state shared with other call stacks is the
//! pending-garbage set (see `tangle_core::host::PendingGarbage`), which the
//! host may mark from expiry callbacks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alias;
pub mod arena;
pub mod context;
pub mod scope;
pub mod symbol;

pub use alias::AliasTable;
pub use arena::{Arena, Id};
pub use context::GraphContext;
pub use scope::{NamespaceData, ScopeData, ScopeId, ScopeTree};
pub use symbol::{FunctionData, KindHints, Symbol, SymbolId, SymbolKind};

/// `IndexMap` keyed with the same fast hasher the rest of the workspace
/// uses.
pub type FxIndexMap<K, V> =
    indexmap::IndexMap<K, V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
