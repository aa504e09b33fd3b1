//! The alias table: object identity → symbols currently bound to it.
//!
//! Several names may point at one object; the table is how a mutation of
//! the object reaches every name. Invariant: a symbol appears in exactly
//! one identity's alias set at a time, and rebinding moves it between sets
//! atomically.

use crate::symbol::SymbolId;
use rustc_hash::{FxHashMap, FxHashSet};
use tangle_core::ObjectId;

/// Object identity → alias set.
#[derive(Debug, Default)]
pub struct AliasTable {
    sets: FxHashMap<ObjectId, FxHashSet<SymbolId>>,
}

impl AliasTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sym` as an alias of `obj`.
    pub fn add(&mut self, obj: ObjectId, sym: SymbolId) {
        self.sets.entry(obj).or_default().insert(sym);
    }

    /// Remove `sym` from `obj`'s alias set, dropping the set when it
    /// empties.
    pub fn discard(&mut self, obj: ObjectId, sym: SymbolId) {
        if let Some(set) = self.sets.get_mut(&obj) {
            set.remove(&sym);
            if set.is_empty() {
                self.sets.remove(&obj);
            }
        }
    }

    /// Atomically re-point `sym` from `old` to `new`.
    pub fn rebind(&mut self, sym: SymbolId, old: ObjectId, new: ObjectId) {
        if old == new {
            return;
        }
        self.discard(old, sym);
        self.add(new, sym);
    }

    /// The alias set of an identity.
    pub fn of(&self, obj: ObjectId) -> impl Iterator<Item = SymbolId> + '_ {
        self.sets.get(&obj).into_iter().flatten().copied()
    }

    /// Whether `sym` is currently an alias of `obj`.
    pub fn contains(&self, obj: ObjectId, sym: SymbolId) -> bool {
        self.sets.get(&obj).map(|s| s.contains(&sym)).unwrap_or(false)
    }

    /// Whether any symbol aliases `obj`.
    pub fn is_aliased(&self, obj: ObjectId) -> bool {
        self.sets.contains_key(&obj)
    }
}
