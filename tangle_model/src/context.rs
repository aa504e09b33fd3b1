//! The process-scoped graph context.
//!
//! One `GraphContext` owns every registry the engine mutates: the symbol
//! and scope arenas, the alias table, the namespace registry, the execution
//! counter, and per-cell bookkeeping. It is passed explicitly into every
//! algorithm — the single-writer discipline is carried by `&mut` access,
//! not by locks.

use crate::alias::AliasTable;
use crate::arena::Arena;
use crate::scope::{ScopeId, ScopeTree};
use crate::symbol::{Symbol, SymbolId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tangle_core::{CellId, CellNum, MemberKey, ObjectId, PendingGarbage};

/// All mutable engine state.
pub struct GraphContext {
    /// The symbol arena.
    pub symbols: Arena<Symbol>,
    /// The scope tree.
    pub scopes: ScopeTree,
    /// Object identity → alias set.
    pub aliases: AliasTable,
    /// Object identity → namespace scope (the namespace registry).
    pub namespaces: FxHashMap<ObjectId, ScopeId>,
    /// Source text of every executed cell, by execution counter.
    pub cell_source_by_num: FxHashMap<CellNum, Arc<str>>,
    /// Last execution counter recorded per front-end cell id.
    pub counters_by_cell_id: FxHashMap<CellId, CellNum>,
    /// Identities whose objects expired, awaiting the collector.
    pub pending_garbage: PendingGarbage,
    /// Set when a unit was refused for stale inputs; cleared by the front
    /// end.
    pub stale_observed: bool,
    counter: CellNum,
}

impl Default for GraphContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphContext {
    /// Create a fresh context with its own pending-garbage set.
    pub fn new() -> Self {
        Self::with_pending(PendingGarbage::new())
    }

    /// Create a context sharing an existing pending-garbage set with the
    /// host.
    pub fn with_pending(pending: PendingGarbage) -> Self {
        GraphContext {
            symbols: Arena::new(),
            scopes: ScopeTree::new(),
            aliases: AliasTable::new(),
            namespaces: FxHashMap::default(),
            cell_source_by_num: FxHashMap::default(),
            counters_by_cell_id: FxHashMap::default(),
            pending_garbage: pending,
            stale_observed: false,
            counter: CellNum::FIRST,
        }
    }

    /// The execution counter: the number of the cell currently (or next)
    /// executing.
    #[inline]
    pub fn cell_counter(&self) -> CellNum {
        self.counter
    }

    /// Advance the counter past a finished cell.
    pub fn advance_counter(&mut self) {
        self.counter = self.counter.next();
    }

    /// Test-mode counter reset: atomically clears every symbol's version
    /// fields and history maps, then rewinds the counter.
    pub fn reset_counter(&mut self) {
        for id in self.symbols.ids() {
            if let Some(sym) = self.symbols.get_mut(id) {
                sym.clear_versions();
            }
        }
        self.cell_source_by_num.clear();
        self.counters_by_cell_id.clear();
        self.counter = CellNum::FIRST;
    }

    /// The global scope.
    #[inline]
    pub fn global_scope(&self) -> ScopeId {
        self.scopes.global()
    }

    /// Borrow a symbol.
    #[inline]
    pub fn sym(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    /// Mutably borrow a symbol.
    #[inline]
    pub fn sym_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id)
    }

    /// Register a namespace scope under its object identity.
    pub fn register_namespace(&mut self, obj: ObjectId, scope: ScopeId) {
        self.namespaces.insert(obj, scope);
    }

    /// The namespace scope mirroring `obj`, if one exists. Lookup only —
    /// never creates.
    #[inline]
    pub fn namespace_for(&self, obj: ObjectId) -> Option<ScopeId> {
        self.namespaces.get(&obj).copied()
    }

    /// The first non-anonymous symbol aliasing `obj`, for rendering paths.
    pub fn first_full_symbol(&self, obj: ObjectId) -> Option<SymbolId> {
        self.aliases
            .of(obj)
            .find(|id| self.symbols.get(*id).map(|s| !s.is_anonymous()).unwrap_or(false))
    }

    /// Names currently bound in the global scope, for the precheck walker.
    pub fn known_global_names(&self) -> FxHashSet<Arc<str>> {
        match self.scopes.get(self.global_scope()) {
            Some(data) => data.fields().map(|(name, _)| name.clone()).collect(),
            None => FxHashSet::default(),
        }
    }

    /// Max defined-cell a symbol answers for freshness checks: its own
    /// version, or its namespace's watermark when members moved later.
    pub fn effective_defined_cell(&self, id: SymbolId) -> CellNum {
        let Some(sym) = self.symbols.get(id) else {
            return CellNum::ZERO;
        };
        let mut max = sym.defined_cell;
        if let Some(ns_scope) = self.namespace_for(sym.obj) {
            if let Some(ns) = self.scopes.get(ns_scope).and_then(|s| s.ns.as_ref()) {
                if ns.max_defined_cell > max {
                    max = ns.max_defined_cell;
                }
            }
        }
        max
    }

    /// Human-readable dotted/indexed path for a symbol, for refusal
    /// warnings.
    pub fn readable_name(&self, sym: SymbolId) -> String {
        let mut seen = FxHashSet::default();
        seen.insert(sym);
        self.readable_name_inner(sym, &mut seen)
    }

    fn readable_name_inner(&self, sym: SymbolId, seen: &mut FxHashSet<SymbolId>) -> String {
        let Some(s) = self.symbols.get(sym) else {
            return "<collected>".to_string();
        };
        let prefix = match self.scopes.get(s.scope) {
            Some(data) if data.is_namespace() && !data.is_global() => {
                let obj = data.ns.as_ref().map(|ns| ns.object_id);
                let container = obj.and_then(|o| self.first_full_symbol(o));
                match container {
                    Some(container) if seen.insert(container) => {
                        Some(self.readable_name_inner(container, seen))
                    }
                    _ => Some(data.name.to_string()),
                }
            }
            _ => None,
        };
        match (&s.key, prefix) {
            (MemberKey::Field(name), Some(p)) => format!("{}.{}", p, name),
            (MemberKey::Field(name), None) => name.to_string(),
            (MemberKey::Index(key), Some(p)) => format!("{}[{}]", p, key),
            (MemberKey::Index(key), None) => format!("[{}]", key),
        }
    }
}
