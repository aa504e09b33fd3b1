//! Versioned symbols: one per logical binding of a name or container
//! element to a runtime value.

use crate::arena::Id;
use crate::scope::ScopeId;
use rustc_hash::{FxHashMap, FxHashSet};
use tangle_ast::RefChain;
use tangle_core::{CellNum, MemberKey, ObjectId, TangleError, TangleResult};

/// Id of a symbol in the context's symbol arena.
pub type SymbolId = Id<Symbol>;

/// The kind of a symbol. Fixed at creation: an overwrite with a different
/// kind creates a fresh symbol depending on the old one instead of mutating
/// in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Ordinary named binding.
    Default,
    /// Container element addressed by subscript.
    Subscript,
    /// Function definition. Carries a call scope and body references.
    Function,
    /// Class definition. Bound to the class's namespace scope.
    Class,
    /// Imported binding.
    Import,
    /// Unnamed binding (literal namespaces before they acquire a name).
    Anonymous,
}

/// Kind hints supplied by the execution layer when upserting.
///
/// At most one of `is_function_def` / `is_import` / `class_scope` may be
/// set; violating this is a boundary contract violation.
#[derive(Debug, Clone, Default)]
pub struct KindHints {
    /// The target is a subscript element.
    pub is_subscript: bool,
    /// The statement is a function definition.
    pub is_function_def: bool,
    /// The statement is an import.
    pub is_import: bool,
    /// The binding is anonymous.
    pub is_anonymous: bool,
    /// The namespace scope of the class body, for class definitions.
    pub class_scope: Option<ScopeId>,
}

impl SymbolKind {
    /// Resolve the target kind from hints, with the fixed precedence
    /// function-def > import > class > subscript > anonymous > default.
    pub fn resolve(hints: &KindHints) -> TangleResult<SymbolKind> {
        let def_like =
            hints.is_function_def as u8 + hints.is_import as u8 + hints.class_scope.is_some() as u8;
        if def_like > 1 {
            debug_assert!(false, "conflicting kind hints: {:?}", hints);
            return Err(TangleError::Contract(
                "at most one of function-def/import/class may be hinted",
            ));
        }
        if (hints.is_function_def || hints.is_import || hints.class_scope.is_some())
            && hints.is_subscript
        {
            debug_assert!(false, "definition kinds cannot be subscripts: {:?}", hints);
            return Err(TangleError::Contract(
                "definition kinds cannot target subscripts",
            ));
        }
        Ok(if hints.is_function_def {
            SymbolKind::Function
        } else if hints.is_import {
            SymbolKind::Import
        } else if hints.class_scope.is_some() {
            SymbolKind::Class
        } else if hints.is_subscript {
            SymbolKind::Subscript
        } else if hints.is_anonymous {
            SymbolKind::Anonymous
        } else {
            SymbolKind::Default
        })
    }
}

/// Payload of a function symbol.
#[derive(Debug, Clone)]
pub struct FunctionData {
    /// The scope in which the function body executes.
    pub call_scope: ScopeId,
    /// Live reference chains of the body, resolved when the function is
    /// called (call-chain liveness).
    pub body_refs: Vec<RefChain>,
}

/// A versioned binding.
///
/// Version fields are execution-counter values: `defined_cell` is when the
/// value was last (re)assigned, `required_cell` is the freshest cell its
/// transitive inputs demand, `last_used_cell` is the last read. A symbol is
/// stale when its inputs have moved past its own definition.
#[derive(Debug)]
pub struct Symbol {
    /// Member key within the containing scope's table.
    pub key: MemberKey,
    /// The symbol kind (fixed at creation).
    pub kind: SymbolKind,
    /// Containing scope.
    pub scope: ScopeId,
    /// Identity of the bound runtime object. Non-owning.
    pub obj: ObjectId,
    /// Identity bound before the most recent rebind; used to move this
    /// symbol atomically between alias sets.
    pub cached_obj: ObjectId,
    /// Cell in which the value was last (re)assigned.
    pub defined_cell: CellNum,
    /// Max `defined_cell` over transitive ancestors at last recomputation.
    pub required_cell: CellNum,
    /// Cell in which the value was last read.
    pub last_used_cell: CellNum,
    /// Symbols this value was computed from.
    pub parents: FxHashSet<SymbolId>,
    /// Reverse edges, maintained for propagation. No ownership.
    pub children: FxHashSet<SymbolId>,
    /// Ancestors observed fresher than this symbol, for refusal reports.
    pub fresher_ancestors: FxHashSet<SymbolId>,
    /// Stale members of this symbol's namespace, advertised on every alias
    /// of the namespace object.
    pub namespace_stale_refs: FxHashSet<SymbolId>,
    /// `cell read in -> defined_cell at that time`, append-only.
    pub version_by_used_cell: FxHashMap<CellNum, CellNum>,
    /// `cell found live in -> defined_cell at that time`, append-only.
    pub version_by_liveness_cell: FxHashMap<CellNum, CellNum>,
    /// One-shot staleness suppression, set when the user overrides a
    /// refusal by re-submitting identical source. Cleared on the next
    /// version update.
    pub suppressed: bool,
    /// Created implicitly by the resolver rather than by an assignment.
    pub implicit: bool,
    /// Removed from its scope; awaiting the collector.
    pub tombstoned: bool,
    /// Function payload, for function symbols.
    pub function: Option<FunctionData>,
}

impl Symbol {
    /// Create an unversioned symbol bound to `obj`.
    pub fn new(key: MemberKey, kind: SymbolKind, scope: ScopeId, obj: ObjectId) -> Self {
        Symbol {
            key,
            kind,
            scope,
            obj,
            cached_obj: obj,
            defined_cell: CellNum::ZERO,
            required_cell: CellNum::ZERO,
            last_used_cell: CellNum::ZERO,
            parents: FxHashSet::default(),
            children: FxHashSet::default(),
            fresher_ancestors: FxHashSet::default(),
            namespace_stale_refs: FxHashSet::default(),
            version_by_used_cell: FxHashMap::default(),
            version_by_liveness_cell: FxHashMap::default(),
            suppressed: false,
            implicit: false,
            tombstoned: false,
            function: None,
        }
    }

    /// Whether this symbol lives in a subscript table.
    #[inline]
    pub fn is_subscript(&self) -> bool {
        self.kind == SymbolKind::Subscript
    }

    /// Whether this is a function symbol.
    #[inline]
    pub fn is_function(&self) -> bool {
        self.kind == SymbolKind::Function
    }

    /// Whether this binding is anonymous.
    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.kind == SymbolKind::Anonymous
    }

    /// The staleness predicate: inputs demand a fresher cell than the one
    /// that defined this value, or the value's namespace holds stale
    /// members. Suppression wins.
    #[inline]
    pub fn is_stale(&self) -> bool {
        if self.suppressed {
            return false;
        }
        self.required_cell > self.defined_cell || !self.namespace_stale_refs.is_empty()
    }

    /// Record a read in `cell`: bump `last_used_cell` and, when the value
    /// predates the read, append to the dynamic history map.
    pub fn record_use(&mut self, cell: CellNum) {
        self.last_used_cell = cell;
        if self.defined_cell < cell {
            self.version_by_used_cell.insert(cell, self.defined_cell);
        }
    }

    /// Record static liveness in `cell` for the provenance slicer.
    pub fn record_liveness(&mut self, cell: CellNum) {
        self.version_by_liveness_cell
            .insert(cell, self.defined_cell);
    }

    /// Clear every version field and history map. Test-mode counter reset
    /// only.
    pub fn clear_versions(&mut self) {
        self.defined_cell = CellNum::ZERO;
        self.required_cell = CellNum::ZERO;
        self.last_used_cell = CellNum::ZERO;
        self.version_by_used_cell.clear();
        self.version_by_liveness_cell.clear();
        self.fresher_ancestors.clear();
        self.namespace_stale_refs.clear();
    }
}
