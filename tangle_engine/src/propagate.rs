//! Symbol version updates and staleness propagation.
//!
//! `update_deps` is the single write path for a symbol's version fields and
//! dependency edges. A genuine (re)assignment stamps the symbol with the
//! current execution counter, rewires its parent set, recomputes the
//! version its transitive inputs demand, and then pushes staleness outward:
//! every transitive dependent, and every dependent of every alias of each
//! enclosing container, learns that a fresher value exists.
//!
//! All transitive walks carry explicit visited sets; a symbol depending on
//! itself through a container must not loop.

use rustc_hash::FxHashSet;
use tangle_core::CellNum;
use tangle_model::{GraphContext, ScopeId, SymbolId};

/// Flags for one `update_deps` call.
#[derive(Debug, Clone, Copy)]
pub struct DepUpdate {
    /// Replace the parent set instead of unioning into it.
    pub overwrite: bool,
    /// Push staleness to dependents after the version update.
    pub propagate: bool,
    /// The update reflects an in-place mutation rather than a rebind.
    pub mutated: bool,
    /// The binding was deleted: clear parents and freeze `required_cell`.
    pub deleted: bool,
}

impl Default for DepUpdate {
    fn default() -> Self {
        DepUpdate {
            overwrite: true,
            propagate: true,
            mutated: false,
            deleted: false,
        }
    }
}

impl DepUpdate {
    /// An in-place mutation: parents accumulate, versions and watermarks
    /// move, dependents stay valid (they hold the same object).
    pub fn mutation() -> Self {
        DepUpdate {
            overwrite: false,
            mutated: true,
            ..Default::default()
        }
    }

    /// A deletion: parents cleared, `required_cell` frozen at its last
    /// value so downstream staleness checks keep reporting it.
    pub fn deletion() -> Self {
        DepUpdate {
            propagate: false,
            deleted: true,
            ..Default::default()
        }
    }

    /// A bookkeeping update that must not disturb dependents (starred
    /// unpack elements, resync).
    pub fn quiet() -> Self {
        DepUpdate {
            propagate: false,
            ..Default::default()
        }
    }
}

/// Update a symbol's dependency edges and version fields, then propagate.
pub fn update_deps(
    ctx: &mut GraphContext,
    sym: SymbolId,
    new_parents: &FxHashSet<SymbolId>,
    update: DepUpdate,
) {
    if !ctx.symbols.contains(sym) {
        return;
    }
    let now = ctx.cell_counter();

    if update.deleted {
        let parents: Vec<SymbolId> = ctx
            .sym(sym)
            .map(|s| s.parents.iter().copied().collect())
            .unwrap_or_default();
        for parent in parents {
            if let Some(p) = ctx.sym_mut(parent) {
                p.children.remove(&sym);
            }
        }
        if let Some(s) = ctx.sym_mut(sym) {
            s.parents.clear();
            s.tombstoned = true;
        }
        tracing::debug!(sym = ?sym, "deleted symbol; required_cell frozen");
        return;
    }

    // A symbol appearing among its own (first-order) dependencies must not
    // sever the edges it is being recomputed from.
    let mut overwrite = update.overwrite;
    if overwrite && new_parents.contains(&sym) {
        overwrite = false;
    }
    if overwrite
        && new_parents.iter().any(|p| {
            ctx.sym(*p)
                .map(|ps| ps.parents.contains(&sym))
                .unwrap_or(false)
        })
    {
        overwrite = false;
    }

    if overwrite {
        let dropped: Vec<SymbolId> = ctx
            .sym(sym)
            .map(|s| {
                s.parents
                    .iter()
                    .copied()
                    .filter(|p| !new_parents.contains(p))
                    .collect()
            })
            .unwrap_or_default();
        for parent in dropped {
            if let Some(p) = ctx.sym_mut(parent) {
                p.children.remove(&sym);
            }
        }
        if let Some(s) = ctx.sym_mut(sym) {
            s.parents.clear();
        }
    }
    for &parent in new_parents {
        if parent == sym || !ctx.symbols.contains(parent) {
            continue;
        }
        if let Some(s) = ctx.sym_mut(sym) {
            s.parents.insert(parent);
        }
        if let Some(p) = ctx.sym_mut(parent) {
            p.children.insert(sym);
        }
    }

    if let Some(s) = ctx.sym_mut(sym) {
        s.defined_cell = now;
        s.fresher_ancestors.clear();
        s.namespace_stale_refs.clear();
        s.suppressed = false;
    }
    let required = compute_required(ctx, sym);
    if let Some(s) = ctx.sym_mut(sym) {
        s.required_cell = required;
    }

    clear_stale_adverts(ctx, sym);
    bump_enclosing_watermarks(ctx, sym, now);

    // A rebind replaces the value, so anything computed from the old one
    // goes stale. An in-place mutation leaves the object identity intact:
    // holders of the same object see the new content, and only the version
    // bump above (plus the watermarks) records that it moved.
    if update.propagate && !update.mutated {
        propagate_staleness(ctx, sym, now);
    }
    tracing::debug!(
        sym = ?sym,
        defined = now.raw(),
        required = required.raw(),
        mutated = update.mutated,
        "updated symbol versions"
    );
}

/// Max `defined_cell` over the symbol and its transitive parent closure.
fn compute_required(ctx: &GraphContext, root: SymbolId) -> CellNum {
    let mut max = ctx
        .sym(root)
        .map(|s| s.defined_cell)
        .unwrap_or(CellNum::ZERO);
    let mut visited: FxHashSet<SymbolId> = FxHashSet::default();
    visited.insert(root);
    let mut stack: Vec<SymbolId> = ctx
        .sym(root)
        .map(|s| s.parents.iter().copied().collect())
        .unwrap_or_default();
    while let Some(parent) = stack.pop() {
        if !visited.insert(parent) {
            continue;
        }
        if let Some(p) = ctx.sym(parent) {
            if p.defined_cell > max {
                max = p.defined_cell;
            }
            stack.extend(p.parents.iter().copied());
        }
    }
    max
}

/// The namespace scopes enclosing a symbol, innermost first.
fn enclosing_namespaces(ctx: &GraphContext, sym: SymbolId) -> Vec<ScopeId> {
    ctx.sym(sym)
        .map(|s| ctx.scopes.namespace_chain(s.scope))
        .unwrap_or_default()
}

/// A freshly updated symbol stops being advertised as a stale member on
/// the aliases of its enclosing containers.
fn clear_stale_adverts(ctx: &mut GraphContext, sym: SymbolId) {
    for ns_scope in enclosing_namespaces(ctx, sym) {
        let Some(obj) = ctx
            .scopes
            .get(ns_scope)
            .and_then(|s| s.ns.as_ref())
            .map(|ns| ns.object_id)
        else {
            continue;
        };
        let aliases: Vec<SymbolId> = ctx.aliases.of(obj).collect();
        for alias in aliases {
            if let Some(a) = ctx.sym_mut(alias) {
                a.namespace_stale_refs.remove(&sym);
            }
        }
    }
}

/// Record the touch on every enclosing namespace's watermark.
fn bump_enclosing_watermarks(ctx: &mut GraphContext, sym: SymbolId, now: CellNum) {
    for ns_scope in enclosing_namespaces(ctx, sym) {
        ctx.scopes.bump_watermark(ns_scope, now);
    }
}

/// Mark every transitive dependent of `source` stale at `now`.
///
/// Dependents are reached through two kinds of edges: direct dependency
/// children, and the children of every alias of each container enclosing
/// `source` — a deep change must be visible when the same structural shape
/// is inspected through any alias of the container.
fn propagate_staleness(ctx: &mut GraphContext, source: SymbolId, now: CellNum) {
    let mut visited: FxHashSet<SymbolId> = FxHashSet::default();
    visited.insert(source);
    let mut stack: Vec<(SymbolId, SymbolId)> = Vec::new();

    if let Some(s) = ctx.sym(source) {
        for &child in &s.children {
            stack.push((child, source));
        }
    }
    for ns_scope in enclosing_namespaces(ctx, source) {
        let Some(obj) = ctx
            .scopes
            .get(ns_scope)
            .and_then(|s| s.ns.as_ref())
            .map(|ns| ns.object_id)
        else {
            continue;
        };
        let aliases: Vec<SymbolId> = ctx.aliases.of(obj).collect();
        for alias in aliases {
            if alias == source {
                continue;
            }
            if let Some(a) = ctx.sym(alias) {
                for &child in &a.children {
                    stack.push((child, alias));
                }
            }
        }
    }

    while let Some((child, fresher)) = stack.pop() {
        if !visited.insert(child) {
            continue;
        }
        let Some(c) = ctx.sym(child) else {
            continue;
        };
        // already refreshed at or after this write
        if c.defined_cell >= now {
            continue;
        }
        if let Some(c) = ctx.sym_mut(child) {
            if c.required_cell < now {
                c.required_cell = now;
            }
            c.fresher_ancestors.insert(fresher);
        }
        tracing::debug!(child = ?child, fresher = ?fresher, at = now.raw(), "dependent marked stale");

        // advertise the stale member on every alias of its containers
        for ns_scope in enclosing_namespaces(ctx, child) {
            let Some(obj) = ctx
                .scopes
                .get(ns_scope)
                .and_then(|s| s.ns.as_ref())
                .map(|ns| ns.object_id)
            else {
                continue;
            };
            let aliases: Vec<SymbolId> = ctx.aliases.of(obj).collect();
            for alias in aliases {
                if alias == child {
                    continue;
                }
                if let Some(a) = ctx.sym_mut(alias) {
                    a.namespace_stale_refs.insert(child);
                }
            }
        }

        let grandchildren: Vec<SymbolId> = ctx
            .sym(child)
            .map(|c| c.children.iter().copied().collect())
            .unwrap_or_default();
        for gc in grandchildren {
            stack.push((gc, child));
        }
    }
}
