//! Namespace and symbol collection.
//!
//! The host reports object expiry into the pending-garbage set from
//! whatever call stack it happens to be on; nothing is mutated there.
//! Collection happens here, only at boundaries: the statement-level pass
//! drains expiries, and the cell-boundary pass additionally retires
//! namespaces whose objects no symbol references anymore and sweeps
//! symbols whose scope or alias membership is gone. Both passes are
//! idempotent.

use tangle_core::{HostRuntime, ObjectId};
use tangle_model::{GraphContext, SymbolId};

/// Statement-boundary pass: drain expired identities and retire their
/// namespace scopes.
pub fn drain_expired_namespaces(ctx: &mut GraphContext) {
    let expired = ctx.pending_garbage.drain();
    retire_namespaces(ctx, expired);
}

/// Cell-boundary pass: expiries plus unreferenced namespaces, then the
/// symbol sweep, then destruction of scope records retired earlier.
pub fn collect_garbage(ctx: &mut GraphContext, host: &dyn HostRuntime) {
    let mut garbage: Vec<ObjectId> = ctx.pending_garbage.drain();
    for (&obj, _) in ctx.namespaces.iter() {
        if !ctx.aliases.is_aliased(obj) || !host.is_live(obj) {
            garbage.push(obj);
        }
    }
    retire_namespaces(ctx, garbage);
    sweep_symbols(ctx);
    discard_retired_scopes(ctx);
}

/// Tombstoned namespace scopes survive until no traversal can be in
/// flight; between cells that is guaranteed, so their records go now.
fn discard_retired_scopes(ctx: &mut GraphContext) {
    for scope in ctx.scopes.ids() {
        let Some(ns) = ctx.scopes.get(scope).and_then(|s| s.ns.as_ref()) else {
            continue;
        };
        if ns.tombstoned && ctx.namespaces.get(&ns.object_id) != Some(&scope) {
            ctx.scopes.discard(scope);
        }
    }
}

fn retire_namespaces(ctx: &mut GraphContext, garbage: Vec<ObjectId>) {
    for obj in garbage {
        let Some(scope) = ctx.namespaces.remove(&obj) else {
            continue;
        };
        tracing::debug!(obj = ?obj, scope = ?scope, "collecting namespace scope");
        if let Some(ns) = ctx.scopes.get_mut(scope).and_then(|s| s.ns.as_mut()) {
            ns.tombstoned = true;
        }
        for member in ctx.scopes.clear_members(scope) {
            if let Some(sym) = ctx.sym_mut(member) {
                sym.tombstoned = true;
            }
        }
    }
}

/// Remove every symbol whose backing state is gone: tombstoned, containing
/// scope collected, or no longer present in its identity's alias set.
fn sweep_symbols(ctx: &mut GraphContext) {
    let mut removed = 0usize;
    let ids: Vec<SymbolId> = ctx.symbols.ids();
    for id in ids {
        let Some(sym) = ctx.sym(id) else {
            continue;
        };
        let garbage = sym.tombstoned
            || ctx.scopes.scope_is_garbage(sym.scope)
            || !ctx.aliases.contains(sym.obj, id);
        if !garbage {
            continue;
        }
        let (obj, cached, scope, key) = {
            let sym = ctx.sym(id).unwrap();
            (sym.obj, sym.cached_obj, sym.scope, sym.key.clone())
        };
        // unlink edges; dependents keep their frozen required_cell
        let parents: Vec<SymbolId> = ctx
            .sym(id)
            .map(|s| s.parents.iter().copied().collect())
            .unwrap_or_default();
        for parent in parents {
            if let Some(p) = ctx.sym_mut(parent) {
                p.children.remove(&id);
            }
        }
        let children: Vec<SymbolId> = ctx
            .sym(id)
            .map(|s| s.children.iter().copied().collect())
            .unwrap_or_default();
        for child in children {
            if let Some(c) = ctx.sym_mut(child) {
                c.parents.remove(&id);
            }
        }
        ctx.aliases.discard(obj, id);
        ctx.aliases.discard(cached, id);
        if ctx.scopes.member_entry(scope, &key) == Some(id) {
            ctx.scopes.remove(scope, &key);
        }
        ctx.symbols.remove(id);
        removed += 1;
    }
    if removed > 0 {
        tracing::debug!(removed, "symbol sweep");
    }
}
