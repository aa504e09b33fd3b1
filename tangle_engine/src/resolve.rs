//! Static resolution of reference chains against the symbol graph.
//!
//! Resolution walks a chain atom by atom: look the token up in the current
//! scope, step the live object graph through the host, continue into the
//! next object's namespace scope (lookup only — nothing is created on this
//! path). It stops at the first unresolved token, the first call boundary,
//! or the first object with no namespace while atoms remain, reporting the
//! most specific symbol matched so far.

use crate::precheck;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tangle_ast::{ChainAtom, ParsedCell, RefChain};
use tangle_core::{HostRuntime, MemberKey, TangleResult};
use tangle_model::{GraphContext, ScopeId, SymbolId};

/// Outcome of resolving one chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainResolution {
    /// The most specific symbol reached.
    pub matched: Option<SymbolId>,
    /// The callee symbol, when resolution stopped at a call boundary.
    pub called: Option<SymbolId>,
    /// Every atom was consumed and each token resolved.
    pub success: bool,
}

/// Resolve a multi-atom chain rooted at `scope`.
pub fn resolve_chain(
    ctx: &GraphContext,
    host: &dyn HostRuntime,
    scope: ScopeId,
    chain: &RefChain,
) -> TangleResult<ChainResolution> {
    let mut cur_scope = scope;
    let mut matched: Option<SymbolId> = None;
    let mut obj = None;
    let atoms = &chain.atoms;

    for (i, atom) in atoms.iter().enumerate() {
        let last = i + 1 == atoms.len();
        let key = match atom {
            ChainAtom::Call(name) => {
                // resolution never looks past a call boundary; report the
                // callee so call-chain liveness can pick it up
                let called =
                    ctx.scopes
                        .lookup_name(host, cur_scope, &MemberKey::Field(name.clone()));
                return Ok(ChainResolution {
                    matched,
                    called,
                    success: false,
                });
            }
            other => other.member_key().expect("non-call atom has a key"),
        };

        let next = ctx.scopes.lookup_name(host, cur_scope, &key);
        if matched.is_some() && next.is_none() {
            // The deeper member is unknown. A parent that is stale purely
            // through its namespace members (its own versions already
            // up to date) yields no match; a parent whose versions account
            // for the staleness is the result.
            if let Some(parent) = matched {
                if let Some(p) = ctx.sym(parent) {
                    if p.is_stale() && p.defined_cell >= p.required_cell {
                        matched = None;
                    }
                }
            }
            return Ok(ChainResolution {
                matched,
                called: None,
                success: false,
            });
        }
        matched = next;
        if last {
            break;
        }

        // step the live object graph to the next namespace level
        let next_obj = match obj {
            None => match atom.name_token() {
                Some(name) => host.global(name),
                None => None,
            },
            Some(container) => host.member(container, &key)?,
        };
        let Some(next_obj) = next_obj else {
            return Ok(ChainResolution {
                matched,
                called: None,
                success: false,
            });
        };
        obj = Some(next_obj);
        match ctx.namespace_for(next_obj) {
            Some(ns) => cur_scope = ns,
            None => {
                return Ok(ChainResolution {
                    matched,
                    called: None,
                    success: false,
                })
            }
        }
    }

    Ok(ChainResolution {
        matched,
        called: None,
        success: true,
    })
}

/// Resolve one reference: a bare name directly, anything else as a chain.
pub fn resolve_reference(
    ctx: &GraphContext,
    host: &dyn HostRuntime,
    scope: ScopeId,
    chain: &RefChain,
) -> TangleResult<ChainResolution> {
    if chain.is_bare_name() {
        let name = chain.root_name().expect("bare name has a root");
        let matched = ctx
            .scopes
            .lookup_name(host, scope, &MemberKey::Field(name.clone()));
        return Ok(ChainResolution {
            matched,
            called: None,
            success: matched.is_some(),
        });
    }
    resolve_chain(ctx, host, scope, chain)
}

/// The symbols matched by a set of references.
#[derive(Debug, Default)]
pub struct ResolvedRefs {
    /// Matched (and callee) symbols.
    pub symbols: FxHashSet<SymbolId>,
    /// Callee symbols, for call-chain liveness.
    pub called: FxHashSet<SymbolId>,
}

/// Resolve a set of references rooted at `scope`.
///
/// With `only_successful`, partial matches are dropped — a dead reference
/// counts as a kill only when the whole chain resolved.
pub fn resolve_references<'a>(
    ctx: &GraphContext,
    host: &dyn HostRuntime,
    scope: ScopeId,
    refs: impl IntoIterator<Item = &'a RefChain>,
    only_successful: bool,
) -> TangleResult<ResolvedRefs> {
    let mut out = ResolvedRefs::default();
    for chain in refs {
        let res = resolve_reference(ctx, host, scope, chain)?;
        if let Some(matched) = res.matched {
            if res.success || !only_successful {
                out.symbols.insert(matched);
            }
        }
        if let Some(called) = res.called {
            out.symbols.insert(called);
            out.called.insert(called);
        }
    }
    Ok(out)
}

/// Close a set of called function symbols over their bodies' live
/// references, breadth-first.
pub fn call_chain_live_symbols(
    ctx: &GraphContext,
    host: &dyn HostRuntime,
    called: &FxHashSet<SymbolId>,
) -> TangleResult<FxHashSet<SymbolId>> {
    let mut live = FxHashSet::default();
    let mut visited: FxHashSet<SymbolId> = FxHashSet::default();
    let mut worklist: Vec<SymbolId> = called.iter().copied().collect();
    while let Some(func) = worklist.pop() {
        if !visited.insert(func) {
            continue;
        }
        let Some((call_scope, body_refs)) = ctx
            .sym(func)
            .and_then(|s| s.function.as_ref())
            .map(|f| (f.call_scope, f.body_refs.clone()))
        else {
            continue;
        };
        let resolved = resolve_references(ctx, host, call_scope, body_refs.iter(), false)?;
        live.extend(resolved.symbols.iter().copied());
        worklist.extend(resolved.called.iter().copied());
    }
    Ok(live)
}

/// Record reads on a set of symbols at the current cell.
pub fn record_usage(ctx: &mut GraphContext, symbols: impl IntoIterator<Item = SymbolId>) {
    let now = ctx.cell_counter();
    for id in symbols {
        if let Some(sym) = ctx.sym_mut(id) {
            sym.record_use(now);
        }
    }
}

/// Live/dead/stale symbol sets of one cell.
#[derive(Debug, Default)]
pub struct CellResolution {
    /// Symbols the cell reads from prior state.
    pub live: FxHashSet<SymbolId>,
    /// Symbols whose bindings the cell overwrites.
    pub dead: FxHashSet<SymbolId>,
    /// The live symbols that are stale.
    pub stale: FxHashSet<SymbolId>,
}

/// Statically resolve one cell: live references (shielded by the precheck
/// safe set, widened by call-chain liveness), dead references (successful
/// resolutions only), and the stale subset of the live set.
///
/// Read-only: no usage or liveness timestamps are recorded here.
pub fn resolve_cell(
    ctx: &GraphContext,
    host: &dyn HostRuntime,
    cell: &ParsedCell,
) -> TangleResult<CellResolution> {
    // names the cell provably rebinds before any read need no resolution
    let safe: FxHashSet<Arc<str>> =
        match precheck::precheck_cell(&cell.body, &ctx.known_global_names()) {
            Ok(report) => report.safe_set,
            // unmodeled shapes: fall back to resolving everything
            Err(_) => FxHashSet::default(),
        };

    let scope = ctx.global_scope();
    let live_refs = cell.refs.live.iter().filter(|chain| {
        !(chain.is_bare_name()
            && chain
                .root_name()
                .map(|root| safe.contains(root))
                .unwrap_or(false))
    });
    let resolved = resolve_references(ctx, host, scope, live_refs, false)?;
    let mut live = resolved.symbols;
    live.extend(call_chain_live_symbols(ctx, host, &resolved.called)?);

    let dead = resolve_references(ctx, host, scope, cell.refs.dead.iter(), true)?.symbols;

    let stale = live
        .iter()
        .copied()
        .filter(|id| ctx.sym(*id).map(|s| s.is_stale()).unwrap_or(false))
        .collect();

    Ok(CellResolution { live, dead, stale })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upsert::{upsert_symbol, UpsertFlags};
    use tangle_core::IndexKey;
    use tangle_core::ObjectId;
    use tangle_runtime::MirrorHeap;

    fn global_upsert(
        ctx: &mut GraphContext,
        heap: &MirrorHeap,
        name: &str,
        obj: ObjectId,
    ) -> SymbolId {
        let global = ctx.global_scope();
        upsert_symbol(
            ctx,
            heap,
            global,
            MemberKey::field(name),
            obj,
            FxHashSet::default(),
            UpsertFlags::assign(),
        )
        .unwrap()
    }

    #[test]
    fn test_bare_name_resolution() {
        let mut ctx = GraphContext::new();
        let mut heap = MirrorHeap::new();
        let obj = heap.new_value();
        heap.set_global("x", obj);
        let x = global_upsert(&mut ctx, &heap, "x", obj);
        let res = resolve_reference(&ctx, &heap, ctx.global_scope(), &RefChain::name("x")).unwrap();
        assert_eq!(res.matched, Some(x));
        assert!(res.success);
        let miss =
            resolve_reference(&ctx, &heap, ctx.global_scope(), &RefChain::name("y")).unwrap();
        assert!(miss.matched.is_none());
        assert!(!miss.success);
    }

    #[test]
    fn test_chain_resolution_through_namespace() {
        let mut ctx = GraphContext::new();
        let mut heap = MirrorHeap::new();
        let d_obj = heap.new_dict();
        let elem_obj = heap.new_value();
        heap.set_key(d_obj, IndexKey::str("x"), elem_obj);
        heap.set_global("d", d_obj);

        let global = ctx.global_scope();
        let _d = global_upsert(&mut ctx, &heap, "d", d_obj);
        let ns = ctx.scopes.make_namespace(
            global,
            "d",
            d_obj,
            tangle_core::ContainerKind::KeyIndexed,
        );
        ctx.register_namespace(d_obj, ns);
        let elem = upsert_symbol(
            &mut ctx,
            &heap,
            ns,
            MemberKey::index(IndexKey::str("x")),
            elem_obj,
            FxHashSet::default(),
            UpsertFlags::assign(),
        )
        .unwrap();

        let chain = RefChain::name("d").index(IndexKey::str("x"));
        let res = resolve_chain(&ctx, &heap, global, &chain).unwrap();
        assert_eq!(res.matched, Some(elem));
        assert!(res.success);
    }

    #[test]
    fn test_call_boundary_reports_callee() {
        let mut ctx = GraphContext::new();
        let mut heap = MirrorHeap::new();
        let f_obj = heap.new_value();
        heap.set_global("f", f_obj);
        let global = ctx.global_scope();
        let f = upsert_symbol(
            &mut ctx,
            &heap,
            global,
            MemberKey::field("f"),
            f_obj,
            FxHashSet::default(),
            UpsertFlags::function_def(vec![RefChain::name("g")]),
        )
        .unwrap();
        let res = resolve_reference(&ctx, &heap, global, &RefChain::call("f")).unwrap();
        assert_eq!(res.called, Some(f));
        assert!(!res.success);
    }

    #[test]
    fn test_call_chain_liveness_reaches_globals() {
        let mut ctx = GraphContext::new();
        let mut heap = MirrorHeap::new();
        let g_obj = heap.new_value();
        let f_obj = heap.new_value();
        heap.set_global("g", g_obj);
        heap.set_global("f", f_obj);
        let global = ctx.global_scope();
        let g = global_upsert(&mut ctx, &heap, "g", g_obj);
        let f = upsert_symbol(
            &mut ctx,
            &heap,
            global,
            MemberKey::field("f"),
            f_obj,
            FxHashSet::default(),
            UpsertFlags::function_def(vec![RefChain::name("g")]),
        )
        .unwrap();
        let mut called = FxHashSet::default();
        called.insert(f);
        let live = call_chain_live_symbols(&ctx, &heap, &called).unwrap();
        assert!(live.contains(&g));
    }
}
