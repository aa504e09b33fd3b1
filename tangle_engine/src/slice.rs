//! Cell provenance: which earlier cells a given cell's result depends on.
//!
//! Two channels feed the closure, both recorded on symbols as append-only
//! history maps: *dynamic* versions (values actually read during
//! execution) and *static* versions (values found live during precheck).
//! Edges always point at strictly earlier executions, so the walk is a
//! cycle-free memoized DFS.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tangle_core::{CellNum, TangleError, TangleResult};
use tangle_model::GraphContext;

/// The cells `cell` transitively depends on, mapped to their source text.
///
/// The target cell itself is not part of the result.
pub fn cell_dependencies(
    ctx: &GraphContext,
    cell: CellNum,
) -> TangleResult<FxHashMap<CellNum, Arc<str>>> {
    if !ctx.cell_source_by_num.contains_key(&cell) {
        return Err(TangleError::UnknownCell(cell));
    }

    // invert the per-symbol history maps into per-cell dependency sets
    let mut dynamic_deps: FxHashMap<CellNum, FxHashSet<CellNum>> = FxHashMap::default();
    let mut static_deps: FxHashMap<CellNum, FxHashSet<CellNum>> = FxHashMap::default();
    for (_, sym) in ctx.symbols.iter() {
        for (&used_at, &version) in &sym.version_by_used_cell {
            dynamic_deps.entry(used_at).or_default().insert(version);
        }
        for (&live_at, &version) in &sym.version_by_liveness_cell {
            static_deps.entry(live_at).or_default().insert(version);
        }
    }

    let mut visited: FxHashSet<CellNum> = FxHashSet::default();
    walk(cell, &mut visited, &dynamic_deps, &static_deps);

    Ok(visited
        .into_iter()
        .filter(|num| *num != cell)
        .filter_map(|num| {
            ctx.cell_source_by_num
                .get(&num)
                .map(|source| (num, source.clone()))
        })
        .collect())
}

fn walk(
    cell: CellNum,
    visited: &mut FxHashSet<CellNum>,
    dynamic_deps: &FxHashMap<CellNum, FxHashSet<CellNum>>,
    static_deps: &FxHashMap<CellNum, FxHashSet<CellNum>>,
) {
    if !cell.is_set() || !visited.insert(cell) {
        return;
    }
    let empty = FxHashSet::default();
    let dynamic = dynamic_deps.get(&cell).unwrap_or(&empty);
    let statik = static_deps.get(&cell).unwrap_or(&empty);
    tracing::debug!(
        cell = cell.raw(),
        dynamic = dynamic.len(),
        stat = statik.len(),
        "cell dependency step"
    );
    for &dep in dynamic.iter().chain(statik.iter()) {
        walk(dep, visited, dynamic_deps, static_deps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_core::{MemberKey, ObjectId};
    use tangle_model::{Symbol, SymbolKind};

    fn seed_cell(ctx: &mut GraphContext, num: u32, source: &str) {
        ctx.cell_source_by_num
            .insert(CellNum::new(num), Arc::from(source));
    }

    #[test]
    fn test_unknown_cell_is_an_error() {
        let ctx = GraphContext::new();
        let err = cell_dependencies(&ctx, CellNum::new(3)).unwrap_err();
        assert!(matches!(err, TangleError::UnknownCell(_)));
    }

    #[test]
    fn test_closure_over_both_channels() {
        let mut ctx = GraphContext::new();
        seed_cell(&mut ctx, 1, "v = 1");
        seed_cell(&mut ctx, 2, "w = v");
        seed_cell(&mut ctx, 3, "u = w");
        let global = ctx.global_scope();

        // v read in cell 2 at version 1 (dynamic)
        let v = ctx.symbols.insert(Symbol::new(
            MemberKey::field("v"),
            SymbolKind::Default,
            global,
            ObjectId::new(1),
        ));
        ctx.sym_mut(v).unwrap().defined_cell = CellNum::new(1);
        ctx.sym_mut(v).unwrap().record_use(CellNum::new(2));

        // w found live in cell 3 at version 2 (static)
        let w = ctx.symbols.insert(Symbol::new(
            MemberKey::field("w"),
            SymbolKind::Default,
            global,
            ObjectId::new(2),
        ));
        ctx.sym_mut(w).unwrap().defined_cell = CellNum::new(2);
        ctx.sym_mut(w).unwrap().record_liveness(CellNum::new(3));

        let deps = cell_dependencies(&ctx, CellNum::new(3)).unwrap();
        let mut nums: Vec<u32> = deps.keys().map(|c| c.raw()).collect();
        nums.sort_unstable();
        assert_eq!(nums, vec![1, 2]);
        assert_eq!(&*deps[&CellNum::new(2)], "w = v");

        // cell 2 only depends on cell 1
        let deps2 = cell_dependencies(&ctx, CellNum::new(2)).unwrap();
        let nums2: Vec<u32> = deps2.keys().map(|c| c.raw()).collect();
        assert_eq!(nums2, vec![1]);
    }
}
