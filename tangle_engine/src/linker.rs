//! Cross-cell staleness linking.
//!
//! Given a batch of not-yet-run cell contents, determine which would read
//! stale state, which would read state fresher than their own last run,
//! and which *other* cells would clear a stale cell's inputs if run first.
//! Refresher candidates come from kill sets — the cells whose dead
//! references successfully resolve to a stale cell's stale symbols — with
//! a quadratic re-resolution fallback as ground truth. The stale→refresher
//! relation is closed transitively through refreshers that are themselves
//! stale, then restricted to clean refreshers: only a cell that would run
//! clean can fix another.

use crate::config::{MutableFlags, TrackerConfig};
use crate::precheck;
use crate::resolve;
use rustc_hash::{FxHashMap, FxHashSet};
use tangle_ast::ParsedCell;
use tangle_core::{CellId, CellNum, HostRuntime, TangleResult};
use tangle_model::{GraphContext, SymbolId};

/// One candidate cell in a batch.
#[derive(Debug)]
pub struct BatchEntry<'a> {
    /// Front-end id of the cell.
    pub id: CellId,
    /// Parsed content; `None` when the source failed to parse (the cell is
    /// skipped, not fatal to the batch).
    pub cell: Option<&'a ParsedCell>,
    /// Position of the cell in the notebook, when order matters.
    pub order_index: Option<i64>,
}

impl<'a> BatchEntry<'a> {
    /// Entry without an order index.
    pub fn new(id: impl Into<CellId>, cell: Option<&'a ParsedCell>) -> Self {
        BatchEntry {
            id: id.into(),
            cell,
            order_index: None,
        }
    }

    /// Entry at a known notebook position.
    pub fn with_order(id: impl Into<CellId>, cell: Option<&'a ParsedCell>, order: i64) -> Self {
        BatchEntry {
            id: id.into(),
            cell,
            order_index: Some(order),
        }
    }
}

/// The batch report handed back to the front end.
#[derive(Debug, Default)]
pub struct CellFreshness {
    /// Cells that statically resolve to at least one live stale symbol.
    pub stale_cells: Vec<CellId>,
    /// Cells whose live inputs are all fresher than the cell's last
    /// recorded run.
    pub fresh_cells: Vec<CellId>,
    /// stale cell → cells whose execution would clear its staleness. A
    /// stale cell with no resolvable refresher keeps an empty set here.
    pub stale_links: FxHashMap<CellId, FxHashSet<CellId>>,
    /// clean refresher cell → stale cells it would fix.
    pub refresher_links: FxHashMap<CellId, Vec<CellId>>,
}

/// Link a batch of candidate cells against the current graph.
pub fn check_and_link_cells(
    ctx: &GraphContext,
    host: &dyn HostRuntime,
    config: &TrackerConfig,
    flags: &MutableFlags,
    entries: &[BatchEntry<'_>],
    active_position: Option<i64>,
) -> TangleResult<CellFreshness> {
    if !flags.highlights_enabled {
        return Ok(CellFreshness::default());
    }

    let mut stale_set: FxHashSet<CellId> = FxHashSet::default();
    let mut fresh_cells: Vec<CellId> = Vec::new();
    let mut stale_syms_by_cell: FxHashMap<CellId, FxHashSet<SymbolId>> = FxHashMap::default();
    let mut kills: FxHashMap<SymbolId, FxHashSet<CellId>> = FxHashMap::default();

    for entry in entries {
        if let (Some(active), Some(order)) = (active_position, entry.order_index) {
            // already executed at or before the reference position
            if order <= active {
                continue;
            }
        }
        let Some(cell) = entry.cell else {
            continue;
        };
        let res = resolve::resolve_cell(ctx, host, cell)?;
        if !res.stale.is_empty() {
            stale_set.insert(entry.id.clone());
            stale_syms_by_cell.insert(entry.id.clone(), res.stale);
        } else if let Some(last_run) = ctx.counters_by_cell_id.get(&entry.id) {
            let max_defined = res
                .live
                .iter()
                .map(|s| ctx.effective_defined_cell(*s))
                .max()
                .unwrap_or(CellNum::ZERO);
            if max_defined > *last_run {
                fresh_cells.push(entry.id.clone());
            }
        }
        for dead in res.dead {
            kills.entry(dead).or_default().insert(entry.id.clone());
        }
    }

    // direct refreshers
    let mut stale_links: FxHashMap<CellId, FxHashSet<CellId>> = FxHashMap::default();
    for id in &stale_set {
        let stale_syms = &stale_syms_by_cell[id];
        let mut refreshers: FxHashSet<CellId> = if config.naive_refresher_computation {
            naive_refreshers(ctx, host, id, stale_syms, entries)?
        } else {
            stale_syms
                .iter()
                .flat_map(|sym| kills.get(sym).into_iter().flatten().cloned())
                .collect()
        };
        refreshers.remove(id);
        stale_links.insert(id.clone(), refreshers);
    }

    // transitive closure up to the first non-stale refresher
    loop {
        let mut changed = false;
        for id in &stale_set {
            let current = stale_links[id].clone();
            let mut merged = current.clone();
            for refresher in &current {
                if stale_set.contains(refresher) {
                    if let Some(more) = stale_links.get(refresher) {
                        merged.extend(more.iter().cloned());
                    }
                }
            }
            merged.remove(id);
            if merged.len() != stale_links[id].len() {
                stale_links.insert(id.clone(), merged);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    // only a cell that would itself run clean can fix another
    let mut stale_cells: Vec<CellId> = stale_set.iter().cloned().collect();
    stale_cells.sort();
    let mut refresher_links: FxHashMap<CellId, Vec<CellId>> = FxHashMap::default();
    for id in &stale_cells {
        if let Some(links) = stale_links.get_mut(id) {
            links.retain(|r| !stale_set.contains(r));
            for refresher in links.iter() {
                refresher_links
                    .entry(refresher.clone())
                    .or_default()
                    .push(id.clone());
            }
        }
    }

    tracing::debug!(
        stale = stale_cells.len(),
        fresh = fresh_cells.len(),
        "linked cell batch"
    );
    Ok(CellFreshness {
        stale_cells,
        fresh_cells,
        stale_links,
        refresher_links,
    })
}

/// Ground-truth refresher computation: prepend each earlier candidate to
/// the stale cell and re-resolve. Under the parser boundary the
/// concatenation is expressed by shielding the stale cell's references
/// with the names the candidate freshly binds; a candidate is a refresher
/// when the shielded resolution strictly shrinks the stale set.
fn naive_refreshers(
    ctx: &GraphContext,
    host: &dyn HostRuntime,
    stale_id: &CellId,
    stale_syms: &FxHashSet<SymbolId>,
    entries: &[BatchEntry<'_>],
) -> TangleResult<FxHashSet<CellId>> {
    let mut out = FxHashSet::default();
    let Some(stale_entry) = entries.iter().find(|e| &e.id == stale_id) else {
        return Ok(out);
    };
    let Some(stale_cell) = stale_entry.cell else {
        return Ok(out);
    };
    let known = ctx.known_global_names();
    for other in entries {
        if other.id == *stale_id {
            continue;
        }
        if let (Some(other_order), Some(stale_order)) = (other.order_index, stale_entry.order_index)
        {
            if other_order >= stale_order {
                continue;
            }
        }
        let Some(other_cell) = other.cell else {
            continue;
        };
        let shield = match precheck::precheck_cell(&other_cell.body, &known) {
            Ok(report) => report.safe_set,
            Err(_) => continue,
        };
        let remaining_refs = stale_cell.refs.live.iter().filter(|chain| {
            chain
                .root_name()
                .map(|root| !shield.contains(root))
                .unwrap_or(true)
        });
        let resolved = resolve::resolve_references(ctx, host, ctx.global_scope(), remaining_refs, false)?;
        let remaining_stale: FxHashSet<SymbolId> = resolved
            .symbols
            .iter()
            .copied()
            .filter(|id| ctx.sym(*id).map(|s| s.is_stale()).unwrap_or(false))
            .collect();
        if remaining_stale.len() < stale_syms.len() && remaining_stale.is_subset(stale_syms) {
            out.insert(other.id.clone());
        }
    }
    Ok(out)
}
