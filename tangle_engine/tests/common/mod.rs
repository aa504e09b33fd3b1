//! Shared helpers for driving the tracker the way the execution layer
//! would: parsed cells built by hand, statements reported after their heap
//! effects.

#![allow(dead_code)]

use tangle_ast::{AssignTarget, CellBody, CellRefs, ParsedCell, RefChain, Stmt, StmtKind};
use tangle_core::PendingGarbage;
use tangle_engine::DependencyTracker;
use tangle_runtime::MirrorHeap;

/// A tracker wired to a mirror heap sharing one pending-garbage set.
pub fn tracker() -> DependencyTracker<MirrorHeap> {
    let pending = PendingGarbage::new();
    let heap = MirrorHeap::with_pending(pending.clone());
    DependencyTracker::with_pending(heap, pending)
}

/// Build a parsed cell.
pub fn parsed(
    source: &str,
    stmts: Vec<Stmt>,
    live: Vec<RefChain>,
    dead: Vec<RefChain>,
) -> ParsedCell {
    ParsedCell::new(source, CellBody::new(stmts), CellRefs::new(live, dead))
}

/// `name = <rhs reading value_refs>`.
pub fn assign_stmt(name: &str, value_refs: Vec<RefChain>) -> Stmt {
    Stmt::new(StmtKind::Assign {
        targets: vec![AssignTarget::name(name)],
        value_refs,
    })
}

/// `<chain target> = <rhs reading value_refs>`.
pub fn chain_assign_stmt(target: RefChain, value_refs: Vec<RefChain>) -> Stmt {
    Stmt::new(StmtKind::Assign {
        targets: vec![AssignTarget::chain(target)],
        value_refs,
    })
}

/// A bare expression statement reading `refs`.
pub fn expr_stmt(refs: Vec<RefChain>) -> Stmt {
    Stmt::new(StmtKind::Expr { refs })
}

/// Run a single-statement module-level cell: precheck (asserting it is not
/// refused), begin, apply heap effects, report the statement, finish.
pub fn run_cell(
    tracker: &mut DependencyTracker<MirrorHeap>,
    cell: &ParsedCell,
    effects: impl FnOnce(&mut MirrorHeap),
) {
    let outcome = tracker.precheck_cell(cell).expect("precheck");
    assert!(
        !outcome.is_refused(),
        "cell unexpectedly refused: {:?}",
        cell.source
    );
    tracker.begin_cell(cell);
    effects(tracker.host_mut());
    let scope = tracker.global_scope();
    for stmt in &cell.body.body {
        tracker
            .statement_finished(scope, stmt, None)
            .expect("statement");
    }
    tracker.finish_cell().expect("finish");
}
