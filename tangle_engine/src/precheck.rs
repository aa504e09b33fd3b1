//! Static safe-set analysis of one cell.
//!
//! A single forward walk over the cell's statements proves which names will
//! be freshly bound before any later statement reads them. Names known in
//! the global scope but not yet proven safe land in the check set and
//! require full resolution. The walk is a conservative under-approximation:
//! it must never call something safe that could still observe a stale
//! value, and it gives up (structural inconsistency) on target shapes it
//! does not model rather than guess.

use rustc_hash::FxHashSet;
use std::sync::Arc;
use tangle_ast::{AssignTarget, CellBody, Stmt, StmtKind};
use tangle_core::{TangleError, TangleResult};

/// The result of prechecking one cell.
#[derive(Debug, Default)]
pub struct PrecheckReport {
    /// Names proven freshly bound before any later read in the cell.
    pub safe_set: FxHashSet<Arc<str>>,
    /// Known global names referenced before being proven safe.
    pub check_set: FxHashSet<Arc<str>>,
}

/// Walk one cell and produce its safe/check sets.
pub fn precheck_cell(
    body: &CellBody,
    known_globals: &FxHashSet<Arc<str>>,
) -> TangleResult<PrecheckReport> {
    let mut report = PrecheckReport::default();
    for stmt in &body.body {
        visit_stmt(stmt, &mut report.safe_set)?;
        let mut names = Vec::new();
        stmt.referenced_names(&mut names);
        for name in names {
            if known_globals.contains(&name) && !report.safe_set.contains(&name) {
                report.check_set.insert(name);
            }
        }
    }
    Ok(report)
}

fn unmodeled(construct: &'static str, detail: &AssignTarget) -> TangleError {
    TangleError::StructuralInconsistency {
        walker: "precheck",
        construct,
        detail: format!("{:?}", detail),
    }
}

fn visit_stmt(stmt: &Stmt, safe: &mut FxHashSet<Arc<str>>) -> TangleResult<()> {
    match &stmt.kind {
        StmtKind::Assign { targets, .. } => {
            for target in targets {
                collect_assign_target(target, safe)?;
            }
        }
        StmtKind::AugAssign { target, .. } => match target {
            // an augmented assignment reads the old value first, so its
            // target is never safe — it could observe exactly the stale
            // value the safe set is supposed to rule out
            AssignTarget::Name(_) | AssignTarget::Chain(_) => {}
            other => return Err(unmodeled("augmented-assignment target", other)),
        },
        StmtKind::For { target, body, .. } => {
            collect_loop_target(target, safe)?;
            for inner in body {
                visit_stmt(inner, safe)?;
            }
        }
        StmtKind::FunctionDef { name, .. } | StmtKind::ClassDef { name, .. } => {
            safe.insert(name.clone());
        }
        StmtKind::Import { .. } | StmtKind::Delete { .. } | StmtKind::Expr { .. } => {}
    }
    Ok(())
}

fn collect_assign_target(target: &AssignTarget, safe: &mut FxHashSet<Arc<str>>) -> TangleResult<()> {
    match target {
        AssignTarget::Name(name) => {
            safe.insert(name.clone());
            Ok(())
        }
        // stores into containers do not make the container name safe
        AssignTarget::Chain(_) => Ok(()),
        AssignTarget::Tuple(items) => {
            for item in items {
                match item {
                    AssignTarget::Name(name) => {
                        safe.insert(name.clone());
                    }
                    AssignTarget::Starred(inner) => {
                        if let AssignTarget::Name(name) = &**inner {
                            safe.insert(name.clone());
                        } else {
                            return Err(unmodeled("assignment target", item));
                        }
                    }
                    other => return Err(unmodeled("assignment target", other)),
                }
            }
            Ok(())
        }
        other => Err(unmodeled("assignment target", other)),
    }
}

fn collect_loop_target(target: &AssignTarget, safe: &mut FxHashSet<Arc<str>>) -> TangleResult<()> {
    match target {
        AssignTarget::Name(name) => {
            safe.insert(name.clone());
            Ok(())
        }
        AssignTarget::Tuple(items) => {
            for item in items {
                if let AssignTarget::Name(name) = item {
                    safe.insert(name.clone());
                } else {
                    return Err(unmodeled("loop target", item));
                }
            }
            Ok(())
        }
        other => Err(unmodeled("loop target", other)),
    }
}
