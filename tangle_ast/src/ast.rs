//! Reduced statement tree for one cell.
//!
//! Only the statement shapes dependency tracking dispatches on are modeled.
//! Everything expression-like has been flattened to reference chains by the
//! parser; a statement carries the chains it reads rather than a value tree.

use crate::chain::RefChain;
use std::sync::Arc;

/// An assignment, loop, or delete target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    /// A plain name.
    Name(Arc<str>),
    /// An attribute or subscript path (`obj.attr`, `d["x"]`). The last atom
    /// is the stored member; the prefix is resolved through the object
    /// graph.
    Chain(RefChain),
    /// Tuple/list destructuring.
    Tuple(Vec<AssignTarget>),
    /// Starred target inside a destructuring (`a, *rest = ...`).
    Starred(Box<AssignTarget>),
    /// A shape the parser could not reduce. The precheck walker reports a
    /// structural inconsistency when it meets one.
    Opaque(Arc<str>),
}

impl AssignTarget {
    /// Chain target constructor.
    pub fn chain(chain: RefChain) -> Self {
        AssignTarget::Chain(chain)
    }

    /// Name target constructor.
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        AssignTarget::Name(name.into())
    }

    /// The root name read while resolving this target, if any. A plain name
    /// target reads nothing; a chain target reads its root.
    pub fn read_root(&self) -> Option<&Arc<str>> {
        match self {
            AssignTarget::Chain(chain) => chain.root_name(),
            _ => None,
        }
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    /// The statement kind.
    pub kind: StmtKind,
}

impl Stmt {
    /// Create a new statement.
    #[must_use]
    pub fn new(kind: StmtKind) -> Self {
        Stmt { kind }
    }

    /// Whether this statement binds any lvalue.
    pub fn contains_lval(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Assign { .. }
                | StmtKind::AugAssign { .. }
                | StmtKind::For { .. }
                | StmtKind::FunctionDef { .. }
                | StmtKind::ClassDef { .. }
                | StmtKind::Import { .. }
        )
    }

    /// Every name token this statement references, targets included.
    ///
    /// Function bodies are skipped (a def evaluates only its defaults);
    /// loop bodies are walked.
    pub fn referenced_names(&self, out: &mut Vec<Arc<str>>) {
        fn target_names(target: &AssignTarget, out: &mut Vec<Arc<str>>) {
            match target {
                AssignTarget::Name(n) => out.push(n.clone()),
                AssignTarget::Chain(chain) => {
                    if let Some(root) = chain.root_name() {
                        out.push(root.clone());
                    }
                }
                AssignTarget::Tuple(items) => {
                    for item in items {
                        target_names(item, out);
                    }
                }
                AssignTarget::Starred(inner) => target_names(inner, out),
                AssignTarget::Opaque(_) => {}
            }
        }
        fn chain_roots(chains: &[RefChain], out: &mut Vec<Arc<str>>) {
            for chain in chains {
                if let Some(root) = chain.root_name() {
                    out.push(root.clone());
                }
            }
        }
        match &self.kind {
            StmtKind::Assign {
                targets,
                value_refs,
            } => {
                for target in targets {
                    target_names(target, out);
                }
                chain_roots(value_refs, out);
            }
            StmtKind::AugAssign { target, value_refs } => {
                target_names(target, out);
                chain_roots(value_refs, out);
            }
            StmtKind::For {
                target,
                iter_refs,
                body,
            } => {
                target_names(target, out);
                chain_roots(iter_refs, out);
                for stmt in body {
                    stmt.referenced_names(out);
                }
            }
            StmtKind::FunctionDef {
                name, default_refs, ..
            } => {
                out.push(name.clone());
                chain_roots(default_refs, out);
            }
            StmtKind::ClassDef { name, base_refs } => {
                out.push(name.clone());
                chain_roots(base_refs, out);
            }
            StmtKind::Import { names } => out.extend(names.iter().cloned()),
            StmtKind::Delete { targets } => {
                for target in targets {
                    target_names(target, out);
                }
            }
            StmtKind::Expr { refs } => chain_roots(refs, out),
        }
    }
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    /// `target = value` (possibly chained targets).
    Assign {
        /// Assignment targets, left to right.
        targets: Vec<AssignTarget>,
        /// Reference chains read by the right-hand side.
        value_refs: Vec<RefChain>,
    },
    /// `target op= value`.
    AugAssign {
        /// The single target.
        target: AssignTarget,
        /// Reference chains read by the right-hand side.
        value_refs: Vec<RefChain>,
    },
    /// `for target in iter: body`.
    For {
        /// The loop target.
        target: AssignTarget,
        /// Reference chains read by the iterable.
        iter_refs: Vec<RefChain>,
        /// The loop body.
        body: Vec<Stmt>,
    },
    /// A function definition.
    FunctionDef {
        /// The bound name.
        name: Arc<str>,
        /// Chains read by default argument values (evaluated at def time).
        default_refs: Vec<RefChain>,
        /// Live reference chains of the body, resolved lazily at call
        /// boundaries.
        body_refs: Vec<RefChain>,
    },
    /// A class definition. The body executes as separate statements inside
    /// the class scope; only the header is represented here.
    ClassDef {
        /// The bound name.
        name: Arc<str>,
        /// Chains read by base-class expressions and decorators.
        base_refs: Vec<RefChain>,
    },
    /// An import binding one or more names.
    Import {
        /// The bound names.
        names: Vec<Arc<str>>,
    },
    /// `del target, ...`.
    Delete {
        /// The deleted targets.
        targets: Vec<AssignTarget>,
    },
    /// A bare expression statement.
    Expr {
        /// Reference chains the expression reads.
        refs: Vec<RefChain>,
    },
}

/// The statement list of one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellBody {
    /// Top-level statements in execution order.
    pub body: Vec<Stmt>,
}

impl CellBody {
    /// Create a cell body.
    #[must_use]
    pub fn new(body: Vec<Stmt>) -> Self {
        CellBody { body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_lval() {
        let assign = Stmt::new(StmtKind::Assign {
            targets: vec![AssignTarget::name("x")],
            value_refs: vec![],
        });
        assert!(assign.contains_lval());
        let expr = Stmt::new(StmtKind::Expr { refs: vec![] });
        assert!(!expr.contains_lval());
    }

    #[test]
    fn test_referenced_names_skips_function_bodies() {
        let stmt = Stmt::new(StmtKind::FunctionDef {
            name: "f".into(),
            default_refs: vec![RefChain::name("d")],
            body_refs: vec![RefChain::name("hidden")],
        });
        let mut names = Vec::new();
        stmt.referenced_names(&mut names);
        let names: Vec<&str> = names.iter().map(|n| &**n).collect();
        assert_eq!(names, vec!["f", "d"]);
    }

    #[test]
    fn test_referenced_names_walks_loop_body() {
        let stmt = Stmt::new(StmtKind::For {
            target: AssignTarget::name("i"),
            iter_refs: vec![RefChain::name("xs")],
            body: vec![Stmt::new(StmtKind::Expr {
                refs: vec![RefChain::name("total")],
            })],
        });
        let mut names = Vec::new();
        stmt.referenced_names(&mut names);
        let names: Vec<&str> = names.iter().map(|n| &**n).collect();
        assert_eq!(names, vec!["i", "xs", "total"]);
    }
}
