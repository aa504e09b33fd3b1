//! The per-cell contract with the parser.

use crate::ast::CellBody;
use crate::chain::RefChain;
use std::sync::Arc;

/// Live and dead reference sets for one cell, as derived by the parser's
/// liveness pass.
///
/// *Live* references are reads that may observe state from earlier cells
/// (read before any same-cell write). *Dead* references are bindings the
/// cell writes — the names and members whose previous values the cell
/// kills.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellRefs {
    /// References read from prior state.
    pub live: Vec<RefChain>,
    /// References overwritten by this cell.
    pub dead: Vec<RefChain>,
}

impl CellRefs {
    /// Create reference sets.
    #[must_use]
    pub fn new(live: Vec<RefChain>, dead: Vec<RefChain>) -> Self {
        CellRefs { live, dead }
    }
}

/// One cell's source plus its parsed syntax information.
///
/// Produced by the external parser. A cell whose source fails to parse is
/// simply not represented; batch operations skip it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCell {
    /// The original source text, kept for provenance reporting.
    pub source: Arc<str>,
    /// The reduced statement tree.
    pub body: CellBody,
    /// Live/dead reference sets.
    pub refs: CellRefs,
}

impl ParsedCell {
    /// Create a parsed cell.
    #[must_use]
    pub fn new(source: impl Into<Arc<str>>, body: CellBody, refs: CellRefs) -> Self {
        ParsedCell {
            source: source.into(),
            body,
            refs,
        }
    }

    /// A cell with syntax information but no statement tree (reference
    /// resolution only).
    #[must_use]
    pub fn refs_only(source: impl Into<Arc<str>>, refs: CellRefs) -> Self {
        ParsedCell {
            source: source.into(),
            body: CellBody::default(),
            refs,
        }
    }
}
