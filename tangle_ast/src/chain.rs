//! Reference chains: flattened attribute/subscript access paths.
//!
//! `d["x"].y` becomes `[Name("d"), Index("x"), Name("y")]`; `f().g` becomes
//! `[Call("f")]` — resolution never looks past a call boundary, so atoms
//! after a call are not recorded.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tangle_core::{IndexKey, MemberKey};

/// One step of a reference chain.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ChainAtom {
    /// A plain name: the chain root, or an attribute access.
    Name(Arc<str>),
    /// A subscript access with a constant index.
    Index(IndexKey),
    /// A call boundary. Carries the callee name token; resolution stops
    /// here and reports the callee separately.
    Call(Arc<str>),
}

impl ChainAtom {
    /// The name token, for name-like atoms.
    pub fn name_token(&self) -> Option<&Arc<str>> {
        match self {
            ChainAtom::Name(n) | ChainAtom::Call(n) => Some(n),
            ChainAtom::Index(_) => None,
        }
    }

    /// The member key this atom addresses, if it is not a call boundary.
    pub fn member_key(&self) -> Option<MemberKey> {
        match self {
            ChainAtom::Name(n) => Some(MemberKey::Field(n.clone())),
            ChainAtom::Index(k) => Some(MemberKey::Index(k.clone())),
            ChainAtom::Call(_) => None,
        }
    }
}

impl fmt::Debug for ChainAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainAtom::Name(n) => write!(f, "{}", n),
            ChainAtom::Index(k) => write!(f, "[{:?}]", k),
            ChainAtom::Call(n) => write!(f, "{}()", n),
        }
    }
}

/// An ordered access path rooted at a scope.
///
/// Chains are the currency of static resolution: the liveness pass derives
/// them from reads, and assignment targets are chains plus a final store
/// key.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct RefChain {
    /// The atoms, outermost first.
    pub atoms: SmallVec<[ChainAtom; 4]>,
}

impl RefChain {
    /// Chain of a bare name.
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        RefChain {
            atoms: smallvec::smallvec![ChainAtom::Name(name.into())],
        }
    }

    /// Chain of a bare call, `f()`.
    pub fn call(name: impl Into<Arc<str>>) -> Self {
        RefChain {
            atoms: smallvec::smallvec![ChainAtom::Call(name.into())],
        }
    }

    /// Chain from explicit atoms.
    pub fn new(atoms: impl IntoIterator<Item = ChainAtom>) -> Self {
        RefChain {
            atoms: atoms.into_iter().collect(),
        }
    }

    /// Extend this chain by an attribute step.
    #[must_use]
    pub fn attr(mut self, name: impl Into<Arc<str>>) -> Self {
        self.atoms.push(ChainAtom::Name(name.into()));
        self
    }

    /// Extend this chain by a subscript step.
    #[must_use]
    pub fn index(mut self, key: impl Into<IndexKey>) -> Self {
        self.atoms.push(ChainAtom::Index(key.into()));
        self
    }

    /// Whether the chain is a single plain name.
    pub fn is_bare_name(&self) -> bool {
        self.atoms.len() == 1 && matches!(self.atoms[0], ChainAtom::Name(_))
    }

    /// The root name token of the chain, if it starts with one.
    pub fn root_name(&self) -> Option<&Arc<str>> {
        self.atoms.first().and_then(ChainAtom::name_token)
    }

    /// Whether the chain contains a call boundary.
    pub fn has_call(&self) -> bool {
        self.atoms.iter().any(|a| matches!(a, ChainAtom::Call(_)))
    }
}

impl fmt::Debug for RefChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for atom in &self.atoms {
            match atom {
                ChainAtom::Name(n) if first => write!(f, "{}", n)?,
                ChainAtom::Name(n) => write!(f, ".{}", n)?,
                ChainAtom::Index(k) => write!(f, "[{:?}]", k)?,
                ChainAtom::Call(n) => write!(f, "{}()", n)?,
            }
            first = false;
        }
        Ok(())
    }
}
