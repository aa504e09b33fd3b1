//! Member keys: how one step into a container or namespace is addressed.
//!
//! A namespace scope keeps two independent member tables: attribute-style
//! members keyed by name, and subscript-style members keyed by index. The
//! split is enforced in the type system: an `IndexKey` can never land in an
//! attribute table and a field name can never land in a subscript table.

use std::fmt;
use std::sync::Arc;

/// A subscript index: the key under which a container element is tracked.
///
/// Only hashable constant indices are modeled; a computed index resolves to
/// nothing at the static layer and is tracked dynamically instead.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    /// Integer index (list position or int dict key).
    Int(i64),
    /// String key.
    Str(Arc<str>),
}

impl IndexKey {
    /// String key constructor.
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        IndexKey::Str(s.into())
    }

    /// The integer value, if this is an integer index.
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            IndexKey::Int(i) => Some(*i),
            IndexKey::Str(_) => None,
        }
    }
}

impl From<i64> for IndexKey {
    fn from(i: i64) -> Self {
        IndexKey::Int(i)
    }
}

impl From<&str> for IndexKey {
    fn from(s: &str) -> Self {
        IndexKey::Str(Arc::from(s))
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Int(i) => write!(f, "{}", i),
            IndexKey::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Int(i) => write!(f, "{}", i),
            IndexKey::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// One addressing step: a named field or a subscript index.
///
/// This is both the identity of a symbol within its scope and the key handed
/// to the host runtime when walking the live object graph.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum MemberKey {
    /// Attribute-style member (`obj.name`, or a plain variable name).
    Field(Arc<str>),
    /// Subscript-style member (`obj[index]`).
    Index(IndexKey),
}

impl MemberKey {
    /// Field constructor.
    pub fn field(name: impl Into<Arc<str>>) -> Self {
        MemberKey::Field(name.into())
    }

    /// Subscript constructor.
    pub fn index(key: impl Into<IndexKey>) -> Self {
        MemberKey::Index(key.into())
    }

    /// Whether this key addresses the subscript table.
    #[inline]
    pub fn is_subscript(&self) -> bool {
        matches!(self, MemberKey::Index(_))
    }

    /// The field name, if this is an attribute-style key.
    #[inline]
    pub fn as_field(&self) -> Option<&Arc<str>> {
        match self {
            MemberKey::Field(name) => Some(name),
            MemberKey::Index(_) => None,
        }
    }

    /// The index, if this is a subscript-style key.
    #[inline]
    pub fn as_index(&self) -> Option<&IndexKey> {
        match self {
            MemberKey::Field(_) => None,
            MemberKey::Index(key) => Some(key),
        }
    }
}

impl fmt::Debug for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKey::Field(name) => write!(f, ".{}", name),
            MemberKey::Index(key) => write!(f, "[{:?}]", key),
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKey::Field(name) => f.write_str(name),
            MemberKey::Index(key) => write!(f, "[{}]", key),
        }
    }
}
