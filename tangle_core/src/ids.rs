//! Identity newtypes: execution counter values, runtime object identities,
//! and front-end cell ids.

use std::fmt;
use std::sync::Arc;

/// The value of the process-wide execution counter at some point in time.
///
/// Every symbol version field is one of these. `CellNum::ZERO` means
/// "never": a symbol that has never been defined, or a traversal that has
/// walked past the first execution.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CellNum(u32);

impl CellNum {
    /// The "never executed" sentinel.
    pub const ZERO: CellNum = CellNum(0);

    /// The first execution.
    pub const FIRST: CellNum = CellNum(1);

    /// Create from a raw counter value.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        CellNum(raw)
    }

    /// The raw counter value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The next counter value.
    #[inline]
    pub const fn next(self) -> Self {
        CellNum(self.0 + 1)
    }

    /// Whether this is a real execution (not the "never" sentinel).
    #[inline]
    pub const fn is_set(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Debug for CellNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

impl fmt::Display for CellNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identity of one object in the host runtime.
///
/// Identities are opaque to the engine: they are allocated and compared by
/// the host, never dereferenced here. A symbol holding an `ObjectId` owns
/// nothing; liveness is reported through the host boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Placeholder identity used before a namespace is bound to a real
    /// object (a class body that has not finished executing).
    pub const UNBOUND: ObjectId = ObjectId(0);

    /// Create from a raw identity value.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        ObjectId(raw)
    }

    /// The raw identity value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this identity is bound to a real object.
    #[inline]
    pub const fn is_bound(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj@{}", self.0)
    }
}

/// Opaque front-end identifier for a cell in a batch.
///
/// The front end may use any string-shaped id (notebook cell uuids, stringified
/// positions). Ids are compared verbatim.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(Arc<str>);

impl CellId {
    /// Create a cell id.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        CellId(id.into())
    }

    /// The id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CellId {
    fn from(s: &str) -> Self {
        CellId(Arc::from(s))
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell:{}", self.0)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_num_ordering() {
        assert!(CellNum::ZERO < CellNum::FIRST);
        assert_eq!(CellNum::FIRST.next(), CellNum::new(2));
        assert!(!CellNum::ZERO.is_set());
        assert!(CellNum::FIRST.is_set());
    }

    #[test]
    fn test_object_id_bound() {
        assert!(!ObjectId::UNBOUND.is_bound());
        assert!(ObjectId::new(7).is_bound());
    }

    #[test]
    fn test_cell_id_equality() {
        assert_eq!(CellId::from("a"), CellId::new("a"));
        assert_ne!(CellId::from("a"), CellId::from("b"));
    }
}
