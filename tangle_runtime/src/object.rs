//! Object records of the mirror heap.

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tangle_core::{ContainerKind, IndexKey, ObjectId};

/// Member storage of one object, by addressing style.
///
/// The style is fixed when the object is allocated, mirroring the
/// once-per-object adapter choice the engine makes for namespace scopes.
#[derive(Debug, Clone)]
pub enum ObjectStore {
    /// Named fields.
    Attributes(FxHashMap<Arc<str>, ObjectId>),
    /// Hashable key → element.
    Keyed(FxHashMap<IndexKey, ObjectId>),
    /// Positional elements.
    Sequence(Vec<ObjectId>),
}

impl ObjectStore {
    /// The addressing style of this storage.
    pub fn kind(&self) -> ContainerKind {
        match self {
            ObjectStore::Attributes(_) => ContainerKind::Attributes,
            ObjectStore::Keyed(_) => ContainerKind::KeyIndexed,
            ObjectStore::Sequence(_) => ContainerKind::PositionIndexed,
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        match self {
            ObjectStore::Attributes(fields) => fields.len(),
            ObjectStore::Keyed(map) => map.len(),
            ObjectStore::Sequence(items) => items.len(),
        }
    }

    /// Whether there are no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One object in the mirror heap.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    /// Member storage.
    pub store: ObjectStore,
}

impl ObjectRecord {
    /// A plain attribute-bearing object.
    pub fn plain() -> Self {
        ObjectRecord {
            store: ObjectStore::Attributes(FxHashMap::default()),
        }
    }

    /// An empty key-indexed container.
    pub fn keyed() -> Self {
        ObjectRecord {
            store: ObjectStore::Keyed(FxHashMap::default()),
        }
    }

    /// An empty position-indexed container.
    pub fn sequence() -> Self {
        ObjectRecord {
            store: ObjectStore::Sequence(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kinds() {
        assert_eq!(ObjectRecord::plain().store.kind(), ContainerKind::Attributes);
        assert_eq!(ObjectRecord::keyed().store.kind(), ContainerKind::KeyIndexed);
        assert_eq!(
            ObjectRecord::sequence().store.kind(),
            ContainerKind::PositionIndexed
        );
    }
}
