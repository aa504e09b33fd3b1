//! The mirror heap: allocation, mutation, and the host oracle.

use crate::object::{ObjectRecord, ObjectStore};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tangle_core::{
    ContainerKind, FrameBindings, HostError, HostRuntime, IndexKey, MemberKey, ObjectId,
    PendingGarbage,
};

/// An in-memory object graph implementing [`HostRuntime`].
///
/// Identities are never reused. Freeing an object marks its identity in the
/// shared pending-garbage set — the same deferred-expiry protocol a real
/// runtime's weak-reference callbacks follow — and later queries against the
/// freed identity report churn instead of answering from stale storage.
pub struct MirrorHeap {
    objects: FxHashMap<ObjectId, ObjectRecord>,
    globals: FxHashMap<Arc<str>, ObjectId>,
    next_id: u64,
    pending: PendingGarbage,
}

impl Default for MirrorHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorHeap {
    /// Create a heap with its own pending-garbage set.
    pub fn new() -> Self {
        Self::with_pending(PendingGarbage::new())
    }

    /// Create a heap marking expiries into an existing pending set.
    pub fn with_pending(pending: PendingGarbage) -> Self {
        MirrorHeap {
            objects: FxHashMap::default(),
            globals: FxHashMap::default(),
            next_id: 1,
            pending,
        }
    }

    /// A handle to the heap's pending-garbage set.
    pub fn pending(&self) -> PendingGarbage {
        self.pending.clone()
    }

    fn alloc(&mut self, record: ObjectRecord) -> ObjectId {
        let id = ObjectId::new(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, record);
        id
    }

    /// Allocate an opaque value (a scalar or any object whose members are
    /// not tracked).
    pub fn new_value(&mut self) -> ObjectId {
        self.alloc(ObjectRecord::plain())
    }

    /// Allocate an attribute-bearing object.
    pub fn new_object(&mut self) -> ObjectId {
        self.alloc(ObjectRecord::plain())
    }

    /// Allocate an empty key-indexed container.
    pub fn new_dict(&mut self) -> ObjectId {
        self.alloc(ObjectRecord::keyed())
    }

    /// Allocate an empty position-indexed container.
    pub fn new_list(&mut self) -> ObjectId {
        self.alloc(ObjectRecord::sequence())
    }

    /// Bind a global name.
    pub fn set_global(&mut self, name: impl Into<Arc<str>>, obj: ObjectId) {
        self.globals.insert(name.into(), obj);
    }

    /// Remove a global binding.
    pub fn del_global(&mut self, name: &str) -> Option<ObjectId> {
        self.globals.remove(name)
    }

    /// Set a named field.
    pub fn set_field(&mut self, obj: ObjectId, name: impl Into<Arc<str>>, value: ObjectId) {
        if let Some(ObjectStore::Attributes(fields)) = self.objects.get_mut(&obj).map(|r| &mut r.store)
        {
            fields.insert(name.into(), value);
        }
    }

    /// Set a keyed element.
    pub fn set_key(&mut self, obj: ObjectId, key: impl Into<IndexKey>, value: ObjectId) {
        if let Some(ObjectStore::Keyed(map)) = self.objects.get_mut(&obj).map(|r| &mut r.store) {
            map.insert(key.into(), value);
        }
    }

    /// Remove a keyed element.
    pub fn remove_key(&mut self, obj: ObjectId, key: &IndexKey) -> Option<ObjectId> {
        match self.objects.get_mut(&obj).map(|r| &mut r.store) {
            Some(ObjectStore::Keyed(map)) => map.remove(key),
            _ => None,
        }
    }

    /// Append to a position-indexed container, returning the new position.
    pub fn push(&mut self, obj: ObjectId, value: ObjectId) -> Option<usize> {
        match self.objects.get_mut(&obj).map(|r| &mut r.store) {
            Some(ObjectStore::Sequence(items)) => {
                items.push(value);
                Some(items.len() - 1)
            }
            _ => None,
        }
    }

    /// Overwrite a positional element.
    pub fn set_index(&mut self, obj: ObjectId, index: usize, value: ObjectId) {
        if let Some(ObjectStore::Sequence(items)) = self.objects.get_mut(&obj).map(|r| &mut r.store)
        {
            if index < items.len() {
                items[index] = value;
            }
        }
    }

    /// Remove the last positional element.
    pub fn pop(&mut self, obj: ObjectId) -> Option<ObjectId> {
        match self.objects.get_mut(&obj).map(|r| &mut r.store) {
            Some(ObjectStore::Sequence(items)) => items.pop(),
            _ => None,
        }
    }

    /// Free an object: its storage is dropped and its identity is marked in
    /// the pending-garbage set for the collector's next boundary sweep.
    pub fn free(&mut self, obj: ObjectId) {
        if self.objects.remove(&obj).is_some() {
            self.pending.mark(obj);
        }
    }

    /// Whether an identity is currently allocated.
    pub fn contains(&self, obj: ObjectId) -> bool {
        self.objects.contains_key(&obj)
    }
}

impl HostRuntime for MirrorHeap {
    fn member(&self, container: ObjectId, key: &MemberKey) -> Result<Option<ObjectId>, HostError> {
        let record = self
            .objects
            .get(&container)
            .ok_or(HostError::IdentityChurn(container))?;
        Ok(match (&record.store, key) {
            (ObjectStore::Attributes(fields), MemberKey::Field(name)) => {
                fields.get(name).copied()
            }
            (ObjectStore::Keyed(map), MemberKey::Index(index)) => map.get(index).copied(),
            (ObjectStore::Sequence(items), MemberKey::Index(IndexKey::Int(i))) => {
                let len = items.len() as i64;
                let pos = if *i < 0 { len + i } else { *i };
                if (0..len).contains(&pos) {
                    Some(items[pos as usize])
                } else {
                    None
                }
            }
            _ => None,
        })
    }

    fn global(&self, name: &str) -> Option<ObjectId> {
        self.globals.get(name).copied()
    }

    fn is_live(&self, obj: ObjectId) -> bool {
        self.objects.contains_key(&obj)
    }

    fn container_kind(&self, obj: ObjectId) -> ContainerKind {
        self.objects
            .get(&obj)
            .map(|r| r.store.kind())
            .unwrap_or(ContainerKind::Attributes)
    }

    fn container_len(&self, obj: ObjectId) -> Result<usize, HostError> {
        let record = self
            .objects
            .get(&obj)
            .ok_or(HostError::IdentityChurn(obj))?;
        Ok(record.store.len())
    }

    fn has_own_field(&self, obj: ObjectId, name: &str) -> bool {
        match self.objects.get(&obj).map(|r| &r.store) {
            Some(ObjectStore::Attributes(fields)) => fields.contains_key(name),
            _ => false,
        }
    }
}

impl FrameBindings for MirrorHeap {
    fn binding(&self, name: &str) -> Option<ObjectId> {
        self.global(name)
    }
}
