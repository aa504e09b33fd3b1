//! The host-runtime boundary.
//!
//! The engine never owns runtime objects. It sees the live object graph
//! through [`HostRuntime`]: an oracle answering identity, membership, and
//! liveness queries. The host also owns the expiry side channel: when an
//! object becomes unreachable it marks the identity in a shared
//! [`PendingGarbage`] set, and the collector drains that set at the next
//! unit boundary. Expiry callbacks may fire on foreign call stacks
//! (including teardown), so the pending set is the only lock-guarded state
//! in the system and marking never mutates engine tables directly.

use crate::error::HostError;
use crate::ids::ObjectId;
use crate::key::MemberKey;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// How an object's members are addressed.
///
/// Chosen once per object when its namespace scope is created, never
/// re-dispatched per access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Attribute-bearing object: members are named fields.
    Attributes,
    /// Key-indexed container: members are addressed by hashable key.
    KeyIndexed,
    /// Position-indexed container: members are addressed by position.
    PositionIndexed,
}

/// Oracle over the live object graph of the host runtime.
///
/// All queries are read-only and answer about the graph *as it currently
/// is*; the engine calls them only between statements of the executing unit,
/// so the single-writer discipline guarantees a consistent view.
pub trait HostRuntime {
    /// Resolve one member step from `container`.
    ///
    /// `Ok(None)` means the member does not exist (an ordinary resolution
    /// miss). `Err` is reserved for identity churn observed mid-step.
    fn member(&self, container: ObjectId, key: &MemberKey) -> Result<Option<ObjectId>, HostError>;

    /// Look up a top-level (global) binding by name.
    fn global(&self, name: &str) -> Option<ObjectId>;

    /// Whether the object behind this identity is still reachable.
    fn is_live(&self, obj: ObjectId) -> bool;

    /// The member-addressing style of this object.
    fn container_kind(&self, obj: ObjectId) -> ContainerKind;

    /// Element count of a position- or key-indexed container.
    fn container_len(&self, obj: ObjectId) -> Result<usize, HostError>;

    /// Whether the object carries `name` in its *own* storage (not through
    /// its class). Used to decide when an instance namespace may fall back
    /// to its clone origin.
    fn has_own_field(&self, obj: ObjectId, name: &str) -> bool;
}

/// The bindings of one call frame, keyed by name.
///
/// Delivered alongside every statement boundary; for module-level code the
/// frame is the global namespace itself.
pub trait FrameBindings {
    /// The object currently bound to `name` in this frame, if any.
    fn binding(&self, name: &str) -> Option<ObjectId>;
}

impl FrameBindings for rustc_hash::FxHashMap<Arc<str>, ObjectId> {
    fn binding(&self, name: &str) -> Option<ObjectId> {
        self.get(name).copied()
    }
}

/// Shared set of object identities whose backing objects have expired.
///
/// Cloned handles all point at the same set. The host marks; the collector
/// drains. Marking is safe from any context because it only touches this
/// set.
#[derive(Clone, Default)]
pub struct PendingGarbage {
    inner: Arc<Mutex<FxHashSet<ObjectId>>>,
}

impl PendingGarbage {
    /// Create an empty pending set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an identity as expired.
    pub fn mark(&self, obj: ObjectId) {
        self.inner.lock().insert(obj);
    }

    /// Take every pending identity, leaving the set empty.
    pub fn drain(&self) -> Vec<ObjectId> {
        self.inner.lock().drain().collect()
    }

    /// Whether anything is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl std::fmt::Debug for PendingGarbage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = self.inner.lock();
        write!(f, "PendingGarbage({} pending)", set.len())
    }
}
