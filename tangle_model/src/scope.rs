//! Scopes and namespace scopes.
//!
//! A plain scope is an ordered name→symbol table with a parent link
//! (module → function → class nesting). A namespace scope is additionally
//! bound to the identity of one runtime object and carries a second,
//! independent member table for subscript elements. Namespace members are
//! never implicitly visible to nested lexical scopes: name lookup walks the
//! parent chain but skips namespace ancestors.
//!
//! Instance namespaces are *clones* of their class's namespace: an origin
//! pointer plus fallback lookup, never a copy. The fallback fires only when
//! the name is absent both from the clone's table and from the live
//! object's own storage, which encodes "instance attribute shadows class
//! attribute".

use crate::arena::{Arena, Id};
use crate::symbol::SymbolId;
use crate::FxIndexMap;
use std::sync::Arc;
use tangle_core::{
    CellNum, ContainerKind, HostRuntime, IndexKey, MemberKey, ObjectId, TangleError, TangleResult,
};

/// Id of a scope in the scope tree.
pub type ScopeId = Id<ScopeData>;

/// Name of the single global scope.
pub const GLOBAL_SCOPE_NAME: &str = "<module>";

/// Name given to namespaces that have not been reached through a named
/// binding yet.
pub const ANONYMOUS_SCOPE_NAME: &str = "<anonymous>";

/// Namespace payload of a scope bound to one runtime object.
#[derive(Debug)]
pub struct NamespaceData {
    /// Identity of the bound object; the key in the namespace registry.
    pub object_id: ObjectId,
    /// Member-addressing style, chosen once at creation.
    pub adapter: ContainerKind,
    /// Origin namespace when this one is an instance clone.
    pub cloned_from: Option<ScopeId>,
    /// Namespaces cloned from this one.
    pub child_clones: Vec<ScopeId>,
    /// The bound object expired; destruction is deferred to the collector.
    pub tombstoned: bool,
    /// Latest cell in which any member of this namespace was touched.
    pub max_defined_cell: CellNum,
    /// Subscript-style member table, insertion-ordered.
    pub(crate) subscripts: FxIndexMap<IndexKey, SymbolId>,
}

impl NamespaceData {
    fn new(object_id: ObjectId, adapter: ContainerKind) -> Self {
        NamespaceData {
            object_id,
            adapter,
            cloned_from: None,
            child_clones: Vec::new(),
            tombstoned: false,
            max_defined_cell: CellNum::ZERO,
            subscripts: FxIndexMap::default(),
        }
    }
}

/// One scope record.
#[derive(Debug)]
pub struct ScopeData {
    /// Scope name (binding name, or `<module>` / `<anonymous>`).
    pub name: Arc<str>,
    /// Parent scope; `None` only for the global scope.
    pub parent: Option<ScopeId>,
    /// Attribute-style member table, insertion-ordered.
    pub(crate) fields: FxIndexMap<Arc<str>, SymbolId>,
    /// Namespace payload, when this scope mirrors a runtime object.
    pub ns: Option<NamespaceData>,
}

impl ScopeData {
    /// Whether this is the global scope.
    #[inline]
    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether this scope mirrors a runtime object.
    #[inline]
    pub fn is_namespace(&self) -> bool {
        self.ns.is_some()
    }

    /// Attribute-style members in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&Arc<str>, SymbolId)> {
        self.fields.iter().map(|(k, v)| (k, *v))
    }

    /// Subscript-style members in insertion order (empty for plain scopes).
    pub fn subscripts(&self) -> impl Iterator<Item = (&IndexKey, SymbolId)> {
        self.ns
            .iter()
            .flat_map(|ns| ns.subscripts.iter().map(|(k, v)| (k, *v)))
    }
}

/// The scope arena plus the distinguished global scope.
pub struct ScopeTree {
    scopes: Arena<ScopeData>,
    global: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// Create a tree holding only the global scope.
    pub fn new() -> Self {
        let mut scopes = Arena::new();
        let global = scopes.insert(ScopeData {
            name: Arc::from(GLOBAL_SCOPE_NAME),
            parent: None,
            fields: FxIndexMap::default(),
            ns: None,
        });
        ScopeTree { scopes, global }
    }

    /// The global scope.
    #[inline]
    pub fn global(&self) -> ScopeId {
        self.global
    }

    /// Borrow a scope.
    #[inline]
    pub fn get(&self, id: ScopeId) -> Option<&ScopeData> {
        self.scopes.get(id)
    }

    /// Mutably borrow a scope.
    #[inline]
    pub fn get_mut(&mut self, id: ScopeId) -> Option<&mut ScopeData> {
        self.scopes.get_mut(id)
    }

    /// Ids of all scopes.
    pub fn ids(&self) -> Vec<ScopeId> {
        self.scopes.ids()
    }

    /// Create a plain child scope (function body, nested lexical scope).
    pub fn make_child_scope(&mut self, parent: ScopeId, name: impl Into<Arc<str>>) -> ScopeId {
        self.scopes.insert(ScopeData {
            name: name.into(),
            parent: Some(parent),
            fields: FxIndexMap::default(),
            ns: None,
        })
    }

    /// Create a namespace scope bound to `obj`.
    pub fn make_namespace(
        &mut self,
        parent: ScopeId,
        name: impl Into<Arc<str>>,
        obj: ObjectId,
        adapter: ContainerKind,
    ) -> ScopeId {
        self.scopes.insert(ScopeData {
            name: name.into(),
            parent: Some(parent),
            fields: FxIndexMap::default(),
            ns: Some(NamespaceData::new(obj, adapter)),
        })
    }

    /// Clone a namespace for a new object (class namespace → instance
    /// namespace). The clone starts with empty member tables and falls back
    /// to `origin` on lookup.
    pub fn make_clone(&mut self, origin: ScopeId, obj: ObjectId) -> Option<ScopeId> {
        let (name, parent, adapter) = {
            let data = self.scopes.get(origin)?;
            let ns = data.ns.as_ref()?;
            (data.name.clone(), data.parent, ns.adapter)
        };
        let clone = self.scopes.insert(ScopeData {
            name,
            parent,
            fields: FxIndexMap::default(),
            ns: Some(NamespaceData {
                cloned_from: Some(origin),
                ..NamespaceData::new(obj, adapter)
            }),
        });
        if let Some(origin_ns) = self.scopes.get_mut(origin).and_then(|s| s.ns.as_mut()) {
            origin_ns.child_clones.push(clone);
        }
        Some(clone)
    }

    /// Whether symbols in this scope survive the executing statement
    /// (the scope is the global scope, or a namespace chain hanging off
    /// it). Call-frame scopes are not globally accessible.
    pub fn is_globally_accessible(&self, id: ScopeId) -> bool {
        let Some(data) = self.scopes.get(id) else {
            return false;
        };
        if data.is_global() {
            return true;
        }
        if !data.is_namespace() {
            return false;
        }
        data.parent
            .map(|p| self.is_globally_accessible(p))
            .unwrap_or(false)
    }

    /// The nearest enclosing scope that is not a namespace scope.
    ///
    /// A scope nested inside a namespace scope has no unqualified access to
    /// the namespace's members, so name lookup continues here.
    pub fn non_namespace_parent(&self, id: ScopeId) -> Option<ScopeId> {
        let data = self.scopes.get(id)?;
        let parent = data.parent?;
        let parent_data = self.scopes.get(parent)?;
        if parent_data.is_namespace() && !parent_data.is_global() {
            self.non_namespace_parent(parent)
        } else {
            Some(parent)
        }
    }

    /// The chain of namespace scopes enclosing `id`, innermost first:
    /// `id` itself if it is a namespace, then each namespace parent.
    pub fn namespace_chain(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut chain = Vec::new();
        let mut cur = Some(id);
        while let Some(scope) = cur {
            let Some(data) = self.scopes.get(scope) else {
                break;
            };
            if !data.is_namespace() {
                break;
            }
            chain.push(scope);
            cur = data.parent;
        }
        chain
    }

    /// Look a member up in this scope only.
    ///
    /// For attribute keys on an instance clone, falls back to the clone
    /// origin unless `skip_cloned` is set — and only when the live object
    /// does not shadow the name with its own storage.
    pub fn lookup_this_level(
        &self,
        host: &dyn HostRuntime,
        scope: ScopeId,
        key: &MemberKey,
        skip_cloned: bool,
    ) -> Option<SymbolId> {
        let data = self.scopes.get(scope)?;
        match key {
            MemberKey::Field(name) => {
                if let Some(found) = data.fields.get(name) {
                    return Some(*found);
                }
                let ns = data.ns.as_ref()?;
                let origin = ns.cloned_from?;
                if skip_cloned || host.has_own_field(ns.object_id, name) {
                    return None;
                }
                self.lookup_this_level(host, origin, key, false)
            }
            MemberKey::Index(index) => data.ns.as_ref()?.subscripts.get(index).copied(),
        }
    }

    /// Look a member up here, then along the non-namespace parent chain.
    pub fn lookup_name(
        &self,
        host: &dyn HostRuntime,
        scope: ScopeId,
        key: &MemberKey,
    ) -> Option<SymbolId> {
        if let Some(found) = self.lookup_this_level(host, scope, key, false) {
            return Some(found);
        }
        let parent = self.non_namespace_parent(scope)?;
        self.lookup_name(host, parent, key)
    }

    /// The raw table entry for `key`, with no clone fallback and no parent
    /// walk.
    pub fn member_entry(&self, scope: ScopeId, key: &MemberKey) -> Option<SymbolId> {
        let data = self.scopes.get(scope)?;
        match key {
            MemberKey::Field(name) => data.fields.get(name).copied(),
            MemberKey::Index(index) => data.ns.as_ref()?.subscripts.get(index).copied(),
        }
    }

    /// Insert a member symbol into the scope's table for `key`.
    ///
    /// Subscript keys require a namespace scope; storing one elsewhere is a
    /// caller bug surfaced as a contract violation.
    pub fn put(&mut self, scope: ScopeId, key: &MemberKey, sym: SymbolId) -> TangleResult<()> {
        let data = self
            .scopes
            .get_mut(scope)
            .ok_or(TangleError::Contract("put into a collected scope"))?;
        match key {
            MemberKey::Field(name) => {
                data.fields.insert(name.clone(), sym);
                Ok(())
            }
            MemberKey::Index(index) => match data.ns.as_mut() {
                Some(ns) => {
                    ns.subscripts.insert(index.clone(), sym);
                    Ok(())
                }
                None => Err(TangleError::Contract(
                    "only namespace scopes carry subscript members",
                )),
            },
        }
    }

    /// Remove a member symbol from the scope's table for `key`.
    pub fn remove(&mut self, scope: ScopeId, key: &MemberKey) -> Option<SymbolId> {
        let data = self.scopes.get_mut(scope)?;
        match key {
            MemberKey::Field(name) => data.fields.shift_remove(name),
            MemberKey::Index(index) => data.ns.as_mut()?.subscripts.shift_remove(index),
        }
    }

    /// Clear both member tables of a scope, returning the evicted symbols.
    pub fn clear_members(&mut self, scope: ScopeId) -> Vec<SymbolId> {
        let Some(data) = self.scopes.get_mut(scope) else {
            return Vec::new();
        };
        let mut evicted: Vec<SymbolId> = data.fields.drain(..).map(|(_, v)| v).collect();
        if let Some(ns) = data.ns.as_mut() {
            evicted.extend(ns.subscripts.drain(..).map(|(_, v)| v));
        }
        evicted
    }

    /// Bump a namespace's touch watermark.
    pub fn bump_watermark(&mut self, scope: ScopeId, cell: CellNum) {
        if let Some(ns) = self.scopes.get_mut(scope).and_then(|s| s.ns.as_mut()) {
            if ns.max_defined_cell < cell {
                ns.max_defined_cell = cell;
            }
        }
    }

    /// Remove a scope record entirely. The caller is responsible for the
    /// member symbols.
    pub fn discard(&mut self, scope: ScopeId) -> Option<ScopeData> {
        if scope == self.global {
            return None;
        }
        self.scopes.remove(scope)
    }

    /// Whether a containing scope has been tombstoned or collected.
    pub fn scope_is_garbage(&self, id: ScopeId) -> bool {
        match self.scopes.get(id) {
            None => true,
            Some(data) => data.ns.as_ref().map(|ns| ns.tombstoned).unwrap_or(false),
        }
    }
}
