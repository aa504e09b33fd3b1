//! Store/delete target resolution.
//!
//! The counterpart of the load path in `resolve`: given an assignment or
//! delete target and the executing frame's bindings, walk the live object
//! graph to the scope and member key the write lands in. Unlike the load
//! path, this walk *materializes* namespace scopes for intermediate
//! objects, and binds implicit symbols for intermediate members that were
//! never assigned through tracked code — the alias table must know about
//! every object a namespace mirrors.

use crate::upsert::{upsert_symbol, UpsertFlags};
use rustc_hash::FxHashSet;
use tangle_ast::{AssignTarget, ChainAtom, RefChain};
use tangle_core::{FrameBindings, HostRuntime, MemberKey, ObjectId, TangleResult};
use tangle_model::scope::ANONYMOUS_SCOPE_NAME;
use tangle_model::{GraphContext, ScopeId};

/// Frame bindings with fallthrough to the host's globals.
pub struct FrameView<'a> {
    frame: Option<&'a dyn FrameBindings>,
    host: &'a dyn HostRuntime,
}

impl<'a> FrameView<'a> {
    /// Create a view over an optional frame.
    pub fn new(frame: Option<&'a dyn FrameBindings>, host: &'a dyn HostRuntime) -> Self {
        FrameView { frame, host }
    }

    /// Resolve a name against the frame, then the globals.
    pub fn binding(&self, name: &str) -> Option<ObjectId> {
        self.frame
            .and_then(|f| f.binding(name))
            .or_else(|| self.host.global(name))
    }
}

/// Where a store or delete lands.
#[derive(Debug, Clone)]
pub struct StoreTarget {
    /// The scope owning the member table.
    pub scope: ScopeId,
    /// The member key within that scope.
    pub key: MemberKey,
    /// The object now bound at the target (stores only; deletes have
    /// nothing there anymore).
    pub obj: Option<ObjectId>,
}

/// The namespace scope mirroring `obj`, created if absent.
///
/// New namespaces take their addressing style from the host once, at
/// creation.
pub fn materialize_namespace(
    ctx: &mut GraphContext,
    host: &dyn HostRuntime,
    obj: ObjectId,
    name: &str,
    parent: ScopeId,
) -> ScopeId {
    if let Some(existing) = ctx.namespace_for(obj) {
        return existing;
    }
    let adapter = host.container_kind(obj);
    let scope = ctx.scopes.make_namespace(parent, name, obj, adapter);
    ctx.register_namespace(obj, scope);
    tracing::debug!(obj = ?obj, name, ?adapter, "materialized namespace scope");
    scope
}

/// Resolve an assignment/delete target to (scope, key, object).
///
/// `want_obj` is false on the delete path, where the member is already
/// gone. Returns `None` for targets that cannot be tracked (a resolution
/// miss, never an error).
pub fn resolve_store_target(
    ctx: &mut GraphContext,
    host: &dyn HostRuntime,
    scope: ScopeId,
    view: &FrameView<'_>,
    target: &AssignTarget,
    want_obj: bool,
) -> TangleResult<Option<StoreTarget>> {
    match target {
        AssignTarget::Name(name) => Ok(Some(StoreTarget {
            scope,
            key: MemberKey::Field(name.clone()),
            obj: view.binding(name),
        })),
        AssignTarget::Chain(chain) => resolve_chain_store(ctx, host, scope, view, chain, want_obj),
        AssignTarget::Starred(inner) => {
            resolve_store_target(ctx, host, scope, view, inner, want_obj)
        }
        AssignTarget::Tuple(_) | AssignTarget::Opaque(_) => Ok(None),
    }
}

fn resolve_chain_store(
    ctx: &mut GraphContext,
    host: &dyn HostRuntime,
    scope: ScopeId,
    view: &FrameView<'_>,
    chain: &RefChain,
    want_obj: bool,
) -> TangleResult<Option<StoreTarget>> {
    let atoms = &chain.atoms;
    let Some(ChainAtom::Name(root)) = atoms.first() else {
        return Ok(None);
    };
    if atoms.len() == 1 {
        return Ok(Some(StoreTarget {
            scope,
            key: MemberKey::Field(root.clone()),
            obj: view.binding(root),
        }));
    }
    let Some(mut cur_obj) = view.binding(root) else {
        return Ok(None);
    };

    // the root must be aliased for its namespace to stay collectable
    let root_key = MemberKey::Field(root.clone());
    if ctx
        .scopes
        .lookup_this_level(host, scope, &root_key, true)
        .is_none()
    {
        upsert_symbol(
            ctx,
            host,
            scope,
            root_key,
            cur_obj,
            FxHashSet::default(),
            UpsertFlags::implicit(),
        )?;
    }
    let mut container = materialize_namespace(ctx, host, cur_obj, root, scope);

    for atom in &atoms[1..atoms.len() - 1] {
        let Some(key) = atom.member_key() else {
            // call boundaries cannot appear in a store target
            return Ok(None);
        };
        let Some(next_obj) = host.member(cur_obj, &key)? else {
            return Ok(None);
        };
        if ctx
            .scopes
            .lookup_this_level(host, container, &key, true)
            .is_none()
        {
            upsert_symbol(
                ctx,
                host,
                container,
                key.clone(),
                next_obj,
                FxHashSet::default(),
                UpsertFlags::implicit(),
            )?;
        }
        let name = match atom {
            ChainAtom::Name(n) => n.to_string(),
            ChainAtom::Index(k) => k.to_string(),
            ChainAtom::Call(_) => unreachable!("call atoms have no member key"),
        };
        container = materialize_namespace(ctx, host, next_obj, &name, container);
        cur_obj = next_obj;
    }

    let Some(key) = atoms.last().and_then(ChainAtom::member_key) else {
        return Ok(None);
    };
    let obj = if want_obj {
        host.member(cur_obj, &key)?
    } else {
        None
    };
    Ok(Some(StoreTarget {
        scope: container,
        key,
        obj,
    }))
}

/// Rename an anonymous namespace after the object it mirrors is first
/// bound to a real name.
pub fn fixup_literal_namespace(ctx: &mut GraphContext, obj: ObjectId, name: &str, parent: ScopeId) {
    let Some(ns_scope) = ctx.namespace_for(obj) else {
        return;
    };
    if let Some(data) = ctx.scopes.get_mut(ns_scope) {
        if &*data.name == ANONYMOUS_SCOPE_NAME {
            data.name = name.into();
            data.parent = Some(parent);
        }
    }
}
