//! Upserting symbols into scopes.
//!
//! The single entry point through which assignments, imports, definitions,
//! and mutation-created elements land in the graph. An existing symbol at
//! the same (scope, key, kind) is updated in place when its scope is
//! globally reachable; a kind mismatch instead threads the old symbol in as
//! an explicit dependency of a fresh one, which is how "class attribute
//! read through an instance before being shadowed" keeps its history.

use crate::propagate::{update_deps, DepUpdate};
use rustc_hash::FxHashSet;
use tangle_ast::RefChain;
use tangle_core::{HostRuntime, IndexKey, MemberKey, ObjectId, TangleResult};
use tangle_model::{
    FunctionData, GraphContext, KindHints, ScopeId, Symbol, SymbolId, SymbolKind,
};

/// Flags for one upsert.
#[derive(Debug, Clone, Default)]
pub struct UpsertFlags {
    /// Replace the parent set (a genuine reassignment) instead of unioning.
    pub overwrite: bool,
    /// Push staleness to dependents afterwards.
    pub propagate: bool,
    /// The symbol is being materialized by the resolver, not by user code.
    pub implicit: bool,
    /// Kind hints from the execution layer.
    pub hints: KindHints,
    /// Live reference chains of a function body, for function definitions.
    pub function_body: Option<Vec<RefChain>>,
}

impl UpsertFlags {
    /// A plain assignment.
    pub fn assign() -> Self {
        UpsertFlags {
            overwrite: true,
            propagate: true,
            ..Default::default()
        }
    }

    /// An augmented assignment: parents accumulate.
    pub fn augment() -> Self {
        UpsertFlags {
            overwrite: false,
            propagate: true,
            ..Default::default()
        }
    }

    /// An assignment that must not disturb dependents (loop targets,
    /// starred unpacks, resync).
    pub fn quiet() -> Self {
        UpsertFlags {
            overwrite: true,
            propagate: false,
            ..Default::default()
        }
    }

    /// A resolver-materialized binding.
    pub fn implicit() -> Self {
        UpsertFlags {
            overwrite: true,
            propagate: false,
            implicit: true,
            ..Default::default()
        }
    }

    /// A function definition carrying its body's live references.
    pub fn function_def(body_refs: Vec<RefChain>) -> Self {
        UpsertFlags {
            overwrite: true,
            propagate: true,
            hints: KindHints {
                is_function_def: true,
                ..Default::default()
            },
            function_body: Some(body_refs),
            ..Default::default()
        }
    }

    /// An import binding.
    pub fn import() -> Self {
        UpsertFlags {
            overwrite: true,
            propagate: true,
            hints: KindHints {
                is_import: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// A class definition bound to its body's namespace scope.
    pub fn class_def(class_scope: ScopeId) -> Self {
        UpsertFlags {
            overwrite: true,
            propagate: true,
            hints: KindHints {
                class_scope: Some(class_scope),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Create or update the symbol for `key` in `scope`, bound to `obj` and
/// computed from `deps`. Always finalizes through
/// [`update_deps`](crate::propagate::update_deps).
pub fn upsert_symbol(
    ctx: &mut GraphContext,
    host: &dyn HostRuntime,
    scope: ScopeId,
    key: MemberKey,
    obj: ObjectId,
    mut deps: FxHashSet<SymbolId>,
    flags: UpsertFlags,
) -> TangleResult<SymbolId> {
    let mut hints = flags.hints.clone();
    hints.is_subscript = key.is_subscript();
    let kind = SymbolKind::resolve(&hints)?;

    let existing = ctx.scopes.lookup_this_level(host, scope, &key, true);
    if flags.implicit && kind != SymbolKind::Anonymous {
        debug_assert!(existing.is_none(), "implicit upsert over an existing symbol");
    }

    if let Some(old_id) = existing {
        if ctx.scopes.is_globally_accessible(scope) {
            let old_kind = ctx.sym(old_id).map(|s| s.kind);
            if old_kind == Some(kind) {
                // in-place update: rebind the value, bump versions
                if let Some(prev) = ctx.sym(old_id).map(|s| s.obj) {
                    ctx.aliases.rebind(old_id, prev, obj);
                    if let Some(s) = ctx.sym_mut(old_id) {
                        s.cached_obj = prev;
                        s.obj = obj;
                    }
                }
                update_deps(
                    ctx,
                    old_id,
                    &deps,
                    DepUpdate {
                        overwrite: flags.overwrite,
                        propagate: flags.propagate,
                        ..Default::default()
                    },
                );
                if let Some(s) = ctx.sym_mut(old_id) {
                    s.cached_obj = s.obj;
                    s.implicit = false;
                }
                return Ok(old_id);
            }
            // kind mismatch: the displaced symbol becomes an explicit
            // dependency of its replacement
            deps.insert(old_id);
        }
    }

    // assigning into a clone where the origin carries the same member:
    // the origin's symbol still feeds the new one
    if kind == SymbolKind::Default {
        let origin = ctx
            .scopes
            .get(scope)
            .and_then(|s| s.ns.as_ref())
            .and_then(|ns| ns.cloned_from);
        if let Some(origin) = origin {
            if let Some(origin_member) = ctx.scopes.lookup_this_level(host, origin, &key, false) {
                deps.insert(origin_member);
            }
        }
    }

    let mut sym = Symbol::new(key.clone(), kind, scope, obj);
    sym.implicit = flags.implicit;
    if kind == SymbolKind::Function {
        let name = key
            .as_field()
            .cloned()
            .unwrap_or_else(|| std::sync::Arc::from("<lambda>"));
        let call_scope = ctx.scopes.make_child_scope(scope, name);
        sym.function = Some(FunctionData {
            call_scope,
            body_refs: flags.function_body.clone().unwrap_or_default(),
        });
    }
    let id = ctx.symbols.insert(sym);
    ctx.scopes.put(scope, &key, id)?;
    ctx.aliases.add(obj, id);

    update_deps(
        ctx,
        id,
        &deps,
        DepUpdate {
            overwrite: flags.overwrite,
            propagate: flags.propagate,
            ..Default::default()
        },
    );
    Ok(id)
}

/// Delete the symbol for `key` from `scope`.
///
/// A position-indexed delete of `[-1]` whose element is already gone from
/// the shrunk container falls back to the old tail position.
pub fn delete_symbol(
    ctx: &mut GraphContext,
    host: &dyn HostRuntime,
    scope: ScopeId,
    key: &MemberKey,
) -> Option<SymbolId> {
    let mut removed = ctx.scopes.remove(scope, key);
    if removed.is_none() {
        if let MemberKey::Index(IndexKey::Int(-1)) = key {
            let tail = ctx
                .scopes
                .get(scope)
                .and_then(|s| s.ns.as_ref())
                .and_then(|ns| host.container_len(ns.object_id).ok());
            if let Some(len) = tail {
                // the element was already popped, so the old tail is len
                removed = ctx
                    .scopes
                    .remove(scope, &MemberKey::index(IndexKey::Int(len as i64)));
            }
        }
    }
    let id = removed?;
    update_deps(ctx, id, &FxHashSet::default(), DepUpdate::deletion());
    tracing::debug!(sym = ?id, key = ?key, "deleted binding");
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_core::{ContainerKind, HostError};

    struct NoHost;

    impl HostRuntime for NoHost {
        fn member(&self, _c: ObjectId, _k: &MemberKey) -> Result<Option<ObjectId>, HostError> {
            Ok(None)
        }
        fn global(&self, _n: &str) -> Option<ObjectId> {
            None
        }
        fn is_live(&self, _o: ObjectId) -> bool {
            true
        }
        fn container_kind(&self, _o: ObjectId) -> ContainerKind {
            ContainerKind::Attributes
        }
        fn container_len(&self, _o: ObjectId) -> Result<usize, HostError> {
            Ok(0)
        }
        fn has_own_field(&self, _o: ObjectId, _n: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_upsert_then_update_in_place() {
        let mut ctx = GraphContext::new();
        let global = ctx.global_scope();
        let first = upsert_symbol(
            &mut ctx,
            &NoHost,
            global,
            MemberKey::field("x"),
            ObjectId::new(1),
            FxHashSet::default(),
            UpsertFlags::assign(),
        )
        .unwrap();
        ctx.advance_counter();
        let second = upsert_symbol(
            &mut ctx,
            &NoHost,
            global,
            MemberKey::field("x"),
            ObjectId::new(2),
            FxHashSet::default(),
            UpsertFlags::assign(),
        )
        .unwrap();
        assert_eq!(first, second);
        let sym = ctx.sym(first).unwrap();
        assert_eq!(sym.obj, ObjectId::new(2));
        assert_eq!(sym.defined_cell.raw(), 2);
        assert!(ctx.aliases.contains(ObjectId::new(2), first));
        assert!(!ctx.aliases.contains(ObjectId::new(1), first));
    }

    #[test]
    fn test_kind_mismatch_creates_dependent_replacement() {
        let mut ctx = GraphContext::new();
        let global = ctx.global_scope();
        let func = upsert_symbol(
            &mut ctx,
            &NoHost,
            global,
            MemberKey::field("f"),
            ObjectId::new(1),
            FxHashSet::default(),
            UpsertFlags::function_def(vec![]),
        )
        .unwrap();
        ctx.advance_counter();
        let replacement = upsert_symbol(
            &mut ctx,
            &NoHost,
            global,
            MemberKey::field("f"),
            ObjectId::new(2),
            FxHashSet::default(),
            UpsertFlags::assign(),
        )
        .unwrap();
        assert_ne!(func, replacement);
        assert!(ctx.sym(replacement).unwrap().parents.contains(&func));
        assert_eq!(ctx.sym(replacement).unwrap().kind, SymbolKind::Default);
    }

    #[test]
    fn test_function_def_gets_call_scope() {
        let mut ctx = GraphContext::new();
        let global = ctx.global_scope();
        let f = upsert_symbol(
            &mut ctx,
            &NoHost,
            global,
            MemberKey::field("f"),
            ObjectId::new(1),
            FxHashSet::default(),
            UpsertFlags::function_def(vec![RefChain::name("g")]),
        )
        .unwrap();
        let data = ctx.sym(f).unwrap().function.as_ref().unwrap();
        assert_eq!(data.body_refs.len(), 1);
        assert!(ctx.scopes.get(data.call_scope).is_some());
    }

    #[test]
    fn test_call_scope_upserts_always_create() {
        let mut ctx = GraphContext::new();
        let global = ctx.global_scope();
        let frame = ctx.scopes.make_child_scope(global, "f");
        let a = upsert_symbol(
            &mut ctx,
            &NoHost,
            frame,
            MemberKey::field("local"),
            ObjectId::new(1),
            FxHashSet::default(),
            UpsertFlags::assign(),
        )
        .unwrap();
        let b = upsert_symbol(
            &mut ctx,
            &NoHost,
            frame,
            MemberKey::field("local"),
            ObjectId::new(2),
            FxHashSet::default(),
            UpsertFlags::assign(),
        )
        .unwrap();
        // frame scopes are not globally reachable: no in-place update
        assert_ne!(a, b);
    }

    #[test]
    fn test_delete_freezes_and_tombstones() {
        let mut ctx = GraphContext::new();
        let global = ctx.global_scope();
        let x = upsert_symbol(
            &mut ctx,
            &NoHost,
            global,
            MemberKey::field("x"),
            ObjectId::new(1),
            FxHashSet::default(),
            UpsertFlags::assign(),
        )
        .unwrap();
        let deleted = delete_symbol(&mut ctx, &NoHost, global, &MemberKey::field("x"));
        assert_eq!(deleted, Some(x));
        assert!(ctx.sym(x).unwrap().tombstoned);
        assert!(ctx
            .scopes
            .lookup_this_level(&NoHost, global, &MemberKey::field("x"), true)
            .is_none());
    }
}
