//! Namespace behavior: class/instance shadowing, literal namespaces,
//! mutation freshness through aliases, and collector liveness.

mod common;

use common::{assign_stmt, chain_assign_stmt, expr_stmt, parsed, run_cell, tracker};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tangle_ast::{RefChain, Stmt, StmtKind};
use tangle_core::{CellId, FrameBindings, IndexKey, MutationKind, ObjectId};
use tangle_engine::resolve;
use tangle_engine::BatchEntry;

// =============================================================================
// Class / instance shadowing
// =============================================================================

#[test]
fn test_instance_attribute_shadows_class_attribute() {
    let mut t = tracker();

    // cell 1: class Foo: shared = 99
    let foo_cls = t.host_mut().new_object();
    let shared_obj = t.host_mut().new_value();
    let class_cell = parsed(
        "class Foo:\n    shared = 99",
        vec![Stmt::new(StmtKind::ClassDef {
            name: "Foo".into(),
            base_refs: vec![],
        })],
        vec![],
        vec![RefChain::name("Foo")],
    );
    let ready = t.precheck_cell(&class_cell).unwrap();
    assert!(!ready.is_refused());
    t.begin_cell(&class_cell);
    let class_scope = t.class_body_scope(t.global_scope(), "Foo");
    // the class body executes with its own frame
    let mut body_frame: FxHashMap<Arc<str>, ObjectId> = FxHashMap::default();
    body_frame.insert("shared".into(), shared_obj);
    t.statement_finished(
        class_scope,
        &assign_stmt("shared", vec![]),
        Some(&body_frame as &dyn FrameBindings),
    )
    .unwrap();
    t.host_mut().set_field(foo_cls, "shared", shared_obj);
    t.host_mut().set_global("Foo", foo_cls);
    let global = t.global_scope();
    t.statement_finished(global, &class_cell.body.body[0], None)
        .unwrap();
    t.finish_cell().unwrap();

    let class_shared = t
        .context()
        .scopes
        .member_entry(
            t.context().namespace_for(foo_cls).unwrap(),
            &tangle_core::MemberKey::field("shared"),
        )
        .expect("class member tracked");

    // cell 2: foo = Foo()
    let inst = t.host_mut().new_object();
    let inst_cell = parsed(
        "foo = Foo()",
        vec![assign_stmt("foo", vec![RefChain::call("Foo")])],
        vec![RefChain::call("Foo")],
        vec![RefChain::name("foo")],
    );
    run_cell(&mut t, &inst_cell, |heap| heap.set_global("foo", inst));
    t.instance_created(foo_cls, inst);

    // before any instance-level write, foo.shared is the class symbol
    let chain = RefChain::name("foo").attr("shared");
    let before = resolve::resolve_chain(t.context(), t.host(), global, &chain).unwrap();
    assert_eq!(before.matched, Some(class_shared));

    // cell 3: foo.shared = 42
    let v42 = t.host_mut().new_value();
    let shadow_cell = parsed(
        "foo.shared = 42",
        vec![chain_assign_stmt(chain.clone(), vec![])],
        vec![RefChain::name("foo")],
        vec![chain.clone()],
    );
    run_cell(&mut t, &shadow_cell, |heap| {
        heap.set_field(inst, "shared", v42)
    });

    let after = resolve::resolve_chain(t.context(), t.host(), global, &chain).unwrap();
    let instance_shared = after.matched.expect("instance member tracked");
    assert_ne!(instance_shared, class_shared);
    // the class symbol survives only as an explicit dependency
    assert!(t
        .context()
        .sym(instance_shared)
        .unwrap()
        .parents
        .contains(&class_shared));
}

// =============================================================================
// Literal namespaces and mutation freshness through aliases
// =============================================================================

#[test]
fn test_append_to_inner_list_refreshes_outer_container() {
    let mut t = tracker();

    // cell 1: lst0 = []
    let lst0_obj = t.host_mut().new_list();
    let c1 = parsed(
        "lst0 = []",
        vec![assign_stmt("lst0", vec![])],
        vec![],
        vec![RefChain::name("lst0")],
    );
    t.set_active_cell(CellId::from("1"), None);
    run_cell(&mut t, &c1, |heap| heap.set_global("lst0", lst0_obj));
    let lst0_sym = t.lookup_global("lst0").unwrap();

    // cell 2: lst = [lst0]
    let lst_obj = t.host_mut().new_list();
    t.host_mut().push(lst_obj, lst0_obj);
    let c2 = parsed(
        "lst = [lst0]",
        vec![assign_stmt("lst", vec![RefChain::name("lst0")])],
        vec![RefChain::name("lst0")],
        vec![RefChain::name("lst")],
    );
    let ready = t.precheck_cell(&c2).unwrap();
    assert!(!ready.is_refused());
    t.begin_cell(&c2);
    t.record_literal(lst_obj, vec![(IndexKey::Int(0), Some(lst0_sym))])
        .unwrap();
    t.host_mut().set_global("lst", lst_obj);
    let global = t.global_scope();
    t.statement_finished(global, &c2.body.body[0], None).unwrap();
    t.finish_cell().unwrap();

    // the literal namespace took the binding's name
    let ns = t.context().namespace_for(lst_obj).unwrap();
    assert_eq!(&*t.context().scopes.get(ns).unwrap().name, "lst");

    // cell 3: logging.info(lst)
    let c3 = parsed(
        "logging.info(lst)",
        vec![expr_stmt(vec![RefChain::name("lst")])],
        vec![RefChain::name("lst")],
        vec![],
    );
    t.set_active_cell(CellId::from("3"), None);
    run_cell(&mut t, &c3, |_| {});

    // cell 4: lst0.append(42)
    let v42 = t.host_mut().new_value();
    let c4 = parsed(
        "lst0.append(42)",
        vec![expr_stmt(vec![RefChain::name("lst0")])],
        vec![RefChain::name("lst0")],
        vec![],
    );
    let ready = t.precheck_cell(&c4).unwrap();
    assert!(!ready.is_refused());
    t.begin_cell(&c4);
    t.host_mut().push(lst0_obj, v42);
    t.record_mutation(lst0_obj, MutationKind::Append, vec![], vec![v42]);
    t.statement_finished(global, &c4.body.body[0], None).unwrap();
    t.finish_cell().unwrap();

    // nothing is stale, but the reader of the outer list is refreshable:
    // the mutation reached lst through the element alias of lst0
    let entries = [
        BatchEntry::new("1", Some(&c1)),
        BatchEntry::new("2", Some(&c2)),
        BatchEntry::new("3", Some(&c3)),
    ];
    let report = t.check_and_link_cells(&entries).unwrap();
    assert!(report.stale_cells.is_empty());
    assert!(report.fresh_cells.contains(&CellId::from("3")));
}

// =============================================================================
// Collector liveness
// =============================================================================

#[test]
fn test_rebinding_last_alias_retires_namespace() {
    let mut t = tracker();

    let d_obj = t.host_mut().new_dict();
    let c1 = parsed(
        "d = {}",
        vec![assign_stmt("d", vec![])],
        vec![],
        vec![RefChain::name("d")],
    );
    run_cell(&mut t, &c1, |heap| heap.set_global("d", d_obj));

    let one = t.host_mut().new_value();
    let c2 = parsed(
        "d[\"k\"] = 1",
        vec![chain_assign_stmt(
            RefChain::name("d").index(IndexKey::str("k")),
            vec![],
        )],
        vec![RefChain::name("d")],
        vec![RefChain::name("d").index(IndexKey::str("k"))],
    );
    run_cell(&mut t, &c2, |heap| heap.set_key(d_obj, IndexKey::str("k"), one));
    assert!(t.context().namespace_for(d_obj).is_some());

    // cell 3: d = 5 — the dict loses its last alias
    let five = t.host_mut().new_value();
    let c3 = parsed(
        "d = 5",
        vec![assign_stmt("d", vec![])],
        vec![],
        vec![RefChain::name("d")],
    );
    run_cell(&mut t, &c3, |heap| heap.set_global("d", five));

    assert!(
        t.context().namespace_for(d_obj).is_none(),
        "namespace retired at the cell boundary after the last alias left"
    );
}

#[test]
fn test_host_expiry_retires_namespace_and_members() {
    let mut t = tracker();

    let d_obj = t.host_mut().new_dict();
    let c1 = parsed(
        "d = {}",
        vec![assign_stmt("d", vec![])],
        vec![],
        vec![RefChain::name("d")],
    );
    run_cell(&mut t, &c1, |heap| heap.set_global("d", d_obj));

    let one = t.host_mut().new_value();
    let c2 = parsed(
        "d[\"k\"] = 1",
        vec![chain_assign_stmt(
            RefChain::name("d").index(IndexKey::str("k")),
            vec![],
        )],
        vec![RefChain::name("d")],
        vec![RefChain::name("d").index(IndexKey::str("k"))],
    );
    run_cell(&mut t, &c2, |heap| heap.set_key(d_obj, IndexKey::str("k"), one));
    let members_before = t.context().symbols.len();

    // the host frees the dict; expiry is only marked, collection deferred
    t.host_mut().del_global("d");
    t.host_mut().free(d_obj);
    assert!(t.context().namespace_for(d_obj).is_some());

    // next cell boundary drains the pending set
    let c3 = parsed(
        "pass",
        vec![expr_stmt(vec![])],
        vec![],
        vec![],
    );
    run_cell(&mut t, &c3, |_| {});
    assert!(t.context().namespace_for(d_obj).is_none());
    assert!(t.context().symbols.len() < members_before);
}
