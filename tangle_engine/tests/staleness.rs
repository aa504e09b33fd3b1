//! End-to-end staleness tracking through nested containers, plus the
//! refusal/override protocol.

mod common;

use common::{assign_stmt, chain_assign_stmt, expr_stmt, parsed, run_cell, tracker};
use tangle_ast::RefChain;
use tangle_core::IndexKey;

// =============================================================================
// Nested subscript chain scenario
// =============================================================================

/// d = {}; d["x"] = {}; d["x"]["y"] = 5; t = d["x"]["y"] + 1; d["x"]["y"] = 9
/// After the last cell, `t` is stale; re-running its defining cell clears
/// the staleness.
#[test]
fn test_nested_subscript_staleness_and_refresh() {
    let mut t = tracker();

    let d_obj = t.host_mut().new_dict();
    let c1 = parsed(
        "d = {}",
        vec![assign_stmt("d", vec![])],
        vec![],
        vec![RefChain::name("d")],
    );
    run_cell(&mut t, &c1, |heap| heap.set_global("d", d_obj));

    let dx_obj = t.host_mut().new_dict();
    let c2 = parsed(
        "d[\"x\"] = {}",
        vec![chain_assign_stmt(
            RefChain::name("d").index(IndexKey::str("x")),
            vec![],
        )],
        vec![RefChain::name("d")],
        vec![RefChain::name("d").index(IndexKey::str("x"))],
    );
    run_cell(&mut t, &c2, |heap| heap.set_key(d_obj, IndexKey::str("x"), dx_obj));

    let five = t.host_mut().new_value();
    let deep = RefChain::name("d")
        .index(IndexKey::str("x"))
        .index(IndexKey::str("y"));
    let c3 = parsed(
        "d[\"x\"][\"y\"] = 5",
        vec![chain_assign_stmt(deep.clone(), vec![])],
        vec![RefChain::name("d").index(IndexKey::str("x"))],
        vec![deep.clone()],
    );
    run_cell(&mut t, &c3, |heap| heap.set_key(dx_obj, IndexKey::str("y"), five));

    let t_obj = t.host_mut().new_value();
    let c4 = parsed(
        "t = d[\"x\"][\"y\"] + 1",
        vec![assign_stmt("t", vec![deep.clone()])],
        vec![deep.clone()],
        vec![RefChain::name("t")],
    );
    run_cell(&mut t, &c4, |heap| heap.set_global("t", t_obj));

    let t_sym = t.lookup_global("t").expect("t tracked");
    assert!(!t.is_stale(t_sym));

    let nine = t.host_mut().new_value();
    let c5 = parsed(
        "d[\"x\"][\"y\"] = 9",
        vec![chain_assign_stmt(deep.clone(), vec![])],
        vec![RefChain::name("d").index(IndexKey::str("x"))],
        vec![deep.clone()],
    );
    run_cell(&mut t, &c5, |heap| heap.set_key(dx_obj, IndexKey::str("y"), nine));

    assert!(t.is_stale(t_sym), "t computed from the old element");

    // re-running the defining cell clears the staleness
    let t2_obj = t.host_mut().new_value();
    run_cell(&mut t, &c4, |heap| heap.set_global("t", t2_obj));
    let t_sym = t.lookup_global("t").expect("t tracked");
    assert!(!t.is_stale(t_sym));
}

// =============================================================================
// Refusal and override
// =============================================================================

#[test]
fn test_refusal_override_is_one_shot() {
    let mut t = tracker();

    let x_obj = t.host_mut().new_value();
    let c1 = parsed(
        "x = 1",
        vec![assign_stmt("x", vec![])],
        vec![],
        vec![RefChain::name("x")],
    );
    run_cell(&mut t, &c1, |heap| heap.set_global("x", x_obj));

    let y_obj = t.host_mut().new_value();
    let c2 = parsed(
        "y = x + 1",
        vec![assign_stmt("y", vec![RefChain::name("x")])],
        vec![RefChain::name("x")],
        vec![RefChain::name("y")],
    );
    run_cell(&mut t, &c2, |heap| heap.set_global("y", y_obj));

    let x2_obj = t.host_mut().new_value();
    let c3 = parsed(
        "x = 2",
        vec![assign_stmt("x", vec![])],
        vec![],
        vec![RefChain::name("x")],
    );
    run_cell(&mut t, &c3, |heap| heap.set_global("x", x2_obj));

    // a cell reading stale `y` is refused once, with a warning naming the
    // fresher ancestor
    let reader = parsed(
        "print(y)",
        vec![expr_stmt(vec![RefChain::name("y")])],
        vec![RefChain::name("y")],
        vec![],
    );
    let outcome = t.precheck_cell(&reader).unwrap();
    match &outcome {
        tangle_engine::PrecheckOutcome::Refused { warnings } => {
            assert_eq!(warnings.len(), 1);
            assert!(warnings[0].contains("`y`"));
            assert!(warnings[0].contains("`x`"));
        }
        _ => panic!("expected refusal"),
    }
    assert!(t.test_and_clear_stale_flag());
    assert!(!t.test_and_clear_stale_flag(), "flag clears on read");

    // byte-identical resubmission overrides
    let retry = t.precheck_cell(&reader).unwrap();
    assert!(!retry.is_refused());

    // a different cell reading only fresh state is not refused
    let other = parsed(
        "print(x)",
        vec![expr_stmt(vec![RefChain::name("x")])],
        vec![RefChain::name("x")],
        vec![],
    );
    assert!(!t.precheck_cell(&other).unwrap().is_refused());
}

/// A container whose own versions are current but whose member went stale
/// reports stale through the member advert — and a deeper lookup that dies
/// under such a container yields no match at all.
#[test]
fn test_namespace_stale_container_suppresses_deeper_misses() {
    let mut t = tracker();

    let a_obj = t.host_mut().new_value();
    let c1 = parsed(
        "a = 1",
        vec![assign_stmt("a", vec![])],
        vec![],
        vec![RefChain::name("a")],
    );
    run_cell(&mut t, &c1, |heap| heap.set_global("a", a_obj));
    let a_sym = t.lookup_global("a").unwrap();

    // lst = [a]: the element carries the dependency, the container does not
    let lst_obj = t.host_mut().new_list();
    t.host_mut().push(lst_obj, a_obj);
    let c2 = parsed(
        "lst = [a]",
        vec![assign_stmt("lst", vec![])],
        vec![],
        vec![RefChain::name("lst")],
    );
    let ready = t.precheck_cell(&c2).unwrap();
    assert!(!ready.is_refused());
    t.begin_cell(&c2);
    t.record_literal(lst_obj, vec![(IndexKey::Int(0), Some(a_sym))])
        .unwrap();
    t.host_mut().set_global("lst", lst_obj);
    let global = t.global_scope();
    t.statement_finished(global, &c2.body.body[0], None).unwrap();
    t.finish_cell().unwrap();

    let a2_obj = t.host_mut().new_value();
    let c3 = parsed(
        "a = 2",
        vec![assign_stmt("a", vec![])],
        vec![],
        vec![RefChain::name("a")],
    );
    run_cell(&mut t, &c3, |heap| heap.set_global("a", a2_obj));

    // lst's own versions are current, yet it reports stale through its
    // member advert
    let lst_sym = t.lookup_global("lst").unwrap();
    let lst = t.context().sym(lst_sym).unwrap();
    assert!(lst.required_cell <= lst.defined_cell);
    assert!(!lst.namespace_stale_refs.is_empty());
    assert!(t.is_stale(lst_sym));

    // a chain that dies below such a container resolves to nothing: its
    // staleness does not vouch for the unknown member
    let miss = RefChain::name("lst").index(99);
    let res =
        tangle_engine::resolve::resolve_chain(t.context(), t.host(), global, &miss).unwrap();
    assert!(res.matched.is_none());
    assert!(!res.success);

    // re-running the element's producer clears the advert... via the cell
    // that rebuilds the list
    let lst2_obj = t.host_mut().new_list();
    t.host_mut().push(lst2_obj, a2_obj);
    let ready = t.precheck_cell(&c2).unwrap();
    assert!(!ready.is_refused(), "the rebuild cell reads nothing stale");
    t.begin_cell(&c2);
    t.record_literal(lst2_obj, vec![(IndexKey::Int(0), Some(a_sym))])
        .unwrap();
    t.host_mut().set_global("lst", lst2_obj);
    t.statement_finished(global, &c2.body.body[0], None).unwrap();
    t.finish_cell().unwrap();
    let lst_sym = t.lookup_global("lst").unwrap();
    assert!(!t.is_stale(lst_sym));
}

#[test]
fn test_fresh_rebind_in_same_cell_is_not_stale_read() {
    let mut t = tracker();

    let a_obj = t.host_mut().new_value();
    let c1 = parsed(
        "a = 1",
        vec![assign_stmt("a", vec![])],
        vec![],
        vec![RefChain::name("a")],
    );
    run_cell(&mut t, &c1, |heap| heap.set_global("a", a_obj));

    let b_obj = t.host_mut().new_value();
    let c2 = parsed(
        "b = a",
        vec![assign_stmt("b", vec![RefChain::name("a")])],
        vec![RefChain::name("a")],
        vec![RefChain::name("b")],
    );
    run_cell(&mut t, &c2, |heap| heap.set_global("b", b_obj));

    let a2_obj = t.host_mut().new_value();
    let c3 = parsed(
        "a = 2",
        vec![assign_stmt("a", vec![])],
        vec![],
        vec![RefChain::name("a")],
    );
    run_cell(&mut t, &c3, |heap| heap.set_global("a", a2_obj));

    // the cell rebinds `b` before reading it: its liveness set carries
    // only `a`, so the stale `b` must not trigger a refusal
    let b2_obj = t.host_mut().new_value();
    let c4 = parsed(
        "b = a * 2",
        vec![assign_stmt("b", vec![RefChain::name("a")])],
        vec![RefChain::name("a")],
        vec![RefChain::name("b")],
    );
    run_cell(&mut t, &c4, |heap| heap.set_global("b", b2_obj));
    let b_sym = t.lookup_global("b").unwrap();
    assert!(!t.is_stale(b_sym));
}
