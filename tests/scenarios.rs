//! Black-box coverage of the concrete reorder scenarios this toolchain is
//! required to get right, built only from `nf_synth`'s public API (no
//! `tests_support` access from an integration test binary).

use nf_synth::bdd::call::{ArgSlot, CallRecord};
use nf_synth::bdd::{Bdd, DistinguishedSymbols, Node, NodeId, RouteOp};
use nf_synth::expr::{Expr, Oracle, SymbolicArray};
use nf_synth::reorder::{self, Anchor, ReorderStatus};
use std::sync::Arc;

fn symbols() -> DistinguishedSymbols {
    DistinguishedSymbols {
        device: Expr::constant(0, 16),
        packet_len: Expr::constant(64, 16),
        time: Expr::constant(0, 64),
    }
}

fn route(bdd: &mut Bdd, operation: RouteOp) -> NodeId {
    let id = bdd.alloc_id();
    bdd.insert(Node::Route { id, operation, constraints: Default::default(), next: None, prev: None });
    id
}

fn call(bdd: &mut Bdd, record: CallRecord, next: Option<NodeId>) -> NodeId {
    let id = bdd.alloc_id();
    bdd.insert(Node::Call {
        id,
        call: record,
        constraints: Default::default(),
        generated_symbols: Default::default(),
        next,
        prev: None,
    });
    id
}

/// Scenario 1: `map_get(m1, k=A)` then `vector_borrow(v1, idx=I)` on
/// different objects. Reordering the vector borrow up to directly after the
/// anchor must be unconditionally valid, with no guard and no siblings.
#[test]
fn independent_map_and_vector_reorder_is_valid() {
    let mut bdd = Bdd::new(symbols());
    let drop = route(&mut bdd, RouteOp::Drop);

    let vector_call = CallRecord::new("vector_borrow")
        .with_arg("vector", ArgSlot::scalar(Expr::constant(2, 64)))
        .with_arg("index", ArgSlot::pointer(Expr::constant(0, 32), Expr::constant(5, 32), None));
    let vector_id = call(&mut bdd, vector_call, Some(drop));
    bdd.relink(vector_id, true, drop);

    let map_call = CallRecord::new("map_get")
        .with_arg("map", ArgSlot::scalar(Expr::constant(1, 64)))
        .with_arg("key", ArgSlot::pointer(Expr::constant(0, 32), Expr::constant(7, 32), None));
    let map_id = call(&mut bdd, map_call, Some(vector_id));
    bdd.relink(map_id, true, vector_id);
    bdd.set_root(map_id);

    let oracle = Oracle::default();
    let anchor = Anchor::new(map_id, true);
    let info = reorder::check_candidate(&bdd, &oracle, anchor, vector_id);

    assert_eq!(info.status, ReorderStatus::Valid);
    assert!(info.guard.is_none());
    assert!(info.siblings.is_empty());
}

/// Scenario 2: a `map_put(m1, k=A, v=42)` sits between the anchor and a
/// `map_erase(m1, k=A)` candidate on the same key. Reordering the erase past
/// the put would change which value observers see, so this must fail the
/// read/write commutation check.
#[test]
fn same_key_conflicting_map_ops_fail_rw_check() {
    let mut bdd = Bdd::new(symbols());
    let drop = route(&mut bdd, RouteOp::Drop);

    let erase_call = CallRecord::new("map_erase")
        .with_arg("map", ArgSlot::scalar(Expr::constant(1, 64)))
        .with_arg("key", ArgSlot::pointer(Expr::constant(0, 32), Expr::constant(42, 32), None));
    let erase_id = call(&mut bdd, erase_call, Some(drop));
    bdd.relink(erase_id, true, drop);

    let put_call = CallRecord::new("map_put")
        .with_arg("map", ArgSlot::scalar(Expr::constant(1, 64)))
        .with_arg("key", ArgSlot::pointer(Expr::constant(0, 32), Expr::constant(42, 32), None))
        .with_arg("value", ArgSlot::scalar(Expr::constant(42, 32)));
    let put_id = call(&mut bdd, put_call, Some(erase_id));
    bdd.relink(put_id, true, erase_id);

    let anchor_call = CallRecord::new("vector_borrow").with_arg("vector", ArgSlot::scalar(Expr::constant(9, 64)));
    let anchor_id = call(&mut bdd, anchor_call, Some(put_id));
    bdd.relink(anchor_id, true, put_id);
    bdd.set_root(anchor_id);

    let oracle = Oracle::default();
    let info = reorder::check_candidate(&bdd, &oracle, Anchor::new(anchor_id, true), erase_id);
    assert_eq!(info.status, ReorderStatus::RwCheckFailed);
}

/// Scenario 3: a `map_put(m1, k=K_b, ...)` sits between the anchor and a
/// `map_put(m1, k=K_c, ...)` candidate, where `K_b`/`K_c` are two distinct
/// symbolic reads the oracle can prove neither equal nor unequal. The
/// reorder is still legal, gated behind a synthesised guard `¬(K_b == K_c)`.
#[test]
fn guarded_reorder_on_undetermined_key_relationship() {
    let mut bdd = Bdd::new(symbols());
    let drop = route(&mut bdd, RouteOp::Drop);

    let key_array = Arc::new(SymbolicArray::new("key", 2, 1, 32));
    let key_b = Expr::read(Arc::clone(&key_array), Expr::constant(0, 1));
    let key_c = Expr::read(Arc::clone(&key_array), Expr::constant(1, 1));

    let candidate_call = CallRecord::new("map_put")
        .with_arg("map", ArgSlot::scalar(Expr::constant(1, 64)))
        .with_arg("key", ArgSlot::pointer(Expr::constant(0, 32), Arc::clone(&key_c), None))
        .with_arg("value", ArgSlot::scalar(Expr::constant(1, 32)));
    let candidate_id = call(&mut bdd, candidate_call, Some(drop));
    bdd.relink(candidate_id, true, drop);

    let between_call = CallRecord::new("map_put")
        .with_arg("map", ArgSlot::scalar(Expr::constant(1, 64)))
        .with_arg("key", ArgSlot::pointer(Expr::constant(0, 32), Arc::clone(&key_b), None))
        .with_arg("value", ArgSlot::scalar(Expr::constant(0, 32)));
    let between_id = call(&mut bdd, between_call, Some(candidate_id));
    bdd.relink(between_id, true, candidate_id);

    // The anchor stands in for whatever call first pulled the "key" array
    // into scope (e.g. a chunk borrow), so the IO check downstream sees it
    // as already available.
    let anchor_id = bdd.alloc_id();
    bdd.insert(Node::Call {
        id: anchor_id,
        call: CallRecord::new("vector_borrow").with_arg("vector", ArgSlot::scalar(Expr::constant(9, 64))),
        constraints: Default::default(),
        generated_symbols: ["key".into()].into_iter().collect(),
        next: Some(between_id),
        prev: None,
    });
    bdd.relink(anchor_id, true, between_id);
    bdd.set_root(anchor_id);

    let oracle = Oracle::default();
    let info = reorder::check_candidate(&bdd, &oracle, Anchor::new(anchor_id, true), candidate_id);

    assert_eq!(info.status, ReorderStatus::Valid);
    let guard = info.guard.expect("undetermined key relationship must synthesise a guard");
    let expected = nf_synth::expr::not(nf_synth::expr::eq(key_b, key_c));
    assert_eq!(guard, expected);
}

/// Scenario 4: `packet_borrow_next_chunk` is listed non-reorderable
/// regardless of position; any attempt to pull it up must be rejected.
#[test]
fn non_reorderable_chunk_borrow_is_rejected() {
    let mut bdd = Bdd::new(symbols());
    let drop = route(&mut bdd, RouteOp::Drop);

    let borrow_call = CallRecord::new("packet_borrow_next_chunk").with_arg("p", ArgSlot::scalar(Expr::constant(0, 64)));
    let borrow_id = call(&mut bdd, borrow_call, Some(drop));
    bdd.relink(borrow_id, true, drop);

    let mid_call = CallRecord::new("vector_borrow").with_arg("vector", ArgSlot::scalar(Expr::constant(9, 64)));
    let mid_id = call(&mut bdd, mid_call, Some(borrow_id));
    bdd.relink(mid_id, true, borrow_id);

    let anchor_call = CallRecord::new("map_get").with_arg("map", ArgSlot::scalar(Expr::constant(1, 64)));
    let anchor_id = call(&mut bdd, anchor_call, Some(mid_id));
    bdd.relink(anchor_id, true, mid_id);
    bdd.set_root(anchor_id);

    let oracle = Oracle::default();
    let info = reorder::check_candidate(&bdd, &oracle, Anchor::new(anchor_id, true), borrow_id);
    assert_eq!(info.status, ReorderStatus::NotAllowed);
}

/// Scenario 5: two downstream paths disagree on the terminal routing
/// decision (`FWD(2)` vs `DROP`). Pulling the `FWD` branch up past the
/// predicate that picks between them would change which packets get
/// forwarded, so the candidate is rejected as a routing conflict.
#[test]
fn conflicting_downstream_routes_are_rejected() {
    let mut bdd = Bdd::new(symbols());
    let fwd = route(&mut bdd, RouteOp::Fwd { dst_port: 2 });
    let drop = route(&mut bdd, RouteOp::Drop);

    let branch_id = bdd.alloc_id();
    bdd.insert(Node::Branch {
        id: branch_id,
        condition: Expr::constant(1, 1),
        constraints: Default::default(),
        on_true: fwd,
        on_false: drop,
        prev: None,
    });
    bdd.relink(branch_id, true, fwd);
    bdd.relink(branch_id, false, drop);

    let anchor_call = CallRecord::new("map_get").with_arg("map", ArgSlot::scalar(Expr::constant(1, 64)));
    let anchor_id = call(&mut bdd, anchor_call, Some(branch_id));
    bdd.relink(anchor_id, true, branch_id);
    bdd.set_root(anchor_id);

    let oracle = Oracle::default();
    let info = reorder::check_candidate(&bdd, &oracle, Anchor::new(anchor_id, true), fwd);
    assert_eq!(info.status, ReorderStatus::ConflictingRouting);
}

/// Scenario 6: a BDD with three Calls, one Branch, and two Routes survives a
/// serialise/deserialise round trip with every node's kind, primary payload,
/// and parent id intact.
#[test]
fn serialise_round_trip_preserves_every_node() {
    let mut bdd = Bdd::new(symbols());
    let fwd = route(&mut bdd, RouteOp::Fwd { dst_port: 3 });
    let drop = route(&mut bdd, RouteOp::Drop);

    let branch_id = bdd.alloc_id();
    bdd.insert(Node::Branch {
        id: branch_id,
        condition: Expr::constant(1, 1),
        constraints: Default::default(),
        on_true: fwd,
        on_false: drop,
        prev: None,
    });
    bdd.relink(branch_id, true, fwd);
    bdd.relink(branch_id, false, drop);

    let dchain_call = CallRecord::new("dchain_is_index_allocated").with_arg("dchain", ArgSlot::scalar(Expr::constant(4, 64)));
    let dchain_id = call(&mut bdd, dchain_call, Some(branch_id));
    bdd.relink(dchain_id, true, branch_id);

    let vector_call = CallRecord::new("vector_borrow")
        .with_arg("vector", ArgSlot::scalar(Expr::constant(2, 64)))
        .with_arg("index", ArgSlot::pointer(Expr::constant(0, 32), Expr::constant(5, 32), None));
    let vector_id = call(&mut bdd, vector_call, Some(dchain_id));
    bdd.relink(vector_id, true, dchain_id);

    let map_call = CallRecord::new("map_get")
        .with_arg("map", ArgSlot::scalar(Expr::constant(1, 64)))
        .with_arg("key", ArgSlot::pointer(Expr::constant(0, 32), Expr::constant(7, 32), None));
    let map_id = call(&mut bdd, map_call, Some(vector_id));
    bdd.relink(map_id, true, vector_id);
    bdd.set_root(map_id);

    assert!(bdd.assert_invariants().is_ok());

    let text = nf_synth::bdd::io::write_bdd(&bdd);
    let parsed = nf_synth::bdd::io::read_bdd(&text).expect("round-tripped text must parse");
    assert!(parsed.assert_invariants().is_ok());

    assert_eq!(parsed.node_count_total(), bdd.node_count_total());
    for id in bdd.node_ids() {
        let original = bdd.get_node_by_id(id).unwrap();
        let roundtripped = parsed.get_node_by_id(id).expect("every original node id must survive the round trip");
        assert_eq!(original.prev(), roundtripped.prev(), "parent id mismatch for node {id}");
        match (original, roundtripped) {
            (Node::Branch { condition: c1, on_true: t1, on_false: f1, .. }, Node::Branch { condition: c2, on_true: t2, on_false: f2, .. }) => {
                assert_eq!(c1, c2);
                assert_eq!(t1, t2);
                assert_eq!(f1, f2);
            }
            (Node::Call { call: c1, .. }, Node::Call { call: c2, .. }) => assert_eq!(c1, c2),
            (Node::Route { operation: o1, .. }, Node::Route { operation: o2, .. }) => assert_eq!(o1, o2),
            (a, b) => panic!("node kind mismatch for id {id}: {a:?} vs {b:?}"),
        }
    }
}
