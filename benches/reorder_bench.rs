//! Benchmarks for the reorderer (component C) across synthetically generated
//! call chains of increasing length, the throughput-style counterpart to the
//! correctness scenarios in `tests/scenarios.rs`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nf_synth::bdd::call::{ArgSlot, CallRecord};
use nf_synth::bdd::{Bdd, DistinguishedSymbols, Node, NodeId, RouteOp};
use nf_synth::expr::{Expr, Oracle};
use nf_synth::reorder::{self, Anchor};

fn symbols() -> DistinguishedSymbols {
    DistinguishedSymbols {
        device: Expr::constant(0, 16),
        packet_len: Expr::constant(64, 16),
        time: Expr::constant(0, 64),
    }
}

/// Builds `anchor -> vector_borrow(v1) -> vector_borrow(v2) -> ... -> route`,
/// one independent (distinct-object, so unconditionally reorderable) vector
/// call per step, returning the BDD and the anchor's id.
fn chain_of_independent_calls(len: usize) -> (Bdd, NodeId) {
    let mut bdd = Bdd::new(symbols());
    let mut next = bdd.alloc_id();
    bdd.insert(Node::Route { id: next, operation: RouteOp::Drop, constraints: Default::default(), next: None, prev: None });

    for i in 0..len {
        let call = CallRecord::new("vector_borrow")
            .with_arg("vector", ArgSlot::scalar(Expr::constant(i as u64, 64)))
            .with_arg("index", ArgSlot::pointer(Expr::constant(0, 32), Expr::constant(i as u64, 32), None));
        let id = bdd.alloc_id();
        bdd.insert(Node::Call {
            id,
            call,
            constraints: Default::default(),
            generated_symbols: Default::default(),
            next: Some(next),
            prev: None,
        });
        bdd.relink(id, true, next);
        next = id;
    }

    let anchor_call = CallRecord::new("map_get").with_arg("map", ArgSlot::scalar(Expr::constant(999, 64)));
    let anchor_id = bdd.alloc_id();
    bdd.insert(Node::Call {
        id: anchor_id,
        call: anchor_call,
        constraints: Default::default(),
        generated_symbols: Default::default(),
        next: Some(next),
        prev: None,
    });
    bdd.relink(anchor_id, true, next);
    bdd.set_root(anchor_id);

    (bdd, anchor_id)
}

fn bench_get_reorder_ops(c: &mut Criterion) {
    let oracle = Oracle::default();
    let mut group = c.benchmark_group("get_reorder_ops");

    for len in [4usize, 16, 64] {
        let (bdd, anchor_id) = chain_of_independent_calls(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("chain_len", len), &len, |b, _| {
            b.iter(|| {
                let ops = reorder::get_reorder_ops(black_box(&bdd), &oracle, Anchor::new(anchor_id, true), false);
                black_box(ops);
            });
        });
    }

    group.finish();
}

fn bench_apply_reorder(c: &mut Criterion) {
    let oracle = Oracle::default();
    let mut group = c.benchmark_group("apply_reorder");

    for len in [4usize, 16, 64] {
        let (bdd, anchor_id) = chain_of_independent_calls(len);
        let anchor = Anchor::new(anchor_id, true);
        let candidate = reorder::get_reorder_ops(&bdd, &oracle, anchor, false)
            .into_iter()
            .next()
            .expect("chain of independent calls always has at least one legal reorder");

        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("chain_len", len), &len, |b, _| {
            b.iter(|| {
                let reordered = reorder::apply_reorder(black_box(&bdd), anchor, &candidate);
                black_box(reordered);
            });
        });
    }

    group.finish();
}

fn bench_estimate_reorder(c: &mut Criterion) {
    let oracle = Oracle::default();
    let mut group = c.benchmark_group("estimate_reorder");

    for len in [2usize, 4, 6] {
        let (bdd, _anchor_id) = chain_of_independent_calls(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::new("chain_len", len), &len, |b, _| {
            b.iter(|| {
                let count = reorder::estimate_reorder(black_box(&bdd), &oracle);
                black_box(count);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get_reorder_ops, bench_apply_reorder, bench_estimate_reorder);
criterion_main!(benches);
