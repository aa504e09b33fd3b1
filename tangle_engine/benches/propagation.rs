//! Propagation Benchmarks
//!
//! Measures the cost of the two hot paths in the engine: redefining a
//! symbol with a wide dependent fan-out, and redefining the root of a deep
//! dependency chain. Both drive the same `update_deps` entry point the
//! tracker uses at every assignment.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rustc_hash::FxHashSet;
use tangle_core::{MemberKey, ObjectId};
use tangle_engine::propagate::{update_deps, DepUpdate};
use tangle_model::{GraphContext, Symbol, SymbolId, SymbolKind};

// =============================================================================
// Benchmark Helpers
// =============================================================================

fn add_symbol(ctx: &mut GraphContext, name: &str, obj: u64) -> SymbolId {
    let global = ctx.global_scope();
    let key = MemberKey::field(name);
    let id = ctx.symbols.insert(Symbol::new(
        key.clone(),
        SymbolKind::Default,
        global,
        ObjectId::new(obj),
    ));
    ctx.scopes.put(global, &key, id).unwrap();
    ctx.aliases.add(ObjectId::new(obj), id);
    id
}

/// One root with `n` direct dependents.
fn fan_out_graph(n: usize) -> (GraphContext, SymbolId) {
    let mut ctx = GraphContext::new();
    let root = add_symbol(&mut ctx, "root", 1);
    update_deps(&mut ctx, root, &FxHashSet::default(), DepUpdate::default());
    ctx.advance_counter();
    for i in 0..n {
        let child = add_symbol(&mut ctx, &format!("child{}", i), 100 + i as u64);
        let deps: FxHashSet<SymbolId> = [root].into_iter().collect();
        update_deps(&mut ctx, child, &deps, DepUpdate::default());
    }
    ctx.advance_counter();
    (ctx, root)
}

/// A chain of `n` symbols, each depending on the previous.
fn chain_graph(n: usize) -> (GraphContext, SymbolId) {
    let mut ctx = GraphContext::new();
    let root = add_symbol(&mut ctx, "root", 1);
    update_deps(&mut ctx, root, &FxHashSet::default(), DepUpdate::default());
    let mut prev = root;
    for i in 0..n {
        ctx.advance_counter();
        let link = add_symbol(&mut ctx, &format!("link{}", i), 100 + i as u64);
        let deps: FxHashSet<SymbolId> = [prev].into_iter().collect();
        update_deps(&mut ctx, link, &deps, DepUpdate::default());
        prev = link;
    }
    ctx.advance_counter();
    (ctx, root)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate_fan_out");
    for n in [16usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let (mut ctx, root) = fan_out_graph(n);
            b.iter(|| {
                update_deps(
                    &mut ctx,
                    black_box(root),
                    &FxHashSet::default(),
                    DepUpdate::default(),
                );
            });
        });
    }
    group.finish();
}

fn bench_deep_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate_deep_chain");
    for n in [16usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let (mut ctx, root) = chain_graph(n);
            b.iter(|| {
                update_deps(
                    &mut ctx,
                    black_box(root),
                    &FxHashSet::default(),
                    DepUpdate::default(),
                );
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fan_out, bench_deep_chain);
criterion_main!(benches);
