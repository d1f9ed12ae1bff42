//! Reconciliation benchmarks
//!
//! Measures child reconciliation for the common list edits (append,
//! remove from the front, move one item, reverse) and the cost of a
//! reactive list update driven through a state container.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use fluxel_core::dom::{Document, NodeId};
use fluxel_core::reactive::TaskQueue;
use fluxel_core::render::{build, plan_kept, reconcile_children, ChildValue, RenderContext};

fn populated(len: usize) -> (Document, NodeId, Vec<NodeId>) {
    let doc = Document::new();
    let parent = doc.create_element("ul");
    let items: Vec<NodeId> = (0..len).map(|_| doc.create_element("li")).collect();
    for item in &items {
        // Benchmarks only build trees they own.
        let _ = doc.append_child(parent, *item);
    }
    (doc, parent, items)
}

fn edits(items: &[NodeId], extra: NodeId) -> Vec<(&'static str, Vec<NodeId>)> {
    let mut appended = items.to_vec();
    appended.push(extra);

    let mut moved = items.to_vec();
    let first = moved.remove(0);
    moved.push(first);

    let mut reversed = items.to_vec();
    reversed.reverse();

    vec![
        ("append", appended),
        ("remove_first", items[1..].to_vec()),
        ("move_first_to_end", moved),
        ("reverse", reversed),
    ]
}

fn bench_plan_kept(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_kept");

    for size in [10, 100, 500] {
        let (doc, _, items) = populated(size);
        let extra = doc.create_element("li");
        for (name, after) in edits(&items, extra) {
            group.bench_with_input(BenchmarkId::new(name, size), &after, |b, after| {
                b.iter(|| plan_kept(black_box(&items), black_box(after)))
            });
        }
    }

    group.finish();
}

fn bench_reconcile_children(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_children");

    for size in [10, 100, 500] {
        let (doc, parent, items) = populated(size);
        let extra = doc.create_element("li");
        for (name, after) in edits(&items, extra) {
            group.bench_with_input(BenchmarkId::new(name, size), &after, |b, after| {
                b.iter(|| {
                    let _ = reconcile_children(&doc, parent, &items);
                    reconcile_children(&doc, parent, black_box(after))
                })
            });
        }
    }

    group.finish();
}

fn bench_reactive_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive_list");

    for size in [10, 100] {
        let ctx = RenderContext::new(Document::new(), TaskQueue::new());
        let items: Vec<NodeId> = (0..=size)
            .filter_map(|i| build(&ctx, "li", i.to_string()).ok())
            .collect();

        let Ok(state) = ctx.reactive(json!({ "count": size }), |state| state.clone()) else {
            continue;
        };
        let shown = state.use_derived("count", move |count, _| {
            let n = count.as_u64().unwrap_or(0) as usize;
            ChildValue::from(items[..n.min(items.len())].to_vec())
        });
        if build(&ctx, "ul", shown).is_err() {
            continue;
        }

        group.bench_with_input(BenchmarkId::new("toggle_last", size), &size, |b, &size| {
            b.iter(|| {
                let _ = state.set("count", size + 1);
                let _ = state.set("count", size);
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_plan_kept,
    bench_reconcile_children,
    bench_reactive_list
);
criterion_main!(benches);
