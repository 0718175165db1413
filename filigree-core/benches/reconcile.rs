//! Reconciler benchmarks
//!
//! Compares keyed reconciliation against the full-replacement baseline on
//! the usual table operations: create, swap two rows, update every tenth
//! row and reverse.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use filigree_core::config::RendererConfig;
use filigree_core::prelude::*;

// =============================================================================
// Fixture
// =============================================================================

#[derive(Clone, PartialEq)]
struct Row {
    id: u32,
    label: String,
}

fn rows(count: u32) -> Vec<Row> {
    (1..=count)
        .map(|id| Row {
            id,
            label: format!("row {id}"),
        })
        .collect()
}

fn mount_table(keyed: bool) -> (Renderer, SignalList<Row, u32>, RenderHandle) {
    let dom = MemoryDom::new();
    let container = dom.create_element("table");
    let config = RendererConfig {
        keyed_reconciliation: keyed,
        ..RendererConfig::default()
    };
    let renderer = Renderer::with_config(dom, config);
    let list = create_signal_list(Vec::new(), |row: &Row| row.id);

    let view = list.clone();
    let handle = renderer
        .render_component(
            fn_component("Table", move || {
                Ok(h(
                    "tbody",
                    Props::new(),
                    [view.view(|id, row| {
                        h(
                            "tr",
                            Props::new(),
                            [
                                h("td", Props::new(), [text(id.to_string())]),
                                h("td", Props::new(), [text(move || row.with(|r| r.label.clone()))]),
                            ],
                        )
                    })],
                ))
            }),
            container,
        )
        .expect("table renders");

    (renderer, list, handle)
}

fn mode(keyed: bool) -> &'static str {
    if keyed {
        "keyed"
    } else {
        "unkeyed"
    }
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_rows");

    for count in [100u32, 1_000] {
        group.throughput(Throughput::Elements(u64::from(count)));
        for keyed in [true, false] {
            group.bench_with_input(BenchmarkId::new(mode(keyed), count), &count, |b, &count| {
                let (_renderer, list, handle) = mount_table(keyed);
                let data = rows(count);
                b.iter(|| {
                    list.set(black_box(data.clone()));
                    list.clear();
                });
                handle.dispose();
            });
        }
    }

    group.finish();
}

fn bench_swap(c: &mut Criterion) {
    let mut group = c.benchmark_group("swap_rows");

    for keyed in [true, false] {
        group.bench_function(mode(keyed), |b| {
            let (renderer, list, handle) = mount_table(keyed);
            list.set(rows(1_000));
            b.iter(|| {
                let mut ids = list.ids();
                ids.swap(1, 998);
                list.reorder(ids).expect("permutation");
            });
            black_box(renderer.metrics());
            handle.dispose();
        });
    }

    group.finish();
}

fn bench_partial_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_every_tenth_row");

    for keyed in [true, false] {
        group.bench_function(mode(keyed), |b| {
            let (_renderer, list, handle) = mount_table(keyed);
            list.set(rows(1_000));
            let mut round = 0u32;
            b.iter(|| {
                round += 1;
                for id in (1..=1_000).step_by(10) {
                    let label = format!("row {id} ({round})");
                    list.update(&id, Row { id, label }).expect("known row");
                }
            });
            handle.dispose();
        });
    }

    group.finish();
}

fn bench_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverse_rows");

    for keyed in [true, false] {
        group.bench_function(mode(keyed), |b| {
            let (_renderer, list, handle) = mount_table(keyed);
            list.set(rows(1_000));
            b.iter(|| {
                let mut ids = list.ids();
                ids.reverse();
                list.reorder(ids).expect("permutation");
            });
            handle.dispose();
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_create,
    bench_swap,
    bench_partial_update,
    bench_reverse
);
criterion_main!(benches);
