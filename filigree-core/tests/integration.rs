//! Integration Tests for the Renderer
//!
//! These tests mount a keyed table backed by a signal list and check the
//! renderer's counters and the host document after each operation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use filigree_core::config::RendererConfig;
use filigree_core::prelude::*;
use filigree_core::reactive::Runtime;
use filigree_core::RendererMetricsSnapshot;

#[derive(Debug, Clone, PartialEq)]
struct Row {
    id: u32,
    label: String,
}

fn row(id: u32) -> Row {
    Row {
        id,
        label: format!("row {id}"),
    }
}

fn rows(count: u32) -> Vec<Row> {
    (1..=count).map(row).collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Table {
    dom: MemoryDom,
    container: NodeRef,
    renderer: Renderer,
    list: SignalList<Row, u32>,
    selected: Signal<Option<u32>>,
    handle: RenderHandle,
}

impl Table {
    fn mount(config: RendererConfig) -> Self {
        init_tracing();
        let dom = MemoryDom::new();
        let container = dom.create_element("main");
        let renderer = Renderer::with_config(dom.clone(), config);
        let list = create_signal_list(Vec::new(), |row: &Row| row.id);
        let selected = Signal::new(None);

        let (view_list, view_selected) = (list.clone(), selected.clone());
        let handle = renderer
            .render_component(
                fn_component("Table", move || {
                    let selected = view_selected.clone();
                    Ok(h(
                        "tbody",
                        Props::new(),
                        [view_list.view(move |id, row| {
                            let selected = selected.clone();
                            h(
                                "tr",
                                Props::new().class("danger", move || selected.get() == Some(id)),
                                [
                                    h("td", Props::new(), [text(id.to_string())]),
                                    h(
                                        "td",
                                        Props::new(),
                                        [text(move || row.with(|row| row.label.clone()))],
                                    ),
                                ],
                            )
                        })],
                    ))
                }),
                container,
            )
            .expect("table renders");

        Self {
            dom,
            container,
            renderer,
            list,
            selected,
            handle,
        }
    }

    fn body(&self) -> NodeRef {
        self.handle.nodes()[0]
    }

    /// Host rows, without the region anchor.
    fn row_nodes(&self) -> Vec<NodeRef> {
        self.dom
            .children(self.body())
            .into_iter()
            .filter(|node| self.dom.tag(*node).is_some())
            .collect()
    }

    fn step(&self, action: impl FnOnce(&SignalList<Row, u32>)) -> RendererMetricsSnapshot {
        self.renderer.reset_metrics();
        action(&self.list);
        self.renderer.metrics()
    }
}

#[test]
fn thousand_row_scenario() {
    let table = Table::mount(RendererConfig::default());

    let created = table.step(|list| list.set(rows(1000)));
    assert_eq!(created.created, 1000);
    assert_eq!(created.cache_misses, 1000);
    assert_eq!(created.removed, 0);
    assert_eq!(table.row_nodes().len(), 1000);

    let updated = table.step(|list| {
        for id in (1..=1000).step_by(10) {
            list.update(&id, Row { id, label: format!("row {id} !!!") }).unwrap();
        }
    });
    assert_eq!(updated.text_updates, 100);
    assert_eq!(updated.created, 0);
    assert_eq!(updated.removed, 0);
    assert_eq!(updated.moved, 0);

    let swapped = table.step(|list| {
        let mut ids = list.ids();
        ids.swap(1, 998);
        list.reorder(ids).unwrap();
    });
    assert_eq!(swapped.moved, 2);
    assert_eq!(swapped.created, 0);
    assert_eq!(swapped.removed, 0);
    assert_eq!(swapped.cache_hits, 1000);
    let second = table.row_nodes()[1];
    assert_eq!(table.dom.text_content(second), "999row 999");

    let cleared = table.step(|list| list.clear());
    assert_eq!(cleared.removed, 1000);
    assert!(table.row_nodes().is_empty());
}

#[test]
fn update_never_touches_structure() {
    let table = Table::mount(RendererConfig::default());
    table.list.set(rows(20));
    let before_ids = table.list.ids();
    let before_nodes = table.row_nodes();

    let metrics = table.step(|list| {
        list.update(&7, Row { id: 7, label: "seven".into() }).unwrap();
    });

    assert_eq!(table.list.ids(), before_ids);
    assert_eq!(table.row_nodes(), before_nodes);
    assert_eq!(metrics.created, 0);
    assert_eq!(metrics.removed, 0);
    assert_eq!(metrics.moved, 0);
    assert_eq!(metrics.text_updates, 1);
    assert_eq!(table.dom.text_content(before_nodes[6]), "7seven");
}

#[test]
fn reversal_moves_all_but_one_row() {
    let table = Table::mount(RendererConfig::default());
    table.list.set(rows(50));

    let metrics = table.step(|list| {
        let mut ids = list.ids();
        ids.reverse();
        list.reorder(ids).unwrap();
    });

    assert_eq!(metrics.moved, 49);
    assert_eq!(metrics.created, 0);
    assert_eq!(metrics.removed, 0);
    let first = table.row_nodes()[0];
    assert_eq!(table.dom.text_content(first), "50row 50");
}

#[test]
fn setting_equal_rows_is_idempotent() {
    let table = Table::mount(RendererConfig::default());
    table.list.set(rows(100));

    let metrics = table.step(|list| list.set(rows(100)));
    assert_eq!(metrics.dom_mutations(), 0);
    assert_eq!(metrics, RendererMetricsSnapshot::default());
}

#[test]
fn set_adds_and_removes_by_key() {
    let table = Table::mount(RendererConfig::default());
    table.list.set(rows(10));

    let metrics = table.step(|list| {
        let mut next: Vec<Row> = rows(10).into_iter().filter(|row| row.id % 2 == 0).collect();
        next.push(row(11));
        list.set(next);
    });

    assert_eq!(metrics.removed, 5);
    assert_eq!(metrics.created, 1);
    assert_eq!(metrics.adopted, 5);
    assert_eq!(metrics.moved, 0);
    assert_eq!(table.list.ids(), vec![2, 4, 6, 8, 10, 11]);
    assert_eq!(table.row_nodes().len(), 6);
}

#[test]
fn selection_writes_only_changed_rows() {
    let table = Table::mount(RendererConfig::default());
    table.list.set(rows(100));
    let nodes = table.row_nodes();

    table.renderer.reset_metrics();
    table.selected.set(Some(5));
    assert_eq!(table.renderer.metrics().attribute_writes, 1);
    assert!(table.dom.has_class(nodes[4], "danger"));

    table.renderer.reset_metrics();
    table.selected.set(Some(7));
    assert_eq!(table.renderer.metrics().attribute_writes, 2);
    assert!(!table.dom.has_class(nodes[4], "danger"));
    assert!(table.dom.has_class(nodes[6], "danger"));
}

#[test]
fn unkeyed_baseline_rebuilds_every_row() {
    let config = RendererConfig::from_json(r#"{ "keyed_reconciliation": false }"#).unwrap();
    let table = Table::mount(config);
    table.list.set(rows(10));

    let metrics = table.step(|list| {
        let mut ids = list.ids();
        ids.swap(0, 9);
        list.reorder(ids).unwrap();
    });

    assert_eq!(metrics.removed, 10);
    assert_eq!(metrics.created, 10);
    assert_eq!(metrics.moved, 0);
    assert_eq!(table.dom.text_content(table.row_nodes()[0]), "10row 10");
}

#[test]
fn dispose_leaves_no_live_effects() {
    let table = Table::mount(RendererConfig::default());
    table.list.set(rows(25));
    let first = table.list.get(&1).unwrap();
    assert_eq!(first.subscriber_count(), 1);
    assert!(table.selected.subscriber_count() > 0);
    assert_eq!(table.renderer.component_count(), 1);

    table.handle.dispose();

    assert_eq!(first.subscriber_count(), 0);
    assert_eq!(table.selected.subscriber_count(), 0);
    assert_eq!(Runtime::live_effect_count(), 0);
    assert_eq!(table.renderer.component_count(), 0);
    assert_eq!(table.renderer.mounted_count(), 0);
    assert_eq!(table.dom.live_node_count(), 1);
    assert_eq!(table.dom.to_html(table.container), "<main></main>");

    // Writes after disposal reach nothing.
    table.list.set(rows(5));
    assert_eq!(table.renderer.metrics().created, 25);
}

#[test]
fn batched_writes_run_each_effect_once() {
    let count = Signal::new(0);
    let runs = Rc::new(Cell::new(0));
    let seen = Rc::new(Cell::new(0));

    let (c, r, s) = (count.clone(), Rc::clone(&runs), Rc::clone(&seen));
    let _effect = create_effect(move || {
        s.set(c.get());
        r.set(r.get() + 1);
    });

    batch(|| {
        for n in 1..=10 {
            count.set(n);
        }
    });

    assert_eq!(runs.get(), 2);
    assert_eq!(seen.get(), 10);
}

#[test]
fn independent_renderers_keep_separate_metrics() {
    let dom = MemoryDom::new();
    let (left, right) = (dom.create_element("div"), dom.create_element("div"));
    let (first, second) = (Renderer::new(dom.clone()), Renderer::new(dom.clone()));

    let label = Signal::new(String::from("shared"));
    let computed_label = {
        let label = label.clone();
        create_computed(move || label.get().to_uppercase())
    };

    let plain = label.clone();
    let _a = first
        .render_component(fn_component("Plain", move || Ok(text(plain.clone()))), left)
        .unwrap();
    let shouted = computed_label.clone();
    let _b = second
        .render_component(fn_component("Shouted", move || Ok(text(shouted.clone()))), right)
        .unwrap();

    label.set(String::from("changed"));

    assert_eq!(dom.text_content(left), "changed");
    assert_eq!(dom.text_content(right), "CHANGED");
    assert_eq!(first.metrics().text_updates, 2);
    assert_eq!(second.metrics().text_updates, 2);
    assert_eq!(first.component_count(), 1);
    assert_eq!(second.component_count(), 1);
}

#[test]
fn broken_rows_are_skipped() {
    init_tracing();
    let dom = MemoryDom::new();
    let container = dom.create_element("ul");
    let renderer = Renderer::new(dom.clone());
    let ids = Signal::new(vec![1u32, 2, 3]);

    let keys = ids.clone();
    let _handle = renderer
        .render_component(
            fn_component("Fragile", move || {
                let keys = keys.clone();
                Ok(for_each(move || keys.get(), |id: u32| {
                    if id == 2 {
                        panic!("row {id} cannot render");
                    }
                    h("li", Props::new(), [text(id.to_string())])
                }))
            }),
            container,
        )
        .unwrap();

    assert_eq!(dom.text_content(container), "13");
    let metrics = renderer.metrics();
    assert_eq!(metrics.cache_misses, 3);
    assert_eq!(metrics.created, 2);

    // Rows that did build still reconcile normally.
    ids.set(vec![3, 1]);
    assert_eq!(dom.text_content(container), "31");
}

#[test]
fn effects_run_in_creation_order() {
    let source = Signal::new(0);
    let gate = Signal::new(false);
    let log = Rc::new(RefCell::new(Vec::new()));

    // `a` is created first but subscribes to `source` last.
    let (g, s, l) = (gate.clone(), source.clone(), Rc::clone(&log));
    let _a = create_effect(move || {
        if g.get() {
            s.get();
            l.borrow_mut().push("a");
        }
    });
    let (s, l) = (source.clone(), Rc::clone(&log));
    let _b = create_effect(move || {
        s.get();
        l.borrow_mut().push("b");
    });
    let (s, l) = (source.clone(), Rc::clone(&log));
    let _c = create_effect(move || {
        s.get();
        l.borrow_mut().push("c");
    });
    gate.set(true);

    log.borrow_mut().clear();
    source.set(1);
    assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
}

#[test]
fn diamond_through_a_computed_runs_once_with_settled_values() {
    let source = Signal::new(1);
    let doubled = {
        let source = source.clone();
        create_computed(move || source.get() * 2)
    };
    let seen = Rc::new(RefCell::new(Vec::new()));

    let (s, d, log) = (source.clone(), doubled.clone(), Rc::clone(&seen));
    let _effect = create_effect(move || log.borrow_mut().push((s.get(), d.get())));

    source.set(2);
    source.set(3);
    assert_eq!(*seen.borrow(), vec![(1, 2), (2, 4), (3, 6)]);
}
