//! The mount pass.
//!
//! Descriptors are mounted depth-first. Static props are applied in
//! insertion order, then modifiers in declaration order. Every reactive prop
//! or text gets one effect that computes the new value first and then
//! performs a single targeted write, skipping values equal to the last one
//! committed. A computation that panics therefore leaves the node as it was.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::arena::{MountId, MountRecord};
use super::component::Component;
use super::reconcile::RegionRows;
use super::RendererInner;
use crate::dom::node::{NodeShape, PropKey, PropValue, RegionSource};
use crate::dom::{DomNode, ElementNode, NodeKey, NodeRef, RegionNode, TextContent, TextNode};
use crate::error::{panic_message, RenderError};
use crate::reactive::{on_cleanup, Effect, Scope};

impl RendererInner {
    /// Mount `node` under `parent`, before `before` (or at the end).
    pub(crate) fn mount(
        self: &Rc<Self>,
        node: DomNode,
        parent: NodeRef,
        before: Option<NodeRef>,
    ) -> MountId {
        match node {
            DomNode::Element(element) => self.mount_element(element, parent, before),
            DomNode::Text(text) => self.mount_text(text, parent, before),
            DomNode::Region(region) => self.mount_region(region, parent, before),
            DomNode::Component(component) => {
                self.mount_component(component.instance, parent, before)
            }
        }
    }

    fn mount_element(
        self: &Rc<Self>,
        element: ElementNode,
        parent: NodeRef,
        before: Option<NodeRef>,
    ) -> MountId {
        let ElementNode {
            tag,
            props,
            modifiers,
            children,
            ..
        } = element;

        let node = self.dom.create_element(&tag);
        for (key, value) in props.into_entries() {
            self.apply_prop(node, key, value);
        }

        for modifier in &modifiers {
            for (property, value) in modifier.declarations() {
                if let Err(error) = self.dom.set_style(node, property, &value) {
                    tracing::error!(%node, property, %error, "style write failed");
                }
            }
            self.metrics.record(|m| m.modifier_applications += 1);
        }

        let children: SmallVec<[MountId; 4]> = children
            .into_iter()
            .map(|child| self.mount(child, node, None))
            .collect();

        self.insert_node(parent, node, before);
        self.arena
            .borrow_mut()
            .insert(MountRecord::Element { node, children })
    }

    fn apply_prop(self: &Rc<Self>, node: NodeRef, key: PropKey, value: PropValue) {
        match (key, value) {
            (PropKey::Attribute(name), PropValue::Static(value)) => {
                self.write_attribute(node, &name, &value);
            }
            (PropKey::Attribute(name), PropValue::Flag(enabled)) => {
                if enabled {
                    self.write_attribute(node, &name, "");
                }
            }
            (PropKey::Attribute(name), PropValue::Dynamic(compute)) => {
                let inner = Rc::clone(self);
                let mut committed: Option<Option<String>> = None;
                Effect::new(move || {
                    let next = compute();
                    if committed.as_ref() == Some(&next) {
                        return;
                    }
                    match &next {
                        Some(value) => inner.write_attribute(node, &name, value),
                        None if committed.is_some() => inner.remove_attribute(node, &name),
                        None => {}
                    }
                    committed = Some(next);
                });
            }
            (PropKey::Class(class), PropValue::ClassToggle(enabled)) => {
                let inner = Rc::clone(self);
                let mut committed: Option<bool> = None;
                Effect::new(move || {
                    let next = enabled();
                    if committed == Some(next) {
                        return;
                    }
                    // A class starts out absent; only turning it on is a write.
                    if next || committed.is_some() {
                        inner.write_class(node, &class, next);
                    }
                    committed = Some(next);
                });
            }
            (PropKey::Event(event), PropValue::Listener(listener)) => {
                if let Err(error) = self.dom.add_listener(node, &event, listener) {
                    tracing::error!(%node, event, %error, "listener registration failed");
                }
            }
            (key, value) => {
                tracing::warn!(?key, ?value, "prop kind does not match its value; ignored");
            }
        }
    }

    fn mount_text(
        self: &Rc<Self>,
        text: TextNode,
        parent: NodeRef,
        before: Option<NodeRef>,
    ) -> MountId {
        let node = match text.content {
            TextContent::Static(content) => self.dom.create_text(&content),
            TextContent::Dynamic(compute) => {
                let node = self.dom.create_text("");
                let inner = Rc::clone(self);
                let mut committed: Option<String> = None;
                Effect::new(move || {
                    let next = compute();
                    if committed.as_deref() == Some(next.as_str()) {
                        return;
                    }
                    inner.write_text(node, &next);
                    committed = Some(next);
                });
                node
            }
        };

        self.insert_node(parent, node, before);
        self.arena.borrow_mut().insert(MountRecord::Text { node })
    }

    fn mount_region(
        self: &Rc<Self>,
        region: RegionNode,
        parent: NodeRef,
        before: Option<NodeRef>,
    ) -> MountId {
        let anchor = self.dom.create_comment("");
        self.insert_node(parent, anchor, before);

        let rows: Rc<RefCell<RegionRows>> = Rc::default();
        let id = self.arena.borrow_mut().insert(MountRecord::Region {
            anchor,
            rows: Rc::clone(&rows),
        });

        // Rows live in detached scopes; release them with the owner of the
        // region.
        let owned = Rc::clone(&rows);
        on_cleanup(move || {
            let rows = std::mem::take(&mut *owned.borrow_mut());
            for entry in rows.into_entries() {
                entry.scope.dispose();
            }
        });

        let inner = Rc::clone(self);
        let keyed = self.config.keyed_reconciliation;
        match region.source {
            RegionSource::Keyed { keys, row } => {
                Effect::new(move || {
                    let next = keys();
                    if keyed {
                        let fresh = HashSet::new();
                        inner.reconcile_keyed(
                            anchor,
                            &rows,
                            next,
                            &fresh,
                            &mut |key: &NodeKey| row(key),
                        );
                    } else {
                        inner.replace_rows(anchor, &rows, next.len(), &mut |index: usize| {
                            next.get(index).and_then(|key| row(key))
                        });
                    }
                });
            }
            RegionSource::Dynamic(children) => {
                // Shape of each keyed child as last mounted.
                let mut mounted: HashMap<NodeKey, NodeShape> = HashMap::new();
                Effect::new(move || {
                    let nodes = children();
                    let all_keyed =
                        !nodes.is_empty() && nodes.iter().all(|node| node.key().is_some());
                    if keyed && all_keyed {
                        let mut order = Vec::with_capacity(nodes.len());
                        let mut pending = HashMap::with_capacity(nodes.len());
                        let mut shapes = HashMap::with_capacity(nodes.len());
                        let mut stale = HashSet::new();
                        for node in nodes {
                            let Some(key) = node.key().cloned() else {
                                continue;
                            };
                            order.push(key.clone());
                            if pending.contains_key(&key) {
                                continue;
                            }
                            let shape = node.shape();
                            if mounted.get(&key).is_some_and(|last| *last != shape) {
                                tracing::debug!(%key, "keyed child changed shape; rebuilding it");
                                stale.insert(key.clone());
                            }
                            shapes.insert(key.clone(), shape);
                            pending.insert(key, node);
                        }
                        inner.reconcile_keyed(
                            anchor,
                            &rows,
                            order,
                            &stale,
                            &mut |key: &NodeKey| pending.remove(key),
                        );
                        // Rows that failed to build keep no shape.
                        if let RegionRows::Keyed(cache) = &*rows.borrow() {
                            shapes.retain(|key, _| cache.contains(key));
                        }
                        mounted = shapes;
                    } else {
                        mounted.clear();
                        let count = nodes.len();
                        let mut nodes: Vec<Option<DomNode>> =
                            nodes.into_iter().map(Some).collect();
                        inner.replace_rows(anchor, &rows, count, &mut |index: usize| {
                            nodes.get_mut(index).and_then(Option::take)
                        });
                    }
                });
            }
        }

        id
    }

    /// Mount a child component in a scope owned by the current owner.
    ///
    /// A render that fails or panics is logged and replaced by a placeholder
    /// comment; siblings are unaffected.
    fn mount_component(
        self: &Rc<Self>,
        instance: Rc<dyn Component>,
        parent: NodeRef,
        before: Option<NodeRef>,
    ) -> MountId {
        let scope = Scope::new();
        match self.mount_in_scope(instance, &scope, parent, before) {
            Ok(mount) => mount,
            Err(error) => {
                tracing::error!(%error, "component failed to render; mounting a placeholder");
                scope.dispose();
                let node = self.dom.create_comment(&self.config.placeholder_label);
                self.insert_node(parent, node, before);
                self.arena
                    .borrow_mut()
                    .insert(MountRecord::Placeholder { node })
            }
        }
    }

    /// Register `instance`, render it inside `scope` and mount the result.
    ///
    /// On error nothing has been mounted; the caller disposes `scope`, which
    /// also drops the registry entry.
    pub(crate) fn mount_in_scope(
        self: &Rc<Self>,
        instance: Rc<dyn Component>,
        scope: &Scope,
        parent: NodeRef,
        before: Option<NodeRef>,
    ) -> Result<MountId, RenderError> {
        let id = self
            .registry
            .borrow_mut()
            .register(Rc::clone(&instance), scope.clone());
        let registry: Weak<Self> = Rc::downgrade(self);
        scope.on_cleanup(move || {
            if let Some(inner) = registry.upgrade() {
                inner.registry.borrow_mut().unregister(id);
            }
        });

        let rendered = scope.run(|| panic::catch_unwind(AssertUnwindSafe(|| instance.render())));
        let node = match rendered {
            Ok(result) => result?,
            Err(payload) => {
                return Err(RenderError::Panicked {
                    component: instance.name().to_string(),
                    message: panic_message(payload.as_ref()),
                })
            }
        };

        let child = scope.run(|| self.mount(node, parent, before));
        let mount = self
            .arena
            .borrow_mut()
            .insert(MountRecord::Component { id, child });
        self.registry.borrow_mut().set_mount(id, mount);
        tracing::debug!(component = instance.name(), %id, "component mounted");
        Ok(mount)
    }

    /// Top-level host nodes of a mount, in document order.
    pub(crate) fn host_nodes(&self, id: MountId) -> SmallVec<[NodeRef; 4]> {
        let mut out = SmallVec::new();
        self.collect_host_nodes(id, &mut out);
        out
    }

    fn collect_host_nodes(&self, id: MountId, out: &mut SmallVec<[NodeRef; 4]>) {
        let arena = self.arena.borrow();
        match arena.get(id) {
            Some(
                MountRecord::Element { node, .. }
                | MountRecord::Text { node }
                | MountRecord::Placeholder { node },
            ) => out.push(*node),
            Some(MountRecord::Region { anchor, rows }) => {
                for row in rows.borrow().mounts() {
                    self.collect_host_nodes(row, out);
                }
                out.push(*anchor);
            }
            Some(MountRecord::Component { child, .. }) => self.collect_host_nodes(*child, out),
            None => {}
        }
    }

    /// Drop the records of a mount and everything below it.
    pub(crate) fn free_mount(&self, id: MountId) {
        let record = self.arena.borrow_mut().remove(id);
        match record {
            Some(MountRecord::Element { children, .. }) => {
                for child in children {
                    self.free_mount(child);
                }
            }
            Some(MountRecord::Region { rows, .. }) => {
                let mounts = rows.borrow().mounts();
                for row in mounts {
                    self.free_mount(row);
                }
            }
            Some(MountRecord::Component { child, .. }) => self.free_mount(child),
            Some(MountRecord::Text { .. } | MountRecord::Placeholder { .. }) | None => {}
        }
    }
}
