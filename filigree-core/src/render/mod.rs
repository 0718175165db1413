//! Renderer / Reconciler
//!
//! The renderer mounts component trees into a host document and keeps them
//! up to date without re-rendering: every reactive prop, text and region
//! becomes an effect that patches exactly one host node, or re-keys the rows
//! of one region.
//!
//! # Structure
//!
//! - `mount`: the depth-first mount pass and per-node effects
//! - `reconcile`: keyed and unkeyed region updates through the row cache
//! - `arena`: mounted state, indexed by id
//! - [`component`]: the [`Component`] trait and the component registry
//! - [`metrics`]: per-renderer operation counters
//!
//! # Example
//!
//! ```rust
//! use filigree_core::dom::{h, text, MemoryDom, Dom, Props};
//! use filigree_core::reactive::Signal;
//! use filigree_core::render::{fn_component, Renderer};
//!
//! let dom = MemoryDom::new();
//! let container = dom.create_element("main");
//! let renderer = Renderer::new(dom.clone());
//!
//! let name = Signal::new(String::from("Ada"));
//! let label = name.clone();
//! let handle = renderer
//!     .render_component(
//!         fn_component("Greeting", move || {
//!             Ok(h("p", Props::new(), [text("Hello, "), text(label.clone())]))
//!         }),
//!         container,
//!     )
//!     .unwrap();
//!
//! assert_eq!(dom.to_html(container), "<main><p>Hello, Ada</p></main>");
//! name.set(String::from("Grace"));
//! assert_eq!(dom.to_html(container), "<main><p>Hello, Grace</p></main>");
//!
//! handle.dispose();
//! assert_eq!(dom.to_html(container), "<main></main>");
//! ```

mod arena;
pub mod component;
pub mod metrics;
mod mount;
mod reconcile;

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::config::RendererConfig;
use crate::dom::{Dom, DomEvent, NodeRef};
use crate::error::{panic_message, RenderError};
use crate::reactive::Scope;
use arena::{MountArena, MountId};
use component::ComponentRegistry;
use metrics::MetricsRecorder;

pub use component::{fn_component, Component, ComponentId, FnComponent};
pub use metrics::RendererMetricsSnapshot;

/// State shared by a renderer, its handles and the effects it creates.
pub(crate) struct RendererInner {
    dom: Rc<dyn Dom>,
    config: RendererConfig,
    arena: RefCell<MountArena>,
    registry: RefCell<ComponentRegistry>,
    metrics: MetricsRecorder,
}

impl RendererInner {
    // ------------------------------------------------------------------
    // Host writes. Failures are logged and the write is skipped.
    // ------------------------------------------------------------------

    pub(crate) fn insert_node(&self, parent: NodeRef, node: NodeRef, before: Option<NodeRef>) {
        if let Err(error) = self.dom.insert_before(parent, node, before) {
            tracing::error!(%parent, %node, %error, "insert failed");
        }
    }

    /// Detach a node from its parent and release it.
    pub(crate) fn detach_node(&self, node: NodeRef) {
        if let Err(error) = self.dom.remove(node) {
            tracing::error!(%node, %error, "detach failed");
        }
        self.dom.release(node);
    }

    pub(crate) fn write_attribute(&self, node: NodeRef, name: &str, value: &str) {
        match self.dom.set_attribute(node, name, value) {
            Ok(()) => self.metrics.record(|m| m.attribute_writes += 1),
            Err(error) => tracing::error!(%node, name, %error, "attribute write failed"),
        }
    }

    pub(crate) fn remove_attribute(&self, node: NodeRef, name: &str) {
        match self.dom.remove_attribute(node, name) {
            Ok(()) => self.metrics.record(|m| m.attribute_removals += 1),
            Err(error) => tracing::error!(%node, name, %error, "attribute removal failed"),
        }
    }

    pub(crate) fn write_class(&self, node: NodeRef, class: &str, enabled: bool) {
        match self.dom.toggle_class(node, class, enabled) {
            Ok(()) => self.metrics.record(|m| m.attribute_writes += 1),
            Err(error) => tracing::error!(%node, class, %error, "class toggle failed"),
        }
    }

    pub(crate) fn write_text(&self, node: NodeRef, content: &str) {
        match self.dom.set_text(node, content) {
            Ok(()) => self.metrics.record(|m| m.text_updates += 1),
            Err(error) => tracing::error!(%node, %error, "text update failed"),
        }
    }
}

/// Mounts components into a host document.
///
/// Each renderer has its own component registry, mount arena and metrics,
/// so independent renderers can coexist on one thread.
#[derive(Clone)]
pub struct Renderer {
    inner: Rc<RendererInner>,
}

impl Renderer {
    pub fn new(dom: impl Dom + 'static) -> Self {
        Self::with_config(dom, RendererConfig::default())
    }

    pub fn with_config(dom: impl Dom + 'static, config: RendererConfig) -> Self {
        Self {
            inner: Rc::new(RendererInner {
                dom: Rc::new(dom),
                config,
                arena: RefCell::new(MountArena::default()),
                registry: RefCell::new(ComponentRegistry::default()),
                metrics: MetricsRecorder::default(),
            }),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.inner.config
    }

    /// Render `instance` and append the result to `container`.
    ///
    /// The component renders once, in a new root scope. If it fails or
    /// panics the error is returned and nothing is mounted.
    pub fn render_component(
        &self,
        instance: impl Component,
        container: NodeRef,
    ) -> Result<RenderHandle, RenderError> {
        self.inner.dom.ensure_element(container)?;

        let instance: Rc<dyn Component> = Rc::new(instance);
        let name = instance.name().to_string();
        let scope = Scope::detached();

        match self
            .inner
            .mount_in_scope(Rc::clone(&instance), &scope, container, None)
        {
            Ok(root) => {
                tracing::debug!(component = %name, %container, "root component rendered");
                Ok(RenderHandle {
                    inner: Rc::clone(&self.inner),
                    scope,
                    root,
                    container,
                    disposed: Cell::new(false),
                })
            }
            Err(error) => {
                tracing::error!(component = %name, %error, "root component failed to render");
                scope.dispose();
                Err(error)
            }
        }
    }

    /// A copy of this renderer's counters.
    pub fn metrics(&self) -> RendererMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.inner.metrics.reset();
    }

    /// Deliver `event` to the listeners of `target` and then of each of its
    /// ancestors. Returns the number of listeners invoked.
    ///
    /// Listeners run outside any document borrow, so they may write signals
    /// whose effects patch the same document. A panicking listener is logged
    /// and the remaining listeners still run.
    pub fn dispatch_event(&self, target: NodeRef, event: &DomEvent) -> usize {
        let mut invoked = 0;
        let mut current = Some(target);
        while let Some(node) = current {
            for listener in self.inner.dom.listeners(node, &event.name) {
                invoked += 1;
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                    tracing::error!(
                        %node,
                        event = %event.name,
                        error = %panic_message(payload.as_ref()),
                        "event listener panicked"
                    );
                }
            }
            current = self.inner.dom.parent(node);
        }
        invoked
    }

    /// Number of live components.
    pub fn component_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Live components in mount order: id, name and number of effects the
    /// component's scope owns directly.
    pub fn components(&self) -> Vec<(ComponentId, String, usize)> {
        self.inner
            .registry
            .borrow()
            .iter()
            .map(|(id, entry)| (id, entry.instance.name().to_string(), entry.scope.effect_count()))
            .collect()
    }

    /// Top-level host nodes of a live component.
    pub fn component_nodes(&self, id: ComponentId) -> Vec<NodeRef> {
        let mount = self
            .inner
            .registry
            .borrow()
            .get(id)
            .and_then(|entry| entry.mount);
        mount.map_or_else(Vec::new, |mount| self.inner.host_nodes(mount).to_vec())
    }

    /// Number of mount records held by this renderer.
    pub fn mounted_count(&self) -> usize {
        self.inner.arena.borrow().len()
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.inner.config)
            .field("component_count", &self.component_count())
            .field("mounted_count", &self.mounted_count())
            .finish()
    }
}

/// A mounted root component. [`RenderHandle::dispose`] unmounts it.
pub struct RenderHandle {
    inner: Rc<RendererInner>,
    scope: Scope,
    root: MountId,
    container: NodeRef,
    disposed: Cell<bool>,
}

impl RenderHandle {
    /// Unmount the component.
    ///
    /// Disposes the root scope, which cascades to every effect, nested
    /// component and row scope under it, then detaches and releases the
    /// root's host nodes and drops their mount records. Calling it again
    /// does nothing.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        let nodes: SmallVec<[NodeRef; 4]> = self.inner.host_nodes(self.root);
        self.inner.free_mount(self.root);
        self.scope.dispose();
        for node in nodes {
            self.inner.detach_node(node);
        }
        tracing::debug!(container = %self.container, "root component disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn container(&self) -> NodeRef {
        self.container
    }

    /// Top-level host nodes currently mounted for this root.
    pub fn nodes(&self) -> Vec<NodeRef> {
        if self.is_disposed() {
            return Vec::new();
        }
        self.inner.host_nodes(self.root).to_vec()
    }
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle")
            .field("container", &self.container)
            .field("root", &self.root)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
