//! Filigree Core
//!
//! This crate provides the core runtime for the Filigree UI framework.
//! It implements:
//!
//! - Fine-grained reactive primitives (signals, effects, computeds, scopes)
//! - A hyperscript-style node builder with typed style modifiers
//! - A direct-DOM renderer that patches single host nodes and reconciles
//!   keyed lists through a row cache
//! - Keyed reactive collections with one signal per row
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: signals, effects, scheduling and ownership
//! - `dom`: node descriptors, modifiers and the host document seam
//! - `render`: mounting, reconciliation, metrics and the component registry
//! - `config`: serde-loadable runtime and renderer settings
//! - `error`: error types
//!
//! # Example
//!
//! ```rust
//! use filigree_core::prelude::*;
//!
//! let dom = MemoryDom::new();
//! let container = dom.create_element("main");
//! let renderer = Renderer::new(dom.clone());
//!
//! let todos = create_signal_list(vec![(1, "write"), (2, "test")], |row| row.0);
//! let list = todos.clone();
//! let _handle = renderer
//!     .render_component(
//!         fn_component("Todos", move || {
//!             Ok(h(
//!                 "ul",
//!                 Props::new(),
//!                 [list.view(|_, row| {
//!                     h("li", Props::new(), [text(move || row.get().1.to_string())])
//!                 })],
//!             ))
//!         }),
//!         container,
//!     )
//!     .unwrap();
//!
//! assert_eq!(dom.text_content(container), "writetest");
//!
//! todos.update(&1, (1, "draft")).unwrap();
//! assert_eq!(dom.text_content(container), "drafttest");
//! assert_eq!(renderer.metrics().text_updates, 3);
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod reactive;
pub mod render;

pub use config::{configure_runtime, RendererConfig, RuntimeConfig};
pub use dom::{
    component, dynamic, for_each, h, text, Dom, DomEvent, DomNode, MemoryDom, Modifier, NodeKey,
    NodeRef, Props,
};
pub use error::{ConfigError, DomError, ListError, ReactiveError, RenderError};
pub use reactive::{
    batch, create_computed, create_effect, create_signal, create_signal_list, on_cleanup,
    try_create_computed, untrack, Computed, Effect, ReadSignal, Scope, Signal, SignalList,
    WriteSignal,
};
pub use render::{fn_component, Component, RenderHandle, Renderer, RendererMetricsSnapshot};

/// Everything needed to write and mount components.
pub mod prelude {
    pub use crate::dom::{
        component, dynamic, for_each, h, text, Appearance, Dom, DomEvent, DomNode, Interaction,
        Layout, MemoryDom, Modifier, NodeKey, NodeRef, Props, Typography,
    };
    pub use crate::error::RenderError;
    pub use crate::reactive::{
        batch, create_computed, create_effect, create_signal, create_signal_list, on_cleanup,
        try_create_computed, untrack, Computed, Effect, ReadSignal, Scope, Signal, SignalList,
        WriteSignal,
    };
    pub use crate::render::{fn_component, Component, RenderHandle, Renderer};
}
