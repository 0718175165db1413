//! Node descriptors and the host document seam.
//!
//! - [`node`]: the hyperscript-style builder (`h`, `text`, `for_each`,
//!   `dynamic`, `component`) producing [`DomNode`] descriptors
//! - [`modifier`]: typed style modifiers
//! - [`host`]: the [`Dom`] trait the renderer mutates through
//! - [`memory`]: [`MemoryDom`], an in-memory host document

pub mod host;
pub mod memory;
pub mod modifier;
pub mod node;

pub use host::{Dom, DomEvent, DomResult, Listener, NodeRef};
pub use memory::MemoryDom;
pub use modifier::{
    has_color_modifier, Appearance, Interaction, Layout, Modifier, ModifierKind, Typography,
};
pub use node::{
    component, dynamic, for_each, h, text, ComponentNode, DomNode, ElementNode, IntoTextContent,
    NodeKey, Props, RegionNode, TextContent, TextNode,
};
