//! The host document seam.
//!
//! The renderer never owns host nodes. It holds [`NodeRef`] handles and
//! performs every mutation through the [`Dom`] trait, one targeted call per
//! change. [`MemoryDom`](super::MemoryDom) is the in-process implementation.

use std::fmt;
use std::rc::Rc;

use crate::error::DomError;

pub type DomResult<T> = Result<T, DomError>;

/// Handle to a node in a host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(usize);

impl NodeRef {
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An event delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub name: String,
    /// The node the event was dispatched on.
    pub target: NodeRef,
    /// Optional payload, e.g. the new value of an input.
    pub detail: Option<String>,
}

impl DomEvent {
    pub fn new(name: impl Into<String>, target: NodeRef) -> Self {
        Self {
            name: name.into(),
            target,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// An event handler attached to a host node.
pub type Listener = Rc<dyn Fn(&DomEvent)>;

/// Mutation and query surface of a host document.
///
/// Methods take `&self`: implementations are shared handles with interior
/// mutability, so listeners invoked by the renderer can write signals that
/// mutate the same document.
pub trait Dom {
    fn create_element(&self, tag: &str) -> NodeRef;
    fn create_text(&self, content: &str) -> NodeRef;
    fn create_comment(&self, content: &str) -> NodeRef;

    /// Succeeds if `node` exists and is an element.
    fn ensure_element(&self, node: NodeRef) -> DomResult<()>;

    fn set_attribute(&self, node: NodeRef, name: &str, value: &str) -> DomResult<()>;
    fn remove_attribute(&self, node: NodeRef, name: &str) -> DomResult<()>;
    fn set_text(&self, node: NodeRef, content: &str) -> DomResult<()>;
    fn toggle_class(&self, node: NodeRef, class: &str, enabled: bool) -> DomResult<()>;
    fn set_style(&self, node: NodeRef, property: &str, value: &str) -> DomResult<()>;
    fn add_listener(&self, node: NodeRef, event: &str, listener: Listener) -> DomResult<()>;

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None`. A child that already has a parent is moved.
    fn insert_before(&self, parent: NodeRef, child: NodeRef, reference: Option<NodeRef>)
        -> DomResult<()>;

    fn append_child(&self, parent: NodeRef, child: NodeRef) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Detach a node from its parent. Detaching a detached node is a no-op.
    fn remove(&self, node: NodeRef) -> DomResult<()>;

    /// Drop a detached node and its descendants from the document.
    fn release(&self, node: NodeRef);

    fn parent(&self, node: NodeRef) -> Option<NodeRef>;
    fn next_sibling(&self, node: NodeRef) -> Option<NodeRef>;

    /// Listeners registered on `node` for `event`, in registration order.
    fn listeners(&self, node: NodeRef, event: &str) -> Vec<Listener>;
}
