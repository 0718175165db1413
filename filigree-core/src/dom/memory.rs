//! In-memory host document.
//!
//! Nodes live in a vector indexed by [`NodeRef`]. Releasing a node clears
//! its slot and the next created node reuses it, so a [`NodeRef`] must not
//! be used after it was released. Classes are tokens of the `class` attribute and inline styles
//! are kept in declaration order, as a browser would.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::host::{Dom, DomResult, Listener, NodeRef};
use crate::error::DomError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Element(String),
    Text,
    Comment,
}

struct HostNode {
    kind: NodeKind,
    /// Text or comment content.
    content: String,
    attributes: IndexMap<String, String>,
    styles: IndexMap<String, String>,
    listeners: SmallVec<[(String, Listener); 2]>,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
}

impl HostNode {
    fn new(kind: NodeKind, content: &str) -> Self {
        Self {
            kind,
            content: content.to_string(),
            attributes: IndexMap::new(),
            styles: IndexMap::new(),
            listeners: SmallVec::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Document {
    nodes: Vec<Option<HostNode>>,
    /// Released slots, reused last-in first-out.
    free: Vec<usize>,
}

impl Document {
    fn insert(&mut self, node: HostNode) -> NodeRef {
        if let Some(index) = self.free.pop() {
            self.nodes[index] = Some(node);
            return NodeRef::from_raw(index);
        }
        self.nodes.push(Some(node));
        NodeRef::from_raw(self.nodes.len() - 1)
    }

    fn node(&self, node: NodeRef) -> DomResult<&HostNode> {
        self.nodes
            .get(node.raw())
            .and_then(Option::as_ref)
            .ok_or(DomError::UnknownNode(node))
    }

    fn node_mut(&mut self, node: NodeRef) -> DomResult<&mut HostNode> {
        self.nodes
            .get_mut(node.raw())
            .and_then(Option::as_mut)
            .ok_or(DomError::UnknownNode(node))
    }

    fn element_mut(&mut self, node: NodeRef) -> DomResult<&mut HostNode> {
        let host = self.node_mut(node)?;
        match host.kind {
            NodeKind::Element(_) => Ok(host),
            _ => Err(DomError::NotAnElement(node)),
        }
    }

    fn detach(&mut self, node: NodeRef) -> DomResult<()> {
        let parent = self.node_mut(node)?.parent.take();
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|child| *child != node);
        }
        Ok(())
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    fn is_inclusive_ancestor(&self, ancestor: NodeRef, node: NodeRef) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.node(candidate).ok().and_then(|host| host.parent);
        }
        false
    }

    fn write_html(&self, node: NodeRef, out: &mut String) {
        let Ok(host) = self.node(node) else {
            return;
        };
        match &host.kind {
            NodeKind::Text => out.push_str(&escape(&host.content)),
            NodeKind::Comment => {
                let _ = write!(out, "<!--{}-->", host.content);
            }
            NodeKind::Element(tag) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in &host.attributes {
                    let _ = write!(out, " {name}=\"{}\"", escape(value));
                }
                if !host.styles.is_empty() {
                    let style = host
                        .styles
                        .iter()
                        .map(|(property, value)| format!("{property}: {value}"))
                        .collect::<Vec<_>>()
                        .join("; ");
                    let _ = write!(out, " style=\"{}\"", escape(&style));
                }
                out.push('>');
                for child in &host.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn write_text(&self, node: NodeRef, out: &mut String) {
        let Ok(host) = self.node(node) else {
            return;
        };
        match host.kind {
            NodeKind::Text => out.push_str(&host.content),
            NodeKind::Comment => {}
            NodeKind::Element(_) => {
                for child in &host.children {
                    self.write_text(*child, out);
                }
            }
        }
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A shared handle to an in-memory document.
///
/// Clones refer to the same document, so a test can keep one handle for
/// assertions while the renderer owns another.
///
/// ```rust
/// use filigree_core::dom::{Dom, MemoryDom};
///
/// let dom = MemoryDom::new();
/// let list = dom.create_element("ul");
/// let item = dom.create_element("li");
/// dom.append_child(list, item).unwrap();
/// dom.set_attribute(item, "id", "first").unwrap();
///
/// assert_eq!(dom.to_html(list), r#"<ul><li id="first"></li></ul>"#);
/// ```
#[derive(Clone, Default)]
pub struct MemoryDom {
    document: Rc<RefCell<Document>>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `node` and its descendants as HTML.
    pub fn to_html(&self, node: NodeRef) -> String {
        let mut out = String::new();
        self.document.borrow().write_html(node, &mut out);
        out
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeRef) -> String {
        let mut out = String::new();
        self.document.borrow().write_text(node, &mut out);
        out
    }

    /// Number of nodes that have not been released.
    pub fn live_node_count(&self) -> usize {
        let document = self.document.borrow();
        document.nodes.len() - document.free.len()
    }

    /// Number of slots ever allocated, live or free.
    pub fn slot_count(&self) -> usize {
        self.document.borrow().nodes.len()
    }

    pub fn contains(&self, node: NodeRef) -> bool {
        self.document.borrow().node(node).is_ok()
    }

    pub fn children(&self, node: NodeRef) -> Vec<NodeRef> {
        self.document
            .borrow()
            .node(node)
            .map(|host| host.children.clone())
            .unwrap_or_default()
    }

    pub fn tag(&self, node: NodeRef) -> Option<String> {
        match &self.document.borrow().node(node).ok()?.kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeRef, name: &str) -> Option<String> {
        self.document
            .borrow()
            .node(node)
            .ok()?
            .attributes
            .get(name)
            .cloned()
    }

    pub fn has_class(&self, node: NodeRef, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|token| token == class))
    }

    pub fn style(&self, node: NodeRef, property: &str) -> Option<String> {
        self.document
            .borrow()
            .node(node)
            .ok()?
            .styles
            .get(property)
            .cloned()
    }
}

impl Dom for MemoryDom {
    fn create_element(&self, tag: &str) -> NodeRef {
        self.document
            .borrow_mut()
            .insert(HostNode::new(NodeKind::Element(tag.to_string()), ""))
    }

    fn create_text(&self, content: &str) -> NodeRef {
        self.document
            .borrow_mut()
            .insert(HostNode::new(NodeKind::Text, content))
    }

    fn create_comment(&self, content: &str) -> NodeRef {
        self.document
            .borrow_mut()
            .insert(HostNode::new(NodeKind::Comment, content))
    }

    fn ensure_element(&self, node: NodeRef) -> DomResult<()> {
        match self.document.borrow().node(node)?.kind {
            NodeKind::Element(_) => Ok(()),
            _ => Err(DomError::NotAnElement(node)),
        }
    }

    fn set_attribute(&self, node: NodeRef, name: &str, value: &str) -> DomResult<()> {
        let mut document = self.document.borrow_mut();
        document
            .element_mut(node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_attribute(&self, node: NodeRef, name: &str) -> DomResult<()> {
        let mut document = self.document.borrow_mut();
        document.element_mut(node)?.attributes.shift_remove(name);
        Ok(())
    }

    fn set_text(&self, node: NodeRef, content: &str) -> DomResult<()> {
        {
            let mut document = self.document.borrow_mut();
            let host = document.node_mut(node)?;
            if !matches!(host.kind, NodeKind::Element(_)) {
                host.content = content.to_string();
                return Ok(());
            }
        }

        // Like `textContent =` on an element: children are replaced.
        for child in self.children(node) {
            self.remove(child)?;
            self.release(child);
        }
        let text = self.create_text(content);
        self.append_child(node, text)
    }

    fn toggle_class(&self, node: NodeRef, class: &str, enabled: bool) -> DomResult<()> {
        let mut document = self.document.borrow_mut();
        let host = document.element_mut(node)?;
        let mut tokens: Vec<String> = host
            .attributes
            .get("class")
            .map(|classes| classes.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let present = tokens.iter().any(|token| token == class);
        match (enabled, present) {
            (true, false) => tokens.push(class.to_string()),
            (false, true) => tokens.retain(|token| token != class),
            _ => return Ok(()),
        }
        if tokens.is_empty() {
            host.attributes.shift_remove("class");
        } else {
            host.attributes.insert("class".to_string(), tokens.join(" "));
        }
        Ok(())
    }

    fn set_style(&self, node: NodeRef, property: &str, value: &str) -> DomResult<()> {
        let mut document = self.document.borrow_mut();
        document
            .element_mut(node)?
            .styles
            .insert(property.to_string(), value.to_string());
        Ok(())
    }

    fn add_listener(&self, node: NodeRef, event: &str, listener: Listener) -> DomResult<()> {
        let mut document = self.document.borrow_mut();
        document
            .node_mut(node)?
            .listeners
            .push((event.to_string(), listener));
        Ok(())
    }

    fn insert_before(
        &self,
        parent: NodeRef,
        child: NodeRef,
        reference: Option<NodeRef>,
    ) -> DomResult<()> {
        let mut document = self.document.borrow_mut();
        document.element_mut(parent)?;
        document.node(child)?;
        if document.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference {
            if document.node(reference)?.parent != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        document.detach(child)?;
        let siblings = &mut document.node_mut(parent)?.children;
        let index = reference
            .and_then(|reference| siblings.iter().position(|sibling| *sibling == reference))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        document.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn remove(&self, node: NodeRef) -> DomResult<()> {
        self.document.borrow_mut().detach(node)
    }

    fn release(&self, node: NodeRef) {
        let mut document = self.document.borrow_mut();
        // A parent must not keep a reference to a slot that will be reused.
        if document.detach(node).is_err() {
            return;
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(slot) = document.nodes.get_mut(current.raw()) else {
                continue;
            };
            if let Some(host) = slot.take() {
                stack.extend(host.children);
                document.free.push(current.raw());
            }
        }
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.document.borrow().node(node).ok()?.parent
    }

    fn next_sibling(&self, node: NodeRef) -> Option<NodeRef> {
        let document = self.document.borrow();
        let parent = document.node(node).ok()?.parent?;
        let siblings = &document.node(parent).ok()?.children;
        let index = siblings.iter().position(|sibling| *sibling == node)?;
        siblings.get(index + 1).copied()
    }

    fn listeners(&self, node: NodeRef, event: &str) -> Vec<Listener> {
        self.document
            .borrow()
            .node(node)
            .map(|host| {
                host.listeners
                    .iter()
                    .filter(|(name, _)| name == event)
                    .map(|(_, listener)| Rc::clone(listener))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDom")
            .field("live_node_count", &self.live_node_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomEvent;
    use std::cell::Cell;

    #[test]
    fn builds_and_serializes_a_tree() {
        let dom = MemoryDom::new();
        let root = dom.create_element("div");
        let label = dom.create_text("a < b");
        let marker = dom.create_comment("anchor");
        dom.append_child(root, label).unwrap();
        dom.append_child(root, marker).unwrap();
        dom.set_attribute(root, "title", "say \"hi\"").unwrap();
        dom.set_style(root, "color", "red").unwrap();

        assert_eq!(
            dom.to_html(root),
            "<div title=\"say &quot;hi&quot;\" style=\"color: red\">a &lt; b<!--anchor--></div>"
        );
        assert_eq!(dom.text_content(root), "a < b");
    }

    #[test]
    fn insert_before_moves_existing_children() {
        let dom = MemoryDom::new();
        let list = dom.create_element("ul");
        let items: Vec<_> = (0..3).map(|_| dom.create_element("li")).collect();
        for item in &items {
            dom.append_child(list, *item).unwrap();
        }

        dom.insert_before(list, items[2], Some(items[0])).unwrap();
        assert_eq!(dom.children(list), vec![items[2], items[0], items[1]]);
        assert_eq!(dom.next_sibling(items[0]), Some(items[1]));
        assert_eq!(dom.next_sibling(items[1]), None);
    }

    #[test]
    fn hierarchy_errors_are_reported() {
        let dom = MemoryDom::new();
        let outer = dom.create_element("div");
        let inner = dom.create_element("span");
        let text = dom.create_text("x");
        dom.append_child(outer, inner).unwrap();

        assert_eq!(
            dom.append_child(inner, outer),
            Err(DomError::HierarchyRequest {
                parent: inner,
                child: outer
            })
        );
        assert_eq!(dom.append_child(text, inner), Err(DomError::NotAnElement(text)));

        let stray = dom.create_element("p");
        assert_eq!(
            dom.insert_before(outer, text, Some(stray)),
            Err(DomError::NotAChild {
                parent: outer,
                child: stray
            })
        );
    }

    #[test]
    fn class_toggles_edit_the_class_attribute() {
        let dom = MemoryDom::new();
        let node = dom.create_element("div");

        dom.toggle_class(node, "active", true).unwrap();
        dom.toggle_class(node, "wide", true).unwrap();
        dom.toggle_class(node, "active", true).unwrap();
        assert_eq!(dom.attribute(node, "class").as_deref(), Some("active wide"));

        dom.toggle_class(node, "active", false).unwrap();
        dom.toggle_class(node, "wide", false).unwrap();
        assert_eq!(dom.attribute(node, "class"), None);
        assert!(!dom.has_class(node, "wide"));
    }

    #[test]
    fn release_drops_the_whole_subtree() {
        let dom = MemoryDom::new();
        let root = dom.create_element("div");
        let child = dom.create_element("p");
        let leaf = dom.create_text("leaf");
        dom.append_child(root, child).unwrap();
        dom.append_child(child, leaf).unwrap();
        assert_eq!(dom.live_node_count(), 3);

        dom.remove(child).unwrap();
        dom.release(child);
        assert_eq!(dom.live_node_count(), 1);
        assert!(!dom.contains(leaf));
        assert_eq!(dom.children(root), Vec::new());
        assert_eq!(
            dom.set_text(leaf, "gone"),
            Err(DomError::UnknownNode(leaf))
        );
    }

    #[test]
    fn released_slots_are_reused() {
        let dom = MemoryDom::new();
        let root = dom.create_element("ul");

        for round in 0..10 {
            let item = dom.create_element("li");
            let label = dom.create_text(&format!("item {round}"));
            dom.append_child(item, label).unwrap();
            dom.append_child(root, item).unwrap();
            dom.remove(item).unwrap();
            dom.release(item);
        }

        assert_eq!(dom.live_node_count(), 1);
        assert_eq!(dom.slot_count(), 3);
    }

    #[test]
    fn releasing_an_attached_node_detaches_it() {
        let dom = MemoryDom::new();
        let root = dom.create_element("div");
        let child = dom.create_element("p");
        dom.append_child(root, child).unwrap();

        dom.release(child);
        assert_eq!(dom.children(root), Vec::new());

        let reused = dom.create_text("new");
        assert_eq!(reused, child);
        assert_eq!(dom.to_html(root), "<div></div>");
    }

    #[test]
    fn listeners_are_returned_in_registration_order() {
        let dom = MemoryDom::new();
        let button = dom.create_element("button");
        let calls = Rc::new(Cell::new(0));

        let counter = calls.clone();
        dom.add_listener(button, "click", Rc::new(move |_| counter.set(counter.get() + 1)))
            .unwrap();
        dom.add_listener(button, "input", Rc::new(|_| {})).unwrap();

        let event = DomEvent::new("click", button);
        for listener in dom.listeners(button, "click") {
            listener(&event);
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(dom.listeners(button, "input").len(), 1);
    }
}
