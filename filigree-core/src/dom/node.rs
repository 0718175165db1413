//! DOM node descriptors.
//!
//! A descriptor is plain data: a tag with props, modifiers and children, a
//! piece of text, a reactive region or a child component. Building one
//! touches no host document. The renderer consumes descriptors when it
//! mounts them and wires an effect for every reactive part.
//!
//! # Example
//!
//! ```rust
//! use filigree_core::dom::{h, text, Props};
//! use filigree_core::reactive::Signal;
//!
//! let name = Signal::new(String::from("world"));
//! let greeting = h(
//!     "p",
//!     Props::new().attr("class", "greeting"),
//!     [text("Hello, "), text(name.clone())],
//! );
//! assert_eq!(greeting.tag(), Some("p"));
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::host::{DomEvent, Listener};
use super::modifier::{has_color_modifier, Modifier};
use crate::reactive::{Computed, ReadSignal, Signal};
use crate::render::Component;

// ----------------------------------------------------------------------------
// Keys
// ----------------------------------------------------------------------------

/// Identity of a child within a keyed region.
///
/// Integers that fit in an `i64` are `Int`; larger unsigned values are
/// `Uint`. Numeric and string keys never compare equal, even when they print
/// the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    Int(i64),
    Uint(u64),
    Str(Rc<str>),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Uint(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

macro_rules! int_key {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for NodeKey {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

int_key!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for NodeKey {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::Uint(value), Self::Int)
    }
}

impl From<usize> for NodeKey {
    fn from(value: usize) -> Self {
        // usize is at most 64 bits wide on every supported target.
        Self::from(value as u64)
    }
}

impl From<&str> for NodeKey {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for NodeKey {
    fn from(value: String) -> Self {
        Self::Str(value.into())
    }
}

impl From<Rc<str>> for NodeKey {
    fn from(value: Rc<str>) -> Self {
        Self::Str(value)
    }
}

// ----------------------------------------------------------------------------
// Props
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PropKey {
    Attribute(String),
    Class(String),
    Event(String),
}

pub(crate) enum PropValue {
    Static(String),
    /// A boolean attribute: present with an empty value, or absent.
    Flag(bool),
    /// `None` removes the attribute.
    Dynamic(Rc<dyn Fn() -> Option<String>>),
    ClassToggle(Rc<dyn Fn() -> bool>),
    Listener(Listener),
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Flag(value) => f.debug_tuple("Flag").field(value).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
            Self::ClassToggle(_) => f.write_str("ClassToggle(..)"),
            Self::Listener(_) => f.write_str("Listener(..)"),
        }
    }
}

/// Element props, applied in insertion order.
///
/// Setting the same prop twice keeps its original position and the last
/// value.
#[derive(Debug, Default)]
pub struct Props {
    entries: IndexMap<PropKey, PropValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// A static attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries
            .insert(PropKey::Attribute(name.into()), PropValue::Static(value.into()));
        self
    }

    /// A static boolean attribute such as `disabled`.
    pub fn flag(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.entries
            .insert(PropKey::Attribute(name.into()), PropValue::Flag(enabled));
        self
    }

    /// A reactive attribute. Returning `None` removes it.
    pub fn bind<F>(mut self, name: impl Into<String>, value: F) -> Self
    where
        F: Fn() -> Option<String> + 'static,
    {
        self.entries
            .insert(PropKey::Attribute(name.into()), PropValue::Dynamic(Rc::new(value)));
        self
    }

    /// A reactive attribute that mirrors a signal.
    pub fn bind_signal(self, name: impl Into<String>, signal: Signal<String>) -> Self {
        self.bind(name, move || Some(signal.get()))
    }

    /// A class that is present while `enabled` returns true.
    pub fn class<F>(mut self, name: impl Into<String>, enabled: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.entries
            .insert(PropKey::Class(name.into()), PropValue::ClassToggle(Rc::new(enabled)));
        self
    }

    /// An event listener.
    pub fn on<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&DomEvent) + 'static,
    {
        self.entries
            .insert(PropKey::Event(event.into()), PropValue::Listener(Rc::new(handler)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The static value of an attribute, if it has one.
    pub fn static_attr(&self, name: &str) -> Option<&str> {
        match self.entries.get(&PropKey::Attribute(name.to_string()))? {
            PropValue::Static(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn into_entries(self) -> IndexMap<PropKey, PropValue> {
        self.entries
    }
}

// ----------------------------------------------------------------------------
// Text
// ----------------------------------------------------------------------------

/// Content of a text node.
#[derive(Clone)]
pub enum TextContent {
    Static(String),
    Dynamic(Rc<dyn Fn() -> String>),
}

impl fmt::Debug for TextContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Values accepted by [`text`].
pub trait IntoTextContent {
    fn into_text_content(self) -> TextContent;
}

impl IntoTextContent for TextContent {
    fn into_text_content(self) -> TextContent {
        self
    }
}

impl IntoTextContent for String {
    fn into_text_content(self) -> TextContent {
        TextContent::Static(self)
    }
}

impl IntoTextContent for &str {
    fn into_text_content(self) -> TextContent {
        TextContent::Static(self.to_string())
    }
}

impl<F> IntoTextContent for F
where
    F: Fn() -> String + 'static,
{
    fn into_text_content(self) -> TextContent {
        TextContent::Dynamic(Rc::new(self))
    }
}

impl IntoTextContent for Signal<String> {
    fn into_text_content(self) -> TextContent {
        TextContent::Dynamic(Rc::new(move || self.get()))
    }
}

impl IntoTextContent for ReadSignal<String> {
    fn into_text_content(self) -> TextContent {
        TextContent::Dynamic(Rc::new(move || self.get()))
    }
}

impl IntoTextContent for Computed<String> {
    fn into_text_content(self) -> TextContent {
        TextContent::Dynamic(Rc::new(move || self.get()))
    }
}

// ----------------------------------------------------------------------------
// Nodes
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct ElementNode {
    pub(crate) tag: String,
    pub(crate) props: Props,
    pub(crate) modifiers: Vec<Modifier>,
    pub(crate) children: Vec<DomNode>,
    pub(crate) key: Option<NodeKey>,
}

impl ElementNode {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn children(&self) -> &[DomNode] {
        &self.children
    }

    pub fn has_color_modifier(&self) -> bool {
        has_color_modifier(&self.modifiers)
    }
}

#[derive(Debug)]
pub struct TextNode {
    pub(crate) content: TextContent,
    pub(crate) key: Option<NodeKey>,
}

impl TextNode {
    pub fn content(&self) -> &TextContent {
        &self.content
    }
}

pub(crate) type RowBuilder = Box<dyn Fn(&NodeKey) -> Option<DomNode>>;

/// Where a region's children come from.
pub(crate) enum RegionSource {
    /// A tracked key sequence and a per-key row builder.
    Keyed {
        keys: Box<dyn Fn() -> Vec<NodeKey>>,
        row: RowBuilder,
    },
    /// A tracked function producing the children themselves.
    Dynamic(Box<dyn Fn() -> Vec<DomNode>>),
}

/// A reactive run of sibling nodes.
pub struct RegionNode {
    pub(crate) source: RegionSource,
    pub(crate) key: Option<NodeKey>,
}

impl fmt::Debug for RegionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            RegionSource::Keyed { .. } => "keyed",
            RegionSource::Dynamic(_) => "dynamic",
        };
        f.debug_struct("RegionNode")
            .field("source", &source)
            .field("key", &self.key)
            .finish()
    }
}

pub struct ComponentNode {
    pub(crate) instance: Rc<dyn Component>,
    pub(crate) key: Option<NodeKey>,
}

impl ComponentNode {
    pub fn name(&self) -> &str {
        self.instance.name()
    }
}

impl fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentNode")
            .field("name", &self.name())
            .field("key", &self.key)
            .finish()
    }
}

/// A node descriptor.
#[derive(Debug)]
pub enum DomNode {
    Element(ElementNode),
    Text(TextNode),
    Region(RegionNode),
    Component(ComponentNode),
}

impl DomNode {
    /// Give this node an identity within a keyed region.
    pub fn with_key(mut self, key: impl Into<NodeKey>) -> Self {
        let slot = match &mut self {
            Self::Element(node) => &mut node.key,
            Self::Text(node) => &mut node.key,
            Self::Region(node) => &mut node.key,
            Self::Component(node) => &mut node.key,
        };
        *slot = Some(key.into());
        self
    }

    /// Append a style modifier. Only elements carry modifiers.
    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        match &mut self {
            Self::Element(node) => node.modifiers.push(modifier),
            _ => tracing::warn!(kind = ?modifier.kind(), "modifier on a non-element node ignored"),
        }
        self
    }

    pub fn key(&self) -> Option<&NodeKey> {
        match self {
            Self::Element(node) => node.key.as_ref(),
            Self::Text(node) => node.key.as_ref(),
            Self::Region(node) => node.key.as_ref(),
            Self::Component(node) => node.key.as_ref(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Element(node) => Some(&node.tag),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Self::Element(node) => Some(node),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Shapes
// ----------------------------------------------------------------------------

/// The static part of a prop. Reactive props only record that they exist.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PropShape {
    Static(String),
    Flag(bool),
    Reactive,
}

/// Everything about a descriptor that mounting fixes for good.
///
/// Two descriptors with equal shapes mount to the same host nodes, up to
/// what their effects later write.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeShape {
    Element {
        tag: String,
        props: Vec<(PropKey, PropShape)>,
        modifiers: Vec<Modifier>,
        children: Vec<NodeShape>,
    },
    /// `None` for reactive text.
    Text(Option<String>),
    Region,
    Component(String),
}

impl DomNode {
    pub(crate) fn shape(&self) -> NodeShape {
        match self {
            Self::Element(node) => NodeShape::Element {
                tag: node.tag.clone(),
                props: node
                    .props
                    .entries
                    .iter()
                    .map(|(key, value)| {
                        let shape = match value {
                            PropValue::Static(value) => PropShape::Static(value.clone()),
                            PropValue::Flag(enabled) => PropShape::Flag(*enabled),
                            _ => PropShape::Reactive,
                        };
                        (key.clone(), shape)
                    })
                    .collect(),
                modifiers: node.modifiers.clone(),
                children: node.children.iter().map(DomNode::shape).collect(),
            },
            Self::Text(node) => match &node.content {
                TextContent::Static(content) => NodeShape::Text(Some(content.clone())),
                TextContent::Dynamic(_) => NodeShape::Text(None),
            },
            Self::Region(_) => NodeShape::Region,
            Self::Component(node) => NodeShape::Component(node.name().to_string()),
        }
    }
}

// ----------------------------------------------------------------------------
// Builders
// ----------------------------------------------------------------------------

/// Build an element.
pub fn h(
    tag: impl Into<String>,
    props: Props,
    children: impl IntoIterator<Item = DomNode>,
) -> DomNode {
    DomNode::Element(ElementNode {
        tag: tag.into(),
        props,
        modifiers: Vec::new(),
        children: children.into_iter().collect(),
        key: None,
    })
}

/// Build a text node from a literal, a closure or a signal.
pub fn text(content: impl IntoTextContent) -> DomNode {
    DomNode::Text(TextNode {
        content: content.into_text_content(),
        key: None,
    })
}

/// A keyed region: one row per key, rebuilt only when its key is new.
///
/// `keys` is tracked; `row` runs untracked in the row's own scope. Duplicate
/// keys are dropped, the first occurrence wins.
pub fn for_each<K, KF, RF>(keys: KF, row: RF) -> DomNode
where
    K: Clone + Into<NodeKey> + 'static,
    KF: Fn() -> Vec<K> + 'static,
    RF: Fn(K) -> DomNode + 'static,
{
    // Rows are built from the caller's key type; the region only sees
    // `NodeKey`s, so remember which caller key each one came from.
    let latest: Rc<RefCell<HashMap<NodeKey, K>>> = Rc::default();
    let writer = Rc::clone(&latest);

    let keys = move || {
        let keys = keys();
        let mut lookup = writer.borrow_mut();
        lookup.clear();
        keys.into_iter()
            .map(|key| {
                let node_key: NodeKey = key.clone().into();
                lookup.entry(node_key.clone()).or_insert(key);
                node_key
            })
            .collect::<Vec<_>>()
    };
    let row = move |key: &NodeKey| {
        let key = latest.borrow().get(key).cloned()?;
        Some(row(key))
    };

    DomNode::Region(RegionNode {
        source: RegionSource::Keyed {
            keys: Box::new(keys),
            row: Box::new(row),
        },
        key: None,
    })
}

/// A region whose children are recomputed whenever anything `children`
/// reads changes.
///
/// When every child carries a key the children are reconciled by key;
/// otherwise the whole region is replaced.
///
/// A keyed child whose key was already mounted keeps its host nodes, so it
/// should read the state it shows reactively. If its static content (tag,
/// static props, modifiers, literal text, child structure) differs from
/// what was mounted under that key, the row is rebuilt instead.
pub fn dynamic<F>(children: F) -> DomNode
where
    F: Fn() -> Vec<DomNode> + 'static,
{
    DomNode::Region(RegionNode {
        source: RegionSource::Dynamic(Box::new(children)),
        key: None,
    })
}

/// A child component, rendered in its own scope.
pub fn component(instance: impl Component) -> DomNode {
    DomNode::Component(ComponentNode {
        instance: Rc::new(instance),
        key: None,
    })
}
