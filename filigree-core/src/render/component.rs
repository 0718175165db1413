//! Components and the per-renderer component registry.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::arena::MountId;
use crate::dom::DomNode;
use crate::error::RenderError;
use crate::reactive::Scope;

/// A renderable unit.
///
/// `render` runs once, untracked, inside the component's own scope. Signals
/// read while building the tree do not re-render the component; reactive
/// parts of the tree (bound props, dynamic text, regions) update in place.
pub trait Component: 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn render(&self) -> Result<DomNode, RenderError>;
}

/// A component built from a closure.
pub struct FnComponent<F> {
    name: String,
    render: F,
}

impl<F> Component for FnComponent<F>
where
    F: Fn() -> Result<DomNode, RenderError> + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self) -> Result<DomNode, RenderError> {
        (self.render)()
    }
}

/// Wrap a render closure as a named component.
///
/// ```rust
/// use filigree_core::dom::{h, text, Props};
/// use filigree_core::render::{fn_component, Component};
///
/// let hello = fn_component("Hello", || Ok(h("p", Props::new(), [text("hi")])));
/// assert_eq!(hello.name(), "Hello");
/// ```
pub fn fn_component<F>(name: impl Into<String>, render: F) -> FnComponent<F>
where
    F: Fn() -> Result<DomNode, RenderError> + 'static,
{
    FnComponent {
        name: name.into(),
        render,
    }
}

/// Identifies a mounted component within one renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component-{}", self.0)
    }
}

pub(crate) struct ComponentEntry {
    pub(crate) instance: Rc<dyn Component>,
    pub(crate) scope: Scope,
    pub(crate) mount: Option<MountId>,
}

/// Live component instances of one renderer, in mount order.
///
/// Entries are removed by a cleanup on the component's scope, so disposing
/// any ancestor scope empties the registry for that subtree.
#[derive(Default)]
pub(crate) struct ComponentRegistry {
    next: u64,
    entries: IndexMap<ComponentId, ComponentEntry>,
}

impl ComponentRegistry {
    pub(crate) fn register(&mut self, instance: Rc<dyn Component>, scope: Scope) -> ComponentId {
        self.next += 1;
        let id = ComponentId(self.next);
        self.entries.insert(
            id,
            ComponentEntry {
                instance,
                scope,
                mount: None,
            },
        );
        id
    }

    pub(crate) fn set_mount(&mut self, id: ComponentId, mount: MountId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.mount = Some(mount);
        }
    }

    pub(crate) fn unregister(&mut self, id: ComponentId) -> Option<ComponentEntry> {
        self.entries.shift_remove(&id)
    }

    pub(crate) fn get(&self, id: ComponentId) -> Option<&ComponentEntry> {
        self.entries.get(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ComponentId, &ComponentEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{h, Props};

    struct Plain;

    impl Component for Plain {
        fn render(&self) -> Result<DomNode, RenderError> {
            Ok(h("div", Props::new(), []))
        }
    }

    fn named(name: &'static str) -> Rc<dyn Component> {
        Rc::new(fn_component(name, || Ok(h("span", Props::new(), []))))
    }

    #[test]
    fn default_name_is_the_type_name() {
        assert!(Plain.name().ends_with("Plain"));
    }

    #[test]
    fn registry_keeps_mount_order() {
        let mut registry = ComponentRegistry::default();
        let first = registry.register(named("First"), Scope::detached());
        let second = registry.register(named("Second"), Scope::detached());
        assert_ne!(first, second);

        let names: Vec<_> = registry
            .iter()
            .map(|(_, entry)| entry.instance.name().to_string())
            .collect();
        assert_eq!(names, vec!["First", "Second"]);

        let removed = registry.unregister(first).unwrap();
        assert_eq!(removed.instance.name(), "First");
        assert!(removed.instance.render().is_ok());
        assert_eq!(registry.len(), 1);
        assert!(registry.get(first).is_none());
        assert!(registry.get(second).is_some());
    }
}
