//! Error types.
//!
//! Each concern gets its own enum. Panics caught at the effect, component
//! and cleanup boundaries are turned into messages with [`panic_message`].

use std::any::Any;

use thiserror::Error;

use crate::dom::NodeRef;

/// Errors produced while rendering a component.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The component reported that it cannot render.
    #[error("component `{component}` failed to render: {reason}")]
    Failed { component: String, reason: String },

    /// The component panicked while building its tree.
    #[error("component `{component}` panicked while rendering: {message}")]
    Panicked { component: String, message: String },

    /// The container or a host node rejected the mount.
    #[error("host document rejected the mount: {0}")]
    Dom(#[from] DomError),

    /// A reactive primitive created during render could not be set up.
    #[error(transparent)]
    Reactive(#[from] ReactiveError),
}

impl RenderError {
    /// Convenience constructor for component authors.
    pub fn failed(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

/// Errors reported by a host document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("unknown node {0}")]
    UnknownNode(NodeRef),

    #[error("node {0} is not an element")]
    NotAnElement(NodeRef),

    /// Inserting `child` under `parent` would create a cycle.
    #[error("cannot insert {child} under {parent}: it is the parent or one of its ancestors")]
    HierarchyRequest { parent: NodeRef, child: NodeRef },

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeRef, child: NodeRef },
}

/// Errors from [`SignalList`](crate::reactive::SignalList) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("no row with key {0}")]
    UnknownKey(String),

    #[error("row value has key {found}, expected {expected}")]
    KeyMismatch { expected: String, found: String },

    #[error("key {0} is already present")]
    DuplicateKey(String),

    /// The keys passed to `reorder` are not a permutation of the current ones.
    #[error("reorder expects a permutation of {expected} keys: {reason}")]
    NotAPermutation { expected: usize, reason: String },
}

/// Errors from reactive primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error("computed value panicked on its first evaluation")]
    InitialEvaluation,
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Extract a printable message from a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn panic_messages_are_extracted() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");

        let payload = panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn render_error_display() {
        let error = RenderError::failed("Profile", "missing user");
        assert_eq!(
            error.to_string(),
            "component `Profile` failed to render: missing user"
        );

        let error = RenderError::from(DomError::UnknownNode(NodeRef::from_raw(3)));
        assert_eq!(error.to_string(), "host document rejected the mount: unknown node #3");
    }
}
