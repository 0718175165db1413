//! Ownership scopes.
//!
//! A scope collects the effects, child scopes and cleanup callbacks created
//! while it is the current owner. Disposing the scope disposes all of them.
//! Components and list rows each get a scope; unmounting is disposing it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::id::{EffectId, ScopeId};
use super::runtime::{run_cleanups, Cleanup, Runtime};

/// Runtime-side state of a scope.
pub(crate) struct ScopeNode {
    id: ScopeId,
    effects: RefCell<Vec<EffectId>>,
    children: RefCell<SmallVec<[ScopeId; 4]>>,
    cleanups: RefCell<Vec<Cleanup>>,
    disposed: Cell<bool>,
}

impl ScopeNode {
    pub(crate) fn id(&self) -> ScopeId {
        self.id
    }

    pub(crate) fn adopt_effect(&self, effect: EffectId) {
        self.effects.borrow_mut().push(effect);
    }

    pub(crate) fn adopt_scope(&self, scope: ScopeId) {
        self.children.borrow_mut().push(scope);
    }

    pub(crate) fn adopt_cleanup(&self, cleanup: Cleanup) {
        self.cleanups.borrow_mut().push(cleanup);
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        let effects = std::mem::take(&mut *self.effects.borrow_mut());
        for effect in effects {
            if let Some(node) = Runtime::effect(effect) {
                node.dispose();
            }
        }

        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            if let Some(node) = Runtime::scope(child) {
                node.dispose();
            }
        }

        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        run_cleanups(cleanups);

        Runtime::unregister_scope(self.id);
    }
}

/// An ownership root for effects and cleanups.
///
/// ```rust
/// use filigree_core::reactive::{Effect, Scope, Signal};
///
/// let count = Signal::new(0);
/// let scope = Scope::new();
///
/// let reader = count.clone();
/// scope.run(|| {
///     Effect::new(move || {
///         reader.get();
///     });
/// });
/// assert_eq!(count.subscriber_count(), 1);
///
/// scope.dispose();
/// assert_eq!(count.subscriber_count(), 0);
/// ```
#[derive(Clone)]
pub struct Scope {
    node: Rc<ScopeNode>,
}

impl Scope {
    /// Create a scope owned by the current owner, if there is one.
    pub fn new() -> Self {
        let scope = Self::detached();
        if let Some(owner) = ReactiveContext::current_owner() {
            Runtime::adopt_scope(owner, scope.node.id);
        }
        scope
    }

    /// Create a scope with no owner. Only an explicit `dispose` ends it.
    pub fn detached() -> Self {
        let node = Rc::new(ScopeNode {
            id: ScopeId::next(),
            effects: RefCell::new(Vec::new()),
            children: RefCell::new(SmallVec::new()),
            cleanups: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
        });
        Runtime::register_scope(Rc::clone(&node));
        Self { node }
    }

    /// Run `f` with this scope as owner and with signal reads untracked.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.is_disposed() {
            tracing::warn!("running inside a disposed scope; created effects will leak");
        }
        let _ctx = ReactiveContext::enter_scope(self.node.id);
        f()
    }

    /// Register a callback to run when the scope is disposed.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) {
        if self.is_disposed() {
            tracing::warn!("cleanup registered on a disposed scope; it will never run");
            return;
        }
        self.node.adopt_cleanup(Box::new(cleanup));
    }

    /// Dispose every effect, child scope and cleanup this scope owns.
    ///
    /// A cleanup that panics is logged; the remaining ones still run.
    pub fn dispose(&self) {
        self.node.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.node.disposed.get()
    }

    /// Number of effects directly owned by this scope.
    pub fn effect_count(&self) -> usize {
        self.node.effects.borrow().len()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.node.id)
            .field("effect_count", &self.effect_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{on_cleanup, Effect, Signal};

    #[test]
    fn scope_collects_effects() {
        let signal = Signal::new(1);
        let scope = Scope::new();

        let reader = signal.clone();
        scope.run(|| {
            Effect::new(move || {
                reader.get();
            });
        });

        assert_eq!(scope.effect_count(), 1);
        assert_eq!(signal.subscriber_count(), 1);

        scope.dispose();
        assert!(scope.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn scope_reads_are_untracked() {
        let signal = Signal::new(1);
        let outer_runs = Rc::new(Cell::new(0));

        let (reader, runs) = (signal.clone(), outer_runs.clone());
        let effect = Effect::new(move || {
            runs.set(runs.get() + 1);
            let scope = Scope::new();
            scope.run(|| reader.get());
        });

        signal.set(2);
        assert_eq!(outer_runs.get(), 1);
        effect.dispose();
    }

    #[test]
    fn child_scopes_are_disposed_with_parent() {
        let parent = Scope::detached();
        let child = parent.run(Scope::new);

        parent.dispose();
        assert!(child.is_disposed());
    }

    #[test]
    fn cleanups_run_in_order_despite_panics() {
        let scope = Scope::detached();
        let log = Rc::new(RefCell::new(Vec::new()));

        let (first, last) = (log.clone(), log.clone());
        scope.run(|| {
            on_cleanup(move || first.borrow_mut().push("first"));
            on_cleanup(|| panic!("broken cleanup"));
            on_cleanup(move || last.borrow_mut().push("last"));
        });

        scope.dispose();
        assert_eq!(*log.borrow(), vec!["first", "last"]);
    }

    #[test]
    fn dispose_is_idempotent() {
        let scope = Scope::detached();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        scope.on_cleanup(move || counter.set(counter.get() + 1));

        scope.dispose();
        scope.dispose();
        assert_eq!(count.get(), 1);
    }
}
