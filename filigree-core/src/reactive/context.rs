//! Reactive Context
//!
//! The reactive context tracks which computation is currently running and
//! which owner receives newly created effects, scopes and cleanups. This
//! enables automatic dependency tracking: when a signal is read, the
//! current observer records it as a dependency.
//!
//! # Implementation
//!
//! We use a thread-local stack. Running an effect pushes an entry with that
//! effect as observer and owner; running a scope pushes an entry with no
//! observer and the scope as owner; `untrack` pushes an entry with no
//! observer that inherits the current owner. The guard returned by each
//! `enter_*` call pops its entry when dropped, including during unwinding.

use std::cell::RefCell;

use indexmap::IndexSet;

use super::id::{EffectId, Owner, ScopeId, SignalId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug)]
struct ContextEntry {
    /// The effect collecting dependencies, if reads are tracked.
    observer: Option<EffectId>,
    /// Receives effects, scopes and cleanups created under this entry.
    owner: Option<Owner>,
    /// Signals read during this computation, in first-read order.
    dependencies: IndexSet<SignalId>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    depth: usize,
}

impl ReactiveContext {
    /// Enter a tracking context for the given effect.
    ///
    /// While this context is active, any signals that are read are recorded
    /// as dependencies of `effect`, and anything created is owned by it.
    pub fn enter(effect: EffectId) -> Self {
        Self::push(Some(effect), Some(Owner::Effect(effect)))
    }

    /// Enter an untracked context owned by the given scope.
    pub fn enter_scope(scope: ScopeId) -> Self {
        Self::push(None, Some(Owner::Scope(scope)))
    }

    /// Enter an untracked context that keeps the current owner.
    pub fn enter_untracked() -> Self {
        let owner = Self::current_owner();
        Self::push(None, owner)
    }

    fn push(observer: Option<EffectId>, owner: Option<Owner>) -> Self {
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(ContextEntry {
                observer,
                owner,
                dependencies: IndexSet::new(),
            });
            stack.len()
        });

        Self { depth }
    }

    /// Check if signal reads are currently being tracked.
    pub fn is_tracking() -> bool {
        Self::current_observer().is_some()
    }

    /// Get the effect currently collecting dependencies, if any.
    pub fn current_observer() -> Option<EffectId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.observer))
    }

    /// Get the owner of anything created right now, if any.
    pub fn current_owner() -> Option<Owner> {
        CONTEXT_STACK
            .try_with(|stack| stack.borrow().last().and_then(|entry| entry.owner))
            .ok()
            .flatten()
    }

    /// Record a dependency on the given signal.
    ///
    /// This is called by signals when they are read. Reads outside a
    /// tracking context are ignored.
    pub fn track_dependency(signal_id: SignalId) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.observer.is_some() {
                    entry.dependencies.insert(signal_id);
                }
            }
        });
    }

    /// Take the dependencies collected in this context so far.
    pub fn take_dependencies(&self) -> IndexSet<SignalId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .get_mut(self.depth - 1)
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let _ = CONTEXT_STACK.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "ReactiveContext popped out of order"
            );
            stack.truncate(self.depth - 1);
        });
    }
}
