//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, effects and
//! scopes. It owns the dependency edges and drives the scheduler when
//! signals change.
//!
//! # How It Works
//!
//! 1. When a signal is created, it registers an empty subscriber set.
//!
//! 2. When an effect finishes a run, the runtime replaces the effect's old
//!    edges with exactly the signals it read during that run.
//!
//! 3. When a signal's value changes, the runtime:
//!    a. Finds all subscribed effects
//!    b. Marks them pending in the scheduler
//!    c. Flushes, unless a batch is open or an effect is already running
//!
//! # Threading
//!
//! All state lives in a thread-local. Handles are `Rc`-based and cannot leave
//! the thread that created them, so no locking is needed anywhere.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::effect::EffectNode;
use super::id::{EffectId, Owner, ScopeId, SignalId};
use super::scheduler::UpdateScheduler;
use super::scope::ScopeNode;
use crate::config::RuntimeConfig;
use crate::error::panic_message;

pub(crate) type Cleanup = Box<dyn FnOnce()>;

thread_local! {
    static STATE: RuntimeState = RuntimeState::default();
}

#[derive(Default)]
struct RuntimeState {
    /// Signal id -> effects that read it during their last successful run.
    subscribers: RefCell<HashMap<SignalId, IndexSet<EffectId>>>,
    effects: RefCell<HashMap<EffectId, Rc<EffectNode>>>,
    scopes: RefCell<HashMap<ScopeId, Rc<ScopeNode>>>,
    scheduler: RefCell<UpdateScheduler>,
    config: Cell<RuntimeConfig>,
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Replace the runtime configuration for the current thread.
    pub fn configure(config: RuntimeConfig) {
        STATE.with(|state| state.config.set(config));
    }

    /// The runtime configuration for the current thread.
    pub fn config() -> RuntimeConfig {
        STATE.with(|state| state.config.get())
    }

    // ------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------

    pub(crate) fn register_signal(id: SignalId) {
        STATE.with(|state| {
            state.subscribers.borrow_mut().insert(id, IndexSet::new());
        });
    }

    pub(crate) fn unregister_signal(id: SignalId) {
        let _ = STATE.try_with(|state| {
            state.subscribers.borrow_mut().remove(&id);
        });
    }

    /// Number of effects currently subscribed to a signal.
    pub fn subscriber_count(id: SignalId) -> usize {
        STATE.with(|state| {
            state
                .subscribers
                .borrow()
                .get(&id)
                .map_or(0, IndexSet::len)
        })
    }

    /// Swap an effect's edges from `previous` to `next`.
    ///
    /// Edges to signals no longer read are removed, so a branch that stops
    /// reading a signal stops being notified by it.
    pub(crate) fn replace_dependencies(
        effect: EffectId,
        previous: &IndexSet<SignalId>,
        next: &IndexSet<SignalId>,
    ) {
        STATE.with(|state| {
            let mut subscribers = state.subscribers.borrow_mut();
            for stale in previous.difference(next) {
                if let Some(set) = subscribers.get_mut(stale) {
                    set.shift_remove(&effect);
                }
            }
            for signal in next {
                if let Some(set) = subscribers.get_mut(signal) {
                    set.insert(effect);
                }
            }
        });
    }

    /// Remove an effect from the subscriber sets of `dependencies`.
    pub(crate) fn remove_subscriber(effect: EffectId, dependencies: &IndexSet<SignalId>) {
        let _ = STATE.try_with(|state| {
            let mut subscribers = state.subscribers.borrow_mut();
            for signal in dependencies {
                if let Some(set) = subscribers.get_mut(signal) {
                    set.shift_remove(&effect);
                }
            }
        });
    }

    /// Mark every subscriber of a signal pending and flush if possible.
    pub(crate) fn notify_signal_change(id: SignalId) {
        let subscribers: SmallVec<[EffectId; 8]> = STATE.with(|state| {
            state
                .subscribers
                .borrow()
                .get(&id)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        });

        if subscribers.is_empty() {
            return;
        }

        tracing::trace!(signal = id.raw(), subscribers = subscribers.len(), "signal changed");

        Self::with_scheduler(|scheduler| {
            for effect in subscribers {
                scheduler.enqueue(effect);
            }
        });

        Self::flush();
    }

    // ------------------------------------------------------------------
    // Effects and scopes
    // ------------------------------------------------------------------

    pub(crate) fn register_effect(node: Rc<EffectNode>) {
        STATE.with(|state| {
            state.effects.borrow_mut().insert(node.id(), node);
        });
    }

    pub(crate) fn unregister_effect(id: EffectId) {
        let _ = STATE.try_with(|state| {
            state.effects.borrow_mut().remove(&id);
        });
    }

    pub(crate) fn effect(id: EffectId) -> Option<Rc<EffectNode>> {
        STATE
            .try_with(|state| state.effects.borrow().get(&id).cloned())
            .ok()
            .flatten()
    }

    /// Number of effects that are alive (created and not yet disposed).
    pub fn live_effect_count() -> usize {
        STATE.with(|state| state.effects.borrow().len())
    }

    pub(crate) fn register_scope(node: Rc<ScopeNode>) {
        STATE.with(|state| {
            state.scopes.borrow_mut().insert(node.id(), node);
        });
    }

    pub(crate) fn unregister_scope(id: ScopeId) {
        let _ = STATE.try_with(|state| {
            state.scopes.borrow_mut().remove(&id);
        });
    }

    pub(crate) fn scope(id: ScopeId) -> Option<Rc<ScopeNode>> {
        STATE
            .try_with(|state| state.scopes.borrow().get(&id).cloned())
            .ok()
            .flatten()
    }

    /// Make `owner` responsible for disposing `effect`.
    pub(crate) fn adopt_effect(owner: Owner, effect: EffectId) {
        match owner {
            Owner::Effect(parent) => {
                if let Some(node) = Self::effect(parent) {
                    node.adopt_effect(effect);
                }
            }
            Owner::Scope(scope) => {
                if let Some(node) = Self::scope(scope) {
                    node.adopt_effect(effect);
                }
            }
        }
    }

    /// Make `owner` responsible for disposing `scope`.
    pub(crate) fn adopt_scope(owner: Owner, scope: ScopeId) {
        match owner {
            Owner::Effect(parent) => {
                if let Some(node) = Self::effect(parent) {
                    node.adopt_scope(scope);
                }
            }
            Owner::Scope(parent) => {
                if let Some(node) = Self::scope(parent) {
                    node.adopt_scope(scope);
                }
            }
        }
    }

    pub(crate) fn adopt_cleanup(owner: Owner, cleanup: Cleanup) {
        let adopted = match owner {
            Owner::Effect(id) => Self::effect(id).map(|node| node.adopt_cleanup(cleanup)),
            Owner::Scope(id) => Self::scope(id).map(|node| node.adopt_cleanup(cleanup)),
        };
        if adopted.is_none() {
            tracing::warn!(?owner, "cleanup registered on a disposed owner; it will never run");
        }
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    pub(crate) fn with_scheduler<R>(f: impl FnOnce(&mut UpdateScheduler) -> R) -> R {
        STATE.with(|state| f(&mut state.scheduler.borrow_mut()))
    }

    /// Whether an effect computation is currently on the stack.
    pub fn is_running() -> bool {
        Self::with_scheduler(|scheduler| scheduler.running() > 0)
    }

    /// Run every pending effect, in creation order, until none are left.
    ///
    /// Does nothing while a batch is open, while an effect runs, or when
    /// called from inside a flush that is already draining the queue.
    pub fn flush() {
        if !Self::with_scheduler(UpdateScheduler::begin_flush) {
            return;
        }
        let _flushing = FlushGuard;

        let limit = Self::config().max_flush_iterations;
        let mut runs = 0usize;

        while let Some(id) = Self::with_scheduler(UpdateScheduler::pop_pending) {
            if runs >= limit {
                let dropped = 1 + Self::with_scheduler(UpdateScheduler::clear_pending);
                tracing::warn!(
                    limit,
                    dropped,
                    "flush exceeded its iteration limit; dropping pending effects"
                );
                break;
            }
            runs += 1;

            if let Some(node) = Self::effect(id) {
                Self::execute(&node);
            }
        }
    }

    /// Run an effect, then the first runs it deferred if the stack is empty.
    pub(crate) fn execute(node: &Rc<EffectNode>) {
        node.run();
        if !Self::is_running() {
            Self::drain_deferred();
        }
    }

    fn drain_deferred() {
        while let Some(id) = Self::with_scheduler(UpdateScheduler::pop_deferred) {
            if let Some(node) = Self::effect(id) {
                node.run();
            }
        }
    }
}

struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = STATE.try_with(|state| state.scheduler.borrow_mut().end_flush());
    }
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let _ = STATE.try_with(|state| state.scheduler.borrow_mut().end_batch());
    }
}

/// Run `f` with signal propagation held back until it returns.
///
/// Every write made inside the batch marks its subscribers pending; each
/// pending effect then runs exactly once, seeing the final values. Batches
/// nest; only the outermost one flushes.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::with_scheduler(UpdateScheduler::begin_batch);
    let result = {
        let _batch = BatchGuard;
        f()
    };
    Runtime::flush();
    result
}

/// Run `f` without recording signal reads as dependencies.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}

/// Register a callback with the current owner.
///
/// Inside an effect the callback runs before the effect's next run and when
/// it is disposed; inside a scope it runs when the scope is disposed.
pub fn on_cleanup(cleanup: impl FnOnce() + 'static) {
    match ReactiveContext::current_owner() {
        Some(owner) => Runtime::adopt_cleanup(owner, Box::new(cleanup)),
        None => tracing::warn!("on_cleanup called outside any effect or scope; it will never run"),
    }
}

/// Run every cleanup to completion, logging the ones that panic.
pub(crate) fn run_cleanups(cleanups: Vec<Cleanup>) {
    for cleanup in cleanups {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(cleanup)) {
            tracing::error!(error = %panic_message(payload.as_ref()), "cleanup callback panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Signal};

    #[test]
    fn runtime_registers_and_unregisters_signals() {
        let id = SignalId::next();
        Runtime::register_signal(id);
        assert_eq!(Runtime::subscriber_count(id), 0);
        assert!(STATE.with(|s| s.subscribers.borrow().contains_key(&id)));

        Runtime::unregister_signal(id);
        assert!(!STATE.with(|s| s.subscribers.borrow().contains_key(&id)));
    }

    #[test]
    fn runtime_replaces_dependencies() {
        let (a, b, c) = (SignalId::next(), SignalId::next(), SignalId::next());
        for id in [a, b, c] {
            Runtime::register_signal(id);
        }
        let effect = EffectId::next();

        let first: IndexSet<_> = [a, b].into_iter().collect();
        Runtime::replace_dependencies(effect, &IndexSet::new(), &first);
        assert_eq!(Runtime::subscriber_count(a), 1);
        assert_eq!(Runtime::subscriber_count(b), 1);

        let second: IndexSet<_> = [b, c].into_iter().collect();
        Runtime::replace_dependencies(effect, &first, &second);
        assert_eq!(Runtime::subscriber_count(a), 0);
        assert_eq!(Runtime::subscriber_count(b), 1);
        assert_eq!(Runtime::subscriber_count(c), 1);

        Runtime::remove_subscriber(effect, &second);
        assert_eq!(Runtime::subscriber_count(b), 0);
        assert_eq!(Runtime::subscriber_count(c), 0);
    }

    #[test]
    fn runtime_flush_cuts_off_runaway_effects() {
        Runtime::configure(RuntimeConfig {
            max_flush_iterations: 50,
        });

        let counter = Signal::new(0u64);
        let writer = counter.clone();
        let effect = Effect::new(move || {
            let value = writer.get();
            writer.set(value + 1);
        });

        // The effect re-triggers itself; the flush stops at the limit.
        counter.set(1000);
        assert!(effect.run_count() <= 52);
        assert!(!effect.is_disposed());

        effect.dispose();
        Runtime::configure(RuntimeConfig::default());
    }

    #[test]
    fn panicking_cleanups_do_not_stop_the_rest() {
        let ran = Rc::new(Cell::new(0));
        let (a, b) = (ran.clone(), ran.clone());

        run_cleanups(vec![
            Box::new(move || a.set(a.get() + 1)),
            Box::new(|| panic!("cleanup failure")),
            Box::new(move || b.set(b.get() + 1)),
        ]);

        assert_eq!(ran.get(), 2);
    }
}
