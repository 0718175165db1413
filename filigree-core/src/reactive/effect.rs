//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies. An effect created while another effect is
//!    running has its first run deferred until that effect completes.
//!
//! 2. When any dependency changes, the effect is marked pending and runs on
//!    the next flush, at most once per flush pass.
//!
//! 3. Before re-running, the effect disposes the effects and scopes it
//!    created during its previous run and runs its cleanup callbacks.
//!
//! 4. After a successful run its dependency edges are replaced by the
//!    signals read during that run. A run that panics is logged; the effect
//!    keeps its previous edges and also subscribes to whatever it read before
//!    panicking, so a later write can bring it back.
//!
//! # Ownership
//!
//! An effect is owned by whatever was the current owner when it was created
//! (a parent effect or a [`Scope`](super::Scope)). Effects created with no
//! owner live until [`Effect::dispose`] is called.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::id::{EffectId, ScopeId, SignalId};
use super::runtime::{run_cleanups, Cleanup, Runtime};
use super::scheduler::UpdateScheduler;
use crate::error::panic_message;

/// Runtime-side state of an effect.
pub(crate) struct EffectNode {
    id: EffectId,

    /// The effect function.
    computation: RefCell<Box<dyn FnMut()>>,

    /// Signals read during the last successful run, plus any read by later
    /// runs that panicked.
    dependencies: RefCell<IndexSet<SignalId>>,

    /// Effects created during the last run.
    children: RefCell<SmallVec<[EffectId; 4]>>,

    /// Scopes created during the last run.
    scopes: RefCell<SmallVec<[ScopeId; 2]>>,

    /// Callbacks registered with `on_cleanup` during the last run.
    cleanups: RefCell<Vec<Cleanup>>,

    disposed: Cell<bool>,
    running: Cell<bool>,
    run_count: Cell<usize>,
}

impl EffectNode {
    fn new(computation: Box<dyn FnMut()>) -> Self {
        Self {
            id: EffectId::next(),
            computation: RefCell::new(computation),
            dependencies: RefCell::new(IndexSet::new()),
            children: RefCell::new(SmallVec::new()),
            scopes: RefCell::new(SmallVec::new()),
            cleanups: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
            running: Cell::new(false),
            run_count: Cell::new(0),
        }
    }

    pub(crate) fn id(&self) -> EffectId {
        self.id
    }

    pub(crate) fn adopt_effect(&self, effect: EffectId) {
        self.children.borrow_mut().push(effect);
    }

    pub(crate) fn adopt_scope(&self, scope: ScopeId) {
        self.scopes.borrow_mut().push(scope);
    }

    pub(crate) fn adopt_cleanup(&self, cleanup: Cleanup) {
        self.cleanups.borrow_mut().push(cleanup);
    }

    /// Execute the effect function within a tracking context.
    ///
    /// A disposed effect, or one that is already on the stack, does not run.
    pub(crate) fn run(self: &Rc<Self>) {
        if self.disposed.get() || self.running.get() {
            return;
        }
        self.running.set(true);
        self.release_owned();

        let (outcome, next) = {
            let _run = RunGuard::enter();
            let ctx = ReactiveContext::enter(self.id);
            let outcome = {
                let mut computation = self.computation.borrow_mut();
                let computation: &mut dyn FnMut() = &mut **computation;
                panic::catch_unwind(AssertUnwindSafe(computation))
            };
            (outcome, ctx.take_dependencies())
        };

        self.running.set(false);
        self.run_count.set(self.run_count.get() + 1);

        if self.disposed.get() {
            return;
        }

        match outcome {
            Ok(()) => {
                let previous = std::mem::replace(&mut *self.dependencies.borrow_mut(), next);
                Runtime::replace_dependencies(self.id, &previous, &self.dependencies.borrow());
            }
            Err(payload) => {
                // Stay subscribed to what the last good run read, plus what this
                // run read before it panicked. A first run that panics still
                // hears about the signals it got to.
                let previous = self.dependencies.borrow().clone();
                let added = next.difference(&previous).count();
                if added > 0 {
                    self.dependencies.borrow_mut().extend(next);
                    Runtime::replace_dependencies(self.id, &previous, &self.dependencies.borrow());
                }
                tracing::error!(
                    effect = self.id.raw(),
                    error = %panic_message(payload.as_ref()),
                    dependencies = self.dependencies.borrow().len(),
                    "effect computation panicked; keeping its dependencies"
                );
            }
        }
    }

    /// Dispose what the previous run created and run its cleanups.
    fn release_owned(&self) {
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            if let Some(node) = Runtime::effect(child) {
                node.dispose();
            }
        }

        let scopes = std::mem::take(&mut *self.scopes.borrow_mut());
        for scope in scopes {
            if let Some(node) = Runtime::scope(scope) {
                node.dispose();
            }
        }

        let cleanups = std::mem::take(&mut *self.cleanups.borrow_mut());
        run_cleanups(cleanups);
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        let dependencies = std::mem::take(&mut *self.dependencies.borrow_mut());
        Runtime::remove_subscriber(self.id, &dependencies);
        self.release_owned();
        Runtime::unregister_effect(self.id);
    }
}

/// Keeps the scheduler's running count accurate, even if a run unwinds.
struct RunGuard;

impl RunGuard {
    fn enter() -> Self {
        Runtime::with_scheduler(UpdateScheduler::enter_run);
        Self
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        Runtime::with_scheduler(UpdateScheduler::exit_run);
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use filigree_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let reader = count.clone();
///
/// let effect = Effect::new(move || {
///     println!("Count is: {}", reader.get());
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    node: Rc<EffectNode>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies,
    /// unless another effect is running, in which case it runs right after
    /// that effect completes.
    pub fn new<F>(run: F) -> Self
    where
        F: FnMut() + 'static,
    {
        Self::create(Box::new(run), true)
    }

    /// Create an effect whose first run happens now, even when nested.
    ///
    /// Used by computeds, whose value must exist as soon as they are
    /// constructed.
    pub(crate) fn eager<F>(run: F) -> Self
    where
        F: FnMut() + 'static,
    {
        Self::create(Box::new(run), false)
    }

    fn create(computation: Box<dyn FnMut()>, defer_when_nested: bool) -> Self {
        let node = Rc::new(EffectNode::new(computation));
        Runtime::register_effect(Rc::clone(&node));

        if let Some(owner) = ReactiveContext::current_owner() {
            Runtime::adopt_effect(owner, node.id);
        }

        if Runtime::is_running() {
            if defer_when_nested {
                Runtime::with_scheduler(|scheduler| scheduler.defer(node.id));
            } else {
                node.run();
            }
        } else {
            Runtime::execute(&node);
            Runtime::flush();
        }

        Self { node }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.node.id
    }

    /// Dispose of the effect.
    ///
    /// Removes it from every subscriber set, disposes the effects and scopes
    /// it owns and runs its cleanup callbacks. After disposal, the effect
    /// will not run again.
    pub fn dispose(&self) {
        self.node.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.node.disposed.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.node.run_count.get()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.node.dependencies.borrow().len()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.node.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect. See [`Effect::new`].
pub fn create_effect<F>(run: F) -> Effect
where
    F: FnMut() + 'static,
{
    Effect::new(run)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{batch, on_cleanup, Signal};
    use std::cell::Cell;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let signal = Signal::new(0);
        let seen = Rc::new(Cell::new(-1));

        let (reader, sink) = (signal.clone(), seen.clone());
        let effect = Effect::new(move || sink.set(reader.get()));

        assert_eq!(seen.get(), 0);
        assert_eq!(effect.dependency_count(), 1);

        signal.set(42);
        assert_eq!(seen.get(), 42);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn unchanged_write_does_not_rerun() {
        let signal = Signal::new(7);
        let reader = signal.clone();
        let effect = Effect::new(move || {
            reader.get();
        });

        signal.set(7);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn batched_writes_run_each_effect_once_with_final_value() {
        let signal = Signal::new(0);
        let seen = Rc::new(Cell::new(0));

        let (reader, sink) = (signal.clone(), seen.clone());
        let effect = Effect::new(move || sink.set(reader.get()));

        batch(|| {
            for value in 1..=10 {
                signal.set(value);
            }
        });

        assert_eq!(effect.run_count(), 2);
        assert_eq!(seen.get(), 10);
    }

    #[test]
    fn stale_dependencies_are_dropped() {
        let use_a = Signal::new(true);
        let a = Signal::new(1);
        let b = Signal::new(2);

        let (flag, ra, rb) = (use_a.clone(), a.clone(), b.clone());
        let effect = Effect::new(move || {
            if flag.get() {
                ra.get();
            } else {
                rb.get();
            }
        });

        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        use_a.set(false);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);

        // Writing the stale signal no longer reaches the effect.
        a.set(10);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let effect = Effect::new(move || {
            reader.get();
        });

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn cleanups_run_before_rerun_and_on_dispose() {
        let signal = Signal::new(0);
        let cleaned = Rc::new(Cell::new(0));

        let (reader, counter) = (signal.clone(), cleaned.clone());
        let effect = Effect::new(move || {
            reader.get();
            let counter = counter.clone();
            on_cleanup(move || counter.set(counter.get() + 1));
        });

        assert_eq!(cleaned.get(), 0);
        signal.set(1);
        assert_eq!(cleaned.get(), 1);
        effect.dispose();
        assert_eq!(cleaned.get(), 2);
    }

    #[test]
    fn nested_effects_run_after_parent_and_are_disposed_on_rerun() {
        let signal = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let (reader, outer_log) = (signal.clone(), log.clone());
        let parent = Effect::new(move || {
            let value = reader.get();
            outer_log.borrow_mut().push(format!("parent start {value}"));
            let inner_log = outer_log.clone();
            Effect::new(move || inner_log.borrow_mut().push(format!("child {value}")));
            outer_log.borrow_mut().push(format!("parent end {value}"));
        });

        assert_eq!(
            *log.borrow(),
            vec!["parent start 0", "parent end 0", "child 0"]
        );

        let live_before = Runtime::live_effect_count();
        signal.set(1);
        // The old child was disposed and replaced by a new one.
        assert_eq!(Runtime::live_effect_count(), live_before);
        assert_eq!(log.borrow().last().map(String::as_str), Some("child 1"));

        parent.dispose();
        assert_eq!(Runtime::live_effect_count(), live_before - 2);
    }

    #[test]
    fn panicking_effect_keeps_last_good_dependencies() {
        let source = Signal::new(1);
        let seen = Rc::new(Cell::new(0));

        let (reader, sink) = (source.clone(), seen.clone());
        let effect = Effect::new(move || {
            let value = reader.get();
            if value < 0 {
                panic!("negative value");
            }
            sink.set(value);
        });

        source.set(-1);
        assert!(!effect.is_disposed());
        assert_eq!(effect.dependency_count(), 1);
        assert_eq!(source.subscriber_count(), 1);
        assert_eq!(seen.get(), 1);

        source.set(5);
        assert_eq!(seen.get(), 5);
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn panicking_first_run_still_subscribes() {
        let source = Signal::new(-1);
        let seen = Rc::new(Cell::new(0));

        let (reader, sink) = (source.clone(), seen.clone());
        let effect = Effect::new(move || {
            let value = reader.get();
            if value < 0 {
                panic!("negative value");
            }
            sink.set(value);
        });

        assert!(!effect.is_disposed());
        assert_eq!(effect.dependency_count(), 1);
        assert_eq!(source.subscriber_count(), 1);
        assert_eq!(seen.get(), 0);

        source.set(5);
        assert_eq!(seen.get(), 5);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn panicking_run_adds_signals_read_before_the_panic() {
        let mode = Signal::new(0);
        let extra = Signal::new(0);
        let seen = Rc::new(Cell::new(0));

        let (m, e, sink) = (mode.clone(), extra.clone(), seen.clone());
        let effect = Effect::new(move || {
            if m.get() == 0 {
                return;
            }
            let value = e.get();
            if value == 0 {
                panic!("extra not ready");
            }
            sink.set(value);
        });
        assert_eq!(effect.dependency_count(), 1);

        mode.set(1);
        assert_eq!(effect.dependency_count(), 2);
        assert_eq!(extra.subscriber_count(), 1);

        extra.set(9);
        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}
