//! Computed Implementation
//!
//! A Computed is a cached derived value. It is a signal whose value is
//! written by an internal effect, so readers of a computed subscribe to it
//! exactly as they would to a signal and reactivity is transitive.
//!
//! # How Computeds Work
//!
//! 1. On creation, the internal effect runs the computation and stores the
//!    result. This first run happens immediately, even inside another
//!    effect, so the value exists as soon as `new` returns.
//!
//! 2. Reads return the cached value; they never recompute.
//!
//! 3. When a dependency changes, the internal effect recomputes. Because the
//!    result is written with `Signal::set`, an unchanged result stops the
//!    propagation there: downstream effects do not run.
//!
//! Computeds are eager rather than lazy. Effects run in creation order, and a
//! computed is created before anything that reads it, so within one flush
//! the computed settles before its readers run.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::effect::Effect;
use super::id::SignalId;
use super::signal::Signal;
use crate::error::ReactiveError;

/// A cached derived value that recomputes when its dependencies change.
///
/// # Example
///
/// ```rust
/// use filigree_core::reactive::{Computed, Signal};
///
/// let count = Signal::new(2);
/// let reader = count.clone();
/// let doubled = Computed::new(move || reader.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T> {
    signal: Signal<T>,
    effect: Effect,
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Create a new computed value.
    ///
    /// # Panics
    ///
    /// Panics if the computation panics on its first run, since there is no
    /// value to hold. Use [`Computed::try_new`] to handle that case.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        match Self::try_new(compute) {
            Ok(computed) => computed,
            Err(error) => panic!("{error}"),
        }
    }

    /// Create a new computed value, failing if the first run panics.
    pub fn try_new<F>(compute: F) -> Result<Self, ReactiveError>
    where
        F: Fn() -> T + 'static,
    {
        let slot: Rc<RefCell<Option<Signal<T>>>> = Rc::new(RefCell::new(None));
        let writer = Rc::clone(&slot);

        let effect = Effect::eager(move || {
            let value = compute();
            let existing = writer.borrow().clone();
            match existing {
                Some(signal) => {
                    signal.set(value);
                }
                None => *writer.borrow_mut() = Some(Signal::new(value)),
            }
        });

        let signal = slot.borrow().clone();
        match signal {
            Some(signal) => Ok(Self { signal, effect }),
            None => {
                effect.dispose();
                Err(ReactiveError::InitialEvaluation)
            }
        }
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }
}

impl<T: 'static> Computed<T> {
    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    /// The id of the signal holding the computed value.
    pub fn id(&self) -> SignalId {
        self.signal.id()
    }

    /// Number of effects reading this computed.
    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }

    /// Number of times the value has been computed.
    pub fn compute_count(&self) -> usize {
        self.effect.run_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.effect.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.effect.is_disposed()
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("signal", &self.signal)
            .field("compute_count", &self.compute_count())
            .finish()
    }
}

/// Create a computed value. See [`Computed::new`].
///
/// Panics if `compute` panics on its first run. Inside a component's render,
/// prefer [`try_create_computed`] and return the error, so the failure mounts
/// a placeholder instead of unwinding through the renderer.
pub fn create_computed<T, F>(compute: F) -> Computed<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    Computed::new(compute)
}

/// Create a computed value, failing if its first run panics. See
/// [`Computed::try_new`].
pub fn try_create_computed<T, F>(compute: F) -> Result<Computed<T>, ReactiveError>
where
    T: Clone + PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    Computed::try_new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
