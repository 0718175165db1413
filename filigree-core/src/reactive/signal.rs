//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracking context (an effect or a
//!    computed), the read is recorded as a dependency of that computation.
//!
//! 2. When a signal's value changes, all subscribers are marked pending.
//!
//! 3. Writes that leave the value unchanged (`==`) propagate nothing.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value, behind an `Rc<RefCell<_>>` shared by every clone
//!
//! The subscriber set is held by the runtime, keyed by the ID, and removed
//! when the last clone of the signal is dropped.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::id::SignalId;
use super::runtime::Runtime;

struct SignalInner<T> {
    id: SignalId,
    value: RefCell<T>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        Runtime::unregister_signal(self.id);
    }
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use filigree_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(value + 5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        let id = SignalId::next();
        Runtime::register_signal(id);
        Self {
            inner: Rc::new(SignalInner {
                id,
                value: RefCell::new(value),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track_dependency(self.inner.id);
        f(&self.inner.value.borrow())
    }

    /// Borrow the current value without establishing a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Mutate the value in place and notify subscribers unconditionally.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        Runtime::notify_signal_change(self.inner.id);
    }

    /// Get the number of effects subscribed to this signal.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.id)
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called within a tracking context, this also registers the current
    /// computation as a dependent.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Set a new value and notify subscribers.
    ///
    /// Returns whether the value changed. An equal value is dropped without
    /// notifying anyone.
    pub fn set(&self, value: T) -> bool {
        {
            let mut slot = self.inner.value.borrow_mut();
            if *slot == value {
                return false;
            }
            *slot = value;
        }
        Runtime::notify_signal_change(self.inner.id);
        true
    }

    /// Update the value using a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.inner.value.borrow());
        self.set(next)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// The read half of a signal created by [`create_signal`].
pub struct ReadSignal<T>(Signal<T>);

/// The write half of a signal created by [`create_signal`].
pub struct WriteSignal<T>(Signal<T>);

impl<T: 'static> ReadSignal<T> {
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.0.with(f)
    }

    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.0.with_untracked(f)
    }

    pub fn id(&self) -> SignalId {
        self.0.id()
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.subscriber_count()
    }
}

impl<T: Clone + 'static> ReadSignal<T> {
    pub fn get(&self) -> T {
        self.0.get()
    }

    pub fn get_untracked(&self) -> T {
        self.0.get_untracked()
    }
}

impl<T: PartialEq + 'static> WriteSignal<T> {
    pub fn set(&self, value: T) -> bool {
        self.0.set(value)
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        self.0.update(f)
    }
}

impl<T: 'static> WriteSignal<T> {
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        self.0.modify(f);
    }
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: 'static> From<Signal<T>> for ReadSignal<T> {
    fn from(signal: Signal<T>) -> Self {
        Self(signal)
    }
}

impl<T: Debug + 'static> Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.0).finish()
    }
}

/// Create a signal and split it into its read and write halves.
pub fn create_signal<T: 'static>(value: T) -> (ReadSignal<T>, WriteSignal<T>) {
    let signal = Signal::new(value);
    (ReadSignal(signal.clone()), WriteSignal(signal))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
