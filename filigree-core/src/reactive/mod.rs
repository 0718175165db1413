//! Reactive Primitives
//!
//! This module implements the fine-grained reactive system: signals,
//! effects, computeds and ownership scopes.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (an effect or a computed), the signal registers
//! that context as a dependent. When the value changes, every dependent is
//! scheduled to re-run.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read during its last run changes. The renderer turns every reactive
//! prop, text and region into one effect.
//!
//! ## Computeds
//!
//! A Computed is a derived value backed by its own signal, so reading it is
//! tracked like any other signal read and unchanged results stop
//! propagation.
//!
//! ## Scopes
//!
//! A Scope owns the effects, child scopes and cleanups created while it is
//! active. Disposing it tears all of them down; a component's scope is how a
//! component is unmounted.
//!
//! # Implementation Notes
//!
//! State lives in a thread-local runtime. Writes outside a [`batch`] flush
//! synchronously, in effect creation order, before the writing call
//! returns.

mod computed;
mod context;
mod effect;
mod id;
mod list;
mod runtime;
mod scheduler;
mod scope;
mod signal;

pub use computed::{create_computed, try_create_computed, Computed};
pub use context::ReactiveContext;
pub use effect::{create_effect, Effect};
pub use id::{EffectId, Owner, ScopeId, SignalId};
pub use list::{create_signal_list, SignalList};
pub use runtime::{batch, on_cleanup, untrack, Runtime};
pub use scope::Scope;
pub use signal::{create_signal, ReadSignal, Signal, WriteSignal};
