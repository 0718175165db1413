//! Identifiers for nodes of the reactive graph.
//!
//! Signals, effects and scopes are referenced by small copyable ids rather
//! than by pointer. The runtime keeps the edges between them in maps keyed by
//! these ids, so dropping an edge never requires breaking a reference cycle.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Unique identifier for an effect.
///
/// Ids are handed out from a monotonic counter, so ordering effects by id
/// is ordering them by creation. The scheduler relies on this to run
/// pending effects in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Unique identifier for an ownership scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whatever owns newly created effects, scopes and cleanup callbacks.
///
/// An effect owns what it creates while running; a scope owns what is
/// created inside [`Scope::run`](super::Scope::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Effect(EffectId),
    Scope(ScopeId),
}
