//! Renderer metrics.
//!
//! Counters are per renderer. Each one is bumped at the point where the
//! corresponding host operation succeeded, so a snapshot is a ledger of what
//! actually happened to the document.

use std::cell::Cell;

use serde::Serialize;

/// A copy of a renderer's counters.
///
/// Row counters (`created`, `adopted`, `removed`, `inserted`, `moved`,
/// `cache_hits`, `cache_misses`) count list rows. The remaining counters
/// count individual host writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererMetricsSnapshot {
    /// Rows built and mounted.
    pub created: u64,
    /// Rows reused from the row cache.
    pub adopted: u64,
    /// Rows detached by reconciliation.
    pub removed: u64,
    /// New rows inserted into the document.
    pub inserted: u64,
    /// Existing rows moved to a new position.
    pub moved: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// `set_attribute` calls and class toggles.
    pub attribute_writes: u64,
    pub attribute_removals: u64,
    /// Writes to existing text nodes.
    pub text_updates: u64,
    /// Modifiers applied to elements, one per modifier.
    pub modifier_applications: u64,
}

impl RendererMetricsSnapshot {
    /// Operations that changed an already created host node or its
    /// position.
    pub fn dom_mutations(&self) -> u64 {
        self.removed
            + self.inserted
            + self.moved
            + self.attribute_writes
            + self.attribute_removals
            + self.text_updates
    }
}

#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    counters: Cell<RendererMetricsSnapshot>,
}

impl MetricsRecorder {
    pub(crate) fn record(&self, update: impl FnOnce(&mut RendererMetricsSnapshot)) {
        let mut counters = self.counters.get();
        update(&mut counters);
        self.counters.set(counters);
    }

    pub(crate) fn snapshot(&self) -> RendererMetricsSnapshot {
        self.counters.get()
    }

    pub(crate) fn reset(&self) {
        self.counters.set(RendererMetricsSnapshot::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_accumulates_and_resets() {
        let recorder = MetricsRecorder::default();
        recorder.record(|m| m.created += 2);
        recorder.record(|m| {
            m.text_updates += 1;
            m.moved += 1;
        });

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.created, 2);
        assert_eq!(snapshot.dom_mutations(), 2);

        recorder.reset();
        assert_eq!(recorder.snapshot(), RendererMetricsSnapshot::default());
    }

    #[test]
    fn snapshot_serializes_with_camel_case_names() {
        let snapshot = RendererMetricsSnapshot {
            cache_hits: 3,
            ..RendererMetricsSnapshot::default()
        };
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["cacheHits"], 3);
        assert_eq!(json["modifierApplications"], 0);
    }
}
