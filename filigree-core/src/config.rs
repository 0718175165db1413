//! Runtime and renderer configuration.
//!
//! Both structs deserialize from JSON with every field optional; missing
//! fields take their defaults.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::reactive::Runtime;

/// Settings for the per-thread reactive runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Effect runs allowed in one flush before the rest of the queue is
    /// dropped. Guards against effects that re-trigger themselves forever.
    pub max_flush_iterations: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_iterations: 100_000,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Install `config` for the reactive runtime of the current thread.
pub fn configure_runtime(config: RuntimeConfig) {
    tracing::debug!(?config, "configuring reactive runtime");
    Runtime::configure(config);
}

/// Settings for a [`Renderer`](crate::render::Renderer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Reconcile keyed regions by key. When false every region takes the
    /// full-replacement path, which is the baseline keyed updates are
    /// measured against.
    pub keyed_reconciliation: bool,

    /// Text of the comment node that stands in for a component whose
    /// render failed.
    pub placeholder_label: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            keyed_reconciliation: true,
            placeholder_label: "render failed".to_string(),
        }
    }
}

impl RendererConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
