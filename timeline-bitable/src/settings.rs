use std::time::Duration;

use serde::{Deserialize, Serialize};
use timeline_core::PAGE_SIZE;

/// What to keep when a fetch cycle fails part-way through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PartialResults {
    /// Show nothing from the failed cycle.
    #[default]
    Discard,
    /// Commit whatever was gathered before the error.
    Keep,
}

/// Tuning for the fetch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Record ids requested per page.
    pub page_size: usize,
    /// Most entries one cycle may accumulate.
    pub record_cap: usize,
    /// Quiet period before a reconfiguration starts fetching.
    pub debounce_ms: u64,
    pub partial_results: PartialResults,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            record_cap: PAGE_SIZE,
            debounce_ms: 300,
            partial_results: PartialResults::Discard,
        }
    }
}

impl PipelineSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
