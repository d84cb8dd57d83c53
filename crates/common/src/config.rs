use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Target row count per batch produced by scans.
    pub batch_size_rows: usize,
    /// Soft memory budget carried into task contexts.
    pub mem_budget_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size_rows: 8192,
            mem_budget_bytes: 512 * 1024 * 1024,
        }
    }
}
