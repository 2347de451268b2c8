//! Engine runtime configuration.

/// Default capacity of the instance summary broadcast channel.
pub const DEFAULT_SUMMARY_CAPACITY: usize = 256;

/// Tuning knobs for [`Engine`](crate::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of eviction summaries buffered per subscriber before the
    /// slowest one starts lagging.
    pub summary_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            summary_capacity: DEFAULT_SUMMARY_CAPACITY,
        }
    }
}
