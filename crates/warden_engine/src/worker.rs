//! Per-worker scratch state.

use warden_core::ObjectPool;

use crate::config::PerformanceConfig;
use crate::escalation::ViolationReport;

/// Pools owned by exactly one worker thread (or by the caller-runs path).
pub struct WorkerContext {
    /// Scratch float vectors for check evidence.
    pub vectors: ObjectPool<Vec<f32>>,
    /// Escalation reports.
    pub reports: ObjectPool<ViolationReport>,
}

impl WorkerContext {
    /// Creates empty pools sized from the performance section.
    #[must_use]
    pub fn from_config(performance: &PerformanceConfig) -> Self {
        Self {
            vectors: ObjectPool::new(performance.vector_pool_capacity(), Vec::new),
            reports: ObjectPool::new(performance.report_pool_capacity(), ViolationReport::default),
        }
    }
}

impl Default for WorkerContext {
    fn default() -> Self {
        Self::from_config(&PerformanceConfig::default())
    }
}
