//! Flush statistics

use std::time::Duration;

/// Counters accumulated over every flush of one simulator
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FlushStatistics {
    /// Flushes that had at least one queued gate
    pub flushes: usize,
    /// Queued gates drained
    pub gates_applied: usize,
    /// Fused operations handed to the kernel
    pub clusters: usize,
    /// Sum of target counts over all fused operations
    pub total_width: usize,
    /// Sum of control counts over all fused operations
    pub total_controls: usize,
    /// Widest fused operation seen, targets plus controls
    pub max_width: usize,
    /// Flushes forced by the pending-gate limit
    pub forced_flushes: usize,
    pub composition_time: Duration,
    pub kernel_time: Duration,
}

impl FlushStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_cluster(&mut self, targets: usize, controls: usize) {
        self.clusters += 1;
        self.total_width += targets;
        self.total_controls += controls;
        self.max_width = self.max_width.max(targets + controls);
    }

    /// Mean number of gates per fused operation
    pub fn gates_per_cluster(&self) -> f64 {
        if self.clusters == 0 {
            0.0
        } else {
            self.gates_applied as f64 / self.clusters as f64
        }
    }

    /// Mean fused matrix width in qubits
    pub fn average_width(&self) -> f64 {
        if self.clusters == 0 {
            0.0
        } else {
            self.total_width as f64 / self.clusters as f64
        }
    }
}
