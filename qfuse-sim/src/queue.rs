//! Pending gate queue

use qfuse_core::QueuedGate;

/// Gates accepted but not yet applied, in arrival order
#[derive(Debug, Clone)]
pub struct GateQueue {
    gates: Vec<QueuedGate>,
    max_pending: usize,
}

impl GateQueue {
    pub fn new(max_pending: usize) -> Self {
        Self {
            gates: Vec::new(),
            max_pending,
        }
    }

    /// Append a gate
    ///
    /// # Returns
    /// `true` once the queue holds more than the pending limit.
    pub fn push(&mut self, gate: QueuedGate) -> bool {
        self.gates.push(gate);
        self.gates.len() > self.max_pending
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    #[inline]
    pub fn gates(&self) -> &[QueuedGate] {
        &self.gates
    }

    /// Remove and return every queued gate
    pub fn take(&mut self) -> Vec<QueuedGate> {
        std::mem::take(&mut self.gates)
    }

    /// Put `gates` back in front of anything queued since they were taken
    pub fn requeue(&mut self, gates: Vec<QueuedGate>) {
        let newer = std::mem::replace(&mut self.gates, gates);
        self.gates.extend(newer);
    }

    pub fn clear(&mut self) {
        self.gates.clear();
    }
}
