//! Greedy gate clustering
//!
//! A cluster is a run of queued gates that can be applied as a single fused
//! matrix. The builder starts from one cluster per gate and, for each width
//! from 1 up to the configured maximum, sweeps the list left to right and
//! pulls later clusters forward into the current one whenever doing so cannot
//! change the result.
//!
//! A later cluster may only jump over clusters it commutes with. The sweep
//! tracks every qubit touched by a skipped cluster; a candidate whose newly
//! introduced qubits hit that set is not taken, and a skipped cluster that
//! shares a qubit with the current one ends the search.
//!
//! The heuristic is greedy and order-sensitive. Only the equivalence of the
//! emitted sequence to the input is guaranteed, not the cluster boundaries.

use ahash::AHashSet;
use qfuse_core::{QubitId, QueuedGate};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, trace};

/// Gates that will be fused into one matrix, in their original order
#[derive(Clone, PartialEq)]
pub struct Cluster {
    qubits: BTreeSet<QubitId>,
    gates: Vec<QueuedGate>,
}

impl Cluster {
    /// Seed cluster holding a single gate
    pub fn from_gate(gate: QueuedGate) -> Self {
        Self {
            qubits: gate.qubits().collect(),
            gates: vec![gate],
        }
    }

    /// Union of every gate's controls and target, ascending
    #[inline]
    pub fn qubits(&self) -> &BTreeSet<QubitId> {
        &self.qubits
    }

    #[inline]
    pub fn gates(&self) -> &[QueuedGate] {
        &self.gates
    }

    pub fn into_gates(self) -> Vec<QueuedGate> {
        self.gates
    }

    /// Number of distinct qubits touched
    #[inline]
    pub fn width(&self) -> usize {
        self.qubits.len()
    }

    /// Number of gates
    #[inline]
    pub fn depth(&self) -> usize {
        self.gates.len()
    }

    /// Append `other`'s gates after this cluster's own
    fn absorb(&mut self, other: Cluster) {
        self.qubits.extend(other.qubits);
        self.gates.extend(other.gates);
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("qubits", &self.qubits)
            .field("gates", &self.gates)
            .finish()
    }
}

/// Groups an ordered gate list into clusters
///
/// # Example
///
/// ```
/// use qfuse_compiler::ClusterBuilder;
/// use qfuse_core::{gates, QubitId, QueuedGate};
///
/// let q0 = QubitId::new(0);
/// let q1 = QubitId::new(1);
/// let queue = vec![
///     QueuedGate::single(q0, gates::hadamard()),
///     QueuedGate::new(&[q0], q1, gates::pauli_x()).unwrap(),
/// ];
///
/// let clusters = ClusterBuilder::new(2, usize::MAX).build(queue);
/// assert_eq!(clusters.len(), 1);
/// assert_eq!(clusters[0].depth(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterBuilder {
    max_width: usize,
    max_depth: usize,
}

impl ClusterBuilder {
    /// Create a builder
    ///
    /// `max_width` bounds the number of qubits a merge may produce. A cluster
    /// stops absorbing once it holds `max_depth` gates.
    pub fn new(max_width: usize, max_depth: usize) -> Self {
        debug_assert!(max_width >= 1, "cluster width must be at least 1");
        debug_assert!(max_depth >= 1, "cluster depth must be at least 1");
        Self {
            max_width,
            max_depth,
        }
    }

    #[inline]
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Cluster `gates`, preserving their combined effect
    pub fn build(&self, gates: Vec<QueuedGate>) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = gates.into_iter().map(Cluster::from_gate).collect();

        for width in 1..=self.max_width {
            if clusters.len() <= 1 {
                break;
            }
            let before = clusters.len();
            clusters = self.merge_pass(clusters, width);
            trace!(width, before, after = clusters.len(), "cluster pass");
        }

        debug!(
            clusters = clusters.len(),
            max_width = self.max_width,
            "clustering complete"
        );
        clusters
    }

    /// One left-to-right sweep merging clusters up to `width` qubits
    fn merge_pass(&self, clusters: Vec<Cluster>, width: usize) -> Vec<Cluster> {
        let mut slots: Vec<Option<Cluster>> = clusters.into_iter().map(Some).collect();
        let mut emitted = Vec::with_capacity(slots.len());
        let mut skipped: AHashSet<QubitId> = AHashSet::new();

        for i in 0..slots.len() {
            let Some(mut current) = slots[i].take() else {
                continue;
            };

            if current.width() <= width {
                skipped.clear();
                for slot in slots[i + 1..].iter_mut() {
                    if current.depth() >= self.max_depth {
                        break;
                    }
                    let Some(candidate) = slot.as_ref() else {
                        continue;
                    };

                    let fresh: SmallVec<[QubitId; 8]> = candidate
                        .qubits
                        .difference(&current.qubits)
                        .copied()
                        .collect();
                    let fits = current.width() + fresh.len() <= width;
                    let blocked = fresh.iter().any(|q| skipped.contains(q));

                    if fits && !blocked {
                        if let Some(candidate) = slot.take() {
                            current.absorb(candidate);
                        }
                    } else if candidate.qubits.iter().any(|q| current.qubits.contains(q)) {
                        break;
                    } else {
                        skipped.extend(candidate.qubits.iter().copied());
                    }
                }
            }

            emitted.push(current);
        }

        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfuse_core::gates;

    fn q(n: usize) -> QubitId {
        QubitId::new(n)
    }

    fn h(target: usize) -> QueuedGate {
        QueuedGate::single(q(target), gates::hadamard())
    }

    fn cx(control: usize, target: usize) -> QueuedGate {
        QueuedGate::new(&[q(control)], q(target), gates::pauli_x()).unwrap()
    }

    fn flatten(clusters: &[Cluster]) -> Vec<QueuedGate> {
        clusters.iter().flat_map(|c| c.gates().iter().cloned()).collect()
    }

    #[test]
    fn test_empty_queue() {
        assert!(ClusterBuilder::new(4, usize::MAX).build(Vec::new()).is_empty());
    }

    #[test]
    fn test_same_qubit_gates_merge_at_width_one() {
        let gates = vec![h(0), h(0), h(0)];
        let clusters = ClusterBuilder::new(1, usize::MAX).build(gates);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].depth(), 3);
        assert_eq!(clusters[0].width(), 1);
    }

    #[test]
    fn test_barrier_keeps_clusters_apart() {
        // H(q0); CX(q0 -> q1); H(q1)
        let gates = vec![h(0), cx(0, 1), h(1)];
        let clusters = ClusterBuilder::new(1, usize::MAX).build(gates.clone());
        assert_eq!(clusters.len(), 3);
        assert_eq!(flatten(&clusters), gates);
    }

    #[test]
    fn test_wider_limit_merges_across_barrier() {
        let gates = vec![h(0), cx(0, 1), h(1)];
        let clusters = ClusterBuilder::new(2, usize::MAX).build(gates.clone());
        assert_eq!(clusters.len(), 1);
        assert_eq!(flatten(&clusters), gates);
    }

    #[test]
    fn test_commuting_gate_jumps_forward() {
        // H(q0); H(q1); H(q0): the last gate commutes past H(q1)
        let gates = vec![h(0), h(1), h(0)];
        let clusters = ClusterBuilder::new(1, usize::MAX).build(gates);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].gates(), &[h(0), h(0)]);
        assert_eq!(clusters[1].gates(), &[h(1)]);
    }

    #[test]
    fn test_candidate_blocked_by_skipped_qubit() {
        // CX(q1 -> q2) is skipped at width 2 from H(q0) because the union
        // would be 3 wide. CX(q0 -> q2) would then need to jump over it
        // while introducing q2, which it must not.
        let gates = vec![h(0), cx(1, 2), cx(0, 2)];
        let clusters = ClusterBuilder::new(2, usize::MAX).build(gates.clone());

        let order: Vec<QueuedGate> = flatten(&clusters);
        let pos = |g: &QueuedGate| order.iter().position(|x| x == g).unwrap();
        assert!(pos(&gates[1]) < pos(&gates[2]));
    }

    #[test]
    fn test_depth_limit() {
        let gates = vec![h(0), h(0), h(0), h(0), h(0)];
        let clusters = ClusterBuilder::new(1, 2).build(gates);
        assert!(clusters.iter().all(|c| c.depth() <= 2));
        assert_eq!(clusters.iter().map(Cluster::depth).sum::<usize>(), 5);
    }

    #[test]
    fn test_width_never_exceeds_limit_for_merged_clusters() {
        let gates = vec![h(0), cx(0, 1), cx(1, 2), h(2), cx(2, 3), h(0)];
        for max_width in 1..=4 {
            let clusters = ClusterBuilder::new(max_width, usize::MAX).build(gates.clone());
            for cluster in &clusters {
                assert!(cluster.depth() == 1 || cluster.width() <= max_width);
            }
            assert_eq!(clusters.iter().map(Cluster::depth).sum::<usize>(), gates.len());
        }
    }

    #[test]
    fn test_cluster_qubits_are_union() {
        let clusters = ClusterBuilder::new(3, usize::MAX).build(vec![cx(2, 0), h(1)]);
        assert_eq!(clusters.len(), 1);
        let qubits: Vec<_> = clusters[0].qubits().iter().copied().collect();
        assert_eq!(qubits, vec![q(0), q(1), q(2)]);
    }
}
