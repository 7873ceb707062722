//! Deferred gate records

use crate::{Matrix2, QuantumError, QubitId, Result};
use smallvec::SmallVec;
use std::fmt;

/// Control qubits of a gate; most gates have at most a few
pub type ControlList = SmallVec<[QubitId; 4]>;

/// A requested (multi-)controlled single-qubit unitary
///
/// `QueuedGate` records what the caller asked for without touching any state.
/// It is immutable once built and is ordered only by its position in the
/// gate queue.
///
/// Invariants: the target is not a control and controls are distinct.
///
/// # Example
/// ```
/// use qfuse_core::{gates, QubitId, QueuedGate};
///
/// let q0 = QubitId::new(0);
/// let q1 = QubitId::new(1);
///
/// let h = QueuedGate::single(q0, gates::hadamard());
/// assert!(!h.is_controlled());
///
/// assert!(QueuedGate::new(&[q0], q0, gates::pauli_x()).is_err());
/// let cx = QueuedGate::new(&[q0], q1, gates::pauli_x()).unwrap();
/// assert_eq!(cx.controls(), &[q0]);
/// ```
#[derive(Clone, PartialEq)]
pub struct QueuedGate {
    controls: ControlList,
    target: QubitId,
    matrix: Matrix2,
}

impl QueuedGate {
    /// Create a controlled gate
    ///
    /// # Errors
    /// Returns error if:
    /// - The target is listed among the controls
    /// - A control is listed twice
    pub fn new(controls: &[QubitId], target: QubitId, matrix: Matrix2) -> Result<Self> {
        for (i, &control) in controls.iter().enumerate() {
            if control == target {
                return Err(QuantumError::ControlIsTarget(target));
            }
            if controls[i + 1..].contains(&control) {
                return Err(QuantumError::DuplicateControl(control));
            }
        }

        Ok(Self {
            controls: SmallVec::from_slice(controls),
            target,
            matrix,
        })
    }

    /// Create an uncontrolled gate
    #[inline]
    pub fn single(target: QubitId, matrix: Matrix2) -> Self {
        Self {
            controls: SmallVec::new(),
            target,
            matrix,
        }
    }

    /// Control qubits in the order they were given
    #[inline]
    pub fn controls(&self) -> &[QubitId] {
        &self.controls
    }

    #[inline]
    pub fn target(&self) -> QubitId {
        self.target
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix2 {
        &self.matrix
    }

    #[inline]
    pub fn is_controlled(&self) -> bool {
        !self.controls.is_empty()
    }

    /// Number of qubits touched (controls plus target)
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.controls.len() + 1
    }

    /// All touched qubits: controls first, then the target
    pub fn qubits(&self) -> impl Iterator<Item = QubitId> + '_ {
        self.controls
            .iter()
            .copied()
            .chain(std::iter::once(self.target))
    }
}

impl fmt::Debug for QueuedGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U(")?;
        if !self.controls.is_empty() {
            write!(f, "[")?;
            for (i, q) in self.controls.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", q)?;
            }
            write!(f, "] -> ")?;
        }
        write!(f, "{})", self.target)
    }
}
