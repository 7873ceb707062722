//! Qubit handles and positions

use std::fmt;

/// Bit index of a qubit inside the dense amplitude vector
///
/// Positions are dense (`0..num_qubits`) and change when a qubit with a
/// lower position is released. Callers never see them directly.
pub type Position = usize;

/// Stable, caller-visible handle for an allocated qubit
///
/// A `QubitId` stays valid for the whole lifetime of the qubit, independent
/// of where the qubit currently lives in the amplitude vector. Released ids
/// may be handed out again by a later allocation.
///
/// # Example
/// ```
/// use qfuse_core::QubitId;
///
/// let q0 = QubitId::new(0);
/// let q1 = QubitId::new(1);
/// assert!(q0 < q1);
/// ```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct QubitId(usize);

impl QubitId {
    /// Create a new qubit handle
    #[inline]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying index
    ///
    /// # Example
    /// ```
    /// use qfuse_core::QubitId;
    /// let q = QubitId::new(5);
    /// assert_eq!(q.index(), 5);
    /// ```
    #[inline]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<usize> for QubitId {
    #[inline]
    fn from(id: usize) -> Self {
        Self::new(id)
    }
}

impl From<QubitId> for usize {
    #[inline]
    fn from(qid: QubitId) -> Self {
        qid.index()
    }
}
