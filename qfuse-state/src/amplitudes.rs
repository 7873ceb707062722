//! Dense amplitude vector that grows and shrinks with the register
//!
//! The store always holds exactly `2^n` amplitudes for `n` live qubits. Bit
//! `b` of an amplitude index is the value of the qubit at position `b`.
//! Adding a qubit tensors the state with `|0⟩` on a new highest bit; removing
//! one keeps only the half of the vector matching its classical value.

use num_complex::Complex64;
use qfuse_core::{DenseMatrix, Position};
use rayon::prelude::*;
use std::fmt;
use tracing::trace;

use crate::dispatch::KernelDispatcher;
use crate::error::{Result, StateError};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Largest register the store will grow to
pub const MAX_QUBITS: usize = 30;

/// Probability mass below which an amplitude counts as zero
pub const CLASSICAL_EPSILON: f64 = 100.0 * f64::EPSILON;

/// Minimum vector length for parallel reductions
const PARALLEL_REDUCTION_THRESHOLD: usize = 1 << 14;

/// Dense amplitude vector of an `n`-qubit register
///
/// # Example
///
/// ```
/// use qfuse_state::AmplitudeStore;
///
/// let mut store = AmplitudeStore::new();
/// assert_eq!(store.dimension(), 1);
///
/// store.grow().unwrap();
/// store.grow().unwrap();
/// assert_eq!(store.num_qubits(), 2);
/// assert_eq!(store.dimension(), 4);
/// ```
#[derive(Clone, PartialEq)]
pub struct AmplitudeStore {
    num_qubits: usize,
    amplitudes: Vec<Complex64>,
}

impl AmplitudeStore {
    /// Create the empty register: a single amplitude equal to 1
    pub fn new() -> Self {
        Self {
            num_qubits: 0,
            amplitudes: vec![ONE],
        }
    }

    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Number of amplitudes (2^num_qubits)
    #[inline]
    pub fn dimension(&self) -> usize {
        self.amplitudes.len()
    }

    #[inline]
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    #[inline]
    pub fn amplitudes_mut(&mut self) -> &mut [Complex64] {
        &mut self.amplitudes
    }

    /// Reset to the empty register
    pub fn reset(&mut self) {
        self.num_qubits = 0;
        self.amplitudes.clear();
        self.amplitudes.push(ONE);
        self.amplitudes.shrink_to_fit();
    }

    /// Append a qubit in `|0⟩` as the new highest position
    ///
    /// # Returns
    /// The position of the new qubit.
    ///
    /// # Errors
    /// Returns error if the register is already at [`MAX_QUBITS`] or the
    /// doubled vector cannot be allocated. The store is unchanged on error.
    pub fn grow(&mut self) -> Result<Position> {
        if self.num_qubits >= MAX_QUBITS {
            return Err(StateError::TooManyQubits {
                requested: self.num_qubits + 1,
                max: MAX_QUBITS,
            });
        }

        let size = self.amplitudes.len() * 2;
        self.amplitudes
            .try_reserve_exact(size - self.amplitudes.len())
            .map_err(|_| StateError::AllocationError { size })?;
        self.amplitudes.resize(size, ZERO);

        let position = self.num_qubits;
        self.num_qubits += 1;
        trace!(num_qubits = self.num_qubits, dimension = size, "state grown");
        Ok(position)
    }

    /// Remove the qubit at `position`, keeping the half where it equals `value`
    ///
    /// Positions above the removed one shift down by one. The qubit is
    /// expected to be classical; any amplitude in the discarded half is lost.
    ///
    /// # Errors
    /// Returns error if the position is out of range.
    pub fn remove(&mut self, position: Position, value: bool) -> Result<()> {
        self.check_position(position)?;

        let offset = 1usize << position;
        let mut kept = Vec::with_capacity(self.amplitudes.len() / 2);
        for block in self.amplitudes.chunks(2 * offset) {
            let half = if value { &block[offset..] } else { &block[..offset] };
            kept.extend_from_slice(half);
        }

        self.amplitudes = kept;
        self.num_qubits -= 1;
        trace!(position, value, num_qubits = self.num_qubits, "state shrunk");
        Ok(())
    }

    /// Multiply a dense matrix into the vector through `kernel`
    ///
    /// # Errors
    /// Propagates the dispatcher's validation errors.
    pub fn apply_matrix(
        &mut self,
        kernel: &dyn KernelDispatcher,
        matrix: &DenseMatrix,
        positions: &[Position],
        control_mask: usize,
    ) -> Result<()> {
        kernel.apply(&mut self.amplitudes, matrix, positions, control_mask)
    }

    /// Probability of measuring 1 at `position`
    pub fn probability(&self, position: Position) -> Result<f64> {
        self.check_position(position)?;
        let mask = 1usize << position;
        Ok(self.masked_norm_sqr(|i| i & mask != 0))
    }

    /// Probability that the parity of the listed positions is odd
    pub fn joint_probability(&self, positions: &[Position]) -> Result<f64> {
        let mask = self.position_mask(positions)?;
        Ok(self.masked_norm_sqr(|i| (i & mask).count_ones() % 2 == 1))
    }

    /// Classical value of the qubit at `position`, if it has one
    ///
    /// Returns `Some(value)` when every amplitude with non-negligible weight
    /// agrees on the bit, `None` when the qubit is in superposition or
    /// entangled.
    pub fn classical_value(&self, position: Position) -> Result<Option<bool>> {
        self.check_position(position)?;
        let mask = 1usize << position;

        let (have0, have1) = self
            .amplitudes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.norm_sqr() >= CLASSICAL_EPSILON)
            .fold((false, false), |(have0, have1), (i, _)| {
                if i & mask == 0 {
                    (true, have1)
                } else {
                    (have0, true)
                }
            });

        Ok(match (have0, have1) {
            (true, true) => None,
            (_, have1) => Some(have1),
        })
    }

    /// Zero every amplitude where `position` differs from `value`, then renormalize
    pub fn collapse(&mut self, position: Position, value: bool) -> Result<()> {
        self.check_position(position)?;
        let mask = 1usize << position;
        let keep = if value { mask } else { 0 };

        for (i, amplitude) in self.amplitudes.iter_mut().enumerate() {
            if i & mask != keep {
                *amplitude = ZERO;
            }
        }
        self.normalize();
        Ok(())
    }

    /// Zero every amplitude whose parity over `positions` differs from
    /// `parity`, then renormalize
    ///
    /// `parity` is `true` for an odd number of set bits.
    pub fn joint_collapse(&mut self, positions: &[Position], parity: bool) -> Result<()> {
        let mask = self.position_mask(positions)?;
        for (i, amplitude) in self.amplitudes.iter_mut().enumerate() {
            if ((i & mask).count_ones() % 2 == 1) != parity {
                *amplitude = ZERO;
            }
        }
        self.normalize();
        Ok(())
    }

    /// State of the qubits at `positions` if they are separable from the rest
    ///
    /// The register is sliced through its largest amplitude: once along
    /// `positions` and once along the remaining qubits. Both slices are
    /// normalized, and the result is accepted only if their tensor product,
    /// rephased to the pivot, reproduces every amplitude within `tolerance`.
    ///
    /// Local bit `l` of the returned vector is the qubit at `positions[l]`.
    /// Returns `None` if the subset is entangled with the rest.
    ///
    /// # Errors
    /// Returns error if a position is out of range or repeated, or if
    /// `tolerance` is not positive.
    pub fn subsystem(&self, positions: &[Position], tolerance: f64) -> Result<Option<Vec<Complex64>>> {
        if !(tolerance > 0.0) {
            return Err(StateError::InvalidTolerance { tolerance });
        }
        let mask = self.position_mask(positions)?;
        let rest: Vec<Position> = (0..self.num_qubits)
            .filter(|p| mask & (1 << p) == 0)
            .collect();

        let pivot_index = self
            .amplitudes
            .iter()
            .enumerate()
            .fold((0usize, 0.0f64), |best, (i, a)| {
                let weight = a.norm_sqr();
                if weight > best.1 {
                    (i, weight)
                } else {
                    best
                }
            })
            .0;
        let pivot = self.amplitudes[pivot_index];
        if pivot.norm() == 0.0 {
            return Ok(None);
        }
        let pivot_phase = (pivot / pivot.norm()).conj();

        let inner = self.slice(pivot_index & !mask, positions);
        let outer = self.slice(pivot_index & mask, &rest);

        let tolerance_sqr = tolerance * tolerance;
        let separable = self.amplitudes.par_iter().enumerate().all(|(i, &amplitude)| {
            let product = pivot_phase * inner[gather_bits(i, positions)] * outer[gather_bits(i, &rest)];
            (product - amplitude).norm_sqr() <= tolerance_sqr
        });

        Ok(separable.then_some(inner))
    }

    pub fn norm(&self) -> f64 {
        self.masked_norm_sqr(|_| true).sqrt()
    }

    /// Scale so that the norm equals 1
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 1e-10 {
            let inv_norm = 1.0 / norm;
            for amplitude in self.amplitudes.iter_mut() {
                *amplitude *= inv_norm;
            }
        }
    }

    pub fn is_normalized(&self, epsilon: f64) -> bool {
        (self.norm() - 1.0).abs() < epsilon
    }

    fn masked_norm_sqr(&self, select: impl Fn(usize) -> bool + Sync) -> f64 {
        if self.amplitudes.len() >= PARALLEL_REDUCTION_THRESHOLD {
            self.amplitudes
                .par_iter()
                .enumerate()
                .filter(|(i, _)| select(*i))
                .map(|(_, a)| a.norm_sqr())
                .sum()
        } else {
            self.amplitudes
                .iter()
                .enumerate()
                .filter(|(i, _)| select(*i))
                .map(|(_, a)| a.norm_sqr())
                .sum()
        }
    }

    /// Normalized amplitudes along `positions`, all other bits fixed by `base`
    fn slice(&self, base: usize, positions: &[Position]) -> Vec<Complex64> {
        let mut slice: Vec<Complex64> = (0..1usize << positions.len())
            .map(|local| self.amplitudes[base | scatter_bits(local, positions)])
            .collect();
        let norm = slice.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
        if norm > 0.0 {
            for a in slice.iter_mut() {
                *a /= norm;
            }
        }
        slice
    }

    /// Bit mask of distinct, in-range positions
    fn position_mask(&self, positions: &[Position]) -> Result<usize> {
        let mut mask = 0usize;
        for &position in positions {
            self.check_position(position)?;
            if mask & (1 << position) != 0 {
                return Err(StateError::OverlappingPosition { position });
            }
            mask |= 1 << position;
        }
        Ok(mask)
    }

    fn check_position(&self, position: Position) -> Result<()> {
        if position >= self.num_qubits {
            return Err(StateError::InvalidPosition {
                position,
                num_qubits: self.num_qubits,
            });
        }
        Ok(())
    }
}

/// Place bit `l` of `local` at `positions[l]`
#[inline]
fn scatter_bits(local: usize, positions: &[Position]) -> usize {
    positions
        .iter()
        .enumerate()
        .filter(|(l, _)| (local >> l) & 1 == 1)
        .fold(0, |acc, (_, &p)| acc | (1 << p))
}

/// Collect bit `positions[l]` of `index` into bit `l`
#[inline]
fn gather_bits(index: usize, positions: &[Position]) -> usize {
    positions
        .iter()
        .enumerate()
        .fold(0, |acc, (l, &p)| acc | (((index >> p) & 1) << l))
}

impl Default for AmplitudeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AmplitudeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmplitudeStore")
            .field("num_qubits", &self.num_qubits)
            .field("dimension", &self.dimension())
            .finish()
    }
}

impl fmt::Display for AmplitudeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "State for {} qubits with {} amplitudes using {} bytes",
            self.num_qubits,
            self.dimension(),
            self.dimension() * std::mem::size_of::<Complex64>()
        )?;
        if self.num_qubits <= 6 {
            for (i, amplitude) in self.amplitudes.iter().enumerate() {
                writeln!(f, "  {:0width$b}: {}", i, amplitude, width = self.num_qubits.max(1))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DenseKernel, KernelBackend};
    use approx::assert_relative_eq;
    use qfuse_core::gates;

    fn kernel() -> DenseKernel {
        DenseKernel::new(KernelBackend::Sequential)
    }

    #[test]
    fn test_new_store_is_empty_register() {
        let store = AmplitudeStore::new();
        assert_eq!(store.num_qubits(), 0);
        assert_eq!(store.amplitudes(), &[ONE]);
        assert!(store.is_normalized(1e-12));
    }

    #[test]
    fn test_grow_appends_zero_half() {
        let mut store = AmplitudeStore::new();
        assert_eq!(store.grow().unwrap(), 0);
        store
            .apply_matrix(&kernel(), &DenseMatrix::from(gates::hadamard()), &[0], 0)
            .unwrap();
        assert_eq!(store.grow().unwrap(), 1);

        let h = std::f64::consts::FRAC_1_SQRT_2;
        let amps = store.amplitudes();
        assert_eq!(amps.len(), 4);
        assert_relative_eq!(amps[0].re, h, epsilon = 1e-12);
        assert_relative_eq!(amps[1].re, h, epsilon = 1e-12);
        assert_eq!(amps[2], ZERO);
        assert_eq!(amps[3], ZERO);
    }

    #[test]
    fn test_grow_beyond_max_fails() {
        let mut store = AmplitudeStore {
            num_qubits: MAX_QUBITS,
            amplitudes: vec![ONE],
        };
        let err = store.grow().unwrap_err();
        assert_eq!(
            err,
            StateError::TooManyQubits {
                requested: MAX_QUBITS + 1,
                max: MAX_QUBITS
            }
        );
        assert_eq!(store.dimension(), 1);
    }

    #[test]
    fn test_remove_keeps_matching_half() {
        let mut store = AmplitudeStore::new();
        for _ in 0..3 {
            store.grow().unwrap();
        }
        // |q2 q1 q0⟩ = |0 1 0⟩, then H on q0
        let k = kernel();
        store
            .apply_matrix(&k, &DenseMatrix::from(gates::pauli_x()), &[1], 0)
            .unwrap();
        store
            .apply_matrix(&k, &DenseMatrix::from(gates::hadamard()), &[0], 0)
            .unwrap();

        store.remove(1, true).unwrap();

        let h = std::f64::consts::FRAC_1_SQRT_2;
        assert_eq!(store.num_qubits(), 2);
        assert_relative_eq!(store.amplitudes()[0].re, h, epsilon = 1e-12);
        assert_relative_eq!(store.amplitudes()[1].re, h, epsilon = 1e-12);
        assert_eq!(store.amplitudes()[2], ZERO);
        assert_eq!(store.amplitudes()[3], ZERO);
    }

    #[test]
    fn test_classical_value() {
        let mut store = AmplitudeStore::new();
        store.grow().unwrap();
        store.grow().unwrap();
        assert_eq!(store.classical_value(0).unwrap(), Some(false));

        store
            .apply_matrix(&kernel(), &DenseMatrix::from(gates::pauli_x()), &[1], 0)
            .unwrap();
        assert_eq!(store.classical_value(1).unwrap(), Some(true));

        store
            .apply_matrix(&kernel(), &DenseMatrix::from(gates::hadamard()), &[0], 0)
            .unwrap();
        assert_eq!(store.classical_value(0).unwrap(), None);
        assert_eq!(store.classical_value(1).unwrap(), Some(true));
    }

    #[test]
    fn test_probability_and_collapse() {
        let mut store = AmplitudeStore::new();
        store.grow().unwrap();
        store
            .apply_matrix(&kernel(), &DenseMatrix::from(gates::hadamard()), &[0], 0)
            .unwrap();
        assert_relative_eq!(store.probability(0).unwrap(), 0.5, epsilon = 1e-12);

        store.collapse(0, true).unwrap();
        assert_relative_eq!(store.probability(0).unwrap(), 1.0, epsilon = 1e-12);
        assert!(store.is_normalized(1e-12));
    }

    #[test]
    fn test_joint_probability_is_parity() {
        let mut store = AmplitudeStore::new();
        store.grow().unwrap();
        store.grow().unwrap();
        store
            .apply_matrix(&kernel(), &DenseMatrix::from(gates::pauli_x()), &[0], 0)
            .unwrap();
        assert_relative_eq!(store.joint_probability(&[0, 1]).unwrap(), 1.0, epsilon = 1e-12);

        store
            .apply_matrix(&kernel(), &DenseMatrix::from(gates::pauli_x()), &[1], 0)
            .unwrap();
        assert_relative_eq!(store.joint_probability(&[0, 1]).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_position() {
        let store = AmplitudeStore::new();
        assert_eq!(
            store.probability(0).unwrap_err(),
            StateError::InvalidPosition {
                position: 0,
                num_qubits: 0
            }
        );
    }

    fn bell_pair() -> AmplitudeStore {
        let mut store = AmplitudeStore::new();
        store.grow().unwrap();
        store.grow().unwrap();
        let k = kernel();
        store
            .apply_matrix(&k, &DenseMatrix::from(gates::hadamard()), &[0], 0)
            .unwrap();
        store
            .apply_matrix(&k, &DenseMatrix::from(gates::pauli_x()), &[1], 0b01)
            .unwrap();
        store
    }

    #[test]
    fn test_joint_collapse_keeps_matching_parity() {
        let mut store = AmplitudeStore::new();
        store.grow().unwrap();
        store
            .apply_matrix(&kernel(), &DenseMatrix::from(gates::hadamard()), &[0], 0)
            .unwrap();

        store.joint_collapse(&[0], true).unwrap();
        assert_eq!(store.classical_value(0).unwrap(), Some(true));
        assert!(store.is_normalized(1e-12));

        let mut bell = bell_pair();
        let before = bell.clone();
        bell.joint_collapse(&[0, 1], false).unwrap();
        for (a, b) in bell.amplitudes().iter().zip(before.amplitudes()) {
            assert_relative_eq!((a - b).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_joint_collapse_rejects_repeated_position() {
        let mut store = bell_pair();
        assert_eq!(
            store.joint_collapse(&[1, 1], false).unwrap_err(),
            StateError::OverlappingPosition { position: 1 }
        );
    }

    #[test]
    fn test_subsystem_of_product_state() {
        // q0 in |+⟩, q1 in |1⟩
        let mut store = AmplitudeStore::new();
        store.grow().unwrap();
        store.grow().unwrap();
        let k = kernel();
        store
            .apply_matrix(&k, &DenseMatrix::from(gates::hadamard()), &[0], 0)
            .unwrap();
        store
            .apply_matrix(&k, &DenseMatrix::from(gates::pauli_x()), &[1], 0)
            .unwrap();

        let h = std::f64::consts::FRAC_1_SQRT_2;
        let plus = store.subsystem(&[0], 1e-10).unwrap().unwrap();
        assert_relative_eq!(plus[0].norm(), h, epsilon = 1e-12);
        assert_relative_eq!(plus[1].norm(), h, epsilon = 1e-12);

        let one = store.subsystem(&[1], 1e-10).unwrap().unwrap();
        assert_relative_eq!(one[0].norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(one[1].norm(), 1.0, epsilon = 1e-12);

        // Local bit 0 is q1, bit 1 is q0
        let swapped = store.subsystem(&[1, 0], 1e-10).unwrap().unwrap();
        let weights: Vec<f64> = swapped.iter().map(|a| a.norm()).collect();
        for (w, e) in weights.iter().zip(&[0.0, h, 0.0, h]) {
            assert_relative_eq!(*w, *e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_subsystem_of_entangled_pair_is_none() {
        let store = bell_pair();
        assert_eq!(store.subsystem(&[0], 1e-6).unwrap(), None);
        assert!(store.subsystem(&[0, 1], 1e-6).unwrap().is_some());
    }

    #[test]
    fn test_subsystem_rejects_bad_tolerance() {
        let store = bell_pair();
        assert!(matches!(
            store.subsystem(&[0], 0.0),
            Err(StateError::InvalidTolerance { .. })
        ));
    }

    #[test]
    fn test_reset() {
        let mut store = AmplitudeStore::new();
        store.grow().unwrap();
        store.grow().unwrap();
        store.reset();
        assert_eq!(store, AmplitudeStore::new());
    }
}
