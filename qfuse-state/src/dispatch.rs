//! Kernel dispatch
//!
//! The simulator never calls a kernel function directly. It holds a
//! [`KernelDispatcher`] chosen once at construction, so the choice of
//! back-end is a value injected at startup rather than a branch taken per
//! gate.

use num_complex::Complex64;
use qfuse_core::{DenseMatrix, Position};

use crate::error::{Result, StateError};
use crate::kernels::{apply_matrix_parallel, apply_matrix_sequential};

/// Widest matrix the reference kernels accept
pub const MAX_KERNEL_WIDTH: usize = 7;

/// Default minimum vector length for the parallel path (1024 amplitudes)
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1 << 10;

/// Applies dense matrices to an amplitude vector
///
/// Implementations must support every width `1..=max_width()`, and must leave
/// untouched every amplitude whose index does not contain all bits of
/// `control_mask`.
pub trait KernelDispatcher: Send + Sync {
    /// Widest matrix (in qubits) this dispatcher accepts
    fn max_width(&self) -> usize;

    /// Multiply `matrix` into `state` on the sub-register named by `positions`
    ///
    /// # Errors
    /// Returns error if the width is unsupported, the matrix size does not
    /// match `positions`, or the positions and mask are not disjoint.
    fn apply(
        &self,
        state: &mut [Complex64],
        matrix: &DenseMatrix,
        positions: &[Position],
        control_mask: usize,
    ) -> Result<()>;
}

/// Execution capability of the reference kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelBackend {
    /// Single-threaded loop
    Sequential,

    /// Rayon data-parallel loop once the vector reaches `threshold` amplitudes
    Parallel { threshold: usize },
}

impl KernelBackend {
    /// Pick the back-end for a pool of `num_threads` workers
    pub fn detect(num_threads: usize) -> Self {
        if num_threads <= 1 {
            KernelBackend::Sequential
        } else {
            KernelBackend::Parallel {
                threshold: DEFAULT_PARALLEL_THRESHOLD,
            }
        }
    }
}

impl Default for KernelBackend {
    fn default() -> Self {
        KernelBackend::Parallel {
            threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// Portable reference dispatcher supporting up to [`MAX_KERNEL_WIDTH`] qubits
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseKernel {
    backend: KernelBackend,
}

impl DenseKernel {
    pub fn new(backend: KernelBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> KernelBackend {
        self.backend
    }
}

impl KernelDispatcher for DenseKernel {
    fn max_width(&self) -> usize {
        MAX_KERNEL_WIDTH
    }

    fn apply(
        &self,
        state: &mut [Complex64],
        matrix: &DenseMatrix,
        positions: &[Position],
        control_mask: usize,
    ) -> Result<()> {
        let width = positions.len();
        if width == 0 || width > MAX_KERNEL_WIDTH {
            return Err(StateError::UnsupportedWidth {
                width,
                max: MAX_KERNEL_WIDTH,
            });
        }
        if matrix.num_qubits() != width {
            return Err(StateError::DimensionMismatch {
                expected: 1 << width,
                actual: matrix.dimension(),
            });
        }

        let num_qubits = state.len().trailing_zeros() as usize;
        let mut seen = control_mask;
        for &position in positions {
            if position >= num_qubits {
                return Err(StateError::InvalidPosition {
                    position,
                    num_qubits,
                });
            }
            if seen & (1 << position) != 0 {
                return Err(StateError::OverlappingPosition { position });
            }
            seen |= 1 << position;
        }
        if control_mask >> num_qubits != 0 {
            return Err(StateError::InvalidPosition {
                position: usize::BITS as usize - 1 - control_mask.leading_zeros() as usize,
                num_qubits,
            });
        }

        match self.backend {
            KernelBackend::Parallel { threshold } if state.len() >= threshold => {
                apply_matrix_parallel(state, matrix, positions, control_mask)
            }
            _ => apply_matrix_sequential(state, matrix, positions, control_mask),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfuse_core::gates;

    fn zero_state(num_qubits: usize) -> Vec<Complex64> {
        let mut state = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
        state[0] = Complex64::new(1.0, 0.0);
        state
    }

    #[test]
    fn test_detect_backend() {
        assert_eq!(KernelBackend::detect(1), KernelBackend::Sequential);
        assert!(matches!(KernelBackend::detect(4), KernelBackend::Parallel { .. }));
    }

    #[test]
    fn test_rejects_width_mismatch() {
        let kernel = DenseKernel::default();
        let mut state = zero_state(3);
        let err = kernel
            .apply(&mut state, &DenseMatrix::identity(2), &[0], 0)
            .unwrap_err();
        assert!(matches!(err, StateError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_rejects_overlapping_control() {
        let kernel = DenseKernel::default();
        let mut state = zero_state(3);
        let x = DenseMatrix::from(gates::pauli_x());
        let err = kernel.apply(&mut state, &x, &[1], 0b010).unwrap_err();
        assert_eq!(err, StateError::OverlappingPosition { position: 1 });
    }

    #[test]
    fn test_rejects_out_of_range_position() {
        let kernel = DenseKernel::default();
        let mut state = zero_state(2);
        let x = DenseMatrix::from(gates::pauli_x());
        assert!(kernel.apply(&mut state, &x, &[2], 0).is_err());
        assert!(kernel.apply(&mut state, &x, &[0], 0b100).is_err());
    }

    #[test]
    fn test_rejects_too_wide() {
        let kernel = DenseKernel::new(KernelBackend::Sequential);
        let mut state = zero_state(8);
        let wide = DenseMatrix::identity(8);
        let err = kernel
            .apply(&mut state, &wide, &[0, 1, 2, 3, 4, 5, 6, 7], 0)
            .unwrap_err();
        assert_eq!(
            err,
            StateError::UnsupportedWidth {
                width: 8,
                max: MAX_KERNEL_WIDTH
            }
        );
    }

    #[test]
    fn test_full_width_identity_is_noop() {
        let kernel = DenseKernel::new(KernelBackend::Sequential);
        let mut state = zero_state(7);
        kernel
            .apply(&mut state, &DenseMatrix::identity(7), &[0, 1, 2, 3, 4, 5, 6], 0)
            .unwrap();
        assert_eq!(state, zero_state(7));
    }
}
