//! Dense amplitude storage and matrix kernels for qfuse
//!
//! This crate owns the physical side of the simulator:
//!
//! - [`AmplitudeStore`]: the dense `2^n` amplitude vector, which grows and
//!   shrinks by exact powers of two as qubits come and go
//! - [`KernelDispatcher`]: the contract for multiplying a dense `2^k × 2^k`
//!   matrix into the vector, and [`DenseKernel`], the portable reference
//!   implementation supporting up to [`MAX_KERNEL_WIDTH`] qubits
//!
//! # Example
//!
//! ```
//! use qfuse_core::{gates, DenseMatrix};
//! use qfuse_state::{AmplitudeStore, DenseKernel, KernelBackend};
//!
//! let kernel = DenseKernel::new(KernelBackend::Sequential);
//! let mut store = AmplitudeStore::new();
//! let q = store.grow().unwrap();
//!
//! store
//!     .apply_matrix(&kernel, &DenseMatrix::from(gates::pauli_x()), &[q], 0)
//!     .unwrap();
//! assert_eq!(store.classical_value(q).unwrap(), Some(true));
//! ```

pub mod amplitudes;
pub mod dispatch;
pub mod error;
pub mod kernels;

pub use amplitudes::{AmplitudeStore, CLASSICAL_EPSILON, MAX_QUBITS};
pub use dispatch::{DenseKernel, KernelBackend, KernelDispatcher, MAX_KERNEL_WIDTH};
pub use error::{Result, StateError};
