//! Core types for the qfuse simulator
//!
//! This crate provides the vocabulary shared by every other qfuse crate:
//! - [`QubitId`]: stable, caller-visible qubit handle
//! - [`QueuedGate`]: a deferred (multi-)controlled single-qubit unitary
//! - [`Matrix2`] and [`DenseMatrix`]: gate matrices
//! - [`gates`]: the standard single-qubit gate matrices
//!
//! # Example
//! ```
//! use qfuse_core::{gates, QubitId, QueuedGate};
//!
//! let control = QubitId::new(0);
//! let target = QubitId::new(1);
//! let cnot = QueuedGate::new(&[control], target, gates::pauli_x()).unwrap();
//! assert_eq!(cnot.num_qubits(), 2);
//! ```

pub mod error;
pub mod gate;
pub mod gates;
pub mod matrix;
pub mod qubit;

pub use error::QuantumError;
pub use gate::{ControlList, QueuedGate};
pub use matrix::{DenseMatrix, Matrix2};
pub use num_complex::Complex64;
pub use qubit::{Position, QubitId};

/// Type alias for results in qfuse-core
pub type Result<T> = std::result::Result<T, QuantumError>;
