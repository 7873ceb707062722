//! Error types for qfuse-core

use crate::QubitId;
use thiserror::Error;

/// Errors raised while constructing gates and matrices
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QuantumError {
    /// The target qubit also appears among the controls
    #[error("Qubit {0} is used both as control and target")]
    ControlIsTarget(QubitId),

    /// The same control qubit was listed twice
    #[error("Duplicate control qubit {0}")]
    DuplicateControl(QubitId),

    /// Matrix data does not describe a square 2^k matrix
    #[error("Invalid matrix dimension {dimension}, expected a power of 2")]
    InvalidDimension { dimension: usize },

    /// Flattened matrix data has the wrong number of elements
    #[error("Matrix data has {actual} elements, expected {expected}")]
    DataLength { expected: usize, actual: usize },
}
