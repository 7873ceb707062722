//! Error types for amplitude storage and kernels

use thiserror::Error;

/// Errors that can occur during amplitude vector operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// Position outside the current register
    #[error("Invalid position {position} for {num_qubits}-qubit state")]
    InvalidPosition { position: usize, num_qubits: usize },

    /// The same position was passed twice, or overlaps the control mask
    #[error("Position {position} is used more than once")]
    OverlappingPosition { position: usize },

    /// Growing the register would exceed the supported size
    #[error("Cannot grow to {requested} qubits, maximum is {max}")]
    TooManyQubits { requested: usize, max: usize },

    /// Memory allocation error
    #[error("Failed to allocate {size} amplitudes")]
    AllocationError { size: usize },

    /// Matrix width beyond what the kernel supports
    #[error("Kernel supports at most {max} qubits, got {width}")]
    UnsupportedWidth { width: usize, max: usize },

    /// Separability tolerance must be positive
    #[error("Tolerance must be positive, got {tolerance}")]
    InvalidTolerance { tolerance: f64 },

    /// Matrix dimension does not match the number of positions
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for state operations
pub type Result<T> = std::result::Result<T, StateError>;
