//! Error types for the simulator

use qfuse_core::{QuantumError, QubitId};
use qfuse_state::StateError;
use thiserror::Error;

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimulatorError>;

/// Errors that can occur during simulation
///
/// A failing call leaves the simulator as it was before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulatorError {
    /// Invalid or malformed configuration value
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Unknown, released or already-live qubit id
    #[error("Invalid qubit {qubit}: {reason}")]
    InvalidQubit { qubit: QubitId, reason: String },

    /// Qubit released while in superposition or entangled
    #[error("Qubit {0} is not in a classical state")]
    NotClassical(QubitId),

    /// Requested fusion width exceeds what the kernel dispatcher supports
    #[error("Cluster width {requested} exceeds kernel capacity {supported}")]
    Capacity { requested: usize, supported: usize },

    /// Implicit and explicit qubit allocation mixed on one simulator
    #[error("Inconsistent qubit allocation: {0}")]
    Consistency(String),

    /// Error from the amplitude store or kernels
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Malformed gate
    #[error("Gate error: {0}")]
    Gate(#[from] QuantumError),
}

impl SimulatorError {
    pub(crate) fn invalid_qubit(qubit: QubitId, reason: impl Into<String>) -> Self {
        SimulatorError::InvalidQubit {
            qubit,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SimulatorError::invalid_qubit(QubitId::new(3), "not allocated");
        assert_eq!(err.to_string(), "Invalid qubit q3: not allocated");

        let err = SimulatorError::Capacity {
            requested: 9,
            supported: 7,
        };
        assert_eq!(err.to_string(), "Cluster width 9 exceeds kernel capacity 7");
    }

    #[test]
    fn test_from_lower_layers() {
        let err: SimulatorError = StateError::OverlappingPosition { position: 2 }.into();
        assert!(matches!(err, SimulatorError::State(_)));

        let err: SimulatorError = QuantumError::ControlIsTarget(QubitId::new(0)).into();
        assert!(matches!(err, SimulatorError::Gate(_)));
    }
}
