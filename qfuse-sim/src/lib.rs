//! Deferred, clustered and fused state-vector simulator
//!
//! [`Simulator`] is the entry point. It queues gates instead of applying them,
//! and on flush turns the queue into as few dense passes over the amplitude
//! vector as the configured cluster width allows.
//!
//! # Features
//!
//! - **Qubit virtualization**: stable [`QubitId`]s over dense bit positions
//!   that are renumbered as qubits are released
//! - **Gate fusion**: greedy clustering plus algebraic composition, with
//!   shared controls kept out of the fused matrix
//! - **Parallel execution**: composition and kernels run on a rayon pool
//!   owned by the simulator
//!
//! # Example
//!
//! ```
//! use qfuse_core::gates;
//! use qfuse_sim::{Simulator, SimulatorConfig};
//!
//! let mut sim = Simulator::new(SimulatorConfig::default().with_seed(1)).unwrap();
//! let q = sim.allocate().unwrap();
//!
//! sim.apply(&[], q, gates::pauli_x()).unwrap();
//! assert!(sim.measure(q).unwrap());
//!
//! sim.release(q).unwrap();
//! assert_eq!(sim.num_qubits(), 0);
//! ```

pub mod config;
pub mod error;
pub mod qubit_table;
pub mod queue;
pub mod simulator;
pub mod telemetry;

pub use config::SimulatorConfig;
pub use error::{Result, SimulatorError};
pub use qfuse_core::QubitId;
pub use qubit_table::QubitTable;
pub use queue::GateQueue;
pub use simulator::Simulator;
pub use telemetry::FlushStatistics;
