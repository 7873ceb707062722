//! Gate clustering and matrix fusion for qfuse
//!
//! Two stages sit between the gate queue and the kernels:
//! - [`ClusterBuilder`] groups the ordered queue into [`Cluster`]s that are
//!   safe to apply as one matrix each
//! - [`Composition`] multiplies the gates of one cluster into a single
//!   [`FusedOperation`]: a dense matrix over the target positions plus a set
//!   of control positions shared by every gate

pub mod cluster;
pub mod composition;

pub use cluster::{Cluster, ClusterBuilder};
pub use composition::{Composition, FusedOperation};
