#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Collective operations between the workers of a run.
pub mod comm;

/// Run configuration.
pub mod config;

/// Error types for the distributed runs.
pub mod error;

/// Halo buffers holding a worker's rows and their neighbours.
pub mod halo;

/// Entry points of a run.
pub mod launch;

/// Row partitioning and gather layout.
pub mod partition;

/// The phases of a run.
pub mod phase;

/// The per-worker state machine.
pub mod worker;

pub use crate::config::{Backend, ParallelConfig};
pub use crate::error::DistError;
pub use crate::launch::{run_backend, run_distributed, run_distributed_with_report, RunReport};
