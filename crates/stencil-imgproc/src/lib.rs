#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for the stencil operations.
pub mod error;

/// convolution kernel generation.
pub mod kernels;

/// stencil families and their convolution bodies.
pub mod stencil;

/// image filtering module.
pub mod filter;

/// module containing parallization utilities.
pub mod parallel;

pub use crate::error::FilterError;

/// Number of interleaved samples per pixel processed by the stencils.
pub const CHANNELS: usize = 3;
