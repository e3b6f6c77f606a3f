//! Filter operations
//!
//! This module provides the stencil convolution used by both the whole-image
//! reference path and the row-partitioned workers.

/// Row access for the convolver
mod rows;
pub use rows::*;

/// Thread-parallel convolver
mod convolve;
pub use convolve::*;

/// Whole image filter operations
mod ops;
pub use ops::*;
