use stencil_image::ImageError;

use crate::parallel::ParallelError;

/// An error type for the stencil operations.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FilterError {
    /// A stencil or image parameter is out of its valid domain.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The kernel weights do not form a square matrix of the given radius.
    #[error("Kernel of radius {0} expects {1} weights, got {2}")]
    InvalidKernelShape(usize, usize, usize),

    /// A kernel buffer could not be allocated.
    #[error("Failed to allocate {0} bytes of kernel weights")]
    AllocationFailed(usize),

    /// The output buffer does not match the rows the source can provide.
    #[error("Output buffer holds {0} samples, expected {1}")]
    InvalidOutputLength(usize, usize),

    /// Error raised by the image container.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Error raised while scheduling the parallel work.
    #[error(transparent)]
    Parallel(#[from] ParallelError),
}
