use stencil_image::ImageError;
use stencil_imgproc::{parallel::ParallelError, FilterError};

use crate::phase::Phase;

/// An error type for the distributed runs.
///
/// Every error raised during a collective phase aborts the run for all workers.
#[derive(thiserror::Error, Debug)]
pub enum DistError {
    /// A run parameter is out of its valid domain. Detected before any exchange.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A buffer could not be allocated.
    #[error("Failed to allocate {bytes} bytes during {stage}")]
    Resource {
        /// The phase that requested the buffer.
        stage: Phase,
        /// The requested size in bytes.
        bytes: usize,
    },

    /// A worker thread could not be started.
    #[error("Failed to spawn worker {worker_id}")]
    Spawn {
        /// The worker that could not be started.
        worker_id: usize,
        /// The underlying io error.
        #[source]
        source: std::io::Error,
    },

    /// The coordinator failed to load the input image.
    #[error("Failed to load the input image")]
    ImageSource(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Another participant aborted the run.
    #[error("Run aborted by worker {worker_id} during {stage}")]
    Aborted {
        /// The phase this worker was in.
        stage: Phase,
        /// The worker that aborted.
        worker_id: usize,
    },

    /// Every peer went away while waiting on a collective.
    #[error("Lost every peer during {stage}")]
    Disconnected {
        /// The phase this worker was in.
        stage: Phase,
    },

    /// A collective received a message out of order.
    #[error("Unexpected {message} message during {stage}")]
    Protocol {
        /// The phase this worker was in.
        stage: Phase,
        /// The kind of message received.
        message: &'static str,
    },

    /// A worker contributed a local output of the wrong length.
    #[error("Worker {worker_id} contributed {got} bytes, expected {expected}")]
    InvalidContribution {
        /// The contributing worker.
        worker_id: usize,
        /// Bytes the gather layout reserves for the worker.
        expected: usize,
        /// Bytes actually received.
        got: usize,
    },

    /// A worker thread panicked.
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),

    /// Error raised by the stencil operations.
    #[error(transparent)]
    Filter(FilterError),

    /// Error raised by the image container.
    #[error(transparent)]
    Image(#[from] ImageError),
}

impl DistError {
    /// Wrap an image source failure.
    pub fn image_source(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        DistError::ImageSource(err.into())
    }

    /// Returns true for errors that only report another worker's failure.
    pub fn is_secondary(&self) -> bool {
        matches!(
            self,
            DistError::Aborted { .. } | DistError::Disconnected { .. }
        )
    }
}

impl From<FilterError> for DistError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::InvalidParameter(msg) => DistError::InvalidParameter(msg),
            FilterError::Image(err) => DistError::Image(err),
            FilterError::AllocationFailed(bytes) => DistError::Resource {
                stage: Phase::Idle,
                bytes,
            },
            err => DistError::Filter(err),
        }
    }
}

impl From<ParallelError> for DistError {
    fn from(err: ParallelError) -> Self {
        FilterError::from(err).into()
    }
}
