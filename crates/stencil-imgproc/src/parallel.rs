use rayon::prelude::*;
use thiserror::Error;

/// Errors that can occur during parallel execution.
#[derive(Error, Debug, PartialEq)]
pub enum ParallelError {
    /// The thread pool failed to build.
    #[error("failed to build thread pool: {0}")]
    BuildError(String),

    /// The requested thread count is invalid.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),

    /// The row stride must be valid.
    #[error("row stride must be > 0")]
    InvalidRowStride(usize),

    /// The buffer length is not a whole number of rows.
    #[error("buffer of length {0} is not a multiple of the row stride {1}")]
    SizeMismatch(usize, usize),
}

/// Controls how parallel operations are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Run sequentially on the current thread.
    Serial,

    /// Use the current Rayon thread pool to process rows in parallel.
    ///
    /// Inside [`rayon::ThreadPool::install`] this is the installed pool, otherwise
    /// the global one.
    #[default]
    ParallelRows,

    /// Run on a local thread pool with `n` threads.
    ///
    /// # Warning
    /// Creates a new thread pool on every call.
    Fixed(usize),
}

impl ExecutionStrategy {
    /// Strategy for a caller-specified thread count: serial for one thread, a
    /// local pool otherwise.
    pub fn from_threads(num_threads: usize) -> Self {
        match num_threads {
            1 => ExecutionStrategy::Serial,
            n => ExecutionStrategy::Fixed(n),
        }
    }
}

/// Build a thread pool with `num_threads` threads.
pub fn build_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool, ParallelError> {
    if num_threads == 0 {
        return Err(ParallelError::InvalidThreadCount(num_threads));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| ParallelError::BuildError(e.to_string()))
}

/// Trait to execute a row operation over a row-major buffer with a given strategy.
pub trait ExecuteRowsExt<T> {
    /// Execute an operation on every row of the buffer.
    ///
    /// # Arguments
    ///
    /// * `strategy` - The execution strategy.
    /// * `row_stride` - The number of elements in one row.
    /// * `op` - The operation, called with the row index and the mutable row.
    ///
    /// Every row is handed to exactly one call of `op`, so rows are written
    /// without synchronization.
    fn execute_rows_with<F>(
        &mut self,
        strategy: ExecutionStrategy,
        row_stride: usize,
        op: F,
    ) -> Result<(), ParallelError>
    where
        F: Fn(usize, &mut [T]) + Sync + Send;
}

impl<T: Send> ExecuteRowsExt<T> for [T] {
    fn execute_rows_with<F>(
        &mut self,
        strategy: ExecutionStrategy,
        row_stride: usize,
        op: F,
    ) -> Result<(), ParallelError>
    where
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        if row_stride == 0 {
            return Err(ParallelError::InvalidRowStride(row_stride));
        }

        if self.len() % row_stride != 0 {
            return Err(ParallelError::SizeMismatch(self.len(), row_stride));
        }

        match strategy {
            ExecutionStrategy::Serial => {
                self.chunks_exact_mut(row_stride)
                    .enumerate()
                    .for_each(|(y, row)| op(y, row));
            }
            ExecutionStrategy::ParallelRows => {
                self.par_chunks_exact_mut(row_stride)
                    .enumerate()
                    .for_each(|(y, row)| op(y, row));
            }
            ExecutionStrategy::Fixed(n) => {
                let pool = build_thread_pool(n)?;
                pool.install(|| {
                    self.par_chunks_exact_mut(row_stride)
                        .enumerate()
                        .for_each(|(y, row)| op(y, row));
                });
            }
        }
        Ok(())
    }
}
