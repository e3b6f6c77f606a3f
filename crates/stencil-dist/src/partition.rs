use stencil_imgproc::CHANNELS;

use crate::error::DistError;

/// The contiguous range of image rows owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    /// The owning worker.
    pub worker_id: usize,
    /// First global row of the range.
    pub start_row: usize,
    /// Number of rows in the range, possibly zero.
    pub row_count: usize,
}

impl Partition {
    /// One past the last global row of the range.
    pub fn end_row(&self) -> usize {
        self.start_row + self.row_count
    }

    /// Returns true if the worker owns no rows.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Bytes of the worker's local output for an image of the given width.
    pub fn byte_len(&self, width: usize) -> usize {
        self.row_count * width * CHANNELS
    }

    /// Byte offset of the worker's rows in the assembled image.
    pub fn byte_offset(&self, width: usize) -> usize {
        self.start_row * width * CHANNELS
    }
}

/// Rows assigned to one worker.
///
/// The first `height % worker_count` workers receive one extra row, so row counts
/// differ by at most one and the ranges ordered by worker cover `[0, height)`.
///
/// # Arguments
///
/// * `height` - The number of image rows.
/// * `worker_count` - The number of workers, must be positive.
/// * `worker_id` - The worker, in `[0, worker_count)`.
///
/// # Examples
///
/// ```
/// use stencil_dist::partition::partition;
///
/// let p = partition(10, 4, 1).unwrap();
/// assert_eq!((p.start_row, p.row_count), (3, 3));
/// let p = partition(10, 4, 3).unwrap();
/// assert_eq!((p.start_row, p.row_count), (8, 2));
/// ```
pub fn partition(
    height: usize,
    worker_count: usize,
    worker_id: usize,
) -> Result<Partition, DistError> {
    if worker_count == 0 {
        return Err(DistError::InvalidParameter(
            "worker count must be > 0".to_string(),
        ));
    }
    if worker_id >= worker_count {
        return Err(DistError::InvalidParameter(format!(
            "worker id {worker_id} out of range for {worker_count} workers"
        )));
    }

    let base = height / worker_count;
    let remainder = height % worker_count;

    Ok(Partition {
        worker_id,
        start_row: worker_id * base + worker_id.min(remainder),
        row_count: base + usize::from(worker_id < remainder),
    })
}

/// The partitions of every worker, ordered by worker id.
pub fn partitions(height: usize, worker_count: usize) -> Result<Vec<Partition>, DistError> {
    (0..worker_count.max(1))
        .map(|worker_id| partition(height, worker_count, worker_id))
        .collect()
}

/// Per worker byte counts and offsets of the assembled image.
///
/// Derived from the same partitions used to build the halo buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherLayout {
    counts: Vec<usize>,
    displacements: Vec<usize>,
    total: usize,
}

impl GatherLayout {
    /// Build the layout of an image of the given width.
    pub fn new(partitions: &[Partition], width: usize) -> Self {
        let counts = partitions.iter().map(|p| p.byte_len(width)).collect::<Vec<_>>();
        let displacements = partitions
            .iter()
            .map(|p| p.byte_offset(width))
            .collect::<Vec<_>>();
        let total = counts.iter().sum();
        Self {
            counts,
            displacements,
            total,
        }
    }

    /// Number of contributing workers.
    pub fn num_workers(&self) -> usize {
        self.counts.len()
    }

    /// Bytes contributed by each worker.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Byte offset of each worker's contribution.
    pub fn displacements(&self) -> &[usize] {
        &self.displacements
    }

    /// Size of the assembled buffer.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Byte range of a worker's contribution, if the worker exists.
    pub fn range(&self, worker_id: usize) -> Option<std::ops::Range<usize>> {
        let count = *self.counts.get(worker_id)?;
        let start = *self.displacements.get(worker_id)?;
        Some(start..start + count)
    }
}
