use stencil_image::Image;
use stencil_imgproc::filter::RowSource;

use crate::{error::DistError, partition::Partition, phase::Phase};

/// A worker's rows plus `radius` rows above and below.
///
/// Local row `i` holds a copy of global row `clamp(start_row + i - radius, 0, height - 1)`,
/// so rows past the image edges replicate the first or last row. A worker that owns
/// no rows gets an empty buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct HaloBuffer<const C: usize> {
    width: usize,
    start_row: usize,
    row_count: usize,
    radius: usize,
    data: Vec<u8>,
}

impl<const C: usize> HaloBuffer<C> {
    /// Copy the rows a partition needs out of the full image.
    ///
    /// # Arguments
    ///
    /// * `image` - The full image, identical on every worker.
    /// * `partition` - The rows owned by this worker.
    /// * `radius` - Number of extra rows on each side.
    ///
    /// # Errors
    ///
    /// Returns [`DistError::Resource`] if the buffer cannot be allocated and
    /// [`DistError::InvalidParameter`] if the partition does not fit the image.
    pub fn assemble(
        image: &Image<u8, C>,
        partition: &Partition,
        radius: usize,
    ) -> Result<Self, DistError> {
        let height = image.height();
        let width = image.width();

        if partition.end_row() > height {
            return Err(DistError::InvalidParameter(format!(
                "rows {}..{} exceed the image height {height}",
                partition.start_row,
                partition.end_row()
            )));
        }

        if partition.is_empty() {
            return Ok(Self {
                width,
                start_row: partition.start_row,
                row_count: 0,
                radius,
                data: Vec::new(),
            });
        }

        let stride = image.row_stride();
        let num_rows = partition.row_count + 2 * radius;
        let bytes = num_rows * stride;

        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| DistError::Resource {
                stage: Phase::ComputeLocal,
                bytes,
            })?;

        let last = height as isize - 1;
        for i in 0..num_rows {
            let global = partition.start_row as isize + i as isize - radius as isize;
            let yy = global.clamp(0, last) as usize;
            data.extend_from_slice(&image.as_slice()[yy * stride..(yy + 1) * stride]);
        }

        Ok(Self {
            width,
            start_row: partition.start_row,
            row_count: partition.row_count,
            radius,
            data,
        })
    }

    /// Number of rows held, including the halo.
    pub fn num_buffered_rows(&self) -> usize {
        if self.row_count == 0 {
            return 0;
        }
        self.row_count + 2 * self.radius
    }

    /// Global row of the first owned row.
    pub fn start_row(&self) -> usize {
        self.start_row
    }

    /// Number of extra rows on each side.
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Local row `i`, counted from the top of the halo.
    pub fn local_row(&self, i: usize) -> Option<&[u8]> {
        let stride = self.width * C;
        self.data.get(i * stride..(i + 1) * stride)
    }

    /// The buffered samples, row-major.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl<const C: usize> RowSource for HaloBuffer<C> {
    fn width(&self) -> usize {
        self.width
    }

    fn channels(&self) -> usize {
        C
    }

    fn num_rows(&self) -> usize {
        self.row_count
    }

    #[inline]
    fn row(&self, y: usize, dy: isize) -> &[u8] {
        let stride = self.width * C;
        let yy = (y + self.radius).saturating_add_signed(dy);
        &self.data[yy * stride..(yy + 1) * stride]
    }
}
