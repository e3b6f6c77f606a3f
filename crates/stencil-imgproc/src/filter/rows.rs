use stencil_image::Image;

/// Read access to the input rows around the output rows of a stencil.
///
/// Output row `y` is computed from the source rows `row(y, dy)` for `dy` in
/// `[-radius, radius]`. Implementations resolve the vertical boundary, the
/// convolver only clamps columns.
pub trait RowSource: Sync {
    /// Width of every row in pixels.
    fn width(&self) -> usize;

    /// Number of interleaved channels per pixel.
    fn channels(&self) -> usize;

    /// Number of output rows this source can serve.
    fn num_rows(&self) -> usize;

    /// The source row at vertical offset `dy` from output row `y`.
    fn row(&self, y: usize, dy: isize) -> &[u8];
}

/// All the rows of an image, clamped to the first and last row.
pub struct ClampedRows<'a, const C: usize> {
    image: &'a Image<u8, C>,
}

impl<'a, const C: usize> ClampedRows<'a, C> {
    /// Wrap an image. The image must not be empty.
    pub fn new(image: &'a Image<u8, C>) -> Self {
        Self { image }
    }
}

impl<const C: usize> RowSource for ClampedRows<'_, C> {
    fn width(&self) -> usize {
        self.image.width()
    }

    fn channels(&self) -> usize {
        C
    }

    fn num_rows(&self) -> usize {
        self.image.height()
    }

    #[inline]
    fn row(&self, y: usize, dy: isize) -> &[u8] {
        let last = self.image.height() as isize - 1;
        let yy = (y as isize + dy).clamp(0, last) as usize;
        let stride = self.image.row_stride();
        &self.image.as_slice()[yy * stride..(yy + 1) * stride]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_image::{ImageError, ImageSize};

    #[test]
    fn test_clamped_rows() -> Result<(), ImageError> {
        let image = Image::<u8, 1>::new(
            ImageSize {
                width: 2,
                height: 3,
            },
            vec![0, 1, 2, 3, 4, 5],
        )?;
        let rows = ClampedRows::new(&image);
        assert_eq!(rows.width(), 2);
        assert_eq!(rows.channels(), 1);
        assert_eq!(rows.num_rows(), 3);
        assert_eq!(rows.row(0, -2), &[0, 1]);
        assert_eq!(rows.row(1, 0), &[2, 3]);
        assert_eq!(rows.row(2, 1), &[4, 5]);
        assert_eq!(rows.row(1, 5), &[4, 5]);
        Ok(())
    }
}
