use crate::{
    error::FilterError,
    kernels::{Kernel, Weights},
    parallel::{ExecuteRowsExt, ExecutionStrategy},
    stencil::Stencil,
    CHANNELS,
};

use super::RowSource;

/// Neutral gray written by the emboss stencil on the first row and column.
pub const EMBOSS_NEUTRAL: u8 = 128;

#[inline]
fn clamp_u8(val: i32) -> u8 {
    val.clamp(0, 255) as u8
}

#[inline]
fn clamp_col(x: isize, width: usize) -> usize {
    x.clamp(0, width as isize - 1) as usize
}

/// Accumulate float weights over the neighbourhood of pixel `(x, y)`.
#[inline]
fn accumulate_float<S: RowSource + ?Sized>(
    src: &S,
    y: usize,
    x: usize,
    radius: usize,
    weights: &[f32],
) -> [f32; CHANNELS] {
    let width = src.width();
    let size = 2 * radius + 1;
    let r = radius as isize;

    let mut acc = [0.0f32; CHANNELS];
    for (ky, weights_row) in (-r..=r).zip(weights.chunks_exact(size)) {
        let row = src.row(y, ky);
        for (kx, &w) in (-r..=r).zip(weights_row.iter()) {
            let xx = clamp_col(x as isize + kx, width) * CHANNELS;
            for (ch, acc_val) in acc.iter_mut().enumerate() {
                *acc_val += row[xx + ch] as f32 * w;
            }
        }
    }
    acc
}

/// Accumulate integer weights over the neighbourhood of pixel `(x, y)`.
#[inline]
fn accumulate_int<S: RowSource + ?Sized>(
    src: &S,
    y: usize,
    x: usize,
    radius: usize,
    weights: &[i32],
) -> [i32; CHANNELS] {
    let width = src.width();
    let size = 2 * radius + 1;
    let r = radius as isize;

    let mut acc = [0i32; CHANNELS];
    for (ky, weights_row) in (-r..=r).zip(weights.chunks_exact(size)) {
        let row = src.row(y, ky);
        for (kx, &w) in (-r..=r).zip(weights_row.iter()) {
            let xx = clamp_col(x as isize + kx, width) * CHANNELS;
            for (ch, acc_val) in acc.iter_mut().enumerate() {
                *acc_val += row[xx + ch] as i32 * w;
            }
        }
    }
    acc
}

/// Weighted sum of the neighbourhood, rounded to the nearest integer for float
/// kernels and divided with truncation for integer kernels.
#[inline]
fn weighted_pixel<S: RowSource + ?Sized>(
    src: &S,
    y: usize,
    x: usize,
    kernel: &Kernel,
) -> [u8; CHANNELS] {
    match kernel.weights() {
        Weights::Float(weights) => {
            accumulate_float(src, y, x, kernel.radius(), weights)
                .map(|v| clamp_u8((v + 0.5) as i32))
        }
        Weights::Integer { weights, divisor } => {
            accumulate_int(src, y, x, kernel.radius(), weights).map(|v| clamp_u8(v / divisor))
        }
    }
}

#[inline]
fn kernel_response<S: RowSource + ?Sized>(
    src: &S,
    y: usize,
    x: usize,
    kernel: &Kernel,
) -> [f64; CHANNELS] {
    match kernel.weights() {
        Weights::Float(weights) => {
            accumulate_float(src, y, x, kernel.radius(), weights).map(|v| v as f64)
        }
        Weights::Integer { weights, divisor } => {
            accumulate_int(src, y, x, kernel.radius(), weights).map(|v| (v / divisor) as f64)
        }
    }
}

/// Gradient magnitude of two kernel responses, truncated to an integer.
#[inline]
fn gradient_pixel<S: RowSource + ?Sized>(
    src: &S,
    y: usize,
    x: usize,
    kernel_x: &Kernel,
    kernel_y: &Kernel,
) -> [u8; CHANNELS] {
    let gx = kernel_response(src, y, x, kernel_x);
    let gy = kernel_response(src, y, x, kernel_y);
    let mut out = [0u8; CHANNELS];
    for ((dst, gx), gy) in out.iter_mut().zip(gx).zip(gy) {
        *dst = clamp_u8((gx * gx + gy * gy).sqrt() as i32);
    }
    out
}

/// Emboss: largest channel difference against the upper-left neighbour, written
/// to every channel. The first row and column of the image are neutral.
#[inline]
fn emboss_pixel<S: RowSource + ?Sized>(
    src: &S,
    y: usize,
    x: usize,
    global_y: usize,
) -> [u8; CHANNELS] {
    if x == 0 || global_y == 0 {
        return [EMBOSS_NEUTRAL; CHANNELS];
    }

    let current = &src.row(y, 0)[x * CHANNELS..(x + 1) * CHANNELS];
    let upper_left = &src.row(y, -1)[(x - 1) * CHANNELS..x * CHANNELS];

    let mut diffs = current
        .iter()
        .zip(upper_left)
        .map(|(&c, &u)| c as i32 - u as i32);
    let first = diffs.next().unwrap_or(0);
    // strict comparison keeps the earliest channel on ties
    let max_diff = diffs.fold(first, |max, d| if d.abs() > max.abs() { d } else { max });

    [clamp_u8(EMBOSS_NEUTRAL as i32 + max_diff); CHANNELS]
}

/// Apply a stencil to every output row of a row source.
///
/// Each output pixel depends only on the source rows, so rows are computed
/// independently and the result does not depend on the execution strategy.
///
/// # Arguments
///
/// * `src` - The rows to read from, with the vertical boundary already resolved.
/// * `stencil` - The stencil to apply.
/// * `start_row` - Global image row of the first output row.
/// * `dst` - The output rows, `src.num_rows() * src.width() * 3` samples, no halo.
/// * `strategy` - How to schedule the rows across threads.
pub fn convolve_rows<S: RowSource + ?Sized>(
    src: &S,
    stencil: &Stencil,
    start_row: usize,
    dst: &mut [u8],
    strategy: ExecutionStrategy,
) -> Result<(), FilterError> {
    if src.channels() != CHANNELS {
        return Err(FilterError::InvalidParameter(format!(
            "stencils expect {CHANNELS} channels, the source has {}",
            src.channels()
        )));
    }

    let width = src.width();
    let row_stride = width * CHANNELS;
    let expected = src.num_rows() * row_stride;

    if dst.len() != expected {
        return Err(FilterError::InvalidOutputLength(dst.len(), expected));
    }

    // nothing to compute for degenerate partitions
    if expected == 0 {
        return Ok(());
    }

    dst.execute_rows_with(strategy, row_stride, |y, dst_row| {
        let pixels = dst_row.chunks_exact_mut(CHANNELS).enumerate();
        match stencil {
            Stencil::Weighted(kernel) => pixels.for_each(|(x, dst_pixel)| {
                dst_pixel.copy_from_slice(&weighted_pixel(src, y, x, kernel));
            }),
            Stencil::Gradient { kernel_x, kernel_y } => pixels.for_each(|(x, dst_pixel)| {
                dst_pixel.copy_from_slice(&gradient_pixel(src, y, x, kernel_x, kernel_y));
            }),
            Stencil::Emboss => pixels.for_each(|(x, dst_pixel)| {
                dst_pixel.copy_from_slice(&emboss_pixel(src, y, x, start_row + y));
            }),
        }
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ClampedRows;
    use crate::stencil::StencilSpec;
    use stencil_image::{Image, ImageSize};

    fn convolve_image(
        image: &Image<u8, 3>,
        spec: StencilSpec,
        strategy: ExecutionStrategy,
    ) -> Result<Vec<u8>, FilterError> {
        let stencil = Stencil::new(&spec)?;
        let mut dst = vec![0u8; image.as_slice().len()];
        convolve_rows(&ClampedRows::new(image), &stencil, 0, &mut dst, strategy)?;
        Ok(dst)
    }

    #[test]
    fn test_uniform_fixed_point() -> Result<(), FilterError> {
        let image = Image::<u8, 3>::from_size_val([4, 4].into(), 128)?;
        for spec in [
            StencilSpec::Gaussian { sigma: 0.85 },
            StencilSpec::Mean,
            StencilSpec::Sharpen,
        ] {
            let dst = convolve_image(&image, spec, ExecutionStrategy::Serial)?;
            assert_eq!(dst, image.as_slice(), "{spec} changed a uniform image");
        }

        // derivatives of a flat image vanish
        let dst = convolve_image(&image, StencilSpec::Sobel, ExecutionStrategy::Serial)?;
        assert!(dst.iter().all(|&v| v == 0));
        let dst = convolve_image(&image, StencilSpec::Laplacian, ExecutionStrategy::Serial)?;
        assert!(dst.iter().all(|&v| v == 0));
        Ok(())
    }

    #[test]
    fn test_sharpen_clamps() -> Result<(), FilterError> {
        // a bright center on black: 5 * 200 saturates, neighbours go negative
        let mut data = vec![0u8; 3 * 3 * 3];
        data[12..15].copy_from_slice(&[200, 40, 0]);
        let image = Image::<u8, 3>::new([3, 3].into(), data)?;
        let dst = convolve_image(&image, StencilSpec::Sharpen, ExecutionStrategy::Serial)?;
        assert_eq!(&dst[12..15], &[255, 200, 0]);
        assert_eq!(&dst[3..6], &[0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_mean_truncates() -> Result<(), FilterError> {
        // single 10 valued pixel: every 3x3 window containing it sums to 10
        let mut data = vec![0u8; 3 * 3 * 3];
        data[12] = 10;
        let image = Image::<u8, 3>::new([3, 3].into(), data)?;
        let dst = convolve_image(&image, StencilSpec::Mean, ExecutionStrategy::Serial)?;
        assert!(dst.chunks_exact(3).all(|px| px == [1, 0, 0]));
        Ok(())
    }

    #[test]
    fn test_sobel_corner() -> Result<(), FilterError> {
        // white top-left corner on a black 3x3 image
        let mut data = vec![0u8; 3 * 3 * 3];
        data[0..3].copy_from_slice(&[255, 255, 255]);
        let image = Image::<u8, 3>::new([3, 3].into(), data)?;
        let dst = convolve_image(&image, StencilSpec::Sobel, ExecutionStrategy::Serial)?;

        // pixel (1, 0): the clamped corner is read twice, gx = -765 and gy = -255
        assert_eq!(&dst[3..6], &[255, 255, 255]);
        // pixel (1, 1): gx = gy = -255, magnitude 360 saturates
        assert_eq!(&dst[12..15], &[255, 255, 255]);
        // pixel (2, 2) does not see the corner
        assert_eq!(&dst[24..27], &[0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_emboss() -> Result<(), FilterError> {
        let image = Image::<u8, 3>::new(
            ImageSize {
                width: 2,
                height: 2,
            },
            vec![10, 10, 10, 0, 0, 0, 0, 0, 0, 60, 0, 250],
        )?;
        let dst = convolve_image(&image, StencilSpec::Emboss, ExecutionStrategy::Serial)?;
        // first row and column are neutral
        assert_eq!(&dst[0..9], &[128; 9]);
        // diffs against (0, 0) are 50, -10, 240: the blue one wins
        assert_eq!(&dst[9..12], &[255, 255, 255]);

        // the neutral row follows the global row, not the local one
        let stencil = Stencil::new(&StencilSpec::Emboss)?;
        let mut dst = vec![0u8; image.as_slice().len()];
        convolve_rows(
            &ClampedRows::new(&image),
            &stencil,
            5,
            &mut dst,
            ExecutionStrategy::Serial,
        )?;
        assert_eq!(&dst[0..3], &[128, 128, 128]);
        assert_ne!(&dst[3..6], &[128, 128, 128]);
        Ok(())
    }

    #[test]
    fn test_strategies_agree() -> Result<(), FilterError> {
        let size = ImageSize {
            width: 17,
            height: 11,
        };
        let data = (0..size.num_pixels() * 3)
            .map(|i| ((i * 37) % 251) as u8)
            .collect::<Vec<_>>();
        let image = Image::<u8, 3>::new(size, data)?;

        for spec in [
            StencilSpec::Gaussian { sigma: 1.3 },
            StencilSpec::Sobel,
            StencilSpec::Emboss,
            StencilSpec::Laplacian,
        ] {
            let serial = convolve_image(&image, spec, ExecutionStrategy::Serial)?;
            let parallel = convolve_image(&image, spec, ExecutionStrategy::ParallelRows)?;
            let fixed = convolve_image(&image, spec, ExecutionStrategy::Fixed(4))?;
            assert_eq!(serial, parallel);
            assert_eq!(serial, fixed);
        }
        Ok(())
    }

    #[test]
    fn test_output_length_checked() -> Result<(), FilterError> {
        let image = Image::<u8, 3>::from_size_val([2, 2].into(), 0)?;
        let stencil = Stencil::new(&StencilSpec::Sharpen)?;
        let mut dst = vec![0u8; 5];
        let res = convolve_rows(
            &ClampedRows::new(&image),
            &stencil,
            0,
            &mut dst,
            ExecutionStrategy::Serial,
        );
        assert_eq!(res, Err(FilterError::InvalidOutputLength(5, 12)));
        Ok(())
    }

    #[test]
    fn test_channel_count_checked() -> Result<(), FilterError> {
        let gray = Image::<u8, 1>::from_size_val([4, 2].into(), 7)?;
        let stencil = Stencil::new(&StencilSpec::Sharpen)?;
        let mut dst = vec![0u8; 4 * 2 * CHANNELS];
        let res = convolve_rows(
            &ClampedRows::new(&gray),
            &stencil,
            0,
            &mut dst,
            ExecutionStrategy::Serial,
        );
        assert!(matches!(res, Err(FilterError::InvalidParameter(_))));
        assert!(dst.iter().all(|&v| v == 0));
        Ok(())
    }
}
