use stencil_image::{Image, ImageError};

use crate::{
    error::FilterError,
    parallel::ExecutionStrategy,
    stencil::{Stencil, StencilSpec},
    CHANNELS,
};

use super::{convolve_rows, ClampedRows};

/// Apply a stencil to a whole image.
///
/// This is the reference path: every partitioned execution of the same stencil
/// must produce exactly the same pixels.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, 3).
/// * `dst` - The destination image with shape (H, W, 3).
/// * `stencil` - The stencil to apply.
/// * `strategy` - How to schedule the rows across threads.
///
/// # Errors
///
/// Returns an error if the images differ in size or are empty.
pub fn apply_stencil(
    src: &Image<u8, CHANNELS>,
    dst: &mut Image<u8, CHANNELS>,
    stencil: &Stencil,
    strategy: ExecutionStrategy,
) -> Result<(), FilterError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        )
        .into());
    }

    if src.size().is_empty() {
        return Err(FilterError::InvalidParameter(format!(
            "cannot filter an empty image of size {}",
            src.size()
        )));
    }

    convolve_rows(
        &ClampedRows::new(src),
        stencil,
        0,
        dst.as_slice_mut(),
        strategy,
    )
}

/// Build the stencil for a selection and apply it to a copy of the image.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, 3).
/// * `spec` - The stencil selection.
/// * `strategy` - How to schedule the rows across threads.
///
/// # Returns
///
/// The filtered image, same size as the input.
pub fn filter_image(
    src: &Image<u8, CHANNELS>,
    spec: &StencilSpec,
    strategy: ExecutionStrategy,
) -> Result<Image<u8, CHANNELS>, FilterError> {
    let stencil = Stencil::new(spec)?;
    let mut dst = Image::from_size_val(src.size(), 0u8)?;
    apply_stencil(src, &mut dst, &stencil, strategy)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_image::ImageSize;

    #[test]
    fn test_gaussian_gray_image() -> Result<(), FilterError> {
        let image = Image::<u8, 3>::from_size_val(
            ImageSize {
                width: 4,
                height: 4,
            },
            128,
        )?;
        let blurred = filter_image(
            &image,
            &StencilSpec::Gaussian { sigma: 0.85 },
            ExecutionStrategy::Serial,
        )?;
        assert_eq!(blurred, image);
        Ok(())
    }

    #[test]
    fn test_apply_stencil_size_mismatch() -> Result<(), FilterError> {
        let src = Image::<u8, 3>::from_size_val([3, 2].into(), 0)?;
        let mut dst = Image::<u8, 3>::from_size_val([2, 3].into(), 0)?;
        let stencil = Stencil::new(&StencilSpec::Sharpen)?;
        let res = apply_stencil(&src, &mut dst, &stencil, ExecutionStrategy::Serial);
        assert_eq!(
            res,
            Err(FilterError::Image(ImageError::InvalidImageSize(3, 2, 2, 3)))
        );
        Ok(())
    }

    #[test]
    fn test_filter_empty_image() -> Result<(), FilterError> {
        let image = Image::<u8, 3>::new([0, 4].into(), vec![])?;
        let res = filter_image(&image, &StencilSpec::Emboss, ExecutionStrategy::Serial);
        assert!(matches!(res, Err(FilterError::InvalidParameter(_))));
        Ok(())
    }

    #[test]
    fn test_filter_single_pixel() -> Result<(), FilterError> {
        let image = Image::<u8, 3>::new([1, 1].into(), vec![10, 20, 30])?;
        let sharpened = filter_image(&image, &StencilSpec::Sharpen, ExecutionStrategy::Serial)?;
        // every neighbour clamps to the pixel itself
        assert_eq!(sharpened.as_slice(), &[10, 20, 30]);
        let embossed = filter_image(&image, &StencilSpec::Emboss, ExecutionStrategy::Serial)?;
        assert_eq!(embossed.as_slice(), &[128, 128, 128]);
        Ok(())
    }
}
