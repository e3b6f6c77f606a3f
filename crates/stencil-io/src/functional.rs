use std::path::Path;

use stencil_image::{Image, ImageSize};

use crate::error::IoError;

/// Reads an image from the given file path as RGB8.
///
/// The method tries to read from any image format supported by the image crate and
/// converts the pixels to three 8-bit channels.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// An image containing the image data.
pub fn read_image_any_rgb8(file_path: impl AsRef<Path>) -> Result<Image<u8, 3>, IoError> {
    let file_path = file_path.as_ref().to_owned();

    // verify the file exists
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::ImageReader::open(&file_path)?
        .with_guessed_format()?
        .decode()?;

    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    Ok(Image::new(size, img.into_rgb8().into_raw())?)
}

/// Writes the given RGB8 image to the given file path as PNG.
///
/// The image is always encoded as PNG, whatever the file extension.
///
/// # Arguments
///
/// * `file_path` - The path to the PNG image.
/// * `image` - The image to write.
pub fn write_image_png_rgb8(
    file_path: impl AsRef<Path>,
    image: &Image<u8, 3>,
) -> Result<(), IoError> {
    let [width, height]: [u32; 2] = image.size().into();
    image::save_buffer_with_format(
        file_path,
        image.as_slice(),
        width,
        height,
        image::ExtendedColorType::Rgb8,
        image::ImageFormat::Png,
    )
    .map_err(|e| match e {
        image::ImageError::IoError(e) => IoError::FileError(e),
        e => IoError::PngEncodingError(e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image() -> Result<Image<u8, 3>, IoError> {
        let data = (0..4 * 3 * 3).map(|i| (i * 7) as u8).collect::<Vec<_>>();
        Ok(Image::new(
            ImageSize {
                width: 4,
                height: 3,
            },
            data,
        )?)
    }

    #[test]
    fn write_read_png() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("out.png");

        let image = test_image()?;
        write_image_png_rgb8(&file_path, &image)?;
        assert!(file_path.exists());

        let image_back = read_image_any_rgb8(&file_path)?;
        assert_eq!(image_back, image);
        Ok(())
    }

    #[test]
    fn write_png_ignores_extension() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("out.jpg");

        let image = test_image()?;
        write_image_png_rgb8(&file_path, &image)?;

        // lossless round trip proves the pixels were not jpeg encoded
        let image_back = read_image_any_rgb8(&file_path)?;
        assert_eq!(image_back, image);
        Ok(())
    }

    #[test]
    fn read_missing_file() {
        let res = read_image_any_rgb8("/definitely/not/here.png");
        assert!(matches!(res, Err(IoError::FileDoesNotExist(_))));
    }

    #[test]
    fn read_invalid_file() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("garbage.png");
        std::fs::write(&file_path, b"not an image")?;

        let res = read_image_any_rgb8(&file_path);
        assert!(matches!(res, Err(IoError::ImageDecodeError(_))));
        Ok(())
    }

    #[test]
    fn write_to_missing_dir() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("missing").join("out.png");
        let res = write_image_png_rgb8(&file_path, &test_image()?);
        assert!(matches!(res, Err(IoError::FileError(_))));
        assert!(!file_path.exists());
        Ok(())
    }
}
