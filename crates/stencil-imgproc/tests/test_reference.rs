use rand::{rngs::StdRng, Rng, SeedableRng};

use stencil_image::{Image, ImageSize};
use stencil_imgproc::{
    filter::filter_image, parallel::ExecutionStrategy, stencil::StencilSpec, FilterError,
};

fn random_image(size: ImageSize, seed: u64) -> Result<Image<u8, 3>, FilterError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..size.num_pixels() * 3)
        .map(|_| rng.random::<u8>())
        .collect::<Vec<_>>();
    Ok(Image::new(size, data)?)
}

const FAMILIES: [StencilSpec; 7] = [
    StencilSpec::Gaussian { sigma: 0.85 },
    StencilSpec::Gaussian { sigma: 2.2 },
    StencilSpec::Mean,
    StencilSpec::Sharpen,
    StencilSpec::Laplacian,
    StencilSpec::Sobel,
    StencilSpec::Emboss,
];

#[test]
fn threaded_matches_serial() -> Result<(), FilterError> {
    let image = random_image(
        ImageSize {
            width: 23,
            height: 19,
        },
        7,
    )?;

    for spec in FAMILIES {
        let serial = filter_image(&image, &spec, ExecutionStrategy::Serial)?;
        for threads in [2, 3, 8] {
            let threaded = filter_image(&image, &spec, ExecutionStrategy::from_threads(threads))?;
            assert_eq!(serial, threaded, "{spec} differs with {threads} threads");
        }
    }
    Ok(())
}

#[test]
fn single_row_and_column_images() -> Result<(), FilterError> {
    for size in [[1, 9], [9, 1], [1, 1]] {
        let image = random_image(size.into(), 11)?;
        for spec in FAMILIES {
            let out = filter_image(&image, &spec, ExecutionStrategy::ParallelRows)?;
            assert_eq!(out.size(), image.size());
        }
    }
    Ok(())
}

#[test]
fn blur_reduces_variation() -> Result<(), FilterError> {
    // vertical stripes, one pixel wide
    let size = ImageSize {
        width: 16,
        height: 8,
    };
    let data = (0..size.num_pixels())
        .flat_map(|i| {
            let v = if (i % size.width) % 2 == 0 { 0u8 } else { 200 };
            [v, v, v]
        })
        .collect::<Vec<_>>();
    let image = Image::<u8, 3>::new(size, data)?;

    let blurred = filter_image(&image, &StencilSpec::Mean, ExecutionStrategy::Serial)?;
    let spread = |img: &Image<u8, 3>| {
        let max = img.as_slice().iter().max().copied().unwrap_or(0);
        let min = img.as_slice().iter().min().copied().unwrap_or(0);
        max - min
    };
    assert!(spread(&blurred) < spread(&image));
    Ok(())
}
