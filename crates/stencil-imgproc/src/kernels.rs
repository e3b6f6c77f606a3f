use crate::error::FilterError;

/// The sobel horizontal 3x3 kernel.
pub const SOBEL_X_3X3: [i32; 9] = [-1, 0, 1, -2, 0, 2, -1, 0, 1];

/// The sobel vertical 3x3 kernel.
pub const SOBEL_Y_3X3: [i32; 9] = [-1, -2, -1, 0, 0, 0, 1, 2, 1];

/// The sharpening 3x3 kernel.
pub const SHARPEN_3X3: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

/// The 4-connectivity laplacian 3x3 kernel.
pub const LAPLACIAN_3X3: [i32; 9] = [0, 1, 0, 1, -4, 1, 0, 1, 0];

/// The 3x3 mean kernel, to be divided by 9.
pub const MEAN_3X3: [i32; 9] = [1, 1, 1, 1, 1, 1, 1, 1, 1];

/// Weights of a square kernel, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum Weights {
    /// Generated weights, accumulated in `f32`.
    Float(Vec<f32>),
    /// Fixed integer weights, accumulated in `i32`; the sum is divided by `divisor`
    /// with truncation.
    Integer {
        /// The kernel weights.
        weights: Vec<i32>,
        /// The divisor applied to the accumulated sum.
        divisor: i32,
    },
}

/// A square convolution kernel of size `(2 * radius + 1) x (2 * radius + 1)`.
///
/// Fixed integer kernels and generated floating point kernels share this type so
/// that the convolver consumes both the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    radius: usize,
    weights: Weights,
}

impl Kernel {
    /// Create a kernel from floating point weights.
    ///
    /// # Arguments
    ///
    /// * `radius` - The kernel radius.
    /// * `weights` - Row-major weights, `(2 * radius + 1)^2` of them.
    pub fn from_float(radius: usize, weights: Vec<f32>) -> Result<Self, FilterError> {
        check_shape(radius, weights.len())?;
        Ok(Self {
            radius,
            weights: Weights::Float(weights),
        })
    }

    /// Create a kernel from integer weights and a divisor.
    ///
    /// # Arguments
    ///
    /// * `radius` - The kernel radius.
    /// * `weights` - Row-major weights, `(2 * radius + 1)^2` of them.
    /// * `divisor` - Non-zero divisor applied to the accumulated sum.
    pub fn from_integer(
        radius: usize,
        weights: Vec<i32>,
        divisor: i32,
    ) -> Result<Self, FilterError> {
        check_shape(radius, weights.len())?;
        if divisor == 0 {
            return Err(FilterError::InvalidParameter(
                "kernel divisor must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            radius,
            weights: Weights::Integer { weights, divisor },
        })
    }

    /// Create a normalized gaussian kernel.
    ///
    /// The radius is `ceil(3 * sigma)`.
    ///
    /// # Arguments
    ///
    /// * `sigma` - The standard deviation of the gaussian, must be positive.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidParameter`] if `sigma` is not a positive finite number
    /// or if the kernel would not fit in memory, and [`FilterError::AllocationFailed`] if
    /// the weights cannot be allocated.
    pub fn gaussian(sigma: f32) -> Result<Self, FilterError> {
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(FilterError::InvalidParameter(format!(
                "gaussian sigma must be positive, got {sigma}"
            )));
        }
        let radius = gaussian_radius(sigma)?;
        Self::from_float(radius, gaussian_kernel_2d(radius, sigma)?)
    }

    /// The sobel kernel for the horizontal derivative.
    pub fn sobel_x() -> Self {
        Self::fixed3(SOBEL_X_3X3, 1)
    }

    /// The sobel kernel for the vertical derivative.
    pub fn sobel_y() -> Self {
        Self::fixed3(SOBEL_Y_3X3, 1)
    }

    /// The sharpening kernel.
    pub fn sharpen() -> Self {
        Self::fixed3(SHARPEN_3X3, 1)
    }

    /// The 4-connectivity laplacian kernel.
    pub fn laplacian() -> Self {
        Self::fixed3(LAPLACIAN_3X3, 1)
    }

    /// The 3x3 mean kernel.
    pub fn mean() -> Self {
        Self::fixed3(MEAN_3X3, 9)
    }

    fn fixed3(weights: [i32; 9], divisor: i32) -> Self {
        Self {
            radius: 1,
            weights: Weights::Integer {
                weights: weights.to_vec(),
                divisor,
            },
        }
    }

    /// The kernel radius.
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// The kernel side length, `2 * radius + 1`.
    pub fn size(&self) -> usize {
        2 * self.radius + 1
    }

    /// The kernel weights.
    pub fn weights(&self) -> &Weights {
        &self.weights
    }
}

fn check_shape(radius: usize, len: usize) -> Result<(), FilterError> {
    let expected = kernel_len(radius)?;
    if len != expected {
        return Err(FilterError::InvalidKernelShape(radius, expected, len));
    }
    Ok(())
}

/// Number of weights of a square kernel of the given radius, `(2 * radius + 1)^2`.
///
/// # Errors
///
/// Returns [`FilterError::InvalidParameter`] if the count does not fit in `usize`.
pub fn kernel_len(radius: usize) -> Result<usize, FilterError> {
    radius
        .checked_mul(2)
        .and_then(|r| r.checked_add(1))
        .and_then(|size| size.checked_mul(size))
        .ok_or_else(|| {
            FilterError::InvalidParameter(format!("kernel radius {radius} is too large"))
        })
}

/// Radius of the gaussian kernel for a given sigma, `ceil(3 * sigma)`.
///
/// # Errors
///
/// Returns [`FilterError::InvalidParameter`] if the kernel of that radius would have
/// more weights than `usize` can count.
pub fn gaussian_radius(sigma: f32) -> Result<usize, FilterError> {
    // saturates for huge sigma, rejected by the length check below
    let radius = (3.0 * sigma).ceil() as usize;
    kernel_len(radius).map_err(|_| {
        FilterError::InvalidParameter(format!("gaussian sigma {sigma} is too large"))
    })?;
    Ok(radius)
}

/// Create a 2d gaussian kernel.
///
/// # Arguments
///
/// * `radius` - The radius of the kernel.
/// * `sigma` - The sigma of the gaussian kernel.
///
/// # Returns
///
/// The row-major kernel weights, normalized to sum to one.
///
/// # Errors
///
/// Returns [`FilterError::InvalidParameter`] if the radius is too large to count the
/// weights, and [`FilterError::AllocationFailed`] if they cannot be allocated.
pub fn gaussian_kernel_2d(radius: usize, sigma: f32) -> Result<Vec<f32>, FilterError> {
    let len = kernel_len(radius)?;
    // kernel_len bounds the side length, so the radius fits in isize
    let half = radius as isize;
    let sigma_sq = sigma * sigma;
    // the exponential is single precision, the scale double precision
    let scale = 2.0 * std::f64::consts::PI * f64::from(sigma) * f64::from(sigma);

    let mut kernel = Vec::new();
    kernel
        .try_reserve_exact(len)
        .map_err(|_| {
            FilterError::AllocationFailed(len.saturating_mul(std::mem::size_of::<f32>()))
        })?;
    for y in -half..=half {
        for x in -half..=half {
            let (x, y) = (x as f32, y as f32);
            let w = (-(x * x + y * y) / (2.0 * sigma_sq)).exp();
            kernel.push((f64::from(w) / scale) as f32);
        }
    }

    // normalize the kernel
    let norm = kernel.iter().sum::<f32>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    Ok(kernel)
}
