use crate::{error::FilterError, kernels::Kernel};

/// Default gaussian sigma.
pub const DEFAULT_SIGMA: f32 = 0.85;

#[cfg(feature = "serde")]
fn default_sigma() -> f32 {
    DEFAULT_SIGMA
}

/// Stencil selection as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "family", rename_all = "snake_case"))]
pub enum StencilSpec {
    /// Normalized gaussian blur.
    Gaussian {
        /// Standard deviation of the gaussian.
        #[cfg_attr(feature = "serde", serde(default = "default_sigma"))]
        sigma: f32,
    },
    /// 3x3 mean blur.
    Mean,
    /// 3x3 sharpening.
    Sharpen,
    /// 3x3 laplacian.
    Laplacian,
    /// Sobel gradient magnitude.
    Sobel,
    /// Diagonal emboss.
    Emboss,
}

impl StencilSpec {
    /// Parse a stencil family by name.
    ///
    /// # Arguments
    ///
    /// * `family` - One of `gaussian`, `mean`, `sharpen`, `laplacian`, `sobel`, `emboss`.
    /// * `sigma` - The gaussian sigma; ignored by the other families.
    pub fn from_family(family: &str, sigma: Option<f32>) -> Result<Self, FilterError> {
        let spec = match family.to_lowercase().as_str() {
            "gaussian" | "smooth" | "blur" => StencilSpec::Gaussian {
                sigma: sigma.unwrap_or(DEFAULT_SIGMA),
            },
            "mean" | "box" => StencilSpec::Mean,
            "sharpen" => StencilSpec::Sharpen,
            "laplacian" => StencilSpec::Laplacian,
            "sobel" | "edge" => StencilSpec::Sobel,
            "emboss" => StencilSpec::Emboss,
            _ => {
                return Err(FilterError::InvalidParameter(format!(
                    "unknown stencil family: {family}"
                )))
            }
        };
        Ok(spec)
    }

    /// The family name.
    pub fn name(&self) -> &'static str {
        match self {
            StencilSpec::Gaussian { .. } => "gaussian",
            StencilSpec::Mean => "mean",
            StencilSpec::Sharpen => "sharpen",
            StencilSpec::Laplacian => "laplacian",
            StencilSpec::Sobel => "sobel",
            StencilSpec::Emboss => "emboss",
        }
    }
}

impl std::fmt::Display for StencilSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StencilSpec::Gaussian { sigma } => write!(f, "gaussian(sigma={sigma})"),
            other => f.write_str(other.name()),
        }
    }
}

/// A stencil ready to be applied: the convolution body plus its kernels.
#[derive(Debug, Clone, PartialEq)]
pub enum Stencil {
    /// Weighted sum of the neighbourhood with a single kernel.
    Weighted(Kernel),
    /// Per channel gradient magnitude `sqrt(gx^2 + gy^2)` of two kernels.
    Gradient {
        /// Kernel for the horizontal derivative.
        kernel_x: Kernel,
        /// Kernel for the vertical derivative.
        kernel_y: Kernel,
    },
    /// Difference against the upper-left neighbour, neutral 128 on the first row and column.
    Emboss,
}

impl Stencil {
    /// Build the stencil for the given selection.
    ///
    /// Identical selections always produce identical stencils.
    pub fn new(spec: &StencilSpec) -> Result<Self, FilterError> {
        let stencil = match *spec {
            StencilSpec::Gaussian { sigma } => Stencil::Weighted(Kernel::gaussian(sigma)?),
            StencilSpec::Mean => Stencil::Weighted(Kernel::mean()),
            StencilSpec::Sharpen => Stencil::Weighted(Kernel::sharpen()),
            StencilSpec::Laplacian => Stencil::Weighted(Kernel::laplacian()),
            StencilSpec::Sobel => Stencil::Gradient {
                kernel_x: Kernel::sobel_x(),
                kernel_y: Kernel::sobel_y(),
            },
            StencilSpec::Emboss => Stencil::Emboss,
        };
        Ok(stencil)
    }

    /// Number of neighbouring rows needed on each side of an output row.
    pub fn radius(&self) -> usize {
        match self {
            Stencil::Weighted(kernel) => kernel.radius(),
            Stencil::Gradient { kernel_x, kernel_y } => kernel_x.radius().max(kernel_y.radius()),
            Stencil::Emboss => 1,
        }
    }
}
