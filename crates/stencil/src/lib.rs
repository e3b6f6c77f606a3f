#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use stencil_image as image;

#[doc(inline)]
pub use stencil_imgproc as imgproc;

#[doc(inline)]
pub use stencil_dist as dist;

#[doc(inline)]
pub use stencil_io as io;
