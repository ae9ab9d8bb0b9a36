// Saturating quantization kernels: rounding primitive, saturation layer and
// the four alpha/beta operator shapes, all resolved at compile time.
pub mod dtype;
pub mod element;
pub mod round;
pub mod saturate;
pub mod qz;
pub mod fpenv;

// Re-exports for kernel call sites
pub use dtype::Dtype;
pub use element::{is_subset, Accumulator, Element};
pub use qz::{AccumulateOnly, Affine, CoeffShape, Coeffs, IdentityScale, Requantize, ScaleOnly};
pub use round::{round_nearest, round_nearest_f64};
pub use saturate::{round_and_saturate, round_and_saturate_f64, saturate, saturate_wide, SaturateInto};
