//! Float-to-integer rounding under the processor's active rounding mode.
//!
//! On x86_64 this is a single `cvtss2si`, which rounds according to MXCSR
//! (round-to-nearest-even unless a caller switched it, see [`crate::fpenv`]).
//! Everywhere else, or with the `portable-round` feature, the portable path is
//! used instead. The portable path is an approximation: it always rounds
//! half-to-even whatever mode is configured, saturates out-of-range inputs and
//! maps NaN to 0, where `cvtss2si` returns `i32::MIN` for all three.

use serde::Serialize;

/// Which rounding implementation this build uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingBackend {
    /// Native instruction honoring the rounding-control register.
    Hardware,
    /// Software round-half-to-even.
    Portable,
}

#[cfg(all(target_arch = "x86_64", not(feature = "portable-round")))]
pub const BACKEND: RoundingBackend = RoundingBackend::Hardware;
#[cfg(not(all(target_arch = "x86_64", not(feature = "portable-round"))))]
pub const BACKEND: RoundingBackend = RoundingBackend::Portable;

/// Rounds `f` to an integer according to the MXCSR rounding mode.
#[cfg(all(target_arch = "x86_64", not(feature = "portable-round")))]
#[inline(always)]
pub fn round_nearest(f: f32) -> i32 {
    hardware::round_nearest(f)
}

/// Rounds `f` half-to-even; the active rounding mode is not consulted.
#[cfg(not(all(target_arch = "x86_64", not(feature = "portable-round"))))]
#[inline(always)]
pub fn round_nearest(f: f32) -> i32 {
    portable::round_nearest(f)
}

/// Rounds a double by first narrowing it to `f32`.
///
/// Large or finely fractional doubles can round differently than they would
/// at full precision. This keeps the double path on the same instruction as
/// the single path and is accepted as a known approximation.
#[inline(always)]
pub fn round_nearest_f64(d: f64) -> i32 {
    round_nearest(d as f32)
}

#[cfg(target_arch = "x86_64")]
pub mod hardware {
    use std::arch::x86_64::{_mm_cvtss_si32, _mm_set_ss};

    /// `cvtss2si`: rounds per MXCSR; NaN, infinities and values outside the
    /// `i32` range give `i32::MIN`.
    #[inline(always)]
    #[allow(unused_unsafe)]
    pub fn round_nearest(f: f32) -> i32 {
        // SSE is part of the x86_64 baseline
        unsafe { _mm_cvtss_si32(_mm_set_ss(f)) }
    }
}

pub mod portable {
    /// `nearbyintf` under the default environment, then a saturating cast.
    #[inline(always)]
    pub fn round_nearest(f: f32) -> i32 {
        f.round_ties_even() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_go_to_even() {
        assert_eq!(portable::round_nearest(0.5), 0);
        assert_eq!(portable::round_nearest(1.5), 2);
        assert_eq!(portable::round_nearest(2.5), 2);
        assert_eq!(portable::round_nearest(-2.5), -2);
        assert_eq!(portable::round_nearest(-3.5), -4);
    }

    #[test]
    fn portable_saturates_and_zeroes_nan() {
        assert_eq!(portable::round_nearest(f32::NAN), 0);
        assert_eq!(portable::round_nearest(f32::INFINITY), i32::MAX);
        assert_eq!(portable::round_nearest(-1e20), i32::MIN);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn hardware_out_of_range_is_integer_indefinite() {
        use std::hint::black_box;
        assert_eq!(hardware::round_nearest(black_box(f32::NAN)), i32::MIN);
        assert_eq!(hardware::round_nearest(black_box(f32::INFINITY)), i32::MIN);
        assert_eq!(hardware::round_nearest(black_box(3e9)), i32::MIN);
    }
}
