//! Clamping accumulator values into the range of a storage type.
//!
//! Integral destinations compare against `lowest` then `max`, both
//! unconditionally, in the accumulator's own precision. Floating destinations
//! are a plain conversion. Integer pairs whose source range already fits in
//! the destination lower to a lossless conversion, and `u8 -> i8` /
//! `i8 -> u8` need only one comparison.

use half::{bf16, f16};

use crate::element::{Accumulator, Element};

/// Saturating conversion from an accumulator into the storage type `Out`.
pub trait SaturateInto<Out: Element>: Accumulator {
    fn saturate_into(self) -> Out;
}

/// Clamps `x` into `[Out::LOWEST, Out::MAX]` and converts it.
#[inline(always)]
pub fn saturate<Out: Element, Acc: SaturateInto<Out>>(x: Acc) -> Out {
    x.saturate_into()
}

/// Clamps `x` to the bounds of `Out` while staying in double precision.
///
/// For accumulators whose magnitude matters more than throughput; the result
/// is still an `f64` so the caller chooses when to narrow.
#[inline(always)]
pub fn saturate_wide<Out: Element>(x: f64) -> f64 {
    let mut v = x;
    if v < Out::LOWEST.to_f64() {
        v = Out::LOWEST.to_f64();
    }
    if v > Out::MAX.to_f64() {
        v = Out::MAX.to_f64();
    }
    v
}

/// Rounds in the floating domain, then saturates the rounded integer.
#[inline(always)]
pub fn round_and_saturate<Out: Element>(f: f32) -> Out {
    Out::round_and_saturate(f)
}

/// As [`round_and_saturate`], narrowing `d` to `f32` before rounding
/// (see [`crate::round::round_nearest_f64`]).
#[inline(always)]
pub fn round_and_saturate_f64<Out: Element>(d: f64) -> Out {
    Out::round_and_saturate(d as f32)
}

// Floating destinations absorb any accumulator.
impl<A: Accumulator> SaturateInto<f32> for A {
    #[inline(always)]
    fn saturate_into(self) -> f32 { self.to_f32() }
}

impl<A: Accumulator> SaturateInto<bf16> for A {
    #[inline(always)]
    fn saturate_into(self) -> bf16 { bf16::from_f64(self.to_f64()) }
}

impl<A: Accumulator> SaturateInto<f16> for A {
    #[inline(always)]
    fn saturate_into(self) -> f16 { f16::from_f64(self.to_f64()) }
}

/// Two-compare clamp performed in the accumulator type `$acc`.
macro_rules! clamp_in_acc {
    ($($acc:ty => $($out:ty),+;)+) => {$($(
        impl SaturateInto<$out> for $acc {
            #[inline(always)]
            fn saturate_into(self) -> $out {
                let mut v = self;
                if v < <$out>::MIN as $acc {
                    v = <$out>::MIN as $acc;
                }
                if v > <$out>::MAX as $acc {
                    v = <$out>::MAX as $acc;
                }
                v as $out
            }
        }
    )+)+};
}

clamp_in_acc! {
    i32 => i8, u8;
    f32 => i8, u8, i32;
    f64 => i8, u8, i32;
}

/// The 16-bit floats clamp after widening to `f32`, which holds them exactly.
macro_rules! clamp_in_f32 {
    ($($acc:ty),+) => {$(
        impl SaturateInto<i8> for $acc {
            #[inline(always)]
            fn saturate_into(self) -> i8 { saturate::<i8, f32>(self.to_f32()) }
        }
        impl SaturateInto<u8> for $acc {
            #[inline(always)]
            fn saturate_into(self) -> u8 { saturate::<u8, f32>(self.to_f32()) }
        }
        impl SaturateInto<i32> for $acc {
            #[inline(always)]
            fn saturate_into(self) -> i32 { saturate::<i32, f32>(self.to_f32()) }
        }
    )+};
}

clamp_in_f32!(bf16, f16);

/// Source range is contained in the destination range: no clamp at all.
macro_rules! subset_cast {
    ($($acc:ty => $($out:ty),+;)+) => {$($(
        impl SaturateInto<$out> for $acc {
            #[inline(always)]
            fn saturate_into(self) -> $out { <$out>::from(self) }
        }
    )+)+};
}

subset_cast! {
    i8 => i8, i32;
    u8 => u8, i32;
    i32 => i32;
}

impl SaturateInto<i8> for u8 {
    /// Unsigned sources are never below the lower bound.
    #[inline(always)]
    fn saturate_into(self) -> i8 {
        if self <= 127 { self as i8 } else { 127 }
    }
}

impl SaturateInto<u8> for i8 {
    /// Signed 8-bit sources are never above the upper bound.
    #[inline(always)]
    fn saturate_into(self) -> u8 {
        if self >= 0 { self as u8 } else { 0 }
    }
}
