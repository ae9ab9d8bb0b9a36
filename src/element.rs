//! Element and accumulator types the kernels are instantiated with.
//!
//! Both traits are sealed: the operator family is exact only for the closed
//! set of types below, and every type-dependent decision is made through the
//! associated constants so it folds away after monomorphization.

use std::fmt;

use half::{bf16, f16};

use crate::dtype::Dtype;
use crate::round::round_nearest;
use crate::saturate::saturate;

mod sealed {
    pub trait Sealed {}
    impl Sealed for i8 {}
    impl Sealed for u8 {}
    impl Sealed for i32 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for half::bf16 {}
    impl Sealed for half::f16 {}
}

/// A value a compute kernel accumulates in before it is written out.
pub trait Accumulator:
    sealed::Sealed + Copy + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    fn to_f32(self) -> f32;
    fn to_f64(self) -> f64;
}

/// A storage type the kernels can quantize into.
pub trait Element: Accumulator {
    const DTYPE: Dtype;
    const IS_INTEGRAL: bool = Self::DTYPE.is_integral();
    const LOWEST: Self;
    const MAX: Self;

    /// Round `v` to the nearest integer under the active rounding mode and
    /// clamp into range; floating types take `v` as is.
    fn round_and_saturate(v: f32) -> Self;
}

/// Static subset predicate between two element types.
#[inline(always)]
pub const fn is_subset<A: Element, B: Element>() -> bool {
    A::DTYPE.is_subset(B::DTYPE)
}

macro_rules! primitive_accumulator {
    ($($t:ty),+) => {$(
        impl Accumulator for $t {
            #[inline(always)]
            fn to_f32(self) -> f32 { self as f32 }
            #[inline(always)]
            fn to_f64(self) -> f64 { self as f64 }
        }
    )+};
}

primitive_accumulator!(i8, u8, i32, f32, f64);

macro_rules! half_accumulator {
    ($($t:ty),+) => {$(
        impl Accumulator for $t {
            #[inline(always)]
            fn to_f32(self) -> f32 { <$t>::to_f32(self) }
            #[inline(always)]
            fn to_f64(self) -> f64 { <$t>::to_f64(self) }
        }
    )+};
}

half_accumulator!(bf16, f16);

macro_rules! integral_element {
    ($($t:ty => $dt:ident),+) => {$(
        impl Element for $t {
            const DTYPE: Dtype = Dtype::$dt;
            const LOWEST: Self = <$t>::MIN;
            const MAX: Self = <$t>::MAX;

            #[inline(always)]
            fn round_and_saturate(v: f32) -> Self {
                saturate::<$t, i32>(round_nearest(v))
            }
        }
    )+};
}

integral_element!(i8 => S8, u8 => U8, i32 => S32);

impl Element for f32 {
    const DTYPE: Dtype = Dtype::F32;
    const LOWEST: Self = f32::MIN;
    const MAX: Self = f32::MAX;

    #[inline(always)]
    fn round_and_saturate(v: f32) -> Self { v }
}

impl Element for bf16 {
    const DTYPE: Dtype = Dtype::BF16;
    const LOWEST: Self = bf16::MIN;
    const MAX: Self = bf16::MAX;

    #[inline(always)]
    fn round_and_saturate(v: f32) -> Self { bf16::from_f32(v) }
}

impl Element for f16 {
    const DTYPE: Dtype = Dtype::F16;
    const LOWEST: Self = f16::MIN;
    const MAX: Self = f16::MAX;

    #[inline(always)]
    fn round_and_saturate(v: f32) -> Self { f16::from_f32(v) }
}
