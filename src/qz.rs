//! The quantization operator family.
//!
//! Four zero-sized operators, one per coefficient shape a call site can know
//! statically:
//!
//! | operator           | result                                       |
//! |--------------------|----------------------------------------------|
//! | [`IdentityScale`]  | `round_sat(in)`                              |
//! | [`ScaleOnly`]      | `round_sat(alpha * in)`                      |
//! | [`AccumulateOnly`] | `round_sat(in + beta * prev)`                |
//! | [`Affine`]         | `round_sat(alpha * in + beta * prev)`        |
//!
//! Arithmetic is done in `f32`. Integral outputs are rounded under the active
//! rounding mode and then saturated; floating outputs keep the real value and
//! only convert at the storage boundary.
//!
//! The previous output is read only when `beta != 0`. `0 * NaN` and `0 * inf`
//! are NaN, so a stale or uninitialized destination must never reach the
//! multiply. Operators that take a previous output require an initialized
//! `Out` (or a closure producing one); only the operators without one can
//! write through `MaybeUninit`.

use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;

use serde::{Deserialize, Serialize};

use crate::element::{is_subset, Element};
use crate::saturate::SaturateInto;

/// Scale and feedback weight of `out = alpha * in + beta * prev`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coeffs {
    pub alpha: f32,
    pub beta: f32,
}

impl Default for Coeffs {
    fn default() -> Self { Self { alpha: 1.0, beta: 0.0 } }
}

impl Coeffs {
    pub fn new(alpha: f32, beta: f32) -> Self { Self { alpha, beta } }

    /// The cheapest operator shape these coefficients admit.
    pub fn shape(&self) -> CoeffShape {
        match (self.alpha == 1.0, self.beta == 0.0) {
            (true, true) => CoeffShape::IdentityScale,
            (false, true) => CoeffShape::ScaleOnly,
            (true, false) => CoeffShape::AccumulateOnly,
            (false, false) => CoeffShape::Affine,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoeffShape {
    /// alpha = 1, beta = 0
    IdentityScale,
    /// beta = 0
    ScaleOnly,
    /// alpha = 1
    AccumulateOnly,
    Affine,
}

impl CoeffShape {
    /// Whether an operator of this shape computes the right result for `c`.
    pub fn admits(self, c: Coeffs) -> bool {
        match self {
            CoeffShape::IdentityScale => c.alpha == 1.0 && c.beta == 0.0,
            CoeffShape::ScaleOnly => c.beta == 0.0,
            CoeffShape::AccumulateOnly => c.alpha == 1.0,
            CoeffShape::Affine => true,
        }
    }

    /// Whether operators of this shape read a previous output.
    pub const fn reads_prev(self) -> bool {
        matches!(self, CoeffShape::AccumulateOnly | CoeffShape::Affine)
    }

    pub const fn name(self) -> &'static str {
        match self {
            CoeffShape::IdentityScale => "identity_scale",
            CoeffShape::ScaleOnly => "scale_only",
            CoeffShape::AccumulateOnly => "accumulate_only",
            CoeffShape::Affine => "affine",
        }
    }
}

impl fmt::Display for CoeffShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// Uniform entry point over the four operators.
///
/// Coefficients an operator assumes trivial are ignored, so callers must pick
/// an operator whose [`CoeffShape`] admits `coeffs`. `prev` is invoked at most
/// once and only if the operator reads a previous output and `beta != 0`.
pub trait Requantize<In: Element, Out: Element> {
    const SHAPE: CoeffShape;

    fn apply(&self, input: In, prev: impl FnOnce() -> Out, coeffs: Coeffs) -> Out;
}

#[inline(always)]
fn feedback<Out: Element>(beta: f32, prev: impl FnOnce() -> Out) -> f32 {
    if beta != 0.0 { beta * prev().to_f32() } else { 0.0 }
}

macro_rules! operator {
    ($($(#[$meta:meta])* $name:ident;)+) => {$(
        $(#[$meta])*
        pub struct $name<In, Out>(PhantomData<fn(In) -> Out>);

        impl<In, Out> $name<In, Out> {
            #[inline(always)]
            pub const fn new() -> Self { Self(PhantomData) }
        }

        impl<In, Out> Default for $name<In, Out> {
            fn default() -> Self { Self::new() }
        }

        impl<In, Out> Clone for $name<In, Out> {
            fn clone(&self) -> Self { *self }
        }

        impl<In, Out> Copy for $name<In, Out> {}

        impl<In, Out> fmt::Debug for $name<In, Out> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "{}<{}, {}>",
                    stringify!($name),
                    std::any::type_name::<In>(),
                    std::any::type_name::<Out>()
                )
            }
        }
    )+};
}

operator! {
    /// `alpha == 1`, `beta == 0`.
    ///
    /// Subset pairs are a plain conversion; other integral sources are
    /// saturated without a rounding pass; floating sources are rounded and
    /// saturated.
    IdentityScale;
    /// `beta == 0`.
    ScaleOnly;
    /// `alpha == 1`.
    AccumulateOnly;
    /// General `alpha`, `beta`.
    Affine;
}

impl<In: Element + SaturateInto<Out>, Out: Element> IdentityScale<In, Out> {
    #[inline(always)]
    pub fn call(&self, input: In) -> Out {
        if is_subset::<In, Out>() || In::IS_INTEGRAL {
            input.saturate_into()
        } else {
            Out::round_and_saturate(input.to_f32())
        }
    }

    /// Writes into a destination that may be uninitialized.
    #[inline(always)]
    pub fn store_uninit<'a>(&self, input: In, dst: &'a mut MaybeUninit<Out>) -> &'a mut Out {
        dst.write(self.call(input))
    }
}

impl<In: Element, Out: Element> ScaleOnly<In, Out> {
    #[inline(always)]
    pub fn call(&self, input: In, alpha: f32) -> Out {
        Out::round_and_saturate(alpha * input.to_f32())
    }

    /// Writes into a destination that may be uninitialized.
    #[inline(always)]
    pub fn store_uninit<'a>(&self, input: In, dst: &'a mut MaybeUninit<Out>, alpha: f32) -> &'a mut Out {
        dst.write(self.call(input, alpha))
    }
}

impl<In: Element, Out: Element> AccumulateOnly<In, Out> {
    #[inline(always)]
    pub fn call(&self, input: In, prev: Out, beta: f32) -> Out {
        self.call_with(input, || prev, beta)
    }

    /// `prev` is evaluated only when `beta != 0`.
    #[inline(always)]
    pub fn call_with(&self, input: In, prev: impl FnOnce() -> Out, beta: f32) -> Out {
        Out::round_and_saturate(input.to_f32() + feedback(beta, prev))
    }

    /// Accumulates into `dst` in place.
    #[inline(always)]
    pub fn store(&self, input: In, dst: &mut Out, beta: f32) {
        let v = self.call_with(input, || *dst, beta);
        *dst = v;
    }
}

impl<In: Element, Out: Element> Affine<In, Out> {
    #[inline(always)]
    pub fn call(&self, input: In, prev: Out, alpha: f32, beta: f32) -> Out {
        self.call_with(input, || prev, alpha, beta)
    }

    /// `prev` is evaluated only when `beta != 0`.
    #[inline(always)]
    pub fn call_with(&self, input: In, prev: impl FnOnce() -> Out, alpha: f32, beta: f32) -> Out {
        Out::round_and_saturate(alpha * input.to_f32() + feedback(beta, prev))
    }

    /// Accumulates into `dst` in place.
    #[inline(always)]
    pub fn store(&self, input: In, dst: &mut Out, alpha: f32, beta: f32) {
        let v = self.call_with(input, || *dst, alpha, beta);
        *dst = v;
    }
}

impl<In: Element + SaturateInto<Out>, Out: Element> Requantize<In, Out> for IdentityScale<In, Out> {
    const SHAPE: CoeffShape = CoeffShape::IdentityScale;

    #[inline(always)]
    fn apply(&self, input: In, _prev: impl FnOnce() -> Out, _coeffs: Coeffs) -> Out {
        self.call(input)
    }
}

impl<In: Element, Out: Element> Requantize<In, Out> for ScaleOnly<In, Out> {
    const SHAPE: CoeffShape = CoeffShape::ScaleOnly;

    #[inline(always)]
    fn apply(&self, input: In, _prev: impl FnOnce() -> Out, coeffs: Coeffs) -> Out {
        self.call(input, coeffs.alpha)
    }
}

impl<In: Element, Out: Element> Requantize<In, Out> for AccumulateOnly<In, Out> {
    const SHAPE: CoeffShape = CoeffShape::AccumulateOnly;

    #[inline(always)]
    fn apply(&self, input: In, prev: impl FnOnce() -> Out, coeffs: Coeffs) -> Out {
        self.call_with(input, prev, coeffs.beta)
    }
}

impl<In: Element, Out: Element> Requantize<In, Out> for Affine<In, Out> {
    const SHAPE: CoeffShape = CoeffShape::Affine;

    #[inline(always)]
    fn apply(&self, input: In, prev: impl FnOnce() -> Out, coeffs: Coeffs) -> Out {
        self.call_with(input, prev, coeffs.alpha, coeffs.beta)
    }
}
