use half::{bf16, f16};
use pretty_assertions::assert_eq;
use q10n::qz::Requantize;
use q10n::{saturate, AccumulateOnly, Affine, Coeffs, Element, IdentityScale, SaturateInto, ScaleOnly};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

fn signaling_nan() -> f32 {
    let v = f32::from_bits(0x7fa0_0000);
    assert!(v.is_nan());
    v
}

/// Inputs of every type drawn from one f32 distribution, plus the edges.
fn samples<In: Element>(n: usize) -> Vec<In>
where
    f32: SaturateInto<In>,
{
    let mut rng = SmallRng::seed_from_u64(0x0dd5_eed5);
    let mut out: Vec<In> = [-400.0f32, -128.5, -0.5, 0.0, 0.5, 127.5, 254.5, 400.0]
        .iter()
        .map(|&x| saturate::<In, f32>(x))
        .collect();
    for _ in 0..n {
        let x: f32 = rng.gen_range(-400.0..400.0);
        out.push(saturate::<In, f32>(x));
    }
    out
}

fn identity_matches_affine<In, Out>()
where
    In: Element + SaturateInto<Out>,
    Out: Element,
    f32: SaturateInto<In>,
{
    let id = IdentityScale::<In, Out>::new();
    let af = Affine::<In, Out>::new();
    for x in samples::<In>(500) {
        let want = af.call(x, Out::MAX, 1.0, 0.0);
        assert_eq!(id.call(x), want, "{:?}: input {}", id, x);
        assert_eq!(ScaleOnly::<In, Out>::new().call(x, 1.0), want, "scale-only {}", x);
        assert_eq!(AccumulateOnly::<In, Out>::new().call(x, Out::MAX, 0.0), want, "accumulate-only {}", x);
    }
}

macro_rules! all_pairs {
    ($f:ident; $($in:ty),+ => $outs:tt) => { $( all_pairs!(@row $f; $in => $outs); )+ };
    (@row $f:ident; $in:ty => [$($out:ty),+]) => { $( $f::<$in, $out>(); )+ };
}

#[test]
fn identity_scale_equals_trivial_affine_for_every_pair() {
    all_pairs!(identity_matches_affine; i8, u8, i32, f32, bf16, f16 => [i8, u8, i32, f32, bf16, f16]);
}

#[test]
fn identity_scale_integer_paths() {
    // subset: plain conversion
    assert_eq!(IdentityScale::<i8, i32>::new().call(-128), -128);
    assert_eq!(IdentityScale::<u8, i32>::new().call(255), 255);
    assert_eq!(IdentityScale::<i32, f32>::new().call(16_777_217), 16_777_216.0);
    // not a subset: saturated, never rounded
    assert_eq!(IdentityScale::<i32, i8>::new().call(1_000), 127);
    assert_eq!(IdentityScale::<i32, u8>::new().call(-1), 0);
    assert_eq!(IdentityScale::<u8, i8>::new().call(200), 127);
    assert_eq!(IdentityScale::<i8, u8>::new().call(-100), 0);
    // wide s32 values stay exact (no trip through f32)
    assert_eq!(IdentityScale::<i32, i32>::new().call(16_777_217), 16_777_217);
    // floating sources round
    assert_eq!(IdentityScale::<f32, i8>::new().call(2.5), 2);
    assert_eq!(IdentityScale::<bf16, u8>::new().call(bf16::from_f32(3.5)), 4);
}

#[test]
fn scale_only_float_destination_is_exact() {
    assert_eq!(ScaleOnly::<f32, f32>::new().call(3.0, 2.5), 7.5);
    assert_eq!(ScaleOnly::<f32, f32>::new().call(0.3, 0.1), 0.3f32 * 0.1f32);
    assert_eq!(ScaleOnly::<i32, f32>::new().call(3, 0.5), 1.5);
}

#[test]
fn scale_only_integer_destination_rounds_and_saturates() {
    assert_eq!(ScaleOnly::<i32, i8>::new().call(3, 2.5), 8);
    assert_eq!(ScaleOnly::<i32, i8>::new().call(5, 2.5), 12);
    assert_eq!(ScaleOnly::<i32, i8>::new().call(1_000, 0.5), 127);
    assert_eq!(ScaleOnly::<f32, u8>::new().call(-4.0, 0.25), 0);
}

#[test]
fn full_affine_scenario() {
    let qz = Affine::<i8, i8>::new();
    assert_eq!(qz.call(100, 50, 1.0, 0.5), 125);
    assert_eq!(qz.call(100, 100, 1.0, 0.5), 127);
    assert_eq!(qz.call(-100, -100, 1.0, 0.5), -128);
}

#[test]
fn accumulate_only_float_destination_returns_real_sum() {
    assert_eq!(AccumulateOnly::<i32, f32>::new().call(3, 0.25, 2.0), 3.5);
    assert_eq!(AccumulateOnly::<f32, f32>::new().call(0.1, 0.2, 1.0), 0.1f32 + 0.2f32);
}

#[test]
fn accumulate_only_integer_destination() {
    assert_eq!(AccumulateOnly::<i32, u8>::new().call(10, 5, 0.5), 12);
    assert_eq!(AccumulateOnly::<i32, u8>::new().call(10, 7, 0.5), 14);
    assert_eq!(AccumulateOnly::<i32, i8>::new().call(-120, 100, -1.0), -128);
}

#[test]
fn beta_zero_never_reads_previous_output() {
    let snan = signaling_nan();
    let acc = AccumulateOnly::<f32, f32>::new().call(1.5, snan, 0.0);
    assert_eq!(acc, 1.5);
    let af = Affine::<f32, f32>::new().call(1.5, snan, 2.0, 0.0);
    assert_eq!(af, 3.0);
    let bf = AccumulateOnly::<bf16, bf16>::new().call(bf16::ONE, bf16::NAN, 0.0);
    assert_eq!(bf, bf16::ONE);
    let inf = Affine::<i32, f16>::new().call(2, f16::INFINITY, 1.0, 0.0);
    assert_eq!(inf, f16::from_f32(2.0));

    let untouched = || -> i8 { panic!("previous output read with beta == 0") };
    assert_eq!(AccumulateOnly::<i32, i8>::new().call_with(5, untouched, 0.0), 5);
    assert_eq!(Affine::<i32, i8>::new().call_with(5, untouched, 3.0, 0.0), 15);
}

#[test]
fn nonzero_beta_propagates_non_finite_previous_output() {
    let out = Affine::<f32, f32>::new().call(1.0, f32::INFINITY, 1.0, 0.5);
    assert_eq!(out, f32::INFINITY);
    let out = AccumulateOnly::<f32, f32>::new().call(1.0, f32::NAN, 1.0);
    assert!(out.is_nan());
}

#[test]
fn sixteen_bit_destinations_convert_only_at_the_boundary() {
    // (1 + 2^-7)^2 = 1 + 2^-6 + 2^-14. Stored as bf16 the product would lose
    // the 2^-14 term and the difference below would be 0.
    let input = bf16::from_f32(1.0 + 2f32.powi(-7));
    let prev = bf16::from_f32(1.0 + 2f32.powi(-6));
    let out = Affine::<bf16, bf16>::new().call(input, prev, 1.0 + 2f32.powi(-7), -1.0);
    assert_eq!(out, bf16::from_f32(2f32.powi(-14)));
    assert_ne!(out, bf16::ZERO);

    let out = Affine::<f32, bf16>::new().call(3.0, bf16::from_f32(2.0), 0.5, 0.25);
    assert_eq!(out, bf16::from_f32(2.0));
    let out = Affine::<f16, f16>::new().call(f16::from_f32(1.5), f16::from_f32(4.0), 2.0, 0.5);
    assert_eq!(out, f16::from_f32(5.0));
    let out = Affine::<f32, f16>::new().call(1.0e5, f16::ZERO, 1.0, 0.0);
    assert_eq!(out, f16::INFINITY);
}

#[test]
fn sixteen_bit_accumulation_keeps_fractions() {
    // Repeated accumulation into a floating destination never rounds to an
    // integer, unlike an integral destination.
    let qz = AccumulateOnly::<f32, f16>::new();
    let mut dst = f16::ZERO;
    for _ in 0..4 {
        qz.store(0.25, &mut dst, 1.0);
    }
    assert_eq!(dst, f16::ONE);

    let qz = AccumulateOnly::<f32, i8>::new();
    let mut dst = 0i8;
    for _ in 0..4 {
        qz.store(0.25, &mut dst, 1.0);
    }
    assert_eq!(dst, 0);
}

fn apply_through_trait<Q: Requantize<i32, i8>>(q: &Q, c: Coeffs) -> i8 {
    q.apply(40, || 10, c)
}

#[test]
fn requantize_trait_dispatches_statically() {
    let c = Coeffs::new(0.5, 2.0);
    assert_eq!(apply_through_trait(&Affine::new(), c), 40);
    assert_eq!(apply_through_trait(&AccumulateOnly::new(), Coeffs::new(1.0, 2.0)), 60);
    assert_eq!(apply_through_trait(&ScaleOnly::new(), Coeffs::new(0.5, 0.0)), 20);
    assert_eq!(apply_through_trait(&IdentityScale::new(), Coeffs::default()), 40);
    assert_eq!(<Affine<i32, i8> as Requantize<i32, i8>>::SHAPE, c.shape());
}
