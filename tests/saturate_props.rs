use proptest::prelude::*;
use q10n::{round_and_saturate, saturate, saturate_wide};

proptest! {
    #[test]
    fn prop_saturate_i8_idempotent(x in any::<i32>()) {
        let once: i8 = saturate(x);
        prop_assert_eq!(saturate::<i8, i32>(once as i32), once);
    }

    #[test]
    fn prop_saturate_i32_idempotent_from_f64(x in any::<f64>()) {
        let once: i32 = saturate(x);
        prop_assert_eq!(saturate::<i32, f64>(once as f64), once);
    }

    #[test]
    fn prop_saturate_i32_idempotent_from_f32(x in any::<f32>()) {
        let once: i32 = saturate(x);
        prop_assert_eq!(saturate::<i32, f32>(once as f32), once);
    }

    #[test]
    fn prop_saturate_u8_matches_clamp(x in any::<i32>()) {
        let expected = x.clamp(0, 255) as u8;
        prop_assert_eq!(saturate::<u8, i32>(x), expected);
    }

    #[test]
    fn prop_saturate_f32_to_i8_bounds(x in -1.0e6f32..1.0e6) {
        let v: i8 = saturate(x);
        if x < -128.0 {
            prop_assert_eq!(v, i8::MIN);
        } else if x > 127.0 {
            prop_assert_eq!(v, i8::MAX);
        } else {
            prop_assert_eq!(v, x as i8);
        }
    }

    #[test]
    fn prop_saturate_wide_stays_within_bounds(
        x in any::<f64>().prop_filter("finite", |v| v.is_finite())
    ) {
        let v = saturate_wide::<u8>(x);
        prop_assert!((0.0..=255.0).contains(&v));
        if (0.0..=255.0).contains(&x) {
            prop_assert_eq!(v, x);
        }
    }

    #[test]
    fn prop_round_and_saturate_within_half_ulp(x in -127.0f32..127.0) {
        let v: i8 = round_and_saturate(x);
        prop_assert!(((v as f32) - x).abs() <= 0.5, "{} -> {}", x, v);
    }
}
