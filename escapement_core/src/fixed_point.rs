//! Integer helpers for microsecond beat arithmetic and ×256 temperatures.
//!
//! Beat durations are `i64` microseconds; temperatures are °C × 256 as reported
//! by the sensor. Clock bias is in tenths of a second per day, so a bias `b`
//! scales a duration by `b / 864_000`.

pub use escapement_traits::{c256_to_celsius, celsius_to_c256};

/// Tenths of a second in one day.
pub const BIAS_DENOMINATOR: i64 = 864_000;

/// Divide rounding to nearest, ties away from zero. `den` must be positive.
/// Uses 128-bit intermediates; results are clamped to the `i64` range.
#[inline]
pub fn div_round_nearest_i64(num: i128, den: i128) -> i64 {
    debug_assert!(den > 0);
    let half = den / 2;
    let q = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    q.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Apply reference-clock bias to a raw interval.
///
/// `raw + round(bias * raw / 864000)`; a zero bias is the identity.
#[inline]
pub fn correct_for_bias(raw_us: i64, bias: i32) -> i64 {
    let correction = div_round_nearest_i64(
        i128::from(bias) * i128::from(raw_us),
        i128::from(BIAS_DENOMINATOR),
    );
    raw_us.saturating_add(correction)
}

/// Change in a beat of `beat_us` that shifts the day by `tenths` tenths of a second.
#[inline]
pub fn tenths_per_day_to_us(beat_us: i64, tenths: i32) -> i64 {
    div_round_nearest_i64(
        i128::from(beat_us) * i128::from(tenths),
        i128::from(BIAS_DENOMINATOR),
    )
}

/// Round an `f64` to the nearest `i64`, saturating; non-finite values map to 0.
#[inline]
pub fn round_to_i64(x: f64) -> i64 {
    if !x.is_finite() {
        return 0;
    }
    let r = x.round();
    if r >= i64::MAX as f64 {
        i64::MAX
    } else if r <= i64::MIN as f64 {
        i64::MIN
    } else {
        r as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rounding_ties_away_from_zero() {
        assert_eq!(div_round_nearest_i64(5, 2), 3);
        assert_eq!(div_round_nearest_i64(-5, 2), -3);
        assert_eq!(div_round_nearest_i64(4, 3), 1);
        assert_eq!(div_round_nearest_i64(-4, 3), -1);
    }

    #[test]
    fn bias_correction_examples() {
        // one part in a thousand; 499.5 rounds away from zero
        assert_eq!(correct_for_bias(499_500, 864), 500_000);
        assert_eq!(correct_for_bias(500_000, -864), 499_500);
        // one tenth of a second per day on a half-second beat
        assert_eq!(correct_for_bias(500_000, 1), 500_001);
    }

    #[test]
    fn tenths_per_day_on_half_second_beat() {
        // 864000 tenths/day on a 0.5s beat is exactly one beat
        assert_eq!(tenths_per_day_to_us(500_000, 864_000), 500_000);
        assert_eq!(tenths_per_day_to_us(500_000, 10), 6);
        assert_eq!(tenths_per_day_to_us(500_000, -10), -6);
    }

    #[test]
    fn round_to_i64_handles_non_finite() {
        assert_eq!(round_to_i64(f64::NAN), 0);
        assert_eq!(round_to_i64(f64::INFINITY), 0);
        assert_eq!(round_to_i64(1e30), i64::MAX);
        assert_eq!(round_to_i64(-2.5), -3);
    }

    #[test]
    fn temperature_conversions() {
        assert_eq!(celsius_to_c256(21.5), 5504);
        assert!((c256_to_celsius(5504) - 21.5).abs() < 1e-6);
        assert_eq!(celsius_to_c256(-0.5), -128);
    }

    proptest! {
        #[test]
        fn zero_bias_is_identity(raw in 0i64..10_000_000) {
            prop_assert_eq!(correct_for_bias(raw, 0), raw);
        }

        #[test]
        fn correction_is_close_to_exact(raw in 1i64..5_000_000, bias in -100_000i32..100_000) {
            let exact = raw as f64 * (1.0 + f64::from(bias) / 864_000.0);
            let got = correct_for_bias(raw, bias) as f64;
            prop_assert!((got - exact).abs() <= 0.5 + 1e-6);
        }
    }
}
