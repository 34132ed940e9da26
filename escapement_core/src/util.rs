//! Rate helpers shared by the controller and the CLI.

/// Microseconds in one minute.
pub const MICROS_PER_MINUTE: f64 = 60_000_000.0;

/// Beats per minute for a beat of `duration_us` microseconds; 0 when the
/// duration is not positive.
#[inline]
pub fn bpm(duration_us: f64) -> f32 {
    if !(duration_us.is_finite() && duration_us > 0.0) {
        return 0.0;
    }
    (MICROS_PER_MINUTE / duration_us) as f32
}
