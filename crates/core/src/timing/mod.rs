//! Interval measurement and real-time-clock bias correction.
//!
//! The microcontroller clock is stable but not accurate, so every measured
//! interval is corrected by a bias expressed in tenths of a second per day.
//! A day has 864 000 tenths of a second, which gives the correction
//! `interval * bias / 864_000`, rounded half up.

/// Tenths of a second in one day.
pub const DAY_TENTHS: i64 = 864_000;

/// Corrected intervals longer than this are sensor noise, not a beat.
pub const MAX_PLAUSIBLE_INTERVAL_US: i64 = 5_000_000;

/// Numerator bounding a single bias step in [`adjust_beat_duration`].
const STEP_NUMERATOR: i64 = 2_000_000_000;

/// Returns the rounded correction for `interval_us` at `tenths_per_day`.
///
/// The division floors, so negative products round half up exactly like
/// positive ones.
pub fn bias_correction(interval_us: i64, tenths_per_day: i64) -> i64 {
    let scaled = i128::from(tenths_per_day) * i128::from(interval_us) + i128::from(DAY_TENTHS / 2);
    let correction = scaled.div_euclid(i128::from(DAY_TENTHS));
    correction.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Applies the bias correction to a raw interval.
pub fn correct_interval(raw_us: i64, tenths_per_day: i64) -> i64 {
    raw_us.saturating_add(bias_correction(raw_us, tenths_per_day))
}

/// Measures the corrected interval between two passages.
///
/// Returns `None` when the sample is implausible: the clock moved backwards,
/// the correction went negative, or the result exceeds
/// [`MAX_PLAUSIBLE_INTERVAL_US`].
pub fn measure_interval(earlier_us: u64, later_us: u64, tenths_per_day: i64) -> Option<i64> {
    let raw = later_us.checked_sub(earlier_us)?;
    let raw = i64::try_from(raw).ok()?;
    let corrected = correct_interval(raw, tenths_per_day);
    (0..=MAX_PLAUSIBLE_INTERVAL_US)
        .contains(&corrected)
        .then_some(corrected)
}

/// Rescales `beat_us` so a clock counting these beats gains `incr` tenths of
/// a second per day.
///
/// Large adjustments are split into steps of at most
/// `2_000_000_000 / beat_us` tenths per day, each step compounding on the
/// duration produced by the previous one. Every step moves the beat by about
/// 2315 µs, and stepping stops once the beat leaves `0..=`
/// [`MAX_PLAUSIBLE_INTERVAL_US`], so the loop is bounded whatever `incr` is.
/// The result is clamped to that range.
pub fn adjust_beat_duration(beat_us: i64, incr: i64) -> i64 {
    let mut beat = beat_us.clamp(0, MAX_PLAUSIBLE_INTERVAL_US);
    let mut remaining = incr;
    while remaining != 0 && beat > 0 && beat <= MAX_PLAUSIBLE_INTERVAL_US {
        let max_step = STEP_NUMERATOR / beat;
        let step = remaining.clamp(-max_step, max_step);
        beat = correct_interval(beat, step);
        remaining -= step;
    }
    beat.clamp(0, MAX_PLAUSIBLE_INTERVAL_US)
}

/// Beats per minute for a single beat lasting `beat_us`.
pub fn beats_per_minute(beat_us: i64) -> f64 {
    if beat_us <= 0 {
        return 0.0;
    }
    60_000_000.0 / beat_us as f64
}
