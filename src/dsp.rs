//! Portable vector helpers for the render path
//!
//! Plain-slice loops the optimizer vectorizes on every target. Nothing here
//! allocates, so all of it is callable from the render callback.

/// Lowest level reported by meters (dB)
pub const METER_FLOOR_DB: f32 = -80.0;

/// Stateless vector operations over `f32` sample slices
pub struct Dsp;

impl Dsp {
    /// Mix with a gain factor: out = out + (input * gain)
    #[inline]
    pub fn mix_add(input: &[f32], gain: f32, output: &mut [f32]) {
        for (o, &i) in output.iter_mut().zip(input) {
            *o += i * gain;
        }
    }

    /// Apply gain in-place: buf = buf * gain
    #[inline]
    pub fn apply_gain(buf: &mut [f32], gain: f32) {
        for s in buf.iter_mut() {
            *s *= gain;
        }
    }

    /// Apply a linear gain ramp in-place, from `start` towards `end` over the slice
    #[inline]
    pub fn apply_gain_ramp(buf: &mut [f32], start: f32, end: f32) {
        if buf.is_empty() {
            return;
        }
        if (start - end).abs() < f32::EPSILON {
            Self::apply_gain(buf, end);
            return;
        }
        let step = (end - start) / buf.len() as f32;
        let mut gain = start;
        for s in buf.iter_mut() {
            gain += step;
            *s *= gain;
        }
    }

    /// Fill with zeros
    #[inline]
    pub fn clear(buf: &mut [f32]) {
        buf.fill(0.0);
    }

    /// Root mean square of a buffer
    #[inline]
    pub fn rms(buf: &[f32]) -> f32 {
        if buf.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = buf.iter().map(|s| s * s).sum();
        (sum_sq / buf.len() as f32).sqrt()
    }

    /// Maximum absolute value of a buffer
    #[inline]
    pub fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    /// Convert linear amplitude to dB (with -infinity handling)
    #[inline]
    pub fn to_db(linear: f32) -> f32 {
        if linear <= 0.0 {
            -f32::INFINITY
        } else {
            20.0 * linear.log10()
        }
    }

    /// Linear amplitude to dB, floored at [`METER_FLOOR_DB`]
    #[inline]
    pub fn to_meter_db(linear: f32) -> f32 {
        let db = Self::to_db(linear);
        if db.is_nan() || db < METER_FLOOR_DB {
            METER_FLOOR_DB
        } else {
            db
        }
    }
}
