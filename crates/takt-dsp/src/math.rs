//! Level conversions.

/// Convert a power value to decibels on a clamped display scale.
///
/// The power is scaled by `scale.1` and floored at `scale.0` before the
/// log, matching the meter range used by the spectrum widget
/// (default 1e-5 … 1e6).
pub fn power_to_db(power: f32, scale: (f32, f32)) -> f32 {
    10.0 * (power * scale.1).max(scale.0).log10()
}

/// Convert decibels to a linear amplitude factor.
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}
