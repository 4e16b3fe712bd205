//! Small signal generators.

use std::f32::consts::PI;

use crate::block::AudioBlock;

/// An exponentially decaying sine click.
///
/// `amplitude · 2^(−t/decay_time) · sin(2π·freq·t)` over `length` seconds
/// (defaults to `decay_time`), mono. Used for speaker tests and as the
/// shape of the built-in note sounds.
pub fn pulse(
    samplerate: u32,
    freq: f32,
    decay_time: f32,
    amplitude: f32,
    length: Option<f32>,
) -> AudioBlock {
    let length = length.unwrap_or(decay_time);
    let frames = (length * samplerate as f32) as usize;
    let data = (0..frames)
        .map(|i| {
            let t = i as f32 / samplerate as f32;
            amplitude * 2.0f32.powf(-t / decay_time) * (2.0 * PI * freq * t).sin()
        })
        .collect();
    AudioBlock::new(data, 1)
}
