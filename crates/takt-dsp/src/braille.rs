//! Braille-bar spectrum rendering.

use std::ops::Range;

use takt_flow::{FlowResult, Node, Step};

use crate::block::Spectrum;
use crate::math::power_to_db;

/// Dot offsets for the left column of a braille cell, bottom-up.
const LEFT: [u32; 5] = [0, 0x40, 0x44, 0x46, 0x47];
/// Dot offsets for the right column of a braille cell, bottom-up.
const RIGHT: [u32; 5] = [0, 0x80, 0xa0, 0xb0, 0xb8];

/// Renders power spectra as a row of braille bars.
///
/// Each output character shows two frequency bands as 0–4 dot columns.
/// Bands are aligned to piano keys 1–88 so every octave gets the same
/// width; levels are dB on a 1e-5…1e6 display scale over 60 dB, decaying
/// by `decay` per step so the bars fall smoothly.
pub struct BrailleSpectrum {
    bands: Vec<Range<usize>>,
    levels: Vec<f32>,
    decay: f32,
    band_scale: f32,
}

impl BrailleSpectrum {
    /// A `length`-character display for spectra of `win`-sample frames
    /// at `samplerate`, with per-step decay `decay` (in level units,
    /// 0–4).
    pub fn new(length: usize, win: usize, samplerate: u32, decay: f32) -> Self {
        let df = f64::from(samplerate) / win as f64;
        let n_fft = win / 2 + 1;
        let edges: Vec<usize> = (0..=length * 2)
            .map(|i| {
                let key = 1.0 + 87.0 * i as f64 / (length * 2) as f64;
                let freq = 440.0 * 2.0f64.powf((key - 49.0) / 12.0);
                ((freq / df).round() as usize).min(n_fft - 1)
            })
            .collect();
        let bands = edges
            .windows(2)
            .map(|pair| pair[0]..(pair[1] + 1).min(n_fft))
            .collect();
        Self {
            bands,
            levels: vec![0.0; length * 2],
            decay,
            band_scale: samplerate as f32 / 2.0,
        }
    }
}

impl Node for BrailleSpectrum {
    type In = Spectrum;
    type Out = String;

    fn send(&mut self, input: Spectrum) -> FlowResult<Step<String>> {
        for (level, band) in self.levels.iter_mut().zip(self.bands.iter()) {
            let mean = input.band_power(band.clone()) / band.len() as f32;
            let loudness = power_to_db(mean * self.band_scale, (1e-5, 1e6)) / 60.0 * 4.0;
            *level = (*level - self.decay).max(loudness.min(4.0)).max(0.0);
        }
        let text = self
            .levels
            .chunks(2)
            .map(|pair| {
                let left = pair[0] as usize;
                let right = pair[1] as usize;
                char::from_u32(0x2800 + LEFT[left.min(4)] + RIGHT[right.min(4)])
                    .unwrap_or(' ')
            })
            .collect();
        Ok(Step::Yield(text))
    }
}
