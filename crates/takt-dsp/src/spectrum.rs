//! Windowed power spectrum node.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use takt_flow::{FlowResult, Lifecycle, Node, Step};

use crate::block::{AudioBlock, Spectrum};
use crate::window::{WindowKind, a_weight};

/// Maps a `win`-frame block to its one-sided power spectrum.
///
/// The spectrum is scaled by `weighting · 2/(win · samplerate)` so that
/// without weighting the Parseval-style invariant
/// `Σ J · df ≈ mean(x²)` holds, with `df = samplerate / win`.
pub struct PowerSpectrum {
    win: usize,
    channels: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Per-bin weighting with the `2/(win·sr)` scale folded in.
    weight: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    life: Lifecycle,
}

impl PowerSpectrum {
    /// A power spectrum over `win`-frame blocks.
    ///
    /// `window` selects the analysis window; `weighted` applies the
    /// A-weighting curve on top of the energy normalisation.
    pub fn new(
        win: usize,
        samplerate: u32,
        channels: usize,
        window: WindowKind,
        weighted: bool,
    ) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(win);

        let scale = 2.0 / (win as f32 * samplerate as f32);
        let bins = win / 2 + 1;
        let weight = if weighted {
            a_weight(samplerate, win).iter().map(|w| w * scale).collect()
        } else {
            vec![scale; bins]
        };

        Self {
            win,
            channels,
            fft,
            window: window.coefficients(win),
            weight,
            scratch: vec![Complex::new(0.0, 0.0); win],
            life: Lifecycle::new(),
        }
    }

    /// Number of one-sided bins produced.
    pub fn bins(&self) -> usize {
        self.win / 2 + 1
    }
}

impl Node for PowerSpectrum {
    type In = AudioBlock;
    type Out = Spectrum;

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()
    }

    fn send(&mut self, input: AudioBlock) -> FlowResult<Step<Spectrum>> {
        self.life.running()?;
        debug_assert_eq!(input.frames(), self.win);
        debug_assert_eq!(input.channels(), self.channels);

        let bins = self.bins();
        let mut out = Spectrum::zeros(bins, self.channels);
        for c in 0..self.channels {
            for (i, slot) in self.scratch.iter_mut().enumerate() {
                *slot = Complex::new(input.sample(i, c) * self.window[i], 0.0);
            }
            self.fft.process(&mut self.scratch);
            for k in 0..bins {
                out.values_mut()[k * self.channels + c] =
                    self.weight[k] * self.scratch[k].norm_sqr();
            }
        }
        Ok(Step::Yield(out))
    }

    fn close(&mut self) -> FlowResult<()> {
        self.life.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(sr: u32, freq: f32, n: usize) -> AudioBlock {
        AudioBlock::new(
            (0..n)
                .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin())
                .collect(),
            1,
        )
    }

    #[test]
    fn unweighted_spectrum_preserves_energy() {
        // Σ J · df ≈ mean(x²) for an unweighted, unwindowed spectrum.
        let sr = 44100;
        let win = 2048;
        let signal = sine(sr, 1000.0, win);
        let expected = signal.mean_square();

        let mut node = PowerSpectrum::new(win, sr, 1, WindowKind::Rectangular, false);
        node.start().unwrap();
        let Step::Yield(spec) = node.send(signal).unwrap() else {
            panic!("expected a spectrum");
        };
        let df = sr as f32 / win as f32;
        let total = spec.total_power() * df;
        assert!(
            (total - expected).abs() / expected < 0.05,
            "energy {} vs {}",
            total,
            expected
        );
    }

    #[test]
    fn peak_bin_matches_tone_frequency() {
        let sr = 44100;
        let win = 4096;
        let freq = 2500.0;
        let mut node = PowerSpectrum::new(win, sr, 1, WindowKind::Hann, false);
        node.start().unwrap();
        let Step::Yield(spec) = node.send(sine(sr, freq, win)).unwrap() else {
            panic!("expected a spectrum");
        };
        let peak = (0..spec.bins())
            .max_by(|&a, &b| spec.power(a, 0).total_cmp(&spec.power(b, 0)))
            .unwrap();
        let df = sr as f32 / win as f32;
        assert!(
            ((peak as f32 * df) - freq).abs() < 2.0 * df,
            "peak at {} Hz",
            peak as f32 * df
        );
    }

    #[test]
    fn a_weighting_suppresses_low_tones() {
        let sr = 44100;
        let win = 4096;
        let mut flat = PowerSpectrum::new(win, sr, 1, WindowKind::Hann, false);
        let mut weighted = PowerSpectrum::new(win, sr, 1, WindowKind::Hann, true);
        flat.start().unwrap();
        weighted.start().unwrap();

        let low = sine(sr, 50.0, win);
        let Step::Yield(flat_spec) = flat.send(low.clone()).unwrap() else {
            panic!();
        };
        let Step::Yield(weighted_spec) = weighted.send(low).unwrap() else {
            panic!();
        };
        assert!(weighted_spec.total_power() < flat_spec.total_power() * 0.1);
    }
}
