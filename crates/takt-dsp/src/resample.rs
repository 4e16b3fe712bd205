//! Streaming rational resampling.
//!
//! Polyphase FIR resampling by the rational factor `up/down`, using a
//! Blackman windowed-sinc prototype lowpass. The node form keeps input
//! history and a fractional output index across blocks, so a stream
//! resampled block by block is sample-identical to resampling it in one
//! piece.
//!
//! Resampling by `up/down` is equivalent to upsampling by `up`, lowpass
//! filtering at `min(1/up, 1/down)` normalized frequency, and downsampling
//! by `down`; the polyphase decomposition computes only the output samples
//! actually needed.

use std::f32::consts::PI;

use takt_flow::{FlowResult, Lifecycle, Node, Step};

use crate::block::AudioBlock;

/// Compute windowed-sinc lowpass FIR coefficients.
///
/// Type I linear-phase design with a Blackman window, normalized to unity
/// DC gain. `cutoff` is in (0.0, 1.0] relative to Nyquist.
pub fn design_lowpass(num_taps: usize, cutoff: f32) -> Vec<f32> {
    if num_taps == 0 {
        return Vec::new();
    }

    let m = num_taps - 1;
    let mut coeffs = Vec::with_capacity(num_taps);

    for n in 0..num_taps {
        let x = n as f32 - m as f32 / 2.0;

        let sinc = if x.abs() < 1e-7 {
            cutoff
        } else {
            (PI * cutoff * x).sin() / (PI * x)
        };

        let window = if m == 0 {
            1.0
        } else {
            let phase = 2.0 * PI * n as f32 / m as f32;
            0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
        };

        coeffs.push(sinc * window);
    }

    let sum: f32 = coeffs.iter().sum();
    if sum.abs() > 1e-10 {
        for c in &mut coeffs {
            *c /= sum;
        }
    }

    coeffs
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Streaming polyphase resampler by the rational ratio `up/down`.
///
/// Each input block yields the output samples that become computable with
/// it (possibly none for very small blocks). Over a whole stream the
/// output length is `ceil(total_in · up / down)`.
pub struct Resampler {
    up: usize,
    down: usize,
    channels: usize,
    /// `up` sub-filters of the prototype lowpass.
    polyphase: Vec<Vec<f32>>,
    taps_per_phase: usize,
    /// Interleaved input history; frame 0 is global frame `hist_start`.
    hist: Vec<f32>,
    hist_start: usize,
    total_in: usize,
    next_out: usize,
    life: Lifecycle,
}

impl Resampler {
    /// A resampler converting `down`-rate input to `up`-rate output
    /// (e.g. `up = 48000, down = 44100`). The ratio is reduced internally.
    pub fn new(up: usize, down: usize, channels: usize) -> Self {
        assert!(up >= 1 && down >= 1);
        let g = gcd(up, down);
        let (up, down) = (up / g, down / g);

        let (polyphase, taps_per_phase) = if up == 1 && down == 1 {
            (Vec::new(), 0)
        } else {
            let num_taps = 4 * up.max(down) * 10 + 1;
            let cutoff = 0.9 / up.max(down) as f32;
            let prototype = design_lowpass(num_taps, cutoff);

            let taps_per_phase = num_taps.div_ceil(up);
            let mut polyphase = vec![vec![0.0f32; taps_per_phase]; up];
            for (tap, &coeff) in prototype.iter().enumerate() {
                polyphase[tap % up][tap / up] = coeff;
            }
            (polyphase, taps_per_phase)
        };

        Self {
            up,
            down,
            channels,
            polyphase,
            taps_per_phase,
            hist: Vec::new(),
            hist_start: 0,
            total_in: 0,
            next_out: 0,
            life: Lifecycle::new(),
        }
    }

    /// True when the reduced ratio is 1:1 and blocks pass through.
    pub fn is_identity(&self) -> bool {
        self.up == 1 && self.down == 1
    }

    fn input_sample(&self, frame: i64, channel: usize) -> f32 {
        if frame < self.hist_start as i64 {
            return 0.0;
        }
        let at = (frame as usize - self.hist_start) * self.channels + channel;
        self.hist.get(at).copied().unwrap_or(0.0)
    }
}

impl Node for Resampler {
    type In = AudioBlock;
    type Out = AudioBlock;

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()
    }

    fn send(&mut self, input: AudioBlock) -> FlowResult<Step<AudioBlock>> {
        self.life.running()?;
        debug_assert_eq!(input.channels(), self.channels);

        if self.is_identity() {
            return Ok(Step::Yield(input));
        }

        self.hist.extend_from_slice(input.data());
        self.total_in += input.frames();

        let mut out = Vec::new();
        loop {
            let full = self.next_out * self.down;
            let frame = full / self.up;
            if frame >= self.total_in {
                break;
            }
            let phase = &self.polyphase[full % self.up];
            for c in 0..self.channels {
                let mut acc = 0.0f32;
                for (i, &coeff) in phase.iter().enumerate() {
                    acc += coeff * self.input_sample(frame as i64 - i as i64, c);
                }
                out.push(acc * self.up as f32);
            }
            self.next_out += 1;
        }

        // Drop history no future output can reach.
        let next_frame = (self.next_out * self.down) / self.up;
        let keep_from = next_frame.saturating_sub(self.taps_per_phase - 1);
        if keep_from > self.hist_start {
            self.hist.drain(0..(keep_from - self.hist_start) * self.channels);
            self.hist_start = keep_from;
        }

        Ok(Step::Yield(AudioBlock::new(out, self.channels)))
    }

    fn close(&mut self) -> FlowResult<()> {
        self.life.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(resampler: &mut Resampler, input: &AudioBlock, block: usize) -> AudioBlock {
        let mut out = AudioBlock::empty(input.channels());
        let mut at = 0;
        while at < input.frames() {
            let end = (at + block).min(input.frames());
            let step = resampler.send(input.slice_frames(at..end)).unwrap();
            out.extend_from(&step.into_option().unwrap());
            at = end;
        }
        out
    }

    fn sine(sr: u32, freq: f32, n: usize) -> AudioBlock {
        AudioBlock::new(
            (0..n)
                .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin())
                .collect(),
            1,
        )
    }

    fn tone_amplitude(signal: &[f32], freq: f32, sr: f32) -> f32 {
        let mut re = 0.0f32;
        let mut im = 0.0f32;
        for (i, &s) in signal.iter().enumerate() {
            let phase = 2.0 * PI * freq * i as f32 / sr;
            re += s * phase.cos();
            im += s * phase.sin();
        }
        2.0 * (re * re + im * im).sqrt() / signal.len() as f32
    }

    #[test]
    fn lowpass_is_symmetric_with_unity_dc() {
        let coeffs = design_lowpass(65, 0.4);
        for i in 0..coeffs.len() / 2 {
            assert!((coeffs[i] - coeffs[coeffs.len() - 1 - i]).abs() < 1e-6);
        }
        let sum: f32 = coeffs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn identity_ratio_passes_blocks_through() {
        let mut resampler = Resampler::new(3, 3, 1);
        resampler.start().unwrap();
        let input = AudioBlock::new(vec![0.5, -0.5, 0.25], 1);
        let out = resampler.send(input.clone()).unwrap().into_option().unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn output_length_matches_ratio() {
        for (up, down) in [(3usize, 2usize), (2, 3), (160, 147), (147, 160)] {
            let mut resampler = Resampler::new(up, down, 1);
            resampler.start().unwrap();
            let input = AudioBlock::zeros(1000, 1);
            let out = drive(&mut resampler, &input, 128);
            let g = gcd(up, down);
            let expected = (1000 * (up / g)).div_ceil(down / g);
            assert_eq!(out.frames(), expected, "ratio {}/{}", up, down);
        }
    }

    #[test]
    fn tone_survives_44100_to_48000() {
        let mut resampler = Resampler::new(48000, 44100, 1);
        resampler.start().unwrap();
        let input = sine(44100, 1000.0, 44100);
        let out = drive(&mut resampler, &input, 512);
        let amp = tone_amplitude(&out.data()[4800..43200], 1000.0, 48000.0);
        assert!(amp > 0.8, "tone amplitude {}", amp);
    }

    #[test]
    fn block_size_does_not_change_output() {
        let input = sine(44100, 440.0, 4410);
        let mut small = Resampler::new(2, 1, 1);
        let mut large = Resampler::new(2, 1, 1);
        small.start().unwrap();
        large.start().unwrap();
        let out_small = drive(&mut small, &input, 64);
        let out_large = drive(&mut large, &input, 1024);
        assert_eq!(out_small.frames(), out_large.frames());
        for (a, b) in out_small.data().iter().zip(out_large.data().iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn stereo_channels_resample_independently() {
        let mut resampler = Resampler::new(2, 1, 2);
        resampler.start().unwrap();
        // Left is constant 1.0, right constant -1.0.
        let data: Vec<f32> = (0..256).flat_map(|_| [1.0f32, -1.0]).collect();
        let out = drive(&mut resampler, &AudioBlock::new(data, 2), 64);
        // Away from the filter edges both channels hold their DC values.
        let mid = out.frames() / 2;
        assert!((out.sample(mid, 0) - 1.0).abs() < 0.05);
        assert!((out.sample(mid, 1) + 1.0).abs() < 0.05);
    }
}
