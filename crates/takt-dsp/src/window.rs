//! Analysis windows and the A-weighting curve.

use std::f32::consts::PI;

/// Window function applied before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// No windowing.
    Rectangular,
    /// Hann window, normalised to unit mean-square gain.
    Hann,
    /// Rising half of a Hann window; biases the frame toward its most
    /// recent samples, sharpening attack response.
    HalfHann,
}

impl WindowKind {
    /// Window coefficients of length `n`.
    pub fn coefficients(&self, n: usize) -> Vec<f32> {
        match self {
            WindowKind::Rectangular => vec![1.0; n],
            WindowKind::Hann => hann_window(n),
            WindowKind::HalfHann => half_hann_window(n),
        }
    }
}

/// Hann window `sin²(πi/(n−1))`, divided by its RMS gain `√(3/8)` so the
/// windowed power spectrum keeps the unwindowed energy scale.
pub fn hann_window(n: usize) -> Vec<f32> {
    let gain = (3.0f32 / 8.0).sqrt();
    linspace(0.0, PI, n)
        .map(|a| {
            let s = a.sin();
            s * s / gain
        })
        .collect()
}

/// Rising half-Hann window `sin²(πi/(2(n−1)))`, unnormalised.
pub fn half_hann_window(n: usize) -> Vec<f32> {
    linspace(0.0, PI / 2.0, n)
        .map(|a| {
            let s = a.sin();
            s * s
        })
        .collect()
}

/// A-weighting power curve over the `n/2 + 1` one-sided FFT bins.
///
/// Uses the standard four-pole magnitude formula, normalised to unity at
/// 1 kHz and zeroed below 10 Hz and above 20 kHz.
pub fn a_weight(samplerate: u32, n: usize) -> Vec<f32> {
    let df = samplerate as f64 / n as f64;
    let norm = a_weight_power(1000.0);
    (0..n / 2 + 1)
        .map(|k| {
            let f = k as f64 * df;
            if !(10.0..=20000.0).contains(&f) {
                0.0
            } else {
                (a_weight_power(f) / norm) as f32
            }
        })
        .collect()
}

/// Unnormalised squared A-weighting magnitude at frequency `f`.
fn a_weight_power(f: f64) -> f64 {
    let f1 = 20.6f64;
    let f2 = 107.7f64;
    let f3 = 737.9f64;
    let f4 = 12194.0f64;
    let f2s = f * f;
    let num = (f2s * f2s * f4 * f4).powi(2);
    num / (f2s + f1 * f1).powi(2) / (f2s + f2 * f2) / (f2s + f3 * f3) / (f2s + f4 * f4).powi(2)
}

fn linspace(start: f32, end: f32, n: usize) -> impl Iterator<Item = f32> {
    let step = if n > 1 { (end - start) / (n - 1) as f32 } else { 0.0 };
    (0..n).map(move |i| start + step * i as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_window_has_unit_mean_square() {
        let w = hann_window(1024);
        let ms = w.iter().map(|x| x * x).sum::<f32>() / w.len() as f32;
        assert!((ms - 1.0).abs() < 1e-2, "mean square {}", ms);
    }

    #[test]
    fn half_hann_rises_to_one() {
        let w = half_hann_window(512);
        assert!(w[0].abs() < 1e-6);
        assert!((w[511] - 1.0).abs() < 1e-6);
        assert!(w.windows(2).all(|p| p[0] <= p[1] + 1e-6), "not monotone");
    }

    #[test]
    fn a_weight_is_unity_at_1khz() {
        let sr = 44100;
        let n = 4410; // df = 10 Hz, bin 100 is exactly 1 kHz
        let w = a_weight(sr, n);
        assert!((w[100] - 1.0).abs() < 1e-3, "1 kHz weight {}", w[100]);
    }

    #[test]
    fn a_weight_zeroed_outside_audible_band() {
        let w = a_weight(44100, 4410);
        assert_eq!(w[0], 0.0); // DC
        let bin_21k = (21000.0 / 10.0) as usize;
        assert_eq!(w[bin_21k.min(w.len() - 1)], 0.0);
    }

    #[test]
    fn a_weight_attenuates_low_frequencies() {
        let w = a_weight(44100, 4410);
        let bin_100hz = 10;
        assert!(w[bin_100hz] < 0.2, "100 Hz weight {}", w[bin_100hz]);
    }
}
