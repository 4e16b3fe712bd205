//! Property-based tests for the DSP primitives.

use proptest::prelude::*;
use takt_dsp::{AudioBlock, PeakPicker, Resampler, design_lowpass, power_to_db};
use takt_flow::{Node, Step};

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

proptest! {
    /// The resampler emits exactly `ceil(n·up/down)` frames over a whole
    /// stream, regardless of how the input is blocked.
    #[test]
    fn resampler_length_formula(
        up in 1usize..32,
        down in 1usize..32,
        frames in 1usize..800,
        block in 1usize..97,
    ) {
        let mut resampler = Resampler::new(up, down, 1);
        resampler.start().unwrap();
        let input = AudioBlock::zeros(frames, 1);
        let mut total = 0;
        let mut at = 0;
        while at < frames {
            let end = (at + block).min(frames);
            let Step::Yield(out) = resampler.send(input.slice_frames(at..end)).unwrap() else {
                panic!("resampler must not end");
            };
            total += out.frames();
            at = end;
        }
        let g = gcd(up, down);
        prop_assert_eq!(total, (frames * (up / g)).div_ceil(down / g));
    }

    /// Resampler output stays finite for bounded input.
    #[test]
    fn resampler_output_is_finite(
        samples in prop::collection::vec(-1.0f32..=1.0, 32..256),
        up in 1usize..8,
        down in 1usize..8,
    ) {
        let mut resampler = Resampler::new(up, down, 1);
        resampler.start().unwrap();
        let out = resampler
            .send(AudioBlock::new(samples, 1))
            .unwrap()
            .into_option()
            .unwrap();
        prop_assert!(out.data().iter().all(|x| x.is_finite()));
    }

    /// No two detections can be closer than the wait interval.
    #[test]
    fn picker_respects_wait(
        envelope in prop::collection::vec(0.0f32..=1.0, 64..256),
        wait in 1usize..16,
    ) {
        let mut picker = PeakPicker::new(2, 2, 2, 2, wait, 0.01);
        picker.start().unwrap();
        let mut last: Option<usize> = None;
        for (index, &value) in envelope.iter().enumerate() {
            if picker.send(value).unwrap().into_option().unwrap() {
                if let Some(prev) = last {
                    prop_assert!(index - prev > wait, "hits at {} and {}", prev, index);
                }
                last = Some(index);
            }
        }
    }

    /// The display dB scale is monotone in power.
    #[test]
    fn power_to_db_is_monotone(a in 0.0f32..1.0e3, b in 0.0f32..1.0e3) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            power_to_db(lo, (1e-5, 1e6)) <= power_to_db(hi, (1e-5, 1e6)) + 1e-4
        );
    }

    /// Lowpass prototypes keep unity DC gain across sizes and cutoffs.
    #[test]
    fn lowpass_dc_gain(taps in 3usize..257, cutoff in 0.01f32..0.99) {
        let coeffs = design_lowpass(taps, cutoff);
        let sum: f32 = coeffs.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-4, "dc gain {}", sum);
    }
}
