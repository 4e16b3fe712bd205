//! Onset strength (spectral flux) and adaptive peak picking.

use takt_flow::{FlowResult, Lifecycle, Node, Step};

use crate::block::Spectrum;

/// Spectral flux between consecutive spectra.
///
/// Each step yields the half-wave rectified difference against the
/// previous spectrum, summed over frequency, averaged over channels, and
/// scaled by the frequency resolution `df`.
pub struct OnsetStrength {
    df: f32,
    prev: Option<Spectrum>,
    life: Lifecycle,
}

impl OnsetStrength {
    /// Flux node with frequency resolution `df` (Hz per bin).
    pub fn new(df: f32) -> Self {
        Self {
            df,
            prev: None,
            life: Lifecycle::new(),
        }
    }
}

impl Node for OnsetStrength {
    type In = Spectrum;
    type Out = f32;

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()
    }

    fn send(&mut self, input: Spectrum) -> FlowResult<Step<f32>> {
        self.life.running()?;
        let flux = match &self.prev {
            None => 0.0,
            Some(prev) => {
                debug_assert_eq!(prev.values().len(), input.values().len());
                let total: f32 = input
                    .values()
                    .iter()
                    .zip(prev.values().iter())
                    .map(|(cur, old)| (cur - old).max(0.0))
                    .sum();
                total / input.channels() as f32 * self.df
            }
        };
        self.prev = Some(input);
        Ok(Step::Yield(flux))
    }

    fn close(&mut self) -> FlowResult<()> {
        self.life.close();
        Ok(())
    }
}

/// Adaptive peak picker over a scalar envelope.
///
/// A sample is a detection iff it is the maximum over the window
/// `[−pre_max, +post_max]`, exceeds the mean over `[−pre_avg, +post_avg]`
/// by at least `delta`, and at least `wait` samples have passed since the
/// previous detection. The decision is made `max(post_max, post_avg)`
/// samples after the fact, which is the picker's fixed delay.
pub struct PeakPicker {
    pre_max: usize,
    post_max: usize,
    pre_avg: usize,
    post_avg: usize,
    wait: i64,
    delta: f32,
    buffer: Vec<f32>,
    center: usize,
    index: i64,
    prev_index: i64,
    life: Lifecycle,
}

impl PeakPicker {
    /// Build a picker; window lengths are in samples of the envelope.
    pub fn new(
        pre_max: usize,
        post_max: usize,
        pre_avg: usize,
        post_avg: usize,
        wait: usize,
        delta: f32,
    ) -> Self {
        let center = pre_max.max(pre_avg);
        let delay = post_max.max(post_avg);
        Self {
            pre_max,
            post_max,
            pre_avg,
            post_avg,
            wait: wait as i64,
            delta,
            buffer: vec![0.0; center + delay + 1],
            center,
            index: -(delay as i64),
            prev_index: -(wait as i64),
            life: Lifecycle::new(),
        }
    }

    /// The fixed decision delay in samples.
    pub fn delay(&self) -> usize {
        self.post_max.max(self.post_avg)
    }
}

impl Node for PeakPicker {
    type In = f32;
    type Out = bool;

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()
    }

    fn send(&mut self, input: f32) -> FlowResult<Step<bool>> {
        self.life.running()?;
        let len = self.buffer.len();
        self.buffer[len - 1] = input;
        self.index += 1;

        let strength = self.buffer[self.center];
        let max_win = &self.buffer[self.center - self.pre_max..=self.center + self.post_max];
        let avg_win = &self.buffer[self.center - self.pre_avg..=self.center + self.post_avg];
        let mean = avg_win.iter().sum::<f32>() / avg_win.len() as f32;

        let detected = self.index > self.prev_index + self.wait
            && max_win.iter().all(|&x| strength >= x)
            && strength >= mean + self.delta;
        if detected {
            self.prev_index = self.index;
        }

        self.buffer.copy_within(1.., 0);
        Ok(Step::Yield(detected))
    }

    fn close(&mut self) -> FlowResult<()> {
        self.life.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flux_of(values: &[Vec<f32>]) -> Vec<f32> {
        let mut node = OnsetStrength::new(1.0);
        node.start().unwrap();
        values
            .iter()
            .map(|v| {
                node.send(Spectrum::new(v.clone(), 1))
                    .unwrap()
                    .into_option()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn flux_rectifies_decreases() {
        let out = flux_of(&[vec![1.0, 1.0], vec![3.0, 0.0], vec![0.0, 0.0]]);
        // First spectrum has no predecessor; rises count, falls do not.
        assert_eq!(out, vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn flux_averages_channels() {
        let mut node = OnsetStrength::new(2.0);
        node.start().unwrap();
        node.send(Spectrum::zeros(2, 2)).unwrap();
        // Channel 0 rises by 1+2, channel 1 by 3+4; mean is 5, times df 2.
        let step = node
            .send(Spectrum::new(vec![1.0, 3.0, 2.0, 4.0], 2))
            .unwrap();
        assert_eq!(step.into_option(), Some(10.0));
    }

    fn run_picker(picker: &mut PeakPicker, envelope: &[f32]) -> Vec<bool> {
        envelope
            .iter()
            .map(|&x| picker.send(x).unwrap().into_option().unwrap())
            .collect()
    }

    #[test]
    fn picker_detects_isolated_peak_with_delay() {
        let mut picker = PeakPicker::new(2, 2, 2, 2, 0, 0.1);
        picker.start().unwrap();
        let mut envelope = vec![0.0; 16];
        envelope[5] = 1.0;
        let hits = run_picker(&mut picker, &envelope);
        // Decision is delayed by max(post_max, post_avg) = 2 samples.
        let expect_at = 5 + picker.delay();
        for (i, &hit) in hits.iter().enumerate() {
            assert_eq!(hit, i == expect_at, "unexpected detection state at {}", i);
        }
    }

    #[test]
    fn picker_enforces_wait() {
        let mut picker = PeakPicker::new(1, 1, 1, 1, 8, 0.1);
        picker.start().unwrap();
        let mut envelope = vec![0.0; 20];
        envelope[4] = 1.0;
        envelope[7] = 1.0; // within the wait window of the first peak
        let hits = run_picker(&mut picker, &envelope);
        assert_eq!(hits.iter().filter(|&&h| h).count(), 1);
    }

    #[test]
    fn picker_requires_margin_over_mean() {
        let mut picker = PeakPicker::new(2, 2, 2, 2, 0, 0.5);
        picker.start().unwrap();
        // A bump of 0.4 over a flat envelope of 0.0 stays below delta.
        let mut envelope = vec![0.0; 12];
        envelope[5] = 0.4;
        let hits = run_picker(&mut picker, &envelope);
        assert!(hits.iter().all(|&h| !h));
    }
}
