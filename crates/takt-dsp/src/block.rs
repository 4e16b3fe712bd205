//! Sample and spectrum containers.
//!
//! [`AudioBlock`] is the unit of exchange across the whole audio path:
//! a run of interleaved `f32` frames, matching the layout of cpal's
//! callback buffers. [`Spectrum`] is its frequency-domain counterpart,
//! one power value per bin per channel.

/// A block of interleaved audio frames.
///
/// `data.len()` is always a multiple of `channels`; frame `i` occupies
/// `data[i * channels .. (i + 1) * channels]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    channels: usize,
    data: Vec<f32>,
}

impl AudioBlock {
    /// Wrap interleaved samples. `data.len()` must be a multiple of
    /// `channels`.
    pub fn new(data: Vec<f32>, channels: usize) -> Self {
        assert!(channels > 0, "audio block needs at least one channel");
        assert_eq!(
            data.len() % channels,
            0,
            "interleaved data must be a whole number of frames"
        );
        Self { channels, data }
    }

    /// A silent block of `frames` frames.
    pub fn zeros(frames: usize, channels: usize) -> Self {
        Self::new(vec![0.0; frames * channels], channels)
    }

    /// An empty block carrying only a channel count.
    pub fn empty(channels: usize) -> Self {
        Self::new(Vec::new(), channels)
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// True if the block holds no frames.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw interleaved samples.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access to the raw interleaved samples.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// One frame as a `channels`-long slice.
    pub fn frame(&self, index: usize) -> &[f32] {
        &self.data[index * self.channels..(index + 1) * self.channels]
    }

    /// Sample at `(frame, channel)`.
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.data[frame * self.channels + channel]
    }

    /// Copy of the frames in `range`.
    pub fn slice_frames(&self, range: std::ops::Range<usize>) -> AudioBlock {
        let ch = self.channels;
        AudioBlock::new(self.data[range.start * ch..range.end * ch].to_vec(), ch)
    }

    /// Append all frames of `other`; channel counts must match.
    pub fn extend_from(&mut self, other: &AudioBlock) {
        assert_eq!(self.channels, other.channels, "channel count mismatch");
        self.data.extend_from_slice(&other.data);
    }

    /// Multiply every sample by `gain`.
    pub fn scale(&mut self, gain: f32) {
        for sample in &mut self.data {
            *sample *= gain;
        }
    }

    /// Sum frames `src_range` of `self` into `dst` starting at frame
    /// `dst_at`. Channel counts must match; the ranges must fit.
    pub fn mix_into(&self, dst: &mut AudioBlock, src_range: std::ops::Range<usize>, dst_at: usize) {
        assert_eq!(self.channels, dst.channels, "channel count mismatch");
        let ch = self.channels;
        let src = &self.data[src_range.start * ch..src_range.end * ch];
        let dst = &mut dst.data[dst_at * ch..dst_at * ch + src.len()];
        for (d, s) in dst.iter_mut().zip(src.iter()) {
            *d += *s;
        }
    }

    /// Mean of `x²` over all samples; the reference for the power
    /// spectrum scaling invariant.
    pub fn mean_square(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|x| x * x).sum::<f32>() / self.data.len() as f32
    }
}

/// A one-sided power spectrum, interleaved per channel.
///
/// `values.len()` is `bins * channels`; bin `k` of channel `c` is at
/// `values[k * channels + c]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    channels: usize,
    values: Vec<f32>,
}

impl Spectrum {
    /// Wrap interleaved bin powers.
    pub fn new(values: Vec<f32>, channels: usize) -> Self {
        assert!(channels > 0);
        assert_eq!(values.len() % channels, 0);
        Self { channels, values }
    }

    /// An all-zero spectrum.
    pub fn zeros(bins: usize, channels: usize) -> Self {
        Self::new(vec![0.0; bins * channels], channels)
    }

    /// Number of frequency bins.
    pub fn bins(&self) -> usize {
        self.values.len() / self.channels
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The raw interleaved bin powers.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Mutable access to the raw interleaved bin powers.
    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Power of bin `k` in channel `c`.
    pub fn power(&self, bin: usize, channel: usize) -> f32 {
        self.values[bin * self.channels + channel]
    }

    /// Sum the powers of the bins in `range`, averaged over channels.
    pub fn band_power(&self, range: std::ops::Range<usize>) -> f32 {
        let ch = self.channels;
        let slice = &self.values[range.start * ch..range.end * ch];
        slice.iter().sum::<f32>() / ch as f32
    }

    /// Total power summed over all bins, averaged over channels.
    pub fn total_power(&self) -> f32 {
        self.band_power(0..self.bins())
    }
}
