//! Stream adapters: channel mapping, gain, time slicing, and fixed-size
//! chunking.

use takt_flow::{FlowResult, Lifecycle, Node, Step};

use crate::block::AudioBlock;

/// Maps blocks to a fixed channel count.
///
/// Down-mixes by averaging all channels, up-mixes by replicating the
/// mono mix. Blocks already at the target count pass through untouched.
pub struct Rechannel {
    to: usize,
}

impl Rechannel {
    /// Rechannel to `to` channels.
    pub fn new(to: usize) -> Self {
        assert!(to > 0);
        Self { to }
    }
}

impl Node for Rechannel {
    type In = AudioBlock;
    type Out = AudioBlock;

    fn send(&mut self, input: AudioBlock) -> FlowResult<Step<AudioBlock>> {
        if input.channels() == self.to {
            return Ok(Step::Yield(input));
        }
        let frames = input.frames();
        let from = input.channels();
        let mut data = Vec::with_capacity(frames * self.to);
        for i in 0..frames {
            let mono = input.frame(i).iter().sum::<f32>() / from as f32;
            for _ in 0..self.to {
                data.push(mono);
            }
        }
        Ok(Step::Yield(AudioBlock::new(data, self.to)))
    }
}

/// Applies a constant linear gain.
pub struct Gain {
    factor: f32,
}

impl Gain {
    /// A gain of `factor` (linear).
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }
}

impl Node for Gain {
    type In = AudioBlock;
    type Out = AudioBlock;

    fn send(&mut self, mut input: AudioBlock) -> FlowResult<Step<AudioBlock>> {
        input.scale(self.factor);
        Ok(Step::Yield(input))
    }
}

/// Keeps only the samples between two stream times.
///
/// `start` and `end` are in seconds relative to the stream's first
/// sample. Blocks before `start` shrink to empty blocks; once `end` is
/// passed the node yields the final trimmed block and then ends.
pub struct TimeSlice {
    start: u64,
    end: Option<u64>,
    index: u64,
    finished: bool,
    life: Lifecycle,
}

impl TimeSlice {
    /// Slice `[start, end)` seconds out of a `samplerate` stream.
    pub fn new(samplerate: u32, start: Option<f64>, end: Option<f64>) -> Self {
        let to_frame = |t: f64| (t * samplerate as f64).round().max(0.0) as u64;
        Self {
            start: start.map_or(0, to_frame),
            end: end.map(to_frame),
            index: 0,
            finished: false,
            life: Lifecycle::new(),
        }
    }
}

impl Node for TimeSlice {
    type In = AudioBlock;
    type Out = AudioBlock;

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()
    }

    fn send(&mut self, input: AudioBlock) -> FlowResult<Step<AudioBlock>> {
        self.life.running()?;
        if self.finished {
            return Ok(Step::Done);
        }

        let block_start = self.index;
        let block_end = self.index + input.frames() as u64;
        self.index = block_end;

        let keep_start = self.start.clamp(block_start, block_end);
        let keep_end = self.end.map_or(block_end, |e| e.clamp(block_start, block_end));

        if let Some(end) = self.end
            && block_end >= end
        {
            self.finished = true;
        }

        if keep_start >= keep_end {
            return Ok(Step::Yield(AudioBlock::empty(input.channels())));
        }
        let lo = (keep_start - block_start) as usize;
        let hi = (keep_end - block_start) as usize;
        Ok(Step::Yield(input.slice_frames(lo..hi)))
    }

    fn close(&mut self) -> FlowResult<()> {
        self.life.close();
        Ok(())
    }
}

/// Re-blocks a pull stream into fixed-size chunks.
///
/// Pulls the inner node until a full chunk accumulates. When the inner
/// stream ends mid-chunk the final chunk is zero-padded, then the stream
/// ends.
pub struct Chunk<N> {
    inner: N,
    chunk: AudioBlock,
    fill: usize,
    /// Input not yet copied into the chunk buffer.
    leftover: Option<AudioBlock>,
    drained: bool,
    flushed: bool,
}

/// Fixed-size chunking of `inner`'s variable-size blocks.
pub fn chunk<N>(inner: N, frames: usize, channels: usize) -> Chunk<N>
where
    N: Node<In = (), Out = AudioBlock>,
{
    Chunk {
        inner,
        chunk: AudioBlock::zeros(frames, channels),
        fill: 0,
        leftover: None,
        drained: false,
        flushed: false,
    }
}

impl<N> Node for Chunk<N>
where
    N: Node<In = (), Out = AudioBlock>,
{
    type In = ();
    type Out = AudioBlock;

    fn start(&mut self) -> FlowResult<()> {
        self.inner.start()
    }

    fn send(&mut self, (): ()) -> FlowResult<Step<AudioBlock>> {
        let ch = self.chunk.channels();
        let frames = self.chunk.frames();
        loop {
            if let Some(block) = self.leftover.take() {
                debug_assert_eq!(block.channels(), ch);
                let take = (frames - self.fill).min(block.frames());
                let dst = &mut self.chunk.data_mut()[self.fill * ch..(self.fill + take) * ch];
                dst.copy_from_slice(&block.data()[..take * ch]);
                self.fill += take;
                if take < block.frames() {
                    self.leftover = Some(block.slice_frames(take..block.frames()));
                }
                if self.fill == frames {
                    self.fill = 0;
                    return Ok(Step::Yield(self.chunk.clone()));
                }
                continue;
            }

            if self.drained {
                // Zero-pad and emit a trailing partial chunk exactly once.
                if self.fill > 0 && !self.flushed {
                    self.flushed = true;
                    self.chunk.data_mut()[self.fill * ch..].fill(0.0);
                    self.fill = 0;
                    return Ok(Step::Yield(self.chunk.clone()));
                }
                return Ok(Step::Done);
            }

            match self.inner.send(())? {
                Step::Done => self.drained = true,
                Step::Yield(block) => {
                    if !block.is_empty() {
                        self.leftover = Some(block);
                    }
                }
            }
        }
    }

    fn close(&mut self) -> FlowResult<()> {
        self.inner.close()
    }
}

/// Feeds a fixed-chunk consumer from variable-size blocks.
///
/// Accumulates input into chunks of the consumer's expected size and
/// forwards each full chunk. On close a trailing partial chunk is
/// zero-padded and delivered before the consumer closes.
pub struct Unchunk<N> {
    inner: N,
    chunk: AudioBlock,
    fill: usize,
    done: bool,
    life: Lifecycle,
}

/// Adapt `inner` (expecting `frames`-frame blocks) to arbitrary input
/// block sizes. The inner node's outputs are discarded.
pub fn unchunk<N, O>(inner: N, frames: usize, channels: usize) -> Unchunk<N>
where
    N: Node<In = AudioBlock, Out = O>,
{
    Unchunk {
        inner,
        chunk: AudioBlock::zeros(frames, channels),
        fill: 0,
        done: false,
        life: Lifecycle::new(),
    }
}

impl<N, O> Node for Unchunk<N>
where
    N: Node<In = AudioBlock, Out = O>,
{
    type In = AudioBlock;
    type Out = ();

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()?;
        self.inner.start()
    }

    fn send(&mut self, input: AudioBlock) -> FlowResult<Step<()>> {
        self.life.running()?;
        if self.done {
            return Ok(Step::Done);
        }
        let ch = self.chunk.channels();
        let frames = self.chunk.frames();
        debug_assert_eq!(input.channels(), ch);

        let mut at = 0;
        while at < input.frames() {
            let take = (frames - self.fill).min(input.frames() - at);
            let dst = &mut self.chunk.data_mut()[self.fill * ch..(self.fill + take) * ch];
            dst.copy_from_slice(&input.data()[at * ch..(at + take) * ch]);
            self.fill += take;
            at += take;
            if self.fill == frames {
                self.fill = 0;
                if self.inner.send(self.chunk.clone())?.is_done() {
                    self.done = true;
                    return Ok(Step::Done);
                }
            }
        }
        Ok(Step::Yield(()))
    }

    fn close(&mut self) -> FlowResult<()> {
        if self.life.close() {
            if self.fill > 0 && !self.done {
                let ch = self.chunk.channels();
                self.chunk.data_mut()[self.fill * ch..].fill(0.0);
                self.fill = 0;
                let _ = self.inner.send(self.chunk.clone())?;
            }
            self.inner.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use takt_flow::from_iter;

    #[test]
    fn rechannel_down_mixes_by_mean() {
        let mut node = Rechannel::new(1);
        let input = AudioBlock::new(vec![1.0, 3.0, -1.0, 1.0], 2);
        let out = node.send(input).unwrap().into_option().unwrap();
        assert_eq!(out.channels(), 1);
        assert_eq!(out.data(), &[2.0, 0.0]);
    }

    #[test]
    fn rechannel_up_mixes_by_replication() {
        let mut node = Rechannel::new(2);
        let input = AudioBlock::new(vec![0.5, -0.5], 1);
        let out = node.send(input).unwrap().into_option().unwrap();
        assert_eq!(out.data(), &[0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn gain_scales_samples() {
        let mut node = Gain::new(0.5);
        let out = node
            .send(AudioBlock::new(vec![1.0, -2.0], 1))
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(out.data(), &[0.5, -1.0]);
    }

    #[test]
    fn time_slice_trims_and_ends() {
        // 10 Hz stream, slice [0.3, 0.7) → frames 3..7.
        let mut node = TimeSlice::new(10, Some(0.3), Some(0.7));
        node.start().unwrap();

        let first = node
            .send(AudioBlock::new((0..5).map(|i| i as f32).collect(), 1))
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(first.data(), &[3.0, 4.0]);

        let second = node
            .send(AudioBlock::new((5..10).map(|i| i as f32).collect(), 1))
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(second.data(), &[5.0, 6.0]);

        assert!(node.send(AudioBlock::zeros(5, 1)).unwrap().is_done());
    }

    #[test]
    fn time_slice_before_start_yields_empty() {
        let mut node = TimeSlice::new(10, Some(1.0), None);
        node.start().unwrap();
        let out = node.send(AudioBlock::zeros(5, 1)).unwrap().into_option().unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn chunk_rebuilds_fixed_blocks() {
        let blocks = vec![
            AudioBlock::new(vec![1.0, 2.0, 3.0], 1),
            AudioBlock::new(vec![4.0], 1),
            AudioBlock::new(vec![5.0, 6.0, 7.0], 1),
        ];
        let mut node = chunk(from_iter(blocks), 2, 1);
        node.start().unwrap();
        let mut collected = Vec::new();
        while let Step::Yield(block) = node.send(()).unwrap() {
            collected.extend_from_slice(block.data());
        }
        node.close().unwrap();
        // 7 samples, padded to 8 by the trailing zero.
        assert_eq!(collected, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 0.0]);
    }

    #[test]
    fn chunk_splits_blocks_larger_than_the_chunk() {
        // One 7-frame block through 2-frame chunks.
        let blocks = vec![AudioBlock::new((1..=7).map(|i| i as f32).collect(), 1)];
        let mut node = chunk(from_iter(blocks), 2, 1);
        node.start().unwrap();
        let mut collected = Vec::new();
        while let Step::Yield(block) = node.send(()).unwrap() {
            collected.extend_from_slice(block.data());
        }
        node.close().unwrap();
        assert_eq!(collected, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 0.0]);
    }

    /// Sink that records every chunk it is sent.
    struct Recorder {
        seen: std::sync::Arc<std::sync::Mutex<Vec<Vec<f32>>>>,
    }

    impl Node for Recorder {
        type In = AudioBlock;
        type Out = ();
        fn send(&mut self, input: AudioBlock) -> FlowResult<Step<()>> {
            self.seen.lock().unwrap().push(input.data().to_vec());
            Ok(Step::Yield(()))
        }
    }

    #[test]
    fn unchunk_regroups_and_pads_on_close() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut node = unchunk(Recorder { seen: seen.clone() }, 3, 1);
        node.start().unwrap();
        node.send(AudioBlock::new(vec![1.0, 2.0], 1)).unwrap();
        node.send(AudioBlock::new(vec![3.0, 4.0], 1)).unwrap();
        node.close().unwrap();
        let chunks = seen.lock().unwrap();
        assert_eq!(*chunks, vec![vec![1.0, 2.0, 3.0], vec![4.0, 0.0, 0.0]]);
    }

    #[test]
    fn chunk_then_unchunk_is_identity_on_aligned_streams() {
        let original: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let blocks = vec![
            AudioBlock::new(original[..5].to_vec(), 1),
            AudioBlock::new(original[5..12].to_vec(), 1),
        ];
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut rechunk = chunk(from_iter(blocks), 4, 1);
        let mut feed = unchunk(Recorder { seen: seen.clone() }, 4, 1);
        rechunk.start().unwrap();
        feed.start().unwrap();
        while let Step::Yield(block) = rechunk.send(()).unwrap() {
            feed.send(block).unwrap();
        }
        rechunk.close().unwrap();
        feed.close().unwrap();
        let flat: Vec<f32> = seen.lock().unwrap().concat();
        assert_eq!(flat, original);
    }
}
