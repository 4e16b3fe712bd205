//! The audio output mixer.
//!
//! [`MixerNode`] is a pull node producing one silent output buffer per
//! step and threading it through a scheduler of effect nodes; sound
//! sources are effects that sum themselves into the buffer at a
//! sample-exact position. The cloneable [`Mixer`] handle schedules and
//! cancels sounds from any thread.
//!
//! Placement is aligned against the mixer's own sample counter, never
//! against wall time, so scheduled sounds are stable under callback
//! jitter.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use takt_dsp::{AudioBlock, Gain, Rechannel, Resampler, TimeSlice, db_to_linear};
use takt_flow::{
    BoxNode, FlowResult, Key, Lifecycle, Node, NodeExt, Scheduler, SchedulerHandle, Step, ZIndex,
    from_iter,
};

use crate::Result;
use crate::load::load_audio;

/// One mixer tick: the stream time of the buffer's first sample, and the
/// buffer being mixed.
pub type TimedBlock = (f64, AudioBlock);

/// Sound files kept decoded and resampled, most recently used first.
const SOUND_CACHE_CAP: usize = 32;

struct SoundCache {
    entries: Vec<(PathBuf, Arc<AudioBlock>)>,
}

impl SoundCache {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn get(&mut self, path: &Path, load: impl FnOnce() -> Result<AudioBlock>) -> Result<Arc<AudioBlock>> {
        if let Some(at) = self.entries.iter().position(|(p, _)| p == path) {
            let entry = self.entries.remove(at);
            let sound = entry.1.clone();
            self.entries.insert(0, entry);
            return Ok(sound);
        }
        let sound = Arc::new(load()?);
        self.entries.insert(0, (path.to_path_buf(), sound.clone()));
        self.entries.truncate(SOUND_CACHE_CAP);
        Ok(sound)
    }
}

/// What to play: a file, a raw signal, or a prebuilt source node.
pub enum PlaySource {
    /// A sound file, loaded through the mixer's cache.
    File(PathBuf),
    /// A raw signal at the given sample rate.
    Signal {
        /// The samples to play.
        block: AudioBlock,
        /// Their sample rate in Hz.
        samplerate: u32,
    },
    /// A pull node producing blocks at the given sample rate.
    Node {
        /// The source node.
        node: BoxNode<(), AudioBlock>,
        /// Its output sample rate in Hz.
        samplerate: u32,
    },
}

/// Options for [`Mixer::play`].
pub struct PlayOptions {
    /// Gain in dB.
    pub volume: f32,
    /// Source-side start time in seconds.
    pub start: Option<f64>,
    /// Source-side end time in seconds.
    pub end: Option<f64>,
    /// Stream time at which the sound begins; `None` plays immediately.
    pub time: Option<f64>,
    /// Mixing order among effects.
    pub zindex: f64,
    /// Reuse a caller-chosen key instead of a fresh one.
    pub key: Option<Key>,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            volume: 0.0,
            start: None,
            end: None,
            time: None,
            zindex: 0.0,
            key: None,
        }
    }
}

impl PlayOptions {
    /// Play at `time` on the mixer clock.
    pub fn at(time: f64) -> Self {
        Self {
            time: Some(time),
            ..Self::default()
        }
    }
}

/// Control handle of the output mixer.
#[derive(Clone)]
pub struct Mixer {
    handle: SchedulerHandle<TimedBlock>,
    samplerate: u32,
    buffer_length: usize,
    channels: usize,
    delay: f64,
    rendered: Arc<AtomicU64>,
    cache: Arc<Mutex<SoundCache>>,
}

impl Mixer {
    /// Create a mixer producing `buffer_length`×`channels` buffers at
    /// `samplerate`, with `delay` seconds added to its clock.
    pub fn new(samplerate: u32, buffer_length: usize, channels: usize, delay: f64) -> (Mixer, MixerNode) {
        let (sched, handle) = Scheduler::new();
        let rendered = Arc::new(AtomicU64::new(0));
        let mixer = Mixer {
            handle,
            samplerate,
            buffer_length,
            channels,
            delay,
            rendered: rendered.clone(),
            cache: Arc::new(Mutex::new(SoundCache::new())),
        };
        let node = MixerNode {
            sched,
            samplerate,
            buffer_length,
            channels,
            delay,
            index: 0,
            rendered,
            life: Lifecycle::new(),
        };
        (mixer, node)
    }

    /// Output sample rate in Hz.
    pub fn samplerate(&self) -> u32 {
        self.samplerate
    }

    /// Output channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Current stream time in seconds, derived from the number of
    /// buffers rendered so far.
    pub fn time(&self) -> f64 {
        let buffers = self.rendered.load(Ordering::Acquire);
        buffers as f64 * self.buffer_length as f64 / f64::from(self.samplerate) + self.delay
    }

    /// Load a sound file through the cache, resampled to the mixer rate.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Arc<AudioBlock>> {
        let path = path.as_ref();
        let samplerate = self.samplerate;
        self.cache.lock().unwrap().get(path, || {
            let loaded = load_audio(path)?;
            if loaded.samplerate == samplerate {
                return Ok(loaded.block);
            }
            let channels = loaded.block.channels();
            let mut resampler =
                Resampler::new(samplerate as usize, loaded.samplerate as usize, channels);
            resampler.start()?;
            let out = resampler
                .send(loaded.block)?
                .into_option()
                .unwrap_or_else(|| AudioBlock::empty(channels));
            resampler.close()?;
            tracing::debug!(
                path = %path.display(),
                from = loaded.samplerate,
                to = samplerate,
                "resampled cached sound"
            );
            Ok(out)
        })
    }

    /// Schedule a sound. Returns the key under which it can be cancelled.
    pub fn play(&self, source: PlaySource, options: PlayOptions) -> Result<Key> {
        let (mut node, src_samplerate): (BoxNode<(), AudioBlock>, u32) = match source {
            PlaySource::File(path) => {
                let sound = self.load(&path)?;
                let block = AudioBlock::clone(&sound);
                (from_iter(std::iter::once(block)).boxed(), self.samplerate)
            }
            PlaySource::Signal { block, samplerate } => {
                (from_iter(std::iter::once(block)).boxed(), samplerate)
            }
            PlaySource::Node { node, samplerate } => (node, samplerate),
        };

        if options.start.is_some() || options.end.is_some() {
            node = node
                .pipe(TimeSlice::new(src_samplerate, options.start, options.end))
                .boxed();
        }
        node = node.pipe(Rechannel::new(self.channels)).boxed();
        if src_samplerate != self.samplerate {
            node = node
                .pipe(Resampler::new(
                    self.samplerate as usize,
                    src_samplerate as usize,
                    self.channels,
                ))
                .boxed();
        }
        if options.volume != 0.0 {
            node = node.pipe(Gain::new(db_to_linear(options.volume))).boxed();
        }

        let attach = Attach::new(node, options.time, self.samplerate);
        let key = options.key.unwrap_or_else(Key::fresh);
        self.handle
            .insert(key, Box::new(attach), ZIndex::flat(options.zindex));
        Ok(key)
    }

    /// Place a general effect on the bus.
    ///
    /// With `time` set, buffers pass through untouched until the stream
    /// reaches that time; the effect then starts mid-buffer on the exact
    /// sample.
    pub fn add_effect(
        &self,
        node: BoxNode<TimedBlock, TimedBlock>,
        time: Option<f64>,
        zindex: f64,
        key: Option<Key>,
    ) -> Key {
        let node = match time {
            Some(start) => Box::new(TimedGate::new(node, start, self.samplerate)),
            None => node,
        };
        let key = key.unwrap_or_else(Key::fresh);
        self.handle.insert(key, node, ZIndex::flat(zindex))
    }

    /// Cancel a scheduled sound or effect. Idempotent.
    pub fn remove_effect(&self, key: Key) {
        self.handle.remove(key);
    }
}

/// The pull node driven by the output audio callback.
pub struct MixerNode {
    sched: Scheduler<TimedBlock>,
    samplerate: u32,
    buffer_length: usize,
    channels: usize,
    delay: f64,
    index: u64,
    rendered: Arc<AtomicU64>,
    life: Lifecycle,
}

impl Node for MixerNode {
    type In = ();
    type Out = AudioBlock;

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()?;
        self.sched.start()
    }

    fn send(&mut self, (): ()) -> FlowResult<Step<AudioBlock>> {
        self.life.running()?;
        let time = self.index as f64 * self.buffer_length as f64 / f64::from(self.samplerate)
            + self.delay;
        let buffer = AudioBlock::zeros(self.buffer_length, self.channels);
        let step = self.sched.send((time, buffer))?;
        self.index += 1;
        self.rendered.store(self.index, Ordering::Release);
        Ok(step.map(|(_, data)| data))
    }

    fn close(&mut self) -> FlowResult<()> {
        if self.life.close() {
            self.sched.close()?;
        }
        Ok(())
    }
}

/// Sums a pull source into the bus at a sample-exact stream time.
///
/// The offset `Δ = round((time − stream_time) · sr)` is computed against
/// the first buffer the effect sees. A negative Δ discards the first |Δ|
/// source samples (clamped to the source length); a positive Δ skips
/// output samples before summing begins.
struct Attach {
    source: BoxNode<(), AudioBlock>,
    start_time: Option<f64>,
    samplerate: u32,
    skip: u64,
    pending: Option<AudioBlock>,
    source_done: bool,
    primed: bool,
    finished: bool,
}

impl Attach {
    fn new(source: BoxNode<(), AudioBlock>, start_time: Option<f64>, samplerate: u32) -> Self {
        Self {
            source,
            start_time,
            samplerate,
            skip: 0,
            pending: None,
            source_done: false,
            primed: false,
            finished: false,
        }
    }

    /// Refill `pending` from the source; empty source blocks are skipped.
    fn pull(&mut self) -> FlowResult<()> {
        while !self.source_done {
            match self.source.send(())? {
                Step::Done => self.source_done = true,
                Step::Yield(block) => {
                    if !block.is_empty() {
                        self.pending = Some(block);
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    fn prime(&mut self, buffer_time: f64) -> FlowResult<()> {
        self.primed = true;
        let offset = match self.start_time {
            Some(start) => ((start - buffer_time) * f64::from(self.samplerate)).round() as i64,
            None => 0,
        };
        if offset >= 0 {
            self.skip = offset as u64;
            return Ok(());
        }

        let mut to_drop = (-offset) as usize;
        while to_drop > 0 {
            if self.pending.is_none() {
                self.pull()?;
            }
            let Some(pending) = self.pending.take() else {
                break; // source shorter than the requested skip
            };
            let drop = to_drop.min(pending.frames());
            to_drop -= drop;
            if drop < pending.frames() {
                self.pending = Some(pending.slice_frames(drop..pending.frames()));
            }
        }
        Ok(())
    }
}

impl Node for Attach {
    type In = TimedBlock;
    type Out = TimedBlock;

    fn start(&mut self) -> FlowResult<()> {
        self.source.start()
    }

    fn send(&mut self, (time, mut buffer): TimedBlock) -> FlowResult<Step<TimedBlock>> {
        if self.finished {
            return Ok(Step::Done);
        }
        if !self.primed {
            self.prime(time)?;
        }

        let frames = buffer.frames() as u64;
        let mut at;
        if self.skip >= frames {
            self.skip -= frames;
            return Ok(Step::Yield((time, buffer)));
        }
        at = self.skip as usize;
        self.skip = 0;

        while at < buffer.frames() {
            if self.pending.is_none() {
                self.pull()?;
            }
            let Some(pending) = self.pending.take() else {
                break;
            };
            let take = pending.frames().min(buffer.frames() - at);
            pending.mix_into(&mut buffer, 0..take, at);
            at += take;
            if take < pending.frames() {
                self.pending = Some(pending.slice_frames(take..pending.frames()));
            }
        }

        if self.source_done && self.pending.is_none() {
            self.finished = true;
        }
        Ok(Step::Yield((time, buffer)))
    }

    fn close(&mut self) -> FlowResult<()> {
        self.source.close()
    }
}

/// Passes buffers through until the stream reaches a start time, then
/// routes the remainder of each buffer through the wrapped effect.
struct TimedGate {
    inner: BoxNode<TimedBlock, TimedBlock>,
    start: f64,
    samplerate: u32,
    offset: Option<u64>,
}

impl TimedGate {
    fn new(inner: BoxNode<TimedBlock, TimedBlock>, start: f64, samplerate: u32) -> Self {
        Self {
            inner,
            start,
            samplerate,
            offset: None,
        }
    }
}

impl Node for TimedGate {
    type In = TimedBlock;
    type Out = TimedBlock;

    fn start(&mut self) -> FlowResult<()> {
        self.inner.start()
    }

    fn send(&mut self, (time, buffer): TimedBlock) -> FlowResult<Step<TimedBlock>> {
        let offset = match self.offset {
            Some(offset) => offset,
            None => {
                let offset =
                    ((self.start - time) * f64::from(self.samplerate)).round().max(0.0) as u64;
                self.offset = Some(offset);
                offset
            }
        };

        let frames = buffer.frames() as u64;
        if offset >= frames {
            self.offset = Some(offset - frames);
            return Ok(Step::Yield((time, buffer)));
        }
        self.offset = Some(0);
        if offset == 0 {
            return self.inner.send((time, buffer));
        }

        // The effect starts mid-buffer: process only the tail.
        let split = offset as usize;
        let head = buffer.slice_frames(0..split);
        let tail = buffer.slice_frames(split..buffer.frames());
        let tail_time = time + split as f64 / f64::from(self.samplerate);
        match self.inner.send((tail_time, tail))? {
            Step::Done => Ok(Step::Done),
            Step::Yield((_, processed)) => {
                let mut joined = head;
                joined.extend_from(&processed);
                Ok(Step::Yield((time, joined)))
            }
        }
    }

    fn close(&mut self) -> FlowResult<()> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(node: &mut MixerNode, buffers: usize) -> Vec<f32> {
        let mut out = Vec::new();
        for _ in 0..buffers {
            let Step::Yield(block) = node.send(()).unwrap() else {
                panic!("mixer stream must not end");
            };
            out.extend_from_slice(block.data());
        }
        out
    }

    fn ramp(n: usize) -> AudioBlock {
        AudioBlock::new((1..=n).map(|i| i as f32).collect(), 1)
    }

    #[test]
    fn silence_when_nothing_scheduled() {
        let (_mixer, mut node) = Mixer::new(100, 10, 1, 0.0);
        node.start().unwrap();
        assert!(render(&mut node, 3).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn play_places_sound_on_the_exact_sample() {
        let (mixer, mut node) = Mixer::new(100, 10, 1, 0.0);
        node.start().unwrap();
        // 4 samples at stream time 0.23 → samples 23..27.
        mixer
            .play(
                PlaySource::Signal {
                    block: ramp(4),
                    samplerate: 100,
                },
                PlayOptions::at(0.23),
            )
            .unwrap();
        let out = render(&mut node, 4);
        let mut expected = vec![0.0f32; 40];
        expected[23..27].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out, expected);
    }

    #[test]
    fn negative_offset_truncates_the_head() {
        let (mixer, mut node) = Mixer::new(100, 10, 1, 0.0);
        node.start().unwrap();
        // Scheduled 2 samples before the stream starts: first two samples
        // of the source are discarded.
        mixer
            .play(
                PlaySource::Signal {
                    block: ramp(4),
                    samplerate: 100,
                },
                PlayOptions::at(-0.02),
            )
            .unwrap();
        let out = render(&mut node, 1);
        assert_eq!(&out[..3], &[3.0, 4.0, 0.0]);
    }

    #[test]
    fn volume_is_db_scaled() {
        let (mixer, mut node) = Mixer::new(100, 10, 1, 0.0);
        node.start().unwrap();
        mixer
            .play(
                PlaySource::Signal {
                    block: AudioBlock::new(vec![1.0], 1),
                    samplerate: 100,
                },
                PlayOptions {
                    volume: -20.0,
                    time: Some(0.0),
                    ..PlayOptions::default()
                },
            )
            .unwrap();
        let out = render(&mut node, 1);
        assert!((out[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn overlapping_sounds_sum() {
        let (mixer, mut node) = Mixer::new(100, 10, 1, 0.0);
        node.start().unwrap();
        for _ in 0..2 {
            mixer
                .play(
                    PlaySource::Signal {
                        block: AudioBlock::new(vec![0.25; 5], 1),
                        samplerate: 100,
                    },
                    PlayOptions::at(0.0),
                )
                .unwrap();
        }
        let out = render(&mut node, 1);
        assert_eq!(&out[..5], &[0.5; 5]);
    }

    #[test]
    fn remove_effect_is_idempotent() {
        let (mixer, mut node) = Mixer::new(100, 10, 1, 0.0);
        node.start().unwrap();
        let key = mixer
            .play(
                PlaySource::Signal {
                    block: AudioBlock::new(vec![1.0; 100], 1),
                    samplerate: 100,
                },
                PlayOptions::at(0.0),
            )
            .unwrap();
        render(&mut node, 1);
        mixer.remove_effect(key);
        mixer.remove_effect(key);
        assert!(render(&mut node, 1).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn mixing_is_deterministic() {
        let run = || {
            let (mixer, mut node) = Mixer::new(1000, 16, 2, 0.0);
            node.start().unwrap();
            mixer
                .play(
                    PlaySource::Signal {
                        block: takt_dsp::pulse(1000, 100.0, 0.01, 1.0, Some(0.02)),
                        samplerate: 1000,
                    },
                    PlayOptions::at(0.005),
                )
                .unwrap();
            render(&mut node, 8)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn stream_time_advances_with_rendered_buffers() {
        let (mixer, mut node) = Mixer::new(100, 10, 1, 0.5);
        node.start().unwrap();
        assert_eq!(mixer.time(), 0.5);
        render(&mut node, 3);
        assert!((mixer.time() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn resampled_source_keeps_duration() {
        let (mixer, mut node) = Mixer::new(200, 20, 1, 0.0);
        node.start().unwrap();
        // 50 frames at 100 Hz = 0.5 s = 100 frames at 200 Hz.
        mixer
            .play(
                PlaySource::Signal {
                    block: AudioBlock::new(vec![0.5; 50], 1),
                    samplerate: 100,
                },
                PlayOptions::at(0.0),
            )
            .unwrap();
        let out = render(&mut node, 10);
        let lit = out.iter().filter(|s| s.abs() > 0.01).count();
        assert!((90..=110).contains(&lit), "lit samples: {}", lit);
    }
}
