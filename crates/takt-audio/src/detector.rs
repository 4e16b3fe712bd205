//! The knock detector.
//!
//! Turns the microphone stream into `(time, strength, detected)` events:
//! framing → half-Hann/A-weighted power spectrum → spectral flux →
//! adaptive peak picking. Detected or not, one event is emitted per hop
//! and offered to a scheduler of listeners, so any number of game
//! handlers can observe the same stream.

use std::collections::VecDeque;

use takt_config::DetectorSettings;
use takt_dsp::{AudioBlock, Framer, OnsetStrength, PeakPicker, PowerSpectrum, WindowKind, unchunk};
use takt_flow::{
    BoxNode, FlowResult, Key, Lifecycle, Node, NodeExt, Scheduler, SchedulerHandle, Step, ZIndex,
    branch,
};

/// One analysis hop of the knock stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnockEvent {
    /// Event time in seconds on the input stream clock.
    pub time: f64,
    /// Normalised knock strength.
    pub strength: f32,
    /// Whether this hop is a detected onset.
    pub detected: bool,
}

/// Control handle of the knock detector.
#[derive(Clone)]
pub struct Detector {
    handle: SchedulerHandle<KnockEvent>,
    time_res: f64,
}

impl Detector {
    /// Build the detector for an input stream of
    /// `buffer_length`×`channels` blocks at `samplerate`.
    ///
    /// Returns the handle plus the node to drive from the input
    /// callback. When the callback buffer length differs from the
    /// analysis hop the node re-chunks internally.
    pub fn new(
        samplerate: u32,
        buffer_length: usize,
        channels: usize,
        settings: &DetectorSettings,
    ) -> (Detector, BoxNode<AudioBlock, ()>) {
        let hop = (f64::from(samplerate) * settings.time_res).round() as usize;
        let win = (f64::from(samplerate) / settings.freq_res).round() as usize;
        let to_hops = |seconds: f64| (seconds / settings.time_res).round() as usize;

        let picker = PeakPicker::new(
            to_hops(settings.pre_max),
            to_hops(settings.post_max),
            to_hops(settings.pre_avg),
            to_hops(settings.post_avg),
            to_hops(settings.wait),
            settings.delta,
        );
        let prepare = picker.delay();

        let onset = Framer::new(win, hop, channels)
            .pipe(PowerSpectrum::new(win, samplerate, channels, WindowKind::HalfHann, true))
            .pipe(OnsetStrength::new(1.0))
            .boxed();

        let (sched, handle) = Scheduler::new();
        let core = DetectorNode {
            onset,
            picker,
            sched,
            pending: std::iter::repeat_n((settings.knock_delay, 0.0f32), prepare).collect(),
            hop,
            samplerate,
            delay: settings.knock_delay,
            energy: settings.knock_energy,
            index: 0,
            life: Lifecycle::new(),
        };

        tracing::debug!(hop, win, prepare, "knock detector configured");

        let node: BoxNode<AudioBlock, ()> = if buffer_length == hop {
            Box::new(core)
        } else {
            Box::new(unchunk(core, hop, channels))
        };

        (
            Detector {
                handle,
                time_res: settings.time_res,
            },
            node,
        )
    }

    /// Analysis hop duration in seconds.
    pub fn time_res(&self) -> f64 {
        self.time_res
    }

    /// Attach a listener observing every knock event.
    ///
    /// The listener's outputs are ignored; its end of stream detaches it.
    pub fn add_listener<N>(&self, listener: N) -> Key
    where
        N: Node<In = KnockEvent> + 'static,
    {
        let key = Key::fresh();
        self.handle
            .insert(key, Box::new(branch(listener)), ZIndex::flat(0.0));
        key
    }

    /// Detach a listener. Idempotent.
    pub fn remove_listener(&self, key: Key) {
        self.handle.remove(key);
    }

    /// Call `on_knock(strength)` for every detection inside a time
    /// window; the callback returns `true` to stop listening early.
    ///
    /// `time = None` starts at the first observed event; `duration =
    /// None` listens forever.
    pub fn on_hit(
        &self,
        on_knock: impl FnMut(f32) -> bool + Send + 'static,
        time: Option<f64>,
        duration: Option<f64>,
    ) -> Key {
        self.add_listener(HitListener {
            on_knock,
            start: time,
            duration,
        })
    }
}

/// The node driven by the input audio callback, one hop per send.
struct DetectorNode {
    onset: BoxNode<AudioBlock, f32>,
    picker: PeakPicker,
    sched: Scheduler<KnockEvent>,
    /// `(time, strength)` pairs withheld until the picker's delayed
    /// verdict about them arrives.
    pending: VecDeque<(f64, f32)>,
    hop: usize,
    samplerate: u32,
    delay: f64,
    energy: f32,
    index: u64,
    life: Lifecycle,
}

impl Node for DetectorNode {
    type In = AudioBlock;
    type Out = ();

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()?;
        self.onset.start()?;
        self.picker.start()?;
        self.sched.start()
    }

    fn send(&mut self, input: AudioBlock) -> FlowResult<Step<()>> {
        self.life.running()?;
        let Step::Yield(strength) = self.onset.send(input)? else {
            return Ok(Step::Done);
        };
        let Step::Yield(detected) = self.picker.send(strength)? else {
            return Ok(Step::Done);
        };

        let time =
            self.index as f64 * self.hop as f64 / f64::from(self.samplerate) + self.delay;
        self.index += 1;
        self.pending.push_back((time, strength / self.energy));
        // The verdict just produced refers to the hop at the queue front.
        let (event_time, event_strength) =
            self.pending.pop_front().expect("pending is pre-filled");
        self.sched.send(KnockEvent {
            time: event_time,
            strength: event_strength,
            detected,
        })?;
        Ok(Step::Yield(()))
    }

    fn close(&mut self) -> FlowResult<()> {
        if self.life.close() {
            let sched = self.sched.close();
            let picker = self.picker.close();
            let onset = self.onset.close();
            sched.and(picker).and(onset)?;
        }
        Ok(())
    }
}

/// Windowed detection callback listener.
struct HitListener<F> {
    on_knock: F,
    start: Option<f64>,
    duration: Option<f64>,
}

impl<F> Node for HitListener<F>
where
    F: FnMut(f32) -> bool + Send,
{
    type In = KnockEvent;
    type Out = ();

    fn send(&mut self, event: KnockEvent) -> FlowResult<Step<()>> {
        let start = *self.start.get_or_insert(event.time);
        if event.time < start {
            return Ok(Step::Yield(()));
        }
        if let Some(duration) = self.duration
            && event.time >= start + duration
        {
            return Ok(Step::Done);
        }
        if event.detected && (self.on_knock)(event.strength) {
            return Ok(Step::Done);
        }
        Ok(Step::Yield(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn settings() -> DetectorSettings {
        DetectorSettings {
            // 10 ms hops, 100 Hz resolution at 1 kHz → hop 10, win 10.
            time_res: 0.01,
            freq_res: 100.0,
            pre_max: 0.03,
            post_max: 0.03,
            pre_avg: 0.03,
            post_avg: 0.03,
            wait: 0.03,
            delta: 1e-8,
            knock_delay: 0.0,
            knock_energy: 1.0,
        }
    }

    fn feed(node: &mut BoxNode<AudioBlock, ()>, signal: &[f32], block: usize) {
        for chunk in signal.chunks(block) {
            if chunk.len() == block {
                node.send(AudioBlock::new(chunk.to_vec(), 1)).unwrap();
            }
        }
    }

    #[test]
    fn impulse_timestamp_is_hop_accurate() {
        let sr = 1000;
        let hits = Arc::new(Mutex::new(Vec::new()));
        let log = hits.clone();
        let (detector, mut node) = Detector::new(sr, 10, 1, &settings());
        node.start().unwrap();
        detector.add_listener(takt_flow::map(move |ev: KnockEvent| {
            if ev.detected {
                log.lock().unwrap().push(ev.time);
            }
        }));

        let mut signal = vec![0.0f32; 600];
        signal[205] = 1.0; // hop 20 → 0.20 s
        feed(&mut node, &signal, 10);
        node.close().unwrap();

        let hits = hits.lock().unwrap();
        assert_eq!(hits.len(), 1, "hits: {:?}", hits);
        assert!(
            (hits[0] - 0.20).abs() <= 0.0101,
            "knock at {} s, expected ≈0.20 s",
            hits[0]
        );
    }

    #[test]
    fn rechunking_matches_native_hop() {
        let sr = 1000;
        let run = |buffer: usize| {
            let hits = Arc::new(Mutex::new(Vec::new()));
            let log = hits.clone();
            let (detector, mut node) = Detector::new(sr, buffer, 1, &settings());
            node.start().unwrap();
            detector.add_listener(takt_flow::map(move |ev: KnockEvent| {
                if ev.detected {
                    log.lock().unwrap().push(ev.time);
                }
            }));
            let mut signal = vec![0.0f32; 600];
            signal[305] = 1.0;
            feed(&mut node, &signal, buffer);
            node.close().unwrap();
            let out = hits.lock().unwrap().clone();
            out
        };
        // A 25-frame callback buffer must produce the same detections as
        // a hop-sized one.
        assert_eq!(run(10), run(25));
    }

    #[test]
    fn strength_is_energy_normalised() {
        let sr = 1000;
        let mut config = settings();
        config.knock_energy = 0.5;
        let peak = Arc::new(Mutex::new(0.0f32));
        let log = peak.clone();
        let (detector, mut node) = Detector::new(sr, 10, 1, &config);
        node.start().unwrap();
        detector.add_listener(takt_flow::map(move |ev: KnockEvent| {
            let mut peak = log.lock().unwrap();
            *peak = peak.max(ev.strength);
        }));

        let mut signal = vec![0.0f32; 400];
        signal[105] = 1.0;
        feed(&mut node, &signal, 10);
        node.close().unwrap();

        let halved_config = settings();
        let peak_halved = Arc::new(Mutex::new(0.0f32));
        let log = peak_halved.clone();
        let (detector, mut node) = Detector::new(sr, 10, 1, &halved_config);
        node.start().unwrap();
        detector.add_listener(takt_flow::map(move |ev: KnockEvent| {
            let mut peak = log.lock().unwrap();
            *peak = peak.max(ev.strength);
        }));
        let mut signal = vec![0.0f32; 400];
        signal[105] = 1.0;
        feed(&mut node, &signal, 10);
        node.close().unwrap();

        let a = *peak.lock().unwrap();
        let b = *peak_halved.lock().unwrap();
        assert!(a > 0.0);
        assert!((a - 2.0 * b).abs() < 1e-4 * a.max(1.0), "{} vs {}", a, b);
    }

    #[test]
    fn on_hit_window_expires() {
        let sr = 1000;
        let count = Arc::new(Mutex::new(0usize));
        let log = count.clone();
        let (detector, mut node) = Detector::new(sr, 10, 1, &settings());
        node.start().unwrap();
        detector.on_hit(
            move |_| {
                *log.lock().unwrap() += 1;
                false
            },
            Some(0.0),
            Some(0.25),
        );

        let mut signal = vec![0.0f32; 1000];
        signal[155] = 1.0; // inside the window
        signal[605] = 1.0; // outside the window
        feed(&mut node, &signal, 10);
        node.close().unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn removed_listener_stops_observing() {
        let sr = 1000;
        let count = Arc::new(Mutex::new(0usize));
        let log = count.clone();
        let (detector, mut node) = Detector::new(sr, 10, 1, &settings());
        node.start().unwrap();
        let key = detector.add_listener(takt_flow::map(move |ev: KnockEvent| {
            if ev.detected {
                *log.lock().unwrap() += 1;
            }
        }));

        let mut signal = vec![0.0f32; 300];
        signal[105] = 1.0;
        feed(&mut node, &signal, 10);
        detector.remove_listener(key);
        let mut signal = vec![0.0f32; 300];
        signal[105] = 1.0;
        feed(&mut node, &signal, 10);
        node.close().unwrap();
        assert_eq!(*count.lock().unwrap(), 1);
    }
}
