//! The playfield: layout, widgets, and knock routing.
//!
//! The playfield mediates between three clock domains. Events register
//! drawers on the render thread, sound plays on the mixer clock, and
//! knock handling runs on the detector thread; the playfield hands each
//! domain a node and carries shared state across them with atomics, a
//! snapshot cell for the spectrum string, and queues for sight/target
//! handoff. All game-facing times are relative to `start_time`.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use takt_audio::{Detector, KnockEvent, Mixer, PlayOptions, PlaySource};
use takt_config::PlayfieldSettings;
use takt_dsp::{AudioBlock, BrailleSpectrum, Framer, PowerSpectrum, WindowKind, unchunk};
use takt_flow::{
    BoxNode, FlowResult, Key, Node, NodeExt, Step, ZIndex, branch, map,
};
use takt_render::{Frame, Renderer, Screen, drawer};
use takt_track::{Appearance, Performance};

/// Position of a bar glyph: `f(game_time, screen_width)` in content units
/// (0 at the sight anchor, 1 one content-width to the right).
pub type PosFn = Box<dyn Fn(f64, usize) -> f64 + Send>;

/// Appearance of a bar glyph, possibly time-dependent.
pub type TextFn = Box<dyn FnMut(f64, usize) -> Appearance + Send>;

/// A sight override: `f(game_time, screen_width)` → glyph.
pub type SightFn = Box<dyn FnMut(f64, usize) -> Appearance + Send>;

/// A queued target: the judging node plus its active window.
pub struct TargetEntry {
    /// Node receiving `(game_time, strength)` for each detected knock.
    pub node: BoxNode<(f64, f32), ()>,
    /// Activation time; `None` means "as soon as it is dequeued".
    pub start: Option<f64>,
    /// Active window length; `None` keeps the target until it finishes.
    pub duration: Option<f64>,
}

struct SightEntry {
    drawer: Option<SightFn>,
    start: Option<f64>,
    duration: Option<f64>,
}

/// Scrolling-bar state owned by the render thread.
#[derive(Debug, Clone, Copy)]
pub struct BarState {
    /// Sight anchor position in the content region, `0..=1`.
    pub bar_shift: f64,
    /// Local sight offset relative to the anchor.
    pub sight_shift: f64,
    /// Whether the bar scrolls mirrored.
    pub bar_flip: bool,
}

/// Column layout of one frame.
struct Regions {
    icon: Range<usize>,
    header: Range<usize>,
    content: Range<usize>,
    footer: Range<usize>,
}

struct PlayfieldInner {
    mixer: Mixer,
    detector: Detector,
    renderer: Renderer,
    start_time: f64,
    settings: PlayfieldSettings,

    bar: Mutex<BarState>,
    spectrum: ArcSwap<String>,

    score: AtomicU32,
    full_score: AtomicU32,
    progress_permille: AtomicU32,
    clock_secs: AtomicU32,
    /// Strength of the latest knock, as `f32` bits; `u32::MAX` when idle.
    hit_strength: AtomicU32,
    hit_count: AtomicU64,

    target_tx: Sender<TargetEntry>,
    target_rx: Mutex<Option<Receiver<TargetEntry>>>,
    sight_tx: Sender<SightEntry>,
    sight_rx: Mutex<Option<Receiver<SightEntry>>>,

    perf_hint_key: Key,
}

impl PlayfieldInner {
    fn regions(&self, width: usize) -> Regions {
        let icon_w = self.settings.icon_width;
        let header_w = self.settings.header_width;
        let footer_w = self.settings.footer_width;
        let content_start = (icon_w + header_w + 2).min(width);
        let content_end = width.saturating_sub(footer_w + 2).max(content_start);
        Regions {
            icon: 0..icon_w.min(width),
            header: (icon_w + 1).min(width)..(icon_w + 1 + header_w).min(width),
            content: content_start..content_end,
            footer: width.saturating_sub(footer_w + 1)..width.saturating_sub(1),
        }
    }

    /// Draw `appearance` at bar position `pos` (content units).
    fn bar_draw(&self, screen: &mut Screen, pos: f64, appearance: &Appearance, reversed: bool) {
        let bar = *self.bar.lock().unwrap();
        let mut pos = pos + bar.bar_shift;
        if bar.bar_flip {
            pos = 1.0 - pos;
        }
        let content = self.regions(screen.width()).content;
        if content.is_empty() {
            return;
        }
        let index = content.start as f64 + pos * (content.len() - 1).max(0) as f64;
        let text = appearance.resolve(bar.bar_flip != reversed);
        screen.addstr(index, text, Some(&content));
    }
}

/// The playfield handle shared by events, widgets, and the game loop.
#[derive(Clone)]
pub struct Playfield {
    inner: Arc<PlayfieldInner>,
}

impl Playfield {
    /// Build a playfield over the three interface handles.
    ///
    /// `start_time` is the stream time of beat-time zero; every time the
    /// playfield exchanges with events is relative to it.
    pub fn new(
        mixer: Mixer,
        detector: Detector,
        renderer: Renderer,
        start_time: f64,
        settings: PlayfieldSettings,
    ) -> Playfield {
        let (target_tx, target_rx) = channel();
        let (sight_tx, sight_rx) = channel();
        let bar = BarState {
            bar_shift: settings.bar_shift,
            sight_shift: settings.sight_shift,
            bar_flip: settings.bar_flip,
        };
        Playfield {
            inner: Arc::new(PlayfieldInner {
                mixer,
                detector,
                renderer,
                start_time,
                settings,
                bar: Mutex::new(bar),
                spectrum: ArcSwap::from_pointee(String::new()),
                score: AtomicU32::new(0),
                full_score: AtomicU32::new(0),
                progress_permille: AtomicU32::new(0),
                clock_secs: AtomicU32::new(0),
                hit_strength: AtomicU32::new(u32::MAX),
                hit_count: AtomicU64::new(0),
                target_tx,
                target_rx: Mutex::new(Some(target_rx)),
                sight_tx,
                sight_rx: Mutex::new(Some(sight_rx)),
                perf_hint_key: Key::fresh(),
            }),
        }
    }

    /// Stream time of game time zero.
    pub fn start_time(&self) -> f64 {
        self.inner.start_time
    }

    /// The scrolling-bar state cell.
    pub fn bar(&self) -> &Mutex<BarState> {
        &self.inner.bar
    }

    /// The content column range for a line of `width` cells.
    pub fn content_region(&self, width: usize) -> Range<usize> {
        self.inner.regions(width).content
    }

    /// Register the standard handlers: the spectrum effect on the mixer,
    /// the knock and hit listeners on the detector, and the status and
    /// sight drawers on the renderer.
    pub fn register_handlers(&self) {
        self.inner.mixer.add_effect(self.spectrum_effect(), None, -1.0, None);
        self.inner.detector.add_listener(KnockRouter::new(self));
        self.inner.detector.add_listener(self.hit_listener());
        self.inner.renderer.add_drawer(
            drawer(self.status_drawer()).boxed(),
            ZIndex::of(&[-3.0]),
            None,
        );
        self.inner.renderer.add_drawer(
            Box::new(self.sight_drawer()),
            ZIndex::of(&[2.0]),
            None,
        );
    }

    // ------------------------------------------------------------------
    // Methods used by events
    // ------------------------------------------------------------------

    /// Play a sound file at a game time. Decode failures are logged and
    /// swallowed: a missing sample must not kill the run.
    pub fn play(&self, path: &std::path::Path, time: Option<f64>, volume: f32, zindex: f64) {
        let options = PlayOptions {
            volume,
            time: time.map(|t| t + self.inner.start_time),
            zindex,
            ..PlayOptions::default()
        };
        if let Err(err) = self
            .inner
            .mixer
            .play(PlaySource::File(path.to_path_buf()), options)
        {
            tracing::warn!(path = %path.display(), %err, "skipping unplayable sound");
        }
    }

    /// Queue a target for knock routing.
    pub fn add_target(&self, entry: TargetEntry) {
        let _ = self.inner.target_tx.send(entry);
    }

    /// Override the sight with a drawer from `start` for `duration`.
    pub fn draw_sight(&self, sight: SightFn, start: Option<f64>, duration: Option<f64>) {
        let _ = self.inner.sight_tx.send(SightEntry {
            drawer: Some(sight),
            start,
            duration,
        });
    }

    /// Restore the default sight from `start` on.
    pub fn reset_sight(&self, start: Option<f64>) {
        let _ = self.inner.sight_tx.send(SightEntry {
            drawer: None,
            start,
            duration: None,
        });
    }

    /// Draw text moving along the bar. Returns the drawer key.
    pub fn draw_text(
        &self,
        pos: PosFn,
        text: TextFn,
        start: Option<f64>,
        duration: Option<f64>,
        zindex: ZIndex,
        key: Option<Key>,
    ) -> Key {
        let node = BarNode {
            inner: self.inner.clone(),
            pos,
            text,
            reversed: false,
            start,
            duration,
        };
        self.inner.renderer.add_drawer(Box::new(node), zindex, key)
    }

    /// Draw a target glyph; its layer tracks the target's state so
    /// finished targets sink below active ones.
    pub fn draw_target(
        &self,
        pos: PosFn,
        text: TextFn,
        start: Option<f64>,
        duration: Option<f64>,
        finished: Arc<AtomicBool>,
        range_start: f64,
        key: Option<Key>,
    ) -> Key {
        let node = BarNode {
            inner: self.inner.clone(),
            pos,
            text,
            reversed: false,
            start,
            duration,
        };
        let zindex = ZIndex::dynamic(move || {
            vec![
                0.0,
                f64::from(!finished.load(Ordering::Relaxed)),
                -range_start,
            ]
        });
        self.inner.renderer.add_drawer(Box::new(node), zindex, key)
    }

    /// Remove a drawer by key. Idempotent.
    pub fn remove_drawer(&self, key: Key) {
        self.inner.renderer.remove_drawer(key);
    }

    /// Pop the grade hint beside the sight.
    pub fn set_perf_hint(&self, perf: Performance, reversed: bool) {
        let Some(appearance) = self
            .inner
            .settings
            .performances_appearances
            .get(&perf.grade)
            .cloned()
        else {
            return;
        };
        let anchor = self.inner.bar.lock().unwrap().sight_shift;
        let duration = self.inner.settings.performance_sustain_time;
        let node = BarNode {
            inner: self.inner.clone(),
            pos: Box::new(move |_, _| anchor),
            text: Box::new(move |_, _| appearance.clone()),
            reversed,
            start: None,
            duration: Some(duration),
        };
        self.inner
            .renderer
            .add_drawer(Box::new(node), ZIndex::of(&[1.0]), Some(self.inner.perf_hint_key));
    }

    /// Run a raw drawer before every bar drawer.
    pub fn on_before_render(&self, node: BoxNode<Frame, Frame>) -> Key {
        self.inner.renderer.add_drawer(node, ZIndex::bottom(), None)
    }

    /// Run a raw drawer after every other drawer.
    pub fn on_after_render(&self, node: BoxNode<Frame, Frame>) -> Key {
        self.inner
            .renderer
            .add_drawer(node, ZIndex::of(&[f64::INFINITY]), None)
    }

    // ------------------------------------------------------------------
    // Status shared with the game loop
    // ------------------------------------------------------------------

    /// Update the score line (called from the game thread each tick).
    pub fn set_status(&self, score: u32, full_score: u32, progress: f64, clock: f64) {
        self.inner.score.store(score, Ordering::Relaxed);
        self.inner.full_score.store(full_score, Ordering::Relaxed);
        self.inner
            .progress_permille
            .store((progress.clamp(0.0, 1.0) * 1000.0).round() as u32, Ordering::Relaxed);
        self.inner
            .clock_secs
            .store(clock.max(0.0) as u32, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Handler nodes
    // ------------------------------------------------------------------

    /// The knock-routing listener node. Consumed by
    /// [`Playfield::register_handlers`]; take it directly (at most once)
    /// to drive routing without a live detector.
    pub fn knock_router(&self) -> impl Node<In = KnockEvent, Out = ()> + 'static {
        KnockRouter::new(self)
    }

    fn hit_listener(&self) -> impl Node<In = KnockEvent, Out = ()> + 'static {
        let inner = self.inner.clone();
        map(move |event: KnockEvent| {
            if event.detected {
                inner
                    .hit_strength
                    .store(event.strength.min(1.0).to_bits(), Ordering::Relaxed);
                inner.hit_count.fetch_add(1, Ordering::Relaxed);
            }
        })
    }

    fn status_drawer(&self) -> impl FnMut(f64, &mut Screen) -> bool + Send + 'static {
        let inner = self.inner.clone();
        let score_width = inner.settings.header_width.saturating_sub(1);
        let full_width = score_width / 2;
        let score_digits = score_width - full_width;
        let progress_width = inner.settings.footer_width.saturating_sub(6);
        move |_time, screen| {
            let regions = inner.regions(screen.width());

            let spectrum = inner.spectrum.load();
            screen.addstr(
                regions.icon.start as f64,
                &format!("{:^width$}", spectrum.as_str(), width = regions.icon.len()),
                Some(&regions.icon),
            );

            let score = inner.score.load(Ordering::Relaxed);
            let full = inner.full_score.load(Ordering::Relaxed);
            screen.addstr(regions.header.start as f64 - 1.0, "[", None);
            screen.addstr(regions.header.end as f64, "]", None);
            screen.addstr(
                regions.header.start as f64,
                &format!("{score:0score_digits$}/{full:0full_width$}"),
                Some(&regions.header),
            );

            let permille = inner.progress_permille.load(Ordering::Relaxed);
            let secs = inner.clock_secs.load(Ordering::Relaxed);
            let progress = format!("{:.1}%", permille as f64 / 10.0);
            screen.addstr(regions.footer.start as f64 - 1.0, "[", None);
            screen.addstr(regions.footer.end as f64, "]", None);
            screen.addstr(
                regions.footer.start as f64,
                &format!(
                    "{progress:>progress_width$}|{:02}:{:02}",
                    secs / 60,
                    secs % 60
                ),
                Some(&regions.footer),
            );
            true
        }
    }

    fn sight_drawer(&self) -> SightNode {
        SightNode {
            inner: self.inner.clone(),
            rx: self
                .inner
                .sight_rx
                .lock()
                .unwrap()
                .take()
                .expect("sight drawer built twice"),
            waiting: Vec::new(),
            active: None,
            hit_seen: 0,
            hit_strength: 0.0,
            hit_time: None,
        }
    }

    /// The mixer effect feeding the spectrum widget.
    fn spectrum_effect(&self) -> BoxNode<takt_audio::TimedBlock, takt_audio::TimedBlock> {
        let inner = self.inner.clone();
        let samplerate = inner.mixer.samplerate();
        let channels = inner.mixer.channels();
        let hop = (f64::from(samplerate) * inner.settings.spec_time_res).round() as usize;
        let win = (f64::from(samplerate) / inner.settings.spec_freq_res).round() as usize;
        let sink = SpectrumSink::new(inner, samplerate, channels, win, hop);
        branch(map(|(_, block): takt_audio::TimedBlock| block).pipe(unchunk(sink, hop, channels)))
            .boxed()
    }
}

/// Drawer that writes a moving bar glyph while its window is open.
struct BarNode {
    inner: Arc<PlayfieldInner>,
    pos: PosFn,
    text: TextFn,
    reversed: bool,
    start: Option<f64>,
    duration: Option<f64>,
}

impl Node for BarNode {
    type In = Frame;
    type Out = Frame;

    fn send(&mut self, (time, mut screen): Frame) -> FlowResult<Step<Frame>> {
        let time = time - self.inner.start_time;
        let start = *self.start.get_or_insert(time);
        if time < start {
            return Ok(Step::Yield((time + self.inner.start_time, screen)));
        }
        if let Some(duration) = self.duration
            && time >= start + duration
        {
            return Ok(Step::Done);
        }
        let width = screen.width();
        let pos = (self.pos)(time, width);
        let appearance = (self.text)(time, width);
        self.inner.bar_draw(&mut screen, pos, &appearance, self.reversed);
        Ok(Step::Yield((time + self.inner.start_time, screen)))
    }
}

/// The sight drawer: hit feedback, overrides, and the idle glyph.
struct SightNode {
    inner: Arc<PlayfieldInner>,
    rx: Receiver<SightEntry>,
    waiting: Vec<SightEntry>,
    active: Option<(Option<SightFn>, f64, Option<f64>)>,
    hit_seen: u64,
    hit_strength: f64,
    hit_time: Option<f64>,
}

impl Node for SightNode {
    type In = Frame;
    type Out = Frame;

    fn send(&mut self, (time, mut screen): Frame) -> FlowResult<Step<Frame>> {
        let game_time = time - self.inner.start_time;
        let settings = &self.inner.settings;

        let count = self.inner.hit_count.load(Ordering::Relaxed);
        if count != self.hit_seen {
            self.hit_seen = count;
            let bits = self.inner.hit_strength.load(Ordering::Relaxed);
            if bits != u32::MAX {
                self.hit_strength = f64::from(f32::from_bits(bits));
                self.hit_time = Some(game_time);
            }
        }
        if let Some(hit_time) = self.hit_time
            && game_time - hit_time >= settings.hit_decay_time.max(settings.hit_sustain_time)
        {
            self.hit_time = None;
        }

        while let Ok(mut entry) = self.rx.try_recv() {
            entry.start.get_or_insert(game_time);
            self.waiting.push(entry);
        }
        self.waiting
            .sort_by(|a, b| a.start.unwrap().total_cmp(&b.start.unwrap()));
        while let Some(first) = self.waiting.first()
            && first.start.unwrap() <= game_time
        {
            let entry = self.waiting.remove(0);
            self.active = Some((entry.drawer, entry.start.unwrap(), entry.duration));
        }
        if let Some((_, start, Some(duration))) = &self.active
            && start + duration <= game_time
        {
            self.active = None;
        }

        // An explicit reset entry (no drawer) falls through to the
        // default sight, as does no entry at all.
        let width = screen.width();
        let appearance = if let Some((Some(sight), _, _)) = &mut self.active {
            sight(game_time, width)
        } else {
            self.default_sight(game_time)
        };

        let anchor = self.inner.bar.lock().unwrap().sight_shift;
        self.inner.bar_draw(&mut screen, anchor, &appearance, false);
        Ok(Step::Yield((time, screen)))
    }
}

impl SightNode {
    fn default_sight(&self, game_time: f64) -> Appearance {
        let settings = &self.inner.settings;
        let glyphs = &settings.sight_appearances;
        let index = match self.hit_time {
            Some(hit_time) => {
                let strength = (self.hit_strength
                    - (game_time - hit_time) / settings.hit_decay_time)
                    .clamp(0.0, 1.0);
                let mut loudness = (strength * (glyphs.len() - 1) as f64) as usize;
                if game_time - hit_time < settings.hit_sustain_time {
                    loudness = loudness.max(1);
                }
                loudness
            }
            None => 0,
        };
        glyphs[index.min(glyphs.len() - 1)].clone()
    }
}

/// Routes detected knocks to the single active target.
struct KnockRouter {
    field: Playfield,
    rx: Receiver<TargetEntry>,
    waiting: Vec<(BoxNode<(f64, f32), ()>, f64, Option<f64>)>,
    active: Option<(BoxNode<(f64, f32), ()>, f64, Option<f64>)>,
}

impl KnockRouter {
    fn new(field: &Playfield) -> Self {
        Self {
            field: field.clone(),
            rx: field
                .inner
                .target_rx
                .lock()
                .unwrap()
                .take()
                .expect("knock router built twice"),
            waiting: Vec::new(),
            active: None,
        }
    }
}

impl Node for KnockRouter {
    type In = KnockEvent;
    type Out = ();

    fn send(&mut self, event: KnockEvent) -> FlowResult<Step<()>> {
        let time = event.time - self.field.inner.start_time;

        loop {
            while let Ok(entry) = self.rx.try_recv() {
                let start = entry.start.unwrap_or(time);
                self.waiting.push((entry.node, start, entry.duration));
            }
            self.waiting.sort_by(|a, b| a.1.total_cmp(&b.1));

            if self.active.is_none()
                && let Some(first) = self.waiting.first()
                && first.1 <= time
            {
                let (mut node, start, duration) = self.waiting.remove(0);
                node.start()?;
                self.active = Some((node, start, duration));
            }

            if let Some((_, start, Some(duration))) = &self.active
                && start + duration <= time
            {
                let (mut node, _, _) = self.active.take().unwrap();
                node.close()?;
                continue;
            }
            break;
        }

        if event.detected
            && let Some((node, _, _)) = &mut self.active
        {
            if node.send((time, event.strength.min(1.0)))?.is_done() {
                let (mut node, _, _) = self.active.take().unwrap();
                node.close()?;
            }
        }
        Ok(Step::Yield(()))
    }

    fn close(&mut self) -> FlowResult<()> {
        if let Some((mut node, _, _)) = self.active.take() {
            node.close()?;
        }
        Ok(())
    }
}

/// Consumes hop-sized output blocks and repaints the braille spectrum.
struct SpectrumSink {
    inner: Arc<PlayfieldInner>,
    analysis: BoxNode<AudioBlock, String>,
}

impl SpectrumSink {
    fn new(
        inner: Arc<PlayfieldInner>,
        samplerate: u32,
        channels: usize,
        win: usize,
        hop: usize,
    ) -> Self {
        let decay =
            (hop as f64 / f64::from(samplerate) / inner.settings.spec_decay_time) as f32;
        let analysis = Framer::new(win, hop, channels)
            .pipe(PowerSpectrum::new(win, samplerate, channels, WindowKind::Hann, true))
            .pipe(BrailleSpectrum::new(inner.settings.spec_width, win, samplerate, decay))
            .boxed();
        Self { inner, analysis }
    }
}

impl Node for SpectrumSink {
    type In = AudioBlock;
    type Out = ();

    fn start(&mut self) -> FlowResult<()> {
        self.analysis.start()
    }

    fn send(&mut self, input: AudioBlock) -> FlowResult<Step<()>> {
        let Step::Yield(text) = self.analysis.send(input)? else {
            return Ok(Step::Done);
        };
        self.inner.spectrum.store(Arc::new(text));
        Ok(Step::Yield(()))
    }

    fn close(&mut self) -> FlowResult<()> {
        self.analysis.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use takt_config::DetectorSettings;

    fn handles() -> (Mixer, Detector, Renderer) {
        let (mixer, _mixer_node) = Mixer::new(1000, 10, 1, 0.0);
        let (detector, _det_node) = Detector::new(1000, 10, 1, &DetectorSettings::default());
        let (renderer, _render_node) = Renderer::new(60, 60.0, 0.0);
        (mixer, detector, renderer)
    }

    fn field() -> Playfield {
        let (mixer, detector, renderer) = handles();
        Playfield::new(mixer, detector, renderer, 0.0, PlayfieldSettings::default())
    }

    #[test]
    fn regions_partition_the_line() {
        let field = field();
        let regions = field.inner.regions(60);
        // icon 8 | sep | header 11 | sep | content | sep | footer 12 | sep
        assert_eq!(regions.icon, 0..8);
        assert_eq!(regions.header, 9..20);
        assert_eq!(regions.content, 21..46);
        assert_eq!(regions.footer, 47..59);
    }

    #[test]
    fn bar_draw_maps_positions_into_content() {
        let field = field();
        field.bar().lock().unwrap().bar_shift = 0.0;
        let mut screen = Screen::new(60);
        field
            .inner
            .bar_draw(&mut screen, 0.0, &Appearance::from("X"), false);
        assert_eq!(screen.char_at(21), 'X');
        let mut screen = Screen::new(60);
        field
            .inner
            .bar_draw(&mut screen, 1.0, &Appearance::from("Y"), false);
        assert_eq!(screen.char_at(45), 'Y');
    }

    #[test]
    fn bar_flip_mirrors_and_selects_reverse_glyph() {
        let field = field();
        {
            let mut bar = field.bar().lock().unwrap();
            bar.bar_shift = 0.0;
            bar.bar_flip = true;
        }
        let mut screen = Screen::new(60);
        field.inner.bar_draw(
            &mut screen,
            0.0,
            &Appearance::from(("F", "R")),
            false,
        );
        // pos 0 flips to 1 → right edge of content, reverse glyph.
        assert_eq!(screen.char_at(45), 'R');
    }

    #[test]
    fn bar_draw_clips_to_content() {
        let field = field();
        field.bar().lock().unwrap().bar_shift = 0.0;
        let mut screen = Screen::new(60);
        field
            .inner
            .bar_draw(&mut screen, 2.0, &Appearance::from("X"), false);
        // Far off the right edge: nothing lands in the status columns.
        for i in 46..60 {
            assert_eq!(screen.char_at(i), ' ', "column {} dirtied", i);
        }
    }

    #[test]
    fn status_drawer_formats_score_and_progress() {
        let field = field();
        field.set_status(123, 456, 0.5, 61.0);
        let mut draw = field.status_drawer();
        let mut screen = Screen::new(60);
        assert!(draw(0.0, &mut screen));
        let line = screen.display();
        assert!(line.contains("[00123/00456]"), "line: {line:?}");
        assert!(line.contains("[ 50.0%|01:01]"), "line: {line:?}");
    }
}
