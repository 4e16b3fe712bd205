//! Note events and the beatmap build step.
//!
//! Events are owned by the game loop; `register` runs exactly once per
//! event, shortly before its lifespan opens, and attaches the event's
//! drawers, sounds, and knock targets to the playfield. Target state is
//! shared between the event (for scoring) and the knock router (for
//! hits) through `Arc<Mutex<_>>` cells.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use takt_flow::{FlowResult, Key, Node, Step, ZIndex};
use takt_render::{Frame, drawer};
use takt_track::{Appearance, Beatmap, BeatmapSettings, Performance};

use crate::playfield::{Playfield, TargetEntry};

/// A scheduled gameplay event.
pub trait Event: Send {
    /// The event's visibility window `(start, end)` in game time.
    fn lifespan(&self) -> (f64, f64);

    /// Attach the event's drawers, sounds, and targets. Called exactly
    /// once, in ascending `lifespan().0` order.
    fn register(&self, field: &Playfield);

    /// Current score contribution.
    fn score(&self) -> u32 {
        0
    }

    /// Maximum attainable score.
    fn full_score(&self) -> u32 {
        0
    }

    /// Whether this event counts toward progress.
    fn is_target(&self) -> bool {
        false
    }

    /// Whether the event has settled.
    fn is_finished(&self) -> bool {
        true
    }

    /// Judged hits produced so far.
    fn performances(&self) -> Vec<Performance> {
        Vec::new()
    }
}

fn travel_time(speed: f64) -> f64 {
    1.0 / (0.5 * speed).abs()
}

fn scroll_pos(time: f64, speed: f64) -> impl Fn(f64, usize) -> f64 + Send {
    move |now, _width| (time - now) * 0.5 * speed
}

// ---------------------------------------------------------------------
// Plain events
// ---------------------------------------------------------------------

/// A lyric or label scrolling along the bar.
pub struct TextEvent {
    time: f64,
    speed: f64,
    text: Option<String>,
    sound: Option<PathBuf>,
    lifespan: (f64, f64),
}

impl Event for TextEvent {
    fn lifespan(&self) -> (f64, f64) {
        self.lifespan
    }

    fn register(&self, field: &Playfield) {
        if let Some(sound) = &self.sound {
            field.play(sound, Some(self.time), 0.0, 0.0);
        }
        if let Some(text) = &self.text {
            let appearance = Appearance::Plain(text.clone());
            field.draw_text(
                Box::new(scroll_pos(self.time, self.speed)),
                Box::new(move |_, _| appearance.clone()),
                Some(self.lifespan.0),
                Some(self.lifespan.1 - self.lifespan.0),
                ZIndex::of(&[-2.0, -self.time]),
                None,
            );
        }
    }
}

/// Reverses (or sets) the bar direction at its time.
pub struct FlipEvent {
    time: f64,
    flip: Option<bool>,
}

impl Event for FlipEvent {
    fn lifespan(&self) -> (f64, f64) {
        (self.time, self.time)
    }

    fn register(&self, field: &Playfield) {
        let handle = field.clone();
        let time = self.time;
        let start_time = field.start_time();
        let flip = self.flip;
        field.on_before_render(Box::new(drawer(
            move |now: f64, _screen: &mut takt_render::Screen| {
                if now - start_time < time {
                    return true;
                }
                let mut bar = handle.bar().lock().unwrap();
                bar.bar_flip = flip.unwrap_or(!bar.bar_flip);
                false
            },
        )));
    }
}

/// Ramps the sight anchor to a new position over its length.
pub struct ShiftEvent {
    time: f64,
    end: f64,
    shift: f64,
}

impl Event for ShiftEvent {
    fn lifespan(&self) -> (f64, f64) {
        (self.time, self.end)
    }

    fn register(&self, field: &Playfield) {
        let handle = field.clone();
        let (time, end, target) = (self.time, self.end, self.shift);
        let start_time = field.start_time();
        let mut origin: Option<f64> = None;
        field.on_before_render(Box::new(drawer(
            move |now: f64, _screen: &mut takt_render::Screen| {
                let now = now - start_time;
                if now < time {
                    return true;
                }
                let mut bar = handle.bar().lock().unwrap();
                let from = *origin.get_or_insert(bar.bar_shift);
                if now < end {
                    let speed = if end > time {
                        (target - from) / (end - time)
                    } else {
                        0.0
                    };
                    bar.bar_shift = from + speed * (now - time);
                    true
                } else {
                    bar.bar_shift = target;
                    false
                }
            },
        )));
    }
}

/// Adds a square-wave wobble to the sight position.
pub struct JiggleEvent {
    time: f64,
    end: f64,
    frequency: f64,
}

impl Event for JiggleEvent {
    fn lifespan(&self) -> (f64, f64) {
        (self.time, self.end)
    }

    fn register(&self, field: &Playfield) {
        let handle = field.clone();
        let (time, end, frequency) = (self.time, self.end, self.frequency);
        let start_time = field.start_time();
        let mut origin: Option<f64> = None;
        field.on_before_render(Box::new(drawer(
            move |now: f64, screen: &mut takt_render::Screen| {
                let now = now - start_time;
                if now < time {
                    return true;
                }
                let mut bar = handle.bar().lock().unwrap();
                let from = *origin.get_or_insert(bar.sight_shift);
                if now < end {
                    let turn = (now - time) * frequency;
                    let side = ((turn / 0.5).floor() as i64 % 2) * 2 - 1;
                    let content = handle.content_region(screen.width()).len().max(1);
                    bar.sight_shift = from + side as f64 / content as f64;
                    true
                } else {
                    bar.sight_shift = from;
                    false
                }
            },
        )));
    }
}

// ---------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------

/// Target behaviour shared by all judged notes.
trait TargetCore: Send + 'static {
    fn hit(&mut self, field: &Playfield, time: f64, strength: f32);
    fn finish(&mut self, field: &Playfield);
    fn is_finished(&self) -> bool;
}

/// Node adapter routing knocks into a target's state cell.
struct TargetNode<S: TargetCore> {
    core: Arc<Mutex<S>>,
    field: Playfield,
}

impl<S: TargetCore> Node for TargetNode<S> {
    type In = (f64, f32);
    type Out = ();

    fn send(&mut self, (time, strength): (f64, f32)) -> FlowResult<Step<()>> {
        let mut core = self.core.lock().unwrap();
        core.hit(&self.field, time, strength);
        if core.is_finished() {
            Ok(Step::Done)
        } else {
            Ok(Step::Yield(()))
        }
    }

    fn close(&mut self) -> FlowResult<()> {
        let mut core = self.core.lock().unwrap();
        if !core.is_finished() {
            core.finish(&self.field);
        }
        Ok(())
    }
}

/// What counts as the correct kind of knock for a oneshot note.
enum KeyRule {
    /// Strength strictly below the threshold.
    Soft { threshold: f32 },
    /// Strength at or above the threshold.
    Loud { threshold: f32 },
    /// Strength at or above the group watermark plus a margin.
    Incr {
        group: Arc<Mutex<IncrGroup>>,
        margin: f32,
    },
}

impl KeyRule {
    fn is_correct(&self, strength: f32) -> bool {
        match self {
            KeyRule::Soft { threshold } => strength < *threshold,
            KeyRule::Loud { threshold } => strength >= *threshold,
            KeyRule::Incr { group, margin } => {
                let threshold = (group.lock().unwrap().threshold + margin).clamp(0.0, 1.0);
                strength >= threshold
            }
        }
    }

    fn after_hit(&self, strength: f32) {
        if let KeyRule::Incr { group, .. } = self {
            let mut group = group.lock().unwrap();
            group.threshold = group.threshold.max(strength);
        }
    }
}

/// Shared state of a cluster of incr notes.
pub struct IncrGroup {
    /// Running strength watermark; later notes must knock at least this
    /// hard (plus the configured margin).
    pub threshold: f32,
    /// Number of notes in the group.
    pub total: u32,
    /// Base volume of the group in dB.
    pub volume: f32,
}

/// Glyphs and sound of a oneshot note kind.
struct OneshotStyle {
    appearance: Appearance,
    wrong_appearance: Appearance,
    sound: Option<PathBuf>,
}

/// A note's volume, fixed or swelling with its incr group.
enum NoteVolume {
    Fixed(f32),
    /// The `count`-th note of a group: the group's base volume plus
    /// `20·log10(0.2 + 0.8·(count−1)/total)` dB, resolved once the whole
    /// map is built and the group total is final.
    Swell {
        group: Arc<Mutex<IncrGroup>>,
        count: u32,
    },
}

impl NoteVolume {
    fn resolve(&self) -> f32 {
        match self {
            NoteVolume::Fixed(volume) => *volume,
            NoteVolume::Swell { group, count } => {
                let group = group.lock().unwrap();
                let ratio = f64::from(count - 1) / f64::from(group.total.max(1));
                group.volume + 20.0 * (0.2 + 0.8 * ratio).log10() as f32
            }
        }
    }
}

struct OneshotCore {
    time: f64,
    speed: f64,
    tolerance: f64,
    lifespan: (f64, f64),
    range: (f64, f64),
    appearance: Appearance,
    wrong_appearance: Appearance,
    rule: KeyRule,
    perf: Option<Performance>,
    finished_flag: Arc<AtomicBool>,
    drawer_key: Option<Key>,
}

impl OneshotCore {
    fn settle(&mut self, field: &Playfield, perf: Performance) {
        self.perf = Some(perf);
        self.finished_flag.store(true, Ordering::Relaxed);

        let Some(key) = self.drawer_key else {
            return;
        };
        if perf.is_miss() {
            // The missed glyph keeps scrolling out on its own.
        } else if perf.grade.is_wrong() {
            let appearance = self.wrong_appearance.clone();
            field.draw_target(
                Box::new(scroll_pos(self.time, self.speed)),
                Box::new(move |_, _| appearance.clone()),
                Some(self.lifespan.0),
                Some(self.lifespan.1 - self.lifespan.0),
                self.finished_flag.clone(),
                self.range.0,
                Some(key),
            );
        } else {
            field.remove_drawer(key);
        }
    }
}

impl TargetCore for OneshotCore {
    fn hit(&mut self, field: &Playfield, time: f64, strength: f32) {
        let correct = self.rule.is_correct(strength);
        let perf = Performance::judge(self.tolerance, self.time, Some(time), correct);
        field.set_perf_hint(perf, self.speed < 0.0);
        self.rule.after_hit(strength);
        self.settle(field, perf);
    }

    fn finish(&mut self, field: &Playfield) {
        let perf = Performance::judge(self.tolerance, self.time, None, true);
        self.settle(field, perf);
    }

    fn is_finished(&self) -> bool {
        self.perf.is_some()
    }
}

/// A soft, loud, or incr note: one knock, one grade.
pub struct OneshotNote {
    core: Arc<Mutex<OneshotCore>>,
    finished_flag: Arc<AtomicBool>,
    sound: Option<PathBuf>,
    volume: NoteVolume,
    full_score: u32,
    scores: Arc<BeatmapSettings>,
}

impl OneshotNote {
    fn new(
        beatmap: &Beatmap,
        settings: &Arc<BeatmapSettings>,
        beat: f64,
        speed: f64,
        volume: NoteVolume,
        style: OneshotStyle,
        rule: KeyRule,
    ) -> Self {
        let time = beatmap.time(beat);
        let travel = travel_time(speed);
        let tol = settings.failed_tolerance();
        let finished_flag = Arc::new(AtomicBool::new(false));
        let core = OneshotCore {
            time,
            speed,
            tolerance: settings.performance_tolerance,
            lifespan: (time - travel, time + travel),
            range: (time - tol, time + tol),
            appearance: style.appearance,
            wrong_appearance: style.wrong_appearance,
            rule,
            perf: None,
            finished_flag: finished_flag.clone(),
            drawer_key: None,
        };
        Self {
            core: Arc::new(Mutex::new(core)),
            finished_flag,
            sound: style.sound,
            volume,
            full_score: settings.max_score(),
            scores: settings.clone(),
        }
    }
}

impl Event for OneshotNote {
    fn lifespan(&self) -> (f64, f64) {
        self.core.lock().unwrap().lifespan
    }

    fn register(&self, field: &Playfield) {
        let (time, speed, lifespan, range, appearance) = {
            let core = self.core.lock().unwrap();
            (
                core.time,
                core.speed,
                core.lifespan,
                core.range,
                core.appearance.clone(),
            )
        };
        if let Some(sound) = &self.sound {
            field.play(sound, Some(time), self.volume.resolve(), 0.0);
        }
        let key = field.draw_target(
            Box::new(scroll_pos(time, speed)),
            Box::new(move |_, _| appearance.clone()),
            Some(lifespan.0),
            Some(lifespan.1 - lifespan.0),
            self.finished_flag.clone(),
            range.0,
            None,
        );
        self.core.lock().unwrap().drawer_key = Some(key);
        field.reset_sight(Some(range.0));
        field.add_target(TargetEntry {
            node: Box::new(TargetNode {
                core: self.core.clone(),
                field: field.clone(),
            }),
            start: Some(range.0),
            duration: Some(range.1 - range.0),
        });
    }

    fn score(&self) -> u32 {
        self.core
            .lock()
            .unwrap()
            .perf
            .map_or(0, |perf| self.scores.score_of(perf.grade))
    }

    fn full_score(&self) -> u32 {
        self.full_score
    }

    fn is_target(&self) -> bool {
        true
    }

    fn is_finished(&self) -> bool {
        self.finished_flag.load(Ordering::Relaxed)
    }

    fn performances(&self) -> Vec<Performance> {
        self.core.lock().unwrap().perf.into_iter().collect()
    }
}

struct RollCore {
    times: Vec<f64>,
    tolerance: f64,
    lifespan: (f64, f64),
    rolls: u32,
    perfs: Vec<Performance>,
    finished: bool,
    rock_keys: Vec<Key>,
}

impl TargetCore for RollCore {
    fn hit(&mut self, field: &Playfield, time: f64, _strength: f32) {
        self.rolls += 1;
        let index = (self.rolls - 1) as usize;
        if index < self.times.len() {
            self.perfs.push(Performance::judge(
                self.tolerance,
                self.times[index],
                Some(time),
                true,
            ));
            if let Some(&key) = self.rock_keys.get(index) {
                field.remove_drawer(key);
            }
        }
    }

    fn finish(&mut self, _field: &Playfield) {
        self.finished = true;
        for &time in &self.times[(self.rolls as usize).min(self.times.len())..] {
            self.perfs
                .push(Performance::judge(self.tolerance, time, None, true));
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// A drum roll: `number` rocks, scored non-monotonically past the count.
pub struct RollNote {
    core: Arc<Mutex<RollCore>>,
    finished_flag: Arc<AtomicBool>,
    speed: f64,
    volume: f32,
    number: u32,
    rock_score: u32,
    range: (f64, f64),
    appearance: Appearance,
    sound: Option<PathBuf>,
}

impl RollNote {
    fn new(
        beatmap: &Beatmap,
        settings: &Arc<BeatmapSettings>,
        beat: f64,
        length: f64,
        density: f64,
        speed: f64,
        volume: f32,
    ) -> Self {
        let time = beatmap.time(beat);
        let end = beatmap.time(beat + length);
        let number = (length * density).floor().max(0.0) as u32;
        let times: Vec<f64> = (0..number)
            .map(|i| beatmap.time(beat + f64::from(i) / density))
            .collect();
        let travel = travel_time(speed);
        let tol = settings.roll_tolerance;
        Self {
            core: Arc::new(Mutex::new(RollCore {
                times,
                tolerance: settings.performance_tolerance,
                lifespan: (time - travel, end + travel),
                rolls: 0,
                perfs: Vec::new(),
                finished: number == 0,
                rock_keys: Vec::new(),
            })),
            finished_flag: Arc::new(AtomicBool::new(number == 0)),
            speed,
            volume,
            number,
            rock_score: settings.roll_rock_score,
            range: (time - tol, end - tol),
            appearance: settings.roll_rock_appearance.clone(),
            sound: settings.roll_rock_sound.clone(),
        }
    }
}

impl Event for RollNote {
    fn lifespan(&self) -> (f64, f64) {
        self.core.lock().unwrap().lifespan
    }

    fn register(&self, field: &Playfield) {
        let (times, lifespan) = {
            let core = self.core.lock().unwrap();
            (core.times.clone(), core.lifespan)
        };
        let mut keys = Vec::with_capacity(times.len());
        for &rock_time in &times {
            if let Some(sound) = &self.sound {
                field.play(sound, Some(rock_time), self.volume, 0.0);
            }
            let appearance = self.appearance.clone();
            keys.push(field.draw_target(
                Box::new(scroll_pos(rock_time, self.speed)),
                Box::new(move |_, _| appearance.clone()),
                Some(lifespan.0),
                Some(lifespan.1 - lifespan.0),
                self.finished_flag.clone(),
                self.range.0,
                None,
            ));
        }
        self.core.lock().unwrap().rock_keys = keys;
        field.reset_sight(Some(self.range.0));

        let core = self.core.clone();
        let flag = self.finished_flag.clone();
        field.add_target(TargetEntry {
            node: Box::new(FlaggedTarget {
                node: TargetNode {
                    core,
                    field: field.clone(),
                },
                flag,
            }),
            start: Some(self.range.0),
            duration: Some(self.range.1 - self.range.0),
        });
    }

    fn score(&self) -> u32 {
        let rolls = self.core.lock().unwrap().rolls;
        if rolls < self.number {
            rolls * self.rock_score
        } else if rolls < 2 * self.number {
            (2 * self.number - rolls) * self.rock_score
        } else {
            0
        }
    }

    fn full_score(&self) -> u32 {
        self.number * self.rock_score
    }

    fn is_target(&self) -> bool {
        true
    }

    fn is_finished(&self) -> bool {
        self.finished_flag.load(Ordering::Relaxed)
    }

    fn performances(&self) -> Vec<Performance> {
        self.core.lock().unwrap().perfs.clone()
    }
}

/// Mirrors a core's finished state into an atomic for lock-free reads.
struct FlaggedTarget<S: TargetCore> {
    node: TargetNode<S>,
    flag: Arc<AtomicBool>,
}

impl<S: TargetCore> Node for FlaggedTarget<S> {
    type In = (f64, f32);
    type Out = ();

    fn send(&mut self, input: (f64, f32)) -> FlowResult<Step<()>> {
        let step = self.node.send(input)?;
        if self.node.core.lock().unwrap().is_finished() {
            self.flag.store(true, Ordering::Relaxed);
        }
        Ok(step)
    }

    fn close(&mut self) -> FlowResult<()> {
        self.node.close()?;
        self.flag.store(true, Ordering::Relaxed);
        Ok(())
    }
}

struct SpinCore {
    time: f64,
    end: f64,
    speed: f64,
    charge: f64,
    capacity: f64,
    finished: bool,
    finish_appearance: Appearance,
    finish_sustain: f64,
    drawer_key: Option<Key>,
}

impl TargetCore for SpinCore {
    fn hit(&mut self, field: &Playfield, _time: f64, strength: f32) {
        self.charge = (self.charge + f64::from(strength.min(1.0))).min(self.capacity);
        if self.charge >= self.capacity {
            self.finish(field);
        }
    }

    fn finish(&mut self, field: &Playfield) {
        self.finished = true;
        if self.charge < self.capacity {
            return;
        }
        if let Some(key) = self.drawer_key {
            field.remove_drawer(key);
        }
        let appearance = self.finish_appearance.clone();
        let reversed = self.speed < 0.0;
        field.draw_sight(
            Box::new(move |_, _| {
                if reversed {
                    // A directional finish glyph flips with the note.
                    if let Appearance::Directional(fwd, rev) = &appearance {
                        return Appearance::Directional(rev.clone(), fwd.clone());
                    }
                }
                appearance.clone()
            }),
            None,
            Some(self.finish_sustain),
        );
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// A spinner: accumulate charge before the window closes.
pub struct SpinNote {
    core: Arc<Mutex<SpinCore>>,
    finished_flag: Arc<AtomicBool>,
    volume: f32,
    full_score: u32,
    range: (f64, f64),
    lifespan: (f64, f64),
    times: Vec<f64>,
    disk_appearances: Vec<Appearance>,
    sound: Option<PathBuf>,
}

impl SpinNote {
    fn new(
        beatmap: &Beatmap,
        settings: &Arc<BeatmapSettings>,
        beat: f64,
        length: f64,
        density: f64,
        speed: f64,
        volume: f32,
    ) -> Self {
        let time = beatmap.time(beat);
        let end = beatmap.time(beat + length);
        let capacity = length * density;
        let times: Vec<f64> = (0..capacity.floor() as u32)
            .map(|i| beatmap.time(beat + f64::from(i) / density))
            .collect();
        let travel = travel_time(speed);
        let tol = settings.spin_tolerance;
        let finished = capacity <= 0.0;
        Self {
            core: Arc::new(Mutex::new(SpinCore {
                time,
                end,
                speed,
                charge: 0.0,
                capacity,
                finished,
                finish_appearance: settings.spin_finishing_appearance.clone(),
                finish_sustain: settings.spin_finish_sustain_time,
                drawer_key: None,
            })),
            finished_flag: Arc::new(AtomicBool::new(finished)),
            volume,
            full_score: if capacity > 0.0 { settings.spin_score } else { 0 },
            range: (time - tol, end + tol),
            lifespan: (time - travel, end + travel),
            times,
            disk_appearances: settings.spin_disk_appearances.clone(),
            sound: settings.spin_disk_sound.clone(),
        }
    }
}

impl Event for SpinNote {
    fn lifespan(&self) -> (f64, f64) {
        self.lifespan
    }

    fn register(&self, field: &Playfield) {
        for &step_time in &self.times {
            if let Some(sound) = &self.sound {
                field.play(sound, Some(step_time), self.volume, 0.0);
            }
        }

        let (time, end, speed) = {
            let core = self.core.lock().unwrap();
            (core.time, core.end, core.speed)
        };
        let pos = move |now: f64, _width: usize| {
            ((time - now).max(0.0) + (end - now).min(0.0)) * 0.5 * speed
        };
        let disks = self.disk_appearances.clone();
        let core_for_text = self.core.clone();
        let key = field.draw_target(
            Box::new(pos),
            Box::new(move |_, _| {
                let charge = core_for_text.lock().unwrap().charge;
                disks[(charge as usize) % disks.len()].clone()
            }),
            Some(self.lifespan.0),
            Some(self.lifespan.1 - self.lifespan.0),
            self.finished_flag.clone(),
            self.range.0,
            None,
        );
        self.core.lock().unwrap().drawer_key = Some(key);

        // The spinner hides the sight for its whole window.
        field.draw_sight(
            Box::new(|_, _| Appearance::Plain(String::new())),
            Some(self.range.0),
            Some(self.range.1 - self.range.0),
        );

        field.add_target(TargetEntry {
            node: Box::new(FlaggedTarget {
                node: TargetNode {
                    core: self.core.clone(),
                    field: field.clone(),
                },
                flag: self.finished_flag.clone(),
            }),
            start: Some(self.range.0),
            duration: Some(self.range.1 - self.range.0),
        });
    }

    fn score(&self) -> u32 {
        let core = self.core.lock().unwrap();
        if !core.finished {
            (f64::from(self.full_score) * core.charge / core.capacity.max(f64::MIN_POSITIVE))
                as u32
        } else if core.charge >= core.capacity && core.capacity > 0.0 {
            self.full_score
        } else {
            0
        }
    }

    fn full_score(&self) -> u32 {
        self.full_score
    }

    fn is_target(&self) -> bool {
        true
    }

    fn is_finished(&self) -> bool {
        self.finished_flag.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------
// Building from note descriptors
// ---------------------------------------------------------------------

/// One parsed beatmap entry, as handed over by the external parsers.
pub enum NoteSpec {
    /// Scrolling text, optionally with a sound.
    Text {
        /// Beat at which the text crosses the sight.
        beat: f64,
        /// The text to show.
        text: Option<String>,
        /// Sound file relative to the beatmap directory.
        sound: Option<PathBuf>,
        /// Scroll speed override.
        speed: Option<f64>,
    },
    /// Reverse (or set) the scroll direction.
    Flip {
        /// Beat of the flip.
        beat: f64,
        /// Explicit direction, or `None` to toggle.
        flip: Option<bool>,
    },
    /// Ramp the sight anchor to a new position.
    Shift {
        /// Starting beat.
        beat: f64,
        /// Ramp length in beats.
        length: f64,
        /// Target anchor position `0..=1`.
        shift: f64,
    },
    /// Wobble the sight.
    Jiggle {
        /// Starting beat.
        beat: f64,
        /// Length in beats.
        length: f64,
        /// Wobble frequency in Hz.
        frequency: f64,
    },
    /// A note answered by a quiet knock.
    Soft {
        /// Beat of the note.
        beat: f64,
        /// Scroll speed override.
        speed: Option<f64>,
        /// Volume override in dB.
        volume: Option<f32>,
    },
    /// A note answered by a hard knock.
    Loud {
        /// Beat of the note.
        beat: f64,
        /// Scroll speed override.
        speed: Option<f64>,
        /// Volume override in dB.
        volume: Option<f32>,
    },
    /// A note demanding ever harder knocks within its group.
    Incr {
        /// Beat of the note.
        beat: f64,
        /// Explicit group id; inferred from beat spacing when `None`.
        group: Option<String>,
        /// Scroll speed override.
        speed: Option<f64>,
        /// Volume override in dB.
        volume: Option<f32>,
    },
    /// A drum roll.
    Roll {
        /// Starting beat.
        beat: f64,
        /// Length in beats.
        length: f64,
        /// Rocks per beat.
        density: f64,
        /// Scroll speed override.
        speed: Option<f64>,
        /// Volume override in dB.
        volume: Option<f32>,
    },
    /// A spinner.
    Spin {
        /// Starting beat.
        beat: f64,
        /// Length in beats.
        length: f64,
        /// Charge steps per beat.
        density: f64,
        /// Scroll speed override.
        speed: Option<f64>,
        /// Volume override in dB.
        volume: Option<f32>,
    },
    /// Set default speed/volume for the following notes.
    SetContext {
        /// New default scroll speed.
        speed: Option<f64>,
        /// New default volume in dB.
        volume: Option<f32>,
    },
}

/// Build-time state threaded through the note list.
struct BuildContext {
    speed: f64,
    volume: f32,
    /// Incr groups in insertion order; each entry tracks its last beat.
    incrs: Vec<(String, Arc<Mutex<IncrGroup>>, f64)>,
    anonymous: u32,
}

impl BuildContext {
    fn new() -> Self {
        Self {
            speed: 1.0,
            volume: 0.0,
            incrs: Vec::new(),
            anonymous: 0,
        }
    }

    /// Find or create the group an incr note at `beat` belongs to.
    ///
    /// Without an explicit id the note joins the most recently used
    /// group whose last beat lies within one beat behind it.
    fn incr_group(
        &mut self,
        group: Option<String>,
        beat: f64,
        volume: f32,
    ) -> (Arc<Mutex<IncrGroup>>, u32) {
        let id = group.or_else(|| {
            self.incrs
                .iter()
                .rev()
                .find(|(_, _, last_beat)| beat - 1.0 <= *last_beat && *last_beat <= beat)
                .map(|(id, _, _)| id.clone())
        });
        let id = id.unwrap_or_else(|| {
            let fresh = format!("#{}", self.anonymous);
            self.anonymous += 1;
            fresh
        });

        let at = self.incrs.iter().position(|(key, _, _)| *key == id);
        let entry = match at {
            Some(at) => {
                let mut entry = self.incrs.remove(at);
                entry.2 = beat;
                entry
            }
            None => (
                id,
                Arc::new(Mutex::new(IncrGroup {
                    threshold: 0.0,
                    total: 0,
                    volume,
                })),
                beat,
            ),
        };
        let group = entry.1.clone();
        self.incrs.push(entry);

        let mut locked = group.lock().unwrap();
        locked.total += 1;
        let count = locked.total;
        drop(locked);
        (group, count)
    }
}

/// Build the event list for a beatmap from parsed note descriptors.
pub fn build_events(beatmap: &Beatmap, specs: Vec<NoteSpec>) -> Vec<Box<dyn Event>> {
    let settings = Arc::new(beatmap.settings.clone());
    let mut context = BuildContext::new();
    let mut events: Vec<Box<dyn Event>> = Vec::new();

    for spec in specs {
        match spec {
            NoteSpec::Text {
                beat,
                text,
                sound,
                speed,
            } => {
                let speed = speed.unwrap_or(context.speed);
                let time = beatmap.time(beat);
                let travel = travel_time(speed);
                events.push(Box::new(TextEvent {
                    time,
                    speed,
                    text,
                    sound: sound.map(|s| beatmap.path.join(s)),
                    lifespan: (time - travel, time + travel),
                }));
            }
            NoteSpec::Flip { beat, flip } => {
                events.push(Box::new(FlipEvent {
                    time: beatmap.time(beat),
                    flip,
                }));
            }
            NoteSpec::Shift { beat, length, shift } => {
                events.push(Box::new(ShiftEvent {
                    time: beatmap.time(beat),
                    end: beatmap.time(beat + length),
                    shift,
                }));
            }
            NoteSpec::Jiggle {
                beat,
                length,
                frequency,
            } => {
                events.push(Box::new(JiggleEvent {
                    time: beatmap.time(beat),
                    end: beatmap.time(beat + length),
                    frequency,
                }));
            }
            NoteSpec::Soft { beat, speed, volume } => {
                events.push(Box::new(OneshotNote::new(
                    beatmap,
                    &settings,
                    beat,
                    speed.unwrap_or(context.speed),
                    NoteVolume::Fixed(volume.unwrap_or(context.volume)),
                    OneshotStyle {
                        appearance: settings.soft_approach_appearance.clone(),
                        wrong_appearance: settings.soft_wrong_appearance.clone(),
                        sound: settings.soft_sound.as_ref().map(|s| beatmap.path.join(s)),
                    },
                    KeyRule::Soft {
                        threshold: settings.soft_threshold,
                    },
                )));
            }
            NoteSpec::Loud { beat, speed, volume } => {
                events.push(Box::new(OneshotNote::new(
                    beatmap,
                    &settings,
                    beat,
                    speed.unwrap_or(context.speed),
                    NoteVolume::Fixed(volume.unwrap_or(context.volume)),
                    OneshotStyle {
                        appearance: settings.loud_approach_appearance.clone(),
                        wrong_appearance: settings.loud_wrong_appearance.clone(),
                        sound: settings.loud_sound.as_ref().map(|s| beatmap.path.join(s)),
                    },
                    KeyRule::Loud {
                        threshold: settings.loud_threshold,
                    },
                )));
            }
            NoteSpec::Incr {
                beat,
                group,
                speed,
                volume,
            } => {
                let base_volume = volume.unwrap_or(context.volume);
                let (group, count) = context.incr_group(group, beat, base_volume);
                events.push(Box::new(OneshotNote::new(
                    beatmap,
                    &settings,
                    beat,
                    speed.unwrap_or(context.speed),
                    NoteVolume::Swell {
                        group: group.clone(),
                        count,
                    },
                    OneshotStyle {
                        appearance: settings.incr_approach_appearance.clone(),
                        wrong_appearance: settings.incr_wrong_appearance.clone(),
                        sound: settings.incr_sound.as_ref().map(|s| beatmap.path.join(s)),
                    },
                    KeyRule::Incr {
                        group,
                        margin: settings.incr_threshold,
                    },
                )));
            }
            NoteSpec::Roll {
                beat,
                length,
                density,
                speed,
                volume,
            } => {
                events.push(Box::new(RollNote::new(
                    beatmap,
                    &settings,
                    beat,
                    length,
                    density,
                    speed.unwrap_or(context.speed),
                    volume.unwrap_or(context.volume),
                )));
            }
            NoteSpec::Spin {
                beat,
                length,
                density,
                speed,
                volume,
            } => {
                events.push(Box::new(SpinNote::new(
                    beatmap,
                    &settings,
                    beat,
                    length,
                    density,
                    speed.unwrap_or(context.speed),
                    volume.unwrap_or(context.volume),
                )));
            }
            NoteSpec::SetContext { speed, volume } => {
                if let Some(speed) = speed {
                    context.speed = speed;
                }
                if let Some(volume) = volume {
                    context.volume = volume;
                }
            }
        }
    }

    events
}
