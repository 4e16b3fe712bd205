//! Beatmap metadata and difficulty settings.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::appearance::Appearance;
use crate::judge::PerformanceGrade;

/// Difficulty, scoring, and note-skin settings of a beatmap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatmapSettings {
    /// Base judgement tolerance in seconds; the grade ladder is built
    /// from odd multiples of it.
    pub performance_tolerance: f64,
    /// Knock strength below which a soft note counts as correct.
    pub soft_threshold: f32,
    /// Knock strength at or above which a loud note counts as correct.
    pub loud_threshold: f32,
    /// Margin added to an incr group's running threshold.
    pub incr_threshold: f32,
    /// Judgement window slack for rolls, in seconds.
    pub roll_tolerance: f64,
    /// Judgement window slack for spins, in seconds.
    pub spin_tolerance: f64,

    /// Score of each grade.
    pub performances_scores: HashMap<PerformanceGrade, u32>,
    /// Score of a single roll rock.
    pub roll_rock_score: u32,
    /// Score of a completed spin.
    pub spin_score: u32,

    /// Soft note glyph while approaching.
    pub soft_approach_appearance: Appearance,
    /// Soft note glyph after a wrong-key hit.
    pub soft_wrong_appearance: Appearance,
    /// Sound played at a soft note's time.
    pub soft_sound: Option<PathBuf>,
    /// Loud note glyph while approaching.
    pub loud_approach_appearance: Appearance,
    /// Loud note glyph after a wrong-key hit.
    pub loud_wrong_appearance: Appearance,
    /// Sound played at a loud note's time.
    pub loud_sound: Option<PathBuf>,
    /// Incr note glyph while approaching.
    pub incr_approach_appearance: Appearance,
    /// Incr note glyph after a wrong-key hit.
    pub incr_wrong_appearance: Appearance,
    /// Sound played at an incr note's time.
    pub incr_sound: Option<PathBuf>,
    /// Roll rock glyph.
    pub roll_rock_appearance: Appearance,
    /// Sound played at each roll rock's time.
    pub roll_rock_sound: Option<PathBuf>,
    /// Spin disk animation frames, indexed by accumulated charge.
    pub spin_disk_appearances: Vec<Appearance>,
    /// Glyph flashed at the sight when a spin completes.
    pub spin_finishing_appearance: Appearance,
    /// How long the finishing glyph stays, in seconds.
    pub spin_finish_sustain_time: f64,
    /// Sound played at each spin step's time.
    pub spin_disk_sound: Option<PathBuf>,
}

impl Default for BeatmapSettings {
    fn default() -> Self {
        use PerformanceGrade::*;
        let performances_scores = HashMap::from([
            (Miss, 0),
            (LateFailed, 0),
            (LateBad, 2),
            (LateGood, 8),
            (Perfect, 16),
            (EarlyGood, 8),
            (EarlyBad, 2),
            (EarlyFailed, 0),
            (LateFailedWrong, 0),
            (LateBadWrong, 1),
            (LateGoodWrong, 4),
            (PerfectWrong, 8),
            (EarlyGoodWrong, 4),
            (EarlyBadWrong, 1),
            (EarlyFailedWrong, 0),
        ]);
        Self {
            performance_tolerance: 0.02,
            soft_threshold: 0.5,
            loud_threshold: 0.5,
            incr_threshold: -0.1,
            roll_tolerance: 0.10,
            spin_tolerance: 0.10,
            performances_scores,
            roll_rock_score: 2,
            spin_score: 16,
            soft_approach_appearance: "□".into(),
            soft_wrong_appearance: "⬚".into(),
            soft_sound: Some(PathBuf::from("samples/soft.wav")),
            loud_approach_appearance: "■".into(),
            loud_wrong_appearance: "⬚".into(),
            loud_sound: Some(PathBuf::from("samples/loud.wav")),
            incr_approach_appearance: "⬒".into(),
            incr_wrong_appearance: "⬚".into(),
            incr_sound: Some(PathBuf::from("samples/incr.wav")),
            roll_rock_appearance: "◎".into(),
            roll_rock_sound: Some(PathBuf::from("samples/rock.wav")),
            spin_disk_appearances: vec!["◴".into(), "◵".into(), "◶".into(), "◷".into()],
            spin_finishing_appearance: "☺".into(),
            spin_finish_sustain_time: 0.1,
            spin_disk_sound: Some(PathBuf::from("samples/disk.wav")),
        }
    }
}

impl BeatmapSettings {
    /// The widest judgement window: `7 × performance_tolerance`.
    pub fn failed_tolerance(&self) -> f64 {
        self.performance_tolerance * 7.0
    }

    /// Score of `grade`, zero when unlisted.
    pub fn score_of(&self, grade: PerformanceGrade) -> u32 {
        self.performances_scores.get(&grade).copied().unwrap_or(0)
    }

    /// The highest single-note score in the table.
    pub fn max_score(&self) -> u32 {
        self.performances_scores.values().copied().max().unwrap_or(0)
    }
}

/// A playable beatmap: metadata plus timing.
///
/// Event lists are produced externally (the file parsers are not part of
/// the engine); the engine needs only the timing base and settings here.
#[derive(Debug, Clone)]
pub struct Beatmap {
    /// Directory the beatmap's relative asset paths resolve against.
    pub path: PathBuf,
    /// Free-form description shown in menus.
    pub info: String,
    /// Music file relative to `path`, if any.
    pub audio: Option<PathBuf>,
    /// Music volume in dB.
    pub volume: f32,
    /// Wall time of beat 0, in seconds.
    pub offset: f64,
    /// Tempo in beats per minute.
    pub tempo: f64,
    /// Difficulty and skin settings.
    pub settings: BeatmapSettings,
}

impl Default for Beatmap {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            info: String::new(),
            audio: None,
            volume: 0.0,
            offset: 0.0,
            tempo: 60.0,
            settings: BeatmapSettings::default(),
        }
    }
}

impl Beatmap {
    /// Wall time of `beat`.
    pub fn time(&self, beat: f64) -> f64 {
        self.offset + beat * 60.0 / self.tempo
    }

    /// Beat at wall time `time`.
    pub fn beat(&self, time: f64) -> f64 {
        (time - self.offset) * self.tempo / 60.0
    }

    /// Duration of `length` beats starting at `beat`.
    pub fn dtime(&self, beat: f64, length: f64) -> f64 {
        self.time(beat + length) - self.time(beat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beat_to_time_uses_offset_and_tempo() {
        let map = Beatmap {
            offset: 1.0,
            tempo: 120.0,
            ..Beatmap::default()
        };
        assert_eq!(map.time(0.0), 1.0);
        assert_eq!(map.time(4.0), 3.0);
        assert_eq!(map.beat(3.0), 4.0);
    }

    #[test]
    fn dtime_is_tempo_scaled() {
        let map = Beatmap {
            tempo: 240.0,
            ..Beatmap::default()
        };
        assert_eq!(map.dtime(8.0, 2.0), 0.5);
    }

    #[test]
    fn default_scores_match_the_ladder() {
        let settings = BeatmapSettings::default();
        assert_eq!(settings.score_of(PerformanceGrade::Perfect), 16);
        assert_eq!(settings.score_of(PerformanceGrade::PerfectWrong), 8);
        assert_eq!(settings.score_of(PerformanceGrade::LateBad), 2);
        assert_eq!(settings.score_of(PerformanceGrade::Miss), 0);
        assert_eq!(settings.max_score(), 16);
        assert_eq!(settings.failed_tolerance(), 0.14);
    }
}
