//! The nested settings model.
//!
//! All values carry defaults tuned for a 44.1 kHz stack with 512-sample
//! buffers, so an empty TOML file is a complete, playable configuration.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use takt_track::{Appearance, BeatmapSettings, PerformanceGrade};

use crate::error::ConfigError;

/// Interleaved sample encoding of an audio callback buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    /// 32-bit float in `[-1, 1]`.
    #[serde(rename = "f4")]
    F32,
    /// 32-bit signed integer.
    #[serde(rename = "i4")]
    I32,
    /// 16-bit signed integer.
    #[serde(rename = "i2")]
    I16,
    /// 8-bit signed integer.
    #[serde(rename = "i1")]
    I8,
    /// 8-bit unsigned integer, biased around 64.
    #[serde(rename = "u1")]
    U8,
}

/// Audio device and stream parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Input device name substring; `None` picks the default device.
    pub input_device: Option<String>,
    /// Input sample rate in Hz.
    pub input_samplerate: u32,
    /// Input callback buffer length in frames.
    pub input_buffer_length: usize,
    /// Input channel count.
    pub input_channels: usize,
    /// Input sample encoding.
    pub input_format: SampleFormat,

    /// Output device name substring; `None` picks the default device.
    pub output_device: Option<String>,
    /// Output sample rate in Hz.
    pub output_samplerate: u32,
    /// Output callback buffer length in frames.
    pub output_buffer_length: usize,
    /// Output channel count.
    pub output_channels: usize,
    /// Output sample encoding.
    pub output_format: SampleFormat,

    /// Offset added to the mixer clock to compensate output latency,
    /// in seconds.
    pub sound_delay: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            input_device: None,
            input_samplerate: 44100,
            input_buffer_length: 512,
            input_channels: 1,
            input_format: SampleFormat::F32,
            output_device: None,
            output_samplerate: 44100,
            output_buffer_length: 512,
            output_channels: 1,
            output_format: SampleFormat::F32,
            sound_delay: 0.0,
        }
    }
}

/// Knock detector tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Analysis hop in seconds (hop_length = 512 at 44.1 kHz).
    pub time_res: f64,
    /// Frequency resolution in Hz (win_length = 2048 at 44.1 kHz).
    pub freq_res: f64,
    /// Peak-picker look-back for the max window, in seconds.
    pub pre_max: f64,
    /// Peak-picker look-ahead for the max window, in seconds.
    pub post_max: f64,
    /// Peak-picker look-back for the mean window, in seconds.
    pub pre_avg: f64,
    /// Peak-picker look-ahead for the mean window, in seconds.
    pub post_avg: f64,
    /// Minimum spacing between detections, in seconds.
    pub wait: f64,
    /// Required flux margin over the local mean.
    pub delta: f32,
    /// Added to every detection timestamp, in seconds.
    pub knock_delay: f64,
    /// Calibration constant dividing reported strengths.
    pub knock_energy: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            time_res: 0.0116099773,
            freq_res: 21.5332031,
            pre_max: 0.03,
            post_max: 0.03,
            pre_avg: 0.03,
            post_avg: 0.03,
            wait: 0.03,
            delta: 5.48e-6,
            knock_delay: 0.0,
            knock_energy: 1.0e-3,
        }
    }
}

/// Terminal display parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Render ticks per second.
    pub display_framerate: f64,
    /// Added to every render timestamp, in seconds.
    pub display_delay: f64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            display_framerate: 160.0,
            display_delay: 0.0,
        }
    }
}

/// Game loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplaySettings {
    /// Quiet lead-in before the first and after the last event, seconds.
    pub leadin_time: f64,
    /// Skippable silence threshold, seconds.
    pub skip_time: f64,
    /// Game loop ticks per second.
    pub tickrate: f64,
    /// How far ahead of their lifespan events are registered, seconds.
    pub prepare_time: f64,
}

impl Default for GameplaySettings {
    fn default() -> Self {
        Self {
            leadin_time: 1.0,
            skip_time: 8.0,
            tickrate: 60.0,
            prepare_time: 0.1,
        }
    }
}

/// Playfield layout and skin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayfieldSettings {
    /// Width of the icon (spectrum) column.
    pub icon_width: usize,
    /// Width of the header (score) column.
    pub header_width: usize,
    /// Width of the footer (progress) column.
    pub footer_width: usize,

    /// Spectrum widget width in cells (two bands per cell).
    pub spec_width: usize,
    /// Spectrum bar decay time constant, seconds.
    pub spec_decay_time: f64,
    /// Spectrum analysis hop, seconds.
    pub spec_time_res: f64,
    /// Spectrum frequency resolution, Hz.
    pub spec_freq_res: f64,

    /// Popup glyphs per grade, as `(forward, reverse)` pairs.
    pub performances_appearances: HashMap<PerformanceGrade, Appearance>,
    /// How long a perf popup stays, seconds.
    pub performance_sustain_time: f64,

    /// Sight glyphs by hit loudness, quiet to loud.
    pub sight_appearances: Vec<Appearance>,
    /// Sight loudness decay time, seconds.
    pub hit_decay_time: f64,
    /// Minimum time the sight stays lit after a hit, seconds.
    pub hit_sustain_time: f64,

    /// Sight anchor position inside the content region, `0..=1`.
    pub bar_shift: f64,
    /// Local sight offset relative to the anchor.
    pub sight_shift: f64,
    /// Reverse the scroll direction.
    pub bar_flip: bool,
}

impl Default for PlayfieldSettings {
    fn default() -> Self {
        use PerformanceGrade::*;
        let hint = |fwd: &str, rev: &str| Appearance::Directional(fwd.into(), rev.into());
        let performances_appearances = HashMap::from([
            (Miss, hint("", "")),
            (LateFailed, hint("\u{8}⟪", "\t\t⟫")),
            (LateBad, hint("\u{8}⟨", "\t\t⟩")),
            (LateGood, hint("\u{8}‹", "\t\t›")),
            (Perfect, hint("", "")),
            (EarlyGood, hint("\t\t›", "\u{8}‹")),
            (EarlyBad, hint("\t\t⟩", "\u{8}⟨")),
            (EarlyFailed, hint("\t\t⟫", "\u{8}⟪")),
            (LateFailedWrong, hint("\u{8}⟪", "\t\t⟫")),
            (LateBadWrong, hint("\u{8}⟨", "\t\t⟩")),
            (LateGoodWrong, hint("\u{8}‹", "\t\t›")),
            (PerfectWrong, hint("", "")),
            (EarlyGoodWrong, hint("\t\t›", "\u{8}‹")),
            (EarlyBadWrong, hint("\t\t⟩", "\u{8}⟨")),
            (EarlyFailedWrong, hint("\t\t⟫", "\u{8}⟪")),
        ]);
        Self {
            icon_width: 8,
            header_width: 11,
            footer_width: 12,
            spec_width: 7,
            spec_decay_time: 0.01,
            spec_time_res: 0.0116099773,
            spec_freq_res: 21.5332031,
            performances_appearances,
            performance_sustain_time: 0.1,
            sight_appearances: ["⛶", "🞎", "🞏", "🞐", "🞑", "🞒", "🞓"]
                .into_iter()
                .map(Appearance::from)
                .collect(),
            hit_decay_time: 0.4,
            hit_sustain_time: 0.1,
            bar_shift: 0.1,
            sight_shift: 0.0,
            bar_flip: false,
        }
    }
}

/// The complete, nested settings tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Audio device and stream parameters.
    pub audio: AudioSettings,
    /// Knock detector tuning.
    pub detector: DetectorSettings,
    /// Terminal display parameters.
    pub display: DisplaySettings,
    /// Game loop timing.
    pub gameplay: GameplaySettings,
    /// Beatmap difficulty, scoring, and note skin.
    pub beatmap: BeatmapSettings,
    /// Playfield layout and skin.
    pub playfield: PlayfieldSettings,
}

impl Settings {
    /// Parse settings from a TOML string and validate them.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Write settings to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject out-of-range or inconsistent values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::invalid(field, format!("must be positive, got {value}")))
            }
        }

        if self.audio.input_samplerate == 0 {
            return Err(ConfigError::invalid("audio.input_samplerate", "must be positive"));
        }
        if self.audio.output_samplerate == 0 {
            return Err(ConfigError::invalid("audio.output_samplerate", "must be positive"));
        }
        if self.audio.input_buffer_length == 0 {
            return Err(ConfigError::invalid("audio.input_buffer_length", "must be positive"));
        }
        if self.audio.output_buffer_length == 0 {
            return Err(ConfigError::invalid("audio.output_buffer_length", "must be positive"));
        }
        if self.audio.input_channels == 0 {
            return Err(ConfigError::invalid("audio.input_channels", "must be positive"));
        }
        if self.audio.output_channels == 0 {
            return Err(ConfigError::invalid("audio.output_channels", "must be positive"));
        }

        positive("detector.time_res", self.detector.time_res)?;
        positive("detector.freq_res", self.detector.freq_res)?;
        positive("display.display_framerate", self.display.display_framerate)?;
        positive("gameplay.tickrate", self.gameplay.tickrate)?;
        positive("beatmap.performance_tolerance", self.beatmap.performance_tolerance)?;

        if self.playfield.sight_appearances.is_empty() {
            return Err(ConfigError::invalid(
                "playfield.sight_appearances",
                "needs at least one glyph",
            ));
        }
        if !(0.0..=1.0).contains(&self.playfield.bar_shift) {
            return Err(ConfigError::invalid(
                "playfield.bar_shift",
                format!("must lie in [0, 1], got {}", self.playfield.bar_shift),
            ));
        }
        if self.playfield.spec_width == 0 {
            return Err(ConfigError::invalid("playfield.spec_width", "must be positive"));
        }

        Ok(())
    }
}
