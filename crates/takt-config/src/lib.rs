//! takt-config - the settings tree for the takt console.
//!
//! A nested, serde-backed [`Settings`] struct covering audio streams, the
//! knock detector, the display, gameplay timing, beatmap difficulty, and
//! the playfield skin. Defaults reproduce a playable 44.1 kHz setup, so
//! configuration files only need to state what differs.
//!
//! ```rust
//! use takt_config::Settings;
//!
//! let settings = Settings::from_toml("[audio]\noutput_samplerate = 48000\n").unwrap();
//! assert_eq!(settings.audio.output_samplerate, 48000);
//! ```

mod error;
mod settings;

pub use error::ConfigError;
pub use settings::{
    AudioSettings, DetectorSettings, DisplaySettings, GameplaySettings, PlayfieldSettings,
    SampleFormat, Settings,
};
