//! takt-audio - the real-time audio stack.
//!
//! This crate provides:
//!
//! - **[`Mixer`]**: sums time-scheduled sound sources into the output
//!   stream, sample-aligned against the mixer's own clock
//! - **[`Detector`]**: turns the microphone stream into timed knock
//!   events via spectral-flux onset detection
//! - **Stream I/O**: cpal-backed input/output streams with per-format
//!   sample normalisation, and WAV loading
//!
//! The mixer and detector each split into a cloneable control handle and
//! a node that moves into the audio callback; control messages cross the
//! thread boundary through their scheduler queues.

mod detector;
mod io;
mod load;
mod mixer;

pub use detector::{Detector, KnockEvent};
pub use io::{AudioDevice, StreamHandle, build_input_stream, build_output_stream, list_devices};
pub use load::{LoadedAudio, audio_duration, load_audio};
pub use mixer::{Mixer, MixerNode, PlayOptions, PlaySource, TimedBlock};

use std::path::PathBuf;

/// Error types for audio operations.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// A sound file could not be decoded.
    #[error("failed to decode '{path}': {reason}")]
    Decode {
        /// The offending file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// WAV read error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("no audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The requested sample format is not supported by the device.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// A pipeline node failed.
    #[error("dataflow failure: {0}")]
    Flow(#[from] takt_flow::FlowError),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio operations.
pub type Result<T> = std::result::Result<T, AudioError>;
