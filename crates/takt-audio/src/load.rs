//! Sound file loading.

use std::path::Path;

use hound::SampleFormat as WavSampleFormat;
use takt_dsp::AudioBlock;

use crate::{AudioError, Result};

/// A decoded sound: interleaved f32 frames plus the file's sample rate.
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    /// The decoded samples in `[-1, 1]`, channels preserved.
    pub block: AudioBlock,
    /// The file's native sample rate in Hz.
    pub samplerate: u32,
}

impl LoadedAudio {
    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.block.frames() as f64 / f64::from(self.samplerate)
    }
}

/// Decode a WAV file into f32 samples.
///
/// PCM widths up to 32 bit and IEEE float files are normalised to
/// `[-1, 1]`. Non-WAV containers surface [`AudioError::Decode`]; the
/// caller decides whether that is fatal (the game treats missing music
/// as "play silently").
pub fn load_audio(path: impl AsRef<Path>) -> Result<LoadedAudio> {
    let path = path.as_ref();
    let reader = hound::WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(io) => AudioError::Io(io),
        other => AudioError::Decode {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    })?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let data: Vec<f32> = match spec.sample_format {
        WavSampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        WavSampleFormat::Int => {
            let scale = 1.0 / f32::from(2u16).powi(i32::from(spec.bits_per_sample) - 1);
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    // Trailing partial frames would desync every consumer downstream.
    let whole = data.len() - data.len() % channels;
    Ok(LoadedAudio {
        block: AudioBlock::new(data[..whole].to_vec(), channels),
        samplerate: spec.sample_rate,
    })
}

/// Duration of an audio file in seconds, from the header alone.
pub fn audio_duration(path: impl AsRef<Path>) -> Result<f64> {
    let path = path.as_ref();
    let reader = hound::WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(io) => AudioError::Io(io),
        other => AudioError::Decode {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    })?;
    let spec = reader.spec();
    let frames = reader.duration();
    Ok(f64::from(frames) / f64::from(spec.sample_rate))
}
