//! cpal-backed audio streams and sample-format normalisation.
//!
//! The engine works in f32 everywhere; callback buffers in other
//! encodings are converted at the boundary. Conversion uses symmetric
//! `2^(8·width−1)` scaling for the signed formats and the biased
//! `(d − 64)/64` rule for u8.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use takt_config::{AudioSettings, SampleFormat};
use takt_dsp::AudioBlock;
use takt_flow::{BoxNode, Node, Step};

use crate::{AudioError, Result};

/// A live audio stream; audio flows until the handle is dropped.
pub type StreamHandle = cpal::Stream;

/// Audio device information for listings.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Device name as reported by the host API.
    pub name: String,
    /// Usable for capture.
    pub is_input: bool,
    /// Usable for playback.
    pub is_output: bool,
    /// The device's default sample rate in Hz.
    pub default_sample_rate: u32,
}

/// List all available audio devices.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                let sample_rate = device
                    .default_input_config()
                    .map(|c| c.sample_rate())
                    .unwrap_or(44100);
                let is_output = device.default_output_config().is_ok();
                devices.push(AudioDevice {
                    name,
                    is_input: true,
                    is_output,
                    default_sample_rate: sample_rate,
                });
            }
        }
    }

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device.name() {
                if devices.iter().any(|d: &AudioDevice| d.name == name) {
                    continue;
                }
                let sample_rate = device
                    .default_output_config()
                    .map(|c| c.sample_rate())
                    .unwrap_or(44100);
                devices.push(AudioDevice {
                    name,
                    is_input: false,
                    is_output: true,
                    default_sample_rate: sample_rate,
                });
            }
        }
    }

    Ok(devices)
}

fn find_output_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(search) => {
            let search = search.to_lowercase();
            let devices = host
                .output_devices()
                .map_err(|e| AudioError::Stream(e.to_string()))?;
            for device in devices {
                if let Ok(device_name) = device.name()
                    && device_name.to_lowercase().contains(&search)
                {
                    return Ok(device);
                }
            }
            Err(AudioError::DeviceNotFound(format!(
                "no output device matching '{search}'"
            )))
        }
        None => host.default_output_device().ok_or(AudioError::NoDevice),
    }
}

fn find_input_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(search) => {
            let search = search.to_lowercase();
            let devices = host
                .input_devices()
                .map_err(|e| AudioError::Stream(e.to_string()))?;
            for device in devices {
                if let Ok(device_name) = device.name()
                    && device_name.to_lowercase().contains(&search)
                {
                    return Ok(device);
                }
            }
            Err(AudioError::DeviceNotFound(format!(
                "no input device matching '{search}'"
            )))
        }
        None => host.default_input_device().ok_or(AudioError::NoDevice),
    }
}

/// Sample encodings convertible to and from engine f32.
trait ConvertSample: cpal::SizedSample + Send + 'static {
    fn to_f32(self) -> f32;
    fn from_f32(value: f32) -> Self;
}

impl ConvertSample for f32 {
    fn to_f32(self) -> f32 {
        self
    }
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl ConvertSample for i32 {
    fn to_f32(self) -> f32 {
        self as f32 / 2147483648.0
    }
    fn from_f32(value: f32) -> Self {
        (value * 2147483648.0).clamp(-2147483648.0, 2147483647.0) as i32
    }
}

impl ConvertSample for i16 {
    fn to_f32(self) -> f32 {
        f32::from(self) / 32768.0
    }
    fn from_f32(value: f32) -> Self {
        (value * 32768.0).clamp(-32768.0, 32767.0) as i16
    }
}

impl ConvertSample for i8 {
    fn to_f32(self) -> f32 {
        f32::from(self) / 128.0
    }
    fn from_f32(value: f32) -> Self {
        (value * 128.0).clamp(-128.0, 127.0) as i8
    }
}

impl ConvertSample for u8 {
    fn to_f32(self) -> f32 {
        (f32::from(self) - 64.0) / 64.0
    }
    fn from_f32(value: f32) -> Self {
        (value * 64.0 + 64.0).clamp(0.0, 255.0) as u8
    }
}

fn stream_config(samplerate: u32, buffer_length: usize, channels: usize) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: channels as u16,
        sample_rate: samplerate,
        buffer_size: cpal::BufferSize::Fixed(buffer_length as u32),
    }
}

fn output_stream_typed<T: ConvertSample>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut node: BoxNode<(), AudioBlock>,
) -> Result<cpal::Stream> {
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                match node.send(()) {
                    Ok(Step::Yield(block)) => {
                        for (out, &sample) in data.iter_mut().zip(block.data().iter()) {
                            *out = T::from_f32(sample);
                        }
                        if data.len() > block.data().len() {
                            data[block.data().len()..].fill(T::from_f32(0.0));
                        }
                    }
                    _ => data.fill(T::from_f32(0.0)),
                }
            },
            |err| tracing::error!(%err, "output stream error"),
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))?;
    stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;
    Ok(stream)
}

fn input_stream_typed<T: ConvertSample>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut node: BoxNode<AudioBlock, ()>,
) -> Result<cpal::Stream> {
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> = data.iter().map(|s| s.to_f32()).collect();
                let whole = samples.len() - samples.len() % channels;
                let block = AudioBlock::new(samples[..whole].to_vec(), channels);
                if let Err(err) = node.send(block) {
                    tracing::error!(%err, "input pipeline failure");
                }
            },
            |err| tracing::error!(%err, "input stream error"),
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))?;
    stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;
    Ok(stream)
}

/// Open the output stream and drive `node` from its callback.
///
/// The node must already be started. The stream runs until the returned
/// handle is dropped.
pub fn build_output_stream(
    settings: &AudioSettings,
    node: BoxNode<(), AudioBlock>,
) -> Result<StreamHandle> {
    let device = find_output_device(settings.output_device.as_deref())?;
    let config = stream_config(
        settings.output_samplerate,
        settings.output_buffer_length,
        settings.output_channels,
    );
    tracing::info!(
        samplerate = settings.output_samplerate,
        channels = settings.output_channels,
        format = ?settings.output_format,
        "output stream starting"
    );
    match settings.output_format {
        SampleFormat::F32 => output_stream_typed::<f32>(&device, &config, node),
        SampleFormat::I32 => output_stream_typed::<i32>(&device, &config, node),
        SampleFormat::I16 => output_stream_typed::<i16>(&device, &config, node),
        SampleFormat::I8 => output_stream_typed::<i8>(&device, &config, node),
        SampleFormat::U8 => output_stream_typed::<u8>(&device, &config, node),
    }
}

/// Open the input stream and push its buffers into `node`.
///
/// The node must already be started. The stream runs until the returned
/// handle is dropped.
pub fn build_input_stream(
    settings: &AudioSettings,
    node: BoxNode<AudioBlock, ()>,
) -> Result<StreamHandle> {
    let device = find_input_device(settings.input_device.as_deref())?;
    let config = stream_config(
        settings.input_samplerate,
        settings.input_buffer_length,
        settings.input_channels,
    );
    tracing::info!(
        samplerate = settings.input_samplerate,
        channels = settings.input_channels,
        format = ?settings.input_format,
        "input stream starting"
    );
    match settings.input_format {
        SampleFormat::F32 => {
            input_stream_typed::<f32>(&device, &config, settings.input_channels, node)
        }
        SampleFormat::I32 => {
            input_stream_typed::<i32>(&device, &config, settings.input_channels, node)
        }
        SampleFormat::I16 => {
            input_stream_typed::<i16>(&device, &config, settings.input_channels, node)
        }
        SampleFormat::I8 => {
            input_stream_typed::<i8>(&device, &config, settings.input_channels, node)
        }
        SampleFormat::U8 => {
            input_stream_typed::<u8>(&device, &config, settings.input_channels, node)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_conversions_are_symmetric() {
        assert_eq!(<i16 as ConvertSample>::from_f32(0.0), 0);
        assert!((<i16 as ConvertSample>::to_f32(16384) - 0.5).abs() < 1e-4);
        assert!((<i32 as ConvertSample>::to_f32(i32::MIN) + 1.0).abs() < 1e-6);
        assert_eq!(<i8 as ConvertSample>::from_f32(1.0), 127);
        assert_eq!(<i8 as ConvertSample>::from_f32(-1.0), -128);
    }

    #[test]
    fn u8_uses_the_biased_rule() {
        assert_eq!(<u8 as ConvertSample>::to_f32(64), 0.0);
        assert_eq!(<u8 as ConvertSample>::to_f32(128), 1.0);
        assert_eq!(<u8 as ConvertSample>::to_f32(0), -1.0);
        assert_eq!(<u8 as ConvertSample>::from_f32(0.0), 64);
        assert_eq!(<u8 as ConvertSample>::from_f32(1.0), 128);
        // Values above the biased headroom clamp instead of wrapping.
        assert_eq!(<u8 as ConvertSample>::from_f32(4.0), 255);
    }

    #[test]
    fn roundtrip_within_one_step() {
        for v in [-1.0f32, -0.5, 0.0, 0.25, 0.99] {
            let through = <i16 as ConvertSample>::to_f32(<i16 as ConvertSample>::from_f32(v));
            assert!((through - v).abs() < 1.0 / 32768.0 + 1e-6);
        }
    }
}
