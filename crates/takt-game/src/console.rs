//! The console: audio streams, detector, and renderer wired together.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use takt_audio::{Detector, Mixer, StreamHandle, build_input_stream, build_output_stream};
use takt_config::Settings;
use takt_flow::Node;
use takt_render::{RenderHost, Renderer};

use crate::game::GameError;

/// Owns the running audio streams and the render thread, and hands out
/// the mixer/detector/renderer handles a game plays against.
///
/// Dropping the console stops the streams; [`Console::close`] also joins
/// the render thread.
pub struct Console {
    mixer: Mixer,
    detector: Detector,
    renderer: Renderer,
    _output_stream: StreamHandle,
    _input_stream: StreamHandle,
    host: Option<RenderHost>,
}

impl Console {
    /// Open the audio devices and start rendering `width`-cell lines to
    /// stdout. Device failures are fatal.
    pub fn open(
        settings: &Settings,
        width: usize,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Console, GameError> {
        let audio = &settings.audio;

        let (mixer, mut mixer_node) = Mixer::new(
            audio.output_samplerate,
            audio.output_buffer_length,
            audio.output_channels,
            audio.sound_delay,
        );
        mixer_node.start()?;
        let output_stream = build_output_stream(audio, Box::new(mixer_node))?;

        let (detector, mut detector_node) = Detector::new(
            audio.input_samplerate,
            audio.input_buffer_length,
            audio.input_channels,
            &settings.detector,
        );
        detector_node.start()?;
        let input_stream = build_input_stream(audio, detector_node)?;

        let (renderer, renderer_node) = Renderer::new(
            width,
            settings.display.display_framerate,
            settings.display.display_delay,
        );
        let host = RenderHost::spawn(renderer_node, std::io::stdout(), shutdown);

        tracing::info!(width, "console up");
        Ok(Console {
            mixer,
            detector,
            renderer,
            _output_stream: output_stream,
            _input_stream: input_stream,
            host: Some(host),
        })
    }

    /// The output mixer handle.
    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// The knock detector handle.
    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// The renderer handle.
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Stop the streams and join the render thread.
    pub fn close(mut self) {
        if let Some(host) = self.host.take() {
            host.stop();
        }
    }
}
