//! Input device check: a live braille spectrum.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use takt_audio::build_input_stream;
use takt_dsp::{BrailleSpectrum, Framer, PowerSpectrum, WindowKind};
use takt_flow::{Node, NodeExt, map};

/// Arguments for `takt test-mic`.
#[derive(Args)]
pub struct TestMicArgs {
    /// Settings file (TOML); defaults apply when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How long to listen, in seconds
    #[arg(long, default_value_t = 8.0)]
    pub duration: f64,

    /// Spectrum width in characters
    #[arg(long, default_value_t = 12)]
    pub width: usize,
}

/// Listen on the input device and draw its spectrum in place.
pub fn run(args: TestMicArgs) -> anyhow::Result<()> {
    let settings = super::load_settings(args.config.as_ref())?;
    let audio = &settings.audio;

    let samplerate = audio.input_samplerate;
    let buffer = audio.input_buffer_length;
    let channels = audio.input_channels;
    let win = 2048;
    let decay = buffer as f32 / samplerate as f32 / 0.01;

    let mut node = Framer::new(win, buffer, channels)
        .pipe(PowerSpectrum::new(win, samplerate, channels, WindowKind::Hann, true))
        .pipe(BrailleSpectrum::new(args.width, win, samplerate, decay))
        .pipe(map(|spectrum: String| {
            print!(" {spectrum}\r");
            let _ = std::io::stdout().flush();
        }))
        .boxed();
    node.start()?;

    println!("testing...");
    let stream = build_input_stream(audio, node)?;
    std::thread::sleep(Duration::from_secs_f64(args.duration));
    drop(stream);
    println!();
    println!("finish!");
    Ok(())
}
