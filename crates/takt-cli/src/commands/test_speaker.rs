//! Output device check: a short click pattern.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use takt_audio::{Mixer, PlayOptions, PlaySource, build_output_stream};
use takt_dsp::pulse;
use takt_flow::Node;

/// Arguments for `takt test-speaker`.
#[derive(Args)]
pub struct TestSpeakerArgs {
    /// Settings file (TOML); defaults apply when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Play four clicks per output channel, half a second apart.
pub fn run(args: TestSpeakerArgs) -> anyhow::Result<()> {
    let settings = super::load_settings(args.config.as_ref())?;
    let audio = &settings.audio;

    let (mixer, mut node) = Mixer::new(
        audio.output_samplerate,
        audio.output_buffer_length,
        audio.output_channels,
        0.0,
    );
    node.start()?;

    let clicks = 4 * audio.output_channels;
    let duration = 2.0 + 0.5 * clicks as f64;
    let click = pulse(audio.output_samplerate, 1000.0, 0.1, 1.0, None);
    for index in 0..clicks {
        mixer.play(
            PlaySource::Signal {
                block: click.clone(),
                samplerate: audio.output_samplerate,
            },
            PlayOptions::at(1.0 + 0.5 * index as f64),
        )?;
    }

    println!("testing...");
    let stream = build_output_stream(audio, Box::new(node))?;
    std::thread::sleep(Duration::from_secs_f64(duration));
    drop(stream);
    println!("finish!");
    Ok(())
}
