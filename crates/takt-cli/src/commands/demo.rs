//! The built-in demo beatmap.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Args;
use takt_game::{Console, Game, NoteSpec};
use takt_track::{Analysis, Beatmap};

/// Arguments for `takt demo`.
#[derive(Args)]
pub struct DemoArgs {
    /// Settings file (TOML); defaults apply when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Music file to play under the demo (WAV)
    #[arg(long)]
    pub audio: Option<PathBuf>,

    /// Tempo of the demo map in beats per minute
    #[arg(long, default_value_t = 120.0)]
    pub tempo: f64,
}

/// A little of everything: soft/loud phrases, an incr swell, a roll, a
/// spin, and a flip to keep the player honest.
fn demo_specs() -> Vec<NoteSpec> {
    let soft = |beat| NoteSpec::Soft {
        beat,
        speed: None,
        volume: None,
    };
    let loud = |beat| NoteSpec::Loud {
        beat,
        speed: None,
        volume: None,
    };
    let incr = |beat| NoteSpec::Incr {
        beat,
        group: None,
        speed: None,
        volume: None,
    };

    let mut specs = vec![NoteSpec::Text {
        beat: 2.0,
        text: Some("knock along!".into()),
        sound: None,
        speed: Some(0.5),
    }];
    // Warm-up phrase.
    specs.extend([4.0, 5.0, 6.0, 7.0].map(soft));
    specs.extend([8.0, 10.0].map(loud));
    specs.extend([9.0, 11.0].map(soft));
    // Swell.
    specs.extend([12.0, 12.5, 13.0, 13.5, 14.0].map(incr));
    // Roll into a spinner.
    specs.push(NoteSpec::Roll {
        beat: 16.0,
        length: 2.0,
        density: 2.0,
        speed: None,
        volume: None,
    });
    specs.push(NoteSpec::Spin {
        beat: 20.0,
        length: 4.0,
        density: 2.0,
        speed: None,
        volume: None,
    });
    // Finale, mirrored.
    specs.push(NoteSpec::Flip {
        beat: 25.0,
        flip: None,
    });
    specs.extend([26.0, 27.0].map(soft));
    specs.push(loud(28.0));
    specs
}

/// Run the demo game and print the analysis afterwards.
pub fn run(args: DemoArgs) -> anyhow::Result<()> {
    let settings = super::load_settings(args.config.as_ref())?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        flag.store(true, std::sync::atomic::Ordering::Relaxed);
    })?;

    let beatmap = Beatmap {
        info: "takt demo".into(),
        audio: args.audio,
        tempo: args.tempo,
        settings: settings.beatmap.clone(),
        ..Beatmap::default()
    };

    let console = Console::open(&settings, super::terminal_width(), shutdown.clone())?;
    let mut game = Game::new(
        beatmap,
        demo_specs(),
        settings.gameplay.clone(),
        settings.playfield.clone(),
    );
    let report = game.run(&console, &shutdown)?;
    console.close();

    println!(
        "score: {} / {}  ({:.1}% played)",
        report.score,
        report.full_score,
        report.progress * 100.0
    );
    print!(
        "{}",
        Analysis::new(settings.beatmap.performance_tolerance, &report.performances).render()
    );
    Ok(())
}
