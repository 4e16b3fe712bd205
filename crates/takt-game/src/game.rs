//! The game loop: event registration, score aggregation, and pacing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use takt_audio::{AudioError, PlayOptions, PlaySource, audio_duration};
use takt_config::{GameplaySettings, PlayfieldSettings};
use takt_track::{Beatmap, Performance};

use crate::console::Console;
use crate::event::{Event, NoteSpec, build_events};
use crate::playfield::Playfield;

/// Errors that abort a game run.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Audio device or stream failure.
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// A pipeline node failed.
    #[error(transparent)]
    Flow(#[from] takt_flow::FlowError),
}

/// Final standing of a finished (or aborted) game.
#[derive(Debug)]
pub struct GameReport {
    /// Rescaled score actually achieved.
    pub score: u32,
    /// Rescaled score of everything judged so far.
    pub full_score: u32,
    /// Fraction of targets settled.
    pub progress: f64,
    /// Every judged hit, for the analyzer.
    pub performances: Vec<Performance>,
}

/// A loaded beatmap ready to play.
pub struct Game {
    beatmap: Beatmap,
    events: Vec<Box<dyn Event>>,
    gameplay: GameplaySettings,
    playfield: PlayfieldSettings,
}

impl Game {
    /// Build a game from parsed note descriptors.
    pub fn new(
        beatmap: Beatmap,
        specs: Vec<NoteSpec>,
        gameplay: GameplaySettings,
        playfield: PlayfieldSettings,
    ) -> Game {
        let mut events = build_events(&beatmap, specs);
        events.sort_by(|a, b| a.lifespan().0.total_cmp(&b.lifespan().0));
        Game {
            beatmap,
            events,
            gameplay,
            playfield,
        }
    }

    /// The window `(start, end)` that the tick loop must cover, with the
    /// configured lead-in applied on both sides.
    fn event_window(&self) -> (f64, f64) {
        let leadin = self.gameplay.leadin_time;
        let start = self
            .events
            .iter()
            .map(|e| e.lifespan().0 - leadin)
            .fold(f64::INFINITY, f64::min);
        let end = self
            .events
            .iter()
            .map(|e| e.lifespan().1 + leadin)
            .fold(f64::NEG_INFINITY, f64::max);
        (start.min(0.0), end.max(0.0))
    }

    fn scale(&self) -> f64 {
        let total: u32 = self.events.iter().map(|e| e.full_score()).sum();
        if total > 0 {
            65536.0 / f64::from(total)
        } else {
            0.0
        }
    }

    fn standings(&self, scale: f64) -> (u32, u32, f64) {
        let score: u32 = self.events.iter().map(|e| e.score()).sum();
        let judged: u32 = self
            .events
            .iter()
            .filter(|e| e.is_finished())
            .map(|e| e.full_score())
            .sum();
        let targets = self.events.iter().filter(|e| e.is_target()).count();
        let progress = if targets == 0 {
            1.0
        } else {
            self.events
                .iter()
                .filter(|e| e.is_target() && e.is_finished())
                .count() as f64
                / targets as f64
        };
        (
            (f64::from(score) * scale).round() as u32,
            (f64::from(judged) * scale).round() as u32,
            progress,
        )
    }

    /// Play the game to the end (or until `shutdown` is raised).
    pub fn run(
        &mut self,
        console: &Console,
        shutdown: &Arc<AtomicBool>,
    ) -> Result<GameReport, GameError> {
        let (events_start, events_end) = self.event_window();
        let scale = self.scale();

        // Decode failure downgrades to a silent run, device failure is fatal.
        let music = self.beatmap.audio.as_ref().map(|audio| self.beatmap.path.join(audio));
        let music_duration = match &music {
            Some(path) => match audio_duration(path) {
                Ok(duration) => duration,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "playing without music");
                    0.0
                }
            },
            None => 0.0,
        };

        let prepare = self.gameplay.prepare_time;
        let time_shift = prepare + (-events_start).max(0.0);
        let start_time = console.mixer().time() + time_shift;

        if let Some(path) = music {
            let options = PlayOptions {
                volume: self.beatmap.volume,
                time: Some(start_time),
                zindex: -3.0,
                ..PlayOptions::default()
            };
            if let Err(err) = console.mixer().play(PlaySource::File(path), options) {
                tracing::warn!(%err, "music failed to start");
            }
        }

        let field = Playfield::new(
            console.mixer().clone(),
            console.detector().clone(),
            console.renderer().clone(),
            start_time,
            self.playfield.clone(),
        );
        field.register_handlers();

        let finish_line = events_end.max(music_duration);
        let dt = 1.0 / self.gameplay.tickrate;
        let origin = Instant::now();
        let mut next_unregistered = 0;

        tracing::info!(
            events = self.events.len(),
            finish_line,
            "game loop starting"
        );

        for tick in 0u64.. {
            let now = tick as f64 * dt - time_shift;
            if finish_line <= now || shutdown.load(Ordering::Relaxed) {
                break;
            }

            while next_unregistered < self.events.len()
                && self.events[next_unregistered].lifespan().0 <= now + prepare
            {
                self.events[next_unregistered].register(&field);
                next_unregistered += 1;
            }

            let (score, judged, progress) = self.standings(scale);
            field.set_status(score, judged, progress, now);

            // Ticks fire `prepare` early so registration leads real time.
            let due = (tick as f64 * dt - prepare).max(0.0);
            let due = origin + Duration::from_secs_f64(due);
            if let Some(wait) = due.checked_duration_since(Instant::now()) {
                std::thread::sleep(wait);
            }
        }

        let (score, judged, progress) = self.standings(scale);
        let performances = self
            .events
            .iter()
            .flat_map(|e| e.performances())
            .collect();
        Ok(GameReport {
            score,
            full_score: judged,
            progress,
            performances,
        })
    }
}
