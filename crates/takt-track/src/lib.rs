//! takt-track - beatmap model, judgement, and analysis.
//!
//! The timing core of the game: beat↔time conversion ([`Beatmap`]), the
//! performance grade ladder ([`Performance::judge`]), glyph appearances,
//! difficulty settings, and the post-game [`Analysis`] report. This crate
//! is pure data and math; the real-time stack lives elsewhere.

mod analyze;
mod appearance;
mod beatmap;
mod judge;

pub use analyze::Analysis;
pub use appearance::Appearance;
pub use beatmap::{Beatmap, BeatmapSettings};
pub use judge::{Performance, PerformanceGrade};
