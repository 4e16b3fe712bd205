//! takt-game - gameplay: the playfield, note events, and the game loop.
//!
//! The [`Console`] opens the audio streams and render thread; a [`Game`]
//! builds its event list from [`NoteSpec`] descriptors and drives
//! registration, scoring, and progress against the [`Playfield`], which
//! routes detected knocks to the active target and draws the scrolling
//! bar.

mod console;
mod event;
mod game;
mod playfield;

pub use console::Console;
pub use event::{
    Event, FlipEvent, IncrGroup, JiggleEvent, NoteSpec, OneshotNote, RollNote, ShiftEvent,
    SpinNote, TextEvent, build_events,
};
pub use game::{Game, GameError, GameReport};
pub use playfield::{BarState, Playfield, PosFn, SightFn, TargetEntry, TextFn};
