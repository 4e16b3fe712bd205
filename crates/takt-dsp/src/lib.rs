//! takt-dsp - spectral and multirate DSP for the takt knock engine.
//!
//! Everything here is a [`takt_flow::Node`] over [`AudioBlock`] /
//! [`Spectrum`] payloads, so detector and mixer pipelines compose from
//! the same parts:
//!
//! - [`Framer`] - sliding analysis windows
//! - [`PowerSpectrum`] - windowed, optionally A-weighted power spectra
//! - [`OnsetStrength`] / [`PeakPicker`] - spectral flux onset detection
//! - [`Resampler`] - streaming polyphase rate conversion
//! - [`Rechannel`], [`Gain`], [`TimeSlice`], [`chunk`], [`unchunk`] -
//!   stream adapters
//! - [`pulse`], [`power_to_db`], [`db_to_linear`] - helpers

mod adapt;
mod block;
mod braille;
mod frame;
mod math;
mod onset;
mod resample;
mod spectrum;
mod synth;
pub mod window;

pub use adapt::{Chunk, Gain, Rechannel, TimeSlice, Unchunk, chunk, unchunk};
pub use block::{AudioBlock, Spectrum};
pub use braille::BrailleSpectrum;
pub use frame::Framer;
pub use math::{db_to_linear, power_to_db};
pub use onset::{OnsetStrength, PeakPicker};
pub use resample::{Resampler, design_lowpass};
pub use spectrum::PowerSpectrum;
pub use synth::pulse;
pub use window::{WindowKind, a_weight, half_hann_window, hann_window};
