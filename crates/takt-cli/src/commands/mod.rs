//! CLI subcommands.

pub mod demo;
pub mod devices;
pub mod test_mic;
pub mod test_speaker;

use std::path::PathBuf;

use takt_config::Settings;

/// Load settings from `--config`, or fall back to the defaults.
pub fn load_settings(config: Option<&PathBuf>) -> anyhow::Result<Settings> {
    match config {
        Some(path) => Ok(Settings::load(path)?),
        None => Ok(Settings::default()),
    }
}

/// Current terminal width, with a sane fallback for pipes.
pub fn terminal_width() -> usize {
    crossterm::terminal::size().map_or(80, |(cols, _)| cols as usize)
}
