//! Note and sight glyph appearances.

use serde::{Deserialize, Serialize};

/// A drawable glyph, optionally direction-dependent.
///
/// Directional appearances carry a `(forward, reverse)` pair; the reverse
/// form is drawn when the bar is flipped (or, for perf hints, when the
/// note travels right to left). Glyph strings may contain `\t` / `\b`
/// cursor motions understood by the screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Appearance {
    /// The same glyph regardless of direction.
    Plain(String),
    /// Distinct forward and reverse glyphs.
    Directional(String, String),
}

impl Appearance {
    /// The glyph for the given direction.
    pub fn resolve(&self, reversed: bool) -> &str {
        match self {
            Appearance::Plain(glyph) => glyph,
            Appearance::Directional(fwd, rev) => {
                if reversed {
                    rev
                } else {
                    fwd
                }
            }
        }
    }
}

impl From<&str> for Appearance {
    fn from(glyph: &str) -> Self {
        Appearance::Plain(glyph.to_string())
    }
}

impl From<(&str, &str)> for Appearance {
    fn from((fwd, rev): (&str, &str)) -> Self {
        Appearance::Directional(fwd.to_string(), rev.to_string())
    }
}
