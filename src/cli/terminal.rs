//! Coloured report output.
//!
//! Colour is applied only when stdout supports it, so piped or redirected
//! reports stay plain text.

use owo_colors::{OwoColorize, colors::css};

/// How a line of a validation report should be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Valid,
    Invalid,
    Advisory,
    Note,
}

fn paint(text: &str, outcome: Outcome) -> String {
    if supports_color::on(supports_color::Stream::Stdout).is_none() {
        return text.to_string();
    }
    match outcome {
        Outcome::Valid => text.fg::<css::Green>().to_string(),
        Outcome::Invalid => text.fg::<css::Red>().to_string(),
        Outcome::Advisory => text.fg::<css::Orange>().to_string(),
        Outcome::Note => text.dimmed().to_string(),
    }
}

/// Styles report lines by validation outcome.
pub trait Colorize {
    /// A passing check (green).
    fn valid(&self) -> String;
    /// A failing check (red).
    fn invalid(&self) -> String;
    /// A finding that fails only under stricter configuration (amber).
    fn advisory(&self) -> String;
    /// Supplementary detail (dimmed).
    fn note(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> Colorize for T {
    fn valid(&self) -> String {
        paint(self.as_ref(), Outcome::Valid)
    }

    fn invalid(&self) -> String {
        paint(self.as_ref(), Outcome::Invalid)
    }

    fn advisory(&self) -> String {
        paint(self.as_ref(), Outcome::Advisory)
    }

    fn note(&self) -> String {
        paint(self.as_ref(), Outcome::Note)
    }
}
