use clap::builder::{
    Styles,
    styling::{AnsiColor, Effects},
};
use colored::Color;

/// Kind of status line, each with its own mark and colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Done,
    Failed,
    Caution,
    Note,
    Detail,
}

impl Tone {
    pub fn mark(self) -> &'static str {
        match self {
            Tone::Done => "✔",
            Tone::Failed => "✘",
            Tone::Caution => "!",
            Tone::Note => "›",
            Tone::Detail => "·",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Tone::Done => Color::BrightGreen,
            Tone::Failed => Color::BrightRed,
            Tone::Caution => Color::Yellow,
            Tone::Note => ACCENT,
            Tone::Detail => DIM,
        }
    }
}

pub const ACCENT: Color = Color::Cyan;
pub const DIM: Color = Color::BrightBlack;

/// clap help colours, kept in step with [`ACCENT`] and [`DIM`].
pub fn help_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default().effects(Effects::BOLD | Effects::UNDERLINE))
        .usage(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
        .literal(AnsiColor::BrightWhite.on_default().effects(Effects::BOLD))
        .placeholder(AnsiColor::BrightBlack.on_default())
        .valid(AnsiColor::BrightGreen.on_default())
        .invalid(AnsiColor::Yellow.on_default())
        .error(AnsiColor::BrightRed.on_default().effects(Effects::BOLD))
}
