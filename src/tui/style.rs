//! Color scheme and styles.

use ratatui::style::{Color, Modifier, Style};

/// Dashboard color palette.
pub struct Theme;

impl Theme {
    pub const GREEN: Color = Color::Green;
    pub const YELLOW: Color = Color::Yellow;
    pub const RED: Color = Color::Red;
    pub const GREY: Color = Color::DarkGray;
    pub const BANNER_FG: Color = Color::White;
}

/// Background color for a health color name, if it is one.
pub fn health_color(name: &str) -> Option<Color> {
    match name {
        "Green" => Some(Theme::GREEN),
        "Yellow" => Some(Theme::YELLOW),
        "Red" => Some(Theme::RED),
        "Grey" | "Gray" => Some(Theme::GREY),
        _ => None,
    }
}

/// Pre-defined styles.
pub struct Styles;

impl Styles {
    /// Table header row.
    pub fn header() -> Style {
        Style::default().add_modifier(Modifier::REVERSED)
    }

    /// Active sort column inside the header.
    pub fn sort_column() -> Style {
        Self::header().add_modifier(Modifier::UNDERLINED | Modifier::BOLD)
    }

    /// Table name badge at the right end of the header.
    pub fn badge() -> Style {
        Style::default().add_modifier(Modifier::BOLD)
    }

    /// Synthetic aggregate row.
    pub fn overall() -> Style {
        Style::default().add_modifier(Modifier::BOLD)
    }

    pub fn bold() -> Style {
        Style::default().add_modifier(Modifier::BOLD)
    }

    pub fn underlined() -> Style {
        Style::default().add_modifier(Modifier::UNDERLINED)
    }

    /// Color swatch cell for a row.
    pub fn swatch(color: &str) -> Style {
        match health_color(color) {
            Some(c) => Style::default().bg(c),
            None => Style::default(),
        }
    }

    /// Banner line colored by environment health.
    pub fn banner(color: &str, mono: bool) -> Style {
        let base = Style::default().add_modifier(Modifier::BOLD);
        if mono {
            return base.add_modifier(Modifier::REVERSED);
        }
        match health_color(color) {
            Some(c) => base.fg(Theme::BANNER_FG).bg(c),
            None => base.add_modifier(Modifier::REVERSED),
        }
    }
}
