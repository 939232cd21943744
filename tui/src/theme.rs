//! Color themes for the tern renderer.
//!
//! Each name in the `theme` setting maps to a [`Palette`]. The daltonized
//! variants swap red and green for orange and blue; the ansi variants use the
//! terminal's own 16 colors.

use ratatui::style::{Color, Modifier, Style};

/// Dark palette colors.
mod dark {
    use super::Color;

    pub const TEXT: Color = Color::Rgb(220, 215, 186);
    pub const MUTED: Color = Color::Rgb(114, 113, 105);
    pub const ACCENT: Color = Color::Rgb(127, 180, 202);
    pub const BRAND: Color = Color::Rgb(204, 120, 92);
    pub const GREEN: Color = Color::Rgb(152, 187, 108);
    pub const YELLOW: Color = Color::Rgb(230, 195, 132);
    pub const RED: Color = Color::Rgb(255, 93, 98);
    pub const HIGHLIGHT: Color = Color::Rgb(42, 42, 55);
    pub const BORDER: Color = Color::Rgb(84, 84, 109);
}

/// Light palette colors.
mod light {
    use super::Color;

    pub const TEXT: Color = Color::Rgb(40, 40, 40);
    pub const MUTED: Color = Color::Rgb(120, 120, 120);
    pub const ACCENT: Color = Color::Rgb(0, 102, 153);
    pub const BRAND: Color = Color::Rgb(178, 84, 52);
    pub const GREEN: Color = Color::Rgb(44, 122, 44);
    pub const YELLOW: Color = Color::Rgb(150, 110, 0);
    pub const RED: Color = Color::Rgb(190, 30, 45);
    pub const HIGHLIGHT: Color = Color::Rgb(225, 225, 232);
    pub const BORDER: Color = Color::Rgb(170, 170, 180);
}

/// Orange and blue replace red and green in the daltonized themes.
const DALTON_ADDED: Color = Color::Rgb(86, 156, 214);
const DALTON_REMOVED: Color = Color::Rgb(230, 140, 40);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub brand: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub added: Color,
    pub removed: Color,
    pub highlight: Color,
    pub border: Color,
}

impl Palette {
    #[must_use]
    pub fn dark() -> Self {
        Self {
            text: dark::TEXT,
            muted: dark::MUTED,
            accent: dark::ACCENT,
            brand: dark::BRAND,
            success: dark::GREEN,
            warning: dark::YELLOW,
            error: dark::RED,
            added: dark::GREEN,
            removed: dark::RED,
            highlight: dark::HIGHLIGHT,
            border: dark::BORDER,
        }
    }

    #[must_use]
    pub fn light() -> Self {
        Self {
            text: light::TEXT,
            muted: light::MUTED,
            accent: light::ACCENT,
            brand: light::BRAND,
            success: light::GREEN,
            warning: light::YELLOW,
            error: light::RED,
            added: light::GREEN,
            removed: light::RED,
            highlight: light::HIGHLIGHT,
            border: light::BORDER,
        }
    }

    #[must_use]
    pub fn ansi(light_background: bool) -> Self {
        Self {
            text: Color::Reset,
            muted: if light_background {
                Color::Gray
            } else {
                Color::DarkGray
            },
            accent: Color::Cyan,
            brand: Color::Magenta,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            added: Color::Green,
            removed: Color::Red,
            highlight: if light_background {
                Color::Gray
            } else {
                Color::DarkGray
            },
            border: Color::Gray,
        }
    }

    #[must_use]
    fn daltonized(self) -> Self {
        Self {
            success: DALTON_ADDED,
            error: DALTON_REMOVED,
            added: DALTON_ADDED,
            removed: DALTON_REMOVED,
            ..self
        }
    }
}

/// Palette for a `theme` setting value. Unknown names fall back to dark.
#[must_use]
pub fn palette(theme: &str) -> Palette {
    match theme {
        "light" => Palette::light(),
        "dark-daltonized" => Palette::dark().daltonized(),
        "light-daltonized" => Palette::light().daltonized(),
        "dark-ansi" => Palette::ansi(false),
        "light-ansi" => Palette::ansi(true),
        _ => Palette::dark(),
    }
}

pub mod styles {
    use super::{Modifier, Palette, Style};

    #[must_use]
    pub fn text(palette: &Palette) -> Style {
        Style::default().fg(palette.text)
    }

    #[must_use]
    pub fn dim(palette: &Palette) -> Style {
        Style::default().fg(palette.muted)
    }

    #[must_use]
    pub fn user_echo(palette: &Palette) -> Style {
        Style::default().fg(palette.muted).add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn tool_name(palette: &Palette) -> Style {
        Style::default().fg(palette.brand).add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn selected(palette: &Palette) -> Style {
        Style::default()
            .fg(palette.accent)
            .bg(palette.highlight)
            .add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn key_hint(palette: &Palette) -> Style {
        Style::default().fg(palette.muted)
    }

    #[must_use]
    pub fn title(palette: &Palette) -> Style {
        Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
    }

    #[must_use]
    pub fn warning(palette: &Palette) -> Style {
        Style::default().fg(palette.warning)
    }

    #[must_use]
    pub fn error(palette: &Palette) -> Style {
        Style::default().fg(palette.error).add_modifier(Modifier::BOLD)
    }
}

#[cfg(test)]
mod tests {
    use ratatui::style::Color;
    use tern_types::THEMES;

    use super::{Palette, palette};

    #[test]
    fn every_theme_name_resolves() {
        for name in THEMES {
            let p = palette(name);
            assert_ne!(p.added, p.removed, "{name}");
        }
    }

    #[test]
    fn daltonized_avoids_red_green() {
        let p = palette("dark-daltonized");
        assert_ne!(p.added, Palette::dark().added);
        assert_ne!(p.removed, Palette::dark().removed);
        assert_eq!(p.text, Palette::dark().text);
    }

    #[test]
    fn ansi_uses_terminal_colors() {
        assert_eq!(palette("dark-ansi").added, Color::Green);
        assert_eq!(palette("unknown"), Palette::dark());
    }
}
