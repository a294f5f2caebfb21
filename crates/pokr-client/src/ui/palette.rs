use ratatui::style::{Color, Style};

use crate::prefs::Theme;

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub accent: Color,
    pub ready: Color,
    pub pending: Color,
    pub error: Color,
    pub selected_bg: Color,
    pub selected_fg: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                background: Color::Rgb(12, 14, 12),
                text: Color::Rgb(200, 220, 200),
                muted: Color::Rgb(110, 120, 110),
                border: Color::Rgb(40, 110, 60),
                accent: Color::Rgb(100, 255, 150),
                ready: Color::Rgb(74, 222, 128),
                pending: Color::Rgb(107, 114, 128),
                error: Color::Rgb(255, 110, 100),
                selected_bg: Color::Rgb(22, 163, 74),
                selected_fg: Color::Rgb(17, 24, 39),
            },
            Theme::Light => Self {
                background: Color::Rgb(249, 250, 251),
                text: Color::Rgb(17, 24, 39),
                muted: Color::Rgb(107, 114, 128),
                border: Color::Rgb(209, 213, 219),
                accent: Color::Rgb(21, 128, 61),
                ready: Color::Rgb(22, 163, 74),
                pending: Color::Rgb(156, 163, 175),
                error: Color::Rgb(200, 30, 30),
                selected_bg: Color::Rgb(22, 163, 74),
                selected_fg: Color::Rgb(249, 250, 251),
            },
        }
    }

    pub fn base(&self) -> Style {
        Style::default().fg(self.text).bg(self.background)
    }

    pub fn fg(&self, color: Color) -> Style {
        Style::default().fg(color)
    }
}
