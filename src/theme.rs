//! Color palette and style constants.

use ratatui::style::{Color, Modifier, Style};

// ── Color palette ─────────────────────────────────────────────────────────────

pub const C_ACCENT: Color = Color::Rgb(255, 0, 68); // skyrock red
pub const C_PLAYING: Color = Color::Rgb(80, 200, 120);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_SELECTION_BG: Color = Color::Rgb(40, 16, 24);
pub const C_PANEL_BORDER: Color = Color::Rgb(60, 24, 34);
pub const C_TOAST_INFO: Color = Color::Rgb(80, 160, 220);
pub const C_TOAST_WARNING: Color = Color::Rgb(255, 184, 80);
pub const C_TOAST_ERROR: Color = Color::Rgb(255, 95, 95);

// ── Predefined styles ─────────────────────────────────────────────────────────

pub fn style_default() -> Style {
    Style::default().fg(C_PRIMARY)
}

pub fn style_secondary() -> Style {
    Style::default().fg(C_SECONDARY)
}

pub fn style_accent() -> Style {
    Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD)
}

pub fn style_playing() -> Style {
    Style::default().fg(C_PLAYING)
}

pub fn style_selected() -> Style {
    Style::default()
        .bg(C_SELECTION_BG)
        .fg(C_PRIMARY)
        .add_modifier(Modifier::BOLD)
}

pub fn style_border() -> Style {
    Style::default().fg(C_PANEL_BORDER)
}
