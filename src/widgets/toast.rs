//! Toast notifications — transient status messages in the top-right corner.
//!
//! Stands in for the original's modal error dialogs: errors are shown for a
//! few seconds and never block input.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use crate::theme::{C_TOAST_ERROR, C_TOAST_INFO, C_TOAST_WARNING};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

struct Toast {
    message: String,
    severity: Severity,
    expires: Instant,
}

pub struct ToastManager {
    toasts: VecDeque<Toast>,
    max_visible: usize,
}

impl ToastManager {
    pub fn new() -> Self {
        Self {
            toasts: VecDeque::new(),
            max_visible: 3,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity, duration: Duration) {
        let msg = message.into();
        // Repeating failures (e.g. a fetch error every tick) replace their
        // previous toast instead of stacking.
        self.toasts.retain(|t| t.message != msg);
        self.toasts.push_back(Toast {
            message: msg,
            severity,
            expires: Instant::now() + duration,
        });
        while self.toasts.len() > self.max_visible * 2 {
            self.toasts.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Info, Duration::from_secs(3));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Warning, Duration::from_secs(4));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Error, Duration::from_secs(5));
    }

    /// Drop expired toasts. Call on every tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.toasts.retain(|t| t.expires > now);
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        if self.is_empty() {
            return;
        }
        let max_width = (area.width / 2).clamp(24, 60);
        let mut y = area.y + 1;

        for toast in self.toasts.iter().rev().take(self.max_visible) {
            let (color, icon) = match toast.severity {
                Severity::Info => (C_TOAST_INFO, "·"),
                Severity::Warning => (C_TOAST_WARNING, "!"),
                Severity::Error => (C_TOAST_ERROR, "✗"),
            };

            let msg_len = toast.message.chars().count() as u16;
            let w = (msg_len + 4).min(max_width);
            let x = area.x + area.width.saturating_sub(w + 1);
            let toast_area = Rect {
                x,
                y,
                width: w,
                height: 1,
            };
            frame.render_widget(Clear, toast_area);
            frame.render_widget(
                Paragraph::new(Line::from(vec![Span::styled(
                    format!(" {} {} ", icon, &toast.message),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )])),
                toast_area,
            );

            y += 1;
            if y >= area.y + area.height {
                break;
            }
        }
    }
}

impl Default for ToastManager {
    fn default() -> Self {
        Self::new()
    }
}
