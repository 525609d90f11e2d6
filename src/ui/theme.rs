use ratatui::style::Color;

use crate::model::work_item::{Rank, SourceKind};

pub const ACCENT: Color = Color::Cyan;
pub const MUTED: Color = Color::DarkGray;
pub const LABEL: Color = Color::Gray;

pub fn source_color(source: SourceKind) -> Color {
    match source {
        SourceKind::GitHub => Color::White,
        SourceKind::GitLab => Color::Rgb(0xFC, 0x6D, 0x26),
        SourceKind::Planner => Color::Rgb(0x31, 0x75, 0x2F),
    }
}

pub fn rank_color(rank: i32) -> Color {
    match Rank::from_value(rank) {
        Some(Rank::Pin) => Color::Magenta,
        Some(Rank::High) => Color::Red,
        Some(Rank::Low) => MUTED,
        Some(Rank::Normal) | None => Color::Reset,
    }
}

/// A short marker shown before the title; normal rank shows nothing.
pub fn rank_badge(rank: i32) -> &'static str {
    match Rank::from_value(rank) {
        Some(Rank::Pin) => "📌",
        Some(Rank::High) => "▲ ",
        Some(Rank::Low) => "▼ ",
        Some(Rank::Normal) | None => "  ",
    }
}
