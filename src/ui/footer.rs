use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;
use crate::model::work_item::SourceKind;
use crate::ui::theme::{source_color, MUTED};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let mut stats_line = Vec::new();
    if let Some(view) = &app.view {
        let stats = &view.stats;
        stats_line.push(Span::raw(format!(
            " {} items  {} issues  {} PRs  {} new ",
            stats.total,
            stats.issues,
            stats.pulls,
            view.new_ids.len()
        )));
        for source in SourceKind::ALL {
            let count = stats.source_count(source);
            if count > 0 {
                stats_line.push(Span::styled(
                    format!(" {} {count} ", source.display_name()),
                    Style::default().fg(source_color(source)),
                ));
            }
        }
        if let Some(at) = view.fetched_at {
            let origin = if view.from_cache { "cached" } else { "fetched" };
            stats_line.push(Span::styled(
                format!("  {origin} {}", at.with_timezone(&chrono::Local).format("%H:%M")),
                Style::default().fg(MUTED),
            ));
        }
    } else if !app.has_sources() {
        stats_line.push(Span::styled(
            " No services configured ",
            Style::default().fg(Color::Yellow),
        ));
    }

    let mut hints = vec![
        hint("↑↓", "navigate"),
        hint("p/h/n/l", "rank"),
        hint("t", "todo"),
        hint("s/S", "seen"),
        hint("f", "filter"),
        hint("r", "reload"),
        hint(":", "new task"),
        hint("q", "quit"),
    ];

    // Flash message
    if let Some((msg, _)) = &app.flash_message {
        hints.push(Span::raw("  "));
        hints.push(Span::styled(msg.clone(), Style::default().fg(Color::Yellow)));
    }

    let paragraph = Paragraph::new(vec![Line::from(stats_line), Line::from(hints)]);
    f.render_widget(paragraph, area);
}

fn hint(key: &str, desc: &str) -> Span<'static> {
    Span::styled(format!(" {key}:{desc} "), Style::default().fg(MUTED))
}
