use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::app::App;
use crate::rank::Filter;
use crate::ui::theme::{rank_badge, rank_color, source_color, ACCENT, MUTED};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let selected = i == app.selected_item;

            let new_marker = if app.is_new(&item.id) {
                Span::styled("● ", Style::default().fg(Color::Green))
            } else {
                Span::raw("  ")
            };
            let rank = Span::styled(rank_badge(item.rank), Style::default().fg(rank_color(item.rank)));
            let todo = if item.todolist {
                Span::styled("✓ ", Style::default().fg(Color::Green))
            } else {
                Span::raw("  ")
            };

            let reference = if item.reference.is_empty() { &item.id } else { &item.reference };
            let ref_span = Span::styled(
                format!("{reference} "),
                Style::default().fg(source_color(item.source)),
            );

            // Truncate title to fit
            let used = 8 + reference.chars().count() + item.updated_at_display.chars().count();
            let max_title = (area.width as usize).saturating_sub(used + 4);
            let mut title: String = item.title.chars().take(max_title).collect();
            if item.pull {
                title.insert_str(0, "[PR] ");
            }
            let title_style = if selected {
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let age = Span::styled(format!("  {}", item.updated_at_display), Style::default().fg(MUTED));

            ListItem::new(Line::from(vec![
                new_marker,
                rank,
                todo,
                ref_span,
                Span::styled(title, title_style),
                age,
            ]))
        })
        .collect();

    let count = app.items.len();
    let scope = match app.filter {
        Filter::All => "Work Items",
        Filter::TodoList => "Todo List",
    };
    let title = if app.loading {
        format!(" {scope} (loading...) ")
    } else {
        format!(" {scope} ({count}) ")
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .title(title),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    if count > 0 {
        state.select(Some(app.selected_item));
    }
    f.render_stateful_widget(list, area, &mut state);
}
