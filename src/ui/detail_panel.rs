use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::ui::theme::{rank_color, source_color, ACCENT, LABEL};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .title(" Details ");

    let Some(item) = app.selected() else {
        f.render_widget(block, area);
        return;
    };

    let mut lines: Vec<Line> = vec![
        Line::styled(item.title.clone(), Style::default().fg(Color::White)),
        Line::raw(""),
        field("Source", Span::styled(item.source.display_name(), Style::default().fg(source_color(item.source)))),
        field("Kind", Span::raw(if item.pull { "Pull request" } else { "Issue" })),
    ];

    if !item.reference.is_empty() {
        lines.push(field("Ref", Span::raw(item.reference.clone())));
    }
    let rank = item.rank_name().map_or_else(|| item.rank.to_string(), str::to_string);
    lines.push(field("Rank", Span::styled(rank, Style::default().fg(rank_color(item.rank)))));
    if item.todolist {
        lines.push(field("Todo", Span::raw("yes")));
    }
    if !item.assignee_users.is_empty() {
        lines.push(field("Assignees", Span::raw(item.assignee_users.clone())));
    }
    if !item.labels.is_empty() {
        lines.push(field("Labels", Span::raw(item.labels.join(", "))));
    }
    if !item.milestone_title.is_empty() {
        lines.push(field("Milestone", Span::raw(item.milestone_title.clone())));
    }
    if !item.epic_title.is_empty() {
        lines.push(field("Epic", Span::raw(item.epic_title.clone())));
    }
    if !item.due_date.is_empty() {
        lines.push(field("Due", Span::styled(item.due_date.clone(), Style::default().fg(Color::Yellow))));
    }
    lines.push(field("Updated", Span::raw(item.updated_at_display.clone())));
    if !item.web_url.is_empty() {
        lines.push(field("URL", Span::styled(item.web_url.clone(), Style::default().fg(Color::Blue))));
    }
    lines.push(field("Id", Span::raw(item.id.clone())));

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn field(name: &str, value: Span<'static>) -> Line<'static> {
    Line::from(vec![Span::styled(format!("{name}: "), Style::default().fg(LABEL)), value])
}
