use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, area: Rect, app: &crate::app::App) {
    if !app.input_active {
        return;
    }

    // Labels are highlighted as they are typed
    let mut spans = Vec::new();
    for (i, word) in app.input_buffer.split(' ').enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        if word.len() > 1 && word.starts_with('#') {
            spans.push(Span::styled(word.to_string(), Style::default().fg(Color::Magenta)));
        } else {
            spans.push(Span::raw(word.to_string()));
        }
    }

    let title = if app.input_buffer.is_empty() {
        " New task: title #label "
    } else {
        " New Task "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    f.render_widget(paragraph, area);

    // Position cursor
    let x = area.x + 1 + app.input_cursor as u16;
    let y = area.y + 1;
    f.set_cursor_position((x.min(area.x + area.width.saturating_sub(2)), y));
}
