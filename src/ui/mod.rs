pub mod command_bar;
pub mod detail_panel;
pub mod footer;
pub mod item_list;
pub mod theme;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::app::App;

pub fn render(f: &mut Frame, app: &App) {
    let size = f.area();

    // Command bar (3) when input is active, else the two-line footer
    let bottom_height = if app.input_active { 3 } else { 2 };

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(bottom_height)])
        .split(size);

    // Items (65%) + Detail (35%)
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(vertical[0]);

    item_list::render(f, horizontal[0], app);
    detail_panel::render(f, horizontal[1], app);

    if app.input_active {
        command_bar::render(f, vertical[1], app);
    } else {
        footer::render(f, vertical[1], app);
    }
}
