use std::time::Instant;

use crate::event::KeyAction;
use crate::model::work_item::{Rank, WorkItem};
use crate::rank::{apply_filter, Filter};
use crate::service::{IssuesView, TodoService};
use crate::store::overrides::RankChange;

#[derive(Debug, Clone)]
pub enum Action {
    Key(KeyAction),
    Tick,
    Redraw,
    Quit,
}

pub struct App {
    service: TodoService,
    pub view: Option<IssuesView>,
    /// The view's items after the active filter.
    pub items: Vec<WorkItem>,
    pub selected_item: usize,
    pub filter: Filter,
    pub loading: bool,
    pub flash_message: Option<(String, Instant)>,
    pub input_active: bool,
    pub input_buffer: String,
    /// Cursor position in chars, not bytes.
    pub input_cursor: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(service: TodoService) -> Self {
        Self {
            service,
            view: None,
            items: Vec::new(),
            selected_item: 0,
            filter: Filter::All,
            loading: true,
            flash_message: None,
            input_active: false,
            input_buffer: String::new(),
            input_cursor: 0,
            should_quit: false,
        }
    }

    pub fn has_sources(&self) -> bool {
        self.service.has_sources()
    }

    pub async fn update(&mut self, action: Action) {
        // Clear flash message after 3 seconds
        if let Some((_, t)) = &self.flash_message {
            if t.elapsed().as_secs() >= 3 {
                self.flash_message = None;
            }
        }

        match action {
            Action::Key(key) if self.input_active => self.handle_input_key(key).await,
            Action::Key(key) => self.handle_key(key).await,
            Action::Tick => self.refresh_items(true).await,
            Action::Redraw => {}
            Action::Quit => {
                self.should_quit = true;
            }
        }
    }

    async fn handle_key(&mut self, key: KeyAction) {
        match key {
            KeyAction::Up | KeyAction::Char('k') => {
                self.selected_item = self.selected_item.saturating_sub(1);
            }
            KeyAction::Down | KeyAction::Char('j') => {
                if self.selected_item + 1 < self.items.len() {
                    self.selected_item += 1;
                }
            }
            KeyAction::Home => self.selected_item = 0,
            KeyAction::End => self.selected_item = self.items.len().saturating_sub(1),
            KeyAction::Char('q') => self.should_quit = true,
            KeyAction::Char('p') => self.rank_selected(Rank::Pin).await,
            KeyAction::Char('h') => self.rank_selected(Rank::High).await,
            KeyAction::Char('n') => self.rank_selected(Rank::Normal).await,
            KeyAction::Char('l') => self.rank_selected(Rank::Low).await,
            KeyAction::Char('t') => self.toggle_todo_selected().await,
            KeyAction::Char('s') | KeyAction::Select => self.mark_selected_seen().await,
            KeyAction::Char('S') => self.mark_all_seen().await,
            KeyAction::Char('r') => {
                self.refresh_items(false).await;
                self.flash("Reloaded from all sources");
            }
            KeyAction::Char('f') => {
                self.filter = self.filter.toggle();
                self.reapply_filter();
                self.flash(match self.filter {
                    Filter::All => "Showing all items",
                    Filter::TodoList => "Showing todo list",
                });
            }
            KeyAction::Char(':') => {
                self.input_active = true;
                self.input_buffer.clear();
                self.input_cursor = 0;
            }
            _ => {}
        }
    }

    async fn handle_input_key(&mut self, key: KeyAction) {
        match key {
            KeyAction::Escape => self.close_input(),
            KeyAction::Select => self.submit_input().await,
            KeyAction::Char(c) => {
                let at = byte_index(&self.input_buffer, self.input_cursor);
                self.input_buffer.insert(at, c);
                self.input_cursor += 1;
            }
            KeyAction::Backspace => {
                if self.input_cursor > 0 {
                    self.input_cursor -= 1;
                    let at = byte_index(&self.input_buffer, self.input_cursor);
                    self.input_buffer.remove(at);
                }
            }
            KeyAction::Left => self.input_cursor = self.input_cursor.saturating_sub(1),
            KeyAction::Right => {
                self.input_cursor = (self.input_cursor + 1).min(self.input_buffer.chars().count());
            }
            KeyAction::Home => self.input_cursor = 0,
            KeyAction::End => self.input_cursor = self.input_buffer.chars().count(),
            KeyAction::Up | KeyAction::Down => {}
        }
    }

    fn close_input(&mut self) {
        self.input_active = false;
        self.input_buffer.clear();
        self.input_cursor = 0;
    }

    async fn submit_input(&mut self) {
        let (title, labels) = parse_task_input(&self.input_buffer);
        self.close_input();
        if title.is_empty() {
            self.flash("Task title cannot be empty");
            return;
        }
        match self.service.create_item(&title, &labels).await {
            Ok(url) => {
                self.refresh_items(true).await;
                self.flash(&format!("Created: {url}"));
            }
            Err(e) => {
                tracing::warn!("task creation failed: {e:#}");
                self.flash(&format!("Create failed: {e:#}"));
            }
        }
    }

    pub async fn refresh_items(&mut self, use_cache: bool) {
        self.loading = true;
        let selected_id = self.selected().map(|i| i.id.clone());
        let view = self.service.get_issues_and_stats(use_cache).await;
        if let Some(first) = view.warnings.first() {
            let more = view.warnings.len() - 1;
            let suffix = if more > 0 { format!(" (+{more} more)") } else { String::new() };
            self.flash(&format!("{first}{suffix}"));
        }
        self.view = Some(view);
        self.loading = false;
        self.reapply_filter();
        if let Some(id) = selected_id {
            self.select_id(&id);
        }
    }

    fn reapply_filter(&mut self) {
        self.items = self
            .view
            .as_ref()
            .map(|v| apply_filter(v.items.clone(), self.filter))
            .unwrap_or_default();
        if self.selected_item >= self.items.len() {
            self.selected_item = self.items.len().saturating_sub(1);
        }
    }

    fn select_id(&mut self, id: &str) {
        if let Some(pos) = self.items.iter().position(|i| i.id == id) {
            self.selected_item = pos;
        }
    }

    pub fn selected(&self) -> Option<&WorkItem> {
        self.items.get(self.selected_item)
    }

    pub fn is_new(&self, id: &str) -> bool {
        self.view.as_ref().is_some_and(|v| v.is_new(id))
    }

    async fn rank_selected(&mut self, rank: Rank) {
        let Some(item) = self.selected() else { return };
        let (id, label) = (item.id.clone(), item_label(item));
        match self.service.set_ranking(&id, rank.as_str()) {
            Ok(RankChange::Set(rank)) => self.flash(&format!("{label}: {}", rank.as_str())),
            Ok(RankChange::Reset) => self.flash(&format!("{label}: rank reset")),
            Err(e) => self.flash(&e.to_string()),
        }
        self.refresh_items(true).await;
    }

    async fn toggle_todo_selected(&mut self) {
        let Some(item) = self.selected() else { return };
        let (id, label) = (item.id.clone(), item_label(item));
        match self.service.toggle_todo(&id) {
            Ok(true) => self.flash(&format!("{label}: added to todo list")),
            Ok(false) => self.flash(&format!("{label}: removed from todo list")),
            Err(e) => self.flash(&e.to_string()),
        }
        self.refresh_items(true).await;
    }

    async fn mark_selected_seen(&mut self) {
        let Some(id) = self.selected().map(|i| i.id.clone()) else { return };
        if let Err(e) = self.service.mark_seen([id]) {
            self.flash(&e.to_string());
        }
        self.refresh_items(true).await;
    }

    async fn mark_all_seen(&mut self) {
        let ids: Vec<String> = self.view.as_ref().map(|v| v.new_ids.clone()).unwrap_or_default();
        match self.service.mark_seen(&ids) {
            Ok(n) => self.flash(&format!("Marked {n} item(s) as seen")),
            Err(e) => self.flash(&e.to_string()),
        }
        self.refresh_items(true).await;
    }

    fn flash(&mut self, msg: &str) {
        self.flash_message = Some((msg.to_string(), Instant::now()));
    }
}

fn item_label(item: &WorkItem) -> String {
    if item.reference.is_empty() {
        item.id.clone()
    } else {
        item.reference.clone()
    }
}

fn byte_index(s: &str, char_pos: usize) -> usize {
    s.char_indices().nth(char_pos).map_or(s.len(), |(i, _)| i)
}

/// Split command bar input into a title and `#label` words.
pub fn parse_task_input(input: &str) -> (String, Vec<String>) {
    let mut title = Vec::new();
    let mut labels = Vec::new();
    for word in input.split_whitespace() {
        match word.strip_prefix('#') {
            Some(label) if !label.is_empty() => labels.push(label.to_string()),
            _ => title.push(word),
        }
    }
    (title.join(" "), labels)
}
