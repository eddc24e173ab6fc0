use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Layout, Position};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::Line;
use ratatui::widgets::{Block, Cell, Paragraph, Row, Table, TableState};
use ratatui::{DefaultTerminal, Frame};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::notifier::Alert;
use crate::quick_add::parse_draft;
use crate::store::StoreError;
use crate::task::{Priority, Task};
use crate::tracker::{Outcome, Tracker};
use crate::view::{TaskFilter, by_priority, categories, list};

const TICK: Duration = Duration::from_millis(250);
const REFRESH: Duration = Duration::from_secs(2);
const HELP: &str = "a add  space complete  d delete  u undo  h hide done  p sort  f category  q quit";

pub struct Dashboard {
    tracker: Tracker,
    task_list: TaskList,
    filter: TaskFilter,
    sort_by_priority: bool,
    mode: Mode,
    status: Option<String>,
    alerts: UnboundedReceiver<Alert>,
    last_reload: Instant,
    exit: bool,
}

pub struct TaskList {
    items: Vec<Task>,
    state: TableState,
}

#[derive(Debug, PartialEq)]
enum Mode {
    Browse,
    Adding(String),
}

/// Runs the dashboard until the user quits. A failed save ends the
/// dashboard with that error.
pub fn run(tracker: Tracker, alerts: UnboundedReceiver<Alert>) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = Dashboard::new(tracker, alerts).and_then(|mut dashboard| {
        dashboard.event_loop(&mut terminal)
    });
    ratatui::restore();
    result
}

/// Rows currently on screen with their display index.
fn visible_rows<'a>(
    items: &'a [Task],
    filter: &'a TaskFilter,
    sort_by_priority: bool,
) -> Vec<(usize, &'a Task)> {
    let rows = list(items, filter);
    if sort_by_priority {
        by_priority(rows)
    } else {
        rows.collect()
    }
}

impl Dashboard {
    pub fn new(tracker: Tracker, alerts: UnboundedReceiver<Alert>) -> Result<Self> {
        let items = tracker.tasks()?;
        let mut dashboard = Dashboard {
            tracker,
            task_list: TaskList {
                items,
                state: TableState::default(),
            },
            filter: TaskFilter::default(),
            sort_by_priority: false,
            mode: Mode::Browse,
            status: None,
            alerts,
            last_reload: Instant::now(),
            exit: false,
        };
        dashboard.clamp_selection();
        Ok(dashboard)
    }

    fn event_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        while !self.exit {
            terminal.draw(|frame| self.render(frame))?;
            if event::poll(TICK)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key)?;
                    }
                }
            }
            self.drain_alerts()?;
            if self.last_reload.elapsed() >= REFRESH {
                self.reload()?;
            }
        }
        Ok(())
    }

    fn reload(&mut self) -> Result<(), StoreError> {
        self.task_list.items = self.tracker.tasks()?;
        self.last_reload = Instant::now();
        self.clamp_selection();
        Ok(())
    }

    fn drain_alerts(&mut self) -> Result<(), StoreError> {
        let mut latest = None;
        while let Ok(alert) = self.alerts.try_recv() {
            latest = Some(alert);
        }
        if let Some(alert) = latest {
            self.status = Some(format!("❗ {}: {}", alert.title, alert.message));
            self.reload()?;
        }
        Ok(())
    }

    fn rows(&self) -> Vec<(usize, &Task)> {
        visible_rows(&self.task_list.items, &self.filter, self.sort_by_priority)
    }

    fn clamp_selection(&mut self) {
        let len = self.rows().len();
        let selected = match self.task_list.state.selected() {
            _ if len == 0 => None,
            Some(row) => Some(row.min(len - 1)),
            None => Some(0),
        };
        self.task_list.state.select(selected);
    }

    /// Display index of the highlighted row.
    fn selected_index(&self) -> Option<usize> {
        let row = self.task_list.state.selected()?;
        self.rows().get(row).map(|(index, _)| *index)
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<(), StoreError> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.exit = true;
            return Ok(());
        }
        match &mut self.mode {
            Mode::Adding(input) => match key.code {
                KeyCode::Esc => self.mode = Mode::Browse,
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                KeyCode::Enter => {
                    let line = std::mem::take(input);
                    self.submit(line)?;
                }
                _ => {}
            },
            Mode::Browse => self.handle_browse_key(key.code)?,
        }
        Ok(())
    }

    fn submit(&mut self, line: String) -> Result<(), StoreError> {
        match parse_draft(&line) {
            Ok(draft) => {
                let task = self.tracker.add(draft)?;
                self.mode = Mode::Browse;
                self.status = Some(format!("Added: {}", task.description));
                self.reload()?;
            }
            Err(err) => {
                self.status = Some(err.to_string());
                self.mode = Mode::Adding(line);
            }
        }
        Ok(())
    }

    fn handle_browse_key(&mut self, code: KeyCode) -> Result<(), StoreError> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.exit = true,
            KeyCode::Char('j') | KeyCode::Down => self.task_list.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.task_list.state.select_previous(),
            KeyCode::Char('a') => {
                self.mode = Mode::Adding(String::new());
                self.status = None;
            }
            KeyCode::Char(' ') | KeyCode::Char('c') => {
                if let Some(index) = self.selected_index() {
                    self.status = Some(match self.tracker.complete(index)? {
                        Outcome::Done(task) => format!("Completed: {}", task.description),
                        Outcome::InvalidIndex => "Invalid task number".to_string(),
                    });
                    self.reload()?;
                }
            }
            KeyCode::Char('d') => {
                if let Some(index) = self.selected_index() {
                    self.status = Some(match self.tracker.delete(index)? {
                        Outcome::Done(task) => format!("Deleted: {}", task.description),
                        Outcome::InvalidIndex => "Invalid task number".to_string(),
                    });
                    self.reload()?;
                }
            }
            KeyCode::Char('u') => {
                let message = if self.tracker.undo()? {
                    "Restored previous state"
                } else {
                    "No backup found"
                };
                self.status = Some(message.to_string());
                self.reload()?;
            }
            KeyCode::Char('h') => {
                self.filter.hide_completed = !self.filter.hide_completed;
                self.clamp_selection();
            }
            KeyCode::Char('p') => {
                self.sort_by_priority = !self.sort_by_priority;
                self.clamp_selection();
            }
            KeyCode::Char('f') => {
                self.filter.category = next_category(
                    &categories(&self.task_list.items),
                    self.filter.category.as_deref(),
                );
                self.clamp_selection();
            }
            _ => {}
        }
        self.clamp_selection();
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame) {
        let [table_area, status_area, help_area] = Layout::vertical([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let today = Local::now().date_naive();
        let rows = visible_rows(&self.task_list.items, &self.filter, self.sort_by_priority);
        let table = Table::new(
            rows.iter().map(|(index, task)| task_row(*index, task, today)),
            [
                Constraint::Length(4),
                Constraint::Length(3),
                Constraint::Length(6),
                Constraint::Length(10),
                Constraint::Length(12),
                Constraint::Fill(1),
            ],
        )
        .header(
            Row::new(["#", "", "Pri", "Due", "Category", "Task"])
                .style(Style::new().add_modifier(Modifier::BOLD)),
        )
        .block(Block::bordered().title(self.title(rows.len())))
        .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
        frame.render_stateful_widget(table, table_area, &mut self.task_list.state);

        match &self.mode {
            Mode::Adding(input) => {
                let prompt = format!("Add: {input}");
                let width = prompt.chars().count() as u16;
                frame.render_widget(Paragraph::new(prompt), status_area);
                frame.set_cursor_position(Position::new(
                    status_area.x.saturating_add(width),
                    status_area.y,
                ));
            }
            Mode::Browse => {
                let status = self.status.as_deref().unwrap_or_default();
                frame.render_widget(Paragraph::new(status).yellow(), status_area);
            }
        }
        let help = match self.mode {
            Mode::Adding(_) => "[YYYY-MM-DD] text #category !high|!medium|!low  enter save  esc cancel",
            Mode::Browse => HELP,
        };
        frame.render_widget(Paragraph::new(help).dim(), help_area);
    }

    fn title(&self, shown: usize) -> Line<'static> {
        let mut title = format!(" tidy: {shown} of {} tasks", self.task_list.items.len());
        if let Some(category) = &self.filter.category {
            title.push_str(&format!(", @{category}"));
        }
        if self.filter.hide_completed {
            title.push_str(", open only");
        }
        if self.sort_by_priority {
            title.push_str(", by priority");
        }
        title.push(' ');
        Line::from(title).bold()
    }
}

fn task_row(index: usize, task: &Task, today: NaiveDate) -> Row<'static> {
    let status = if task.completed { "[✓]" } else { "[ ]" };
    let priority = task.priority.map(Priority::marker).unwrap_or_default();
    let priority_style = match task.priority {
        Some(Priority::High) => Style::new().fg(Color::Red),
        Some(Priority::Medium) => Style::new().fg(Color::Yellow),
        Some(Priority::Low) => Style::new().fg(Color::Blue),
        None => Style::new(),
    };
    let due = task.due_date.map(|due| due.to_string()).unwrap_or_default();
    let category = task.category.clone().unwrap_or_default();

    let style = if task.completed {
        Style::new().add_modifier(Modifier::DIM | Modifier::CROSSED_OUT)
    } else if task.is_overdue(today) {
        Style::new().fg(Color::Red)
    } else {
        Style::new()
    };

    Row::new([
        Cell::from(index.to_string()),
        Cell::from(status),
        Cell::from(priority).style(priority_style),
        Cell::from(due),
        Cell::from(category),
        Cell::from(task.description.clone()),
    ])
    .style(style)
}

/// The category after `current` in `known`, wrapping back to no filter.
fn next_category(known: &[String], current: Option<&str>) -> Option<String> {
    match current {
        None => known.first().cloned(),
        Some(current) => known
            .iter()
            .position(|category| category.eq_ignore_ascii_case(current))
            .and_then(|at| known.get(at + 1))
            .cloned(),
    }
}
