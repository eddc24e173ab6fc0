/*!
    Plain-text listing for the command line.
!*/
use chrono::NaiveDate;
use crossterm::style::{Color, Stylize, style};

use crate::task::{Priority, Task};

pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Palette { enabled }
    }

    pub fn paint(&self, text: &str, color: Color) -> String {
        if self.enabled {
            style(text).with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn success(&self, message: &str) -> String {
        format!("{} {message}", self.paint("✓", Color::Green))
    }

    pub fn failure(&self, message: &str) -> String {
        format!("{} {message}", self.paint("✖", Color::Red))
    }

    fn dim(&self, text: &str) -> String {
        if self.enabled {
            style(text).dim().to_string()
        } else {
            text.to_string()
        }
    }
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Blue,
    }
}

/// One line per row, e.g. `  1. [ ] Buy milk  !!! high  due 2025-03-12`.
pub fn render_rows<'a>(
    rows: impl IntoIterator<Item = (usize, &'a Task)>,
    today: NaiveDate,
    palette: &Palette,
) -> Vec<String> {
    rows.into_iter()
        .map(|(index, task)| render_row(index, task, today, palette))
        .collect()
}

fn render_row(index: usize, task: &Task, today: NaiveDate, palette: &Palette) -> String {
    let mut line = if task.completed {
        format!(
            "{index:>3}. {} {}",
            palette.paint("[✓]", Color::Green),
            palette.dim(&task.description)
        )
    } else {
        format!("{index:>3}. [ ] {}", task.description)
    };

    if let Some(priority) = task.priority {
        let label = format!("{} {priority}", priority.marker());
        line.push_str("  ");
        line.push_str(&palette.paint(&label, priority_color(priority)));
    }
    if let Some(due) = task.due_date {
        line.push_str("  ");
        if task.is_overdue(today) {
            line.push_str(&palette.paint(&format!("due {due} (overdue)"), Color::Red));
        } else {
            line.push_str(&format!("due {due}"));
        }
    }
    if let Some(category) = &task.category {
        line.push_str("  ");
        line.push_str(&palette.paint(&format!("@{category}"), Color::Cyan));
    }
    line
}
