use std::collections::BTreeMap;

use crate::task::{Priority, Task};

/// Predicates a listing must satisfy. Unset fields let everything through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub category: Option<String>,
    pub hide_completed: bool,
    pub priority: Option<Priority>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let category = self.category.as_deref().is_none_or(|wanted| {
            task.category
                .as_deref()
                .is_some_and(|category| category.eq_ignore_ascii_case(wanted))
        });
        let status = !(self.hide_completed && task.completed);
        let priority = self.priority.is_none_or(|wanted| task.priority == Some(wanted));
        category && status && priority
    }
}

/// Filtered `(display index, task)` pairs in insertion order. Display
/// indices are 1-based positions in the full list, not in the filtered
/// view, so they can be handed straight to `complete`/`delete`.
pub fn list<'t, 'f>(
    tasks: &'t [Task],
    filter: &'f TaskFilter,
) -> impl Iterator<Item = (usize, &'t Task)> + Clone {
    tasks
        .iter()
        .enumerate()
        .map(|(slot, task)| (slot + 1, task))
        .filter(move |(_, task)| filter.matches(task))
}

/// Reorders rows by priority for display. Equal priorities keep
/// their insertion order.
pub fn by_priority<'a>(rows: impl Iterator<Item = (usize, &'a Task)>) -> Vec<(usize, &'a Task)> {
    let mut rows: Vec<_> = rows.collect();
    rows.sort_by_key(|(_, task)| Priority::rank(task.priority));
    rows
}

/// Distinct categories in use, sorted. Categories differing only in
/// case count once, under the first spelling seen, the same way the
/// category filter compares them.
pub fn categories(tasks: &[Task]) -> Vec<String> {
    let mut seen = BTreeMap::new();
    for category in tasks.iter().filter_map(|task| task.category.as_deref()) {
        seen.entry(category.to_lowercase())
            .or_insert_with(|| category.to_string());
    }
    seen.into_values().collect()
}
