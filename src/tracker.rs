/*!
    Task mutations. Each one loads the whole list, backs it up,
    applies a single change and saves the list again.
!*/
use std::sync::Arc;

use tracing::info;

use crate::notifier::Notifier;
use crate::store::{Store, StoreError};
use crate::task::{Draft, Task};

/// Result of an operation addressed by display index.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    /// The index was outside `1..=len`. Nothing was changed or written.
    InvalidIndex,
}

pub struct Tracker {
    store: Store,
    notifier: Arc<dyn Notifier>,
}

impl Tracker {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>) -> Self {
        Tracker { store, notifier }
    }

    #[cfg(test)]
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.store.load()
    }

    /// Appends a new, incomplete task. Empty descriptions are the
    /// caller's to reject.
    pub fn add(&self, draft: Draft) -> Result<Task, StoreError> {
        self.store.backup()?;
        let mut tasks = self.store.load()?;

        let task = draft.into_task();
        tasks.push(task.clone());
        self.store.save(&tasks)?;

        info!(index = tasks.len(), description = %task.description, "added task");
        self.notifier.notify("Task Added", &task.description);
        Ok(task)
    }

    /// Marks the task at the 1-based `index` as completed. Completing a
    /// task twice is not an error.
    pub fn complete(&self, index: usize) -> Result<Outcome<Task>, StoreError> {
        let mut tasks = self.store.load()?;
        let Some(slot) = slot(index, tasks.len()) else {
            info!(index, len = tasks.len(), "complete: invalid task number");
            return Ok(Outcome::InvalidIndex);
        };
        self.store.snapshot(&tasks)?;

        tasks[slot].completed = true;
        self.store.save(&tasks)?;

        let task = tasks.swap_remove(slot);
        info!(index, description = %task.description, "completed task");
        self.notifier
            .notify("Task Completed!", &format!("Completed: {}", task.description));
        Ok(Outcome::Done(task))
    }

    /// Removes the task at the 1-based `index` and returns it.
    pub fn delete(&self, index: usize) -> Result<Outcome<Task>, StoreError> {
        let mut tasks = self.store.load()?;
        let Some(slot) = slot(index, tasks.len()) else {
            info!(index, len = tasks.len(), "delete: invalid task number");
            return Ok(Outcome::InvalidIndex);
        };
        self.store.snapshot(&tasks)?;

        let task = tasks.remove(slot);
        self.store.save(&tasks)?;

        info!(index, description = %task.description, "deleted task");
        self.notifier
            .notify("Task Deleted", &format!("Deleted: {}", task.description));
        Ok(Outcome::Done(task))
    }

    /// Restores the list saved before the last mutation. Returns `false`
    /// when no backup exists.
    pub fn undo(&self) -> Result<bool, StoreError> {
        let restored = self.store.undo()?;
        if restored {
            info!("restored tasks from backup");
        } else {
            info!("undo: no backup found");
        }
        Ok(restored)
    }
}

fn slot(index: usize, len: usize) -> Option<usize> {
    index.checked_sub(1).filter(|slot| *slot < len)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::notifier::testing::RecordingNotifier;
    use crate::task::Priority;
    use crate::view::{TaskFilter, list};

    fn tracker() -> (TempDir, Arc<RecordingNotifier>, Tracker) {
        let dir = TempDir::new().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let tracker = Tracker::new(Store::in_dir(dir.path()), notifier.clone());
        (dir, notifier, tracker)
    }

    #[test]
    fn add_appends_one_incomplete_task() {
        let (_dir, notifier, tracker) = tracker();
        tracker.add(Draft::new("First")).unwrap();
        tracker.add(Draft::new("New task")).unwrap();

        let tasks = tracker.tasks().unwrap();
        assert_eq!(tasks.len(), 2);
        let last = tasks.last().unwrap();
        assert_eq!(last.description, "New task");
        assert!(!last.completed);
        assert!(last.created_at.is_some());

        let alerts = notifier.alerts();
        assert_eq!(alerts[1].title, "Task Added");
        assert_eq!(alerts[1].message, "New task");
    }

    #[test]
    fn add_keeps_metadata() {
        let (_dir, _notifier, tracker) = tracker();
        let draft = Draft {
            description: "Dentist".to_string(),
            due_date: chrono::NaiveDate::from_ymd_opt(2025, 4, 1),
            category: Some("health".to_string()),
            priority: Some(Priority::Low),
        };
        tracker.add(draft).unwrap();

        let task = &tracker.tasks().unwrap()[0];
        assert_eq!(task.category.as_deref(), Some("health"));
        assert_eq!(task.priority, Some(Priority::Low));
        assert_eq!(task.due_date, chrono::NaiveDate::from_ymd_opt(2025, 4, 1));
    }

    #[test]
    fn complete_out_of_range_is_a_no_op() {
        let (_dir, notifier, tracker) = tracker();
        assert_eq!(tracker.complete(1).unwrap(), Outcome::InvalidIndex);
        assert!(!tracker.store().tasks_path().exists());

        tracker.add(Draft::new("Task 1")).unwrap();
        let before = tracker.tasks().unwrap();
        assert_eq!(tracker.complete(0).unwrap(), Outcome::InvalidIndex);
        assert_eq!(tracker.complete(2).unwrap(), Outcome::InvalidIndex);
        assert_eq!(tracker.tasks().unwrap(), before);
        assert_eq!(notifier.alerts().len(), 1);
    }

    #[test]
    fn complete_is_idempotent() {
        let (_dir, notifier, tracker) = tracker();
        tracker.add(Draft::new("Task 1")).unwrap();

        let Outcome::Done(task) = tracker.complete(1).unwrap() else {
            panic!("expected task 1 to complete");
        };
        assert!(task.completed);
        assert!(matches!(tracker.complete(1).unwrap(), Outcome::Done(_)));
        assert!(tracker.tasks().unwrap()[0].completed);
        assert_eq!(notifier.alerts()[1].message, "Completed: Task 1");
    }

    #[test]
    fn delete_removes_and_reports_task() {
        let (_dir, _notifier, tracker) = tracker();
        tracker.add(Draft::new("A")).unwrap();
        tracker.add(Draft::new("B")).unwrap();

        let Outcome::Done(removed) = tracker.delete(1).unwrap() else {
            panic!("expected task 1 to be deleted");
        };
        assert_eq!(removed.description, "A");
        let tasks = tracker.tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description, "B");
        assert_eq!(tracker.delete(2).unwrap(), Outcome::InvalidIndex);
    }

    #[test]
    fn undo_restores_exactly_one_generation() {
        let (_dir, _notifier, tracker) = tracker();
        assert!(!tracker.undo().unwrap());

        tracker.add(Draft::new("A")).unwrap();
        tracker.delete(1).unwrap();
        assert!(tracker.tasks().unwrap().is_empty());

        assert!(tracker.undo().unwrap());
        let tasks = tracker.tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description, "A");

        assert!(tracker.undo().unwrap());
        assert_eq!(tracker.tasks().unwrap(), tasks);
    }

    #[test]
    fn invalid_index_keeps_previous_backup() {
        let (_dir, _notifier, tracker) = tracker();
        tracker.add(Draft::new("A")).unwrap();
        tracker.add(Draft::new("B")).unwrap();
        assert_eq!(tracker.delete(7).unwrap(), Outcome::InvalidIndex);

        assert!(tracker.undo().unwrap());
        let tasks = tracker.tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description, "A");
    }

    #[test]
    fn failed_backup_write_leaves_tasks_unchanged() {
        let (_dir, notifier, tracker) = tracker();
        tracker.add(Draft::new("A")).unwrap();
        let backup = tracker.store().backup_path().to_path_buf();
        std::fs::remove_file(&backup).unwrap();
        std::fs::create_dir(&backup).unwrap();

        let completed = tracker.complete(1);
        assert!(matches!(
            completed,
            Err(StoreError::Write { ref path, .. }) if *path == backup
        ));
        assert!(!tracker.tasks().unwrap()[0].completed);
        assert_eq!(notifier.alerts().len(), 1);
    }

    #[test]
    fn buy_milk_scenario() {
        let (_dir, _notifier, tracker) = tracker();
        let mut draft = Draft::new("Buy milk");
        draft.priority = Some(Priority::High);
        tracker.add(draft).unwrap();

        let tasks = tracker.tasks().unwrap();
        let rows: Vec<_> = list(&tasks, &TaskFilter::default()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, 1);
        assert_eq!(rows[0].1.description, "Buy milk");
        assert_eq!(rows[0].1.priority, Some(Priority::High));
        assert!(!rows[0].1.completed);

        assert!(matches!(tracker.complete(1).unwrap(), Outcome::Done(_)));
        let tasks = tracker.tasks().unwrap();
        let rows: Vec<_> = list(&tasks, &TaskFilter::default()).collect();
        assert!(rows[0].1.completed);

        assert_eq!(tracker.complete(5).unwrap(), Outcome::InvalidIndex);
        assert_eq!(tracker.tasks().unwrap().len(), 1);
    }
}
