/*!
    Persists the task list as a JSON file and keeps a
    single-slot backup next to it for undo.
!*/
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::task::Task;

pub const TASKS_FILE: &str = "tasks.json";
pub const BACKUP_FILE: &str = "tasks.backup.json";
const CORRUPT_SUFFIX: &str = "corrupt";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("can't read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("can't write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("can't encode tasks")]
    Encode(#[from] serde_json::Error),
    #[error("backup {} is not a valid task list", path.display())]
    CorruptBackup {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Store {
    tasks_path: PathBuf,
    backup_path: PathBuf,
}

impl Store {
    pub fn new(tasks_path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Self {
        Store {
            tasks_path: tasks_path.into(),
            backup_path: backup_path.into(),
        }
    }

    /// A store using the default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Store::new(dir.join(TASKS_FILE), dir.join(BACKUP_FILE))
    }

    pub fn tasks_path(&self) -> &Path {
        &self.tasks_path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Loads every task. A missing file is an empty list. A file that
    /// isn't valid JSON is copied aside to `<file>.corrupt` and also
    /// reads as an empty list, so the next save can't destroy it.
    pub fn load(&self) -> Result<Vec<Task>, StoreError> {
        let content = match fs::read_to_string(&self.tasks_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.tasks_path.clone(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&content) {
            Ok(tasks) => Ok(tasks),
            Err(err) => {
                let aside = self.quarantine()?;
                warn!(
                    path = %self.tasks_path.display(),
                    copy = %aside.display(),
                    %err,
                    "tasks file is malformed, starting from an empty list"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Replaces the tasks file with `tasks`.
    pub fn save(&self, tasks: &[Task]) -> Result<(), StoreError> {
        write_atomic(&self.tasks_path, tasks)?;
        debug!(path = %self.tasks_path.display(), count = tasks.len(), "saved tasks");
        Ok(())
    }

    /// Copies the currently persisted tasks into the backup slot.
    pub fn backup(&self) -> Result<(), StoreError> {
        let tasks = self.load()?;
        self.snapshot(&tasks)
    }

    /// Writes `tasks` into the backup slot, overwriting the previous one.
    pub fn snapshot(&self, tasks: &[Task]) -> Result<(), StoreError> {
        write_atomic(&self.backup_path, tasks)?;
        debug!(path = %self.backup_path.display(), count = tasks.len(), "took backup");
        Ok(())
    }

    /// Restores the tasks file from the backup slot. Returns `false`
    /// when there is no backup. The backup stays in place, so undoing
    /// twice restores the same snapshot twice.
    pub fn undo(&self) -> Result<bool, StoreError> {
        let content = match fs::read_to_string(&self.backup_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.backup_path.clone(),
                    source,
                });
            }
        };
        let tasks: Vec<Task> =
            serde_json::from_str(&content).map_err(|source| StoreError::CorruptBackup {
                path: self.backup_path.clone(),
                source,
            })?;
        self.save(&tasks)?;
        Ok(true)
    }

    fn quarantine(&self) -> Result<PathBuf, StoreError> {
        let mut aside = self.tasks_path.clone().into_os_string();
        aside.push(".");
        aside.push(CORRUPT_SUFFIX);
        let aside = PathBuf::from(aside);
        fs::copy(&self.tasks_path, &aside).map_err(|source| StoreError::Write {
            path: aside.clone(),
            source,
        })?;
        Ok(aside)
    }
}

/// Writes to a temp file in the target directory and renames it over
/// `path`, so a crash never leaves a truncated file behind.
fn write_atomic(path: &Path, tasks: &[Task]) -> Result<(), StoreError> {
    let write_err = |source: io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let json = serde_json::to_string_pretty(tasks)?;
    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(json.as_bytes()).map_err(write_err)?;
    file.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::task::Priority;

    fn store() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::in_dir(dir.path());
        (dir, store)
    }

    #[test]
    fn load_missing_file_is_empty() {
        let (_dir, store) = store();
        assert_eq!(store.load().unwrap(), Vec::<Task>::new());
    }

    #[test]
    fn save_and_load_round_trip() {
        let (_dir, store) = store();
        let tasks = vec![
            Task::new("Test task"),
            Task::new("Dentist")
                .with_due_date(NaiveDate::from_ymd_opt(2025, 3, 12))
                .with_category(Some("health".to_string()))
                .with_priority(Some(Priority::Medium)),
        ];
        store.save(&tasks).unwrap();
        assert_eq!(store.load().unwrap(), tasks);

        store.save(&[]).unwrap();
        assert_eq!(store.load().unwrap(), Vec::<Task>::new());
    }

    #[test]
    fn save_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let store = Store::in_dir(&dir.path().join("nested/data"));
        store.save(&[Task::new("x")]).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn writes_expected_json_shape() {
        let (_dir, store) = store();
        let mut task = Task::new("Buy milk").with_priority(Some(Priority::High));
        task.created_at = None;
        store.save(&[task]).unwrap();

        let raw = fs::read_to_string(store.tasks_path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "description": "Buy milk",
                "completed": false,
                "due_date": null,
                "category": null,
                "priority": "high",
                "created_at": null
            }])
        );
    }

    #[test]
    fn malformed_file_loads_empty_and_is_kept_aside() {
        let (dir, store) = store();
        fs::write(store.tasks_path(), "{not json").unwrap();

        assert_eq!(store.load().unwrap(), Vec::<Task>::new());
        let aside = dir.path().join("tasks.json.corrupt");
        assert_eq!(fs::read_to_string(aside).unwrap(), "{not json");
    }

    #[test]
    fn loads_timestamps_without_offset() {
        let (dir, store) = store();
        let raw = r#"[
            {"description": "Pay rent", "completed": false, "due_date": "2025-03-01",
             "category": null, "priority": "high", "created_at": "2025-03-12T10:00:00.123456"},
            {"description": "Buy milk", "completed": true, "due_date": null,
             "category": "errands", "priority": null, "created_at": "2025-03-12T10:00:00Z"}
        ]"#;
        fs::write(store.tasks_path(), raw).unwrap();

        let tasks = store.load().unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].description, "Pay rent");
        assert!(tasks[0].created_at.is_some());
        assert!(tasks[1].completed);
        assert!(!dir.path().join("tasks.json.corrupt").exists());
    }

    #[test]
    fn failed_save_is_an_error_and_leaves_target_alone() {
        let (_dir, store) = store();
        // A directory where the tasks file should be can't be replaced.
        fs::create_dir(store.tasks_path()).unwrap();

        let saved = store.save(&[Task::new("x")]);
        assert!(matches!(
            saved,
            Err(StoreError::Write { ref path, .. }) if path == store.tasks_path()
        ));
        assert!(store.tasks_path().is_dir());
    }

    #[test]
    fn undo_without_backup_reports_false() {
        let (_dir, store) = store();
        assert!(!store.undo().unwrap());
    }

    #[test]
    fn undo_restores_same_snapshot_twice() {
        let (_dir, store) = store();
        let before = vec![Task::new("A")];
        store.save(&before).unwrap();
        store.backup().unwrap();
        store.save(&[]).unwrap();

        assert!(store.undo().unwrap());
        assert_eq!(store.load().unwrap(), before);

        store.save(&[Task::new("B")]).unwrap();
        assert!(store.undo().unwrap());
        assert_eq!(store.load().unwrap(), before);
    }

    #[test]
    fn corrupt_backup_is_an_error() {
        let (_dir, store) = store();
        store.save(&[Task::new("keep")]).unwrap();
        fs::write(store.backup_path(), "garbage").unwrap();

        assert!(matches!(
            store.undo(),
            Err(StoreError::CorruptBackup { .. })
        ));
        assert_eq!(store.load().unwrap()[0].description, "keep");
    }
}
