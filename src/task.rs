use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank, highest priority first. Tasks without a priority rank
    /// after `Low`.
    pub fn rank(priority: Option<Priority>) -> u8 {
        match priority {
            Some(Priority::High) => 0,
            Some(Priority::Medium) => 1,
            Some(Priority::Low) => 2,
            None => 3,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Priority::High => "!!!",
            Priority::Medium => "!!",
            Priority::Low => "!",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339 timestamps and ISO 8601 ones without an offset,
/// which are read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    raw.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

impl Task {
    pub fn new(description: &str) -> Self {
        Task {
            description: description.to_string(),
            completed: false,
            due_date: None,
            category: None,
            priority: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = due_date;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    pub fn with_priority(mut self, priority: Option<Priority>) -> Self {
        self.priority = priority;
        self
    }

    /// A date-only due time has passed once its day has started.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due <= today)
    }
}

/// The fields a caller supplies when adding a task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
}

impl Draft {
    pub fn new(description: &str) -> Self {
        Draft {
            description: description.to_string(),
            ..Default::default()
        }
    }

    pub fn into_task(self) -> Task {
        Task::new(&self.description)
            .with_due_date(self.due_date)
            .with_category(self.category)
            .with_priority(self.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_incomplete_with_timestamp() {
        let task = Task::new("Water plants");
        assert_eq!(task.description, "Water plants");
        assert!(!task.completed);
        assert!(task.created_at.is_some());
    }

    #[test]
    fn deserializes_minimal_record() {
        let task: Task = serde_json::from_str(r#"{"description": "Task 1"}"#).unwrap();
        assert_eq!(task.description, "Task 1");
        assert!(!task.completed);
        assert_eq!(task.priority, None);
        assert_eq!(task.created_at, None);
    }

    #[test]
    fn reads_timestamps_with_and_without_offset() {
        let with_offset: Task = serde_json::from_str(
            r#"{"description": "a", "created_at": "2025-03-12T10:00:00+02:00"}"#,
        )
        .unwrap();
        let naive: Task = serde_json::from_str(
            r#"{"description": "b", "created_at": "2025-03-12T10:00:00.123456"}"#,
        )
        .unwrap();
        let spaced: Task = serde_json::from_str(
            r#"{"description": "c", "created_at": "2025-03-12 10:00:00"}"#,
        )
        .unwrap();

        let at = |raw: &str| DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc);
        assert_eq!(with_offset.created_at, Some(at("2025-03-12T08:00:00Z")));
        assert_eq!(naive.created_at, Some(at("2025-03-12T10:00:00.123456Z")));
        assert_eq!(spaced.created_at, Some(at("2025-03-12T10:00:00Z")));

        let written = serde_json::to_string(&naive).unwrap();
        let reread: Task = serde_json::from_str(&written).unwrap();
        assert_eq!(reread, naive);
    }

    #[test]
    fn rejects_unreadable_timestamp() {
        let parsed = serde_json::from_str::<Task>(r#"{"description": "a", "created_at": "soon"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn serializes_absent_fields_as_null() {
        let mut task = Task::new("Pay rent").with_priority(Some(Priority::High));
        task.created_at = None;
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["priority"], "high");
        assert!(json["due_date"].is_null());
        assert!(json["category"].is_null());
        assert!(json["created_at"].is_null());
    }

    #[test]
    fn overdue_only_when_incomplete_and_due() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let due_today = Task::new("a").with_due_date(Some(today));
        let due_tomorrow = Task::new("b").with_due_date(today.succ_opt());
        let mut done = Task::new("c").with_due_date(today.pred_opt());
        done.completed = true;

        assert!(due_today.is_overdue(today));
        assert!(!due_tomorrow.is_overdue(today));
        assert!(!done.is_overdue(today));
        assert!(!Task::new("d").is_overdue(today));
    }

    #[test]
    fn priority_rank_orders_missing_last() {
        assert!(Priority::rank(Some(Priority::High)) < Priority::rank(Some(Priority::Medium)));
        assert!(Priority::rank(Some(Priority::Low)) < Priority::rank(None));
    }
}
