/*!
    Background check for overdue tasks.

    The poller shares nothing with the rest of the program but the
    tasks file: every tick it reloads the list and raises one alert per
    incomplete task whose due date has arrived.
!*/
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::notifier::Notifier;
use crate::store::{Store, StoreError};
use crate::task::Task;

/// Incomplete tasks due on or before `today`, with their display index.
pub fn due_tasks(tasks: &[Task], today: NaiveDate) -> impl Iterator<Item = (usize, &Task)> {
    tasks
        .iter()
        .enumerate()
        .filter(move |(_, task)| task.is_overdue(today))
        .map(|(slot, task)| (slot + 1, task))
}

/// Reloads the tasks and alerts for each overdue one. Returns how many
/// alerts were raised.
pub fn check_due(
    store: &Store,
    notifier: &dyn Notifier,
    today: NaiveDate,
) -> Result<usize, StoreError> {
    let tasks = store.load()?;
    let mut raised = 0;
    for (index, task) in due_tasks(&tasks, today) {
        if let Some(due) = task.due_date {
            debug!(index, %due, description = %task.description, "task is due");
            notifier.notify("Task Due", &format!("{} was due {due}", task.description));
            raised += 1;
        }
    }
    Ok(raised)
}

/// Spawns the poller. The first check runs immediately, then once per
/// `interval` until `cancel` fires.
#[must_use]
pub fn spawn_alert_poller(
    store: Store,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "alert poller started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("alert poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let store = store.clone();
                    let notifier = Arc::clone(&notifier);
                    let today = Local::now().date_naive();
                    let checked = tokio::task::spawn_blocking(move || {
                        check_due(&store, notifier.as_ref(), today)
                    })
                    .await;
                    match checked {
                        Ok(Ok(raised)) => debug!(raised, "checked due tasks"),
                        Ok(Err(err)) => error!(%err, "can't load tasks for due check"),
                        Err(err) => error!(%err, "due check failed to run"),
                    }
                }
            }
        }
    })
}
