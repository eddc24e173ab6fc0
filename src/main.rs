use std::fs::{self, File};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{CommandFactory, Parser, Subcommand};
use color_eyre::eyre::{Report, Result, WrapErr};
use notifier::{
    ChannelNotifier, ConsoleNotifier, DesktopNotifier, FanoutNotifier, Notifier, SilentNotifier,
};
use poller::spawn_alert_poller;
use render::{Palette, render_rows};
use settings::Configuration;
use store::Store;
use task::{Draft, Priority};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracker::{Outcome, Tracker};
use view::{TaskFilter, by_priority, list};

mod dashboard;
mod notifier;
mod poller;
mod quick_add;
mod render;
mod settings;
mod store;
mod task;
mod tracker;
mod view;

const LOG_FILE: &str = "tidy.log";
const INVALID_INDEX: &str = "Invalid task number";

#[derive(Parser)]
#[command(version, about = "A small personal task tracker", long_about = None)]
struct Cmd {
    /// Configuration file [default: <config dir>/tidy/tidy.toml]
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Directory holding the tasks file, overrides the configuration
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        #[arg(required = true, value_name = "DESCRIPTION")]
        description: Vec<String>,
        #[arg(short, long, value_name = "YYYY-MM-DD")]
        due: Option<NaiveDate>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long, value_enum)]
        priority: Option<Priority>,
    },
    /// List tasks
    List {
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long)]
        hide_completed: bool,
        #[arg(short, long, value_enum)]
        priority: Option<Priority>,
        /// Show high priority tasks first
        #[arg(short, long)]
        sort_priority: bool,
    },
    /// Mark a task as completed
    Complete { index: usize },
    /// Delete a task
    Delete { index: usize },
    /// Restore the tasks as they were before the last change
    Undo,
    /// Open the terminal dashboard
    Dashboard,
    /// Alert on overdue tasks until interrupted
    Watch {
        #[arg(short, long, value_name = "SECONDS")]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cmds = Cmd::parse();
    let Some(command) = cmds.commands else {
        Cmd::command().print_help()?;
        return Ok(());
    };

    let cfg = Configuration::new(cmds.config.as_deref()).wrap_err("Can't load configuration")?;
    let data_dir = match cmds.data_dir {
        Some(dir) => dir,
        None => cfg.data_dir()?,
    };
    let log_file = matches!(command, Commands::Dashboard).then(|| data_dir.join(LOG_FILE));
    init_tracing(&cfg.tidy.log_level, log_file.as_deref())?;
    let store = Store::in_dir(&data_dir);
    info!(
        tasks = %store.tasks_path().display(),
        backup = %store.backup_path().display(),
        "tidy starting"
    );
    let palette = Palette::new(io::stdout().is_terminal());

    match command {
        Commands::Add {
            description,
            due,
            category,
            priority,
        } => {
            let description = description.join(" ");
            if description.trim().is_empty() {
                println!("{}", palette.failure("Task description can't be empty"));
                return Ok(());
            }
            let draft = Draft {
                due_date: due,
                category,
                priority,
                ..Draft::new(description.trim())
            };
            let tracker = Tracker::new(store, desktop_notifier(&cfg));
            let task = tracker.add(draft)?;
            println!("{}", palette.success(&format!("Added: {}", task.description)));
        }
        Commands::List {
            category,
            hide_completed,
            priority,
            sort_priority,
        } => {
            let tasks = store.load()?;
            let filter = TaskFilter {
                category,
                hide_completed,
                priority,
            };
            let rows = list(&tasks, &filter);
            let rows = if sort_priority {
                by_priority(rows)
            } else {
                rows.collect()
            };
            for line in render_rows(rows, Local::now().date_naive(), &palette) {
                println!("{line}");
            }
        }
        Commands::Complete { index } => {
            let tracker = Tracker::new(store, desktop_notifier(&cfg));
            match tracker.complete(index)? {
                Outcome::Done(task) => {
                    println!("{}", palette.success(&format!("Completed: {}", task.description)));
                }
                Outcome::InvalidIndex => println!("{}", palette.failure(INVALID_INDEX)),
            }
        }
        Commands::Delete { index } => {
            let tracker = Tracker::new(store, desktop_notifier(&cfg));
            match tracker.delete(index)? {
                Outcome::Done(task) => {
                    println!("{}", palette.success(&format!("Deleted: {}", task.description)));
                }
                Outcome::InvalidIndex => println!("{}", palette.failure(INVALID_INDEX)),
            }
        }
        Commands::Undo => {
            let tracker = Tracker::new(store, desktop_notifier(&cfg));
            if tracker.undo()? {
                println!("{}", palette.success("Restored previous state"));
            } else {
                println!("{}", palette.failure("No backup found"));
            }
        }
        Commands::Dashboard => dashboard_command(store, &cfg).await?,
        Commands::Watch { interval } => {
            let interval = interval
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| cfg.poll_interval());
            watch(store, &cfg, interval).await?;
        }
    }
    Ok(())
}

fn desktop_notifier(cfg: &Configuration) -> Arc<dyn Notifier> {
    if cfg.tidy.notifications {
        Arc::new(DesktopNotifier::new(cfg.tidy.sound))
    } else {
        Arc::new(SilentNotifier)
    }
}

async fn watch(store: Store, cfg: &Configuration, interval: Duration) -> Result<()> {
    let notifier: Arc<dyn Notifier> = if cfg.tidy.notifications {
        Arc::new(DesktopNotifier::new(cfg.tidy.sound))
    } else {
        Arc::new(ConsoleNotifier)
    };
    let cancel = CancellationToken::new();
    let poller = spawn_alert_poller(store, notifier, interval, cancel.clone());

    println!(
        "Watching for due tasks every {}s, press Ctrl-C to stop.",
        interval.as_secs()
    );
    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    poller.await?;
    Ok(())
}

async fn dashboard_command(store: Store, cfg: &Configuration) -> Result<()> {
    let (alert_tx, alert_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut targets: Vec<Arc<dyn Notifier>> = vec![Arc::new(ChannelNotifier::new(alert_tx))];
    if cfg.tidy.notifications {
        targets.push(Arc::new(
            DesktopNotifier::new(cfg.tidy.sound).without_console_fallback(),
        ));
    }
    let notifier: Arc<dyn Notifier> = Arc::new(FanoutNotifier::new(targets));

    let cancel = CancellationToken::new();
    let poller = spawn_alert_poller(
        store.clone(),
        Arc::clone(&notifier),
        cfg.poll_interval(),
        cancel.clone(),
    );

    let tracker = Tracker::new(store, notifier);
    let result = tokio::task::block_in_place(|| dashboard::run(tracker, alert_rx));

    cancel.cancel();
    poller.await?;
    debug!("dashboard closed");
    result
}

fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("Can't open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(Report::msg)
        }
        None => builder.with_writer(io::stderr).try_init().map_err(Report::msg),
    }
}
