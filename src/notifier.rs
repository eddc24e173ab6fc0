/*!
    Delivery of user-facing alerts: desktop notifications with an
    optional sound, console lines, or a channel the dashboard reads.
    Delivery failures never reach the caller.
!*/
use std::io;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(any(target_os = "linux", target_os = "macos"))]
use std::{
    process::ExitStatus,
    thread::{self, JoinHandle},
};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

const APP_NAME: &str = "tidy";

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

/// Shows a desktop notification through the platform's notification
/// command and optionally plays a sound.
pub struct DesktopNotifier {
    sound: bool,
    console_fallback: bool,
    warned: AtomicBool,
}

impl DesktopNotifier {
    pub fn new(sound: bool) -> Self {
        DesktopNotifier {
            sound,
            console_fallback: true,
            warned: AtomicBool::new(false),
        }
    }

    /// Don't print undelivered notifications to stdout. Used while the
    /// dashboard owns the terminal.
    pub fn without_console_fallback(mut self) -> Self {
        self.console_fallback = false;
        self
    }

    /// Logs a delivery failure. Only the first one is a warning.
    /// Returns whether this call was that first warning.
    fn report(&self, what: &str, err: &io::Error) -> bool {
        if self.warned.swap(true, Ordering::Relaxed) {
            debug!(%err, "{what} failed");
            false
        } else {
            warn!(%err, "{what} failed, further failures are logged at debug level");
            true
        }
    }

    /// The console line standing in for a notification that couldn't
    /// be shown, if any.
    fn fallback_line(&self, shown: io::Result<()>, message: &str) -> Option<String> {
        let err = shown.err()?;
        self.report("desktop notification", &err);
        self.console_fallback.then(|| format!("❗ {message}"))
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) {
        if let Some(line) = self.fallback_line(show_notification(title, message), message) {
            println!("{line}");
        }
        if self.sound {
            if let Err(err) = play_sound(title, self.console_fallback) {
                self.report("sound", &err);
            }
        }
    }
}

fn run_quietly(command: &mut Command) -> io::Result<()> {
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "{} exited with {status}",
            command.get_program().to_string_lossy()
        )))
    }
}

#[cfg(target_os = "linux")]
fn show_notification(title: &str, message: &str) -> io::Result<()> {
    run_quietly(
        Command::new("notify-send")
            .arg("--app-name")
            .arg(APP_NAME)
            .arg("--expire-time=3000")
            .arg(title)
            .arg(message),
    )
}

#[cfg(target_os = "macos")]
fn show_notification(title: &str, message: &str) -> io::Result<()> {
    let script = format!(
        "display notification \"{}\" with title \"{}\" subtitle \"{}\"",
        applescript_escape(message),
        applescript_escape(title),
        APP_NAME
    );
    run_quietly(Command::new("osascript").arg("-e").arg(script))
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn show_notification(_title: &str, _message: &str) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("no desktop notifications for {APP_NAME} on this platform"),
    ))
}

#[cfg(any(target_os = "macos", test))]
fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Starts `command` in the background and waits for it on a helper
/// thread, so the caller isn't held up and the child is always reaped.
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn spawn_reaped(command: &mut Command) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(thread::spawn(move || child.wait()))
}

#[cfg(target_os = "linux")]
fn play_sound(title: &str, _bell: bool) -> io::Result<()> {
    spawn_reaped(Command::new("spd-say").arg(title)).map(drop)
}

#[cfg(target_os = "macos")]
fn play_sound(_title: &str, _bell: bool) -> io::Result<()> {
    spawn_reaped(Command::new("afplay").arg("/System/Library/Sounds/Ping.aiff")).map(drop)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn play_sound(_title: &str, bell: bool) -> io::Result<()> {
    use std::io::Write;

    if bell {
        let mut out = io::stdout();
        out.write_all(b"\x07")?;
        out.flush()?;
    }
    Ok(())
}

pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, title: &str, message: &str) {
        println!("❗ {title}: {message}");
    }
}

pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, title: &str, _message: &str) {
        debug!(title, "notifications disabled");
    }
}

/// Forwards alerts to whoever holds the receiving end of the channel.
pub struct ChannelNotifier {
    sender: UnboundedSender<Alert>,
}

impl ChannelNotifier {
    pub fn new(sender: UnboundedSender<Alert>) -> Self {
        ChannelNotifier { sender }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, title: &str, message: &str) {
        let alert = Alert {
            title: title.to_string(),
            message: message.to_string(),
        };
        if self.sender.send(alert).is_err() {
            debug!(title, "alert receiver is gone, dropping alert");
        }
    }
}

pub struct FanoutNotifier {
    targets: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(targets: Vec<Arc<dyn Notifier>>) -> Self {
        FanoutNotifier { targets }
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, title: &str, message: &str) {
        for target in &self.targets {
            target.notify(title, message);
        }
    }
}
