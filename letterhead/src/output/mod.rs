//! User-facing notifications for letterhead.
//!
//! The core never talks to a UI directly. Everything the user should see
//! (completion toasts, activity-log lines) goes through the [`Notifier`]
//! trait, which the presentation layer implements.
//!
//! # Examples
//!
//! ```
//! use letterhead::output::{Notifier, TracingNotifier};
//!
//! let notifier = TracingNotifier;
//! notifier.notify("Merge Complete", "Merged: invoice.pdf");
//! notifier.log("[✓] Merged: invoice.pdf");
//! ```

use std::sync::{Arc, Mutex};
use tracing::info;

use crate::utils::lock_or_recover;

/// Presentation capability consumed by the merge pipeline.
///
/// Both methods are fire-and-forget: they must not block for long and they
/// cannot fail back into the caller.
pub trait Notifier: Send + Sync {
    /// Show a transient notification (toast, tray balloon, ...).
    fn notify(&self, title: &str, message: &str);

    /// Append a line to the activity log.
    fn log(&self, message: &str);
}

/// Notifier that forwards everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, message: &str) {
        info!(target: "letterhead::notify", title, "{message}");
    }

    fn log(&self, message: &str) {
        info!(target: "letterhead::activity", "{message}");
    }
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, title: &str, message: &str) {
        (**self).notify(title, message);
    }

    fn log(&self, message: &str) {
        (**self).log(message);
    }
}

/// A message captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    /// A `notify(title, message)` call.
    Notification {
        /// Notification title.
        title: String,
        /// Notification body.
        message: String,
    },
    /// A `log(message)` call.
    Log(String),
}

/// Notifier that keeps every message in memory.
///
/// Useful for headless runs and for asserting on what a user would have
/// seen.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<Recorded>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in order.
    pub fn entries(&self) -> Vec<Recorded> {
        lock_or_recover(&self.entries).clone()
    }

    /// Titles of the notifications recorded so far.
    pub fn notification_titles(&self) -> Vec<String> {
        lock_or_recover(&self.entries)
            .iter()
            .filter_map(|entry| match entry {
                Recorded::Notification { title, .. } => Some(title.clone()),
                Recorded::Log(_) => None,
            })
            .collect()
    }

    /// Activity-log lines recorded so far.
    pub fn log_lines(&self) -> Vec<String> {
        lock_or_recover(&self.entries)
            .iter()
            .filter_map(|entry| match entry {
                Recorded::Log(line) => Some(line.clone()),
                Recorded::Notification { .. } => None,
            })
            .collect()
    }

    /// Number of notifications with the given title.
    pub fn count_titled(&self, title: &str) -> usize {
        self.notification_titles()
            .iter()
            .filter(|t| t.as_str() == title)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) {
        lock_or_recover(&self.entries).push(Recorded::Notification {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    fn log(&self, message: &str) {
        lock_or_recover(&self.entries).push(Recorded::Log(message.to_string()));
    }
}
