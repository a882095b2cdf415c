//! Interactive console front end.
//!
//! Prints the activity log to stdout and reads commands from stdin. Merge
//! commands are spawned so that the prompt stays responsive while they run.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use letterhead::config::{ConfigStore, SharedConfig};
use letterhead::error::LetterheadError;
use letterhead::io::PdfReader;
use letterhead::merge::JobOutcome;
use letterhead::ops::{batch_merge, manual_merge};
use letterhead::output::Notifier;
use letterhead::update::{self, AvailableUpdate};
use letterhead::utils::display_name;
use letterhead::watch::WatchCoordinator;

use crate::commands::{Command, HELP};

const LETTERHEAD_HINT: &str = "Choose a letterhead first with 'letterhead <path>'.";

/// Level of a console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Plain information.
    Info,
    /// Something finished successfully.
    Success,
    /// Something needs attention.
    Warning,
    /// Something failed.
    Error,
    /// A notification title.
    Notice,
}

impl MessageLevel {
    /// Level for an activity-log line, from its `[x]` marker.
    pub fn for_activity(line: &str) -> Self {
        if line.starts_with("[✓]") {
            Self::Success
        } else if line.starts_with("[✗]") {
            Self::Error
        } else if line.starts_with("[!]") {
            Self::Warning
        } else {
            Self::Info
        }
    }

    fn color_code(self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Success => "\x1b[32m", // Green
            Self::Warning => "\x1b[33m", // Yellow
            Self::Error => "\x1b[31m",   // Red
            Self::Notice => "\x1b[36m",  // Cyan
        }
    }
}

/// Notifier printing to the terminal.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    colored: bool,
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleNotifier {
    /// Create a notifier, using color when stdout is a terminal.
    pub fn new() -> Self {
        Self {
            colored: io::stdout().is_terminal() && std::env::var("TERM").is_ok(),
        }
    }

    /// Create a notifier that never emits escape codes.
    pub fn plain() -> Self {
        Self { colored: false }
    }

    /// Render a line the way it will be printed.
    pub fn render(&self, level: MessageLevel, message: &str) -> String {
        let color_code = level.color_code();
        if self.colored && !color_code.is_empty() {
            format!("{color_code}{message}\x1b[0m")
        } else {
            message.to_string()
        }
    }

    /// Print an informational line.
    pub fn info(&self, message: &str) {
        self.print(MessageLevel::Info, message);
    }

    /// Print a success line.
    pub fn success(&self, message: &str) {
        self.print(MessageLevel::Success, &format!("✓ {message}"));
    }

    /// Print an error line.
    pub fn error(&self, message: &str) {
        self.print(MessageLevel::Error, &format!("✗ {message}"));
    }

    fn print(&self, level: MessageLevel, message: &str) {
        println!("{}", self.render(level, message));
    }

    fn prompt(&self) {
        print!("> ");
        io::stdout().flush().ok();
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, title: &str, message: &str) {
        self.print(MessageLevel::Notice, &format!("» {title}: {message}"));
    }

    fn log(&self, message: &str) {
        self.print(MessageLevel::for_activity(message), message);
    }
}

/// Download `available` into the downloads folder, printing progress in
/// quarter steps.
fn download_installer(
    available: &AvailableUpdate,
    out: ConsoleNotifier,
) -> letterhead::Result<PathBuf> {
    let mut reported = 0;
    update::download_update(available, &update::download_dir(), |done, total| {
        if let Some(step) = progress_step(done, total)
            && step > reported
        {
            reported = step;
            out.info(&format!("  {step}%"));
        }
    })
}

/// Largest multiple of 25 percent reached, if the total is known.
fn progress_step(done: u64, total: Option<u64>) -> Option<u64> {
    let total = total.filter(|total| *total > 0)?;
    let percent = done.saturating_mul(100) / total;
    Some(percent.min(100) / 25 * 25)
}

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// Leave the console.
    Quit,
}

/// The interactive session.
pub struct Console {
    store: ConfigStore,
    config: SharedConfig,
    coordinator: Arc<WatchCoordinator>,
    out: ConsoleNotifier,
}

impl Console {
    /// Create a console over the running coordinator.
    pub fn new(
        store: ConfigStore,
        config: SharedConfig,
        coordinator: Arc<WatchCoordinator>,
        out: ConsoleNotifier,
    ) -> Self {
        Self {
            store,
            config,
            coordinator,
            out,
        }
    }

    /// Read commands until `quit`, end of input or Ctrl-C.
    pub async fn run(&self) -> io::Result<()> {
        self.out.info(&format!(
            "{} v{} - type 'help' for commands",
            letterhead::NAME,
            letterhead::VERSION
        ));
        self.show_status();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            self.out.prompt();
            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                break;
            };

            match Command::parse(&line) {
                Ok(Some(command)) => {
                    if self.execute(command).await == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(message) => self.out.error(&message),
            }
        }

        self.coordinator.stop();
        Ok(())
    }

    /// Apply one command.
    pub async fn execute(&self, command: Command) -> Flow {
        match command {
            Command::Letterhead(path) => self.set_letterhead(path).await,
            Command::Folder(path) => self.set_folder(path),
            Command::Watch => self.start_watching(),
            Command::Stop => {
                if !self.coordinator.stop() {
                    self.out.info("Not watching.");
                }
            }
            Command::Merge { source, output } => self.spawn_merge(source, output),
            Command::Batch { out_dir, files } => self.spawn_batch(out_dir, files),
            Command::Status => self.show_status(),
            Command::Update => self.spawn_update(),
            Command::Help => self.out.info(HELP),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    async fn set_letterhead(&self, path: PathBuf) {
        let candidate = path.clone();
        let checked =
            tokio::task::spawn_blocking(move || PdfReader::new().load_letterhead(&candidate)).await;
        match checked {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                self.out.error(&e.to_string());
                return;
            }
            Err(e) => {
                self.out.error(&format!("Could not check letterhead: {e}"));
                return;
            }
        }

        let value = path.to_string_lossy().into_owned();
        let config = self.config.update(|config| config.letterhead_path = value);
        self.persist(&config);
        self.out
            .success(&format!("Letterhead set: {}", display_name(&path)));
    }

    fn set_folder(&self, path: PathBuf) {
        if !path.is_dir() {
            self.out.error(&format!("Not a folder: {}", path.display()));
            return;
        }

        let value = path.to_string_lossy().into_owned();
        let config = self.config.update(|config| config.watch_folder = value);
        self.persist(&config);
        self.out
            .success(&format!("Watch folder set: {}", path.display()));

        if self.coordinator.is_watching()
            && let Err(e) = self.coordinator.restart(&path)
        {
            self.out.error(&e.to_string());
        }
    }

    fn start_watching(&self) {
        let config = self.config.snapshot();
        if config.letterhead().is_none() {
            self.out.error(LETTERHEAD_HINT);
            return;
        }
        let Some(folder) = config.folder() else {
            self.out.error("Choose a folder first with 'folder <path>'.");
            return;
        };
        if let Err(e) = self.coordinator.start(&folder) {
            self.out.error(&e.to_string());
        }
    }

    fn spawn_merge(&self, source: PathBuf, output: PathBuf) {
        let pipeline = self.coordinator.pipeline();
        let letterhead = self.config.letterhead();
        let out = self.out;
        tokio::spawn(async move {
            let result = manual_merge(&*pipeline, letterhead.as_deref(), &source, &output).await;
            match result {
                Ok(JobOutcome::Skipped(reason)) => {
                    out.info(&format!("Skipped {}: {reason:?}", display_name(&source)));
                }
                Ok(JobOutcome::Merged { .. }) => {}
                Err(LetterheadError::LetterheadNotConfigured) => out.error(LETTERHEAD_HINT),
                // Job failures were already reported through the notifier.
                Err(_) => {}
            }
        });
    }

    fn spawn_batch(&self, out_dir: PathBuf, files: Vec<PathBuf>) {
        let pipeline = self.coordinator.pipeline();
        let letterhead = self.config.letterhead();
        let out = self.out;
        tokio::spawn(async move {
            match batch_merge(&*pipeline, letterhead.as_deref(), &files, &out_dir).await {
                Ok(report) => {
                    let summary = format!(
                        "Batch finished: {} merged, {} failed, {} skipped",
                        report.merged(),
                        report.failed(),
                        report.skipped()
                    );
                    if report.is_success() {
                        out.success(&summary);
                    } else {
                        out.error(&summary);
                    }
                }
                Err(LetterheadError::LetterheadNotConfigured) => out.error(LETTERHEAD_HINT),
                Err(e) => out.error(&e.to_string()),
            }
        });
    }

    fn spawn_update(&self) {
        let Some(repo) = update::release_repo() else {
            self.out.info("This build has no release feed configured.");
            return;
        };
        let out = self.out;
        tokio::spawn(async move {
            out.info("Checking for updates...");
            let checked = tokio::task::spawn_blocking(move || {
                update::check_for_update(repo, letterhead::VERSION)
            })
            .await;
            let available = match checked {
                Ok(Ok(Some(available))) => available,
                Ok(Ok(None)) => {
                    out.success(&format!("letterhead {} is up to date", letterhead::VERSION));
                    return;
                }
                Ok(Err(e)) => {
                    out.error(&e.to_string());
                    return;
                }
                Err(e) => {
                    out.error(&format!("Update check stopped: {e}"));
                    return;
                }
            };

            out.info(&format!("Downloading letterhead {}...", available.version));
            let downloaded =
                tokio::task::spawn_blocking(move || download_installer(&available, out)).await;
            match downloaded {
                Ok(Ok(path)) => out.success(&format!("Installer saved to {}", path.display())),
                Ok(Err(e)) => out.error(&e.to_string()),
                Err(e) => out.error(&format!("Download stopped: {e}")),
            }
        });
    }

    fn show_status(&self) {
        let config = self.config.snapshot();
        let letterhead = config
            .letterhead()
            .map_or_else(|| "(not set)".to_string(), |p| p.display().to_string());
        let folder = config
            .folder()
            .map_or_else(|| "(not set)".to_string(), |p| p.display().to_string());

        self.out.info(&format!("  Letterhead: {letterhead}"));
        self.out.info(&format!("  Folder:     {folder}"));
        match self.coordinator.watched_folder() {
            Some(watched) => self.out.info(&format!(
                "  Watching:   {} ({} merged this session)",
                watched.display(),
                self.coordinator.processed_count()
            )),
            None => self.out.info("  Watching:   no"),
        }
        self.out
            .info(&format!("  Settings:   {}", self.store.path().display()));
    }

    fn persist(&self, config: &letterhead::Config) {
        if let Err(e) = self.store.save(config) {
            self.out.error(&e.to_string());
        } else {
            debug!(path = %self.store.path().display(), "Configuration saved");
        }
    }
}
