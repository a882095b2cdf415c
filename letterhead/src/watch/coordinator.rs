//! Watch session management.
//!
//! [`WatchCoordinator`] is either stopped or watching one folder. While
//! watching, notify delivers events into a channel that a dispatcher task
//! drains: every event is filtered and debounced in arrival order, and each
//! accepted file gets its own task that waits for the file to settle,
//! claims it and merges it in place.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::debounce::{DEBOUNCE_WINDOW, DedupDebouncer, ProcessedSet, Verdict};
use super::filter::candidate_paths;
use super::stability::{Readiness, StabilityGate, StabilityPolicy};
use crate::config::SharedConfig;
use crate::error::{LetterheadError, Result};
use crate::io::{DiskStorage, PdfWriter, RetryPolicy, Storage};
use crate::merge::{JobOutcome, MergeJob, MergePipeline, SkipReason};
use crate::output::Notifier;
use crate::utils::{display_name, lock_or_recover, path_key};

/// Tuning for a watch session.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Cooldown between accepted events for the same path.
    pub debounce_window: Duration,
    /// How long and how often to poll a new file's size.
    pub stability: StabilityPolicy,
    /// Write retries for locked targets.
    pub retry: RetryPolicy,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce_window: DEBOUNCE_WINDOW,
            stability: StabilityPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// State shared by the dispatcher and the per-file tasks of one session.
struct SessionContext<S: Storage> {
    debouncer: Mutex<DedupDebouncer>,
    processed: Arc<ProcessedSet>,
    gate: StabilityGate,
    pipeline: Arc<MergePipeline<S>>,
    config: SharedConfig,
    shutdown: watch::Receiver<bool>,
}

impl<S: Storage> SessionContext<S> {
    async fn admit(&self, path: &Path) -> bool {
        let key = path_key(path).await;
        let modified = tokio::fs::metadata(path)
            .await
            .and_then(|m| m.modified())
            .ok();
        let verdict = lock_or_recover(&self.debouncer).check(&key, modified, SystemTime::now());
        if verdict != Verdict::Accept {
            debug!(path = %path.display(), ?verdict, "Event dropped");
        }
        verdict.is_accept()
    }
}

/// A running subscription.
struct Session {
    folder: PathBuf,
    // Dropping the watcher ends the subscription.
    _watcher: RecommendedWatcher,
    shutdown: watch::Sender<bool>,
    processed: Arc<ProcessedSet>,
}

/// Starts and stops folder watching.
pub struct WatchCoordinator<S: Storage = DiskStorage> {
    config: SharedConfig,
    pipeline: Arc<MergePipeline<S>>,
    options: WatchOptions,
    session: Mutex<Option<Session>>,
}

impl WatchCoordinator<DiskStorage> {
    /// Create a coordinator writing merges to the local filesystem.
    pub fn new(config: SharedConfig, notifier: Arc<dyn Notifier>, options: WatchOptions) -> Self {
        let writer = PdfWriter::new().with_retry(options.retry);
        let pipeline = Arc::new(MergePipeline::with_writer(writer, notifier));
        Self::with_pipeline(config, pipeline, options)
    }
}

impl<S: Storage> WatchCoordinator<S> {
    /// Create a coordinator around an existing pipeline.
    pub fn with_pipeline(
        config: SharedConfig,
        pipeline: Arc<MergePipeline<S>>,
        options: WatchOptions,
    ) -> Self {
        Self {
            config,
            pipeline,
            options,
            session: Mutex::new(None),
        }
    }

    /// Pipeline used for merges, shared with manual and batch operations.
    pub fn pipeline(&self) -> Arc<MergePipeline<S>> {
        Arc::clone(&self.pipeline)
    }

    /// Check whether a session is running.
    pub fn is_watching(&self) -> bool {
        lock_or_recover(&self.session).is_some()
    }

    /// Folder being watched, if any.
    pub fn watched_folder(&self) -> Option<PathBuf> {
        lock_or_recover(&self.session)
            .as_ref()
            .map(|session| session.folder.clone())
    }

    /// Number of files merged in place during the current session.
    pub fn processed_count(&self) -> usize {
        lock_or_recover(&self.session)
            .as_ref()
            .map_or(0, |session| session.processed.len())
    }

    /// Start watching `folder`.
    ///
    /// Starting on the folder already being watched does nothing. Starting
    /// on another folder replaces the running session. Must be called from
    /// within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LetterheadError::Watch`] if the folder is not a directory,
    /// no runtime is available, or the subscription cannot be created.
    pub fn start(&self, folder: &Path) -> Result<()> {
        let mut slot = lock_or_recover(&self.session);
        if let Some(session) = slot.as_ref() {
            if session.folder == folder {
                debug!(folder = %folder.display(), "Already watching");
                return Ok(());
            }
            if let Some(previous) = slot.take() {
                self.end_session(previous);
            }
        }

        if !folder.is_dir() {
            return Err(LetterheadError::watch(
                folder.to_path_buf(),
                "not a directory",
            ));
        }
        let handle = Handle::try_current()
            .map_err(|e| LetterheadError::watch(folder.to_path_buf(), e.to_string()))?;

        // Files modified before this instant are never merged.
        let session_start = SystemTime::now();

        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |event| {
            if event_tx.send(event).is_err() {
                debug!("Watch event dropped because the session has ended");
            }
        })
        .map_err(|e| LetterheadError::watch(folder.to_path_buf(), e.to_string()))?;
        watcher
            .watch(folder, RecursiveMode::NonRecursive)
            .map_err(|e| LetterheadError::watch(folder.to_path_buf(), e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let processed = Arc::new(ProcessedSet::new());
        let context = Arc::new(SessionContext {
            debouncer: Mutex::new(
                DedupDebouncer::new(session_start).with_window(self.options.debounce_window),
            ),
            processed: Arc::clone(&processed),
            gate: StabilityGate::new(self.options.stability),
            pipeline: Arc::clone(&self.pipeline),
            config: self.config.clone(),
            shutdown: shutdown_rx,
        });
        handle.spawn(dispatch(event_rx, context));

        info!(folder = %folder.display(), "Started watching");
        self.pipeline
            .notifier()
            .log(&format!("[+] Started watching folder: {}", folder.display()));

        *slot = Some(Session {
            folder: folder.to_path_buf(),
            _watcher: watcher,
            shutdown: shutdown_tx,
            processed,
        });
        Ok(())
    }

    /// Stop watching. Returns `false` if no session was running.
    ///
    /// Pending stability waits are abandoned; merges that already started
    /// finish in the background.
    pub fn stop(&self) -> bool {
        let session = lock_or_recover(&self.session).take();
        match session {
            Some(session) => {
                self.end_session(session);
                true
            }
            None => false,
        }
    }

    /// Stop the current session, if any, and watch `folder` instead.
    pub fn restart(&self, folder: &Path) -> Result<()> {
        self.stop();
        self.start(folder)
    }

    fn end_session(&self, session: Session) {
        // Receivers see the flag even if they are mid-poll.
        let _ = session.shutdown.send(true);
        info!(folder = %session.folder.display(), "Stopped watching");
        self.pipeline.notifier().log("[~] Folder watching stopped.");
    }
}

impl<S: Storage> Drop for WatchCoordinator<S> {
    fn drop(&mut self) {
        let session = lock_or_recover(&self.session).take();
        if let Some(session) = session {
            let _ = session.shutdown.send(true);
        }
    }
}

async fn dispatch<S: Storage>(
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    context: Arc<SessionContext<S>>,
) {
    let mut shutdown = context.shutdown.clone();
    loop {
        tokio::select! {
            _ = async { let _ = shutdown.wait_for(|stopped| *stopped).await; } => break,
            received = events.recv() => match received {
                Some(Ok(event)) => {
                    for path in candidate_paths(event) {
                        if context.admit(&path).await {
                            tokio::spawn(handle_file(Arc::clone(&context), path));
                        }
                    }
                }
                Some(Err(e)) => warn!("Watch backend error: {e}"),
                None => break,
            },
        }
    }
    debug!("Dispatcher finished");
}

async fn handle_file<S: Storage>(context: Arc<SessionContext<S>>, path: PathBuf) {
    let mut shutdown = context.shutdown.clone();
    let readiness = tokio::select! {
        readiness = context.gate.wait_until_ready(&path) => readiness,
        _ = shutdown.wait_for(|stopped| *stopped) => {
            debug!(path = %path.display(), "Session ended before the file settled");
            return;
        }
    };

    match readiness {
        Readiness::Ready { size } => {
            debug!(path = %path.display(), size, "File ready");
        }
        Readiness::Vanished | Readiness::TimedOut => {
            if readiness == Readiness::TimedOut {
                let err = LetterheadError::StabilityTimeout {
                    path: path.clone(),
                    waited: context.gate.policy().timeout,
                };
                warn!("{err}");
            }
            context
                .pipeline
                .notifier()
                .log(&format!("[!] File never stabilized: {}", display_name(&path)));
            return;
        }
    }

    let Some(claim) = context.processed.try_claim(path_key(&path).await) else {
        debug!(
            path = %path.display(),
            reason = ?SkipReason::AlreadyProcessed,
            "Skipping file"
        );
        return;
    };

    let letterhead = context.config.letterhead().unwrap_or_default();
    let job = MergeJob::in_place(&path, letterhead);
    let result = context.pipeline.run(&job).await;
    if matches!(result, Ok(JobOutcome::Merged { .. })) {
        claim.commit();
    }
    context.pipeline.report(&job, &result);
}
