//! Duplicate suppression for folder events.
//!
//! Two layers keep a file from being merged twice:
//! - [`DedupDebouncer`] drops bursts of events for the same path and files
//!   that were already in the folder before watching started.
//! - [`ProcessedSet`] remembers every file merged in place during the
//!   session and refuses to start a second merge while one is running.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::utils::lock_or_recover;

/// Minimum time between two accepted events for the same path.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(10);

/// Decision for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Process the file.
    Accept,
    /// File metadata was unavailable.
    Missing,
    /// The file was last modified before the session started.
    PreExisting,
    /// Another event for this path was accepted within the window.
    Debounced,
}

impl Verdict {
    /// Check whether the event should be processed.
    pub fn is_accept(self) -> bool {
        self == Self::Accept
    }
}

/// Per-path cooldown table.
#[derive(Debug, Clone)]
pub struct DedupDebouncer {
    session_start: SystemTime,
    window: Duration,
    last_processed: HashMap<PathBuf, SystemTime>,
}

impl DedupDebouncer {
    /// Create a debouncer for a session that started at `session_start`.
    pub fn new(session_start: SystemTime) -> Self {
        Self {
            session_start,
            window: DEBOUNCE_WINDOW,
            last_processed: HashMap::new(),
        }
    }

    /// Use a different cooldown window.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// When the session started.
    pub fn session_start(&self) -> SystemTime {
        self.session_start
    }

    /// Classify an event for `key` and record it when accepted.
    ///
    /// `modified` is the file's last-modified time, `None` when the file
    /// could not be stat'ed.
    pub fn check(&mut self, key: &Path, modified: Option<SystemTime>, now: SystemTime) -> Verdict {
        let Some(modified) = modified else {
            return Verdict::Missing;
        };
        if modified < self.session_start {
            return Verdict::PreExisting;
        }
        if let Some(last) = self.last_processed.get(key) {
            // A clock that went backwards counts as inside the window.
            let within = now
                .duration_since(*last)
                .map_or(true, |elapsed| elapsed < self.window);
            if within {
                return Verdict::Debounced;
            }
        }
        self.last_processed.insert(key.to_path_buf(), now);
        Verdict::Accept
    }

    /// Boolean form of [`check`](Self::check).
    pub fn should_process(
        &mut self,
        key: &Path,
        modified: Option<SystemTime>,
        now: SystemTime,
    ) -> bool {
        self.check(key, modified, now).is_accept()
    }

    /// Number of paths with a recorded attempt.
    pub fn len(&self) -> usize {
        self.last_processed.len()
    }

    /// Check whether no attempt has been recorded.
    pub fn is_empty(&self) -> bool {
        self.last_processed.is_empty()
    }
}

#[derive(Debug, Default)]
struct ClaimState {
    processed: HashSet<PathBuf>,
    in_flight: HashSet<PathBuf>,
}

/// Session-wide record of in-place merges.
#[derive(Debug, Default)]
pub struct ProcessedSet {
    state: Mutex<ClaimState>,
}

impl ProcessedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `key` for an in-place merge.
    ///
    /// Returns `None` if the path was already merged in this session or a
    /// merge for it is running.
    pub fn try_claim(self: &Arc<Self>, key: PathBuf) -> Option<InPlaceClaim> {
        let mut state = lock_or_recover(&self.state);
        if state.processed.contains(&key) || state.in_flight.contains(&key) {
            return None;
        }
        state.in_flight.insert(key.clone());
        Some(InPlaceClaim {
            set: Arc::clone(self),
            key,
            committed: false,
        })
    }

    /// Check whether `key` was merged in place during this session.
    pub fn contains(&self, key: &Path) -> bool {
        lock_or_recover(&self.state).processed.contains(key)
    }

    /// Check whether a merge for `key` is currently running.
    pub fn is_in_flight(&self, key: &Path) -> bool {
        lock_or_recover(&self.state).in_flight.contains(key)
    }

    /// Number of files merged in place.
    pub fn len(&self) -> usize {
        lock_or_recover(&self.state).processed.len()
    }

    /// Check whether nothing has been merged yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive right to merge one path in place.
///
/// Dropping the claim without [`commit`](Self::commit) releases the path so
/// that a later event can try again.
#[derive(Debug)]
pub struct InPlaceClaim {
    set: Arc<ProcessedSet>,
    key: PathBuf,
    committed: bool,
}

impl InPlaceClaim {
    /// Claimed path.
    pub fn path(&self) -> &Path {
        &self.key
    }

    /// Record the path as merged.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for InPlaceClaim {
    fn drop(&mut self) {
        let mut state = lock_or_recover(&self.set.state);
        state.in_flight.remove(&self.key);
        if self.committed {
            state.processed.insert(self.key.clone());
        }
    }
}
