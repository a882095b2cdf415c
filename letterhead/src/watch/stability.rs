//! File stability detection.
//!
//! A file dropped into the watched folder may still be downloading or
//! copying when the first event arrives. The gate polls its size and only
//! lets it through once two consecutive observations agree and are
//! non-zero.

use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

/// Polling parameters for [`StabilityGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityPolicy {
    /// Total time to wait before giving up.
    pub timeout: Duration,
    /// Pause between size observations.
    pub interval: Duration,
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            interval: Duration::from_millis(500),
        }
    }
}

impl StabilityPolicy {
    /// Number of observations made before timing out.
    pub fn max_polls(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        let polls = self.timeout.as_millis() / interval;
        u32::try_from(polls).unwrap_or(u32::MAX).max(1)
    }
}

/// Source of file sizes.
pub trait SizeProbe: Send + Sync {
    /// Current size of `path`, or `None` if it does not exist.
    fn size(&self, path: &Path) -> impl Future<Output = io::Result<Option<u64>>> + Send;
}

/// [`SizeProbe`] reading file metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl SizeProbe for FsProbe {
    async fn size(&self, path: &Path) -> io::Result<Option<u64>> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Verdict of a stability wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The size settled at a non-zero value.
    Ready {
        /// Settled size in bytes.
        size: u64,
    },
    /// The file was seen and then disappeared.
    Vanished,
    /// The size never settled within the timeout.
    TimedOut,
}

impl Readiness {
    /// Check whether the file can be merged.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Waits for files to stop growing.
#[derive(Debug, Clone, Default)]
pub struct StabilityGate<P: SizeProbe = FsProbe> {
    probe: P,
    policy: StabilityPolicy,
}

impl StabilityGate<FsProbe> {
    /// Create a gate reading the real filesystem.
    pub fn new(policy: StabilityPolicy) -> Self {
        Self::with_probe(FsProbe, policy)
    }
}

impl<P: SizeProbe> StabilityGate<P> {
    /// Create a gate with a custom size source.
    pub fn with_probe(probe: P, policy: StabilityPolicy) -> Self {
        Self { probe, policy }
    }

    /// Polling parameters in use.
    pub fn policy(&self) -> StabilityPolicy {
        self.policy
    }

    /// Poll `path` until its size settles, it disappears, or time runs out.
    ///
    /// A file that does not exist yet is retried until the timeout. Dropping
    /// the returned future abandons the wait.
    pub async fn wait_until_ready(&self, path: &Path) -> Readiness {
        let mut last_size: Option<u64> = None;
        let mut seen = false;

        for poll in 0..self.policy.max_polls() {
            match self.probe.size(path).await {
                Ok(Some(size)) => {
                    trace!(path = %path.display(), poll, size, "Observed size");
                    if size > 0 && last_size == Some(size) {
                        debug!(path = %path.display(), size, "File is stable");
                        return Readiness::Ready { size };
                    }
                    last_size = Some(size);
                    seen = true;
                }
                Ok(None) if seen => {
                    debug!(path = %path.display(), "File vanished while waiting");
                    return Readiness::Vanished;
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(path = %path.display(), "Could not read size: {e}");
                }
            }
            tokio::time::sleep(self.policy.interval).await;
        }

        Readiness::TimedOut
    }
}
