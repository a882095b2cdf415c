//! PDF writing with atomic replacement and lock-contention retries.
//!
//! Every write goes to a staging file first and is renamed over the final
//! path only once the staging file is complete and synced. The final path
//! therefore always holds either its previous content or the full new
//! content.
//!
//! - In place: staged as `<stem>.merged.pdf` next to the source, then
//!   renamed over the source.
//! - Explicit output: staged as `<output>.<pid>-<n>.partial`, unique per
//!   write, then renamed to the output. The source is never touched.
//!
//! # Examples
//!
//! ```no_run
//! use letterhead::io::writer::{PdfWriter, WriteTarget};
//! use lopdf::Document;
//! use std::path::PathBuf;
//!
//! # async fn example(doc: Document) -> letterhead::Result<()> {
//! let writer = PdfWriter::new();
//! let target = WriteTarget::InPlace { source: PathBuf::from("invoice.pdf") };
//! let stats = writer.commit(doc, target).await?;
//! println!("Wrote {} after {} attempt(s)", stats.format_file_size(), stats.attempts);
//! # Ok(())
//! # }
//! ```

use lopdf::Document;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{debug, warn};

use crate::error::{LetterheadError, Result};
use crate::utils::{format_file_size, merged_sibling};

/// Extension appended to explicit outputs while they are being written.
const PARTIAL_EXTENSION: &str = "partial";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Options for writing PDF files.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Compress uncompressed streams before writing.
    pub compress: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { compress: true }
    }
}

/// How often and how patiently a locked target is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub attempts: u32,

    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(1500),
        }
    }
}

/// Where a merged document should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    /// Replace the source file, keeping its name.
    InPlace {
        /// File being replaced.
        source: PathBuf,
    },
    /// Write to a separate file.
    Explicit {
        /// Destination path.
        output: PathBuf,
    },
}

impl WriteTarget {
    /// Path that holds the result once the write succeeds.
    pub fn final_path(&self) -> &Path {
        match self {
            Self::InPlace { source } => source,
            Self::Explicit { output } => output,
        }
    }

    /// Path the bytes are written to before the atomic rename.
    ///
    /// In place this is always the `.merged.pdf` sibling, which the
    /// processed-set claim keeps to one writer. Explicit outputs get a fresh
    /// name on every call, so concurrent writes never share a staging file.
    pub fn staging_path(&self) -> PathBuf {
        match self {
            Self::InPlace { source } => merged_sibling(source),
            Self::Explicit { output } => {
                let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
                let mut name = output.file_name().unwrap_or_default().to_os_string();
                name.push(format!(".{}-{seq}.{PARTIAL_EXTENSION}", std::process::id()));
                output.with_file_name(name)
            }
        }
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Path where the file was written.
    pub output_path: PathBuf,

    /// Size of the written file in bytes.
    pub file_size: u64,

    /// Attempts used, including the successful one.
    pub attempts: u32,

    /// Time taken from serialization to the final rename.
    pub write_time: Duration,
}

impl WriteStatistics {
    /// Format file size as human-readable string.
    pub fn format_file_size(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// Filesystem operations the writer needs.
///
/// [`DiskStorage`] is the real implementation; tests substitute one that
/// simulates a locked target.
pub trait Storage: Send + Sync + 'static {
    /// Create or truncate `path`, write `bytes` and sync them to disk.
    fn write_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Atomically move `from` over `to`.
    fn replace(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Delete `path`.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// [`Storage`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskStorage;

impl Storage for DiskStorage {
    fn write_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    fn replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Check whether an I/O error means another process holds the file.
///
/// Covers permission-denied everywhere plus the Windows sharing (32) and
/// lock (33) violations.
pub fn is_lock_contention(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}

/// PDF writer with atomic replacement and retry.
pub struct PdfWriter<S: Storage = DiskStorage> {
    storage: Arc<S>,
    options: WriteOptions,
    retry: RetryPolicy,
}

impl PdfWriter<DiskStorage> {
    /// Create a writer with default options on the local filesystem.
    pub fn new() -> Self {
        Self::with_storage(DiskStorage)
    }
}

impl Default for PdfWriter<DiskStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage> Clone for PdfWriter<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            options: self.options.clone(),
            retry: self.retry,
        }
    }
}

impl<S: Storage> PdfWriter<S> {
    /// Create a writer over a custom storage backend.
    pub fn with_storage(storage: S) -> Self {
        Self {
            storage: Arc::new(storage),
            options: WriteOptions::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the write options.
    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Serialize `doc` and atomically place it at `target`.
    ///
    /// # Errors
    ///
    /// Returns [`LetterheadError::MergeWrite`] when the target stays locked
    /// for every attempt or a non-retryable I/O error occurs. The staging
    /// file is removed in that case.
    pub async fn commit(&self, doc: Document, target: WriteTarget) -> Result<WriteStatistics> {
        let start = Instant::now();
        let compress = self.options.compress;

        let bytes = task::spawn_blocking(move || serialize(doc, compress))
            .await
            .map_err(|e| LetterheadError::other(format!("Serialize task failed: {e}")))??;
        let bytes = Arc::new(bytes);

        let staging = target.staging_path();
        let final_path = target.final_path().to_path_buf();
        let attempts = self.retry.attempts.max(1);

        let mut attempt = 1;
        loop {
            let storage = Arc::clone(&self.storage);
            let data = Arc::clone(&bytes);
            let (from, to) = (staging.clone(), final_path.clone());
            let outcome = task::spawn_blocking(move || {
                storage.write_synced(&from, &data)?;
                storage.replace(&from, &to)
            })
            .await
            .map_err(|e| LetterheadError::other(format!("Write task failed: {e}")))?;

            match outcome {
                Ok(()) => {
                    let stats = WriteStatistics {
                        output_path: final_path,
                        file_size: bytes.len() as u64,
                        attempts: attempt,
                        write_time: start.elapsed(),
                    };
                    debug!(
                        path = %stats.output_path.display(),
                        attempts = attempt,
                        "Wrote {}",
                        stats.format_file_size()
                    );
                    return Ok(stats);
                }
                Err(e) if is_lock_contention(&e) && attempt < attempts => {
                    warn!(
                        path = %final_path.display(),
                        attempt,
                        "Target is locked, retrying in {:.1}s: {e}",
                        self.retry.delay.as_secs_f64()
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.discard_staging(&staging).await;
                    return Err(LetterheadError::MergeWrite {
                        path: final_path,
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    async fn discard_staging(&self, staging: &Path) {
        let storage = Arc::clone(&self.storage);
        let path = staging.to_path_buf();
        let result = task::spawn_blocking(move || storage.remove(&path)).await;
        match result {
            Ok(Ok(())) => debug!(path = %staging.display(), "Removed staging file"),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {}
            Ok(Err(e)) => debug!(path = %staging.display(), "Could not remove staging file: {e}"),
            Err(e) => debug!("Cleanup task failed: {e}"),
        }
    }
}

fn serialize(mut doc: Document, compress: bool) -> Result<Vec<u8>> {
    if compress {
        doc.compress();
    }
    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| LetterheadError::merge_failed(format!("Failed to serialize PDF: {e}")))?;
    Ok(buf)
}
