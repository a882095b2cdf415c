//! Integration tests for retrying writes to a locked target.

use letterhead::error::LetterheadError;
use letterhead::io::{DiskStorage, PdfWriter, RetryPolicy, Storage, WriteTarget};
use letterhead::merge::{MergeJob, MergePipeline};
use letterhead::output::RecordingNotifier;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{
    all_pages_have_letterhead, build_pdf, load, partial_files, write_letterhead, write_pdf,
};

#[derive(Debug, Default)]
struct Counters {
    failures_left: AtomicU32,
    renames: AtomicU32,
    rename_attempts: AtomicU32,
}

/// Disk storage whose first renames fail as if another program held the
/// target open.
#[derive(Debug, Clone)]
struct FlakyStorage {
    counters: Arc<Counters>,
    kind: io::ErrorKind,
}

impl FlakyStorage {
    fn new(failures: u32) -> Self {
        Self::with_kind(failures, io::ErrorKind::PermissionDenied)
    }

    fn with_kind(failures: u32, kind: io::ErrorKind) -> Self {
        let counters = Counters::default();
        counters.failures_left.store(failures, Ordering::SeqCst);
        Self {
            counters: Arc::new(counters),
            kind,
        }
    }
}

impl Storage for FlakyStorage {
    fn write_synced(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        DiskStorage.write_synced(path, bytes)
    }

    fn replace(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.counters.rename_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .counters
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(io::Error::new(self.kind, "file is open in another program"));
        }
        self.counters.renames.fetch_add(1, Ordering::SeqCst);
        DiskStorage.replace(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        DiskStorage.remove(path)
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        delay: Duration::from_millis(20),
    }
}

fn expected_bytes(doc: &lopdf::Document) -> Vec<u8> {
    let mut doc = doc.clone();
    doc.compress();
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

#[tokio::test]
async fn test_lock_cleared_before_last_attempt() {
    for failures in [0, 1, 2] {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.pdf");
        let doc = build_pdf(2, "Invoice");

        let storage = FlakyStorage::new(failures);
        let counters = Arc::clone(&storage.counters);
        let writer = PdfWriter::with_storage(storage).with_retry(fast_retry());

        let stats = writer
            .commit(
                doc.clone(),
                WriteTarget::Explicit {
                    output: output.clone(),
                },
            )
            .await
            .unwrap();

        assert_eq!(stats.attempts, failures + 1);
        assert_eq!(counters.renames.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&output).unwrap(), expected_bytes(&doc));
        assert!(partial_files(temp_dir.path()).is_empty());
    }
}

#[tokio::test]
async fn test_lock_never_cleared() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("invoice.pdf");
    write_pdf(&source, 1, "Invoice");
    let before = std::fs::read(&source).unwrap();

    let storage = FlakyStorage::new(u32::MAX);
    let counters = Arc::clone(&storage.counters);
    let writer = PdfWriter::with_storage(storage).with_retry(fast_retry());

    let err = writer
        .commit(build_pdf(1, "Merged"), WriteTarget::InPlace { source: source.clone() })
        .await
        .unwrap_err();

    match err {
        LetterheadError::MergeWrite { path, attempts, .. } => {
            assert_eq!(path, source);
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected MergeWrite, got {other:?}"),
    }
    assert_eq!(counters.rename_attempts.load(Ordering::SeqCst), 3);
    assert_eq!(counters.renames.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read(&source).unwrap(), before);
    assert!(!temp_dir.path().join("invoice.merged.pdf").exists());
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let temp_dir = TempDir::new().unwrap();
    let storage = FlakyStorage::with_kind(1, io::ErrorKind::Other);
    let counters = Arc::clone(&storage.counters);
    let writer = PdfWriter::with_storage(storage).with_retry(fast_retry());

    let err = writer
        .commit(
            build_pdf(1, "Invoice"),
            WriteTarget::Explicit {
                output: temp_dir.path().join("out.pdf"),
            },
        )
        .await
        .unwrap_err();

    assert!(err.is_write_failure());
    assert_eq!(counters.rename_attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_in_place_merge_waits_for_lock() {
    let temp_dir = TempDir::new().unwrap();
    let letterhead = write_letterhead(temp_dir.path());
    let invoice = temp_dir.path().join("invoice.pdf");
    write_pdf(&invoice, 3, "Invoice");

    let storage = FlakyStorage::new(2);
    let counters = Arc::clone(&storage.counters);
    let writer = PdfWriter::with_storage(storage).with_retry(fast_retry());
    let recorder = Arc::new(RecordingNotifier::new());
    let pipeline = MergePipeline::with_writer(writer, recorder.clone());

    let outcome = pipeline
        .execute(&MergeJob::in_place(&invoice, &letterhead))
        .await
        .unwrap();

    assert!(outcome.is_merged());
    assert_eq!(counters.renames.load(Ordering::SeqCst), 1);
    let merged = load(&invoice);
    assert_eq!(merged.get_pages().len(), 3);
    assert!(all_pages_have_letterhead(&merged));
    assert_eq!(recorder.count_titled("Merge Complete"), 1);
}
