//! End-to-end tests for a watch session on a real folder.

use letterhead::config::{Config, SharedConfig};
use letterhead::output::RecordingNotifier;
use letterhead::watch::{WatchCoordinator, WatchOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::common::{all_pages_have_letterhead, load, pdf_bytes, wait_until, write_letterhead};

const MERGE_TIMEOUT: Duration = Duration::from_secs(15);

fn session(inbox: &Path, letterhead: &Path) -> (WatchCoordinator, Arc<RecordingNotifier>) {
    let config = SharedConfig::new(Config {
        letterhead_path: letterhead.to_string_lossy().into_owned(),
        watch_folder: inbox.to_string_lossy().into_owned(),
    });
    let recorder = Arc::new(RecordingNotifier::new());
    let coordinator = WatchCoordinator::new(config, recorder.clone(), WatchOptions::default());
    (coordinator, recorder)
}

/// Write `bytes` to `path` in small chunks, as a slow copy would.
async fn copy_slowly(path: &Path, bytes: &[u8], chunks: usize, pause: Duration) {
    let mut file = std::fs::File::create(path).unwrap();
    for chunk in bytes.chunks(bytes.len().div_ceil(chunks)) {
        file.write_all(chunk).unwrap();
        file.flush().unwrap();
        tokio::time::sleep(pause).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_copy_is_merged_once() {
    let config_dir = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    let letterhead = write_letterhead(config_dir.path());
    let (coordinator, recorder) = session(inbox.path(), &letterhead);

    coordinator.start(inbox.path()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let invoice = inbox.path().join("a.pdf");
    copy_slowly(&invoice, &pdf_bytes(3, "Invoice"), 20, Duration::from_millis(100)).await;
    assert_eq!(
        recorder.count_titled("Merge Complete"),
        0,
        "merged before the copy settled"
    );

    let merged = wait_until(MERGE_TIMEOUT, || recorder.count_titled("Merge Complete") >= 1).await;
    assert!(merged, "no merge happened: {:?}", recorder.entries());

    // Give the rename event time to come back through the pipeline.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(recorder.count_titled("Merge Complete"), 1);
    assert_eq!(recorder.count_titled("Merge Failed"), 0);
    assert_eq!(coordinator.processed_count(), 1);

    let doc = load(&invoice);
    assert_eq!(doc.get_pages().len(), 3);
    assert!(all_pages_have_letterhead(&doc));
    assert!(!inbox.path().join("a.merged.pdf").exists());

    assert!(coordinator.stop());
    assert_eq!(
        recorder.log_lines().last().map(String::as_str),
        Some("[~] Folder watching stopped.")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_only_new_plain_pdfs_are_merged() {
    let config_dir = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    let letterhead = write_letterhead(config_dir.path());
    let (coordinator, recorder) = session(inbox.path(), &letterhead);

    coordinator.start(inbox.path()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let done = inbox.path().join("b.merged.pdf");
    let done_bytes = pdf_bytes(1, "Already merged");
    std::fs::write(&done, &done_bytes).unwrap();
    std::fs::write(inbox.path().join("notes.txt"), b"not a pdf").unwrap();
    std::fs::write(inbox.path().join("c.pdf"), pdf_bytes(2, "Invoice")).unwrap();

    let merged = wait_until(MERGE_TIMEOUT, || recorder.count_titled("Merge Complete") >= 1).await;
    assert!(merged, "no merge happened: {:?}", recorder.entries());
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(recorder.count_titled("Merge Complete"), 1);
    assert_eq!(std::fs::read(&done).unwrap(), done_bytes);
    assert!(all_pages_have_letterhead(&load(&inbox.path().join("c.pdf"))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stopped_session_ignores_new_files() {
    let config_dir = TempDir::new().unwrap();
    let inbox = TempDir::new().unwrap();
    let letterhead = write_letterhead(config_dir.path());
    let (coordinator, recorder) = session(inbox.path(), &letterhead);

    coordinator.start(inbox.path()).unwrap();
    assert!(coordinator.stop());

    let invoice = inbox.path().join("late.pdf");
    let bytes = pdf_bytes(1, "Invoice");
    std::fs::write(&invoice, &bytes).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(recorder.notification_titles().is_empty());
    assert_eq!(std::fs::read(&invoice).unwrap(), bytes);
}
