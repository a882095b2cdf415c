//! Integration tests for applying a letterhead through the pipeline.

use letterhead::error::LetterheadError;
use letterhead::io::PdfReader;
use letterhead::merge::{JobOutcome, MergeJob, MergePipeline, OverlayMerger, SkipReason};
use letterhead::output::RecordingNotifier;
use rstest::rstest;
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{
    all_pages_have_letterhead, build_pdf, load, partial_files, write_letterhead, write_pdf,
};

fn pipeline() -> (MergePipeline, Arc<RecordingNotifier>) {
    let recorder = Arc::new(RecordingNotifier::new());
    (MergePipeline::new(recorder.clone()), recorder)
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(12)]
#[tokio::test]
async fn test_in_place_merge_keeps_pages_and_name(#[case] pages: usize) {
    let temp_dir = TempDir::new().unwrap();
    let letterhead = write_letterhead(temp_dir.path());
    let invoice = temp_dir.path().join("invoice.pdf");
    write_pdf(&invoice, pages, "Invoice");

    let (pipeline, recorder) = pipeline();
    let outcome = pipeline
        .execute(&MergeJob::in_place(&invoice, &letterhead))
        .await
        .unwrap();

    assert!(outcome.is_merged());
    let merged = load(&invoice);
    assert_eq!(merged.get_pages().len(), pages);
    assert!(all_pages_have_letterhead(&merged));

    assert!(!temp_dir.path().join("invoice.merged.pdf").exists());
    assert_eq!(recorder.count_titled("Merge Complete"), 1);
    assert_eq!(recorder.log_lines(), vec!["[✓] Merged: invoice.pdf"]);
}

#[tokio::test]
async fn test_explicit_output_leaves_source_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let letterhead = write_letterhead(temp_dir.path());
    let invoice = temp_dir.path().join("invoice.pdf");
    write_pdf(&invoice, 2, "Invoice");
    let before = std::fs::read(&invoice).unwrap();
    let output = temp_dir.path().join("branded.pdf");

    let (pipeline, recorder) = pipeline();
    let outcome = pipeline
        .execute(&MergeJob::to_output(&invoice, &letterhead, &output))
        .await
        .unwrap();

    match outcome {
        JobOutcome::Merged { output: path, pages, stats } => {
            assert_eq!(path, output);
            assert_eq!(pages, 2);
            assert_eq!(stats.attempts, 1);
        }
        other => panic!("Expected a merge, got {other:?}"),
    }
    assert_eq!(std::fs::read(&invoice).unwrap(), before);
    assert!(all_pages_have_letterhead(&load(&output)));
    assert!(partial_files(temp_dir.path()).is_empty());
    assert_eq!(recorder.log_lines(), vec!["[✓] Manual Merge Saved: branded.pdf"]);
    assert!(recorder.notification_titles().is_empty());
}

#[tokio::test]
async fn test_multi_page_letterhead_fails_the_job_only() {
    let temp_dir = TempDir::new().unwrap();
    let letterhead = temp_dir.path().join("two-pages.pdf");
    write_pdf(&letterhead, 2, "Letterhead");
    let invoice = temp_dir.path().join("invoice.pdf");
    write_pdf(&invoice, 1, "Invoice");
    let before = std::fs::read(&invoice).unwrap();

    let (pipeline, recorder) = pipeline();
    let err = pipeline
        .execute(&MergeJob::in_place(&invoice, &letterhead))
        .await
        .unwrap_err();

    assert!(matches!(err, LetterheadError::InvalidLetterhead { pages: 2 }));
    assert!(err.is_job_scoped());
    assert_eq!(std::fs::read(&invoice).unwrap(), before);
    assert_eq!(recorder.count_titled("Merge Failed"), 1);
    assert!(recorder.log_lines()[0].starts_with("[✗] Merge failed for invoice.pdf:"));
}

#[tokio::test]
async fn test_corrupt_invoice_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let letterhead = write_letterhead(temp_dir.path());
    let invoice = temp_dir.path().join("broken.pdf");
    std::fs::write(&invoice, b"%PDF-1.5\nthis is not a pdf").unwrap();

    let (pipeline, recorder) = pipeline();
    let err = pipeline
        .execute(&MergeJob::in_place(&invoice, &letterhead))
        .await
        .unwrap_err();

    assert!(matches!(err, LetterheadError::FailedToLoadPdf { .. }));
    assert_eq!(recorder.count_titled("Merge Failed"), 1);
}

#[tokio::test]
async fn test_merged_suffix_is_skipped_before_loading() {
    let temp_dir = TempDir::new().unwrap();
    let invoice = temp_dir.path().join("invoice.merged.pdf");

    let (pipeline, recorder) = pipeline();
    // Neither file exists: the suffix check must come first.
    let outcome = pipeline
        .execute(&MergeJob::in_place(&invoice, temp_dir.path().join("lh.pdf")))
        .await
        .unwrap();

    assert!(matches!(outcome, JobOutcome::Skipped(SkipReason::AlreadyMerged)));
    assert!(recorder.entries().is_empty());
}

#[test]
fn test_same_letterhead_serves_many_invoices() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_letterhead(temp_dir.path());
    let letterhead = PdfReader::new().load_letterhead(&path).unwrap();
    let before = serialized(letterhead.document());

    let merger = OverlayMerger::new();
    for pages in [1, 4] {
        let merged = merger.merge(&build_pdf(pages, "Invoice"), &letterhead).unwrap();
        assert_eq!(merged.get_pages().len(), pages);
        assert!(all_pages_have_letterhead(&merged));
    }

    assert_eq!(serialized(letterhead.document()), before);
}

fn serialized(doc: &lopdf::Document) -> Vec<u8> {
    let mut buf = Vec::new();
    doc.clone().save_to(&mut buf).unwrap();
    buf
}
