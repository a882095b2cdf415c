//! Integration tests for manual and batch merges.

use letterhead::error::LetterheadError;
use letterhead::merge::{JobOutcome, MergePipeline, SkipReason};
use letterhead::ops::{batch_merge, manual_merge};
use letterhead::output::RecordingNotifier;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{
    all_pages_have_letterhead, file_names, load, partial_files, write_letterhead, write_pdf,
};

#[tokio::test]
async fn test_batch_writes_merged_copies() {
    let temp_dir = TempDir::new().unwrap();
    let letterhead = write_letterhead(temp_dir.path());
    let out_dir = temp_dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();

    let first = temp_dir.path().join("march.pdf");
    let second = temp_dir.path().join("april.pdf");
    write_pdf(&first, 2, "March");
    write_pdf(&second, 5, "April");
    let originals = [
        std::fs::read(&first).unwrap(),
        std::fs::read(&second).unwrap(),
    ];

    let recorder = Arc::new(RecordingNotifier::new());
    let pipeline = MergePipeline::new(recorder.clone());
    let report = batch_merge(
        &pipeline,
        Some(letterhead.as_path()),
        &[first.clone(), second.clone()],
        &out_dir,
    )
    .await
    .unwrap();

    assert!(report.is_success());
    assert_eq!(report.merged(), 2);
    assert_eq!(report.entries[0].source, first);
    assert_eq!(report.entries[1].output, out_dir.join("april.merged.pdf"));

    let march = load(&out_dir.join("march.merged.pdf"));
    let april = load(&out_dir.join("april.merged.pdf"));
    assert_eq!(march.get_pages().len(), 2);
    assert_eq!(april.get_pages().len(), 5);
    assert!(all_pages_have_letterhead(&march));
    assert!(all_pages_have_letterhead(&april));

    assert_eq!(std::fs::read(&first).unwrap(), originals[0]);
    assert_eq!(std::fs::read(&second).unwrap(), originals[1]);

    let mut saved = recorder.log_lines();
    saved.sort();
    assert_eq!(
        saved,
        vec![
            "[✓] Manual Merge Saved: april.merged.pdf",
            "[✓] Manual Merge Saved: march.merged.pdf",
        ]
    );
}

#[tokio::test]
async fn test_batch_continues_after_a_failure() {
    let temp_dir = TempDir::new().unwrap();
    let letterhead = write_letterhead(temp_dir.path());
    let good = temp_dir.path().join("good.pdf");
    let bad = temp_dir.path().join("bad.pdf");
    let done = temp_dir.path().join("done.merged.pdf");
    write_pdf(&good, 1, "Good");
    std::fs::write(&bad, b"not a pdf").unwrap();
    write_pdf(&done, 1, "Done");

    let out_dir = TempDir::new().unwrap();
    let pipeline = MergePipeline::new(Arc::new(RecordingNotifier::new()));
    let sources: Vec<PathBuf> = vec![bad.clone(), good.clone(), done.clone()];
    let report = batch_merge(&pipeline, Some(letterhead.as_path()), &sources, out_dir.path())
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.merged(), 1);
    assert_eq!(report.skipped(), 1);
    assert!(!report.is_success());
    assert!(report.entries[0].result.is_err());
    assert!(matches!(
        report.entries[2].result,
        Ok(JobOutcome::Skipped(SkipReason::AlreadyMerged))
    ));
    assert!(out_dir.path().join("good.merged.pdf").exists());
    assert!(!out_dir.path().join("bad.merged.pdf").exists());
}

#[tokio::test]
async fn test_batch_sources_sharing_a_name_get_distinct_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let letterhead = write_letterhead(temp_dir.path());
    let out_dir = temp_dir.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();

    let mut sources = Vec::new();
    for i in 0..16 {
        let dir = temp_dir.path().join(format!("d{i}"));
        std::fs::create_dir(&dir).unwrap();
        let source = dir.join("x.pdf");
        write_pdf(&source, i % 4 + 1, &format!("Invoice {i}"));
        sources.push(source);
    }

    let pipeline = MergePipeline::new(Arc::new(RecordingNotifier::new()));
    let report = batch_merge(&pipeline, Some(letterhead.as_path()), &sources, &out_dir)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.merged(), 16);
    assert_eq!(report.entries[0].output, out_dir.join("x.merged.pdf"));
    assert_eq!(report.entries[1].output, out_dir.join("x-2.merged.pdf"));
    assert_eq!(report.entries[15].output, out_dir.join("x-16.merged.pdf"));

    assert_eq!(file_names(&out_dir).len(), 16);
    assert!(partial_files(&out_dir).is_empty());
    for (i, entry) in report.entries.iter().enumerate() {
        let merged = load(&entry.output);
        assert_eq!(merged.get_pages().len(), i % 4 + 1);
        assert!(all_pages_have_letterhead(&merged));
    }
}

#[tokio::test]
async fn test_manual_merge_to_explicit_output() {
    let temp_dir = TempDir::new().unwrap();
    let letterhead = write_letterhead(temp_dir.path());
    let source = temp_dir.path().join("invoice.pdf");
    let output = temp_dir.path().join("sent").join("invoice-final.pdf");
    std::fs::create_dir(temp_dir.path().join("sent")).unwrap();
    write_pdf(&source, 3, "Invoice");

    let pipeline = MergePipeline::new(Arc::new(RecordingNotifier::new()));
    let outcome = manual_merge(&pipeline, Some(letterhead.as_path()), &source, &output)
        .await
        .unwrap();

    assert!(outcome.is_merged());
    let merged = load(&output);
    assert_eq!(merged.get_pages().len(), 3);
    assert!(all_pages_have_letterhead(&merged));
    assert!(!all_pages_have_letterhead(&load(&source)));
}

#[tokio::test]
async fn test_manual_merge_missing_source() {
    let temp_dir = TempDir::new().unwrap();
    let letterhead = write_letterhead(temp_dir.path());

    let recorder = Arc::new(RecordingNotifier::new());
    let pipeline = MergePipeline::new(recorder.clone());
    let err = manual_merge(
        &pipeline,
        Some(letterhead.as_path()),
        &temp_dir.path().join("missing.pdf"),
        &temp_dir.path().join("out.pdf"),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, LetterheadError::FileNotFound { .. }));
    assert_eq!(recorder.count_titled("Merge Failed"), 1);
    assert!(!temp_dir.path().join("out.pdf").exists());
}
