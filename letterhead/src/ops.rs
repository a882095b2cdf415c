//! Manual and batch merges.
//!
//! Both operations write to explicit outputs and never touch their sources.
//! They share the watch session's pipeline, so they report through the same
//! notifier.

use futures::future::join_all;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{LetterheadError, Result};
use crate::io::Storage;
use crate::merge::{JobOutcome, MergeJob, MergePipeline};
use crate::utils::batch_output_paths;

/// Merge one file into `output`.
///
/// The outcome is reported through the pipeline's notifier and returned so
/// that the caller can show it directly.
///
/// # Errors
///
/// Returns [`LetterheadError::LetterheadNotConfigured`] if `letterhead` is
/// `None`, otherwise whatever the job fails with.
pub async fn manual_merge<S: Storage>(
    pipeline: &MergePipeline<S>,
    letterhead: Option<&Path>,
    source: &Path,
    output: &Path,
) -> Result<JobOutcome> {
    let letterhead = letterhead.ok_or(LetterheadError::LetterheadNotConfigured)?;
    let job = MergeJob::to_output(source, letterhead, output);
    pipeline.execute(&job).await
}

/// Outcome of one file in a batch.
#[derive(Debug)]
pub struct BatchEntry {
    /// Input file.
    pub source: PathBuf,
    /// Where the merged copy was written.
    pub output: PathBuf,
    /// Result of the job.
    pub result: Result<JobOutcome>,
}

/// Outcome of a batch merge, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One entry per source.
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    /// Number of files merged.
    pub fn merged(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.result, Ok(JobOutcome::Merged { .. })))
            .count()
    }

    /// Number of files that failed.
    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.result.is_err())
            .count()
    }

    /// Number of files skipped.
    pub fn skipped(&self) -> usize {
        self.entries.len() - self.merged() - self.failed()
    }

    /// Check whether every file was merged or skipped.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Merge every source into `<output_dir>/<stem>.merged.pdf`.
///
/// Sources sharing a stem are numbered (`x.merged.pdf`, `x-2.merged.pdf`)
/// so no two jobs write the same file. Jobs run concurrently; one failure
/// does not stop the others.
///
/// # Errors
///
/// Returns [`LetterheadError::LetterheadNotConfigured`] if `letterhead` is
/// `None`, and [`LetterheadError::NotAFile`] if `output_dir` is not a
/// directory. Per-file failures are recorded in the report instead.
pub async fn batch_merge<S: Storage>(
    pipeline: &MergePipeline<S>,
    letterhead: Option<&Path>,
    sources: &[PathBuf],
    output_dir: &Path,
) -> Result<BatchReport> {
    let letterhead = letterhead.ok_or(LetterheadError::LetterheadNotConfigured)?;
    if !output_dir.is_dir() {
        return Err(LetterheadError::not_a_file(output_dir.to_path_buf()));
    }

    let jobs: Vec<MergeJob> = sources
        .iter()
        .zip(batch_output_paths(sources, output_dir))
        .map(|(source, output)| MergeJob::to_output(source, letterhead, output))
        .collect();

    let results = join_all(jobs.iter().map(|job| pipeline.execute(job))).await;

    let entries: Vec<BatchEntry> = jobs
        .into_iter()
        .zip(results)
        .map(|(job, result)| BatchEntry {
            source: job.source().to_path_buf(),
            output: job.output().map(Path::to_path_buf).unwrap_or_default(),
            result,
        })
        .collect();

    let report = BatchReport { entries };
    info!(
        merged = report.merged(),
        failed = report.failed(),
        skipped = report.skipped(),
        "Batch merge finished"
    );
    Ok(report)
}
