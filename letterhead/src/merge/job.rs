//! Merge jobs and the pipeline that runs them.
//!
//! A [`MergeJob`] names a source invoice, the letterhead to apply and where
//! the result goes. [`MergePipeline`] loads both documents, applies the
//! overlay on a blocking worker, hands the result to the writer and reports
//! the outcome through the [`Notifier`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info, warn};

use super::overlay::OverlayMerger;
use crate::error::{LetterheadError, Result};
use crate::io::{
    DiskStorage, PdfReader, PdfWriter, Storage, WriteStatistics, WriteTarget, check_input_file,
};
use crate::output::Notifier;
use crate::utils::{display_name, is_merged_output};

/// A single merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJob {
    source: PathBuf,
    letterhead: PathBuf,
    output: Option<PathBuf>,
}

impl MergeJob {
    /// Merge `source` and replace it with the result.
    pub fn in_place(source: impl Into<PathBuf>, letterhead: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            letterhead: letterhead.into(),
            output: None,
        }
    }

    /// Merge `source` into a separate `output` file.
    pub fn to_output(
        source: impl Into<PathBuf>,
        letterhead: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            letterhead: letterhead.into(),
            output: Some(output.into()),
        }
    }

    /// Invoice being merged.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Letterhead applied to the invoice.
    pub fn letterhead(&self) -> &Path {
        &self.letterhead
    }

    /// Explicit output, if any.
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Check whether the job replaces its source.
    pub fn is_in_place(&self) -> bool {
        self.output.is_none()
    }

    /// Where the writer should put the result.
    pub fn target(&self) -> WriteTarget {
        match &self.output {
            Some(output) => WriteTarget::Explicit {
                output: output.clone(),
            },
            None => WriteTarget::InPlace {
                source: self.source.clone(),
            },
        }
    }

    /// Check the job before any PDF is loaded.
    ///
    /// Returns `Ok(Some(reason))` for jobs that should be skipped silently.
    ///
    /// # Errors
    ///
    /// - [`LetterheadError::LetterheadNotConfigured`] for an empty letterhead path
    /// - [`LetterheadError::FileNotFound`] / [`LetterheadError::NotAFile`] for the source
    pub fn validate(&self) -> Result<Option<SkipReason>> {
        if is_merged_output(&self.source) {
            return Ok(Some(SkipReason::AlreadyMerged));
        }
        if self.letterhead.as_os_str().is_empty() {
            return Err(LetterheadError::LetterheadNotConfigured);
        }
        check_input_file(&self.source)?;
        Ok(None)
    }
}

/// Why a job was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The source is itself a merge result.
    AlreadyMerged,
    /// The source was already merged in place during this session.
    AlreadyProcessed,
}

/// Result of a job that did not fail.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The letterhead was applied and the result written.
    Merged {
        /// Path holding the merged document.
        output: PathBuf,
        /// Number of pages in the merged document.
        pages: usize,
        /// Write statistics.
        stats: WriteStatistics,
    },
    /// Nothing was done.
    Skipped(SkipReason),
}

impl JobOutcome {
    /// Check whether the job produced a file.
    pub fn is_merged(&self) -> bool {
        matches!(self, Self::Merged { .. })
    }
}

/// Loads, merges and writes jobs, then reports the outcome.
pub struct MergePipeline<S: Storage = DiskStorage> {
    reader: PdfReader,
    merger: OverlayMerger,
    writer: PdfWriter<S>,
    notifier: Arc<dyn Notifier>,
}

impl MergePipeline<DiskStorage> {
    /// Create a pipeline writing to the local filesystem.
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_writer(PdfWriter::new(), notifier)
    }
}

impl<S: Storage> MergePipeline<S> {
    /// Create a pipeline with a custom writer.
    pub fn with_writer(writer: PdfWriter<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            reader: PdfReader::new(),
            merger: OverlayMerger::new(),
            writer,
            notifier,
        }
    }

    /// Notifier used for reports.
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Run a job without reporting it.
    pub async fn run(&self, job: &MergeJob) -> Result<JobOutcome> {
        if let Some(reason) = job.validate()? {
            return Ok(JobOutcome::Skipped(reason));
        }

        let reader = self.reader;
        let merger = self.merger;
        let source = job.source.clone();
        let letterhead = job.letterhead.clone();

        let (document, pages) = task::spawn_blocking(move || {
            let letterhead = reader.load_letterhead(&letterhead)?;
            let invoice = reader.load(&source)?;
            let merged = merger.merge(&invoice.document, &letterhead)?;
            Ok::<_, LetterheadError>((merged, invoice.page_count))
        })
        .await
        .map_err(|e| LetterheadError::other(format!("Merge task failed: {e}")))??;

        let stats = self.writer.commit(document, job.target()).await?;
        Ok(JobOutcome::Merged {
            output: stats.output_path.clone(),
            pages,
            stats,
        })
    }

    /// Run a job and report its outcome.
    pub async fn execute(&self, job: &MergeJob) -> Result<JobOutcome> {
        let result = self.run(job).await;
        self.report(job, &result);
        result
    }

    /// Emit the user-visible messages for a finished job.
    pub fn report(&self, job: &MergeJob, result: &Result<JobOutcome>) {
        let name = display_name(&job.source);
        match result {
            Ok(JobOutcome::Merged { output, pages, .. }) => {
                info!(
                    source = %job.source.display(),
                    output = %output.display(),
                    pages,
                    "Merged letterhead"
                );
                if job.is_in_place() {
                    let message = format!("Merged: {name}");
                    self.notifier.log(&format!("[✓] {message}"));
                    self.notifier.notify("Merge Complete", &message);
                } else {
                    self.notifier
                        .log(&format!("[✓] Manual Merge Saved: {}", display_name(output)));
                }
            }
            Ok(JobOutcome::Skipped(reason)) => {
                debug!(source = %job.source.display(), ?reason, "Skipped merge");
            }
            Err(e) => {
                warn!(source = %job.source.display(), "Merge failed: {e}");
                let message = format!("Merge failed for {name}: {e}");
                self.notifier.notify("Merge Failed", &message);
                self.notifier.log(&format!("[✗] {message}"));
            }
        }
    }
}
