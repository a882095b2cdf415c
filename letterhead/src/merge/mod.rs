//! Letterhead merging.
//!
//! This module provides the core merge functionality:
//! - Overlaying a one-page letterhead onto every page of an invoice
//! - Page-tree helpers for inherited resources and content streams
//! - Merge jobs and the pipeline that loads, merges, writes and reports
//!
//! # Examples
//!
//! ```no_run
//! use letterhead::merge::{MergeJob, MergePipeline};
//! use letterhead::output::TracingNotifier;
//! use std::sync::Arc;
//!
//! # async fn example() -> letterhead::Result<()> {
//! let pipeline = MergePipeline::new(Arc::new(TracingNotifier));
//! let job = MergeJob::to_output("invoice.pdf", "letterhead.pdf", "invoice-branded.pdf");
//! pipeline.execute(&job).await?;
//! # Ok(())
//! # }
//! ```

pub mod job;
pub mod overlay;
pub mod pages;

pub use job::{JobOutcome, MergeJob, MergePipeline, SkipReason};
pub use overlay::{Letterhead, OverlayMerger, overlay_document};
