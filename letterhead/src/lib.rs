//! letterhead - Stamp a letterhead onto every page of PDF invoices.
//!
//! This library watches a folder for new PDF files and overlays a one-page
//! letterhead document onto each of their pages. It supports:
//!
//! - Folder watching with debouncing and file stability detection
//! - In-place merging with atomic replacement and retry on locked files
//! - Manual and batch merges to explicit outputs
//! - A persisted configuration of letterhead and watch folder
//! - Release feed checks for newer versions
//!
//! # Examples
//!
//! ## Watching a Folder
//!
//! ```no_run
//! use letterhead::config::{ConfigStore, SharedConfig};
//! use letterhead::output::TracingNotifier;
//! use letterhead::watch::{WatchCoordinator, WatchOptions};
//! use std::sync::Arc;
//!
//! # async fn example() -> letterhead::Result<()> {
//! let config = SharedConfig::new(ConfigStore::at_default_location().load());
//! let coordinator = WatchCoordinator::new(
//!     config.clone(),
//!     Arc::new(TracingNotifier),
//!     WatchOptions::default(),
//! );
//!
//! if let Some(folder) = config.snapshot().folder() {
//!     coordinator.start(&folder)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Merging a Single File
//!
//! ```no_run
//! use letterhead::merge::OverlayMerger;
//! use letterhead::io::PdfReader;
//! use std::path::Path;
//!
//! # fn example() -> letterhead::Result<()> {
//! let reader = PdfReader::new();
//! let letterhead = reader.load_letterhead(Path::new("letterhead.pdf"))?;
//! let invoice = reader.load(Path::new("invoice.pdf"))?;
//!
//! let mut merged = OverlayMerger::new().merge(&invoice.document, &letterhead)?;
//! merged.save("invoice-branded.pdf")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod io;
pub mod merge;
pub mod ops;
pub mod output;
pub mod update;
pub mod utils;
pub mod watch;

// Re-export commonly used types
pub use config::{Config, SharedConfig};
pub use error::{LetterheadError, Result};
pub use merge::{MergeJob, MergePipeline};
pub use output::{Notifier, TracingNotifier};
pub use watch::{WatchCoordinator, WatchOptions};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
