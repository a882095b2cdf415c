//! I/O operations for letterhead.
//!
//! This module handles all file I/O:
//! - Loading invoice and letterhead documents from disk
//! - Writing merged documents with atomic replacement
//! - Retrying writes while another program holds the target open
//!
//! # Examples
//!
//! ```no_run
//! use letterhead::io::{PdfReader, PdfWriter, WriteTarget};
//! use std::path::PathBuf;
//!
//! # async fn example() -> letterhead::Result<()> {
//! let loaded = PdfReader::new().load(&PathBuf::from("invoice.pdf"))?;
//!
//! let target = WriteTarget::Explicit { output: PathBuf::from("copy.pdf") };
//! PdfWriter::new().commit(loaded.document, target).await?;
//! # Ok(())
//! # }
//! ```

pub mod reader;
pub mod writer;

pub use reader::{LoadedPdf, PdfReader, check_input_file};
pub use writer::{
    DiskStorage, PdfWriter, RetryPolicy, Storage, WriteOptions, WriteStatistics, WriteTarget,
    is_lock_contention,
};
