//! PDF reading and loading operations.
//!
//! Loading is synchronous: callers in async code run it on a blocking
//! worker. The file is read fully into memory and parsed from there, so the
//! OS file handle is released before parsing starts.
//!
//! # Examples
//!
//! ```no_run
//! use letterhead::io::reader::PdfReader;
//! use std::path::Path;
//!
//! # fn example() -> letterhead::Result<()> {
//! let reader = PdfReader::new();
//! let loaded = reader.load(Path::new("invoice.pdf"))?;
//! println!("{} pages in {:?}", loaded.page_count, loaded.load_time);
//! # Ok(())
//! # }
//! ```

use lopdf::Document;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{LetterheadError, Result};
use crate::merge::overlay::Letterhead;

/// A loaded PDF document with metadata.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The PDF document.
    pub document: Document,

    /// Path to the source file.
    pub path: PathBuf,

    /// Number of pages in the document.
    pub page_count: usize,

    /// Time taken to read and parse the document.
    pub load_time: Duration,

    /// File size in bytes.
    pub file_size: u64,
}

/// PDF reader that classifies load failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfReader;

impl PdfReader {
    /// Create a new PDF reader.
    pub fn new() -> Self {
        Self
    }

    /// Load a single PDF document.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path does not exist or is not a regular file
    /// - The file cannot be read
    /// - The PDF is encrypted
    /// - The PDF structure cannot be parsed
    pub fn load(&self, path: &Path) -> Result<LoadedPdf> {
        check_input_file(path)?;

        let start = Instant::now();
        let bytes = std::fs::read(path)
            .map_err(|e| LetterheadError::failed_to_load_pdf(path.to_path_buf(), e.to_string()))?;
        let file_size = bytes.len() as u64;

        let document = Document::load_mem(&bytes).map_err(|e| classify_load_error(path, e))?;
        let page_count = document.get_pages().len();
        let load_time = start.elapsed();

        debug!(
            path = %path.display(),
            pages = page_count,
            bytes = file_size,
            "Loaded PDF in {:.1}ms",
            load_time.as_secs_f64() * 1000.0
        );

        Ok(LoadedPdf {
            document,
            path: path.to_path_buf(),
            page_count,
            load_time,
            file_size,
        })
    }

    /// Load a letterhead and check that it has exactly one page.
    pub fn load_letterhead(&self, path: &Path) -> Result<Letterhead> {
        let loaded = self.load(path)?;
        Letterhead::new(loaded.document)
    }
}

/// Check that `path` exists and is a regular file.
pub fn check_input_file(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(LetterheadError::not_a_file(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LetterheadError::file_not_found(path.to_path_buf()))
        }
        Err(e) => Err(LetterheadError::failed_to_load_pdf(
            path.to_path_buf(),
            e.to_string(),
        )),
    }
}

fn classify_load_error(path: &Path, err: lopdf::Error) -> LetterheadError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("encrypt") || lower.contains("password") || lower.contains("decrypt") {
        LetterheadError::encrypted_pdf(path.to_path_buf())
    } else {
        LetterheadError::failed_to_load_pdf(path.to_path_buf(), message)
    }
}
