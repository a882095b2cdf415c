//! Error types for letterhead.
//!
//! Every fallible operation in the crate returns [`LetterheadError`]. Errors
//! carry the path they concern so the presentation layer can name the file
//! in its message.
//!
//! # Error Categories
//!
//! - **Job errors**: invalid letterhead, unreadable invoice, failed writes.
//!   These are fatal to one merge job and never to the watch session.
//! - **Session errors**: the folder subscription could not be created.
//! - **Recoverable errors**: a corrupt config file (falls back to defaults),
//!   a failed release check (logged and ignored).

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for letterhead operations.
pub type Result<T> = std::result::Result<T, LetterheadError>;

/// Main error type for letterhead operations.
#[derive(Debug, thiserror::Error)]
pub enum LetterheadError {
    /// Input file was not found.
    #[error("File not found: {}", .path.display())]
    FileNotFound {
        /// Path to the file that was not found.
        path: PathBuf,
    },

    /// Path exists but is not a regular file.
    #[error("Not a file: {}", .path.display())]
    NotAFile {
        /// Path that is not a file.
        path: PathBuf,
    },

    /// Failed to load a PDF file.
    #[error("Failed to load PDF: {}\n  Reason: {reason}", .path.display())]
    FailedToLoadPdf {
        /// Path to the PDF file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// PDF file is encrypted and cannot be processed.
    #[error(
        "PDF is encrypted and cannot be processed: {}\n  \
         Hint: Decrypt the PDF first using 'qpdf --decrypt' or similar tools",
        .path.display()
    )]
    EncryptedPdf {
        /// Path to the encrypted PDF.
        path: PathBuf,
    },

    /// The letterhead document does not have exactly one page.
    #[error("Letterhead PDF must have exactly one page (found {pages})")]
    InvalidLetterhead {
        /// Number of pages found in the letterhead.
        pages: usize,
    },

    /// No letterhead has been configured yet.
    #[error("No letterhead PDF is configured")]
    LetterheadNotConfigured,

    /// Compositing the letterhead onto the invoice failed.
    #[error("Merge operation failed: {reason}")]
    MergeFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// Writing or replacing the output failed after all retries.
    #[error(
        "Could not save {} after {attempts} attempt(s)\n  Reason: {source}",
        .path.display()
    )]
    MergeWrite {
        /// Final path that could not be written.
        path: PathBuf,
        /// Number of attempts made.
        attempts: u32,
        /// Last underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The source file never stopped changing size.
    #[error("File never stabilized: {} (waited {:.1}s)", .path.display(), .waited.as_secs_f64())]
    StabilityTimeout {
        /// Path of the file being watched.
        path: PathBuf,
        /// How long the gate waited before giving up.
        waited: Duration,
    },

    /// The persisted configuration could not be read.
    #[error("Failed to load configuration: {}\n  Reason: {reason}", .path.display())]
    ConfigLoad {
        /// Path to the configuration file.
        path: PathBuf,
        /// Parse or read failure.
        reason: String,
    },

    /// The configuration could not be written.
    #[error("Failed to save configuration: {}\n  Reason: {source}", .path.display())]
    ConfigSave {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The folder subscription failed.
    #[error("Cannot watch folder: {}\n  Reason: {reason}", .path.display())]
    Watch {
        /// Folder being watched.
        path: PathBuf,
        /// Backend error message.
        reason: String,
    },

    /// Checking or downloading a release failed.
    #[error("Update failed: {reason}")]
    Update {
        /// Description of what went wrong.
        reason: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl From<lopdf::Error> for LetterheadError {
    fn from(err: lopdf::Error) -> Self {
        Self::merge_failed(err.to_string())
    }
}

impl LetterheadError {
    /// Create a FileNotFound error.
    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    /// Create a NotAFile error.
    pub fn not_a_file(path: PathBuf) -> Self {
        Self::NotAFile { path }
    }

    /// Create a FailedToLoadPdf error.
    pub fn failed_to_load_pdf(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::FailedToLoadPdf {
            path,
            reason: reason.into(),
        }
    }

    /// Create an EncryptedPdf error.
    pub fn encrypted_pdf(path: PathBuf) -> Self {
        Self::EncryptedPdf { path }
    }

    /// Create an InvalidLetterhead error.
    pub fn invalid_letterhead(pages: usize) -> Self {
        Self::InvalidLetterhead { pages }
    }

    /// Create a MergeFailed error.
    pub fn merge_failed(reason: impl Into<String>) -> Self {
        Self::MergeFailed {
            reason: reason.into(),
        }
    }

    /// Create a Watch error.
    pub fn watch(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::Watch {
            path,
            reason: reason.into(),
        }
    }

    /// Create an Update error.
    pub fn update(reason: impl Into<String>) -> Self {
        Self::Update {
            reason: reason.into(),
        }
    }

    /// Create an Other error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this error only affects a single merge job.
    ///
    /// Job-scoped errors are reported and the watch session keeps running.
    pub fn is_job_scoped(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. }
                | Self::NotAFile { .. }
                | Self::FailedToLoadPdf { .. }
                | Self::EncryptedPdf { .. }
                | Self::InvalidLetterhead { .. }
                | Self::LetterheadNotConfigured
                | Self::MergeFailed { .. }
                | Self::MergeWrite { .. }
                | Self::StabilityTimeout { .. }
        )
    }

    /// Check if this error is a write that failed on its final attempt.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::MergeWrite { .. })
    }
}
