//! Folder watching.
//!
//! Events flow through the submodules in this order:
//! 1. [`filter`] turns raw notifications into candidate PDF paths
//! 2. [`debounce`] drops repeats, pre-existing files and already merged files
//! 3. [`stability`] waits until a file has finished growing
//! 4. [`coordinator`] runs the merge and reports the outcome
//!
//! # Examples
//!
//! ```no_run
//! use letterhead::config::SharedConfig;
//! use letterhead::output::TracingNotifier;
//! use letterhead::watch::{WatchCoordinator, WatchOptions};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example(config: SharedConfig) -> letterhead::Result<()> {
//! let coordinator = WatchCoordinator::new(config, Arc::new(TracingNotifier), WatchOptions::default());
//! coordinator.start(Path::new("/home/me/Invoices"))?;
//! // ...
//! coordinator.stop();
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod debounce;
pub mod filter;
pub mod stability;

pub use coordinator::{WatchCoordinator, WatchOptions};
pub use debounce::{DEBOUNCE_WINDOW, DedupDebouncer, InPlaceClaim, ProcessedSet, Verdict};
pub use filter::{FolderEvent, FolderEventKind, candidate_paths, is_candidate_path};
pub use stability::{FsProbe, Readiness, SizeProbe, StabilityGate, StabilityPolicy};
