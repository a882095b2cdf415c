//! Mapping of raw folder notifications to merge candidates.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::path::{Path, PathBuf};

use crate::utils::{is_merged_output, is_pdf_path};

/// What happened to a path in the watched folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderEventKind {
    /// A file appeared.
    Created,
    /// A file's content or metadata changed.
    Modified,
    /// A file was moved into place under this name.
    RenamedInto,
}

/// A change observed in the watched folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEvent {
    /// Path that changed.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: FolderEventKind,
    /// Whether the path is a directory.
    pub is_dir: bool,
}

impl FolderEvent {
    /// Build an event, probing the filesystem for the directory flag.
    pub fn observe(path: PathBuf, kind: FolderEventKind) -> Self {
        let is_dir = path.is_dir();
        Self { path, kind, is_dir }
    }

    /// Check whether this event may lead to a merge.
    ///
    /// Directories, non-PDF files and merge outputs are ignored. Create,
    /// modify and rename-into events are treated identically.
    pub fn is_candidate(&self) -> bool {
        !self.is_dir && is_candidate_path(&self.path)
    }
}

/// Check the naming rules alone: `.pdf` but not `.merged.pdf`.
pub fn is_candidate_path(path: &Path) -> bool {
    !is_merged_output(path) && is_pdf_path(path)
}

/// Translate a notify event into folder events.
///
/// Removals, renames away and access events produce nothing.
pub fn map_notify_event(event: Event) -> Vec<FolderEvent> {
    let Event { kind, paths, .. } = event;

    if let EventKind::Modify(ModifyKind::Name(mode)) = kind {
        return match mode {
            // Source and destination; only the destination is interesting.
            RenameMode::Both => paths
                .get(1)
                .map(|to| vec![FolderEvent::observe(to.clone(), FolderEventKind::RenamedInto)])
                .unwrap_or_default(),
            RenameMode::From => Vec::new(),
            RenameMode::To | RenameMode::Any | RenameMode::Other => paths
                .into_iter()
                .filter(|path| path.exists())
                .map(|path| FolderEvent::observe(path, FolderEventKind::RenamedInto))
                .collect(),
        };
    }

    let kind = match kind {
        EventKind::Create(_) => FolderEventKind::Created,
        EventKind::Modify(_) => FolderEventKind::Modified,
        _ => return Vec::new(),
    };

    paths
        .into_iter()
        .map(|path| FolderEvent::observe(path, kind))
        .collect()
}

/// Paths from a notify event that should go on to the debouncer.
pub fn candidate_paths(event: Event) -> Vec<PathBuf> {
    map_notify_event(event)
        .into_iter()
        .filter(FolderEvent::is_candidate)
        .map(|event| event.path)
        .collect()
}
