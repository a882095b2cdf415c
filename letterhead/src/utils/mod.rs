//! Utilities for path naming rules, PDF object copying, etc.

use lopdf::{Document, Object};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Suffix carried by every file this crate produces.
///
/// Files whose name ends with this suffix are never merged again.
pub const MERGED_SUFFIX: &str = ".merged.pdf";

const PDF_EXTENSION: &str = ".pdf";

/// Check whether `path` names a PDF file (case-insensitive `.pdf`).
pub fn is_pdf_path(path: &Path) -> bool {
    file_name_lowercase(path).is_some_and(|name| name.ends_with(PDF_EXTENSION))
}

/// Check whether `path` names a file produced by a previous merge.
pub fn is_merged_output(path: &Path) -> bool {
    file_name_lowercase(path).is_some_and(|name| name.ends_with(MERGED_SUFFIX))
}

/// Staging path for an in-place merge: `invoice.pdf` -> `invoice.merged.pdf`.
pub fn merged_sibling(source: &Path) -> PathBuf {
    source.with_file_name(merged_file_name(source))
}

/// Output paths for a batch merge: `<dir>/<stem>.merged.pdf` per source.
///
/// The paths are all distinct. Sources sharing a stem get numbered copies:
/// the first `x.pdf` becomes `x.merged.pdf`, the next `x-2.merged.pdf`, and
/// so on. Names are compared case-insensitively.
pub fn batch_output_paths(sources: &[PathBuf], output_dir: &Path) -> Vec<PathBuf> {
    let mut taken = HashSet::new();
    sources
        .iter()
        .map(|source| {
            let stem = file_stem(source);
            let mut name = format!("{stem}{MERGED_SUFFIX}");
            let mut copy = 2;
            while !taken.insert(name.to_lowercase()) {
                name = format!("{stem}-{copy}{MERGED_SUFFIX}");
                copy += 1;
            }
            output_dir.join(name)
        })
        .collect()
}

/// Key used to identify a file across events.
///
/// Canonicalizes when the file still exists so that different spellings of
/// the same path share debounce and processed-set entries.
pub async fn path_key(path: &Path) -> PathBuf {
    tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Display name of a file (its last component), falling back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn merged_file_name(source: &Path) -> String {
    format!("{}{MERGED_SUFFIX}", file_stem(source))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_name_lowercase(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// The tables guarded this way hold independent entries, so a panic in one
/// critical section cannot leave them half-updated.
pub fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Format file size as human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}

/// Copy object references from one PDF document to another.
///
/// If `obj` is a reference, this walks the structure recursively and inserts
/// missing referenced objects into the `target` document. The caller must
/// renumber `source` above `target.max_id` first so ids cannot collide.
pub fn copy_references(target: &mut Document, source: &Document, obj: &Object) {
    match obj {
        Object::Reference(ref_id) => {
            if !target.objects.contains_key(ref_id)
                && let Ok(referenced_obj) = source.get_object(*ref_id)
            {
                target.objects.insert(*ref_id, referenced_obj.clone());
                copy_references(target, source, referenced_obj);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                copy_references(target, source, value);
            }
        }
        Object::Array(arr) => {
            for item in arr {
                copy_references(target, source, item);
            }
        }
        Object::Stream(stream) => {
            copy_references(target, source, &Object::Dictionary(stream.dict.clone()));
        }
        _ => {}
    }
}
