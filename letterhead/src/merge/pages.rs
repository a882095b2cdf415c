//! Page-level helpers for the overlay merge.
//!
//! This module handles the parts of the page tree the overlay touches:
//! - Inherited page attributes (`Resources`, `MediaBox`)
//! - Reference resolution
//! - Content stream wrapping

use crate::error::{LetterheadError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Maximum page-tree depth walked when looking up inherited attributes.
const MAX_TREE_DEPTH: usize = 32;

/// Default page size (US Letter) used when no `MediaBox` can be found.
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

/// Get the number of pages in a document.
pub fn page_count(doc: &Document) -> usize {
    doc.get_pages().len()
}

/// Follow indirect references until a direct object is reached.
///
/// Dangling references and reference cycles resolve to the last object seen.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_TREE_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => break,
            },
            _ => break,
        }
    }
    current
}

/// Look up a page attribute, walking up the `Parent` chain for attributes
/// that the page inherits from its ancestors.
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node_id = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(resolve(doc, value));
        }
        node_id = node.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Effective resource dictionary of a page, as an owned copy.
///
/// The copy can be modified and stored inline on the page without touching
/// resource dictionaries shared with other pages.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited_attribute(doc, page_id, b"Resources")
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// Effective `MediaBox` of a page.
pub fn media_box(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .filter(|values| values.len() == 4)
        .map(|values| values.iter().map(|v| resolve(doc, v).clone()).collect())
        .unwrap_or_else(|| DEFAULT_MEDIA_BOX.iter().map(|&v| Object::Integer(v)).collect())
}

/// References to the content streams of a page, in drawing order.
pub fn content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| LetterheadError::merge_failed(format!("Failed to get page: {e}")))?;

    let refs = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // A reference to an array of streams
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Stream(stream)) => vec![Object::Stream(stream.clone())],
        _ => Vec::new(),
    };

    Ok(refs)
}

/// Surround the page's existing content with `before` and `after` streams.
///
/// Existing content streams are kept as they are; only the page's
/// `Contents` entry is rewritten.
pub fn wrap_content(
    doc: &mut Document,
    page_id: ObjectId,
    before: ObjectId,
    after: ObjectId,
) -> Result<()> {
    let existing = content_refs(doc, page_id)?;

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(before));
    contents.extend(existing);
    contents.push(Object::Reference(after));

    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| LetterheadError::merge_failed(format!("Failed to get page: {e}")))?;
    page.set("Contents", Object::Array(contents));

    Ok(())
}

/// Add a content stream holding `content` to the document.
pub fn add_content_stream(doc: &mut Document, content: Vec<u8>) -> ObjectId {
    doc.add_object(Object::Stream(Stream::new(Dictionary::new(), content)))
}
