//! Letterhead overlay.
//!
//! The letterhead's single page is turned into a Form XObject that is added
//! to the invoice once and drawn on top of every invoice page. Invoice
//! content is wrapped in `q`/`Q` so that whatever graphics state it leaves
//! behind cannot shift or recolor the letterhead.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::collections::HashMap;
use tracing::debug;

use super::pages;
use crate::error::{LetterheadError, Result};
use crate::utils::copy_references;

/// Preferred resource name for the letterhead form.
const FORM_NAME: &str = "Letterhead";

/// A document known to have exactly one page.
#[derive(Debug, Clone)]
pub struct Letterhead {
    document: Document,
}

impl Letterhead {
    /// Wrap a document, checking that it has exactly one page.
    ///
    /// # Errors
    ///
    /// Returns [`LetterheadError::InvalidLetterhead`] with the actual page
    /// count otherwise.
    pub fn new(document: Document) -> Result<Self> {
        match pages::page_count(&document) {
            1 => Ok(Self { document }),
            n => Err(LetterheadError::invalid_letterhead(n)),
        }
    }

    /// The underlying document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Build a Form XObject from the letterhead page.
    ///
    /// Works on a copy renumbered from `first_id`, which is returned with
    /// the form so the caller can pull in the objects it references.
    fn to_form(&self, first_id: u32) -> Result<(Document, Stream)> {
        let mut source = self.document.clone();
        source.renumber_objects_with(first_id);

        let page_id = source
            .get_pages()
            .into_values()
            .next()
            .ok_or_else(|| LetterheadError::invalid_letterhead(0))?;

        let content = source.get_page_content(page_id)?;
        let resources = pages::page_resources(&source, page_id);
        let bbox = pages::media_box(&source, page_id);

        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => bbox,
            "Resources" => resources,
        };

        Ok((source, Stream::new(dict, content)))
    }
}

/// Composites a letterhead onto every page of an invoice.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayMerger;

impl OverlayMerger {
    /// Create a new overlay merger.
    pub fn new() -> Self {
        Self
    }

    /// Produce a copy of `invoice` with `letterhead` drawn over every page.
    ///
    /// Page order and count are preserved. An invoice without pages yields
    /// an unchanged copy. Neither input is modified.
    pub fn merge(&self, invoice: &Document, letterhead: &Letterhead) -> Result<Document> {
        let mut merged = invoice.clone();
        let page_ids: Vec<ObjectId> = merged.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Ok(merged);
        }

        let (source, form) = letterhead.to_form(merged.max_id + 1)?;
        copy_references(&mut merged, &source, &Object::Dictionary(form.dict.clone()));
        merged.max_id = merged.max_id.max(source.max_id);
        let form_id = merged.add_object(Object::Stream(form));

        let open_id = pages::add_content_stream(&mut merged, b"q\n".to_vec());
        let mut close_ids: HashMap<String, ObjectId> = HashMap::new();

        for page_id in &page_ids {
            let mut resources = pages::page_resources(&merged, *page_id);
            let mut xobjects = resources
                .get(b"XObject")
                .ok()
                .map(|obj| pages::resolve(&merged, obj))
                .and_then(|obj| obj.as_dict().ok())
                .cloned()
                .unwrap_or_default();

            let name = unused_name(&xobjects);
            xobjects.set(name.as_bytes().to_vec(), Object::Reference(form_id));
            resources.set("XObject", Object::Dictionary(xobjects));

            let close_id = *close_ids.entry(name.clone()).or_insert_with(|| {
                let draw = format!("\nQ\nq\n/{name} Do\nQ\n");
                pages::add_content_stream(&mut merged, draw.into_bytes())
            });

            pages::wrap_content(&mut merged, *page_id, open_id, close_id)?;
            merged
                .get_dictionary_mut(*page_id)
                .map_err(|e| LetterheadError::merge_failed(format!("Failed to get page: {e}")))?
                .set("Resources", Object::Dictionary(resources));
        }

        debug!(pages = page_ids.len(), "Applied letterhead");
        Ok(merged)
    }
}

/// Validate `letterhead` and overlay it onto `invoice`.
///
/// # Errors
///
/// Returns [`LetterheadError::InvalidLetterhead`] when `letterhead` does not
/// have exactly one page.
pub fn overlay_document(invoice: &Document, letterhead: &Document) -> Result<Document> {
    let letterhead = Letterhead::new(letterhead.clone())?;
    OverlayMerger::new().merge(invoice, &letterhead)
}

fn unused_name(xobjects: &Dictionary) -> String {
    if !xobjects.has(FORM_NAME.as_bytes()) {
        return FORM_NAME.to_string();
    }
    (1..)
        .map(|n| format!("{FORM_NAME}{n}"))
        .find(|candidate| !xobjects.has(candidate.as_bytes()))
        .unwrap_or_else(|| FORM_NAME.to_string())
}
