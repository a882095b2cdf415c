//! Shared helpers for the integration tests.
//!
//! PDFs are generated in memory with lopdf, so no binary fixtures are needed.

#![allow(dead_code)]

use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Sorted names of the files directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Staging files left behind in `dir`.
pub fn partial_files(dir: &Path) -> Vec<String> {
    file_names(dir)
        .into_iter()
        .filter(|name| name.ends_with(".partial"))
        .collect()
}

/// Build a document with `pages` pages of text that share one font.
///
/// The font and media box live on the page tree root, so pages inherit them.
pub fn build_pdf(pages: usize, text: &str) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for i in 0..pages {
        let content = format!("BT /F1 12 Tf 72 700 Td ({text} {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Serialize a generated document.
pub fn pdf_bytes(pages: usize, text: &str) -> Vec<u8> {
    let mut doc = build_pdf(pages, text);
    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("Failed to serialize test PDF");
    buf
}

/// Write a generated document to `path`.
pub fn write_pdf(path: &Path, pages: usize, text: &str) {
    std::fs::write(path, pdf_bytes(pages, text)).expect("Failed to write test PDF");
}

/// Write a one-page letterhead named `letterhead.pdf` into `dir`.
pub fn write_letterhead(dir: &Path) -> PathBuf {
    let path = dir.join("letterhead.pdf");
    write_pdf(&path, 1, "ACME Corp");
    path
}

/// Load a PDF from disk.
pub fn load(path: &Path) -> Document {
    Document::load(path).expect("Failed to load PDF")
}

/// Check whether a page's resources name a letterhead Form XObject.
pub fn page_has_letterhead(doc: &Document, page_id: ObjectId) -> bool {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return false;
    };
    let Some(resources) = page.get(b"Resources").ok().and_then(|obj| as_dict(doc, obj)) else {
        return false;
    };
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| as_dict(doc, obj))
    else {
        return false;
    };

    xobjects.iter().any(|(name, obj)| {
        name.starts_with(b"Letterhead")
            && obj
                .as_reference()
                .ok()
                .and_then(|id| doc.get_object(id).ok())
                .and_then(|obj| obj.as_stream().ok())
                .and_then(|stream| stream.dict.get(b"Subtype").ok())
                .is_some_and(|subtype| matches!(subtype, Object::Name(n) if n == b"Form"))
    })
}

/// Check that every page of `doc` carries the letterhead.
pub fn all_pages_have_letterhead(doc: &Document) -> bool {
    doc.get_pages()
        .into_values()
        .all(|page_id| page_has_letterhead(doc, page_id))
}

fn as_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a lopdf::Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}
