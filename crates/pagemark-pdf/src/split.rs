//! Page extraction into a new document.

use crate::error::PdfEditError;
use lopdf::Document;
use std::collections::HashSet;

/// Build a new document containing only the given 1-indexed pages, in
/// their original order.
pub fn split_document(bytes: &[u8], pages: Vec<u32>) -> Result<Vec<u8>, PdfEditError> {
    if pages.is_empty() {
        return Err(PdfEditError::InvalidPages("no pages specified".into()));
    }

    if pages.contains(&0) {
        return Err(PdfEditError::InvalidPages(
            "page numbers must be >= 1".into(),
        ));
    }

    let doc = Document::load_mem(bytes).map_err(|e| PdfEditError::Parse(e.to_string()))?;
    let page_count = doc.get_pages().len() as u32;

    for &page in &pages {
        if page > page_count {
            return Err(PdfEditError::InvalidPages(format!(
                "page {} does not exist (document has {} pages)",
                page, page_count
            )));
        }
    }

    let mut new_doc = doc.clone();
    let keep: HashSet<u32> = pages.iter().copied().collect();
    let mut to_delete: Vec<u32> = (1..=page_count).filter(|page| !keep.contains(page)).collect();

    // Delete back to front so page numbering stays stable.
    to_delete.reverse();
    for page in to_delete {
        new_doc.delete_pages(&[page]);
    }

    new_doc.prune_objects();
    new_doc.compress();

    let mut buffer = Vec::new();
    new_doc
        .save_to(&mut buffer)
        .map_err(|e| PdfEditError::Operation(format!("save failed: {}", e)))?;
    Ok(buffer)
}
