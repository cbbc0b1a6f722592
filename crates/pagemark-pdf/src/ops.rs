//! Structural page operations: delete, reorder, rotate, extract.
//!
//! Guarded edge cases (empty selections, deleting every page, identity or
//! malformed reorders, out-of-range pages) silently return the input bytes
//! unchanged: they are reachable through normal UI races and must not
//! surface as errors.

use crate::error::PdfEditError;
use crate::merge::update_page_tree;
use crate::rotation::normalize_rotation;
use crate::split::split_document;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeSet;

fn load(bytes: &[u8]) -> Result<Document, PdfEditError> {
    Document::load_mem(bytes).map_err(|e| PdfEditError::Parse(e.to_string()))
}

fn save(mut doc: Document) -> Result<Vec<u8>, PdfEditError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfEditError::Operation(e.to_string()))?;
    Ok(buffer)
}

/// Delete the given 1-indexed pages. Invalid and duplicate page numbers
/// are dropped; removing nothing, or everything, is a no-op that returns
/// the input unchanged (a document keeps at least one page).
pub fn delete_pages(bytes: &[u8], page_numbers: &[u32]) -> Result<Vec<u8>, PdfEditError> {
    let mut doc = load(bytes)?;
    let page_count = doc.get_pages().len() as u32;

    let targets: Vec<u32> = page_numbers
        .iter()
        .copied()
        .filter(|page| *page >= 1 && *page <= page_count)
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect();

    if targets.is_empty() || targets.len() >= page_count as usize {
        return Ok(bytes.to_vec());
    }

    // Delete back to front so page numbers stay valid while deleting.
    for page in targets.into_iter().rev() {
        doc.delete_pages(&[page]);
    }

    doc.prune_objects();
    doc.compress();
    save(doc)
}

/// Reorder pages. `new_order[i]` is the 1-indexed old page number that
/// becomes new page `i + 1`. Anything that is not a full permutation of
/// `1..=page_count`, or is the identity, returns the input unchanged.
pub fn reorder_pages(bytes: &[u8], new_order: &[u32]) -> Result<Vec<u8>, PdfEditError> {
    let mut doc = load(bytes)?;
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;

    if new_order.len() != page_count as usize {
        return Ok(bytes.to_vec());
    }

    let sorted: Vec<u32> = new_order
        .iter()
        .copied()
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect();
    let is_permutation = sorted.len() == new_order.len()
        && sorted
            .iter()
            .enumerate()
            .all(|(index, page)| *page == index as u32 + 1);
    if !is_permutation {
        return Ok(bytes.to_vec());
    }

    let is_identity = new_order
        .iter()
        .enumerate()
        .all(|(index, page)| *page == index as u32 + 1);
    if is_identity {
        return Ok(bytes.to_vec());
    }

    let page_ids: Vec<ObjectId> = new_order
        .iter()
        .filter_map(|page| pages.get(page).copied())
        .collect();

    update_page_tree(&mut doc, page_ids)?;
    doc.prune_objects();
    save(doc)
}

/// Set a page's rotation (normalized to 0/90/180/270). An out-of-range
/// page number returns the input unchanged.
pub fn rotate_page(
    bytes: &[u8],
    page_number: u32,
    rotation_degrees: i32,
) -> Result<Vec<u8>, PdfEditError> {
    let mut doc = load(bytes)?;
    let pages = doc.get_pages();

    let Some(page_id) = pages.get(&page_number).copied() else {
        return Ok(bytes.to_vec());
    };

    let normalized = normalize_rotation(rotation_degrees);
    let page_dict = doc
        .get_object_mut(page_id)
        .map_err(|e| PdfEditError::Operation(e.to_string()))?
        .as_dict_mut()
        .map_err(|e| PdfEditError::Operation(e.to_string()))?;
    page_dict.set("Rotate", Object::Integer(normalized as i64));

    save(doc)
}

/// Extract a contiguous 1-indexed page range (bounds given in either
/// order) into a new document.
pub fn extract_page_range(bytes: &[u8], start: u32, end: u32) -> Result<Vec<u8>, PdfEditError> {
    let lower = start.min(end).max(1);
    let upper = start.max(end);
    let pages: Vec<u32> = (lower..=upper).collect();
    split_document(bytes, pages)
}


#[cfg(test)]
mod tests {
    use super::test_support::{create_test_pdf, page_texts};
    use super::*;

    #[test]
    fn test_delete_pages_removes_targets() {
        let pdf = create_test_pdf(3);
        let result = delete_pages(&pdf, &[2]).unwrap();
        let doc = Document::load_mem(&result).unwrap();
        assert_eq!(doc.get_pages().len(), 2);

        let texts = page_texts(&result);
        assert!(texts[0].contains("Page-1"));
        assert!(texts[1].contains("Page-3"));
    }

    #[test]
    fn test_delete_pages_filters_invalid_numbers() {
        let pdf = create_test_pdf(3);
        let result = delete_pages(&pdf, &[0, 2, 2, 99]).unwrap();
        let doc = Document::load_mem(&result).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_delete_all_pages_is_noop() {
        let pdf = create_test_pdf(2);
        let result = delete_pages(&pdf, &[1, 2]).unwrap();
        assert_eq!(result, pdf);
    }

    #[test]
    fn test_delete_nothing_is_noop() {
        let pdf = create_test_pdf(2);
        let result = delete_pages(&pdf, &[]).unwrap();
        assert_eq!(result, pdf);
    }

    #[test]
    fn test_reorder_pages_permutes_content() {
        let pdf = create_test_pdf(3);
        let result = reorder_pages(&pdf, &[3, 1, 2]).unwrap();

        let texts = page_texts(&result);
        assert!(texts[0].contains("Page-3"));
        assert!(texts[1].contains("Page-1"));
        assert!(texts[2].contains("Page-2"));
    }

    #[test]
    fn test_reorder_identity_is_noop() {
        let pdf = create_test_pdf(3);
        let result = reorder_pages(&pdf, &[1, 2, 3]).unwrap();
        assert_eq!(result, pdf);
    }

    #[test]
    fn test_reorder_malformed_is_noop() {
        let pdf = create_test_pdf(3);
        assert_eq!(reorder_pages(&pdf, &[1, 2]).unwrap(), pdf);
        assert_eq!(reorder_pages(&pdf, &[1, 2, 2]).unwrap(), pdf);
        assert_eq!(reorder_pages(&pdf, &[1, 2, 4]).unwrap(), pdf);
    }

    #[test]
    fn test_rotate_page_sets_rotation() {
        let pdf = create_test_pdf(2);
        let result = rotate_page(&pdf, 2, 450).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let pages = doc.get_pages();
        let page_dict = doc
            .get_object(pages[&2])
            .unwrap()
            .as_dict()
            .unwrap()
            .clone();
        assert_eq!(page_dict.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
    }

    #[test]
    fn test_rotate_invalid_page_is_noop() {
        let pdf = create_test_pdf(2);
        assert_eq!(rotate_page(&pdf, 9, 90).unwrap(), pdf);
    }

    #[test]
    fn test_extract_page_range_any_order() {
        let pdf = create_test_pdf(5);
        let forward = extract_page_range(&pdf, 2, 4).unwrap();
        let backward = extract_page_range(&pdf, 4, 2).unwrap();

        assert_eq!(
            Document::load_mem(&forward).unwrap().get_pages().len(),
            3
        );
        assert_eq!(
            Document::load_mem(&backward).unwrap().get_pages().len(),
            3
        );
    }
}
