//! Document merge.
//!
//! Appends the pages of each document onto the first by importing every
//! object with an offset object id, then rebuilding the page tree.

use crate::error::PdfEditError;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Merge documents in order into one. A single input is returned as-is.
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfEditError> {
    if documents.is_empty() {
        return Err(PdfEditError::Operation("no documents to merge".into()));
    }

    if documents.len() == 1 {
        return Ok(documents.into_iter().next().unwrap());
    }

    let mut loaded = Vec::with_capacity(documents.len());
    for (index, bytes) in documents.iter().enumerate() {
        let doc = Document::load_mem(bytes).map_err(|e| {
            PdfEditError::Parse(format!("failed to load document {}: {}", index, e))
        })?;
        loaded.push(doc);
    }

    let mut dest = loaded.remove(0);
    let mut dest_max_id = dest.max_id;
    let mut dest_page_ids: Vec<ObjectId> = dest.get_pages().values().copied().collect();

    for source in loaded {
        let source_page_ids: Vec<ObjectId> = source.get_pages().values().copied().collect();
        let id_offset = dest_max_id;

        let mut remapped = BTreeMap::new();
        for (old_id, object) in source.objects.into_iter() {
            remapped.insert(
                (old_id.0 + id_offset, old_id.1),
                offset_object_refs(object, id_offset),
            );
        }
        dest.objects.extend(remapped);

        for old_page_id in source_page_ids {
            dest_page_ids.push((old_page_id.0 + id_offset, old_page_id.1));
        }

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    update_page_tree(&mut dest, dest_page_ids)?;
    dest.max_id = dest_max_id;
    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| PdfEditError::Operation(format!("failed to save merged PDF: {}", e)))?;
    Ok(buffer)
}

/// Recursively shift every object reference by an id offset.
fn offset_object_refs(object: Object, offset: u32) -> Object {
    match object {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(array) => Object::Array(
            array
                .into_iter()
                .map(|item| offset_object_refs(item, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = offset_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = offset_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the root Pages node at exactly these page ids, in order. Pages
/// are reparented onto the root node, pulling down any inheritable
/// attributes they relied on from intermediate nodes.
pub(crate) fn update_page_tree(
    doc: &mut Document,
    page_ids: Vec<ObjectId>,
) -> Result<(), PdfEditError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfEditError::Operation("no Root in trailer".into()))?;

    let pages_id = doc
        .objects
        .get(&catalog_id)
        .ok_or_else(|| PdfEditError::Operation("catalog not found".into()))?
        .as_dict()
        .map_err(|_| PdfEditError::Operation("invalid catalog".into()))?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|_| PdfEditError::Operation("no Pages in catalog".into()))?;

    for page_id in &page_ids {
        pull_down_inherited_attributes(doc, *page_id);

        if let Some(Object::Dictionary(page_dict)) = doc.objects.get_mut(page_id) {
            page_dict.set("Parent", Object::Reference(pages_id));
        }
    }

    let Some(Object::Dictionary(pages_dict)) = doc.objects.get_mut(&pages_id) else {
        return Err(PdfEditError::Operation("invalid pages dictionary".into()));
    };

    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", Object::Integer(page_ids.len() as i64));

    Ok(())
}

const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Copy attributes a page inherits through its parent chain onto the page
/// itself, so reparenting cannot lose them.
fn pull_down_inherited_attributes(doc: &mut Document, page_id: ObjectId) {
    for key in INHERITABLE_PAGE_KEYS {
        let already_present = doc
            .objects
            .get(&page_id)
            .and_then(|object| object.as_dict().ok())
            .map(|dict| dict.has(key))
            .unwrap_or(true);
        if already_present {
            continue;
        }

        if let Some(value) = inherited_attribute(doc, page_id, key) {
            if let Some(Object::Dictionary(page_dict)) = doc.objects.get_mut(&page_id) {
                page_dict.set(key, value);
            }
        }
    }
}

/// Walk the parent chain looking for an inheritable attribute.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    // Bounded walk in case of malformed parent cycles.
    for _ in 0..16 {
        let dict = doc.objects.get(&current)?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }

        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}
