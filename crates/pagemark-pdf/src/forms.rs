//! AcroForm value application and flattening.
//!
//! Collected form values (page + field name -> value) are written into the
//! document's field dictionaries by field kind; flattening stamps each
//! widget's normal appearance into the page content and strips the
//! interactive form.

use crate::embed::{add_page_xobject, append_page_content};
use crate::error::PdfEditError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Radio-button field flag (PDF 32000-1, table 226).
const FF_RADIO: i64 = 1 << 15;

/// A captured form field value: free text or a checkbox state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Checked(bool),
    Text(String),
}

impl FieldValue {
    fn as_text(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Checked(checked) => checked.to_string(),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            FieldValue::Checked(checked) => *checked,
            FieldValue::Text(text) => !text.is_empty(),
        }
    }

    fn radio_export(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Checked(true) => "On".to_string(),
            FieldValue::Checked(false) => "Off".to_string(),
        }
    }
}

/// Form values keyed by page number and field name. Independent of the
/// canvas scenes: form edits are not part of undo/redo history, and the
/// store is cleared when a new document session begins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    values: BTreeMap<u32, BTreeMap<String, FieldValue>>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_field(&mut self, page_number: u32, field_name: &str, value: FieldValue) {
        self.values
            .entry(page_number)
            .or_default()
            .insert(field_name.to_string(), value);
    }

    pub fn field(&self, page_number: u32, field_name: &str) -> Option<&FieldValue> {
        self.values.get(&page_number)?.get(field_name)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(|fields| fields.is_empty())
    }

    pub fn entries(&self) -> impl Iterator<Item = (u32, &str, &FieldValue)> {
        self.values.iter().flat_map(|(page, fields)| {
            fields
                .iter()
                .map(move |(name, value)| (*page, name.as_str(), value))
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Write every captured value into its form field, by field kind: text
/// fields get the raw string, checkboxes toggle their on-state, choice
/// fields select by value, radio groups select by export value. Unknown
/// field names are skipped.
pub fn apply_form_values(doc: &mut Document, form: &FormState) -> Result<(), PdfEditError> {
    if form.is_empty() {
        return Ok(());
    }

    let field_ids = collect_form_fields(doc);
    if field_ids.is_empty() {
        return Ok(());
    }

    for (_, field_name, value) in form.entries() {
        let Some(field_id) = find_field_by_name(doc, &field_ids, field_name) else {
            tracing::debug!(field_name, "form value targets unknown field");
            continue;
        };
        apply_value_to_field(doc, field_id, value);
    }

    set_need_appearances(doc);
    Ok(())
}

/// Bake widget appearances into static page content and remove the
/// interactive form. Widgets without a usable appearance stream are
/// dropped without stamping.
pub fn flatten_form(doc: &mut Document) -> Result<(), PdfEditError> {
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in pages {
        flatten_page_widgets(doc, page_id)?;
    }

    if let Some(catalog_id) = catalog_id(doc) {
        if let Some(Object::Dictionary(catalog)) = doc.objects.get_mut(&catalog_id) {
            catalog.remove(b"AcroForm");
        }
    }

    Ok(())
}

fn flatten_page_widgets(doc: &mut Document, page_id: ObjectId) -> Result<(), PdfEditError> {
    let annot_ids: Vec<ObjectId> = {
        let Some(page_dict) = doc.objects.get(&page_id).and_then(|o| o.as_dict().ok()) else {
            return Ok(());
        };
        let Ok(annots) = page_dict.get(b"Annots") else {
            return Ok(());
        };
        match resolve_array(doc, annots) {
            Some(array) => array
                .iter()
                .filter_map(|item| item.as_reference().ok())
                .collect(),
            None => return Ok(()),
        }
    };

    if annot_ids.is_empty() {
        return Ok(());
    }

    let mut kept = Vec::new();
    let mut ops = String::new();
    for annot_id in annot_ids {
        let is_widget = doc
            .objects
            .get(&annot_id)
            .and_then(|o| o.as_dict().ok())
            .map(|dict| matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Widget"))
            .unwrap_or(false);

        if !is_widget {
            kept.push(Object::Reference(annot_id));
            continue;
        }

        if let Some(op) = stamp_widget(doc, page_id, annot_id)? {
            ops.push_str(&op);
            ops.push('\n');
        }
    }

    if let Some(Object::Dictionary(page_dict)) = doc.objects.get_mut(&page_id) {
        page_dict.set("Annots", Object::Array(kept));
    }

    if !ops.is_empty() {
        append_page_content(doc, page_id, ops.trim_end())?;
    }

    Ok(())
}

/// Stamp one widget's normal appearance onto the page, mapping the
/// appearance BBox onto the widget Rect.
fn stamp_widget(
    doc: &mut Document,
    page_id: ObjectId,
    widget_id: ObjectId,
) -> Result<Option<String>, PdfEditError> {
    let (rect, stream_id) = {
        let Some(widget) = doc.objects.get(&widget_id).and_then(|o| o.as_dict().ok()) else {
            return Ok(None);
        };
        let Some(rect) = widget_rect(widget) else {
            return Ok(None);
        };
        let Some(stream_id) = appearance_stream_id(doc, widget) else {
            return Ok(None);
        };
        (rect, stream_id)
    };

    let bbox = {
        let Some(Object::Stream(stream)) = doc.objects.get(&stream_id) else {
            return Ok(None);
        };
        match stream.dict.get(b"BBox").ok().and_then(|b| box_values(b)) {
            Some(bbox) => bbox,
            None => [0.0, 0.0, rect[2] - rect[0], rect[3] - rect[1]],
        }
    };

    // Appearance streams must be form XObjects once referenced from page
    // resources.
    if let Some(Object::Stream(stream)) = doc.objects.get_mut(&stream_id) {
        if stream.dict.get(b"Type").is_err() {
            stream.dict.set("Type", Object::Name(b"XObject".to_vec()));
        }
        if stream.dict.get(b"Subtype").is_err() {
            stream.dict.set("Subtype", Object::Name(b"Form".to_vec()));
        }
    }

    let bbox_width = bbox[2] - bbox[0];
    let bbox_height = bbox[3] - bbox[1];
    let scale_x = if bbox_width > 0.0 {
        (rect[2] - rect[0]) / bbox_width
    } else {
        1.0
    };
    let scale_y = if bbox_height > 0.0 {
        (rect[3] - rect[1]) / bbox_height
    } else {
        1.0
    };
    let tx = rect[0] - bbox[0] * scale_x;
    let ty = rect[1] - bbox[1] * scale_y;

    let name = format!("PmFw{}", stream_id.0);
    add_page_xobject(doc, page_id, &name, stream_id)?;

    Ok(Some(format!(
        "q {:.4} 0 0 {:.4} {:.4} {:.4} cm /{} Do Q",
        scale_x, scale_y, tx, ty, name
    )))
}

fn apply_value_to_field(doc: &mut Document, field_id: ObjectId, value: &FieldValue) {
    let Some(field_type) = field_attr(doc, field_id, b"FT").and_then(|o| match o {
        Object::Name(name) => Some(name),
        _ => None,
    }) else {
        return;
    };

    match field_type.as_slice() {
        b"Tx" => set_field_entry(doc, field_id, "V", Object::string_literal(value.as_text())),
        b"Ch" => set_field_entry(doc, field_id, "V", Object::string_literal(value.as_text())),
        b"Btn" => {
            let flags = field_attr(doc, field_id, b"Ff")
                .and_then(|o| o.as_i64().ok())
                .unwrap_or(0);
            if flags & FF_RADIO != 0 {
                select_button_state(doc, field_id, &value.radio_export());
            } else {
                let on_state = checkbox_on_state(doc, field_id);
                let state = if value.truthy() { on_state } else { "Off".into() };
                select_button_state(doc, field_id, &state);
            }
        }
        other => {
            tracing::debug!(
                field_type = %String::from_utf8_lossy(other),
                "skipping unsupported field type"
            );
        }
    }
}

/// Set a button field's value and each widget's appearance state, falling
/// back to Off for widgets that have no matching appearance.
fn select_button_state(doc: &mut Document, field_id: ObjectId, state: &str) {
    set_field_entry(doc, field_id, "V", Object::Name(state.as_bytes().to_vec()));

    for widget_id in field_widget_ids(doc, field_id) {
        let has_state = appearance_states(doc, widget_id)
            .iter()
            .any(|candidate| candidate.as_slice() == state.as_bytes());
        let applied = if has_state { state } else { "Off" };
        set_field_entry(doc, widget_id, "AS", Object::Name(applied.as_bytes().to_vec()));
    }
}

/// The non-Off appearance state a checkbox toggles to, defaulting to Yes.
fn checkbox_on_state(doc: &Document, field_id: ObjectId) -> String {
    for widget_id in field_widget_ids(doc, field_id) {
        for state in appearance_states(doc, widget_id) {
            if state != b"Off" {
                return String::from_utf8_lossy(&state).to_string();
            }
        }
    }
    "Yes".to_string()
}

fn field_widget_ids(doc: &Document, field_id: ObjectId) -> Vec<ObjectId> {
    let kids = doc
        .objects
        .get(&field_id)
        .and_then(|o| o.as_dict().ok())
        .and_then(|dict| dict.get(b"Kids").ok())
        .and_then(|kids| resolve_array(doc, kids));

    match kids {
        Some(array) if !array.is_empty() => array
            .iter()
            .filter_map(|item| item.as_reference().ok())
            .collect(),
        // Merged field/widget dictionary.
        _ => vec![field_id],
    }
}

fn appearance_states(doc: &Document, widget_id: ObjectId) -> Vec<Vec<u8>> {
    let Some(widget) = doc.objects.get(&widget_id).and_then(|o| o.as_dict().ok()) else {
        return Vec::new();
    };
    let Some(normal) = widget
        .get(b"AP")
        .ok()
        .and_then(|ap| resolve_dict(doc, ap))
        .and_then(|ap| ap.get(b"N").ok().cloned())
    else {
        return Vec::new();
    };

    match resolve_dict(doc, &normal) {
        Some(states) => states.iter().map(|(key, _)| key.to_vec()).collect(),
        None => Vec::new(),
    }
}

/// The widget's normal appearance stream: either a direct stream or a
/// state dictionary resolved through /AS.
fn appearance_stream_id(doc: &Document, widget: &Dictionary) -> Option<ObjectId> {
    let normal = resolve_dict_entry(doc, widget, b"AP")?.get(b"N").ok()?.clone();

    match &normal {
        Object::Reference(id) => match doc.objects.get(id)? {
            Object::Stream(_) => Some(*id),
            Object::Dictionary(states) => {
                let state = widget
                    .get(b"AS")
                    .ok()
                    .and_then(|o| match o {
                        Object::Name(name) => Some(name.clone()),
                        _ => None,
                    })
                    .unwrap_or_else(|| b"Off".to_vec());
                states.get(&state).ok()?.as_reference().ok()
            }
            _ => None,
        },
        Object::Dictionary(states) => {
            let state = widget
                .get(b"AS")
                .ok()
                .and_then(|o| match o {
                    Object::Name(name) => Some(name.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| b"Off".to_vec());
            states.get(&state).ok()?.as_reference().ok()
        }
        _ => None,
    }
}

fn widget_rect(widget: &Dictionary) -> Option<[f64; 4]> {
    let rect = widget.get(b"Rect").ok().and_then(box_values)?;
    Some([
        rect[0].min(rect[2]),
        rect[1].min(rect[3]),
        rect[0].max(rect[2]),
        rect[1].max(rect[3]),
    ])
}

fn box_values(object: &Object) -> Option<[f64; 4]> {
    let array = object.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let mut values = [0.0; 4];
    for (i, item) in array.iter().enumerate() {
        values[i] = match item {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return None,
        };
    }
    Some(values)
}

/// Named field nodes of the form, depth first.
fn collect_form_fields(doc: &Document) -> Vec<ObjectId> {
    let Some(acroform) = acroform_dict(doc) else {
        return Vec::new();
    };
    let Some(roots) = acroform
        .get(b"Fields")
        .ok()
        .and_then(|fields| resolve_array(doc, fields))
    else {
        return Vec::new();
    };

    let mut fields = Vec::new();
    let mut pending: Vec<ObjectId> = roots
        .iter()
        .filter_map(|item| item.as_reference().ok())
        .collect();

    while let Some(field_id) = pending.pop() {
        let Some(dict) = doc.objects.get(&field_id).and_then(|o| o.as_dict().ok()) else {
            continue;
        };

        if dict.has(b"T") {
            fields.push(field_id);
        }

        if let Some(kids) = dict.get(b"Kids").ok().and_then(|kids| resolve_array(doc, kids)) {
            pending.extend(kids.iter().filter_map(|item| item.as_reference().ok()));
        }
    }

    fields
}

fn find_field_by_name(doc: &Document, field_ids: &[ObjectId], name: &str) -> Option<ObjectId> {
    field_ids.iter().copied().find(|field_id| {
        doc.objects
            .get(field_id)
            .and_then(|o| o.as_dict().ok())
            .and_then(|dict| dict.get(b"T").ok())
            .map(|title| matches!(title, Object::String(bytes, _) if bytes.as_slice() == name.as_bytes()))
            .unwrap_or(false)
    })
}

/// Read a field attribute, following the /Parent chain (FT and Ff are
/// inheritable).
fn field_attr(doc: &Document, field_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = field_id;
    for _ in 0..16 {
        let dict = doc.objects.get(&current)?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

fn set_field_entry(doc: &mut Document, field_id: ObjectId, key: &str, value: Object) {
    if let Some(Object::Dictionary(dict)) = doc.objects.get_mut(&field_id) {
        dict.set(key, value);
    }
}

fn catalog_id(doc: &Document) -> Option<ObjectId> {
    doc.trailer.get(b"Root").and_then(Object::as_reference).ok()
}

fn acroform_dict(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.objects.get(&catalog_id(doc)?)?.as_dict().ok()?;
    resolve_dict_entry(doc, catalog, b"AcroForm")
}

/// Viewers regenerate field appearances after value changes.
fn set_need_appearances(doc: &mut Document) {
    let Some(catalog_id) = catalog_id(doc) else {
        return;
    };

    let acroform_ref = doc
        .objects
        .get(&catalog_id)
        .and_then(|o| o.as_dict().ok())
        .and_then(|catalog| match catalog.get(b"AcroForm") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        });

    match acroform_ref {
        Some(id) => {
            if let Some(Object::Dictionary(acroform)) = doc.objects.get_mut(&id) {
                acroform.set("NeedAppearances", Object::Boolean(true));
            }
        }
        None => {
            if let Some(Object::Dictionary(catalog)) = doc.objects.get_mut(&catalog_id) {
                if let Ok(Object::Dictionary(acroform)) = catalog.get_mut(b"AcroForm") {
                    acroform.set("NeedAppearances", Object::Boolean(true));
                }
            }
        }
    }
}

fn resolve_array<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Vec<Object>> {
    match object {
        Object::Array(array) => Some(array),
        Object::Reference(id) => doc.objects.get(id)?.as_array().ok(),
        _ => None,
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match object {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.objects.get(id)?.as_dict().ok(),
        _ => None,
    }
}

fn resolve_dict_entry<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    resolve_dict(doc, dict.get(key).ok()?)
}


#[cfg(test)]
mod tests {
    use super::test_support::create_form_pdf;
    use super::*;

    fn field_by_name(doc: &Document, name: &str) -> Dictionary {
        let ids = collect_form_fields(doc);
        let id = find_field_by_name(doc, &ids, name).expect("field");
        doc.objects.get(&id).unwrap().as_dict().unwrap().clone()
    }

    #[test]
    fn test_form_state_round_trip() {
        let mut form = FormState::new();
        assert!(form.is_empty());

        form.set_field(1, "applicant", FieldValue::Text("Ada".into()));
        form.set_field(2, "agree", FieldValue::Checked(true));
        assert_eq!(
            form.field(1, "applicant"),
            Some(&FieldValue::Text("Ada".into()))
        );
        assert_eq!(form.entries().count(), 2);

        form.clear();
        assert!(form.is_empty());
    }

    #[test]
    fn test_form_state_json_round_trip() {
        let mut form = FormState::new();
        form.set_field(1, "applicant", FieldValue::Text("Ada".into()));
        form.set_field(3, "agree", FieldValue::Checked(true));

        let json = form.to_json().unwrap();
        let restored = FormState::from_json(&json).unwrap();
        assert_eq!(form, restored);
    }

    #[test]
    fn test_apply_text_field_value() {
        let pdf = create_form_pdf();
        let mut doc = Document::load_mem(&pdf).unwrap();

        let mut form = FormState::new();
        form.set_field(1, "applicant", FieldValue::Text("Ada Lovelace".into()));
        apply_form_values(&mut doc, &form).unwrap();

        let field = field_by_name(&doc, "applicant");
        assert!(matches!(
            field.get(b"V"),
            Ok(Object::String(bytes, _)) if bytes.as_slice() == b"Ada Lovelace"
        ));
    }

    #[test]
    fn test_apply_checkbox_sets_on_state() {
        let pdf = create_form_pdf();
        let mut doc = Document::load_mem(&pdf).unwrap();

        let mut form = FormState::new();
        form.set_field(1, "agree", FieldValue::Checked(true));
        apply_form_values(&mut doc, &form).unwrap();

        let field = field_by_name(&doc, "agree");
        assert!(matches!(field.get(b"V"), Ok(Object::Name(name)) if name == b"Yes"));
        assert!(matches!(field.get(b"AS"), Ok(Object::Name(name)) if name == b"Yes"));
    }

    #[test]
    fn test_apply_checkbox_unchecked_sets_off() {
        let pdf = create_form_pdf();
        let mut doc = Document::load_mem(&pdf).unwrap();

        let mut form = FormState::new();
        form.set_field(1, "agree", FieldValue::Checked(false));
        apply_form_values(&mut doc, &form).unwrap();

        let field = field_by_name(&doc, "agree");
        assert!(matches!(field.get(b"V"), Ok(Object::Name(name)) if name == b"Off"));
    }

    #[test]
    fn test_apply_unknown_field_is_skipped() {
        let pdf = create_form_pdf();
        let mut doc = Document::load_mem(&pdf).unwrap();

        let mut form = FormState::new();
        form.set_field(1, "missing", FieldValue::Text("x".into()));
        apply_form_values(&mut doc, &form).unwrap();
    }

    #[test]
    fn test_flatten_removes_widgets_and_acroform() {
        let pdf = create_form_pdf();
        let mut doc = Document::load_mem(&pdf).unwrap();

        let mut form = FormState::new();
        form.set_field(1, "agree", FieldValue::Checked(true));
        apply_form_values(&mut doc, &form).unwrap();
        flatten_form(&mut doc).unwrap();

        let catalog = doc
            .objects
            .get(&catalog_id(&doc).unwrap())
            .unwrap()
            .as_dict()
            .unwrap();
        assert!(catalog.get(b"AcroForm").is_err());

        let page_id = doc.get_pages()[&1];
        let page_dict = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let annots = page_dict.get(b"Annots").unwrap().as_array().unwrap();
        // Only the non-widget annotation survives.
        assert_eq!(annots.len(), 1);

        // The checked checkbox appearance was stamped into the content.
        let content = doc.get_page_content(page_id).unwrap();
        let content = String::from_utf8_lossy(&content);
        assert!(content.contains("Do"));
    }

    #[test]
    fn test_flatten_document_still_saves() {
        let pdf = create_form_pdf();
        let mut doc = Document::load_mem(&pdf).unwrap();
        flatten_form(&mut doc).unwrap();

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        assert!(Document::load_mem(&buffer).is_ok());
    }
}
