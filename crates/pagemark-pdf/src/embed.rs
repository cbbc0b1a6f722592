//! Overlay raster embedding.
//!
//! The annotation overlay for a page arrives as a PNG captured in
//! unrotated scene-pixel space. It is decoded, written into the document
//! as a FlateDecode image XObject (with an SMask when the PNG has alpha),
//! and composited over the full page through a placement matrix that
//! undoes the page's display rotation so the overlay lands where the user
//! drew it.

use crate::error::PdfEditError;
use crate::rotation::normalize_rotation;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

struct DecodedPng {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// Placement matrix (`a b c d e f` for the `cm` operator) that maps the
/// image unit square onto a page of `width` x `height`, compensating for
/// the page's display rotation. The overlay was captured in the rotated
/// (displayed) orientation, so each case rotates it back into unrotated
/// page space.
pub fn overlay_matrix(rotation: i32, width: f64, height: f64) -> [f64; 6] {
    match normalize_rotation(rotation) {
        90 => [0.0, height, -width, 0.0, width, 0.0],
        180 => [-width, 0.0, 0.0, -height, width, height],
        270 => [0.0, -height, width, 0.0, 0.0, height],
        _ => [width, 0.0, 0.0, height, 0.0, 0.0],
    }
}

/// Composite a PNG overlay over a page's full media box.
pub fn embed_overlay(
    doc: &mut Document,
    page_id: ObjectId,
    png_bytes: &[u8],
    rotation: i32,
) -> Result<(), PdfEditError> {
    let image = decode_png(png_bytes)?;
    let image_id = add_image_xobject(doc, &image)?;
    let name = format!("PmOv{}", image_id.0);
    add_page_xobject(doc, page_id, &name, image_id)?;

    let media_box = page_media_box(doc, page_id);
    let width = media_box[2] - media_box[0];
    let height = media_box[3] - media_box[1];
    let mut matrix = overlay_matrix(rotation, width, height);
    matrix[4] += media_box[0];
    matrix[5] += media_box[1];

    let ops = format!(
        "q {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} cm /{} Do Q",
        matrix[0], matrix[1], matrix[2], matrix[3], matrix[4], matrix[5], name
    );
    append_page_content(doc, page_id, &ops)
}

fn decode_png(png_bytes: &[u8]) -> Result<DecodedPng, PdfEditError> {
    let mut decoder = png::Decoder::new(std::io::Cursor::new(png_bytes));
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .map_err(|e| PdfEditError::Operation(format!("invalid overlay PNG: {}", e)))?;

    let mut buffer = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buffer)
        .map_err(|e| PdfEditError::Operation(format!("failed to decode overlay PNG: {}", e)))?;
    let data = &buffer[..info.buffer_size()];

    let pixel_count = (info.width as usize) * (info.height as usize);
    let (rgb, alpha) = match info.color_type {
        png::ColorType::Rgb => (data.to_vec(), None),
        png::ColorType::Rgba => {
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            let mut alpha = Vec::with_capacity(pixel_count);
            for pixel in data.chunks_exact(4) {
                rgb.extend_from_slice(&pixel[..3]);
                alpha.push(pixel[3]);
            }
            (rgb, Some(alpha))
        }
        png::ColorType::Grayscale => {
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            for &gray in data {
                rgb.extend_from_slice(&[gray, gray, gray]);
            }
            (rgb, None)
        }
        png::ColorType::GrayscaleAlpha => {
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            let mut alpha = Vec::with_capacity(pixel_count);
            for pixel in data.chunks_exact(2) {
                rgb.extend_from_slice(&[pixel[0], pixel[0], pixel[0]]);
                alpha.push(pixel[1]);
            }
            (rgb, Some(alpha))
        }
        other => {
            return Err(PdfEditError::Operation(format!(
                "unsupported overlay color type: {:?}",
                other
            )));
        }
    };

    Ok(DecodedPng {
        width: info.width,
        height: info.height,
        rgb,
        alpha,
    })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfEditError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| PdfEditError::Operation(format!("failed to compress image data: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| PdfEditError::Operation(format!("failed to compress image data: {}", e)))
}

fn add_image_xobject(doc: &mut Document, image: &DecodedPng) -> Result<ObjectId, PdfEditError> {
    let smask_id = match &image.alpha {
        Some(alpha) => {
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(image.width as i64),
                    "Height" => Object::Integer(image.height as i64),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => "FlateDecode",
                },
                deflate(alpha)?,
            );
            Some(doc.add_object(stream))
        }
        None => None,
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => Object::Integer(image.width as i64),
        "Height" => Object::Integer(image.height as i64),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => Object::Integer(8),
        "Filter" => "FlateDecode",
    };
    if let Some(smask_id) = smask_id {
        dict.set("SMask", Object::Reference(smask_id));
    }

    Ok(doc.add_object(Stream::new(dict, deflate(&image.rgb)?)))
}

/// MediaBox for a page, inheriting from the parent chain, defaulting to
/// US Letter.
pub(crate) fn page_media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let mut current = page_id;
    for _ in 0..16 {
        let Some(dict) = doc.objects.get(&current).and_then(|o| o.as_dict().ok()) else {
            break;
        };

        if let Ok(media_box) = dict.get(b"MediaBox") {
            if let Some(parsed) = parse_box(doc, media_box) {
                return parsed;
            }
        }

        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => break,
        }
    }

    [0.0, 0.0, 612.0, 792.0]
}

fn parse_box(doc: &Document, object: &Object) -> Option<[f64; 4]> {
    let array = match object {
        Object::Reference(id) => doc.objects.get(id)?.as_array().ok()?,
        other => other.as_array().ok()?,
    };
    if array.len() != 4 {
        return None;
    }

    let mut result = [0.0; 4];
    for (i, value) in array.iter().enumerate() {
        result[i] = match value {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return None,
        };
    }
    Some(result)
}

/// Register an XObject under `name` in the page's resources, normalizing
/// referenced or inherited resource dictionaries inline first.
pub(crate) fn add_page_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobject_id: ObjectId,
) -> Result<(), PdfEditError> {
    ensure_inline_entry(doc, page_id, b"Resources")?;

    // Normalize a referenced /XObject sub-dictionary inline as well.
    let xobjects_ref = {
        let resources = page_entry_dict(doc, page_id, b"Resources")?;
        match resources.get(b"XObject") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };
    let cloned_xobjects = xobjects_ref.map(|id| {
        doc.objects
            .get(&id)
            .and_then(|object| object.as_dict().ok())
            .cloned()
            .unwrap_or_default()
    });

    let resources = page_entry_dict_mut(doc, page_id, b"Resources")?;
    if let Some(cloned) = cloned_xobjects {
        resources.set("XObject", Object::Dictionary(cloned));
    } else if resources.get(b"XObject").is_err() {
        resources.set("XObject", Object::Dictionary(Dictionary::new()));
    }

    match resources.get_mut(b"XObject") {
        Ok(Object::Dictionary(xobjects)) => {
            xobjects.set(name, Object::Reference(xobject_id));
            Ok(())
        }
        _ => Err(PdfEditError::Operation(
            "page resources have no XObject dictionary".into(),
        )),
    }
}

/// Make sure the page carries `key` as an inline dictionary, resolving a
/// reference or pulling the value down from the parent chain if needed.
fn ensure_inline_entry(
    doc: &mut Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<(), PdfEditError> {
    let current = {
        let page_dict = page_dict(doc, page_id)?;
        match page_dict.get(key) {
            Ok(Object::Reference(id)) => Some(*id),
            Ok(_) => return Ok(()),
            Err(_) => None,
        }
    };

    let resolved = match current {
        Some(id) => doc
            .objects
            .get(&id)
            .and_then(|object| object.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        None => match inherited_dict(doc, page_id, key) {
            Some(dict) => dict,
            None => Dictionary::new(),
        },
    };

    let page_dict = page_dict_mut(doc, page_id)?;
    page_dict.set(key, Object::Dictionary(resolved));
    Ok(())
}

fn inherited_dict(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Dictionary> {
    let mut current = page_id;
    for _ in 0..16 {
        let dict = doc.objects.get(&current)?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => {
                    doc.objects.get(id)?.as_dict().ok().cloned()
                }
                Object::Dictionary(inline) => Some(inline.clone()),
                _ => None,
            };
        }

        current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

fn page_dict(doc: &Document, page_id: ObjectId) -> Result<&Dictionary, PdfEditError> {
    doc.objects
        .get(&page_id)
        .ok_or_else(|| PdfEditError::Operation("page object not found".into()))?
        .as_dict()
        .map_err(|e| PdfEditError::Operation(e.to_string()))
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, PdfEditError> {
    doc.objects
        .get_mut(&page_id)
        .ok_or_else(|| PdfEditError::Operation("page object not found".into()))?
        .as_dict_mut()
        .map_err(|e| PdfEditError::Operation(e.to_string()))
}

fn page_entry_dict<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<&'a Dictionary, PdfEditError> {
    match page_dict(doc, page_id)?.get(key) {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        _ => Err(PdfEditError::Operation(format!(
            "page has no inline {} dictionary",
            String::from_utf8_lossy(key)
        ))),
    }
}

fn page_entry_dict_mut<'a>(
    doc: &'a mut Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<&'a mut Dictionary, PdfEditError> {
    match page_dict_mut(doc, page_id)?.get_mut(key) {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        _ => Err(PdfEditError::Operation(format!(
            "page has no inline {} dictionary",
            String::from_utf8_lossy(key)
        ))),
    }
}

/// Append drawing operators after the page's existing content, isolating
/// the original graphics state with a q/Q pair.
pub(crate) fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    ops: &str,
) -> Result<(), PdfEditError> {
    let existing = doc.get_page_content(page_id).unwrap_or_default();

    let mut combined = Vec::with_capacity(existing.len() + ops.len() + 8);
    combined.extend_from_slice(b"q\n");
    combined.extend_from_slice(&existing);
    combined.extend_from_slice(b"\nQ\n");
    combined.extend_from_slice(ops.as_bytes());
    combined.push(b'\n');

    let content_id = doc.add_object(Stream::new(Dictionary::new(), combined));
    let page_dict = page_dict_mut(doc, page_id)?;
    page_dict.set("Contents", Object::Reference(content_id));
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    /// Encode a tiny RGBA PNG for embedding tests.
    pub fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            let pixels = vec![0x7Fu8; (width * height * 4) as usize];
            writer.write_image_data(&pixels).unwrap();
        }
        bytes
    }
}
