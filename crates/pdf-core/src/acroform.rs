//! Form-field extraction from a PDF's page/annotation graph
//!
//! Walks every page's `/Annots` array and recovers, for each widget that
//! carries a field name and field type, the field's rectangle converted into
//! top-left millimeter space.

use crate::coords::{PdfRect, US_LETTER_HEIGHT_PT, US_LETTER_WIDTH_PT};
use crate::document::{inherited_media_box, number, resolve};
use crate::{MmRect, PdfError, Result};
use lopdf::{Dictionary, Document, Object};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// `Ff` bit marking a button field as a radio group
const RADIO_FLAG: i64 = 1 << 15;

/// Parent chains deeper than this are treated as malformed
const MAX_FIELD_DEPTH: usize = 32;

/// Internal field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Checkbox,
    Radio,
    Select,
    Signature,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio",
            FieldKind::Select => "select",
            FieldKind::Signature => "signature",
        }
    }

    /// Parse a stored type name; unknown names read as text
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "checkbox" => FieldKind::Checkbox,
            "radio" => FieldKind::Radio,
            "select" => FieldKind::Select,
            "signature" => FieldKind::Signature,
            _ => FieldKind::Text,
        }
    }

    /// Whether values for this kind render as a fixed mark instead of text
    pub fn is_mark(&self) -> bool {
        matches!(self, FieldKind::Checkbox | FieldKind::Radio)
    }
}

/// Map a PDF field type code plus its `Ff` flags to a [`FieldKind`]
///
/// Accepts both the raw `FT` codes (`Tx`, `Btn`, `Ch`, `Sig`) and the long
/// names reported by field dump tools (`Text`, `Button`, `Choice`,
/// `Signature`).
pub fn map_field_type(code: &str, flags: i64) -> FieldKind {
    match code {
        "Tx" | "Text" => FieldKind::Text,
        "Btn" | "Button" if flags & RADIO_FLAG != 0 => FieldKind::Radio,
        "Btn" | "Button" => FieldKind::Checkbox,
        "Ch" | "Choice" => FieldKind::Select,
        "Sig" | "Signature" => FieldKind::Signature,
        _ => FieldKind::Text,
    }
}

/// Where a field sits, if known
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldLocation {
    /// Real rectangle recovered from the annotation
    Known { page: usize, rect: MmRect },
    /// Name-only source; needs a default or manual placement
    Unknown,
}

impl FieldLocation {
    pub fn is_known(&self) -> bool {
        matches!(self, FieldLocation::Known { .. })
    }
}

/// A form field recovered from a source document
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedField {
    pub name: String,
    pub kind: FieldKind,
    pub location: FieldLocation,
    /// Estimated from the field height, in points
    pub font_size: Option<f64>,
}

impl ExtractedField {
    /// A field known by name only
    pub fn unplaced(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            location: FieldLocation::Unknown,
            font_size: None,
        }
    }
}

/// Font size estimate: the field height in mm, truncated, clamped to 8..=12
pub fn estimate_font_size(height_mm: f64) -> f64 {
    height_mm.trunc().clamp(8.0, 12.0)
}

/// Extract every named, typed widget field from a loaded document
///
/// The first occurrence of a field name (in page order) wins.
pub fn extract_fields(doc: &Document) -> Result<BTreeMap<String, ExtractedField>> {
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(PdfError::Encrypted);
    }

    let mut fields = BTreeMap::new();

    for (page_number, page_id) in doc.get_pages() {
        let page_dict = doc
            .get_object(page_id)?
            .as_dict()
            .map_err(|_| PdfError::ParseError(format!("Page {page_number} is not a dictionary")))?;

        let page_box = inherited_media_box(doc, page_id)
            .and_then(|mb| PdfRect::from_values(&mb))
            .unwrap_or(PdfRect::new(0.0, 0.0, US_LETTER_WIDTH_PT, US_LETTER_HEIGHT_PT));

        let annots = match page_dict.get(b"Annots").ok().and_then(|o| resolve(doc, o)) {
            Some(Object::Array(items)) => items,
            _ => continue,
        };

        for item in annots {
            let Some(Object::Dictionary(annot)) = resolve(doc, item) else {
                continue;
            };
            let Some(field) = read_widget(doc, annot, page_number as usize, &page_box) else {
                continue;
            };
            debug!(
                field = %field.name,
                kind = field.kind.as_str(),
                page = page_number,
                "Extracted form field"
            );
            fields.entry(field.name.clone()).or_insert(field);
        }
    }

    Ok(fields)
}

/// Load a document from disk and extract its fields
pub fn extract_fields_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<BTreeMap<String, ExtractedField>> {
    let doc = Document::load(path).map_err(|e| PdfError::OpenError(e.to_string()))?;
    extract_fields(&doc)
}

/// Fault-tolerant front end for [`extract_fields`]
///
/// Malformed, encrypted or structurally incomplete inputs never raise past
/// this type: the failure is logged and an empty mapping is returned so the
/// caller can fall back to the next source of positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationParser;

impl AnnotationParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_path<P: AsRef<Path>>(&self, path: P) -> BTreeMap<String, ExtractedField> {
        let path = path.as_ref();
        match extract_fields_from_path(path) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Annotation parse failed");
                BTreeMap::new()
            }
        }
    }

    pub fn parse_bytes(&self, data: &[u8]) -> BTreeMap<String, ExtractedField> {
        let parsed = Document::load_mem(data)
            .map_err(|e| PdfError::OpenError(e.to_string()))
            .and_then(|doc| extract_fields(&doc));
        match parsed {
            Ok(fields) => fields,
            Err(e) => {
                warn!(error = %e, "Annotation parse failed");
                BTreeMap::new()
            }
        }
    }
}

/// Name, type and flags gathered from a widget and its parent fields
#[derive(Default)]
struct InheritedAttrs {
    name_parts: Vec<String>,
    field_type: Option<String>,
    flags: Option<i64>,
}

fn collect_inherited(doc: &Document, widget: &Dictionary) -> InheritedAttrs {
    let mut attrs = InheritedAttrs::default();
    let mut current = Some(widget);

    for _ in 0..MAX_FIELD_DEPTH {
        let Some(dict) = current else { break };

        if let Some(Object::String(bytes, _)) = dict.get(b"T").ok().and_then(|o| resolve(doc, o)) {
            attrs.name_parts.push(decode_text_string(bytes));
        }
        if attrs.field_type.is_none() {
            if let Some(Object::Name(ft)) = dict.get(b"FT").ok().and_then(|o| resolve(doc, o)) {
                attrs.field_type = Some(String::from_utf8_lossy(ft).into_owned());
            }
        }
        if attrs.flags.is_none() {
            if let Some(Object::Integer(ff)) = dict.get(b"Ff").ok().and_then(|o| resolve(doc, o)) {
                attrs.flags = Some(*ff);
            }
        }

        current = match dict.get(b"Parent").ok().and_then(|o| resolve(doc, o)) {
            Some(Object::Dictionary(parent)) => Some(parent),
            _ => None,
        };
    }

    // collected leaf-first; fully qualified names read root-first
    attrs.name_parts.reverse();
    attrs
}

fn read_widget(
    doc: &Document,
    annot: &Dictionary,
    page: usize,
    page_box: &PdfRect,
) -> Option<ExtractedField> {
    let attrs = collect_inherited(doc, annot);
    let field_type = attrs.field_type?;
    let name = attrs.name_parts.join(".");
    if name.is_empty() {
        return None;
    }
    let kind = map_field_type(&field_type, attrs.flags.unwrap_or(0));

    let rect = match annot.get(b"Rect").ok().and_then(|o| resolve(doc, o)) {
        Some(Object::Array(values)) => {
            let values: Vec<f64> = values.iter().filter_map(|v| number(doc, v)).collect();
            PdfRect::from_values(&values)
        }
        _ => None,
    };

    Some(match rect {
        Some(rect) => {
            let mm = rect.to_page_mm(page_box);
            ExtractedField {
                name,
                kind,
                location: FieldLocation::Known { page, rect: mm },
                font_size: Some(estimate_font_size(mm.height)),
            }
        }
        None => {
            debug!(field = %name, page, "Widget has no usable Rect");
            ExtractedField::unplaced(name, kind)
        }
    })
}

/// Decode a PDF text string: UTF-16BE with BOM, else single-byte
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}
