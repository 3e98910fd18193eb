//! Resolved field positions

use pdf_core::{ExtractedField, FieldKind, FieldLocation, FontStyle, MmRect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where and how one field is drawn, in millimeters from the top-left corner
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPosition {
    pub field_key: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// 1-based page number
    pub page: usize,
    pub font_size: Option<f64>,
    pub font_style: FontStyle,
    pub kind: FieldKind,
}

impl FieldPosition {
    pub fn new(field_key: impl Into<String>, page: usize, rect: MmRect) -> Self {
        Self {
            field_key: field_key.into(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            page,
            font_size: None,
            font_style: FontStyle::Regular,
            kind: FieldKind::Text,
        }
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_font(mut self, size: f64, style: FontStyle) -> Self {
        self.font_size = Some(size);
        self.font_style = style;
        self
    }

    pub fn rect(&self) -> MmRect {
        MmRect::new(self.x, self.y, self.width, self.height)
    }

    /// Position of an extracted field, if its location is known
    pub fn from_extracted(key: impl Into<String>, field: &ExtractedField) -> Option<Self> {
        match field.location {
            FieldLocation::Known { page, rect } => Some(Self {
                font_size: field.font_size,
                kind: field.kind,
                ..Self::new(key, page, rect)
            }),
            FieldLocation::Unknown => None,
        }
    }
}

/// Stored form of a position: `{x, y, width, height, page, type, fontSize, fontStyle}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
}

fn default_page() -> usize {
    1
}

impl PositionRecord {
    pub fn into_position(self, key: impl Into<String>) -> FieldPosition {
        FieldPosition {
            field_key: key.into(),
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            page: self.page.max(1),
            font_size: self.font_size,
            font_style: self
                .font_style
                .as_deref()
                .map(FontStyle::from_code)
                .unwrap_or_default(),
            kind: self
                .field_type
                .as_deref()
                .map(FieldKind::parse)
                .unwrap_or(FieldKind::Text),
        }
    }
}

impl From<&FieldPosition> for PositionRecord {
    fn from(position: &FieldPosition) -> Self {
        let style = position.font_style.code();
        Self {
            x: position.x,
            y: position.y,
            width: position.width,
            height: position.height,
            page: position.page,
            field_type: Some(position.kind.as_str().to_string()),
            font_size: position.font_size,
            font_style: (!style.is_empty()).then(|| style.to_string()),
        }
    }
}

/// Field positions of one template, keyed by field key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSet {
    positions: BTreeMap<String, FieldPosition>,
}

impl PositionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a position under its own key, replacing any previous one
    pub fn insert(&mut self, position: FieldPosition) {
        self.positions.insert(position.field_key.clone(), position);
    }

    pub fn get(&self, key: &str) -> Option<&FieldPosition> {
        self.positions.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldPosition> {
        self.positions.values()
    }

    /// Overlay `other` onto this set key by key
    pub fn merge(&mut self, other: PositionSet) {
        self.positions.extend(other.positions);
    }

    /// Positions from their stored form
    pub fn from_records(records: BTreeMap<String, PositionRecord>) -> Self {
        let mut set = Self::new();
        for (key, record) in records {
            set.insert(record.into_position(key));
        }
        set
    }

    pub fn to_records(&self) -> BTreeMap<String, PositionRecord> {
        self.positions
            .iter()
            .map(|(key, position)| (key.clone(), PositionRecord::from(position)))
            .collect()
    }
}

impl FromIterator<FieldPosition> for PositionSet {
    fn from_iter<I: IntoIterator<Item = FieldPosition>>(iter: I) -> Self {
        let mut set = Self::new();
        for position in iter {
            set.insert(position);
        }
        set
    }
}
