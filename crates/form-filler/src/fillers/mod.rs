//! Field Filler Registry
//!
//! Each section filler owns a fixed set of field keys. The registry checks at
//! construction that no key is owned twice, then draws every section onto a
//! page in registration order. Template fields no section owns go to a
//! per-template [`Section::General`] filler.

mod sections;

use crate::catalog::{has_value, is_truthy, value_to_string, FieldValues, TemplateDescriptor};
use crate::position::{FieldPosition, PositionSet};
use crate::{FillError, Result};
use pdf_core::{FontSpec, FontStyle, PageCanvas, TextAlign};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Glyph drawn for a ticked checkbox
pub const CHECK_GLYPH: &str = "X";

/// Form sections with a filler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Attorney,
    Court,
    Party,
    Marriage,
    Relief,
    Children,
    Signature,
    /// Whatever a template carries beyond the standard sections
    General,
}

impl Section {
    /// Standard registration order
    pub const ALL: [Section; 7] = [
        Section::Attorney,
        Section::Court,
        Section::Party,
        Section::Marriage,
        Section::Relief,
        Section::Children,
        Section::Signature,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Section::Attorney => "attorney",
            Section::Court => "court",
            Section::Party => "party",
            Section::Marriage => "marriage",
            Section::Relief => "relief",
            Section::Children => "children",
            Section::Signature => "signature",
            Section::General => "general",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a field's value is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRender {
    /// The literal value
    Text(TextAlign),
    /// [`CHECK_GLYPH`], centered, whenever the value is truthy
    Checkbox,
}

/// A field key owned by a filler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: Cow<'static, str>,
    pub render: FieldRender,
}

impl FieldSpec {
    pub fn text(key: impl Into<Cow<'static, str>>, align: TextAlign) -> Self {
        Self {
            key: key.into(),
            render: FieldRender::Text(align),
        }
    }

    pub fn checkbox(key: impl Into<Cow<'static, str>>) -> Self {
        Self {
            key: key.into(),
            render: FieldRender::Checkbox,
        }
    }

    /// Rendering for a template field type
    pub fn for_field_type(key: impl Into<Cow<'static, str>>, field_type: &str) -> Self {
        if field_type.eq_ignore_ascii_case("checkbox") {
            Self::checkbox(key)
        } else {
            Self::text(key, TextAlign::Left)
        }
    }

    /// The text to draw for `value`, if any
    fn content(&self, value: &serde_json::Value) -> Option<String> {
        match self.render {
            FieldRender::Checkbox => is_truthy(value).then(|| CHECK_GLYPH.to_string()),
            FieldRender::Text(_) => has_value(value).then(|| value_to_string(value)),
        }
    }

    fn align(&self) -> TextAlign {
        match self.render {
            FieldRender::Text(align) => align,
            FieldRender::Checkbox => TextAlign::Center,
        }
    }

    /// Checkbox glyphs are always set in the regular face
    fn style(&self, position: &FieldPosition) -> FontStyle {
        match self.render {
            FieldRender::Text(_) => position.font_style,
            FieldRender::Checkbox => FontStyle::Regular,
        }
    }
}

/// One section's drawing module
#[derive(Debug, Clone)]
pub struct Filler {
    section: Section,
    fields: Vec<FieldSpec>,
}

impl Filler {
    /// Filler for `section` with an explicit field set
    pub fn new(section: Section, fields: Vec<FieldSpec>) -> Self {
        Self { section, fields }
    }

    /// Filler for `section` with its standard field set
    pub fn standard(section: Section) -> Self {
        Self::new(section, sections::standard_fields(section).to_vec())
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn handles(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.key == key)
    }

    /// Draw this section's fields that belong on the canvas page
    ///
    /// Returns the number of fields drawn. Fields without a value, without a
    /// position, or positioned off the page are skipped.
    pub fn draw(
        &self,
        canvas: &mut PageCanvas,
        values: &FieldValues,
        positions: &PositionSet,
        default_font_size: f64,
    ) -> usize {
        let page = canvas.page_number();
        let (page_width, page_height) = canvas.page_size_mm();
        let mut drawn = 0;

        for field in &self.fields {
            let Some(position) = positions.get(&field.key) else {
                continue;
            };
            if position.page != page {
                continue;
            }
            let Some(content) = values.get(&*field.key).and_then(|v| field.content(v)) else {
                continue;
            };
            if !position.rect().fits_within(page_width, page_height) {
                warn!(
                    section = %self.section,
                    field = %field.key,
                    page,
                    x = position.x,
                    y = position.y,
                    "Position lies outside the page, skipping"
                );
                continue;
            }

            draw_field(canvas, position, field, &content, default_font_size);
            debug!(
                section = %self.section,
                field = %field.key,
                page,
                x = position.x,
                y = position.y,
                "Drew field"
            );
            drawn += 1;
        }

        drawn
    }
}

fn draw_field(
    canvas: &mut PageCanvas,
    position: &FieldPosition,
    field: &FieldSpec,
    content: &str,
    default_font_size: f64,
) {
    let size = position
        .font_size
        .filter(|s| *s > 0.0)
        .unwrap_or(default_font_size);
    canvas.set_font(FontSpec::new(field.style(position), size));
    canvas.cell(
        position.x,
        position.y,
        position.width,
        position.height,
        content,
        field.align(),
    );
}

/// Ordered set of fillers with disjoint field keys
#[derive(Debug, Clone)]
pub struct FillerRegistry {
    fillers: Vec<Filler>,
}

impl FillerRegistry {
    /// Register `fillers` in order, rejecting any key claimed twice
    pub fn new(fillers: Vec<Filler>) -> Result<Self> {
        {
            let mut owners: BTreeMap<&str, Section> = BTreeMap::new();
            for filler in &fillers {
                for field in &filler.fields {
                    if let Some(first) = owners.insert(&*field.key, filler.section) {
                        return Err(FillError::OverlappingFillers {
                            key: field.key.to_string(),
                            first,
                            second: filler.section,
                        });
                    }
                }
            }
        }
        Ok(Self { fillers })
    }

    /// Every standard section in standard order
    pub fn standard() -> Result<Self> {
        Self::new(Section::ALL.iter().map(|s| Filler::standard(*s)).collect())
    }

    /// This registry plus a [`Section::General`] filler for everything the
    /// sections do not own: the template's remaining fields, typed by the
    /// catalog, then any other supplied key as plain text
    pub fn for_template(
        &self,
        template: &TemplateDescriptor,
        values: &FieldValues,
    ) -> Result<Self> {
        let mut general: Vec<FieldSpec> = Vec::new();
        for field in &template.fields {
            if self.owner(&field.key).is_none() && !general.iter().any(|g| g.key == field.key) {
                general.push(FieldSpec::for_field_type(field.key.clone(), &field.field_type));
            }
        }
        for key in values.keys() {
            if self.owner(key).is_none() && !general.iter().any(|g| g.key == key.as_str()) {
                general.push(FieldSpec::text(key.clone(), TextAlign::Left));
            }
        }
        if general.is_empty() {
            return Ok(self.clone());
        }

        debug!(template = %template.id, fields = general.len(), "General filler");
        let mut fillers = self.fillers.clone();
        fillers.push(Filler::new(Section::General, general));
        Self::new(fillers)
    }

    pub fn fillers(&self) -> &[Filler] {
        &self.fillers
    }

    /// Section owning `key`
    pub fn owner(&self, key: &str) -> Option<Section> {
        self.fillers
            .iter()
            .find(|f| f.handles(key))
            .map(|f| f.section)
    }

    /// Keys with a drawable value but no resolved position
    pub fn missing_positions<'a>(
        &'a self,
        values: &FieldValues,
        positions: &PositionSet,
    ) -> Vec<&'a str> {
        self.fillers
            .iter()
            .flat_map(|f| f.fields.iter())
            .filter(|field| {
                values
                    .get(&*field.key)
                    .is_some_and(|v| field.content(v).is_some())
            })
            .filter(|field| !positions.contains(&field.key))
            .map(|field| &*field.key)
            .collect()
    }

    /// Draw every section onto one page; returns the number of fields drawn
    pub fn draw_page(
        &self,
        canvas: &mut PageCanvas,
        values: &FieldValues,
        positions: &PositionSet,
        default_font_size: f64,
    ) -> usize {
        self.fillers
            .iter()
            .map(|f| f.draw(canvas, values, positions, default_font_size))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_core::{Backdrop, MmRect, OverlayDocument};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn values(pairs: &[(&str, serde_json::Value)]) -> FieldValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn canvas(doc: &mut OverlayDocument, page: usize) -> PageCanvas {
        let imported = doc.import_page(page).unwrap();
        doc.stamp(imported, Backdrop::SourcePage).unwrap()
    }

    #[test]
    fn test_standard_registry_is_disjoint() {
        let registry = FillerRegistry::standard().unwrap();
        assert_eq!(registry.fillers().len(), 7);
        assert_eq!(registry.owner("additional_info"), Some(Section::Court));
        assert_eq!(registry.owner("signature_date"), Some(Section::Signature));
        assert_eq!(registry.owner("unknown"), None);
    }

    #[test]
    fn test_overlap_rejected() {
        let err = FillerRegistry::new(vec![
            Filler::standard(Section::Court),
            Filler::new(
                Section::Signature,
                vec![FieldSpec::text("additional_info", TextAlign::Left)],
            ),
        ])
        .unwrap_err();

        match err {
            FillError::OverlappingFillers { key, first, second } => {
                assert_eq!(key, "additional_info");
                assert_eq!(first, Section::Court);
                assert_eq!(second, Section::Signature);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_checkbox_draws_single_glyph() {
        let mut doc = OverlayDocument::blank(1);
        let mut page = canvas(&mut doc, 1);
        let positions: PositionSet =
            [FieldPosition::new("has_children", 1, MmRect::new(30.0, 40.0, 5.0, 5.0))]
                .into_iter()
                .collect();

        let filler = Filler::standard(Section::Children);
        let drawn = filler.draw(
            &mut page,
            &values(&[("has_children", json!("Yes, two of them"))]),
            &positions,
            9.0,
        );
        assert_eq!(drawn, 1);
        assert_eq!(page.text_runs().len(), 1);
        assert_eq!(page.text_runs()[0].text, CHECK_GLYPH);
    }

    #[test]
    fn test_checkbox_glyph_ignores_bold_position() {
        let mut doc = OverlayDocument::blank(1);
        let mut page = canvas(&mut doc, 1);
        let positions: PositionSet = [
            FieldPosition::new("spousal_support", 1, MmRect::new(30.0, 40.0, 5.0, 5.0))
                .with_font(10.0, pdf_core::FontStyle::Bold),
        ]
        .into_iter()
        .collect();

        Filler::standard(Section::Relief).draw(
            &mut page,
            &values(&[("spousal_support", json!(true))]),
            &positions,
            9.0,
        );
        let runs = page.text_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].font.style, pdf_core::FontStyle::Regular);
        assert_eq!(runs[0].font.size, 10.0);
    }

    #[test]
    fn test_falsy_checkbox_draws_nothing() {
        let mut doc = OverlayDocument::blank(1);
        let mut page = canvas(&mut doc, 1);
        let positions: PositionSet =
            [FieldPosition::new("has_children", 1, MmRect::new(30.0, 40.0, 5.0, 5.0))]
                .into_iter()
                .collect();

        let filler = Filler::standard(Section::Children);
        for value in [json!(""), json!("0"), json!(false), json!(null)] {
            let drawn =
                filler.draw(&mut page, &values(&[("has_children", value)]), &positions, 9.0);
            assert_eq!(drawn, 0);
        }
        assert!(page.text_runs().is_empty());
    }

    #[test]
    fn test_font_from_position_or_default() {
        let mut doc = OverlayDocument::blank(1);
        let mut page = canvas(&mut doc, 1);
        let positions: PositionSet = [
            FieldPosition::new("attorney_name", 1, MmRect::new(20.0, 20.0, 80.0, 5.0))
                .with_font(12.0, pdf_core::FontStyle::Bold),
            FieldPosition::new("attorney_phone", 1, MmRect::new(20.0, 30.0, 40.0, 5.0)),
        ]
        .into_iter()
        .collect();

        Filler::standard(Section::Attorney).draw(
            &mut page,
            &values(&[
                ("attorney_name", json!("Jane Doe")),
                ("attorney_phone", json!("555-0100")),
            ]),
            &positions,
            9.0,
        );

        let runs = page.text_runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].font.size, 12.0);
        assert_eq!(runs[0].font.style, pdf_core::FontStyle::Bold);
        assert_eq!(runs[1].font.size, 9.0);
    }

    #[test]
    fn test_off_page_and_other_page_positions_skipped() {
        let mut doc = OverlayDocument::blank(2);
        let mut page = canvas(&mut doc, 1);
        let positions: PositionSet = [
            FieldPosition::new("petitioner_name", 1, MmRect::new(200.0, 20.0, 80.0, 5.0)),
            FieldPosition::new("respondent_name", 2, MmRect::new(20.0, 20.0, 80.0, 5.0)),
        ]
        .into_iter()
        .collect();

        let drawn = Filler::standard(Section::Party).draw(
            &mut page,
            &values(&[
                ("petitioner_name", json!("Jane Doe")),
                ("respondent_name", json!("John Doe")),
            ]),
            &positions,
            9.0,
        );
        assert_eq!(drawn, 0);
    }

    #[test]
    fn test_general_filler_takes_unowned_keys() {
        let template = TemplateDescriptor::new(
            "t_w9",
            vec![
                crate::catalog::TemplateField::new("business_name", "text"),
                crate::catalog::TemplateField::new("exempt_payee", "Checkbox"),
                crate::catalog::TemplateField::new("case_number", "text"),
            ],
        );
        let registry = FillerRegistry::standard()
            .unwrap()
            .for_template(&template, &values(&[("tin", json!("12-3456789"))]))
            .unwrap();

        assert_eq!(registry.fillers().len(), 8);
        assert_eq!(registry.owner("case_number"), Some(Section::Court));
        assert_eq!(registry.owner("business_name"), Some(Section::General));
        assert_eq!(registry.owner("tin"), Some(Section::General));

        let general = &registry.fillers()[7];
        assert_eq!(
            general.fields(),
            &[
                FieldSpec::text("business_name", TextAlign::Left),
                FieldSpec::checkbox("exempt_payee"),
                FieldSpec::text("tin", TextAlign::Left),
            ]
        );
    }

    #[test]
    fn test_standard_template_adds_no_general_filler() {
        let template = TemplateDescriptor::new(
            "t_fl100",
            vec![crate::catalog::TemplateField::new("attorney_name", "text")],
        );
        let registry = FillerRegistry::standard()
            .unwrap()
            .for_template(&template, &values(&[("attorney_name", json!("Jane Doe"))]))
            .unwrap();
        assert_eq!(registry.fillers().len(), 7);
    }

    #[test]
    fn test_general_filler_stays_disjoint() {
        let err = FillerRegistry::new(vec![
            Filler::standard(Section::Attorney),
            Filler::new(Section::General, vec![FieldSpec::checkbox("attorney_name")]),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            FillError::OverlappingFillers {
                first: Section::Attorney,
                second: Section::General,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_positions() {
        let registry = FillerRegistry::standard().unwrap();
        let positions: PositionSet =
            [FieldPosition::new("attorney_name", 1, MmRect::new(20.0, 20.0, 80.0, 5.0))]
                .into_iter()
                .collect();
        let missing = registry.missing_positions(
            &values(&[
                ("attorney_name", json!("Jane Doe")),
                ("case_number", json!("FL-1")),
                ("has_children", json!("0")),
                ("petitioner_name", json!("")),
            ]),
            &positions,
        );
        assert_eq!(missing, vec!["case_number"]);
    }
}
