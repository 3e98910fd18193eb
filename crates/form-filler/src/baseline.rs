//! Baseline layouts for known form families
//!
//! The last resolution tier. Boxes are measured in points from the top-left
//! corner of a US Letter page and converted once on lookup.

use crate::position::{FieldPosition, PositionSet};
use form_tools::clean_template_id;
use pdf_core::{FieldKind, MmRect};

struct BaselineField {
    key: &'static str,
    page: usize,
    /// x, y, width, height in points, top-left origin
    rect: [f64; 4],
    kind: FieldKind,
}

const fn text(key: &'static str, page: usize, rect: [f64; 4]) -> BaselineField {
    BaselineField {
        key,
        page,
        rect,
        kind: FieldKind::Text,
    }
}

const fn mark(key: &'static str, page: usize, rect: [f64; 4]) -> BaselineField {
    BaselineField {
        key,
        page,
        rect,
        kind: FieldKind::Checkbox,
    }
}

/// FL-100 Petition (Marriage/Domestic Partnership)
const FL100: &[BaselineField] = &[
    text("attorney_name", 1, [75.0, 95.0, 250.0, 12.0]),
    text("attorney_bar_number", 1, [340.0, 95.0, 100.0, 12.0]),
    text("attorney_firm", 1, [75.0, 110.0, 365.0, 12.0]),
    text("attorney_address", 1, [75.0, 125.0, 365.0, 12.0]),
    text("attorney_city_state_zip", 1, [75.0, 140.0, 270.0, 12.0]),
    text("attorney_phone", 1, [75.0, 155.0, 120.0, 12.0]),
    text("attorney_email", 1, [75.0, 170.0, 365.0, 12.0]),
    text("court_county", 1, [180.0, 225.0, 260.0, 12.0]),
    text("court_address", 1, [75.0, 240.0, 365.0, 12.0]),
    text("petitioner_name", 1, [75.0, 330.0, 200.0, 12.0]),
    text("respondent_name", 1, [75.0, 350.0, 200.0, 12.0]),
    text("case_number", 1, [350.0, 330.0, 120.0, 12.0]),
    mark("dissolution_type", 1, [72.0, 402.0, 10.0, 10.0]),
    text("marriage_date", 1, [160.0, 647.0, 100.0, 12.0]),
    text("separation_date", 1, [160.0, 667.0, 100.0, 12.0]),
    mark("has_children", 2, [92.0, 107.0, 10.0, 10.0]),
];

/// Font size the FL-100 layout was drawn with
const FL100_FONT_SIZE: f64 = 10.0;

/// Baseline positions for a template, empty when its family is unknown
pub fn baseline_positions(template_id: &str) -> PositionSet {
    let clean = clean_template_id(template_id).to_ascii_lowercase();
    if !clean.starts_with("fl100") {
        return PositionSet::new();
    }

    FL100
        .iter()
        .map(|field| {
            let [x, y, width, height] = field.rect;
            let position = FieldPosition::new(
                field.key,
                field.page,
                MmRect::from_top_left_points(x, y, width, height),
            )
            .with_kind(field.kind);
            if field.kind.is_mark() {
                position
            } else {
                position.with_font(FL100_FONT_SIZE, Default::default())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_core::{US_LETTER_HEIGHT_PT, US_LETTER_WIDTH_PT, MM_PER_POINT};

    #[test]
    fn test_known_family() {
        let positions = baseline_positions("t_fl100_gc120");
        assert_eq!(positions.len(), FL100.len());

        let name = positions.get("attorney_name").unwrap();
        assert_eq!(name.page, 1);
        assert_eq!(name.x, 26.46);
        assert_eq!(name.y, 33.51);
        assert_eq!(name.font_size, Some(10.0));

        let children = positions.get("has_children").unwrap();
        assert_eq!(children.page, 2);
        assert_eq!(children.kind, FieldKind::Checkbox);
    }

    #[test]
    fn test_unknown_family_is_empty() {
        assert!(baseline_positions("t_w9").is_empty());
        assert!(baseline_positions("").is_empty());
    }

    #[test]
    fn test_layout_fits_letter() {
        let width = US_LETTER_WIDTH_PT * MM_PER_POINT;
        let height = US_LETTER_HEIGHT_PT * MM_PER_POINT;
        for position in baseline_positions("fl100").iter() {
            assert!(
                position.rect().fits_within(width, height),
                "{} is off the page",
                position.field_key
            );
        }
    }
}
