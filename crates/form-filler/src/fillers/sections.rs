//! Field sets of the standard sections

use super::{FieldRender, FieldSpec, Section};
use pdf_core::TextAlign;
use std::borrow::Cow;

const fn left(key: &'static str) -> FieldSpec {
    FieldSpec {
        key: Cow::Borrowed(key),
        render: FieldRender::Text(TextAlign::Left),
    }
}

const fn check(key: &'static str) -> FieldSpec {
    FieldSpec {
        key: Cow::Borrowed(key),
        render: FieldRender::Checkbox,
    }
}

const ATTORNEY: &[FieldSpec] = &[
    left("attorney_name"),
    left("attorney_bar_number"),
    left("attorney_firm"),
    left("attorney_address"),
    left("attorney_city_state_zip"),
    left("attorney_phone"),
    left("attorney_email"),
];

const COURT: &[FieldSpec] = &[
    left("case_number"),
    left("court_county"),
    left("court_address"),
    left("case_type"),
    left("filing_date"),
    left("additional_info"),
];

const PARTY: &[FieldSpec] = &[
    left("petitioner_name"),
    left("respondent_name"),
    left("petitioner_address"),
    left("petitioner_phone"),
    left("respondent_address"),
];

const MARRIAGE: &[FieldSpec] = &[
    left("marriage_date"),
    left("separation_date"),
    left("marriage_location"),
    left("grounds_for_dissolution"),
];

const RELIEF: &[FieldSpec] = &[
    check("dissolution_type"),
    check("property_division"),
    check("spousal_support"),
    check("attorney_fees"),
    check("name_change"),
];

const CHILDREN: &[FieldSpec] = &[
    check("has_children"),
    FieldSpec {
        key: Cow::Borrowed("children_count"),
        render: FieldRender::Text(TextAlign::Center),
    },
];

const SIGNATURE: &[FieldSpec] = &[left("attorney_signature"), left("signature_date")];

pub(super) fn standard_fields(section: Section) -> &'static [FieldSpec] {
    match section {
        Section::Attorney => ATTORNEY,
        Section::Court => COURT,
        Section::Party => PARTY,
        Section::Marriage => MARRIAGE,
        Section::Relief => RELIEF,
        Section::Children => CHILDREN,
        Section::Signature => SIGNATURE,
        Section::General => &[],
    }
}
