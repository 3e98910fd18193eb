//! Template field catalog contract
//!
//! The catalog itself is owned by the surrounding application; this module
//! only describes the shape it is consumed in and the value helpers shared by
//! the completion check and the fillers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field values supplied with a fill request, keyed by field key
pub type FieldValues = BTreeMap<String, Value>;

/// One field of a template, as supplied by the template registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateField {
    pub key: String,

    #[serde(default)]
    pub label: String,

    /// Field type ("text", "checkbox", "date", ...)
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,

    #[serde(default)]
    pub panel_id: Option<String>,

    #[serde(default)]
    pub required: bool,

    /// Optional validation pattern; checked by the registry, carried here as-is
    #[serde(default)]
    pub pattern: Option<String>,

    /// Explicit PDF form field this key maps to
    #[serde(default)]
    pub pdf_field: Option<String>,
}

fn default_field_type() -> String {
    "text".to_string()
}

impl TemplateField {
    pub fn new(key: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: String::new(),
            field_type: field_type.into(),
            panel_id: None,
            required: false,
            pattern: None,
            pdf_field: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_pdf_field(mut self, name: impl Into<String>) -> Self {
        self.pdf_field = Some(name.into());
        self
    }
}

/// A template: identifier plus its field catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    /// Template identifier (e.g. `t_fl100_gc120`)
    pub id: String,

    /// Form code shown to users (e.g. `FL-100`)
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub fields: Vec<TemplateField>,
}

impl TemplateDescriptor {
    pub fn new(id: impl Into<String>, fields: Vec<TemplateField>) -> Self {
        Self {
            id: id.into(),
            code: String::new(),
            name: String::new(),
            fields,
        }
    }

    pub fn field(&self, key: &str) -> Option<&TemplateField> {
        self.fields.iter().find(|f| f.key == key)
    }
}

/// Convert a JSON value to the string drawn on the page
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Whether a value counts as supplied
pub fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Whether a value ticks a checkbox
///
/// Any content counts except the usual "off" spellings.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => {
            let s = s.trim();
            !s.is_empty()
                && !["0", "false", "off", "no"]
                    .iter()
                    .any(|off| s.eq_ignore_ascii_case(off))
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Required fields of `template` that have no value in `values`
pub fn missing_required<'a>(
    template: &'a TemplateDescriptor,
    values: &FieldValues,
) -> Vec<&'a str> {
    template
        .fields
        .iter()
        .filter(|f| f.required)
        .filter(|f| !values.get(&f.key).is_some_and(has_value))
        .map(|f| f.key.as_str())
        .collect()
}

/// True when every required field has a value
pub fn can_generate(template: &TemplateDescriptor, values: &FieldValues) -> bool {
    missing_required(template, values).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> TemplateDescriptor {
        TemplateDescriptor::new(
            "t_fl100_gc120",
            vec![
                TemplateField::new("petitioner_name", "text").required(),
                TemplateField::new("case_number", "text").required(),
                TemplateField::new("has_children", "checkbox"),
            ],
        )
    }

    #[test]
    fn test_missing_required() {
        let mut values = FieldValues::new();
        values.insert("petitioner_name".into(), json!("Jane Doe"));
        values.insert("case_number".into(), json!("   "));

        assert_eq!(missing_required(&template(), &values), vec!["case_number"]);
        assert!(!can_generate(&template(), &values));

        values.insert("case_number".into(), json!("FL-2024-001"));
        assert!(can_generate(&template(), &values));
    }

    #[test]
    fn test_no_required_fields_always_generates() {
        let template = TemplateDescriptor::new("t", vec![TemplateField::new("a", "text")]);
        assert!(can_generate(&template, &FieldValues::new()));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!("Yes")));
        assert!(is_truthy(&json!("anything at all")));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!(true)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!("Off")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&Value::Null));
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("Jane")), "Jane");
        assert_eq!(value_to_string(&json!(3)), "3");
        assert_eq!(value_to_string(&Value::Null), "");
    }

    #[test]
    fn test_descriptor_from_json() {
        let template: TemplateDescriptor = serde_json::from_str(
            r#"{
                "id": "t_fl100_gc120",
                "code": "FL-100",
                "fields": [
                    {"key": "attorney_name", "label": "Attorney", "panelId": "attorney",
                     "required": true, "pdfField": "TextField1[0]"},
                    {"key": "has_children", "type": "checkbox"}
                ]
            }"#,
        )
        .unwrap();

        let attorney = template.field("attorney_name").unwrap();
        assert_eq!(attorney.field_type, "text");
        assert_eq!(attorney.pdf_field.as_deref(), Some("TextField1[0]"));
        assert_eq!(attorney.panel_id.as_deref(), Some("attorney"));
        assert_eq!(template.field("has_children").unwrap().field_type, "checkbox");
    }
}
