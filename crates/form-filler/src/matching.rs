//! Fuzzy matching of raw PDF field names to template field keys

use crate::catalog::TemplateDescriptor;
use std::collections::BTreeMap;

/// Minimum similarity, in percent, for a fuzzy match; the score must exceed it
pub const MATCH_THRESHOLD: f64 = 80.0;

/// Lowercase and strip everything but ASCII letters and digits
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Number of characters shared by `a` and `b`
///
/// Takes the longest common substring (leftmost on ties), then recurses into
/// the pieces left and right of it.
pub fn similar_text(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    common_chars(&a, &b)
}

fn common_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (mut best_len, mut best_a, mut best_b) = (0, 0, 0);
    for i in 0..a.len() {
        for j in 0..b.len() {
            let mut len = 0;
            while i + len < a.len() && j + len < b.len() && a[i + len] == b[j + len] {
                len += 1;
            }
            if len > best_len {
                best_len = len;
                best_a = i;
                best_b = j;
            }
        }
    }
    if best_len == 0 {
        return 0;
    }

    best_len
        + common_chars(&a[..best_a], &b[..best_b])
        + common_chars(&a[best_a + best_len..], &b[best_b + best_len..])
}

/// Similarity of two strings in percent: shared characters over total length
pub fn similarity_percent(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 0.0;
    }
    similar_text(a, b) as f64 * 2.0 * 100.0 / total as f64
}

/// Maps PDF field names onto the keys of one template
///
/// An explicit `pdfField` on a template field always wins; otherwise names are
/// compared exactly, then normalized, then by similarity above
/// [`MATCH_THRESHOLD`].
#[derive(Debug, Clone)]
pub struct FieldNameMatcher {
    /// (key, normalized key) in catalog order
    keys: Vec<(String, String)>,
    explicit: BTreeMap<String, String>,
}

impl FieldNameMatcher {
    pub fn new(template: &TemplateDescriptor) -> Self {
        let keys = template
            .fields
            .iter()
            .map(|f| (f.key.clone(), normalize(&f.key)))
            .collect();
        let explicit = template
            .fields
            .iter()
            .filter_map(|f| f.pdf_field.as_ref().map(|pdf| (pdf.clone(), f.key.clone())))
            .collect();
        Self { keys, explicit }
    }

    /// Template key for a PDF field name, with its match score
    pub fn match_name(&self, pdf_name: &str) -> Option<(&str, f64)> {
        if let Some(key) = self.explicit.get(pdf_name) {
            return Some((key.as_str(), 100.0));
        }
        if let Some((key, _)) = self.keys.iter().find(|(key, _)| key == pdf_name) {
            return Some((key.as_str(), 100.0));
        }

        let normalized = normalize(pdf_name);
        if normalized.is_empty() {
            return None;
        }
        if let Some((key, _)) = self.keys.iter().find(|(_, norm)| *norm == normalized) {
            return Some((key.as_str(), 100.0));
        }

        let mut best: Option<(&str, f64)> = None;
        for (key, norm) in &self.keys {
            let score = similarity_percent(&normalized, norm);
            if score > MATCH_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
                best = Some((key.as_str(), score));
            }
        }
        best
    }

    /// Re-key a map of PDF-named items by template key
    ///
    /// When several PDF names land on one key, the higher score wins and ties
    /// keep the earlier name. Names that match nothing are dropped.
    pub fn map_fields<T>(&self, items: BTreeMap<String, T>) -> BTreeMap<String, T> {
        let mut scored: BTreeMap<String, (f64, T)> = BTreeMap::new();
        for (pdf_name, item) in items {
            let Some((key, score)) = self.match_name(&pdf_name) else {
                continue;
            };
            match scored.get(key) {
                Some((existing, _)) if *existing >= score => {}
                _ => {
                    scored.insert(key.to_string(), (score, item));
                }
            }
        }
        scored
            .into_iter()
            .map(|(key, (_, item))| (key, item))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TemplateField;
    use pretty_assertions::assert_eq;

    fn matcher() -> FieldNameMatcher {
        FieldNameMatcher::new(&TemplateDescriptor::new(
            "t",
            vec![
                TemplateField::new("attorney_name", "text"),
                TemplateField::new("case_number", "text").with_pdf_field("TextField7[0]"),
                TemplateField::new("petitioner_name", "text"),
            ],
        ))
    }

    #[test]
    fn test_similar_text() {
        assert_eq!(similar_text("World", "Word"), 4);
        assert_eq!(similar_text("", "abc"), 0);
        assert!((similarity_percent("World", "Word") - 88.888).abs() < 0.01);
        assert_eq!(similarity_percent("abc", "abc"), 100.0);
        assert_eq!(similarity_percent("", ""), 0.0);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Attorney-Name[0]"), "attorneyname0");
        assert_eq!(normalize("  __ "), "");
    }

    #[test]
    fn test_match_order() {
        let m = matcher();
        assert_eq!(m.match_name("TextField7[0]"), Some(("case_number", 100.0)));
        assert_eq!(m.match_name("attorney_name"), Some(("attorney_name", 100.0)));
        assert_eq!(m.match_name("Attorney Name"), Some(("attorney_name", 100.0)));

        let (key, score) = m.match_name("attorneynam").unwrap();
        assert_eq!(key, "attorney_name");
        assert!(score > MATCH_THRESHOLD);

        assert_eq!(m.match_name("county"), None);
        assert_eq!(m.match_name("[0]"), None);
    }

    #[test]
    fn test_map_fields_prefers_better_match() {
        let mut items = BTreeMap::new();
        items.insert("PetitionerNam".to_string(), 1);
        items.insert("petitioner_name".to_string(), 2);
        items.insert("Unrelated".to_string(), 3);

        let mapped = matcher().map_fields(items);
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped["petitioner_name"], 2);
    }
}
