//! Field Position Resolver
//!
//! Three tiers, tried in order:
//! 1. the manual override store (plus any overrides passed with the request)
//! 2. fields extracted from the source document's annotations, falling back
//!    to the name-only dump when the annotation walk yields nothing
//! 3. the baseline layout of a known form family
//!
//! In [`OverrideMode::Replace`] the first non-empty tier wins wholesale. In
//! [`OverrideMode::Merge`] the tiers are layered key by key, higher tiers on
//! top.

use crate::baseline::baseline_positions;
use crate::catalog::TemplateDescriptor;
use crate::config::OverrideMode;
use crate::matching::FieldNameMatcher;
use crate::position::{FieldPosition, PositionSet};
use crate::store::PositionStore;
use crate::{FillError, Result};
use form_tools::{ExternalTool, FieldNameDump, ToolLocator};
use pdf_core::{AnnotationParser, ExtractedField};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Which tier produced a resolved set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    Override,
    Extracted,
    Baseline,
    /// Several tiers layered in merge mode
    Merged,
}

impl fmt::Display for PositionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PositionSource::Override => "override",
            PositionSource::Extracted => "extracted",
            PositionSource::Baseline => "baseline",
            PositionSource::Merged => "merged",
        })
    }
}

/// Outcome of resolving one template against one source document
#[derive(Debug, Clone)]
pub struct ResolvedPositions {
    pub source: PositionSource,
    pub positions: PositionSet,
    /// Fields known by name only, still without a position
    pub unplaced: Vec<String>,
}

/// What the source document itself yields
#[derive(Debug, Default)]
struct Extraction {
    positions: PositionSet,
    unplaced: Vec<String>,
}

pub struct PositionResolver<L> {
    store: PositionStore,
    parser: AnnotationParser,
    dump: FieldNameDump<L>,
    mode: OverrideMode,
}

impl<L: ToolLocator> PositionResolver<L> {
    pub fn new(store: PositionStore, dump: FieldNameDump<L>, mode: OverrideMode) -> Self {
        Self {
            store,
            parser: AnnotationParser::new(),
            dump,
            mode,
        }
    }

    pub fn mode(&self) -> OverrideMode {
        self.mode
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    /// Resolve positions for every field of `template`
    ///
    /// `request_overrides` sit on top of the stored overrides. Fails with
    /// [`FillError::ExtractionFailed`] only when every tier comes up empty.
    pub fn resolve(
        &self,
        template: &TemplateDescriptor,
        source: &Path,
        request_overrides: Option<&PositionSet>,
    ) -> Result<ResolvedPositions> {
        let overrides = self.overrides(template, request_overrides);

        let resolved = match self.mode {
            OverrideMode::Replace if !overrides.is_empty() => ResolvedPositions {
                source: PositionSource::Override,
                positions: overrides,
                unplaced: Vec::new(),
            },
            OverrideMode::Replace => {
                let extraction = self.extract(template, source);
                if !extraction.positions.is_empty() {
                    ResolvedPositions {
                        source: PositionSource::Extracted,
                        positions: extraction.positions,
                        unplaced: extraction.unplaced,
                    }
                } else {
                    let positions = baseline_positions(&template.id);
                    let unplaced = still_unplaced(extraction.unplaced, &positions);
                    ResolvedPositions {
                        source: PositionSource::Baseline,
                        positions,
                        unplaced,
                    }
                }
            }
            OverrideMode::Merge => {
                let extraction = self.extract(template, source);
                let mut positions = baseline_positions(&template.id);
                positions.merge(extraction.positions);
                positions.merge(overrides);
                let unplaced = still_unplaced(extraction.unplaced, &positions);
                ResolvedPositions {
                    source: PositionSource::Merged,
                    positions,
                    unplaced,
                }
            }
        };

        if resolved.positions.is_empty() {
            warn!(template = %template.id, "Every position tier came up empty");
            return Err(FillError::ExtractionFailed(template.id.clone()));
        }
        for key in &resolved.unplaced {
            warn!(template = %template.id, field = %key, "Field has no known position");
        }
        info!(
            template = %template.id,
            source = %resolved.source,
            count = resolved.positions.len(),
            unplaced = resolved.unplaced.len(),
            "Resolved field positions"
        );
        Ok(resolved)
    }

    fn overrides(
        &self,
        template: &TemplateDescriptor,
        request_overrides: Option<&PositionSet>,
    ) -> PositionSet {
        let mut overrides = match self.store.load(&template.id) {
            Ok(positions) => positions,
            Err(e) => {
                warn!(
                    template = %template.id,
                    error = %e,
                    "Ignoring unreadable position overrides"
                );
                PositionSet::new()
            }
        };
        if let Some(extra) = request_overrides {
            overrides.merge(extra.clone());
        }
        overrides
    }

    /// Annotation walk first, name-only dump as last resort
    fn extract(&self, template: &TemplateDescriptor, source: &Path) -> Extraction {
        let matcher = FieldNameMatcher::new(template);

        let mut fields = self.parser.parse_path(source);
        if fields.is_empty() {
            debug!(path = %source.display(), "No annotation fields, trying name dump");
            if self.dump.is_available() {
                fields = self.dump.extract(source);
            } else {
                let err = FillError::ToolNotFound(ExternalTool::FieldDump);
                debug!(path = %source.display(), "{err}, skipping name dump");
            }
        }
        let fields: BTreeMap<String, ExtractedField> = matcher.map_fields(fields);

        let mut extraction = Extraction::default();
        for (key, field) in &fields {
            match FieldPosition::from_extracted(key.as_str(), field) {
                Some(position) => extraction.positions.insert(position),
                None => extraction.unplaced.push(key.clone()),
            }
        }
        debug!(
            placed = extraction.positions.len(),
            unplaced = extraction.unplaced.len(),
            "Extracted field positions"
        );
        extraction
    }
}

fn still_unplaced(unplaced: Vec<String>, positions: &PositionSet) -> Vec<String> {
    unplaced
        .into_iter()
        .filter(|key| !positions.contains(key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TemplateField;
    use form_tools::NoToolLocator;
    use pdf_core::MmRect;
    use std::time::Duration;

    fn resolver(dir: &Path, mode: OverrideMode) -> PositionResolver<NoToolLocator> {
        PositionResolver::new(
            PositionStore::new(dir),
            FieldNameDump::new(NoToolLocator, Duration::from_secs(1)),
            mode,
        )
    }

    fn template(id: &str) -> TemplateDescriptor {
        TemplateDescriptor::new(
            id,
            vec![
                TemplateField::new("attorney_name", "text"),
                TemplateField::new("case_number", "text"),
            ],
        )
    }

    #[test]
    fn test_unreadable_source_falls_back_to_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolver(dir.path(), OverrideMode::Replace)
            .resolve(&template("t_fl100_gc120"), &dir.path().join("missing.pdf"), None)
            .unwrap();
        assert_eq!(resolved.source, PositionSource::Baseline);
        assert!(resolved.positions.contains("attorney_name"));
    }

    #[cfg(unix)]
    #[test]
    fn test_name_dump_fields_fall_through_to_baseline() {
        use form_tools::{ExternalTool, FixedToolLocator};
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let pdftk = dir.path().join("pdftk");
        std::fs::write(
            &pdftk,
            "#!/bin/sh\n\
             echo '---'\necho 'FieldType: Text'\necho 'FieldName: case_number'\n\
             echo '---'\necho 'FieldType: Text'\necho 'FieldName: business_name'\n",
        )
        .unwrap();
        std::fs::set_permissions(&pdftk, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source = dir.path().join("locked.pdf");
        std::fs::write(&source, "%PDF-1.4\n1 0 obj << /Type /Pages /Count 1 >> endobj\n").unwrap();

        let resolver = PositionResolver::new(
            PositionStore::new(dir.path().join("positions")),
            FieldNameDump::new(
                FixedToolLocator::new().with(ExternalTool::FieldDump, &pdftk),
                Duration::from_secs(10),
            ),
            OverrideMode::Replace,
        );
        let template = TemplateDescriptor::new(
            "t_fl100_gc120",
            vec![
                TemplateField::new("case_number", "text"),
                TemplateField::new("business_name", "text"),
            ],
        );

        let resolved = resolver.resolve(&template, &source, None).unwrap();
        assert_eq!(resolved.source, PositionSource::Baseline);
        assert_eq!(resolved.unplaced, vec!["business_name".to_string()]);
        assert!(resolved.positions.contains("case_number"));
        assert!(!resolved.positions.contains("business_name"));
        assert!(resolved
            .positions
            .iter()
            .all(|p| p.page >= 1 && (p.x, p.y) != (0.0, 0.0)));
    }

    #[test]
    fn test_every_tier_empty_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolver(dir.path(), OverrideMode::Replace)
            .resolve(&template("t_w9"), &dir.path().join("missing.pdf"), None)
            .unwrap_err();
        assert!(matches!(err, FillError::ExtractionFailed(id) if id == "t_w9"));
    }

    #[test]
    fn test_request_overrides_win_in_replace_mode() {
        let dir = tempfile::tempdir().unwrap();
        let extra: PositionSet =
            [FieldPosition::new("case_number", 1, MmRect::new(10.0, 10.0, 40.0, 5.0))]
                .into_iter()
                .collect();

        let resolved = resolver(dir.path(), OverrideMode::Replace)
            .resolve(&template("t_fl100"), &dir.path().join("missing.pdf"), Some(&extra))
            .unwrap();
        assert_eq!(resolved.source, PositionSource::Override);
        assert_eq!(resolved.positions.len(), 1);
    }

    #[test]
    fn test_merge_layers_overrides_on_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let extra: PositionSet =
            [FieldPosition::new("case_number", 2, MmRect::new(10.0, 10.0, 40.0, 5.0))]
                .into_iter()
                .collect();

        let resolved = resolver(dir.path(), OverrideMode::Merge)
            .resolve(&template("t_fl100"), &dir.path().join("missing.pdf"), Some(&extra))
            .unwrap();
        assert_eq!(resolved.source, PositionSource::Merged);
        assert_eq!(resolved.positions.get("case_number").unwrap().page, 2);
        assert!(resolved.positions.contains("attorney_name"));
    }
}
