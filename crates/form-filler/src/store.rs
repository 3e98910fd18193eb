//! Manual position override store
//!
//! One JSON file per template, `{templateId}_positions.json`, mapping field
//! keys to position records. Writes go to a temporary file in the same
//! directory and are renamed into place, so readers never see a partial file.

use crate::position::{FieldPosition, PositionRecord, PositionSet};
use crate::{FillError, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const FILE_SUFFIX: &str = "_positions.json";

/// Directory of per-template override files
#[derive(Debug, Clone)]
pub struct PositionStore {
    dir: PathBuf,
}

impl PositionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the override file for `template_id`
    pub fn path_for(&self, template_id: &str) -> Result<PathBuf> {
        let valid = !template_id.is_empty()
            && template_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !template_id.contains("..");
        if !valid {
            return Err(FillError::Store(format!(
                "invalid template id '{template_id}'"
            )));
        }
        Ok(self.dir.join(format!("{template_id}{FILE_SUFFIX}")))
    }

    pub fn has_positions(&self, template_id: &str) -> bool {
        self.path_for(template_id)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Load the overrides of a template; a missing file is an empty set
    pub fn load(&self, template_id: &str) -> Result<PositionSet> {
        let path = self.path_for(template_id)?;
        if !path.is_file() {
            return Ok(PositionSet::new());
        }

        let json = std::fs::read_to_string(&path)?;
        let records: BTreeMap<String, PositionRecord> = serde_json::from_str(&json)
            .map_err(|e| FillError::Store(format!("{}: {e}", path.display())))?;
        debug!(template = template_id, count = records.len(), "Loaded position overrides");

        Ok(PositionSet::from_records(records))
    }

    /// Replace the overrides of a template
    pub fn save(&self, template_id: &str, positions: &PositionSet) -> Result<PathBuf> {
        let path = self.path_for(template_id)?;
        std::fs::create_dir_all(&self.dir)?;

        let json = serde_json::to_string_pretty(&positions.to_records())?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| FillError::Io(e.error))?;

        debug!(template = template_id, count = positions.len(), "Saved position overrides");
        Ok(path)
    }

    /// Set one field's override, keeping the others
    pub fn set_field_position(&self, template_id: &str, position: FieldPosition) -> Result<()> {
        let mut positions = self.load(template_id)?;
        positions.insert(position);
        self.save(template_id, &positions)?;
        Ok(())
    }

    pub fn field_position(
        &self,
        template_id: &str,
        field_key: &str,
    ) -> Result<Option<FieldPosition>> {
        Ok(self.load(template_id)?.get(field_key).cloned())
    }

    /// Template ids that have an override file, sorted
    pub fn templates_with_positions(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut templates = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|n| n.strip_suffix(FILE_SUFFIX)) {
                if !id.is_empty() {
                    templates.push(id.to_string());
                }
            }
        }
        templates.sort();
        Ok(templates)
    }
}
