//! Name-only field recovery through an external dump tool
//!
//! The dump lists field names, types and flags but never rectangles, so
//! every field it yields is unplaced.

use crate::locator::{ExternalTool, ToolLocator};
use crate::process::run_with_timeout;
use crate::{Result, ToolError};
use pdf_core::{map_field_type, ExtractedField, FieldKind};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Marker printed by the dump tool for owner-password protected sources
const PASSWORD_MARKER: &str = "OWNER PASSWORD REQUIRED";

/// One record from the dump output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpedField {
    pub name: String,
    pub field_type: String,
    pub flags: i64,
    pub state_options: Vec<String>,
}

impl DumpedField {
    pub fn kind(&self) -> FieldKind {
        map_field_type(&self.field_type, self.flags)
    }
}

/// Parse `dump_data_fields` output into records
///
/// Records are separated by `---` lines; records without a name are dropped.
pub fn parse_dump_output(output: &str) -> Vec<DumpedField> {
    let mut fields = Vec::new();
    let mut current = DumpedField::default();

    for line in output.lines() {
        let line = line.trim();
        if line == "---" {
            flush(&mut fields, &mut current);
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "FieldName" => current.name = value.to_string(),
            "FieldType" => current.field_type = value.to_string(),
            "FieldFlags" => current.flags = value.parse().unwrap_or(0),
            "FieldStateOption" => current.state_options.push(value.to_string()),
            _ => {}
        }
    }
    flush(&mut fields, &mut current);

    fields
}

fn flush(fields: &mut Vec<DumpedField>, current: &mut DumpedField) {
    let record = std::mem::take(current);
    if !record.name.is_empty() {
        fields.push(record);
    }
}

/// Runs the field dump tool against a source document
pub struct FieldNameDump<L> {
    locator: L,
    timeout: Duration,
}

impl<L: ToolLocator> FieldNameDump<L> {
    pub fn new(locator: L, timeout: Duration) -> Self {
        Self { locator, timeout }
    }

    /// Whether the dump tool can be found at all
    pub fn is_available(&self) -> bool {
        self.locator.locate(ExternalTool::FieldDump).is_some()
    }

    /// Dump the raw field records of `source`
    pub fn dump(&self, source: &Path) -> Result<Vec<DumpedField>> {
        if !source.is_file() {
            return Err(ToolError::SourceNotFound(source.to_path_buf()));
        }
        let tool = self
            .locator
            .locate(ExternalTool::FieldDump)
            .ok_or(ToolError::NotFound(ExternalTool::FieldDump))?;

        let args = [source.as_os_str(), "dump_data_fields".as_ref()];
        let output = match run_with_timeout(&tool, args, self.timeout, None) {
            Ok(output) => output,
            Err(ToolError::Failed { stderr, .. }) if stderr.contains(PASSWORD_MARKER) => {
                return Err(ToolError::PasswordProtected(source.to_path_buf()));
            }
            Err(e) => return Err(e),
        };
        if output.stdout.contains(PASSWORD_MARKER) || output.stderr.contains(PASSWORD_MARKER) {
            return Err(ToolError::PasswordProtected(source.to_path_buf()));
        }

        let fields = parse_dump_output(&output.stdout);
        debug!(count = fields.len(), "Dumped field names");
        Ok(fields)
    }

    /// Field names of `source` as unplaced fields; failures yield an empty map
    pub fn extract(&self, source: &Path) -> BTreeMap<String, ExtractedField> {
        match self.dump(source) {
            Ok(records) => {
                let mut fields = BTreeMap::new();
                for record in records {
                    let kind = record.kind();
                    fields
                        .entry(record.name.clone())
                        .or_insert_with(|| ExtractedField::unplaced(record.name, kind));
                }
                fields
            }
            Err(e) => {
                warn!(path = %source.display(), error = %e, "Field name dump failed");
                BTreeMap::new()
            }
        }
    }
}
