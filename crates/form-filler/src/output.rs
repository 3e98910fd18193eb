//! Output Writer

use crate::{FillError, Result};
use form_tools::clean_template_id;
use pdf_core::OverlayDocument;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Writes finished documents under uniquely named files
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{template}_{YYYYmmdd_HHMMSS}_{8 hex}.pdf`
    ///
    /// The random suffix keeps concurrent requests within one second apart.
    pub fn file_name(template_id: &str) -> String {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{}_{}_{}.pdf",
            clean_template_id(template_id),
            timestamp,
            &suffix[..8]
        )
    }

    /// Serialize `doc`, write it, and verify the written file
    pub fn write(&self, doc: &mut OverlayDocument, template_id: &str) -> Result<(PathBuf, u64)> {
        let bytes = doc.to_bytes()?;
        std::fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(Self::file_name(template_id));
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(&path).map_err(|e| FillError::Io(e.error))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Wrote output");

        let size = Self::verify(&path)?;
        Ok((path, size))
    }

    /// Size of a written artifact; missing or empty files are fatal
    pub fn verify(path: &Path) -> Result<u64> {
        let failure = |reason: String| {
            error!(path = %path.display(), %reason, "Output verification failed");
            FillError::WriteVerificationFailure {
                path: path.to_path_buf(),
                reason,
            }
        };

        let metadata = std::fs::metadata(path).map_err(|e| failure(e.to_string()))?;
        if !metadata.is_file() {
            return Err(failure("not a regular file".to_string()));
        }
        if metadata.len() == 0 {
            return Err(failure("file is empty".to_string()));
        }
        Ok(metadata.len())
    }
}
