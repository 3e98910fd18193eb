//! Runtime discovery of external binaries
//!
//! Lookup goes through [`ToolLocator`] so tests can substitute fixed paths or
//! pretend nothing is installed.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The external programs the filler can shell out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalTool {
    /// PDF page to raster image converter (Ghostscript)
    Rasterizer,
    /// Form field name/type dump (pdftk)
    FieldDump,
}

impl ExternalTool {
    /// Candidate program names and absolute paths, probed in order
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            ExternalTool::Rasterizer if cfg!(windows) => &[
                "gswin64c",
                "gswin32c",
                "gs",
                r"C:\Program Files\gs\gs10.02.1\bin\gswin64c.exe",
                r"C:\Program Files\gs\gs10.01.2\bin\gswin64c.exe",
                r"C:\Program Files (x86)\gs\gs10.02.1\bin\gswin32c.exe",
            ],
            ExternalTool::Rasterizer => &[
                "gs",
                "/usr/bin/gs",
                "/usr/local/bin/gs",
                "/opt/homebrew/bin/gs",
            ],
            ExternalTool::FieldDump if cfg!(windows) => &[
                "pdftk",
                r"C:\Program Files (x86)\PDFtk\bin\pdftk.exe",
                r"C:\Program Files\PDFtk\bin\pdftk.exe",
            ],
            ExternalTool::FieldDump => &[
                "pdftk",
                "/usr/bin/pdftk",
                "/usr/local/bin/pdftk",
                "/opt/homebrew/bin/pdftk",
            ],
        }
    }
}

impl fmt::Display for ExternalTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalTool::Rasterizer => write!(f, "rasterizer"),
            ExternalTool::FieldDump => write!(f, "field dump"),
        }
    }
}

/// Resolves an [`ExternalTool`] to an executable path
pub trait ToolLocator {
    fn locate(&self, tool: ExternalTool) -> Option<PathBuf>;
}

impl<T: ToolLocator + ?Sized> ToolLocator for &T {
    fn locate(&self, tool: ExternalTool) -> Option<PathBuf> {
        (**self).locate(tool)
    }
}

impl<T: ToolLocator + ?Sized> ToolLocator for Box<T> {
    fn locate(&self, tool: ExternalTool) -> Option<PathBuf> {
        (**self).locate(tool)
    }
}

/// Probes configured extra paths, then the built-in candidates against the
/// filesystem and `PATH`
#[derive(Debug, Clone, Default)]
pub struct SystemToolLocator {
    extra: HashMap<ExternalTool, Vec<PathBuf>>,
}

impl SystemToolLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe `path` for `tool` before the built-in list
    pub fn with_extra_path(mut self, tool: ExternalTool, path: impl Into<PathBuf>) -> Self {
        self.extra.entry(tool).or_default().push(path.into());
        self
    }

    fn probe(candidate: &Path) -> Option<PathBuf> {
        if candidate.components().count() > 1 || candidate.is_absolute() {
            return candidate.is_file().then(|| candidate.to_path_buf());
        }
        let path_var = std::env::var_os("PATH")?;
        std::env::split_paths(&path_var).find_map(|dir| {
            let full = dir.join(candidate);
            if full.is_file() {
                return Some(full);
            }
            if cfg!(windows) {
                let exe = full.with_extension("exe");
                if exe.is_file() {
                    return Some(exe);
                }
            }
            None
        })
    }
}

impl ToolLocator for SystemToolLocator {
    fn locate(&self, tool: ExternalTool) -> Option<PathBuf> {
        let extra = self.extra.get(&tool).into_iter().flatten().cloned();
        let builtin = tool.candidates().iter().map(PathBuf::from);

        let found = extra.chain(builtin).find_map(|candidate| Self::probe(&candidate));
        match &found {
            Some(path) => debug!(%tool, path = %path.display(), "Located external tool"),
            None => debug!(%tool, "External tool not found"),
        }
        found
    }
}

/// Returns the same configured path for each tool, without probing
#[derive(Debug, Clone, Default)]
pub struct FixedToolLocator {
    paths: HashMap<ExternalTool, PathBuf>,
}

impl FixedToolLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tool: ExternalTool, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(tool, path.into());
        self
    }
}

impl ToolLocator for FixedToolLocator {
    fn locate(&self, tool: ExternalTool) -> Option<PathBuf> {
        self.paths.get(&tool).cloned()
    }
}

/// Finds nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToolLocator;

impl ToolLocator for NoToolLocator {
    fn locate(&self, _tool: ExternalTool) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_are_ordered() {
        let rasterizers = ExternalTool::Rasterizer.candidates();
        if cfg!(windows) {
            assert_eq!(rasterizers[0], "gswin64c");
        } else {
            assert_eq!(rasterizers[0], "gs");
        }
        assert_eq!(ExternalTool::FieldDump.candidates()[0], "pdftk");
    }

    #[test]
    fn test_extra_path_is_probed_first() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("my-gs");
        std::fs::write(&fake, b"").unwrap();

        let locator = SystemToolLocator::new().with_extra_path(ExternalTool::Rasterizer, &fake);
        assert_eq!(locator.locate(ExternalTool::Rasterizer), Some(fake));
    }

    #[test]
    fn test_missing_absolute_path_is_skipped() {
        let probed = SystemToolLocator::probe(Path::new("/definitely/not/here/gs"));
        assert_eq!(probed, None);
    }

    #[test]
    fn test_fake_locators() {
        let fixed = FixedToolLocator::new().with(ExternalTool::FieldDump, "/opt/pdftk");
        assert_eq!(
            fixed.locate(ExternalTool::FieldDump),
            Some(PathBuf::from("/opt/pdftk"))
        );
        assert_eq!(fixed.locate(ExternalTool::Rasterizer), None);
        assert_eq!(NoToolLocator.locate(ExternalTool::Rasterizer), None);
    }
}
