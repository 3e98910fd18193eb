//! Per-page background rasterization
//!
//! Source pages are rendered one at a time by an external converter into
//! `{cleanTemplateId}_page{N}_background.{ext}`. Every page is written to a
//! temporary file first and renamed into place, so a cancelled or failed run
//! never leaves a partial image behind.

use crate::locator::{ExternalTool, ToolLocator};
use crate::process::{run_with_timeout, CancellationToken};
use crate::{Result, ToolError};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Image file format for backgrounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterFormat {
    #[default]
    Png,
    Jpeg,
}

impl RasterFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpg",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorMode {
    #[default]
    Grayscale,
    Color,
}

/// Rendering parameters
#[derive(Debug, Clone)]
pub struct RasterOptions {
    pub dpi: u32,
    pub color: ColorMode,
    pub format: RasterFormat,
    /// Per-page limit for the converter process
    pub timeout: Duration,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dpi: 200,
            color: ColorMode::Grayscale,
            format: RasterFormat::Png,
            timeout: Duration::from_secs(60),
        }
    }
}

impl RasterOptions {
    /// Output device name for the converter
    pub fn device(&self) -> &'static str {
        match (self.format, self.color) {
            (RasterFormat::Png, ColorMode::Color) => "png16m",
            (RasterFormat::Png, ColorMode::Grayscale) => "pnggray",
            (RasterFormat::Jpeg, ColorMode::Color) => "jpeg",
            (RasterFormat::Jpeg, ColorMode::Grayscale) => "jpeggray",
        }
    }
}

/// A rendered page background
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBackground {
    pub template_id: String,
    pub page: usize,
    pub path: PathBuf,
}

/// Normalize a template id for use in file names
///
/// A leading `t_` prefix is dropped and anything outside `[A-Za-z0-9_-]`
/// becomes `_`.
pub fn clean_template_id(template_id: &str) -> String {
    let trimmed = template_id.strip_prefix("t_").unwrap_or(template_id);
    let cleaned: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "template".to_string()
    } else {
        cleaned
    }
}

/// Renders source pages into background images
pub struct BackgroundRasterizer<L> {
    locator: L,
    output_dir: PathBuf,
    options: RasterOptions,
}

impl<L: ToolLocator> BackgroundRasterizer<L> {
    pub fn new(locator: L, output_dir: impl Into<PathBuf>, options: RasterOptions) -> Self {
        Self {
            locator,
            output_dir: output_dir.into(),
            options,
        }
    }

    pub fn options(&self) -> &RasterOptions {
        &self.options
    }

    /// Whether a converter can be found at all
    pub fn is_available(&self) -> bool {
        self.locator.locate(ExternalTool::Rasterizer).is_some()
    }

    pub fn file_name(&self, template_id: &str, page: usize) -> String {
        format!(
            "{}_page{}_background.{}",
            clean_template_id(template_id),
            page,
            self.options.format.extension()
        )
    }

    /// Path of an existing background for `page`, if one was rendered before
    pub fn background_path(&self, template_id: &str, page: usize) -> Option<PathBuf> {
        let path = self.output_dir.join(self.file_name(template_id, page));
        path.is_file().then_some(path)
    }

    /// Whether every page `1..=page_count` already has a background
    pub fn has_all_backgrounds(&self, template_id: &str, page_count: usize) -> bool {
        page_count > 0
            && (1..=page_count).all(|page| self.background_path(template_id, page).is_some())
    }

    /// Existing backgrounds for `1..=page_count`, in page order
    pub fn cached(&self, template_id: &str, page_count: usize) -> Vec<PageBackground> {
        (1..=page_count)
            .filter_map(|page| {
                self.background_path(template_id, page).map(|path| PageBackground {
                    template_id: template_id.to_string(),
                    page,
                    path,
                })
            })
            .collect()
    }

    /// Render every page of `source`
    ///
    /// Returns an empty set when no converter is installed. A page whose
    /// conversion fails is logged and skipped; a timeout or cancellation
    /// stops the run and is returned, leaving finished pages in place.
    pub fn render_all(
        &self,
        source: &Path,
        template_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<PageBackground>> {
        if !source.is_file() {
            return Err(ToolError::SourceNotFound(source.to_path_buf()));
        }

        let Some(tool) = self.locator.locate(ExternalTool::Rasterizer) else {
            warn!(template = template_id, "No rasterizer found, skipping backgrounds");
            return Ok(Vec::new());
        };

        std::fs::create_dir_all(&self.output_dir)?;

        let page_count = pdf_core::probe_page_count(source).unwrap_or_else(|e| {
            warn!(error = %e, "Could not count pages, assuming 1");
            1
        });

        let start = Instant::now();
        let mut backgrounds = Vec::with_capacity(page_count);
        for page in 1..=page_count {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(ToolError::Cancelled);
            }

            match self.render_page(&tool, source, template_id, page, cancel) {
                Ok(background) => backgrounds.push(background),
                Err(e @ (ToolError::Cancelled | ToolError::TimedOut { .. })) => return Err(e),
                Err(e) => warn!(page, error = %e, "Background render failed"),
            }
        }

        info!(
            template = template_id,
            pages = backgrounds.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rendered page backgrounds"
        );
        Ok(backgrounds)
    }

    /// Render a single page with the converter at `tool`
    pub fn render_page(
        &self,
        tool: &Path,
        source: &Path,
        template_id: &str,
        page: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<PageBackground> {
        let final_path = self.output_dir.join(self.file_name(template_id, page));
        let temp_path = tempfile::Builder::new()
            .prefix(".render-")
            .suffix(&format!(".{}", self.options.format.extension()))
            .tempfile_in(&self.output_dir)?
            .into_temp_path();

        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(temp_path.as_os_str());

        let mut args: Vec<OsString> = vec![
            "-dSAFER".into(),
            "-dBATCH".into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            format!("-sDEVICE={}", self.options.device()).into(),
            format!("-r{}", self.options.dpi).into(),
            format!("-dFirstPage={page}").into(),
            format!("-dLastPage={page}").into(),
        ];
        if self.options.format == RasterFormat::Jpeg {
            args.push("-dJPEGQ=90".into());
        }
        args.push(output_arg);
        args.push(source.as_os_str().to_owned());

        run_with_timeout(tool, &args, self.options.timeout, cancel)?;

        let size = std::fs::metadata(&temp_path)?.len();
        if size == 0 {
            return Err(ToolError::Failed {
                program: tool.display().to_string(),
                status: "exit status: 0".to_string(),
                stderr: format!("no image written for page {page}"),
            });
        }

        temp_path.persist(&final_path).map_err(|e| ToolError::Io(e.error))?;
        debug!(page, path = %final_path.display(), bytes = size, "Wrote page background");

        Ok(PageBackground {
            template_id: template_id.to_string(),
            page,
            path: final_path,
        })
    }
}
