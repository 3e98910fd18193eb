//! Filler configuration

use crate::{FillError, Result};
use form_tools::{ColorMode, ExternalTool, RasterFormat, RasterOptions, SystemToolLocator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// When to render raster page backgrounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Only when the source has no usable form layer
    #[default]
    Auto,
    Always,
    Never,
}

/// How manual overrides combine with extracted positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    /// A non-empty override set wins wholesale
    #[default]
    Replace,
    /// Override entries replace extracted entries key by key
    Merge,
}

/// Extra candidate binaries, probed before the built-in list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraToolPaths {
    #[serde(default)]
    pub rasterizer: Vec<PathBuf>,
    #[serde(default)]
    pub field_dump: Vec<PathBuf>,
}

/// Filler configuration, read from camelCase JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FillerConfig {
    /// Where rendered documents are written
    pub output_dir: PathBuf,
    /// Where page backgrounds are cached
    pub background_dir: PathBuf,
    /// Where `{templateId}_positions.json` override files live
    pub positions_dir: PathBuf,
    pub raster_dpi: u32,
    pub grayscale: bool,
    pub raster_format: RasterFormat,
    pub tool_timeout_secs: u64,
    /// Font size for positions that carry none
    pub default_font_size: f64,
    pub background_mode: BackgroundMode,
    pub override_mode: OverrideMode,
    pub extra_tool_paths: ExtraToolPaths,
}

impl Default for FillerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            background_dir: PathBuf::from("data/backgrounds"),
            positions_dir: PathBuf::from("data/positions"),
            raster_dpi: 200,
            grayscale: true,
            raster_format: RasterFormat::Png,
            tool_timeout_secs: 60,
            default_font_size: 9.0,
            background_mode: BackgroundMode::Auto,
            override_mode: OverrideMode::Replace,
            extra_tool_paths: ExtraToolPaths::default(),
        }
    }
}

impl FillerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values no renderer can work with
    pub fn validate(&self) -> Result<()> {
        if !(36..=1200).contains(&self.raster_dpi) {
            return Err(FillError::Config(format!(
                "rasterDpi must be between 36 and 1200, got {}",
                self.raster_dpi
            )));
        }
        if self.tool_timeout_secs == 0 {
            return Err(FillError::Config("toolTimeoutSecs must be positive".to_string()));
        }
        if !(self.default_font_size > 0.0 && self.default_font_size <= 72.0) {
            return Err(FillError::Config(format!(
                "defaultFontSize must be in (0, 72], got {}",
                self.default_font_size
            )));
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            dpi: self.raster_dpi,
            color: if self.grayscale {
                ColorMode::Grayscale
            } else {
                ColorMode::Color
            },
            format: self.raster_format,
            timeout: self.tool_timeout(),
        }
    }

    /// System locator seeded with the configured extra paths
    pub fn tool_locator(&self) -> SystemToolLocator {
        let mut locator = SystemToolLocator::new();
        for path in &self.extra_tool_paths.rasterizer {
            locator = locator.with_extra_path(ExternalTool::Rasterizer, path);
        }
        for path in &self.extra_tool_paths.field_dump {
            locator = locator.with_extra_path(ExternalTool::FieldDump, path);
        }
        locator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = FillerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, FillerConfig::default());
        assert_eq!(config.raster_options().dpi, 200);
        assert_eq!(config.raster_options().color, ColorMode::Grayscale);
    }

    #[test]
    fn test_camel_case_fields() {
        let config = FillerConfig::from_json_str(
            r#"{
                "outputDir": "/srv/out",
                "rasterDpi": 150,
                "grayscale": false,
                "rasterFormat": "jpeg",
                "backgroundMode": "always",
                "overrideMode": "merge",
                "extraToolPaths": { "rasterizer": ["/opt/gs/bin/gs"] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.background_mode, BackgroundMode::Always);
        assert_eq!(config.override_mode, OverrideMode::Merge);
        assert_eq!(config.raster_options().format, RasterFormat::Jpeg);
        assert_eq!(config.raster_options().color, ColorMode::Color);
        assert_eq!(config.extra_tool_paths.rasterizer.len(), 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            FillerConfig::from_json_str(r#"{"rasterDpi": 5}"#),
            Err(FillError::Config(_))
        ));
        assert!(matches!(
            FillerConfig::from_json_str(r#"{"toolTimeoutSecs": 0}"#),
            Err(FillError::Config(_))
        ));
        assert!(matches!(
            FillerConfig::from_json_str(r#"{"backgroundMode": "sometimes"}"#),
            Err(FillError::Json(_))
        ));
    }
}
