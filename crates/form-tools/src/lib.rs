//! Form Tools - external converters used by the form filler
//!
//! This crate wraps the command-line tools the filler shells out to:
//! - Locating candidate binaries at runtime behind the [`ToolLocator`] trait
//! - Running them with an explicit timeout and cooperative cancellation
//! - Rasterizing source pages into per-page background images
//! - Recovering field names and types from a field dump tool

pub mod field_dump;
pub mod locator;
pub mod process;
pub mod raster;

pub use field_dump::{parse_dump_output, DumpedField, FieldNameDump};
pub use locator::{ExternalTool, FixedToolLocator, NoToolLocator, SystemToolLocator, ToolLocator};
pub use process::{run_with_timeout, CancellationToken, ToolOutput};
pub use raster::{
    clean_template_id, BackgroundRasterizer, ColorMode, PageBackground, RasterFormat,
    RasterOptions,
};

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from external tool invocations
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("No {0} binary found")]
    NotFound(ExternalTool),

    #[error("Source document not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Source document is password protected: {0}")]
    PasswordProtected(PathBuf),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Whether the same invocation may succeed if simply repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::TimedOut { .. })
    }
}

/// Result type for tool operations
pub type Result<T> = std::result::Result<T, ToolError>;
