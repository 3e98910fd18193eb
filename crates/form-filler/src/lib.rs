//! Form Filler - fills fixed-layout legal forms by overlaying text
//!
//! This crate provides:
//! - Field position resolution across manual overrides, the source document's
//!   own form fields, and a baseline layout for known form families
//! - Section fillers that each own a disjoint set of field keys
//! - Background rendering fallback for documents without a usable form layer
//! - Verified, uniquely named output documents
//!
//! # Example
//!
//! ```ignore
//! use form_filler::{FillRequest, FillerConfig, FormFiller};
//!
//! let config = FillerConfig::from_json_file("filler.json")?;
//! let filler = FormFiller::new(config)?;
//! let output = filler.fill(FillRequest::new(&template, values, "fl100.pdf"))?;
//! println!("{} ({} bytes)", output.path.display(), output.byte_size);
//! ```

pub mod baseline;
pub mod catalog;
pub mod config;
pub mod fill;
pub mod fillers;
pub mod matching;
pub mod output;
pub mod position;
pub mod resolver;
pub mod store;

pub use catalog::{can_generate, missing_required, FieldValues, TemplateDescriptor, TemplateField};
pub use config::{BackgroundMode, FillerConfig, OverrideMode};
pub use fill::{FillRequest, FormFiller, RenderedOutput};
pub use fillers::{FieldRender, FieldSpec, Filler, FillerRegistry, Section};
pub use matching::{similar_text, similarity_percent, FieldNameMatcher};
pub use output::OutputWriter;
pub use position::{FieldPosition, PositionSet};
pub use resolver::{PositionResolver, PositionSource, ResolvedPositions};
pub use store::PositionStore;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while filling a form
#[derive(Debug, Error)]
pub enum FillError {
    #[error("Source document not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("No {0} binary found")]
    ToolNotFound(form_tools::ExternalTool),

    #[error("Failed to parse source document: {0}")]
    ParseFailure(String),

    #[error("No position for field '{0}'")]
    PositionMissing(String),

    #[error("Output verification failed for {path}: {reason}")]
    WriteVerificationFailure { path: PathBuf, reason: String },

    #[error("No field positions could be resolved for template '{0}'")]
    ExtractionFailed(String),

    #[error("Field '{key}' is claimed by both {first} and {second}")]
    OverlappingFillers {
        key: String,
        first: Section,
        second: Section,
    },

    #[error("Source document cannot be rendered: {0}")]
    SourceUnusable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Position store error: {0}")]
    Store(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] pdf_core::PdfError),

    #[error("Tool error: {0}")]
    Tool(#[from] form_tools::ToolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fill operations
pub type Result<T> = std::result::Result<T, FillError>;
