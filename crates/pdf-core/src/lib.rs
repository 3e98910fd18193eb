//! PDF Core - form-field extraction and page overlay composition
//!
//! This crate provides functionality for:
//! - Converting between PDF point space and top-left millimeter space
//! - Walking a PDF's page/annotation graph to recover form-field rectangles
//! - Importing source pages as immutable backdrops and drawing text over them
//! - Embedding raster page backgrounds (JPEG, PNG)
//!
//! # Example
//!
//! ```ignore
//! use pdf_core::{Backdrop, OverlayDocument, TextAlign};
//!
//! let mut doc = OverlayDocument::open("fl100.pdf")?;
//! let page = doc.import_page(1)?;
//! let mut canvas = doc.stamp(page, Backdrop::SourcePage)?;
//! canvas.cell(35.28, 25.40, 70.56, 5.0, "Jane Doe", TextAlign::Left);
//! doc.finish_page(canvas)?;
//! doc.save("filled.pdf")?;
//! ```

pub mod acroform;
pub mod coords;
mod document;
mod font;
mod image;
mod text;

pub use acroform::{
    estimate_font_size, extract_fields, extract_fields_from_path, map_field_type, AnnotationParser,
    ExtractedField, FieldKind, FieldLocation,
};
pub use coords::{MmRect, PdfRect, MM_PER_POINT, US_LETTER_HEIGHT_PT, US_LETTER_WIDTH_PT};
pub use document::{
    probe_page_count, Backdrop, ImportedPage, OverlayDocument, PageCanvas, PageStage, TextRun,
};
pub use font::{FontSpec, FontStyle};
pub use image::RasterImage;
pub use text::{CELL_PADDING_MM, DEFAULT_CELL_HEIGHT_MM};

use thiserror::Error;

/// Errors that can occur during PDF operations
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Failed to open PDF: {0}")]
    OpenError(String),

    #[error("Failed to save PDF: {0}")]
    SaveError(String),

    #[error("Invalid page number: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("PDF parsing error: {0}")]
    ParseError(String),

    #[error("PDF is encrypted")]
    Encrypted,

    #[error("Page {page} is {stage:?}; {operation} is not allowed")]
    StageViolation {
        page: usize,
        stage: PageStage,
        operation: &'static str,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Lopdf error: {0}")]
    LopdfError(#[from] lopdf::Error),
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Horizontal placement of text inside a field cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}
