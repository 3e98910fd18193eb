//! Unit and axis conversions between PDF point space and rendering space
//!
//! PDF user space measures points from the bottom-left corner of the page.
//! Rendering space measures millimeters from the top-left corner. Every
//! conversion in the workspace goes through this module.

/// Millimeters per PDF point
pub const MM_PER_POINT: f64 = 0.352778;

/// US Letter width in points
pub const US_LETTER_WIDTH_PT: f64 = 612.0;

/// US Letter height in points, used when a page has no readable MediaBox
pub const US_LETTER_HEIGHT_PT: f64 = 792.0;

/// Convert points to millimeters (unrounded)
pub fn points_to_mm(points: f64) -> f64 {
    points * MM_PER_POINT
}

/// Convert millimeters to points (unrounded)
pub fn mm_to_points(mm: f64) -> f64 {
    mm / MM_PER_POINT
}

/// Round to two decimal places, halves away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Flip a top-origin millimeter Y into a bottom-origin point Y
pub fn top_mm_to_pdf_y(y_mm: f64, page_height_pt: f64) -> f64 {
    page_height_pt - mm_to_points(y_mm)
}

/// Annotation rectangle `[x1 y1 x2 y2]` in points, bottom-left origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl PdfRect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from four numbers, normalizing so `x1 <= x2` and `y1 <= y2`
    ///
    /// Returns `None` when fewer than four values are supplied.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.len() < 4 {
            return None;
        }
        Some(Self {
            x1: values[0].min(values[2]),
            y1: values[1].min(values[3]),
            x2: values[0].max(values[2]),
            y2: values[1].max(values[3]),
        })
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Convert into rendering space on a page `page_height_pt` tall whose
    /// MediaBox starts at the origin
    pub fn to_mm(&self, page_height_pt: f64) -> MmRect {
        self.to_page_mm(&PdfRect::new(0.0, 0.0, 0.0, page_height_pt))
    }

    /// Convert into rendering space measured from the top-left corner of
    /// `page_box`, the page's normalized MediaBox
    ///
    /// `y2` is the field's top edge in PDF space, so the flipped Y is
    /// measured from it with no further height correction.
    pub fn to_page_mm(&self, page_box: &PdfRect) -> MmRect {
        MmRect {
            x: round2(points_to_mm(self.x1) - points_to_mm(page_box.x1)),
            y: round2(points_to_mm(page_box.y2) - points_to_mm(self.y2)),
            width: round2(points_to_mm(self.width())),
            height: round2(points_to_mm(self.height())),
        }
    }
}

/// Field box in millimeters, top-left origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl MmRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from a top-left box measured in points (legacy layouts)
    pub fn from_top_left_points(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: round2(points_to_mm(x)),
            y: round2(points_to_mm(y)),
            width: round2(points_to_mm(width)),
            height: round2(points_to_mm(height)),
        }
    }

    /// Inverse of [`PdfRect::to_mm`]
    pub fn to_pdf_rect(&self, page_height_pt: f64) -> PdfRect {
        let x1 = mm_to_points(self.x);
        let y2 = page_height_pt - mm_to_points(self.y);
        PdfRect {
            x1,
            y1: y2 - mm_to_points(self.height),
            x2: x1 + mm_to_points(self.width),
            y2,
        }
    }

    /// Whether the box lies inside a page of the given millimeter size
    pub fn fits_within(&self, page_width_mm: f64, page_height_mm: f64) -> bool {
        // two-decimal rounding can push an edge-hugging box out by 0.01mm
        const SLACK: f64 = 0.01;
        self.x >= -SLACK
            && self.y >= -SLACK
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= page_width_mm + SLACK
            && self.y + self.height <= page_height_mm + SLACK
    }
}
