//! Text cell layout and content-stream operators

use crate::coords::MM_PER_POINT;
use crate::TextAlign;

/// Cell height used when a position record carries none, in mm
pub const DEFAULT_CELL_HEIGHT_MM: f64 = 5.0;

/// Inner horizontal padding of a cell, in mm
pub const CELL_PADDING_MM: f64 = 1.0;

/// Where text starts inside a cell
///
/// Returns `(x, baseline)` in top-left millimeter space. The baseline is
/// vertically centered: half the cell height plus 0.3 of the font size.
pub fn cell_text_origin(
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    text_width: f64,
    font_size_pt: f64,
    align: TextAlign,
) -> (f64, f64) {
    let height = if height > 0.0 {
        height
    } else {
        DEFAULT_CELL_HEIGHT_MM
    };
    let text_x = x + calculate_x_offset(text_width, width, align);
    let baseline = y + height / 2.0 + 0.3 * font_size_pt * MM_PER_POINT;
    (text_x, baseline)
}

/// Horizontal offset of text within a cell of `container_width`
pub fn calculate_x_offset(text_width: f64, container_width: f64, align: TextAlign) -> f64 {
    match align {
        TextAlign::Left => CELL_PADDING_MM,
        TextAlign::Center => (container_width - text_width) / 2.0,
        TextAlign::Right => container_width - CELL_PADDING_MM - text_width,
    }
}

/// Hex string operand for `Tj`, e.g. `<4A6F>`
pub fn hex_operand(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 2);
    out.push('<');
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out.push('>');
    out
}

/// Generate `BT ... ET` operators placing `text_hex` with its baseline at
/// `(x, y)` in PDF points
pub fn generate_text_operators(
    text_hex: &str,
    x: f64,
    y: f64,
    font_resource: &str,
    font_size: f64,
) -> Vec<u8> {
    let mut ops = String::new();

    ops.push_str("BT\n");
    ops.push_str("0 0 0 rg\n");
    ops.push_str(&format!("/{font_resource} {} Tf\n", fmt_num(font_size)));
    ops.push_str(&format!("{} {} Td\n", fmt_num(x), fmt_num(y)));
    ops.push_str(&format!("{text_hex} Tj\n"));
    ops.push_str("ET\n");

    ops.into_bytes()
}

/// Format a number for a content stream: at most 3 decimals, no trailing zeros
pub(crate) fn fmt_num(value: f64) -> String {
    let s = format!("{value:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
