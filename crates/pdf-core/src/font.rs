//! Standard Type1 font handling
//!
//! Overlay text uses the base-14 Helvetica family with WinAnsiEncoding, so no
//! font program is embedded. Widths come from the Adobe core AFM metrics.

use lopdf::{dictionary, Dictionary};

/// Font style, as stored in position records ("", "B", "I", "BI")
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FontStyle {
    #[default]
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    /// Parse the style letters used by position records
    ///
    /// Unknown letters are ignored, so `"U"` (underline) reads as regular.
    pub fn from_code(code: &str) -> Self {
        let upper = code.to_ascii_uppercase();
        match (upper.contains('B'), upper.contains('I')) {
            (true, true) => FontStyle::BoldItalic,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (false, false) => FontStyle::Regular,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            FontStyle::Regular => "",
            FontStyle::Bold => "B",
            FontStyle::Italic => "I",
            FontStyle::BoldItalic => "BI",
        }
    }

    /// PostScript name of the matching Helvetica face
    pub fn base_font(&self) -> &'static str {
        match self {
            FontStyle::Regular => "Helvetica",
            FontStyle::Bold => "Helvetica-Bold",
            FontStyle::Italic => "Helvetica-Oblique",
            FontStyle::BoldItalic => "Helvetica-BoldOblique",
        }
    }

    /// Page resource name for this face
    pub(crate) fn resource_name(&self) -> &'static str {
        match self {
            FontStyle::Regular => "Hv",
            FontStyle::Bold => "HvB",
            FontStyle::Italic => "HvI",
            FontStyle::BoldItalic => "HvBI",
        }
    }

    pub(crate) const ALL: [FontStyle; 4] = [
        FontStyle::Regular,
        FontStyle::Bold,
        FontStyle::Italic,
        FontStyle::BoldItalic,
    ];

    pub(crate) fn font_dictionary(&self) -> Dictionary {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => self.base_font(),
            "Encoding" => "WinAnsiEncoding",
        }
    }

    fn is_bold(&self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }
}

/// Font selection for a text cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub style: FontStyle,
    /// Size in points
    pub size: f64,
}

impl FontSpec {
    pub fn new(style: FontStyle, size: f64) -> Self {
        Self { style, size }
    }

    /// Advance width of `text` in points
    pub fn text_width_points(&self, text: &str) -> f64 {
        let units: u32 = encode_win_ansi(text)
            .iter()
            .map(|&b| glyph_width(b, self.style.is_bold()) as u32)
            .sum();
        units as f64 * self.size / 1000.0
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::new(FontStyle::Regular, 9.0)
    }
}

/// Encode text as WinAnsi bytes; characters outside Latin-1 become `?`
pub(crate) fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            0x2018 | 0x2019 => b'\'',
            0x201C | 0x201D => b'"',
            0x2013 | 0x2014 => b'-',
            _ => b'?',
        })
        .collect()
}

// Helvetica and Helvetica-Bold widths for 0x20..=0x7E (1/1000 em)
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0x30
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 0x50
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 0x60
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 0x70
];

fn glyph_width(byte: u8, bold: bool) -> u16 {
    let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
    match byte {
        0x20..=0x7E => table[(byte - 0x20) as usize],
        // Latin-1 letters are mostly accented forms of the ASCII ones
        _ => 556,
    }
}
