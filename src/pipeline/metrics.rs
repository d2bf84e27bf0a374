//! Glyph widths for the two standard PDF fonts the report uses.
//!
//! Widths come from the Adobe Core14 AFM files, in 1/1000 em, for the
//! printable ASCII range. Latin-1 letters above 0x7F fall back to the width
//! of a digit; the report only needs them to be close for centering and
//! line fitting.

use crate::pipeline::layout::{Font, PT_PER_MM};

/// Width used for characters outside the ASCII table.
const FALLBACK_WIDTH: u16 = 556;

/// Helvetica, chars 0x20..=0x7E.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica-Bold, chars 0x20..=0x7E.
#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Advance width of `c` in 1/1000 em.
pub fn glyph_width(font: Font, c: char) -> u16 {
    let table = match font {
        Font::Helvetica => &HELVETICA,
        Font::HelveticaBold => &HELVETICA_BOLD,
    };
    match c as u32 {
        code @ 0x20..=0x7E => table[(code - 0x20) as usize],
        _ => FALLBACK_WIDTH,
    }
}

/// Width of `text` in millimetres when set in `font` at `size_pt`.
pub fn string_width_mm(text: &str, font: Font, size_pt: f64) -> f64 {
    let units: u32 = text.chars().map(|c| u32::from(glyph_width(font, c))).sum();
    f64::from(units) * size_pt / 1000.0 / PT_PER_MM
}
