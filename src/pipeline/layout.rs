//! Report layout: decide where every string and the chart go, page by page.
//!
//! Layout is computed in millimetres from the top-left corner with a small
//! cursor-based flow engine (classic FPDF semantics): cells advance a vertical
//! cursor, and any cell that would cross the break line opens a new page.
//! Producing a plain [`ReportLayout`] value, separate from PDF serialisation in
//! [`crate::pipeline::report`], keeps the arithmetic unit-testable.
//!
//! ## Page structure
//!
//! ```text
//!  y=10   ┌──────── Chart Analysis Report ────────┐  bold 18pt, 15mm cell
//!  y=25   │            Uploaded Chart             │  bold 14pt, 10mm cell
//!  y=35   │ ┌───────────────────────────────────┐ │
//!         │ │  chart, 180mm wide, aspect kept   │ │
//!         │ └───────────────────────────────────┘ │
//!  +10mm  │ AI-Generated Insights                 │  bold 14pt, 10mm cell
//!         │ body text, 12pt, 8mm per line ...     │  flows onto new pages
//! ```

use crate::pipeline::metrics::{glyph_width, string_width_mm};
use crate::prompts::{IMAGE_SECTION_LABEL, INSIGHTS_SECTION_LABEL, REPORT_TITLE};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;

/// PostScript points per millimetre.
pub const PT_PER_MM: f64 = 72.0 / 25.4;

/// Left, top and right page margin.
pub const MARGIN_MM: f64 = 10.0;
/// Distance from the bottom edge at which content breaks to a new page.
pub const BREAK_MARGIN_MM: f64 = 20.0;
/// Horizontal padding inside a left-aligned cell.
pub const CELL_PADDING_MM: f64 = 1.0;

/// Fixed display width of the chart.
pub const IMAGE_WIDTH_MM: f64 = 180.0;
/// Fixed vertical offset of the chart.
pub const IMAGE_TOP_MM: f64 = 35.0;
/// Gap between the chart and the insights label.
pub const IMAGE_GAP_MM: f64 = 10.0;

/// Column width used to pre-wrap the analysis text.
pub const WRAP_COLUMNS: usize = 90;
/// Tab stop interval when wrapping.
const TAB_WIDTH: usize = 8;
/// Height consumed by each body line.
pub const LINE_HEIGHT_MM: f64 = 8.0;

const TITLE_SIZE_PT: f64 = 18.0;
const TITLE_CELL_MM: f64 = 15.0;
const SECTION_SIZE_PT: f64 = 14.0;
const SECTION_CELL_MM: f64 = 10.0;
const BODY_SIZE_PT: f64 = 12.0;

/// Report page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210 × 297 mm (default).
    #[default]
    A4,
    /// 8.5 × 11 in (215.9 × 279.4 mm).
    Letter,
}

impl PageSize {
    /// `(width, height)` in millimetres.
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
        }
    }

    pub fn width_mm(self) -> f64 {
        self.dimensions_mm().0
    }

    pub fn height_mm(self) -> f64 {
        self.dimensions_mm().1
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            other => Err(format!("unknown page size '{other}' (expected a4 or letter)")),
        }
    }
}

/// One of the two standard fonts the report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

impl Font {
    /// PostScript base font name.
    pub fn base_font(self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Name of the font in each page's resource dictionary.
    pub fn resource_name(self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
        }
    }
}

/// A single line of text placed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Left edge of the text, mm from the page's left edge.
    pub x: f64,
    /// Baseline, mm from the page's top edge.
    pub baseline: f64,
    pub font: Font,
    pub size_pt: f64,
    pub text: String,
}

/// Where the chart is drawn, in mm from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Something drawn on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(TextRun),
    Image(ImageBox),
}

/// The elements of one page, in drawing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub elements: Vec<Element>,
}

/// The full report layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub page_size: PageSize,
    pub pages: Vec<Page>,
}

impl ReportLayout {
    /// The chart placement and the index of the page it is on.
    pub fn image(&self) -> Option<(usize, ImageBox)> {
        self.pages.iter().enumerate().find_map(|(i, page)| {
            page.elements.iter().find_map(|el| match el {
                Element::Image(b) => Some((i, *b)),
                Element::Text(_) => None,
            })
        })
    }

    /// Every text run with the index of its page.
    pub fn text_runs(&self) -> impl Iterator<Item = (usize, &TextRun)> + '_ {
        self.pages.iter().enumerate().flat_map(|(i, page)| {
            page.elements.iter().filter_map(move |el| match el {
                Element::Text(t) => Some((i, t)),
                Element::Image(_) => None,
            })
        })
    }

    /// First text run whose content equals `text`.
    pub fn find_text(&self, text: &str) -> Option<(usize, &TextRun)> {
        self.text_runs().find(|(_, t)| t.text == text)
    }

    /// Body lines, i.e. runs set in the regular face.
    pub fn body_lines(&self) -> impl Iterator<Item = (usize, &TextRun)> + '_ {
        self.text_runs().filter(|(_, t)| t.font == Font::Helvetica)
    }
}

/// Compute the chart box: fixed width, aspect ratio preserved, centered.
pub fn place_image(page_width_mm: f64, image_width: u32, image_height: u32) -> ImageBox {
    let ratio = f64::from(image_height) / f64::from(image_width.max(1));
    ImageBox {
        x: (page_width_mm - IMAGE_WIDTH_MM) / 2.0,
        y: IMAGE_TOP_MM,
        width: IMAGE_WIDTH_MM,
        height: IMAGE_WIDTH_MM * ratio,
    }
}

/// Lay out the whole report for a chart of `image_width × image_height` px.
///
/// `analysis` must already be Latin-1 (see [`crate::pipeline::extract`]).
/// An empty analysis produces no body lines.
pub fn plan_report(
    image_width: u32,
    image_height: u32,
    analysis: &str,
    page_size: PageSize,
) -> ReportLayout {
    let mut flow = Flow::new(page_size);

    flow.cell(
        TITLE_CELL_MM,
        REPORT_TITLE,
        Font::HelveticaBold,
        TITLE_SIZE_PT,
        Align::Center,
    );
    flow.cell(
        SECTION_CELL_MM,
        IMAGE_SECTION_LABEL,
        Font::HelveticaBold,
        SECTION_SIZE_PT,
        Align::Center,
    );

    // Explicitly positioned: the chart never triggers a page break itself.
    let image = place_image(page_size.width_mm(), image_width, image_height);
    flow.image(image);
    flow.set_xy(MARGIN_MM, image.y + image.height + IMAGE_GAP_MM);

    flow.cell(
        SECTION_CELL_MM,
        INSIGHTS_SECTION_LABEL,
        Font::HelveticaBold,
        SECTION_SIZE_PT,
        Align::Left,
    );

    for line in wrap_text(analysis, WRAP_COLUMNS) {
        flow.multi_cell(LINE_HEIGHT_MM, &line, Font::Helvetica, BODY_SIZE_PT);
    }

    ReportLayout {
        page_size,
        pages: flow.pages,
    }
}

/// Greedy word wrap to `width` characters.
///
/// Tabs expand to 8-column stops and every other ASCII whitespace character
/// becomes one space; interior runs are kept as they are. Whitespace is
/// dropped where a line ends and where a continuation line would begin.
/// Chunks longer than `width` fill the rest of the current line and are then
/// split into `width`-sized pieces. Hyphenated words stay whole. Empty or
/// blank input yields no lines.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut chunks: VecDeque<Vec<char>> = split_chunks(&expand_whitespace(text)).into();
    let mut lines = Vec::new();

    while !chunks.is_empty() {
        if !lines.is_empty() && chunks.front().is_some_and(|c| is_blank(c)) {
            chunks.pop_front();
        }

        let mut line: Vec<Vec<char>> = Vec::new();
        let mut line_len = 0usize;
        while let Some(chunk) = chunks.front() {
            if line_len + chunk.len() > width {
                break;
            }
            line_len += chunk.len();
            line.extend(chunks.pop_front());
        }

        // Over-long chunk: top up the current line with its head.
        if let Some(chunk) = chunks.front_mut() {
            if chunk.len() > width {
                let head: Vec<char> = chunk.drain(..width - line_len).collect();
                line.push(head);
            }
        }

        if line.last().is_some_and(|c| is_blank(c)) {
            line.pop();
        }
        let text: String = line.into_iter().flatten().collect();
        if !text.is_empty() {
            lines.push(text);
        }
    }
    lines
}

fn is_wrap_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

fn is_blank(chunk: &[char]) -> bool {
    chunk.iter().all(|&c| c == ' ')
}

/// Expand tabs to 8-column stops, then turn all whitespace into spaces.
fn expand_whitespace(text: &str) -> Vec<char> {
    let mut out = Vec::with_capacity(text.len());
    let mut column = 0usize;
    for c in text.chars() {
        match c {
            '\t' => {
                let pad = TAB_WIDTH - column % TAB_WIDTH;
                out.extend(std::iter::repeat(' ').take(pad));
                column += pad;
            }
            '\n' | '\r' => {
                out.push(' ');
                column = 0;
            }
            c if is_wrap_space(c) => {
                out.push(' ');
                column += 1;
            }
            c => {
                out.push(c);
                column += 1;
            }
        }
    }
    out
}

/// Alternating runs of spaces and non-spaces.
fn split_chunks(chars: &[char]) -> Vec<Vec<char>> {
    let mut chunks: Vec<Vec<char>> = Vec::new();
    for &c in chars {
        match chunks.last_mut() {
            Some(last) if (last[0] == ' ') == (c == ' ') => last.push(c),
            _ => chunks.push(vec![c]),
        }
    }
    chunks
}

/// Split `text` so that every piece fits `max_width_mm` in the given font.
///
/// Breaks at the last space that fits; a single word wider than the column
/// is broken between characters. Always returns at least one piece.
pub fn fit_to_width(text: &str, max_width_mm: f64, font: Font, size_pt: f64) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let scale = size_pt / 1000.0 / PT_PER_MM;
    let mut pieces = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    let mut last_space: Option<usize> = None;
    let mut width = 0.0;

    while i < chars.len() {
        let c = chars[i];
        if c == ' ' {
            last_space = Some(i);
        }
        width += f64::from(glyph_width(font, c)) * scale;

        if width > max_width_mm {
            match last_space {
                Some(sp) => {
                    pieces.push(chars[start..sp].iter().collect());
                    start = sp + 1;
                }
                None => {
                    let end = if i == start { i + 1 } else { i };
                    pieces.push(chars[start..end].iter().collect());
                    start = end;
                }
            }
            i = start;
            last_space = None;
            width = 0.0;
            continue;
        }
        i += 1;
    }

    if start < chars.len() || pieces.is_empty() {
        pieces.push(chars[start..].iter().collect());
    }
    pieces
}

// ── Flow engine ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Align {
    Left,
    Center,
}

/// Cursor state while laying out pages.
struct Flow {
    width: f64,
    height: f64,
    x: f64,
    y: f64,
    pages: Vec<Page>,
}

impl Flow {
    fn new(page_size: PageSize) -> Self {
        let (width, height) = page_size.dimensions_mm();
        let mut flow = Self {
            width,
            height,
            x: MARGIN_MM,
            y: MARGIN_MM,
            pages: Vec::new(),
        };
        flow.add_page();
        flow
    }

    fn add_page(&mut self) {
        self.pages.push(Page::default());
        self.x = MARGIN_MM;
        self.y = MARGIN_MM;
    }

    fn break_line(&self) -> f64 {
        self.height - BREAK_MARGIN_MM
    }

    /// Open a new page if a cell of height `h` would cross the break line.
    fn ensure_room(&mut self, h: f64) {
        if self.y + h > self.break_line() {
            let x = self.x;
            self.add_page();
            self.x = x;
        }
    }

    fn push(&mut self, element: Element) {
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    fn set_xy(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    fn image(&mut self, b: ImageBox) {
        self.push(Element::Image(b));
    }

    /// A full-width cell; moves the cursor to the start of the next line.
    fn cell(&mut self, h: f64, text: &str, font: Font, size_pt: f64, align: Align) {
        self.ensure_room(h);
        let w = self.width - MARGIN_MM - self.x;
        let dx = match align {
            Align::Left => CELL_PADDING_MM,
            Align::Center => (w - string_width_mm(text, font, size_pt)) / 2.0,
        };
        let baseline = self.y + 0.5 * h + 0.3 * size_pt / PT_PER_MM;
        self.push(Element::Text(TextRun {
            x: self.x + dx,
            baseline,
            font,
            size_pt,
            text: text.to_string(),
        }));
        self.y += h;
        self.x = MARGIN_MM;
    }

    /// Left-aligned text that re-wraps to the printable width.
    fn multi_cell(&mut self, h: f64, text: &str, font: Font, size_pt: f64) {
        let w = self.width - MARGIN_MM - self.x;
        let max = w - 2.0 * CELL_PADDING_MM;
        for piece in fit_to_width(text, max, font, size_pt) {
            self.cell(h, &piece, font, size_pt, Align::Left);
        }
    }
}
