//! PDF serialisation: turn a [`ReportLayout`] into bytes with lopdf.
//!
//! The document uses only the standard Type1 Helvetica faces with
//! WinAnsiEncoding, so nothing is embedded except the chart. The chart is
//! embedded once as raw 8-bit RGB samples, zlib-compressed (`FlateDecode`),
//! and drawn on the first page. The embed is lossless and has no dimension
//! limit beyond what the PDF reader accepts. Transparent pixels are composited
//! onto white first, matching how the chart looks on the page background.

use crate::error::ReportError;
use crate::pipeline::layout::{
    plan_report, Element, Font, ImageBox, Page, PageSize, ReportLayout, TextRun, PT_PER_MM,
};
use crate::prompts::REPORT_TITLE;
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::path::Path;
use tracing::debug;

/// XObject resource name of the chart.
const IMAGE_RESOURCE: &str = "Im1";

/// Lay out and write the report to `output_path`.
///
/// Returns the number of bytes written.
///
/// # Errors
/// [`ReportError::WriteFailed`] when `output_path` cannot be written;
/// [`ReportError::Pdf`] if serialisation fails.
pub fn build_report(
    image: &DynamicImage,
    analysis: &str,
    page_size: PageSize,
    output_path: &Path,
) -> Result<u64, ReportError> {
    let bytes = render_pdf(image, analysis, page_size)?;
    std::fs::write(output_path, &bytes).map_err(|source| ReportError::WriteFailed {
        path: output_path.to_path_buf(),
        source,
    })?;
    debug!(
        "Wrote report {} ({} bytes)",
        output_path.display(),
        bytes.len()
    );
    Ok(bytes.len() as u64)
}

/// Render the report to an in-memory PDF.
pub fn render_pdf(
    image: &DynamicImage,
    analysis: &str,
    page_size: PageSize,
) -> Result<Vec<u8>, ReportError> {
    let layout = plan_report(image.width(), image.height(), analysis, page_size);
    let flattened = flatten_alpha(image);
    debug!(
        "Report layout: {} page(s), chart {}x{} px",
        layout.pages.len(),
        image.width(),
        image.height()
    );
    serialize(&layout, flattened)
}

/// Composite every pixel onto a white background.
fn flatten_alpha(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| -> u8 {
            let a = u16::from(a);
            ((u16::from(c) * a + 255 * (255 - a)) / 255) as u8
        };
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Image XObject holding `pixels` as Flate-compressed DeviceRGB samples.
fn image_xobject(pixels: RgbImage) -> Result<Stream, ReportError> {
    let (width, height) = pixels.dimensions();
    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        pixels.into_raw(),
    );
    // Sets /Filter /FlateDecode unless compression would not shrink the data.
    stream.compress().map_err(pdf_err)?;
    Ok(stream)
}

fn pdf_err(e: impl std::fmt::Display) -> ReportError {
    ReportError::Pdf(e.to_string())
}

fn mm_to_pt(mm: f64) -> f32 {
    (mm * PT_PER_MM) as f32
}

fn font_dictionary(font: Font) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn serialize(layout: &ReportLayout, chart: RgbImage) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(font_dictionary(Font::Helvetica));
    let bold_id = doc.add_object(font_dictionary(Font::HelveticaBold));
    let image_id = doc.add_object(image_xobject(chart)?);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            Font::Helvetica.resource_name() => regular_id,
            Font::HelveticaBold.resource_name() => bold_id,
        },
        "XObject" => dictionary! {
            IMAGE_RESOURCE => image_id,
        },
    });

    let (width_mm, height_mm) = layout.page_size.dimensions_mm();
    let mut kids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let content = Content {
            operations: page_operations(page, height_mm),
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(pdf_err)?,
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => layout.pages.len() as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            mm_to_pt(width_mm).into(),
            mm_to_pt(height_mm).into(),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(REPORT_TITLE),
        "Producer" => Object::string_literal(concat!("chart-insight ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Info", info_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(pdf_err)?;
    Ok(buf)
}

/// Content-stream operators for one page. PDF space has its origin at the
/// bottom-left, so every top-based mm coordinate is flipped.
fn page_operations(page: &Page, page_height_mm: f64) -> Vec<Operation> {
    let mut ops = Vec::new();
    for element in &page.elements {
        match element {
            Element::Image(b) => push_image(&mut ops, b, page_height_mm),
            Element::Text(t) => push_text(&mut ops, t, page_height_mm),
        }
    }
    ops
}

fn push_image(ops: &mut Vec<Operation>, b: &ImageBox, page_height_mm: f64) {
    let bottom = page_height_mm - (b.y + b.height);
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![
            mm_to_pt(b.width).into(),
            0.into(),
            0.into(),
            mm_to_pt(b.height).into(),
            mm_to_pt(b.x).into(),
            mm_to_pt(bottom).into(),
        ],
    ));
    ops.push(Operation::new("Do", vec![IMAGE_RESOURCE.into()]));
    ops.push(Operation::new("Q", vec![]));
}

fn push_text(ops: &mut Vec<Operation>, t: &TextRun, page_height_mm: f64) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![t.font.resource_name().into(), (t.size_pt as f32).into()],
    ));
    ops.push(Operation::new(
        "Td",
        vec![
            mm_to_pt(t.x).into(),
            mm_to_pt(page_height_mm - t.baseline).into(),
        ],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(latin1_bytes(&t.text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

/// Single-byte encoding of `text`; characters above U+00FF are skipped.
fn latin1_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .filter_map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}
