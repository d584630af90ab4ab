//! Summary image export: the report text is laid out as SVG, rasterized
//! with resvg and encoded as PNG.

use crate::error::{ReportError, Result};
use crate::output::write_atomic;
use crate::types::{Dimension, SummaryStats};
use crate::util::format_int;
use chrono::Local;
use image::{ImageBuffer, ImageFormat, RgbaImage};
use resvg::tiny_skia::{self, Pixmap};
use resvg::usvg::{Options, Tree};
use std::io::Cursor;
use std::path::Path;
use tracing::info;

pub const IMAGE_EXPORT: &str = "Data_Summary_Analytics_Report.png";
pub const WIDTH: u32 = 1400;
pub const HEIGHT: u32 = 900;

const TITLE: &str = "Data Summary Analytics Report";
const FONT: &str = "Inter, Helvetica, Arial, sans-serif";

/// Dimensions listed in the "Top Items" column, with their headings.
const TOP_CATEGORIES: [(Dimension, &str); 5] = [
    (Dimension::Bank, "Top Banks"),
    (Dimension::Area, "Top Areas"),
    (Dimension::Status, "Top Statuses"),
    (Dimension::BankType, "Bank Types"),
    (Dimension::VisitType, "Visit Types"),
];

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn text(svg: &mut String, x: u32, y: u32, size: u32, bold: bool, anchor: &str, body: &str) {
    let weight = if bold { "bold" } else { "normal" };
    svg.push_str(&format!(
        "<text x=\"{x}\" y=\"{y}\" font-size=\"{size}\" font-weight=\"{weight}\" text-anchor=\"{anchor}\">{}</text>\n",
        escape_xml(body)
    ));
}

fn distinct_noun(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Bank => "banks",
        Dimension::Area => "areas",
        Dimension::Status => "statuses",
        Dimension::FieldRider => "field riders",
        Dimension::Cluster => "clusters",
        Dimension::BankType => "bank types",
        Dimension::VisitType => "visit types",
    }
}

pub fn build_svg(stats: &SummaryStats, top_n: usize, generated: &str) -> String {
    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\">\n"
    ));
    svg.push_str(
        "<defs><linearGradient id=\"bg\" x1=\"0\" y1=\"0\" x2=\"1\" y2=\"1\">\
<stop offset=\"0\" stop-color=\"#0ea5e9\"/><stop offset=\"0.5\" stop-color=\"#3b82f6\"/>\
<stop offset=\"1\" stop-color=\"#8b5cf6\"/></linearGradient></defs>\n",
    );
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"url(#bg)\"/>\n");
    svg.push_str(&format!("<g font-family=\"{FONT}\" fill=\"#ffffff\">\n"));

    let center = WIDTH / 2;
    text(&mut svg, center, 60, 40, true, "middle", TITLE);
    text(&mut svg, center, 90, 18, false, "middle", &format!("Generated: {generated}"));
    text(
        &mut svg,
        center,
        140,
        28,
        true,
        "middle",
        &format!("Total Records: {}", format_int(stats.total as u64)),
    );

    let mut y = 200;
    for dimension in Dimension::ALL {
        let line = format!(
            "{}: {} different {}",
            dimension.label(),
            stats.counts(dimension).len(),
            distinct_noun(dimension)
        );
        text(&mut svg, 80, y, 20, false, "start", &line);
        y += 35;
    }

    let mut y = 200;
    text(&mut svg, 740, y, 24, true, "start", "Top Items by Category:");
    y += 40;
    for (dimension, heading) in TOP_CATEGORIES {
        text(&mut svg, 740, y, 20, true, "start", &format!("{heading}:"));
        y += 28;
        for (key, count) in stats.counts(dimension).iter().take(top_n) {
            let line = format!("\u{2022} {}: {}", key, format_int(*count as u64));
            text(&mut svg, 760, y, 16, false, "start", &line);
            y += 22;
        }
        y += 12;
    }

    svg.push_str("</g>\n</svg>\n");
    svg
}

pub fn render_png(svg: &str) -> Result<Vec<u8>> {
    let mut options = Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = Tree::from_data(svg.as_bytes(), &options)?;

    let size = tree.size();
    let (width, height) = (size.width().ceil() as u32, size.height().ceil() as u32);
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| ReportError::Render(format!("cannot allocate {width}x{height} pixmap")))?;
    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    let img: RgbaImage = ImageBuffer::from_raw(width, height, pixmap.take())
        .ok_or_else(|| ReportError::Render("pixmap size does not match image buffer".to_string()))?;
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub fn export_summary_image(path: &Path, stats: &SummaryStats, top_n: usize) -> Result<()> {
    let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let png = render_png(&build_svg(stats, top_n, &generated))?;
    write_atomic(path, &png)?;
    info!(path = %path.display(), "wrote summary image");
    Ok(())
}
