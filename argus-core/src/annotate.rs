//! Frame overlay drawing: ROI outlines, detection boxes, labels, banners,
//! and the placeholder frames shown while a stream is down.

use std::path::Path;
use std::sync::Arc;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::warn;

use crate::roi::ScaledRegion;
use argus_model::RegionKind;

pub const PLACEHOLDER_WIDTH: u32 = 640;
pub const PLACEHOLDER_HEIGHT: u32 = 480;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const RED: Rgb<u8> = Rgb([220, 40, 40]);
pub const ROI_OUTLINE: Rgb<u8> = Rgb([255, 0, 0]);
pub const BANNER_YELLOW: Rgb<u8> = Rgb([240, 200, 40]);

/// Font paths probed when no explicit path is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

/// Text and shape renderer shared by all workers.
///
/// Cheap to clone. When no usable font can be loaded, text calls degrade to
/// no-ops and only shapes are drawn.
#[derive(Debug, Clone)]
pub struct Annotator {
    font: Option<Arc<FontArc>>,
}

impl Annotator {
    /// Load the overlay font from `font_path`, falling back to well-known
    /// system locations.
    pub fn new(font_path: Option<&Path>) -> Self {
        let mut candidates: Vec<&Path> = Vec::new();
        if let Some(path) = font_path {
            candidates.push(path);
        }
        candidates.extend(FONT_CANDIDATES.iter().map(Path::new));

        for candidate in candidates {
            match std::fs::read(candidate) {
                Ok(bytes) => match FontArc::try_from_vec(bytes) {
                    Ok(font) => {
                        return Self {
                            font: Some(Arc::new(font)),
                        };
                    }
                    Err(e) => {
                        warn!("Unusable overlay font {}: {}", candidate.display(), e);
                    }
                },
                Err(_) => continue,
            }
        }

        warn!("No overlay font found; frame text will be omitted");
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `text` at `(x, y)` with the given pixel height.
    pub fn text(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, px: f32, color: Rgb<u8>) {
        if let Some(font) = &self.font {
            draw_text_mut(canvas, color, x, y, PxScale::from(px), font.as_ref(), text);
        }
    }

    /// Draw a detection box with its `"{class} {conf:.2f}"` label above it.
    pub fn detection_box(
        &self,
        canvas: &mut RgbImage,
        (x1, y1, x2, y2): (f32, f32, f32, f32),
        label: &str,
        color: Rgb<u8>,
    ) {
        draw_box(canvas, (x1, y1, x2, y2), color);
        let label_y = (y1 - 18.0).max(2.0) as i32;
        self.text(canvas, label, x1.max(0.0) as i32, label_y, 16.0, color);
    }

    /// Short status banner in the top-left corner of the frame.
    pub fn banner(&self, canvas: &mut RgbImage, text: &str) {
        self.text(canvas, text, 10, 24, 24.0, BANNER_YELLOW);
    }

    /// A solid-black frame carrying a single status line, used whenever no
    /// real frame is available.
    pub fn placeholder(&self, text: &str, color: Rgb<u8>) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, BLACK);
        self.text(&mut canvas, text, 10, 30, 28.0, color);
        canvas
    }
}

/// Outline every ROI region on the canvas. Polygons are closed, lines are
/// left open.
pub fn draw_regions(canvas: &mut RgbImage, regions: &[ScaledRegion]) {
    for region in regions {
        draw_polyline(
            canvas,
            &region.points,
            matches!(region.kind, RegionKind::Polygon),
            ROI_OUTLINE,
        );
    }
}

pub fn draw_polyline(canvas: &mut RgbImage, points: &[(f32, f32)], closed: bool, color: Rgb<u8>) {
    if points.len() < 2 {
        return;
    }
    for pair in points.windows(2) {
        draw_line_segment_mut(canvas, pair[0], pair[1], color);
    }
    if closed && points.len() > 2 {
        draw_line_segment_mut(canvas, points[points.len() - 1], points[0], color);
    }
}

pub fn draw_box(canvas: &mut RgbImage, (x1, y1, x2, y2): (f32, f32, f32, f32), color: Rgb<u8>) {
    let (w, h) = canvas.dimensions();
    let x1 = x1.clamp(0.0, w.saturating_sub(1) as f32) as i32;
    let y1 = y1.clamp(0.0, h.saturating_sub(1) as f32) as i32;
    let x2 = x2.clamp(0.0, w as f32) as i32;
    let y2 = y2.clamp(0.0, h as f32) as i32;
    let width = (x2 - x1).max(1) as u32;
    let height = (y2 - y1).max(1) as u32;
    draw_hollow_rect_mut(canvas, Rect::at(x1, y1).of_size(width, height), color);
}

/// Class display color as an image pixel.
pub fn class_color(color: argus_model::Rgb) -> Rgb<u8> {
    Rgb([color.r, color.g, color.b])
}

/// Encode a frame as JPEG at the given quality.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> crate::error::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder.encode_image(image)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_has_fixed_dimensions() {
        let annotator = Annotator::new(None);
        let frame = annotator.placeholder("Initializing...", WHITE);
        assert_eq!(frame.dimensions(), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));
    }

    #[test]
    fn box_drawing_clamps_to_canvas() {
        let mut canvas = RgbImage::new(100, 100);
        // Out-of-bounds coordinates must not panic.
        draw_box(&mut canvas, (-20.0, -20.0, 300.0, 300.0), RED);
        draw_box(&mut canvas, (99.5, 99.5, 99.9, 99.9), RED);
    }

    #[test]
    fn polyline_ignores_degenerate_input() {
        let mut canvas = RgbImage::new(10, 10);
        draw_polyline(&mut canvas, &[(1.0, 1.0)], true, RED);
        draw_polyline(&mut canvas, &[], false, RED);
    }
}
