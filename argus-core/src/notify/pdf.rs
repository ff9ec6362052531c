//! Recap PDF rendering.
//!
//! A4 portrait, built-in Times faces, header with recipient / period /
//! total, then one section per event: a small cctv/location/timestamp
//! table and the evidence image at roughly 8 cm tall, aspect preserved.

use printpdf::image_crate::GenericImageView;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};
use std::io::BufWriter;

use crate::error::{CoreError, Result};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 18.0;
const IMAGE_HEIGHT_MM: f32 = 80.0;
/// Pixel density the embedded JPEGs are laid out at.
const IMAGE_DPI: f32 = 300.0;

/// One report section.
#[derive(Debug, Clone)]
pub struct RecapEntry {
    pub cctv_name: String,
    pub location: String,
    pub timestamp: String,
    pub violation_name: String,
    /// Evidence JPEG, if the download succeeded.
    pub image_jpeg: Option<Vec<u8>>,
}

struct ReportWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    times: IndirectFontRef,
    times_bold: IndirectFontRef,
    cursor_mm: f32,
}

impl ReportWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
        let times = doc
            .add_builtin_font(BuiltinFont::TimesRoman)
            .map_err(|e| CoreError::Report(e.to_string()))?;
        let times_bold = doc
            .add_builtin_font(BuiltinFont::TimesBold)
            .map_err(|e| CoreError::Report(e.to_string()))?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            times,
            times_bold,
            cursor_mm: PAGE_HEIGHT_MM - MARGIN_MM,
        })
    }

    /// Start a new page when fewer than `needed_mm` remain.
    fn ensure_room(&mut self, needed_mm: f32) {
        if self.cursor_mm - needed_mm < MARGIN_MM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.cursor_mm = PAGE_HEIGHT_MM - MARGIN_MM;
        }
    }

    fn line(&mut self, text: &str, size_pt: f32, bold: bool) {
        self.ensure_room(size_pt * 0.5);
        let font = if bold { &self.times_bold } else { &self.times };
        self.cursor_mm -= size_pt * 0.45;
        self.layer
            .use_text(text, size_pt, Mm(MARGIN_MM), Mm(self.cursor_mm), font);
        self.cursor_mm -= 2.0;
    }

    fn gap(&mut self, mm: f32) {
        self.cursor_mm -= mm;
    }

    fn image(&mut self, jpeg: &[u8]) {
        let Ok(decoded) = printpdf::image_crate::load_from_memory(jpeg) else {
            self.line("(image unavailable)", 11.0, false);
            return;
        };

        let image = Image::from_dynamic_image(&decoded);
        let px_height = decoded.height() as f32;
        let px_width = decoded.width() as f32;
        if px_height == 0.0 || px_width == 0.0 {
            self.line("(image unavailable)", 11.0, false);
            return;
        }

        // Native placement size at the layout density.
        let native_h_mm = px_height / IMAGE_DPI * 25.4;
        let native_w_mm = px_width / IMAGE_DPI * 25.4;
        let mut scale = IMAGE_HEIGHT_MM / native_h_mm;
        // Keep the image inside the text column.
        let max_w_mm = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
        if native_w_mm * scale > max_w_mm {
            scale = max_w_mm / native_w_mm;
        }
        let placed_h_mm = native_h_mm * scale;

        self.ensure_room(placed_h_mm + 4.0);
        self.cursor_mm -= placed_h_mm;
        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(MARGIN_MM)),
                translate_y: Some(Mm(self.cursor_mm)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
        self.cursor_mm -= 4.0;
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.doc
            .save(&mut BufWriter::new(&mut bytes))
            .map_err(|e| CoreError::Report(e.to_string()))?;
        Ok(bytes)
    }
}

/// Render the recap report for one recipient.
pub fn build_recap_pdf(
    recipient: &str,
    period_label: &str,
    entries: &[RecapEntry],
) -> Result<Vec<u8>> {
    let mut writer = ReportWriter::new("PPE Violation Recap")?;

    writer.line("PPE Violation Recap", 20.0, true);
    writer.gap(2.0);
    writer.line(&format!("Recipient: {recipient}"), 12.0, false);
    writer.line(&format!("Period: {period_label}"), 12.0, false);
    writer.line(
        &format!("Total violations: {}", entries.len()),
        12.0,
        false,
    );
    writer.gap(6.0);

    for (index, entry) in entries.iter().enumerate() {
        writer.ensure_room(30.0);
        writer.line(
            &format!(
                "{}. {} - {}",
                index + 1,
                entry.violation_name.to_uppercase(),
                entry.cctv_name
            ),
            13.0,
            true,
        );
        writer.line(&format!("Camera: {}", entry.cctv_name), 11.0, false);
        writer.line(&format!("Location: {}", entry.location), 11.0, false);
        writer.line(&format!("Time: {}", entry.timestamp), 11.0, false);
        match &entry.image_jpeg {
            Some(jpeg) => writer.image(jpeg),
            None => writer.line("(image unavailable)", 11.0, false),
        }
        writer.gap(6.0);
    }

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_fixture() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(320, 240, image::Rgb([90, 90, 200]));
        crate::annotate::encode_jpeg(&img, 85).unwrap()
    }

    fn entry(with_image: bool) -> RecapEntry {
        RecapEntry {
            cctv_name: "Line 1".into(),
            location: "Assembly".into(),
            timestamp: "2025-06-02 09:30:00".into(),
            violation_name: "no-helmet".into(),
            image_jpeg: with_image.then(jpeg_fixture),
        }
    }

    #[test]
    fn report_renders_to_a_pdf_document() {
        let pdf = build_recap_pdf(
            "Rina Wijaya",
            "2025-05-26 - 2025-06-02",
            &[entry(true), entry(false)],
        )
        .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert!(pdf.len() > 1000);
    }

    #[test]
    fn empty_report_still_renders() {
        let pdf = build_recap_pdf("Nobody", "2025-05-01 - 2025-06-01", &[]).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[test]
    fn many_entries_paginate_without_panicking() {
        let entries: Vec<RecapEntry> = (0..40).map(|_| entry(true)).collect();
        let pdf = build_recap_pdf("Rina", "week", &entries).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }
}
