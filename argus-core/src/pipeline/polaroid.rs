//! Evidence image composition.
//!
//! The "polaroid" is the JPEG persisted as evidence: the padded detection
//! crop on top, a white strip below carrying the violation class, the local
//! timestamp, and the camera location.

use chrono::{DateTime, FixedOffset};
use image::{imageops, RgbImage};

use crate::annotate::{self, Annotator, BLACK, WHITE};
use crate::error::Result;

/// Height of the white label strip under the crop.
const LABEL_STRIP_HEIGHT: u32 = 80;
const EVIDENCE_JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone)]
pub struct PolaroidSpec {
    /// Box expansion fraction applied on both axes.
    pub padding_percent: f32,
    /// Minimum output width; narrower crops are upscaled proportionally.
    pub target_max_width: u32,
}

/// Expand, crop, compose, and encode the evidence image for a detection.
///
/// Returns `Ok(None)` when the padded crop collapses to zero size; such
/// events are dropped silently upstream.
pub fn compose_evidence_jpeg(
    frame: &RgbImage,
    (x1, y1, x2, y2): (f32, f32, f32, f32),
    spec: &PolaroidSpec,
    class_name: &str,
    location: &str,
    captured_at: DateTime<FixedOffset>,
    annotator: &Annotator,
) -> Result<Option<Vec<u8>>> {
    let Some(crop) = padded_crop(frame, (x1, y1, x2, y2), spec.padding_percent) else {
        return Ok(None);
    };

    let crop = if crop.width() < spec.target_max_width {
        let scale = spec.target_max_width as f32 / crop.width() as f32;
        let new_height = ((crop.height() as f32 * scale) as u32).max(1);
        imageops::resize(
            &crop,
            spec.target_max_width,
            new_height,
            imageops::FilterType::Triangle,
        )
    } else {
        crop
    };

    let polaroid = compose_polaroid(&crop, class_name, location, captured_at, annotator);
    annotate::encode_jpeg(&polaroid, EVIDENCE_JPEG_QUALITY).map(Some)
}

/// Crop the frame around the box expanded by `padding_percent`, clamped to
/// the frame bounds. `None` when the expanded box has no area.
pub fn padded_crop(
    frame: &RgbImage,
    (x1, y1, x2, y2): (f32, f32, f32, f32),
    padding_percent: f32,
) -> Option<RgbImage> {
    let (w, h) = (frame.width() as f32, frame.height() as f32);
    let pad_w = (x2 - x1) * padding_percent;
    let pad_h = (y2 - y1) * padding_percent;

    let cx1 = (x1 - pad_w).max(0.0);
    let cy1 = (y1 - pad_h).max(0.0);
    let cx2 = (x2 + pad_w).min(w);
    let cy2 = (y2 + pad_h).min(h);

    let crop_w = (cx2 - cx1) as u32;
    let crop_h = (cy2 - cy1) as u32;
    if crop_w == 0 || crop_h == 0 {
        return None;
    }

    Some(imageops::crop_imm(frame, cx1 as u32, cy1 as u32, crop_w, crop_h).to_image())
}

fn compose_polaroid(
    crop: &RgbImage,
    class_name: &str,
    location: &str,
    captured_at: DateTime<FixedOffset>,
    annotator: &Annotator,
) -> RgbImage {
    let mut canvas: RgbImage =
        RgbImage::from_pixel(crop.width(), crop.height() + LABEL_STRIP_HEIGHT, WHITE);
    imageops::replace(&mut canvas, crop, 0, 0);

    let lines = [
        format!("VIOLATION: {}", class_name.to_uppercase()),
        captured_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        format!("LOC: {location}"),
    ];
    let mut y = crop.height() as i32 + 12;
    for line in &lines {
        annotator.text(&mut canvas, line, 15, y, 16.0, BLACK);
        y += 22;
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgb;

    fn frame() -> RgbImage {
        RgbImage::from_pixel(640, 480, Rgb([40, 80, 120]))
    }

    fn wib() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn spec() -> PolaroidSpec {
        PolaroidSpec {
            padding_percent: 0.5,
            target_max_width: 320,
        }
    }

    #[test]
    fn crop_is_expanded_and_clamped() {
        let crop = padded_crop(&frame(), (10.0, 10.0, 30.0, 30.0), 0.5).unwrap();
        // 20x20 box padded by 10 on each side, clamped at the frame origin.
        assert_eq!(crop.dimensions(), (40, 40));

        let edge = padded_crop(&frame(), (620.0, 460.0, 640.0, 480.0), 0.5).unwrap();
        assert_eq!(edge.dimensions(), (30, 30));
    }

    #[test]
    fn zero_size_box_yields_none() {
        assert!(padded_crop(&frame(), (100.0, 100.0, 100.0, 100.0), 0.0).is_none());
    }

    #[test]
    fn narrow_crops_are_upscaled_to_target_width() {
        let annotator = Annotator::new(None);
        let at = wib().with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap();
        let jpeg = compose_evidence_jpeg(
            &frame(),
            (100.0, 100.0, 140.0, 180.0),
            &spec(),
            "no-helmet",
            "Assembly Line 2",
            at,
            &annotator,
        )
        .unwrap()
        .unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 320);
        // Label strip sits under the upscaled crop.
        assert!(decoded.height() > 320);
    }

    #[test]
    fn polaroid_keeps_wide_crops_at_native_width() {
        let annotator = Annotator::new(None);
        let at = wib().with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap();
        let jpeg = compose_evidence_jpeg(
            &frame(),
            (0.0, 0.0, 640.0, 480.0),
            &PolaroidSpec {
                padding_percent: 0.0,
                target_max_width: 320,
            },
            "no-vest",
            "Gate",
            at,
            &annotator,
        )
        .unwrap()
        .unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 640);
        assert_eq!(decoded.height(), 480 + 80);
    }
}
