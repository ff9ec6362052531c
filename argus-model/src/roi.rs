//! Region-of-interest configuration drawn over a camera image.

use serde::{Deserialize, Serialize};

/// Geometry kind of a drawn region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Polygon,
    Line,
}

impl Default for RegionKind {
    fn default() -> Self {
        Self::Polygon
    }
}

/// One drawn region, in the pixel space of the image it was drawn on.
///
/// An empty `allowed_violations` set means "any violation class that is
/// active for the camera counts inside this region".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    #[serde(rename = "type", default)]
    pub kind: RegionKind,
    pub points: Vec<[f32; 2]>,
    #[serde(default)]
    pub allowed_violations: Vec<i32>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The full ROI document for one camera.
///
/// `image_width`/`image_height` record the resolution the points were drawn
/// in; at stream time every point is scaled by
/// `(frame_width / image_width, frame_height / image_height)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoiConfig {
    #[serde(default)]
    pub image_width: u32,
    #[serde(default)]
    pub image_height: u32,
    #[serde(default)]
    pub items: Vec<Region>,
}

impl RoiConfig {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_drawn_document() {
        let raw = r#"{
            "image_width": 1920,
            "image_height": 1080,
            "items": [
                { "type": "polygon",
                  "points": [[0.0, 0.0], [100.0, 0.0], [100.0, 100.0]],
                  "allowed_violations": [3, 5] },
                { "type": "line", "points": [[5.0, 5.0], [50.0, 50.0]] }
            ]
        }"#;

        let roi: RoiConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(roi.image_width, 1920);
        assert_eq!(roi.items.len(), 2);
        assert_eq!(roi.items[0].kind, RegionKind::Polygon);
        assert_eq!(roi.items[0].allowed_violations, vec![3, 5]);
        assert_eq!(roi.items[1].kind, RegionKind::Line);
        assert!(roi.items[1].allowed_violations.is_empty());
    }

    #[test]
    fn missing_fields_default() {
        let roi: RoiConfig = serde_json::from_str("{}").unwrap();
        assert!(roi.is_empty());
        assert_eq!(roi.image_width, 0);
    }
}
