//! ROI geometry: scaling drawn regions to the live frame and testing
//! detection centers against them.

use argus_model::{Region, RegionKind, RoiConfig};

/// A region with its points already scaled into frame pixel space.
#[derive(Debug, Clone)]
pub struct ScaledRegion {
    pub kind: RegionKind,
    pub points: Vec<(f32, f32)>,
    pub allowed_violations: Vec<i32>,
}

impl ScaledRegion {
    fn from_region(region: &Region, sx: f32, sy: f32) -> Self {
        Self {
            kind: region.kind,
            points: region
                .points
                .iter()
                .map(|p| (p[0] * sx, p[1] * sy))
                .collect(),
            allowed_violations: region.allowed_violations.clone(),
        }
    }

    /// Whether the point lies inside this region.
    ///
    /// Polygons use ray casting; lines are treated as the axis-aligned box
    /// spanned by their two endpoints.
    pub fn contains(&self, point: (f32, f32)) -> bool {
        match self.kind {
            RegionKind::Polygon => point_in_polygon(point, &self.points),
            RegionKind::Line => {
                let Some(&(x1, y1)) = self.points.first() else {
                    return false;
                };
                let Some(&(x2, y2)) = self.points.get(1) else {
                    return false;
                };
                let (x, y) = point;
                x1.min(x2) <= x && x <= x1.max(x2) && y1.min(y2) <= y && y <= y1.max(y2)
            }
        }
    }

    /// Whether `class_id` counts as a violation inside this region.
    /// An empty set admits every active violation class.
    pub fn allows(&self, class_id: i32) -> bool {
        self.allowed_violations.is_empty() || self.allowed_violations.contains(&class_id)
    }
}

/// Scale every region of `roi` into the pixel space of a
/// `frame_width` x `frame_height` frame. The scale factors are computed
/// once here and reused for drawing and containment tests.
pub fn scale_regions(roi: &RoiConfig, frame_width: u32, frame_height: u32) -> Vec<ScaledRegion> {
    let sx = if roi.image_width > 0 {
        frame_width as f32 / roi.image_width as f32
    } else {
        1.0
    };
    let sy = if roi.image_height > 0 {
        frame_height as f32 / roi.image_height as f32
    } else {
        1.0
    };

    roi.items
        .iter()
        .map(|r| ScaledRegion::from_region(r, sx, sy))
        .collect()
}

/// Decide whether a detection centered at `center` violates inside the ROI
/// set. The **first** region containing the center decides: the class must
/// be admitted by that region, regardless of any later region.
pub fn violates_in_regions(regions: &[ScaledRegion], center: (f32, f32), class_id: i32) -> bool {
    for region in regions {
        if region.contains(center) {
            return region.allows(class_id);
        }
    }
    false
}

/// Ray-casting point-in-polygon test over an ordered vertex list.
pub fn point_in_polygon(point: (f32, f32), polygon: &[(f32, f32)]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let (x, y) = point;
    let mut inside = false;
    let (mut p1x, mut p1y) = polygon[polygon.len() - 1];
    for &(p2x, p2y) in polygon {
        if (p1y > y) != (p2y > y) {
            let x_intersect = (y - p1y) * (p2x - p1x) / (p2y - p1y) + p1x;
            if x < x_intersect {
                inside = !inside;
            }
        }
        p1x = p2x;
        p1y = p2y;
    }
    inside
}
