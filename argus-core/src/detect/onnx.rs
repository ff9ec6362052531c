//! ONNX Runtime YOLO detector.
//!
//! Runs a pretrained YOLO-family model exported to ONNX (layout
//! `[1, 4 + num_classes, anchors]`) and feeds the surviving boxes through
//! the IoU tracker. The class list is NOT filtered before inference;
//! violation selection happens downstream in the detection worker.

use std::path::{Path, PathBuf};

use image::{imageops, RgbImage};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::tracker::{BBox, IouTracker, TrackerConfig};
use super::{Detection, Detector, DetectorProvider};
use crate::error::{CoreError, Result};

/// Intersection threshold for non-maximum suppression.
const NMS_IOU: f32 = 0.45;

#[derive(Debug, Clone)]
pub struct YoloConfig {
    pub model_path: PathBuf,
    /// Class index -> name, in model output order.
    pub class_names: Vec<String>,
    /// Square input edge the model was exported with.
    pub input_size: u32,
    /// Minimum confidence kept from the raw output.
    pub confidence_threshold: f32,
    pub intra_threads: usize,
}

impl YoloConfig {
    pub fn new(model_path: impl Into<PathBuf>, class_names: Vec<String>) -> Self {
        Self {
            model_path: model_path.into(),
            class_names,
            input_size: 640,
            confidence_threshold: 0.5,
            intra_threads: 2,
        }
    }

    /// Read a class list file, one name per line, ignoring blanks.
    pub fn load_class_names(path: &Path) -> Result<Vec<String>> {
        let raw = std::fs::read_to_string(path)?;
        let names: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();
        if names.is_empty() {
            return Err(CoreError::Config(format!(
                "class list {} is empty",
                path.display()
            )));
        }
        Ok(names)
    }
}

/// Per-worker detector instance over one loaded ONNX session.
pub struct YoloDetector {
    session: Session,
    config: YoloConfig,
    output_name: String,
    input_name: String,
    tracker: IouTracker,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("model_path", &self.config.model_path)
            .field("input_size", &self.config.input_size)
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    pub fn load(config: YoloConfig) -> Result<Self> {
        let session = (|| -> ort::Result<Session> {
            let mut builder = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(config.intra_threads)?;
            builder.commit_from_file(&config.model_path)
        })()
        .map_err(|e| CoreError::Detector(e.to_string()))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| CoreError::Detector("model has no inputs".into()))?;
        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| CoreError::Detector("model has no outputs".into()))?;

        info!(
            "Loaded detector {} ({} classes)",
            config.model_path.display(),
            config.class_names.len()
        );

        Ok(Self {
            session,
            config,
            output_name,
            input_name,
            tracker: IouTracker::new(TrackerConfig::default()),
        })
    }

    /// Letterbox into the square model input, returning the CHW tensor
    /// data and the geometry needed to map boxes back.
    fn preprocess(&self, frame: &RgbImage) -> (Vec<f32>, Letterbox) {
        let size = self.config.input_size;
        let lb = letterbox_params(frame.width(), frame.height(), size);
        let new_w = ((frame.width() as f32 * lb.scale).round() as u32).max(1);
        let new_h = ((frame.height() as f32 * lb.scale).round() as u32).max(1);

        let resized = imageops::resize(frame, new_w, new_h, imageops::FilterType::Triangle);

        let area = (size * size) as usize;
        let mut data = vec![114.0 / 255.0; 3 * area];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let dx = x + lb.pad_x as u32;
            let dy = y + lb.pad_y as u32;
            let idx = (dy * size + dx) as usize;
            data[idx] = pixel[0] as f32 / 255.0;
            data[area + idx] = pixel[1] as f32 / 255.0;
            data[2 * area + idx] = pixel[2] as f32 / 255.0;
        }

        (data, lb)
    }
}

/// Geometry of the letterboxed model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

pub(crate) fn letterbox_params(frame_w: u32, frame_h: u32, input: u32) -> Letterbox {
    let scale = (input as f32 / frame_w as f32).min(input as f32 / frame_h as f32);
    let new_w = ((frame_w as f32 * scale).round() as u32).max(1);
    let new_h = ((frame_h as f32 * scale).round() as u32).max(1);
    Letterbox {
        scale,
        pad_x: (input - new_w.min(input)) as f32 / 2.0,
        pad_y: (input - new_h.min(input)) as f32 / 2.0,
    }
}

/// Decode a `[1, 4 + nc, anchors]` output tensor into scored boxes in
/// frame space, letterbox undone, below-threshold anchors dropped, and
/// overlaps suppressed.
pub(crate) fn decode_output(
    shape: &[i64],
    data: &[f32],
    lb: &Letterbox,
    confidence_threshold: f32,
    max_classes: usize,
    frame_w: f32,
    frame_h: f32,
) -> Vec<(BBox, usize, f32)> {
    if shape.len() != 3 {
        return Vec::new();
    }
    let channels = shape[1] as usize;
    let anchors = shape[2] as usize;
    if channels < 5 || data.len() < channels * anchors {
        return Vec::new();
    }
    let num_classes = (channels - 4).min(max_classes);

    let at = |c: usize, a: usize| data[c * anchors + a];
    let mut boxes = Vec::new();
    for a in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = 0f32;
        for c in 0..num_classes {
            let score = at(4 + c, a);
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < confidence_threshold {
            continue;
        }

        let cx = at(0, a);
        let cy = at(1, a);
        let bw = at(2, a);
        let bh = at(3, a);

        let x1 = ((cx - bw / 2.0 - lb.pad_x) / lb.scale).clamp(0.0, frame_w);
        let y1 = ((cy - bh / 2.0 - lb.pad_y) / lb.scale).clamp(0.0, frame_h);
        let x2 = ((cx + bw / 2.0 - lb.pad_x) / lb.scale).clamp(0.0, frame_w);
        let y2 = ((cy + bh / 2.0 - lb.pad_y) / lb.scale).clamp(0.0, frame_h);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        boxes.push(([x1, y1, x2, y2], best_class, best_score));
    }

    non_max_suppression(boxes, NMS_IOU)
}

impl Detector for YoloDetector {
    fn track(&mut self, frame: &RgbImage) -> Result<Vec<Detection>> {
        let (input, lb) = self.preprocess(frame);
        let size = self.config.input_size as usize;

        let tensor = Tensor::from_array(([1usize, 3, size, size], input))
            .map_err(|e| CoreError::Detector(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| CoreError::Detector(e.to_string()))?;
        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| CoreError::Detector(e.to_string()))?;

        let boxes = decode_output(
            shape,
            data,
            &lb,
            self.config.confidence_threshold,
            self.config.class_names.len(),
            frame.width() as f32,
            frame.height() as f32,
        );
        debug!("Detector kept {} boxes", boxes.len());

        let bboxes: Vec<BBox> = boxes.iter().map(|(b, _, _)| *b).collect();
        let ids = self.tracker.update(&bboxes);

        Ok(boxes
            .into_iter()
            .zip(ids)
            .map(|((bbox, class_idx, confidence), track_id)| Detection {
                x1: bbox[0],
                y1: bbox[1],
                x2: bbox[2],
                y2: bbox[3],
                class_name: self.config.class_names[class_idx].clone(),
                confidence,
                track_id,
            })
            .collect())
    }
}

/// Class-aware NMS: only boxes of the same class suppress each other.
fn non_max_suppression(
    mut boxes: Vec<(BBox, usize, f32)>,
    iou_threshold: f32,
) -> Vec<(BBox, usize, f32)> {
    boxes.sort_by(|a, b| b.2.total_cmp(&a.2));
    let mut kept: Vec<(BBox, usize, f32)> = Vec::new();
    'candidates: for candidate in boxes {
        for (kept_box, kept_class, _) in &kept {
            if *kept_class == candidate.1 && bbox_iou(kept_box, &candidate.0) > iou_threshold {
                continue 'candidates;
            }
        }
        kept.push(candidate);
    }
    kept
}

fn bbox_iou(a: &BBox, b: &BBox) -> f32 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    if inter <= 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Builds one fresh detector per worker from a shared config.
#[derive(Debug, Clone)]
pub struct OnnxDetectorProvider {
    config: YoloConfig,
}

impl OnnxDetectorProvider {
    pub fn new(config: YoloConfig) -> Self {
        Self { config }
    }
}

impl DetectorProvider for OnnxDetectorProvider {
    fn create(&self) -> Result<Box<dyn Detector>> {
        Ok(Box::new(YoloDetector::load(self.config.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn class_list_file_parses_one_name_per_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "helmet\nno-helmet\n\n  vest  \nno-vest").unwrap();
        let names = YoloConfig::load_class_names(file.path()).unwrap();
        assert_eq!(names, vec!["helmet", "no-helmet", "vest", "no-vest"]);
    }

    #[test]
    fn empty_class_list_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(YoloConfig::load_class_names(file.path()).is_err());
    }

    #[test]
    fn letterbox_for_a_wide_frame_pads_vertically() {
        let lb = letterbox_params(1280, 720, 640);
        assert!((lb.scale - 0.5).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 140.0);
    }

    #[test]
    fn letterbox_for_a_square_frame_is_identity_scale() {
        let lb = letterbox_params(640, 640, 640);
        assert_eq!(
            lb,
            Letterbox {
                scale: 1.0,
                pad_x: 0.0,
                pad_y: 0.0
            }
        );
    }

    /// Channel-major `[1, 4 + nc, anchors]` tensor fixture.
    fn output_fixture(anchors: Vec<[f32; 6]>) -> (Vec<i64>, Vec<f32>) {
        let n = anchors.len();
        let mut data = vec![0f32; 6 * n];
        for (a, anchor) in anchors.iter().enumerate() {
            for (c, value) in anchor.iter().enumerate() {
                data[c * n + a] = *value;
            }
        }
        (vec![1, 6, n as i64], data)
    }

    #[test]
    fn decode_maps_centered_boxes_back_to_frame_space() {
        // One anchor: cx=100, cy=100, w=40, h=40, class 1 at 0.9.
        let (shape, data) = output_fixture(vec![[100.0, 100.0, 40.0, 40.0, 0.1, 0.9]]);
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let boxes = decode_output(&shape, &data, &lb, 0.5, 2, 640.0, 640.0);
        assert_eq!(boxes.len(), 1);
        let (bbox, class, score) = boxes[0];
        assert_eq!(bbox, [80.0, 80.0, 120.0, 120.0]);
        assert_eq!(class, 1);
        assert_eq!(score, 0.9);
    }

    #[test]
    fn decode_undoes_the_letterbox() {
        // 1280x720 frame letterboxed into 640: scale 0.5, pad_y 140.
        let (shape, data) = output_fixture(vec![[320.0, 320.0, 100.0, 100.0, 0.8, 0.2]]);
        let lb = letterbox_params(1280, 720, 640);
        let boxes = decode_output(&shape, &data, &lb, 0.5, 2, 1280.0, 720.0);
        assert_eq!(boxes.len(), 1);
        let (bbox, class, _) = boxes[0];
        assert_eq!(class, 0);
        // (320 - 50 - pad) / 0.5 on each axis.
        assert_eq!(bbox, [540.0, 260.0, 740.0, 460.0]);
    }

    #[test]
    fn decode_drops_anchors_below_the_confidence_threshold() {
        let (shape, data) = output_fixture(vec![
            [100.0, 100.0, 40.0, 40.0, 0.3, 0.2],
            [300.0, 300.0, 40.0, 40.0, 0.9, 0.1],
        ]);
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let boxes = decode_output(&shape, &data, &lb, 0.5, 2, 640.0, 640.0);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].2, 0.9);
    }

    #[test]
    fn decode_tolerates_malformed_shapes() {
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        assert!(decode_output(&[1, 6], &[0.0; 6], &lb, 0.5, 2, 640.0, 640.0).is_empty());
        assert!(decode_output(&[1, 6, 10], &[0.0; 6], &lb, 0.5, 2, 640.0, 640.0).is_empty());
    }

    #[test]
    fn nms_keeps_the_strongest_of_overlapping_boxes() {
        let boxes = vec![
            ([0.0, 0.0, 100.0, 100.0], 0, 0.9),
            ([5.0, 5.0, 105.0, 105.0], 0, 0.7),
            ([300.0, 300.0, 400.0, 400.0], 0, 0.8),
        ];
        let kept = non_max_suppression(boxes, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].2, 0.9);
        assert_eq!(kept[1].2, 0.8);
    }

    #[test]
    fn nms_is_class_aware() {
        let boxes = vec![
            ([0.0, 0.0, 100.0, 100.0], 0, 0.9),
            ([2.0, 2.0, 102.0, 102.0], 1, 0.8),
        ];
        let kept = non_max_suppression(boxes, 0.45);
        assert_eq!(kept.len(), 2);
    }
}
