//! Object detection seam.
//!
//! Each detection worker owns its own [`Detector`] instance (inference
//! libraries hide locking; sharing one across cameras serializes them).
//! The production implementation is an ONNX YOLO model with a persistent
//! IoU association layer supplying track ids; tests script the trait.

#[cfg(feature = "onnx")]
pub mod onnx;
pub mod tracker;

use image::RgbImage;

use crate::error::Result;

/// One tracked detection in frame pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_name: String,
    pub confidence: f32,
    pub track_id: u32,
}

impl Detection {
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn bbox(&self) -> (f32, f32, f32, f32) {
        (self.x1, self.y1, self.x2, self.y2)
    }

    /// Overlay label, `"{class_name} {conf:.2f}"`.
    pub fn label(&self) -> String {
        format!("{} {:.2}", self.class_name, self.confidence)
    }
}

/// A stateful detector-with-tracking. `track` runs inference on one frame
/// and returns detections carrying persistent track ids.
pub trait Detector: Send {
    fn track(&mut self, frame: &RgbImage) -> Result<Vec<Detection>>;
}

/// Builds a fresh [`Detector`] per detection worker.
pub trait DetectorProvider: Send + Sync {
    fn create(&self) -> Result<Box<dyn Detector>>;
}
