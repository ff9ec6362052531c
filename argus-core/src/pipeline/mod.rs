//! The per-camera real-time pipeline: capture, detection, cooldown,
//! evidence composition, and the asynchronous violation processor.

pub mod capture;
pub mod cooldown;
pub mod detection;
pub mod evidence;
pub mod polaroid;

#[cfg(test)]
mod tests;

pub use capture::{run_capture_worker, CaptureConfig};
pub use detection::{run_detection_worker, DetectionContext};
pub use evidence::{evidence_channel, EvidenceJob, EvidenceProcessor, EvidenceSender};
pub use polaroid::PolaroidSpec;
