//! Per-camera pipeline modes.

use serde::{Deserialize, Serialize};

/// The mode a camera pipeline runs in.
///
/// The supervisor holds this explicitly on its per-camera record; it is
/// never inferred from which workers happen to be alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Capture + detection: inference runs and violations may be emitted.
    Full,
    /// Capture only: frames are published for preview, no inference.
    StreamOnly,
}

impl PipelineMode {
    pub fn from_full_detection(full_detection: bool) -> Self {
        if full_detection {
            Self::Full
        } else {
            Self::StreamOnly
        }
    }

    pub fn is_full(self) -> bool {
        matches!(self, Self::Full)
    }
}
