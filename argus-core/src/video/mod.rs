//! Stream acquisition seam.
//!
//! Capture workers read frames through [`VideoSource`], obtained from a
//! [`StreamOpener`]. The production implementation decodes RTSP/RTSPS via
//! FFmpeg; tests drive the reconnect logic with scripted sources.

#[cfg(feature = "ffmpeg")]
pub mod rtsp;

use image::RgbImage;

use crate::error::Result;
use argus_model::CameraConnection;

/// A connected, decoding video stream.
pub trait VideoSource: Send {
    /// Blocking read of the next decoded frame.
    ///
    /// Errors are per-read; the caller counts consecutive failures and
    /// decides when to reconnect.
    fn read_frame(&mut self) -> Result<RgbImage>;
}

/// Opens a [`VideoSource`] for a camera connection, trying the secure URL
/// shape first and the plain fallback second.
pub trait StreamOpener: Send + Sync {
    fn open(&self, connection: &CameraConnection) -> Result<Box<dyn VideoSource>>;
}
