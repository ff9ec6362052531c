//! Live MJPEG preview fan-out.
//!
//! `GET /api/video-feed?id={cctv_id}` answers a
//! `multipart/x-mixed-replace` stream of JPEG frames: the annotated frame
//! while it is fresh, the raw frame as a fallback, and a "camera freeze"
//! placeholder otherwise. Known cameras never 404. Slot reads copy a
//! handle and release the lock before anything touches the network.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::Response;
use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::state::AppState;
use argus_core::annotate;
use argus_core::FrameStore;

/// Annotated frames older than this fall back to the raw slot.
const ANNOTATED_FRESH: Duration = Duration::from_secs(5);
/// Raw frames older than this fall back to the freeze placeholder.
const RAW_FRESH: Duration = Duration::from_secs(10);
/// ~30 FPS ceiling.
const FRAME_PAUSE: Duration = Duration::from_millis(33);

const PREVIEW_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub id: i32,
}

/// Pick the frame a preview iteration should serve.
pub fn select_preview_frame(
    frames: &FrameStore,
    cctv_id: i32,
    placeholder: &Arc<RgbImage>,
) -> Arc<RgbImage> {
    if let Some(annotated) = frames.annotated(cctv_id) {
        if annotated.age() <= ANNOTATED_FRESH {
            return annotated.image;
        }
    }
    if let Some(raw) = frames.raw(cctv_id) {
        if raw.age() <= RAW_FRESH {
            return raw.image;
        }
    }
    placeholder.clone()
}

pub async fn video_feed_handler(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Response, AppError> {
    let cctv_id = params.id;

    // Known cameras always get a stream, placeholders included. Ids that
    // are neither configured nor have ever had a pipeline are rejected.
    if state.directory.get(cctv_id).is_none() && !state.frames.known(cctv_id) {
        return Err(AppError::not_found(format!("unknown camera {cctv_id}")));
    }

    let frames = state.frames.clone();
    let placeholder = state.freeze_placeholder.clone();
    debug!("Preview stream opened for CCTV {cctv_id}");

    let stream = async_stream::stream! {
        let mut ticker = tokio::time::interval(FRAME_PAUSE);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            let frame = select_preview_frame(&frames, cctv_id, &placeholder);
            let jpeg = match annotate::encode_jpeg(&frame, PREVIEW_JPEG_QUALITY) {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    warn!("[CCTV {cctv_id}] Preview encode failed: {e}");
                    continue;
                }
            };

            let mut part = Vec::with_capacity(jpeg.len() + 64);
            part.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
            part.extend_from_slice(&jpeg);
            part.extend_from_slice(b"\r\n");
            yield Ok::<_, Infallible>(Bytes::from(part));
        }
    };

    Response::builder()
        .header(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::internal(format!("preview response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholder() -> Arc<RgbImage> {
        Arc::new(RgbImage::new(640, 480))
    }

    #[test]
    fn fresh_annotated_frame_wins() {
        let frames = FrameStore::new();
        frames.publish_annotated(1, RgbImage::new(64, 48));
        frames.publish_raw(1, RgbImage::new(32, 24));
        let selected = select_preview_frame(&frames, 1, &placeholder());
        assert_eq!(selected.width(), 64);
    }

    #[test]
    fn raw_frame_serves_when_no_annotated_exists() {
        let frames = FrameStore::new();
        frames.publish_raw(1, RgbImage::new(32, 24));
        let selected = select_preview_frame(&frames, 1, &placeholder());
        assert_eq!(selected.width(), 32);
    }

    #[test]
    fn unknown_camera_gets_the_placeholder() {
        let frames = FrameStore::new();
        let selected = select_preview_frame(&frames, 42, &placeholder());
        assert_eq!(selected.width(), 640);
    }
}
