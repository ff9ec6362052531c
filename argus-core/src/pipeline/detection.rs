//! Detection worker: one per camera in full mode.
//!
//! Consumes frames from the capture queue, runs the detector with
//! persistent tracking, draws overlays, applies the violation policy, and
//! publishes the annotated frame. Never blocks on upload, database, or
//! SMTP: accepted violations leave through an unbounded channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{FixedOffset, Utc};
use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::annotate::{self, Annotator};
use crate::catalog::ClassCatalog;
use crate::detect::Detector;
use crate::directory::ActiveViolations;
use crate::frames::FrameStore;
use crate::pipeline::cooldown::TrackTable;
use crate::pipeline::evidence::{EvidenceJob, EvidenceSender};
use crate::pipeline::polaroid::{compose_evidence_jpeg, PolaroidSpec};
use crate::roi::{scale_regions, violates_in_regions};
use crate::supervise::schedule::ActiveWindows;
use argus_model::{Camera, DetectionSettings};

/// Idle sleep when the frame queue is empty.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Everything a detection worker needs, bundled so tests can assemble a
/// worker without the supervisor.
pub struct DetectionContext {
    pub camera: Arc<Camera>,
    pub catalog: Arc<ClassCatalog>,
    pub active: Arc<ActiveViolations>,
    pub windows: Arc<ActiveWindows>,
    pub frames: Arc<FrameStore>,
    pub annotator: Annotator,
    pub settings: DetectionSettings,
    pub emit: EvidenceSender,
    pub tz: FixedOffset,
}

impl std::fmt::Debug for DetectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionContext")
            .field("camera", &self.camera.id)
            .finish_non_exhaustive()
    }
}

/// Why a tick ran without inference.
fn stream_only_reason(
    camera: &Camera,
    active_empty: bool,
    scheduled: bool,
) -> Option<&'static str> {
    if camera.roi.is_empty() {
        Some("STREAMING ONLY (No ROI Configured)")
    } else if active_empty {
        Some("STREAMING ONLY (All Classes Disabled)")
    } else if !scheduled {
        Some("STREAMING ONLY (Outside Schedule)")
    } else {
        None
    }
}

pub fn run_detection_worker(
    ctx: DetectionContext,
    mut detector: Box<dyn Detector>,
    queue: Receiver<Arc<RgbImage>>,
    stop: Arc<AtomicBool>,
) {
    let cctv_id = ctx.camera.id;
    let cooldown = Duration::from_secs_f64(ctx.settings.cooldown_seconds.max(0.0));
    let cleanup_interval = Duration::from_secs_f64(ctx.settings.cleanup_interval.max(1.0));
    let spec = PolaroidSpec {
        padding_percent: ctx.settings.padding_percent,
        target_max_width: ctx.settings.target_max_width,
    };

    let mut tracks = TrackTable::new();
    let mut last_cleanup = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        let frame = match queue.recv_timeout(IDLE_POLL) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if last_cleanup.elapsed() >= cleanup_interval {
            let removed = tracks.sweep(cleanup_interval, Instant::now());
            if removed > 0 {
                debug!("[CCTV {cctv_id}] Dropped {removed} idle tracks");
            }
            last_cleanup = Instant::now();
        }

        let started = Instant::now();
        let catalog = ctx.catalog.snapshot();
        let active_ids = ctx.active.active_for(cctv_id);
        let scheduled = ctx.windows.contains(cctv_id);

        let regions = scale_regions(&ctx.camera.roi, frame.width(), frame.height());
        let mut canvas: RgbImage = (*frame).clone();
        annotate::draw_regions(&mut canvas, &regions);

        if let Some(reason) = stream_only_reason(&ctx.camera, active_ids.is_empty(), scheduled) {
            ctx.annotator.banner(&mut canvas, reason);
            ctx.frames.publish_annotated(cctv_id, canvas);
            continue;
        }

        match detector.track(&frame) {
            Ok(detections) => {
                for det in &detections {
                    let color = annotate::class_color(catalog.color(&det.class_name));
                    ctx.annotator
                        .detection_box(&mut canvas, det.bbox(), &det.label(), color);

                    let Some(class) = catalog.lookup_by_name(&det.class_name) else {
                        continue;
                    };
                    if !class.is_violation || !active_ids.contains(&class.id) {
                        continue;
                    }
                    if !violates_in_regions(&regions, det.center(), class.id) {
                        continue;
                    }
                    if det.confidence < ctx.settings.confidence_threshold {
                        continue;
                    }
                    if !tracks.try_emit(det.track_id, &det.class_name, cooldown, Instant::now()) {
                        continue;
                    }

                    let captured_at = Utc::now().with_timezone(&ctx.tz);
                    match compose_evidence_jpeg(
                        &frame,
                        det.bbox(),
                        &spec,
                        &det.class_name,
                        ctx.camera.location_label(),
                        captured_at,
                        &ctx.annotator,
                    ) {
                        Ok(Some(jpeg)) => {
                            info!(
                                "[CCTV {cctv_id}] Violation emitted: {} (track {}, conf {:.2})",
                                det.class_name, det.track_id, det.confidence
                            );
                            let job = EvidenceJob {
                                cctv_id,
                                class_id: class.id,
                                class_name: det.class_name.clone(),
                                track_id: det.track_id,
                                confidence: det.confidence,
                                jpeg,
                                captured_at,
                            };
                            if ctx.emit.send(job).is_err() {
                                warn!("[CCTV {cctv_id}] Evidence channel closed");
                            }
                        }
                        Ok(None) => {
                            debug!("[CCTV {cctv_id}] Zero-size crop dropped");
                        }
                        Err(e) => {
                            warn!("[CCTV {cctv_id}] Evidence composition failed: {e}");
                        }
                    }
                }
            }
            Err(e) => {
                error!("[CCTV {cctv_id}] Detection error: {e}");
            }
        }

        ctx.frames.publish_annotated(cctv_id, canvas);
        debug!(
            "[CCTV {cctv_id}] Processed frame in {:?}",
            started.elapsed()
        );
    }

    info!("[CCTV {cctv_id}] Detection worker stopped");
}
