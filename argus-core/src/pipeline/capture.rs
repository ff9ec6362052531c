//! Capture worker: one per camera, owns the decoder connection.
//!
//! Keeps the raw frame slot fresh on every successful read, forwards every
//! `frame_skip`-th frame into the bounded detection queue (dropping when
//! full), and runs a small {connecting, reading, backoff} machine around
//! the decoder so reconnects are bounded and testable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::annotate::{Annotator, RED};
use crate::frames::FrameStore;
use crate::video::{StreamOpener, VideoSource};
use argus_model::Camera;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Forward every Nth decoded frame to detection.
    pub frame_skip: u32,
    /// Consecutive read failures before the decoder is torn down.
    pub fail_threshold: u32,
    /// Reconnect attempts per outage before the worker gives up.
    pub max_retries: u32,
    /// Base backoff; attempt n sleeps `retry_delay * 2^n`, capped.
    pub retry_delay: Duration,
    pub max_backoff: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_skip: 15,
            fail_threshold: 10,
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl CaptureConfig {
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.retry_delay
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

enum CaptureState {
    Connecting { attempt: u32 },
    Reading,
    Backoff { attempt: u32 },
}

/// Run the capture loop until the stop flag is raised or reconnection is
/// exhausted. The fleet supervisor re-creates exited workers on the next
/// schedule tick.
pub fn run_capture_worker(
    camera: Arc<Camera>,
    opener: Arc<dyn StreamOpener>,
    queue: SyncSender<Arc<RgbImage>>,
    frames: Arc<FrameStore>,
    annotator: Annotator,
    config: CaptureConfig,
    stop: Arc<AtomicBool>,
) {
    let cctv_id = camera.id;
    let mut state = CaptureState::Connecting { attempt: 0 };
    let mut source: Option<Box<dyn VideoSource>> = None;
    let mut fail_count: u32 = 0;
    let mut frame_index: u64 = 0;

    while !stop.load(Ordering::Relaxed) {
        match state {
            CaptureState::Connecting { attempt } => {
                match opener.open(&camera.connection) {
                    Ok(new_source) => {
                        info!("[CCTV {cctv_id}] Stream connected");
                        source = Some(new_source);
                        fail_count = 0;
                        state = CaptureState::Reading;
                    }
                    Err(e) => {
                        warn!(
                            "[CCTV {cctv_id}] Stream open failed \
                             (attempt {}/{}): {e}",
                            attempt + 1,
                            config.max_retries
                        );
                        if attempt + 1 >= config.max_retries {
                            error!("[CCTV {cctv_id}] Could not open stream; giving up");
                            publish_failure(&frames, &annotator, cctv_id);
                            return;
                        }
                        state = CaptureState::Backoff { attempt };
                    }
                }
            }

            CaptureState::Backoff { attempt } => {
                let delay = config.backoff_for(attempt);
                debug!("[CCTV {cctv_id}] Reconnect backoff {:?}", delay);
                sleep_interruptible(delay, &stop);
                state = CaptureState::Connecting {
                    attempt: attempt + 1,
                };
            }

            CaptureState::Reading => {
                let Some(active) = source.as_mut() else {
                    state = CaptureState::Connecting { attempt: 0 };
                    continue;
                };

                match active.read_frame() {
                    Ok(frame) => {
                        fail_count = 0;
                        let frame = Arc::new(frame);
                        frames.publish_raw(cctv_id, frame.clone());

                        if frame_index % config.frame_skip.max(1) as u64 == 0 {
                            match queue.try_send(frame) {
                                Ok(()) => {}
                                Err(TrySendError::Full(_)) => {
                                    debug!("[CCTV {cctv_id}] Detection queue full, frame dropped");
                                }
                                Err(TrySendError::Disconnected(_)) => {
                                    // Stream-only mode has no consumer.
                                }
                            }
                        }
                        frame_index += 1;
                    }
                    Err(e) => {
                        fail_count += 1;
                        warn!(
                            "[CCTV {cctv_id}] Frame read failed ({fail_count}/{}): {e}",
                            config.fail_threshold
                        );
                        if fail_count >= config.fail_threshold {
                            publish_failure(&frames, &annotator, cctv_id);
                            source = None;
                            fail_count = 0;
                            // Re-enter the connect cycle; the open itself is
                            // retried with backoff from attempt zero.
                            state = CaptureState::Connecting { attempt: 0 };
                        }
                    }
                }
            }
        }
    }

    info!("[CCTV {cctv_id}] Capture worker stopped");
}

fn publish_failure(frames: &FrameStore, annotator: &Annotator, cctv_id: i32) {
    let placeholder = Arc::new(annotator.placeholder("Stream Failed", RED));
    frames.publish_both(cctv_id, placeholder);
}

/// Sleep in small slices so a stop signal interrupts a long backoff.
fn sleep_interruptible(total: Duration, stop: &AtomicBool) {
    let slice = Duration::from_millis(50);
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}
