//! Fleet supervisor: converges every camera pipeline toward its desired
//! state on startup, on admin changes, and on each minute tick.

use std::sync::Arc;

use tracing::debug;

use super::schedule::{ActiveWindows, ScheduleEvaluator};
use super::PipelineSupervisor;
use crate::directory::CameraDirectory;

pub struct FleetSupervisor {
    directory: Arc<CameraDirectory>,
    evaluator: ScheduleEvaluator,
    windows: Arc<ActiveWindows>,
    pipelines: Arc<PipelineSupervisor>,
}

impl std::fmt::Debug for FleetSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetSupervisor").finish_non_exhaustive()
    }
}

impl FleetSupervisor {
    pub fn new(
        directory: Arc<CameraDirectory>,
        evaluator: ScheduleEvaluator,
        windows: Arc<ActiveWindows>,
        pipelines: Arc<PipelineSupervisor>,
    ) -> Self {
        Self {
            directory,
            evaluator,
            windows,
            pipelines,
        }
    }

    pub fn pipelines(&self) -> &PipelineSupervisor {
        &self.pipelines
    }

    /// One convergence pass. Called by the minute timer and after every
    /// admin action touching cameras or schedules.
    ///
    /// For each camera: disabled means stopped; enabled means running, in
    /// full mode exactly when a schedule window is open now.
    pub async fn refresh_scheduler_state(&self) {
        let in_window = self.evaluator.active_camera_ids_now().await;
        self.windows.install(in_window.clone());

        let cameras = self.directory.snapshot();

        // Cameras that disappeared from the directory were disabled or
        // deleted; tear their pipelines down.
        for cctv_id in self.pipelines.running_ids() {
            if !cameras.contains_key(&cctv_id) {
                self.pipelines.stop(cctv_id).await;
            }
        }

        for (cctv_id, camera) in cameras.iter() {
            if !camera.enabled {
                self.pipelines.stop(*cctv_id).await;
                continue;
            }
            let desired_full = in_window.contains(cctv_id);
            debug!(
                "[CCTV {cctv_id}] desired mode: {}",
                if desired_full { "full" } else { "stream-only" }
            );
            self.pipelines.start(camera.clone(), desired_full).await;
        }
    }
}
