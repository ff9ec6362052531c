//! Shared server state.

use std::sync::Arc;

use image::RgbImage;
use sqlx::PgPool;

use argus_core::{CameraDirectory, FrameStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub frames: Arc<FrameStore>,
    pub directory: Arc<CameraDirectory>,
    /// Pre-rendered frame served when both slots have gone stale.
    pub freeze_placeholder: Arc<RgbImage>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
