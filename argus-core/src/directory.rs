//! In-memory mirrors of the enabled-camera table and the per-camera
//! active-violation selections.
//!
//! Both caches follow the same snapshot discipline as the class catalog:
//! refreshes build a fresh map and swap it in; pipelines read through
//! `Arc` handles and never block a refresh.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::Result;
use crate::repo::{self, cameras::CameraRow};
use crate::storage::EvidenceStore;
use argus_model::{Camera, CameraConnection, RoiConfig};

/// Parse the `area` column, which holds either an inline ROI document or
/// the filename of one stored as an object.
///
/// Any parse or fetch failure degrades to an empty ROI: the camera then
/// runs stream-only until a valid document exists.
pub async fn resolve_roi(
    cctv_id: i32,
    area: Option<&str>,
    store: Option<&dyn EvidenceStore>,
) -> RoiConfig {
    let Some(area) = area.map(str::trim).filter(|a| !a.is_empty()) else {
        return RoiConfig::default();
    };

    if area.starts_with('{') {
        match serde_json::from_str::<RoiConfig>(area) {
            Ok(roi) => return roi,
            Err(e) => {
                warn!("[CCTV {cctv_id}] Invalid inline ROI document: {e}");
                return RoiConfig::default();
            }
        }
    }

    // Anything else is a storage-object filename.
    let Some(store) = store else {
        warn!("[CCTV {cctv_id}] ROI file '{area}' referenced but no store configured");
        return RoiConfig::default();
    };
    match store.fetch(area).await {
        Ok(bytes) => match serde_json::from_slice::<RoiConfig>(&bytes) {
            Ok(roi) => roi,
            Err(e) => {
                warn!("[CCTV {cctv_id}] ROI file '{area}' is not a valid document: {e}");
                RoiConfig::default()
            }
        },
        Err(e) => {
            warn!("[CCTV {cctv_id}] Could not fetch ROI file '{area}': {e}");
            RoiConfig::default()
        }
    }
}

async fn camera_from_row(row: CameraRow, store: Option<&dyn EvidenceStore>) -> Camera {
    let roi = resolve_roi(row.id, row.area.as_deref(), store).await;
    Camera {
        id: row.id,
        name: row.name,
        connection: CameraConnection {
            host: row.ip_address,
            port: row.port.clamp(1, 65535) as u16,
            token: row.token,
        },
        location: row.location,
        enabled: row.enabled,
        roi,
    }
}

/// Snapshot cache of enabled cameras.
#[derive(Debug, Default)]
pub struct CameraDirectory {
    cameras: RwLock<Arc<HashMap<i32, Arc<Camera>>>>,
}

impl CameraDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<HashMap<i32, Arc<Camera>>> {
        self.cameras
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn get(&self, cctv_id: i32) -> Option<Arc<Camera>> {
        self.snapshot().get(&cctv_id).cloned()
    }

    pub fn install(&self, cameras: Vec<Camera>) {
        let map: HashMap<i32, Arc<Camera>> =
            cameras.into_iter().map(|c| (c.id, Arc::new(c))).collect();
        *self.cameras.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(map);
    }

    /// Reload every enabled camera, resolving ROI documents through the
    /// store when they are stored as files.
    pub async fn refresh(&self, pool: &PgPool, store: Option<&dyn EvidenceStore>) -> Result<()> {
        let rows = repo::cameras::fetch_enabled(pool).await?;
        let mut cameras = Vec::with_capacity(rows.len());
        for row in rows {
            cameras.push(camera_from_row(row, store).await);
        }
        info!("Loaded {} enabled camera configs", cameras.len());
        self.install(cameras);
        Ok(())
    }
}

/// Snapshot cache of `cctv_violation_config` active selections.
#[derive(Debug, Default)]
pub struct ActiveViolations {
    by_camera: RwLock<Arc<HashMap<i32, HashSet<i32>>>>,
}

impl ActiveViolations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<HashMap<i32, HashSet<i32>>> {
        self.by_camera
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The active class-id set for a camera; empty when nothing is active.
    pub fn active_for(&self, cctv_id: i32) -> HashSet<i32> {
        self.snapshot().get(&cctv_id).cloned().unwrap_or_default()
    }

    pub fn install(&self, map: HashMap<i32, HashSet<i32>>) {
        *self.by_camera.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(map);
    }

    pub async fn refresh(&self, pool: &PgPool) -> Result<()> {
        let map = repo::cameras::fetch_active_violations(pool).await?;
        info!("Loaded active violation selections for {} cameras", map.len());
        self.install(map);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_model::RegionKind;

    #[tokio::test]
    async fn inline_json_roi_parses() {
        let area = r#"{"image_width":1920,"image_height":1080,
            "items":[{"type":"polygon","points":[[0,0],[10,0],[10,10]],
                      "allowed_violations":[3]}]}"#;
        let roi = resolve_roi(1, Some(area), None).await;
        assert_eq!(roi.items.len(), 1);
        assert_eq!(roi.items[0].kind, RegionKind::Polygon);
    }

    #[tokio::test]
    async fn filename_shape_is_fetched_from_the_store() {
        let mut store = crate::storage::MockEvidenceStore::new();
        store.expect_fetch().returning(|_| {
            Ok(br#"{"image_width":640,"image_height":480,
                "items":[{"type":"polygon","points":[[0,0],[10,0],[10,10]]}]}"#
                .to_vec())
        });

        let roi = resolve_roi(1, Some("roi/cam1.json"), Some(&store)).await;
        assert_eq!(roi.items.len(), 1);
        assert_eq!(roi.image_width, 640);
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty_roi() {
        let mut store = crate::storage::MockEvidenceStore::new();
        store
            .expect_fetch()
            .returning(|_| Err(crate::error::CoreError::Storage("offline".into())));
        let roi = resolve_roi(1, Some("roi/cam1.json"), Some(&store)).await;
        assert!(roi.is_empty());
    }

    #[tokio::test]
    async fn bad_documents_degrade_to_empty_roi() {
        assert!(resolve_roi(1, Some("{not json"), None).await.is_empty());
        assert!(resolve_roi(1, Some(""), None).await.is_empty());
        assert!(resolve_roi(1, None, None).await.is_empty());
        // Filename shape with no store configured.
        assert!(resolve_roi(1, Some("roi/cam1.json"), None).await.is_empty());
    }

    #[test]
    fn active_set_defaults_to_empty() {
        let active = ActiveViolations::new();
        assert!(active.active_for(99).is_empty());

        let mut map = HashMap::new();
        map.insert(1, HashSet::from([3, 5]));
        active.install(map);
        assert_eq!(active.active_for(1), HashSet::from([3, 5]));
        assert!(active.active_for(2).is_empty());
    }
}
