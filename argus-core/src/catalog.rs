//! In-memory mirror of the `object_class` table.
//!
//! Snapshot semantics: readers grab an `Arc` of the current snapshot and
//! never contend with a refresh, which builds a new map and swaps it in.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::Result;
use crate::repo;
use argus_model::{ObjectClass, Rgb};

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Immutable view of the class table at one refresh.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    by_name: HashMap<String, ObjectClass>,
    by_id: HashMap<i32, ObjectClass>,
    pairs: HashMap<i32, i32>,
}

impl CatalogSnapshot {
    pub fn from_classes(classes: Vec<ObjectClass>) -> Self {
        let mut by_name = HashMap::with_capacity(classes.len());
        let mut by_id = HashMap::with_capacity(classes.len());
        let mut pairs = HashMap::new();

        for class in classes {
            if let Some(pair) = class.pair_id {
                // Stored one-way or both ways; the map is always symmetric.
                pairs.insert(class.id, pair);
                pairs.insert(pair, class.id);
            }
            by_id.insert(class.id, class.clone());
            by_name.insert(class.name.clone(), class);
        }

        Self {
            by_name,
            by_id,
            pairs,
        }
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&ObjectClass> {
        self.by_name.get(name)
    }

    pub fn lookup_by_id(&self, id: i32) -> Option<&ObjectClass> {
        self.by_id.get(&id)
    }

    pub fn is_violation(&self, name: &str) -> bool {
        self.by_name.get(name).is_some_and(|c| c.is_violation)
    }

    /// Display color for a class; unknown classes render white.
    pub fn color(&self, name: &str) -> Rgb {
        self.by_name.get(name).map(|c| c.color).unwrap_or_default()
    }

    pub fn pair_of(&self, id: i32) -> Option<i32> {
        self.pairs.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// TTL-refreshed class cache shared by every pipeline.
#[derive(Debug)]
pub struct ClassCatalog {
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    last_refresh: Mutex<Option<Instant>>,
    ttl: Duration,
}

impl ClassCatalog {
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
            last_refresh: Mutex::new(None),
            ttl,
        }
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Atomically replace the snapshot.
    pub fn install(&self, classes: Vec<ObjectClass>) {
        let next = Arc::new(CatalogSnapshot::from_classes(classes));
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = next;
        *self.last_refresh.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }

    fn is_stale(&self) -> bool {
        self.last_refresh
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|at| at.elapsed() > self.ttl)
            .unwrap_or(true)
    }

    /// Reload from the database unconditionally.
    pub async fn refresh(&self, pool: &PgPool) -> Result<()> {
        let classes = repo::classes::fetch_all(pool).await?;
        if classes.is_empty() {
            warn!("object_class table is empty");
        }
        info!("Loaded {} object classes", classes.len());
        self.install(classes);
        Ok(())
    }

    /// Reload only when the TTL has elapsed since the last refresh.
    pub async fn refresh_if_stale(&self, pool: &PgPool) -> Result<()> {
        if self.is_stale() {
            self.refresh(pool).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(id: i32, name: &str, is_violation: bool, pair_id: Option<i32>) -> ObjectClass {
        ObjectClass {
            id,
            name: name.into(),
            color: Rgb::new(10, 20, 30),
            is_violation,
            pair_id,
        }
    }

    #[test]
    fn pair_map_is_symmetric_even_when_stored_one_way() {
        let snapshot = CatalogSnapshot::from_classes(vec![
            class(1, "helmet", false, Some(2)),
            class(2, "no-helmet", true, None),
        ]);
        assert_eq!(snapshot.pair_of(1), Some(2));
        assert_eq!(snapshot.pair_of(2), Some(1));
        assert_eq!(snapshot.pair_of(9), None);
    }

    #[test]
    fn unknown_class_color_is_white() {
        let snapshot = CatalogSnapshot::from_classes(vec![]);
        assert_eq!(snapshot.color("nothing"), Rgb::WHITE);
        assert!(!snapshot.is_violation("nothing"));
    }

    #[test]
    fn install_swaps_the_whole_snapshot() {
        let catalog = ClassCatalog::new(DEFAULT_TTL);
        let before = catalog.snapshot();
        catalog.install(vec![class(1, "helmet", false, None)]);
        let after = catalog.snapshot();
        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
        // The old handle is still readable by anyone who held it.
        assert!(before.lookup_by_name("helmet").is_none());
    }
}
