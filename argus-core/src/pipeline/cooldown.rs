//! Per-(track, class) emission cooldown.
//!
//! The table is owned by a single detection worker, so it needs no locking.
//! Cooldown is measured against wall-clock monotonic time; it survives
//! decoder restarts, which video timestamps would not.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct TrackTable {
    entries: HashMap<u32, HashMap<String, Instant>>,
}

impl TrackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a (track, class) pair may emit at `now`. On success the
    /// last-emit instant is recorded immediately, so a later failure
    /// downstream still suppresses duplicates for the cooldown window.
    pub fn try_emit(
        &mut self,
        track_id: u32,
        class_name: &str,
        cooldown: Duration,
        now: Instant,
    ) -> bool {
        let class_times = self.entries.entry(track_id).or_default();
        if let Some(last) = class_times.get(class_name) {
            if now.saturating_duration_since(*last) < cooldown {
                return false;
            }
        }
        class_times.insert(class_name.to_owned(), now);
        true
    }

    /// Drop tracks whose most recent emission is older than `older_than`.
    /// Returns how many tracks were removed.
    pub fn sweep(&mut self, older_than: Duration, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, class_times| {
            class_times
                .values()
                .any(|last| now.saturating_duration_since(*last) <= older_than)
        });
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_emission_always_passes() {
        let mut table = TrackTable::new();
        assert!(table.try_emit(7, "no-helmet", Duration::from_secs(60), Instant::now()));
    }

    #[test]
    fn repeat_within_cooldown_is_suppressed() {
        let mut table = TrackTable::new();
        let t0 = Instant::now();
        assert!(table.try_emit(7, "no-helmet", Duration::from_secs(60), t0));
        assert!(!table.try_emit(7, "no-helmet", Duration::from_secs(60), t0 + Duration::from_secs(10)));
        assert!(table.try_emit(7, "no-helmet", Duration::from_secs(60), t0 + Duration::from_secs(60)));
    }

    #[test]
    fn cooldown_is_per_track_and_class() {
        let mut table = TrackTable::new();
        let t0 = Instant::now();
        assert!(table.try_emit(7, "no-helmet", Duration::from_secs(60), t0));
        assert!(table.try_emit(7, "no-vest", Duration::from_secs(60), t0));
        assert!(table.try_emit(8, "no-helmet", Duration::from_secs(60), t0));
    }

    #[test]
    fn zero_cooldown_emits_every_time() {
        let mut table = TrackTable::new();
        let t0 = Instant::now();
        for _ in 0..10 {
            assert!(table.try_emit(7, "no-helmet", Duration::ZERO, t0));
        }
    }

    #[test]
    fn sweep_removes_idle_tracks_only() {
        let mut table = TrackTable::new();
        let t0 = Instant::now();
        table.try_emit(1, "no-helmet", Duration::ZERO, t0);
        table.try_emit(2, "no-vest", Duration::ZERO, t0 + Duration::from_secs(100));

        let removed = table.sweep(Duration::from_secs(60), t0 + Duration::from_secs(120));
        assert_eq!(removed, 1);
        assert_eq!(table.len(), 1);
    }
}
