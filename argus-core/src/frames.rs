//! Shared per-camera frame slots feeding the live preview.
//!
//! Each camera owns exactly two slots: the latest annotated frame and the
//! latest raw frame, each behind its own mutex. Writers are the capture and
//! detection workers; readers are the preview handlers. Frames are stored as
//! `Arc<RgbImage>` so readers clone a handle and release the lock
//! immediately, never holding it across encoding or a network write.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use dashmap::DashMap;
use image::RgbImage;

/// A published frame with its publication instant.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub image: Arc<RgbImage>,
    pub at: Instant,
}

impl TimedFrame {
    fn now(image: Arc<RgbImage>) -> Self {
        Self {
            image,
            at: Instant::now(),
        }
    }

    pub fn age(&self) -> std::time::Duration {
        self.at.elapsed()
    }
}

#[derive(Debug, Default)]
struct CameraSlots {
    annotated: Mutex<Option<TimedFrame>>,
    raw: Mutex<Option<TimedFrame>>,
}

/// Registry of frame slots for every camera with a running pipeline.
#[derive(Debug, Default)]
pub struct FrameStore {
    slots: DashMap<i32, Arc<CameraSlots>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots_for(&self, cctv_id: i32) -> Arc<CameraSlots> {
        self.slots
            .entry(cctv_id)
            .or_insert_with(|| Arc::new(CameraSlots::default()))
            .clone()
    }

    /// Overwrite the annotated slot; latest wins.
    pub fn publish_annotated(&self, cctv_id: i32, frame: impl Into<Arc<RgbImage>>) {
        let slots = self.slots_for(cctv_id);
        let mut guard = slots.annotated.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(TimedFrame::now(frame.into()));
    }

    /// Overwrite the raw slot; latest wins.
    pub fn publish_raw(&self, cctv_id: i32, frame: impl Into<Arc<RgbImage>>) {
        let slots = self.slots_for(cctv_id);
        let mut guard = slots.raw.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(TimedFrame::now(frame.into()));
    }

    /// Seed both slots with the same frame, timestamped now.
    pub fn publish_both(&self, cctv_id: i32, frame: impl Into<Arc<RgbImage>>) {
        let slots = self.slots_for(cctv_id);
        let timed = TimedFrame {
            image: frame.into(),
            at: Instant::now(),
        };
        {
            let mut guard = slots.annotated.lock().unwrap_or_else(|e| e.into_inner());
            *guard = Some(timed.clone());
        }
        let mut guard = slots.raw.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(timed);
    }

    /// Copy-then-release read of the annotated slot.
    pub fn annotated(&self, cctv_id: i32) -> Option<TimedFrame> {
        let slots = self.slots.get(&cctv_id)?.clone();
        let guard = slots.annotated.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Copy-then-release read of the raw slot.
    pub fn raw(&self, cctv_id: i32) -> Option<TimedFrame> {
        let slots = self.slots.get(&cctv_id)?.clone();
        let guard = slots.raw.lock().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    /// Drop the slots of a camera whose pipeline has been torn down.
    pub fn remove(&self, cctv_id: i32) {
        self.slots.remove(&cctv_id);
    }

    pub fn known(&self, cctv_id: i32) -> bool {
        self.slots.contains_key(&cctv_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: u32, h: u32) -> RgbImage {
        RgbImage::new(w, h)
    }

    #[test]
    fn latest_write_wins() {
        let store = FrameStore::new();
        store.publish_annotated(1, frame(4, 4));
        store.publish_annotated(1, frame(8, 8));
        let published = store.annotated(1).unwrap();
        assert_eq!(published.image.width(), 8);
    }

    #[test]
    fn slots_are_independent() {
        let store = FrameStore::new();
        store.publish_raw(1, frame(4, 4));
        assert!(store.annotated(1).is_none());
        assert!(store.raw(1).is_some());
    }

    #[test]
    fn publish_both_seeds_both_slots() {
        let store = FrameStore::new();
        store.publish_both(7, frame(2, 2));
        assert!(store.annotated(7).is_some());
        assert!(store.raw(7).is_some());
    }

    #[test]
    fn remove_forgets_the_camera() {
        let store = FrameStore::new();
        store.publish_both(7, frame(2, 2));
        store.remove(7);
        assert!(!store.known(7));
        assert!(store.annotated(7).is_none());
    }
}
