//! End-to-end pipeline scenarios, driven through the detector and source
//! seams with scripted implementations.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use chrono::FixedOffset;
use image::{Rgb, RgbImage};

use crate::annotate::Annotator;
use crate::catalog::{ClassCatalog, DEFAULT_TTL};
use crate::detect::{Detection, Detector};
use crate::directory::ActiveViolations;
use crate::error::Result;
use crate::frames::FrameStore;
use crate::pipeline::detection::{run_detection_worker, DetectionContext};
use crate::pipeline::evidence::{evidence_channel, EvidenceJob};
use crate::storage::evidence_path;
use argus_model::{
    Camera, CameraConnection, DetectionSettings, ObjectClass, Region, RegionKind, Rgb as ClassRgb,
    RoiConfig,
};

const NO_HELMET_ID: i32 = 3;
const NO_VEST_ID: i32 = 5;

/// Detector scripted with one detection list per frame; counts invocations.
struct ScriptDetector {
    per_frame: Arc<Mutex<Vec<Vec<Detection>>>>,
    calls: Arc<AtomicU32>,
}

impl Detector for ScriptDetector {
    fn track(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.per_frame.lock().unwrap();
        if scripts.is_empty() {
            Ok(Vec::new())
        } else if scripts.len() == 1 {
            // Keep replaying the last frame's detections.
            Ok(scripts[0].clone())
        } else {
            Ok(scripts.remove(0))
        }
    }
}

fn detection(class_name: &str, conf: f32, track_id: u32, bbox: (f32, f32, f32, f32)) -> Detection {
    Detection {
        x1: bbox.0,
        y1: bbox.1,
        x2: bbox.2,
        y2: bbox.3,
        class_name: class_name.into(),
        confidence: conf,
        track_id,
    }
}

fn catalog() -> Arc<ClassCatalog> {
    let catalog = ClassCatalog::new(DEFAULT_TTL);
    catalog.install(vec![
        ObjectClass {
            id: 2,
            name: "helmet".into(),
            color: ClassRgb::new(0, 200, 0),
            is_violation: false,
            pair_id: Some(NO_HELMET_ID),
        },
        ObjectClass {
            id: NO_HELMET_ID,
            name: "no-helmet".into(),
            color: ClassRgb::new(200, 0, 0),
            is_violation: true,
            pair_id: Some(2),
        },
        ObjectClass {
            id: 4,
            name: "vest".into(),
            color: ClassRgb::new(0, 0, 200),
            is_violation: false,
            pair_id: Some(NO_VEST_ID),
        },
        ObjectClass {
            id: NO_VEST_ID,
            name: "no-vest".into(),
            color: ClassRgb::new(200, 100, 0),
            is_violation: true,
            pair_id: Some(4),
        },
    ]);
    Arc::new(catalog)
}

fn polygon(points: &[[f32; 2]], allowed: &[i32]) -> Region {
    Region {
        kind: RegionKind::Polygon,
        points: points.to_vec(),
        allowed_violations: allowed.to_vec(),
        name: None,
    }
}

fn full_frame_roi(allowed: &[i32]) -> RoiConfig {
    RoiConfig {
        image_width: 640,
        image_height: 480,
        items: vec![polygon(
            &[[0.0, 0.0], [640.0, 0.0], [640.0, 480.0], [0.0, 480.0]],
            allowed,
        )],
    }
}

fn camera(roi: RoiConfig) -> Arc<Camera> {
    Arc::new(Camera {
        id: 1,
        name: "Line 1".into(),
        connection: CameraConnection {
            host: "10.0.0.5".into(),
            port: 7441,
            token: "tok".into(),
        },
        location: Some("Assembly".into()),
        enabled: true,
        roi,
    })
}

struct Harness {
    frames: Arc<FrameStore>,
    detector_calls: Arc<AtomicU32>,
    jobs: Vec<EvidenceJob>,
}

/// Run the detection worker over `frame_count` copies of a synthetic
/// frame and collect every emitted evidence job.
fn run_scenario(
    cam: Arc<Camera>,
    active_for_camera: &[i32],
    scheduled: bool,
    settings: DetectionSettings,
    scripted: Vec<Vec<Detection>>,
    frame_count: usize,
) -> Harness {
    let frames = Arc::new(FrameStore::new());
    let active = Arc::new(ActiveViolations::new());
    let mut map = HashMap::new();
    map.insert(cam.id, active_for_camera.iter().copied().collect::<HashSet<_>>());
    active.install(map);

    let windows = Arc::new(crate::supervise::schedule::ActiveWindows::new());
    if scheduled {
        windows.install(HashSet::from([cam.id]));
    }

    let (emit_tx, mut emit_rx) = evidence_channel();
    let calls = Arc::new(AtomicU32::new(0));
    let detector = Box::new(ScriptDetector {
        per_frame: Arc::new(Mutex::new(scripted)),
        calls: calls.clone(),
    });

    let ctx = DetectionContext {
        camera: cam,
        catalog: catalog(),
        active,
        windows,
        frames: frames.clone(),
        annotator: Annotator::new(None),
        settings,
        emit: emit_tx,
        tz: FixedOffset::east_opt(7 * 3600).unwrap(),
    };

    let (frame_tx, frame_rx) = mpsc::sync_channel(frame_count.max(1));
    let stop = Arc::new(AtomicBool::new(false));
    let worker = {
        let stop = stop.clone();
        std::thread::spawn(move || run_detection_worker(ctx, detector, frame_rx, stop))
    };

    let frame = Arc::new(RgbImage::from_pixel(640, 480, Rgb([40, 80, 120])));
    for _ in 0..frame_count {
        frame_tx.send(frame.clone()).unwrap();
    }
    drop(frame_tx);
    worker.join().unwrap();

    let mut jobs = Vec::new();
    while let Ok(job) = emit_rx.try_recv() {
        jobs.push(job);
    }

    Harness {
        frames,
        detector_calls: calls,
        jobs,
    }
}

#[test]
fn happy_path_emits_one_recorded_violation() {
    let cam = camera(full_frame_roi(&[NO_HELMET_ID]));
    let harness = run_scenario(
        cam,
        &[NO_HELMET_ID],
        true,
        DetectionSettings::default(),
        vec![vec![detection("no-helmet", 0.9, 7, (200.0, 150.0, 400.0, 350.0))]],
        1,
    );

    assert_eq!(harness.jobs.len(), 1);
    let job = &harness.jobs[0];
    assert_eq!(job.cctv_id, 1);
    assert_eq!(job.class_id, NO_HELMET_ID);
    assert_eq!(job.track_id, 7);
    assert!(!job.jpeg.is_empty());

    // The storage path derived from this job follows the date-sharded
    // template with the class name and an 8-hex suffix.
    let path = evidence_path(job.cctv_id, &job.class_name, job.captured_at);
    let expected_prefix = format!("cctv/1/{}/no-helmet_", job.captured_at.format("%Y/%m/%d"));
    assert!(path.starts_with(&expected_prefix), "got {path}");
    assert!(path.ends_with(".jpg"));
}

#[test]
fn cooldown_suppresses_repeat_emissions_for_the_same_track() {
    let cam = camera(full_frame_roi(&[NO_HELMET_ID]));
    // 60 frames of the same tracked object under a 60 s cooldown.
    let harness = run_scenario(
        cam,
        &[NO_HELMET_ID],
        true,
        DetectionSettings::default(),
        vec![vec![detection("no-helmet", 0.9, 7, (200.0, 150.0, 400.0, 350.0))]],
        60,
    );
    assert_eq!(harness.jobs.len(), 1);
}

#[test]
fn zero_cooldown_emits_every_qualifying_detection() {
    let cam = camera(full_frame_roi(&[NO_HELMET_ID]));
    let settings = DetectionSettings {
        cooldown_seconds: 0.0,
        ..Default::default()
    };
    let harness = run_scenario(
        cam,
        &[NO_HELMET_ID],
        true,
        settings,
        vec![vec![detection("no-helmet", 0.9, 7, (200.0, 150.0, 400.0, 350.0))]],
        5,
    );
    assert_eq!(harness.jobs.len(), 5);
}

#[test]
fn detection_outside_roi_is_skipped_but_still_drawn() {
    // Polygon over the left half only; detection centered in the right half.
    let roi = RoiConfig {
        image_width: 640,
        image_height: 480,
        items: vec![polygon(
            &[[0.0, 0.0], [320.0, 0.0], [320.0, 480.0], [0.0, 480.0]],
            &[NO_HELMET_ID],
        )],
    };
    let cam = camera(roi);
    let harness = run_scenario(
        cam,
        &[NO_HELMET_ID],
        true,
        DetectionSettings::default(),
        vec![vec![detection("no-helmet", 0.9, 7, (400.0, 100.0, 500.0, 200.0))]],
        1,
    );

    assert!(harness.jobs.is_empty());

    // The box is still on the annotated frame, in the class color.
    let annotated = harness.frames.annotated(1).expect("annotated published");
    assert_eq!(annotated.image.get_pixel(400, 100), &Rgb([200, 0, 0]));
}

#[test]
fn class_not_allowed_by_the_containing_region_is_skipped() {
    // R1 (left) admits no-helmet only, R2 (right) admits no-vest only.
    let roi = RoiConfig {
        image_width: 640,
        image_height: 480,
        items: vec![
            polygon(
                &[[0.0, 0.0], [320.0, 0.0], [320.0, 480.0], [0.0, 480.0]],
                &[NO_HELMET_ID],
            ),
            polygon(
                &[[320.0, 0.0], [640.0, 0.0], [640.0, 480.0], [320.0, 480.0]],
                &[NO_VEST_ID],
            ),
        ],
    };
    let cam = camera(roi);
    // A no-vest detection whose center sits inside R1.
    let harness = run_scenario(
        cam,
        &[NO_HELMET_ID, NO_VEST_ID],
        true,
        DetectionSettings::default(),
        vec![vec![detection("no-vest", 0.9, 9, (100.0, 100.0, 200.0, 200.0))]],
        1,
    );
    assert!(harness.jobs.is_empty());
}

#[test]
fn out_of_schedule_camera_streams_without_inference() {
    let cam = camera(full_frame_roi(&[NO_HELMET_ID]));
    let harness = run_scenario(
        cam,
        &[NO_HELMET_ID],
        false, // no schedule window covers now
        DetectionSettings::default(),
        vec![vec![detection("no-helmet", 0.9, 7, (200.0, 150.0, 400.0, 350.0))]],
        3,
    );

    assert!(harness.jobs.is_empty());
    // Stream-only skips the detector entirely.
    assert_eq!(harness.detector_calls.load(Ordering::SeqCst), 0);
    assert!(harness.frames.annotated(1).is_some());
}

#[test]
fn empty_roi_keeps_the_camera_in_stream_only_even_when_scheduled() {
    let cam = camera(RoiConfig::default());
    let harness = run_scenario(
        cam,
        &[NO_HELMET_ID],
        true,
        DetectionSettings::default(),
        vec![vec![detection("no-helmet", 0.9, 7, (200.0, 150.0, 400.0, 350.0))]],
        2,
    );
    assert!(harness.jobs.is_empty());
    assert_eq!(harness.detector_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn inactive_class_is_ignored_even_inside_a_region() {
    let cam = camera(full_frame_roi(&[]));
    // no-vest detected, but only no-helmet is active for this camera.
    let harness = run_scenario(
        cam,
        &[NO_HELMET_ID],
        true,
        DetectionSettings::default(),
        vec![vec![detection("no-vest", 0.9, 4, (200.0, 150.0, 400.0, 350.0))]],
        1,
    );
    assert!(harness.jobs.is_empty());
}

#[test]
fn low_confidence_detection_is_not_emitted() {
    let cam = camera(full_frame_roi(&[NO_HELMET_ID]));
    let harness = run_scenario(
        cam,
        &[NO_HELMET_ID],
        true,
        DetectionSettings::default(),
        vec![vec![detection("no-helmet", 0.2, 7, (200.0, 150.0, 400.0, 350.0))]],
        1,
    );
    assert!(harness.jobs.is_empty());
}

#[test]
fn positive_counterpart_class_is_drawn_but_never_emitted() {
    let cam = camera(full_frame_roi(&[]));
    let harness = run_scenario(
        cam,
        &[NO_HELMET_ID],
        true,
        DetectionSettings::default(),
        vec![vec![detection("helmet", 0.95, 2, (100.0, 100.0, 220.0, 260.0))]],
        1,
    );
    assert!(harness.jobs.is_empty());
    let annotated = harness.frames.annotated(1).expect("annotated published");
    // Drawn in the helmet class color.
    assert_eq!(annotated.image.get_pixel(100, 100), &Rgb([0, 200, 0]));
}
