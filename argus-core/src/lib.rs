//! Core library for the Argus PPE monitoring service.
//!
//! Hosts the per-camera capture/detection pipeline, the violation
//! processor, fleet supervision and scheduling, the shared configuration
//! caches, and the notification stack. The HTTP surface lives in
//! `argus-server`.

pub mod annotate;
pub mod catalog;
pub mod detect;
pub mod directory;
pub mod error;
pub mod frames;
pub mod maintenance;
pub mod notify;
pub mod pipeline;
pub mod repo;
pub mod reports;
pub mod roi;
pub mod storage;
pub mod supervise;
pub mod video;

pub use annotate::Annotator;
pub use catalog::{CatalogSnapshot, ClassCatalog};
pub use directory::{ActiveViolations, CameraDirectory};
pub use error::{CoreError, Result};
pub use frames::{FrameStore, TimedFrame};
pub use maintenance::{Maintenance, MaintenanceConfig};
pub use notify::{NotificationService, SmtpMailer};
pub use pipeline::{EvidenceProcessor, PolaroidSpec};
pub use storage::{EvidenceStore, SupabaseStore};
pub use supervise::{
    ActiveWindows, FleetSupervisor, PipelineShared, PipelineSupervisor, ScheduleEvaluator,
};
