//! Core data model definitions shared across Argus crates.

pub mod camera;
pub mod class;
pub mod mode;
pub mod roi;
pub mod schedule;
pub mod settings;
pub mod user;
pub mod violation;

pub use camera::{Camera, CameraConnection};
pub use class::{ObjectClass, Rgb};
pub use mode::PipelineMode;
pub use roi::{Region, RegionKind, RoiConfig};
pub use schedule::ScheduleWindow;
pub use settings::{DetectionSettings, EmailSettings, EmailTemplate};
pub use user::User;
pub use violation::{DailyRollup, ViolationEvent};
