//! Server configuration, loaded from `ARGUS_`-prefixed environment
//! variables over built-in defaults.

use std::path::PathBuf;

use chrono::FixedOffset;
use serde::Deserialize;

/// Default PPE class list for models exported without a sidecar file.
pub const DEFAULT_CLASS_NAMES: &[&str] = &[
    "helmet",
    "no-helmet",
    "vest",
    "no-vest",
    "gloves",
    "no-gloves",
    "goggles",
    "no-goggles",
    "boots",
    "no-boots",
    "person",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_host: String,
    pub server_port: u16,

    pub database_url: String,

    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_bucket: String,

    pub model_path: PathBuf,
    /// Optional class-list file, one name per line.
    pub class_names_path: Option<PathBuf>,
    /// Optional TTF used for overlays and evidence labels.
    pub font_path: Option<PathBuf>,

    /// Schedule clock offset from UTC, in minutes (default WIB, +07:00).
    pub schedule_utc_offset_minutes: i32,
    pub retention_days: u32,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 8080)?
            .set_default("supabase_bucket", "violations")?
            .set_default("model_path", "model/ppe-detection.onnx")?
            .set_default("schedule_utc_offset_minutes", 7 * 60)?
            .set_default("retention_days", 32)?
            .add_source(config::Environment::with_prefix("ARGUS"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn schedule_tz(&self) -> FixedOffset {
        FixedOffset::east_opt(self.schedule_utc_offset_minutes * 60)
            .or_else(|| FixedOffset::east_opt(7 * 3600))
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }
}
