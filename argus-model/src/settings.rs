//! Operator-tunable run-time settings.

use serde::{Deserialize, Serialize};

/// Detection pipeline knobs from the `detection_settings` table.
///
/// Values are clamped against the table's `min_value`/`max_value` columns
/// when loaded; the defaults here match a fresh deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    pub confidence_threshold: f32,
    pub cooldown_seconds: f64,
    pub cleanup_interval: f64,
    pub frame_skip: u32,
    pub queue_size: usize,
    pub padding_percent: f32,
    pub target_max_width: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            cooldown_seconds: 60.0,
            cleanup_interval: 60.0,
            frame_skip: 15,
            queue_size: 3,
            padding_percent: 0.5,
            target_max_width: 320,
        }
    }
}

/// SMTP relay configuration from the `email_settings` table (single row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub smtp_from: String,
    pub enable_auto_email: bool,
}

/// A stored subject/body template, keyed by purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub template_key: String,
    pub subject_template: String,
    pub body_template: String,
    pub is_active: bool,
}
