//! `detection_settings` and `email_settings` queries.

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::warn;

use crate::error::Result;
use argus_model::{DetectionSettings, EmailSettings};

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SettingRow {
    pub key: String,
    pub value: Option<f64>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

/// Fold setting rows onto the defaults, clamping each value into its
/// row's `[min_value, max_value]` range. Missing keys keep their
/// defaults; unknown keys are ignored.
pub(crate) fn fold_settings(rows: Vec<SettingRow>) -> DetectionSettings {
    let mut values: HashMap<String, f64> = HashMap::new();
    for row in rows {
        let Some(mut value) = row.value else { continue };
        if let Some(min) = row.min_value {
            value = value.max(min);
        }
        if let Some(max) = row.max_value {
            value = value.min(max);
        }
        values.insert(row.key, value);
    }

    let mut settings = DetectionSettings::default();
    for (key, value) in values {
        match key.as_str() {
            "confidence_threshold" => settings.confidence_threshold = value as f32,
            "cooldown_seconds" => settings.cooldown_seconds = value.max(0.0),
            "cleanup_interval" => settings.cleanup_interval = value.max(1.0),
            "frame_skip" => settings.frame_skip = (value as u32).max(1),
            "queue_size" => settings.queue_size = (value as usize).max(1),
            "padding_percent" => settings.padding_percent = value as f32,
            "target_max_width" => settings.target_max_width = (value as u32).max(1),
            other => warn!("Unknown detection setting key '{other}' ignored"),
        }
    }
    settings
}

/// Load the tunable pipeline knobs.
pub async fn fetch_detection_settings(pool: &PgPool) -> Result<DetectionSettings> {
    let rows: Vec<SettingRow> = sqlx::query_as(
        r#"
        SELECT key, value::float8 AS value,
               min_value::float8 AS min_value,
               max_value::float8 AS max_value
        FROM detection_settings
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(fold_settings(rows))
}

#[derive(Debug, sqlx::FromRow)]
struct EmailRow {
    smtp_host: Option<String>,
    smtp_port: Option<i32>,
    smtp_user: Option<String>,
    smtp_pass: Option<String>,
    smtp_from: Option<String>,
    enable_auto_email: Option<bool>,
}

/// The single SMTP settings row, if configured completely enough to send.
pub async fn fetch_email_settings(pool: &PgPool) -> Result<Option<EmailSettings>> {
    let row: Option<EmailRow> = sqlx::query_as(
        r#"
        SELECT smtp_host, smtp_port::int4 AS smtp_port, smtp_user,
               smtp_pass, smtp_from, enable_auto_email
        FROM email_settings
        ORDER BY id
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else { return Ok(None) };
    let (Some(host), Some(user), Some(pass)) = (row.smtp_host, row.smtp_user, row.smtp_pass)
    else {
        warn!("email_settings row is incomplete; notifications disabled");
        return Ok(None);
    };

    let from = row.smtp_from.unwrap_or_else(|| user.clone());
    Ok(Some(EmailSettings {
        smtp_host: host,
        smtp_port: row.smtp_port.unwrap_or(587).clamp(1, 65535) as u16,
        smtp_user: user,
        smtp_pass: pass,
        smtp_from: from,
        enable_auto_email: row.enable_auto_email.unwrap_or(false),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, value: f64, min: Option<f64>, max: Option<f64>) -> SettingRow {
        SettingRow {
            key: key.into(),
            value: Some(value),
            min_value: min,
            max_value: max,
        }
    }

    #[test]
    fn values_are_clamped_into_their_row_range() {
        let settings = fold_settings(vec![
            row("confidence_threshold", 0.95, Some(0.3), Some(0.5)),
            row("cooldown_seconds", -10.0, Some(0.0), Some(3600.0)),
        ]);
        assert_eq!(settings.confidence_threshold, 0.5);
        assert_eq!(settings.cooldown_seconds, 0.0);
    }

    #[test]
    fn missing_keys_keep_defaults() {
        let settings = fold_settings(vec![row("frame_skip", 5.0, None, None)]);
        assert_eq!(settings.frame_skip, 5);
        assert_eq!(settings.queue_size, DetectionSettings::default().queue_size);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let settings = fold_settings(vec![row("warp_factor", 9.0, None, None)]);
        assert_eq!(settings, DetectionSettings::default());
    }

    #[test]
    fn degenerate_values_are_floored() {
        let settings = fold_settings(vec![
            row("frame_skip", 0.0, None, None),
            row("queue_size", 0.0, None, None),
            row("cleanup_interval", 0.0, None, None),
        ]);
        assert_eq!(settings.frame_skip, 1);
        assert_eq!(settings.queue_size, 1);
        assert_eq!(settings.cleanup_interval, 1.0);
    }

    #[test]
    fn rows_without_values_are_skipped() {
        let settings = fold_settings(vec![SettingRow {
            key: "frame_skip".into(),
            value: None,
            min_value: Some(1.0),
            max_value: Some(60.0),
        }]);
        assert_eq!(settings, DetectionSettings::default());
    }
}
