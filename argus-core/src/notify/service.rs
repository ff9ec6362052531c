//! Per-event and recap notification flows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use super::mailer::{Attachment, Mailer};
use super::pdf::{build_recap_pdf, RecapEntry};
use super::templates;
use crate::error::{CoreError, Result};
use crate::repo::{self, violations::ViolationDetail};
use argus_model::{EmailSettings, EmailTemplate, User};

/// Template key for per-event alerts.
pub const VIOLATION_TEMPLATE_KEY: &str = "ppe_violation";
pub const WEEKLY_RECAP_TEMPLATE_KEY: &str = "violation_weekly_recap";
pub const MONTHLY_RECAP_TEMPLATE_KEY: &str = "violation_monthly_recap";
pub const CUSTOM_RECAP_TEMPLATE_KEY: &str = "violation_custom_report";

/// Evidence download timeout.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

pub struct NotificationService {
    pool: PgPool,
    mailer: Arc<dyn Mailer>,
    http: reqwest::Client,
    tz: FixedOffset,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService").finish_non_exhaustive()
    }
}

impl NotificationService {
    pub fn new(pool: PgPool, mailer: Arc<dyn Mailer>, tz: FixedOffset) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self {
            pool,
            mailer,
            http,
            tz,
        })
    }

    /// Settings are re-read per send so credential or copy changes take
    /// effect without a restart.
    async fn email_settings(&self) -> Result<Option<EmailSettings>> {
        repo::settings::fetch_email_settings(&self.pool).await
    }

    async fn template_or_default(
        &self,
        key: &str,
        default_subject: &str,
        default_body: &str,
    ) -> EmailTemplate {
        match repo::templates::fetch_active(&self.pool, key).await {
            Ok(Some(template)) => template,
            Ok(None) => EmailTemplate {
                template_key: key.to_owned(),
                subject_template: default_subject.to_owned(),
                body_template: default_body.to_owned(),
                is_active: true,
            },
            Err(e) => {
                warn!("Template lookup for '{key}' failed, using default: {e}");
                EmailTemplate {
                    template_key: key.to_owned(),
                    subject_template: default_subject.to_owned(),
                    body_template: default_body.to_owned(),
                    is_active: true,
                }
            }
        }
    }

    async fn download_image(&self, url: &str) -> Option<Vec<u8>> {
        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                response.bytes().await.ok().map(|b| b.to_vec())
            }
            Ok(response) => {
                warn!("Evidence download {url} returned {}", response.status());
                None
            }
            Err(e) => {
                warn!("Evidence download {url} failed: {e}");
                None
            }
        }
    }

    /// Notify the responsible users of one event, honoring the
    /// `enable_auto_email` flag. Called from the violation processor.
    pub async fn notify_violation_auto(&self, violation_id: i64) -> Result<()> {
        let Some(settings) = self.email_settings().await? else {
            return Ok(());
        };
        if !settings.enable_auto_email {
            debug!("Auto email disabled; skipping violation {violation_id}");
            return Ok(());
        }
        self.notify_violation_with(&settings, violation_id).await?;
        Ok(())
    }

    /// Notify unconditionally (operator-triggered resend). Returns how many
    /// recipients were reached.
    pub async fn notify_violation(&self, violation_id: i64) -> Result<u32> {
        let settings = self.email_settings().await?.ok_or_else(|| {
            CoreError::Config("email settings are not configured".into())
        })?;
        self.notify_violation_with(&settings, violation_id).await
    }

    async fn notify_violation_with(
        &self,
        settings: &EmailSettings,
        violation_id: i64,
    ) -> Result<u32> {
        let detail = repo::violations::fetch_detail(&self.pool, violation_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("violation {violation_id}")))?;

        let recipients = repo::users::recipients_for_camera(&self.pool, detail.cctv_id).await?;
        if recipients.is_empty() {
            warn!(
                "No users mapped to CCTV {}; violation {} not mailed",
                detail.cctv_id, violation_id
            );
            return Ok(0);
        }

        let template = self
            .template_or_default(
                VIOLATION_TEMPLATE_KEY,
                templates::DEFAULT_VIOLATION_SUBJECT,
                templates::DEFAULT_VIOLATION_BODY,
            )
            .await;

        let image = self.download_image(&detail.image_url).await;
        let attachment = image.map(|bytes| Attachment {
            filename: format!("violation_{}_{}.jpg", violation_id, detail.violation_name),
            content_type: "image/jpeg".into(),
            bytes,
        });

        let mut sent = 0u32;
        for recipient in &recipients {
            let subs = self.violation_substitutions(&detail, recipient, violation_id);
            let subject = templates::render(&template.subject_template, &subs);
            let body = templates::render(&template.body_template, &subs);
            match self
                .mailer
                .send(settings, &recipient.email, &subject, &body, attachment.clone())
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => warn!(
                    "Violation {} email to {} failed: {e}",
                    violation_id, recipient.email
                ),
            }
        }

        info!(
            "Violation {} notified to {}/{} recipients",
            violation_id,
            sent,
            recipients.len()
        );
        Ok(sent)
    }

    fn violation_substitutions(
        &self,
        detail: &ViolationDetail,
        recipient: &User,
        violation_id: i64,
    ) -> HashMap<&'static str, String> {
        let local = detail.timestamp.with_timezone(&self.tz);
        let mut subs = HashMap::new();
        subs.insert("full_name", recipient.full_name.clone());
        subs.insert("violation_name", detail.violation_name.to_uppercase());
        subs.insert("cctv_name", detail.cctv_name.clone());
        subs.insert(
            "location",
            detail.location.clone().unwrap_or_else(|| "Unknown Location".into()),
        );
        subs.insert("timestamp", local.format("%Y-%m-%d %H:%M:%S").to_string());
        subs.insert("violation_id", violation_id.to_string());
        subs
    }

    /// Send per-user recap PDFs for `[start, end)`.
    ///
    /// The effective camera set of each user is the intersection of their
    /// ownership with `camera_filter` (when given); `user_filter` restricts
    /// the audience. Users with no events in the window are skipped.
    /// Returns the number of recap emails sent.
    pub async fn send_recap_emails(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        template_key: &str,
        user_filter: Option<&[i32]>,
        camera_filter: Option<&[i32]>,
    ) -> Result<u32> {
        let Some(settings) = self.email_settings().await? else {
            warn!("Email settings missing; recap '{template_key}' skipped");
            return Ok(0);
        };

        let template = self
            .template_or_default(
                template_key,
                templates::DEFAULT_RECAP_SUBJECT,
                templates::DEFAULT_RECAP_BODY,
            )
            .await;

        let start_label = start.format("%Y-%m-%d").to_string();
        let end_label = end.format("%Y-%m-%d").to_string();
        let period_label = format!("{start_label} - {end_label}");

        let mut sent = 0u32;
        for (user, owned_cameras) in repo::users::users_with_cameras(&self.pool).await? {
            if let Some(allowed_users) = user_filter {
                if !allowed_users.contains(&user.id) {
                    continue;
                }
            }

            let cameras: Vec<i32> = match camera_filter {
                Some(filter) => owned_cameras
                    .iter()
                    .copied()
                    .filter(|id| filter.contains(id))
                    .collect(),
                None => owned_cameras,
            };
            if cameras.is_empty() {
                continue;
            }

            let events =
                repo::violations::fetch_details_between(&self.pool, start, end, &cameras).await?;
            if events.is_empty() {
                debug!("No violations for {} in {period_label}", user.email);
                continue;
            }

            let mut entries = Vec::with_capacity(events.len());
            for event in &events {
                let image_jpeg = self.download_image(&event.image_url).await;
                entries.push(RecapEntry {
                    cctv_name: event.cctv_name.clone(),
                    location: event
                        .location
                        .clone()
                        .unwrap_or_else(|| "Unknown Location".into()),
                    timestamp: event
                        .timestamp
                        .with_timezone(&self.tz)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string(),
                    violation_name: event.violation_name.clone(),
                    image_jpeg,
                });
            }

            let pdf = build_recap_pdf(&user.full_name, &period_label, &entries)?;

            let mut subs = HashMap::new();
            subs.insert("full_name", user.full_name.clone());
            subs.insert("start_date", start_label.clone());
            subs.insert("end_date", end_label.clone());
            subs.insert("total_violations", entries.len().to_string());
            let subject = templates::render(&template.subject_template, &subs);
            let body = templates::render(&template.body_template, &subs);

            let attachment = Attachment {
                filename: format!("violation_recap_{start_label}_{end_label}.pdf"),
                content_type: "application/pdf".into(),
                bytes: pdf,
            };

            match self
                .mailer
                .send(&settings, &user.email, &subject, &body, Some(attachment))
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => warn!("Recap email to {} failed: {e}", user.email),
            }
        }

        info!("Recap '{template_key}' for {period_label}: {sent} emails sent");
        Ok(sent)
    }
}
