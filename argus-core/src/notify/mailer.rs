//! SMTP delivery.
//!
//! The relay is chosen by the configured port: 587 speaks STARTTLS,
//! 465 implicit TLS. Credentials come from the `email_settings` row on
//! every send so operators can rotate them without a restart.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::error::{CoreError, Result};
use argus_model::EmailSettings;

/// A file attached to an outgoing message.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        settings: &EmailSettings,
        to: &str,
        subject: &str,
        html_body: &str,
        attachment: Option<Attachment>,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct SmtpMailer;

impl SmtpMailer {
    pub fn new() -> Self {
        Self
    }

    fn transport(settings: &EmailSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if settings.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)?
        };
        Ok(builder
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.smtp_user.clone(),
                settings.smtp_pass.clone(),
            ))
            .build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        settings: &EmailSettings,
        to: &str,
        subject: &str,
        html_body: &str,
        attachment: Option<Attachment>,
    ) -> Result<()> {
        let builder = Message::builder()
            .from(settings.smtp_from.parse()?)
            .to(to.parse()?)
            .subject(subject);

        let message = match attachment {
            Some(att) => {
                let content_type = ContentType::parse(&att.content_type)
                    .map_err(|e| CoreError::Mail(format!("bad attachment type: {e}")))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::html(html_body.to_owned()))
                        .singlepart(
                            lettre::message::Attachment::new(att.filename)
                                .body(att.bytes, content_type),
                        ),
                )?
            }
            None => builder.multipart(MultiPart::mixed().singlepart(SinglePart::html(
                html_body.to_owned(),
            )))?,
        };

        let transport = Self::transport(settings)?;
        transport.send(message).await?;
        info!("Email sent to {to}: {subject}");
        Ok(())
    }
}
