//! Operator notifications: per-event violation emails and periodic PDF
//! recap reports.

pub mod mailer;
pub mod pdf;
pub mod service;
pub mod templates;

pub use mailer::{Attachment, Mailer, SmtpMailer};
pub use service::NotificationService;
