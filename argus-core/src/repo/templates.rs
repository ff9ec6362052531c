//! `email_templates` queries.

use sqlx::PgPool;

use crate::error::Result;
use argus_model::EmailTemplate;

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    template_key: String,
    subject_template: String,
    body_template: String,
    is_active: bool,
}

/// The active template for a key, if any.
pub async fn fetch_active(pool: &PgPool, template_key: &str) -> Result<Option<EmailTemplate>> {
    let row: Option<TemplateRow> = sqlx::query_as(
        r#"
        SELECT template_key, subject_template, body_template, is_active
        FROM email_templates
        WHERE template_key = $1 AND is_active = TRUE
        "#,
    )
    .bind(template_key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| EmailTemplate {
        template_key: r.template_key,
        subject_template: r.subject_template,
        body_template: r.body_template,
        is_active: r.is_active,
    }))
}
