//! `{placeholder}` substitution for stored subject/body templates.

use std::collections::HashMap;

/// Replace every `{key}` occurrence with its value. Unknown placeholders
/// are left verbatim so a typo in a stored template stays visible.
pub fn render(template: &str, substitutions: &HashMap<&str, String>) -> String {
    let mut rendered = template.to_owned();
    for (key, value) in substitutions {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    rendered
}

/// Built-in fallbacks used when no active template row exists for a key.
pub const DEFAULT_VIOLATION_SUBJECT: &str =
    "[Important] PPE Violation: {violation_name} at {cctv_name}";

pub const DEFAULT_VIOLATION_BODY: &str = r#"<html><body>
<p>Dear Mr./Ms. <strong>{full_name}</strong>,</p>
<p>A PPE violation has been automatically detected in your area of responsibility.</p>
<table>
<tr><th align="left">Violation</th><td>{violation_name}</td></tr>
<tr><th align="left">Camera</th><td>{cctv_name} ({location})</td></tr>
<tr><th align="left">Time</th><td>{timestamp}</td></tr>
<tr><th align="left">Reference</th><td>#{violation_id}</td></tr>
</table>
<p>Please verify and take corrective action. The evidence image is attached.</p>
</body></html>"#;

pub const DEFAULT_RECAP_SUBJECT: &str = "PPE Violation Recap {start_date} - {end_date}";

pub const DEFAULT_RECAP_BODY: &str = r#"<html><body>
<p>Dear Mr./Ms. <strong>{full_name}</strong>,</p>
<p>Attached is your PPE violation recap for {start_date} to {end_date}
({total_violations} violations on your cameras).</p>
</body></html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_every_occurrence() {
        let mut subs = HashMap::new();
        subs.insert("full_name", "Rina".to_string());
        subs.insert("cctv_name", "Gate 2".to_string());
        let out = render("Hi {full_name}, {cctv_name} / {full_name}", &subs);
        assert_eq!(out, "Hi Rina, Gate 2 / Rina");
    }

    #[test]
    fn unknown_placeholders_survive() {
        let subs = HashMap::new();
        assert_eq!(render("Hello {whoever}", &subs), "Hello {whoever}");
    }

    #[test]
    fn default_violation_subject_renders() {
        let mut subs = HashMap::new();
        subs.insert("violation_name", "NO-HELMET".to_string());
        subs.insert("cctv_name", "Line 1".to_string());
        assert_eq!(
            render(DEFAULT_VIOLATION_SUBJECT, &subs),
            "[Important] PPE Violation: NO-HELMET at Line 1"
        );
    }
}
