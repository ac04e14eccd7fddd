//! Built-in alert formatter, used when a template fails to render.
//!
//! It doesn't depend on any template file so a broken template never keeps an
//! alert from being delivered.

use crate::template::{
    format::{bold, link},
    Platform, TemplateData,
};

/// number of alerts listed per section
pub const MAX_LISTED_ALERTS: usize = 5;

fn field(out: &mut String, platform: Option<Platform>, name: &str, value: &str) {
    if !value.is_empty() {
        out.push_str(&format!("{} {value}\n", bold(platform, &format!("{name}:"))));
    }
}

fn section(out: &mut String, platform: Option<Platform>, heading: &str, data: &TemplateData, status: &str) {
    let summaries: Vec<&str> = data
        .alerts
        .iter()
        .filter(|alert| alert.status == status)
        .take(MAX_LISTED_ALERTS)
        .filter_map(|alert| {
            alert
                .annotations
                .get("summary")
                .or_else(|| alert.labels.get("alertname"))
                .map(String::as_str)
        })
        .collect();

    if summaries.is_empty() {
        return;
    }

    out.push_str(&format!("\n{}\n", bold(platform, heading)));
    for summary in summaries {
        out.push_str(&format!("• {summary}\n"));
    }
}

/// Formats an alert group without templates.
pub fn format_alert(data: &TemplateData, platform: Option<Platform>) -> String {
    let mut out = format!("🚨 {}\n\n", bold(platform, "Alert Notification"));

    field(&mut out, platform, "Alert Name", &data.alert_name);
    field(&mut out, platform, "Environment", &data.env);
    field(&mut out, platform, "Severity", &data.severity);
    field(&mut out, platform, "Namespace", &data.namespace);
    field(&mut out, platform, "Status", &data.status);
    field(&mut out, platform, "Total Alerts", &data.total_alerts.to_string());
    field(&mut out, platform, "Firing", &data.firing_count.to_string());
    field(&mut out, platform, "Resolved", &data.resolved_count.to_string());

    section(&mut out, platform, "🔥 Firing Alerts:", data, crate::alert::STATUS_FIRING);
    section(&mut out, platform, "✅ Resolved Alerts:", data, crate::alert::STATUS_RESOLVED);

    if !data.external_url.is_empty() {
        out.push('\n');
        out.push_str(&link(platform, &data.external_url, "Alertmanager"));
        out.push('\n');
    }

    out
}
