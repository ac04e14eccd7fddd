//! Data handed to templates.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::{format::Platform, profile::FormatOptions};
use crate::alert;

/// Context every template renders against.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TemplateData {
    pub status: String,
    pub alert_name: String,
    pub env: String,
    pub severity: String,
    pub namespace: String,
    pub total_alerts: usize,
    pub firing_count: usize,
    pub resolved_count: usize,
    pub alerts: Vec<AlertData>,
    pub external_url: String,
    /// `None` renders with the options of the active template config
    pub format_options: Option<FormatOptions>,
    /// target platform of the formatting filters, `None` for generic markdown
    pub platform: Option<Platform>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AlertData {
    pub status: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    /// RFC 3339
    pub starts_at: String,
    /// RFC 3339, [ZERO_TIME](super::format::ZERO_TIME) while the alert is firing
    pub ends_at: String,
    pub generator_url: String,
}

fn rfc3339(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl From<&alert::Alert> for AlertData {
    fn from(alert: &alert::Alert) -> Self {
        Self {
            status: alert.status.clone(),
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
            starts_at: rfc3339(&alert.starts_at),
            ends_at: rfc3339(&alert.ends_at),
            generator_url: alert.generator_url.clone(),
        }
    }
}

impl TemplateData {
    /// Builds template data from an alertmanager payload.
    ///
    /// `alert_name`, `env`, `severity` and `namespace` are taken from the common
    /// labels, falling back to the labels of the first alert.
    pub fn from_payload(data: &alert::Data) -> Self {
        let label = |key: &str| -> String {
            data.common_labels
                .get(key)
                .filter(|value| !value.is_empty())
                .or_else(|| data.alerts.first().and_then(|first| first.labels.get(key)))
                .cloned()
                .unwrap_or_default()
        };

        let firing_count = data.alerts.iter().filter(|alert| alert.is_firing()).count();
        let resolved_count = data.alerts.iter().filter(|alert| alert.is_resolved()).count();

        Self {
            status: data.status.clone(),
            alert_name: label("alertname"),
            env: label("env"),
            severity: label("severity"),
            namespace: label("namespace"),
            total_alerts: data.alerts.len(),
            firing_count,
            resolved_count,
            alerts: data.alerts.iter().map(AlertData::from).collect(),
            external_url: data.external_url.clone(),
            format_options: None,
            platform: None,
        }
    }
}
