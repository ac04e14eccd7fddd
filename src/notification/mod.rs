//! Dispatch of notifications to chat platforms.
//!
//! The [NotificationManager](manager::NotificationManager) renders alert data
//! with the template engine and hands the text to exactly one [Provider].

pub mod destination;
pub mod manager;
pub mod platform;
pub mod provider;
pub mod split;
pub mod transport;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    alert,
    template::{Profile, TemplateError},
};

pub use self::{
    destination::{parse_level, DestinationService},
    manager::NotificationManager,
    platform::ProviderKind,
    provider::{ChatProvider, PlatformSettings},
    transport::DeliveryError,
};

/// A notification to send through one provider.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationRequest {
    pub provider_name: String,
    /// alert level (`L0`..`L6`) mapped to a configured destination
    pub level: String,
    pub channel: String,
    pub chat_id: String,
    /// text to send; when empty `alert_data` is rendered
    pub message: String,
    pub alert_data: Option<alert::Data>,
    pub template_language: String,
    /// `template_mode` and per-field format overrides
    pub options: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotificationResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl NotificationResponse {
    pub fn failure(provider: Option<&str>, error: &NotificationError) -> Self {
        let mut details = error.to_string();
        let mut cause = std::error::Error::source(error);
        while let Some(err) = cause {
            details.push_str(": ");
            details.push_str(&err.to_string());
            cause = err.source();
        }

        Self {
            success: false,
            message: String::from("failed to send notification"),
            details: Some(details),
            provider: provider.map(String::from),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderStatistics {
    pub messages_sent: u64,
    pub messages_error: u64,
    /// unix seconds
    pub last_message_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub enabled: bool,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// configured destinations by `L<level>` and `default`
    pub channels: BTreeMap<String, String>,
    pub statistics: ProviderStatistics,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderCapabilities {
    pub supports_levels: bool,
    pub supports_channels: bool,
    pub supports_rich_text: bool,
    pub supports_attachments: bool,
    pub supported_languages: Vec<String>,
    pub max_message_length: usize,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("provider '{0}' not found")]
    ProviderNotFound(String),
    #[error("provider '{0}' is disabled")]
    ProviderDisabled(String),
    #[error("failed to render alert for {provider}")]
    PreprocessFailed {
        provider: String,
        #[source]
        source: TemplateError,
    },
    #[error("nothing to send to {0}: message is empty")]
    EmptyMessage(String),
    #[error("no destination: request names no channel, chat id or level and no default is configured")]
    NoDestinationResolved,
    #[error("invalid level '{0}', expected L0 to L6")]
    InvalidLevel(String),
    #[error("level {level} is configured by both '{first}' and '{second}'")]
    DuplicateLevel { level: u8, first: String, second: String },
    #[error("invalid {provider} settings: {reason}")]
    InvalidConfig { provider: String, reason: String },
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// A failed dispatch together with the response reported to the caller.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct DispatchFailure {
    pub response: NotificationResponse,
    #[source]
    pub error: NotificationError,
}

impl DispatchFailure {
    pub fn new(provider: Option<&str>, error: NotificationError) -> Self {
        Self { response: NotificationResponse::failure(provider, &error), error }
    }
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    /// normalized destination the message went to
    pub destination: String,
    /// number of messages the text was split into
    pub parts: usize,
}

/// A destination platform notifications can be sent to.
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Resolves the destination and sends `request.message`, splitting it when needed.
    async fn send_message(&self, request: &NotificationRequest) -> Result<Sent, NotificationError>;

    /// Current status, including a connection test.
    async fn status(&self) -> ProviderStatus;

    fn capabilities(&self) -> ProviderCapabilities;

    fn is_enabled(&self) -> bool;

    fn validate_config(&self) -> Result<(), NotificationError>;

    async fn test_connection(&self) -> Result<(), NotificationError>;

    /// language configured for this provider, if any
    fn template_language(&self) -> Option<&str>;

    /// format profile configured for this provider, if any
    fn template_profile(&self) -> Option<Profile>;
}
