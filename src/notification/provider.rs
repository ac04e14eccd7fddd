//! The provider of a chat platform, backed by an injected [DestinationService].

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    destination::{DestinationService, DestinationTable},
    split::split_message,
    DeliveryError, NotificationError, NotificationRequest, Provider, ProviderCapabilities,
    ProviderKind, ProviderStatistics, ProviderStatus, Sent,
};
use crate::template::{Profile, TemplateEngine};

/// Settings of one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformSettings {
    pub enable: bool,
    /// language to render in when the request doesn't name one
    pub template_language: String,
    /// `full`, `minimal` or empty for the engine's default
    pub template_mode: String,
    /// destination used when the request names none
    pub default_destination: String,
    /// level key (`L0`, `chat_ids0`, `0`) to destination
    pub levels: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Statistics {
    sent: AtomicU64,
    errors: AtomicU64,
    /// unix seconds, 0 before the first message
    last_message_time: AtomicI64,
}

impl Statistics {
    fn record(&self, success: bool) {
        if success {
            self.sent.fetch_add(1, Ordering::Relaxed);
            self.last_message_time.store(Utc::now().timestamp(), Ordering::Relaxed);
        } else {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> ProviderStatistics {
        let last = self.last_message_time.load(Ordering::Relaxed);

        ProviderStatistics {
            messages_sent: self.sent.load(Ordering::Relaxed),
            messages_error: self.errors.load(Ordering::Relaxed),
            last_message_time: (last > 0).then_some(last),
        }
    }
}

/// Sends notifications to one chat platform.
pub struct ChatProvider {
    kind: ProviderKind,
    settings: PlatformSettings,
    destinations: DestinationTable,
    profile: Option<Profile>,
    service: Arc<dyn DestinationService>,
    engine: Arc<TemplateEngine>,
    statistics: Statistics,
}

impl ChatProvider {
    /// Creates the provider of `kind`.
    ///
    /// Fails with [NotificationError::InvalidConfig] on invalid level keys or
    /// an unknown template mode.
    ///
    /// # Arguments
    ///
    /// * `settings` - the platform's section of the settings
    ///
    /// * `service` - client of the platform's bot API
    ///
    /// * `engine` - template engine, used to report supported languages
    pub fn new(
        kind: ProviderKind,
        settings: PlatformSettings,
        service: Arc<dyn DestinationService>,
        engine: Arc<TemplateEngine>,
    ) -> Result<Self, NotificationError> {
        let invalid = |reason: String| NotificationError::InvalidConfig {
            provider: kind.to_string(),
            reason,
        };

        let default = match settings.default_destination.trim() {
            "" => kind.fallback_destination().unwrap_or_default(),
            configured => configured,
        };
        let destinations = DestinationTable::new(default, &settings.levels)
            .map_err(|err| invalid(err.to_string()))?;

        let profile = match settings.template_mode.trim() {
            "" => None,
            mode => Some(mode.parse::<Profile>().map_err(|err| invalid(err.to_string()))?),
        };

        Ok(Self {
            kind,
            settings,
            destinations,
            profile,
            service,
            engine,
            statistics: Statistics::default(),
        })
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<Sent, NotificationError> {
        if request.message.is_empty() {
            return Err(NotificationError::EmptyMessage(self.kind.to_string()));
        }

        let resolved = self.destinations.resolve(request)?;
        let destination = self.kind.normalize_destination(resolved.destination());
        let parts = split_message(&request.message, self.kind.max_message_length());

        debug!(provider = %self.kind, ?resolved, parts = parts.len(), "sending message");

        for (index, part) in parts.iter().enumerate() {
            if let Err(err) = self.service.send_message(&destination, part).await {
                warn!(
                    provider = %self.kind,
                    destination = %destination,
                    part = index + 1,
                    "failed to send message: {err:#}"
                );
                return Err(DeliveryError::translate(self.kind, &destination, &err).into());
            }
        }

        info!(provider = %self.kind, destination = %destination, parts = parts.len(), "message sent");

        Ok(Sent { destination, parts: parts.len() })
    }
}

#[async_trait]
impl Provider for ChatProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn send_message(&self, request: &NotificationRequest) -> Result<Sent, NotificationError> {
        let result = self.deliver(request).await;
        self.statistics.record(result.is_ok());
        result
    }

    async fn status(&self) -> ProviderStatus {
        let connection = self.test_connection().await;

        ProviderStatus {
            name: self.kind.to_string(),
            enabled: self.is_enabled(),
            connected: connection.is_ok(),
            last_error: connection.err().map(|err| err.to_string()),
            channels: self.destinations.entries(),
            statistics: self.statistics.snapshot(),
        }
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.kind.capabilities(self.engine.available_languages())
    }

    fn is_enabled(&self) -> bool {
        self.settings.enable
    }

    fn validate_config(&self) -> Result<(), NotificationError> {
        if self.destinations.is_empty() {
            return Err(NotificationError::InvalidConfig {
                provider: self.kind.to_string(),
                reason: String::from("neither a default destination nor level destinations are configured"),
            });
        }

        Ok(())
    }

    async fn test_connection(&self) -> Result<(), NotificationError> {
        self.service.test_connection().await.map_err(|err| {
            DeliveryError::translate(self.kind, "the platform", &err).into()
        })
    }

    fn template_language(&self) -> Option<&str> {
        Some(self.settings.template_language.trim()).filter(|language| !language.is_empty())
    }

    fn template_profile(&self) -> Option<Profile> {
        self.profile
    }
}
