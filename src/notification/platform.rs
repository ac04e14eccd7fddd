//! Per-platform rules: message limits, capabilities and destination naming.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{NotificationError, ProviderCapabilities};
use crate::template::Platform;

/// The chat platforms notifications can be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Telegram,
    Slack,
    Discord,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Telegram, ProviderKind::Slack, ProviderKind::Discord];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Telegram => "telegram",
            ProviderKind::Slack => "slack",
            ProviderKind::Discord => "discord",
        }
    }

    /// markup flavour used when rendering for this platform
    pub fn platform(&self) -> Platform {
        match self {
            ProviderKind::Telegram => Platform::Telegram,
            ProviderKind::Slack => Platform::Slack,
            ProviderKind::Discord => Platform::Discord,
        }
    }

    /// maximum message length in characters
    pub fn max_message_length(&self) -> usize {
        match self {
            ProviderKind::Telegram => 4096,
            ProviderKind::Slack => 40000,
            ProviderKind::Discord => 2000,
        }
    }

    pub fn capabilities(&self, supported_languages: Vec<String>) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_levels: true,
            // telegram addresses chats by id
            supports_channels: *self != ProviderKind::Telegram,
            supports_rich_text: true,
            supports_attachments: *self == ProviderKind::Slack,
            supported_languages,
            max_message_length: self.max_message_length(),
        }
    }

    /// destination used when none is configured
    pub fn fallback_destination(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Slack => Some("#alerts"),
            _ => None,
        }
    }

    /// Brings a resolved destination into the form the platform expects.
    ///
    /// Slack channel names get a `#` unless they already address a channel or a user.
    pub fn normalize_destination(&self, destination: &str) -> String {
        match self {
            ProviderKind::Slack if !destination.starts_with(['#', '@']) => format!("#{destination}"),
            _ => destination.to_string(),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(ProviderKind::Telegram),
            "slack" => Ok(ProviderKind::Slack),
            "discord" => Ok(ProviderKind::Discord),
            _ => Err(NotificationError::ProviderNotFound(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_names() {
        assert_eq!("Telegram".parse::<ProviderKind>().unwrap(), ProviderKind::Telegram);
        assert_eq!(" slack ".parse::<ProviderKind>().unwrap(), ProviderKind::Slack);
        assert!(matches!(
            "matrix".parse::<ProviderKind>(),
            Err(NotificationError::ProviderNotFound(name)) if name == "matrix"
        ));
    }

    #[test]
    fn slack_channels_get_a_hash() {
        assert_eq!(ProviderKind::Slack.normalize_destination("alerts"), "#alerts");
        assert_eq!(ProviderKind::Slack.normalize_destination("#alerts"), "#alerts");
        assert_eq!(ProviderKind::Slack.normalize_destination("@oncall"), "@oncall");
        assert_eq!(ProviderKind::Discord.normalize_destination("1234"), "1234");
        assert_eq!(ProviderKind::Telegram.normalize_destination("-100"), "-100");
    }

    #[test]
    fn capabilities() {
        let telegram = ProviderKind::Telegram.capabilities(vec![String::from("eng")]);
        assert!(!telegram.supports_channels);
        assert_eq!(telegram.max_message_length, 4096);

        let slack = ProviderKind::Slack.capabilities(Vec::new());
        assert!(slack.supports_channels && slack.supports_attachments);

        assert_eq!(ProviderKind::Discord.capabilities(Vec::new()).max_message_length, 2000);
    }
}
