//! Translates errors of the platform clients into friendlier messages.
//!
//! The matching is plain substring search over the client's error text. It is
//! advisory only: anything unknown is passed through verbatim.

use thiserror::Error;

use super::ProviderKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("the bot is not a member of {destination}, invite it first")]
    NotMember { destination: String },
    #[error("{destination} does not exist or the bot can't see it")]
    DestinationNotFound { destination: String },
    #[error("the bot lacks permission to post in {destination}")]
    NoAccess { destination: String },
    #[error("invalid credentials, check the configured bot token")]
    InvalidCredentials,
    #[error("message content is invalid or too long")]
    PayloadTooLarge,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy)]
enum Category {
    NotMember,
    DestinationNotFound,
    NoAccess,
    InvalidCredentials,
    PayloadTooLarge,
}

const TELEGRAM_PATTERNS: &[(&str, Category)] = &[
    ("bot is not a member", Category::NotMember),
    ("chat not found", Category::DestinationNotFound),
    ("bot was kicked", Category::NoAccess),
    ("not enough rights", Category::NoAccess),
    ("Unauthorized", Category::InvalidCredentials),
    ("message is too long", Category::PayloadTooLarge),
];

const SLACK_PATTERNS: &[(&str, Category)] = &[
    ("not_in_channel", Category::NotMember),
    ("channel_not_found", Category::DestinationNotFound),
    ("missing_scope", Category::NoAccess),
    ("invalid_auth", Category::InvalidCredentials),
    ("msg_too_long", Category::PayloadTooLarge),
];

const DISCORD_PATTERNS: &[(&str, Category)] = &[
    ("Missing Access", Category::NotMember),
    ("Unknown Channel", Category::DestinationNotFound),
    ("Missing Permissions", Category::NoAccess),
    ("Unauthorized", Category::InvalidCredentials),
    ("Invalid Form Body", Category::PayloadTooLarge),
];

impl DeliveryError {
    /// Classifies the error a platform client returned for `destination`.
    pub fn translate(kind: ProviderKind, destination: &str, error: &anyhow::Error) -> Self {
        let text = format!("{error:#}");

        let patterns = match kind {
            ProviderKind::Telegram => TELEGRAM_PATTERNS,
            ProviderKind::Slack => SLACK_PATTERNS,
            ProviderKind::Discord => DISCORD_PATTERNS,
        };

        let destination = destination.to_string();

        match patterns.iter().find(|(pattern, _)| text.contains(pattern)) {
            Some((_, Category::NotMember)) => DeliveryError::NotMember { destination },
            Some((_, Category::DestinationNotFound)) => {
                DeliveryError::DestinationNotFound { destination }
            }
            Some((_, Category::NoAccess)) => DeliveryError::NoAccess { destination },
            Some((_, Category::InvalidCredentials)) => DeliveryError::InvalidCredentials,
            Some((_, Category::PayloadTooLarge)) => DeliveryError::PayloadTooLarge,
            None => DeliveryError::Other(text),
        }
    }
}
