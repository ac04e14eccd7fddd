//! Destination services and destination resolution.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use super::{NotificationError, NotificationRequest};

/// lowest and highest alert level a destination can be configured for
pub const LEVELS: std::ops::RangeInclusive<u8> = 0..=6;

/// Client of a chat platform's bot API.
#[async_trait]
pub trait DestinationService: Send + Sync {
    /// Posts `text` to `destination` (chat id or channel).
    async fn send_message(&self, destination: &str, text: &str) -> anyhow::Result<()>;

    /// Checks that the credentials work.
    async fn test_connection(&self) -> anyhow::Result<()>;
}

/// Normalizes a level (`L3`, `l3`, `3`, `chat_ids3`) to its number.
pub fn parse_level(raw: &str) -> Result<u8, NotificationError> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();

    let digits = lower
        .strip_prefix("chat_ids")
        .or_else(|| lower.strip_prefix('l'))
        .unwrap_or(lower.as_str());

    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(NotificationError::InvalidLevel(raw.to_string()));
    }

    digits
        .parse::<u8>()
        .ok()
        .filter(|level| LEVELS.contains(level))
        .ok_or_else(|| NotificationError::InvalidLevel(raw.to_string()))
}

/// Where a request ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Channel(String),
    ChatId(String),
    Level(u8, String),
    Default(String),
}

impl Resolved {
    pub fn destination(&self) -> &str {
        match self {
            Resolved::Channel(destination)
            | Resolved::ChatId(destination)
            | Resolved::Level(_, destination)
            | Resolved::Default(destination) => destination,
        }
    }
}

/// Configured destinations of a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationTable {
    default: Option<String>,
    levels: BTreeMap<u8, String>,
}

impl DestinationTable {
    /// Builds the table from configured level keys.
    ///
    /// # Arguments
    ///
    /// * `default` - destination used when a request names nothing else
    ///
    /// * `levels` - level key (normalized with [parse_level]) to destination
    pub fn new(default: &str, levels: &HashMap<String, String>) -> Result<Self, NotificationError> {
        let mut keys: Vec<_> = levels
            .iter()
            .filter(|(_, destination)| !destination.trim().is_empty())
            .collect();
        keys.sort();

        let mut normalized: BTreeMap<u8, (&str, String)> = BTreeMap::new();
        for (key, destination) in keys {
            let level = parse_level(key)?;
            if let Some((first, _)) = normalized.get(&level) {
                return Err(NotificationError::DuplicateLevel {
                    level,
                    first: first.to_string(),
                    second: key.clone(),
                });
            }
            normalized.insert(level, (key.as_str(), destination.trim().to_string()));
        }
        let levels = normalized
            .into_iter()
            .map(|(level, (_, destination))| (level, destination))
            .collect();

        let default = Some(default.trim())
            .filter(|default| !default.is_empty())
            .map(String::from);

        Ok(Self { default, levels })
    }

    /// Picks the destination of a request: explicit channel, explicit chat id,
    /// configured level, configured default.
    pub fn resolve(&self, request: &NotificationRequest) -> Result<Resolved, NotificationError> {
        if !request.channel.trim().is_empty() {
            return Ok(Resolved::Channel(request.channel.trim().to_string()));
        }

        if !request.chat_id.trim().is_empty() {
            return Ok(Resolved::ChatId(request.chat_id.trim().to_string()));
        }

        if !request.level.trim().is_empty() {
            let level = parse_level(&request.level)?;
            if let Some(destination) = self.levels.get(&level) {
                return Ok(Resolved::Level(level, destination.clone()));
            }
        }

        self.default
            .clone()
            .map(Resolved::Default)
            .ok_or(NotificationError::NoDestinationResolved)
    }

    /// configured destinations keyed by `L<level>` plus `default`
    pub fn entries(&self) -> BTreeMap<String, String> {
        let mut entries: BTreeMap<String, String> = self
            .levels
            .iter()
            .map(|(level, destination)| (format!("L{level}"), destination.clone()))
            .collect();

        if let Some(default) = &self.default {
            entries.insert(String::from("default"), default.clone());
        }

        entries
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(channel: &str, chat_id: &str, level: &str) -> NotificationRequest {
        NotificationRequest {
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
            level: level.to_string(),
            ..Default::default()
        }
    }

    fn table() -> DestinationTable {
        let levels = [("L0", "-100"), ("chat_ids1", "-101"), ("2", "-102"), ("l3", "")]
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        DestinationTable::new("-999", &levels).unwrap()
    }

    #[test]
    fn level_normalization() {
        for raw in ["L0", "l0", "0", "chat_ids0", "CHAT_IDS0", " L0 "] {
            assert_eq!(parse_level(raw).unwrap(), 0, "{raw}");
        }
        assert_eq!(parse_level("L6").unwrap(), 6);

        for raw in ["L7", "", "L", "chat_ids", "-1", "+1", "L+1", "chat_ids+1", "level1", "L1a", "ll1"] {
            assert!(
                matches!(parse_level(raw), Err(NotificationError::InvalidLevel(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn resolution_order() {
        let table = table();

        assert_eq!(table.resolve(&request("ops", "-1", "L0")).unwrap(), Resolved::Channel(String::from("ops")));
        assert_eq!(table.resolve(&request("", "-1", "L0")).unwrap(), Resolved::ChatId(String::from("-1")));
        assert_eq!(table.resolve(&request("", "", "l1")).unwrap(), Resolved::Level(1, String::from("-101")));
        assert_eq!(table.resolve(&request("", "", "")).unwrap(), Resolved::Default(String::from("-999")));
    }

    #[test]
    fn unmapped_level_falls_back_to_default() {
        assert_eq!(table().resolve(&request("", "", "L3")).unwrap(), Resolved::Default(String::from("-999")));
    }

    #[test]
    fn invalid_level_is_an_error() {
        assert!(matches!(
            table().resolve(&request("", "", "L9")),
            Err(NotificationError::InvalidLevel(level)) if level == "L9"
        ));
    }

    #[test]
    fn nothing_to_resolve() {
        let table = DestinationTable::new("", &HashMap::new()).unwrap();

        assert!(table.is_empty());
        assert!(matches!(
            table.resolve(&request("", "", "")),
            Err(NotificationError::NoDestinationResolved)
        ));
    }

    #[test]
    fn invalid_level_keys_are_rejected() {
        let levels = [(String::from("L8"), String::from("x"))].into_iter().collect();

        assert!(DestinationTable::new("", &levels).is_err());
    }

    #[test]
    fn entries_use_canonical_keys() {
        let entries = table().entries();

        assert_eq!(entries["L0"], "-100");
        assert_eq!(entries["L1"], "-101");
        assert_eq!(entries["default"], "-999");
        assert!(!entries.contains_key("L3"));
    }

    #[test]
    fn keys_of_the_same_level_are_rejected() {
        let levels = [("L0", "-100"), ("chat_ids0", "-200")]
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        assert!(matches!(
            DestinationTable::new("", &levels),
            Err(NotificationError::DuplicateLevel { level: 0, first, second })
                if first == "L0" && second == "chat_ids0"
        ));
    }
}
