//! Platform specific text formatting.
//!
//! Templates call these helpers as tera filters, passing the target platform
//! explicitly: `{{ alert_name | format_bold(platform=platform) }}`.

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tera::{Tera, Value};

/// Alertmanager's representation of an unset timestamp.
pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";
/// Rendered in place of an unset timestamp.
pub const UNSET_TIME: &str = "not set";

/// Markup flavour of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// HTML tags
    Telegram,
    /// mrkdwn delimiters
    Slack,
    /// markdown
    Discord,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Telegram => "telegram",
            Platform::Slack => "slack",
            Platform::Discord => "discord",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Platform::Telegram),
            "slack" => Ok(Platform::Slack),
            "discord" => Ok(Platform::Discord),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

pub fn bold(platform: Option<Platform>, text: &str) -> String {
    match platform {
        Some(Platform::Telegram) => format!("<b>{text}</b>"),
        Some(Platform::Slack) => format!("*{text}*"),
        Some(Platform::Discord) | None => format!("**{text}**"),
    }
}

pub fn italic(platform: Option<Platform>, text: &str) -> String {
    match platform {
        Some(Platform::Telegram) => format!("<i>{text}</i>"),
        Some(Platform::Discord) => format!("*{text}*"),
        Some(Platform::Slack) | None => format!("_{text}_"),
    }
}

pub fn code(platform: Option<Platform>, text: &str) -> String {
    match platform {
        Some(Platform::Telegram) => format!("<code>{text}</code>"),
        _ => format!("`{text}`"),
    }
}

/// Formats a link. An empty `text` shows the url itself.
pub fn link(platform: Option<Platform>, url: &str, text: &str) -> String {
    let text = if text.is_empty() { url } else { text };

    match platform {
        Some(Platform::Telegram) => format!("<a href=\"{}\">{text}</a>", escape_html(url)),
        Some(Platform::Slack) => format!("<{url}|{text}>"),
        Some(Platform::Discord) | None => format!("[{text}]({url})"),
    }
}

/// escapes the characters telegram's HTML parse mode chokes on
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Formats an RFC 3339 timestamp as `YYYY-MM-DD HH:MM:SS` (UTC).
///
/// Empty and zero timestamps render as [UNSET_TIME], unparsable input is returned unchanged.
pub fn time(raw: &str) -> String {
    if raw.is_empty() || raw == ZERO_TIME {
        return String::from(UNSET_TIME);
    }

    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => {
            let utc: NaiveDateTime = parsed.naive_utc();
            utc.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        Err(_) => raw.to_string(),
    }
}

fn platform_arg(args: &HashMap<String, Value>) -> Option<Platform> {
    args.get("platform")
        .and_then(Value::as_str)
        .and_then(|platform| platform.parse().ok())
}

fn string_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Registers the formatting filters on a tera instance.
pub fn register_filters(tera: &mut Tera) {
    tera.register_filter("format_text", |value: &Value, _: &HashMap<String, Value>| {
        Ok(Value::String(string_value(value)))
    });
    tera.register_filter("format_bold", |value: &Value, args: &HashMap<String, Value>| {
        Ok(Value::String(bold(platform_arg(args), &string_value(value))))
    });
    tera.register_filter("format_italic", |value: &Value, args: &HashMap<String, Value>| {
        Ok(Value::String(italic(platform_arg(args), &string_value(value))))
    });
    tera.register_filter("format_code", |value: &Value, args: &HashMap<String, Value>| {
        Ok(Value::String(code(platform_arg(args), &string_value(value))))
    });
    tera.register_filter("format_link", |value: &Value, args: &HashMap<String, Value>| {
        let text = args.get("text").map(string_value).unwrap_or_default();
        Ok(Value::String(link(platform_arg(args), &string_value(value), &text)))
    });
    tera.register_filter("format_time", |value: &Value, _: &HashMap<String, Value>| {
        Ok(Value::String(time(&string_value(value))))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_per_platform() {
        assert_eq!(bold(Some(Platform::Telegram), "x"), "<b>x</b>");
        assert_eq!(bold(Some(Platform::Slack), "x"), "*x*");
        assert_eq!(bold(Some(Platform::Discord), "x"), "**x**");
        assert_eq!(bold(None, "x"), "**x**");

        assert_eq!(italic(Some(Platform::Telegram), "x"), "<i>x</i>");
        assert_eq!(italic(Some(Platform::Slack), "x"), "_x_");
        assert_eq!(italic(Some(Platform::Discord), "x"), "*x*");

        assert_eq!(code(Some(Platform::Telegram), "x"), "<code>x</code>");
        assert_eq!(code(Some(Platform::Slack), "x"), "`x`");
    }

    #[test]
    fn links_escape_html_only_for_telegram() {
        let url = "http://grafana/d?a=1&b=<2>";

        assert_eq!(
            link(Some(Platform::Telegram), url, "dash"),
            "<a href=\"http://grafana/d?a=1&amp;b=&lt;2&gt;\">dash</a>"
        );
        assert_eq!(link(Some(Platform::Slack), url, "dash"), format!("<{url}|dash>"));
        assert_eq!(link(Some(Platform::Discord), url, ""), format!("[{url}]({url})"));
        assert_eq!(link(None, "http://x", "x"), "[x](http://x)");
    }

    #[test]
    fn time_formatting() {
        assert_eq!(time("2024-03-01T10:00:05Z"), "2024-03-01 10:00:05");
        assert_eq!(time("2024-03-01T12:00:05+02:00"), "2024-03-01 10:00:05");
        assert_eq!(time(ZERO_TIME), UNSET_TIME);
        assert_eq!(time(""), UNSET_TIME);
        assert_eq!(time("yesterday"), "yesterday");
    }

    #[test]
    fn filters_render_through_tera() {
        let mut tera = Tera::default();
        register_filters(&mut tera);
        tera.add_raw_template(
            "t",
            r#"{{ name | format_bold(platform=platform) }} {{ url | format_link(platform=platform, text="open") }} {{ at | format_time }}"#,
        )
        .unwrap();

        let mut context = tera::Context::new();
        context.insert("name", "HighCPU");
        context.insert("url", "http://am");
        context.insert("at", "2024-03-01T10:00:00Z");
        context.insert("platform", "slack");

        assert_eq!(
            tera.render("t", &context).unwrap(),
            "*HighCPU* <http://am|open> 2024-03-01 10:00:00"
        );

        context.insert("platform", &Value::Null);
        assert_eq!(
            tera.render("t", &context).unwrap(),
            "**HighCPU** [open](http://am) 2024-03-01 10:00:00"
        );
    }
}
