use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
    filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: String::from("info") }
    }
}

impl LogSettings {
    pub fn level(&self) -> Result<tracing::Level> {
        tracing::Level::from_str(self.level.trim())
            .with_context(|| format!("invalid log level '{}'", self.level))
    }
}

pub fn setup_logging(settings: &LogSettings) -> Result<()> {
    let level = settings.level()?;

    let fmt_layer = fmt::layer().with_writer(std::io::stderr);

    let filter_layer = EnvFilter::default().add_directive(LevelFilter::from_level(level).into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    Ok(())
}
