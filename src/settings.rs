//! Settings file, environment overrides and command line arguments.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::{Config, Environment};
use serde::Deserialize;

use crate::{
    log::LogSettings,
    notification::{manager::PlatformsSettings, PlatformSettings},
    template::{Platform, Profile, ProfileResolver},
};

/// prefix of environment variables overriding settings, e.g. `ALERT_RELAY__LOG__LEVEL`
pub const ENV_PREFIX: &str = "ALERT_RELAY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub templates: TemplateSettings,
    #[serde(default)]
    pub telegram: PlatformSettings,
    #[serde(default)]
    pub slack: PlatformSettings,
    #[serde(default)]
    pub discord: PlatformSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// directory with the `alert_template_<language>.<ext>` files
    pub directory: PathBuf,
    /// directory with `alert_config.yaml` and `alert_config.minimal.yaml`
    pub config_dir: Option<PathBuf>,
    pub profile: Profile,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("templates"),
            config_dir: Some(PathBuf::from("configs")),
            profile: Profile::Full,
        }
    }
}

impl TemplateSettings {
    pub fn resolver(&self) -> ProfileResolver {
        match &self.config_dir {
            Some(dir) => ProfileResolver::new(dir),
            None => ProfileResolver::builtin(),
        }
    }
}

impl Settings {
    /// Reads the settings file at `path` and applies `ALERT_RELAY__*` overrides.
    ///
    /// # Arguments
    ///
    /// * `path` - path of the YAML settings file
    ///
    /// * `log_level` - log level from the command line, wins over the file
    pub fn load(path: &str, log_level: Option<&str>) -> Result<Self> {
        let config = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("can't load config {path}"))?;

        let mut settings: Settings = config
            .try_deserialize()
            .with_context(|| format!("can't parse config {path}"))?;

        if let Some(level) = log_level {
            settings.log.level = level.to_string();
        }

        Ok(settings)
    }

    pub fn platforms(&self) -> PlatformsSettings {
        PlatformsSettings {
            telegram: self.telegram.clone(),
            slack: self.slack.clone(),
            discord: self.discord.clone(),
        }
    }
}

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// load profiles and templates and report problems
    Check,
    /// render an alertmanager payload
    Render {
        payload: PathBuf,
        language: Option<String>,
        platform: Option<Platform>,
        profile: Option<Profile>,
    },
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub config: String,
    pub log_level: Option<String>,
    pub action: Action,
}

pub fn command() -> Command<'static> {
    Command::new(clap::crate_name!())
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .author(clap::crate_authors!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args(&[
            Arg::new("config")
                .help("path of config file")
                .takes_value(true)
                .short('c')
                .long("config")
                .default_value("./config.yaml"),
            Arg::new("level")
                .help("log level")
                .possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
                .ignore_case(true)
                .takes_value(true)
                .long("log"),
        ])
        .subcommand(Command::new("check").about("load profiles and templates and report problems"))
        .subcommand(
            Command::new("render")
                .about("render an alertmanager payload and print the message")
                .args(&[
                    Arg::new("payload")
                        .help("path of a JSON alertmanager webhook payload")
                        .takes_value(true)
                        .long("payload")
                        .required(true),
                    Arg::new("language")
                        .help("preferred template language")
                        .takes_value(true)
                        .long("language"),
                    Arg::new("platform")
                        .help("render with the markup of this platform")
                        .possible_values(["telegram", "slack", "discord"])
                        .ignore_case(true)
                        .takes_value(true)
                        .long("platform"),
                    Arg::new("profile")
                        .help("format profile")
                        .possible_values(["full", "minimal"])
                        .ignore_case(true)
                        .takes_value(true)
                        .long("profile"),
                ]),
        )
}

impl Cli {
    pub fn parse() -> Result<Self> {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let action = match matches.subcommand() {
            Some(("render", args)) => Action::Render {
                payload: PathBuf::from(args.value_of("payload").unwrap_or_default()),
                language: args.value_of("language").map(String::from),
                platform: args
                    .value_of("platform")
                    .map(str::parse)
                    .transpose()
                    .map_err(anyhow::Error::msg)?,
                profile: args.value_of("profile").map(str::parse).transpose()?,
            },
            _ => Action::Check,
        };

        Ok(Self {
            config: matches.value_of("config").unwrap_or("./config.yaml").to_string(),
            log_level: matches.value_of("level").map(String::from),
            action,
        })
    }
}
