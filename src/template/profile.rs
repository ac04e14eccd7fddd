//! Template configuration profiles.
//!
//! A profile ("full" or "minimal") bundles the language metadata, the naming
//! convention of template files and the [FormatOptions] toggles. Profiles are
//! read from `alert_config.yaml` / `alert_config.minimal.yaml`; when a file
//! can't be read or parsed the hard-coded profile of the same shape is used.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use config::{Config, ConfigError, FileFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// file name of the full profile inside the config directory
pub const FULL_PROFILE_FILE: &str = "alert_config.yaml";
/// file name of the minimal profile inside the config directory
pub const MINIMAL_PROFILE_FILE: &str = "alert_config.minimal.yaml";

/// Named formatting profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Full,
    Minimal,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Full => "full",
            Profile::Minimal => "minimal",
        }
    }

    /// file name of the profile's configuration file
    pub fn file_name(&self) -> &'static str {
        match self {
            Profile::Full => FULL_PROFILE_FILE,
            Profile::Minimal => MINIMAL_PROFILE_FILE,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown template profile '{0}' (expected 'full' or 'minimal')")]
pub struct UnknownProfile(pub String);

impl FromStr for Profile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "full" => Ok(Profile::Full),
            "minimal" => Ok(Profile::Minimal),
            _ => Err(UnknownProfile(s.to_string())),
        }
    }
}

/// The `template_config` section of a profile file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateConfig {
    pub version: String,
    #[serde(default)]
    pub supported_languages: Vec<LanguageConfig>,
    #[serde(default)]
    pub fallback_order: Vec<String>,
    pub naming_convention: NamingConvention,
    pub format_options: FormatOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LanguageConfig {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "fallback")]
    pub is_fallback: bool,
}

/// How template files are named: `<prefix><language><extension>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamingConvention {
    pub prefix: String,
    pub supported_extensions: Vec<String>,
    /// extensions ordered from highest to lowest priority
    #[serde(default)]
    pub priority_order: Vec<String>,
}

impl NamingConvention {
    /// Priority of an extension, lower is better. Unlisted extensions rank last.
    pub fn priority(&self, extension: &str) -> usize {
        self.priority_order
            .iter()
            .position(|ext| ext == extension)
            .unwrap_or(self.priority_order.len())
    }
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            prefix: String::from("alert_template_"),
            supported_extensions: vec![String::from(".tera"), String::from(".j2")],
            priority_order: vec![String::from(".tera"), String::from(".j2")],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Toggle {
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Limit {
    pub value: u32,
    #[serde(default)]
    pub description: String,
}

/// Display toggles handed to templates as `format_options`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FormatOptions {
    pub show_links: Toggle,
    pub show_timestamps: Toggle,
    pub show_external_url: Toggle,
    pub show_generator_url: Toggle,
    pub show_emoji: Toggle,
    pub compact_mode: Toggle,
    pub max_summary_length: Limit,
}

fn toggle(enabled: bool, description: &str) -> Toggle {
    Toggle { enabled, description: description.to_string() }
}

impl FormatOptions {
    /// hard-coded options of the full profile
    pub fn full() -> Self {
        Self {
            show_links: toggle(true, "show hyperlinks"),
            show_timestamps: toggle(true, "show start and end timestamps"),
            show_external_url: toggle(true, "show the alertmanager link"),
            show_generator_url: toggle(true, "show the prometheus generator link"),
            show_emoji: toggle(true, "show status emoji"),
            compact_mode: toggle(false, "compact layout"),
            max_summary_length: Limit {
                value: 200,
                description: String::from("maximum summary length"),
            },
        }
    }

    /// hard-coded options of the minimal profile
    pub fn minimal() -> Self {
        Self {
            show_links: toggle(false, "show hyperlinks"),
            show_timestamps: toggle(false, "show start and end timestamps"),
            show_external_url: toggle(false, "show the alertmanager link"),
            show_generator_url: toggle(false, "show the prometheus generator link"),
            show_emoji: toggle(false, "show status emoji"),
            compact_mode: toggle(true, "compact layout"),
            max_summary_length: Limit {
                value: 100,
                description: String::from("maximum summary length"),
            },
        }
    }

    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Full => Self::full(),
            Profile::Minimal => Self::minimal(),
        }
    }

    /// Applies the explicitly provided fields of `overrides`, leaving all others untouched.
    pub fn with_overrides(mut self, overrides: &FormatOverrides) -> Self {
        let toggles = [
            (&mut self.show_links, overrides.show_links),
            (&mut self.show_timestamps, overrides.show_timestamps),
            (&mut self.show_external_url, overrides.show_external_url),
            (&mut self.show_generator_url, overrides.show_generator_url),
            (&mut self.show_emoji, overrides.show_emoji),
            (&mut self.compact_mode, overrides.compact_mode),
        ];

        for (toggle, value) in toggles {
            if let Some(enabled) = value {
                toggle.enabled = enabled;
            }
        }

        if let Some(value) = overrides.max_summary_length {
            self.max_summary_length.value = value;
        }

        self
    }
}

/// Per-field formatting overrides. `None` means "not provided".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOverrides {
    pub show_links: Option<bool>,
    pub show_timestamps: Option<bool>,
    pub show_external_url: Option<bool>,
    pub show_generator_url: Option<bool>,
    pub show_emoji: Option<bool>,
    pub compact_mode: Option<bool>,
    pub max_summary_length: Option<u32>,
}

impl FormatOverrides {
    /// Picks the known toggles out of free-form request options. Values of the wrong type are ignored.
    pub fn from_options(options: &HashMap<String, Value>) -> Self {
        let flag = |key: &str| options.get(key).and_then(Value::as_bool);

        Self {
            show_links: flag("show_links"),
            show_timestamps: flag("show_timestamps"),
            show_external_url: flag("show_external_url"),
            show_generator_url: flag("show_generator_url"),
            show_emoji: flag("show_emoji"),
            compact_mode: flag("compact_mode"),
            max_summary_length: options
                .get("max_summary_length")
                .and_then(Value::as_u64)
                .and_then(|value| u32::try_from(value).ok()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn language(code: &str, name: &str, description: &str, is_fallback: bool) -> LanguageConfig {
    LanguageConfig {
        code: code.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        is_fallback,
    }
}

impl TemplateConfig {
    /// Hard-coded configuration used when the profile file is unusable.
    pub fn builtin(profile: Profile) -> Self {
        let mut supported_languages = vec![
            language("eng", "English", "English template", true),
            language("tw", "繁體中文", "Traditional Chinese template", false),
            language("zh", "简体中文", "Simplified Chinese template", false),
            language("ko", "한국어", "Korean template", false),
        ];
        let mut fallback_order: Vec<String> =
            ["eng", "tw", "zh"].iter().map(|code| code.to_string()).collect();

        if profile == Profile::Full {
            supported_languages.push(language("ja", "日本語", "Japanese template", false));
            fallback_order.extend(["ko", "ja"].iter().map(|code| code.to_string()));
        }

        Self {
            version: String::from("1.0.0"),
            supported_languages,
            fallback_order,
            naming_convention: NamingConvention::default(),
            format_options: FormatOptions::for_profile(profile),
        }
    }

    /// Reads the `template_config` section of a YAML profile file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::from(path).format(FileFormat::Yaml))
            .build()?
            .get::<Self>("template_config")
    }

    pub fn language_codes(&self) -> Vec<String> {
        self.supported_languages
            .iter()
            .map(|language| language.code.clone())
            .collect()
    }
}

/// Resolves profiles to configurations, preferring files in `config_dir`.
#[derive(Debug, Clone, Default)]
pub struct ProfileResolver {
    config_dir: Option<PathBuf>,
}

impl ProfileResolver {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self { config_dir: Some(config_dir.into()) }
    }

    /// A resolver that never touches the filesystem.
    pub fn builtin() -> Self {
        Self { config_dir: None }
    }

    pub fn path(&self, profile: Profile) -> Option<PathBuf> {
        self.config_dir.as_ref().map(|dir| dir.join(profile.file_name()))
    }

    /// Loads the profile's configuration, falling back to [TemplateConfig::builtin].
    pub fn load_config(&self, profile: Profile) -> TemplateConfig {
        let Some(path) = self.path(profile) else {
            return TemplateConfig::builtin(profile);
        };

        match TemplateConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    profile = %profile,
                    path = %path.display(),
                    version = %config.version,
                    languages = config.supported_languages.len(),
                    "template config loaded"
                );
                config
            }
            Err(err) => {
                tracing::warn!(
                    profile = %profile,
                    path = %path.display(),
                    error = %err,
                    "failed to load template config, using built-in defaults"
                );
                TemplateConfig::builtin(profile)
            }
        }
    }

    pub fn format_options(&self, profile: Profile) -> FormatOptions {
        self.load_config(profile).format_options
    }
}
