//! Renders alerts via per-language templates.
//!
//! Templates are loaded from a directory into a [TemplateSet] snapshot. The
//! active snapshot and [TemplateConfig] are swapped atomically on reload, a
//! render that already holds a snapshot finishes with it.

pub mod data;
pub mod format;
pub mod profile;
pub mod store;
pub mod translate;

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use arc_swap::ArcSwap;
use thiserror::Error;
use tracing::{debug, info};

pub use self::{
    data::{AlertData, TemplateData},
    format::Platform,
    profile::{FormatOptions, FormatOverrides, Profile, ProfileResolver, TemplateConfig},
    store::{TemplateSet, TemplateSource},
    translate::Translation,
};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template directory {} does not exist", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("could not read template directory {}", .path.display())]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no templates found in {}", .0.display())]
    NoTemplatesFound(PathBuf),
    #[error("none of the {count} templates in {} could be parsed", .path.display())]
    AllTemplatesFailedToParse { path: PathBuf, count: usize },
    #[error("could not read template {}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid template {}", .path.display())]
    InvalidTemplate {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },
    #[error("no template for language '{0}'")]
    TemplateNotFound(String),
    #[error("failed to render template for language '{language}'")]
    RenderFailed {
        language: String,
        #[source]
        source: tera::Error,
    },
}

/// language used when nothing else is configured
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Template engine
pub struct TemplateEngine {
    profiles: ProfileResolver,
    config: ArcSwap<TemplateConfig>,
    templates: ArcSwap<TemplateSet>,
    /// format options of every profile, read once so rendering never touches the disk
    profile_options: ArcSwap<HashMap<Profile, FormatOptions>>,
}

fn load_profile_options(profiles: &ProfileResolver) -> HashMap<Profile, FormatOptions> {
    [Profile::Full, Profile::Minimal]
        .into_iter()
        .map(|profile| (profile, profiles.format_options(profile)))
        .collect()
}

impl TemplateEngine {
    /// Creates an engine without templates using the config of `profile`.
    pub fn new(profiles: ProfileResolver, profile: Profile) -> Self {
        let config = profiles.load_config(profile);
        Self::with_config(profiles, config)
    }

    pub fn with_config(profiles: ProfileResolver, config: TemplateConfig) -> Self {
        Self {
            profile_options: ArcSwap::from_pointee(load_profile_options(&profiles)),
            profiles,
            config: ArcSwap::from_pointee(config),
            templates: ArcSwap::from_pointee(TemplateSet::default()),
        }
    }

    /// Loads all templates in `directory` and publishes them. Returns the
    /// number of compiled languages.
    ///
    /// On error the previously published templates stay active.
    pub fn load_templates(&self, directory: &Path) -> Result<usize, TemplateError> {
        let config = self.config.load();
        let set = TemplateSet::load(directory, &config.naming_convention)?;
        let count = set.len();

        info!(
            directory = %directory.display(),
            languages = ?set.languages().collect::<Vec<_>>(),
            "loaded templates",
        );
        self.templates.store(Arc::new(set));

        Ok(count)
    }

    /// Rebuilds the templates from `directory` and swaps them in.
    pub fn reload_templates(&self, directory: &Path) -> Result<usize, TemplateError> {
        info!(directory = %directory.display(), "reloading templates");
        self.load_templates(directory)
    }

    /// Replaces the active template config with the one of `profile` and
    /// re-reads the format options of all profiles.
    pub fn reload_config(&self, profile: Profile) {
        self.config.store(Arc::new(self.profiles.load_config(profile)));
        self.profile_options.store(Arc::new(load_profile_options(&self.profiles)));
        info!(%profile, "template config reloaded");
    }

    /// the currently published templates
    pub fn snapshot(&self) -> Arc<TemplateSet> {
        self.templates.load_full()
    }

    pub fn config(&self) -> Arc<TemplateConfig> {
        self.config.load_full()
    }

    /// Renders `data` with the template of `language`.
    ///
    /// `data.format_options == None` is replaced by the options of the active
    /// template config, explicit options are left untouched.
    pub fn render(&self, language: &str, data: &TemplateData) -> Result<String, TemplateError> {
        self.render_with(&self.snapshot(), language, data)
    }

    /// Renders like [render](Self::render) with platform specific formatting.
    pub fn render_for_platform(
        &self,
        language: &str,
        platform: Platform,
        data: &TemplateData,
    ) -> Result<String, TemplateError> {
        let data = TemplateData { platform: Some(platform), ..data.clone() };
        self.render(language, &data)
    }

    /// Renders against a snapshot taken earlier.
    pub fn render_with(
        &self,
        templates: &TemplateSet,
        language: &str,
        data: &TemplateData,
    ) -> Result<String, TemplateError> {
        debug!(language, platform = ?data.platform, alerts = data.total_alerts, "rendering alert");

        if data.format_options.is_some() {
            return templates.render(language, data);
        }

        let data = TemplateData {
            format_options: Some(self.config.load().format_options.clone()),
            ..data.clone()
        };
        templates.render(language, &data)
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.templates.load().has_language(language)
    }

    /// compiled languages in discovery order
    pub fn available_languages(&self) -> Vec<String> {
        self.templates.load().languages().map(String::from).collect()
    }

    /// language codes declared by the active template config
    pub fn supported_languages(&self) -> Vec<String> {
        self.config.load().language_codes()
    }

    /// Picks the language to render with.
    ///
    /// `preferred` if it is compiled, else the first compiled language of the
    /// configured fallback order, else the first compiled language. Without
    /// any compiled template `preferred` is returned unchanged.
    pub fn default_language(&self, preferred: &str) -> String {
        let templates = self.templates.load();

        if templates.has_language(preferred) {
            return preferred.to_string();
        }

        self.config
            .load()
            .fallback_order
            .iter()
            .map(String::as_str)
            .find(|language| templates.has_language(language))
            .or_else(|| templates.languages().next())
            .unwrap_or(preferred)
            .to_string()
    }

    /// Format options of `profile` as read at construction or the last config reload.
    pub fn format_options(&self, profile: Profile) -> FormatOptions {
        self.profile_options
            .load()
            .get(&profile)
            .cloned()
            .unwrap_or_else(|| FormatOptions::for_profile(profile))
    }

    /// Checks a single template file without registering it.
    pub fn validate_template(&self, path: &Path) -> Result<Translation, TemplateError> {
        store::validate(path, &self.config.load().naming_convention)
    }
}
