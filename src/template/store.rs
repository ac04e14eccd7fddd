//! Discovers template files and compiles them into an immutable [TemplateSet].

use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use tera::{Context, Tera};
use tracing::{debug, warn};

use super::{
    data::TemplateData,
    format,
    profile::NamingConvention,
    translate::{translate, Translation},
    TemplateError,
};

/// files with this extension are native tera templates, everything else is dialect
pub const NATIVE_EXTENSION: &str = ".tera";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Native,
    Dialect,
}

impl Syntax {
    pub fn of_extension(extension: &str) -> Self {
        if extension == NATIVE_EXTENSION {
            Syntax::Native
        } else {
            Syntax::Dialect
        }
    }
}

/// Where the compiled template of a language came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    pub path: PathBuf,
    pub syntax: Syntax,
    /// dialect names the translator couldn't map
    pub unresolved: Vec<String>,
}

/// a template file picked for a language
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    path: PathBuf,
    extension: String,
}

/// Compiled templates, one per language, in discovery order.
#[derive(Debug)]
pub struct TemplateSet {
    tera: Tera,
    sources: IndexMap<String, TemplateSource>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self { tera: new_tera(), sources: IndexMap::new() }
    }
}

fn new_tera() -> Tera {
    let mut tera = Tera::default();
    // chat markup is produced by the templates themselves
    tera.autoescape_on(vec![]);
    format::register_filters(&mut tera);
    tera
}

/// Reads a template file and converts it to native syntax.
fn read_source(path: &Path, syntax: Syntax) -> Result<Translation, TemplateError> {
    let text = fs::read_to_string(path)
        .map_err(|source| TemplateError::ReadFailed { path: path.to_path_buf(), source })?;

    Ok(match syntax {
        Syntax::Native => Translation { text, unresolved: Vec::new() },
        Syntax::Dialect => translate(&text),
    })
}

/// Finds the template file to use for each language in `directory`.
///
/// Files are visited in file name order; for a language found more than once
/// the extension ranked first in `priority_order` wins.
fn discover(
    directory: &Path,
    naming: &NamingConvention,
) -> Result<IndexMap<String, Candidate>, TemplateError> {
    if !directory.is_dir() {
        return Err(TemplateError::DirectoryNotFound(directory.to_path_buf()));
    }

    let scan_failed =
        |source| TemplateError::ScanFailed { path: directory.to_path_buf(), source };

    let mut entries = fs::read_dir(directory)
        .map_err(scan_failed)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(scan_failed)?;
    entries.sort();

    let mut candidates: IndexMap<String, Candidate> = IndexMap::new();

    for path in entries {
        // follows symlinks
        if !fs::metadata(&path).map(|meta| meta.is_file()).unwrap_or(false) {
            continue;
        }

        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(rest) = name.strip_prefix(naming.prefix.as_str()) else {
            continue;
        };
        let Some(extension) = naming
            .supported_extensions
            .iter()
            .find(|extension| rest.ends_with(extension.as_str()))
        else {
            continue;
        };

        let language = &rest[..rest.len() - extension.len()];
        if language.is_empty() {
            warn!(path = %path.display(), "template file without language code, skipping");
            continue;
        }

        if let Some(existing) = candidates.get(language) {
            if naming.priority(&existing.extension) <= naming.priority(extension) {
                debug!(language, path = %path.display(), kept = %existing.path.display(), "lower priority template ignored");
                continue;
            }
            debug!(language, path = %path.display(), replaced = %existing.path.display(), "higher priority template replaces earlier one");
        }

        candidates.insert(
            language.to_string(),
            Candidate { path: path.clone(), extension: extension.clone() },
        );
    }

    Ok(candidates)
}

impl TemplateSet {
    /// Scans `directory` and compiles every template found.
    ///
    /// Templates that can't be read or parsed are logged and skipped as long as
    /// at least one compiles.
    ///
    /// # Arguments
    ///
    /// * `directory` - directory containing `<prefix><language><extension>` files
    ///
    /// * `naming` - prefix, extensions and their priority
    pub fn load(directory: &Path, naming: &NamingConvention) -> Result<Self, TemplateError> {
        let candidates = discover(directory, naming)?;
        if candidates.is_empty() {
            return Err(TemplateError::NoTemplatesFound(directory.to_path_buf()));
        }

        let mut set = Self::default();
        let found = candidates.len();

        for (language, candidate) in candidates {
            let syntax = Syntax::of_extension(&candidate.extension);

            let translation = match read_source(&candidate.path, syntax) {
                Ok(translation) => translation,
                Err(err) => {
                    warn!(language = %language, path = %candidate.path.display(), "{err:#}");
                    continue;
                }
            };

            if !translation.unresolved.is_empty() {
                warn!(
                    language = %language,
                    path = %candidate.path.display(),
                    unresolved = ?translation.unresolved,
                    "template references unknown names, rendering will fail",
                );
            }

            // a template that fails inside the shared tera stays registered there and
            // breaks every later add, so it is compiled on its own first
            let compiled = new_tera()
                .add_raw_template(&language, &translation.text)
                .and_then(|()| set.tera.add_raw_template(&language, &translation.text));
            if let Err(err) = compiled {
                warn!(language = %language, path = %candidate.path.display(), "failed to parse template: {err:?}");
                continue;
            }

            set.sources.insert(
                language,
                TemplateSource {
                    path: candidate.path,
                    syntax,
                    unresolved: translation.unresolved,
                },
            );
        }

        if set.sources.is_empty() {
            return Err(TemplateError::AllTemplatesFailedToParse {
                path: directory.to_path_buf(),
                count: found,
            });
        }

        Ok(set)
    }

    /// Renders the template of `language`. `data` is used as is.
    pub fn render(&self, language: &str, data: &TemplateData) -> Result<String, TemplateError> {
        if !self.has_language(language) {
            return Err(TemplateError::TemplateNotFound(language.to_string()));
        }

        let render_failed = |source| TemplateError::RenderFailed {
            language: language.to_string(),
            source,
        };

        let context = Context::from_serialize(data).map_err(render_failed)?;
        self.tera.render(language, &context).map_err(render_failed)
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.sources.contains_key(language)
    }

    /// compiled languages in discovery order
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn source(&self, language: &str) -> Option<&TemplateSource> {
        self.sources.get(language)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Reads, translates and parses a single template without registering it.
pub fn validate(path: &Path, naming: &NamingConvention) -> Result<Translation, TemplateError> {
    let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
    let syntax = naming
        .supported_extensions
        .iter()
        .find(|extension| name.ends_with(extension.as_str()))
        .map(|extension| Syntax::of_extension(extension))
        .unwrap_or(Syntax::Dialect);

    let translation = read_source(path, syntax)?;

    new_tera()
        .add_raw_template(name, &translation.text)
        .map_err(|source| TemplateError::InvalidTemplate { path: path.to_path_buf(), source })?;

    Ok(translation)
}
