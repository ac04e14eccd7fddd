//! command line front end: checks template directories and renders payloads

use std::fs;

use alert_relay::{
	alert, fallback, log,
	notification::{destination::DestinationTable, ProviderKind},
	settings::{Action, Cli, Settings},
	template::{Platform, Profile, TemplateData, TemplateEngine, DEFAULT_LANGUAGE},
};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// loads all templates and prints one line per compiled language
fn check(engine: &TemplateEngine, settings: &Settings) -> Result<()> {
	let directory = &settings.templates.directory;
	engine
		.load_templates(directory)
		.with_context(|| format!("failed to load templates from {}", directory.display()))?;

	let snapshot = engine.snapshot();
	let mut unresolved = 0;

	for language in snapshot.languages() {
		let Some(source) = snapshot.source(language) else {
			continue;
		};
		println!("{language}\t{:?}\t{}", source.syntax, source.path.display());

		for name in &source.unresolved {
			println!("  unresolved: {name}");
			unresolved += 1;
		}
	}

	let supported = engine.supported_languages();
	for language in snapshot.languages().filter(|language| !supported.iter().any(|s| s == language)) {
		warn!(language, "template language is not declared in the template config");
	}

	let platforms = settings.platforms();
	for kind in ProviderKind::ALL {
		let platform = platforms.get(kind);
		if !platform.enable {
			continue;
		}
		DestinationTable::new(&platform.default_destination, &platform.levels)
			.with_context(|| format!("invalid level in {kind} settings"))?;
		info!(provider = %kind, levels = platform.levels.len(), "platform enabled");
	}

	if unresolved > 0 {
		warn!(unresolved, "some template names could not be translated and will fail to render");
	}

	Ok(())
}

/// renders a payload file, printing the fallback message if the template fails
fn render(
	engine: &TemplateEngine,
	settings: &Settings,
	payload: &std::path::Path,
	language: Option<&str>,
	platform: Option<Platform>,
	profile: Option<Profile>,
) -> Result<()> {
	engine
		.load_templates(&settings.templates.directory)
		.context("failed to load templates")?;

	let raw = fs::read_to_string(payload)
		.with_context(|| format!("can't read payload {}", payload.display()))?;
	let payload: alert::Data = serde_json::from_str(&raw)
		.with_context(|| format!("can't parse payload {}", payload.display()))?;

	let data = TemplateData {
		format_options: profile.map(|profile| engine.format_options(profile)),
		platform,
		..TemplateData::from_payload(&payload)
	};
	let language = engine.default_language(language.unwrap_or(DEFAULT_LANGUAGE));

	match engine.render(&language, &data) {
		Ok(text) => println!("{text}"),
		Err(err) => {
			warn!(%language, "template failed, using fallback message: {:#}", anyhow::Error::from(err));
			println!("{}", fallback::format_alert(&data, platform));
		}
	}

	Ok(())
}

pub fn main() -> Result<()> {
	setup_panic_handler();

	let cli = Cli::parse()?;
	let settings = Settings::load(&cli.config, cli.log_level.as_deref()).context("failed to load settings")?;

	log::setup_logging(&settings.log).context("could not setup logging")?;

	let engine = TemplateEngine::new(settings.templates.resolver(), settings.templates.profile);

	match &cli.action {
		Action::Check => check(&engine, &settings),
		Action::Render { payload, language, platform, profile } => {
			render(&engine, &settings, payload, language.as_deref(), *platform, *profile)
		}
	}
}
