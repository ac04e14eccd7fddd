//! The notification manager owns the provider registry and dispatches requests.
//!
//! The registry is an immutable snapshot behind an [ArcSwap]. `initialize` and
//! `reload` build a complete new registry before publishing it, a dispatch that
//! already captured a provider finishes against it.

use std::{collections::BTreeMap, sync::Arc};

use arc_swap::ArcSwap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    destination::DestinationService, DispatchFailure, NotificationError, NotificationRequest,
    NotificationResponse, PlatformSettings, Provider, ProviderKind, ProviderStatus, Sent,
};
use crate::{
    fallback,
    template::{FormatOverrides, Profile, TemplateData, TemplateEngine, TemplateError, DEFAULT_LANGUAGE},
};

/// Settings of all platforms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformsSettings {
    pub telegram: PlatformSettings,
    pub slack: PlatformSettings,
    pub discord: PlatformSettings,
}

impl PlatformsSettings {
    pub fn get(&self, kind: ProviderKind) -> &PlatformSettings {
        match kind {
            ProviderKind::Telegram => &self.telegram,
            ProviderKind::Slack => &self.slack,
            ProviderKind::Discord => &self.discord,
        }
    }
}

/// Platform clients available to the manager; a missing client disables its platform.
#[derive(Clone, Default)]
pub struct DestinationServices {
    pub telegram: Option<Arc<dyn DestinationService>>,
    pub slack: Option<Arc<dyn DestinationService>>,
    pub discord: Option<Arc<dyn DestinationService>>,
}

impl DestinationServices {
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn DestinationService>> {
        match kind {
            ProviderKind::Telegram => self.telegram.clone(),
            ProviderKind::Slack => self.slack.clone(),
            ProviderKind::Discord => self.discord.clone(),
        }
    }
}

#[derive(Default)]
struct Registry {
    engine: Option<Arc<TemplateEngine>>,
    providers: BTreeMap<ProviderKind, Arc<dyn Provider>>,
}

/// Routes notifications to providers.
#[derive(Default)]
pub struct NotificationManager {
    registry: ArcSwap<Registry>,
}

impl NotificationManager {
    /// A manager without providers, every dispatch fails until [initialize](Self::initialize).
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager serving exactly `providers`.
    pub fn with_providers(
        engine: Arc<TemplateEngine>,
        providers: impl IntoIterator<Item = Arc<dyn Provider>>,
    ) -> Self {
        let providers = providers.into_iter().map(|provider| (provider.kind(), provider)).collect();

        Self {
            registry: ArcSwap::from_pointee(Registry { engine: Some(engine), providers }),
        }
    }

    /// Builds a provider for every enabled platform with a client and publishes them.
    ///
    /// A platform whose provider can't be built is logged and left out. Returns the
    /// number of registered providers.
    ///
    /// # Arguments
    ///
    /// * `engine` - template engine used to render alert data
    ///
    /// * `platforms` - per platform settings
    ///
    /// * `services` - per platform clients
    pub fn initialize(
        &self,
        engine: Arc<TemplateEngine>,
        platforms: &PlatformsSettings,
        services: &DestinationServices,
    ) -> usize {
        let mut providers: BTreeMap<ProviderKind, Arc<dyn Provider>> = BTreeMap::new();

        for kind in ProviderKind::ALL {
            let settings = platforms.get(kind);
            if !settings.enable {
                debug!(provider = %kind, "provider disabled");
                continue;
            }

            let Some(service) = services.get(kind) else {
                warn!(provider = %kind, "provider enabled but no client available, skipping");
                continue;
            };

            let provider = super::ChatProvider::new(kind, settings.clone(), service, Arc::clone(&engine))
                .and_then(|provider| provider.validate_config().map(|()| provider));

            match provider {
                Ok(provider) => {
                    providers.insert(kind, Arc::new(provider));
                }
                Err(err) => warn!(provider = %kind, "failed to create provider: {err}"),
            }
        }

        let count = providers.len();
        info!(providers = ?providers.keys().collect::<Vec<_>>(), "notification providers initialized");
        self.registry.store(Arc::new(Registry { engine: Some(engine), providers }));

        count
    }

    /// Rebuilds all providers, see [initialize](Self::initialize).
    pub fn reload(
        &self,
        engine: Arc<TemplateEngine>,
        platforms: &PlatformsSettings,
        services: &DestinationServices,
    ) -> usize {
        info!("reloading notification providers");
        self.initialize(engine, platforms, services)
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        let kind = name.parse::<ProviderKind>().ok()?;
        self.registry.load().providers.get(&kind).cloned()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.registry
            .load()
            .providers
            .keys()
            .map(ProviderKind::to_string)
            .collect()
    }

    pub async fn provider_status(&self, name: &str) -> Result<ProviderStatus, NotificationError> {
        let provider = self
            .provider(name)
            .ok_or_else(|| NotificationError::ProviderNotFound(name.to_string()))?;

        Ok(provider.status().await)
    }

    /// Status of every registered provider, queried concurrently.
    pub async fn statuses(&self) -> Vec<ProviderStatus> {
        let registry = self.registry.load_full();
        join_all(registry.providers.values().map(|provider| provider.status())).await
    }

    /// Sends a notification through the provider called `provider_name`.
    ///
    /// A non-empty `request.message` is sent as is. Otherwise `request.alert_data`
    /// is rendered first; if that fails nothing is sent.
    pub async fn send_notification(
        &self,
        provider_name: &str,
        request: &NotificationRequest,
    ) -> Result<NotificationResponse, DispatchFailure> {
        let registry = self.registry.load_full();

        let provider = provider_name
            .parse::<ProviderKind>()
            .ok()
            .and_then(|kind| registry.providers.get(&kind).cloned())
            .ok_or_else(|| {
                DispatchFailure::new(None, NotificationError::ProviderNotFound(provider_name.to_string()))
            })?;
        let name = provider.name().to_string();
        let fail = |error| DispatchFailure::new(Some(&name), error);

        if !provider.is_enabled() {
            return Err(fail(NotificationError::ProviderDisabled(name.clone())));
        }

        let message = preprocess(registry.engine.as_deref(), provider.as_ref(), request).map_err(fail)?;
        if message.trim().is_empty() {
            return Err(fail(NotificationError::EmptyMessage(name.clone())));
        }

        let request = NotificationRequest { message, ..request.clone() };
        let sent = provider.send_message(&request).await.map_err(fail)?;

        Ok(success_response(provider.kind(), &request, sent))
    }

    /// Like [send_notification](Self::send_notification), but when the template
    /// fails to render the alert is sent with the built-in formatter instead.
    pub async fn send_alert(
        &self,
        provider_name: &str,
        request: &NotificationRequest,
    ) -> Result<NotificationResponse, DispatchFailure> {
        let failure = match self.send_notification(provider_name, request).await {
            Err(failure) if matches!(failure.error, NotificationError::PreprocessFailed { .. }) => failure,
            result => return result,
        };

        let (Some(alert_data), Ok(kind)) = (&request.alert_data, provider_name.parse::<ProviderKind>()) else {
            return Err(failure);
        };

        warn!(
            provider = %kind,
            error = %failure.response.details.as_deref().unwrap_or_default(),
            "template rendering failed, sending alert with the built-in formatter"
        );

        let request = NotificationRequest {
            message: fallback::format_alert(&TemplateData::from_payload(alert_data), Some(kind.platform())),
            ..request.clone()
        };
        self.send_notification(provider_name, &request).await
    }
}

/// Produces the text to send: the request's message or the rendered alert data.
fn preprocess(
    engine: Option<&TemplateEngine>,
    provider: &dyn Provider,
    request: &NotificationRequest,
) -> Result<String, NotificationError> {
    if !request.message.is_empty() {
        return Ok(request.message.clone());
    }

    let Some(alert_data) = &request.alert_data else {
        return Ok(String::new());
    };

    let preferred = Some(request.template_language.trim())
        .filter(|language| !language.is_empty())
        .or_else(|| provider.template_language())
        .unwrap_or(DEFAULT_LANGUAGE);

    let preprocess_failed = |source| NotificationError::PreprocessFailed {
        provider: provider.name().to_string(),
        source,
    };

    let Some(engine) = engine else {
        return Err(preprocess_failed(TemplateError::TemplateNotFound(preferred.to_string())));
    };

    let language = engine.default_language(preferred);

    let requested_profile = request
        .options
        .get("template_mode")
        .and_then(serde_json::Value::as_str)
        .filter(|mode| !mode.trim().is_empty())
        .and_then(|mode| match mode.parse::<Profile>() {
            Ok(profile) => Some(profile),
            Err(err) => {
                warn!(provider = provider.name(), "{err}, ignoring");
                None
            }
        });
    let overrides = FormatOverrides::from_options(&request.options);

    let format_options = match requested_profile.or_else(|| provider.template_profile()) {
        Some(profile) => Some(engine.format_options(profile).with_overrides(&overrides)),
        None if !overrides.is_empty() => {
            Some(engine.config().format_options.clone().with_overrides(&overrides))
        }
        None => None,
    };

    let data = TemplateData { format_options, ..TemplateData::from_payload(alert_data) };

    debug!(provider = provider.name(), language = %language, preferred, "rendering alert");

    engine
        .render_for_platform(&language, provider.kind().platform(), &data)
        .map_err(preprocess_failed)
}

fn success_response(kind: ProviderKind, request: &NotificationRequest, sent: Sent) -> NotificationResponse {
    let (chat_id, channel) = match kind {
        ProviderKind::Telegram => (Some(sent.destination), None),
        ProviderKind::Slack | ProviderKind::Discord => (None, Some(sent.destination)),
    };

    NotificationResponse {
        success: true,
        message: String::from("notification sent"),
        details: (sent.parts > 1).then(|| format!("sent in {} parts", sent.parts)),
        provider: Some(kind.to_string()),
        level: Some(request.level.clone()).filter(|level| !level.is_empty()),
        chat_id,
        channel,
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        alert::{Alert, Data},
        notification::{
            provider::tests::FakeService, ProviderCapabilities, ProviderStatistics,
        },
        template::ProfileResolver,
    };

    /// records requests instead of sending them
    struct FakeProvider {
        kind: ProviderKind,
        enabled: bool,
        profile: Option<Profile>,
        requests: Mutex<Vec<NotificationRequest>>,
    }

    impl FakeProvider {
        fn new(kind: ProviderKind) -> Self {
            Self { kind, enabled: true, profile: None, requests: Mutex::new(Vec::new()) }
        }

        fn messages(&self) -> Vec<String> {
            self.requests.lock().unwrap().iter().map(|request| request.message.clone()).collect()
        }
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn send_message(&self, request: &NotificationRequest) -> Result<Sent, NotificationError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(Sent { destination: String::from("dest"), parts: 1 })
        }

        async fn status(&self) -> ProviderStatus {
            ProviderStatus {
                name: self.kind.to_string(),
                enabled: self.enabled,
                connected: true,
                last_error: None,
                channels: BTreeMap::new(),
                statistics: ProviderStatistics::default(),
            }
        }

        fn capabilities(&self) -> ProviderCapabilities {
            self.kind.capabilities(Vec::new())
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn validate_config(&self) -> Result<(), NotificationError> {
            Ok(())
        }

        async fn test_connection(&self) -> Result<(), NotificationError> {
            Ok(())
        }

        fn template_language(&self) -> Option<&str> {
            None
        }

        fn template_profile(&self) -> Option<Profile> {
            self.profile
        }
    }

    fn engine(templates: &[(&str, &str)]) -> (Arc<TemplateEngine>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in templates {
            fs::write(dir.path().join(name), content).unwrap();
        }

        let engine = TemplateEngine::new(ProfileResolver::builtin(), Profile::Full);
        engine.load_templates(dir.path()).unwrap();

        (Arc::new(engine), dir)
    }

    fn payload() -> Data {
        let alert = |status: &str| Alert {
            status: status.to_string(),
            labels: [(String::from("alertname"), String::from("HighCPU"))].into(),
            annotations: [(String::from("summary"), String::from("cpu above 90%"))].into(),
            starts_at: "2024-03-01T10:00:00Z".parse().unwrap(),
            ends_at: "0001-01-01T00:00:00Z".parse().unwrap(),
            generator_url: String::new(),
            fingerprint: None,
        };

        Data {
            status: String::from("firing"),
            alerts: vec![alert("firing"), alert("firing"), alert("resolved")],
            common_labels: [(String::from("alertname"), String::from("HighCPU"))].into(),
            ..Default::default()
        }
    }

    fn alert_request() -> NotificationRequest {
        NotificationRequest { alert_data: Some(payload()), ..Default::default() }
    }

    #[tokio::test]
    async fn uninitialized_manager_finds_no_provider() {
        let manager = NotificationManager::new();

        let failure = manager
            .send_notification("telegram", &NotificationRequest { message: String::from("hi"), ..Default::default() })
            .await
            .unwrap_err();

        assert!(!failure.response.success);
        assert!(matches!(failure.error, NotificationError::ProviderNotFound(_)));
    }

    #[tokio::test]
    async fn unregistered_provider_is_never_dispatched() {
        let (engine, _dir) = engine(&[("alert_template_eng.tera", "x")]);
        let slack = Arc::new(FakeProvider::new(ProviderKind::Slack));
        let manager = NotificationManager::with_providers(engine, [slack.clone() as Arc<dyn Provider>]);

        for name in ["telegram", "matrix"] {
            let failure = manager.send_notification(name, &alert_request()).await.unwrap_err();
            assert!(matches!(failure.error, NotificationError::ProviderNotFound(_)));
        }
        assert!(slack.messages().is_empty());
    }

    #[tokio::test]
    async fn disabled_provider() {
        let (engine, _dir) = engine(&[("alert_template_eng.tera", "x")]);
        let provider = Arc::new(FakeProvider { enabled: false, ..FakeProvider::new(ProviderKind::Discord) });
        let manager = NotificationManager::with_providers(engine, [provider.clone() as Arc<dyn Provider>]);

        let failure = manager.send_notification("discord", &alert_request()).await.unwrap_err();

        assert!(matches!(failure.error, NotificationError::ProviderDisabled(_)));
        assert!(provider.messages().is_empty());
    }

    #[tokio::test]
    async fn explicit_message_wins_over_alert_data() {
        let (engine, _dir) = engine(&[("alert_template_eng.tera", "rendered")]);
        let provider = Arc::new(FakeProvider::new(ProviderKind::Slack));
        let manager = NotificationManager::with_providers(engine, [provider.clone() as Arc<dyn Provider>]);

        let request = NotificationRequest { message: String::from("  as is  "), ..alert_request() };
        let response = manager.send_notification("slack", &request).await.unwrap();

        assert!(response.success);
        assert_eq!(response.provider.as_deref(), Some("slack"));
        assert_eq!(response.channel.as_deref(), Some("dest"));
        assert_eq!(provider.messages(), vec![String::from("  as is  ")]);
    }

    #[tokio::test]
    async fn renders_alert_data_for_the_platform() {
        let (engine, _dir) = engine(&[(
            "alert_template_eng.j2",
            "{{ format_bold(alert_name) }} {{ firing_count }}/{{ total_alerts }}",
        )]);
        let provider = Arc::new(FakeProvider::new(ProviderKind::Telegram));
        let manager = NotificationManager::with_providers(engine, [provider.clone() as Arc<dyn Provider>]);

        let response = manager.send_notification("Telegram", &alert_request()).await.unwrap();

        assert_eq!(response.chat_id.as_deref(), Some("dest"));
        assert_eq!(provider.messages(), vec![String::from("<b>HighCPU</b> 2/3")]);
    }

    #[tokio::test]
    async fn language_falls_back() {
        let (engine, _dir) = engine(&[("alert_template_tw.tera", "tw")]);
        let provider = Arc::new(FakeProvider::new(ProviderKind::Slack));
        let manager = NotificationManager::with_providers(engine, [provider.clone() as Arc<dyn Provider>]);

        let request = NotificationRequest { template_language: String::from("eng"), ..alert_request() };
        manager.send_notification("slack", &request).await.unwrap();

        assert_eq!(provider.messages(), vec![String::from("tw")]);
    }

    #[tokio::test]
    async fn format_options_from_profile_and_overrides() {
        let (engine, _dir) = engine(&[(
            "alert_template_eng.j2",
            "{{ show_emoji }} {{ compact_mode }} {{ max_summary_length }}",
        )]);
        let provider = Arc::new(FakeProvider { profile: Some(Profile::Minimal), ..FakeProvider::new(ProviderKind::Slack) });
        let manager = NotificationManager::with_providers(engine, [provider.clone() as Arc<dyn Provider>]);

        manager.send_notification("slack", &alert_request()).await.unwrap();

        let mut request = alert_request();
        request.options.insert(String::from("template_mode"), serde_json::json!("full"));
        request.options.insert(String::from("max_summary_length"), serde_json::json!(80));
        manager.send_notification("slack", &request).await.unwrap();

        assert_eq!(
            provider.messages(),
            vec![String::from("false true 100"), String::from("true false 80")]
        );
    }

    #[tokio::test]
    async fn render_failure_sends_nothing() {
        let (engine, _dir) = engine(&[("alert_template_eng.j2", "{{ receiver }}")]);
        let provider = Arc::new(FakeProvider::new(ProviderKind::Discord));
        let manager = NotificationManager::with_providers(engine, [provider.clone() as Arc<dyn Provider>]);

        let failure = manager.send_notification("discord", &alert_request()).await.unwrap_err();

        assert!(matches!(failure.error, NotificationError::PreprocessFailed { .. }));
        assert!(provider.messages().is_empty());
    }

    #[tokio::test]
    async fn send_alert_falls_back_to_builtin_formatter() {
        let (engine, _dir) = engine(&[("alert_template_eng.j2", "{{ receiver }}")]);
        let provider = Arc::new(FakeProvider::new(ProviderKind::Discord));
        let manager = NotificationManager::with_providers(engine, [provider.clone() as Arc<dyn Provider>]);

        let response = manager.send_alert("discord", &alert_request()).await.unwrap();

        assert!(response.success);
        let messages = provider.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("**Alert Name:** HighCPU"));
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let (engine, _dir) = engine(&[("alert_template_eng.tera", "x")]);
        let provider = Arc::new(FakeProvider::new(ProviderKind::Slack));
        let manager = NotificationManager::with_providers(engine, [provider as Arc<dyn Provider>]);

        let failure = manager.send_notification("slack", &NotificationRequest::default()).await.unwrap_err();

        assert!(matches!(failure.error, NotificationError::EmptyMessage(_)));
    }

    #[tokio::test]
    async fn initialize_skips_unusable_platforms() {
        let (engine, _dir) = engine(&[("alert_template_eng.tera", "x")]);
        let manager = NotificationManager::new();

        let platforms = PlatformsSettings {
            telegram: PlatformSettings { enable: true, default_destination: String::from("-100"), ..Default::default() },
            // invalid level key
            slack: PlatformSettings { enable: true, levels: [(String::from("L9"), String::from("x"))].into(), ..Default::default() },
            // no client
            discord: PlatformSettings { enable: true, default_destination: String::from("42"), ..Default::default() },
        };
        let telegram = Arc::new(FakeService::default());
        let services = DestinationServices {
            telegram: Some(telegram.clone()),
            slack: Some(Arc::new(FakeService::default())),
            discord: None,
        };

        assert_eq!(manager.initialize(engine, &platforms, &services), 1);
        assert_eq!(manager.provider_names(), vec![String::from("telegram")]);

        let response = manager
            .send_notification("telegram", &NotificationRequest { message: String::from("hi"), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(response.chat_id.as_deref(), Some("-100"));
        assert_eq!(telegram.sent.lock().unwrap().len(), 1);

        let statuses = manager.statuses().await;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].statistics.messages_sent, 1);
        assert!(manager.provider_status("slack").await.is_err());
    }

    #[tokio::test]
    async fn reload_swaps_the_registry() {
        let (engine, _dir) = engine(&[("alert_template_eng.tera", "x")]);
        let manager = NotificationManager::new();
        let services = DestinationServices {
            slack: Some(Arc::new(FakeService::default())),
            discord: Some(Arc::new(FakeService::default())),
            ..Default::default()
        };

        let mut platforms = PlatformsSettings::default();
        platforms.slack.enable = true;
        manager.initialize(engine.clone(), &platforms, &services);
        let captured = manager.provider("slack").unwrap();

        platforms.slack.enable = false;
        platforms.discord = PlatformSettings { enable: true, default_destination: String::from("42"), ..Default::default() };
        manager.reload(engine, &platforms, &services);

        assert_eq!(manager.provider_names(), vec![String::from("discord")]);
        assert!(manager.provider("slack").is_none());
        // a provider captured before the reload keeps working
        let sent = captured
            .send_message(&NotificationRequest { message: String::from("hi"), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(sent.destination, "#alerts");
    }
}
