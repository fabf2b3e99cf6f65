//! Configuration reconciler: restores cross-field consistency after every
//! configuration change.
//!
//! [`Reconciler`] holds the pure rules over an injected catalog. The
//! configurators route user input through the [`ConfigStore`] and apply
//! those rules in the same write.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::model::{
    AgentType, EmailAgentConfig, EmailAgentPatch, Tone, VoiceAgentConfig, VoiceAgentPatch,
};
use super::store::ConfigStore;
use crate::catalog::OptionCatalog;

const DEFAULT_FUNCTION: &str = "helps users";
const DEFAULT_TONE: &str = "professional and helpful";

/// Cross-field rules for agent configuration. None of these fail: invalid
/// input is coerced to a valid default.
#[derive(Debug, Clone)]
pub struct Reconciler {
    catalog: Arc<OptionCatalog>,
}

impl Reconciler {
    pub fn new(catalog: Arc<OptionCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &OptionCatalog {
        &self.catalog
    }

    /// A starting configuration whose provider and version are the first
    /// catalog entries.
    pub fn initial_config(&self) -> VoiceAgentConfig {
        let mut config = VoiceAgentConfig::default();
        if let Some(provider) = self.catalog.provider_options().first() {
            config.model_provider = provider.to_string();
        }
        if let Some(patch) = self.reconcile_model_version(&config) {
            config.apply(patch);
        }
        config
    }

    /// If `model_version` is not offered by the current provider, return a
    /// patch replacing it with the provider's first version.
    ///
    /// Providers with an empty (or unknown) catalog entry leave the version
    /// alone; there is nothing valid to coerce to.
    pub fn reconcile_model_version(&self, config: &VoiceAgentConfig) -> Option<VoiceAgentPatch> {
        let versions = self.catalog.versions(&config.model_provider);
        let first = versions.first()?;
        if versions.contains(&config.model_version) {
            return None;
        }
        debug!(
            provider = %config.model_provider,
            stale = %config.model_version,
            replacement = %first,
            "Model version not offered by provider, coercing"
        );
        Some(VoiceAgentPatch::model_version(first.clone()))
    }

    /// Derived flag: show every option section only for voice chat agents.
    pub fn show_all_options(&self, agent_type: AgentType) -> bool {
        agent_type.shows_all_options()
    }

    /// Add or remove `tone`. Returns `None` when membership already matches.
    pub fn toggle_tone(
        &self,
        tones: &BTreeSet<Tone>,
        tone: Tone,
        member: bool,
    ) -> Option<BTreeSet<Tone>> {
        if tones.contains(&tone) == member {
            return None;
        }
        let mut next = tones.clone();
        if member {
            next.insert(tone);
        } else {
            next.remove(&tone);
        }
        Some(next)
    }

    /// Synthesize prompt details from the agent's function and tones.
    pub fn derive_prompt(&self, config: &VoiceAgentConfig) -> String {
        let function = config.agent_function.trim();
        let function = if function.is_empty() {
            DEFAULT_FUNCTION
        } else {
            function
        };
        let tones = if config.agent_tone.is_empty() {
            DEFAULT_TONE.to_string()
        } else {
            config
                .agent_tone
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "You are an AI voice assistant that {function}. \
             Your tone should be {tones}. \
             Keep responses concise and conversational, ask a clarifying question \
             when a request is ambiguous, and confirm important details before acting on them."
        )
    }

    /// Provider identifiers for a selectable list, in catalog order.
    pub fn provider_options(&self) -> Vec<String> {
        self.catalog
            .provider_options()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Trim free-text fields and canonicalize the agent address.
    pub fn normalize_email_patch(&self, mut patch: EmailAgentPatch) -> EmailAgentPatch {
        if let Some(name) = patch.company_name.as_mut() {
            *name = name.trim().to_string();
        }
        if let Some(address) = patch.agent_email.as_mut() {
            *address = address.trim().to_ascii_lowercase();
        }
        patch
    }
}

/// Applies user edits to the voice configuration and keeps it consistent.
pub struct VoiceAgentConfigurator {
    store: Arc<ConfigStore>,
    reconciler: Reconciler,
}

impl VoiceAgentConfigurator {
    pub fn new(store: Arc<ConfigStore>, reconciler: Reconciler) -> Self {
        Self { store, reconciler }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Merge a user patch. Any patch touching the provider or version is
    /// followed by version reconciliation in the same write.
    pub async fn update(&self, patch: VoiceAgentPatch) -> VoiceAgentConfig {
        let touches_model = patch.model_provider.is_some() || patch.model_version.is_some();
        let reconciler = &self.reconciler;
        self.store
            .update_voice_with(patch, |config| {
                if touches_model {
                    reconciler.reconcile_model_version(config)
                } else {
                    None
                }
            })
            .await
    }

    /// Set whether `tone` belongs to the tone set. Idempotent. The new set is
    /// computed from the config held under the write lock.
    pub async fn set_tone(&self, tone: Tone, member: bool) -> VoiceAgentConfig {
        let reconciler = &self.reconciler;
        self.store
            .update_voice_with(VoiceAgentPatch::default(), |config| {
                reconciler
                    .toggle_tone(&config.agent_tone, tone, member)
                    .map(|tones| VoiceAgentPatch {
                        agent_tone: Some(tones),
                        ..Default::default()
                    })
            })
            .await
    }

    /// Overwrite `prompt_details` with a prompt derived from the current
    /// function and tones.
    pub async fn generate_prompt(&self) -> VoiceAgentConfig {
        let reconciler = &self.reconciler;
        self.store
            .update_voice_with(VoiceAgentPatch::default(), |config| {
                Some(VoiceAgentPatch {
                    prompt_details: Some(reconciler.derive_prompt(config)),
                    ..Default::default()
                })
            })
            .await
    }

    pub async fn show_all_options(&self) -> bool {
        let agent_type = self.store.voice().await.agent_type;
        self.reconciler.show_all_options(agent_type)
    }

    pub fn provider_options(&self) -> Vec<String> {
        self.reconciler.provider_options()
    }
}

/// Applies user edits to the email configuration.
pub struct EmailAgentConfigurator {
    store: Arc<ConfigStore>,
    reconciler: Reconciler,
}

impl EmailAgentConfigurator {
    pub fn new(store: Arc<ConfigStore>, reconciler: Reconciler) -> Self {
        Self { store, reconciler }
    }

    pub async fn update(&self, patch: EmailAgentPatch) -> EmailAgentConfig {
        let patch = self.reconciler.normalize_email_patch(patch);
        self.store.update_email(patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProviderEntry;

    fn ab_catalog() -> Arc<OptionCatalog> {
        Arc::new(OptionCatalog::new(vec![
            ProviderEntry {
                provider: "A".into(),
                versions: vec!["a1".into(), "a2".into()],
            },
            ProviderEntry {
                provider: "B".into(),
                versions: vec!["b1".into()],
            },
            ProviderEntry {
                provider: "E".into(),
                versions: vec![],
            },
        ]))
    }

    fn configurator() -> (Arc<ConfigStore>, VoiceAgentConfigurator) {
        let reconciler = Reconciler::new(ab_catalog());
        let store = ConfigStore::new(reconciler.initial_config());
        let configurator = VoiceAgentConfigurator::new(Arc::clone(&store), reconciler);
        (store, configurator)
    }

    #[test]
    fn initial_config_uses_first_catalog_entry() {
        let config = Reconciler::new(ab_catalog()).initial_config();
        assert_eq!(config.model_provider, "A");
        assert_eq!(config.model_version, "a1");
    }

    #[tokio::test]
    async fn provider_change_replaces_orphaned_version() {
        let (store, configurator) = configurator();
        assert_eq!(store.voice().await.model_version, "a1");

        let updated = configurator.update(VoiceAgentPatch::model_provider("B")).await;
        assert_eq!(updated.model_provider, "B");
        assert_eq!(updated.model_version, "b1");
    }

    #[tokio::test]
    async fn valid_version_survives_provider_change() {
        let (_store, configurator) = configurator();
        configurator.update(VoiceAgentPatch::model_version("a2")).await;
        let updated = configurator.update(VoiceAgentPatch::model_provider("A")).await;
        assert_eq!(updated.model_version, "a2");
    }

    #[tokio::test]
    async fn version_always_member_after_any_provider_change() {
        let (_store, configurator) = configurator();
        let catalog = ab_catalog();
        for provider in ["B", "A", "B", "B", "A"] {
            let updated = configurator.update(VoiceAgentPatch::model_provider(provider)).await;
            assert!(catalog.versions(provider).contains(&updated.model_version));
        }
    }

    #[tokio::test]
    async fn unknown_version_is_coerced() {
        let (_store, configurator) = configurator();
        let updated = configurator.update(VoiceAgentPatch::model_version("zzz")).await;
        assert_eq!(updated.model_version, "a1");
    }

    #[tokio::test]
    async fn empty_catalog_entry_keeps_version() {
        let (_store, configurator) = configurator();
        let updated = configurator.update(VoiceAgentPatch::model_provider("E")).await;
        assert_eq!(updated.model_provider, "E");
        assert_eq!(updated.model_version, "a1");
    }

    #[tokio::test]
    async fn tone_toggle_is_idempotent() {
        let (_store, configurator) = configurator();
        let once = configurator.set_tone(Tone::Friendly, true).await;
        let twice = configurator.set_tone(Tone::Friendly, true).await;
        assert_eq!(once.agent_tone, twice.agent_tone);
        assert_eq!(twice.agent_tone.len(), 1);

        let removed = configurator.set_tone(Tone::Casual, false).await;
        assert_eq!(removed.agent_tone, twice.agent_tone);

        let removed = configurator.set_tone(Tone::Friendly, false).await;
        assert!(removed.agent_tone.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_tone_toggles_are_all_kept() {
        let (store, configurator) = configurator();
        let configurator = Arc::new(configurator);
        let tones = [
            Tone::Professional,
            Tone::Friendly,
            Tone::Casual,
            Tone::Empathetic,
            Tone::Enthusiastic,
            Tone::Formal,
        ];

        let handles: Vec<_> = tones
            .iter()
            .map(|&tone| {
                let configurator = Arc::clone(&configurator);
                tokio::spawn(async move { configurator.set_tone(tone, true).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let expected: BTreeSet<Tone> = tones.into_iter().collect();
        assert_eq!(store.voice().await.agent_tone, expected);
    }

    #[test]
    fn toggle_tone_reports_no_op() {
        let reconciler = Reconciler::new(ab_catalog());
        let tones: BTreeSet<Tone> = [Tone::Formal].into_iter().collect();
        assert!(reconciler.toggle_tone(&tones, Tone::Formal, true).is_none());
        assert!(reconciler.toggle_tone(&tones, Tone::Casual, false).is_none());
        assert_eq!(
            reconciler.toggle_tone(&tones, Tone::Casual, true).unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn generate_prompt_uses_defaults_when_empty() {
        let (_store, configurator) = configurator();
        let updated = configurator.generate_prompt().await;
        assert!(updated.prompt_details.contains("that helps users."));
        assert!(updated.prompt_details.contains("professional and helpful"));
    }

    #[tokio::test]
    async fn generate_prompt_overwrites_manual_text() {
        let (_store, configurator) = configurator();
        configurator
            .update(VoiceAgentPatch {
                agent_function: Some("books dental appointments".into()),
                prompt_details: Some("hand-written".into()),
                ..Default::default()
            })
            .await;
        configurator.set_tone(Tone::Friendly, true).await;
        configurator.set_tone(Tone::Empathetic, true).await;

        let updated = configurator.generate_prompt().await;
        assert!(!updated.prompt_details.contains("hand-written"));
        assert!(updated.prompt_details.contains("books dental appointments"));
        assert!(updated.prompt_details.contains("friendly, empathetic"));
    }

    #[tokio::test]
    async fn prompt_is_not_regenerated_on_field_change() {
        let (_store, configurator) = configurator();
        configurator.generate_prompt().await;
        let updated = configurator
            .update(VoiceAgentPatch {
                agent_function: Some("takes orders".into()),
                ..Default::default()
            })
            .await;
        assert!(!updated.prompt_details.contains("takes orders"));
    }

    #[tokio::test]
    async fn show_all_options_tracks_agent_type() {
        let (_store, configurator) = configurator();
        assert!(configurator.show_all_options().await);
        configurator
            .update(VoiceAgentPatch::agent_type(AgentType::InboundCalls))
            .await;
        assert!(!configurator.show_all_options().await);
        configurator
            .update(VoiceAgentPatch::agent_type(AgentType::VoiceChat))
            .await;
        assert!(configurator.show_all_options().await);
    }

    #[test]
    fn provider_options_in_order() {
        let reconciler = Reconciler::new(ab_catalog());
        assert_eq!(reconciler.provider_options(), vec!["A", "B", "E"]);
    }

    #[tokio::test]
    async fn email_patch_is_normalized() {
        let reconciler = Reconciler::new(ab_catalog());
        let store = ConfigStore::new(reconciler.initial_config());
        let configurator = EmailAgentConfigurator::new(Arc::clone(&store), reconciler);
        let updated = configurator
            .update(EmailAgentPatch {
                company_name: Some("  Acme  ".into()),
                agent_email: Some(" Support@Acme.COM ".into()),
                ..Default::default()
            })
            .await;
        assert_eq!(updated.company_name, "Acme");
        assert_eq!(updated.agent_email, "support@acme.com");
    }
}
