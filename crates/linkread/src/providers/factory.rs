use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use strum::IntoEnumIterator;

use super::base::{Provider, ProviderId};
use super::configs::{CallPolicy, ProviderConfig};
use super::openai::OpenAiCompatibleProvider;

/// The providers that have credentials, keyed by id.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate every configured provider. Unconfigured ones are left out.
    pub fn from_configs(configs: &[ProviderConfig], policy: &CallPolicy) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            if !config.is_configured() {
                tracing::info!(provider = %config.id, "provider not configured, skipping");
                continue;
            }
            let provider = OpenAiCompatibleProvider::new(config.clone(), policy.clone())?;
            tracing::info!(
                provider = %config.id,
                host = %config.host,
                model = config.model.as_deref().unwrap_or_default(),
                "provider ready"
            );
            registry.insert(Arc::new(provider));
        }
        Ok(registry)
    }

    pub fn insert(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id(), provider);
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn Provider>> {
        self.providers.get(&id).cloned()
    }

    /// Configured provider ids in catalogue order
    pub fn configured(&self) -> Vec<ProviderId> {
        ProviderId::iter()
            .filter(|id| self.providers.contains_key(id))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
