use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::base::{
    Capabilities, Completion, DocumentInput, ImageInput, Instructions, Provider, ProviderId, Usage,
};

/// What a [`MockProvider`] does when it is called
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Respond(String),
    Fail(ProviderError),
    /// Sleep before answering, to exercise timeouts
    Delay(Duration, String),
}

/// A mock provider that returns a pre-configured outcome for testing
pub struct MockProvider {
    id: ProviderId,
    capabilities: Capabilities,
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
    last_input: Arc<std::sync::Mutex<Option<String>>>,
}

impl MockProvider {
    pub fn new(id: ProviderId, behavior: MockBehavior) -> Self {
        Self {
            id,
            capabilities: id.capabilities(),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            last_input: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Shared counter of calls, readable after the provider has been moved into a registry
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// The text or prompt of the most recent call
    pub fn last_input(&self) -> Arc<std::sync::Mutex<Option<String>>> {
        self.last_input.clone()
    }

    async fn respond(&self, input: String) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock().unwrap() = Some(input);
        let content = match &self.behavior {
            MockBehavior::Respond(content) => content.clone(),
            MockBehavior::Fail(err) => return Err(err.clone()),
            MockBehavior::Delay(delay, content) => {
                tokio::time::sleep(*delay).await;
                content.clone()
            }
        };
        Ok(Completion {
            provider: self.id,
            model: "mock-model".to_string(),
            content,
            usage: Usage::new(Some(1), Some(1), Some(2)),
        })
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn analyze_text(
        &self,
        text: &str,
        instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        self.respond(format!("{}\n\n{}", instructions.prompt, text))
            .await
    }

    async fn analyze_image(
        &self,
        _image: ImageInput<'_>,
        instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        self.respond(instructions.prompt.clone()).await
    }

    async fn analyze_via_upload(
        &self,
        _document: DocumentInput<'_>,
        instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        self.respond(instructions.prompt.clone()).await
    }
}
