use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{
    Capability, Completion, DocumentInput, ImageInput, Instructions, Provider, ProviderId,
};
use super::configs::{CallPolicy, ProviderConfig};
use super::utils::{image_to_openai_spec, map_http_status, openai_response_to_completion};
use crate::errors::ProviderError;

/// A backend that speaks the OpenAI chat completions protocol.
///
/// Every backend the reader uses exposes this protocol, so one implementation
/// covers all of them. Whether the Files API flow is available depends on the
/// capabilities of the configured [`ProviderId`].
pub struct OpenAiCompatibleProvider {
    pub(super) client: Client,
    pub(super) config: ProviderConfig,
    pub(super) policy: CallPolicy,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: ProviderConfig, policy: CallPolicy) -> Result<Self> {
        if !config.is_configured() {
            bail!("{} needs an API key and a model", config.id);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // hard ceiling, each call sets its own
            .build()?;

        Ok(Self {
            client,
            config,
            policy,
        })
    }

    pub(super) fn model(&self) -> &str {
        self.config.model.as_deref().unwrap_or_default()
    }

    pub(super) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.host.trim_end_matches('/'), path)
    }

    pub(super) fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
    }

    /// Send a request and hand back the JSON body of a successful response
    pub(super) async fn send_json(
        &self,
        request: RequestBuilder,
        phase: &'static str,
        timeout: Duration,
    ) -> Result<Value, ProviderError> {
        let id = self.config.id;
        let response = self
            .authorized(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(id, phase, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %id, %status, phase, "provider returned an error status");
            return Err(map_http_status(id, self.model(), status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(id, phase, timeout, e))
    }

    pub(super) async fn chat(
        &self,
        messages: Vec<Value>,
        max_tokens: u32,
        phase: &'static str,
        timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        let payload = json!({
            "model": self.model(),
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": max_tokens,
        });

        let request = self.client.post(self.url("chat/completions")).json(&payload);
        let response = self.send_json(request, phase, timeout).await?;
        openai_response_to_completion(self.config.id, self.model(), &response)
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn id(&self) -> ProviderId {
        self.config.id
    }

    async fn analyze_text(
        &self,
        text: &str,
        instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        let messages = vec![
            json!({"role": "system", "content": instructions.system}),
            json!({
                "role": "user",
                "content": format!("{}\n\n{}", instructions.prompt, text)
            }),
        ];
        self.chat(
            messages,
            instructions.max_tokens,
            "analysis",
            self.policy.chat_timeout,
        )
        .await
    }

    async fn analyze_image(
        &self,
        image: ImageInput<'_>,
        instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        if !self.capabilities().supports(Capability::Image) {
            return Err(self.unsupported(Capability::Image));
        }

        let messages = vec![
            json!({"role": "system", "content": instructions.system}),
            json!({
                "role": "user",
                "content": [
                    image_to_openai_spec(&image),
                    {"type": "text", "text": instructions.prompt}
                ]
            }),
        ];
        self.chat(
            messages,
            instructions.max_tokens,
            "image analysis",
            self.policy.chat_timeout,
        )
        .await
    }

    async fn analyze_via_upload(
        &self,
        document: DocumentInput<'_>,
        instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        if !self.capabilities().supports(Capability::Upload) {
            return Err(self.unsupported(Capability::Upload));
        }
        self.upload_and_analyze(document, instructions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::base::Usage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn instructions() -> Instructions {
        Instructions {
            system: "You are a document analyst.".to_string(),
            prompt: "Summarise this.".to_string(),
            max_tokens: 2000,
        }
    }

    fn provider_for(server: &MockServer, id: ProviderId) -> OpenAiCompatibleProvider {
        let config = ProviderConfig::new(id)
            .with_host(server.uri())
            .with_api_key("test_api_key")
            .with_model("test-model");
        OpenAiCompatibleProvider::new(config, CallPolicy::default()).unwrap()
    }

    fn completion_body(content: &str) -> Value {
        json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "model": "test-model",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 15, "total_tokens": 27}
        })
    }

    #[tokio::test]
    async fn test_analyze_text_basic() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Summary.")))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server, ProviderId::Glm4);
        let completion = provider.analyze_text("Body text", &instructions()).await?;

        assert_eq!(completion.content, "Summary.");
        assert_eq!(completion.provider, ProviderId::Glm4);
        assert_eq!(completion.usage, Usage::new(Some(12), Some(15), Some(27)));

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body)?;
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Summarise this.\n\nBody text");
        Ok(())
    }

    #[tokio::test]
    async fn test_analyze_image_sends_data_url() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("A cat.")))
            .mount(&server)
            .await;

        let provider = provider_for(&server, ProviderId::Qwen);
        let image = ImageInput {
            bytes: b"abc",
            mime_type: "image/jpeg",
        };
        let completion = provider.analyze_image(image, &instructions()).await?;
        assert_eq!(completion.content, "A cat.");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body)?;
        let parts = &body["messages"][1]["content"];
        assert_eq!(parts[0]["image_url"]["url"], "data:image/jpeg;base64,YWJj");
        assert_eq!(parts[1]["text"], "Summarise this.");
        Ok(())
    }

    #[tokio::test]
    async fn test_text_only_provider_rejects_image() {
        let server = MockServer::start().await;
        let provider = provider_for(&server, ProviderId::Volcengine);
        let image = ImageInput {
            bytes: b"abc",
            mime_type: "image/png",
        };
        let err = provider
            .analyze_image(image, &instructions())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::Unsupported {
                provider: ProviderId::Volcengine,
                capability: Capability::Image
            }
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_readable_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        let provider = provider_for(&server, ProviderId::Seed);
        let err = provider
            .analyze_text("text", &instructions())
            .await
            .unwrap_err();
        match err {
            ProviderError::Http {
                status, message, ..
            } => {
                assert_eq!(status, 401);
                assert!(message.contains("Authentication failed"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unmapped_status_is_http_error_n() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let provider = provider_for(&server, ProviderId::Qwen);
        let err = provider
            .analyze_text("text", &instructions())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "qwen: HTTP error 503: maintenance");
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = ProviderConfig::new(ProviderId::Glm4)
            .with_host(server.uri())
            .with_api_key("k")
            .with_model("m");
        let policy = CallPolicy {
            chat_timeout: Duration::from_millis(100),
            ..CallPolicy::default()
        };
        let provider = OpenAiCompatibleProvider::new(config, policy).unwrap();
        let err = provider
            .analyze_text("text", &instructions())
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
    }

    #[test]
    fn test_new_requires_credentials() {
        let config = ProviderConfig::new(ProviderId::Qwen);
        assert!(OpenAiCompatibleProvider::new(config, CallPolicy::default()).is_err());
    }
}
