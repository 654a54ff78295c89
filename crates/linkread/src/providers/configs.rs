use std::path::PathBuf;
use std::time::Duration;

use super::base::ProviderId;

pub const DASHSCOPE_HOST: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const BIGMODEL_HOST: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const ARK_HOST: &str = "https://ark.cn-beijing.volces.com/api/v3";

pub const QWEN_MODEL: &str = "qwen-vl-plus";
pub const QWEN_LONG_MODEL: &str = "qwen-long";
pub const GLM4_MODEL: &str = "glm-4";

pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Connection details of one OpenAI-compatible backend
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub host: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: f32,
}

impl ProviderConfig {
    /// A config with the backend's default host and model and no credentials.
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            host: default_host(id).to_string(),
            api_key: None,
            model: default_model(id).map(str::to_string),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// A backend can only be called with a non-empty key and a model name.
    pub fn is_configured(&self) -> bool {
        let has_key = self
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        let has_model = self
            .model
            .as_deref()
            .is_some_and(|model| !model.trim().is_empty());
        has_key && has_model
    }
}

/// Timeouts applied to every call a provider makes
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    pub chat_timeout: Duration,
    pub upload: UploadPolicy,
    /// Where upload payloads are spooled before they are sent
    pub scratch_dir: PathBuf,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            chat_timeout: Duration::from_secs(90),
            upload: UploadPolicy::default(),
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Submit, poll and analyze limits of the file-upload flow
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub submit_timeout: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub status_timeout: Duration,
    pub analyze_timeout: Duration,
}

impl UploadPolicy {
    /// Worst case wall time of one upload attempt.
    pub fn budget(&self) -> Duration {
        self.submit_timeout
            + (self.poll_interval + self.status_timeout) * self.max_polls
            + self.analyze_timeout
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
            max_polls: 10,
            status_timeout: Duration::from_secs(15),
            analyze_timeout: Duration::from_secs(90),
        }
    }
}

pub fn default_host(id: ProviderId) -> &'static str {
    match id {
        ProviderId::Qwen | ProviderId::QwenLong => DASHSCOPE_HOST,
        ProviderId::Glm4 => BIGMODEL_HOST,
        ProviderId::Seed | ProviderId::Volcengine => ARK_HOST,
    }
}

/// Volcengine endpoints are per-account, so those have no default model.
pub fn default_model(id: ProviderId) -> Option<&'static str> {
    match id {
        ProviderId::Qwen => Some(QWEN_MODEL),
        ProviderId::QwenLong => Some(QWEN_LONG_MODEL),
        ProviderId::Glm4 => Some(GLM4_MODEL),
        ProviderId::Seed | ProviderId::Volcengine => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_without_key() {
        let config = ProviderConfig::new(ProviderId::Qwen);
        assert_eq!(config.host, DASHSCOPE_HOST);
        assert!(!config.is_configured());
        assert!(config.with_api_key("sk-test").is_configured());
    }

    #[test]
    fn test_blank_key_or_missing_model_is_unconfigured() {
        assert!(!ProviderConfig::new(ProviderId::Glm4)
            .with_api_key("   ")
            .is_configured());
        assert!(!ProviderConfig::new(ProviderId::Seed)
            .with_api_key("key")
            .is_configured());
        assert!(ProviderConfig::new(ProviderId::Seed)
            .with_api_key("key")
            .with_model("doubao-seed")
            .is_configured());
    }
}
