use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment, File};
use linkread::config::{FallbackConfig, ReaderConfig, Timeouts, DEFAULT_MAX_FILE_SIZE};
use linkread::providers::base::ProviderId;
use linkread::providers::configs::{default_model, CallPolicy, ProviderConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";
/// Loaded after [`CONFIG_FILE`], so its values win
pub const PRODUCTION_CONFIG_FILE: &str = "config.production.json";

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Credentials and endpoint of one backend. Everything is optional; a backend
/// without a key is simply left out of the fallback chains.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, alias = "apiKey", alias = "apikey")]
    pub api_key: Option<String>,
    #[serde(default, alias = "baseUrl", alias = "baseurl")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ProviderSettings {
    fn has_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    fn into_config(self, id: ProviderId) -> ProviderConfig {
        let mut config = ProviderConfig::new(id);
        if let Some(api_key) = self.api_key {
            config = config.with_api_key(api_key);
        }
        if let Some(base_url) = self.base_url.filter(|url| !url.trim().is_empty()) {
            config = config.with_host(base_url.trim_end_matches('/'));
        }
        if let Some(model) = self.model.filter(|model| !model.trim().is_empty()) {
            config = config.with_model(model);
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        config
    }
}

#[derive(Debug, Deserialize)]
pub struct FallbackSettings {
    #[serde(default = "default_true", alias = "useOCR", alias = "useocr")]
    pub use_ocr: bool,
    #[serde(
        default = "default_max_file_size",
        alias = "maxFileSize",
        alias = "maxfilesize"
    )]
    pub max_file_size: u64,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            use_ocr: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// All values in seconds
#[derive(Debug, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_download", alias = "downloadSecs", alias = "downloadsecs")]
    pub download_secs: u64,
    #[serde(
        default = "default_short_video",
        alias = "shortVideoSecs",
        alias = "shortvideosecs"
    )]
    pub short_video_secs: u64,
    #[serde(
        default = "default_provider_call",
        alias = "providerCallSecs",
        alias = "providercallsecs"
    )]
    pub provider_call_secs: u64,
    #[serde(
        default = "default_request_deadline",
        alias = "requestDeadlineSecs",
        alias = "requestdeadlinesecs"
    )]
    pub request_deadline_secs: u64,
    #[serde(
        default = "default_response_deadline",
        alias = "responseDeadlineSecs",
        alias = "responsedeadlinesecs"
    )]
    pub response_deadline_secs: u64,
    #[serde(
        default = "default_ping_interval",
        alias = "pingIntervalSecs",
        alias = "pingintervalsecs"
    )]
    pub ping_interval_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            download_secs: default_download(),
            short_video_secs: default_short_video(),
            provider_call_secs: default_provider_call(),
            request_deadline_secs: default_request_deadline(),
            response_deadline_secs: default_response_deadline(),
            ping_interval_secs: default_ping_interval(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub seed: ProviderSettings,
    #[serde(default, alias = "qwenLong", alias = "qwenlong")]
    pub qwen_long: ProviderSettings,
    #[serde(default)]
    pub qwen: ProviderSettings,
    #[serde(default)]
    pub glm4: ProviderSettings,
    #[serde(default)]
    pub volcengine: ProviderSettings,
    #[serde(default)]
    pub fallback: FallbackSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

impl Settings {
    /// Settings from the working directory and the environment
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."))
    }

    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .add_source(File::from(dir.join(CONFIG_FILE)).required(false))
            .add_source(File::from(dir.join(PRODUCTION_CONFIG_FILE)).required(false))
            .add_source(
                Environment::with_prefix("LINKREAD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = match config.try_deserialize() {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    return Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    });
                } else if let config::ConfigError::NotFound(field) = &err {
                    return Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    });
                }
                return Err(ConfigError::Other(err));
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    fn provider(&self, id: ProviderId) -> &ProviderSettings {
        match id {
            ProviderId::Seed => &self.seed,
            ProviderId::QwenLong => &self.qwen_long,
            ProviderId::Qwen => &self.qwen,
            ProviderId::Glm4 => &self.glm4,
            ProviderId::Volcengine => &self.volcengine,
        }
    }

    /// A backend with a key but no model anywhere cannot be called.
    fn validate(&self) -> Result<(), ConfigError> {
        for id in [ProviderId::Seed, ProviderId::Volcengine] {
            let settings = self.provider(id);
            let has_model = settings
                .model
                .as_deref()
                .is_some_and(|model| !model.trim().is_empty());
            if settings.has_key() && !has_model && default_model(id).is_none() {
                let section = match id {
                    ProviderId::Seed => "seed",
                    _ => "volcengine",
                };
                return Err(ConfigError::MissingEnvVar {
                    env_var: to_env_var(&format!("{section}.model")),
                });
            }
        }
        Ok(())
    }

    pub fn response_deadline(&self) -> Duration {
        Duration::from_secs(self.timeouts.response_deadline_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.timeouts.ping_interval_secs)
    }

    /// The immutable reader configuration handed to the library
    pub fn reader_config(&self) -> ReaderConfig {
        let providers = [
            ProviderId::Seed,
            ProviderId::QwenLong,
            ProviderId::Qwen,
            ProviderId::Glm4,
            ProviderId::Volcengine,
        ]
        .into_iter()
        .map(|id| self.provider(id).clone().into_config(id))
        .collect();

        let timeouts = &self.timeouts;
        ReaderConfig {
            providers,
            fallback: FallbackConfig {
                use_ocr: self.fallback.use_ocr,
                max_file_size: self.fallback.max_file_size,
            },
            timeouts: Timeouts {
                download: Duration::from_secs(timeouts.download_secs),
                short_video_page: Duration::from_secs(timeouts.short_video_secs),
                request_deadline: Duration::from_secs(timeouts.request_deadline_secs),
            },
            call_policy: CallPolicy {
                chat_timeout: Duration::from_secs(timeouts.provider_call_secs),
                ..CallPolicy::default()
            },
            ..ReaderConfig::default()
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    80
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_download() -> u64 {
    120
}

fn default_short_video() -> u64 {
    30
}

fn default_provider_call() -> u64 {
    90
}

fn default_request_deadline() -> u64 {
    170
}

fn default_response_deadline() -> u64 {
    180
}

fn default_ping_interval() -> u64 {
    30
}
