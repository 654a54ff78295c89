use async_trait::async_trait;
use linkread::models::tool::ToolResponse;
use linkread::orchestrator::Orchestrator;
use std::sync::Arc;
use std::time::Duration;

use linkread::config::DEFAULT_MAX_FILE_SIZE;

use crate::sessions::SessionRegistry;

/// Room for the envelope around a base64 payload
const BODY_HEADROOM: u64 = 64 * 1024;

/// Largest POST body that can carry an inline payload of `max_file_size` bytes
pub fn body_limit_for(max_file_size: u64) -> usize {
    let encoded = max_file_size.saturating_mul(4).div_ceil(3);
    usize::try_from(encoded.saturating_add(BODY_HEADROOM)).unwrap_or(usize::MAX)
}

/// Whatever answers `read_link` calls
#[async_trait]
pub trait LinkReader: Send + Sync {
    async fn read(&self, url: &str, prompt: Option<&str>) -> ToolResponse;
}

#[async_trait]
impl LinkReader for Orchestrator {
    async fn read(&self, url: &str, prompt: Option<&str>) -> ToolResponse {
        Orchestrator::read(self, url, prompt).await
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<dyn LinkReader>,
    pub sessions: SessionRegistry,
    /// Upper bound on one `tools/call`, after which the client gets an error result
    pub response_deadline: Duration,
    pub ping_interval: Duration,
    pub body_limit: usize,
}

impl AppState {
    pub fn new(reader: Arc<dyn LinkReader>) -> Self {
        Self {
            reader,
            sessions: SessionRegistry::default(),
            response_deadline: Duration::from_secs(180),
            ping_interval: Duration::from_secs(30),
            body_limit: body_limit_for(DEFAULT_MAX_FILE_SIZE),
        }
    }

    pub fn with_response_deadline(mut self, deadline: Duration) -> Self {
        self.response_deadline = deadline;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }
}
