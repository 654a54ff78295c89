use std::time::Duration;
use thiserror::Error;

use crate::providers::base::{Capability, ProviderId};

/// Failures that happen before any content can be classified.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Invalid link: {0}")]
    InvalidTarget(String),

    #[error("Invalid data URL: {0}")]
    InvalidInlineData(String),

    #[error("Content is too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("Download timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Download failed with HTTP status {0}")]
    Status(u16),

    #[error("Download failed: {0}")]
    Network(String),
}

/// Failures of a single provider call.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{provider} does not support {capability} analysis")]
    Unsupported {
        provider: ProviderId,
        capability: Capability,
    },

    #[error("{provider} timed out during {phase} after {}s", .after.as_secs_f32())]
    Timeout {
        provider: ProviderId,
        phase: &'static str,
        after: Duration,
    },

    #[error("{provider}: {message}")]
    Http {
        provider: ProviderId,
        status: u16,
        message: String,
    },

    #[error("{provider} request failed: {message}")]
    Network { provider: ProviderId, message: String },

    #[error("{provider} returned an unexpected response: {message}")]
    MalformedResponse { provider: ProviderId, message: String },

    #[error("{provider} file upload failed: {message}")]
    Upload { provider: ProviderId, message: String },
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderError::Unsupported { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::Http { provider, .. }
            | ProviderError::Network { provider, .. }
            | ProviderError::MalformedResponse { provider, .. }
            | ProviderError::Upload { provider, .. } => *provider,
        }
    }

    /// Classify a transport error from reqwest.
    pub fn from_reqwest(
        provider: ProviderId,
        phase: &'static str,
        after: Duration,
        err: reqwest::Error,
    ) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout {
                provider,
                phase,
                after,
            }
        } else if err.is_decode() {
            ProviderError::MalformedResponse {
                provider,
                message: err.to_string(),
            }
        } else {
            ProviderError::Network {
                provider,
                message: err.to_string(),
            }
        }
    }
}

/// Internal extraction failure. Adapters turn it into placeholder text.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("{0}")]
    Parse(String),

    #[error("parser panicked")]
    Panicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_names_provider_and_phase() {
        let err = ProviderError::Timeout {
            provider: ProviderId::QwenLong,
            phase: "upload",
            after: Duration::from_secs(60),
        };
        assert!(err.is_timeout());
        assert_eq!(err.provider(), ProviderId::QwenLong);
        assert_eq!(err.to_string(), "qwenLong timed out during upload after 60s");
    }

    #[test]
    fn test_too_large_display() {
        let err = FetchError::TooLarge {
            size: 20,
            limit: 10,
        };
        assert_eq!(
            err.to_string(),
            "Content is too large: 20 bytes exceeds the 10 byte limit"
        );
    }
}
