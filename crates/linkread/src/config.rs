//! Immutable reader configuration, assembled once at startup.

use std::time::Duration;
use strum::IntoEnumIterator;

use crate::providers::base::ProviderId;
use crate::providers::configs::{CallPolicy, ProviderConfig};

/// Largest payload the reader downloads or decodes.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackConfig {
    pub use_ocr: bool,
    pub max_file_size: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            use_ocr: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeouts {
    pub download: Duration,
    pub short_video_page: Duration,
    /// Overall budget for one `read_link` call, shared by all candidates
    pub request_deadline: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            download: Duration::from_secs(120),
            short_video_page: Duration::from_secs(30),
            request_deadline: Duration::from_secs(170),
        }
    }
}

/// Thresholds of the quick path used for large PDFs
#[derive(Debug, Clone, PartialEq)]
pub struct QuickPdfLimits {
    pub threshold_bytes: usize,
    pub max_pages: usize,
    pub max_chars: usize,
}

impl Default for QuickPdfLimits {
    fn default() -> Self {
        Self {
            threshold_bytes: 1024 * 1024,
            max_pages: 3,
            max_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    pub providers: Vec<ProviderConfig>,
    pub fallback: FallbackConfig,
    pub timeouts: Timeouts,
    pub quick_pdf: QuickPdfLimits,
    pub call_policy: CallPolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            providers: ProviderId::iter().map(ProviderConfig::new).collect(),
            fallback: FallbackConfig::default(),
            timeouts: Timeouts::default(),
            quick_pdf: QuickPdfLimits::default(),
            call_policy: CallPolicy::default(),
        }
    }
}
