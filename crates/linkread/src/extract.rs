//! Extraction adapters: bytes in, text plus metadata out.
//!
//! Adapters never fail. A parse error becomes placeholder text with
//! `succeeded == false`. Text providers still receive the placeholder.

pub mod image;
pub mod pdf;
pub mod short_video;
pub mod spreadsheet;
pub mod video;
pub mod webpage;
pub mod word;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use strum_macros::Display;

use crate::errors::ExtractError;
use crate::fetch::FetchedPayload;

/// Marker appended to text cut at a character cap
pub const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ExtractorKind {
    Webpage,
    Image,
    Pdf,
    Word,
    Spreadsheet,
    VideoStub,
    ShortVideoPage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub file_size_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<usize>,
    pub text_length: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// Output of one adapter run. Never mutated after it is produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub text: String,
    pub metadata: ExtractionMetadata,
    pub succeeded: bool,
}

impl ExtractionResult {
    pub fn new(text: String, mut metadata: ExtractionMetadata) -> Self {
        metadata.text_length = text.chars().count();
        Self {
            text,
            metadata,
            succeeded: true,
        }
    }

    pub fn placeholder(what: &str, payload: &FetchedPayload, err: &ExtractError) -> Self {
        tracing::warn!(source = %payload.source, error = %err, "{what} extraction failed");
        Self {
            text: format!("[{what} extraction failed: {err}]"),
            metadata: ExtractionMetadata {
                file_size_mb: payload.size_mb(),
                ..Default::default()
            },
            succeeded: false,
        }
    }

    /// Usable as input for a text-only provider. Placeholders count.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Real document text, good enough to return without a model
    pub fn is_readable(&self) -> bool {
        self.succeeded && self.has_text()
    }

    /// The placeholder text of a failed extraction
    pub fn failure_reason(&self) -> Option<&str> {
        (!self.succeeded).then_some(self.text.as_str())
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, payload: &FetchedPayload) -> ExtractionResult;
}

/// The default adapter for each kind
pub fn extractor_for(kind: ExtractorKind) -> Arc<dyn Extractor> {
    match kind {
        ExtractorKind::Webpage => Arc::new(webpage::WebpageExtractor::default()),
        ExtractorKind::Image => Arc::new(image::ImageExtractor),
        ExtractorKind::Pdf => Arc::new(pdf::PdfExtractor::default()),
        ExtractorKind::Word => Arc::new(word::WordExtractor),
        ExtractorKind::Spreadsheet => Arc::new(spreadsheet::SpreadsheetExtractor::default()),
        ExtractorKind::VideoStub => Arc::new(video::VideoStubExtractor),
        ExtractorKind::ShortVideoPage => Arc::new(short_video::ShortVideoExtractor),
    }
}

/// Cut `text` to `max_chars` characters and append [`TRUNCATION_MARKER`].
///
/// Applying it to its own output yields the same string.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        None => (text.to_string(), false),
        Some((cut, _)) => {
            let head = &text[..cut];
            if text[cut..] == *TRUNCATION_MARKER {
                (text.to_string(), false)
            } else {
                (format!("{head}{TRUNCATION_MARKER}"), true)
            }
        }
    }
}

/// Collapse every run of whitespace into one space
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run a blocking parser off the async runtime, containing panics.
pub(crate) async fn run_blocking<T, F>(bytes: Vec<u8>, parse: F) -> Result<T, ExtractError>
where
    T: Send + 'static,
    F: FnOnce(&[u8]) -> Result<T, ExtractError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| parse(&bytes)))
            .unwrap_or(Err(ExtractError::Panicked))
    })
    .await
    .unwrap_or(Err(ExtractError::Panicked))
}
