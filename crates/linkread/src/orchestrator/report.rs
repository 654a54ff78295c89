use std::sync::Arc;
use std::time::Duration;
use strum_macros::Display;

use super::candidates::Candidate;
use crate::classifier::ContentCategory;
use crate::errors::{FetchError, ProviderError};
use crate::extract::ExtractionResult;
use crate::models::tool::ToolResponse;
use crate::providers::base::Completion;

/// Stages a read passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ReadState {
    Fetching,
    Classifying,
    Extracting,
    Analyzing,
    Succeeded,
    ExhaustedAllCandidates,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Skipped(String),
    Failed(ProviderError),
}

/// A candidate that did not produce the answer
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub candidate: Candidate,
    pub outcome: AttemptOutcome,
}

impl Attempt {
    pub fn skipped<S: Into<String>>(candidate: Candidate, reason: S) -> Self {
        Self {
            candidate,
            outcome: AttemptOutcome::Skipped(reason.into()),
        }
    }

    pub fn failed(candidate: Candidate, err: ProviderError) -> Self {
        Self {
            candidate,
            outcome: AttemptOutcome::Failed(err),
        }
    }

    fn describe(&self) -> String {
        match &self.outcome {
            AttemptOutcome::Skipped(reason) => format!("- {}: skipped, {reason}", self.candidate),
            AttemptOutcome::Failed(err) => format!("- {}: failed, {err}", self.candidate),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadSuccess {
    pub category: ContentCategory,
    pub candidate: Candidate,
    /// `None` when the extracted text is itself the answer
    pub completion: Option<Completion>,
    pub extraction: Arc<ExtractionResult>,
    pub attempts: Vec<Attempt>,
    pub elapsed: Duration,
    pub quick: bool,
}

#[derive(Debug, Clone)]
pub struct ReadFailure {
    pub category: ContentCategory,
    pub attempts: Vec<Attempt>,
    pub last_error: Option<ProviderError>,
    pub deadline_exceeded: bool,
    pub notes: Vec<String>,
}

impl ReadFailure {
    pub fn timed_out(&self) -> bool {
        self.deadline_exceeded || self.last_error.as_ref().is_some_and(ProviderError::is_timeout)
    }
}

/// A large PDF whose quick analysis could not be completed
#[derive(Debug, Clone)]
pub struct PartialRead {
    pub extraction: Arc<ExtractionResult>,
    pub failure: Option<ReadFailure>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum ReadOutcome {
    Succeeded(ReadSuccess),
    Partial(PartialRead),
    ExhaustedAllCandidates(ReadFailure),
    FetchFailed(FetchError),
    Unsupported { source: String, declared: String },
}

impl ReadOutcome {
    pub fn state(&self) -> ReadState {
        match self {
            ReadOutcome::Succeeded(_) | ReadOutcome::Partial(_) => ReadState::Succeeded,
            ReadOutcome::ExhaustedAllCandidates(_) => ReadState::ExhaustedAllCandidates,
            ReadOutcome::FetchFailed(_) => ReadState::Fetching,
            ReadOutcome::Unsupported { .. } => ReadState::Classifying,
        }
    }

    pub fn into_tool_response(self) -> ToolResponse {
        match self {
            ReadOutcome::Succeeded(success) => ToolResponse::success(render_success(&success)),
            ReadOutcome::Partial(partial) => ToolResponse::success(render_partial(&partial)),
            ReadOutcome::ExhaustedAllCandidates(failure) => {
                ToolResponse::error(render_failure(&failure))
            }
            ReadOutcome::FetchFailed(err) => {
                ToolResponse::error(format!("Could not fetch the link: {err}"))
            }
            ReadOutcome::Unsupported { source, declared } => {
                let declared = if declared.is_empty() {
                    "unknown"
                } else {
                    declared.as_str()
                };
                ToolResponse::error(format!(
                    "Unsupported content type '{declared}' for {source}. Supported: web pages, \
                     images, PDF, Word, Excel, video files and short-video links."
                ))
            }
        }
    }
}

fn metadata_json(extraction: &ExtractionResult) -> String {
    serde_json::to_string_pretty(&extraction.metadata).unwrap_or_default()
}

fn quick_banner(extraction: &ExtractionResult) -> String {
    let meta = &extraction.metadata;
    let pages = match (meta.processed_pages, meta.page_count) {
        (Some(processed), Some(total)) => format!("the first {processed} of {total} pages"),
        _ => "the first pages".to_string(),
    };
    format!(
        "Quick analysis (partial): the document is {:.2} MB, so only {pages} were read.",
        meta.file_size_mb,
    )
}

fn render_success(success: &ReadSuccess) -> String {
    let Some(completion) = &success.completion else {
        return success.extraction.text.clone();
    };

    let mut out = String::new();
    if success.quick {
        out.push_str(&quick_banner(&success.extraction));
        out.push_str("\n\n");
    }
    out.push_str(&format!(
        "{} {} analysis:\n\n{}\n\n---\nModel: {} ({})\n",
        completion.provider.label(),
        success.category,
        completion.content.trim(),
        completion.model,
        completion.provider,
    ));
    if let Ok(usage) = serde_json::to_string(&completion.usage) {
        out.push_str(&format!("Usage: {usage}\n"));
    }
    out.push_str(&format!(
        "Document info: {}\n",
        metadata_json(&success.extraction)
    ));
    if !success.attempts.is_empty() {
        out.push_str("Earlier candidates:\n");
        for attempt in &success.attempts {
            out.push_str(&attempt.describe());
            out.push('\n');
        }
    }
    out.push_str(&format!(
        "Processing time: {} ms",
        success.elapsed.as_millis()
    ));
    out
}

fn render_partial(partial: &PartialRead) -> String {
    let extraction = &partial.extraction;
    let mut out = quick_banner(extraction);
    out.push_str("\n\n");

    if extraction.is_readable() {
        if let Some(err) = partial.failure.as_ref().and_then(|f| f.last_error.as_ref()) {
            out.push_str(&format!("AI analysis failed: {err}\n\n"));
        } else {
            out.push_str("No AI provider is available for this document.\n\n");
        }
        out.push_str(&format!("Text preview:\n{}\n\n", extraction.text));
    } else if let Some(reason) = extraction.failure_reason() {
        out.push_str(&format!("The first pages could not be read: {reason}\n\n"));
    } else {
        out.push_str(
            "No text could be extracted from the first pages. The document may consist of \
             scanned images.\n\n",
        );
    }

    out.push_str(&format!(
        "Document info: {}\nProcessing time: {} ms",
        metadata_json(extraction),
        partial.elapsed.as_millis()
    ));
    out
}

fn render_failure(failure: &ReadFailure) -> String {
    let category = failure.category;
    let mut out = if failure.timed_out() {
        format!("Reading this {category} content timed out.")
    } else {
        format!("Could not read this {category} content.")
    };

    match &failure.last_error {
        Some(err) => out.push_str(&format!("\nLast error: {err}")),
        None if failure.deadline_exceeded => {
            out.push_str("\nLast error: the request deadline passed before a provider could answer")
        }
        None if failure
            .attempts
            .iter()
            .all(|a| matches!(&a.outcome, AttemptOutcome::Skipped(r) if r == "not configured")) =>
        {
            out.push_str(&format!(
                "\nLast error: no AI provider is configured for {category} content"
            ))
        }
        None => out.push_str("\nLast error: no readable content was extracted"),
    }

    if !failure.attempts.is_empty() {
        out.push_str("\nAttempts:");
        for attempt in &failure.attempts {
            out.push('\n');
            out.push_str(&attempt.describe());
        }
    }
    for note in &failure.notes {
        out.push_str("\n\n");
        out.push_str(note);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractionMetadata, ExtractorKind};
    use crate::providers::base::{ProviderId, Usage};

    fn failure(last_error: Option<ProviderError>) -> ReadFailure {
        ReadFailure {
            category: ContentCategory::Word,
            attempts: vec![Attempt::skipped(
                Candidate::text(ExtractorKind::Word, ProviderId::Glm4),
                "not configured",
            )],
            last_error,
            deadline_exceeded: false,
            notes: vec![],
        }
    }

    #[test]
    fn test_failure_names_category_and_reason() {
        let response = ReadOutcome::ExhaustedAllCandidates(failure(None)).into_tool_response();
        assert!(response.is_error);
        let text = response.text();
        assert!(text.starts_with("Could not read this Word content."));
        assert!(text.contains("no AI provider is configured for Word content"));
        assert!(text.contains("- glm4 (text): skipped, not configured"));
    }

    #[test]
    fn test_timeout_failure_is_distinguished() {
        let err = ProviderError::Timeout {
            provider: ProviderId::Qwen,
            phase: "analysis",
            after: Duration::from_secs(90),
        };
        let text = ReadOutcome::ExhaustedAllCandidates(failure(Some(err)))
            .into_tool_response()
            .text();
        assert!(text.starts_with("Reading this Word content timed out."));
        assert!(text.contains("qwen timed out during analysis after 90s"));
    }

    #[test]
    fn test_success_header_and_usage() {
        let success = ReadSuccess {
            category: ContentCategory::Image,
            candidate: Candidate::image(ProviderId::Qwen),
            completion: Some(Completion {
                provider: ProviderId::Qwen,
                model: "qwen-vl-plus".to_string(),
                content: "A red bicycle.".to_string(),
                usage: Usage::new(Some(1), Some(2), Some(3)),
            }),
            extraction: Arc::new(ExtractionResult::new(
                String::new(),
                ExtractionMetadata::default(),
            )),
            attempts: vec![],
            elapsed: Duration::from_millis(42),
            quick: false,
        };
        let response = ReadOutcome::Succeeded(success).into_tool_response();
        assert!(!response.is_error);
        let text = response.text();
        assert!(text.starts_with("Qwen-VL image analysis:\n\nA red bicycle."));
        assert!(text.contains("\"total_tokens\":3"));
        assert!(text.ends_with("Processing time: 42 ms"));
    }

    #[test]
    fn test_failure_lists_extraction_notes() {
        let mut failure = failure(None);
        failure.notes = vec!["Extraction: [PDF text extraction failed: bad xref]".to_string()];
        let text = ReadOutcome::ExhaustedAllCandidates(failure)
            .into_tool_response()
            .text();
        assert!(text.ends_with("\n\nExtraction: [PDF text extraction failed: bad xref]"));
    }

    #[test]
    fn test_partial_names_extraction_failure() {
        let extraction = ExtractionResult {
            text: "[PDF text extraction failed: bad xref]".to_string(),
            metadata: ExtractionMetadata::default(),
            succeeded: false,
        };
        let partial = PartialRead {
            extraction: Arc::new(extraction),
            failure: None,
            elapsed: Duration::from_millis(5),
        };
        let text = ReadOutcome::Partial(partial).into_tool_response().text();
        assert!(text.starts_with("Quick analysis (partial)"));
        assert!(text.contains("could not be read: [PDF text extraction failed: bad xref]"));
    }

    #[test]
    fn test_unsupported_response() {
        let response = ReadOutcome::Unsupported {
            source: "https://example.com/a.zip".to_string(),
            declared: "application/zip".to_string(),
        }
        .into_tool_response();
        assert!(response.is_error);
        assert!(response.text().contains("'application/zip'"));
    }
}
