//! The fallback orchestrator.
//!
//! One call to [`Orchestrator::read`] fetches a link, classifies it and walks
//! the category's candidate chain strictly in order until one candidate
//! produces an answer. Failed, skipped and timed-out candidates are recorded
//! and reported, never raised.

pub mod candidates;
pub mod prompts;
pub mod report;

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::classifier::{classify, is_short_video_link, path_extension, ContentCategory};
use crate::config::ReaderConfig;
use crate::errors::{FetchError, ProviderError};
use crate::extract::image::image_mime_type;
use crate::extract::pdf::PdfExtractor;
use crate::extract::{extractor_for, ExtractionResult, Extractor, ExtractorKind};
use crate::fetch::{FetchedPayload, Fetcher, Target};
use crate::models::tool::ToolResponse;
use crate::providers::base::{Capability, Completion, DocumentInput, ImageInput, Provider};
use crate::providers::factory::ProviderRegistry;

pub use candidates::{Candidate, CandidateTable, Route};
pub use report::{
    Attempt, AttemptOutcome, PartialRead, ReadFailure, ReadOutcome, ReadState, ReadSuccess,
};

use candidates::ResolvedTable;

const OCR_NOTE: &str = "Note: text recognition for images relies on the vision providers above; \
     no local OCR engine is available. Configure a vision-capable provider or send the text \
     content instead.";

/// Everything one read needs while it walks the candidate chain
struct ReadContext<'a> {
    category: ContentCategory,
    payload: &'a FetchedPayload,
    prompt: Option<&'a str>,
    quick: bool,
    started: Instant,
    deadline: Instant,
}

pub struct Orchestrator {
    config: ReaderConfig,
    fetcher: Fetcher,
    table: ResolvedTable,
}

impl Orchestrator {
    /// Orchestrator over the standard candidate chains
    pub fn new(config: ReaderConfig, registry: &ProviderRegistry) -> Result<Self> {
        Self::with_table(config, registry, CandidateTable::standard())
    }

    pub fn with_table(
        config: ReaderConfig,
        registry: &ProviderRegistry,
        table: CandidateTable,
    ) -> Result<Self> {
        let fetcher = Fetcher::new(config.fallback.max_file_size)?;
        let table = ResolvedTable::resolve(&table, registry);
        Ok(Self {
            config,
            fetcher,
            table,
        })
    }

    /// Read `target` and render the outcome for the client.
    pub async fn read(&self, target: &str, prompt: Option<&str>) -> ToolResponse {
        let started = Instant::now();
        let outcome = self.run(target, prompt).await;
        tracing::info!(
            state = %outcome.state(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "read finished"
        );
        outcome.into_tool_response()
    }

    pub async fn run(&self, target: &str, prompt: Option<&str>) -> ReadOutcome {
        let started = Instant::now();
        let deadline = started + self.config.timeouts.request_deadline;

        tracing::debug!(state = %ReadState::Fetching, "reading link");
        let target = match Target::parse(target) {
            Ok(target) => target,
            Err(err) => return ReadOutcome::FetchFailed(err),
        };
        let source = target.describe();

        let (payload, category) = match target {
            Target::Inline(data) => match self.fetcher.accept_inline(data) {
                Ok(payload) => {
                    let category = classify(&payload.source, &payload.declared_content_type);
                    (payload, category)
                }
                Err(err) => {
                    tracing::warn!(source = %source, error = %err, "inline payload rejected");
                    return ReadOutcome::FetchFailed(err);
                }
            },
            Target::Remote(url) => match self.fetch_remote(&url).await {
                Ok(payload) => {
                    let category = classify(url.as_str(), &payload.declared_content_type);
                    (payload, category)
                }
                Err(err) => {
                    tracing::warn!(source = %source, error = %err, "fetch failed");
                    return ReadOutcome::FetchFailed(err);
                }
            },
        };

        tracing::info!(
            state = %ReadState::Classifying,
            source = %source,
            category = %category,
            size_mb = payload.size_mb(),
            "classified payload"
        );

        if category == ContentCategory::Unsupported {
            return ReadOutcome::Unsupported {
                source,
                declared: payload.declared_content_type.clone(),
            };
        }

        let quick = category == ContentCategory::Pdf
            && payload.bytes.len() > self.config.quick_pdf.threshold_bytes;
        let ctx = ReadContext {
            category,
            payload: &payload,
            prompt,
            quick,
            started,
            deadline,
        };

        if quick {
            return self.run_quick(&ctx).await;
        }

        match self.run_candidates(&ctx, HashMap::new()).await {
            Ok(success) => ReadOutcome::Succeeded(success),
            Err(mut failure) => {
                if category == ContentCategory::Image && self.config.fallback.use_ocr {
                    failure.notes.push(OCR_NOTE.to_string());
                }
                ReadOutcome::ExhaustedAllCandidates(failure)
            }
        }
    }

    async fn fetch_remote(&self, url: &Url) -> Result<FetchedPayload, FetchError> {
        let timeouts = &self.config.timeouts;
        let timeout = if is_short_video_link(url) {
            timeouts.short_video_page
        } else {
            timeouts.download
        };
        self.fetcher.fetch(url, timeout).await
    }

    /// Large PDFs: read the first pages only and answer with whatever that gives.
    async fn run_quick(&self, ctx: &ReadContext<'_>) -> ReadOutcome {
        let extractor = PdfExtractor::quick(&self.config.quick_pdf);
        let extraction = Arc::new(extractor.extract(ctx.payload).await);
        tracing::info!(
            pages = extraction.metadata.processed_pages.unwrap_or_default(),
            chars = extraction.metadata.text_length,
            "large PDF, using quick analysis"
        );

        if !extraction.is_readable() {
            return ReadOutcome::Partial(PartialRead {
                extraction,
                failure: None,
                elapsed: ctx.started.elapsed(),
            });
        }

        let cache = HashMap::from([(ExtractorKind::Pdf, extraction.clone())]);
        match self.run_candidates(ctx, cache).await {
            Ok(success) => ReadOutcome::Succeeded(success),
            Err(failure) => ReadOutcome::Partial(PartialRead {
                extraction,
                failure: Some(failure),
                elapsed: ctx.started.elapsed(),
            }),
        }
    }

    async fn run_candidates(
        &self,
        ctx: &ReadContext<'_>,
        mut extractions: HashMap<ExtractorKind, Arc<ExtractionResult>>,
    ) -> Result<ReadSuccess, ReadFailure> {
        let mut attempts = Vec::new();
        let mut last_error: Option<ProviderError> = None;
        let mut deadline_exceeded = false;

        for resolved in self.table.candidates(ctx.category) {
            let candidate = resolved.candidate;

            if ctx.quick
                && !matches!(
                    candidate.route,
                    Route::Analyze {
                        capability: Capability::Text,
                        ..
                    }
                )
            {
                continue;
            }
            if let Some(reason) = &resolved.unavailable {
                tracing::debug!(candidate = %candidate, reason = %reason, "skipping candidate");
                attempts.push(Attempt::skipped(candidate, reason.clone()));
                continue;
            }

            let remaining = ctx.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(category = %ctx.category, "request deadline reached");
                deadline_exceeded = true;
                break;
            }

            let extraction = match extractions.get(&candidate.extractor) {
                Some(extraction) => extraction.clone(),
                None => {
                    tracing::debug!(
                        state = %ReadState::Extracting,
                        extractor = %candidate.extractor,
                        "extracting"
                    );
                    let extraction =
                        Arc::new(extractor_for(candidate.extractor).extract(ctx.payload).await);
                    extractions.insert(candidate.extractor, extraction.clone());
                    extraction
                }
            };

            let (provider, capability) = match (candidate.route, &resolved.provider) {
                (Route::Direct, _) => {
                    if extraction.is_readable() {
                        return Ok(self.success(ctx, candidate, None, extraction, attempts));
                    }
                    let reason = extraction.failure_reason().unwrap_or("no text extracted");
                    attempts.push(Attempt::skipped(candidate, reason));
                    continue;
                }
                (Route::Analyze { capability, .. }, Some(provider)) => {
                    (provider.clone(), capability)
                }
                (Route::Analyze { .. }, None) => {
                    attempts.push(Attempt::skipped(candidate, "not configured"));
                    continue;
                }
            };

            let has_input = match capability {
                Capability::Text => extraction.has_text(),
                Capability::Image | Capability::Upload => !ctx.payload.bytes.is_empty(),
            };
            if !has_input {
                attempts.push(Attempt::skipped(candidate, "no text extracted"));
                continue;
            }

            let limit = match capability {
                Capability::Upload => self.config.call_policy.upload.budget(),
                Capability::Text | Capability::Image => self.config.call_policy.chat_timeout,
            };
            let budget = limit.min(remaining);

            tracing::info!(
                state = %ReadState::Analyzing,
                category = %ctx.category,
                candidate = %candidate,
                budget_ms = budget.as_millis() as u64,
                "trying candidate"
            );
            let attempt_started = Instant::now();
            match self
                .attempt(ctx, provider.as_ref(), capability, &extraction, budget)
                .await
            {
                Ok(completion) => {
                    tracing::info!(
                        candidate = %candidate,
                        elapsed_ms = attempt_started.elapsed().as_millis() as u64,
                        "candidate succeeded"
                    );
                    return Ok(self.success(ctx, candidate, Some(completion), extraction, attempts));
                }
                Err(err) => {
                    tracing::warn!(
                        candidate = %candidate,
                        elapsed_ms = attempt_started.elapsed().as_millis() as u64,
                        error = %err,
                        "candidate failed"
                    );
                    attempts.push(Attempt::failed(candidate, err.clone()));
                    last_error = Some(err);
                }
            }
        }

        tracing::warn!(
            state = %ReadState::ExhaustedAllCandidates,
            category = %ctx.category,
            attempts = attempts.len(),
            "no candidate produced an answer"
        );
        let mut notes: Vec<String> = extractions
            .values()
            .filter_map(|extraction| extraction.failure_reason())
            .map(|reason| format!("Extraction: {reason}"))
            .collect();
        notes.sort();
        notes.dedup();
        Err(ReadFailure {
            category: ctx.category,
            attempts,
            last_error,
            deadline_exceeded,
            notes,
        })
    }

    /// One provider call bounded by `budget`
    async fn attempt(
        &self,
        ctx: &ReadContext<'_>,
        provider: &dyn Provider,
        capability: Capability,
        extraction: &ExtractionResult,
        budget: Duration,
    ) -> Result<Completion, ProviderError> {
        let instructions = prompts::instructions(ctx.category, capability, ctx.prompt, ctx.quick);
        let payload = ctx.payload;

        let call = async {
            match capability {
                Capability::Text => provider.analyze_text(&extraction.text, &instructions).await,
                Capability::Image => {
                    let mime_type = image_mime_type(payload);
                    let image = ImageInput {
                        bytes: &payload.bytes,
                        mime_type: &mime_type,
                    };
                    provider.analyze_image(image, &instructions).await
                }
                Capability::Upload => {
                    let extension = document_extension(ctx.category, payload);
                    let document = DocumentInput {
                        bytes: &payload.bytes,
                        extension: &extension,
                    };
                    provider.analyze_via_upload(document, &instructions).await
                }
            }
        };

        match tokio::time::timeout(budget, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: provider.id(),
                phase: match capability {
                    Capability::Upload => "upload",
                    Capability::Text | Capability::Image => "analysis",
                },
                after: budget,
            }),
        }
    }

    fn success(
        &self,
        ctx: &ReadContext<'_>,
        candidate: Candidate,
        completion: Option<Completion>,
        extraction: Arc<ExtractionResult>,
        attempts: Vec<Attempt>,
    ) -> ReadSuccess {
        ReadSuccess {
            category: ctx.category,
            candidate,
            completion,
            extraction,
            attempts,
            elapsed: ctx.started.elapsed(),
            quick: ctx.quick,
        }
    }
}

/// File extension handed to upload-based providers
fn document_extension(category: ContentCategory, payload: &FetchedPayload) -> String {
    if let Some(ext) = Url::parse(&payload.source)
        .ok()
        .filter(|url| url.scheme() != "data")
        .and_then(|url| path_extension(&url))
    {
        return ext;
    }
    match category {
        ContentCategory::Pdf => "pdf",
        ContentCategory::Word if payload.declared_content_type.contains("msword") => "doc",
        ContentCategory::Word => "docx",
        ContentCategory::Spreadsheet if payload.declared_content_type.contains("ms-excel") => {
            "xls"
        }
        ContentCategory::Spreadsheet => "xlsx",
        _ => "bin",
    }
    .to_string()
}
