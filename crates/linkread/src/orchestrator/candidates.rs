use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::classifier::ContentCategory;
use crate::extract::ExtractorKind;
use crate::providers::base::{Capability, Provider, ProviderId};
use crate::providers::factory::ProviderRegistry;

/// Where the output of an extractor goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The extracted text is the answer
    Direct,
    Analyze {
        provider: ProviderId,
        capability: Capability,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub extractor: ExtractorKind,
    pub route: Route,
}

impl Candidate {
    pub const fn direct(extractor: ExtractorKind) -> Self {
        Self {
            extractor,
            route: Route::Direct,
        }
    }

    pub const fn text(extractor: ExtractorKind, provider: ProviderId) -> Self {
        Self::analyze(extractor, provider, Capability::Text)
    }

    pub const fn image(provider: ProviderId) -> Self {
        Self::analyze(ExtractorKind::Image, provider, Capability::Image)
    }

    pub const fn upload(extractor: ExtractorKind, provider: ProviderId) -> Self {
        Self::analyze(extractor, provider, Capability::Upload)
    }

    const fn analyze(extractor: ExtractorKind, provider: ProviderId, capability: Capability) -> Self {
        Self {
            extractor,
            route: Route::Analyze {
                provider,
                capability,
            },
        }
    }

    pub fn provider(&self) -> Option<ProviderId> {
        match self.route {
            Route::Direct => None,
            Route::Analyze { provider, .. } => Some(provider),
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.route {
            Route::Direct => write!(f, "{} (local)", self.extractor),
            Route::Analyze {
                provider,
                capability,
            } => write!(f, "{provider} ({capability})"),
        }
    }
}

/// Ordered fallback candidates per category
#[derive(Debug, Clone, Default)]
pub struct CandidateTable {
    entries: HashMap<ContentCategory, Vec<Candidate>>,
}

impl CandidateTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: ContentCategory, candidates: Vec<Candidate>) -> Self {
        self.entries.insert(category, candidates);
        self
    }

    pub fn candidates(&self, category: ContentCategory) -> &[Candidate] {
        self.entries
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn standard() -> Self {
        use ExtractorKind as E;
        use ProviderId::*;

        Self::empty()
            .with(ContentCategory::Webpage, vec![Candidate::direct(E::Webpage)])
            .with(
                ContentCategory::Image,
                vec![Candidate::image(Qwen), Candidate::image(Seed)],
            )
            .with(
                ContentCategory::Pdf,
                vec![
                    Candidate::text(E::Pdf, Seed),
                    Candidate::upload(E::Pdf, QwenLong),
                    Candidate::text(E::Pdf, Qwen),
                    Candidate::text(E::Pdf, Volcengine),
                    Candidate::text(E::Pdf, Glm4),
                ],
            )
            .with(
                ContentCategory::Word,
                vec![
                    Candidate::text(E::Word, Glm4),
                    Candidate::text(E::Word, Qwen),
                    Candidate::text(E::Word, Volcengine),
                ],
            )
            .with(
                ContentCategory::Spreadsheet,
                vec![
                    Candidate::text(E::Spreadsheet, Qwen),
                    Candidate::text(E::Spreadsheet, Glm4),
                ],
            )
            .with(
                ContentCategory::Video,
                vec![
                    Candidate::text(E::VideoStub, Seed),
                    Candidate::text(E::VideoStub, Qwen),
                ],
            )
            .with(
                ContentCategory::ShortVideoLink,
                vec![
                    Candidate::text(E::ShortVideoPage, Seed),
                    Candidate::text(E::ShortVideoPage, Qwen),
                    Candidate::text(E::ShortVideoPage, Glm4),
                ],
            )
            .with(ContentCategory::Unsupported, vec![])
    }
}

/// A candidate paired with the provider that will serve it, or the reason it cannot run
#[derive(Clone)]
pub(crate) struct ResolvedCandidate {
    pub candidate: Candidate,
    pub provider: Option<Arc<dyn Provider>>,
    pub unavailable: Option<String>,
}

/// The candidate table bound to the configured providers. Built once at startup.
#[derive(Clone, Default)]
pub(crate) struct ResolvedTable {
    entries: HashMap<ContentCategory, Vec<ResolvedCandidate>>,
}

impl ResolvedTable {
    pub fn resolve(table: &CandidateTable, registry: &ProviderRegistry) -> Self {
        let mut entries = HashMap::new();
        for (category, candidates) in &table.entries {
            let resolved = candidates
                .iter()
                .map(|candidate| resolve_one(*candidate, registry))
                .collect::<Vec<_>>();

            let live = resolved.iter().filter(|r| r.unavailable.is_none()).count();
            tracing::info!(
                category = %category,
                candidates = resolved.len(),
                live,
                "resolved fallback chain"
            );
            entries.insert(*category, resolved);
        }
        Self { entries }
    }

    pub fn candidates(&self, category: ContentCategory) -> &[ResolvedCandidate] {
        self.entries
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn resolve_one(candidate: Candidate, registry: &ProviderRegistry) -> ResolvedCandidate {
    let Route::Analyze {
        provider: id,
        capability,
    } = candidate.route
    else {
        return ResolvedCandidate {
            candidate,
            provider: None,
            unavailable: None,
        };
    };

    match registry.get(id) {
        None => ResolvedCandidate {
            candidate,
            provider: None,
            unavailable: Some("not configured".to_string()),
        },
        Some(provider) if !provider.capabilities().supports(capability) => ResolvedCandidate {
            candidate,
            provider: None,
            unavailable: Some(format!("does not support {capability} analysis")),
        },
        Some(provider) => ResolvedCandidate {
            candidate,
            provider: Some(provider),
            unavailable: None,
        },
    }
}
