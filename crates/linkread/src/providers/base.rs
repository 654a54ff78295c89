use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::ProviderError;

/// The backends the reader knows how to talk to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ProviderId {
    Seed,
    QwenLong,
    Qwen,
    Glm4,
    Volcengine,
}

impl ProviderId {
    /// What the backend can be asked to do.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            ProviderId::Seed | ProviderId::Qwen => Capabilities::TEXT.with_image(),
            ProviderId::QwenLong => Capabilities::TEXT.with_upload(),
            ProviderId::Glm4 | ProviderId::Volcengine => Capabilities::TEXT,
        }
    }

    /// Human readable name used in response headers.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderId::Seed => "Seed",
            ProviderId::QwenLong => "Qwen-Long",
            ProviderId::Qwen => "Qwen-VL",
            ProviderId::Glm4 => "GLM-4",
            ProviderId::Volcengine => "Volcengine",
        }
    }
}

/// A single kind of analysis a provider may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Text,
    Image,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub text: bool,
    pub image: bool,
    pub upload: bool,
}

impl Capabilities {
    pub const TEXT: Capabilities = Capabilities {
        text: true,
        image: false,
        upload: false,
    };

    pub const fn with_image(mut self) -> Self {
        self.image = true;
        self
    }

    pub const fn with_upload(mut self) -> Self {
        self.upload = true;
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Text => self.text,
            Capability::Image => self.image,
            Capability::Upload => self.upload,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A successful analysis returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub provider: ProviderId,
    pub model: String,
    pub content: String,
    pub usage: Usage,
}

/// The system prompt and user instruction sent along with every analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Instructions {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Raw image bytes for a vision call.
#[derive(Debug, Clone, Copy)]
pub struct ImageInput<'a> {
    pub bytes: &'a [u8],
    pub mime_type: &'a str,
}

/// A whole document handed to an upload-capable backend.
#[derive(Debug, Clone, Copy)]
pub struct DocumentInput<'a> {
    pub bytes: &'a [u8],
    /// File extension without the dot, e.g. "pdf"
    pub extension: &'a str,
}

/// Base trait for AI backends.
///
/// Every method has a default that reports the capability as unsupported, so an
/// implementation only overrides what its [`Capabilities`] advertise.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> Capabilities {
        self.id().capabilities()
    }

    /// Analyse already extracted text.
    async fn analyze_text(
        &self,
        _text: &str,
        _instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        Err(self.unsupported(Capability::Text))
    }

    /// Analyse an image in its native format.
    async fn analyze_image(
        &self,
        _image: ImageInput<'_>,
        _instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        Err(self.unsupported(Capability::Image))
    }

    /// Upload a whole document, wait for the backend to ingest it, then analyse it by reference.
    async fn analyze_via_upload(
        &self,
        _document: DocumentInput<'_>,
        _instructions: &Instructions,
    ) -> Result<Completion, ProviderError> {
        Err(self.unsupported(Capability::Upload))
    }

    fn unsupported(&self, capability: Capability) -> ProviderError {
        ProviderError::Unsupported {
            provider: self.id(),
            capability,
        }
    }
}
