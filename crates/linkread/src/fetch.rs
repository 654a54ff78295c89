//! Turn a link into bytes.
//!
//! `data:` URLs are decoded in place; http(s) links are downloaded with a size
//! cap and a per-request timeout.

use base64::Engine;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::classifier::unwrap_image_search;
use crate::errors::FetchError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// What the client asked to read
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Inline(InlineData),
    Remote(Url),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineData {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let raw = raw.trim();
        if raw.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
            return decode_data_url(raw).map(Target::Inline);
        }

        let url = Url::parse(raw).map_err(|e| FetchError::InvalidTarget(format!("{raw}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidTarget(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }

        match unwrap_image_search(&url) {
            Some(image) => {
                tracing::info!(from = %url, to = %image, "following image search result");
                Ok(Target::Remote(image))
            }
            None => Ok(Target::Remote(url)),
        }
    }

    /// The link as it is shown in logs and reports. Inline payloads are abbreviated.
    pub fn describe(&self) -> String {
        match self {
            Target::Inline(data) => format!("data:{} ({} bytes)", data.media_type, data.bytes.len()),
            Target::Remote(url) => url.to_string(),
        }
    }
}

/// Bytes plus the content type the source declared
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPayload {
    pub source: String,
    pub bytes: Vec<u8>,
    pub declared_content_type: String,
}

impl FetchedPayload {
    pub fn from_inline(data: InlineData) -> Self {
        Self {
            source: format!("data:{}", data.media_type),
            declared_content_type: data.media_type,
            bytes: data.bytes,
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0 / 1024.0
    }
}

/// Decode `data:[<media type>][;params][;base64],<payload>`.
pub fn decode_data_url(raw: &str) -> Result<InlineData, FetchError> {
    let rest = raw
        .get(5..)
        .filter(|_| raw[..5].eq_ignore_ascii_case("data:"))
        .ok_or_else(|| FetchError::InvalidInlineData("missing data: prefix".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidInlineData("missing ',' separator".to_string()))?;
    if payload.is_empty() {
        return Err(FetchError::InvalidInlineData("empty payload".to_string()));
    }

    let mut params = header.split(';');
    let media_type = params
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("text/plain")
        .to_ascii_lowercase();
    let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| FetchError::InvalidInlineData(format!("bad base64 payload: {e}")))?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };

    Ok(InlineData { media_type, bytes })
}

/// Build a base64 `data:` URL.
pub fn encode_data_url(media_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        media_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Downloads remote content with a size cap
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    max_file_size: u64,
}

impl Fetcher {
    pub fn new(max_file_size: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            client,
            max_file_size,
        })
    }

    /// Inline payloads obey the same size cap as downloads.
    pub fn accept_inline(&self, data: InlineData) -> Result<FetchedPayload, FetchError> {
        let size = data.bytes.len() as u64;
        if size > self.max_file_size {
            return Err(FetchError::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(FetchedPayload::from_inline(data))
    }

    pub async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPayload, FetchError> {
        let started = std::time::Instant::now();
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        };

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let advertised = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(size) = advertised {
            if size > self.max_file_size {
                return Err(FetchError::TooLarge {
                    size,
                    limit: self.max_file_size,
                });
            }
        }

        let mut response = response;
        let mut bytes = Vec::with_capacity(advertised.unwrap_or(0) as usize);
        while let Some(chunk) = response.chunk().await.map_err(map_err)? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_file_size {
                return Err(FetchError::TooLarge {
                    size: bytes.len() as u64,
                    limit: self.max_file_size,
                });
            }
        }

        tracing::info!(
            url = %url,
            content_type = %declared,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "downloaded"
        );

        Ok(FetchedPayload {
            source: url.to_string(),
            bytes,
            declared_content_type: declared,
        })
    }
}
