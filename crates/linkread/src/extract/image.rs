use async_trait::async_trait;

use super::{ExtractionMetadata, ExtractionResult, Extractor};
use crate::fetch::FetchedPayload;

/// Images go to vision models as-is; there is no text to pull out locally.
pub struct ImageExtractor;

#[async_trait]
impl Extractor for ImageExtractor {
    async fn extract(&self, payload: &FetchedPayload) -> ExtractionResult {
        ExtractionResult::new(
            String::new(),
            ExtractionMetadata {
                file_type: Some(image_mime_type(payload)),
                file_size_mb: payload.size_mb(),
                ..Default::default()
            },
        )
    }
}

/// Media type of an image payload, sniffed from its magic bytes when the source did not declare one
pub fn image_mime_type(payload: &FetchedPayload) -> String {
    let declared = payload
        .declared_content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if declared.starts_with("image/") {
        return declared;
    }

    let bytes = payload.bytes.as_slice();
    let sniffed = if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.starts_with(b"BM") {
        "image/bmp"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"<svg") || bytes.starts_with(b"<?xml") {
        "image/svg+xml"
    } else {
        "image/jpeg"
    };
    sniffed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(bytes: &[u8], declared: &str) -> FetchedPayload {
        FetchedPayload {
            source: "https://example.com/img".to_string(),
            bytes: bytes.to_vec(),
            declared_content_type: declared.to_string(),
        }
    }

    #[test]
    fn test_declared_type_wins() {
        assert_eq!(image_mime_type(&payload(b"GIF89a", "image/png")), "image/png");
    }

    #[test]
    fn test_sniffs_magic_bytes() {
        assert_eq!(
            image_mime_type(&payload(b"\x89PNG\r\n", "application/octet-stream")),
            "image/png"
        );
        assert_eq!(image_mime_type(&payload(b"GIF89a", "")), "image/gif");
    }

    #[tokio::test]
    async fn test_extract_has_no_text() {
        let result = ImageExtractor.extract(&payload(b"\xFF\xD8\xFF", "")).await;
        assert!(result.succeeded);
        assert!(!result.has_text());
        assert_eq!(result.metadata.file_type.as_deref(), Some("image/jpeg"));
    }
}
