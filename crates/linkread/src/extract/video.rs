use async_trait::async_trait;
use url::Url;

use super::{ExtractionMetadata, ExtractionResult, Extractor};
use crate::classifier::path_extension;
use crate::fetch::FetchedPayload;

/// Videos are never decoded. The adapter only describes the file so a text
/// model can give guidance about it.
pub struct VideoStubExtractor;

#[async_trait]
impl Extractor for VideoStubExtractor {
    async fn extract(&self, payload: &FetchedPayload) -> ExtractionResult {
        let format = video_format(payload);
        let text = format!(
            "Video file\n\
             - Format: {format}\n\
             - Size: {size:.2} MB\n\
             - Source: {source}\n\n\
             The video stream itself was not decoded; frame and audio analysis are not \
             available. Describe what can be inferred from the file information and \
             suggest how the viewer could get a transcript or summary.",
            size = payload.size_mb(),
            source = payload.source,
        );

        ExtractionResult::new(
            text,
            ExtractionMetadata {
                file_type: Some(format),
                file_size_mb: payload.size_mb(),
                ..Default::default()
            },
        )
    }
}

fn video_format(payload: &FetchedPayload) -> String {
    let declared = payload.declared_content_type.to_ascii_lowercase();
    let from_type = match declared.split(';').next().unwrap_or_default().trim() {
        "video/mp4" => Some("mp4"),
        "video/avi" | "video/x-msvideo" => Some("avi"),
        "video/quicktime" => Some("mov"),
        "video/x-matroska" => Some("mkv"),
        _ => None,
    };

    from_type
        .map(str::to_string)
        .or_else(|| {
            Url::parse(&payload.source)
                .ok()
                .and_then(|url| path_extension(&url))
        })
        .unwrap_or_else(|| "unknown".to_string())
}
