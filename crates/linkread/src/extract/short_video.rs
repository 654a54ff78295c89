use async_trait::async_trait;
use scraper::{Html, Selector};

use super::webpage::visible_text;
use super::{collapse_whitespace, ExtractionMetadata, ExtractionResult, Extractor};
use crate::classifier::SHORT_VIDEO_PLATFORM;
use crate::fetch::FetchedPayload;

const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 200;
const MAX_EXCERPT_CHARS: usize = 500;

/// What a short-video share page says about its video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoPageInfo {
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub excerpt: String,
}

impl Default for VideoPageInfo {
    fn default() -> Self {
        Self {
            title: "Short video".to_string(),
            description: "Short video platform content".to_string(),
            keywords: "short video, social media".to_string(),
            excerpt: String::new(),
        }
    }
}

/// Reads the metadata of a short-video share page
pub struct ShortVideoExtractor;

#[async_trait]
impl Extractor for ShortVideoExtractor {
    async fn extract(&self, payload: &FetchedPayload) -> ExtractionResult {
        let html = String::from_utf8_lossy(&payload.bytes);
        let info = page_info(&html);

        let excerpt = if info.excerpt.is_empty() {
            "(none)"
        } else {
            info.excerpt.as_str()
        };
        let text = format!(
            "Platform: {SHORT_VIDEO_PLATFORM}\n\
             Title: {}\n\
             Description: {}\n\
             Keywords: {}\n\
             Link: {}\n\n\
             Page excerpt: {excerpt}",
            info.title, info.description, info.keywords, payload.source,
        );

        ExtractionResult::new(
            text,
            ExtractionMetadata {
                file_type: Some("short video page".to_string()),
                file_size_mb: payload.size_mb(),
                title: Some(info.title),
                ..Default::default()
            },
        )
    }
}

fn first_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub fn page_info(html: &str) -> VideoPageInfo {
    let document = Html::parse_document(html);
    let mut info = VideoPageInfo::default();

    let text_of = |css: &str| -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .next()
            .map(|e| collapse_whitespace(&e.text().collect::<String>()))
    };
    let attr_of = |css: &str| -> Option<String> {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|e| e.value().attr("content"))
            .map(collapse_whitespace)
    };

    let titles = [
        text_of("title"),
        attr_of("meta[property=\"og:title\"]"),
        attr_of("meta[name=\"title\"]"),
        text_of("h1"),
        text_of("[class*=\"title\"]"),
    ];
    if let Some(title) = titles.into_iter().flatten().find(|t| {
        t.chars().count() > 3 && !t.contains(SHORT_VIDEO_PLATFORM)
    }) {
        info.title = first_chars(&title, MAX_TITLE_CHARS);
    }

    let descriptions = [
        attr_of("meta[name=\"description\"]"),
        attr_of("meta[property=\"og:description\"]"),
        attr_of("meta[name=\"twitter:description\"]"),
        text_of("[class*=\"desc\"]"),
        text_of("p"),
    ];
    if let Some(description) = descriptions
        .into_iter()
        .flatten()
        .find(|d| d.chars().count() > 10)
    {
        info.description = first_chars(&description, MAX_DESCRIPTION_CHARS);
    }

    if let Some(keywords) = attr_of("meta[name=\"keywords\"]").filter(|k| !k.is_empty()) {
        info.keywords = keywords;
    }

    let body = Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next());
    if let Some(body) = body {
        info.excerpt = first_chars(&visible_text(body), MAX_EXCERPT_CHARS);
    }

    info
}
