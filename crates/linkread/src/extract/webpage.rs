use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{
    collapse_whitespace, truncate_with_marker, ExtractionMetadata, ExtractionResult, Extractor,
};
use crate::fetch::FetchedPayload;

pub const DEFAULT_MAX_CHARS: usize = 5000;

/// Elements whose text is never part of the readable content
const SKIPPED_TAGS: &[&str] = &["script", "style", "nav", "footer", "aside", "noscript"];

/// Tried in order; the first match with enough text wins
const ARTICLE_SELECTORS: &[&str] = &[
    "article",
    "[role=\"main\"]",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    "main",
];

const MIN_ARTICLE_CHARS: usize = 100;

pub struct WebpageExtractor {
    pub max_chars: usize,
}

impl Default for WebpageExtractor {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

#[async_trait]
impl Extractor for WebpageExtractor {
    async fn extract(&self, payload: &FetchedPayload) -> ExtractionResult {
        let body = String::from_utf8_lossy(&payload.bytes);
        let is_html = payload.declared_content_type.contains("html")
            || body.trim_start().starts_with('<');

        let (title, content) = if is_html {
            let (title, content) = readable_content(&body);
            (Some(title), content)
        } else {
            (None, collapse_whitespace(&body))
        };

        let (content, truncated) = truncate_with_marker(&content, self.max_chars);
        let text = match &title {
            _ if content.is_empty() => String::new(),
            Some(title) => format!("Title: {title}\n\nContent:\n{content}"),
            None => format!("Content:\n{content}"),
        };

        ExtractionResult::new(
            text,
            ExtractionMetadata {
                file_type: Some("webpage".to_string()),
                file_size_mb: payload.size_mb(),
                title,
                truncated,
                ..Default::default()
            },
        )
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Title and cleaned main text of an HTML document
pub fn readable_content(html: &str) -> (String, String) {
    let document = Html::parse_document(html);

    let title = selector("title")
        .and_then(|s| {
            document
                .select(&s)
                .next()
                .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let mut content = String::new();
    for css in ARTICLE_SELECTORS {
        let Some(sel) = selector(css) else { continue };
        if let Some(element) = document.select(&sel).next() {
            content = visible_text(element);
            if content.chars().count() > MIN_ARTICLE_CHARS {
                break;
            }
        }
    }

    if content.is_empty() {
        let body = selector("body").and_then(|s| document.select(&s).next());
        content = visible_text(body.unwrap_or_else(|| document.root_element()));
    }

    (title, content)
}

/// Text of `element`, skipping anything nested in [`SKIPPED_TAGS`]
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    collapse_whitespace(&out)
}
