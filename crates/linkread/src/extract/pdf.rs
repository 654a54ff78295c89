use async_trait::async_trait;
use pdf_extract::{output_doc_page, Document, PlainTextOutput};

use super::{
    run_blocking, truncate_with_marker, ExtractionMetadata, ExtractionResult, Extractor,
};
use crate::config::QuickPdfLimits;
use crate::errors::ExtractError;
use crate::fetch::FetchedPayload;

/// Local PDF text extraction, optionally limited to the first pages
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor {
    pub max_pages: Option<usize>,
    pub max_chars: Option<usize>,
}

impl PdfExtractor {
    /// The first-pages mode used for large documents
    pub fn quick(limits: &QuickPdfLimits) -> Self {
        Self {
            max_pages: Some(limits.max_pages),
            max_chars: Some(limits.max_chars),
        }
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    async fn extract(&self, payload: &FetchedPayload) -> ExtractionResult {
        let max_pages = self.max_pages;
        let parsed = run_blocking(payload.bytes.clone(), move |bytes| {
            extract_pages(bytes, max_pages)
        })
        .await;
        let (pages, page_count) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => return ExtractionResult::placeholder("PDF text", payload, &err),
        };

        let processed = pages.len();
        let text = pages
            .iter()
            .map(|page| page.trim())
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let (text, truncated) = match self.max_chars {
            Some(max) => truncate_with_marker(&text, max),
            None => (text, false),
        };

        tracing::debug!(
            source = %payload.source,
            page_count,
            processed,
            chars = text.len(),
            "extracted PDF text"
        );

        ExtractionResult::new(
            text,
            ExtractionMetadata {
                file_type: Some("pdf".to_string()),
                file_size_mb: payload.size_mb(),
                page_count: Some(page_count),
                processed_pages: Some(processed),
                truncated: truncated || processed < page_count,
                ..Default::default()
            },
        )
    }
}

/// Text of the first `max_pages` pages (all when `None`) and the total page count.
/// Pages past the limit are never parsed.
fn extract_pages(
    bytes: &[u8],
    max_pages: Option<usize>,
) -> Result<(Vec<String>, usize), ExtractError> {
    let mut doc = Document::load_mem(bytes).map_err(parse_error)?;
    if doc.is_encrypted() {
        doc.decrypt("").map_err(parse_error)?;
    }

    let page_count = doc.get_pages().len();
    let wanted = max_pages.map_or(page_count, |k| k.min(page_count));
    let mut pages = Vec::with_capacity(wanted);
    for page_num in 1..=wanted as u32 {
        let mut text = String::new();
        {
            let mut output = PlainTextOutput::new(&mut text);
            output_doc_page(&doc, &mut output, page_num).map_err(parse_error)?;
        }
        pages.push(text);
    }
    Ok((pages, page_count))
}

fn parse_error(err: impl std::fmt::Display) -> ExtractError {
    ExtractError::Parse(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_garbage_yields_placeholder() {
        let payload = FetchedPayload {
            source: "https://example.com/a.pdf".to_string(),
            bytes: b"definitely not a pdf".to_vec(),
            declared_content_type: "application/pdf".to_string(),
        };
        let result = PdfExtractor::default().extract(&payload).await;
        assert!(!result.succeeded);
        assert!(!result.is_readable());
        assert!(result.text.starts_with("[PDF text extraction failed"));
        assert_eq!(result.failure_reason(), Some(result.text.as_str()));
    }

    /// A minimal PDF with one Helvetica line per page
    fn sample_pdf(pages: usize) -> Vec<u8> {
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {pages} >>",
                (0..pages)
                    .map(|i| format!("{} 0 R", 4 + 2 * i))
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];
        for i in 0..pages {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                5 + 2 * i
            ));
            let stream = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", i + 1);
            objects.push(format!(
                "<< /Length {} >>\nstream\n{stream}\nendstream",
                stream.len()
            ));
        }

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (n, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", n + 1).as_bytes());
        }
        let xref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        out
    }

    fn pdf_payload(bytes: Vec<u8>) -> FetchedPayload {
        FetchedPayload {
            source: "https://example.com/report.pdf".to_string(),
            bytes,
            declared_content_type: "application/pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn test_full_extraction_reads_every_page() {
        let result = PdfExtractor::default()
            .extract(&pdf_payload(sample_pdf(3)))
            .await;
        assert!(result.is_readable());
        assert_eq!(result.metadata.page_count, Some(3));
        assert_eq!(result.metadata.processed_pages, Some(3));
        assert!(result.text.contains("Page 3"));
    }

    #[test]
    fn test_page_limit_stops_parsing_early() {
        let (pages, page_count) = extract_pages(&sample_pdf(5), Some(2)).unwrap();
        assert_eq!(page_count, 5);
        assert_eq!(pages.len(), 2);
        assert!(pages[1].contains("Page 2"));
    }

    #[tokio::test]
    async fn test_quick_mode_reads_first_pages_only() {
        let limits = QuickPdfLimits {
            max_pages: 2,
            ..QuickPdfLimits::default()
        };
        let result = PdfExtractor::quick(&limits)
            .extract(&pdf_payload(sample_pdf(5)))
            .await;
        assert!(result.is_readable());
        assert_eq!(result.metadata.page_count, Some(5));
        assert_eq!(result.metadata.processed_pages, Some(2));
        assert!(result.metadata.truncated);
        assert!(result.text.contains("Page 1"));
        assert!(!result.text.contains("Page 3"));
    }

    #[test]
    fn test_quick_mode_limits() {
        let extractor = PdfExtractor::quick(&QuickPdfLimits::default());
        assert_eq!(extractor.max_pages, Some(3));
        assert_eq!(extractor.max_chars, Some(2000));
    }
}
