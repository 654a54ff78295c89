use async_trait::async_trait;
use docx_rs::{
    DocumentChild, ParagraphChild, RunChild, TableCellContent, TableChild, TableRowChild,
};

use super::{run_blocking, ExtractionMetadata, ExtractionResult, Extractor};
use crate::errors::ExtractError;
use crate::fetch::FetchedPayload;

/// Text of `.docx` documents. Legacy `.doc` files end up as a placeholder.
pub struct WordExtractor;

#[async_trait]
impl Extractor for WordExtractor {
    async fn extract(&self, payload: &FetchedPayload) -> ExtractionResult {
        match run_blocking(payload.bytes.clone(), docx_text).await {
            Ok(text) => ExtractionResult::new(
                text,
                ExtractionMetadata {
                    file_type: Some("docx".to_string()),
                    file_size_mb: payload.size_mb(),
                    ..Default::default()
                },
            ),
            Err(err) => ExtractionResult::placeholder("Word document", payload, &err),
        }
    }
}

fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let doc = docx_rs::read_docx(bytes).map_err(|e| ExtractError::Parse(e.to_string()))?;

    let mut out = String::new();
    for child in &doc.document.children {
        match child {
            DocumentChild::Paragraph(para) => {
                push_paragraph(&para.children, &mut out);
                out.push('\n');
            }
            DocumentChild::Table(table) => {
                for row in &table.rows {
                    let TableChild::TableRow(tr) = row;
                    let mut cells = Vec::new();
                    for cell in &tr.cells {
                        let TableRowChild::TableCell(tc) = cell;
                        let mut cell_text = String::new();
                        for content in &tc.children {
                            if let TableCellContent::Paragraph(para) = content {
                                push_paragraph(&para.children, &mut cell_text);
                            }
                        }
                        cells.push(cell_text.trim().to_string());
                    }
                    out.push_str(&cells.join(" | "));
                    out.push('\n');
                }
            }
            _ => {}
        }
    }

    Ok(out
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn push_paragraph(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run(&run.children, out),
            ParagraphChild::Hyperlink(link) => {
                for inner in &link.children {
                    if let ParagraphChild::Run(run) = inner {
                        push_run(&run.children, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_run(children: &[RunChild], out: &mut String) {
    for child in children {
        match child {
            RunChild::Text(text) => out.push_str(&text.text),
            RunChild::Tab(_) => out.push('\t'),
            _ => {}
        }
    }
}
