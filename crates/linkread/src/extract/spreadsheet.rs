use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Reader};
use std::io::Cursor;

use super::{run_blocking, ExtractionMetadata, ExtractionResult, Extractor};
use crate::errors::ExtractError;
use crate::fetch::FetchedPayload;

pub const DEFAULT_MAX_ROWS: usize = 20;

/// One worksheet as rows of rendered cells; the first row is the header.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

pub struct SpreadsheetExtractor {
    /// Data rows rendered per sheet, not counting the header
    pub max_rows: usize,
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

#[async_trait]
impl Extractor for SpreadsheetExtractor {
    async fn extract(&self, payload: &FetchedPayload) -> ExtractionResult {
        let sheets = match run_blocking(payload.bytes.clone(), read_sheets).await {
            Ok(sheets) => sheets,
            Err(err) => return ExtractionResult::placeholder("Spreadsheet", payload, &err),
        };

        ExtractionResult::new(
            render_sheets(&sheets, self.max_rows),
            ExtractionMetadata {
                file_type: Some("spreadsheet".to_string()),
                file_size_mb: payload.size_mb(),
                sheets_count: Some(sheets.len()),
                sheet_names: Some(sheets.iter().map(|s| s.name.clone()).collect()),
                total_rows: Some(sheets.iter().map(|s| s.rows.len()).sum()),
                ..Default::default()
            },
        )
    }
}

fn read_sheets(bytes: &[u8]) -> Result<Vec<SheetTable>, ExtractError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ExtractError::Parse(e.to_string()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::Parse(format!("sheet {name}: {e}")))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        sheets.push(SheetTable { name, rows });
    }
    Ok(sheets)
}

/// Render sheets as text, at most `max_rows` data rows each.
pub fn render_sheets(sheets: &[SheetTable], max_rows: usize) -> String {
    let mut out = String::new();
    for (index, sheet) in sheets.iter().enumerate() {
        out.push_str(&format!("=== Sheet {}: {} ===\n", index + 1, sheet.name));

        let Some((header, data)) = sheet.rows.split_first() else {
            out.push_str("(empty sheet)\n\n");
            continue;
        };

        out.push_str(&format!("Header: {}\n", header.join(" | ")));
        for (n, row) in data.iter().take(max_rows).enumerate() {
            out.push_str(&format!("Row {}: {}\n", n + 1, row.join(" | ")));
        }
        if data.len() > max_rows {
            out.push_str(&format!("... ({} more rows)\n", data.len() - max_rows));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}
