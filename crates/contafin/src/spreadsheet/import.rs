//! Reads uploaded workbooks into a markdown rendering the assistant can
//! review.

use std::{fs, io::Write, path::Path};

use calamine::{Data, Reader, open_workbook_auto};
use serde::Serialize;
use tracing::{debug, warn};

use super::SpreadsheetError;

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["xlsx", "xls", "xlsm", "ods"];

/// Rows rendered per sheet, header included.
pub const MAX_ROWS_PER_SHEET: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct ImportedSheet {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub truncated: bool,
    #[serde(skip)]
    pub table: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportedWorkbook {
    pub file_name: String,
    pub sheets: Vec<ImportedSheet>,
}

impl ImportedWorkbook {
    /// Every sheet as a `## name` heading followed by its table.
    pub fn summary(&self) -> String {
        self.sheets
            .iter()
            .map(|sheet| {
                let mut section = format!("## {}\n\n{}", sheet.name, sheet.table);
                if sheet.truncated {
                    section.push_str(&format!(
                        "\n(mostrando {MAX_ROWS_PER_SHEET} de {} filas)\n",
                        sheet.rows
                    ));
                }
                section
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Lower-cased extension of `file_name` when it is a supported workbook type.
pub fn supported_extension(file_name: &str) -> Result<String, SpreadsheetError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(SpreadsheetError::UnsupportedFormat(file_name.to_string()))
    }
}

/// Spools `data` to a temporary file under `temp_dir` and reads it. The file
/// is removed when this returns.
pub fn import_bytes(
    file_name: &str,
    data: &[u8],
    temp_dir: &Path,
) -> Result<ImportedWorkbook, SpreadsheetError> {
    let extension = supported_extension(file_name)?;
    fs::create_dir_all(temp_dir)?;

    let mut spooled = tempfile::Builder::new()
        .prefix("contafin-import-")
        .suffix(&format!(".{extension}"))
        .tempfile_in(temp_dir)?;
    spooled.write_all(data)?;
    spooled.flush()?;
    debug!(path = ?spooled.path(), bytes = data.len(), "spooled upload");

    read_workbook(spooled.path(), file_name)
}

pub fn read_workbook(path: &Path, file_name: &str) -> Result<ImportedWorkbook, SpreadsheetError> {
    let mut workbook = open_workbook_auto(path)?;

    let mut sheets = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        match workbook.worksheet_range(&sheet_name) {
            Ok(range) => {
                let (rows, columns) = range.get_size();
                let mut table = String::new();
                let mut rendered = range.rows().take(MAX_ROWS_PER_SHEET);
                if let Some(header) = rendered.next() {
                    let header_cells: Vec<String> = header.iter().map(cell_to_string).collect();
                    push_row(&mut table, &header_cells);
                    let divider = vec!["---".to_string(); header_cells.len()];
                    push_row(&mut table, &divider);
                    for row in rendered {
                        let cells: Vec<String> = row.iter().map(cell_to_string).collect();
                        push_row(&mut table, &cells);
                    }
                }
                sheets.push(ImportedSheet {
                    name: sheet_name,
                    rows,
                    columns,
                    truncated: rows > MAX_ROWS_PER_SHEET,
                    table,
                });
            }
            Err(err) => warn!(sheet = %sheet_name, error = %err, "skipping unreadable sheet"),
        }
    }

    if sheets.is_empty() {
        return Err(SpreadsheetError::EmptyWorkbook);
    }

    Ok(ImportedWorkbook {
        file_name: file_name.to_string(),
        sheets,
    })
}

fn push_row(table: &mut String, cells: &[String]) {
    table.push_str("| ");
    table.push_str(&cells.join(" | "));
    table.push_str(" |\n");
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.replace('|', "\\|"),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}
