use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

use crate::error::AppError;

/// Load every row of the first sheet of the workbook at `path`. The sources
/// mix legacy `.xls` and `.xlsx`, so the format is sniffed from the file.
pub fn load_sheet_rows(path: &Path) -> Result<Vec<Vec<Data>>, AppError> {
    if !path.is_file() {
        return Err(AppError::FileNotFound(path.to_path_buf()));
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AppError::SheetRead(format!("Failed to open {}: {}", path.display(), e)))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first_sheet = sheet_names
        .first()
        .ok_or_else(|| AppError::SheetMissing(path.display().to_string()))?
        .clone();

    tracing::info!("Reading sheet {} from {}", first_sheet, path.display());

    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| AppError::SheetRead(format!("Failed to read sheet {}: {}", first_sheet, e)))?;

    Ok(range.rows().map(|row| row.to_vec()).collect())
}
