//! Workbook reader: the first worksheet as a header row plus body rows.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use tracing::debug;

use crate::spec::{EnumCellValue, SpecSheetRows};

/// Read the first worksheet of `path`.
///
/// The first used row is taken as the header. Date cells come back as
/// ISO `YYYY-MM-DD` text.
pub fn read_first_sheet(path: &Path) -> Result<SpecSheetRows, String> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|err| format!("Failed to open workbook {}: {err}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| format!("Workbook {} has no sheets.", path.display()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| format!("Failed to read sheet {sheet_name:?}: {err}"))?;

    let n_row_first = range.start().map_or(0, |(n_row, _)| n_row as usize);
    let mut iter_rows = range.rows();
    let headers: Vec<String> = iter_rows
        .next()
        .map(|row| {
            row.iter()
                .map(|cell| derive_cell_value_from_data(cell).as_text().unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();
    let rows: Vec<Vec<EnumCellValue>> = iter_rows
        .map(|row| row.iter().map(derive_cell_value_from_data).collect())
        .collect();

    debug!(
        "Read sheet {:?} from {}: {} header(s), {} row(s)",
        sheet_name,
        path.display(),
        headers.len(),
        rows.len()
    );

    Ok(SpecSheetRows {
        sheet_name,
        headers,
        rows,
        row_num_first_body: n_row_first + 2,
    })
}

fn derive_cell_value_from_data(cell: &Data) -> EnumCellValue {
    match cell {
        Data::Empty | Data::Error(_) => EnumCellValue::None,
        Data::String(val) if val.trim().is_empty() => EnumCellValue::None,
        Data::String(val) => EnumCellValue::String(val.trim().to_string()),
        Data::Float(val) => EnumCellValue::Number(*val),
        Data::Int(val) => EnumCellValue::Number(*val as f64),
        Data::Bool(val) => EnumCellValue::String(val.to_string()),
        Data::DateTime(val) => match val.as_datetime() {
            Some(dt) => EnumCellValue::String(dt.date().to_string()),
            None => EnumCellValue::Number(val.as_f64()),
        },
        Data::DateTimeIso(val) => {
            EnumCellValue::String(val.split('T').next().unwrap_or(val).to_string())
        }
        Data::DurationIso(val) => EnumCellValue::String(val.clone()),
    }
}
