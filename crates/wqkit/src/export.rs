//! Pivot workbook rendering: one titled, bordered XLSX sheet per pivot sheet.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use polars::prelude::{Column, DataFrame, NamedFrom, PolarsError};
use thiserror::Error;
use tracing::{info, instrument, warn};
use wqkit_io_xlsx::{
    EnumCellValue, SpecCellFormat, SpecXlsxReport, SpecXlsxTableOptions, XlsxWriter,
    derive_default_xlsx_formats, derive_default_xlsx_write_options,
};
use wqkit_record::conf::C_LABEL_DATE;
use wqkit_record::{
    DuplicateDayError, EnumPivotColumn, EnumSheetOrder, RecordSource, SpecPivotSheet,
    SpecPivotWorkbook, build_workbook_ordered,
};

/// Number format of the average column.
pub const C_NUM_FORMAT_AVERAGE: &str = "0.00";

const N_WIDTH_COL_LABEL: f64 = 14.0;
const N_WIDTH_COL_DAY: f64 = 7.0;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("nothing to export: no site has measurements")]
    EmptyWorkbook,

    #[error("nothing to export: every site with measurements failed ({} site(s))", .0.len())]
    AllSitesFailed(Vec<DuplicateDayError>),

    #[error("failed to build sheet frame: {0}")]
    Frame(#[from] PolarsError),

    #[error("{0}")]
    Xlsx(String),
}

/// Outcome of one export run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecExportReport {
    pub path: PathBuf,
    /// Sheet names as written, in workbook order.
    pub sheet_names: Vec<String>,
    /// Sites left out of the workbook.
    pub failures: Vec<DuplicateDayError>,
    pub xlsx_reports: Vec<SpecXlsxReport>,
}

/// Lay a pivot sheet out as a frame: a `TANGGAL` label column, one column per
/// day, then the average column. Blank cells are nulls.
pub fn convert_pivot_sheet_to_dataframe(sheet: &SpecPivotSheet) -> Result<DataFrame, ExportError> {
    let l_labels: Vec<&str> = sheet.rows.iter().map(|row| row.parameter.label()).collect();

    let mut l_columns = Vec::with_capacity(sheet.columns.len() + 1);
    l_columns.push(Column::new(C_LABEL_DATE.into(), l_labels));
    for (n_idx_col, column) in sheet.columns.iter().enumerate() {
        let l_values: Vec<Option<f64>> = sheet
            .rows
            .iter()
            .map(|row| row.cells.get(n_idx_col).copied().flatten())
            .collect();
        l_columns.push(Column::new(column.header().into(), l_values));
    }

    Ok(DataFrame::new(l_columns)?)
}

/// Writer options for one pivot sheet: title, numeric day headers and the
/// two-decimal average column.
pub fn derive_pivot_table_options(sheet: &SpecPivotSheet) -> SpecXlsxTableOptions {
    let header_cells = std::iter::once(EnumCellValue::String(C_LABEL_DATE.to_string()))
        .chain(sheet.columns.iter().map(|column| match column {
            EnumPivotColumn::Day(n_day) => EnumCellValue::Number(f64::from(*n_day)),
            EnumPivotColumn::Average => EnumCellValue::String(column.header()),
        }))
        .collect();

    let mut cols_fmt_overrides = BTreeMap::new();
    if let Some(n_idx) = sheet
        .columns
        .iter()
        .position(|column| *column == EnumPivotColumn::Average)
    {
        cols_fmt_overrides.insert(
            n_idx + 1,
            SpecCellFormat {
                num_format: Some(C_NUM_FORMAT_AVERAGE.to_string()),
                ..Default::default()
            },
        );
    }

    SpecXlsxTableOptions {
        title: Some(sheet.title()),
        header_cells: Some(header_cells),
        n_cols_label: 1,
        cols_fmt_overrides,
        width_col_label: N_WIDTH_COL_LABEL,
        width_col_data: N_WIDTH_COL_DAY,
        if_freeze_panes: true,
    }
}

/// Render `workbook` to `path`. A workbook without sheets writes no file.
pub fn write_pivot_workbook(
    workbook: &SpecPivotWorkbook,
    path: &Path,
    font_name: &str,
) -> Result<SpecExportReport, ExportError> {
    if workbook.is_empty() {
        if workbook.failures.is_empty() {
            return Err(ExportError::EmptyWorkbook);
        }
        return Err(ExportError::AllSitesFailed(workbook.failures.clone()));
    }

    let mut writer = XlsxWriter::new(
        path.to_path_buf(),
        derive_default_xlsx_formats(font_name),
        derive_default_xlsx_write_options(),
    );

    let mut l_sheet_names = Vec::with_capacity(workbook.sheets.len());
    for sheet in &workbook.sheets {
        let df = convert_pivot_sheet_to_dataframe(sheet)?;
        let options = derive_pivot_table_options(sheet);
        let c_sheet_name = writer
            .write_table(&df, &sheet.sheet_name(), &options)
            .map_err(ExportError::Xlsx)?;
        l_sheet_names.push(c_sheet_name);
    }
    writer.close().map_err(ExportError::Xlsx)?;

    let xlsx_reports = writer.report();
    for report in &xlsx_reports {
        for c_warning in &report.warnings {
            warn!("{}: {}", report.sheet_name, c_warning);
        }
    }

    Ok(SpecExportReport {
        path: path.to_path_buf(),
        sheet_names: l_sheet_names,
        failures: workbook.failures.clone(),
        xlsx_reports,
    })
}

/// Build the pivot workbook from `source` and write it to `path`.
#[instrument(skip(source))]
pub fn export_store_to_xlsx<S>(
    source: &S,
    path: &Path,
    font_name: &str,
    order: EnumSheetOrder,
) -> Result<SpecExportReport, ExportError>
where
    S: RecordSource + ?Sized,
{
    let workbook = build_workbook_ordered(source, order);
    let report = write_pivot_workbook(&workbook, path, font_name)?;
    info!(
        "Exported {} sheet(s) to {} ({} site(s) skipped)",
        report.sheet_names.len(),
        path.display(),
        report.failures.len()
    );
    Ok(report)
}
