//! Bulk ingress from a flat input workbook.
//!
//! Expected layout: first sheet, one header row naming `Tanggal`, `Lokasi`,
//! `ph` and `debit` (any case, any order), optionally `suhu`, then one
//! measurement per row.

use std::path::Path;

use chrono::{Days, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use wqkit_io_xlsx::{EnumCellValue, SpecSheetRows, read_first_sheet};
use wqkit_record::{EnumSite, EnumUpsertOutcome, MeasurementStore, SpecMeasurement};

pub const C_COL_DATE: &str = "Tanggal";
pub const C_COL_SITE: &str = "Lokasi";
pub const C_COL_PH: &str = "ph";
pub const C_COL_FLOW: &str = "debit";
pub const C_COL_TEMPERATURE: &str = "suhu";

const TUP_DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to read input workbook: {0}")]
    Read(String),

    #[error("input sheet {sheet:?} has no {column:?} column")]
    MissingColumn {
        sheet: String,
        column: &'static str,
    },
}

/// One input row that did not reach the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecImportRejection {
    /// 1-based worksheet row number.
    pub row_num: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecImportReport {
    pub n_rows_read: usize,
    pub n_inserted: usize,
    pub n_replaced: usize,
    pub rejections: Vec<SpecImportRejection>,
}

impl SpecImportReport {
    pub fn n_accepted(&self) -> usize {
        self.n_inserted + self.n_replaced
    }
}

struct SpecColumnIndex {
    date: usize,
    site: usize,
    ph: usize,
    flow: usize,
    temperature: Option<usize>,
}

/// Read the first sheet of `path` and submit every row into `store`.
#[instrument(skip(store))]
pub fn import_xlsx(store: &MeasurementStore, path: &Path) -> Result<SpecImportReport, ImportError> {
    let sheet = read_first_sheet(path).map_err(ImportError::Read)?;
    import_rows(store, &sheet)
}

/// Submit every body row of `sheet`. Bad rows are reported, not fatal;
/// a missing required column is.
pub fn import_rows(
    store: &MeasurementStore,
    sheet: &SpecSheetRows,
) -> Result<SpecImportReport, ImportError> {
    let require = |column: &'static str| {
        sheet
            .col_index(column)
            .ok_or_else(|| ImportError::MissingColumn {
                sheet: sheet.sheet_name.clone(),
                column,
            })
    };
    let index = SpecColumnIndex {
        date: require(C_COL_DATE)?,
        site: require(C_COL_SITE)?,
        ph: require(C_COL_PH)?,
        flow: require(C_COL_FLOW)?,
        temperature: sheet.col_index(C_COL_TEMPERATURE),
    };

    let mut report = SpecImportReport::default();
    for (n_idx, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(|cell| *cell == EnumCellValue::None) {
            continue;
        }
        report.n_rows_read += 1;
        let row_num = sheet.row_num_first_body + n_idx;

        let result = derive_measurement_from_row(row, &index)
            .and_then(|m| store.submit(m).map_err(|err| err.to_string()));
        match result {
            Ok(EnumUpsertOutcome::Inserted) => report.n_inserted += 1,
            Ok(EnumUpsertOutcome::Replaced) => report.n_replaced += 1,
            Err(reason) => {
                warn!("Rejected input row {}: {}", row_num, reason);
                report.rejections.push(SpecImportRejection { row_num, reason });
            }
        }
    }

    info!(
        "Imported {} of {} row(s) from {:?} ({} replaced, {} rejected)",
        report.n_accepted(),
        report.n_rows_read,
        sheet.sheet_name,
        report.n_replaced,
        report.rejections.len()
    );
    Ok(report)
}

fn derive_measurement_from_row(
    row: &[EnumCellValue],
    index: &SpecColumnIndex,
) -> Result<SpecMeasurement, String> {
    let cell = |n_idx: usize| row.get(n_idx).cloned().unwrap_or(EnumCellValue::None);

    let date = parse_date_cell(&cell(index.date))?;
    let site = match cell(index.site) {
        EnumCellValue::String(s) => s.parse::<EnumSite>().map_err(|err| err.to_string())?,
        other => return Err(format!("{C_COL_SITE}: expected a site name, got {other:?}")),
    };
    let ph = parse_number_cell(&cell(index.ph), C_COL_PH)?
        .ok_or_else(|| format!("{C_COL_PH}: value is missing"))?;
    let flow = parse_number_cell(&cell(index.flow), C_COL_FLOW)?
        .ok_or_else(|| format!("{C_COL_FLOW}: value is missing"))?;
    let temperature = match index.temperature {
        Some(n_idx) => parse_number_cell(&cell(n_idx), C_COL_TEMPERATURE)?,
        None => None,
    };

    debug!("Parsed input row: {} {}", site, date);
    Ok(SpecMeasurement::new(site, date, ph, temperature, flow))
}

/// Dates arrive as ISO text (date cells are rendered so by the reader),
/// as other common text forms, or as raw Excel serial numbers.
pub fn parse_date_cell(value: &EnumCellValue) -> Result<NaiveDate, String> {
    match value {
        EnumCellValue::None => Err(format!("{C_COL_DATE}: value is missing")),
        EnumCellValue::Number(n) => derive_date_from_excel_serial(*n)
            .ok_or_else(|| format!("{C_COL_DATE}: {n} is not a valid date serial")),
        EnumCellValue::String(s) => {
            let c_text = s.trim();
            if let Ok(dt) = NaiveDateTime::parse_from_str(c_text, "%Y-%m-%d %H:%M:%S") {
                return Ok(dt.date());
            }
            TUP_DATE_FORMATS
                .iter()
                .find_map(|c_fmt| NaiveDate::parse_from_str(c_text, c_fmt).ok())
                .ok_or_else(|| format!("{C_COL_DATE}: cannot parse {c_text:?} as a date"))
        }
    }
}

/// Excel serial day count from 1899-12-30; the time fraction is dropped.
pub fn derive_date_from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.trunc() as u64))
}

fn parse_number_cell(value: &EnumCellValue, column: &str) -> Result<Option<f64>, String> {
    match value {
        EnumCellValue::None => Ok(None),
        EnumCellValue::Number(n) => Ok(Some(*n)),
        EnumCellValue::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("{column}: {s:?} is not a number")),
    }
}
