//! XLSX writer kernel that lays DataFrames out as titled, bordered tables.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use polars::prelude::{AnyValue, DataFrame};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use tracing::debug;

use crate::spec::{
    EnumCellValue, SpecCellFormat, SpecColumnFormatPlan, SpecXlsxFormatSet, SpecXlsxReport,
    SpecXlsxTableOptions, SpecXlsxWriteOptions,
};
use crate::util::{
    convert_cell_value, derive_horizontal_merge_tracker, derive_unique_sheet_name,
    plan_horizontal_merges, sanitize_sheet_name, validate_table_extent, validate_unique_columns,
};

/// Inputs of [`plan_column_formats`].
pub struct SpecColumnFormatPlanOptions<'a> {
    /// Number of columns in the table.
    pub width_data: usize,
    /// Leading columns that carry row labels.
    pub n_cols_label: usize,
    /// Optional per-column format overrides.
    pub cols_fmt_overrides: &'a BTreeMap<usize, SpecCellFormat>,
    /// Base label format.
    pub fmt_label: &'a SpecCellFormat,
    /// Base value format.
    pub fmt_value: &'a SpecCellFormat,
    /// Global write options.
    pub write_options: &'a SpecXlsxWriteOptions,
}

/// Stateful workbook writer.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    formats: SpecXlsxFormatSet,
    write_options: SpecXlsxWriteOptions,
    /// Lowercased names; Excel compares sheet names case-insensitively.
    set_sheet_names_existing: BTreeSet<String>,
    l_reports: Vec<SpecXlsxReport>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path and format/options presets.
    ///
    /// The workbook is buffered in memory until [`Self::close`] is called.
    pub fn new(
        path_file_out: PathBuf,
        formats: SpecXlsxFormatSet,
        write_options: SpecXlsxWriteOptions,
    ) -> Self {
        Self {
            path_file_out,
            workbook: Workbook::new(),
            formats,
            write_options,
            set_sheet_names_existing: BTreeSet::new(),
            l_reports: Vec::new(),
            if_closed: false,
        }
    }

    /// Return output file path as string.
    pub fn file_out(&self) -> String {
        self.path_file_out.to_string_lossy().to_string()
    }

    /// Return immutable snapshot of per-sheet write reports.
    pub fn report(&self) -> Vec<SpecXlsxReport> {
        self.l_reports.clone()
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), String> {
        if self.if_closed {
            return Ok(());
        }
        self.workbook
            .save(&self.path_file_out)
            .map_err(derive_xlsx_error_text)?;
        self.if_closed = true;
        debug!(
            "Saved {} sheet(s) to {}",
            self.l_reports.len(),
            self.file_out()
        );
        Ok(())
    }

    /// Write `df` as one sheet: optional merged title row, one header row,
    /// then the body. Returns the sheet name actually used.
    pub fn write_table(
        &mut self,
        df: &DataFrame,
        sheet_name: &str,
        options: &SpecXlsxTableOptions,
    ) -> Result<String, String> {
        if self.if_closed {
            return Err("Writer is already closed.".to_string());
        }

        let n_height = df.height();
        let n_width = df.width();
        let l_col_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|c_name| c_name.to_string())
            .collect();
        validate_unique_columns(&l_col_names)?;

        let l_header_cells = match &options.header_cells {
            Some(l_cells) if l_cells.len() != n_width => {
                return Err(format!(
                    "header_cells has {} entries, table has {n_width} columns.",
                    l_cells.len()
                ));
            }
            Some(l_cells) => l_cells.clone(),
            None => l_col_names
                .iter()
                .map(|c_name| EnumCellValue::String(c_name.clone()))
                .collect(),
        };

        let n_rows_header = usize::from(options.title.is_some()) + 1;
        validate_table_extent(n_rows_header + n_height, n_width)?;
        if options.n_cols_label > n_width {
            return Err(format!(
                "n_cols_label={} exceeds table width {n_width}.",
                options.n_cols_label
            ));
        }

        let mut report = SpecXlsxReport::default();
        let c_sheet_name_clean = sanitize_sheet_name(sheet_name, "_");
        if c_sheet_name_clean != sheet_name {
            report.warn(format!(
                "Sheet name {sheet_name:?} sanitized to {c_sheet_name_clean:?}."
            ));
        }
        let c_sheet_name = derive_unique_sheet_name(&c_sheet_name_clean, &self.set_sheet_names_existing);
        if c_sheet_name != c_sheet_name_clean {
            report.warn(format!(
                "Sheet name {c_sheet_name_clean:?} already used; wrote {c_sheet_name:?}."
            ));
        }
        self.set_sheet_names_existing
            .insert(c_sheet_name.to_lowercase());

        let plan = plan_column_formats(SpecColumnFormatPlanOptions {
            width_data: n_width,
            n_cols_label: options.n_cols_label,
            cols_fmt_overrides: &options.cols_fmt_overrides,
            fmt_label: &self.formats.label,
            fmt_value: &self.formats.value,
            write_options: &self.write_options,
        });
        let l_fmts_body: Vec<Format> = plan
            .fmts_by_col
            .iter()
            .map(derive_rust_xlsx_format)
            .collect();
        let fmt_title = derive_rust_xlsx_format(&self.formats.title);
        let fmt_header = derive_rust_xlsx_format(&self.formats.header);
        let fmt_header_label = derive_rust_xlsx_format(&self.formats.header_label);

        let worksheet = self.workbook.add_worksheet();
        worksheet
            .set_name(&c_sheet_name)
            .map_err(derive_xlsx_error_text)?;

        let mut n_row_cursor = 0usize;
        if let Some(c_title) = &options.title {
            write_title(worksheet, c_title, n_width, &fmt_title)?;
            n_row_cursor += 1;
        }

        for (n_idx_col, value) in l_header_cells.iter().enumerate() {
            let fmt = if n_idx_col < options.n_cols_label {
                &fmt_header_label
            } else {
                &fmt_header
            };
            write_cell_with_format(worksheet, n_row_cursor, n_idx_col, value, fmt)?;
        }
        n_row_cursor += 1;

        let l_cols = df.get_columns();
        let l_if_numeric: Vec<bool> = l_cols.iter().map(|col| col.dtype().is_numeric()).collect();
        for n_idx_row in 0..n_height {
            for (n_idx_col, col) in l_cols.iter().enumerate() {
                let value = col
                    .get(n_idx_row)
                    .map_err(|err| format!("Failed to read cell value: {err}"))?;
                let value = convert_cell_value(
                    &derive_cell_value_from_any_value(value),
                    l_if_numeric[n_idx_col],
                );
                write_cell_with_format(
                    worksheet,
                    n_row_cursor + n_idx_row,
                    n_idx_col,
                    &value,
                    &l_fmts_body[n_idx_col],
                )?;
            }
        }

        for n_idx_col in 0..n_width {
            let n_width_col = if n_idx_col < options.n_cols_label {
                options.width_col_label
            } else {
                options.width_col_data
            };
            worksheet
                .set_column_width(cast_col_num(n_idx_col)?, n_width_col)
                .map_err(derive_xlsx_error_text)?;
        }

        if options.if_freeze_panes {
            worksheet
                .set_freeze_panes(
                    cast_row_num(n_rows_header)?,
                    cast_col_num(options.n_cols_label)?,
                )
                .map_err(derive_xlsx_error_text)?;
        }

        report.sheet_name = c_sheet_name.clone();
        report.n_rows_written = n_rows_header + n_height;
        report.n_cols_written = n_width;
        debug!(
            "Wrote sheet {:?}: {} row(s) x {} col(s)",
            c_sheet_name, report.n_rows_written, report.n_cols_written
        );
        self.l_reports.push(report);
        Ok(c_sheet_name)
    }
}

/// Build per-column base/final body formats.
pub fn plan_column_formats(options: SpecColumnFormatPlanOptions<'_>) -> SpecColumnFormatPlan {
    let SpecColumnFormatPlanOptions {
        width_data,
        n_cols_label,
        cols_fmt_overrides,
        fmt_label,
        fmt_value,
        write_options,
    } = options;

    let mut fmts_base_by_col = Vec::with_capacity(width_data);
    let mut fmts_by_col = Vec::with_capacity(width_data);

    for col_idx in 0..width_data {
        let fmt_base = if col_idx < n_cols_label {
            fmt_label.clone()
        } else {
            fmt_value.clone()
        }
        .merge(&write_options.base_format_patch);

        let fmt_final = match cols_fmt_overrides.get(&col_idx) {
            Some(fmt_override) => fmt_base.merge(fmt_override),
            None => fmt_base.clone(),
        };

        fmts_base_by_col.push(fmt_base);
        fmts_by_col.push(fmt_final);
    }

    SpecColumnFormatPlan {
        fmts_by_col,
        fmts_base_by_col,
    }
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::Boolean(val) => {
            EnumCellValue::String(if val { "True" } else { "False" }.to_string())
        }
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

/// Title row: the text repeated over the table width, then merged.
fn write_title(
    worksheet: &mut Worksheet,
    title: &str,
    n_width: usize,
    fmt_title: &Format,
) -> Result<(), String> {
    let header_grid = vec![vec![title.to_string(); n_width]];
    let dict_horizontal_merges_by_row = plan_horizontal_merges(&header_grid);
    let set_merged_cells = derive_horizontal_merge_tracker(&dict_horizontal_merges_by_row);

    for (row_idx, row_values) in header_grid.iter().enumerate() {
        for (col_idx, cell_value) in row_values.iter().enumerate() {
            if set_merged_cells.contains(&(row_idx, col_idx)) {
                continue;
            }
            worksheet
                .write_string_with_format(
                    cast_row_num(row_idx)?,
                    cast_col_num(col_idx)?,
                    cell_value,
                    fmt_title,
                )
                .map_err(derive_xlsx_error_text)?;
        }

        if let Some(l_merges) = dict_horizontal_merges_by_row.get(&row_idx) {
            for merge in l_merges {
                worksheet
                    .merge_range(
                        cast_row_num(merge.row_idx_start)?,
                        cast_col_num(merge.col_idx_start)?,
                        cast_row_num(merge.row_idx_start)?,
                        cast_col_num(merge.col_idx_end)?,
                        &merge.text,
                        fmt_title,
                    )
                    .map_err(derive_xlsx_error_text)?;
            }
        }
    }

    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), String> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::None => {
            worksheet
                .write_blank(n_row, n_col, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::String(val) => {
            worksheet
                .write_string_with_format(n_row, n_col, val, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Number(val) => {
            worksheet
                .write_number_with_format(n_row, n_col, *val, format)
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim().to_ascii_lowercase().as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "center_across" => Some(FormatAlign::CenterAcross),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}
