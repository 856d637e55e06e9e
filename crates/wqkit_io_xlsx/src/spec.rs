//! Shared XLSX specification models.

use std::collections::BTreeMap;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification; `None` fields inherit on merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Named formats used by one [`crate::writer::XlsxWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxFormatSet {
    /// Merged title row.
    pub title: SpecCellFormat,
    /// Header cells over data columns.
    pub header: SpecCellFormat,
    /// Header cells over label columns.
    pub header_label: SpecCellFormat,
    /// Body cells in label columns.
    pub label: SpecCellFormat,
    /// Body cells in data columns.
    pub value: SpecCellFormat,
}

/// Normalized cell value during conversion/write pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
}

impl EnumCellValue {
    /// Text form, `None` for blank cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnFormatSpecification

/// Planned final/base formats by column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumnFormatPlan {
    /// Final format applied at write time.
    pub fmts_by_col: Vec<SpecCellFormat>,
    /// Base format before per-column override.
    pub fmts_base_by_col: Vec<SpecCellFormat>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Writer-wide options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxWriteOptions {
    /// Patch merged into every body column format.
    pub base_format_patch: SpecCellFormat,
}

/// Per-table options for [`crate::writer::XlsxWriter::write_table`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpecXlsxTableOptions {
    /// Title row above the header, merged across the table width.
    pub title: Option<String>,
    /// Header cells; DataFrame column names are used when `None`.
    pub header_cells: Option<Vec<EnumCellValue>>,
    /// Number of leading label columns.
    pub n_cols_label: usize,
    /// Per-column body format overrides, keyed by column index.
    pub cols_fmt_overrides: BTreeMap<usize, SpecCellFormat>,
    /// Width of label columns.
    pub width_col_label: f64,
    /// Width of data columns.
    pub width_col_data: f64,
    /// Freeze panes below the header and right of the label columns.
    pub if_freeze_panes: bool,
}

impl Default for SpecXlsxTableOptions {
    fn default() -> Self {
        Self {
            title: None,
            header_cells: None,
            n_cols_label: 1,
            cols_fmt_overrides: BTreeMap::new(),
            width_col_label: 18.0,
            width_col_data: 8.0,
            if_freeze_panes: true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetFormatSpecification

/// Horizontal merge plan item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetHorizontalMerge {
    /// Row index where merge is applied.
    pub row_idx_start: usize,
    /// Start column index (inclusive).
    pub col_idx_start: usize,
    /// End column index (inclusive).
    pub col_idx_end: usize,
    /// Merge display text.
    pub text: String,
}

/// Rows of one worksheet read back from a workbook.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheetRows {
    /// Worksheet name.
    pub sheet_name: String,
    /// Text of the first used row.
    pub headers: Vec<String>,
    /// Remaining used rows.
    pub rows: Vec<Vec<EnumCellValue>>,
    /// 1-based worksheet row number of `rows[0]`.
    pub row_num_first_body: usize,
}

impl SpecSheetRows {
    /// Position of a header, compared case-insensitively after trimming.
    pub fn col_index(&self, header: &str) -> Option<usize> {
        let c_key = header.trim().to_lowercase();
        self.headers
            .iter()
            .position(|c_name| c_name.trim().to_lowercase() == c_key)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per-write call report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecXlsxReport {
    /// Actual unique sheet name in workbook.
    pub sheet_name: String,
    /// Rows written, title and header included.
    pub n_rows_written: usize,
    /// Columns written.
    pub n_cols_written: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
