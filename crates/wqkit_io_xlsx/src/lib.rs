//! `wqkit_io_xlsx`:
//! XLSX kernel for the water-quality toolkit.
//!
//! - `conf`   : constants and default presets
//! - `spec`   : specs/models/options
//! - `util`   : pure helper functions
//! - `writer` : titled, bordered table writer over polars DataFrames
//! - `reader` : first-sheet reader over calamine
pub mod conf;
pub mod reader;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_FONT_NAME_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    TUP_EXCEL_ILLEGAL, derive_default_xlsx_formats, derive_default_xlsx_write_options,
};
pub use reader::read_first_sheet;
pub use spec::{
    EnumCellValue, SpecCellFormat, SpecColumnFormatPlan, SpecSheetHorizontalMerge,
    SpecSheetRows, SpecXlsxFormatSet, SpecXlsxReport, SpecXlsxTableOptions, SpecXlsxWriteOptions,
};
pub use util::{
    convert_cell_value, derive_horizontal_merge_tracker, derive_unique_sheet_name,
    plan_horizontal_merges, sanitize_sheet_name, validate_table_extent, validate_unique_columns,
};
pub use writer::{SpecColumnFormatPlanOptions, XlsxWriter, plan_column_formats};
