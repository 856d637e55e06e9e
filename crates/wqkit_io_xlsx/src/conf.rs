//! XLSX constants and default preset factories.

use crate::spec::{SpecCellFormat, SpecXlsxFormatSet, SpecXlsxWriteOptions};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Font used when no font is configured.
pub const C_FONT_NAME_DEFAULT: &str = "Times New Roman";

/// Build default named format presets used by [`crate::writer::XlsxWriter`].
///
/// Every table cell is thin-bordered; the title row is not.
pub fn derive_default_xlsx_formats(font_name: &str) -> SpecXlsxFormatSet {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some(font_name.to_string()),
        font_size: Some(11),
        border: Some(1),
        align: Some("left".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    };

    SpecXlsxFormatSet {
        title: cfg_base_fmt_spec.with_(SpecCellFormat {
            font_size: Some(12),
            bold: Some(true),
            align: Some("center".to_string()),
            border: Some(0),
            ..Default::default()
        }),
        header: cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            ..Default::default()
        }),
        header_label: cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
        label: cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
        value: cfg_base_fmt_spec.with_(SpecCellFormat {
            align: Some("center".to_string()),
            ..Default::default()
        }),
    }
}

/// Build default write options.
pub fn derive_default_xlsx_write_options() -> SpecXlsxWriteOptions {
    SpecXlsxWriteOptions::default()
}
