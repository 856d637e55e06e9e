//! `wqkit`:
//! Water-quality record keeping and monthly pivot export.
//!
//! - `config`   : environment configuration
//! - `snapshot` : JSON persistence of the measurement store
//! - `import`   : bulk ingress from a flat input workbook
//! - `export`   : pivot workbook rendering
//! - `summary`  : text listing of monthly aggregates
pub mod config;
pub mod export;
pub mod import;
pub mod snapshot;
pub mod summary;

pub use config::Config;
pub use export::{
    ExportError, SpecExportReport, convert_pivot_sheet_to_dataframe, derive_pivot_table_options,
    export_store_to_xlsx, write_pivot_workbook,
};
pub use import::{
    ImportError, SpecImportRejection, SpecImportReport, import_rows, import_xlsx,
};
pub use snapshot::{SnapshotError, load_store, save_store};
pub use summary::render_summary;
