//! `wqkit_record` v1:
//! Water-quality measurement store and pivot engine.
//!
//! Module layout:
//! - `conf`      : value domains, labels and month names
//! - `spec`      : record/pivot models and error types
//! - `aggregate` : monthly mean derivation
//! - `store`     : per-site measurement store
//! - `pivot`     : parameter x day reshape and workbook assembly
pub mod aggregate;
pub mod conf;
pub mod pivot;
pub mod spec;
pub mod store;

pub use aggregate::{calculate_mean, derive_monthly_aggregates, round_decimals};
pub use pivot::{
    build_pivot_sheets, build_workbook, build_workbook_ordered, derive_pivot_sheets,
    pivot_month_group, sort_pivot_sheets,
};
pub use spec::{
    DuplicateDayError, EnumParameter, EnumPivotColumn, EnumSheetOrder, EnumSite,
    EnumUpsertOutcome, SiteParseError, SpecMeasurement, SpecMonthKey, SpecMonthlyAggregate,
    SpecPivotRow, SpecPivotSheet, SpecPivotWorkbook, SpecStoreSnapshot, ValidationError,
};
pub use store::{MeasurementStore, RecordSource};
