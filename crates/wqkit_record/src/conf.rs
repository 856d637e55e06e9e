//! Record constants: value domains, sheet labels and month names.

/// Decimal places kept by monthly averages.
pub const N_DECIMALS_AGGREGATE: i32 = 3;

/// Inclusive pH domain.
pub const N_PH_MIN: f64 = 0.0;
pub const N_PH_MAX: f64 = 14.0;

/// Inclusive temperature domain in degrees Celsius.
pub const N_TEMPERATURE_MIN: f64 = 0.0;
pub const N_TEMPERATURE_MAX: f64 = 100.0;

/// Lower flow bound in L/s.
pub const N_FLOW_MIN: f64 = 0.0;

/// Header of the leading label column.
pub const C_LABEL_DATE: &str = "TANGGAL";
/// Header of the trailing average column.
pub const C_LABEL_AVERAGE: &str = "Rata-rata";

/// Month names used in sheet titles (`Januari 2024`).
pub const TUP_MONTH_NAMES: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];
