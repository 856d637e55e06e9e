//! Record, aggregate and pivot models plus top-level error types.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::conf::{
    C_LABEL_AVERAGE, N_FLOW_MIN, N_PH_MAX, N_PH_MIN, N_TEMPERATURE_MAX, N_TEMPERATURE_MIN,
    TUP_MONTH_NAMES,
};

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Fixed set of collection points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnumSite {
    #[serde(rename = "Drain A")]
    DrainA,
    #[serde(rename = "Drain B")]
    DrainB,
    #[serde(rename = "Drain C")]
    DrainC,
    #[serde(rename = "Drain D")]
    DrainD,
}

impl EnumSite {
    pub const COUNT: usize = 4;

    /// Every site, in export order.
    pub const ALL: [EnumSite; Self::COUNT] = [
        EnumSite::DrainA,
        EnumSite::DrainB,
        EnumSite::DrainC,
        EnumSite::DrainD,
    ];

    /// Display name used in titles and sheet names.
    pub fn name(self) -> &'static str {
        match self {
            Self::DrainA => "Drain A",
            Self::DrainB => "Drain B",
            Self::DrainC => "Drain C",
            Self::DrainD => "Drain D",
        }
    }

    /// Zero-based position in [`Self::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EnumSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EnumSite {
    type Err = SiteParseError;

    /// Accepts `Drain A`, `drain a` and `draina`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c_key: String = s
            .chars()
            .filter(|chr| !chr.is_whitespace() && *chr != '_' && *chr != '-')
            .flat_map(char::to_lowercase)
            .collect();

        Self::ALL
            .into_iter()
            .find(|site| site.name().replace(' ', "").to_lowercase() == c_key)
            .ok_or_else(|| SiteParseError(s.to_string()))
    }
}

/// Pivot row parameters, in fixed display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumParameter {
    Ph,
    Temperature,
    Flow,
}

impl EnumParameter {
    /// Row order of every pivot sheet.
    pub const ALL: [EnumParameter; 3] = [
        EnumParameter::Ph,
        EnumParameter::Temperature,
        EnumParameter::Flow,
    ];

    /// Row label written to column A.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ph => "pH",
            Self::Temperature => "Suhu (°C)",
            Self::Flow => "Debit (l/d)",
        }
    }
}

/// One pivot column: a day of month, or the trailing monthly average.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumPivotColumn {
    Day(u32),
    Average,
}

impl EnumPivotColumn {
    /// Header text for this column.
    pub fn header(self) -> String {
        match self {
            Self::Day(n_day) => n_day.to_string(),
            Self::Average => C_LABEL_AVERAGE.to_string(),
        }
    }
}

/// Sheet ordering inside an exported workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumSheetOrder {
    /// Site name, then year and month (default).
    #[default]
    SiteThenMonth,
    /// Year and month, then site name.
    MonthThenSite,
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumUpsertOutcome {
    /// No record existed for the `(site, date)` key.
    Inserted,
    /// An existing record for the key was overwritten.
    Replaced,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecordModels

/// Calendar month key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecMonthKey {
    pub year: i32,
    pub month: u32,
}

impl SpecMonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Long form used in sheet titles, e.g. `Januari 2024`.
    pub fn label_long(&self) -> String {
        let c_month = TUP_MONTH_NAMES
            .get(self.month.saturating_sub(1) as usize)
            .copied()
            .unwrap_or("?");
        format!("{c_month} {}", self.year)
    }
}

impl fmt::Display for SpecMonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// One daily reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecMeasurement {
    pub site: EnumSite,
    pub date: NaiveDate,
    pub ph: f64,
    /// Absent on legacy records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Flow in L/s.
    pub flow: f64,
}

impl SpecMeasurement {
    pub fn new(
        site: EnumSite,
        date: NaiveDate,
        ph: f64,
        temperature: Option<f64>,
        flow: f64,
    ) -> Self {
        Self {
            site,
            date,
            ph,
            temperature,
            flow,
        }
    }

    /// Check every field against its domain.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.ph.is_finite() {
            return Err(ValidationError::NotFinite { field: "ph" });
        }
        if !(N_PH_MIN..=N_PH_MAX).contains(&self.ph) {
            return Err(ValidationError::PhOutOfRange(self.ph));
        }
        if let Some(n_temperature) = self.temperature {
            if !n_temperature.is_finite() {
                return Err(ValidationError::NotFinite {
                    field: "temperature",
                });
            }
            if !(N_TEMPERATURE_MIN..=N_TEMPERATURE_MAX).contains(&n_temperature) {
                return Err(ValidationError::TemperatureOutOfRange(n_temperature));
            }
        }
        if !self.flow.is_finite() {
            return Err(ValidationError::NotFinite { field: "flow" });
        }
        if self.flow < N_FLOW_MIN {
            return Err(ValidationError::NegativeFlow(self.flow));
        }
        Ok(())
    }

    pub fn key_month(&self) -> SpecMonthKey {
        SpecMonthKey::from_date(self.date)
    }

    /// Value of one pivot parameter.
    pub fn value(&self, parameter: EnumParameter) -> Option<f64> {
        match parameter {
            EnumParameter::Ph => Some(self.ph),
            EnumParameter::Temperature => self.temperature,
            EnumParameter::Flow => Some(self.flow),
        }
    }
}

/// Derived per-month means for one site.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecMonthlyAggregate {
    pub site: EnumSite,
    pub year: i32,
    pub month: u32,
    pub avg_ph: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub avg_flow: Option<f64>,
    /// Number of daily records the means were taken over.
    pub count_measurements: usize,
}

impl SpecMonthlyAggregate {
    pub fn key_month(&self) -> SpecMonthKey {
        SpecMonthKey::new(self.year, self.month)
    }

    pub fn value(&self, parameter: EnumParameter) -> Option<f64> {
        match parameter {
            EnumParameter::Ph => self.avg_ph,
            EnumParameter::Temperature => self.avg_temperature,
            EnumParameter::Flow => self.avg_flow,
        }
    }
}

/// Serializable store content. Aggregates are not stored; they are re-derived.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecStoreSnapshot {
    #[serde(default)]
    pub measurements: Vec<SpecMeasurement>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PivotModels

/// One pivot row: a parameter and one cell per pivot column.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecPivotRow {
    pub parameter: EnumParameter,
    pub cells: Vec<Option<f64>>,
}

/// Parameter x day matrix for one `(site, month)`, plus the average column.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecPivotSheet {
    pub site: EnumSite,
    pub key_month: SpecMonthKey,
    pub columns: Vec<EnumPivotColumn>,
    pub rows: Vec<SpecPivotRow>,
}

impl SpecPivotSheet {
    /// Workbook sheet name: `<site> - <year>-<MM>`.
    pub fn sheet_name(&self) -> String {
        format!("{} - {}", self.site, self.key_month)
    }

    /// Title row text: `Data <site> Bulan <Month Year>`.
    pub fn title(&self) -> String {
        format!("Data {} Bulan {}", self.site, self.key_month.label_long())
    }

    /// Days present, ascending.
    pub fn days(&self) -> Vec<u32> {
        self.columns
            .iter()
            .filter_map(|col| match col {
                EnumPivotColumn::Day(n_day) => Some(*n_day),
                EnumPivotColumn::Average => None,
            })
            .collect()
    }

    /// Cell lookup; `None` is a blank cell.
    pub fn cell(&self, parameter: EnumParameter, column: EnumPivotColumn) -> Option<f64> {
        let n_idx_col = self.columns.iter().position(|col| *col == column)?;
        self.rows
            .iter()
            .find(|row| row.parameter == parameter)
            .and_then(|row| row.cells.get(n_idx_col).copied().flatten())
    }

    pub fn row(&self, parameter: EnumParameter) -> Option<&SpecPivotRow> {
        self.rows.iter().find(|row| row.parameter == parameter)
    }
}

/// Logical export artifact.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecPivotWorkbook {
    pub sheets: Vec<SpecPivotSheet>,
    /// Sites whose reshape failed; their sheets are absent from `sheets`.
    pub failures: Vec<DuplicateDayError>,
}

impl SpecPivotWorkbook {
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(SpecPivotSheet::sheet_name).collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Out-of-domain measurement input. The store is left unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("pH must be within [0, 14], got {0}")]
    PhOutOfRange(f64),
    #[error("temperature must be within [0, 100] °C, got {0}")]
    TemperatureOutOfRange(f64),
    #[error("flow must be >= 0 L/s, got {0}")]
    NegativeFlow(f64),
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
}

/// Two measurements for the same site and day reached the reshape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate measurements for {site} on {date}")]
pub struct DuplicateDayError {
    pub site: EnumSite,
    pub date: NaiveDate,
}

/// Unknown site name at ingress.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown site: {0:?}")]
pub struct SiteParseError(pub String);

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_site_from_str_accepts_loose_spellings() {
        assert_eq!("Drain A".parse::<EnumSite>(), Ok(EnumSite::DrainA));
        assert_eq!("  drain b ".parse::<EnumSite>(), Ok(EnumSite::DrainB));
        assert_eq!("drainc".parse::<EnumSite>(), Ok(EnumSite::DrainC));
        assert_eq!("DRAIN_D".parse::<EnumSite>(), Ok(EnumSite::DrainD));
        assert_eq!(
            "Drain Z".parse::<EnumSite>(),
            Err(SiteParseError("Drain Z".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_out_of_domain_values() {
        let m = SpecMeasurement::new(EnumSite::DrainA, date(2024, 1, 5), 15.0, None, 1.0);
        assert_eq!(m.validate(), Err(ValidationError::PhOutOfRange(15.0)));

        let m = SpecMeasurement::new(EnumSite::DrainA, date(2024, 1, 5), 7.0, None, -0.1);
        assert_eq!(m.validate(), Err(ValidationError::NegativeFlow(-0.1)));

        let m = SpecMeasurement::new(EnumSite::DrainA, date(2024, 1, 5), 7.0, Some(120.0), 0.0);
        assert_eq!(
            m.validate(),
            Err(ValidationError::TemperatureOutOfRange(120.0))
        );

        let m = SpecMeasurement::new(EnumSite::DrainA, date(2024, 1, 5), f64::NAN, None, 0.0);
        assert_eq!(m.validate(), Err(ValidationError::NotFinite { field: "ph" }));
    }

    #[test]
    fn test_validate_accepts_domain_bounds() {
        let m = SpecMeasurement::new(EnumSite::DrainA, date(2024, 1, 5), 0.0, Some(100.0), 0.0);
        assert!(m.validate().is_ok());
        let m = SpecMeasurement::new(EnumSite::DrainA, date(2024, 1, 5), 14.0, Some(0.0), 3.5);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_sheet_name_and_title() {
        let sheet = SpecPivotSheet {
            site: EnumSite::DrainA,
            key_month: SpecMonthKey::new(2024, 1),
            columns: vec![EnumPivotColumn::Day(5), EnumPivotColumn::Average],
            rows: vec![],
        };
        assert_eq!(sheet.sheet_name(), "Drain A - 2024-01");
        assert_eq!(sheet.title(), "Data Drain A Bulan Januari 2024");
        assert_eq!(sheet.days(), vec![5]);
    }

    #[test]
    fn test_legacy_record_without_temperature_deserializes() {
        let c_json = r#"{"site":"Drain B","date":"2023-11-02","ph":6.8,"flow":0.4}"#;
        let m: SpecMeasurement = serde_json::from_str(c_json).expect("parse legacy record");
        assert_eq!(m.site, EnumSite::DrainB);
        assert_eq!(m.temperature, None);
        assert_eq!(m.date, date(2023, 11, 2));
    }
}
