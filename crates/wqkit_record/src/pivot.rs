//! Parameter x day reshape and workbook assembly.
//!
//! One algorithm serves every sheet: partition a site's measurements by
//! month, lay days out as columns under the fixed parameter rows, then
//! append the month's aggregate as the trailing average column.

use std::collections::BTreeMap;
use std::iter;

use chrono::Datelike;
use tracing::{debug, info, instrument, warn};

use crate::spec::{
    DuplicateDayError, EnumParameter, EnumPivotColumn, EnumSheetOrder, EnumSite,
    SpecMeasurement, SpecMonthKey, SpecMonthlyAggregate, SpecPivotRow, SpecPivotSheet,
    SpecPivotWorkbook,
};
use crate::store::RecordSource;

////////////////////////////////////////////////////////////////////////////////
// #region PivotBuild

/// Build every non-empty month sheet of `site` from `source`.
#[instrument(skip(source))]
pub fn build_pivot_sheets<S>(
    source: &S,
    site: EnumSite,
) -> Result<Vec<SpecPivotSheet>, DuplicateDayError>
where
    S: RecordSource + ?Sized,
{
    let l_measurements = source.all_measurements(site);
    let dict_aggregates: BTreeMap<SpecMonthKey, SpecMonthlyAggregate> = source
        .all_aggregates(site)
        .into_iter()
        .filter(|aggregate| aggregate.site == site)
        .map(|aggregate| (aggregate.key_month(), aggregate))
        .collect();

    derive_pivot_sheets(site, &l_measurements, &dict_aggregates)
}

/// Pivot already-loaded records. Measurements of other sites are ignored.
pub fn derive_pivot_sheets(
    site: EnumSite,
    measurements: &[SpecMeasurement],
    aggregates: &BTreeMap<SpecMonthKey, SpecMonthlyAggregate>,
) -> Result<Vec<SpecPivotSheet>, DuplicateDayError> {
    let mut dict_groups: BTreeMap<SpecMonthKey, Vec<&SpecMeasurement>> = BTreeMap::new();
    for m in measurements.iter().filter(|m| m.site == site) {
        dict_groups.entry(m.key_month()).or_default().push(m);
    }

    let mut l_sheets = Vec::with_capacity(dict_groups.len());
    for (key_month, l_group) in dict_groups {
        if l_group.is_empty() {
            continue;
        }
        let aggregate = aggregates.get(&key_month);
        if aggregate.is_none() {
            warn!(
                "No aggregate for {} {}; average column left blank",
                site, key_month
            );
        }
        l_sheets.push(pivot_month_group(site, key_month, &l_group, aggregate)?);
    }

    debug!("Built {} pivot sheet(s) for {}", l_sheets.len(), site);
    Ok(l_sheets)
}

/// Reshape one month of measurements into the fixed parameter rows.
///
/// Fails when two measurements fall on the same day: a pivot cell must have
/// exactly one source value.
pub fn pivot_month_group(
    site: EnumSite,
    key_month: SpecMonthKey,
    group: &[&SpecMeasurement],
    aggregate: Option<&SpecMonthlyAggregate>,
) -> Result<SpecPivotSheet, DuplicateDayError> {
    let mut dict_by_day: BTreeMap<u32, &SpecMeasurement> = BTreeMap::new();
    for m in group.iter().copied() {
        if dict_by_day.insert(m.date.day(), m).is_some() {
            return Err(DuplicateDayError { site, date: m.date });
        }
    }

    let l_columns: Vec<EnumPivotColumn> = dict_by_day
        .keys()
        .map(|n_day| EnumPivotColumn::Day(*n_day))
        .chain(iter::once(EnumPivotColumn::Average))
        .collect();

    let l_rows = EnumParameter::ALL
        .into_iter()
        .map(|parameter| SpecPivotRow {
            parameter,
            cells: dict_by_day
                .values()
                .map(|m| m.value(parameter))
                .chain(iter::once(aggregate.and_then(|agg| agg.value(parameter))))
                .collect(),
        })
        .collect();

    Ok(SpecPivotSheet {
        site,
        key_month,
        columns: l_columns,
        rows: l_rows,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WorkbookAssembly

/// Build the export workbook over every site, in the default sheet order.
pub fn build_workbook<S>(source: &S) -> SpecPivotWorkbook
where
    S: RecordSource + ?Sized,
{
    build_workbook_ordered(source, EnumSheetOrder::default())
}

/// Build the export workbook over every site.
///
/// A site whose reshape fails contributes no sheets; its error is kept in
/// [`SpecPivotWorkbook::failures`] and the remaining sites are still built.
#[instrument(skip(source))]
pub fn build_workbook_ordered<S>(source: &S, order: EnumSheetOrder) -> SpecPivotWorkbook
where
    S: RecordSource + ?Sized,
{
    let mut workbook = SpecPivotWorkbook::default();

    for site in EnumSite::ALL {
        match build_pivot_sheets(source, site) {
            Ok(l_sheets) if l_sheets.is_empty() => {
                debug!("Site {} has no measurements; skipped", site);
            }
            Ok(l_sheets) => workbook.sheets.extend(l_sheets),
            Err(err) => {
                warn!("Skipping sheets for {}: {}", site, err);
                workbook.failures.push(err);
            }
        }
    }

    sort_pivot_sheets(&mut workbook.sheets, order);
    info!(
        "Built workbook: {} sheet(s), {} failed site(s)",
        workbook.sheets.len(),
        workbook.failures.len()
    );
    workbook
}

/// Sort sheets in place by the requested order.
pub fn sort_pivot_sheets(sheets: &mut [SpecPivotSheet], order: EnumSheetOrder) {
    match order {
        EnumSheetOrder::SiteThenMonth => {
            sheets.sort_by_key(|sheet| (sheet.site.name(), sheet.key_month));
        }
        EnumSheetOrder::MonthThenSite => {
            sheets.sort_by_key(|sheet| (sheet.key_month, sheet.site.name()));
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::store::MeasurementStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn assert_cells_close(actual: &[Option<f64>], expected: &[Option<f64>]) {
        assert_eq!(actual.len(), expected.len(), "cell count");
        for (n_idx, (a, e)) in actual.iter().zip(expected).enumerate() {
            match (a, e) {
                (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "cell {n_idx}: {a} != {e}"),
                (None, None) => {}
                _ => panic!("cell {n_idx}: {a:?} != {e:?}"),
            }
        }
    }

    /// Source that hands out whatever it holds, duplicates included.
    struct RawSource {
        measurements: Vec<SpecMeasurement>,
        aggregates: Vec<SpecMonthlyAggregate>,
    }

    impl RecordSource for RawSource {
        fn all_measurements(&self, site: EnumSite) -> Vec<SpecMeasurement> {
            self.measurements
                .iter()
                .filter(|m| m.site == site)
                .cloned()
                .collect()
        }

        fn all_aggregates(&self, site: EnumSite) -> Vec<SpecMonthlyAggregate> {
            self.aggregates
                .iter()
                .filter(|a| a.site == site)
                .cloned()
                .collect()
        }
    }

    #[test]
    fn test_two_day_month_pivot() {
        let store = MeasurementStore::new();
        store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 6), 7.4, None, 1.5)
            .expect("insert");
        store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 5), 7.0, Some(25.0), 1.2)
            .expect("insert");

        let l_sheets = build_pivot_sheets(&store, EnumSite::DrainA).expect("pivot");
        assert_eq!(l_sheets.len(), 1);

        let sheet = &l_sheets[0];
        assert_eq!(sheet.sheet_name(), "Drain A - 2024-01");
        assert_eq!(
            sheet.columns,
            vec![
                EnumPivotColumn::Day(5),
                EnumPivotColumn::Day(6),
                EnumPivotColumn::Average
            ]
        );
        assert_eq!(
            sheet.rows.iter().map(|r| r.parameter).collect::<Vec<_>>(),
            EnumParameter::ALL.to_vec()
        );

        let row_ph = sheet.row(EnumParameter::Ph).expect("ph row");
        assert_cells_close(&row_ph.cells, &[Some(7.0), Some(7.4), Some(7.2)]);
        let row_temperature = sheet.row(EnumParameter::Temperature).expect("temp row");
        assert_cells_close(&row_temperature.cells, &[Some(25.0), None, Some(25.0)]);
        let row_flow = sheet.row(EnumParameter::Flow).expect("flow row");
        assert_cells_close(&row_flow.cells, &[Some(1.2), Some(1.5), Some(1.35)]);

        assert_eq!(
            sheet.cell(EnumParameter::Temperature, EnumPivotColumn::Day(6)),
            None
        );
    }

    #[test]
    fn test_one_sheet_per_month_and_empty_sites_skipped() {
        let store = MeasurementStore::new();
        store
            .upsert_measurement(EnumSite::DrainB, date(2024, 2, 1), 7.0, None, 1.0)
            .expect("insert");
        store
            .upsert_measurement(EnumSite::DrainB, date(2023, 12, 31), 7.0, None, 1.0)
            .expect("insert");
        store
            .upsert_measurement(EnumSite::DrainA, date(2024, 2, 14), 6.9, Some(21.0), 0.3)
            .expect("insert");

        let workbook = build_workbook(&store);
        assert!(workbook.failures.is_empty());
        assert_eq!(
            workbook.sheet_names(),
            vec![
                "Drain A - 2024-02".to_string(),
                "Drain B - 2023-12".to_string(),
                "Drain B - 2024-02".to_string(),
            ]
        );

        assert!(build_pivot_sheets(&store, EnumSite::DrainC)
            .expect("empty site")
            .is_empty());
    }

    #[test]
    fn test_month_then_site_order() {
        let store = MeasurementStore::new();
        store
            .upsert_measurement(EnumSite::DrainB, date(2024, 1, 1), 7.0, None, 1.0)
            .expect("insert");
        store
            .upsert_measurement(EnumSite::DrainA, date(2024, 2, 1), 7.0, None, 1.0)
            .expect("insert");

        let workbook = build_workbook_ordered(&store, EnumSheetOrder::MonthThenSite);
        assert_eq!(
            workbook.sheet_names(),
            vec![
                "Drain B - 2024-01".to_string(),
                "Drain A - 2024-02".to_string()
            ]
        );
    }

    #[test]
    fn test_empty_store_builds_empty_workbook() {
        let workbook = build_workbook(&MeasurementStore::new());
        assert!(workbook.is_empty());
        assert!(workbook.failures.is_empty());
    }

    #[test]
    fn test_duplicate_day_isolated_to_site() {
        let source = RawSource {
            measurements: vec![
                SpecMeasurement::new(EnumSite::DrainA, date(2024, 1, 5), 7.0, None, 1.0),
                SpecMeasurement::new(EnumSite::DrainA, date(2024, 1, 5), 7.2, None, 1.1),
                SpecMeasurement::new(EnumSite::DrainC, date(2024, 1, 5), 6.0, None, 0.5),
            ],
            aggregates: vec![],
        };

        assert_eq!(
            build_pivot_sheets(&source, EnumSite::DrainA),
            Err(DuplicateDayError {
                site: EnumSite::DrainA,
                date: date(2024, 1, 5)
            })
        );

        let workbook = build_workbook(&source);
        assert_eq!(workbook.sheet_names(), vec!["Drain C - 2024-01".to_string()]);
        assert_eq!(workbook.failures.len(), 1);
        assert_eq!(workbook.failures[0].site, EnumSite::DrainA);
    }

    #[test]
    fn test_missing_aggregate_leaves_average_blank() {
        let source = RawSource {
            measurements: vec![SpecMeasurement::new(
                EnumSite::DrainD,
                date(2024, 6, 2),
                7.1,
                Some(28.0),
                0.9,
            )],
            aggregates: vec![],
        };

        let l_sheets = build_pivot_sheets(&source, EnumSite::DrainD).expect("pivot");
        for row in &l_sheets[0].rows {
            assert_eq!(row.cells.last().copied().flatten(), None);
        }
    }

    #[test]
    fn test_rebuild_without_mutation_is_identical() {
        let store = MeasurementStore::new();
        store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 5), 7.0, Some(25.0), 1.2)
            .expect("insert");
        store
            .upsert_measurement(EnumSite::DrainA, date(2024, 1, 6), 7.4, None, 1.5)
            .expect("insert");

        assert_eq!(build_workbook(&store), build_workbook(&store));
    }
}
