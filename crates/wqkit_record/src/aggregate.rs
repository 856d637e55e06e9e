//! Monthly mean derivation over daily measurements.

use std::collections::BTreeMap;

use crate::conf::N_DECIMALS_AGGREGATE;
use crate::spec::{EnumParameter, EnumSite, SpecMeasurement, SpecMonthKey, SpecMonthlyAggregate};

/// Round `x` half away from zero to `n_decimals` places.
pub fn round_decimals(x: f64, n_decimals: i32) -> f64 {
    let n_scale = 10f64.powi(n_decimals);
    (x * n_scale).round() / n_scale
}

/// Arithmetic mean over present values only; `None` when nothing is present.
pub fn calculate_mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (n_sum, n_count) = values
        .into_iter()
        .flatten()
        .fold((0.0f64, 0usize), |(n_sum, n_count), x| (n_sum + x, n_count + 1));

    if n_count == 0 {
        None
    } else {
        Some(n_sum / n_count as f64)
    }
}

/// Derive one aggregate per month that has at least one measurement of `site`.
///
/// Records of other sites are ignored. Means are rounded once, here.
pub fn derive_monthly_aggregates<'a, I>(
    site: EnumSite,
    measurements: I,
) -> BTreeMap<SpecMonthKey, SpecMonthlyAggregate>
where
    I: IntoIterator<Item = &'a SpecMeasurement>,
{
    let mut dict_groups: BTreeMap<SpecMonthKey, Vec<&SpecMeasurement>> = BTreeMap::new();
    for m in measurements.into_iter().filter(|m| m.site == site) {
        dict_groups.entry(m.key_month()).or_default().push(m);
    }

    dict_groups
        .into_iter()
        .map(|(key_month, l_group)| {
            let calc_avg = |parameter: EnumParameter| {
                calculate_mean(l_group.iter().map(|m| m.value(parameter)))
                    .map(|x| round_decimals(x, N_DECIMALS_AGGREGATE))
            };
            let aggregate = SpecMonthlyAggregate {
                site,
                year: key_month.year,
                month: key_month.month,
                avg_ph: calc_avg(EnumParameter::Ph),
                avg_temperature: calc_avg(EnumParameter::Temperature),
                avg_flow: calc_avg(EnumParameter::Flow),
                count_measurements: l_group.len(),
            };
            (key_month, aggregate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn measurement(
        site: EnumSite,
        ymd: (i32, u32, u32),
        ph: f64,
        temperature: Option<f64>,
        flow: f64,
    ) -> SpecMeasurement {
        SpecMeasurement::new(
            site,
            NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).expect("valid date"),
            ph,
            temperature,
            flow,
        )
    }

    #[test]
    fn test_round_decimals() {
        assert_eq!(round_decimals(7.12345, 3), 7.123);
        assert_eq!(round_decimals(7.1235, 2), 7.12);
        assert_eq!(round_decimals(-2.5, 0), -3.0);
    }

    #[test]
    fn test_calculate_mean_skips_absent_values() {
        assert_eq!(calculate_mean([Some(20.0), None]), Some(20.0));
        assert_eq!(calculate_mean([None, None]), None);
        assert_eq!(calculate_mean(Vec::<Option<f64>>::new()), None);
        assert_eq!(calculate_mean([Some(1.0), Some(2.0), Some(6.0)]), Some(3.0));
    }

    #[test]
    fn test_one_aggregate_per_non_empty_month() {
        let l_records = vec![
            measurement(EnumSite::DrainA, (2024, 1, 5), 7.0, Some(25.0), 1.2),
            measurement(EnumSite::DrainA, (2024, 1, 6), 7.4, None, 1.5),
            measurement(EnumSite::DrainA, (2024, 3, 1), 6.0, None, 0.5),
            measurement(EnumSite::DrainB, (2024, 2, 1), 8.0, Some(20.0), 2.0),
        ];

        let dict_aggregates = derive_monthly_aggregates(EnumSite::DrainA, &l_records);
        assert_eq!(
            dict_aggregates.keys().copied().collect::<Vec<_>>(),
            vec![SpecMonthKey::new(2024, 1), SpecMonthKey::new(2024, 3)]
        );

        let jan = &dict_aggregates[&SpecMonthKey::new(2024, 1)];
        assert!((jan.avg_ph.expect("avg ph") - 7.2).abs() < 1e-9);
        assert_eq!(jan.avg_temperature, Some(25.0));
        assert!((jan.avg_flow.expect("avg flow") - 1.35).abs() < 1e-9);
        assert_eq!(jan.count_measurements, 2);

        let mar = &dict_aggregates[&SpecMonthKey::new(2024, 3)];
        assert_eq!(mar.avg_temperature, None);
        assert_eq!(mar.count_measurements, 1);
    }

    #[test]
    fn test_aggregates_round_to_three_decimals() {
        let l_records = vec![
            measurement(EnumSite::DrainC, (2024, 5, 1), 7.0, None, 1.0),
            measurement(EnumSite::DrainC, (2024, 5, 2), 7.0, None, 1.0),
            measurement(EnumSite::DrainC, (2024, 5, 3), 7.1, None, 2.0),
        ];

        let dict_aggregates = derive_monthly_aggregates(EnumSite::DrainC, &l_records);
        let may = &dict_aggregates[&SpecMonthKey::new(2024, 5)];
        assert_eq!(may.avg_ph, Some(7.033));
        assert_eq!(may.avg_flow, Some(1.333));
    }

    #[test]
    fn test_no_measurements_no_aggregates() {
        let l_records: Vec<SpecMeasurement> = vec![];
        let dict_aggregates = derive_monthly_aggregates(EnumSite::DrainD, &l_records);
        assert!(dict_aggregates.is_empty());
    }
}
