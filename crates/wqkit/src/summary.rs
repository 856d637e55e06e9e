//! Plain-text listing of monthly aggregates.

use wqkit_record::{EnumSite, RecordSource, SpecMonthlyAggregate};

/// One line per `(site, month)` aggregate, sites in fixed order.
pub fn render_summary<S>(source: &S, site: Option<EnumSite>) -> Vec<String>
where
    S: RecordSource + ?Sized,
{
    let l_sites: Vec<EnumSite> = match site {
        Some(site) => vec![site],
        None => EnumSite::ALL.to_vec(),
    };

    l_sites
        .into_iter()
        .flat_map(|site| source.all_aggregates(site))
        .map(|aggregate| render_aggregate_line(&aggregate))
        .collect()
}

fn render_aggregate_line(aggregate: &SpecMonthlyAggregate) -> String {
    let fmt_value = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    format!(
        "{} {}: n={} pH={} suhu={} debit={}",
        aggregate.site,
        aggregate.key_month(),
        aggregate.count_measurements,
        fmt_value(aggregate.avg_ph),
        fmt_value(aggregate.avg_temperature),
        fmt_value(aggregate.avg_flow)
    )
}
