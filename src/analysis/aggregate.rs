//! Per-country rollup of cleaned observations.

use std::collections::HashMap;

use tracing::info;

use crate::analysis::utility::{accumulate, mean};
use crate::error::AnalysisResult;
use crate::model::{CountryAggregate, RecordSet};

/// Running totals for one country while rows are folded in.
#[derive(Default)]
struct CountryGroup {
    total_confirmed: u64,
    total_deaths: u64,
    total_recovered: u64,
    max_daily_cases: u64,
    daily_cases: Vec<f64>,
}

/// Groups a cleaned table by country into [`CountryAggregate`] rows.
///
/// Country names are compared exactly, so `"US"` and `"us"` are separate
/// groups. The result is ordered by `total_confirmed` descending; countries
/// with equal totals keep the order in which they first appear in `cleaned`.
///
/// # Errors
///
/// Returns [`AnalysisError::CountOverflow`](crate::error::AnalysisError::CountOverflow)
/// when a country's totals do not fit in a `u64`.
#[tracing::instrument(skip(cleaned), fields(rows = cleaned.len()))]
pub fn aggregate_by_country(cleaned: &RecordSet) -> AnalysisResult<Vec<CountryAggregate>> {
    let with_recovered = cleaned.schema.has_recovered;

    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, CountryGroup> = HashMap::new();

    for obs in cleaned.iter() {
        let group = groups.entry(obs.country.as_str()).or_insert_with(|| {
            order.push(obs.country.as_str());
            CountryGroup::default()
        });

        let confirmed = obs.confirmed();
        accumulate(&mut group.total_confirmed, confirmed, "aggregate", &obs.country)?;
        accumulate(&mut group.total_deaths, obs.deaths(), "aggregate", &obs.country)?;
        if with_recovered {
            accumulate(&mut group.total_recovered, obs.recovered(), "aggregate", &obs.country)?;
        }
        group.max_daily_cases = group.max_daily_cases.max(confirmed);
        group.daily_cases.push(confirmed as f64);
    }

    let mut aggregates: Vec<CountryAggregate> = order
        .into_iter()
        .filter_map(|country| {
            let group = groups.remove(country)?;
            Some(CountryAggregate {
                country: country.to_string(),
                total_confirmed: group.total_confirmed,
                total_deaths: group.total_deaths,
                total_recovered: group.total_recovered,
                avg_daily_cases: mean(&group.daily_cases),
                max_daily_cases: group.max_daily_cases,
                num_records: group.daily_cases.len(),
            })
        })
        .collect();

    // `sort_by` is stable, preserving first-appearance order among ties.
    aggregates.sort_by(|a, b| b.total_confirmed.cmp(&a.total_confirmed));

    info!(countries = aggregates.len(), "Aggregated by country");
    Ok(aggregates)
}

/// The `n` countries with the most confirmed cases.
pub fn top_countries(aggregates: &[CountryAggregate], n: usize) -> &[CountryAggregate] {
    &aggregates[..n.min(aggregates.len())]
}
