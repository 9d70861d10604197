//! Dataset-wide summary statistics.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::info;

use crate::analysis::utility::{accumulate, pct};
use crate::error::{AnalysisError, AnalysisResult};
use crate::model::{RecordSet, SummaryStats};

/// Parses the calendar-date part of a date or date-time cell.
///
/// Accepts `YYYY-MM-DD`, `MM/DD/YYYY` and `MM/DD/YY`, optionally followed
/// by a time (space- or `T`-separated), which is discarded.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw
        .trim()
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()?;

    if day.contains('/') {
        let year_digits = day.rsplit('/').next().map_or(0, str::len);
        let fmt = if year_digits == 4 { "%m/%d/%Y" } else { "%m/%d/%y" };
        NaiveDate::parse_from_str(day, fmt).ok()
    } else {
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

/// Computes dataset-wide statistics over a cleaned table.
///
/// # Errors
///
/// Returns [`AnalysisError::DateParse`] for the first date cell that
/// [`parse_date`] rejects, and [`AnalysisError::CountOverflow`] when a
/// total does not fit in a `u64`.
#[tracing::instrument(skip(cleaned), fields(rows = cleaned.len()))]
pub fn summarize(cleaned: &RecordSet) -> AnalysisResult<SummaryStats> {
    let with_recovered = cleaned.schema.has_recovered;

    let mut total_cases = 0u64;
    let mut total_deaths = 0u64;
    let mut total_recovered = 0u64;
    let mut countries: HashSet<&str> = HashSet::new();
    let mut earliest: Option<NaiveDate> = None;
    let mut latest: Option<NaiveDate> = None;

    for (i, obs) in cleaned.iter().enumerate() {
        accumulate(&mut total_cases, obs.confirmed(), "summary", "total_cases")?;
        accumulate(&mut total_deaths, obs.deaths(), "summary", "total_deaths")?;
        if with_recovered {
            accumulate(&mut total_recovered, obs.recovered(), "summary", "total_recovered")?;
        }
        countries.insert(obs.country.as_str());

        let date = parse_date(&obs.date).ok_or_else(|| AnalysisError::DateParse {
            value: obs.date.clone(),
            row: i + 1,
        })?;
        earliest = Some(earliest.map_or(date, |d| d.min(date)));
        latest = Some(latest.map_or(date, |d| d.max(date)));
    }

    let countries_affected = countries.len();
    let (avg_cases_per_country, avg_deaths_per_country) = if countries_affected == 0 {
        (0, 0)
    } else {
        let n = countries_affected as u64;
        // The mean of per-country sums is the grand total over the country count.
        (total_cases / n, total_deaths / n)
    };

    let data_span_days = match (earliest, latest) {
        (Some(first), Some(last)) => (last - first).num_days(),
        _ => 0,
    };

    let stats = SummaryStats {
        total_cases,
        total_deaths,
        total_recovered,
        countries_affected,
        avg_cases_per_country,
        avg_deaths_per_country,
        case_fatality_rate: pct(total_deaths, total_cases),
        earliest_date: earliest,
        latest_date: latest,
        data_span_days,
    };

    info!(
        total_cases = stats.total_cases,
        total_deaths = stats.total_deaths,
        countries = stats.countries_affected,
        cfr = stats.case_fatality_rate,
        span_days = stats.data_span_days,
        "Summary computed"
    );

    Ok(stats)
}
