//! Per-capita risk scoring against a population reference.

use tracing::{info, warn};

use crate::analysis::utility::per_million;
use crate::model::{CountryAggregate, RiskRecord};
use crate::population::PopulationSource;

/// Cases per million above which a country is flagged high-risk.
pub const DEFAULT_HIGH_RISK_THRESHOLD: f64 = 50_000.0;

/// Strictly above the threshold is high-risk.
pub fn is_high_risk(cases_per_million: f64, threshold: f64) -> bool {
    cases_per_million > threshold
}

/// Joins country aggregates with population data into per-capita risk records.
pub struct RiskScorer {
    population: Box<dyn PopulationSource>,
    high_risk_threshold: f64,
}

impl RiskScorer {
    pub fn new(population: Box<dyn PopulationSource>, high_risk_threshold: f64) -> Self {
        Self {
            population,
            high_risk_threshold,
        }
    }

    pub fn high_risk_threshold(&self) -> f64 {
        self.high_risk_threshold
    }

    /// Scores every aggregate whose country has a known population.
    ///
    /// Countries missing from the reference, or listed with a population of
    /// zero, are dropped rather than kept with empty metrics. Input order is
    /// preserved.
    #[tracing::instrument(skip_all, fields(aggregates = aggregates.len()))]
    pub fn score(&self, aggregates: &[CountryAggregate]) -> Vec<RiskRecord> {
        let records: Vec<RiskRecord> = aggregates
            .iter()
            .filter_map(|agg| {
                let population = self
                    .population
                    .population(&agg.country)
                    .filter(|&p| p > 0)?;
                let cases_per_million = per_million(agg.total_confirmed, population);
                Some(RiskRecord {
                    country: agg.country.clone(),
                    total_confirmed: agg.total_confirmed,
                    total_deaths: agg.total_deaths,
                    total_recovered: agg.total_recovered,
                    avg_daily_cases: agg.avg_daily_cases,
                    max_daily_cases: agg.max_daily_cases,
                    num_records: agg.num_records,
                    population,
                    cases_per_million,
                    deaths_per_million: per_million(agg.total_deaths, population),
                    high_risk: is_high_risk(cases_per_million, self.high_risk_threshold),
                })
            })
            .collect();

        let high_risk = records.iter().filter(|r| r.high_risk).count();
        info!(
            scored = records.len(),
            considered = aggregates.len(),
            high_risk,
            threshold = self.high_risk_threshold,
            "Risk scoring complete"
        );
        if records.is_empty() {
            warn!(
                reference_size = self.population.len(),
                "No countries matched the population reference"
            );
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::PopulationTable;

    fn aggregate(country: &str, confirmed: u64, deaths: u64) -> CountryAggregate {
        CountryAggregate {
            country: country.into(),
            total_confirmed: confirmed,
            total_deaths: deaths,
            total_recovered: 0,
            avg_daily_cases: confirmed as f64,
            max_daily_cases: confirmed,
            num_records: 1,
        }
    }

    fn scorer(entries: &[(&str, u64)]) -> RiskScorer {
        let table: PopulationTable = entries
            .iter()
            .map(|(c, p)| (c.to_string(), *p))
            .collect();
        RiskScorer::new(Box::new(table), DEFAULT_HIGH_RISK_THRESHOLD)
    }

    #[test]
    fn test_is_high_risk_boundary() {
        assert!(!is_high_risk(50_000.0, 50_000.0));
        assert!(is_high_risk(50_000.1, 50_000.0));
    }

    #[test]
    fn test_country_without_population_is_dropped() {
        let records = scorer(&[("US", 1_000_000)]).score(&[aggregate("Mars", 100, 1)]);
        assert!(records.iter().all(|r| r.country != "Mars"));
        assert!(records.is_empty());
    }

    #[test]
    fn test_per_million_metrics() {
        let records = scorer(&[("Tiny", 2_000_000)]).score(&[aggregate("Tiny", 200_000, 500)]);

        let r = &records[0];
        assert_eq!(r.population, 2_000_000);
        assert_eq!(r.cases_per_million, 100_000.0);
        assert_eq!(r.deaths_per_million, 250.0);
        assert!(r.high_risk);
    }

    #[test]
    fn test_low_rate_is_not_high_risk() {
        let records = scorer(&[("Big", 1_000_000_000)]).score(&[aggregate("Big", 1_000, 10)]);
        assert!(!records[0].high_risk);
    }

    #[test]
    fn test_zero_population_is_dropped() {
        let records = scorer(&[("Ghost", 0), ("US", 1_000_000)])
            .score(&[aggregate("Ghost", 5, 1), aggregate("US", 5, 1)]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].country, "US");
        assert!(records[0].cases_per_million.is_finite());
    }

    #[test]
    fn test_order_preserved_and_unmatched_skipped() {
        let records = scorer(&[("A", 10), ("C", 10)]).score(&[
            aggregate("A", 3, 0),
            aggregate("B", 2, 0),
            aggregate("C", 1, 0),
        ]);

        let names: Vec<_> = records.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[test]
    fn test_empty_reference_yields_empty_output() {
        let records = scorer(&[]).score(&[aggregate("US", 10, 1)]);
        assert!(records.is_empty());
    }

    #[test]
    fn test_custom_threshold() {
        let table: PopulationTable = [("X".to_string(), 1_000_000)].into_iter().collect();
        let records = RiskScorer::new(Box::new(table), 10.0).score(&[aggregate("X", 11, 0)]);
        assert!(records[0].high_risk);
    }
}
