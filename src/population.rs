//! Population reference data consumed by the risk scorer.
//!
//! [`PopulationSource`] is the lookup seam; [`PopulationTable`] is the
//! in-memory implementation, built from the baseline sample, a
//! `country,population` CSV, or the `[population]` config section.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::PopulationConfig;
use crate::error::{AnalysisError, AnalysisResult};

/// Resolves a country name into its population.
pub trait PopulationSource {
    /// Exact-match lookup; `None` means the country is not covered.
    fn population(&self, country: &str) -> Option<u64>;

    /// Number of countries covered.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sample populations shipped as the default reference.
static BASELINE: &[(&str, u64)] = &[
    ("US", 331_002_651),
    ("India", 1_380_004_385),
    ("Brazil", 212_559_417),
    ("Russia", 145_934_462),
    ("France", 65_273_511),
    ("UK", 67_886_011),
    ("Turkey", 84_339_067),
    ("Italy", 60_461_826),
    ("Spain", 46_754_778),
    ("Germany", 83_783_942),
    ("Argentina", 45_195_774),
    ("Colombia", 50_882_891),
    ("Mexico", 128_932_753),
    ("Poland", 37_846_611),
    ("Iran", 83_992_949),
];

#[derive(Debug, Deserialize)]
struct PopulationRow {
    country: String,
    population: u64,
}

/// Map-backed population reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationTable {
    entries: HashMap<String, u64>,
}

impl PopulationTable {
    /// The built-in sample table.
    pub fn baseline() -> Self {
        BASELINE
            .iter()
            .map(|(country, pop)| (country.to_string(), *pop))
            .collect()
    }

    /// Loads a CSV with columns `country,population`.
    pub fn from_csv(path: &Path) -> AnalysisResult<Self> {
        let mut rdr = csv::Reader::from_path(path).map_err(|e| AnalysisError::LoadParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut table = Self::default();
        for result in rdr.deserialize::<PopulationRow>() {
            let row = result.map_err(|e| AnalysisError::LoadParse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            table.insert(row.country, row.population)?;
        }

        debug!(path = %path.display(), countries = table.len(), "Population reference loaded");
        Ok(table)
    }

    /// Builds the reference described by the `[population]` config section.
    ///
    /// The CSV file (if any) is loaded first and inline entries override it.
    /// With neither configured, the baseline table is used.
    pub fn from_config(config: &PopulationConfig) -> AnalysisResult<Self> {
        let mut table = match &config.file {
            Some(path) => Self::from_csv(path)?,
            None if config.countries.is_empty() => {
                info!(countries = BASELINE.len(), "Using baseline population reference");
                return Ok(Self::baseline());
            }
            None => Self::default(),
        };

        for (country, pop) in &config.countries {
            table.insert(country.clone(), *pop)?;
        }
        info!(countries = table.len(), "Using configured population reference");
        Ok(table)
    }

    /// Per-capita metrics are undefined for an empty population.
    fn insert(&mut self, country: String, population: u64) -> AnalysisResult<()> {
        if population == 0 {
            return Err(AnalysisError::ZeroPopulation { country });
        }
        self.entries.insert(country, population);
        Ok(())
    }
}

impl FromIterator<(String, u64)> for PopulationTable {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl PopulationSource for PopulationTable {
    fn population(&self, country: &str) -> Option<u64> {
        self.entries.get(country).copied()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_baseline_covers_fifteen_countries() {
        let table = PopulationTable::baseline();
        assert_eq!(table.len(), 15);
        assert_eq!(table.population("US"), Some(331_002_651));
        assert_eq!(table.population("us"), None);
    }

    #[test]
    fn test_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.csv");
        fs::write(&path, "country,population\nMars,1000\nVenus,20\n").unwrap();

        let table = PopulationTable::from_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.population("Mars"), Some(1000));
    }

    #[test]
    fn test_from_csv_rejects_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.csv");
        fs::write(&path, "country,population\nMars,lots\n").unwrap();

        assert!(matches!(
            PopulationTable::from_csv(&path),
            Err(AnalysisError::LoadParse { .. })
        ));
    }

    #[test]
    fn test_from_csv_rejects_zero_population() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.csv");
        fs::write(&path, "country,population\nMars,1000\nAtlantis,0\n").unwrap();

        match PopulationTable::from_csv(&path) {
            Err(AnalysisError::ZeroPopulation { country }) => assert_eq!(country, "Atlantis"),
            other => panic!("expected zero population error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_config_rejects_zero_population() {
        let config = PopulationConfig {
            file: None,
            countries: HashMap::from([("Atlantis".to_string(), 0)]),
        };

        assert!(matches!(
            PopulationTable::from_config(&config),
            Err(AnalysisError::ZeroPopulation { .. })
        ));
    }

    #[test]
    fn test_from_config_defaults_to_baseline() {
        let table = PopulationTable::from_config(&PopulationConfig::default()).unwrap();
        assert_eq!(table, PopulationTable::baseline());
    }

    #[test]
    fn test_from_config_inline_entries_replace_baseline() {
        let config = PopulationConfig {
            file: None,
            countries: HashMap::from([("Mars".to_string(), 5_000_000)]),
        };

        let table = PopulationTable::from_config(&config).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.population("US"), None);
    }
}
