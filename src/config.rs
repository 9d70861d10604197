//! Configuration file handling.
//!
//! Settings are read from an optional TOML file. Every field has a default,
//! so a missing file or a partial one is valid.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::risk::DEFAULT_HIGH_RISK_THRESHOLD;
use crate::error::{AnalysisError, AnalysisResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub population: PopulationConfig,
}

/// Where result artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output root directory, created if missing.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// File name of the per-country table.
    #[serde(default = "default_country_summary")]
    pub country_summary: String,

    /// File name of the per-capita risk table.
    #[serde(default = "default_risk_analysis")]
    pub risk_analysis: String,

    /// File name of the JSON summary.
    #[serde(default = "default_summary")]
    pub summary: String,

    /// Persist the summary next to the tables.
    #[serde(default = "default_write_summary")]
    pub write_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            country_summary: default_country_summary(),
            risk_analysis: default_risk_analysis(),
            summary: default_summary(),
            write_summary: default_write_summary(),
        }
    }
}

impl OutputConfig {
    pub fn country_summary_path(&self) -> PathBuf {
        self.dir.join(&self.country_summary)
    }

    pub fn risk_analysis_path(&self) -> PathBuf {
        self.dir.join(&self.risk_analysis)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(&self.summary)
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_country_summary() -> String {
    "country_summary.csv".to_string()
}

fn default_risk_analysis() -> String {
    "risk_analysis.csv".to_string()
}

fn default_summary() -> String {
    "summary.json".to_string()
}

fn default_write_summary() -> bool {
    true
}

/// Risk classification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_high_risk_threshold")]
    pub high_risk_cases_per_million: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            high_risk_cases_per_million: default_high_risk_threshold(),
        }
    }
}

fn default_high_risk_threshold() -> f64 {
    DEFAULT_HIGH_RISK_THRESHOLD
}

/// Population reference settings. Empty means "use the baseline table".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// CSV with `country,population` columns.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Inline `country = population` entries.
    #[serde(default)]
    pub countries: HashMap<String, u64>,
}

impl Config {
    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> AnalysisResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> AnalysisResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(AnalysisError::io("config", path))?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> AnalysisResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output.dir, PathBuf::from("outputs"));
        assert_eq!(
            config.output.country_summary_path(),
            PathBuf::from("outputs/country_summary.csv")
        );
        assert_eq!(config.risk.high_risk_cases_per_million, 50_000.0);
        assert!(config.population.file.is_none());
        assert!(config.output.write_summary);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
[output]
dir = "/tmp/run-1"

[risk]
high_risk_cases_per_million = 1000.0

[population.countries]
"US" = 331002651
"Mars" = 12
"#,
        )
        .unwrap();

        assert_eq!(config.output.dir, PathBuf::from("/tmp/run-1"));
        assert_eq!(config.output.risk_analysis, "risk_analysis.csv");
        assert_eq!(config.risk.high_risk_cases_per_million, 1000.0);
        assert_eq!(config.population.countries.get("Mars"), Some(&12));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[risk]\nhigh_risk_cases_per_million = \"lots\"").unwrap_err();
        assert!(matches!(err, crate::error::AnalysisError::Config(_)));
    }
}
