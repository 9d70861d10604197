//! End-to-end run: clean, aggregate, score, summarize, write.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::analysis::aggregate::aggregate_by_country;
use crate::analysis::clean::clean;
use crate::analysis::risk::RiskScorer;
use crate::analysis::summary::summarize;
use crate::config::{Config, OutputConfig};
use crate::error::AnalysisResult;
use crate::loader::load_records;
use crate::model::{CountryAggregate, RecordSet, RiskRecord, SummaryStats};
use crate::output::{publish_all, stage_json, stage_table};
use crate::population::PopulationTable;

/// Everything a successful run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub aggregates: Vec<CountryAggregate>,
    pub risk: Vec<RiskRecord>,
    pub summary: SummaryStats,
    pub country_summary_path: PathBuf,
    pub risk_analysis_path: PathBuf,
    pub summary_path: Option<PathBuf>,
}

pub struct Pipeline {
    output: OutputConfig,
    scorer: RiskScorer,
}

impl Pipeline {
    pub fn new(output: OutputConfig, scorer: RiskScorer) -> Self {
        Self { output, scorer }
    }

    /// Builds a pipeline from configuration, loading the population reference.
    pub fn from_config(config: &Config) -> AnalysisResult<Self> {
        let population = PopulationTable::from_config(&config.population)?;
        let scorer = RiskScorer::new(
            Box::new(population),
            config.risk.high_risk_cases_per_million,
        );
        Ok(Self::new(config.output.clone(), scorer))
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// Loads `input` and runs the full pipeline over it.
    pub fn run_file(&self, input: &Path) -> AnalysisResult<PipelineReport> {
        let raw = load_records(input)?;
        self.run(&raw)
    }

    /// Runs every stage over `raw` and writes the result tables.
    ///
    /// All outputs are staged before any is published, and published as a
    /// set. The summary does not feed the tables, so a date error still
    /// publishes both tables; any summary left by an earlier run is then
    /// removed so it cannot be mistaken for this run's.
    #[tracing::instrument(skip_all, fields(rows = raw.len(), output_dir = %self.output.dir.display()))]
    pub fn run(&self, raw: &RecordSet) -> AnalysisResult<PipelineReport> {
        let cleaned = clean(raw);

        let aggregates = aggregate_by_country(&cleaned)?;
        let risk = self.scorer.score(&aggregates);

        let country_summary_path = self.output.country_summary_path();
        let risk_analysis_path = self.output.risk_analysis_path();
        let mut staged = vec![
            stage_table(&country_summary_path, &aggregates)?,
            stage_table(&risk_analysis_path, &risk)?,
        ];

        let summary = match summarize(&cleaned) {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "Summary step failed; writing country and risk tables only");
                publish_all(staged)?;
                self.discard_stale_summary();
                return Err(e);
            }
        };

        let summary_path = if self.output.write_summary {
            let path = self.output.summary_path();
            staged.push(stage_json(&path, &summary)?);
            Some(path)
        } else {
            None
        };
        publish_all(staged)?;

        if risk.len() < aggregates.len() {
            warn!(
                missing = aggregates.len() - risk.len(),
                "Countries without population data were left out of the risk table"
            );
        }
        info!(
            countries = aggregates.len(),
            scored = risk.len(),
            "Pipeline complete"
        );

        Ok(PipelineReport {
            aggregates,
            risk,
            summary,
            country_summary_path,
            risk_analysis_path,
            summary_path,
        })
    }

    fn discard_stale_summary(&self) {
        let path = self.output.summary_path();
        match fs::remove_file(&path) {
            Ok(()) => warn!(path = %path.display(), "Removed summary left by an earlier run"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!(path = %path.display(), error = %e, "Failed to remove stale summary"),
        }
    }
}
