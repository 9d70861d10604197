//! Error taxonomy for the analysis pipeline.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error(
        "load: input file not found at {}; available files: [{}]",
        .path.display(),
        .available.join(", ")
    )]
    MissingInput {
        path: PathBuf,
        available: Vec<String>,
    },
    #[error("load: cannot parse {}: {reason}", .path.display())]
    LoadParse { path: PathBuf, reason: String },
    #[error("population: {country:?} has a population of 0")]
    ZeroPopulation { country: String },
    #[error("{stage}: {what} overflows a 64-bit count")]
    CountOverflow { stage: &'static str, what: String },
    #[error("summary: cannot parse date {value:?} on row {row}")]
    DateParse { value: String, row: usize },
    #[error("config: invalid TOML")]
    Config(#[from] toml::de::Error),
    #[error("output: CSV write to {} failed", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("output: JSON write to {} failed", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{stage}: I/O error on {}: {source}", .path.display())]
    Io {
        stage: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnalysisError {
    /// Adapter for `map_err` that tags an I/O error with its stage and path.
    pub fn io(stage: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| AnalysisError::Io {
            stage,
            path,
            source,
        }
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
