//! Persistence of result tables and summaries.
//!
//! Artifacts are first staged as temporary files in the destination
//! directory and only renamed into place by [`StagedFile::publish`] or
//! [`publish_all`], so a run that fails part-way leaves no half-written
//! outputs behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::Serialize;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, error, info, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::model::{CountryAggregate, RecordSet, RiskRecord};

/// A row type with a fixed CSV header.
///
/// The header is written explicitly so that empty tables still carry it.
pub trait Tabular: Serialize {
    const HEADERS: &'static [&'static str];
}

impl Tabular for CountryAggregate {
    const HEADERS: &'static [&'static str] = &[
        "Country",
        "total_confirmed",
        "total_deaths",
        "total_recovered",
        "avg_daily_cases",
        "max_daily_cases",
        "num_records",
    ];
}

impl Tabular for RiskRecord {
    const HEADERS: &'static [&'static str] = &[
        "Country",
        "total_confirmed",
        "total_deaths",
        "total_recovered",
        "avg_daily_cases",
        "max_daily_cases",
        "num_records",
        "Population",
        "cases_per_million",
        "deaths_per_million",
        "high_risk",
    ];
}

/// A fully written artifact waiting to be moved to its destination.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    dest: PathBuf,
}

/// A published destination and the earlier file it replaced, if any.
type Published = (PathBuf, Option<TempPath>);

fn parent_dir(dest: &Path) -> &Path {
    match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

impl StagedFile {
    fn create(dest: &Path) -> AnalysisResult<Self> {
        let dir = parent_dir(dest);
        fs::create_dir_all(dir).map_err(AnalysisError::io("output", dir))?;
        Ok(Self {
            temp: NamedTempFile::new_in(dir).map_err(AnalysisError::io("output", dest))?,
            dest: dest.to_path_buf(),
        })
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Atomically replaces the destination with the staged content.
    pub fn publish(self) -> AnalysisResult<PathBuf> {
        self.temp
            .persist(&self.dest)
            .map_err(|e| AnalysisError::io("output", &self.dest)(e.error))?;
        info!(path = %self.dest.display(), "Output written");
        Ok(self.dest)
    }

    /// Publishes after moving any existing destination aside, so the move
    /// can be undone.
    fn publish_with_backup(self) -> AnalysisResult<Published> {
        let backup = if self.dest.is_file() {
            let backup = tempfile::Builder::new()
                .prefix(".prev")
                .tempfile_in(parent_dir(&self.dest))
                .map_err(AnalysisError::io("output", &self.dest))?
                .into_temp_path();
            fs::rename(&self.dest, &backup).map_err(AnalysisError::io("output", &self.dest))?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = self.temp.persist(&self.dest) {
            let err = AnalysisError::io("output", &self.dest)(e.error);
            // Nothing new reached the destination; only the original needs restoring.
            if backup.is_some() {
                rollback(vec![(self.dest, backup)]);
            }
            return Err(err);
        }
        info!(path = %self.dest.display(), "Output written");
        Ok((self.dest, backup))
    }
}

/// Publishes every staged file or none of them.
///
/// If any file fails to publish, the ones already moved into place are
/// removed again and the files they replaced are restored.
pub fn publish_all(staged: Vec<StagedFile>) -> AnalysisResult<Vec<PathBuf>> {
    let mut published: Vec<Published> = Vec::with_capacity(staged.len());
    for file in staged {
        match file.publish_with_backup() {
            Ok(entry) => published.push(entry),
            Err(e) => {
                rollback(published);
                return Err(e);
            }
        }
    }

    // Dropping the backups deletes them.
    Ok(published.into_iter().map(|(dest, _)| dest).collect())
}

fn rollback(published: Vec<Published>) {
    for (dest, backup) in published.into_iter().rev() {
        let undone = match backup {
            Some(prev) => prev.persist(&dest).map_err(|e| e.error),
            None => match fs::remove_file(&dest) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        match undone {
            Ok(()) => warn!(path = %dest.display(), "Output rolled back"),
            Err(e) => error!(path = %dest.display(), error = %e, "Failed to roll back output"),
        }
    }
}

/// Writes `rows` as CSV into a staged file for `dest`.
pub fn stage_table<T: Tabular>(dest: &Path, rows: &[T]) -> AnalysisResult<StagedFile> {
    let mut staged = StagedFile::create(dest)?;
    debug!(path = %dest.display(), rows = rows.len(), "Staging CSV table");
    let csv_err = |source: csv::Error| AnalysisError::Csv {
        path: dest.to_path_buf(),
        source,
    };

    {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(staged.temp.as_file_mut());
        writer.write_record(T::HEADERS).map_err(csv_err)?;
        for row in rows {
            writer.serialize(row).map_err(csv_err)?;
        }
        writer.flush().map_err(AnalysisError::io("output", dest))?;
    }

    Ok(staged)
}

/// Writes an observation table with its original header into a staged file.
pub fn stage_records(dest: &Path, table: &RecordSet) -> AnalysisResult<StagedFile> {
    let mut staged = StagedFile::create(dest)?;
    debug!(path = %dest.display(), rows = table.len(), "Staging observation table");
    let csv_err = |source: csv::Error| AnalysisError::Csv {
        path: dest.to_path_buf(),
        source,
    };

    {
        let mut writer = WriterBuilder::new().from_writer(staged.temp.as_file_mut());
        writer
            .write_record(&table.schema.headers)
            .map_err(csv_err)?;
        for obs in table.iter() {
            writer
                .write_record(obs.to_cells(&table.schema))
                .map_err(csv_err)?;
        }
        writer.flush().map_err(AnalysisError::io("output", dest))?;
    }

    Ok(staged)
}

/// Writes `value` as pretty JSON into a staged file.
pub fn stage_json(dest: &Path, value: &impl Serialize) -> AnalysisResult<StagedFile> {
    let mut staged = StagedFile::create(dest)?;
    let file = staged.temp.as_file_mut();
    serde_json::to_writer_pretty(&mut *file, value).map_err(|source| AnalysisError::Json {
        path: dest.to_path_buf(),
        source,
    })?;
    file.write_all(b"\n")
        .and_then(|()| file.flush())
        .map_err(AnalysisError::io("output", dest))?;
    Ok(staged)
}

/// Writes and publishes a table in one step.
pub fn write_table<T: Tabular>(dest: &Path, rows: &[T]) -> AnalysisResult<PathBuf> {
    stage_table(dest, rows)?.publish()
}

/// Writes and publishes an observation table in one step.
pub fn write_records(dest: &Path, table: &RecordSet) -> AnalysisResult<PathBuf> {
    stage_records(dest, table)?.publish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{obs, table};

    fn aggregate(country: &str) -> CountryAggregate {
        CountryAggregate {
            country: country.into(),
            total_confirmed: 30,
            total_deaths: 1,
            total_recovered: 2,
            avg_daily_cases: 15.0,
            max_daily_cases: 20,
            num_records: 2,
        }
    }

    #[test]
    fn test_write_table_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("country_summary.csv");

        write_table(&path, &[aggregate("Afghanistan"), aggregate("US")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines[0],
            "Country,total_confirmed,total_deaths,total_recovered,avg_daily_cases,max_daily_cases,num_records"
        );
        assert_eq!(lines[1], "Afghanistan,30,1,2,15.0,20,2");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk_analysis.csv");

        write_table::<RiskRecord>(&path, &[]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("Country,"));
        assert!(content.trim_end().ends_with("high_risk"));
    }

    #[test]
    fn test_staged_file_is_invisible_until_published() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        let staged = stage_table(&path, &[aggregate("US")]).unwrap();
        assert!(!path.exists());
        drop(staged);
        assert!(!path.exists());

        stage_table(&path, &[aggregate("US")]).unwrap().publish().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_records_uses_original_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtered.csv");

        write_records(&path, &table(vec![obs("US", "2020-03-01", 7, 1)])).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "Province/State,Country/Region,Date,Confirmed,Deaths,Recovered");
        assert_eq!(lines[1], "Unknown,US,2020-03-01,7,1,0");
    }

    #[test]
    fn test_stage_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");

        stage_json(&path, &aggregate("US")).unwrap().publish().unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["Country"], "US");
    }

    #[test]
    fn test_publish_all_replaces_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("country_summary.csv");
        let second = dir.path().join("summary.json");
        fs::write(&first, "old\n").unwrap();

        let paths = publish_all(vec![
            stage_table(&first, &[aggregate("US")]).unwrap(),
            stage_json(&second, &aggregate("US")).unwrap(),
        ])
        .unwrap();

        assert_eq!(paths, vec![first.clone(), second]);
        assert!(fs::read_to_string(&first).unwrap().starts_with("Country,"));
        // No staged or moved-aside files are left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_publish_all_restores_earlier_files_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("country_summary.csv");
        let second = dir.path().join("risk_analysis.csv");
        fs::write(&first, "old\n").unwrap();
        // A non-empty directory cannot be replaced by a file.
        fs::create_dir(&second).unwrap();
        fs::write(second.join("keep"), "x").unwrap();

        let staged = vec![
            stage_table(&first, &[aggregate("US")]).unwrap(),
            stage_table(&second, &[aggregate("US")]).unwrap(),
        ];
        let err = publish_all(staged).unwrap_err();

        assert!(matches!(err, AnalysisError::Io { stage: "output", .. }));
        assert_eq!(fs::read_to_string(&first).unwrap(), "old\n");
        assert!(second.join("keep").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_publish_all_removes_new_files_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("country_summary.csv");
        let second = dir.path().join("risk_analysis.csv");
        fs::create_dir(&second).unwrap();
        fs::write(second.join("keep"), "x").unwrap();

        let staged = vec![
            stage_table(&first, &[aggregate("US")]).unwrap(),
            stage_table(&second, &[aggregate("US")]).unwrap(),
        ];
        assert!(publish_all(staged).is_err());
        assert!(!first.exists());
    }
}
