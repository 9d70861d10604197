//! CSV ingestion for outbreak observation tables.
//!
//! Header aliases are resolved here, once per table, into a [`Schema`].
//! Every later stage works against the canonical fields of [`Observation`].

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, error, info};

use crate::error::{AnalysisError, AnalysisResult};
use crate::model::{Column, Observation, RecordSet, Schema};

/// Accepted country headers, most preferred first.
pub const COUNTRY_COLUMNS: &[&str] = &["Country/Region", "Country"];
/// Accepted sub-region headers, most preferred first.
pub const REGION_COLUMNS: &[&str] = &["Province/State", "Province_State"];
/// Accepted date headers, most preferred first.
pub const DATE_COLUMNS: &[&str] = &["Date", "ObservationDate"];

/// Loads an observation table from a CSV file.
///
/// # Errors
///
/// Returns [`AnalysisError::MissingInput`] (listing the files that do exist
/// next to `path`) when the file is absent, and [`AnalysisError::LoadParse`]
/// when it cannot be read as an observation table.
#[tracing::instrument(skip(path), fields(path = %path.display()))]
pub fn load_records(path: &Path) -> AnalysisResult<RecordSet> {
    if !path.exists() {
        let available = sibling_files(path);
        error!(available = ?available, "Input file not found");
        return Err(AnalysisError::MissingInput {
            path: path.to_path_buf(),
            available,
        });
    }

    // The handle is dropped as soon as the table is materialised.
    let records = {
        let file = File::open(path).map_err(AnalysisError::io("load", path))?;
        read_records(file, path)?
    };

    let preview: Vec<_> = records.schema.headers.iter().take(5).collect();
    info!(
        rows = records.len(),
        columns = records.schema.headers.len(),
        first_columns = ?preview,
        "Data loaded"
    );

    Ok(records)
}

/// Reads an observation table from any CSV source. `origin` is only used
/// in error messages.
pub fn read_records<R: Read>(reader: R, origin: &Path) -> AnalysisResult<RecordSet> {
    let parse_err = |reason: String| AnalysisError::LoadParse {
        path: origin.to_path_buf(),
        reason,
    };

    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| parse_err(e.to_string()))?
        .clone();
    let schema = resolve_schema(&headers).map_err(parse_err)?;
    debug!(?schema, "Resolved input schema");

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| parse_err(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let obs = parse_observation(&schema, &record)
            .map_err(|reason| parse_err(format!("line {line}: {reason}")))?;
        rows.push(obs);
    }

    Ok(RecordSet::new(schema, rows))
}

/// Maps raw header names onto canonical columns.
///
/// Aliases are tried in preference order; a header that loses to a more
/// preferred alias is carried through as a pass-through column.
pub fn resolve_schema(headers: &StringRecord) -> Result<Schema, String> {
    let headers: Vec<String> = headers.iter().map(str::to_string).collect();

    let pick = |aliases: &[&str]| -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| headers.iter().position(|h| h == alias))
    };
    let pick_ci = |name: &str| -> Option<usize> {
        headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    };

    let country = pick(COUNTRY_COLUMNS)
        .ok_or_else(|| format!("missing country column (one of {COUNTRY_COLUMNS:?})"))?;
    let date =
        pick(DATE_COLUMNS).ok_or_else(|| format!("missing date column (one of {DATE_COLUMNS:?})"))?;
    let confirmed = pick_ci("confirmed").ok_or("missing column \"Confirmed\"")?;
    let deaths = pick_ci("deaths").ok_or("missing column \"Deaths\"")?;
    let region = pick(REGION_COLUMNS);
    let recovered = pick_ci("recovered");
    let active = pick_ci("active");

    let mut columns = Vec::with_capacity(headers.len());
    let mut extra = 0;
    for i in 0..headers.len() {
        let column = if i == country {
            Column::Country
        } else if i == date {
            Column::Date
        } else if i == confirmed {
            Column::Confirmed
        } else if i == deaths {
            Column::Deaths
        } else if region == Some(i) {
            Column::Region
        } else if recovered == Some(i) {
            Column::Recovered
        } else if active == Some(i) {
            Column::Active
        } else {
            extra += 1;
            Column::Extra(extra - 1)
        };
        columns.push(column);
    }

    Ok(Schema {
        country_column: headers[country].clone(),
        date_column: headers[date].clone(),
        region_column: region.map(|i| headers[i].clone()),
        has_recovered: recovered.is_some(),
        has_active: active.is_some(),
        headers,
        columns,
    })
}

fn parse_observation(schema: &Schema, record: &StringRecord) -> Result<Observation, String> {
    let mut obs = Observation {
        extra: Vec::with_capacity(schema.extra_count()),
        ..Default::default()
    };

    for (i, column) in schema.columns.iter().enumerate() {
        let cell = record.get(i).unwrap_or("");
        let name = &schema.headers[i];
        match column {
            Column::Country => {
                if cell.trim().is_empty() {
                    return Err(format!("empty value in required column {name:?}"));
                }
                obs.country = cell.to_string();
            }
            Column::Region => obs.region = non_blank(cell),
            Column::Date => obs.date = cell.to_string(),
            Column::Confirmed => obs.confirmed = parse_count(cell, name)?,
            Column::Deaths => obs.deaths = parse_count(cell, name)?,
            Column::Recovered => obs.recovered = parse_count(cell, name)?,
            Column::Active => obs.active = parse_count(cell, name)?,
            Column::Extra(_) => obs.extra.push(cell.to_string()),
        }
    }

    Ok(obs)
}

fn non_blank(cell: &str) -> Option<String> {
    if cell.trim().is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}

/// Parses a count cell. Blank and `NaN` cells are nulls; integral floats
/// such as `12.0` are accepted.
pub fn parse_count(cell: &str, column: &str) -> Result<Option<u64>, String> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    if let Ok(n) = cell.parse::<u64>() {
        return Ok(Some(n));
    }
    match cell.parse::<f64>() {
        // `u64::MAX as f64` rounds up to 2^64, which is itself out of range.
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => {
            Ok(Some(f as u64))
        }
        _ => Err(format!(
            "column {column:?} holds {cell:?}, expected a non-negative integer"
        )),
    }
}

fn sibling_files(path: &Path) -> Vec<String> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
