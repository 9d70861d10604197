//! In-memory data model shared by every pipeline stage.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel written into empty sub-region cells by the cleaner.
pub const UNKNOWN_REGION: &str = "Unknown";

/// What a single input column holds once its header has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Region,
    Country,
    Date,
    Confirmed,
    Deaths,
    Recovered,
    Active,
    /// A column the pipeline carries through untouched; the index points
    /// into [`Observation::extra`].
    Extra(usize),
}

/// Schema descriptor of an ingested table.
///
/// Column-name aliases are resolved once by the loader; downstream stages
/// only consult the capability flags here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Original header names, in file order.
    pub headers: Vec<String>,
    /// Meaning of each header, parallel to `headers`.
    pub columns: Vec<Column>,
    pub country_column: String,
    pub date_column: String,
    pub region_column: Option<String>,
    pub has_recovered: bool,
    pub has_active: bool,
}

impl Schema {
    pub fn has_region(&self) -> bool {
        self.region_column.is_some()
    }

    /// Number of pass-through columns each observation carries.
    pub fn extra_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| matches!(c, Column::Extra(_)))
            .count()
    }
}

/// One raw row of outbreak counts for a place and date.
///
/// Counts are `None` when the cell was blank or the column is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Observation {
    pub region: Option<String>,
    pub country: String,
    pub date: String,
    pub confirmed: Option<u64>,
    pub deaths: Option<u64>,
    pub recovered: Option<u64>,
    pub active: Option<u64>,
    pub extra: Vec<String>,
}

impl Observation {
    pub fn confirmed(&self) -> u64 {
        self.confirmed.unwrap_or(0)
    }

    pub fn deaths(&self) -> u64 {
        self.deaths.unwrap_or(0)
    }

    pub fn recovered(&self) -> u64 {
        self.recovered.unwrap_or(0)
    }

    /// Renders the observation back into cells following `schema`'s header order.
    pub fn to_cells(&self, schema: &Schema) -> Vec<String> {
        fn count(v: Option<u64>) -> String {
            v.map(|n| n.to_string()).unwrap_or_default()
        }

        schema
            .columns
            .iter()
            .map(|column| match column {
                Column::Region => self.region.clone().unwrap_or_default(),
                Column::Country => self.country.clone(),
                Column::Date => self.date.clone(),
                Column::Confirmed => count(self.confirmed),
                Column::Deaths => count(self.deaths),
                Column::Recovered => count(self.recovered),
                Column::Active => count(self.active),
                Column::Extra(i) => self.extra.get(*i).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

/// A table of observations together with the schema it was loaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    pub schema: Schema,
    pub rows: Vec<Observation>,
}

impl RecordSet {
    pub fn new(schema: Schema, rows: Vec<Observation>) -> Self {
        Self { schema, rows }
    }

    /// A table with the same schema and the given rows.
    pub fn with_rows(&self, rows: Vec<Observation>) -> Self {
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.rows.iter()
    }
}

/// Per-country rollup of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryAggregate {
    #[serde(rename = "Country")]
    pub country: String,
    pub total_confirmed: u64,
    pub total_deaths: u64,
    pub total_recovered: u64,
    pub avg_daily_cases: f64,
    pub max_daily_cases: u64,
    pub num_records: usize,
}

/// A [`CountryAggregate`] joined with population and per-capita metrics.
///
/// Only countries with a known population get a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    #[serde(rename = "Country")]
    pub country: String,
    pub total_confirmed: u64,
    pub total_deaths: u64,
    pub total_recovered: u64,
    pub avg_daily_cases: f64,
    pub max_daily_cases: u64,
    pub num_records: usize,
    #[serde(rename = "Population")]
    pub population: u64,
    pub cases_per_million: f64,
    pub deaths_per_million: f64,
    pub high_risk: bool,
}

/// Dataset-wide totals and derived scalars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_cases: u64,
    pub total_deaths: u64,
    pub total_recovered: u64,
    pub countries_affected: usize,
    pub avg_cases_per_country: u64,
    pub avg_deaths_per_country: u64,
    pub case_fatality_rate: f64,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub data_span_days: i64,
}
