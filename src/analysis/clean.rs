//! Missing-value filling and duplicate removal.

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::model::{RecordSet, UNKNOWN_REGION};

/// Diagnostics produced while cleaning. Observational only.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub nulls_filled: usize,
    pub duplicates_removed: usize,
}

/// Zero-fills missing counts, fills missing sub-regions with `"Unknown"`,
/// and drops exact duplicate rows (first occurrence wins).
pub fn clean(raw: &RecordSet) -> RecordSet {
    clean_with_report(raw).0
}

/// Same as [`clean`], also returning what was changed.
#[tracing::instrument(skip(raw), fields(rows = raw.len()))]
pub fn clean_with_report(raw: &RecordSet) -> (RecordSet, CleanReport) {
    let schema = &raw.schema;
    let mut nulls_filled = 0;

    let fill = |slot: &mut Option<u64>, present: bool, filled: &mut usize| {
        if present && slot.is_none() {
            *slot = Some(0);
            *filled += 1;
        }
    };

    let filled = raw.iter().cloned().map(|mut obs| {
        fill(&mut obs.confirmed, true, &mut nulls_filled);
        fill(&mut obs.deaths, true, &mut nulls_filled);
        fill(&mut obs.recovered, schema.has_recovered, &mut nulls_filled);
        fill(&mut obs.active, schema.has_active, &mut nulls_filled);
        if schema.has_region() && obs.region.is_none() {
            obs.region = Some(UNKNOWN_REGION.to_string());
            nulls_filled += 1;
        }
        obs
    });

    let mut seen = HashSet::with_capacity(raw.len());
    let mut rows = Vec::with_capacity(raw.len());
    for obs in filled {
        if !seen.contains(&obs) {
            seen.insert(obs.clone());
            rows.push(obs);
        }
    }

    let report = CleanReport {
        rows_before: raw.len(),
        rows_after: rows.len(),
        nulls_filled,
        duplicates_removed: raw.len() - rows.len(),
    };

    info!(
        nulls_filled = report.nulls_filled,
        duplicates_removed = report.duplicates_removed,
        rows_before = report.rows_before,
        rows_after = report.rows_after,
        "Data cleaned"
    );

    (raw.with_rows(rows), report)
}
