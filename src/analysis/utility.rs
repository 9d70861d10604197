//! Numeric helpers shared by the analysis stages.

use crate::error::{AnalysisError, AnalysisResult};

/// Adds `n` to `total`, failing instead of wrapping on overflow.
pub fn accumulate(total: &mut u64, n: u64, stage: &'static str, what: &str) -> AnalysisResult<()> {
    *total = total
        .checked_add(n)
        .ok_or_else(|| AnalysisError::CountOverflow {
            stage,
            what: what.to_string(),
        })?;
    Ok(())
}

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `part / total * 100`, or 0.0 when `total` is zero.
pub fn pct(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Scales `count` to a rate per one million of `population`.
pub fn per_million(count: u64, population: u64) -> f64 {
    count as f64 / population as f64 * 1_000_000.0
}
