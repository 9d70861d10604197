//! Row selection by country or confirmed-case threshold.

use tracing::{debug, warn};

use crate::model::RecordSet;

/// Rows whose country equals `name` exactly (case-sensitive).
///
/// An empty result is not an error; it is logged and returned as an empty table.
#[tracing::instrument(skip(table), fields(rows = table.len()))]
pub fn filter_by_country(table: &RecordSet, name: &str) -> RecordSet {
    let rows: Vec<_> = table.iter().filter(|o| o.country == name).cloned().collect();

    if rows.is_empty() {
        warn!(country = name, "No rows matched country filter");
    } else {
        debug!(country = name, matched = rows.len(), "Country filter applied");
    }

    table.with_rows(rows)
}

/// Rows with `confirmed > threshold` (strict).
#[tracing::instrument(skip(table), fields(rows = table.len()))]
pub fn filter_by_threshold(table: &RecordSet, threshold: u64) -> RecordSet {
    let rows: Vec<_> = table
        .iter()
        .filter(|o| o.confirmed() > threshold)
        .cloned()
        .collect();

    if rows.is_empty() {
        warn!(threshold, "No rows exceeded confirmed-case threshold");
    } else {
        debug!(threshold, matched = rows.len(), "Threshold filter applied");
    }

    table.with_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{obs, table};

    #[test]
    fn test_filter_by_country_exact_match() {
        let t = table(vec![
            obs("US", "2020-03-01", 1, 0),
            obs("us", "2020-03-01", 2, 0),
            obs("US", "2020-03-02", 3, 0),
        ]);

        let us = filter_by_country(&t, "US");
        assert_eq!(us.len(), 2);
        assert!(us.iter().all(|o| o.country == "US"));
    }

    #[test]
    fn test_filter_by_country_no_match_is_empty() {
        let t = table(vec![obs("US", "2020-03-01", 1, 0)]);
        let none = filter_by_country(&t, "Atlantis");

        assert!(none.is_empty());
        assert_eq!(none.schema, t.schema);
    }

    #[test]
    fn test_filter_by_threshold_is_strict() {
        let t = table(vec![
            obs("A", "2020-03-01", 9999, 0),
            obs("B", "2020-03-01", 10000, 0),
            obs("C", "2020-03-01", 10001, 0),
        ]);

        let over = filter_by_threshold(&t, 10000);
        assert_eq!(over.len(), 1);
        assert_eq!(over.rows[0].confirmed, Some(10001));
    }

    #[test]
    fn test_filter_by_threshold_partitions_rows() {
        let values = [0, 3, 7, 7, 8, 100];
        let t = table(
            values
                .iter()
                .enumerate()
                .map(|(i, &c)| obs(&format!("C{i}"), "2020-03-01", c, 0))
                .collect(),
        );

        let kept = filter_by_threshold(&t, 7);
        assert!(kept.iter().all(|o| o.confirmed() > 7));
        let excluded: Vec<_> = t.iter().filter(|o| !kept.rows.contains(o)).collect();
        assert!(excluded.iter().all(|o| o.confirmed() <= 7));
        assert_eq!(kept.len() + excluded.len(), t.len());
    }
}
