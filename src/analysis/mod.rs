//! Outbreak table analysis stages.
//!
//! Cleaning, filtering, per-country aggregation, per-capita risk scoring
//! and dataset-wide summarization. Every stage borrows its input table and
//! returns a new one.

pub mod aggregate;
pub mod clean;
pub mod filter;
pub mod risk;
pub mod summary;
pub mod utility;
