//! End-to-end composition of summarizer and comparator.

use tracing::{info, warn};

use crate::accessibility::summarize;
use crate::compare::{ColumnScheme, Comparator, ComparisonTable};
use crate::error::Result;
use crate::matrix::TravelTimeMatrix;
use crate::types::{AccessibilitySummary, JobTable};

/// Everything one period contributes to the comparison.
#[derive(Debug, Clone, Copy)]
pub struct PeriodInputs<'a> {
    pub matrix: &'a TravelTimeMatrix,
    pub jobs: &'a JobTable,
    pub workers: Option<&'a JobTable>,
}

/// Summarizes both periods at the scheme's threshold and compares them.
///
/// Per-worker columns are added only when both periods supply workers; with
/// one or none the comparison is returned without them.
pub fn build_accessibility_comparison(
    before: PeriodInputs<'_>,
    after: PeriodInputs<'_>,
    scheme: &ColumnScheme,
) -> Result<ComparisonTable> {
    let threshold = scheme.threshold_minutes;
    let acc_before: AccessibilitySummary = summarize(before.matrix, before.jobs, threshold);
    let acc_after: AccessibilitySummary = summarize(after.matrix, after.jobs, threshold);
    info!(
        before_origins = acc_before.len(),
        after_origins = acc_after.len(),
        threshold,
        "Both periods summarized"
    );

    let table = Comparator::new(scheme.clone()).compare(&acc_before, &acc_after)?;

    Ok(match (before.workers, after.workers) {
        (Some(workers_before), Some(workers_after)) => {
            table.with_workers(workers_before, workers_after)
        }
        (None, None) => table,
        _ => {
            warn!("Worker counts supplied for only one period, skipping normalization");
            table
        }
    })
}
