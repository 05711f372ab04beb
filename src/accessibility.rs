//! Threshold-based job accessibility.

use std::collections::BTreeMap;
use tracing::debug;

use crate::matrix::TravelTimeMatrix;
use crate::types::{AccessibilitySummary, JobTable, TierValues, TractId};

/// Sums, for every origin, the job counts of all destinations reachable in
/// under `threshold_minutes`.
///
/// Destinations missing from `jobs` contribute zero. Origins that reach no
/// destination at all are left out of the summary.
pub fn summarize(
    matrix: &TravelTimeMatrix,
    jobs: &JobTable,
    threshold_minutes: u32,
) -> AccessibilitySummary {
    let mut rows: BTreeMap<TractId, TierValues> = BTreeMap::new();
    let mut reachable_pairs = 0usize;

    for pair in matrix.reachable_within(threshold_minutes) {
        reachable_pairs += 1;
        let totals = rows
            .entry(pair.from_id.clone())
            .or_insert_with(|| TierValues::zeroed(&jobs.tiers));

        let Some(destination) = jobs.get(&pair.to_id) else {
            continue;
        };
        for &tier in &jobs.tiers {
            if let Some(count) = destination.get(tier) {
                totals.add(tier, count);
            }
        }
    }

    debug!(
        threshold_minutes,
        matrix_rows = matrix.len(),
        reachable_pairs,
        origins = rows.len(),
        "Accessibility summarized"
    );

    AccessibilitySummary {
        threshold_minutes,
        tiers: jobs.tiers.clone(),
        rows,
    }
}
