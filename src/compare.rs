//! Year-over-year comparison of accessibility summaries.
//!
//! Column names follow one scheme so that any consumer can locate a value by
//! tier, data year, threshold and normalization:
//!
//! | Column                     | Example               |
//! |----------------------------|-----------------------|
//! | accessible jobs            | `ALI17_45`            |
//! | difference                 | `ALI_diff_17_22_45`   |
//! | workers                    | `LI17_rac`            |
//! | jobs per worker            | `ALI17_45_n`          |
//! | jobs per worker difference | `ALI_diff_17_22_45_n` |

use std::collections::BTreeSet;
use tracing::info;

use crate::error::{AccessError, Result};
use crate::frame::ComparisonFrame;
use crate::types::{AccessibilitySummary, IncomeTier, JobTable, TierValues, TractId};

/// Default id column of comparison outputs.
pub const ORIGIN_ID_COLUMN: &str = "from_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Before,
    After,
}

/// A data year, labelled by its last two digits in column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub year: i32,
}

impl Period {
    pub fn new(year: i32) -> Self {
        Self { year }
    }

    pub fn label(&self) -> String {
        format!("{:02}", self.year.rem_euclid(100))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnScheme {
    pub threshold_minutes: u32,
    pub before: Period,
    pub after: Period,
}

impl ColumnScheme {
    /// Fails when both periods would share a label, since every column name
    /// would then be ambiguous.
    pub fn new(threshold_minutes: u32, before: Period, after: Period) -> Result<Self> {
        if before.label() == after.label() {
            return Err(AccessError::Config(format!(
                "periods {} and {} share the column label {}",
                before.year,
                after.year,
                before.label()
            )));
        }
        Ok(Self {
            threshold_minutes,
            before,
            after,
        })
    }

    pub fn period(&self, side: Side) -> Period {
        match side {
            Side::Before => self.before,
            Side::After => self.after,
        }
    }

    pub fn accessible(&self, side: Side, tier: IncomeTier) -> String {
        format!(
            "A{}{}_{}",
            tier.label(),
            self.period(side).label(),
            self.threshold_minutes
        )
    }

    pub fn difference(&self, tier: IncomeTier) -> String {
        format!(
            "A{}_diff_{}_{}_{}",
            tier.label(),
            self.before.label(),
            self.after.label(),
            self.threshold_minutes
        )
    }

    pub fn workers(&self, side: Side, tier: IncomeTier) -> String {
        format!("{}{}_rac", tier.label(), self.period(side).label())
    }

    pub fn normalized(&self, side: Side, tier: IncomeTier) -> String {
        format!("{}_n", self.accessible(side, tier))
    }

    pub fn normalized_difference(&self, tier: IncomeTier) -> String {
        format!("{}_n", self.difference(tier))
    }

    pub fn name(&self, column: Column) -> String {
        match column {
            Column::Accessible(side, tier) => self.accessible(side, tier),
            Column::Difference(tier) => self.difference(tier),
            Column::Workers(side, tier) => self.workers(side, tier),
            Column::Normalized(side, tier) => self.normalized(side, tier),
            Column::NormalizedDifference(tier) => self.normalized_difference(tier),
        }
    }
}

/// A value column of the comparison table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Accessible(Side, IncomeTier),
    Difference(IncomeTier),
    Workers(Side, IncomeTier),
    Normalized(Side, IncomeTier),
    NormalizedDifference(IncomeTier),
}

/// One tract of the outer join. A `None` side means the tract was absent
/// from that period's summary (or worker table).
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub tract_id: TractId,
    pub before: Option<TierValues>,
    pub after: Option<TierValues>,
    pub workers_before: Option<TierValues>,
    pub workers_after: Option<TierValues>,
}

impl ComparisonRow {
    fn accessible(&self, side: Side) -> Option<&TierValues> {
        match side {
            Side::Before => self.before.as_ref(),
            Side::After => self.after.as_ref(),
        }
    }

    fn workers(&self, side: Side) -> Option<&TierValues> {
        match side {
            Side::Before => self.workers_before.as_ref(),
            Side::After => self.workers_after.as_ref(),
        }
    }

    /// Missing operands make the result missing. Zero denominators give a
    /// non-finite value rather than an error.
    pub fn value(&self, column: Column) -> Option<f64> {
        match column {
            Column::Accessible(side, tier) => self.accessible(side)?.get(tier),
            Column::Difference(tier) => Some(
                self.value(Column::Accessible(Side::After, tier))?
                    - self.value(Column::Accessible(Side::Before, tier))?,
            ),
            Column::Workers(side, tier) => self.workers(side)?.get(tier),
            Column::Normalized(side, tier) => Some(
                self.value(Column::Accessible(side, tier))?
                    / self.value(Column::Workers(side, tier))?,
            ),
            Column::NormalizedDifference(tier) => Some(
                self.value(Column::Normalized(Side::After, tier))?
                    - self.value(Column::Normalized(Side::Before, tier))?,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    pub id_column: String,
    pub scheme: ColumnScheme,
    pub rows: Vec<ComparisonRow>,
    before_tiers: Vec<IncomeTier>,
    after_tiers: Vec<IncomeTier>,
    worker_tiers: Option<(Vec<IncomeTier>, Vec<IncomeTier>)>,
}

fn shared(a: &[IncomeTier], b: &[IncomeTier]) -> Vec<IncomeTier> {
    IncomeTier::ALL
        .into_iter()
        .filter(|tier| a.contains(tier) && b.contains(tier))
        .collect()
}

impl ComparisonTable {
    /// Value columns in output order.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        columns.extend(
            self.before_tiers
                .iter()
                .map(|&t| Column::Accessible(Side::Before, t)),
        );
        columns.extend(
            self.after_tiers
                .iter()
                .map(|&t| Column::Accessible(Side::After, t)),
        );
        columns.extend(
            shared(&self.before_tiers, &self.after_tiers)
                .into_iter()
                .map(Column::Difference),
        );

        if let Some((workers_before, workers_after)) = &self.worker_tiers {
            columns.extend(workers_before.iter().map(|&t| Column::Workers(Side::Before, t)));
            columns.extend(workers_after.iter().map(|&t| Column::Workers(Side::After, t)));

            let normalized_before = shared(&self.before_tiers, workers_before);
            let normalized_after = shared(&self.after_tiers, workers_after);
            columns.extend(
                normalized_before
                    .iter()
                    .map(|&t| Column::Normalized(Side::Before, t)),
            );
            columns.extend(
                normalized_after
                    .iter()
                    .map(|&t| Column::Normalized(Side::After, t)),
            );
            columns.extend(
                shared(&normalized_before, &normalized_after)
                    .into_iter()
                    .map(Column::NormalizedDifference),
            );
        }

        columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns()
            .into_iter()
            .map(|column| self.scheme.name(column))
            .collect()
    }

    pub fn is_normalized(&self) -> bool {
        self.worker_tiers.is_some()
    }

    pub fn row(&self, tract: &TractId) -> Option<&ComparisonRow> {
        self.rows
            .binary_search_by(|row| row.tract_id.cmp(tract))
            .ok()
            .map(|idx| &self.rows[idx])
    }

    /// Left-joins worker counts for both periods onto every row, enabling the
    /// jobs-per-worker columns.
    pub fn with_workers(mut self, before: &JobTable, after: &JobTable) -> Self {
        let mut unmatched = 0usize;
        for row in &mut self.rows {
            row.workers_before = before.get(&row.tract_id).copied();
            row.workers_after = after.get(&row.tract_id).copied();
            if row.workers_before.is_none() || row.workers_after.is_none() {
                unmatched += 1;
            }
        }
        info!(
            rows = self.rows.len(),
            unmatched, "Worker counts joined for normalization"
        );
        self.worker_tiers = Some((before.tiers.clone(), after.tiers.clone()));
        self
    }

    /// Flattens the table into named columns.
    pub fn to_frame(&self) -> Result<ComparisonFrame> {
        let columns = self.columns();
        let mut frame = ComparisonFrame::new(&self.id_column, self.column_names());
        for row in &self.rows {
            let values = columns.iter().map(|&column| row.value(column)).collect();
            frame.insert(row.tract_id.clone(), values)?;
        }
        Ok(frame)
    }
}

/// Aligns two accessibility summaries by tract id.
#[derive(Debug, Clone)]
pub struct Comparator {
    scheme: ColumnScheme,
    id_column: String,
}

impl Comparator {
    pub fn new(scheme: ColumnScheme) -> Self {
        Self {
            scheme,
            id_column: ORIGIN_ID_COLUMN.to_string(),
        }
    }

    pub fn with_id_column(mut self, id_column: &str) -> Self {
        self.id_column = id_column.to_string();
        self
    }

    /// Outer-joins `before` and `after`. Tracts present in only one period
    /// keep the other period's values missing.
    pub fn compare(
        &self,
        before: &AccessibilitySummary,
        after: &AccessibilitySummary,
    ) -> Result<ComparisonTable> {
        for summary in [before, after] {
            if summary.threshold_minutes != self.scheme.threshold_minutes {
                return Err(AccessError::Config(format!(
                    "summary threshold {} does not match comparison threshold {}",
                    summary.threshold_minutes, self.scheme.threshold_minutes
                )));
            }
        }

        let tracts: BTreeSet<&TractId> = before.rows.keys().chain(after.rows.keys()).collect();
        let rows: Vec<ComparisonRow> = tracts
            .into_iter()
            .map(|tract| ComparisonRow {
                tract_id: tract.clone(),
                before: before.get(tract).copied(),
                after: after.get(tract).copied(),
                workers_before: None,
                workers_after: None,
            })
            .collect();

        let before_only = rows.iter().filter(|r| r.after.is_none()).count();
        let after_only = rows.iter().filter(|r| r.before.is_none()).count();
        info!(
            tracts = rows.len(),
            before_only,
            after_only,
            threshold_minutes = self.scheme.threshold_minutes,
            "Accessibility compared"
        );

        Ok(ComparisonTable {
            id_column: self.id_column.clone(),
            scheme: self.scheme.clone(),
            rows,
            before_tiers: before.tiers.clone(),
            after_tiers: after.tiers.clone(),
            worker_tiers: None,
        })
    }
}
