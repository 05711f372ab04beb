//! Column-named view of a comparison table, as written to and read back
//! from `accessibility_comparison.csv`.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{AccessError, Result};
use crate::loaders::{column_index, open_reader, read_headers};
use crate::types::TractId;

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonFrame {
    id_column: String,
    columns: Vec<String>,
    rows: BTreeMap<TractId, Vec<Option<f64>>>,
}

impl ComparisonFrame {
    pub fn new(id_column: &str, columns: Vec<String>) -> Self {
        Self {
            id_column: id_column.to_string(),
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// Inserts one row, returning the row it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::Config`] when `values` does not line up with
    /// [`Self::columns`].
    pub fn insert(
        &mut self,
        tract: TractId,
        values: Vec<Option<f64>>,
    ) -> Result<Option<Vec<Option<f64>>>> {
        if values.len() != self.columns.len() {
            return Err(AccessError::Config(format!(
                "row {} has {} values for {} columns",
                tract,
                values.len(),
                self.columns.len()
            )));
        }
        Ok(self.rows.insert(tract, values))
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn get(&self, tract: &TractId) -> Option<&[Option<f64>]> {
        self.rows.get(tract).map(Vec::as_slice)
    }

    pub fn value(&self, tract: &TractId, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(tract)?.get(idx).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TractId, &[Option<f64>])> {
        self.rows.iter().map(|(id, values)| (id, values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads a comparison CSV. The id column stays a string; every other cell
/// is coerced to a number, with blanks and unparsable text becoming missing.
pub fn read_frame(path: &Path, id_column: &str) -> Result<ComparisonFrame> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let id_idx = column_index(&headers, path, id_column)?;

    let value_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != id_idx)
        .map(|(idx, name)| (idx, name.to_string()))
        .collect();

    let mut frame = ComparisonFrame::new(
        id_column,
        value_columns.iter().map(|(_, name)| name.clone()).collect(),
    );

    for record in reader.records() {
        let record = record.map_err(|e| AccessError::csv(path, e))?;
        let id = record.get(id_idx).unwrap_or("");
        if id.is_empty() {
            warn!(path = %path.display(), "Skipping comparison row without an id");
            continue;
        }

        let values = value_columns
            .iter()
            .map(|(idx, _)| record.get(*idx).and_then(|cell| cell.parse::<f64>().ok()))
            .collect();
        if frame.insert(TractId::new(id), values)?.is_some() {
            warn!(path = %path.display(), tract = id, "Duplicate comparison row, keeping the later one");
        }
    }

    debug!(path = %path.display(), rows = frame.len(), columns = frame.columns().len(), "Comparison frame read");
    Ok(frame)
}
