//! Travel-time matrices produced by the routing engine.

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::{AccessError, Result};
use crate::types::TractId;

/// One origin/destination pair. A missing `travel_time` means the routing
/// engine found no path within its search horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelTime {
    pub from_id: TractId,
    pub to_id: TractId,
    pub travel_time: Option<f64>,
}

impl TravelTime {
    pub fn new(from_id: &str, to_id: &str, travel_time: Option<f64>) -> Self {
        Self {
            from_id: TractId::new(from_id),
            to_id: TractId::new(to_id),
            travel_time,
        }
    }

    /// Reachable means strictly below the threshold; a trip of exactly
    /// `threshold_minutes` does not count.
    pub fn is_reachable(&self, threshold_minutes: u32) -> bool {
        matches!(self.travel_time, Some(t) if t < f64::from(threshold_minutes))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TravelTimeMatrix {
    pub rows: Vec<TravelTime>,
}

impl TravelTimeMatrix {
    pub fn new(rows: Vec<TravelTime>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose destination is reachable from the origin within the threshold.
    pub fn reachable_within(&self, threshold_minutes: u32) -> impl Iterator<Item = &TravelTime> {
        self.rows
            .iter()
            .filter(move |row| row.is_reachable(threshold_minutes))
    }

    fn from_reader<R: Read>(reader: R, source: &Path) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let mut rows = Vec::new();

        for result in rdr.deserialize() {
            let row: TravelTime = result.map_err(|e| AccessError::csv(source, e))?;
            rows.push(row);
        }

        debug!(source = %source.display(), rows = rows.len(), "Travel-time matrix parsed");
        Ok(Self { rows })
    }
}

/// Reads a matrix CSV with `from_id,to_id,travel_time` columns.
pub fn read_matrix(path: &Path) -> Result<TravelTimeMatrix> {
    let file = std::fs::File::open(path).map_err(|e| AccessError::from_io(path, e))?;
    TravelTimeMatrix::from_reader(file, path)
}

/// Parses a matrix CSV held in memory, e.g. a routing engine response body.
pub fn parse_matrix(bytes: &[u8]) -> Result<TravelTimeMatrix> {
    TravelTimeMatrix::from_reader(bytes, Path::new("<response>"))
}

/// File name a matrix for `departure` is persisted under,
/// e.g. `transit_time_matrix_7am_April1_2025.csv`.
pub fn matrix_file_name(departure: NaiveDateTime) -> String {
    format!(
        "transit_time_matrix_{}.csv",
        departure.format("%-I%P_%B%-d_%Y")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_threshold_is_strict() {
        assert!(!TravelTime::new("A", "B", Some(45.0)).is_reachable(45));
        assert!(TravelTime::new("A", "B", Some(44.999)).is_reachable(45));
        assert!(TravelTime::new("A", "A", Some(0.0)).is_reachable(45));
        assert!(!TravelTime::new("A", "B", None).is_reachable(45));
        assert!(!TravelTime::new("A", "B", Some(f64::NAN)).is_reachable(45));
    }

    #[test]
    fn test_parse_matrix_keeps_ids_and_blank_times() {
        let body = b"from_id,to_id,travel_time\n01453001100,01453001200,12\n01453001100,01453001300,\n";
        let matrix = parse_matrix(body).unwrap();

        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.rows[0].from_id.as_str(), "01453001100");
        assert_eq!(matrix.rows[0].travel_time, Some(12.0));
        assert_eq!(matrix.rows[1].travel_time, None);
    }

    #[test]
    fn test_parse_matrix_rejects_bad_time() {
        let body = b"from_id,to_id,travel_time\nA,B,soon\n";
        assert!(matches!(parse_matrix(body), Err(AccessError::Csv { .. })));
    }

    #[test]
    fn test_read_matrix_missing_file() {
        let err = read_matrix(Path::new("/nonexistent/matrix.csv")).unwrap_err();
        assert!(matches!(err, AccessError::MissingFile(_)));
    }

    #[test]
    fn test_reachable_within_filters() {
        let matrix = TravelTimeMatrix::new(vec![
            TravelTime::new("A", "A", Some(0.0)),
            TravelTime::new("A", "B", Some(30.0)),
            TravelTime::new("A", "C", Some(50.0)),
        ]);
        let reachable: Vec<_> = matrix
            .reachable_within(45)
            .map(|row| row.to_id.as_str())
            .collect();
        assert_eq!(reachable, vec!["A", "B"]);
    }

    #[test]
    fn test_matrix_file_name() {
        let april = NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();
        let june = NaiveDate::from_ymd_opt(2017, 6, 16)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap();

        assert_eq!(
            matrix_file_name(april),
            "transit_time_matrix_7am_April1_2025.csv"
        );
        assert_eq!(
            matrix_file_name(june),
            "transit_time_matrix_7am_June16_2017.csv"
        );
    }
}
