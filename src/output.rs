//! CSV persistence for matrices, summaries, comparisons and joined tracts.
//!
//! Missing values are written as empty cells; non-finite values keep their
//! textual form (`inf`, `NaN`) so readers can tell them apart from gaps.

use csv::{Writer, WriterBuilder};
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

use crate::error::{AccessError, Result};
use crate::frame::ComparisonFrame;
use crate::geometry::JoinedTract;
use crate::matrix::TravelTimeMatrix;
use crate::types::AccessibilitySummary;

/// Renders one cell: empty for missing, Rust's float formatting otherwise.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

fn create_writer(path: &Path) -> Result<Writer<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AccessError::from_io(parent, e))?;
    }
    WriterBuilder::new()
        .from_path(path)
        .map_err(|e| AccessError::csv(path, e))
}

fn finish(mut writer: Writer<File>, path: &Path, rows: usize) -> Result<()> {
    writer.flush().map_err(|e| AccessError::from_io(path, e))?;
    info!(path = %path.display(), rows, "CSV written");
    Ok(())
}

pub fn write_matrix(path: &Path, matrix: &TravelTimeMatrix) -> Result<()> {
    let mut writer = create_writer(path)?;
    for row in &matrix.rows {
        writer.serialize(row).map_err(|e| AccessError::csv(path, e))?;
    }
    finish(writer, path, matrix.len())
}

/// Writes a summary with the id column followed by the LODES column name of
/// each available tier.
pub fn write_summary(path: &Path, summary: &AccessibilitySummary, id_column: &str) -> Result<()> {
    let mut writer = create_writer(path)?;

    let mut header = vec![id_column.to_string()];
    header.extend(summary.tiers.iter().map(|t| t.lodes_column().to_string()));
    writer
        .write_record(&header)
        .map_err(|e| AccessError::csv(path, e))?;

    for (origin, values) in &summary.rows {
        let mut record = vec![origin.to_string()];
        record.extend(summary.tiers.iter().map(|&t| format_value(values.get(t))));
        writer
            .write_record(&record)
            .map_err(|e| AccessError::csv(path, e))?;
    }

    finish(writer, path, summary.len())
}

pub fn write_frame(path: &Path, frame: &ComparisonFrame) -> Result<()> {
    let mut writer = create_writer(path)?;

    let mut header = vec![frame.id_column().to_string()];
    header.extend(frame.columns().iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| AccessError::csv(path, e))?;

    for (tract, values) in frame.iter() {
        let mut record = vec![tract.to_string()];
        record.extend(values.iter().map(|v| format_value(*v)));
        writer
            .write_record(&record)
            .map_err(|e| AccessError::csv(path, e))?;
    }

    finish(writer, path, frame.len())
}

/// Writes tracts with their geometry and every comparison column. Tracts
/// without a comparison row get an empty id and empty values.
pub fn write_tracts_with_comparison(
    path: &Path,
    joined: &[JoinedTract<'_>],
    frame: &ComparisonFrame,
) -> Result<()> {
    let mut writer = create_writer(path)?;

    let mut header: Vec<String> = ["GEOID", "STATEFP", "COUNTYFP", "NAME", "geometry"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.push(frame.id_column().to_string());
    header.extend(frame.columns().iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| AccessError::csv(path, e))?;

    for entry in joined {
        let tract = entry.tract;
        let mut record = vec![
            tract.geoid.to_string(),
            tract.statefp.clone(),
            tract.countyfp.clone(),
            tract.name.clone(),
            tract.geometry.clone(),
        ];
        match entry.values {
            Some(values) => {
                record.push(tract.geoid.to_string());
                record.extend(values.iter().map(|v| format_value(*v)));
            }
            None => {
                record.push(String::new());
                record.extend(frame.columns().iter().map(|_| String::new()));
            }
        }
        writer
            .write_record(&record)
            .map_err(|e| AccessError::csv(path, e))?;
    }

    finish(writer, path, joined.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::read_frame;
    use crate::geometry::{merge_comparison_to_tracts, read_tracts};
    use crate::matrix::{TravelTime, read_matrix};
    use crate::types::{IncomeTier, TierValues, TractId};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(None), "");
        assert_eq!(format_value(Some(30.0)), "30");
        assert_eq!(format_value(Some(0.25)), "0.25");
        assert_eq!(format_value(Some(f64::INFINITY)), "inf");
        assert_eq!(format_value(Some(f64::NAN)), "NaN");
    }

    #[test]
    fn test_write_frame_preserves_ids_and_gaps() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/accessibility_comparison.csv");

        let mut frame = ComparisonFrame::new(
            "from_id",
            vec!["ATOT17_45".to_string(), "ATOT22_45".to_string()],
        );
        frame.insert(TractId::new("01453001100"), vec![Some(10.0), None]).unwrap();
        write_frame(&path, &frame).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines, vec!["from_id,ATOT17_45,ATOT22_45", "01453001100,10,"]);

        let back = read_frame(&path, "from_id").unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_write_matrix_leaves_unreachable_blank() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("matrix.csv");
        let matrix = TravelTimeMatrix::new(vec![
            TravelTime::new("A", "B", Some(12.0)),
            TravelTime::new("A", "C", None),
        ]);

        write_matrix(&path, &matrix).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("from_id,to_id,travel_time\n"));
        assert!(content.contains("A,C,\n"));
        assert_eq!(read_matrix(&path).unwrap(), matrix);
    }

    #[test]
    fn test_write_summary_uses_lodes_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.csv");
        let mut values = TierValues::default();
        values.set(IncomeTier::Total, Some(30.0));
        let summary = AccessibilitySummary {
            threshold_minutes: 45,
            tiers: vec![IncomeTier::Total],
            rows: BTreeMap::from([(TractId::new("A"), values)]),
        };

        write_summary(&path, &summary, "from_id").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "from_id,C000\nA,30\n");
    }

    #[test]
    fn test_write_tracts_with_comparison() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracts_with_comparison.csv");
        let tracts = read_tracts(
            "GEOID,STATEFP,COUNTYFP,NAME,geometry\n\
             48453001100,48,453,11,POINT (0 0)\n\
             48453001200,48,453,12,POINT (1 1)\n"
                .as_bytes(),
            "test",
        )
        .unwrap();
        let mut frame = ComparisonFrame::new("from_id", vec!["ATOT_diff_17_22_45".to_string()]);
        frame.insert(TractId::new("48453001100"), vec![Some(-4.0)]).unwrap();

        let joined = merge_comparison_to_tracts(&tracts, &frame);
        write_tracts_with_comparison(&path, &joined, &frame).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines[0],
            "GEOID,STATEFP,COUNTYFP,NAME,geometry,from_id,ATOT_diff_17_22_45"
        );
        assert_eq!(lines[1], "48453001100,48,453,11,POINT (0 0),48453001100,-4");
        assert_eq!(lines[2], "48453001200,48,453,12,POINT (1 1),,");
    }
}
