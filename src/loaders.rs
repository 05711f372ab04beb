//! Loaders that normalize LODES job and worker CSVs into tract-keyed
//! [`JobTable`]s.
//!
//! Two source shapes are supported. Block-level files (the raw WAC/RAC
//! downloads) carry a 15-character block geocode and the `CE01`..`C000`
//! columns; they are truncated to tract ids and summed. Tract-aggregated
//! files already have one row per tract and name their tiers with a year
//! suffix (`LI17`, `TOT2022_rac`, ...); they only need a rename pass.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::btree_map::Entry;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{AccessError, Result};
use crate::types::{IncomeTier, JobTable, TierValues, TractId};

/// Geocode column of LODES workplace area characteristics (jobs).
pub const WAC_GEOCODE_COLUMN: &str = "w_geocode";
/// Geocode column of LODES residence area characteristics (workers).
pub const RAC_GEOCODE_COLUMN: &str = "h_geocode";
/// Key column of tract-aggregated inputs.
pub const TRACT_ID_COLUMN: &str = "tract_id";

/// Shape of a job/worker CSV, chosen once per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTableShape {
    BlockLevel,
    TractAggregated,
}

#[derive(Debug, Clone)]
pub struct JobTableOptions {
    pub geocode_column: String,
    pub tract_column: String,
    /// Data year used to pick year-suffixed columns in tract-aggregated files.
    pub year: Option<i32>,
}

impl JobTableOptions {
    pub fn wac() -> Self {
        Self {
            geocode_column: WAC_GEOCODE_COLUMN.to_string(),
            tract_column: TRACT_ID_COLUMN.to_string(),
            year: None,
        }
    }

    pub fn rac() -> Self {
        Self {
            geocode_column: RAC_GEOCODE_COLUMN.to_string(),
            ..Self::wac()
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

pub(crate) fn open_reader(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| AccessError::from_io(path, e))?;
    Ok(ReaderBuilder::new().trim(Trim::All).from_reader(file))
}

pub(crate) fn read_headers<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
    path: &Path,
) -> Result<StringRecord> {
    reader
        .headers()
        .cloned()
        .map_err(|e| AccessError::csv(path, e))
}

pub(crate) fn column_index(headers: &StringRecord, path: &Path, column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| AccessError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })
}

fn parse_cell(path: &Path, row: u64, column: &str, raw: Option<&str>) -> Result<Option<f64>> {
    let raw = raw.unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| AccessError::InvalidNumber {
            path: path.to_path_buf(),
            row,
            column: column.to_string(),
            value: raw.to_string(),
        })
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

/// Decides the shape of `path` from its header row.
///
/// A file that has the tract key column but no geocode column is
/// tract-aggregated; everything else is treated as block-level.
pub fn sniff_shape(path: &Path, options: &JobTableOptions) -> Result<JobTableShape> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let has = |name: &str| headers.iter().any(|h| h == name);

    let shape = if has(options.tract_column.as_str()) && !has(options.geocode_column.as_str()) {
        JobTableShape::TractAggregated
    } else {
        JobTableShape::BlockLevel
    };
    debug!(path = %path.display(), ?shape, "Job table shape detected");
    Ok(shape)
}

/// Loads a job or worker table in the given shape.
///
/// # Errors
///
/// Returns [`AccessError::NoTierColumns`] when none of the four tiers is
/// present, and [`AccessError::MissingFile`] when `path` does not exist.
#[tracing::instrument(skip(path, options), fields(path = %path.display()))]
pub fn load_job_table(
    path: &Path,
    shape: JobTableShape,
    options: &JobTableOptions,
) -> Result<JobTable> {
    let table = match shape {
        JobTableShape::BlockLevel => {
            load_block_level(path, &options.geocode_column, &IncomeTier::ALL)?
        }
        JobTableShape::TractAggregated => load_tract_aggregated(path, options)?,
    };

    info!(tracts = table.len(), tiers = ?table.tiers, "Job table loaded");
    Ok(table)
}

/// Loads a single tier (usually [`IncomeTier::Total`]) from a block-level file.
pub fn load_tier_by_tract(path: &Path, geocode_column: &str, tier: IncomeTier) -> Result<JobTable> {
    load_block_level(path, geocode_column, &[tier])
}

fn load_block_level(path: &Path, geocode_column: &str, wanted: &[IncomeTier]) -> Result<JobTable> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let geocode_idx = column_index(&headers, path, geocode_column)?;

    let tier_columns: Vec<(IncomeTier, usize)> = wanted
        .iter()
        .filter_map(|&tier| {
            headers
                .iter()
                .position(|h| h == tier.lodes_column())
                .map(|idx| (tier, idx))
        })
        .collect();

    if tier_columns.is_empty() {
        return Err(match wanted {
            [tier] => AccessError::MissingColumn {
                path: path.to_path_buf(),
                column: tier.lodes_column().to_string(),
            },
            _ => AccessError::NoTierColumns(path.to_path_buf()),
        });
    }

    let tiers: Vec<IncomeTier> = tier_columns.iter().map(|(tier, _)| *tier).collect();
    let mut table = JobTable::new(tiers.clone());
    let mut blocks = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| AccessError::csv(path, e))?;
        let line = record_line(&record);
        let tract = TractId::from_geocode(record.get(geocode_idx).unwrap_or(""))?;
        let entry = table
            .rows
            .entry(tract)
            .or_insert_with(|| TierValues::zeroed(&tiers));

        for &(tier, idx) in &tier_columns {
            if let Some(value) = parse_cell(path, line, tier.lodes_column(), record.get(idx))? {
                entry.add(tier, value);
            }
        }
        blocks += 1;
    }

    debug!(blocks, tracts = table.len(), "Block rows aggregated to tracts");
    Ok(table)
}

/// Returns the tier a tract-aggregated column encodes, if any.
///
/// Accepted names are a tier label, a two- or four-digit year and an optional
/// `_suffix`, e.g. `LI17`, `TOT2022`, `HI17_rac`. When `year` is given the
/// digits must spell that year.
pub fn tier_for_column(name: &str, year: Option<i32>) -> Option<IncomeTier> {
    IncomeTier::ALL.into_iter().find(|tier| {
        let Some(rest) = name.strip_prefix(tier.label()) else {
            return false;
        };
        let digits = rest.split('_').next().unwrap_or("");
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match year {
            None => digits.len() == 2 || digits.len() == 4,
            Some(year) => {
                digits == format!("{:02}", year.rem_euclid(100)) || digits == year.to_string()
            }
        }
    })
}

fn load_tract_aggregated(path: &Path, options: &JobTableOptions) -> Result<JobTable> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let key_idx = column_index(&headers, path, &options.tract_column)?;

    let mut tier_columns: Vec<(IncomeTier, usize, String)> = Vec::new();
    for tier in IncomeTier::ALL {
        let candidates: Vec<(usize, &str)> = headers
            .iter()
            .enumerate()
            .filter(|(_, name)| tier_for_column(name, options.year) == Some(tier))
            .collect();

        match candidates.as_slice() {
            [] => debug!(tier = %tier, "Tier column absent"),
            [(idx, name)] => tier_columns.push((tier, *idx, name.to_string())),
            _ => {
                return Err(AccessError::AmbiguousTierColumn {
                    path: path.to_path_buf(),
                    tier: tier.label().to_string(),
                    candidates: candidates.iter().map(|(_, n)| n.to_string()).collect(),
                });
            }
        }
    }

    if tier_columns.is_empty() {
        return Err(AccessError::NoTierColumns(path.to_path_buf()));
    }

    let mut table = JobTable::new(tier_columns.iter().map(|(tier, _, _)| *tier).collect());

    for record in reader.records() {
        let record = record.map_err(|e| AccessError::csv(path, e))?;
        let line = record_line(&record);
        let key = record.get(key_idx).unwrap_or("").trim();
        if key.is_empty() {
            return Err(AccessError::InvalidGeocode(key.to_string()));
        }

        let mut values = TierValues::default();
        for (tier, idx, name) in &tier_columns {
            values.set(*tier, parse_cell(path, line, name, record.get(*idx))?);
        }

        match table.rows.entry(TractId::new(key)) {
            Entry::Vacant(slot) => {
                slot.insert(values);
            }
            Entry::Occupied(mut slot) => {
                warn!(tract = key, "Duplicate tract row, summing");
                for (tier, _, _) in &tier_columns {
                    if let Some(value) = values.get(*tier) {
                        slot.get_mut().add(*tier, value);
                    }
                }
            }
        }
    }

    Ok(table)
}
