//! Census tract records and the joins between tracts and tabular results.
//!
//! Geometry is carried as opaque WKT text. Nothing here projects or measures
//! shapes; routing origins come from the Census interior point columns.

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{AccessError, Result};
use crate::frame::ComparisonFrame;
use crate::types::TractId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct County {
    pub name: &'static str,
    pub fips: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub state_fips: &'static str,
    pub counties: &'static [County],
}

/// Counties of the CapMetro service area, Texas.
pub const CAPMETRO_REGION: Region = Region {
    name: "CapMetro",
    state_fips: "48",
    counties: &[
        County { name: "Travis", fips: "453" },
        County { name: "Williamson", fips: "491" },
        County { name: "Hays", fips: "209" },
        County { name: "Bastrop", fips: "021" },
        County { name: "Caldwell", fips: "055" },
        County { name: "Burnet", fips: "053" },
    ],
};

/// Selects the tracts of one state, a set of counties and a vintage year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TractQuery {
    pub state_fips: String,
    pub county_fips: Vec<String>,
    pub year: i32,
}

impl TractQuery {
    pub fn for_region(region: &Region, year: i32) -> Self {
        Self {
            state_fips: region.state_fips.to_string(),
            county_fips: region.counties.iter().map(|c| c.fips.to_string()).collect(),
            year,
        }
    }

    /// An empty county list matches every county of the state.
    pub fn matches(&self, tract: &Tract) -> bool {
        tract.state_fips() == self.state_fips
            && (self.county_fips.is_empty()
                || self.county_fips.iter().any(|c| c == tract.county_fips()))
    }
}

/// One row of a cartographic boundary tract file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tract {
    #[serde(rename = "GEOID")]
    pub geoid: TractId,
    #[serde(rename = "STATEFP", default)]
    pub statefp: String,
    #[serde(rename = "COUNTYFP", default)]
    pub countyfp: String,
    #[serde(rename = "NAME", default)]
    pub name: String,
    #[serde(default)]
    pub geometry: String,
    #[serde(rename = "INTPTLAT", default)]
    pub interior_lat: Option<f64>,
    #[serde(rename = "INTPTLON", default)]
    pub interior_lon: Option<f64>,
}

impl Tract {
    /// State FIPS, falling back to the GEOID prefix when the column is blank.
    pub fn state_fips(&self) -> &str {
        if self.statefp.is_empty() {
            self.geoid.as_str().get(..2).unwrap_or("")
        } else {
            &self.statefp
        }
    }

    /// County FIPS, falling back to GEOID characters 2..5 when the column is blank.
    pub fn county_fips(&self) -> &str {
        if self.countyfp.is_empty() {
            self.geoid.as_str().get(2..5).unwrap_or("")
        } else {
            &self.countyfp
        }
    }
}

/// Parses a tract CSV (GEOID, STATEFP, COUNTYFP, NAME, geometry, INTPTLAT,
/// INTPTLON; extra columns are ignored).
pub fn read_tracts<R: Read>(reader: R, source: &str) -> Result<Vec<Tract>> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut tracts = Vec::new();
    for result in rdr.deserialize() {
        let tract: Tract = result.map_err(|e| AccessError::csv(source, e))?;
        tracts.push(tract);
    }
    debug!(source, tracts = tracts.len(), "Tracts parsed");
    Ok(tracts)
}

/// A routing origin (or destination) placed at a tract's interior point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Origin {
    pub id: TractId,
    pub lat: f64,
    pub lon: f64,
}

pub fn tract_origins(tracts: &[Tract]) -> Result<Vec<Origin>> {
    tracts
        .iter()
        .map(|tract| match (tract.interior_lat, tract.interior_lon) {
            (Some(lat), Some(lon)) => Ok(Origin {
                id: tract.geoid.clone(),
                lat,
                lon,
            }),
            _ => Err(AccessError::Config(format!(
                "tract {} has no interior point (INTPTLAT/INTPTLON)",
                tract.geoid
            ))),
        })
        .collect()
}

/// A tract with its comparison values, if the comparison has a row for it.
#[derive(Debug, Clone, Copy)]
pub struct JoinedTract<'a> {
    pub tract: &'a Tract,
    pub values: Option<&'a [Option<f64>]>,
}

impl JoinedTract<'_> {
    pub fn value(&self, column_idx: usize) -> Option<f64> {
        self.values?.get(column_idx).copied().flatten()
    }
}

/// Left join from tracts (by GEOID) onto comparison rows (by id). Every tract
/// is kept; those without a comparison row have all values missing.
pub fn merge_comparison_to_tracts<'a>(
    tracts: &'a [Tract],
    frame: &'a ComparisonFrame,
) -> Vec<JoinedTract<'a>> {
    let joined: Vec<JoinedTract<'a>> = tracts
        .iter()
        .map(|tract| JoinedTract {
            tract,
            values: frame.get(&tract.geoid),
        })
        .collect();

    let matched = joined.iter().filter(|j| j.values.is_some()).count();
    info!(
        tracts = joined.len(),
        matched,
        comparison_rows = frame.len(),
        "Comparison joined to tracts"
    );
    joined
}

/// Loads tracts from a local CSV, keeping only those matching `query`.
pub fn load_tracts_file(path: &Path, query: &TractQuery) -> Result<Vec<Tract>> {
    let file = std::fs::File::open(path).map_err(|e| AccessError::from_io(path, e))?;
    let tracts = read_tracts(file, &path.display().to_string())?;
    Ok(tracts.into_iter().filter(|t| query.matches(t)).collect())
}
