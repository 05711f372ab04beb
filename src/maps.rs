//! Choropleth layer preparation.
//!
//! Pixel rendering happens outside this crate. Here each planned map is
//! reduced to the features that can be colored (finite values only), the
//! color-scale range, and a title, then handed to a [`MapRenderer`].

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::compare::{ColumnScheme, Side};
use crate::error::{AccessError, Result};
use crate::frame::ComparisonFrame;
use crate::geometry::JoinedTract;
use crate::types::{IncomeTier, TractId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorMap {
    #[serde(rename = "viridis")]
    Viridis,
    #[serde(rename = "RdBu")]
    RdBu,
}

/// One planned map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSpec {
    pub file_stem: String,
    pub column: String,
    pub title: String,
    pub cmap: ColorMap,
    pub county_fips: Option<String>,
    /// Optional maps are skipped quietly when their column is absent.
    pub optional: bool,
}

impl MapSpec {
    fn new(file_stem: String, column: String, title: String, cmap: ColorMap) -> Self {
        Self {
            file_stem,
            column,
            title,
            cmap,
            county_fips: None,
            optional: false,
        }
    }

    fn in_county(mut self, county_fips: &str) -> Self {
        self.county_fips = Some(county_fips.to_string());
        self
    }

    fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

fn tier_title(tier: IncomeTier) -> &'static str {
    match tier {
        IncomeTier::Low => "Low-Wage",
        IncomeTier::Mid => "Mid-Wage",
        IncomeTier::High => "High-Wage",
        IncomeTier::Total => "All",
    }
}

/// The standard set of maps: total accessible jobs for each period, the
/// region-wide and single-county change, and the per-tier changes (absolute
/// and per worker) when the comparison carries them.
pub fn default_map_plan(
    scheme: &ColumnScheme,
    network_years: (i32, i32),
    county_fips: &str,
) -> Vec<MapSpec> {
    let (before_year, after_year) = network_years;
    let span = format!("{after_year} - {before_year}");
    let total = IncomeTier::Total;

    let mut plan = vec![
        MapSpec::new(
            format!("jobs_access_{before_year}"),
            scheme.accessible(Side::Before, total),
            format!("Transit-Accessible Jobs ({before_year})"),
            ColorMap::Viridis,
        ),
        MapSpec::new(
            format!("jobs_access_{after_year}"),
            scheme.accessible(Side::After, total),
            format!("Transit-Accessible Jobs ({after_year})"),
            ColorMap::Viridis,
        ),
        MapSpec::new(
            "jobs_access_change_region".to_string(),
            scheme.difference(total),
            format!("Change in Transit-Accessible Jobs ({span})"),
            ColorMap::RdBu,
        ),
        MapSpec::new(
            format!("jobs_access_change_county_{county_fips}"),
            scheme.difference(total),
            format!("Change in Transit-Accessible Jobs (CountyFP {county_fips})"),
            ColorMap::RdBu,
        )
        .in_county(county_fips),
    ];

    for tier in [IncomeTier::Low, IncomeTier::Mid, IncomeTier::High] {
        plan.push(
            MapSpec::new(
                format!("jobs_access_change_{}", tier.label().to_lowercase()),
                scheme.difference(tier),
                format!(
                    "Change in Transit-Accessible {} Jobs ({span})",
                    tier_title(tier)
                ),
                ColorMap::RdBu,
            )
            .optional(),
        );
    }

    for tier in IncomeTier::ALL {
        plan.push(
            MapSpec::new(
                format!("jobs_per_worker_change_{}", tier.label().to_lowercase()),
                scheme.normalized_difference(tier),
                format!(
                    "Change in {} Jobs per Worker within {} min ({span})",
                    tier_title(tier),
                    scheme.threshold_minutes
                ),
                ColorMap::RdBu,
            )
            .optional(),
        );
    }

    plan
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapFeature {
    #[serde(rename = "GEOID")]
    pub geoid: TractId,
    pub geometry: String,
    pub value: f64,
}

/// A map ready to color. Tracts whose value is missing or non-finite are
/// counted in `excluded` and left out of `features` and `range`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayer {
    pub spec: MapSpec,
    pub features: Vec<MapFeature>,
    pub excluded: usize,
    pub range: Option<(f64, f64)>,
}

/// Builds the layer for `spec`, or `None` when the column is absent or the
/// county subset is empty.
pub fn build_layer(
    joined: &[JoinedTract<'_>],
    frame: &ComparisonFrame,
    spec: &MapSpec,
) -> Option<MapLayer> {
    let Some(column_idx) = frame.column_index(&spec.column) else {
        if spec.optional {
            debug!(column = %spec.column, "Optional map column absent, skipping");
        } else {
            warn!(column = %spec.column, map = %spec.file_stem, "Map column not found in comparison, skipping");
        }
        return None;
    };

    let subset: Vec<&JoinedTract<'_>> = joined
        .iter()
        .filter(|j| {
            spec.county_fips
                .as_deref()
                .is_none_or(|fips| j.tract.county_fips() == fips)
        })
        .collect();
    if subset.is_empty() {
        warn!(map = %spec.file_stem, county = ?spec.county_fips, "No tracts in map subset, skipping");
        return None;
    }

    let mut features = Vec::with_capacity(subset.len());
    let mut excluded = 0usize;
    let mut range: Option<(f64, f64)> = None;

    for entry in subset {
        match entry.value(column_idx).filter(|v| v.is_finite()) {
            Some(value) => {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(value), hi.max(value)),
                    None => (value, value),
                });
                features.push(MapFeature {
                    geoid: entry.tract.geoid.clone(),
                    geometry: entry.tract.geometry.clone(),
                    value,
                });
            }
            None => excluded += 1,
        }
    }

    Some(MapLayer {
        spec: spec.clone(),
        features,
        excluded,
        range,
    })
}

/// Draws a prepared layer. Implementations own styling and output format.
pub trait MapRenderer {
    /// Returns the files written.
    fn render(&self, layer: &MapLayer, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

#[derive(Serialize)]
struct LayerMetadata<'a> {
    title: &'a str,
    column: &'a str,
    cmap: ColorMap,
    county_fips: Option<&'a str>,
    min: Option<f64>,
    max: Option<f64>,
    features: usize,
    excluded: usize,
}

/// Writes each layer as `{stem}.csv` (GEOID, geometry, value) plus a
/// `{stem}.json` sidecar describing title, color map and scale range, for an
/// external choropleth tool to draw.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerFileRenderer;

impl MapRenderer for LayerFileRenderer {
    fn render(&self, layer: &MapLayer, out_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir).map_err(|e| AccessError::from_io(out_dir, e))?;

        let csv_path = out_dir.join(format!("{}.csv", layer.spec.file_stem));
        let mut writer = csv::Writer::from_path(&csv_path).map_err(|e| AccessError::csv(&csv_path, e))?;
        for feature in &layer.features {
            writer
                .serialize(feature)
                .map_err(|e| AccessError::csv(&csv_path, e))?;
        }
        writer
            .flush()
            .map_err(|e| AccessError::from_io(&csv_path, e))?;

        let metadata = LayerMetadata {
            title: &layer.spec.title,
            column: &layer.spec.column,
            cmap: layer.spec.cmap,
            county_fips: layer.spec.county_fips.as_deref(),
            min: layer.range.map(|(lo, _)| lo),
            max: layer.range.map(|(_, hi)| hi),
            features: layer.features.len(),
            excluded: layer.excluded,
        };
        let json_path = out_dir.join(format!("{}.json", layer.spec.file_stem));
        std::fs::write(&json_path, serde_json::to_vec_pretty(&metadata)?)
            .map_err(|e| AccessError::from_io(&json_path, e))?;

        Ok(vec![csv_path, json_path])
    }
}

/// Maps are drawn from a saved comparison; fails with
/// [`AccessError::MissingFile`] when `path` does not exist.
pub fn require_comparison(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AccessError::MissingFile(path.to_path_buf()))
    }
}

/// Builds and renders every map in `plan`, returning the files written.
pub fn render_maps<R: MapRenderer>(
    plan: &[MapSpec],
    joined: &[JoinedTract<'_>],
    frame: &ComparisonFrame,
    renderer: &R,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for spec in plan {
        let Some(layer) = build_layer(joined, frame, spec) else {
            continue;
        };
        info!(
            map = %spec.file_stem,
            features = layer.features.len(),
            excluded = layer.excluded,
            "Rendering map"
        );
        written.extend(renderer.render(&layer, out_dir)?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Period;
    use crate::geometry::{merge_comparison_to_tracts, read_tracts};
    use tempfile::TempDir;

    const TRACTS: &str = "GEOID,STATEFP,COUNTYFP,NAME,geometry\n\
        48453001100,48,453,11,POINT (0 0)\n\
        48453001200,48,453,12,POINT (1 1)\n\
        48491020100,48,491,201,POINT (2 2)\n\
        48209010100,48,209,101,POINT (3 3)\n";

    fn scheme() -> ColumnScheme {
        ColumnScheme::new(45, Period::new(2017), Period::new(2022)).unwrap()
    }

    fn frame() -> ComparisonFrame {
        let s = scheme();
        let mut frame = ComparisonFrame::new(
            "from_id",
            vec![
                s.difference(IncomeTier::Total),
                s.normalized_difference(IncomeTier::Total),
            ],
        );
        frame.insert(TractId::new("48453001100"), vec![Some(-5.0), Some(f64::INFINITY)]).unwrap();
        frame.insert(TractId::new("48453001200"), vec![Some(12.0), Some(0.5)]).unwrap();
        frame.insert(TractId::new("48491020100"), vec![None, Some(f64::NAN)]).unwrap();
        frame
    }

    fn spec(column: String) -> MapSpec {
        MapSpec::new("test".to_string(), column, "Test".to_string(), ColorMap::RdBu)
    }

    #[test]
    fn test_non_finite_and_missing_values_are_excluded() {
        let tracts = read_tracts(TRACTS.as_bytes(), "test").unwrap();
        let frame = frame();
        let joined = merge_comparison_to_tracts(&tracts, &frame);

        let layer = build_layer(
            &joined,
            &frame,
            &spec(scheme().normalized_difference(IncomeTier::Total)),
        )
        .unwrap();

        assert_eq!(layer.features.len(), 1);
        assert_eq!(layer.features[0].value, 0.5);
        assert_eq!(layer.excluded, 3);
        assert_eq!(layer.range, Some((0.5, 0.5)));
    }

    #[test]
    fn test_range_and_county_subset() {
        let tracts = read_tracts(TRACTS.as_bytes(), "test").unwrap();
        let frame = frame();
        let joined = merge_comparison_to_tracts(&tracts, &frame);
        let column = scheme().difference(IncomeTier::Total);

        let region = build_layer(&joined, &frame, &spec(column.clone())).unwrap();
        assert_eq!(region.range, Some((-5.0, 12.0)));
        assert_eq!(region.excluded, 2);

        let county = build_layer(&joined, &frame, &spec(column.clone()).in_county("491")).unwrap();
        assert!(county.features.is_empty());
        assert_eq!(county.excluded, 1);
        assert_eq!(county.range, None);

        assert!(build_layer(&joined, &frame, &spec(column).in_county("999")).is_none());
    }

    #[test]
    fn test_require_comparison() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accessibility_comparison.csv");

        let err = require_comparison(&path).unwrap_err();
        assert!(matches!(err, AccessError::MissingFile(p) if p == path));

        std::fs::write(&path, "from_id\n").unwrap();
        assert!(require_comparison(&path).is_ok());
    }

    #[test]
    fn test_missing_column_skips_map() {
        let tracts = read_tracts(TRACTS.as_bytes(), "test").unwrap();
        let frame = frame();
        let joined = merge_comparison_to_tracts(&tracts, &frame);

        assert!(build_layer(&joined, &frame, &spec("ALI17_45".to_string())).is_none());
    }

    #[test]
    fn test_default_plan_names() {
        let plan = default_map_plan(&scheme(), (2017, 2025), "453");
        let stems: Vec<_> = plan.iter().map(|s| s.file_stem.as_str()).collect();

        assert_eq!(&stems[..4], &[
            "jobs_access_2017",
            "jobs_access_2025",
            "jobs_access_change_region",
            "jobs_access_change_county_453",
        ]);
        assert_eq!(plan[0].column, "ATOT17_45");
        assert_eq!(plan[2].title, "Change in Transit-Accessible Jobs (2025 - 2017)");
        assert_eq!(plan[3].county_fips.as_deref(), Some("453"));
        assert!(plan.iter().any(|s| s.column == "ALI_diff_17_22_45_n" && s.optional));
    }

    #[test]
    fn test_layer_file_renderer_writes_csv_and_sidecar() {
        let dir = TempDir::new().unwrap();
        let tracts = read_tracts(TRACTS.as_bytes(), "test").unwrap();
        let frame = frame();
        let joined = merge_comparison_to_tracts(&tracts, &frame);
        let plan = default_map_plan(&scheme(), (2017, 2025), "453");

        let written = render_maps(&plan, &joined, &frame, &LayerFileRenderer, dir.path()).unwrap();

        // region + county difference maps and the total per-worker map
        assert_eq!(written.len(), 6);
        let csv = std::fs::read_to_string(dir.path().join("jobs_access_change_region.csv")).unwrap();
        assert!(csv.starts_with("GEOID,geometry,value\n"));
        let json: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("jobs_access_change_region.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(json["cmap"], "RdBu");
        assert_eq!(json["min"], -5.0);
        assert_eq!(json["max"], 12.0);
        assert_eq!(json["excluded"], 2);
    }
}
