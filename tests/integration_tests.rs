use std::path::{Path, PathBuf};

use tempfile::TempDir;
use transit_access::accessibility::summarize;
use transit_access::compare::{ColumnScheme, ORIGIN_ID_COLUMN, Period};
use transit_access::config::{default_departure_after, default_departure_before};
use transit_access::frame::read_frame;
use transit_access::geometry::{
    CAPMETRO_REGION, TractQuery, load_tracts_file, merge_comparison_to_tracts, tract_origins,
};
use transit_access::loaders::{JobTableOptions, JobTableShape, load_job_table, sniff_shape};
use transit_access::maps::{LayerFileRenderer, default_map_plan, render_maps};
use transit_access::matrix::{matrix_file_name, read_matrix};
use transit_access::output::{write_frame, write_tracts_with_comparison};
use transit_access::pipeline::{PeriodInputs, build_accessibility_comparison};
use transit_access::types::{IncomeTier, TractId};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load(name: &str, options: JobTableOptions) -> transit_access::types::JobTable {
    let path = fixture(name);
    let shape = sniff_shape(&path, &options).expect("Failed to sniff job file");
    load_job_table(&path, shape, &options).expect("Failed to load job file")
}

#[test]
fn test_fixture_shapes_are_detected() {
    let wac = JobTableOptions::wac();
    let rac = JobTableOptions::rac();
    assert_eq!(
        sniff_shape(&fixture("wac_2017.csv"), &wac).unwrap(),
        JobTableShape::BlockLevel
    );
    assert_eq!(
        sniff_shape(&fixture("wac_2022_tract.csv"), &wac).unwrap(),
        JobTableShape::TractAggregated
    );
    assert_eq!(
        sniff_shape(&fixture("rac_2022_tract.csv"), &rac).unwrap(),
        JobTableShape::TractAggregated
    );
}

#[test]
fn test_summarize_block_level_jobs() {
    let matrix = read_matrix(&fixture(&matrix_file_name(default_departure_before()))).unwrap();
    let jobs = load("wac_2017.csv", JobTableOptions::wac().with_year(2017));

    let summary = summarize(&matrix, &jobs, 45);

    let a = summary.get(&TractId::new("48453001100")).unwrap();
    assert_eq!(a.get(IncomeTier::Total), Some(150.0));
    assert_eq!(a.get(IncomeTier::Low), Some(40.0));

    // 40 and 44.9 minutes are inside the threshold, 45 is not
    let b = summary.get(&TractId::new("48453001200")).unwrap();
    assert_eq!(b.get(IncomeTier::Total), Some(430.0));
    let c = summary.get(&TractId::new("48491020100")).unwrap();
    assert_eq!(c.get(IncomeTier::Total), Some(80.0));
}

#[test]
fn test_full_pipeline() {
    let dir = TempDir::new().unwrap();
    let scheme = ColumnScheme::new(45, Period::new(2017), Period::new(2022)).unwrap();

    let matrix_before =
        read_matrix(&fixture(&matrix_file_name(default_departure_before()))).unwrap();
    let matrix_after = read_matrix(&fixture(&matrix_file_name(default_departure_after()))).unwrap();
    let jobs_before = load("wac_2017.csv", JobTableOptions::wac().with_year(2017));
    let jobs_after = load("wac_2022_tract.csv", JobTableOptions::wac().with_year(2022));
    let workers_before = load("rac_2017.csv", JobTableOptions::rac().with_year(2017));
    let workers_after = load("rac_2022_tract.csv", JobTableOptions::rac().with_year(2022));

    let table = build_accessibility_comparison(
        PeriodInputs {
            matrix: &matrix_before,
            jobs: &jobs_before,
            workers: Some(&workers_before),
        },
        PeriodInputs {
            matrix: &matrix_after,
            jobs: &jobs_after,
            workers: Some(&workers_after),
        },
        &scheme,
    )
    .expect("Failed to build comparison");
    assert!(table.is_normalized());

    // Persist and reload, as `maps` would
    let comparison_path = dir.path().join("accessibility_comparison.csv");
    write_frame(&comparison_path, &table.to_frame().unwrap()).unwrap();
    let frame = read_frame(&comparison_path, ORIGIN_ID_COLUMN).unwrap();
    assert_eq!(frame.len(), 3);

    let a = TractId::new("48453001100");
    let b = TractId::new("48453001200");
    let c = TractId::new("48491020100");

    assert_eq!(frame.value(&a, "ATOT17_45"), Some(150.0));
    assert_eq!(frame.value(&a, "ATOT22_45"), Some(400.0));
    assert_eq!(frame.value(&a, "ATOT_diff_17_22_45"), Some(250.0));
    assert_eq!(frame.value(&b, "ATOT_diff_17_22_45"), Some(-210.0));
    assert_eq!(frame.value(&c, "ALI_diff_17_22_45"), Some(50.0));
    assert_eq!(frame.value(&a, "AHI_diff_17_22_45"), Some(130.0));

    assert_eq!(frame.value(&a, "ATOT17_45_n"), Some(1.5));
    assert_eq!(frame.value(&a, "ATOT_diff_17_22_45_n"), Some(0.5));
    assert!(frame.value(&b, "ATOT17_45_n").unwrap().is_infinite());
    assert_eq!(frame.value(&c, "ATOT17_45_n"), None);
    assert_eq!(frame.value(&c, "ATOT22_45_n"), Some(4.0));
    assert_eq!(frame.value(&c, "ATOT_diff_17_22_45_n"), None);
    // workers only carry totals
    assert!(!frame.has_column("ALI_diff_17_22_45_n"));

    // Geometry join
    let query = TractQuery::for_region(&CAPMETRO_REGION, 2023);
    let tracts = load_tracts_file(&fixture("cb_2023_48_tract_500k.csv"), &query).unwrap();
    assert_eq!(tracts.len(), 4);
    assert_eq!(tract_origins(&tracts).unwrap().len(), 4);

    let joined = merge_comparison_to_tracts(&tracts, &frame);
    assert_eq!(joined.iter().filter(|j| j.values.is_some()).count(), 3);

    let tracts_path = dir.path().join("tracts_with_comparison.csv");
    write_tracts_with_comparison(&tracts_path, &joined, &frame).unwrap();
    let content = std::fs::read_to_string(&tracts_path).unwrap();
    assert_eq!(content.lines().count(), 5);
    assert!(content.lines().any(|l| l.starts_with("48453001300,48,453,13,")));

    // Maps
    let maps_dir = dir.path().join("maps");
    let plan = default_map_plan(&scheme, (2017, 2025), "453");
    let written = render_maps(&plan, &joined, &frame, &LayerFileRenderer, &maps_dir).unwrap();

    // 4 headline maps, 3 tier changes and the total per-worker change
    assert_eq!(written.len(), 16);

    let region: serde_json::Value = serde_json::from_slice(
        &std::fs::read(maps_dir.join("jobs_access_change_region.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(region["min"], -210.0);
    assert_eq!(region["max"], 250.0);
    assert_eq!(region["excluded"], 1);

    let county: serde_json::Value = serde_json::from_slice(
        &std::fs::read(maps_dir.join("jobs_access_change_county_453.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(county["features"], 2);

    let per_worker =
        std::fs::read_to_string(maps_dir.join("jobs_per_worker_change_tot.csv")).unwrap();
    assert_eq!(per_worker.lines().count(), 2);
}
