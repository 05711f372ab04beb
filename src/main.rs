//! CLI entry point for the transit accessibility pipeline.
//!
//! `compare` builds travel-time matrices for both networks and, given LODES
//! job files, the accessibility comparison. `maps` turns a saved comparison
//! into choropleth layers; `run-all` does both in one go and `summarize`
//! scores a single matrix against one job file.

mod infra;
mod services;

use crate::infra::census::CartographicBoundarySource;
use crate::infra::publish::ArtifactPublisher;
use crate::infra::routing::HttpRoutingEngine;
use crate::services::routing_api::{MatrixRequest, RoutingEngine};
use crate::services::tract_api::TractSource;
use anyhow::{Context, Result, bail};
use chrono::{Datelike, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use transit_access::{
    accessibility::summarize,
    compare::{ColumnScheme, ORIGIN_ID_COLUMN, Period},
    config::{
        AnalysisConfig, DEFAULT_THRESHOLD_MINUTES, DEFAULT_TRACT_YEAR, PeriodConfig,
        default_departure_after, default_departure_before,
    },
    fetch::{BasicClient, auth::ApiKey},
    frame::read_frame,
    geometry::{CAPMETRO_REGION, Origin, Tract, TractQuery, merge_comparison_to_tracts, tract_origins},
    loaders::{
        JobTableOptions, JobTableShape, TRACT_ID_COLUMN, WAC_GEOCODE_COLUMN, load_job_table,
        sniff_shape,
    },
    maps::{LayerFileRenderer, default_map_plan, render_maps, require_comparison},
    matrix::{TravelTimeMatrix, matrix_file_name, read_matrix},
    output::{write_frame, write_matrix, write_summary, write_tracts_with_comparison},
    pipeline::{PeriodInputs, build_accessibility_comparison},
    types::JobTable,
};

const COMPARISON_FILE: &str = "accessibility_comparison.csv";
const TRACTS_FILE: &str = "tracts_with_comparison.csv";
const RAW_DATA_DIR: &str = "data/raw";

#[derive(Parser)]
#[command(name = "transit_access")]
#[command(about = "Compare transit access to jobs between two network snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build travel-time matrices and, with WAC files, the accessibility comparison
    Compare(CompareArgs),
    /// Render map layers from a saved accessibility comparison
    Maps(MapsArgs),
    /// Run compare followed by maps
    RunAll {
        #[command(flatten)]
        compare: CompareArgs,

        /// Directory for map outputs
        #[arg(long, default_value = "output/maps")]
        maps_dir: PathBuf,

        /// County FIPS for the single-county map
        #[arg(long, default_value = "453")]
        countyfp: String,
    },
    /// Count jobs reachable from each origin in one matrix
    Summarize {
        /// Travel-time matrix CSV (from_id,to_id,travel_time)
        #[arg(long)]
        matrix: PathBuf,

        /// Job file (block-level WAC/RAC or tract-aggregated)
        #[arg(long)]
        jobs: PathBuf,

        /// Geocode column of a block-level job file
        #[arg(long, default_value = WAC_GEOCODE_COLUMN)]
        geocode_column: String,

        #[arg(long, value_enum, default_value_t = ShapeArg::Auto)]
        job_shape: ShapeArg,

        /// Travel-time threshold in minutes (exclusive)
        #[arg(long, default_value_t = DEFAULT_THRESHOLD_MINUTES)]
        threshold: u32,

        /// CSV file to write the summary to
        #[arg(short, long, default_value = "accessibility_summary.csv")]
        output: PathBuf,
    },
}

/// How job files are laid out.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ShapeArg {
    /// Detect from the header
    Auto,
    /// One row per census block, keyed by a geocode column
    Block,
    /// One row per tract with labeled tier columns
    Tract,
}

#[derive(Args, Clone)]
struct TractArgs {
    /// Tract CSV path or URL; defaults to data/raw/cb_{year}_48_tract_500k.csv
    #[arg(long)]
    tracts: Option<String>,

    /// Census vintage of the tract boundaries
    #[arg(long, default_value_t = DEFAULT_TRACT_YEAR)]
    tract_year: i32,
}

#[derive(Args, Clone)]
struct SchemeArgs {
    /// Travel-time threshold in minutes (exclusive)
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_MINUTES)]
    threshold: u32,

    /// LODES year of the earlier job and worker files
    #[arg(long, default_value_t = 2017)]
    before_year: i32,

    /// LODES year of the later job and worker files
    #[arg(long, default_value_t = 2022)]
    after_year: i32,
}

impl SchemeArgs {
    fn column_scheme(&self) -> Result<ColumnScheme> {
        Ok(ColumnScheme::new(
            self.threshold,
            Period::new(self.before_year),
            Period::new(self.after_year),
        )?)
    }
}

#[derive(Args, Clone)]
struct CompareArgs {
    /// OSM PBF street network
    #[arg(long)]
    osm: String,

    /// GTFS zip of the earlier network
    #[arg(long)]
    gtfs_before: String,

    /// GTFS zip of the later network
    #[arg(long)]
    gtfs_after: String,

    /// Directory for matrices and comparison outputs
    #[arg(long, default_value = "data/processed")]
    out_dir: PathBuf,

    #[command(flatten)]
    tracts: TractArgs,

    /// WAC (jobs) file for the earlier period
    #[arg(long)]
    wac_before: Option<PathBuf>,

    /// WAC (jobs) file for the later period
    #[arg(long)]
    wac_after: Option<PathBuf>,

    /// RAC (workers) file for the earlier period
    #[arg(long)]
    rac_before: Option<PathBuf>,

    /// RAC (workers) file for the later period
    #[arg(long)]
    rac_after: Option<PathBuf>,

    #[command(flatten)]
    scheme: SchemeArgs,

    #[arg(long, value_enum, default_value_t = ShapeArg::Auto)]
    job_shape: ShapeArg,

    /// Routing engine base URL; falls back to ROUTING_ENGINE_URL
    #[arg(long)]
    routing_url: Option<String>,

    /// Read matrices already present in the output directory instead of routing
    #[arg(long, default_value_t = false)]
    reuse_matrices: bool,

    /// Optional: S3 bucket to upload outputs to
    #[arg(long)]
    s3_bucket: Option<String>,

    /// Optional: gzip outputs before uploading to S3
    #[arg(long, default_value_t = false)]
    gzip: bool,
}

#[derive(Args, Clone)]
struct MapsArgs {
    /// Comparison CSV written by `compare`
    #[arg(long, default_value = "data/processed/accessibility_comparison.csv")]
    comparison_csv: PathBuf,

    /// Directory for map outputs
    #[arg(long, default_value = "output/maps")]
    maps_dir: PathBuf,

    #[command(flatten)]
    tracts: TractArgs,

    /// County FIPS for the single-county map
    #[arg(long, default_value = "453")]
    countyfp: String,

    #[command(flatten)]
    scheme: SchemeArgs,
}

/// Files written by `compare`.
struct CompareOutputs {
    comparison_csv: Option<PathBuf>,
    written: Vec<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/transit_access.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("transit_access.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare(args) => {
            let outputs = run_compare(&args).await?;
            publish(args.s3_bucket.as_deref(), args.gzip, &outputs.written).await?;
        }
        Commands::Maps(args) => {
            run_maps(&args).await?;
        }
        Commands::RunAll {
            compare,
            maps_dir,
            countyfp,
        } => {
            if compare.wac_before.is_none() || compare.wac_after.is_none() {
                bail!("run-all needs --wac-before and --wac-after to build the comparison");
            }
            let mut outputs = run_compare(&compare).await?;
            let comparison_csv = outputs
                .comparison_csv
                .clone()
                .context("Comparison was not produced")?;

            let maps = MapsArgs {
                comparison_csv,
                maps_dir,
                tracts: compare.tracts.clone(),
                countyfp,
                scheme: compare.scheme.clone(),
            };
            outputs.written.extend(run_maps(&maps).await?);
            publish(compare.s3_bucket.as_deref(), compare.gzip, &outputs.written).await?;
            info!("Pipeline complete");
        }
        Commands::Summarize {
            matrix,
            jobs,
            geocode_column,
            job_shape,
            threshold,
            output,
        } => {
            let matrix = read_matrix(&matrix)?;
            let options = JobTableOptions {
                geocode_column,
                tract_column: TRACT_ID_COLUMN.to_string(),
                year: None,
            };
            let jobs = load_jobs(&jobs, &options, job_shape)?;
            let summary = summarize(&matrix, &jobs, threshold);
            write_summary(&output, &summary, ORIGIN_ID_COLUMN)?;
            info!(
                origins = summary.len(),
                output = %output.display(),
                "Summary written"
            );
        }
    }

    Ok(())
}

/// Routes both networks and, when WAC files are given, writes the
/// comparison and the tract join.
#[tracing::instrument(skip_all, fields(out_dir = %args.out_dir.display(), threshold = args.scheme.threshold))]
async fn run_compare(args: &CompareArgs) -> Result<CompareOutputs> {
    std::fs::create_dir_all(&args.out_dir)?;

    let config = AnalysisConfig::new(&args.osm, &args.gtfs_before, &args.gtfs_after)
        .with_threshold(args.scheme.threshold)
        .with_data_years(args.scheme.before_year, args.scheme.after_year);
    let scheme = config.column_scheme()?;

    // Job inputs are read before routing so bad files fail fast.
    let jobs = match (&args.wac_before, &args.wac_after) {
        (Some(wac_before), Some(wac_after)) => {
            info!("Loading WAC jobs");
            Some(load_period_tables(
                (wac_before, wac_after),
                JobTableOptions::wac(),
                &config,
                args.job_shape,
            )?)
        }
        (None, None) => None,
        _ => bail!("--wac-before and --wac-after must be given together"),
    };
    let workers = match (&args.rac_before, &args.rac_after) {
        (Some(rac_before), Some(rac_after)) if jobs.is_some() => {
            info!("Loading RAC workers");
            Some(load_period_tables(
                (rac_before, rac_after),
                JobTableOptions::rac(),
                &config,
                args.job_shape,
            )?)
        }
        (None, None) => None,
        _ => {
            warn!("Worker normalization needs WAC files and both --rac-before and --rac-after, skipping");
            None
        }
    };

    info!("Loading tracts and origins");
    let tracts = load_region_tracts(&args.tracts).await?;
    let origins = tract_origins(&tracts)?;
    info!(origins = origins.len(), "Origins ready");

    let engine = routing_engine(args.routing_url.as_deref())?;
    let (matrix_after, after_path) = period_matrix(
        &config,
        &config.after,
        &origins,
        engine.as_deref(),
        &args.out_dir,
        args.reuse_matrices,
    )
    .await?;
    let (matrix_before, before_path) = period_matrix(
        &config,
        &config.before,
        &origins,
        engine.as_deref(),
        &args.out_dir,
        args.reuse_matrices,
    )
    .await?;

    let mut written = vec![before_path, after_path];

    let Some((jobs_before, jobs_after)) = jobs else {
        info!("Skipping accessibility comparison (provide --wac-before and --wac-after to enable)");
        return Ok(CompareOutputs {
            comparison_csv: None,
            written,
        });
    };

    info!("Computing accessibility comparison");
    let table = build_accessibility_comparison(
        PeriodInputs {
            matrix: &matrix_before,
            jobs: &jobs_before,
            workers: workers.as_ref().map(|(before, _)| before),
        },
        PeriodInputs {
            matrix: &matrix_after,
            jobs: &jobs_after,
            workers: workers.as_ref().map(|(_, after)| after),
        },
        &scheme,
    )?;
    let frame = table.to_frame()?;

    let comparison_path = args.out_dir.join(COMPARISON_FILE);
    write_frame(&comparison_path, &frame)?;

    let tracts_path = args.out_dir.join(TRACTS_FILE);
    let joined = merge_comparison_to_tracts(&tracts, &frame);
    write_tracts_with_comparison(&tracts_path, &joined, &frame)?;

    info!(
        comparison = %comparison_path.display(),
        tracts = %tracts_path.display(),
        "Accessibility outputs written"
    );
    written.push(comparison_path.clone());
    written.push(tracts_path);

    Ok(CompareOutputs {
        comparison_csv: Some(comparison_path),
        written,
    })
}

/// Joins a saved comparison to tract geometry and writes every map layer.
#[tracing::instrument(skip_all, fields(comparison = %args.comparison_csv.display(), maps_dir = %args.maps_dir.display()))]
async fn run_maps(args: &MapsArgs) -> Result<Vec<PathBuf>> {
    require_comparison(&args.comparison_csv)
        .context("Run `transit_access compare` with --wac-before and --wac-after first")?;

    let scheme = args.scheme.column_scheme()?;
    let frame = read_frame(&args.comparison_csv, ORIGIN_ID_COLUMN)?;
    info!(rows = frame.len(), columns = frame.columns().len(), "Comparison loaded");

    let tracts = load_region_tracts(&args.tracts).await?;
    let joined = merge_comparison_to_tracts(&tracts, &frame);
    let matched = joined.iter().filter(|j| j.values.is_some()).count();
    if matched == 0 {
        warn!("No tract matched a comparison row; maps will be empty");
    }

    let network_years = (
        default_departure_before().year(),
        default_departure_after().year(),
    );
    let plan = default_map_plan(&scheme, network_years, &args.countyfp);
    let written = render_maps(&plan, &joined, &frame, &LayerFileRenderer, &args.maps_dir)?;

    info!(
        files = written.len(),
        maps_dir = %args.maps_dir.display(),
        "Map outputs written"
    );
    Ok(written)
}

async fn load_region_tracts(args: &TractArgs) -> Result<Vec<Tract>> {
    let query = TractQuery::for_region(&CAPMETRO_REGION, args.tract_year);
    let source = CartographicBoundarySource::new(args.tracts.clone(), RAW_DATA_DIR);
    source.load_tracts(&query).await
}

/// Picks the HTTP routing engine from the flag or `ROUTING_ENGINE_URL`,
/// authenticating with `ROUTING_API_KEY` when it is set.
fn routing_engine(url: Option<&str>) -> Result<Option<Box<dyn RoutingEngine>>> {
    let Some(url) = url
        .map(str::to_string)
        .or_else(|| std::env::var("ROUTING_ENGINE_URL").ok())
    else {
        return Ok(None);
    };

    let client = BasicClient::new()?;
    let engine: Box<dyn RoutingEngine> = match std::env::var("ROUTING_API_KEY") {
        Ok(key) => Box::new(HttpRoutingEngine::new(ApiKey::bearer(client, &key)?, &url)),
        Err(_) => Box::new(HttpRoutingEngine::new(client, &url)),
    };
    info!(url = %url, "Routing engine configured");
    Ok(Some(engine))
}

/// Returns the period's matrix and where it lives on disk, routing it unless
/// an existing file may be reused.
#[tracing::instrument(skip_all, fields(departure = %period.departure))]
async fn period_matrix(
    config: &AnalysisConfig,
    period: &PeriodConfig,
    origins: &[Origin],
    engine: Option<&dyn RoutingEngine>,
    out_dir: &Path,
    reuse: bool,
) -> Result<(TravelTimeMatrix, PathBuf)> {
    let path = out_dir.join(matrix_file_name(period.departure));
    if reuse && path.exists() {
        info!(path = %path.display(), "Reusing travel-time matrix");
        return Ok((read_matrix(&path)?, path));
    }

    let engine = engine.context(
        "No routing engine configured: pass --routing-url, set ROUTING_ENGINE_URL, \
         or use --reuse-matrices with existing matrix files",
    )?;
    info!(
        network_year = period.network_year(),
        gtfs = %period.gtfs_path,
        "Computing travel-time matrix"
    );
    let request = MatrixRequest::for_period(config, period, origins);
    let matrix = engine.compute_matrix(&request).await?;
    write_matrix(&path, &matrix)?;
    Ok((matrix, path))
}

fn load_period_tables(
    (before, after): (&PathBuf, &PathBuf),
    options: JobTableOptions,
    config: &AnalysisConfig,
    shape: ShapeArg,
) -> Result<(JobTable, JobTable)> {
    let before_table = load_jobs(
        before,
        &options.clone().with_year(config.before.data_year),
        shape,
    )?;
    let after_table = load_jobs(after, &options.with_year(config.after.data_year), shape)?;
    Ok((before_table, after_table))
}

fn load_jobs(path: &Path, options: &JobTableOptions, shape: ShapeArg) -> Result<JobTable> {
    let shape = match shape {
        ShapeArg::Auto => sniff_shape(path, options)?,
        ShapeArg::Block => JobTableShape::BlockLevel,
        ShapeArg::Tract => JobTableShape::TractAggregated,
    };
    Ok(load_job_table(path, shape, options)?)
}

async fn publish(bucket: Option<&str>, gzip: bool, paths: &[PathBuf]) -> Result<()> {
    let Some(bucket) = bucket else {
        return Ok(());
    };
    info!(bucket = %bucket, gzip, files = paths.len(), "S3 upload enabled");
    let publisher = ArtifactPublisher::from_env(bucket, Utc::now().date_naive(), gzip).await;
    publisher.publish(paths).await?;
    Ok(())
}
