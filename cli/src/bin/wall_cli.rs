use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use cli::{load_config, photo_as_jpeg, run_blocking, write_detection_outputs, HISTORY_FILE};
use color_eyre::eyre::Result;
use holds::{
    Band, DetectionPipeline, DirectoryImageStore, ExportBundle, GradedBundle, HoldAnalyzer,
    HoldsConfig, JsonLinesHistory, RouteAssembler, RouteGradingService, RouteRequest,
    decode_image, grade_bundle_concurrent, pipeline::default_workers, reference_from_click,
};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML or JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Timeout for image decoding and persistence writes, in seconds
    #[arg(long, global = true, default_value = "30")]
    io_timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the holds of one route and export them as crops
    Detect {
        /// Photograph of the wall
        #[arg(short, long)]
        image: PathBuf,
        /// Column of the first guide line
        #[arg(long)]
        left: i64,
        /// Column of the second guide line
        #[arg(long)]
        right: i64,
        /// Pixel whose color is the route's hold color
        #[arg(long)]
        click_x: i64,
        #[arg(long)]
        click_y: i64,
        /// Directory for crops, metadata, bundle and previews
        #[arg(short, long)]
        out_dir: PathBuf,
    },
    /// Classify and grade every crop of a detection bundle
    GradeHolds {
        /// bundle.json written by `detect`
        #[arg(short, long)]
        bundle: PathBuf,
        /// Where to write the graded holds
        #[arg(short, long)]
        output: PathBuf,
        /// Number of grading workers (defaults to available parallelism)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Grade a route from graded holds and record it in the history
    GradeRoute {
        /// Graded holds written by `grade-holds`
        #[arg(long)]
        holds: PathBuf,
        /// Directory holding route photographs and the history file
        #[arg(long)]
        history_dir: PathBuf,
        #[arg(long)]
        start_hold: Option<String>,
        #[arg(long)]
        end_hold: Option<String>,
        /// Wall angle in degrees
        #[arg(long)]
        wall_angle: Option<f64>,
        /// User to attribute the route to
        #[arg(long)]
        user: Option<String>,
        /// Route photograph to store with the record
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Print the JSON schema of the configuration
    Schema,
    /// Print the default configuration as TOML
    DefaultConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();
    let timeout = cli.io_timeout_secs;

    match &cli.command {
        Commands::Detect { image, left, right, click_x, click_y, out_dir } => {
            let config = load_config(cli.config.as_deref())?;
            detect(&config, image, Band::new(*left, *right), (*click_x, *click_y), out_dir, timeout).await?;
        }
        Commands::GradeHolds { bundle, output, workers } => {
            let config = load_config(cli.config.as_deref())?;
            grade_holds(&config, bundle, output, workers.unwrap_or_else(default_workers), timeout).await?;
        }
        Commands::GradeRoute { holds, history_dir, start_hold, end_hold, wall_angle, user, image } => {
            let config = load_config(cli.config.as_deref())?;
            let request = RouteRequest {
                holds: Vec::new(),
                start_hold: start_hold.clone(),
                end_hold: end_hold.clone(),
                wall_angle: *wall_angle,
            };
            grade_route(&config, holds, history_dir, request, user.clone(), image.clone(), timeout).await?;
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&HoldsConfig::schema())?);
        }
        Commands::DefaultConfig => {
            print!("{}", HoldsConfig::default().to_toml()?);
        }
    }

    Ok(())
}

async fn detect(
    config: &HoldsConfig,
    image_path: &Path,
    band: Band,
    (click_x, click_y): (i64, i64),
    out_dir: &Path,
    timeout: u64,
) -> Result<()> {
    let path = image_path.to_path_buf();
    let photo = run_blocking("decoding the photograph", timeout, move || {
        decode_image(&std::fs::read(&path)?)
    })
    .await?;
    info!("Photograph {:?}: {}x{}", image_path, photo.width(), photo.height());

    let reference = reference_from_click(&photo, click_x, click_y)?;
    let detection = DetectionPipeline::from_config(config).detect(&photo, reference, band)?;
    if detection.regions.is_empty() {
        warn!("No holds matched the selected color inside the band");
    }

    let outputs = write_detection_outputs(&photo, &detection, config, out_dir)?;
    info!("Exported {} crops to {:?}", outputs.crops.len(), out_dir);
    info!("Bundle saved to: {:?}", outputs.bundle);
    println!("{}", serde_json::to_string_pretty(&detection.summary())?);
    Ok(())
}

async fn grade_holds(
    config: &HoldsConfig,
    bundle_path: &Path,
    output: &Path,
    workers: usize,
    timeout: u64,
) -> Result<()> {
    let path = bundle_path.to_path_buf();
    let bundle = run_blocking("reading the bundle", timeout, move || ExportBundle::load(&path)).await?;
    info!("Grading {} holds with {} workers", bundle.len(), workers);

    let analyzer = Arc::new(HoldAnalyzer::from_config(config));
    let graded = grade_bundle_concurrent(analyzer, &bundle, workers).await?;

    let output_path = output.to_path_buf();
    let count = graded.len();
    run_blocking("writing graded holds", timeout, move || graded.save(&output_path)).await?;
    info!("Graded {} of {} holds, saved to {:?}", count, bundle.len(), output);
    Ok(())
}

async fn grade_route(
    config: &HoldsConfig,
    holds_path: &Path,
    history_dir: &Path,
    mut request: RouteRequest,
    user: Option<String>,
    image: Option<PathBuf>,
    timeout: u64,
) -> Result<()> {
    let path = holds_path.to_path_buf();
    let graded = run_blocking("reading graded holds", timeout, move || GradedBundle::load(&path)).await?;
    request.holds = graded.route_holds();

    let photo = match image {
        Some(path) => Some(run_blocking("reading the route photograph", timeout, move || photo_as_jpeg(&path)).await?),
        None => None,
    };

    let service = RouteGradingService::new(
        RouteAssembler::from_config(config),
        Arc::new(DirectoryImageStore::new(history_dir)),
        Arc::new(JsonLinesHistory::new(history_dir.join(HISTORY_FILE))),
    );
    let report = run_blocking("recording the route", timeout, move || {
        service.grade_and_record(&request, photo.as_deref(), user.as_deref())
    })
    .await?;

    match &report.record {
        Some(record) => info!("Route graded {} and recorded as {}", record.grade, record.id),
        None => warn!("No graded holds, route is not gradable"),
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
