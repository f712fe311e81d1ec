// Command-line surface: analyze a source, list tracked runs, write a default config

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::Config;
use crate::core::database::Database;
use crate::core::form_detector::{analyze, StopSignal};
use crate::core::tracking::{RunTracker, SqliteRunTracker};
use crate::models::check::{ExerciseType, Side};
use crate::models::session::RunSummary;
use crate::platform::capture::ImageSequence;
use crate::platform::pose::{
    DefaultPoseBackend, DetectedPoses, LandmarkRecorder, LandmarkRecording, PoseBackend,
};

// Only `.jsonl` is read as a recording; any other file is tried as an image
const RECORDING_EXTENSION: &str = "jsonl";

/// Exercise form analysis from body pose landmarks
#[derive(Parser, Debug)]
#[command(name = "form-check")]
#[command(author, version, about = "Frame-by-frame exercise form analysis")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze an image sequence or a landmark recording
    Analyze(AnalyzeArgs),

    /// List tracked runs with their parameters and metrics
    Runs(RunsArgs),

    /// Write the default configuration file
    InitConfig(InitConfigArgs),
}

/// Arguments for the analyze command
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directory of frames, a single image, or a JSON-lines landmark recording (`.jsonl`)
    pub input: PathBuf,

    /// Exercise to evaluate (overrides the config file)
    #[arg(short, long, value_enum)]
    pub exercise: Option<ExerciseArg>,

    /// Arm to evaluate (overrides the config file)
    #[arg(short, long, value_enum)]
    pub side: Option<SideArg>,

    /// Where to write the summary (default: <input>_analysis.json next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file (created with defaults if missing)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Record the run in the tracking database
    #[arg(long)]
    pub track: bool,

    /// Tracking database location (overrides the config file)
    #[arg(long)]
    pub tracking_db: Option<PathBuf>,

    /// Save detected landmarks as JSON lines for later replay
    #[arg(long)]
    pub record_landmarks: Option<PathBuf>,

    /// Worker tasks for frame evaluation
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Arguments for the runs command
#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Tracking database location
    #[arg(long)]
    pub tracking_db: Option<PathBuf>,

    /// Maximum number of runs to show
    #[arg(short, long, default_value = "10")]
    pub limit: i64,
}

/// Arguments for the init-config command
#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Destination (default: ~/.form_check/config/settings.json)
    pub path: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ExerciseArg {
    #[value(name = "bicep_curl")]
    BicepCurl,
    #[value(name = "lateral_raise")]
    LateralRaise,
}

impl From<ExerciseArg> for ExerciseType {
    fn from(val: ExerciseArg) -> Self {
        match val {
            ExerciseArg::BicepCurl => ExerciseType::BicepCurl,
            ExerciseArg::LateralRaise => ExerciseType::LateralRaise,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SideArg {
    Left,
    Right,
}

impl From<SideArg> for Side {
    fn from(val: SideArg) -> Self {
        match val {
            SideArg::Left => Side::Left,
            SideArg::Right => Side::Right,
        }
    }
}

/// Execute a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Analyze(args) => run_analyze(args).await,
        Commands::Runs(args) => run_list(args).await,
        Commands::InitConfig(args) => run_init_config(args),
    }
}

// ==============================================================================
// Helpers
// ==============================================================================

/// Explicit config file, else the default location if it exists, else defaults
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    match Config::default_path() {
        Ok(path) if path.exists() => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        _ => Ok(Config::default()),
    }
}

fn is_recording(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(RECORDING_EXTENSION))
            .unwrap_or(false)
}

/// `<stem>_analysis.json` next to the input
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "form_check".to_string());
    input.with_file_name(format!("{}_analysis.json", stem))
}

fn source_name(input: &Path) -> String {
    input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string())
}

async fn open_tracker(db_path: &Path) -> Option<SqliteRunTracker> {
    match Database::init(db_path).await {
        Ok(db) => Some(SqliteRunTracker::new(Arc::new(db))),
        Err(e) => {
            warn!(
                "Run tracking unavailable ({}): {}; continuing without it",
                db_path.display(),
                e
            );
            None
        }
    }
}

fn spawn_interrupt_handler(stop: StopSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current frame");
            stop.request_stop();
        }
    });
}

fn print_summary(summary: &RunSummary, output: &Path) {
    let rule = "=".repeat(50);
    println!("\n{}", rule);
    println!("Analysis Complete!");
    println!("{}", rule);
    println!(
        "Exercise: {} ({} arm)",
        summary.exercise_type.title(),
        summary.side.label()
    );
    println!("Total frames: {}", summary.total_frames);
    println!("Valid frames: {}", summary.valid_frames);
    println!("Accuracy: {:.2}%", summary.accuracy);

    let stats = summary.metric_statistics();
    if !stats.is_empty() {
        println!("\nSmoothed metrics (mean ± std):");
        for (key, stat) in stats {
            println!("  {:<40} {:>10.2} ± {:.2}", key, stat.mean, stat.std_dev);
        }
    }

    println!("\nResults saved to: {}", output.display());
}

// ==============================================================================
// Commands
// ==============================================================================

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(exercise) = args.exercise {
        config.exercise_type = exercise.into();
    }
    if let Some(side) = args.side {
        config.side = side.into();
    }
    if let Some(workers) = args.workers {
        config.parallel_workers = workers;
    }
    if let Some(db_path) = args.tracking_db {
        config.tracking_db_path = db_path;
    }
    config.tracking_enabled |= args.track;
    config.validate().context("Invalid analysis settings")?;

    let tracker = if config.tracking_enabled {
        open_tracker(&config.tracking_db_path).await
    } else {
        None
    };
    let tracker_ref = tracker.as_ref().map(|t| t as &dyn RunTracker);

    let stop = StopSignal::new();
    spawn_interrupt_handler(stop.clone());

    let source = source_name(&args.input);

    let summary = if is_recording(&args.input) {
        if args.record_landmarks.is_some() {
            warn!("Input is already a landmark recording; --record-landmarks ignored");
        }

        let total = LandmarkRecording::frame_count(&args.input)?;
        let recording = LandmarkRecording::open(&args.input)?;
        info!(frames = total, "Replaying landmark recording {}", args.input.display());

        analyze(&source, recording, &config, tracker_ref, &stop, Some(total)).await?
    } else {
        let frames = ImageSequence::open(&args.input)
            .with_context(|| format!("Failed to open {}", args.input.display()))?;
        let total = frames.len() as u64;

        let backend = DefaultPoseBackend::new(&config.pose).context("Failed to initialize pose backend")?;
        info!(frames = total, model = %backend.get_model_info(), "Processing image sequence");

        let mut poses = DetectedPoses::new(frames, &backend);
        if let Some(path) = &args.record_landmarks {
            poses = poses.with_recorder(LandmarkRecorder::create(path)?);
        }

        let summary = analyze(&source, &mut poses, &config, tracker_ref, &stop, Some(total)).await?;
        if let Some(recorded) = poses.finish()? {
            info!(frames = recorded, "Landmarks recorded");
        }
        summary
    };

    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));
    summary
        .save_json(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    print_summary(&summary, &output);
    Ok(())
}

async fn run_list(args: RunsArgs) -> Result<()> {
    let db_path = match args.tracking_db {
        Some(path) => path,
        None => load_config(None)?.tracking_db_path,
    };

    if !db_path.exists() {
        println!("No tracked runs ({} does not exist)", db_path.display());
        return Ok(());
    }

    let db = Database::init(&db_path)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    let tracker = SqliteRunTracker::new(Arc::new(db));

    let runs = tracker.list_runs(args.limit).await?;
    if runs.is_empty() {
        println!("No tracked runs");
        return Ok(());
    }

    for run in runs {
        let started = chrono::DateTime::from_timestamp_millis(run.start_timestamp)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| run.start_timestamp.to_string());
        println!("{}  {}  [{}]  {}", run.id, run.run_name, run.status, started);

        for param in tracker.get_params(&run.id).await? {
            println!("    param  {} = {}", param.key, param.value);
        }
        for metric in tracker.get_metrics(&run.id).await? {
            println!("    metric {} = {:.4}", metric.key, metric.value);
        }
    }

    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    Config::reset(&path).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
