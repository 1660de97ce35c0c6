// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk: document scan driver
//
// Entry point. Initialises logging, loads persisted settings, and runs one
// scan (or a settings command) from the command line.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use scanwerk_core::config::WorkflowConfig;
use scanwerk_core::human_errors::humanize_error;
use scanwerk_core::types::ImageFormat;
use scanwerk_document::{MagicFilter, Quad};

use services::app_services::{AppServices, ScanRequest, Source};
use services::data_dir;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "scanwerk")]
#[command(about = "Capture or import a document page, crop, enhance, and compress it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan and print the output path.
    Scan(ScanArgs),

    /// Inspect or change persisted settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Still image standing in for the camera frame.
    #[arg(long, conflicts_with = "import", required_unless_present = "import")]
    capture: Option<PathBuf>,

    /// Import an existing image (path or file:// URI).
    #[arg(long)]
    import: Option<String>,

    /// Crop outline as x1,y1,x2,y2,x3,y3,x4,y4 clockwise from top-left.
    #[arg(long)]
    corners: Option<String>,

    /// Apply an enhancement filter after cropping.
    #[arg(long, value_enum)]
    enhance: Option<FilterArg>,

    /// Output format (jpg, png, webp). Overrides the saved setting.
    #[arg(long)]
    format: Option<String>,

    /// Output quality 1-100. Overrides the saved setting.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Upper bound on the output size in bytes.
    #[arg(long)]
    max_size: Option<u64>,

    /// Skip the crop stage for this run.
    #[arg(long)]
    no_crop: bool,

    /// Directory for the compressed output.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory for intermediate files.
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Print the full result as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterArg {
    Grayscale,
    BlackAndWhite,
    Magic,
}

impl From<FilterArg> for MagicFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Grayscale => MagicFilter::Grayscale,
            FilterArg::BlackAndWhite => MagicFilter::BlackAndWhite,
            FilterArg::Magic => MagicFilter::Magic,
        }
    }
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the effective settings as JSON.
    Show,
    /// Set one key, e.g. `IMAGE_QUALITY_KEY 70` or `IMAGE_TYPE_KEY png`.
    Set { key: String, value: String },
    /// Print the settings file location.
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let services = AppServices::init();

    let outcome = match cli.command {
        Commands::Scan(args) => run_scan(&services, args).await,
        Commands::Settings(cmd) => run_settings(&services, cmd),
    };
    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_scan(services: &AppServices, args: ScanArgs) -> CliResult<ExitCode> {
    let mut config = services.load_config();
    apply_overrides(&mut config, &args)?;

    let source = match (args.capture, args.import) {
        (Some(still), _) => Source::Capture(still),
        (None, Some(reference)) => Source::Import(reference),
        (None, None) => return Err("one of --capture or --import is required".into()),
    };
    let corners = args
        .corners
        .as_deref()
        .map(|text| Quad::parse(text).ok_or_else(|| format!("invalid --corners: {text}")))
        .transpose()?;

    let run_dir = data_dir::data_subdir("runs");
    let request = ScanRequest {
        source,
        corners,
        filter: args.enhance.map(MagicFilter::from),
        work_dir: args.work_dir.unwrap_or_else(|| run_dir.join("work")),
        out_dir: args.out.unwrap_or_else(|| run_dir.join("out")),
    };
    tracing::info!(?request, "Scan starting");

    match services.run_scan(config, request).await {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.output_file.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let human = humanize_error(&err);
            eprintln!("{}", human.message);
            eprintln!("{}", human.suggestion);
            tracing::debug!(code = err.kind.code(), detail = ?err.detail, "Scan failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn apply_overrides(config: &mut WorkflowConfig, args: &ScanArgs) -> CliResult<()> {
    if let Some(ext) = &args.format {
        config.image_format =
            ImageFormat::from_extension(ext).ok_or_else(|| format!("unsupported --format: {ext}"))?;
    }
    if let Some(quality) = args.quality {
        config.image_quality = quality;
    }
    if args.max_size.is_some() {
        config.max_output_size = args.max_size;
    }
    if args.no_crop {
        config.crop_enabled = false;
    }
    Ok(())
}

fn run_settings(services: &AppServices, cmd: SettingsCommand) -> CliResult<ExitCode> {
    match cmd {
        SettingsCommand::Show => {
            let config = services.load_config();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        SettingsCommand::Set { key, value } => {
            let config = services.set_setting(&key, &value)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        SettingsCommand::Path => println!("{}", services.settings_path().display()),
    }
    Ok(ExitCode::SUCCESS)
}
