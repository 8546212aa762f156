//! Point d'entrée CLI pour lasgeo-watch

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use lasgeo_watch::cli::{self, PipelineArgs};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Convertir automatiquement les relevés LiDAR déposés en GeoJSON et les publier sur Mapbox
#[derive(Parser)]
#[command(name = "lasgeo-watch")]
#[command(author, version)]
#[command(about = "LiDAR to GeoJSON pipeline with folder watching and Mapbox publishing")]
#[command(long_about = "Watches an inbox folder for .laz/.las surveys, reprojects and thins them with PDAL, writes capped GeoJSON documents and optionally publishes them as Mapbox tilesets.\n\nWithout --process, runs in watch mode until Ctrl-C.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long)]
    quiet: bool,

    /// Process a single file instead of watching
    #[arg(short, long, value_name = "FILE")]
    process: Option<PathBuf>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let binary = cli.pipeline.pdal.clone();
    let settings = Arc::new(cli.pipeline.into_settings()?);

    // Le moteur est indispensable aux deux modes
    let engine = cli::start_engine(&binary, settings.engine_timeout).await?;

    if settings.publish.is_none() {
        info!("Mapbox credentials not set, documents will not be published");
    }

    match cli.process {
        Some(path) => {
            if !path.exists() {
                error!(file = %path.display(), "File not found");
                std::process::exit(1);
            }
            cli::cmd_process(&path, settings, engine).await?;
        }
        None => {
            cli::cmd_watch(settings, engine).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
