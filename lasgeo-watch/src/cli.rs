//! Arguments et commandes CLI
//!
//! - surveillance de la boîte de dépôt (défaut)
//! - traitement d'un fichier unique (`--process`)

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use lasgeo::{PdalCli, PipelineExtensions, PointEngine, ProcessingOptions, DEFAULT_VOXEL_SIZE};
use tracing::{info, warn};

use crate::config::{PublishConfig, Settings};
use crate::ledger::{ChangeLedger, FingerprintMode};
use crate::processor::FileProcessor;
use crate::publish::{default_staging, MapboxUploads, PublishOutcome, Publisher};
use crate::watch::Watcher;

/// Paramètres de traitement communs aux deux modes
#[derive(Debug, Clone, Args)]
pub struct PipelineArgs {
    /// Voxel grid size in meters (thinning density)
    #[arg(long, default_value_t = DEFAULT_VOXEL_SIZE)]
    pub voxel: f64,

    /// Max point cap for the GeoJSON output
    #[arg(long, default_value = "500000")]
    pub max_points: NonZeroUsize,

    /// Folder watched for new .laz/.las files
    #[arg(long, default_value = "raw_data")]
    pub inbox: PathBuf,

    /// Folder receiving GeoJSON documents, history and tileset pointer
    #[arg(long, default_value = "processed_data")]
    pub output: PathBuf,

    /// Seconds between folder checks
    #[arg(long, default_value_t = 5)]
    pub poll_interval: u64,

    /// Maximum duration of one PDAL run, in seconds
    #[arg(long, default_value_t = 600)]
    pub engine_timeout: u64,

    /// Timeout of each Mapbox HTTP request, in seconds
    #[arg(long, default_value_t = 120)]
    pub publish_timeout: u64,

    /// PDAL executable
    #[arg(long, env = "PDAL_BIN", default_value = "pdal")]
    pub pdal: PathBuf,

    /// Keep only this classification range, e.g. 2:6 (ground to buildings)
    #[arg(long, value_parser = parse_class_range)]
    pub classes: Option<(u8, u8)>,

    /// Compute height above ground (filters.hag_nn)
    #[arg(long)]
    pub hag: bool,

    /// Extra engine-side decimation: keep one point every STEP
    #[arg(long, value_name = "STEP")]
    pub decimate: Option<u32>,

    /// How new files are recognized
    #[arg(long, value_enum, default_value_t = FingerprintMode::Metadata)]
    pub fingerprint: FingerprintMode,

    /// Never upload to Mapbox, even with credentials
    #[arg(long)]
    pub no_publish: bool,
}

impl PipelineArgs {
    /// Construit la configuration immuable du processus
    pub fn into_settings(self) -> Result<Settings> {
        let extensions = PipelineExtensions {
            classification_range: self.classes,
            height_above_ground: self.hag,
            decimation_step: self.decimate,
        };
        let options = ProcessingOptions::new(self.voxel, self.max_points, extensions)?;

        let publish = if self.no_publish {
            None
        } else {
            PublishConfig::from_env()
        };

        Ok(Settings {
            inbox: self.inbox,
            output_dir: self.output,
            options,
            poll_interval: Duration::from_secs(self.poll_interval),
            engine_timeout: Duration::from_secs(self.engine_timeout),
            publish_timeout: Duration::from_secs(self.publish_timeout),
            fingerprint: self.fingerprint,
            publish,
        })
    }
}

/// Parse une plage de classes `A:B`
fn parse_class_range(raw: &str) -> Result<(u8, u8), String> {
    let (low, high) = raw
        .split_once(':')
        .ok_or_else(|| format!("Invalid class range '{}'. Expected A:B (e.g., 2:6)", raw))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u8>()
            .map_err(|_| format!("Invalid class '{}' in range '{}'", v, raw))
    };
    let (low, high) = (parse(low)?, parse(high)?);
    if low > high {
        return Err(format!("Class range '{}' is reversed", raw));
    }
    Ok((low, high))
}

/// Démarre le moteur PDAL; son absence est fatale
pub async fn start_engine(binary: &Path, timeout: Duration) -> Result<Arc<dyn PointEngine>> {
    let engine = PdalCli::new(binary).with_timeout(timeout);
    let version = engine.probe().await.with_context(|| {
        format!(
            "PDAL is not available ({}). Install via: conda install -c conda-forge pdal",
            binary.display()
        )
    })?;
    info!(version = version.as_str(), "PDAL ready");
    Ok(Arc::new(engine))
}

/// Assemble le processeur (et le publieur si des identifiants existent)
pub fn build_processor(
    settings: Arc<Settings>,
    engine: Arc<dyn PointEngine>,
) -> Result<FileProcessor> {
    let publisher = match &settings.publish {
        Some(config) => {
            let service = MapboxUploads::new(config.clone(), settings.publish_timeout)
                .context("Failed to build Mapbox client")?;
            Some(Publisher::new(
                config.clone(),
                Arc::new(service),
                default_staging(),
                settings.pointer_path(),
            ))
        }
        None => None,
    };

    Ok(FileProcessor::new(engine, settings, publisher))
}

/// Exécute le mode surveillance
pub async fn cmd_watch(settings: Arc<Settings>, engine: Arc<dyn PointEngine>) -> Result<()> {
    let ledger = ChangeLedger::load(settings.ledger_path());
    let processor = build_processor(settings, engine)?;
    Watcher::new(processor, ledger).run().await
}

/// Traite un seul fichier
pub async fn cmd_process(
    path: &Path,
    settings: Arc<Settings>,
    engine: Arc<dyn PointEngine>,
) -> Result<()> {
    let processor = build_processor(settings, engine)?;
    let processed = processor
        .process(path)
        .await
        .with_context(|| format!("Failed to process {}", path.display()))?;

    if let PublishOutcome::Failed(e) = &processed.publish {
        warn!(error = %e, "Document written but not published");
    }

    println!(
        "Export complete: {} ({} points, {:.1} MB)",
        processed.document.display(),
        processed.features,
        processed.bytes as f64 / (1024.0 * 1024.0)
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: PipelineArgs,
    }

    #[test]
    fn test_parse_class_range() {
        assert_eq!(parse_class_range("2:6"), Ok((2, 6)));
        assert_eq!(parse_class_range(" 2 : 2 "), Ok((2, 2)));
        assert!(parse_class_range("6:2").is_err());
        assert!(parse_class_range("2-6").is_err());
        assert!(parse_class_range("2:300").is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["lasgeo-watch", "--no-publish"]).unwrap();
        let settings = cli.args.into_settings().unwrap();
        assert_eq!(settings.options.voxel_size, 2.0);
        assert_eq!(settings.options.max_points.get(), 500_000);
        assert!(settings.options.extensions.is_empty());
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.inbox, PathBuf::from("raw_data"));
        assert_eq!(settings.output_dir, PathBuf::from("processed_data"));
        assert_eq!(settings.fingerprint, FingerprintMode::Metadata);
        assert!(settings.publish.is_none());
    }

    #[test]
    fn test_overrides() {
        let cli = TestCli::try_parse_from([
            "lasgeo-watch",
            "--voxel",
            "1.5",
            "--max-points",
            "1000",
            "--classes",
            "2:6",
            "--hag",
            "--decimate",
            "2",
            "--fingerprint",
            "content",
            "--no-publish",
        ])
        .unwrap();
        let settings = cli.args.into_settings().unwrap();
        assert_eq!(settings.options.voxel_size, 1.5);
        assert_eq!(settings.options.max_points.get(), 1000);
        assert_eq!(settings.options.extensions.classification_range, Some((2, 6)));
        assert!(settings.options.extensions.height_above_ground);
        assert_eq!(settings.options.extensions.decimation_step, Some(2));
        assert_eq!(settings.fingerprint, FingerprintMode::Content);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(TestCli::try_parse_from(["lasgeo-watch", "--max-points", "0"]).is_err());

        // clap accepte le nombre, la validation se fait à la construction
        for voxel in ["--voxel=-1", "--voxel=0"] {
            let cli = TestCli::try_parse_from(["lasgeo-watch", voxel, "--no-publish"]).unwrap();
            assert!(cli.args.into_settings().is_err(), "{} accepted", voxel);
        }
        assert!(TestCli::try_parse_from(["lasgeo-watch", "--classes", "6:2"]).is_err());
    }
}
