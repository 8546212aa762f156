//! Adaptateur PDAL via la ligne de commande (`pdal pipeline --stdin`)
//!
//! Les points sont récupérés en ajoutant une étape `writers.text` vers STDOUT,
//! puis relus colonne par colonne d'après l'en-tête CSV.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::PointEngine;
use crate::pipeline::{Stage, TransformRequest};
use crate::types::{PointArray, RawPoint};
use crate::{LasgeoError, Result};

/// Délai par défaut d'une exécution PDAL
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(600);

/// Moteur PDAL lancé en sous-processus
#[derive(Debug, Clone)]
pub struct PdalCli {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for PdalCli {
    fn default() -> Self {
        Self::new("pdal")
    }
}

impl PdalCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_ENGINE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Lance PDAL et retourne stdout; stdin reçoit le JSON du pipeline si fourni
    async fn run(&self, args: &[&str], stdin: Option<String>) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = %self.binary.display(), ?args, "Spawning PDAL");

        let mut child = command.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                LasgeoError::EngineUnavailable(format!("{}: {}", self.binary.display(), e))
            }
            _ => LasgeoError::Io(e),
        })?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes()).await?;
                // Fermer stdin pour que PDAL démarre
                drop(pipe);
            }
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| LasgeoError::EngineTimeout(self.timeout))??;

        if !output.status.success() {
            return Err(LasgeoError::EngineFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl PointEngine for PdalCli {
    async fn probe(&self) -> Result<String> {
        let stdout = self.run(&["--version"], None).await?;
        let version = String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('-'))
            .unwrap_or("unknown")
            .to_string();
        Ok(version)
    }

    async fn metadata(&self, request: &TransformRequest) -> Result<Value> {
        let metadata_file = tempfile::Builder::new()
            .prefix("lasgeo-meta-")
            .suffix(".json")
            .tempfile()?;
        let metadata_path = metadata_file.path().display().to_string();

        self.run(
            &["pipeline", "--stdin", "--metadata", &metadata_path],
            Some(request.to_json()?),
        )
        .await?;

        let content = tokio::fs::read_to_string(metadata_file.path()).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn execute(&self, request: &TransformRequest) -> Result<Vec<PointArray>> {
        let request = request.with_writer(text_writer(request));

        let stdout = self
            .run(&["pipeline", "--stdin"], Some(request.to_json()?))
            .await?;

        parse_text_output(&stdout)
    }
}

/// Étape `writers.text` vers STDOUT limitée aux colonnes relues
///
/// `HeightAboveGround` n'est demandée que si `filters.hag_nn` l'a produite,
/// PDAL refusant une dimension inconnue dans `order`.
pub fn text_writer(request: &TransformRequest) -> Stage {
    let mut order = String::from("X,Y,Z,Classification");
    if request.computes_height_above_ground() {
        order.push_str(",HeightAboveGround");
    }

    Stage::WriteText {
        filename: "STDOUT".to_string(),
        format: "csv".to_string(),
        order,
        precision: 8,
        keep_unspecified: false,
    }
}

/// Index des colonnes utiles dans l'en-tête `writers.text`
struct Columns {
    x: usize,
    y: usize,
    z: usize,
    classification: Option<usize>,
    height_above_ground: Option<usize>,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self> {
        let names: Vec<&str> = header
            .split(',')
            .map(|name| name.trim().trim_matches('"'))
            .collect();
        let find = |wanted: &str| names.iter().position(|n| n.eq_ignore_ascii_case(wanted));

        let required = |wanted: &str| {
            find(wanted).ok_or_else(|| {
                LasgeoError::malformed(format!("missing {} column in header: {}", wanted, header))
            })
        };

        Ok(Self {
            x: required("X")?,
            y: required("Y")?,
            z: required("Z")?,
            classification: find("Classification"),
            height_above_ground: find("HeightAboveGround"),
        })
    }
}

/// Relit la sortie CSV de `writers.text`
///
/// Sortie vide: aucun tableau. En-tête seul: un tableau vide.
pub fn parse_text_output(stdout: &[u8]) -> Result<Vec<PointArray>> {
    let text = std::str::from_utf8(stdout)
        .map_err(|e| LasgeoError::malformed(format!("engine output is not UTF-8: {}", e)))?;

    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns = Columns::from_header(header)?;

    let mut points = Vec::new();
    for (row, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let number = |idx: usize| -> Result<f64> {
            let raw = fields.get(idx).ok_or_else(|| {
                LasgeoError::malformed(format!("row {}: missing field {}", row + 1, idx))
            })?;
            raw.parse::<f64>().map_err(|_| {
                LasgeoError::malformed(format!("row {}: invalid number '{}'", row + 1, raw))
            })
        };

        points.push(RawPoint {
            x: number(columns.x)?,
            y: number(columns.y)?,
            z: number(columns.z)?,
            classification: columns
                .classification
                .map(|idx| number(idx).map(|v| v as i64))
                .transpose()?,
            height_above_ground: columns.height_above_ground.map(number).transpose()?,
        });
    }

    Ok(vec![points])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_output() {
        let csv = "\"X\",\"Y\",\"Z\",\"Intensity\",\"Classification\"\n\
                   -71.05890123,42.36001234,12.345,120.00000000,2.00000000\n\
                   -71.05890999,42.36009999,15.5,80.00000000,5.00000000\n";

        let arrays = parse_text_output(csv.as_bytes()).unwrap();
        assert_eq!(arrays.len(), 1);
        assert_eq!(arrays[0].len(), 2);

        let first = arrays[0][0];
        assert_eq!(first.x, -71.05890123);
        assert_eq!(first.y, 42.36001234);
        assert_eq!(first.z, 12.345);
        assert_eq!(first.classification, Some(2));
        assert_eq!(first.height_above_ground, None);
        assert_eq!(arrays[0][1].classification, Some(5));
    }

    #[test]
    fn test_parse_text_output_with_hag() {
        let csv = "X,Y,Z,HeightAboveGround\n1.0,2.0,30.0,4.25\n";
        let arrays = parse_text_output(csv.as_bytes()).unwrap();
        assert_eq!(arrays[0][0].height_above_ground, Some(4.25));
        assert_eq!(arrays[0][0].classification, None);
    }

    #[test]
    fn test_parse_text_output_empty() {
        assert!(parse_text_output(b"").unwrap().is_empty());

        let header_only = parse_text_output(b"\"X\",\"Y\",\"Z\"\n").unwrap();
        assert_eq!(header_only.len(), 1);
        assert!(header_only[0].is_empty());
    }

    #[test]
    fn test_parse_text_output_malformed() {
        assert!(matches!(
            parse_text_output(b"\"A\",\"B\"\n1,2\n"),
            Err(LasgeoError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_text_output(b"X,Y,Z\n1.0,abc,3.0\n"),
            Err(LasgeoError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_text_output(b"X,Y,Z\n1.0,2.0\n"),
            Err(LasgeoError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_text_writer_columns() {
        use crate::pipeline::build_transform_request;
        use crate::types::{PipelineExtensions, ProcessingOptions};
        use std::num::NonZeroUsize;

        let max = NonZeroUsize::new(10).unwrap();
        let plain = ProcessingOptions::new(2.0, max, PipelineExtensions::default()).unwrap();
        let request = build_transform_request(Path::new("a.las"), "EPSG:2249", &plain);
        match text_writer(&request) {
            Stage::WriteText {
                order,
                keep_unspecified,
                filename,
                ..
            } => {
                assert_eq!(order, "X,Y,Z,Classification");
                assert!(!keep_unspecified);
                assert_eq!(filename, "STDOUT");
            }
            other => panic!("unexpected stage: {:?}", other),
        }

        let with_hag = ProcessingOptions::new(
            2.0,
            max,
            PipelineExtensions {
                height_above_ground: true,
                ..Default::default()
            },
        )
        .unwrap();
        let request = build_transform_request(Path::new("a.las"), "EPSG:2249", &with_hag);
        let json = serde_json::to_string(&text_writer(&request)).unwrap();
        assert!(json.contains(r#""order":"X,Y,Z,Classification,HeightAboveGround""#));
        assert!(json.contains(r#""keep_unspecified":false"#));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let engine = PdalCli::new("/nonexistent/bin/pdal-lasgeo-test");
        let err = engine.probe().await.unwrap_err();
        assert!(err.is_engine_unavailable(), "unexpected error: {:?}", err);
    }
}
