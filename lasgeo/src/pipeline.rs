//! Construction des pipelines PDAL (liste déclarative d'étapes)
//!
//! Le pipeline de base est toujours lecture → reprojection → éclaircissement.
//! Les étapes de filtrage par classe, hauteur sol et décimation ne sont
//! ajoutées que si elles sont demandées explicitement.

use std::path::Path;

use serde::Serialize;

use crate::types::{PipelineExtensions, ProcessingOptions, TARGET_CRS};

/// Une étape du pipeline, sérialisée au format PDAL (`{"type": ..., ...}`)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Stage {
    #[serde(rename = "readers.las")]
    ReadLas { filename: String },

    #[serde(rename = "filters.info")]
    Info,

    #[serde(rename = "filters.reprojection")]
    Reproject { in_srs: String, out_srs: String },

    /// Grille voxel: un point conservé par cellule (le plus proche du centre)
    #[serde(rename = "filters.voxelcenternearestneighbor")]
    VoxelThin { cell: f64 },

    #[serde(rename = "filters.range")]
    Range { limits: String },

    #[serde(rename = "filters.hag_nn")]
    HeightAboveGround,

    #[serde(rename = "filters.decimation")]
    Decimation { step: u32 },

    #[serde(rename = "writers.text")]
    WriteText {
        filename: String,
        format: String,
        /// Colonnes écrites, séparées par des virgules
        order: String,
        precision: u8,
        keep_unspecified: bool,
    },
}

impl Stage {
    /// Nom PDAL de l'étape
    pub fn kind(&self) -> &'static str {
        match self {
            Stage::ReadLas { .. } => "readers.las",
            Stage::Info => "filters.info",
            Stage::Reproject { .. } => "filters.reprojection",
            Stage::VoxelThin { .. } => "filters.voxelcenternearestneighbor",
            Stage::Range { .. } => "filters.range",
            Stage::HeightAboveGround => "filters.hag_nn",
            Stage::Decimation { .. } => "filters.decimation",
            Stage::WriteText { .. } => "writers.text",
        }
    }
}

/// Requête envoyée au moteur: liste ordonnée d'étapes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformRequest {
    pub pipeline: Vec<Stage>,
}

impl TransformRequest {
    /// JSON du pipeline tel que lu par `pdal pipeline --stdin`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Copie de la requête terminée par une étape d'écriture
    pub fn with_writer(&self, writer: Stage) -> Self {
        let mut pipeline = self.pipeline.clone();
        pipeline.push(writer);
        Self { pipeline }
    }

    /// Vrai si l'étape de hauteur sol fait partie du pipeline
    pub fn computes_height_above_ground(&self) -> bool {
        self.pipeline.contains(&Stage::HeightAboveGround)
    }

    pub fn stage_kinds(&self) -> Vec<&'static str> {
        self.pipeline.iter().map(Stage::kind).collect()
    }
}

/// Requête de lecture des métadonnées seules (détection du CRS)
pub fn build_metadata_request(input_path: &Path) -> TransformRequest {
    TransformRequest {
        pipeline: vec![
            Stage::ReadLas {
                filename: input_path.display().to_string(),
            },
            Stage::Info,
        ],
    }
}

/// Construit la requête de transformation d'un fichier
///
/// Ordre garanti: lecture, reprojection `source_crs` → WGS84, grille voxel.
/// Les extensions éventuelles suivent dans l'ordre classes, hauteur sol,
/// décimation.
pub fn build_transform_request(
    input_path: &Path,
    source_crs: &str,
    options: &ProcessingOptions,
) -> TransformRequest {
    let mut pipeline = vec![
        Stage::ReadLas {
            filename: input_path.display().to_string(),
        },
        Stage::Reproject {
            in_srs: source_crs.to_string(),
            out_srs: TARGET_CRS.to_string(),
        },
        Stage::VoxelThin {
            cell: options.voxel_size,
        },
    ];

    append_extensions(&mut pipeline, &options.extensions);

    TransformRequest { pipeline }
}

fn append_extensions(pipeline: &mut Vec<Stage>, extensions: &PipelineExtensions) {
    // 2 = sol, 3-5 = végétation, 6 = bâti
    if let Some((low, high)) = extensions.classification_range {
        pipeline.push(Stage::Range {
            limits: format!("Classification[{}:{}]", low, high),
        });
    }
    if extensions.height_above_ground {
        pipeline.push(Stage::HeightAboveGround);
    }
    if let Some(step) = extensions.decimation_step {
        pipeline.push(Stage::Decimation { step });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    fn options(voxel: f64, extensions: PipelineExtensions) -> ProcessingOptions {
        ProcessingOptions::new(voxel, NonZeroUsize::new(1000).unwrap(), extensions).unwrap()
    }

    #[test]
    fn test_baseline_pipeline_order() {
        let request = build_transform_request(
            Path::new("raw_data/hole1.laz"),
            "EPSG:2249",
            &options(1.5, PipelineExtensions::default()),
        );

        assert_eq!(
            request.stage_kinds(),
            vec![
                "readers.las",
                "filters.reprojection",
                "filters.voxelcenternearestneighbor"
            ]
        );
        assert_eq!(
            request.pipeline[1],
            Stage::Reproject {
                in_srs: "EPSG:2249".to_string(),
                out_srs: "EPSG:4326".to_string(),
            }
        );
        assert_eq!(request.pipeline[2], Stage::VoxelThin { cell: 1.5 });
    }

    #[test]
    fn test_pipeline_json_shape() {
        let request = build_transform_request(
            Path::new("/data/a.las"),
            "EPSG:2249",
            &options(2.0, PipelineExtensions::default()),
        );
        let json: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();

        let stages = json["pipeline"].as_array().unwrap();
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0]["type"], "readers.las");
        assert_eq!(stages[0]["filename"], "/data/a.las");
        assert_eq!(stages[1]["in_srs"], "EPSG:2249");
        assert_eq!(stages[1]["out_srs"], "EPSG:4326");
        assert_eq!(stages[2]["cell"], 2.0);
    }

    #[test]
    fn test_extensions_appended_after_thinning() {
        let extensions = PipelineExtensions {
            classification_range: Some((2, 6)),
            height_above_ground: true,
            decimation_step: Some(2),
        };
        let request =
            build_transform_request(Path::new("a.las"), "EPSG:2249", &options(2.0, extensions));

        assert_eq!(
            request.stage_kinds(),
            vec![
                "readers.las",
                "filters.reprojection",
                "filters.voxelcenternearestneighbor",
                "filters.range",
                "filters.hag_nn",
                "filters.decimation"
            ]
        );
        assert_eq!(
            request.pipeline[3],
            Stage::Range {
                limits: "Classification[2:6]".to_string()
            }
        );

        let json = request.to_json().unwrap();
        assert!(json.contains(r#"{"type":"filters.hag_nn"}"#));
        assert!(json.contains(r#""step":2"#));
    }

    #[test]
    fn test_metadata_request() {
        let request = build_metadata_request(Path::new("a.laz"));
        assert_eq!(request.stage_kinds(), vec!["readers.las", "filters.info"]);
    }

    #[test]
    fn test_with_writer_keeps_original() {
        let request = build_metadata_request(Path::new("a.laz"));
        let written = request.with_writer(Stage::WriteText {
            filename: "STDOUT".to_string(),
            format: "csv".to_string(),
            order: "X,Y,Z".to_string(),
            precision: 8,
            keep_unspecified: false,
        });
        assert_eq!(request.pipeline.len(), 2);
        assert_eq!(written.pipeline.len(), 3);
        assert_eq!(written.pipeline[2].kind(), "writers.text");
    }
}
