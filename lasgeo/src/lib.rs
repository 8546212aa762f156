//! # lasgeo
//!
//! Conversion de nuages de points LAS/LAZ en GeoJSON léger pour le web.
//!
//! ## Features
//!
//! - Détection du CRS source avec repli sur un CRS régional par défaut
//! - Pipeline PDAL déclaratif: lecture → reprojection WGS84 → grille voxel
//! - Plafond de points par décimation régulière (déterministe)
//! - Écriture GeoJSON en streaming avec remplacement atomique
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lasgeo::{convert, PdalCli, ProcessingOptions};
//! use std::path::Path;
//!
//! let engine = PdalCli::new("pdal");
//! let conversion = convert(
//!     &engine,
//!     Path::new("raw_data/hole1.laz"),
//!     Path::new("processed_data"),
//!     &ProcessingOptions::default(),
//! )
//! .await?;
//! println!("{} features", conversion.document.features);
//! ```

pub mod crs;
pub mod document;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod synth;
pub mod types;

pub use crs::{resolve_source_crs, CrsOrigin, ResolvedCrs};
pub use document::{output_path_for, source_stem, write_document, DocumentStats, GeometryDocument};
pub use engine::{PdalCli, PointEngine};
pub use error::{LasgeoError, Result};
pub use pipeline::{build_transform_request, Stage, TransformRequest};
pub use synth::{select_indices, synthesize, Synthesis};
pub use types::{
    DocumentProperties, PipelineExtensions, PointArray, PointFeature, ProcessingOptions,
    RawPoint, DEFAULT_MAX_POINTS, DEFAULT_VOXEL_SIZE, FALLBACK_CRS, TARGET_CRS,
};

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use tracing::info;

/// Résultat de la conversion d'un fichier
#[derive(Debug, Clone)]
pub struct Conversion {
    pub source_crs: ResolvedCrs,
    /// Points renvoyés par le moteur avant plafonnement
    pub input_points: usize,
    pub document: DocumentStats,
}

/// Convertit un fichier LAS/LAZ en document GeoJSON dans `output_dir`.
///
/// # Errors
///
/// Retourne `LasgeoError` si le moteur échoue, ne renvoie aucun point, ou si
/// l'écriture du document échoue. Aucun document partiel n'est laissé.
pub async fn convert(
    engine: &dyn PointEngine,
    input_path: &Path,
    output_dir: &Path,
    options: &ProcessingOptions,
) -> Result<Conversion> {
    // 1. CRS source
    info!("Detecting source CRS");
    let source_crs = resolve_source_crs(engine, input_path).await;
    info!(source_crs = %source_crs, fallback = source_crs.is_fallback(), "Source CRS");

    // 2. Reprojection + éclaircissement par le moteur
    let request = build_transform_request(input_path, &source_crs.crs, options);
    info!(stages = ?request.stage_kinds(), "Running PDAL pipeline (reproject + thin)");
    let arrays = engine.execute(&request).await?;

    // 3. Plafond + synthèse
    let synthesis = synthesize(&arrays, options.max_points)?;
    info!(points = synthesis.input_points, "Engine output points");
    if synthesis.was_decimated() {
        info!(
            from = synthesis.input_points,
            to = synthesis.features.len(),
            "Decimating to point cap"
        );
    }

    // 4. Document
    info!("Exporting to GeoJSON");
    let properties = DocumentProperties {
        name: source_stem(input_path),
        source_crs: source_crs.crs.clone(),
        target_crs: TARGET_CRS.to_string(),
        point_count: synthesis.features.len(),
        processed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        voxel_size: options.voxel_size,
    };
    let document = GeometryDocument::new(properties, synthesis.features);
    let path = output_path_for(input_path, output_dir);

    let stats = tokio::task::spawn_blocking(move || write_document(&document, &path))
        .await
        .map_err(|e| LasgeoError::Io(std::io::Error::other(e)))??;

    info!(
        file = %stats.path.display(),
        size_mb = %format!("{:.1}", stats.size_mb()),
        points = stats.features,
        "Saved document"
    );

    Ok(Conversion {
        source_crs,
        input_points: synthesis.input_points,
        document: stats,
    })
}
