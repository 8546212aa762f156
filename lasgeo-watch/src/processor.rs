//! Traitement complet d'un fichier: conversion puis publication éventuelle

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use lasgeo::{convert, source_stem, LasgeoError, PointEngine};
use thiserror::Error;
use tracing::{error, info};

use crate::config::Settings;
use crate::publish::{PublishOutcome, Publisher};

/// Échec du traitement d'un fichier
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Le moteur n'est plus utilisable: aucun autre fichier ne peut être traité dans ce scan
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(#[source] LasgeoError),

    /// Le moteur n'a produit aucun point (non retenté avant le prochain scan)
    #[error("No point data in pipeline output")]
    EmptyOutput,

    /// Exécution du pipeline en échec
    #[error("Pipeline execution failed: {0}")]
    Transform(#[source] LasgeoError),

    /// Écriture du document en échec
    #[error("GeoJSON export failed: {0}")]
    Document(#[source] LasgeoError),
}

impl ProcessError {
    /// Vrai si le scan en cours doit s'interrompre
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProcessError::EngineUnavailable(_))
    }
}

impl From<LasgeoError> for ProcessError {
    fn from(error: LasgeoError) -> Self {
        match error {
            LasgeoError::EngineUnavailable(_) => ProcessError::EngineUnavailable(error),
            LasgeoError::EmptyOutput => ProcessError::EmptyOutput,
            LasgeoError::Io(_) | LasgeoError::Json(_) => ProcessError::Document(error),
            other => ProcessError::Transform(other),
        }
    }
}

/// Fichier traité avec succès
#[derive(Debug)]
pub struct ProcessedFile {
    pub document: PathBuf,
    pub features: usize,
    pub bytes: u64,
    pub publish: PublishOutcome,
}

/// Chaîne de traitement partagée par le mode fichier unique et la surveillance
pub struct FileProcessor {
    engine: Arc<dyn PointEngine>,
    settings: Arc<Settings>,
    publisher: Option<Publisher>,
}

impl FileProcessor {
    pub fn new(
        engine: Arc<dyn PointEngine>,
        settings: Arc<Settings>,
        publisher: Option<Publisher>,
    ) -> Self {
        Self {
            engine,
            settings,
            publisher,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Traite un fichier; la publication ne peut pas faire échouer le traitement
    pub async fn process(&self, input_path: &Path) -> Result<ProcessedFile, ProcessError> {
        let name = input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(file = name.as_str(), "━━━ Processing ━━━");
        let started_at = Instant::now();

        std::fs::create_dir_all(&self.settings.output_dir)
            .map_err(|e| ProcessError::Document(LasgeoError::Io(e)))?;

        let conversion = convert(
            self.engine.as_ref(),
            input_path,
            &self.settings.output_dir,
            &self.settings.options,
        )
        .await
        .map_err(|e| {
            let e = ProcessError::from(e);
            error!(file = name.as_str(), error = %e, "Processing failed");
            e
        })?;

        let publish = match &self.publisher {
            Some(publisher) => {
                info!("Uploading to Mapbox Tiling Service");
                publisher
                    .publish(&conversion.document.path, &source_stem(input_path))
                    .await
            }
            None => {
                info!("Mapbox upload skipped (no credentials)");
                PublishOutcome::Skipped
            }
        };

        info!(
            file = name.as_str(),
            elapsed = %format!("{:.1}s", started_at.elapsed().as_secs_f64()),
            "✓ Complete"
        );

        Ok(ProcessedFile {
            document: conversion.document.path,
            features: conversion.document.features,
            bytes: conversion.document.bytes,
            publish,
        })
    }
}
