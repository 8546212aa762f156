//! Types d'erreurs pour le crate lasgeo

use std::time::Duration;

use thiserror::Error;

/// Erreurs pouvant survenir lors de la conversion d'un nuage de points
#[derive(Debug, Error)]
pub enum LasgeoError {
    /// Erreur d'I/O (écriture du document, fichiers temporaires)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Erreur de sérialisation JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Le moteur PDAL n'est pas disponible (binaire absent ou non exécutable)
    #[error("Point-cloud engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Le moteur a échoué pendant l'exécution du pipeline
    #[error("Engine pipeline failed (status {status}): {stderr}")]
    EngineFailed { status: String, stderr: String },

    /// Le moteur n'a pas répondu dans le délai imparti
    #[error("Engine timed out after {0:?}")]
    EngineTimeout(Duration),

    /// Sortie du moteur illisible
    #[error("Malformed engine output: {0}")]
    MalformedOutput(String),

    /// Le pipeline n'a produit aucun point
    #[error("No point data in pipeline output")]
    EmptyOutput,

    /// Paramètres de traitement invalides
    #[error("Invalid processing options: {0}")]
    InvalidOptions(String),
}

impl LasgeoError {
    /// Crée une erreur de sortie illisible avec contexte
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedOutput(reason.into())
    }

    /// Vrai si l'erreur empêche tout traitement ultérieur (pas seulement ce fichier)
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, Self::EngineUnavailable(_))
    }
}

pub type Result<T, E = LasgeoError> = std::result::Result<T, E>;
