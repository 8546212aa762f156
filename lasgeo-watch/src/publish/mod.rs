//! Publication vers le service de tuilage Mapbox
//!
//! Trois phases: identifiants temporaires de staging, dépôt du document dans
//! le stockage objet, puis création du tileset. Toute erreur est absorbée en
//! [`PublishOutcome::Failed`]: le document déjà écrit et l'historique ne sont
//! jamais touchés.

pub mod mapbox;
pub mod staging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::PublishConfig;

pub use mapbox::MapboxUploads;
pub use staging::{default_staging, NullStaging, StagingStore};

/// Longueur maximale du nom de fichier repris dans l'identifiant du tileset
const TILESET_STEM_CHARS: usize = 20;

/// Erreurs de publication (jamais fatales pour le traitement)
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to get upload credentials: HTTP {status}")]
    Credentials { status: u16 },

    #[error("Object storage client not available in this build")]
    StagingUnavailable,

    #[error("Staging upload failed: {0}")]
    Staging(String),

    #[error("Upload failed: HTTP {status} - {body}")]
    CreateUpload { status: u16, body: String },

    /// Erreur réseau; l'URL (et donc le jeton) est retirée avant stockage
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for PublishError {
    fn from(error: reqwest::Error) -> Self {
        // Le jeton d'accès est dans la query string
        PublishError::Http(error.without_url())
    }
}

/// Identifiants temporaires renvoyés par l'API Uploads
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub bucket: String,
    pub key: String,
    /// URL du dépôt à transmettre à la création du tileset
    pub url: String,
}

impl std::fmt::Debug for StagingCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingCredentials")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

/// Corps de la requête de création
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRequest {
    pub url: String,
    pub tileset: String,
    pub name: String,
}

/// Réponse acceptée par le service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAccepted {
    pub upload_id: String,
}

/// Pointeur vers le dernier tileset publié (`latest_tileset.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilesetUploadRecord {
    pub tileset_id: String,
    pub upload_id: String,
    pub name: String,
    pub uploaded_at: String,
}

impl TilesetUploadRecord {
    /// Remplace le pointeur existant
    pub fn save(&self, path: &Path) -> Result<(), PublishError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Issue d'une tentative de publication
#[derive(Debug)]
pub enum PublishOutcome {
    /// Publication désactivée (pas d'identifiants)
    Skipped,
    Published(TilesetUploadRecord),
    Failed(PublishError),
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PublishOutcome::Failed(_))
    }
}

/// API distante de création de tilesets
#[async_trait]
pub trait TilesetService: Send + Sync {
    /// Phase 1: identifiants temporaires de staging
    async fn request_credentials(&self) -> Result<StagingCredentials, PublishError>;

    /// Phase 3: création du tileset à partir de l'objet déposé
    async fn create_upload(&self, request: &UploadRequest) -> Result<UploadAccepted, PublishError>;
}

/// Identifiant du tileset: `{user}.{base}-{20 premiers caractères du nom}`
pub fn tileset_id(username: &str, tileset_base: &str, stem: &str) -> String {
    let short: String = stem.chars().take(TILESET_STEM_CHARS).collect();
    format!("{}.{}-{}", username, tileset_base, short)
}

/// Orchestrateur des trois phases
pub struct Publisher {
    config: PublishConfig,
    service: Arc<dyn TilesetService>,
    staging: Arc<dyn StagingStore>,
    pointer_path: PathBuf,
}

impl Publisher {
    pub fn new(
        config: PublishConfig,
        service: Arc<dyn TilesetService>,
        staging: Arc<dyn StagingStore>,
        pointer_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            service,
            staging,
            pointer_path: pointer_path.into(),
        }
    }

    pub fn pointer_path(&self) -> &Path {
        &self.pointer_path
    }

    /// Publie un document; ne retourne jamais d'erreur
    pub async fn publish(&self, document_path: &Path, stem: &str) -> PublishOutcome {
        match self.try_publish(document_path, stem).await {
            Ok(record) => {
                info!(
                    tileset = record.tileset_id.as_str(),
                    upload_id = record.upload_id.as_str(),
                    "Mapbox upload started"
                );
                PublishOutcome::Published(record)
            }
            Err(PublishError::StagingUnavailable) => {
                warn!(
                    staging = self.staging.name(),
                    "Object storage client unavailable, skipping Mapbox upload"
                );
                PublishOutcome::Failed(PublishError::StagingUnavailable)
            }
            Err(e) => {
                error!(error = %e, "Mapbox upload error");
                PublishOutcome::Failed(e)
            }
        }
    }

    async fn try_publish(
        &self,
        document_path: &Path,
        stem: &str,
    ) -> Result<TilesetUploadRecord, PublishError> {
        // A. Identifiants de staging
        let credentials = self.service.request_credentials().await?;

        // B. Dépôt du document
        let body = tokio::fs::read(document_path).await?;
        self.staging.put_object(&credentials, body).await?;

        // C. Création du tileset
        let tileset = tileset_id(&self.config.username, &self.config.tileset_base, stem);
        let request = UploadRequest {
            url: credentials.url.clone(),
            tileset: tileset.clone(),
            name: format!("LiDAR - {}", stem),
        };
        let accepted = self.service.create_upload(&request).await?;

        let record = TilesetUploadRecord {
            tileset_id: tileset,
            upload_id: accepted.upload_id,
            name: stem.to_string(),
            uploaded_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        record.save(&self.pointer_path)?;

        Ok(record)
    }
}
