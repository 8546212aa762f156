//! Configuration du système
//!
//! Construite une seule fois au démarrage (CLI + environnement), puis passée
//! par référence à chaque composant. Rien ne la modifie ensuite.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use lasgeo::ProcessingOptions;

use crate::ledger::FingerprintMode;

/// Nom du fichier d'historique dans le dossier de sortie
pub const LEDGER_FILE: &str = ".processed_history.json";

/// Nom du pointeur vers le dernier tileset publié
pub const POINTER_FILE: &str = "latest_tileset.json";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_TILESET_BASE: &str = "lidar";
pub const DEFAULT_API_URL: &str = "https://api.mapbox.com";

/// Configuration principale
#[derive(Debug, Clone)]
pub struct Settings {
    /// Dossier surveillé
    pub inbox: PathBuf,

    /// Dossier des documents, de l'historique et du pointeur
    pub output_dir: PathBuf,

    pub options: ProcessingOptions,

    /// Attente entre deux scans
    pub poll_interval: Duration,

    /// Délai maximal d'une exécution du moteur
    pub engine_timeout: Duration,

    /// Délai maximal d'une requête HTTP de publication
    pub publish_timeout: Duration,

    pub fingerprint: FingerprintMode,

    /// `None` désactive la publication
    pub publish: Option<PublishConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inbox: PathBuf::from("raw_data"),
            output_dir: PathBuf::from("processed_data"),
            options: ProcessingOptions::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            engine_timeout: lasgeo::engine::pdal::DEFAULT_ENGINE_TIMEOUT,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            fingerprint: FingerprintMode::default(),
            publish: None,
        }
    }
}

impl Settings {
    pub fn ledger_path(&self) -> PathBuf {
        self.output_dir.join(LEDGER_FILE)
    }

    pub fn pointer_path(&self) -> PathBuf {
        self.output_dir.join(POINTER_FILE)
    }
}

/// Compte Mapbox utilisé pour la publication
#[derive(Clone, PartialEq, Eq)]
pub struct PublishConfig {
    pub username: String,
    pub access_token: String,
    /// Préfixe des tilesets créés
    pub tileset_base: String,
    pub api_url: String,
}

impl fmt::Debug for PublishConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishConfig")
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .field("tileset_base", &self.tileset_base)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl PublishConfig {
    /// Charge la configuration depuis les variables d'environnement
    ///
    /// Retourne `None` si `MAPBOX_USERNAME` ou `MAPBOX_ACCESS_TOKEN` manque.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Comme [`from_env`](Self::from_env) avec une source de variables fournie
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Some(Self {
            username: non_empty("MAPBOX_USERNAME")?,
            access_token: non_empty("MAPBOX_ACCESS_TOKEN")?,
            tileset_base: non_empty("MAPBOX_TILESET_NAME")
                .unwrap_or_else(|| DEFAULT_TILESET_BASE.to_string()),
            api_url: non_empty("MAPBOX_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }
}
