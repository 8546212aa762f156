//! Types de données pour le crate lasgeo

use std::num::NonZeroUsize;

use serde::Serialize;

use crate::LasgeoError;

/// CRS cible de tous les documents (WGS84)
pub const TARGET_CRS: &str = "EPSG:4326";

/// CRS supposé quand le fichier ne déclare rien (MA State Plane, pieds US)
pub const FALLBACK_CRS: &str = "EPSG:2249";

/// Taille de cellule par défaut pour l'éclaircissement (mètres)
pub const DEFAULT_VOXEL_SIZE: f64 = 2.0;

/// Plafond par défaut de features dans un document
pub const DEFAULT_MAX_POINTS: usize = 500_000;

/// Suffixe des documents produits
pub const OUTPUT_SUFFIX: &str = "_processed.geojson";

/// Un point brut tel que renvoyé par le moteur
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,

    /// Classe ASPRS, absente si la dimension n'existe pas en sortie
    pub classification: Option<i64>,

    /// Hauteur sol, présente seulement si `filters.hag_nn` a tourné
    pub height_above_ground: Option<f64>,
}

impl RawPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            classification: None,
            height_above_ground: None,
        }
    }
}

/// Un tableau de points (une "view" PDAL)
pub type PointArray = Vec<RawPoint>;

/// Une feature de sortie, coordonnées déjà arrondies
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    /// Longitude (8 décimales)
    pub lon: f64,
    /// Latitude (8 décimales)
    pub lat: f64,
    /// Altitude (2 décimales)
    pub elevation: f64,
    pub classification: i64,
    /// Hauteur sol (2 décimales), égale à l'altitude sans modèle de sol
    pub height: f64,
}

/// Étapes optionnelles ajoutées après l'éclaircissement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineExtensions {
    /// Plage de classes conservées, bornes incluses (ex: 2..=6)
    pub classification_range: Option<(u8, u8)>,

    /// Calcul de la hauteur sol (`filters.hag_nn`)
    pub height_above_ground: bool,

    /// Décimation supplémentaire côté moteur (garde 1 point sur `step`)
    pub decimation_step: Option<u32>,
}

impl PipelineExtensions {
    pub fn is_empty(&self) -> bool {
        self.classification_range.is_none()
            && !self.height_above_ground
            && self.decimation_step.is_none()
    }
}

/// Paramètres de traitement, construits une fois au démarrage
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingOptions {
    /// Taille de cellule de la grille voxel, dans l'unité linéaire des données
    pub voxel_size: f64,

    /// Nombre maximal de features par document
    pub max_points: NonZeroUsize,

    pub extensions: PipelineExtensions,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            voxel_size: DEFAULT_VOXEL_SIZE,
            max_points: NonZeroUsize::new(DEFAULT_MAX_POINTS).unwrap_or(NonZeroUsize::MIN),
            extensions: PipelineExtensions::default(),
        }
    }
}

impl ProcessingOptions {
    /// Valide et construit les options
    pub fn new(
        voxel_size: f64,
        max_points: NonZeroUsize,
        extensions: PipelineExtensions,
    ) -> Result<Self, LasgeoError> {
        if !voxel_size.is_finite() || voxel_size <= 0.0 {
            return Err(LasgeoError::InvalidOptions(format!(
                "voxel size must be a positive number, got {}",
                voxel_size
            )));
        }
        if let Some((low, high)) = extensions.classification_range {
            if low > high {
                return Err(LasgeoError::InvalidOptions(format!(
                    "classification range {}:{} is reversed",
                    low, high
                )));
            }
        }
        if extensions.decimation_step == Some(0) {
            return Err(LasgeoError::InvalidOptions(
                "decimation step must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            voxel_size,
            max_points,
            extensions,
        })
    }
}

/// Bloc `properties` du FeatureCollection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentProperties {
    /// Nom de base du fichier source
    pub name: String,
    pub source_crs: String,
    pub target_crs: String,
    pub point_count: usize,
    /// Horodatage ISO-8601
    pub processed_at: String,
    pub voxel_size: f64,
}
