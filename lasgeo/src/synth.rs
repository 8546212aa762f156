//! Plafond de points et synthèse des features
//!
//! La décimation est un pas régulier sur l'ordre du moteur (pas d'aléatoire):
//! deux exécutions sur la même entrée donnent exactement la même sortie.

use std::num::NonZeroUsize;

use crate::types::{PointArray, PointFeature, RawPoint};
use crate::{LasgeoError, Result};

/// Décimales des axes horizontaux (degrés)
pub const HORIZONTAL_DECIMALS: i32 = 8;

/// Décimales de l'axe vertical et de la hauteur sol
pub const VERTICAL_DECIMALS: i32 = 2;

/// Résultat de la synthèse d'un tableau de points
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Nombre de points renvoyés par le moteur
    pub input_points: usize,
    pub features: Vec<PointFeature>,
}

impl Synthesis {
    pub fn was_decimated(&self) -> bool {
        self.features.len() < self.input_points
    }
}

/// Indices conservés pour `n` points et un plafond `max`
///
/// `n <= max`: tous les indices. Sinon pas `n / max`, tronqué aux `max`
/// premiers indices.
pub fn select_indices(n: usize, max: NonZeroUsize) -> impl Iterator<Item = usize> {
    let max = max.get();
    let stride = if n <= max { 1 } else { n / max };
    (0..n).step_by(stride).take(max)
}

/// Applique le plafond puis convertit les points conservés en features
pub fn synthesize(arrays: &[PointArray], max_points: NonZeroUsize) -> Result<Synthesis> {
    let points = match arrays.first() {
        Some(points) if !points.is_empty() => points,
        _ => return Err(LasgeoError::EmptyOutput),
    };

    let features = select_indices(points.len(), max_points)
        .map(|i| to_feature(&points[i]))
        .collect();

    Ok(Synthesis {
        input_points: points.len(),
        features,
    })
}

/// Convertit un point brut; l'arrondi se fait ici et nulle part avant
pub fn to_feature(point: &RawPoint) -> PointFeature {
    let elevation = round_to(point.z, VERTICAL_DECIMALS);

    PointFeature {
        lon: round_to(point.x, HORIZONTAL_DECIMALS),
        lat: round_to(point.y, HORIZONTAL_DECIMALS),
        elevation,
        classification: point.classification.unwrap_or(0),
        // Sans modèle de sol, la hauteur vaut l'altitude absolue
        height: point
            .height_above_ground
            .map(|h| round_to(h, VERTICAL_DECIMALS))
            .unwrap_or(elevation),
    }
}

/// Arrondit à `decimals` décimales
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}
