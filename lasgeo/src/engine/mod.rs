//! Port vers le moteur de traitement de nuages de points
//!
//! Le décodage LAS/LAZ, la reprojection et l'éclaircissement sont délégués
//! au moteur. Le reste du crate ne voit que ce trait.

pub mod pdal;

use async_trait::async_trait;
use serde_json::Value;

use crate::pipeline::TransformRequest;
use crate::types::PointArray;
use crate::Result;

pub use pdal::PdalCli;

/// Moteur capable d'exécuter une liste déclarative d'étapes
#[async_trait]
pub trait PointEngine: Send + Sync {
    /// Vérifie que le moteur est utilisable et retourne sa version
    async fn probe(&self) -> Result<String>;

    /// Exécute la requête sans extraire de points et retourne les métadonnées
    async fn metadata(&self, request: &TransformRequest) -> Result<Value>;

    /// Exécute la requête et retourne les tableaux de points produits
    async fn execute(&self, request: &TransformRequest) -> Result<Vec<PointArray>>;
}
