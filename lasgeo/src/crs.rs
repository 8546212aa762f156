//! Détection du CRS source d'un fichier LAS/LAZ
//!
//! La détection ne renvoie jamais d'erreur: toute absence ou panne du moteur
//! retombe sur [`FALLBACK_CRS`].

use std::fmt;
use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::engine::PointEngine;
use crate::pipeline::build_metadata_request;
use crate::types::FALLBACK_CRS;

/// Longueur minimale d'une référence spatiale exploitable
const MIN_SRS_LEN: usize = 11;

/// Provenance du CRS retenu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsOrigin {
    /// Lu dans les métadonnées du fichier
    Detected,
    /// Valeur par défaut faute de métadonnées
    Fallback,
}

/// CRS source retenu pour un fichier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCrs {
    /// Code EPSG ou WKT complet
    pub crs: String,
    pub origin: CrsOrigin,
}

impl ResolvedCrs {
    pub fn detected(crs: impl Into<String>) -> Self {
        Self {
            crs: crs.into(),
            origin: CrsOrigin::Detected,
        }
    }

    pub fn fallback() -> Self {
        Self {
            crs: FALLBACK_CRS.to_string(),
            origin: CrsOrigin::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == CrsOrigin::Fallback
    }
}

impl fmt::Display for ResolvedCrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Les WKT font plusieurs centaines de caractères
        match self.crs.char_indices().nth(60) {
            Some((cut, _)) => write!(f, "{}…", &self.crs[..cut]),
            None => f.write_str(&self.crs),
        }
    }
}

/// Détermine le CRS source d'un fichier via le moteur
pub async fn resolve_source_crs(engine: &dyn PointEngine, input_path: &Path) -> ResolvedCrs {
    let request = build_metadata_request(input_path);

    match engine.metadata(&request).await {
        Ok(metadata) => match srs_from_metadata(&metadata) {
            Some(srs) => {
                info!(file = %input_path.display(), "Detected CRS from file metadata");
                ResolvedCrs::detected(srs)
            }
            None => {
                warn!(
                    file = %input_path.display(),
                    fallback = FALLBACK_CRS,
                    "No CRS in metadata, using fallback"
                );
                ResolvedCrs::fallback()
            }
        },
        Err(e) => {
            warn!(
                file = %input_path.display(),
                fallback = FALLBACK_CRS,
                error = %e,
                "CRS detection failed, using fallback"
            );
            ResolvedCrs::fallback()
        }
    }
}

/// Extrait la référence spatiale des métadonnées du lecteur LAS
///
/// Accepte `{"metadata": {"readers.las": ...}}` comme `{"stages": {...}}`.
/// `comp_spatialreference` est préféré à `spatialreference`.
pub fn srs_from_metadata(metadata: &Value) -> Option<String> {
    let root = metadata
        .get("metadata")
        .or_else(|| metadata.get("stages"))
        .unwrap_or(metadata);

    let reader = match root.get("readers.las")? {
        Value::Array(items) => items.first()?,
        other => other,
    };

    ["comp_spatialreference", "spatialreference"]
        .iter()
        .filter_map(|key| reader.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|srs| !srs.is_empty())
        .filter(|srs| srs.chars().count() >= MIN_SRS_LEN)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WKT: &str = r#"PROJCS["NAD83 / Massachusetts Mainland (ftUS)",GEOGCS["NAD83"]]"#;

    #[test]
    fn test_prefers_compound_srs() {
        let metadata = json!({
            "metadata": {
                "readers.las": {
                    "comp_spatialreference": "COMPD_CS[\"NAD83 + NAVD88\"]",
                    "spatialreference": WKT
                }
            }
        });
        assert_eq!(
            srs_from_metadata(&metadata).as_deref(),
            Some("COMPD_CS[\"NAD83 + NAVD88\"]")
        );
    }

    #[test]
    fn test_plain_srs_when_compound_empty() {
        let metadata = json!({
            "metadata": {
                "readers.las": [{ "comp_spatialreference": "", "spatialreference": WKT }]
            }
        });
        assert_eq!(srs_from_metadata(&metadata).as_deref(), Some(WKT));
    }

    #[test]
    fn test_cli_stages_layout() {
        let metadata = json!({
            "stages": { "readers.las": { "spatialreference": WKT }, "filters.info": {} }
        });
        assert_eq!(srs_from_metadata(&metadata).as_deref(), Some(WKT));
    }

    #[test]
    fn test_short_or_missing_srs_is_absent() {
        let short = json!({ "metadata": { "readers.las": { "spatialreference": "EPSG:2249" } } });
        assert_eq!(srs_from_metadata(&short), None);

        let ten = json!({ "metadata": { "readers.las": { "spatialreference": "0123456789" } } });
        assert_eq!(srs_from_metadata(&ten), None);

        let eleven = json!({ "metadata": { "readers.las": { "spatialreference": "01234567890" } } });
        assert_eq!(srs_from_metadata(&eleven).as_deref(), Some("01234567890"));

        assert_eq!(srs_from_metadata(&json!({ "metadata": {} })), None);
        assert_eq!(
            srs_from_metadata(&json!({ "metadata": { "readers.las": [] } })),
            None
        );
    }

    #[test]
    fn test_display_truncates_wkt() {
        let crs = ResolvedCrs::detected("X".repeat(200));
        assert_eq!(crs.to_string().chars().count(), 61);
        assert_eq!(ResolvedCrs::fallback().to_string(), "EPSG:2249");
    }
}
