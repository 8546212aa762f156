//! Écriture du document GeoJSON (streaming, remplacement atomique)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use geo::{BoundingRect, MultiPoint, Point};
use geojson::{Bbox, JsonObject};
use serde_json::json;
use tempfile::NamedTempFile;

use crate::types::{DocumentProperties, PointFeature, OUTPUT_SUFFIX};
use crate::Result;

/// Document de sortie: propriétés de l'exécution + features
#[derive(Debug, Clone)]
pub struct GeometryDocument {
    pub properties: DocumentProperties,
    pub features: Vec<PointFeature>,
}

/// Ce qui a été écrit sur disque
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStats {
    pub path: PathBuf,
    pub bytes: u64,
    pub features: usize,
}

impl DocumentStats {
    pub fn size_mb(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

impl GeometryDocument {
    pub fn new(properties: DocumentProperties, features: Vec<PointFeature>) -> Self {
        Self {
            properties,
            features,
        }
    }

    /// Emprise 2D `[min_lon, min_lat, max_lon, max_lat]`
    pub fn bbox(&self) -> Option<Bbox> {
        let points: MultiPoint = self
            .features
            .iter()
            .map(|f| Point::new(f.lon, f.lat))
            .collect::<Vec<_>>()
            .into();
        let rect = points.bounding_rect()?;
        Some(vec![rect.min().x, rect.min().y, rect.max().x, rect.max().y])
    }

    /// Sérialise le FeatureCollection feature par feature
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        write!(writer, r#"{{"type":"FeatureCollection","properties":"#)?;
        serde_json::to_writer(&mut writer, &self.properties)?;

        if let Some(bbox) = self.bbox() {
            write!(writer, r#","bbox":"#)?;
            serde_json::to_writer(&mut writer, &bbox)?;
        }

        write!(writer, r#","features":["#)?;
        for (i, feature) in self.features.iter().enumerate() {
            if i > 0 {
                write!(writer, ",")?;
            }
            serde_json::to_writer(&mut writer, &to_geojson_feature(feature))?;
        }
        write!(writer, "]}}")?;

        Ok(())
    }
}

/// Feature GeoJSON `Point` 3D avec classification, hauteur et altitude
pub fn to_geojson_feature(feature: &PointFeature) -> geojson::Feature {
    let mut properties = JsonObject::new();
    properties.insert("classification".to_string(), json!(feature.classification));
    properties.insert("height".to_string(), json!(feature.height));
    properties.insert("z".to_string(), json!(feature.elevation));

    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
            feature.lon,
            feature.lat,
            feature.elevation,
        ]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Nom de base du fichier source (sans extension)
pub fn source_stem(input_path: &Path) -> String {
    input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Chemin du document produit pour un fichier source
pub fn output_path_for(input_path: &Path, output_dir: &Path) -> PathBuf {
    output_dir.join(format!("{}{}", source_stem(input_path), OUTPUT_SUFFIX))
}

/// Écrit le document dans un fichier temporaire voisin puis le renomme
///
/// Un document existant au même chemin est remplacé sans condition.
pub fn write_document(document: &GeometryDocument, path: &Path) -> Result<DocumentStats> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        document.write_to(&mut writer)?;
        writer.flush()?;
    }
    temp.persist(path).map_err(|e| e.error)?;

    let bytes = File::open(path)?.metadata()?.len();

    Ok(DocumentStats {
        path: path.to_path_buf(),
        bytes,
        features: document.features.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn properties(point_count: usize) -> DocumentProperties {
        DocumentProperties {
            name: "hole1".to_string(),
            source_crs: "EPSG:2249".to_string(),
            target_crs: "EPSG:4326".to_string(),
            point_count,
            processed_at: "2024-05-01T12:00:00Z".to_string(),
            voxel_size: 2.0,
        }
    }

    fn sample_features() -> Vec<PointFeature> {
        vec![
            PointFeature {
                lon: -71.1,
                lat: 42.3,
                elevation: 10.5,
                classification: 2,
                height: 0.25,
            },
            PointFeature {
                lon: -71.2,
                lat: 42.4,
                elevation: 12.0,
                classification: 0,
                height: 12.0,
            },
        ]
    }

    #[test]
    fn test_write_to_structure() {
        let document = GeometryDocument::new(properties(2), sample_features());
        let mut buffer = Vec::new();
        document.write_to(&mut buffer).unwrap();

        let json: Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["properties"]["name"], "hole1");
        assert_eq!(json["properties"]["target_crs"], "EPSG:4326");
        assert_eq!(json["properties"]["point_count"], 2);
        assert_eq!(json["properties"]["voxel_size"], 2.0);
        assert_eq!(json["bbox"], serde_json::json!([-71.2, 42.3, -71.1, 42.4]));

        let features = json["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["type"], "Feature");
        assert_eq!(features[0]["geometry"]["type"], "Point");
        assert_eq!(
            features[0]["geometry"]["coordinates"],
            serde_json::json!([-71.1, 42.3, 10.5])
        );
        assert_eq!(features[0]["properties"]["classification"], 2);
        assert_eq!(features[0]["properties"]["height"], 0.25);
        assert_eq!(features[0]["properties"]["z"], 10.5);
    }

    #[test]
    fn test_empty_document_has_no_bbox() {
        let document = GeometryDocument::new(properties(0), Vec::new());
        assert!(document.bbox().is_none());

        let mut buffer = Vec::new();
        document.write_to(&mut buffer).unwrap();
        let json: Value = serde_json::from_slice(&buffer).unwrap();
        assert!(json.get("bbox").is_none());
        assert_eq!(json["features"], serde_json::json!([]));
    }

    #[test]
    fn test_output_path_for() {
        assert_eq!(
            output_path_for(Path::new("raw_data/Hole1.LAZ"), Path::new("out")),
            PathBuf::from("out/Hole1_processed.geojson")
        );
        assert_eq!(source_stem(Path::new("/a/b/site.survey.las")), "site.survey");
    }

    #[test]
    fn test_write_document_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hole1_processed.geojson");
        std::fs::write(&path, "stale content").unwrap();

        let document = GeometryDocument::new(properties(2), sample_features());
        let stats = write_document(&document, &path).unwrap();

        assert_eq!(stats.features, 2);
        assert_eq!(stats.bytes, std::fs::metadata(&path).unwrap().len());
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(r#"{"type":"FeatureCollection""#));
        assert!(!content.contains("stale"));

        // Pas de fichier temporaire résiduel
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
