//! # lasgeo-watch
//!
//! Surveillance d'une boîte de dépôt de relevés LiDAR: conversion GeoJSON
//! automatique puis publication optionnelle vers Mapbox.
//!
//! ## Features
//!
//! - Détection des nouveaux `.las` / `.laz` par scrutation périodique
//! - Historique persistant des empreintes (pas de double traitement)
//! - Publication en trois phases vers l'API Mapbox Uploads
//! - CLI simple
//!
//! ## Usage CLI
//!
//! ```bash
//! # Surveiller ./raw_data (défaut)
//! lasgeo-watch
//!
//! # Traiter un seul fichier
//! lasgeo-watch --process raw_data/hole1.laz
//!
//! # Grille plus fine, plafond plus bas
//! lasgeo-watch --voxel 1.5 --max-points 200000
//! ```

pub mod cli;
pub mod config;
pub mod ledger;
pub mod processor;
pub mod publish;
pub mod report;
pub mod watch;

pub use config::{PublishConfig, Settings};
pub use ledger::{fingerprint, ChangeLedger, FingerprintMode};
pub use processor::{FileProcessor, ProcessError, ProcessedFile};
pub use publish::{PublishOutcome, Publisher, TilesetUploadRecord};
pub use report::{ScanReport, ScanStatus};
pub use watch::{scan_inbox, Watcher};
