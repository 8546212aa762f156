//! Rapport de scan de la boîte de dépôt
//!
//! Un rapport par passage: combien de fichiers vus, ignorés, traités, en
//! échec, et l'issue des publications.

use std::time::Duration;

use crate::publish::PublishOutcome;

/// Statut global d'un scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    /// Aucun nouveau fichier
    Idle,
    /// Tous les nouveaux fichiers ont été traités
    Success,
    /// Certains fichiers ont échoué (retentés au prochain scan)
    PartialSuccess,
    /// Aucun nouveau fichier n'a pu être traité
    Failed,
}

/// Échec d'un fichier pendant le scan
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub file: String,
    pub message: String,
}

/// Rapport d'un passage
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub status: ScanStatus,
    pub duration_secs: f64,

    /// Fichiers reconnus dans la boîte de dépôt
    pub discovered: usize,
    /// Fichiers déjà présents dans l'historique
    pub skipped: usize,
    pub processed: usize,
    pub failed: usize,
    pub published: usize,
    pub publish_failed: usize,
    /// Features écrites sur l'ensemble des documents
    pub features_written: usize,

    pub failures: Vec<FileFailure>,
}

impl Default for ScanReport {
    fn default() -> Self {
        Self {
            status: ScanStatus::Idle,
            duration_secs: 0.0,
            discovered: 0,
            skipped: 0,
            processed: 0,
            failed: 0,
            published: 0,
            publish_failed: 0,
            features_written: 0,
            failures: Vec::new(),
        }
    }
}

impl ScanReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_discovered(&mut self) {
        self.discovered += 1;
    }

    /// Fichier déjà dans l'historique
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Fichier traité; la publication n'influe que sur ses propres compteurs
    pub fn record_success(&mut self, features: usize, publish: &PublishOutcome) {
        self.processed += 1;
        self.features_written += features;
        match publish {
            PublishOutcome::Published(_) => self.published += 1,
            PublishOutcome::Failed(_) => self.publish_failed += 1,
            PublishOutcome::Skipped => {}
        }
    }

    pub fn record_failure(&mut self, file: &str, message: &str) {
        self.failed += 1;
        self.failures.push(FileFailure {
            file: file.to_string(),
            message: message.to_string(),
        });
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        self.status = match (self.processed, self.failed) {
            (0, 0) => ScanStatus::Idle,
            (_, 0) => ScanStatus::Success,
            (0, _) => ScanStatus::Failed,
            _ => ScanStatus::PartialSuccess,
        };
    }

    /// Vrai si le scan a tenté au moins un fichier
    pub fn had_work(&self) -> bool {
        self.processed + self.failed > 0
    }

    /// Affichage compact pour les logs
    pub fn summary(&self) -> String {
        format!(
            "{} processed, {} failed, {} unchanged, {} published ({} publish errors)",
            self.processed, self.failed, self.skipped, self.published, self.publish_failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{PublishError, TilesetUploadRecord};

    #[test]
    fn test_scan_report_default() {
        let mut report = ScanReport::new();
        report.finalize();
        assert_eq!(report.status, ScanStatus::Idle);
        assert!(!report.had_work());
    }

    #[test]
    fn test_record_success_counts_publish() {
        let mut report = ScanReport::new();
        report.record_success(10, &PublishOutcome::Skipped);
        report.record_success(
            5,
            &PublishOutcome::Published(TilesetUploadRecord {
                tileset_id: "u.b-a".to_string(),
                upload_id: "id".to_string(),
                name: "a".to_string(),
                uploaded_at: "2024-01-01T00:00:00Z".to_string(),
            }),
        );
        report.record_success(
            1,
            &PublishOutcome::Failed(PublishError::Credentials { status: 401 }),
        );

        assert_eq!(report.processed, 3);
        assert_eq!(report.features_written, 16);
        assert_eq!(report.published, 1);
        assert_eq!(report.publish_failed, 1);
        report.finalize();
        assert_eq!(report.status, ScanStatus::Success);
    }

    #[test]
    fn test_finalize_partial_and_failed() {
        let mut report = ScanReport::new();
        report.record_failure("a.las", "No point data in pipeline output");
        report.finalize();
        assert_eq!(report.status, ScanStatus::Failed);

        report.record_success(1, &PublishOutcome::Skipped);
        report.finalize();
        assert_eq!(report.status, ScanStatus::PartialSuccess);
        assert_eq!(report.failures[0].file, "a.las");
    }

    #[test]
    fn test_summary() {
        let mut report = ScanReport::new();
        report.record_skipped();
        report.record_success(3, &PublishOutcome::Skipped);
        let summary = report.summary();
        assert!(summary.contains("1 processed"));
        assert!(summary.contains("1 unchanged"));
    }
}
