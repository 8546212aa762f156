//! Surveillance de la boîte de dépôt
//!
//! Boucle à deux états: attente (sommeil fixe) puis scan. Les fichiers sont
//! traités un par un, jamais en parallèle. Une empreinte n'est enregistrée
//! qu'après un traitement réussi, donc un échec est retenté au scan suivant.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use tracing::{debug, error, info, warn};

use crate::ledger::{fingerprint, ChangeLedger};
use crate::processor::FileProcessor;
use crate::report::ScanReport;

/// Extensions reconnues (comparées sans tenir compte de la casse)
pub const RECOGNIZED_EXTENSIONS: [&str; 2] = ["laz", "las"];

/// Liste les fichiers LAS/LAZ de la boîte de dépôt, triés par chemin
pub fn scan_inbox(inbox: &Path) -> Result<Vec<PathBuf>> {
    let base = Pattern::escape(&inbox.to_string_lossy());
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut files = Vec::new();
    for ext in RECOGNIZED_EXTENSIONS {
        let pattern = format!("{}/*.{}", base, ext);
        let entries = glob::glob_with(&pattern, options)
            .with_context(|| format!("Invalid inbox pattern: {}", pattern))?;

        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Unreadable inbox entry"),
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Boucle de surveillance
pub struct Watcher {
    processor: FileProcessor,
    ledger: ChangeLedger,
}

impl Watcher {
    pub fn new(processor: FileProcessor, ledger: ChangeLedger) -> Self {
        Self { processor, ledger }
    }

    pub fn ledger(&self) -> &ChangeLedger {
        &self.ledger
    }

    /// Un passage complet sur la boîte de dépôt
    ///
    /// Un moteur devenu inutilisable interrompt le passage, pas la boucle.
    pub async fn scan_once(&mut self) -> Result<ScanReport> {
        let started_at = Instant::now();
        let settings = self.processor.settings();
        let mut report = ScanReport::new();

        let candidates = match scan_inbox(&settings.inbox) {
            Ok(files) => files,
            Err(e) => {
                warn!(inbox = %settings.inbox.display(), error = %e, "Inbox scan failed");
                return Ok(report);
            }
        };
        let mode = settings.fingerprint;

        for path in candidates {
            report.record_discovered();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let file_hash = match fingerprint(&path, mode) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(file = name.as_str(), error = %e, "Cannot fingerprint file, skipping");
                    continue;
                }
            };

            if self.ledger.contains(&file_hash) {
                debug!(file = name.as_str(), "Already processed");
                report.record_skipped();
                continue;
            }

            info!(file = name.as_str(), "🔍 New file detected");

            match self.processor.process(&path).await {
                Ok(processed) => {
                    report.record_success(processed.features, &processed.publish);
                    self.ledger.add(file_hash);
                    if let Err(e) = self.ledger.persist() {
                        error!(
                            path = %self.ledger.path().display(),
                            error = %e,
                            "Failed to save processing history"
                        );
                    }
                }
                Err(e) if e.is_fatal() => {
                    // Inutile d'essayer les fichiers suivants; le prochain scan réessaie
                    error!(
                        file = name.as_str(),
                        error = %e,
                        "Engine unavailable, pausing until next scan"
                    );
                    report.record_failure(&name, &e.to_string());
                    break;
                }
                Err(e) => {
                    warn!(file = name.as_str(), "Will retry on next scan");
                    report.record_failure(&name, &e.to_string());
                }
            }
        }

        report.set_duration(started_at.elapsed());
        report.finalize();
        if report.had_work() {
            info!(status = ?report.status, "Scan complete: {}", report.summary());
        }

        Ok(report)
    }

    /// Surveille jusqu'à Ctrl-C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Surveille jusqu'à ce que `shutdown` se termine
    ///
    /// L'arrêt peut survenir pendant l'attente comme pendant un traitement;
    /// l'historique est déjà à jour du dernier fichier réussi.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let settings = self.processor.settings();
        std::fs::create_dir_all(&settings.inbox)
            .with_context(|| format!("Cannot create inbox {}", settings.inbox.display()))?;

        info!("LiDAR pipeline watch mode");
        info!(inbox = %settings.inbox.display(), "Watching");
        info!(output = %settings.output_dir.display(), "Output");
        info!(known = self.ledger.len(), "Drop .laz or .las files to auto-process");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("⏹ Watch mode stopped");
                    return Ok(());
                }
                result = self.cycle() => result?,
            }
        }
    }

    async fn cycle(&mut self) -> Result<()> {
        self.scan_once().await?;
        tokio::time::sleep(self.processor.settings().poll_interval).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_inbox_matches_extensions_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.laz", "A.LAS", "c.LaZ", "notes.txt", "d.las.bak", "e.lasx"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("folder.las")).unwrap();

        let files = scan_inbox(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["A.LAS", "b.laz", "c.LaZ"]);
    }

    #[test]
    fn test_scan_inbox_includes_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".hole1.laz"), b"x").unwrap();
        std::fs::write(dir.path().join(".processed_history.json"), b"[]").unwrap();

        let files = scan_inbox(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join(".hole1.laz")]);
    }

    #[test]
    fn test_scan_inbox_escapes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("drop [survey]");
        std::fs::create_dir(&inbox).unwrap();
        std::fs::write(inbox.join("hole1.laz"), b"x").unwrap();

        let files = scan_inbox(&inbox).unwrap();
        assert_eq!(files, vec![inbox.join("hole1.laz")]);
    }

    #[test]
    fn test_scan_inbox_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let files = scan_inbox(&dir.path().join("missing")).unwrap();
        assert!(files.is_empty());
    }
}
