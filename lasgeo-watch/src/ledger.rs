//! Historique des fichiers déjà traités (empreintes blake3)
//!
//! Le fichier est un tableau JSON d'empreintes hexadécimales. Il n'est jamais
//! élagué: une empreinte enregistrée ne sera plus retraitée.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Méthode de calcul de l'empreinte d'un fichier source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FingerprintMode {
    /// Chemin + taille + date de modification (rapide, ne lit pas le fichier)
    #[default]
    Metadata,
    /// Chemin + contenu complet (sûr, coûteux sur les gros nuages)
    Content,
}

/// Calcule l'empreinte d'un fichier source
pub fn fingerprint(path: &Path, mode: FingerprintMode) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(path.to_string_lossy().as_bytes());

    match mode {
        FingerprintMode::Metadata => {
            let metadata = std::fs::metadata(path)
                .with_context(|| format!("Cannot stat {}", path.display()))?;
            let mtime = metadata
                .modified()
                .with_context(|| format!("No modification time for {}", path.display()))?
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();

            hasher.update(metadata.len().to_string().as_bytes());
            hasher.update(format!("{}.{:09}", mtime.as_secs(), mtime.subsec_nanos()).as_bytes());
        }
        FingerprintMode::Content => {
            let mut file =
                File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
            let mut buffer = [0u8; 65536]; // 64KB buffer

            loop {
                let bytes_read = file.read(&mut buffer)?;
                if bytes_read == 0 {
                    break;
                }
                hasher.update(&buffer[..bytes_read]);
            }
        }
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Ensemble persistant des empreintes déjà traitées
#[derive(Debug)]
pub struct ChangeLedger {
    path: PathBuf,
    seen: BTreeSet<String>,
}

impl ChangeLedger {
    /// Ledger vide rattaché à `path` (rien n'est lu)
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: BTreeSet::new(),
        }
    }

    /// Charge le ledger; fichier absent ou corrompu ⇒ ledger vide
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let seen = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(entries) => entries.into_iter().collect(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt ledger, starting empty");
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable ledger, starting empty");
                BTreeSet::new()
            }
        };

        debug!(path = %path.display(), entries = seen.len(), "Ledger loaded");
        Self { path, seen }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Ajoute une empreinte; retourne `false` si elle était déjà présente
    pub fn add(&mut self, fingerprint: impl Into<String>) -> bool {
        self.seen.insert(fingerprint.into())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Réécrit le fichier (fichier temporaire voisin puis renommage)
    pub fn persist(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer(&mut writer, &self.seen)?;
            writer.flush()?;
        }
        temp.persist(&self.path)
            .with_context(|| format!("Cannot write ledger {}", self.path.display()))?;

        Ok(())
    }
}
