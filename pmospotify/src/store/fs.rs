//! Stockage des instances sur le système de fichiers

use super::{DATA_DIR, InstanceStore, RECORD_FILE, is_relative_artifact_path};
use crate::error::{Result, SpotifyError};
use crate::models::{InstanceId, InstanceRecord, SessionState, TokenSet};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info, warn};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stockage hiérarchique : un répertoire par instance sous `root`
///
/// Les écritures passent par un fichier temporaire renommé ensuite, de sorte
/// qu'un lecteur ne voit jamais un enregistrement à moitié écrit et qu'une
/// écriture concurrente à une éviction échoue proprement.
#[derive(Debug, Clone)]
pub struct FsInstanceStore {
    root: PathBuf,
}

impl FsInstanceStore {
    /// Ouvre (et crée si besoin) le répertoire racine des instances
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| SpotifyError::storage(format!("cannot create {}", root.display()), e))?;
        info!(root = %root.display(), "Instance store ready");
        Ok(Self { root })
    }

    /// Répertoire racine des instances
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn instance_dir(&self, id: &InstanceId) -> Result<PathBuf> {
        if !id.is_path_safe() {
            return Err(SpotifyError::InstanceNotFound(id.to_string()));
        }
        Ok(self.root.join(id.as_str()))
    }

    /// Écrit `bytes` dans un fichier temporaire voisin puis le renomme sur `target`
    async fn write_atomic(&self, id: &InstanceId, target: &Path, bytes: &[u8]) -> Result<()> {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = target.with_file_name(format!(
            ".{}.tmp-{}-{}",
            file_name,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = fs::write(&tmp, bytes).await {
            return Err(map_write_error(id, target, e));
        }
        if let Err(e) = fs::rename(&tmp, target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(map_write_error(id, target, e));
        }
        Ok(())
    }

    async fn write_record(&self, record: &InstanceRecord) -> Result<()> {
        let path = self.instance_dir(&record.id)?.join(RECORD_FILE);
        let bytes = serde_json::to_vec_pretty(record)?;
        self.write_atomic(&record.id, &path, &bytes).await
    }
}

fn map_write_error(id: &InstanceId, target: &Path, err: std::io::Error) -> SpotifyError {
    if err.kind() == ErrorKind::NotFound {
        // Le répertoire de l'instance a disparu : éviction concurrente
        SpotifyError::InstanceNotFound(id.to_string())
    } else {
        SpotifyError::storage(format!("cannot write {}", target.display()), err)
    }
}

#[async_trait]
impl InstanceStore for FsInstanceStore {
    async fn create(&self, id: &InstanceId, verifier: &str) -> Result<InstanceRecord> {
        let dir = self.instance_dir(id)?;

        match fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SpotifyError::DuplicateInstance(id.to_string()));
            }
            Err(e) => {
                return Err(SpotifyError::storage(
                    format!("cannot create {}", dir.display()),
                    e,
                ));
            }
        }

        let record = InstanceRecord::pending(id.clone(), verifier);
        let written = match fs::create_dir(dir.join(DATA_DIR)).await {
            Ok(()) => self.write_record(&record).await,
            Err(e) => Err(SpotifyError::storage("cannot create data directory", e)),
        };

        if let Err(e) = written {
            // Pas d'instance à moitié créée
            let _ = fs::remove_dir_all(&dir).await;
            return Err(e);
        }

        debug!(instance = %id, "Instance record created");
        Ok(record)
    }

    async fn load(&self, id: &InstanceId) -> Result<InstanceRecord> {
        let path = self.instance_dir(id)?.join(RECORD_FILE);

        let bytes = fs::read(&path).await.map_err(|e| {
            debug!(instance = %id, "Cannot read instance record: {}", e);
            SpotifyError::InstanceNotFound(id.to_string())
        })?;

        let record: InstanceRecord = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(instance = %id, "Corrupt instance record: {}", e);
            SpotifyError::InstanceNotFound(id.to_string())
        })?;

        if record.id != *id {
            warn!(instance = %id, stored = %record.id, "Instance record id mismatch");
            return Err(SpotifyError::InstanceNotFound(id.to_string()));
        }

        Ok(record)
    }

    async fn set_tokens(&self, id: &InstanceId, tokens: TokenSet) -> Result<InstanceRecord> {
        let mut record = self.load(id).await?;
        record.tokens = tokens;
        record.state = SessionState::Authorized;
        self.write_record(&record).await?;
        debug!(instance = %id, "Instance tokens stored");
        Ok(record)
    }

    async fn delete(&self, id: &InstanceId) -> Result<()> {
        let Ok(dir) = self.instance_dir(id) else {
            return Ok(());
        };

        // Le répertoire est d'abord retiré de l'arbre vivant : une écriture
        // concurrente échoue alors en `InstanceNotFound` au lieu de bloquer
        // la suppression.
        let trash = self.root.join(format!(
            ".evicted-{}-{}",
            id,
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        match fs::rename(&dir, &trash).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(SpotifyError::storage(
                    format!("cannot delete {}", dir.display()),
                    e,
                ));
            }
        }
        debug!(instance = %id, "Instance deleted");

        if let Err(e) = fs::remove_dir_all(&trash).await {
            warn!(instance = %id, "Cannot purge {}: {}", trash.display(), e);
        }
        Ok(())
    }

    async fn list_live_ids(&self) -> Result<Vec<InstanceId>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            SpotifyError::storage(format!("cannot list {}", self.root.display()), e)
        })?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SpotifyError::storage("cannot list instances", e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SpotifyError::storage("cannot stat instance entry", e))?;
            if !file_type.is_dir() {
                continue;
            }

            let name = entry.file_name().into_string().map_err(|name| {
                SpotifyError::MalformedInstanceId(name.to_string_lossy().to_string())
            })?;
            if name.starts_with('.') {
                continue;
            }
            ids.push(InstanceId::from_raw(name));
        }

        Ok(ids)
    }

    async fn write_artifact(&self, id: &InstanceId, path: &str, bytes: &[u8]) -> Result<()> {
        if !is_relative_artifact_path(path) {
            return Err(SpotifyError::StorageUnavailable(format!(
                "invalid artifact path: {}",
                path
            )));
        }

        let dir = self.instance_dir(id)?;
        if let Err(e) = fs::metadata(&dir).await {
            return Err(map_write_error(id, &dir, e));
        }

        // Création segment par segment : un répertoire d'instance supprimé
        // fait échouer la création au lieu de le recréer.
        let segments: Vec<&str> = path.split('/').collect();
        let mut current = dir.clone();
        for segment in &segments[..segments.len() - 1] {
            current.push(segment);
            match fs::create_dir(&current).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(map_write_error(id, &current, e)),
            }
        }

        self.write_atomic(id, &dir.join(path), bytes).await
    }

    async fn read_artifact(&self, id: &InstanceId, path: &str) -> Result<Vec<u8>> {
        if !is_relative_artifact_path(path) {
            return Err(SpotifyError::NotFound(path.to_string()));
        }
        let target = self.instance_dir(id)?.join(path);
        match fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(SpotifyError::NotFound(format!("{}/{}", id, path)))
            }
            Err(e) => Err(SpotifyError::storage(
                format!("cannot read {}", target.display()),
                e,
            )),
        }
    }

    async fn list_artifact_dirs(&self, id: &InstanceId) -> Result<Vec<String>> {
        let dir = self.instance_dir(id)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SpotifyError::InstanceNotFound(id.to_string()));
            }
            Err(e) => {
                return Err(SpotifyError::storage(
                    format!("cannot list {}", dir.display()),
                    e,
                ));
            }
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SpotifyError::storage("cannot list artifacts", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let name = entry.file_name().to_string_lossy().to_string();
            if is_dir && !name.starts_with('.') {
                dirs.push(name);
            }
        }

        dirs.sort();
        Ok(dirs)
    }
}
