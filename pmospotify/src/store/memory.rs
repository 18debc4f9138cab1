//! Stockage en mémoire, même contrat que [`super::FsInstanceStore`]

use super::{DATA_DIR, InstanceStore, is_relative_artifact_path};
use crate::error::{Result, SpotifyError};
use crate::models::{InstanceId, InstanceRecord, SessionState, TokenSet};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct MemoryInstance {
    record: InstanceRecord,
    artifacts: BTreeMap<String, Vec<u8>>,
}

/// Stockage volatile, ordonné par ordre de création
///
/// Destiné aux tests et aux déploiements éphémères.
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    instances: Mutex<IndexMap<InstanceId, MemoryInstance>>,
}

impl MemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, IndexMap<InstanceId, MemoryInstance>>> {
        self.instances
            .lock()
            .map_err(|_| SpotifyError::StorageUnavailable("memory store poisoned".into()))
    }

    /// Nombre d'instances présentes
    pub fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn create(&self, id: &InstanceId, verifier: &str) -> Result<InstanceRecord> {
        let mut instances = self.lock()?;
        if instances.contains_key(id) {
            return Err(SpotifyError::DuplicateInstance(id.to_string()));
        }
        let record = InstanceRecord::pending(id.clone(), verifier);
        instances.insert(
            id.clone(),
            MemoryInstance {
                record: record.clone(),
                artifacts: BTreeMap::new(),
            },
        );
        Ok(record)
    }

    async fn load(&self, id: &InstanceId) -> Result<InstanceRecord> {
        self.lock()?
            .get(id)
            .map(|instance| instance.record.clone())
            .ok_or_else(|| SpotifyError::InstanceNotFound(id.to_string()))
    }

    async fn set_tokens(&self, id: &InstanceId, tokens: TokenSet) -> Result<InstanceRecord> {
        let mut instances = self.lock()?;
        let instance = instances
            .get_mut(id)
            .ok_or_else(|| SpotifyError::InstanceNotFound(id.to_string()))?;
        instance.record.tokens = tokens;
        instance.record.state = SessionState::Authorized;
        Ok(instance.record.clone())
    }

    async fn delete(&self, id: &InstanceId) -> Result<()> {
        self.lock()?.shift_remove(id);
        Ok(())
    }

    async fn list_live_ids(&self) -> Result<Vec<InstanceId>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn write_artifact(&self, id: &InstanceId, path: &str, bytes: &[u8]) -> Result<()> {
        if !is_relative_artifact_path(path) {
            return Err(SpotifyError::StorageUnavailable(format!(
                "invalid artifact path: {}",
                path
            )));
        }
        let mut instances = self.lock()?;
        let instance = instances
            .get_mut(id)
            .ok_or_else(|| SpotifyError::InstanceNotFound(id.to_string()))?;
        instance.artifacts.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read_artifact(&self, id: &InstanceId, path: &str) -> Result<Vec<u8>> {
        let instances = self.lock()?;
        let instance = instances
            .get(id)
            .ok_or_else(|| SpotifyError::InstanceNotFound(id.to_string()))?;
        instance
            .artifacts
            .get(path)
            .cloned()
            .ok_or_else(|| SpotifyError::NotFound(format!("{}/{}", id, path)))
    }

    async fn list_artifact_dirs(&self, id: &InstanceId) -> Result<Vec<String>> {
        let instances = self.lock()?;
        let instance = instances
            .get(id)
            .ok_or_else(|| SpotifyError::InstanceNotFound(id.to_string()))?;

        // L'enregistrement vit toujours dans `data/`
        let mut dirs: Vec<String> = vec![DATA_DIR.to_string()];
        for path in instance.artifacts.keys() {
            if let Some((dir, _)) = path.split_once('/') {
                if !dirs.iter().any(|d| d == dir) {
                    dirs.push(dir.to_string());
                }
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}
