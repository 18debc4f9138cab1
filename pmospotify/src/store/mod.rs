//! Stockage durable des instances
//!
//! Chaque instance occupe un sous-arbre `{root}/{instance_id}/` :
//!
//! ```text
//! {instance_id}/
//! ├── data/
//! │   ├── instance_data.json   # enregistrement (verifier, tokens, état)
//! │   ├── playlist_data.json   # playlists retenues
//! │   └── error.json           # diagnostic brut en cas d'échec
//! └── playlist{n}/
//!     ├── data.json
//!     ├── playlist_image.png
//!     └── ...                  # sorties du rendu
//! ```
//!
//! Le trait [`InstanceStore`] rend ce stockage injectable : [`FsInstanceStore`]
//! en production, [`MemoryInstanceStore`] pour les tests. Aucune
//! implémentation ne garde de cache : chaque lecture relit le stockage.

mod fs;
mod memory;

pub use fs::FsInstanceStore;
pub use memory::MemoryInstanceStore;

use crate::error::Result;
use crate::models::{InstanceId, InstanceRecord, TokenSet};
use async_trait::async_trait;

/// Répertoire réservé aux données internes d'une instance
pub const DATA_DIR: &str = "data";
/// Enregistrement de l'instance
pub const RECORD_FILE: &str = "data/instance_data.json";
/// Liste des playlists retenues
pub const PLAYLISTS_FILE: &str = "data/playlist_data.json";
/// Réponse brute d'un échange ou d'une requête en échec
pub const ERROR_FILE: &str = "data/error.json";
/// Détail d'une playlist, dans `playlist{n}/`
pub const PLAYLIST_DATA_FILE: &str = "data.json";
/// Pochette d'une playlist, dans `playlist{n}/`
pub const PLAYLIST_IMAGE_FILE: &str = "playlist_image.png";

/// Accès durable aux enregistrements et artefacts des instances
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Crée un enregistrement `Pending` aux tokens vides
    ///
    /// # Errors
    ///
    /// * `SpotifyError::DuplicateInstance` - un enregistrement existe déjà
    async fn create(&self, id: &InstanceId, verifier: &str) -> Result<InstanceRecord>;

    /// Relit l'enregistrement depuis le stockage
    ///
    /// Un enregistrement absent, illisible ou non décodable donne
    /// `SpotifyError::InstanceNotFound`.
    async fn load(&self, id: &InstanceId) -> Result<InstanceRecord>;

    /// Enregistre les tokens et passe l'instance à l'état `Authorized`
    ///
    /// Échoue avec `SpotifyError::InstanceNotFound` si l'instance a été
    /// évincée entre-temps.
    async fn set_tokens(&self, id: &InstanceId, tokens: TokenSet) -> Result<InstanceRecord>;

    /// Supprime l'instance et tous ses artefacts (idempotent)
    async fn delete(&self, id: &InstanceId) -> Result<()>;

    /// Identifiants présents, dans l'ordre de listage du stockage
    async fn list_live_ids(&self) -> Result<Vec<InstanceId>>;

    /// Écrit un artefact à `path` (relatif à l'instance, ex: `playlist0/data.json`)
    ///
    /// Ne recrée jamais une instance évincée : échoue alors avec
    /// `SpotifyError::InstanceNotFound`.
    async fn write_artifact(&self, id: &InstanceId, path: &str, bytes: &[u8]) -> Result<()>;

    /// Relit un artefact écrit par [`InstanceStore::write_artifact`]
    async fn read_artifact(&self, id: &InstanceId, path: &str) -> Result<Vec<u8>>;

    /// Sous-répertoires de l'instance (dont le répertoire réservé `data`)
    async fn list_artifact_dirs(&self, id: &InstanceId) -> Result<Vec<String>>;
}

/// Vérifie qu'un chemin d'artefact reste dans le sous-arbre de l'instance
pub(crate) fn is_relative_artifact_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}
