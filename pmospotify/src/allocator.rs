//! Attribution des identifiants d'instance et éviction de la plus ancienne
//!
//! Le numéro de séquence est dérivé des instances vivantes
//! (`max + 1`), et non d'un compteur persistant : une fois l'instance la
//! plus récente supprimée, son numéro peut être réattribué.

use crate::error::Result;
use crate::models::InstanceId;
use crate::pkce::random_suffix;
use crate::store::InstanceStore;
use tracing::{debug, info};

/// Capacité par défaut (nombre d'instances vivantes)
pub const DEFAULT_CAPACITY: usize = 10;
/// Longueur par défaut du suffixe aléatoire
pub const DEFAULT_SUFFIX_LENGTH: usize = 10;

/// Générateur d'identifiants à capacité bornée
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceAllocator {
    capacity: usize,
    suffix_length: usize,
}

impl Default for InstanceAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_SUFFIX_LENGTH)
    }
}

impl InstanceAllocator {
    /// Une capacité nulle est ramenée à 1
    pub fn new(capacity: usize, suffix_length: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            suffix_length,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn suffix_length(&self) -> usize {
        self.suffix_length
    }

    /// Attribue un nouvel identifiant, en évinçant l'instance la plus ancienne
    /// si la capacité est atteinte
    ///
    /// L'éviction est une suppression synchrone faite *avant* la création de
    /// la nouvelle instance : un arrêt entre les deux laisse le stockage sous
    /// la capacité, jamais au-dessus.
    ///
    /// L'appelant doit sérialiser `allocate` et la création de
    /// l'enregistrement correspondant ; sinon deux appels concurrents peuvent
    /// calculer la même séquence.
    ///
    /// # Errors
    ///
    /// * `SpotifyError::StorageUnavailable` - listage ou suppression impossible
    /// * `SpotifyError::MalformedInstanceId` - une entrée du stockage n'a pas de séquence lisible
    /// * `SpotifyError::EntropyUnavailable` - pas d'aléa pour le suffixe
    pub async fn allocate(&self, store: &dyn InstanceStore) -> Result<InstanceId> {
        let live = store.list_live_ids().await?;

        // (séquence, index de listage) pour départager les ex aequo
        let mut oldest: Option<(u64, usize)> = None;
        let mut newest = 0u64;
        for (index, id) in live.iter().enumerate() {
            let sequence = id.sequence()?;
            newest = newest.max(sequence);
            if oldest.is_none_or(|(min, _)| sequence < min) {
                oldest = Some((sequence, index));
            }
        }

        if live.len() >= self.capacity {
            if let Some((sequence, index)) = oldest {
                let victim = &live[index];
                store.delete(victim).await?;
                info!(instance = %victim, sequence, "Evicted oldest instance");
            }
        }

        let next = newest + 1;
        let id = InstanceId::new(next, &random_suffix(self.suffix_length)?);
        debug!(instance = %id, live = live.len(), "Allocated instance id");
        Ok(id)
    }
}
