//! Façade exposée à la couche de routes
//!
//! [`ReportSessions`] assemble stockage, client Spotify, sessions et
//! ingestion. Il ne garde aucun état propre à une instance : deux requêtes
//! sur le même identifiant passent toujours par le stockage.

use crate::allocator::InstanceAllocator;
use crate::api::{SpotifyApi, SpotifyService};
use crate::config_ext::SpotifySettings;
use crate::error::Result;
use crate::ingest::{IngestPipeline, IngestPolicy};
use crate::models::{IngestReport, InstanceId, SessionState};
use crate::render::{NoopRenderer, PlaylistRenderer};
use crate::session::{BegunSession, SessionManager};
use crate::store::{DATA_DIR, FsInstanceStore, InstanceStore};
use pmoconfig::Config;
use std::sync::Arc;
use tracing::info;

/// Point d'entrée des sessions de rapport
pub struct ReportSessions {
    store: Arc<dyn InstanceStore>,
    sessions: SessionManager,
    pipeline: IngestPipeline,
}

impl ReportSessions {
    /// Assemble les composants fournis
    pub fn new(
        settings: &SpotifySettings,
        store: Arc<dyn InstanceStore>,
        service: Arc<dyn SpotifyService>,
        renderer: Arc<dyn PlaylistRenderer>,
    ) -> Self {
        let allocator = InstanceAllocator::new(settings.capacity, settings.id_suffix_length);
        let sessions = SessionManager::new(store.clone(), service.clone(), allocator);
        let pipeline = IngestPipeline::new(
            store.clone(),
            service,
            renderer,
            IngestPolicy::from(settings),
        );

        Self {
            store,
            sessions,
            pipeline,
        }
    }

    /// Crée les sessions depuis la configuration globale (`pmoconfig`)
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use pmospotify::ReportSessions;
    ///
    /// # fn main() -> pmospotify::Result<()> {
    /// let sessions = ReportSessions::from_config()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config() -> Result<Self> {
        let config = pmoconfig::get_config();
        Self::from_config_obj(config.as_ref())
    }

    /// Crée les sessions depuis un objet Config spécifique
    pub fn from_config_obj(config: &Config) -> Result<Self> {
        let settings = SpotifySettings::from_config(config)?;
        Self::from_settings(&settings)
    }

    /// Stockage sur disque, client `reqwest` et rendu vide
    pub fn from_settings(settings: &SpotifySettings) -> Result<Self> {
        let store = Arc::new(FsInstanceStore::new(settings.instances_dir.clone())?);
        let service = Arc::new(SpotifyApi::new(settings)?);
        info!(
            root = %settings.instances_dir.display(),
            capacity = settings.capacity,
            "Report sessions ready"
        );
        Ok(Self::new(settings, store, service, Arc::new(NoopRenderer)))
    }

    pub fn store(&self) -> &Arc<dyn InstanceStore> {
        &self.store
    }

    /// Ouvre une session et renvoie l'URL d'autorisation
    pub async fn begin_session(&self) -> Result<BegunSession> {
        self.sessions.begin_session().await
    }

    /// Traite le retour de l'utilisateur (`state` = identifiant d'instance)
    pub async fn complete_session(&self, id: &InstanceId, code: &str) -> Result<()> {
        self.sessions.complete_session(id, code).await
    }

    pub async fn session_state(&self, id: &InstanceId) -> Result<SessionState> {
        self.sessions.session_state(id).await
    }

    /// Ingère les playlists d'une instance autorisée
    pub async fn ingest(&self, id: &InstanceId) -> Result<IngestReport> {
        self.pipeline.ingest(id).await
    }

    /// Échange du code puis ingestion, en une étape
    ///
    /// Un échange en échec arrête tout : aucune ingestion n'est tentée.
    pub async fn generate_review(&self, id: &InstanceId, code: &str) -> Result<IngestReport> {
        self.complete_session(id, code).await?;
        self.ingest(id).await
    }

    /// Chemins `"{id}/playlist{n}"` des playlists rendues, par numéro croissant
    ///
    /// Le répertoire réservé `data` n'apparaît jamais.
    pub async fn list_rendered_artifact_paths(&self, id: &InstanceId) -> Result<Vec<String>> {
        self.store.load(id).await?;

        let mut numbered: Vec<(usize, String)> = self
            .store
            .list_artifact_dirs(id)
            .await?
            .into_iter()
            .filter(|dir| dir != DATA_DIR)
            .filter_map(|dir| {
                let number = dir.strip_prefix("playlist")?.parse::<usize>().ok()?;
                Some((number, dir))
            })
            .collect();
        numbered.sort_by_key(|(number, _)| *number);

        Ok(numbered
            .into_iter()
            .map(|(_, dir)| format!("{}/{}", id, dir))
            .collect())
    }
}
