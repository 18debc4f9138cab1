//! Ingestion des playlists d'une instance autorisée
//!
//! La collection est filtrée (pas de playlists éditoriales, plus de
//! `min_tracks` pistes) et bornée à `max_playlists` entrées retenues. Chaque
//! playlist est ensuite traitée indépendamment : un échec est journalisé et
//! la playlist ignorée, sans interrompre les autres.

use crate::api::{SpotifyService, api_error_message};
use crate::config_ext::SpotifySettings;
use crate::error::{Result, SpotifyError};
use crate::models::{
    IngestReport, InstanceId, PlaylistDescriptor, PlaylistPage, PlaylistSummary,
};
use crate::render::{PlaylistRenderer, RenderInput};
use crate::store::{ERROR_FILE, InstanceStore, PLAYLIST_DATA_FILE, PLAYLIST_IMAGE_FILE, PLAYLISTS_FILE};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Règles de sélection et de traitement des playlists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestPolicy {
    pub max_playlists: usize,
    pub min_tracks: u64,
    pub excluded_owner: String,
    pub placeholder_art_url: String,
    pub concurrency: usize,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self::from(&SpotifySettings::default())
    }
}

impl From<&SpotifySettings> for IngestPolicy {
    fn from(settings: &SpotifySettings) -> Self {
        Self {
            max_playlists: settings.max_playlists,
            min_tracks: settings.min_tracks,
            excluded_owner: settings.excluded_owner.clone(),
            placeholder_art_url: settings.placeholder_art_url.clone(),
            concurrency: settings.ingest_concurrency,
        }
    }
}

/// Sélectionne les playlists à analyser, dans l'ordre du service
///
/// Les entrées écartées ne comptent pas dans le plafond ; `playlist_number`
/// est le rang parmi les entrées retenues.
pub fn select_playlists(items: &[Value], policy: &IngestPolicy) -> Vec<PlaylistDescriptor> {
    let mut selected = Vec::new();

    for (position, item) in items.iter().enumerate() {
        if selected.len() >= policy.max_playlists {
            break;
        }

        let summary = match serde_json::from_value::<PlaylistSummary>(item.clone()) {
            Ok(summary) => summary,
            Err(e) => {
                debug!(position, "Skipping malformed playlist entry: {}", e);
                continue;
            }
        };

        if summary.owner.display_name.as_deref() == Some(policy.excluded_owner.as_str()) {
            debug!(position, playlist = %summary.name, "Skipping curated playlist");
            continue;
        }
        if summary.tracks.total <= policy.min_tracks {
            debug!(position, playlist = %summary.name, "Skipping short playlist");
            continue;
        }

        let art_url = summary
            .images
            .as_ref()
            .and_then(|images| images.first())
            .map(|image| image.url.clone())
            .unwrap_or_else(|| policy.placeholder_art_url.clone());

        selected.push(PlaylistDescriptor {
            name: summary.name,
            description: summary.description.unwrap_or_default(),
            link_id: summary.id,
            playlist_number: selected.len(),
            art_url,
        });
    }

    selected
}

/// Pipeline d'ingestion : collection, sélection, artefacts, rendu
pub struct IngestPipeline {
    store: Arc<dyn InstanceStore>,
    service: Arc<dyn SpotifyService>,
    renderer: Arc<dyn PlaylistRenderer>,
    policy: IngestPolicy,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        service: Arc<dyn SpotifyService>,
        renderer: Arc<dyn PlaylistRenderer>,
        policy: IngestPolicy,
    ) -> Self {
        Self {
            store,
            service,
            renderer,
            policy,
        }
    }

    pub fn policy(&self) -> &IngestPolicy {
        &self.policy
    }

    /// Ingère les playlists d'une instance `Authorized`
    ///
    /// # Errors
    ///
    /// * `SpotifyError::InstanceNotFound` - instance absente ou évincée
    /// * `SpotifyError::NotAuthorized` - pas encore de token d'accès
    /// * `SpotifyError::PlaylistFetchFailed` - collection inaccessible (réponse archivée)
    ///
    /// Les échecs propres à une playlist ne remontent pas : ils apparaissent
    /// dans [`IngestReport::failed`].
    pub async fn ingest(&self, id: &InstanceId) -> Result<IngestReport> {
        let record = self.store.load(id).await?;
        let token = record
            .access_token()
            .ok_or_else(|| SpotifyError::NotAuthorized(id.to_string()))?;

        let items = self.fetch_collection(id, token).await?;
        let descriptors = select_playlists(&items, &self.policy);
        info!(
            instance = %id,
            available = items.len(),
            selected = descriptors.len(),
            "Playlists selected"
        );

        self.store
            .write_artifact(id, PLAYLISTS_FILE, &serde_json::to_vec_pretty(&descriptors)?)
            .await?;

        let outcomes: Vec<(usize, Result<()>)> = stream::iter(descriptors.iter())
            .map(|descriptor| async move {
                (
                    descriptor.playlist_number,
                    self.process_playlist(id, token, descriptor).await,
                )
            })
            .buffer_unordered(self.policy.concurrency.max(1))
            .collect()
            .await;

        let mut report = IngestReport {
            selected: descriptors.len(),
            ..IngestReport::default()
        };
        for (number, outcome) in outcomes {
            match outcome {
                Ok(()) => report.rendered.push(number),
                Err(e) => {
                    warn!(instance = %id, playlist = number, "Playlist skipped: {}", e);
                    report.failed.push(number);
                }
            }
        }
        report.rendered.sort_unstable();
        report.failed.sort_unstable();

        info!(
            instance = %id,
            rendered = report.rendered.len(),
            failed = report.failed.len(),
            "Ingestion finished"
        );
        Ok(report)
    }

    /// Récupère `items` depuis `/me/playlists`, en archivant la réponse en cas d'échec
    async fn fetch_collection(&self, id: &InstanceId, token: &str) -> Result<Vec<Value>> {
        let failure = |reason: String| SpotifyError::PlaylistFetchFailed {
            instance: id.to_string(),
            reason,
        };

        let response = match self.service.my_playlists(token).await {
            Ok(response) => response,
            Err(e) => {
                let diagnostic = serde_json::json!({
                    "error": "transport_error",
                    "error_description": e.to_string(),
                });
                self.write_diagnostic(id, diagnostic.to_string().as_bytes())
                    .await;
                return Err(failure(e.to_string()));
            }
        };

        if !response.is_success() {
            self.write_diagnostic(id, response.body.as_bytes()).await;
            return Err(failure(format!(
                "status {}: {}",
                response.status,
                api_error_message(&response.body)
            )));
        }

        match response.json::<PlaylistPage>() {
            Ok(page) => Ok(page.items),
            Err(e) => {
                self.write_diagnostic(id, response.body.as_bytes()).await;
                Err(failure(format!("unexpected playlist collection: {}", e)))
            }
        }
    }

    /// Détail, pochette et rendu d'une playlist
    ///
    /// Tout est récupéré et rendu avant la première écriture : une playlist
    /// en échec ne laisse pas de répertoire dans le rapport.
    async fn process_playlist(
        &self,
        id: &InstanceId,
        token: &str,
        descriptor: &PlaylistDescriptor,
    ) -> Result<()> {
        let detail = self.service.playlist(token, &descriptor.link_id).await?;
        let artwork = self.service.artwork(&descriptor.art_url).await?;

        let rendered = self.renderer.render(&RenderInput {
            instance: id,
            descriptor,
            detail: &detail,
            artwork: &artwork,
        })?;
        if let Some(bad) = rendered.iter().find(|a| !a.has_plain_name()) {
            return Err(SpotifyError::Render(format!(
                "invalid artifact name {:?}",
                bad.file_name
            )));
        }

        let dir = descriptor.directory();
        self.store
            .write_artifact(
                id,
                &format!("{}/{}", dir, PLAYLIST_DATA_FILE),
                &serde_json::to_vec(&detail)?,
            )
            .await?;
        self.store
            .write_artifact(id, &format!("{}/{}", dir, PLAYLIST_IMAGE_FILE), &artwork)
            .await?;
        for artifact in &rendered {
            self.store
                .write_artifact(id, &format!("{}/{}", dir, artifact.file_name), &artifact.bytes)
                .await?;
        }

        debug!(instance = %id, playlist = descriptor.playlist_number, "Playlist rendered");
        Ok(())
    }

    async fn write_diagnostic(&self, id: &InstanceId, body: &[u8]) {
        match self.store.write_artifact(id, ERROR_FILE, body).await {
            Ok(()) => info!(instance = %id, "Diagnostic written to {}", ERROR_FILE),
            Err(e) => warn!(instance = %id, "Cannot write diagnostic: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, owner: &str, total: u64) -> Value {
        json!({
            "id": id,
            "name": format!("Playlist {}", id),
            "description": "",
            "owner": { "display_name": owner },
            "tracks": { "total": total },
            "images": [ { "url": format!("https://img.example/{}", id) } ]
        })
    }

    #[test]
    fn test_cap_ignores_rejected_entries() {
        let mut items = Vec::new();
        for i in 0..25 {
            items.push(entry(&format!("ok{}", i), "alice", 10));
            if i == 2 || i == 9 || i == 15 {
                items.push(entry(&format!("bad{}", i), "Spotify", 50));
            }
        }

        let selected = select_playlists(&items, &IngestPolicy::default());
        assert_eq!(selected.len(), 20);
        for (n, descriptor) in selected.iter().enumerate() {
            assert_eq!(descriptor.link_id, format!("ok{}", n));
            assert_eq!(descriptor.playlist_number, n);
        }
    }

    #[test]
    fn test_fewer_qualifying_entries() {
        let items = vec![
            entry("a", "alice", 4),
            entry("b", "alice", 3),
            entry("c", "Spotify", 40),
            entry("d", "bob", 100),
        ];
        let selected = select_playlists(&items, &IngestPolicy::default());
        let ids: Vec<&str> = selected.iter().map(|d| d.link_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(selected[1].playlist_number, 1);
    }

    #[test]
    fn test_malformed_entries_fail_the_filter() {
        let items = vec![
            json!({ "id": "x", "name": "No owner", "tracks": { "total": 10 } }),
            json!({ "id": "y", "name": "Text total", "owner": {"display_name": "al"}, "tracks": { "total": "ten" } }),
            json!(null),
            entry("z", "alice", 5),
        ];
        let selected = select_playlists(&items, &IngestPolicy::default());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].link_id, "z");
        assert_eq!(selected[0].playlist_number, 0);
    }

    #[test]
    fn test_textual_and_float_totals_are_filtered_numerically() {
        let with_total = |id: &str, total: Value| {
            let mut item = entry(id, "alice", 0);
            item["tracks"]["total"] = total;
            item
        };
        let items = vec![
            with_total("s", json!("12")),
            with_total("f", json!(9.0)),
            with_total("short", json!("3")),
            with_total("low", json!(3.9)),
        ];
        let selected = select_playlists(&items, &IngestPolicy::default());
        let ids: Vec<&str> = selected.iter().map(|d| d.link_id.as_str()).collect();
        assert_eq!(ids, vec!["s", "f"]);
    }

    #[test]
    fn test_placeholder_artwork_and_null_description() {
        let items = vec![json!({
            "id": "p",
            "name": "Bare",
            "description": null,
            "owner": { "display_name": "alice" },
            "tracks": { "total": 12 },
            "images": null
        })];
        let selected = select_playlists(&items, &IngestPolicy::default());
        assert_eq!(selected[0].art_url, IngestPolicy::default().placeholder_art_url);
        assert_eq!(selected[0].description, "");
    }
}
