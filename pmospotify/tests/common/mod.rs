#![allow(dead_code)]

use async_trait::async_trait;
use pmospotify::{
    InstanceStore, PlaylistRenderer, RawResponse, RenderInput, RenderedArtifact, Result,
    SpotifyError, SpotifyService,
};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Service Spotify scripté pour les tests
pub struct FakeSpotify {
    pub token_response: Mutex<RawResponse>,
    pub playlists_response: Mutex<RawResponse>,
    /// Identifiants de playlists dont le détail renvoie 404
    pub missing_details: Mutex<HashSet<String>>,
    pub last_challenge: Mutex<Option<String>>,
    pub exchange_calls: AtomicUsize,
    pub collection_calls: AtomicUsize,
    /// L'URL d'autorisation ne peut pas être construite
    pub fail_authorization: bool,
    /// Échange et collection échouent comme sur un timeout
    pub transport_failure: bool,
    /// Stockage vidé pendant l'échange, avant la réponse
    pub evict_during_exchange: Option<Arc<dyn InstanceStore>>,
}

impl FakeSpotify {
    pub fn new() -> Self {
        Self {
            token_response: Mutex::new(RawResponse::new(
                200,
                r#"{"access_token":"access-1","token_type":"Bearer","expires_in":3600,"refresh_token":"refresh-1"}"#,
            )),
            playlists_response: Mutex::new(RawResponse::new(200, r#"{"items":[]}"#)),
            missing_details: Mutex::new(HashSet::new()),
            last_challenge: Mutex::new(None),
            exchange_calls: AtomicUsize::new(0),
            collection_calls: AtomicUsize::new(0),
            fail_authorization: false,
            transport_failure: false,
            evict_during_exchange: None,
        }
    }

    pub fn with_failing_authorization(mut self) -> Self {
        self.fail_authorization = true;
        self
    }

    pub fn with_transport_failure(mut self) -> Self {
        self.transport_failure = true;
        self
    }

    pub fn evicting_during_exchange(mut self, store: Arc<dyn InstanceStore>) -> Self {
        self.evict_during_exchange = Some(store);
        self
    }

    fn timeout() -> SpotifyError {
        SpotifyError::ApiError {
            code: 504,
            message: "operation timed out".to_string(),
        }
    }

    pub fn with_token_response(self, status: u16, body: &str) -> Self {
        *self.token_response.lock().unwrap() = RawResponse::new(status, body);
        self
    }

    pub fn with_playlists(self, items: Vec<Value>) -> Self {
        *self.playlists_response.lock().unwrap() =
            RawResponse::new(200, json!({ "items": items }).to_string());
        self
    }

    pub fn with_playlists_response(self, status: u16, body: &str) -> Self {
        *self.playlists_response.lock().unwrap() = RawResponse::new(status, body);
        self
    }

    pub fn with_missing_detail(self, playlist_id: &str) -> Self {
        self.missing_details
            .lock()
            .unwrap()
            .insert(playlist_id.to_string());
        self
    }
}

#[async_trait]
impl SpotifyService for FakeSpotify {
    fn authorization_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        if self.fail_authorization {
            return Err(SpotifyError::Configuration("invalid accounts URL".to_string()));
        }
        *self.last_challenge.lock().unwrap() = Some(code_challenge.to_string());
        Ok(format!(
            "https://accounts.test/authorize?state={}&code_challenge={}",
            state, code_challenge
        ))
    }

    async fn exchange_code(&self, _code: &str, _code_verifier: &str) -> Result<RawResponse> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if self.transport_failure {
            return Err(Self::timeout());
        }
        if let Some(store) = &self.evict_during_exchange {
            for id in store.list_live_ids().await? {
                store.delete(&id).await?;
            }
        }
        let response = self.token_response.lock().unwrap().clone();
        Ok(response)
    }

    async fn my_playlists(&self, _access_token: &str) -> Result<RawResponse> {
        self.collection_calls.fetch_add(1, Ordering::SeqCst);
        if self.transport_failure {
            return Err(Self::timeout());
        }
        let response = self.playlists_response.lock().unwrap().clone();
        Ok(response)
    }

    async fn playlist(&self, _access_token: &str, playlist_id: &str) -> Result<Value> {
        if self.missing_details.lock().unwrap().contains(playlist_id) {
            return Err(SpotifyError::NotFound(playlist_id.to_string()));
        }
        Ok(json!({ "id": playlist_id, "tracks": { "items": [] } }))
    }

    async fn artwork(&self, url: &str) -> Result<Vec<u8>> {
        Ok(url.as_bytes().to_vec())
    }
}

/// Rendu produisant le graphique et l'en-tête
pub struct FakeRenderer {
    /// Numéro de playlist pour lequel le rendu produit un nom invalide
    pub broken: Option<usize>,
}

impl PlaylistRenderer for FakeRenderer {
    fn render(&self, input: &RenderInput<'_>) -> Result<Vec<RenderedArtifact>> {
        if self.broken == Some(input.descriptor.playlist_number) {
            return Ok(vec![RenderedArtifact::new("../escape.jpg", vec![0])]);
        }
        Ok(vec![
            RenderedArtifact::new("graph.jpg", input.descriptor.name.as_bytes().to_vec()),
            RenderedArtifact::new("final_heading.jpg", input.artwork.to_vec()),
        ])
    }
}

/// Entrée de `/me/playlists`
pub fn playlist_entry(id: &str, owner: &str, total: u64) -> Value {
    json!({
        "id": id,
        "name": format!("Playlist {}", id),
        "description": format!("About {}", id),
        "owner": { "display_name": owner },
        "tracks": { "total": total },
        "images": [ { "url": format!("https://img.test/{}", id) } ]
    })
}

/// 25 playlists qualifiées entrecoupées de 3 playlists éditoriales
pub fn interleaved_collection() -> Vec<Value> {
    let mut items = Vec::new();
    for i in 0..25 {
        items.push(playlist_entry(&format!("ok{}", i), "alice", 10));
        if i == 1 || i == 7 || i == 18 {
            items.push(playlist_entry(&format!("curated{}", i), "Spotify", 80));
        }
    }
    items
}
