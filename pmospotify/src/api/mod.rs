//! Couche d'accès aux API Spotify (comptes et Web API)
//!
//! [`SpotifyService`] décrit ce dont le cœur a besoin du service externe ;
//! [`SpotifyApi`] l'implémente avec `reqwest`. Les tests injectent leurs
//! propres implémentations.

pub mod auth;
pub mod playlists;

use crate::config_ext::SpotifySettings;
use crate::error::{Result, SpotifyError};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Réponse HTTP conservée telle quelle
///
/// Utilisée quand le corps brut doit pouvoir être archivé comme
/// diagnostic (échange de token, liste des playlists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Décode le corps en JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    async fn read(response: Response) -> Result<Self> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("Response status: {}", status);
        Ok(Self { status, body })
    }
}

/// Opérations du service externe utilisées par les sessions et l'ingestion
#[async_trait]
pub trait SpotifyService: Send + Sync {
    /// URL d'autorisation vers laquelle rediriger l'utilisateur
    fn authorization_url(&self, state: &str, code_challenge: &str) -> Result<String>;

    /// `POST /api/token` : échange d'un code contre des tokens
    ///
    /// Seules les erreurs de transport sont des `Err` ; tout statut HTTP est
    /// renvoyé dans la [`RawResponse`].
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<RawResponse>;

    /// `GET /me/playlists`, réponse brute
    async fn my_playlists(&self, access_token: &str) -> Result<RawResponse>;

    /// `GET /playlists/{id}`
    async fn playlist(&self, access_token: &str, playlist_id: &str) -> Result<Value>;

    /// Téléchargement de la pochette, sans authentification : l'URL désigne
    /// un hôte tiers
    async fn artwork(&self, url: &str) -> Result<Vec<u8>>;
}

/// Client API pour Spotify
pub struct SpotifyApi {
    /// Client HTTP
    client: Client,
    /// Identifiant de l'application Spotify
    client_id: String,
    /// URI de retour enregistrée pour l'application
    redirect_uri: String,
    /// Permissions demandées
    scope: String,
    /// Base du service de comptes (`/authorize`, `/api/token`)
    accounts_url: String,
    /// Base de la Web API (`/me/playlists`, `/playlists/{id}`)
    api_url: String,
}

impl SpotifyApi {
    /// Crée un client depuis les paramètres Spotify
    ///
    /// Le timeout du client borne chaque appel : un dépassement devient un
    /// échec d'échange de token ou une playlist ignorée, jamais un blocage.
    pub fn new(settings: &SpotifySettings) -> Result<Self> {
        if settings.client_id.is_empty() {
            warn!("Spotify client id is empty, authorization requests will be rejected");
        }

        let client = Client::builder()
            .timeout(settings.http_timeout)
            .user_agent(concat!("pmospotify/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            client_id: settings.client_id.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            scope: settings.scope.clone(),
            accounts_url: settings.accounts_url.trim_end_matches('/').to_string(),
            api_url: settings.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Retourne le client id
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Retourne l'URI de retour
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// URL de la Web API ; chaque segment est encodé séparément
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let invalid = || SpotifyError::Configuration(format!("invalid API URL {}", self.api_url));

        let mut url = Url::parse(&self.api_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Effectue une requête GET authentifiée sur la Web API
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        access_token: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!("GET {} with {} params", url, params.len());

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(params)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Traite la réponse HTTP
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        let status_code = status.as_u16();

        debug!("Response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("API error ({}): {}", status_code, error_text);
            return Err(SpotifyError::from_status_code(
                status_code,
                api_error_message(&error_text),
            ));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!("Failed to parse response: {}", e);
            SpotifyError::JsonParse(e)
        })
    }
}

/// Extrait le message d'une erreur Web API (`{"error": {"status", "message"}}`)
///
/// Les erreurs OAuth (`{"error": "invalid_grant", "error_description"}`) sont
/// aussi reconnues ; sinon le corps est renvoyé tel quel.
pub(crate) fn api_error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };
    match json.get("error") {
        Some(Value::Object(error)) => error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(body)
            .to_string(),
        Some(Value::String(code)) => match json.get("error_description").and_then(Value::as_str) {
            Some(description) => format!("{}: {}", code, description),
            None => code.clone(),
        },
        _ => body.to_string(),
    }
}

#[async_trait]
impl SpotifyService for SpotifyApi {
    fn authorization_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        SpotifyApi::authorization_url(self, state, code_challenge)
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<RawResponse> {
        SpotifyApi::exchange_code(self, code, code_verifier).await
    }

    async fn my_playlists(&self, access_token: &str) -> Result<RawResponse> {
        SpotifyApi::my_playlists(self, access_token).await
    }

    async fn playlist(&self, access_token: &str, playlist_id: &str) -> Result<Value> {
        SpotifyApi::playlist(self, access_token, playlist_id).await
    }

    async fn artwork(&self, url: &str) -> Result<Vec<u8>> {
        SpotifyApi::artwork(self, url).await
    }
}

#[cfg(test)]
pub(crate) fn test_settings(server_url: &str) -> SpotifySettings {
    SpotifySettings {
        client_id: "client123".into(),
        redirect_uri: "http://127.0.0.1:5000/validate/".into(),
        accounts_url: server_url.into(),
        api_url: format!("{}/v1", server_url),
        ..SpotifySettings::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_creation() {
        let api = SpotifyApi::new(&test_settings("https://accounts.example.com/")).unwrap();
        assert_eq!(api.client_id(), "client123");
        assert_eq!(api.redirect_uri(), "http://127.0.0.1:5000/validate/");
        assert_eq!(api.accounts_url, "https://accounts.example.com");
    }

    #[test]
    fn test_endpoint_segments_are_encoded() {
        let api = SpotifyApi::new(&test_settings("https://api.example.com")).unwrap();
        assert_eq!(
            api.endpoint(&["playlists", "37i9dQ"]).unwrap().as_str(),
            "https://api.example.com/v1/playlists/37i9dQ"
        );
        assert_eq!(
            api.endpoint(&["playlists", "abc/../../me?x=1"]).unwrap().as_str(),
            "https://api.example.com/v1/playlists/abc%2F..%2F..%2Fme%3Fx=1"
        );
    }

    #[test]
    fn test_raw_response_status() {
        assert!(RawResponse::new(200, "{}").is_success());
        assert!(RawResponse::new(204, "").is_success());
        assert!(!RawResponse::new(400, "{}").is_success());
    }

    #[test]
    fn test_api_error_message() {
        assert_eq!(
            api_error_message(r#"{"error":{"status":401,"message":"The access token expired"}}"#),
            "The access token expired"
        );
        assert_eq!(
            api_error_message(r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#),
            "invalid_grant: Invalid authorization code"
        );
        assert_eq!(api_error_message("<html>"), "<html>");
    }
}
