//! Flux d'autorisation OAuth (code + PKCE) auprès du service de comptes

use super::{RawResponse, SpotifyApi};
use crate::error::{Result, SpotifyError};
use reqwest::Url;
use tracing::{debug, info};

impl SpotifyApi {
    /// Construit l'URL `/authorize` vers laquelle rediriger l'utilisateur
    ///
    /// # Arguments
    ///
    /// * `state` - Identifiant de l'instance, renvoyé tel quel lors du retour
    /// * `code_challenge` - Challenge PKCE (S256) ; le verifier reste côté serveur
    pub fn authorization_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        let endpoint = format!("{}/authorize", self.accounts_url);
        let params = [
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("state", state),
            ("scope", self.scope.as_str()),
            ("code_challenge_method", "S256"),
            ("code_challenge", code_challenge),
            ("show_dialog", "false"),
        ];

        let url = Url::parse_with_params(&endpoint, &params).map_err(|e| {
            SpotifyError::Configuration(format!("invalid accounts URL {}: {}", endpoint, e))
        })?;

        debug!(state, "Authorization URL built");
        Ok(url.to_string())
    }

    /// Échange le code d'autorisation contre des tokens
    ///
    /// # Returns
    ///
    /// La réponse brute de l'endpoint, quel que soit son statut
    ///
    /// # Errors
    ///
    /// * `SpotifyError::Http` - erreur de transport ou timeout
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<RawResponse> {
        let url = format!("{}/api/token", self.accounts_url);
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];

        info!("Exchanging authorization code at {}", url);
        let response = self.client.post(&url).form(&params).send().await?;
        RawResponse::read(response).await
    }
}
