//! API utilisateur : playlists et pochettes

use super::{RawResponse, SpotifyApi, api_error_message};
use crate::error::{Result, SpotifyError};
use serde_json::Value;
use tracing::{debug, warn};

/// Nombre d'entrées demandées à `/me/playlists` (maximum de l'API)
///
/// Le filtre écarte une partie des entrées : on en demande plus que le
/// plafond de playlists retenues.
pub const PLAYLIST_PAGE_LIMIT: &str = "50";

impl SpotifyApi {
    /// Récupère la collection de playlists de l'utilisateur, réponse brute
    pub async fn my_playlists(&self, access_token: &str) -> Result<RawResponse> {
        let url = self.endpoint(&["me", "playlists"])?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .query(&[("limit", PLAYLIST_PAGE_LIMIT)])
            .send()
            .await?;
        RawResponse::read(response).await
    }

    /// Récupère le détail complet d'une playlist
    pub async fn playlist(&self, access_token: &str, playlist_id: &str) -> Result<Value> {
        self.get(&["playlists", playlist_id], access_token, &[]).await
    }

    /// Télécharge les octets de la pochette
    ///
    /// L'URL vient du contenu de la playlist et vise un CDN : le token
    /// d'accès n'y est jamais envoyé. Une réponse vide est une erreur.
    pub async fn artwork(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET artwork {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Artwork error ({}): {}", status, text);
            return Err(SpotifyError::from_status_code(
                status.as_u16(),
                api_error_message(&text),
            ));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SpotifyError::NotFound(format!("empty artwork at {}", url)));
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_settings;
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_my_playlists_uses_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/me/playlists")
            .match_header("authorization", "Bearer tok")
            .match_query(Matcher::UrlEncoded("limit".into(), "50".into()))
            .with_status(200)
            .with_body(r#"{"items":[]}"#)
            .create_async()
            .await;

        let api = SpotifyApi::new(&test_settings(&server.url())).unwrap();
        let response = api.my_playlists("tok").await.unwrap();

        mock.assert_async().await;
        assert!(response.is_success());
        assert_eq!(response.body, r#"{"items":[]}"#);
    }

    #[tokio::test]
    async fn test_playlist_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/playlists/abc")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"name":"Road trip","tracks":{"items":[]}}"#)
            .create_async()
            .await;

        let api = SpotifyApi::new(&test_settings(&server.url())).unwrap();
        let detail = api.playlist("tok", "abc").await.unwrap();
        assert_eq!(detail["name"], "Road trip");
    }

    #[tokio::test]
    async fn test_playlist_detail_expired_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/playlists/abc")
            .with_status(401)
            .with_body(r#"{"error":{"status":401,"message":"The access token expired"}}"#)
            .create_async()
            .await;

        let api = SpotifyApi::new(&test_settings(&server.url())).unwrap();
        let err = api.playlist("tok", "abc").await.unwrap_err();
        assert!(matches!(err, SpotifyError::Unauthorized(ref m) if m == "The access token expired"));
    }

    #[tokio::test]
    async fn test_artwork_sends_no_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/cdn/img")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(vec![1, 2, 3])
            .create_async()
            .await;

        let api = SpotifyApi::new(&test_settings(&server.url())).unwrap();
        let bytes = api
            .artwork(&format!("{}/cdn/img", server.url()))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_artwork_bytes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/image/1")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(vec![0x89, b'P', b'N', b'G'])
            .create_async()
            .await;
        server
            .mock("GET", "/image/empty")
            .with_status(200)
            .create_async()
            .await;

        let api = SpotifyApi::new(&test_settings(&server.url())).unwrap();
        let bytes = api
            .artwork(&format!("{}/image/1", server.url()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0x89, b'P', b'N', b'G']);

        let err = api
            .artwork(&format!("{}/image/empty", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, SpotifyError::NotFound(_)));
    }
}
