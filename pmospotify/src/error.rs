//! Gestion des erreurs pour les sessions de rapport Spotify

use thiserror::Error;

/// Type Result personnalisé pour pmospotify
pub type Result<T> = std::result::Result<T, SpotifyError>;

/// Erreurs possibles lors de la gestion des instances et des appels Spotify
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Le stockage des instances est inaccessible (fatal pour l'opération)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Un identifiant d'instance présent dans le stockage est illisible
    #[error("Malformed instance id: {0}")]
    MalformedInstanceId(String),

    /// Une instance existe déjà à cet identifiant
    #[error("Instance already exists: {0}")]
    DuplicateInstance(String),

    /// Instance absente, évincée ou corrompue
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// L'échange du code d'autorisation contre un token a échoué
    #[error("Token exchange failed for instance {instance}: {reason}")]
    TokenExchangeFailed { instance: String, reason: String },

    /// L'instance n'a pas encore de token d'accès
    #[error("Instance not authorized: {0}")]
    NotAuthorized(String),

    /// La liste des playlists de l'utilisateur n'a pas pu être obtenue
    #[error("Playlist fetch failed for instance {instance}: {reason}")]
    PlaylistFetchFailed { instance: String, reason: String },

    /// La source d'entropie du système est indisponible
    #[error("Entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    /// Erreur d'authentification auprès de l'API (401/403)
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Ressource distante non trouvée
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Erreur HTTP
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Erreur de parsing JSON
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Erreur de configuration (anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Paramètre Spotify invalide (URL, client id...)
    #[error("Spotify configuration error: {0}")]
    Configuration(String),

    /// Erreur de l'API Spotify
    #[error("Spotify API error (code {code}): {message}")]
    ApiError { code: u16, message: String },

    /// Quota dépassé (rate limiting)
    #[error("Rate limit exceeded, please try again later")]
    RateLimitExceeded,

    /// Le rendu d'une playlist a échoué
    #[error("Render error: {0}")]
    Render(String),
}

impl SpotifyError {
    /// Crée une erreur API depuis un code de statut HTTP et un message
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            401 | 403 => Self::Unauthorized(message.into()),
            404 => Self::NotFound(message.into()),
            429 => Self::RateLimitExceeded,
            _ => Self::ApiError {
                code,
                message: message.into(),
            },
        }
    }

    /// Convertit une erreur d'entrée/sortie en erreur de stockage
    pub(crate) fn storage(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        Self::StorageUnavailable(format!("{}: {}", context, err))
    }

    /// Indique si l'appelant peut proposer de recommencer le parcours
    ///
    /// Les erreurs de stockage, d'identifiant corrompu et d'entropie sont
    /// fatales ; les autres donnent lieu à une page d'erreur.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SpotifyError::StorageUnavailable(_)
                | SpotifyError::MalformedInstanceId(_)
                | SpotifyError::EntropyUnavailable(_)
        )
    }

    /// Vérifie si l'erreur signale une instance disparue
    pub fn is_instance_not_found(&self) -> bool {
        matches!(self, SpotifyError::InstanceNotFound(_))
    }

    /// Vérifie si l'erreur est une erreur de rate limiting
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SpotifyError::RateLimitExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_code() {
        assert!(matches!(
            SpotifyError::from_status_code(401, "expired"),
            SpotifyError::Unauthorized(_)
        ));
        assert!(matches!(
            SpotifyError::from_status_code(404, "missing"),
            SpotifyError::NotFound(_)
        ));
        assert!(SpotifyError::from_status_code(429, "").is_rate_limit());
        assert!(matches!(
            SpotifyError::from_status_code(500, "boom"),
            SpotifyError::ApiError { code: 500, .. }
        ));
    }

    #[test]
    fn test_recoverable_kinds() {
        assert!(SpotifyError::InstanceNotFound("1_a".into()).is_recoverable());
        assert!(
            SpotifyError::TokenExchangeFailed {
                instance: "1_a".into(),
                reason: "invalid_grant".into()
            }
            .is_recoverable()
        );
        assert!(!SpotifyError::StorageUnavailable("disk".into()).is_recoverable());
        assert!(!SpotifyError::EntropyUnavailable("os".into()).is_recoverable());
    }
}
