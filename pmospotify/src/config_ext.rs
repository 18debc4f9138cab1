//! Extension pour intégrer la configuration Spotify dans pmoconfig
//!
//! Ce module fournit le trait `SpotifyConfigExt` qui ajoute à
//! `pmoconfig::Config` les paramètres de l'application Spotify, de la
//! politique de stockage des instances et de l'ingestion, ainsi que
//! [`SpotifySettings`], un instantané de ces paramètres.

use crate::allocator::{DEFAULT_CAPACITY, DEFAULT_SUFFIX_LENGTH};
use anyhow::{Result, anyhow};
use pmoconfig::Config;
use serde_yaml::Value;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_REDIRECT_PATH: &str = "/validate/";
const DEFAULT_SCOPE: &str = "playlist-read-private";
const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INSTANCES_DIR: &str = "spotify_instances";
const DEFAULT_MAX_PLAYLISTS: u64 = 20;
const DEFAULT_MIN_TRACKS: u64 = 3;
const DEFAULT_EXCLUDED_OWNER: &str = "Spotify";
const DEFAULT_CONCURRENCY: u64 = 4;
/// Pochette de remplacement quand une playlist n'a pas d'image
pub const PLACEHOLDER_ART_URL: &str =
    "https://i.scdn.co/image/ab67616d0000b273e0d42912ff2e2569eecff949";

/// Trait d'extension pour gérer la configuration Spotify dans pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmospotify::SpotifyConfigExt;
///
/// let config = get_config();
/// config.set_spotify_client_id("0123456789abcdef")?;
/// println!("Redirect URI: {}", config.get_spotify_redirect_uri());
/// ```
pub trait SpotifyConfigExt {
    /// Client id de l'application Spotify
    ///
    /// # Errors
    ///
    /// Retourne une erreur si le client id n'est pas configuré
    fn get_spotify_client_id(&self) -> Result<String>;

    /// Définit le client id de l'application Spotify
    fn set_spotify_client_id(&self, client_id: &str) -> Result<()>;

    /// URI de retour : `host.base_url` suivi de `accounts.spotify.redirect_path`
    fn get_spotify_redirect_uri(&self) -> String;

    /// Permissions demandées lors de l'autorisation
    fn get_spotify_scope(&self) -> String;

    /// Base du service de comptes
    fn get_spotify_accounts_url(&self) -> String;

    /// Base de la Web API
    fn get_spotify_api_url(&self) -> String;

    /// Timeout appliqué à chaque appel HTTP
    fn get_spotify_http_timeout(&self) -> Duration;

    /// Répertoire racine des instances, créé s'il n'existe pas
    fn get_instances_dir(&self) -> Result<String>;

    /// Définit le répertoire racine des instances
    fn set_instances_dir(&self, directory: String) -> Result<()>;

    /// Nombre maximal d'instances vivantes
    fn get_instances_capacity(&self) -> usize;

    /// Définit le nombre maximal d'instances vivantes
    fn set_instances_capacity(&self, capacity: usize) -> Result<()>;

    /// Longueur du suffixe aléatoire des identifiants
    fn get_instance_id_suffix_length(&self) -> usize;

    /// Nombre maximal de playlists retenues par ingestion
    fn get_ingest_max_playlists(&self) -> usize;

    /// Une playlist doit avoir strictement plus de pistes que ce seuil
    fn get_ingest_min_tracks(&self) -> u64;

    /// Propriétaire dont les playlists sont écartées (contenu éditorial)
    fn get_ingest_excluded_owner(&self) -> String;

    /// Pochette utilisée quand une playlist n'en a pas
    fn get_ingest_placeholder_art_url(&self) -> String;

    /// Nombre de playlists traitées en parallèle
    fn get_ingest_concurrency(&self) -> usize;
}

impl SpotifyConfigExt for Config {
    fn get_spotify_client_id(&self) -> Result<String> {
        match self.get_value(&["accounts", "spotify", "client_id"])? {
            Value::String(s) if !s.is_empty() => Ok(s),
            _ => Err(anyhow!("Spotify client id not configured")),
        }
    }

    fn set_spotify_client_id(&self, client_id: &str) -> Result<()> {
        self.set_value(
            &["accounts", "spotify", "client_id"],
            Value::String(client_id.to_string()),
        )
    }

    fn get_spotify_redirect_uri(&self) -> String {
        let path = self.get_string_or(
            &["accounts", "spotify", "redirect_path"],
            DEFAULT_REDIRECT_PATH,
        );
        if path.starts_with('/') {
            format!("{}{}", self.get_base_url(), path)
        } else {
            format!("{}/{}", self.get_base_url(), path)
        }
    }

    fn get_spotify_scope(&self) -> String {
        self.get_string_or(&["accounts", "spotify", "scope"], DEFAULT_SCOPE)
    }

    fn get_spotify_accounts_url(&self) -> String {
        self.get_string_or(&["accounts", "spotify", "accounts_url"], DEFAULT_ACCOUNTS_URL)
    }

    fn get_spotify_api_url(&self) -> String {
        self.get_string_or(&["accounts", "spotify", "api_url"], DEFAULT_API_URL)
    }

    fn get_spotify_http_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(
            &["accounts", "spotify", "http_timeout_secs"],
            DEFAULT_HTTP_TIMEOUT_SECS,
        ))
    }

    fn get_instances_dir(&self) -> Result<String> {
        self.get_managed_dir(&["instances", "directory"], DEFAULT_INSTANCES_DIR)
    }

    fn set_instances_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(&["instances", "directory"], directory)
    }

    fn get_instances_capacity(&self) -> usize {
        self.get_u64_or(&["instances", "capacity"], DEFAULT_CAPACITY as u64) as usize
    }

    fn set_instances_capacity(&self, capacity: usize) -> Result<()> {
        self.set_u64(&["instances", "capacity"], capacity as u64)
    }

    fn get_instance_id_suffix_length(&self) -> usize {
        self.get_u64_or(
            &["instances", "id_suffix_length"],
            DEFAULT_SUFFIX_LENGTH as u64,
        ) as usize
    }

    fn get_ingest_max_playlists(&self) -> usize {
        self.get_u64_or(&["ingest", "max_playlists"], DEFAULT_MAX_PLAYLISTS) as usize
    }

    fn get_ingest_min_tracks(&self) -> u64 {
        self.get_u64_or(&["ingest", "min_tracks"], DEFAULT_MIN_TRACKS)
    }

    fn get_ingest_excluded_owner(&self) -> String {
        self.get_string_or(&["ingest", "excluded_owner"], DEFAULT_EXCLUDED_OWNER)
    }

    fn get_ingest_placeholder_art_url(&self) -> String {
        self.get_string_or(&["ingest", "placeholder_art_url"], PLACEHOLDER_ART_URL)
    }

    fn get_ingest_concurrency(&self) -> usize {
        self.get_u64_or(&["ingest", "concurrency"], DEFAULT_CONCURRENCY) as usize
    }
}

/// Instantané des paramètres Spotify
///
/// Construit depuis `pmoconfig` en production ; les tests le construisent
/// directement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifySettings {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub accounts_url: String,
    pub api_url: String,
    pub http_timeout: Duration,
    pub instances_dir: PathBuf,
    pub capacity: usize,
    pub id_suffix_length: usize,
    pub max_playlists: usize,
    pub min_tracks: u64,
    pub excluded_owner: String,
    pub placeholder_art_url: String,
    pub ingest_concurrency: usize,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: format!("http://127.0.0.1:5000{}", DEFAULT_REDIRECT_PATH),
            scope: DEFAULT_SCOPE.to_string(),
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            instances_dir: PathBuf::from(DEFAULT_INSTANCES_DIR),
            capacity: DEFAULT_CAPACITY,
            id_suffix_length: DEFAULT_SUFFIX_LENGTH,
            max_playlists: DEFAULT_MAX_PLAYLISTS as usize,
            min_tracks: DEFAULT_MIN_TRACKS,
            excluded_owner: DEFAULT_EXCLUDED_OWNER.to_string(),
            placeholder_art_url: PLACEHOLDER_ART_URL.to_string(),
            ingest_concurrency: DEFAULT_CONCURRENCY as usize,
        }
    }
}

impl SpotifySettings {
    /// Lit tous les paramètres depuis la configuration
    ///
    /// # Errors
    ///
    /// Retourne une erreur si le client id n'est pas configuré ou si le
    /// répertoire des instances ne peut pas être créé.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            client_id: config.get_spotify_client_id()?,
            redirect_uri: config.get_spotify_redirect_uri(),
            scope: config.get_spotify_scope(),
            accounts_url: config.get_spotify_accounts_url(),
            api_url: config.get_spotify_api_url(),
            http_timeout: config.get_spotify_http_timeout(),
            instances_dir: PathBuf::from(config.get_instances_dir()?),
            capacity: config.get_instances_capacity(),
            id_suffix_length: config.get_instance_id_suffix_length(),
            max_playlists: config.get_ingest_max_playlists(),
            min_tracks: config.get_ingest_min_tracks(),
            excluded_owner: config.get_ingest_excluded_owner(),
            placeholder_art_url: config.get_ingest_placeholder_art_url(),
            ingest_concurrency: config.get_ingest_concurrency(),
        })
    }
}
