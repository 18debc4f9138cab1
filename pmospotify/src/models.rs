//! Structures de données des instances et des playlists

use crate::error::{Result, SpotifyError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::collections::BTreeMap;
use std::fmt;

/// Séparateur entre le numéro de séquence et le suffixe aléatoire
pub const ID_SEPARATOR: char = '_';

/// Tokens renvoyés par l'endpoint `/api/token`, valeurs converties en chaînes
pub type TokenSet = BTreeMap<String, String>;

/// Identifiant opaque d'une instance : `"<sequence>_<random>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Compose un identifiant depuis sa séquence et son suffixe aléatoire
    pub fn new(sequence: u64, suffix: &str) -> Self {
        Self(format!("{}{}{}", sequence, ID_SEPARATOR, suffix))
    }

    /// Enveloppe une valeur brute (paramètre `state`, nom de répertoire...)
    ///
    /// Aucune validation n'est faite ici : un identifiant inconnu ou mal
    /// formé sera simplement introuvable dans le stockage.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numéro de séquence (préfixe avant le premier `_`)
    pub fn sequence(&self) -> Result<u64> {
        let prefix = self
            .0
            .split_once(ID_SEPARATOR)
            .map(|(prefix, _)| prefix)
            .unwrap_or(&self.0);
        prefix
            .parse::<u64>()
            .map_err(|_| SpotifyError::MalformedInstanceId(self.0.clone()))
    }

    /// Vrai si l'identifiant peut servir de nom de répertoire sans risque
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == ID_SEPARATOR || c == '-')
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Étape du parcours d'autorisation, persistée explicitement dans l'enregistrement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Verifier stocké, en attente du retour de l'utilisateur
    Pending,
    /// Code échangé, tokens présents
    Authorized,
}

/// Enregistrement persistant d'une instance (`data/instance_data.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: InstanceId,
    /// Verifier PKCE, ne quitte jamais le serveur
    #[serde(rename = "code_verifier")]
    pub verifier: String,
    #[serde(default)]
    pub tokens: TokenSet,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl InstanceRecord {
    /// Nouvel enregistrement en attente d'autorisation
    pub fn pending(id: InstanceId, verifier: impl Into<String>) -> Self {
        Self {
            id,
            verifier: verifier.into(),
            tokens: TokenSet::new(),
            state: SessionState::Pending,
            created_at: Utc::now(),
        }
    }

    /// Token d'accès, uniquement pour une instance autorisée
    pub fn access_token(&self) -> Option<&str> {
        match self.state {
            SessionState::Authorized => self
                .tokens
                .get("access_token")
                .map(String::as_str)
                .filter(|t| !t.is_empty()),
            SessionState::Pending => None,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.access_token().is_some()
    }
}

/// Playlist retenue pour le rapport (`data/playlist_data.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistDescriptor {
    pub name: String,
    pub description: String,
    pub link_id: String,
    pub playlist_number: usize,
    pub art_url: String,
}

impl PlaylistDescriptor {
    /// Sous-répertoire des artefacts de cette playlist
    pub fn directory(&self) -> String {
        playlist_dir(self.playlist_number)
    }
}

/// Nom du sous-répertoire `playlist{n}`
pub fn playlist_dir(number: usize) -> String {
    format!("playlist{}", number)
}

/// Page renvoyée par `GET /me/playlists`
///
/// Les entrées restent brutes : une entrée mal formée est écartée
/// individuellement par le filtre, sans invalider la page.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistPage {
    pub items: Vec<serde_json::Value>,
}

/// Vue typée d'une entrée de `/me/playlists`
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner: PlaylistOwner,
    pub tracks: TrackCount,
    #[serde(default)]
    pub images: Option<Vec<Image>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistOwner {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackCount {
    #[serde(deserialize_with = "deserialize_track_total")]
    pub total: u64,
}

/// Accepte un entier, un flottant positif (tronqué) ou une chaîne numérique
fn deserialize_track_total<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Integer(u64),
        Float(f64),
        Text(String),
    }

    let from_float = |f: f64| (f.is_finite() && f >= 0.0).then_some(f as u64);

    let total = match Total::deserialize(deserializer)? {
        Total::Integer(n) => Some(n),
        Total::Float(f) => from_float(f),
        Total::Text(text) => {
            let text = text.trim();
            text.parse::<u64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(from_float))
        }
    };
    total.ok_or_else(|| de::Error::custom("track total is not a non-negative number"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    pub url: String,
}

/// Bilan d'une ingestion : playlists rendues et playlists ignorées
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub selected: usize,
    pub rendered: Vec<usize>,
    pub failed: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_sequence() {
        let id = InstanceId::new(12, "AbCdEfGh12");
        assert_eq!(id.as_str(), "12_AbCdEfGh12");
        assert_eq!(id.sequence().unwrap(), 12);

        // Seul le premier séparateur compte
        assert_eq!(InstanceId::from_raw("3_a_b").sequence().unwrap(), 3);
        assert_eq!(InstanceId::from_raw("0").sequence().unwrap(), 0);
    }

    #[test]
    fn test_malformed_instance_id() {
        let err = InstanceId::from_raw("abc_123").sequence().unwrap_err();
        assert!(matches!(err, SpotifyError::MalformedInstanceId(ref s) if s == "abc_123"));
        assert!(InstanceId::from_raw("-1_x").sequence().is_err());
    }

    #[test]
    fn test_path_safety() {
        assert!(InstanceId::new(1, "abc").is_path_safe());
        assert!(!InstanceId::from_raw("../etc").is_path_safe());
        assert!(!InstanceId::from_raw("").is_path_safe());
        assert!(!InstanceId::from_raw("1_a/b").is_path_safe());
    }

    #[test]
    fn test_access_token_requires_authorized_state() {
        let mut record = InstanceRecord::pending(InstanceId::new(1, "x"), "verifier");
        record
            .tokens
            .insert("access_token".into(), "token".into());
        assert_eq!(record.access_token(), None);

        record.state = SessionState::Authorized;
        assert_eq!(record.access_token(), Some("token"));
    }

    #[test]
    fn test_record_json_layout() {
        let record = InstanceRecord::pending(InstanceId::new(4, "abc"), "v");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "4_abc");
        assert_eq!(json["code_verifier"], "v");
        assert_eq!(json["state"], "pending");
        assert!(json["tokens"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_track_total_accepts_numeric_forms() {
        let total = |v: serde_json::Value| {
            serde_json::from_value::<TrackCount>(serde_json::json!({ "total": v }))
                .map(|t| t.total)
        };

        assert_eq!(total(serde_json::json!(12)).unwrap(), 12);
        assert_eq!(total(serde_json::json!(12.0)).unwrap(), 12);
        assert_eq!(total(serde_json::json!(7.9)).unwrap(), 7);
        assert_eq!(total(serde_json::json!("42")).unwrap(), 42);
        assert_eq!(total(serde_json::json!(" 6.0 ")).unwrap(), 6);

        for rejected in [
            serde_json::json!("ten"),
            serde_json::json!(-3),
            serde_json::json!("-1"),
            serde_json::json!(null),
            serde_json::json!(true),
            serde_json::json!([5]),
        ] {
            assert!(total(rejected.clone()).is_err(), "{}", rejected);
        }
    }
}
