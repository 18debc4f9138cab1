//! Génération des paires verifier/challenge PKCE (RFC 7636, méthode S256)
//!
//! Le verifier est un secret partagé entre ce serveur et l'endpoint de token :
//! il est tiré d'un générateur cryptographique initialisé depuis l'entropie
//! du système, jamais d'un générateur rapide non cryptographique.

use crate::error::{Result, SpotifyError};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// Longueur minimale du verifier
pub const VERIFIER_MIN_LEN: usize = 43;
/// Longueur maximale du verifier
pub const VERIFIER_MAX_LEN: usize = 126;

/// Paire verifier/challenge liée à une instance
#[derive(Clone, PartialEq, Eq)]
pub struct PkceCredential {
    pub verifier: String,
    pub challenge: String,
}

// Le verifier ne doit pas apparaître dans les logs
impl std::fmt::Debug for PkceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceCredential")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

impl PkceCredential {
    /// Génère une nouvelle paire
    ///
    /// # Errors
    ///
    /// * `SpotifyError::EntropyUnavailable` - le système ne fournit pas d'aléa
    pub fn generate() -> Result<Self> {
        let mut rng = secure_rng()?;
        let length = rng.random_range(VERIFIER_MIN_LEN..=VERIFIER_MAX_LEN);
        let verifier = alphanumeric(&mut rng, length);
        let challenge = challenge_for(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }

    /// Vérifie que le challenge correspond bien au verifier
    pub fn verify(&self) -> bool {
        verify(&self.verifier, &self.challenge)
    }
}

/// `base64url_nopad(SHA-256(verifier))`
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Vérifie une paire verifier/challenge
pub fn verify(verifier: &str, challenge: &str) -> bool {
    challenge_for(verifier) == challenge
}

/// Générateur cryptographique initialisé depuis l'entropie du système
pub(crate) fn secure_rng() -> Result<StdRng> {
    StdRng::try_from_os_rng().map_err(|e| SpotifyError::EntropyUnavailable(e.to_string()))
}

/// Chaîne de `length` caractères `[A-Za-z0-9]`
pub(crate) fn alphanumeric<R: Rng>(rng: &mut R, length: usize) -> String {
    rng.sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Suffixe aléatoire d'un identifiant d'instance
pub(crate) fn random_suffix(length: usize) -> Result<String> {
    let mut rng = secure_rng()?;
    Ok(alphanumeric(&mut rng, length))
}
