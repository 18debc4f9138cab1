//! Machine d'états des sessions d'autorisation
//!
//! ```text
//! begin_session ──► Pending ──complete_session──► Authorized
//!                      ▲             │
//!                      └── échec ────┘   (diagnostic dans data/error.json)
//! ```
//!
//! Chaque étape est déclenchée par une requête indépendante : l'état est
//! toujours relu depuis le stockage, jamais gardé en mémoire.

use crate::allocator::InstanceAllocator;
use crate::api::{RawResponse, SpotifyService, api_error_message};
use crate::error::{Result, SpotifyError};
use crate::models::{InstanceId, SessionState, TokenSet};
use crate::pkce::PkceCredential;
use crate::store::{ERROR_FILE, InstanceStore};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Session ouverte : identifiant et URL vers laquelle rediriger l'utilisateur
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BegunSession {
    pub id: InstanceId,
    pub authorization_url: String,
}

/// Pilote le parcours d'autorisation d'une instance
pub struct SessionManager {
    store: Arc<dyn InstanceStore>,
    service: Arc<dyn SpotifyService>,
    allocator: InstanceAllocator,
    /// Sérialise attribution d'identifiant et création de l'enregistrement
    allocation: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        service: Arc<dyn SpotifyService>,
        allocator: InstanceAllocator,
    ) -> Self {
        Self {
            store,
            service,
            allocator,
            allocation: Mutex::new(()),
        }
    }

    pub fn allocator(&self) -> &InstanceAllocator {
        &self.allocator
    }

    /// Ouvre une session : identifiant, paire PKCE, enregistrement `Pending`
    ///
    /// L'identifiant sert de paramètre `state` : c'est lui qui permettra de
    /// retrouver l'instance au retour de l'utilisateur.
    pub async fn begin_session(&self) -> Result<BegunSession> {
        let credential = PkceCredential::generate()?;

        let id = {
            let _guard = self.allocation.lock().await;
            let id = self.allocator.allocate(self.store.as_ref()).await?;
            self.store.create(&id, &credential.verifier).await?;
            id
        };

        let authorization_url = match self
            .service
            .authorization_url(id.as_str(), &credential.challenge)
        {
            Ok(url) => url,
            Err(e) => {
                // Inutile de garder une instance que personne ne pourra compléter
                if let Err(cleanup) = self.store.delete(&id).await {
                    warn!(instance = %id, "Cannot remove unusable instance: {}", cleanup);
                }
                return Err(e);
            }
        };

        info!(instance = %id, "Session started");
        Ok(BegunSession {
            id,
            authorization_url,
        })
    }

    /// Échange le code d'autorisation et enregistre les tokens
    ///
    /// # Errors
    ///
    /// * `SpotifyError::InstanceNotFound` - instance évincée avant le retour de l'utilisateur
    /// * `SpotifyError::TokenExchangeFailed` - l'instance reste `Pending`, la
    ///   réponse brute est archivée dans `data/error.json`
    pub async fn complete_session(&self, id: &InstanceId, code: &str) -> Result<()> {
        let record = self.store.load(id).await?;

        if record.state == SessionState::Authorized {
            debug!(instance = %id, "Session already authorized");
            return Ok(());
        }

        let response = match self.service.exchange_code(code, &record.verifier).await {
            Ok(response) => response,
            Err(e) => {
                let diagnostic = serde_json::json!({
                    "error": "transport_error",
                    "error_description": e.to_string(),
                });
                self.write_diagnostic(id, diagnostic.to_string().as_bytes())
                    .await;
                return Err(SpotifyError::TokenExchangeFailed {
                    instance: id.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let tokens = match parse_token_response(&response) {
            Ok(tokens) => tokens,
            Err(reason) => {
                warn!(instance = %id, status = response.status, "Token exchange rejected: {}", reason);
                self.write_diagnostic(id, response.body.as_bytes()).await;
                return Err(SpotifyError::TokenExchangeFailed {
                    instance: id.to_string(),
                    reason,
                });
            }
        };

        self.store.set_tokens(id, tokens).await?;
        info!(instance = %id, "Session authorized");
        Ok(())
    }

    /// État courant d'une instance
    pub async fn session_state(&self, id: &InstanceId) -> Result<SessionState> {
        Ok(self.store.load(id).await?.state)
    }

    /// Archive une réponse en échec ; un échec d'écriture est seulement journalisé
    async fn write_diagnostic(&self, id: &InstanceId, body: &[u8]) {
        match self.store.write_artifact(id, ERROR_FILE, body).await {
            Ok(()) => info!(instance = %id, "Diagnostic written to {}", ERROR_FILE),
            Err(e) => warn!(instance = %id, "Cannot write diagnostic: {}", e),
        }
    }
}

/// Interprète la réponse de `/api/token`
///
/// Toutes les valeurs sont converties en chaînes ; `access_token` doit être
/// présent et non vide.
pub(crate) fn parse_token_response(response: &RawResponse) -> std::result::Result<TokenSet, String> {
    if !response.is_success() {
        return Err(format!(
            "status {}: {}",
            response.status,
            api_error_message(&response.body)
        ));
    }

    let json: Value = serde_json::from_str(&response.body)
        .map_err(|e| format!("undecodable token response: {}", e))?;
    let Value::Object(map) = json else {
        return Err("token response is not a JSON object".to_string());
    };
    if map.contains_key("error") {
        return Err(api_error_message(&response.body));
    }

    let mut tokens = TokenSet::new();
    for (key, value) in map {
        match value {
            Value::String(s) => {
                tokens.insert(key, s);
            }
            Value::Null => {}
            other => {
                tokens.insert(key, other.to_string());
            }
        }
    }

    match tokens.get("access_token") {
        Some(token) if !token.is_empty() => Ok(tokens),
        _ => Err("missing access_token".to_string()),
    }
}
