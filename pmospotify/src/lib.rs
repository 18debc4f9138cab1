//! # pmospotify - Sessions de rapport de playlists Spotify
//!
//! Cette crate gère le parcours complet d'un rapport de playlists : autorisation
//! OAuth 2.0 avec PKCE, cycle de vie des instances utilisateur à capacité
//! bornée et ingestion des playlists vers un stockage durable.
//!
//! ## Vue d'ensemble
//!
//! - Attribution d'identifiants `"<séquence>_<aléa>"` avec éviction de
//!   l'instance la plus ancienne quand la capacité est atteinte
//! - Génération des paires verifier / challenge PKCE (S256)
//! - Machine d'états `Pending` → `Authorized` persistée par instance
//! - Sélection des playlists (hors contenu éditorial, plus de 3 pistes, 20 au
//!   plus) et archivage de leurs artefacts
//!
//! ## Architecture
//!
//! - [`ReportSessions`] : façade utilisée par la couche de routes
//! - `session` : ouverture et complétion des sessions d'autorisation
//! - `ingest` : sélection et traitement des playlists
//! - `store` : stockage des instances (disque ou mémoire)
//! - `api` : accès aux API Spotify via `reqwest`
//! - `config_ext` : intégration avec `pmoconfig`
//!
//! ## Structure des modules
//!
//! ```text
//! pmospotify/
//! ├── src/
//! │   ├── lib.rs              # Module principal (ce fichier)
//! │   ├── report.rs           # Façade ReportSessions
//! │   ├── session.rs          # Machine d'états d'autorisation
//! │   ├── ingest.rs           # Pipeline d'ingestion
//! │   ├── allocator.rs        # Attribution d'identifiants et éviction
//! │   ├── pkce.rs             # Verifier / challenge PKCE
//! │   ├── models.rs           # Structures de données
//! │   ├── render.rs           # Interface de rendu
//! │   ├── store/
//! │   │   ├── mod.rs          # Trait InstanceStore
//! │   │   ├── fs.rs           # Stockage sur disque
//! │   │   └── memory.rs       # Stockage en mémoire
//! │   ├── api/
//! │   │   ├── mod.rs          # Client API
//! │   │   ├── auth.rs         # Autorisation et échange de code
//! │   │   └── playlists.rs    # Playlists et pochettes
//! │   ├── config_ext.rs       # Extension pmoconfig
//! │   └── error.rs            # Gestion des erreurs
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmospotify::{InstanceId, ReportSessions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sessions = ReportSessions::from_config()?;
//!
//!     // Rediriger l'utilisateur vers l'URL d'autorisation
//!     let begun = sessions.begin_session().await?;
//!     println!("{}", begun.authorization_url);
//!
//!     // Au retour : `state` contient l'identifiant, `code` le code d'autorisation
//!     let id = InstanceId::from_raw("1_AbCdEfGh12");
//!     let report = sessions.generate_review(&id, "code-from-callback").await?;
//!     println!("{} playlist(s) rendue(s)", report.rendered.len());
//!
//!     for path in sessions.list_rendered_artifact_paths(&id).await? {
//!         println!("{}", path);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Gestion des erreurs
//!
//! ```rust,ignore
//! use pmospotify::SpotifyError;
//!
//! match sessions.complete_session(&id, code).await {
//!     Ok(()) => println!("Authorized"),
//!     Err(SpotifyError::InstanceNotFound(_)) => println!("Session expired, start again"),
//!     Err(SpotifyError::TokenExchangeFailed { .. }) => println!("See data/error.json"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

pub mod allocator;
pub mod api;
pub mod config_ext;
pub mod error;
pub mod ingest;
pub mod models;
pub mod pkce;
pub mod render;
pub mod report;
pub mod session;
pub mod store;

pub use allocator::InstanceAllocator;
pub use api::{RawResponse, SpotifyApi, SpotifyService};
pub use config_ext::{SpotifyConfigExt, SpotifySettings};
pub use error::{Result, SpotifyError};
pub use ingest::{IngestPipeline, IngestPolicy, select_playlists};
pub use models::{
    IngestReport, InstanceId, InstanceRecord, PlaylistDescriptor, SessionState, TokenSet,
};
pub use pkce::PkceCredential;
pub use render::{NoopRenderer, PlaylistRenderer, RenderInput, RenderedArtifact};
pub use report::ReportSessions;
pub use session::{BegunSession, SessionManager};
pub use store::{FsInstanceStore, InstanceStore, MemoryInstanceStore};
