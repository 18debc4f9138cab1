//! Interface avec l'étape de rendu (composition de la pochette, graphique)
//!
//! Le rendu lui-même est externe : il reçoit le détail d'une playlist et sa
//! pochette et renvoie des fichiers à ranger dans `playlist{n}/`.

use crate::error::Result;
use crate::models::{InstanceId, PlaylistDescriptor};
use serde_json::Value;

/// Graphique de répartition par décennie
pub const GRAPH_FILE: &str = "graph.jpg";
/// Pochette composée avec le titre et la description
pub const HEADING_FILE: &str = "final_heading.jpg";

/// Données d'entrée du rendu d'une playlist
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub instance: &'a InstanceId,
    pub descriptor: &'a PlaylistDescriptor,
    /// Réponse de `GET /playlists/{id}`
    pub detail: &'a Value,
    /// Octets de la pochette
    pub artwork: &'a [u8],
}

/// Fichier produit par le rendu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// Nom de fichier simple, sans répertoire
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl RenderedArtifact {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Le nom ne doit pas sortir du répertoire de la playlist
    pub fn has_plain_name(&self) -> bool {
        !self.file_name.is_empty()
            && !self.file_name.contains(['/', '\\'])
            && self.file_name != "."
            && self.file_name != ".."
    }
}

/// Étape de rendu, fonction pure des données de la playlist
pub trait PlaylistRenderer: Send + Sync {
    fn render(&self, input: &RenderInput<'_>) -> Result<Vec<RenderedArtifact>>;
}

/// Rendu vide : seuls le détail et la pochette sont archivés
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

impl PlaylistRenderer for NoopRenderer {
    fn render(&self, _input: &RenderInput<'_>) -> Result<Vec<RenderedArtifact>> {
        Ok(Vec::new())
    }
}
