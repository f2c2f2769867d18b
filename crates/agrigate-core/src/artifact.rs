//! Artifact identifiers and the source trait the registry pulls bytes through.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path of one file in the artifact store, e.g. `"flood/flood_rf.json"`.
///
/// Always relative and never escapes the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Result<Self, FetchError> {
        let id = id.into();
        let path = Path::new(&id);
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if id.trim().is_empty() || escapes {
            return Err(FetchError::InvalidId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Deserializer family, from the file extension.
    pub fn kind(&self) -> ArtifactKind {
        let ext = self
            .as_path()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => ArtifactKind::ObjectGraph,
            "onnx" => ArtifactKind::NeuralNetwork,
            _ => ArtifactKind::Unsupported(ext),
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = FetchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Structured object graph serialized as JSON.
    ObjectGraph,
    /// Neural network container (ONNX).
    NeuralNetwork,
    /// Recognized but not loadable here (`pkl`, `h5`, ...).
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("fetching {id} timed out after {secs}s")]
    Timeout { id: String, secs: u64 },

    #[error("artifact store returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid artifact id '{0}'")]
    InvalidId(String),
}

/// Somewhere artifacts can be materialized from.
///
/// `fetch` returns a local path to the artifact's bytes. Implementations
/// must be safe to call concurrently for distinct ids, and idempotent for
/// the same id.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn fetch(&self, id: &ArtifactId) -> Result<PathBuf, FetchError>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}
