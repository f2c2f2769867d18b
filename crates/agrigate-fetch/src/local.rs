use std::path::PathBuf;

use agrigate_core::{ArtifactId, ArtifactSource, FetchError};
use async_trait::async_trait;
use tracing::debug;

/// Serves artifacts straight from a directory tree laid out like the hub
/// repository (`<root>/flood/flood_rf.json`, ...).
pub struct LocalDirSource {
    root: PathBuf,
}

impl LocalDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactSource for LocalDirSource {
    async fn fetch(&self, id: &ArtifactId) -> Result<PathBuf, FetchError> {
        let path = self.root.join(id.as_path());
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                debug!(artifact = %id, path = %path.display(), "local artifact");
                Ok(path)
            }
            Ok(_) => Err(FetchError::NotFound(id.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(id.to_string()))
            }
            Err(e) => Err(FetchError::Io(e)),
        }
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}
