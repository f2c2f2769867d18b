//! HTTP client for a Hugging Face style model hub.
//!
//! Files resolve at `{base_url}/{repo_id}/resolve/{revision}/{path}` and are
//! cached under `{cache_dir}/{repo_id with '/' → '--'}/{path}`. A cached file
//! is served without touching the network.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agrigate_core::{ArtifactId, ArtifactSource, FetchError, GatewayConfig};
use async_trait::async_trait;
use tracing::{debug, info};

pub struct HubFetcher {
    client: reqwest::Client,
    base_url: String,
    repo_id: String,
    revision: String,
    cache_dir: PathBuf,
    timeout_secs: u64,
}

impl HubFetcher {
    pub fn new(config: &GatewayConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| FetchError::Transport(Box::new(e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            repo_id: config.repo_id.clone(),
            revision: config.revision.clone(),
            cache_dir: config.cache_dir.clone(),
            timeout_secs: config.fetch_timeout_secs,
        })
    }

    pub fn url_for(&self, id: &ArtifactId) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.base_url, self.repo_id, self.revision, id
        )
    }

    pub fn cache_path(&self, id: &ArtifactId) -> PathBuf {
        self.cache_dir
            .join(self.repo_id.replace('/', "--"))
            .join(id.as_path())
    }

    fn map_transport(&self, id: &ArtifactId, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                id: id.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Transport(Box::new(e))
        }
    }

    async fn download(&self, id: &ArtifactId, dest: &Path) -> Result<(), FetchError> {
        let url = self.url_for(id);
        info!(url = %url, "downloading artifact");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport(id, e))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await.map_err(|e| self.map_transport(id, e))?;

        let dest = dest.to_path_buf();
        let size = bytes.len();
        tokio::task::spawn_blocking(move || write_atomic(&dest, &bytes))
            .await
            .map_err(|e| FetchError::Io(std::io::Error::other(e)))??;
        info!(artifact = %id, bytes = size, "cached artifact");
        Ok(())
    }
}

/// Write via a temp file in the destination directory, then rename, so
/// readers never observe a partial file and concurrent writers of the same
/// key both leave a complete one.
fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    let parent = dest
        .parent()
        .ok_or_else(|| FetchError::InvalidId(dest.display().to_string()))?;
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| FetchError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl ArtifactSource for HubFetcher {
    async fn fetch(&self, id: &ArtifactId) -> Result<PathBuf, FetchError> {
        let path = self.cache_path(id);
        if tokio::fs::try_exists(&path).await? {
            debug!(artifact = %id, "cache hit");
            return Ok(path);
        }
        self.download(id, &path).await?;
        Ok(path)
    }

    fn describe(&self) -> String {
        format!("{}/{}@{}", self.base_url, self.repo_id, self.revision)
    }
}
