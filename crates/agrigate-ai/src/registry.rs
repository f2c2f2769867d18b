//! Model registry: materializes every configured bundle once, then serves
//! read-only lookups.
//!
//! A failure on one artifact never aborts the load. It only leaves that
//! component's slot absent, and the pipeline falls back for whatever the
//! slot would have served. The load is fatal only when nothing at all
//! could be loaded.

use std::collections::BTreeMap;
use std::sync::Arc;

use agrigate_core::{ArtifactId, ArtifactSource, Domain, GatewayConfig};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::{ModelError, RegistryError};
use crate::loader::{Loaded, load_artifact, unsupported_reason};
use crate::predictor::{ModelBundle, Predictor};

/// Domain → bundle. Every known domain has an entry, possibly empty.
#[derive(Debug, Clone)]
pub struct Catalog {
    bundles: BTreeMap<Domain, Arc<ModelBundle>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            bundles: Domain::ALL
                .into_iter()
                .map(|d| (d, Arc::new(ModelBundle::new())))
                .collect(),
        }
    }
}

impl Catalog {
    pub fn with_bundle(mut self, domain: Domain, bundle: ModelBundle) -> Self {
        self.bundles.insert(domain, Arc::new(bundle));
        self
    }

    pub fn predictor_count(&self) -> usize {
        self.bundles.values().map(|b| b.len()).sum()
    }
}

/// What happened to each configured artifact during `load_all`.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<ComponentRef>,
    pub unsupported: Vec<SkippedComponent>,
    pub failed: Vec<SkippedComponent>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentRef {
    pub domain: Domain,
    pub role: String,
    pub artifact: ArtifactId,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedComponent {
    #[serde(flatten)]
    pub component: ComponentRef,
    pub reason: String,
}

enum Outcome {
    Ready(Arc<dyn Predictor>),
    Unsupported(String),
    Failed(String),
}

pub struct Registry {
    source: Option<Arc<dyn ArtifactSource>>,
    triples: Vec<(Domain, String, ArtifactId)>,
    concurrency: usize,
    state: OnceCell<(Catalog, LoadReport)>,
}

impl Registry {
    pub fn new(
        config: &GatewayConfig,
        source: Arc<dyn ArtifactSource>,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            source: Some(source),
            triples: config.artifact_triples()?,
            concurrency: config.fetch_concurrency.max(1),
            state: OnceCell::new(),
        })
    }

    /// Registry over an already built catalog. `load_all` is a no-op.
    pub fn from_catalog(catalog: Catalog) -> Self {
        let report = LoadReport {
            loaded: Vec::new(),
            unsupported: Vec::new(),
            failed: Vec::new(),
            finished_at: Utc::now(),
        };
        Self {
            source: None,
            triples: Vec::new(),
            concurrency: 1,
            state: OnceCell::new_with(Some((catalog, report))),
        }
    }

    /// Fetch and deserialize every configured artifact, once.
    ///
    /// Later calls return the first successful report without touching the
    /// source. A `NoModelsAvailable` failure leaves the registry unloaded.
    pub async fn load_all(&self) -> Result<&LoadReport, RegistryError> {
        let (_, report) = self.state.get_or_try_init(|| self.populate()).await?;
        Ok(report)
    }

    pub fn is_loaded(&self) -> bool {
        self.state.initialized()
    }

    async fn populate(&self) -> Result<(Catalog, LoadReport), RegistryError> {
        let attempted = self.triples.len();
        let Some(source) = self.source.clone() else {
            return Err(RegistryError::NoModelsAvailable { attempted });
        };
        info!(source = %source.describe(), artifacts = attempted, "loading model catalog");

        let results: Vec<_> = stream::iter(self.triples.iter().cloned())
            .map(|(domain, role, id)| {
                let source = source.clone();
                async move {
                    let outcome = load_one(source.as_ref(), &id).await;
                    (
                        ComponentRef {
                            domain,
                            role,
                            artifact: id,
                        },
                        outcome,
                    )
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut bundles: BTreeMap<Domain, ModelBundle> = BTreeMap::new();
        let mut report = LoadReport {
            loaded: Vec::new(),
            unsupported: Vec::new(),
            failed: Vec::new(),
            finished_at: Utc::now(),
        };

        for (component, outcome) in results {
            match outcome {
                Outcome::Ready(predictor) => {
                    info!(
                        domain = %component.domain,
                        role = %component.role,
                        kind = predictor.kind().as_str(),
                        "loaded component"
                    );
                    bundles
                        .entry(component.domain)
                        .or_default()
                        .insert(component.role.clone(), predictor);
                    report.loaded.push(component);
                }
                Outcome::Unsupported(reason) => {
                    warn!(
                        domain = %component.domain,
                        role = %component.role,
                        artifact = %component.artifact,
                        %reason,
                        "unsupported artifact format, slot left empty"
                    );
                    report.unsupported.push(SkippedComponent { component, reason });
                }
                Outcome::Failed(reason) => {
                    warn!(
                        domain = %component.domain,
                        role = %component.role,
                        artifact = %component.artifact,
                        %reason,
                        "failed to load component"
                    );
                    report.failed.push(SkippedComponent { component, reason });
                }
            }
        }

        let catalog = bundles
            .into_iter()
            .fold(Catalog::default(), |c, (d, b)| c.with_bundle(d, b));
        if catalog.predictor_count() == 0 {
            return Err(RegistryError::NoModelsAvailable { attempted });
        }

        report.finished_at = Utc::now();
        info!(
            loaded = report.loaded.len(),
            unsupported = report.unsupported.len(),
            failed = report.failed.len(),
            "model catalog ready"
        );
        Ok((catalog, report))
    }

    fn catalog(&self) -> Option<&Catalog> {
        self.state.get().map(|(c, _)| c)
    }

    /// Every component of a domain. `None` before a successful load.
    pub fn get_all(&self, domain: Domain) -> Option<Arc<ModelBundle>> {
        self.catalog()?.bundles.get(&domain).cloned()
    }

    pub fn get(&self, domain: Domain, role: &str) -> Option<Arc<dyn Predictor>> {
        self.catalog()?.bundles.get(&domain)?.get(role).cloned()
    }

    pub fn model(&self, domain: Domain) -> Option<Arc<dyn Predictor>> {
        self.get(domain, "model")
    }

    /// Present component roles per domain, in domain order.
    pub fn summary(&self) -> Vec<(Domain, Vec<String>)> {
        let Some(catalog) = self.catalog() else {
            return Vec::new();
        };
        catalog
            .bundles
            .iter()
            .map(|(d, b)| (*d, b.roles().map(String::from).collect()))
            .collect()
    }
}

async fn load_one(source: &dyn ArtifactSource, id: &ArtifactId) -> Outcome {
    if let Some(reason) = unsupported_reason(id) {
        return Outcome::Unsupported(reason);
    }
    let path = match source.fetch(id).await {
        Ok(path) => path,
        Err(e) => return Outcome::Failed(e.to_string()),
    };

    let id = id.clone();
    let loaded = tokio::task::spawn_blocking(move || load_artifact(&id, &path))
        .await
        .map_err(|e| ModelError::Other(format!("loader task failed: {e}")));

    match loaded {
        Ok(Ok(Loaded::Ready(p))) => Outcome::Ready(p),
        Ok(Ok(Loaded::Unsupported(why))) => Outcome::Unsupported(why),
        Ok(Err(e)) | Err(e) => Outcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use agrigate_core::FetchError;
    use async_trait::async_trait;

    /// Serves artifacts from a directory and counts fetches.
    struct DirSource {
        root: PathBuf,
        fetches: AtomicUsize,
    }

    impl DirSource {
        fn new(root: &Path) -> Arc<Self> {
            Arc::new(Self {
                root: root.to_path_buf(),
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ArtifactSource for DirSource {
        async fn fetch(&self, id: &ArtifactId) -> Result<PathBuf, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let path = self.root.join(id.as_path());
            if path.exists() {
                Ok(path)
            } else {
                Err(FetchError::NotFound(id.to_string()))
            }
        }

        fn describe(&self) -> String {
            format!("dir {}", self.root.display())
        }
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn config(artifacts: &[(&str, &str, &str)]) -> GatewayConfig {
        let mut config = GatewayConfig {
            artifacts: BTreeMap::new(),
            ..GatewayConfig::default()
        };
        for (domain, role, path) in artifacts {
            config
                .artifacts
                .entry(domain.to_string())
                .or_default()
                .insert(role.to_string(), path.to_string());
        }
        config
    }

    const LINEAR: &str = r#"{"type": "linear_regression", "coefficients": [1.0, 1.0, 1.0]}"#;

    #[tokio::test]
    async fn partial_load_leaves_failed_slots_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ndvi/ndvi.json", LINEAR);
        write(dir.path(), "crop/broken.json", "{oops");
        let config = config(&[
            ("ndvi", "model", "ndvi/ndvi.json"),
            ("aqi", "model", "aqi/missing.json"),
            ("crop", "model", "crop/broken.json"),
            ("yield", "model", "yield/yield_xgb.pkl"),
        ]);
        let registry = Registry::new(&config, DirSource::new(dir.path())).unwrap();

        let report = registry.load_all().await.unwrap();
        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.unsupported.len(), 1);
        assert_eq!(report.unsupported[0].component.domain, Domain::Yield);

        assert!(registry.model(Domain::Ndvi).is_some());
        assert!(registry.model(Domain::Aqi).is_none());
        assert!(registry.get_all(Domain::Crop).unwrap().is_empty());
        // Every domain has an entry after load, even unconfigured ones.
        assert!(registry.get_all(Domain::Storm).is_some());
        assert_eq!(registry.summary().len(), Domain::ALL.len());
    }

    #[tokio::test]
    async fn nothing_loaded_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&[("aqi", "model", "aqi/missing.json")]);
        let registry = Registry::new(&config, DirSource::new(dir.path())).unwrap();

        let err = registry.load_all().await.unwrap_err();
        assert!(matches!(err, RegistryError::NoModelsAvailable { attempted: 1 }));
        assert!(!registry.is_loaded());
        assert!(registry.get_all(Domain::Aqi).is_none());
    }

    #[tokio::test]
    async fn unsupported_formats_are_never_fetched() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ndvi/ndvi.json", LINEAR);
        let source = DirSource::new(dir.path());
        let config = config(&[
            ("ndvi", "model", "ndvi/ndvi.json"),
            ("yield", "model", "yield/yield_xgb.pkl"),
            ("plant_disease", "model", "plant_disease/plant_disease.h5"),
        ]);
        let registry = Registry::new(&config, source.clone()).unwrap();

        let report = registry.load_all().await.unwrap();
        assert_eq!(report.unsupported.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_load_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ndvi/ndvi.json", LINEAR);
        let source = DirSource::new(dir.path());
        let config = config(&[("ndvi", "model", "ndvi/ndvi.json")]);
        let registry = Registry::new(&config, source.clone()).unwrap();

        registry.load_all().await.unwrap();
        registry.load_all().await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lookups_before_load_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&[("ndvi", "model", "ndvi/ndvi.json")]);
        let registry = Registry::new(&config, DirSource::new(dir.path())).unwrap();
        assert!(registry.get(Domain::Ndvi, "model").is_none());
        assert!(registry.summary().is_empty());
    }

    #[tokio::test]
    async fn prebuilt_catalog_skips_loading() {
        let model = crate::graph::ObjectGraph::from_slice(LINEAR.as_bytes())
            .unwrap()
            .into_predictor()
            .unwrap();
        let catalog = Catalog::default().with_bundle(Domain::Ndvi, ModelBundle::new().with("model", model));
        let registry = Registry::from_catalog(catalog);
        assert!(registry.is_loaded());
        assert!(registry.load_all().await.unwrap().loaded.is_empty());
        assert_eq!(registry.model(Domain::Ndvi).unwrap().expected_width(), Some(3));
    }
}
