//! Gateway configuration with layered loading.
//!
//! Priority (highest to lowest):
//! 1. `AGRIGATE_` environment variables (`__` separates nested keys)
//! 2. Explicit config path (if provided)
//! 3. `./agrigate.toml`
//! 4. Built-in defaults

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::artifact::{ArtifactId, FetchError};
use crate::domain::{Domain, DomainParseError};

pub const PROJECT_CONFIG_FILE: &str = "agrigate.toml";
pub const ENV_PREFIX: &str = "AGRIGATE_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("config error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("artifacts table: {0}")]
    UnknownDomain(#[from] DomainParseError),

    #[error("artifacts table: {0}")]
    InvalidArtifact(#[from] FetchError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Repository holding every artifact.
    pub repo_id: String,
    pub revision: String,
    pub base_url: String,
    /// Local download cache root.
    pub cache_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    /// Maximum artifact downloads in flight during `load_all`.
    pub fetch_concurrency: usize,
    pub predict_timeout_ms: u64,
    /// domain → component role → artifact path.
    pub artifacts: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            repo_id: "crimson1232/dhartisetu-ml-models".into(),
            revision: "main".into(),
            base_url: "https://huggingface.co".into(),
            cache_dir: PathBuf::from("hf_models"),
            fetch_timeout_secs: 60,
            fetch_concurrency: 4,
            predict_timeout_ms: 2000,
            artifacts: default_artifacts(),
        }
    }
}

fn default_artifacts() -> BTreeMap<String, BTreeMap<String, String>> {
    let table: &[(&str, &[(&str, &str)])] = &[
        (
            "aqi",
            &[("model", "aqi/aqi_xgb.json"), ("encoder", "aqi/city_encoder.json")],
        ),
        (
            "co2",
            &[("model", "co2/co2_model.json"), ("scaler", "co2/co2_scaler.json")],
        ),
        (
            "crop",
            &[
                ("model", "crop/crop_xgboost.json"),
                ("scaler", "crop/crop_scaler.json"),
                ("encoder", "crop/crop_label_encoder.json"),
            ],
        ),
        (
            "flood",
            &[
                ("model", "flood/flood_rf.json"),
                ("encoders", "flood/flood_encoders.json"),
            ],
        ),
        ("ndvi", &[("model", "ndvi/ndvi_rf.json")]),
        (
            "plant_disease",
            &[
                ("model", "plant_disease/plant_disease.onnx"),
                ("labels", "plant_disease/labels.json"),
            ],
        ),
        (
            "price",
            &[
                ("model", "price/crop_price_xgb.json"),
                ("encoders", "price/price_encoders.json"),
            ],
        ),
        (
            "profit",
            &[
                ("model", "profit/crop_profit_model.json"),
                ("encoders", "profit/profit_encoders.json"),
            ],
        ),
        (
            "rainfall",
            &[
                ("model", "rainfall/rainfall_rf.json"),
                ("encoder", "rainfall/subdivision_encoder.json"),
            ],
        ),
        ("soil_type", &[("model", "soil/soil_model.onnx")]),
        (
            "soil_health",
            &[
                ("model", "soil_health/soil_health_xgb.json"),
                ("scaler", "soil_health/scaler.json"),
                ("encoder", "soil_health/label_encoder.json"),
            ],
        ),
        (
            "storm",
            &[
                ("model", "storm/storm_rf.json"),
                ("encoders", "storm/storm_encoders.json"),
            ],
        ),
        ("water", &[("model", "water/water_rf.json")]),
        (
            "yield",
            &[
                ("model", "yield/yield_xgb.json"),
                ("encoders", "yield/label_encoders.json"),
            ],
        ),
    ];

    table
        .iter()
        .map(|(domain, components)| {
            let components = components
                .iter()
                .map(|(role, path)| (role.to_string(), path.to_string()))
                .collect();
            (domain.to_string(), components)
        })
        .collect()
}

impl GatewayConfig {
    /// Load configuration from all sources.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let project = Path::new(PROJECT_CONFIG_FILE);
        if project.exists() {
            debug!(path = %project.display(), "merging project config");
            figment = figment.merge(Toml::file(project));
        }

        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            debug!(path = %path.display(), "merging explicit config");
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        figment.extract().map_err(|e| ConfigError::Figment(Box::new(e)))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn predict_timeout(&self) -> Duration {
        Duration::from_millis(self.predict_timeout_ms)
    }

    /// Every configured (domain, role, artifact) triple, validated.
    ///
    /// An empty artifact path disables that component.
    pub fn artifact_triples(&self) -> Result<Vec<(Domain, String, ArtifactId)>, ConfigError> {
        let mut triples = Vec::new();
        for (domain, components) in &self.artifacts {
            let domain: Domain = domain.parse()?;
            for (role, path) in components {
                if path.trim().is_empty() {
                    continue;
                }
                triples.push((domain, role.clone(), ArtifactId::new(path.as_str())?));
            }
        }
        Ok(triples)
    }
}
