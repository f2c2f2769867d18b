use agrigate_core::{ConfigError, Domain};
use thiserror::Error;

use crate::pipeline::FallbackReason;

/// Failure inside a single predictor call or artifact load.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    Width { expected: usize, actual: usize },

    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("{0} is not supported by this predictor")]
    Unsupported(&'static str),

    #[error("predictor returned no output")]
    EmptyOutput,

    #[error("malformed artifact: {0}")]
    Malformed(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "onnx")]
    #[error("onnx runtime error: {0}")]
    Onnx(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no models could be loaded ({attempted} artifacts attempted)")]
    NoModelsAvailable { attempted: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum InferError {
    /// Model-required domain with no usable model.
    #[error("{domain} prediction unavailable: {reason}")]
    ServiceUnavailable {
        domain: Domain,
        reason: FallbackReason,
    },
}
