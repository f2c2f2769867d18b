//! Inference layer: artifact deserialization, the model registry, feature
//! adaptation and the fallback-aware prediction pipeline.

pub mod adapter;
mod error;
pub mod graph;
pub mod loader;
#[cfg(feature = "onnx")]
mod onnx;
pub mod pipeline;
pub mod predictor;
pub mod registry;

pub use adapter::{FeatureVector, build_features};
pub use error::{InferError, ModelError, RegistryError};
#[cfg(feature = "onnx")]
pub use onnx::OnnxPredictor;
pub use pipeline::{FallbackReason, InferencePath, Pipeline, Prediction, RankedClass};
pub use predictor::{ModelBundle, Predictor, PredictorKind};
pub use registry::{Catalog, LoadReport, Registry};
