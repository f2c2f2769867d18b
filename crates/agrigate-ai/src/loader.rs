//! Deserialization dispatch by artifact kind.

use std::path::Path;
use std::sync::Arc;

use agrigate_core::{ArtifactId, ArtifactKind};
use tracing::debug;

use crate::error::ModelError;
use crate::graph::ObjectGraph;
use crate::predictor::Predictor;

/// Outcome of deserializing one artifact.
pub enum Loaded {
    Ready(Arc<dyn Predictor>),
    /// Recognized format this build cannot load. Not an error: the slot stays
    /// absent.
    Unsupported(String),
}

/// Why this build cannot load `id`, judged from its extension alone. Lets
/// callers skip fetching artifacts that would only be discarded.
pub fn unsupported_reason(id: &ArtifactId) -> Option<String> {
    match id.kind() {
        ArtifactKind::ObjectGraph => None,
        ArtifactKind::NeuralNetwork if cfg!(feature = "onnx") => None,
        ArtifactKind::NeuralNetwork => Some("onnx (built without the `onnx` feature)".into()),
        ArtifactKind::Unsupported(ext) if ext.is_empty() => Some("no file extension".into()),
        ArtifactKind::Unsupported(ext) => Some(format!(".{ext} artifacts")),
    }
}

pub fn load_artifact(id: &ArtifactId, path: &Path) -> Result<Loaded, ModelError> {
    if let Some(reason) = unsupported_reason(id) {
        return Ok(Loaded::Unsupported(reason));
    }
    match id.kind() {
        ArtifactKind::NeuralNetwork => load_neural_network(path),
        _ => {
            let predictor = ObjectGraph::from_path(path)?.into_predictor()?;
            debug!(artifact = %id, kind = predictor.kind().as_str(), "deserialized object graph");
            Ok(Loaded::Ready(predictor))
        }
    }
}

#[cfg(feature = "onnx")]
fn load_neural_network(path: &Path) -> Result<Loaded, ModelError> {
    let predictor = crate::onnx::OnnxPredictor::load(path)?;
    Ok(Loaded::Ready(Arc::new(predictor)))
}

#[cfg(not(feature = "onnx"))]
fn load_neural_network(_path: &Path) -> Result<Loaded, ModelError> {
    Ok(Loaded::Unsupported("onnx (built without the `onnx` feature)".into()))
}
