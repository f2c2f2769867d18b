//! ONNX Runtime predictor for neural network containers.
//!
//! Tabular models take a single `[1, width]` float input. Image models take
//! the caller's NHWC tensor as is. Output is the first output tensor,
//! flattened.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::{Tensor, ValueType};
use tracing::info;

use crate::error::ModelError;
use crate::predictor::{Predictor, PredictorKind};

fn onnx_err(e: impl std::fmt::Display) -> ModelError {
    ModelError::Onnx(e.to_string())
}

pub struct OnnxPredictor {
    // `Session::run` needs exclusive access.
    session: Mutex<Session>,
    input_name: String,
    width: Option<usize>,
}

impl OnnxPredictor {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let session = Session::builder()
            .map_err(onnx_err)?
            .commit_from_file(path)
            .map_err(onnx_err)?;

        let input = session
            .inputs()
            .first()
            .ok_or_else(|| ModelError::Malformed(format!("{} declares no inputs", path.display())))?;
        let input_name = input.name().to_string();
        let width = infer_width(input.dtype());

        info!(model = %path.display(), input = %input_name, ?width, "loaded onnx model");
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            width,
        })
    }

    fn run(&self, shape: Vec<i64>, values: Vec<f32>) -> Result<Vec<f64>, ModelError> {
        let tensor = Tensor::from_array((shape, values.into_boxed_slice())).map_err(onnx_err)?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::Other("onnx session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(onnx_err)?;
        let (_, data) = outputs[0].try_extract_tensor::<f32>().map_err(onnx_err)?;
        if data.is_empty() {
            return Err(ModelError::EmptyOutput);
        }
        Ok(data.iter().map(|v| f64::from(*v)).collect())
    }
}

impl Predictor for OnnxPredictor {
    fn kind(&self) -> PredictorKind {
        PredictorKind::NeuralNetwork
    }

    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        match self.width {
            Some(expected) if expected != features.len() => {
                return Err(ModelError::Width {
                    expected,
                    actual: features.len(),
                });
            }
            _ => {}
        }
        let values = features.iter().map(|v| *v as f32).collect();
        self.run(vec![1, features.len() as i64], values)
    }

    fn predict_tensor(
        &self,
        values: &[f32],
        shape: &[usize],
    ) -> Option<Result<Vec<f64>, ModelError>> {
        let shape = shape.iter().map(|d| *d as i64).collect();
        Some(self.run(shape, values.to_vec()))
    }

    fn expected_width(&self) -> Option<usize> {
        self.width
    }
}

/// Last input dimension, when the model fixes it.
fn infer_width(input_type: &ValueType) -> Option<usize> {
    match input_type {
        ValueType::Tensor { shape, .. } if shape.len() == 2 => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
