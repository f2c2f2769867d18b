//! The predictor capability and per-domain bundles of predictors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorKind {
    LinearRegression,
    LogisticRegression,
    TreeEnsemble,
    StandardScaler,
    MinMaxScaler,
    LabelEncoder,
    EncoderSet,
    NeuralNetwork,
}

impl PredictorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinearRegression => "linear_regression",
            Self::LogisticRegression => "logistic_regression",
            Self::TreeEnsemble => "tree_ensemble",
            Self::StandardScaler => "standard_scaler",
            Self::MinMaxScaler => "min_max_scaler",
            Self::LabelEncoder => "label_encoder",
            Self::EncoderSet => "encoder_set",
            Self::NeuralNetwork => "neural_network",
        }
    }
}

/// A loaded artifact. Every capability beyond `predict` is an optional probe:
/// `None` means the predictor does not offer it.
///
/// Predictors are immutable after load and shared across concurrent
/// requests.
pub trait Predictor: Send + Sync {
    fn kind(&self) -> PredictorKind;

    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;

    /// Per-class probabilities, in class order.
    fn predict_proba(&self, _features: &[f64]) -> Option<Result<Vec<f64>, ModelError>> {
        None
    }

    /// Scaler transform.
    fn transform(&self, _features: &[f64]) -> Option<Result<Vec<f64>, ModelError>> {
        None
    }

    /// Label encoder lookup.
    fn encode(&self, _label: &str) -> Option<Result<f64, ModelError>> {
        None
    }

    /// Encoder for one field of a keyed encoder set.
    fn encoder(&self, _field: &str) -> Option<&dyn Predictor> {
        None
    }

    /// Class labels in output order.
    fn classes(&self) -> Option<&[String]> {
        None
    }

    /// Input width the predictor was built for. `None` trusts the caller.
    fn expected_width(&self) -> Option<usize> {
        None
    }

    /// Run on a dense `f32` tensor of the given shape.
    fn predict_tensor(
        &self,
        _values: &[f32],
        _shape: &[usize],
    ) -> Option<Result<Vec<f64>, ModelError>> {
        None
    }
}

impl fmt::Debug for dyn Predictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predictor")
            .field("kind", &self.kind())
            .field("expected_width", &self.expected_width())
            .finish()
    }
}

/// Component role → predictor, for one domain.
#[derive(Debug, Default, Clone)]
pub struct ModelBundle {
    components: BTreeMap<String, Arc<dyn Predictor>>,
}

impl ModelBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: impl Into<String>, predictor: Arc<dyn Predictor>) -> Self {
        self.insert(role, predictor);
        self
    }

    pub fn insert(&mut self, role: impl Into<String>, predictor: Arc<dyn Predictor>) {
        self.components.insert(role.into(), predictor);
    }

    pub fn get(&self, role: &str) -> Option<&Arc<dyn Predictor>> {
        self.components.get(role)
    }

    /// The primary predictor.
    pub fn model(&self) -> Option<&Arc<dyn Predictor>> {
        self.get("model")
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
