//! Structured object graph artifacts.
//!
//! Classical models (linear models, tree ensembles, scalers, label encoders)
//! are exported as JSON documents tagged by `"type"`. Each document is
//! validated once at load so that evaluation never indexes out of bounds.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ModelError;
use crate::predictor::{Predictor, PredictorKind};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectGraph {
    LinearRegression(LinearRegression),
    LogisticRegression(LogisticRegression),
    TreeEnsemble(TreeEnsemble),
    StandardScaler(StandardScaler),
    MinMaxScaler(MinMaxScaler),
    LabelEncoder(LabelEncoder),
    EncoderSet(EncoderSet),
}

impl ObjectGraph {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        Self::from_slice(&std::fs::read(path)?)
    }

    /// Validate and wrap as a shareable predictor.
    pub fn into_predictor(self) -> Result<Arc<dyn Predictor>, ModelError> {
        Ok(match self {
            Self::LinearRegression(m) => {
                m.validate()?;
                Arc::new(m)
            }
            Self::LogisticRegression(m) => {
                m.validate()?;
                Arc::new(m)
            }
            Self::TreeEnsemble(m) => {
                m.validate()?;
                Arc::new(m)
            }
            Self::StandardScaler(m) => {
                m.validate()?;
                Arc::new(m)
            }
            Self::MinMaxScaler(m) => {
                m.validate()?;
                Arc::new(m)
            }
            Self::LabelEncoder(m) => Arc::new(m),
            Self::EncoderSet(m) => Arc::new(m),
        })
    }
}

fn check_width(expected: usize, features: &[f64]) -> Result<(), ModelError> {
    if features.len() != expected {
        return Err(ModelError::Width {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}

fn dot(weights: &[f64], features: &[f64]) -> f64 {
    weights.iter().zip(features).map(|(w, x)| w * x).sum()
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

// ── Linear regression ──

#[derive(Debug, Clone, Deserialize)]
pub struct LinearRegression {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LinearRegression {
    fn validate(&self) -> Result<(), ModelError> {
        if self.coefficients.is_empty() {
            return Err(ModelError::Malformed("linear regression has no coefficients".into()));
        }
        Ok(())
    }
}

impl Predictor for LinearRegression {
    fn kind(&self) -> PredictorKind {
        PredictorKind::LinearRegression
    }

    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.coefficients.len(), features)?;
        Ok(vec![dot(&self.coefficients, features) + self.intercept])
    }

    fn expected_width(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }
}

// ── Logistic regression ──

/// One weight row per class, or a single row for a binary model.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    pub classes: Vec<String>,
}

impl LogisticRegression {
    fn width(&self) -> usize {
        self.coefficients.first().map(Vec::len).unwrap_or(0)
    }

    fn validate(&self) -> Result<(), ModelError> {
        let rows = self.coefficients.len();
        let binary = rows == 1 && self.classes.len() == 2;
        if rows == 0 || (!binary && rows != self.classes.len()) {
            return Err(ModelError::Malformed(format!(
                "logistic regression has {rows} weight rows for {} classes",
                self.classes.len()
            )));
        }
        if self.intercepts.len() != rows {
            return Err(ModelError::Malformed("intercept count != weight rows".into()));
        }
        let width = self.width();
        if width == 0 || self.coefficients.iter().any(|row| row.len() != width) {
            return Err(ModelError::Malformed("ragged logistic weight rows".into()));
        }
        Ok(())
    }

    fn probabilities(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.width(), features)?;
        let logits: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| dot(w, features) + b)
            .collect();

        if let [z] = logits.as_slice() {
            let p = 1.0 / (1.0 + (-z).exp());
            return Ok(vec![1.0 - p, p]);
        }

        Ok(softmax(&logits))
    }
}

pub(crate) fn softmax(logits: &[f64]) -> Vec<f64> {
    // Shift by the max logit so exp never overflows.
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

impl Predictor for LogisticRegression {
    fn kind(&self) -> PredictorKind {
        PredictorKind::LogisticRegression
    }

    /// Index of the most probable class.
    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        let proba = self.probabilities(features)?;
        let top = argmax(&proba).ok_or(ModelError::EmptyOutput)?;
        Ok(vec![top as f64])
    }

    fn predict_proba(&self, features: &[f64]) -> Option<Result<Vec<f64>, ModelError>> {
        Some(self.probabilities(features))
    }

    fn classes(&self) -> Option<&[String]> {
        Some(&self.classes)
    }

    fn expected_width(&self) -> Option<usize> {
        Some(self.width())
    }
}

// ── Tree ensemble ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeTask {
    Regression,
    Classification,
}

/// Split node when `feature` is set (go left on `x[feature] <= threshold`),
/// leaf otherwise.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: usize,
    #[serde(default)]
    pub right: usize,
    #[serde(default)]
    pub value: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

/// Random forest or boosted trees. Leaf outputs are averaged across trees;
/// `base_score` is added for regression.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    pub task: TreeTask,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    fn output_len(&self) -> usize {
        match self.task {
            TreeTask::Regression => 1,
            TreeTask::Classification => self.classes.len(),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Malformed("tree ensemble has no trees".into()));
        }
        if self.task == TreeTask::Classification && self.classes.is_empty() {
            return Err(ModelError::Malformed("classifier ensemble has no classes".into()));
        }
        let out = self.output_len();
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelError::Malformed(format!("tree {t} is empty")));
            }
            let n = tree.nodes.len();
            for (i, node) in tree.nodes.iter().enumerate() {
                match node.feature {
                    Some(f) => {
                        // Children strictly after the parent rules out cycles.
                        if f >= self.n_features
                            || node.left <= i
                            || node.right <= i
                            || node.left >= n
                            || node.right >= n
                        {
                            return Err(ModelError::Malformed(format!(
                                "tree {t} node {i} has an invalid split"
                            )));
                        }
                    }
                    None if node.value.len() != out => {
                        return Err(ModelError::Malformed(format!(
                            "tree {t} leaf {i} has {} outputs, expected {out}",
                            node.value.len()
                        )));
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }

    fn leaf<'a>(tree: &'a Tree, features: &[f64]) -> &'a [f64] {
        let mut i = 0;
        loop {
            let node = &tree.nodes[i];
            match node.feature {
                Some(f) if features[f] <= node.threshold => i = node.left,
                Some(_) => i = node.right,
                None => return &node.value,
            }
        }
    }

    fn averaged(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.n_features, features)?;
        let mut acc = vec![0.0; self.output_len()];
        for tree in &self.trees {
            for (a, v) in acc.iter_mut().zip(Self::leaf(tree, features)) {
                *a += v;
            }
        }
        let n = self.trees.len() as f64;
        acc.iter_mut().for_each(|a| *a /= n);
        Ok(acc)
    }
}

impl Predictor for TreeEnsemble {
    fn kind(&self) -> PredictorKind {
        PredictorKind::TreeEnsemble
    }

    fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        let avg = self.averaged(features)?;
        match self.task {
            TreeTask::Regression => Ok(vec![avg[0] + self.base_score]),
            TreeTask::Classification => {
                let top = argmax(&avg).ok_or(ModelError::EmptyOutput)?;
                Ok(vec![top as f64])
            }
        }
    }

    fn predict_proba(&self, features: &[f64]) -> Option<Result<Vec<f64>, ModelError>> {
        if self.task != TreeTask::Classification {
            return None;
        }
        Some(self.averaged(features).map(|avg| {
            let total: f64 = avg.iter().sum();
            if total > 0.0 {
                avg.into_iter().map(|p| p / total).collect()
            } else {
                avg
            }
        }))
    }

    fn classes(&self) -> Option<&[String]> {
        (self.task == TreeTask::Classification).then_some(self.classes.as_slice())
    }

    fn expected_width(&self) -> Option<usize> {
        Some(self.n_features)
    }
}

// ── Scalers ──

#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    fn validate(&self) -> Result<(), ModelError> {
        if self.mean.len() != self.scale.len() {
            return Err(ModelError::Malformed("scaler mean/scale length mismatch".into()));
        }
        Ok(())
    }
}

impl Predictor for StandardScaler {
    fn kind(&self) -> PredictorKind {
        PredictorKind::StandardScaler
    }

    fn predict(&self, _features: &[f64]) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::Unsupported("predict"))
    }

    fn transform(&self, features: &[f64]) -> Option<Result<Vec<f64>, ModelError>> {
        Some(check_width(self.mean.len(), features).map(|()| {
            features
                .iter()
                .zip(self.mean.iter().zip(&self.scale))
                // Zero-variance columns are only centred.
                .map(|(x, (m, s))| if *s == 0.0 { x - m } else { (x - m) / s })
                .collect()
        }))
    }

    fn expected_width(&self) -> Option<usize> {
        Some(self.mean.len())
    }
}

/// `x * scale + min`, per column.
#[derive(Debug, Clone, Deserialize)]
pub struct MinMaxScaler {
    pub min: Vec<f64>,
    pub scale: Vec<f64>,
}

impl MinMaxScaler {
    fn validate(&self) -> Result<(), ModelError> {
        if self.min.len() != self.scale.len() {
            return Err(ModelError::Malformed("scaler min/scale length mismatch".into()));
        }
        Ok(())
    }
}

impl Predictor for MinMaxScaler {
    fn kind(&self) -> PredictorKind {
        PredictorKind::MinMaxScaler
    }

    fn predict(&self, _features: &[f64]) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::Unsupported("predict"))
    }

    fn transform(&self, features: &[f64]) -> Option<Result<Vec<f64>, ModelError>> {
        Some(check_width(self.min.len(), features).map(|()| {
            features
                .iter()
                .zip(self.min.iter().zip(&self.scale))
                .map(|(x, (m, s))| x * s + m)
                .collect()
        }))
    }

    fn expected_width(&self) -> Option<usize> {
        Some(self.min.len())
    }
}

// ── Encoders ──

/// Sorted class list; a label encodes to its index.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl Predictor for LabelEncoder {
    fn kind(&self) -> PredictorKind {
        PredictorKind::LabelEncoder
    }

    fn predict(&self, _features: &[f64]) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::Unsupported("predict"))
    }

    fn encode(&self, label: &str) -> Option<Result<f64, ModelError>> {
        Some(
            self.classes
                .iter()
                .position(|c| c == label)
                .map(|i| i as f64)
                .ok_or_else(|| ModelError::UnknownCategory(label.to_string())),
        )
    }

    fn classes(&self) -> Option<&[String]> {
        Some(&self.classes)
    }
}

/// Field name → label encoder.
#[derive(Debug, Clone, Deserialize)]
pub struct EncoderSet {
    pub encoders: BTreeMap<String, LabelEncoder>,
}

impl Predictor for EncoderSet {
    fn kind(&self) -> PredictorKind {
        PredictorKind::EncoderSet
    }

    fn predict(&self, _features: &[f64]) -> Result<Vec<f64>, ModelError> {
        Err(ModelError::Unsupported("predict"))
    }

    fn encoder(&self, field: &str) -> Option<&dyn Predictor> {
        self.encoders.get(field).map(|e| e as &dyn Predictor)
    }
}
