//! Resilient inference: try the domain's model, validate what comes back,
//! and fall back to the rule-based estimator on any failure.
//!
//! Every stage reports a tagged [`Attempt`] instead of unwinding. Predictor
//! calls run on the blocking pool under a timeout, so a panicking or hung
//! model degrades to the fallback path like any other failure.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use agrigate_core::{CropRecommendation, Domain, DomainInput, DomainRequest, InputLayout, OutputKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::adapter::build_features;
use crate::error::{InferError, ModelError};
use crate::graph::softmax;
use crate::predictor::{ModelBundle, Predictor};
use crate::registry::Registry;

pub const DEFAULT_PREDICT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Alternatives reported for categorical domains.
const RANKED_ALTERNATIVES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InferencePath {
    Model,
    Fallback,
}

/// Why the model path was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoModel,
    PredictFailed,
    NotFinite,
    OutOfRange,
    UnknownClass,
    Timeout,
    Panicked,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoModel => "no model loaded",
            Self::PredictFailed => "model call failed",
            Self::NotFinite => "model output not finite",
            Self::OutOfRange => "model output out of range",
            Self::UnknownClass => "model output names no known class",
            Self::Timeout => "model call timed out",
            Self::Panicked => "model call panicked",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedClass {
    pub label: String,
    pub probability: f64,
}

/// Accepted model output.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub value: f64,
    pub label: Option<String>,
    pub ranked: Vec<RankedClass>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Accepted(ModelOutput),
    NeedsFallback(FallbackReason),
}

/// Settled prediction for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub domain: Domain,
    pub value: f64,
    /// Qualitative bucket. Categorical domains bucket by class label, or by
    /// a status derived from it.
    pub bucket: String,
    /// Decoded class for categorical domains.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub confidence: f64,
    pub path: InferencePath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<RankedClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_crops: Option<CropRecommendation>,
    pub computed_at: DateTime<Utc>,
}

/// Raw result of one predictor call, before validation.
#[derive(Debug)]
enum RawOutput {
    Scalar(f64),
    Probabilities(Vec<f64>),
    ClassIndex(f64),
}

enum ModelCall {
    Tabular(Vec<f64>),
    Tensor { values: Vec<f32>, shape: Vec<usize> },
}

pub struct Pipeline {
    registry: Arc<Registry>,
    predict_timeout: Duration,
}

impl Pipeline {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            predict_timeout: DEFAULT_PREDICT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.predict_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub async fn infer(&self, request: &DomainRequest) -> Result<Prediction, InferError> {
        self.infer_input(request.input()).await
    }

    /// Settle one request. Never fails for domains that have a rule-based
    /// estimator.
    pub async fn infer_input(&self, input: &dyn DomainInput) -> Result<Prediction, InferError> {
        let domain = input.domain();
        let confidence = domain.confidence();

        let (value, label, alternatives, path, fallback_reason, confidence) =
            match self.attempt(input).await {
                Attempt::Accepted(out) => (
                    out.value,
                    out.label,
                    out.ranked,
                    InferencePath::Model,
                    None,
                    confidence.model,
                ),
                Attempt::NeedsFallback(reason) => {
                    let (Some(estimate), Some(fallback_confidence)) =
                        (input.fallback(), confidence.fallback)
                    else {
                        warn!(%domain, %reason, "no usable model and no fallback estimator");
                        return Err(InferError::ServiceUnavailable { domain, reason });
                    };
                    debug!(%domain, %reason, "using rule-based estimate");
                    (
                        estimate.value,
                        estimate.label,
                        Vec::new(),
                        InferencePath::Fallback,
                        Some(reason),
                        fallback_confidence,
                    )
                }
            };

        let value = input.finalize(value);
        let bucket = match (domain.thresholds(), label.as_deref()) {
            (Some(table), _) => table.bucket(input.classification_value(value)).to_string(),
            (None, Some(label)) => domain.class_bucket(label, value),
            (None, None) => "unknown".to_string(),
        };
        let recommended_crops = label.as_deref().and_then(|l| domain.crop_recommendation(l));

        debug!(%domain, value, %bucket, ?path, "prediction settled");
        Ok(Prediction {
            domain,
            value,
            bucket,
            label,
            confidence,
            path,
            fallback_reason,
            alternatives,
            recommended_crops,
            computed_at: Utc::now(),
        })
    }

    /// Model path only: build features, call, validate.
    pub async fn attempt(&self, input: &dyn DomainInput) -> Attempt {
        let domain = input.domain();
        let Some(bundle) = self.registry.get_all(domain) else {
            return Attempt::NeedsFallback(FallbackReason::NoModel);
        };
        let Some(model) = bundle.model().cloned() else {
            return Attempt::NeedsFallback(FallbackReason::NoModel);
        };

        let call = match domain.input_layout() {
            InputLayout::Tabular(spec) => {
                let features = build_features(spec, input, &bundle, model.expected_width());
                ModelCall::Tabular(features.values)
            }
            InputLayout::Tensor => match input.tensor() {
                Some(t) => ModelCall::Tensor {
                    values: t.values.to_vec(),
                    shape: t.shape.to_vec(),
                },
                None => return Attempt::NeedsFallback(FallbackReason::NoModel),
            },
        };

        let raw = match self.invoke(domain, model.clone(), call).await {
            Ok(raw) => raw,
            Err(reason) => return Attempt::NeedsFallback(reason),
        };

        match interpret(domain, &bundle, model.as_ref(), raw) {
            Ok(out) => Attempt::Accepted(out),
            Err(reason) => {
                warn!(%domain, %reason, "rejected model output");
                Attempt::NeedsFallback(reason)
            }
        }
    }

    async fn invoke(
        &self,
        domain: Domain,
        model: Arc<dyn Predictor>,
        call: ModelCall,
    ) -> Result<RawOutput, FallbackReason> {
        let kind = domain.output_kind();
        let task = tokio::task::spawn_blocking(move || run_model(model.as_ref(), &call, kind));

        match tokio::time::timeout(self.predict_timeout, task).await {
            Err(_) => {
                warn!(%domain, timeout_ms = self.predict_timeout.as_millis() as u64, "model call timed out");
                Err(FallbackReason::Timeout)
            }
            Ok(Err(join)) => {
                warn!(%domain, error = %join, "model call panicked");
                Err(FallbackReason::Panicked)
            }
            Ok(Ok(Err(e))) => {
                warn!(%domain, error = %e, "model call failed");
                Err(FallbackReason::PredictFailed)
            }
            Ok(Ok(Ok(raw))) => Ok(raw),
        }
    }
}

fn first(values: Vec<f64>) -> Result<f64, ModelError> {
    values.first().copied().ok_or(ModelError::EmptyOutput)
}

fn run_model(model: &dyn Predictor, call: &ModelCall, kind: OutputKind) -> Result<RawOutput, ModelError> {
    let features = match call {
        ModelCall::Tensor { values, shape } => {
            let out = model
                .predict_tensor(values, shape)
                .ok_or(ModelError::Unsupported("tensor input"))??;
            return Ok(RawOutput::Probabilities(as_distribution(out)));
        }
        ModelCall::Tabular(features) => features.as_slice(),
    };

    match kind {
        OutputKind::Regression => Ok(RawOutput::Scalar(first(model.predict(features)?)?)),
        OutputKind::Probability => match model.predict_proba(features) {
            // Positive class is the last column.
            Some(proba) => {
                let proba = proba?;
                proba.last().copied().map(RawOutput::Scalar).ok_or(ModelError::EmptyOutput)
            }
            None => Ok(RawOutput::Scalar(first(model.predict(features)?)?)),
        },
        OutputKind::Categorical => match model.predict_proba(features) {
            Some(proba) => Ok(RawOutput::Probabilities(proba?)),
            None => Ok(RawOutput::ClassIndex(first(model.predict(features)?)?)),
        },
    }
}

/// Image classifiers may end in raw logits rather than a softmax layer.
fn as_distribution(scores: Vec<f64>) -> Vec<f64> {
    let in_unit = scores.iter().all(|p| (0.0..=1.0).contains(p));
    let total: f64 = scores.iter().sum();
    if in_unit && (total - 1.0).abs() < 1e-3 {
        scores
    } else {
        softmax(&scores)
    }
}

/// Class labels for a categorical domain: the bundle's label component
/// first, then the model's own classes, then labels known up front.
fn class_labels(domain: Domain, bundle: &ModelBundle, model: &dyn Predictor) -> Vec<String> {
    if let Some(classes) = domain
        .label_component()
        .and_then(|role| bundle.get(role))
        .and_then(|p| p.classes())
    {
        return classes.to_vec();
    }
    if let Some(classes) = model.classes() {
        return classes.to_vec();
    }
    domain.builtin_classes().iter().map(|c| c.to_string()).collect()
}

fn validate(domain: Domain, value: f64) -> Result<f64, FallbackReason> {
    if !value.is_finite() {
        return Err(FallbackReason::NotFinite);
    }
    match domain.valid_range() {
        Some(range) if !range.contains(value) => Err(FallbackReason::OutOfRange),
        _ => Ok(value),
    }
}

fn interpret(
    domain: Domain,
    bundle: &ModelBundle,
    model: &dyn Predictor,
    raw: RawOutput,
) -> Result<ModelOutput, FallbackReason> {
    match raw {
        RawOutput::Scalar(v) => Ok(ModelOutput {
            value: validate(domain, v)?,
            label: None,
            ranked: Vec::new(),
        }),
        RawOutput::Probabilities(proba) => {
            if proba.iter().any(|p| !p.is_finite()) {
                return Err(FallbackReason::NotFinite);
            }
            let labels = class_labels(domain, bundle, model);
            let mut order: Vec<usize> = (0..proba.len()).collect();
            order.sort_by(|a, b| proba[*b].total_cmp(&proba[*a]));

            let top = *order.first().ok_or(FallbackReason::UnknownClass)?;
            let label = labels.get(top).cloned().ok_or(FallbackReason::UnknownClass)?;
            let ranked = order
                .iter()
                .take(RANKED_ALTERNATIVES)
                .filter_map(|i| {
                    labels.get(*i).map(|label| RankedClass {
                        label: label.clone(),
                        probability: proba[*i],
                    })
                })
                .collect();
            Ok(ModelOutput {
                value: validate(domain, proba[top])?,
                label: Some(label),
                ranked,
            })
        }
        RawOutput::ClassIndex(index) => {
            if !index.is_finite() || index < 0.0 || index.fract() != 0.0 {
                return Err(FallbackReason::UnknownClass);
            }
            let labels = class_labels(domain, bundle, model);
            let label = labels
                .get(index as usize)
                .cloned()
                .ok_or(FallbackReason::UnknownClass)?;
            // A bare class index carries no probability.
            Ok(ModelOutput {
                value: 1.0,
                label: Some(label),
                ranked: Vec::new(),
            })
        }
    }
}
