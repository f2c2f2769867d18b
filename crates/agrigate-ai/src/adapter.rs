//! Feature adapter: turns a validated request into the vector a loaded model
//! accepts.
//!
//! Models were trained with slightly different column sets across releases,
//! so the adapter reconciles the canonical vector against the model's
//! declared width rather than failing. Zero-filled slots keep a prediction
//! possible; they do not make it correct.

use agrigate_core::{DomainInput, EncoderBinding, FeatureSpec, FieldKind, FieldValue};
use tracing::debug;

use crate::predictor::{ModelBundle, Predictor};

/// Model-ready input for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub values: Vec<f64>,
    pub shape: Vec<usize>,
    /// Canonical field count before reconciliation.
    pub logical_len: usize,
}

fn encoder_for<'b>(bundle: &'b ModelBundle, binding: EncoderBinding) -> Option<&'b dyn Predictor> {
    match binding {
        EncoderBinding::Component(role) => bundle.get(role).map(|p| p.as_ref()),
        EncoderBinding::Keyed { component, key } => bundle.get(component)?.encoder(key),
    }
}

fn encode_field(bundle: &ModelBundle, binding: EncoderBinding, value: Option<FieldValue<'_>>) -> f64 {
    let (Some(encoder), Some(FieldValue::Text(raw))) = (encoder_for(bundle, binding), value) else {
        return 0.0;
    };
    match encoder.encode(raw) {
        Some(Ok(code)) => code,
        Some(Err(e)) => {
            debug!(value = raw, error = %e, "category not encodable, slot left zero");
            0.0
        }
        None => 0.0,
    }
}

/// Canonical vector in field order. Missing fields, reserved slots and
/// categoricals without a working encoder are zero.
pub fn canonical_vector(spec: &FeatureSpec, input: &dyn DomainInput, bundle: &ModelBundle) -> Vec<f64> {
    spec.fields
        .iter()
        .map(|field| match field.kind {
            FieldKind::Numeric => input
                .field(field.name)
                .and_then(|v| v.as_number())
                .unwrap_or(0.0),
            FieldKind::Categorical(binding) => encode_field(bundle, binding, input.field(field.name)),
            FieldKind::Reserved => 0.0,
        })
        .collect()
}

/// Pad with trailing zeros or truncate from the right to `declared`.
pub fn reconcile_width(mut values: Vec<f64>, declared: Option<usize>) -> Vec<f64> {
    if let Some(width) = declared {
        values.resize(width, 0.0);
    }
    values
}

/// Apply the bound scaler when its declared width matches.
fn scale(spec: &FeatureSpec, bundle: &ModelBundle, values: Vec<f64>) -> Vec<f64> {
    let Some(scaler) = spec.scaler.and_then(|role| bundle.get(role)) else {
        return values;
    };
    if scaler.expected_width() != Some(values.len()) {
        debug!(
            scaler_width = ?scaler.expected_width(),
            width = values.len(),
            "scaler width mismatch, skipping scaling"
        );
        return values;
    }
    match scaler.transform(&values) {
        Some(Ok(scaled)) if scaled.len() == values.len() => scaled,
        Some(Err(e)) => {
            debug!(error = %e, "scaler failed, using unscaled features");
            values
        }
        _ => values,
    }
}

/// Full adaptation: canonical vector, width reconciliation, optional scaling.
pub fn build_features(
    spec: &FeatureSpec,
    input: &dyn DomainInput,
    bundle: &ModelBundle,
    declared_width: Option<usize>,
) -> FeatureVector {
    let canonical = canonical_vector(spec, input, bundle);
    let logical_len = canonical.len();
    let values = scale(spec, bundle, reconcile_width(canonical, declared_width));
    if values.len() != logical_len {
        debug!(
            domain = %input.domain(),
            canonical = logical_len,
            reconciled = values.len(),
            "feature width reconciled"
        );
    }
    FeatureVector {
        shape: vec![1, values.len()],
        values,
        logical_len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use agrigate_core::request::{AqiRequest, PriceRequest, RainfallRequest};
    use agrigate_core::{Domain, InputLayout};

    use crate::graph::ObjectGraph;

    fn spec(domain: Domain) -> &'static FeatureSpec {
        match domain.input_layout() {
            InputLayout::Tabular(spec) => spec,
            InputLayout::Tensor => unreachable!(),
        }
    }

    fn graph(json: &str) -> Arc<dyn Predictor> {
        ObjectGraph::from_slice(json.as_bytes())
            .unwrap()
            .into_predictor()
            .unwrap()
    }

    fn aqi() -> AqiRequest {
        AqiRequest {
            city: "Delhi".into(),
            pm25: 1.0,
            pm10: 2.0,
            no2: 3.0,
            so2: 4.0,
            co: 5.0,
            o3: 6.0,
            temperature: Some(7.0),
            humidity: Some(8.0),
            wind_speed: Some(9.0),
            pressure: Some(10.0),
            visibility: None,
        }
    }

    fn rainfall() -> RainfallRequest {
        RainfallRequest {
            subdivision: "Kerala".into(),
            month: 7,
            year: 2024,
            temperature: Some(27.0),
            humidity: Some(85.0),
            pressure: Some(1005.0),
        }
    }

    #[test]
    fn canonical_order_and_zero_slots() {
        let bundle = ModelBundle::new();
        let v = canonical_vector(spec(Domain::Aqi), &aqi(), &bundle);
        assert_eq!(
            v,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 0.0, 0.0]
        );
    }

    #[test]
    fn encoder_fills_categorical_slot() {
        let bundle = ModelBundle::new().with(
            "encoder",
            graph(r#"{"type": "label_encoder", "classes": ["Bihar", "Kerala", "Punjab"]}"#),
        );
        let v = canonical_vector(spec(Domain::Rainfall), &rainfall(), &bundle);
        assert_eq!(v.len(), 18);
        assert_eq!(v[16], 1.0);
        assert!(v[5..16].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn unseen_category_stays_zero() {
        let bundle = ModelBundle::new().with(
            "encoders",
            graph(r#"{"type": "encoder_set", "encoders": {"crop": {"classes": ["maize", "rice"]}, "state": {"classes": ["Goa"]}}}"#),
        );
        let req = PriceRequest {
            crop: "rice".into(),
            state: "Assam".into(),
            district: None,
            month: 6,
            year: 2024,
        };
        let v = canonical_vector(spec(Domain::Price), &req, &bundle);
        assert_eq!(&v[..4], &[1.0, 0.0, 6.0, 2024.0]);
    }

    #[test]
    fn wider_model_gets_trailing_zeros() {
        let canonical: Vec<f64> = (1..=18).map(f64::from).collect();
        let v = reconcile_width(canonical.clone(), Some(21));
        assert_eq!(&v[..18], canonical.as_slice());
        assert_eq!(&v[18..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn narrower_model_keeps_leading_fields() {
        let canonical: Vec<f64> = (1..=18).map(f64::from).collect();
        assert_eq!(reconcile_width(canonical.clone(), Some(16)), canonical[..16].to_vec());
        assert_eq!(reconcile_width(canonical.clone(), None), canonical);
    }

    #[test]
    fn scaler_applies_only_at_matching_width() {
        let scaler = graph(
            r#"{"type": "standard_scaler", "mean": [0,0,0,0,0,0,0,0,0,0,0,0], "scale": [2,2,2,2,2,2,2,2,2,2,2,2]}"#,
        );
        let bundle = ModelBundle::new().with("scaler", scaler);
        let with_scaler = FeatureSpec {
            fields: spec(Domain::Aqi).fields,
            scaler: Some("scaler"),
        };

        let fv = build_features(&with_scaler, &aqi(), &bundle, None);
        assert_eq!(fv.values[0], 0.5);
        assert_eq!(fv.shape, vec![1, 12]);

        // Reconciled to 13, scaler declares 12: left unscaled.
        let fv = build_features(&with_scaler, &aqi(), &bundle, Some(13));
        assert_eq!(fv.values[0], 1.0);
        assert_eq!(fv.values.len(), 13);
        assert_eq!(fv.logical_len, 12);
    }
}
