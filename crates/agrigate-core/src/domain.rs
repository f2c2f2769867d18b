//! Prediction domains and their fixed per-domain policy.
//!
//! A domain is one predictive capability (flood risk, AQI, yield, ...). Each
//! domain fixes how its model output is read, which numeric range is
//! plausible, and which confidence is reported for each pipeline path.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every domain the gateway knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Aqi,
    Co2,
    Crop,
    Flood,
    Ndvi,
    PlantDisease,
    Price,
    Profit,
    Rainfall,
    SoilHealth,
    SoilType,
    Storm,
    Water,
    Yield,
}

impl Domain {
    pub const ALL: [Domain; 14] = [
        Domain::Aqi,
        Domain::Co2,
        Domain::Crop,
        Domain::Flood,
        Domain::Ndvi,
        Domain::PlantDisease,
        Domain::Price,
        Domain::Profit,
        Domain::Rainfall,
        Domain::SoilHealth,
        Domain::SoilType,
        Domain::Storm,
        Domain::Water,
        Domain::Yield,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aqi => "aqi",
            Self::Co2 => "co2",
            Self::Crop => "crop",
            Self::Flood => "flood",
            Self::Ndvi => "ndvi",
            Self::PlantDisease => "plant_disease",
            Self::Price => "price",
            Self::Profit => "profit",
            Self::Rainfall => "rainfall",
            Self::SoilHealth => "soil_health",
            Self::SoilType => "soil_type",
            Self::Storm => "storm",
            Self::Water => "water",
            Self::Yield => "yield",
        }
    }

    /// How the raw model output is turned into the domain's numeric value.
    pub fn output_kind(&self) -> OutputKind {
        match self {
            Self::Flood | Self::Storm => OutputKind::Probability,
            Self::Crop | Self::PlantDisease | Self::SoilType => OutputKind::Categorical,
            _ => OutputKind::Regression,
        }
    }

    /// Plausible range for an accepted model output. `None` means any finite
    /// value is accepted.
    pub fn valid_range(&self) -> Option<ValidRange> {
        match self {
            Self::Aqi => Some(ValidRange::new(0.0, 500.0)),
            Self::Co2 => Some(ValidRange::new(150.0, 1000.0)),
            Self::Flood | Self::Storm | Self::Crop | Self::PlantDisease | Self::SoilType => {
                Some(ValidRange::new(0.0, 1.0))
            }
            Self::Ndvi | Self::SoilHealth => Some(ValidRange::new(0.0, 100.0)),
            Self::Rainfall => Some(ValidRange::new(0.0, 5000.0)),
            // A non-positive price, yield or water demand is never a usable prediction.
            Self::Price | Self::Yield | Self::Water => {
                Some(ValidRange::new(f64::MIN_POSITIVE, f64::MAX))
            }
            Self::Profit => None,
        }
    }

    /// Confidence reported for each pipeline path.
    pub fn confidence(&self) -> Confidence {
        let (model, fallback) = match self {
            Self::Aqi => (0.85, Some(0.75)),
            Self::Co2 => (0.88, Some(0.75)),
            Self::Crop => (0.85, Some(0.70)),
            Self::Flood => (0.82, Some(0.70)),
            Self::Ndvi => (0.90, Some(0.80)),
            Self::Price => (0.78, Some(0.65)),
            Self::Profit => (0.75, Some(0.65)),
            Self::Rainfall => (0.80, Some(0.70)),
            Self::SoilHealth => (0.88, Some(0.75)),
            Self::Storm => (0.76, Some(0.60)),
            Self::Yield => (0.79, Some(0.65)),
            Self::Water => (0.95, None),
            Self::SoilType => (0.90, None),
            Self::PlantDisease => (0.90, None),
        };
        Confidence { model, fallback }
    }

    /// Domains without a sound rule-based substitute. A missing or failing
    /// model is reported to the caller instead of fabricating an answer.
    pub fn requires_model(&self) -> bool {
        self.confidence().fallback.is_none()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown domain '{0}'")]
pub struct DomainParseError(pub String);

impl FromStr for Domain {
    type Err = DomainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == key)
            .ok_or_else(|| DomainParseError(s.to_string()))
    }
}

/// How a model's raw output vector maps to a single number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// First element of `predict`.
    Regression,
    /// Positive-class probability from `predict_proba`, else first element of `predict`.
    Probability,
    /// Top class from `predict_proba` (or the class index from `predict`),
    /// decoded to a label.
    Categorical,
}

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidRange {
    pub min: f64,
    pub max: f64,
}

impl ValidRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Fixed confidence per pipeline path. The artifacts carry no native
/// calibration, so these are domain constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Confidence {
    pub model: f64,
    /// `None` for domains that have no rule-based estimator.
    pub fallback: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_confidence_strictly_below_model() {
        for domain in Domain::ALL {
            let c = domain.confidence();
            if let Some(fallback) = c.fallback {
                assert!(
                    fallback < c.model,
                    "{domain}: fallback {fallback} must be below model {}",
                    c.model
                );
            }
        }
    }

    #[test]
    fn parse_round_trips_every_domain() {
        for domain in Domain::ALL {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
    }

    #[test]
    fn parse_accepts_dashes_and_case() {
        assert_eq!("Soil-Health".parse::<Domain>().unwrap(), Domain::SoilHealth);
        assert_eq!("Plant-Disease".parse::<Domain>().unwrap(), Domain::PlantDisease);
        assert!("plant".parse::<Domain>().is_err());
    }

    #[test]
    fn serde_names_match_as_str() {
        for domain in Domain::ALL {
            let json = serde_json::to_string(&domain).unwrap();
            assert_eq!(json, format!("\"{}\"", domain.as_str()));
        }
    }

    #[test]
    fn model_required_domains() {
        let required: Vec<_> = Domain::ALL
            .into_iter()
            .filter(|d| d.requires_model())
            .collect();
        assert_eq!(
            required,
            vec![Domain::PlantDisease, Domain::SoilType, Domain::Water]
        );
    }

    #[test]
    fn valid_range_is_inclusive() {
        let r = ValidRange::new(0.0, 1.0);
        assert!(r.contains(0.0));
        assert!(r.contains(1.0));
        assert!(!r.contains(1.0001));
        assert!(!r.contains(f64::NAN));
    }
}
