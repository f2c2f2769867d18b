//! Declarative per-domain feature specs.
//!
//! A feature spec lists the canonical input fields in the order the domain's models
//! were trained on, plus which bundle components encode categorical fields
//! and scale the finished vector. One generic adapter consumes these specs.

use serde::Serialize;

use crate::domain::Domain;

/// Raw value of one request field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl FieldValue<'_> {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

/// Where a categorical field's encoder lives in the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderBinding {
    /// A component that is itself a label encoder (e.g. `"encoder"`).
    Component(&'static str),
    /// An encoder set component keyed by field (e.g. `"encoders"["crop"]`).
    Keyed {
        component: &'static str,
        key: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Categorical(EncoderBinding),
    /// Slot the models were trained with but the request cannot supply.
    /// Always zero.
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn numeric(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Numeric,
        }
    }

    pub const fn encoded(name: &'static str, component: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Categorical(EncoderBinding::Component(component)),
        }
    }

    pub const fn keyed(name: &'static str, component: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Categorical(EncoderBinding::Keyed {
                component,
                key: name,
            }),
        }
    }

    pub const fn reserved(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Reserved,
        }
    }
}

/// Ordered tabular inputs plus an optional scaler binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSpec {
    pub fields: &'static [FieldSpec],
    pub scaler: Option<&'static str>,
}

impl FeatureSpec {
    /// Canonical (logical) width.
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// How a domain feeds its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    Tabular(&'static FeatureSpec),
    /// Caller supplies a pre-decoded tensor; no reconciliation applies.
    Tensor,
}

static AQI: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::numeric("pm25"),
        FieldSpec::numeric("pm10"),
        FieldSpec::numeric("no2"),
        FieldSpec::numeric("so2"),
        FieldSpec::numeric("co"),
        FieldSpec::numeric("o3"),
        FieldSpec::numeric("temperature"),
        FieldSpec::numeric("humidity"),
        FieldSpec::numeric("wind_speed"),
        FieldSpec::numeric("pressure"),
        FieldSpec::numeric("visibility"),
        FieldSpec::encoded("city", "encoder"),
    ],
    scaler: None,
};

static CO2: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::numeric("month"),
        FieldSpec::numeric("year"),
        FieldSpec::numeric("temperature"),
        FieldSpec::numeric("humidity"),
        FieldSpec::numeric("pressure"),
        FieldSpec::numeric("wind_speed"),
        FieldSpec::reserved("co2_lag"),
    ],
    scaler: Some("scaler"),
};

static CROP: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::numeric("nitrogen"),
        FieldSpec::numeric("phosphorus"),
        FieldSpec::numeric("potassium"),
        FieldSpec::numeric("temperature"),
        FieldSpec::numeric("humidity"),
        FieldSpec::numeric("ph"),
        FieldSpec::numeric("rainfall"),
    ],
    scaler: Some("scaler"),
};

static FLOOD: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::numeric("rainfall_mm"),
        FieldSpec::numeric("river_level"),
        FieldSpec::numeric("elevation"),
        FieldSpec::numeric("flood_history"),
    ],
    scaler: None,
};

static NDVI: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::numeric("ndvi"),
        FieldSpec::numeric("temperature"),
        FieldSpec::numeric("rainfall"),
    ],
    scaler: None,
};

static PRICE: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::keyed("crop", "encoders"),
        FieldSpec::keyed("state", "encoders"),
        FieldSpec::numeric("month"),
        FieldSpec::numeric("year"),
        FieldSpec::reserved("production"),
        FieldSpec::reserved("demand_index"),
    ],
    scaler: None,
};

static PROFIT: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::keyed("crop", "encoders"),
        FieldSpec::numeric("area_hectares"),
        FieldSpec::numeric("cost_per_hectare"),
        FieldSpec::numeric("expected_yield"),
        FieldSpec::numeric("market_price"),
        FieldSpec::reserved("season"),
    ],
    scaler: None,
};

static RAINFALL: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::numeric("month"),
        FieldSpec::numeric("year"),
        FieldSpec::numeric("temperature"),
        FieldSpec::numeric("humidity"),
        FieldSpec::numeric("pressure"),
        FieldSpec::reserved("cloud_cover"),
        FieldSpec::reserved("wind_speed"),
        FieldSpec::reserved("evapotranspiration"),
        FieldSpec::reserved("soil_moisture"),
        FieldSpec::reserved("previous_month_rainfall"),
        FieldSpec::reserved("same_month_last_year"),
        FieldSpec::reserved("jan_rainfall"),
        FieldSpec::reserved("feb_rainfall"),
        FieldSpec::reserved("mar_rainfall"),
        FieldSpec::reserved("apr_rainfall"),
        FieldSpec::reserved("may_rainfall"),
        FieldSpec::encoded("subdivision", "encoder"),
        FieldSpec::reserved("extra"),
    ],
    scaler: None,
};

static SOIL_HEALTH: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::numeric("nitrogen"),
        FieldSpec::numeric("phosphorus"),
        FieldSpec::numeric("potassium"),
        FieldSpec::numeric("ph"),
        FieldSpec::numeric("organic_carbon"),
        FieldSpec::numeric("ec"),
    ],
    scaler: Some("scaler"),
};

static STORM: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::numeric("month"),
        FieldSpec::numeric("wind_speed"),
        FieldSpec::numeric("pressure"),
        FieldSpec::numeric("humidity"),
    ],
    scaler: None,
};

static WATER: FeatureSpec = FeatureSpec {
    fields: &[
        FieldSpec::numeric("temperature"),
        FieldSpec::numeric("humidity"),
        FieldSpec::numeric("rainfall"),
        FieldSpec::numeric("soil_moisture"),
        FieldSpec::numeric("crop_coefficient"),
        FieldSpec::numeric("growth_stage_index"),
    ],
    scaler: None,
};

static YIELD: FeatureSpec = FeatureSpec {
    fields: &[FieldSpec::numeric("area_hectares")],
    scaler: None,
};

impl Domain {
    pub fn input_layout(&self) -> InputLayout {
        let spec = match self {
            Self::Aqi => &AQI,
            Self::Co2 => &CO2,
            Self::Crop => &CROP,
            Self::Flood => &FLOOD,
            Self::Ndvi => &NDVI,
            Self::Price => &PRICE,
            Self::Profit => &PROFIT,
            Self::Rainfall => &RAINFALL,
            Self::SoilHealth => &SOIL_HEALTH,
            Self::Storm => &STORM,
            Self::Water => &WATER,
            Self::Yield => &YIELD,
            Self::PlantDisease | Self::SoilType => return InputLayout::Tensor,
        };
        InputLayout::Tabular(spec)
    }

    /// Bundle component holding the class labels for categorical domains.
    pub fn label_component(&self) -> Option<&'static str> {
        match self {
            Self::Crop => Some("encoder"),
            Self::PlantDisease => Some("labels"),
            _ => None,
        }
    }

    /// Class labels known without any artifact, in model output order.
    pub fn builtin_classes(&self) -> &'static [&'static str] {
        match self {
            Self::SoilType => &[
                "Alluvial soil",
                "Black Soil",
                "Cinder Soil",
                "Clayey soils",
                "Laterite soil",
                "Loamy soil",
                "Peat Soil",
                "Sandy loam",
                "Sandy soil",
                "Yellow Soil",
            ],
            _ => &[],
        }
    }

    /// Crops suited to a predicted soil class. Only soil type carries these.
    pub fn crop_recommendation(&self, label: &str) -> Option<CropRecommendation> {
        match self {
            Self::SoilType => SOIL_CROPS
                .iter()
                .find(|(soil, _)| *soil == label)
                .map(|(_, rec)| *rec),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRecommendation {
    pub primary: &'static [&'static str],
    pub secondary: &'static [&'static str],
}

static SOIL_CROPS: &[(&str, CropRecommendation)] = &[
    (
        "Alluvial soil",
        CropRecommendation {
            primary: &["Rice", "Wheat"],
            secondary: &["Sugarcane", "Maize"],
        },
    ),
    (
        "Black Soil",
        CropRecommendation {
            primary: &["Cotton", "Soybean"],
            secondary: &["Groundnut"],
        },
    ),
    (
        "Sandy soil",
        CropRecommendation {
            primary: &["Watermelon"],
            secondary: &["Millets"],
        },
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn tabular(domain: Domain) -> &'static FeatureSpec {
        match domain.input_layout() {
            InputLayout::Tabular(spec) => spec,
            InputLayout::Tensor => panic!("{domain} is tensor-shaped"),
        }
    }

    #[test]
    fn canonical_widths_match_trained_models() {
        assert_eq!(tabular(Domain::Aqi).width(), 12);
        assert_eq!(tabular(Domain::Co2).width(), 7);
        assert_eq!(tabular(Domain::Crop).width(), 7);
        assert_eq!(tabular(Domain::Flood).width(), 4);
        assert_eq!(tabular(Domain::Price).width(), 6);
        assert_eq!(tabular(Domain::Profit).width(), 6);
        assert_eq!(tabular(Domain::Rainfall).width(), 18);
        assert_eq!(tabular(Domain::Storm).width(), 4);
        assert_eq!(tabular(Domain::Yield).width(), 1);
    }

    #[test]
    fn rainfall_subdivision_slot_is_sixteen() {
        assert_eq!(tabular(Domain::Rainfall).position("subdivision"), Some(16));
    }

    #[test]
    fn field_names_unique_per_domain() {
        for domain in Domain::ALL {
            let InputLayout::Tabular(spec) = domain.input_layout() else {
                continue;
            };
            for (i, f) in spec.fields.iter().enumerate() {
                assert_eq!(spec.position(f.name), Some(i), "{domain}: dup {}", f.name);
            }
        }
    }

    #[test]
    fn keyed_binding_uses_field_name() {
        let crop = tabular(Domain::Price).fields[0];
        assert_eq!(
            crop.kind,
            FieldKind::Categorical(EncoderBinding::Keyed {
                component: "encoders",
                key: "crop"
            })
        );
    }

    #[test]
    fn soil_type_is_tensor_with_ten_classes() {
        assert_eq!(Domain::SoilType.input_layout(), InputLayout::Tensor);
        assert_eq!(Domain::SoilType.builtin_classes().len(), 10);
    }

    #[test]
    fn plant_disease_is_tensor_with_label_component() {
        assert_eq!(Domain::PlantDisease.input_layout(), InputLayout::Tensor);
        assert_eq!(Domain::PlantDisease.label_component(), Some("labels"));
        assert!(Domain::PlantDisease.builtin_classes().is_empty());
    }

    #[test]
    fn soil_classes_with_known_crops() {
        let black = Domain::SoilType.crop_recommendation("Black Soil").unwrap();
        assert_eq!(black.primary, &["Cotton", "Soybean"]);
        assert_eq!(black.secondary, &["Groundnut"]);
        // Every recommended soil is a class the model can emit.
        for (soil, _) in SOIL_CROPS {
            assert!(Domain::SoilType.builtin_classes().contains(soil));
        }
        assert!(Domain::SoilType.crop_recommendation("Peat Soil").is_none());
        assert!(Domain::Crop.crop_recommendation("Black Soil").is_none());
    }
}
