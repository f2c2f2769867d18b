//! Validated per-domain requests and their rule-based estimators.
//!
//! Requests arrive already validated (ranges checked, required fields
//! present). Each one exposes its fields by name for the feature adapter and
//! carries a deterministic estimator used when no model result stands.

use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::features::FieldValue;

/// Output of a rule-based estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub value: f64,
    /// Class label for categorical domains.
    pub label: Option<String>,
}

impl Estimate {
    pub fn value(value: f64) -> Self {
        Self { value, label: None }
    }

    pub fn labelled(label: impl Into<String>, value: f64) -> Self {
        Self {
            value,
            label: Some(label.into()),
        }
    }
}

/// Borrowed tensor for tensor-shaped domains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorInput<'a> {
    pub values: &'a [f32],
    pub shape: [usize; 4],
}

/// What the pipeline needs from a validated request.
pub trait DomainInput: Send + Sync {
    fn domain(&self) -> Domain;

    /// Raw value of a named feature field. `None` leaves the slot zero.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;

    /// Deterministic rule-based estimate. `None` for domains with no sound
    /// substitute for a trained model.
    fn fallback(&self) -> Option<Estimate>;

    fn tensor(&self) -> Option<TensorInput<'_>> {
        None
    }

    /// Value the domain's threshold table is applied to.
    fn classification_value(&self, value: f64) -> f64 {
        value
    }

    /// Adjustment applied to the settled value, whichever path produced it.
    fn finalize(&self, value: f64) -> f64 {
        value
    }
}

fn num(v: f64) -> Option<FieldValue<'static>> {
    Some(FieldValue::Number(v))
}

fn opt(v: Option<f64>) -> Option<FieldValue<'static>> {
    v.map(FieldValue::Number)
}

fn text(s: &str) -> Option<FieldValue<'_>> {
    Some(FieldValue::Text(s))
}

// ── Air quality ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiRequest {
    pub city: String,
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub co: f64,
    pub o3: f64,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub visibility: Option<f64>,
}

/// (concentration low, concentration high, index low, index high)
type AqiBand = (f64, f64, f64, f64);

const PM25_BANDS: &[AqiBand] = &[
    (0.0, 12.0, 0.0, 50.0),
    (12.1, 35.4, 51.0, 100.0),
    (35.5, 55.4, 101.0, 150.0),
    (55.5, 150.4, 151.0, 200.0),
    (150.5, 250.4, 201.0, 300.0),
    (250.5, 350.4, 301.0, 400.0),
    (350.5, 500.4, 401.0, 500.0),
];

const PM10_BANDS: &[AqiBand] = &[
    (0.0, 54.0, 0.0, 50.0),
    (55.0, 154.0, 51.0, 100.0),
    (155.0, 254.0, 101.0, 150.0),
    (255.0, 354.0, 151.0, 200.0),
    (355.0, 424.0, 201.0, 300.0),
    (425.0, 504.0, 301.0, 400.0),
    (505.0, 604.0, 401.0, 500.0),
];

const NO2_BANDS: &[AqiBand] = &[
    (0.0, 53.0, 0.0, 50.0),
    (54.0, 100.0, 51.0, 100.0),
    (101.0, 360.0, 101.0, 150.0),
    (361.0, 649.0, 151.0, 200.0),
    (650.0, 1249.0, 201.0, 300.0),
    (1250.0, 1649.0, 301.0, 400.0),
    (1650.0, 2049.0, 401.0, 500.0),
];

/// Linear interpolation inside the matching band. Concentrations between or
/// beyond bands contribute zero.
fn sub_index(concentration: f64, bands: &[AqiBand]) -> f64 {
    bands
        .iter()
        .find(|(lo, hi, _, _)| *lo <= concentration && concentration <= *hi)
        .map(|(lo, hi, ilo, ihi)| (ihi - ilo) / (hi - lo) * (concentration - lo) + ilo)
        .unwrap_or(0.0)
}

impl DomainInput for AqiRequest {
    fn domain(&self) -> Domain {
        Domain::Aqi
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "pm25" => num(self.pm25),
            "pm10" => num(self.pm10),
            "no2" => num(self.no2),
            "so2" => num(self.so2),
            "co" => num(self.co),
            "o3" => num(self.o3),
            "temperature" => opt(self.temperature),
            "humidity" => opt(self.humidity),
            "wind_speed" => opt(self.wind_speed),
            "pressure" => opt(self.pressure),
            "visibility" => opt(self.visibility),
            "city" => text(&self.city),
            _ => None,
        }
    }

    /// Simplified EPA formula: worst of the PM2.5, PM10 and NO2 sub-indices,
    /// never below 50, capped at 500.
    fn fallback(&self) -> Option<Estimate> {
        let worst = sub_index(self.pm25, PM25_BANDS)
            .max(sub_index(self.pm10, PM10_BANDS))
            .max(sub_index(self.no2, NO2_BANDS))
            .max(50.0);
        Some(Estimate::value(worst.clamp(0.0, 500.0)))
    }
}

// ── CO2 ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Co2Request {
    pub year: i32,
    pub month: u32,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
}

impl DomainInput for Co2Request {
    fn domain(&self) -> Domain {
        Domain::Co2
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "month" => num(self.month as f64),
            "year" => num(self.year as f64),
            "temperature" => num(self.temperature),
            "humidity" => num(self.humidity),
            "pressure" => num(self.pressure),
            "wind_speed" => num(self.wind_speed),
            _ => None,
        }
    }

    /// Mauna Loa trend (315 ppm in 1958, +1.6 ppm/year), a seasonal swing
    /// of 4 ppm and a small temperature term, clamped to 280..=500.
    fn fallback(&self) -> Option<Estimate> {
        let base = 315.0 + (self.year - 1958) as f64 * 1.6;
        let seasonal = 4.0 * ((self.month as f64 - 4.0) * std::f64::consts::PI / 6.0).sin();
        let temp_effect = (self.temperature - 15.0) * 0.15;
        Some(Estimate::value(
            (base + seasonal + temp_effect).clamp(280.0, 500.0),
        ))
    }
}

// ── Crop recommendation ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRequest {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
}

impl DomainInput for CropRequest {
    fn domain(&self) -> Domain {
        Domain::Crop
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "nitrogen" => num(self.nitrogen),
            "phosphorus" => num(self.phosphorus),
            "potassium" => num(self.potassium),
            "temperature" => num(self.temperature),
            "humidity" => num(self.humidity),
            "ph" => num(self.ph),
            "rainfall" => num(self.rainfall),
            _ => None,
        }
    }

    /// Rice, the staple default. The score is zero: no class probability
    /// exists without a model.
    fn fallback(&self) -> Option<Estimate> {
        Some(Estimate::labelled("rice", 0.0))
    }
}

// ── Flood ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodRequest {
    pub state: String,
    pub district: String,
    pub rainfall_mm: f64,
    pub river_level: f64,
    pub elevation: f64,
    pub flood_history: u32,
}

impl DomainInput for FloodRequest {
    fn domain(&self) -> Domain {
        Domain::Flood
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "rainfall_mm" => num(self.rainfall_mm),
            "river_level" => num(self.river_level),
            "elevation" => num(self.elevation),
            "flood_history" => num(self.flood_history as f64),
            _ => None,
        }
    }

    fn fallback(&self) -> Option<Estimate> {
        let rain = match self.rainfall_mm {
            r if r > 300.0 => 0.4,
            r if r > 200.0 => 0.3,
            r if r > 100.0 => 0.2,
            _ => 0.1,
        };
        let river = match self.river_level {
            l if l > 10.0 => 0.3,
            l if l > 5.0 => 0.2,
            _ => 0.1,
        };
        let terrain = match self.elevation {
            e if e < 50.0 => 0.15,
            e if e < 100.0 => 0.1,
            _ => 0.05,
        };
        let history = (self.flood_history as f64 * 0.03).min(0.15);
        Some(Estimate::value((rain + river + terrain + history).min(1.0)))
    }
}

// ── NDVI ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdviRequest {
    pub red_band: f64,
    pub nir_band: f64,
    pub temperature: f64,
    pub rainfall: f64,
}

impl NdviRequest {
    /// Normalized difference vegetation index, zero when both bands are dark.
    pub fn ndvi(&self) -> f64 {
        let sum = self.nir_band + self.red_band;
        if sum == 0.0 {
            0.0
        } else {
            (self.nir_band - self.red_band) / sum
        }
    }
}

impl DomainInput for NdviRequest {
    fn domain(&self) -> Domain {
        Domain::Ndvi
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "ndvi" => num(self.ndvi()),
            "temperature" => num(self.temperature),
            "rainfall" => num(self.rainfall),
            _ => None,
        }
    }

    /// Vegetation health score 0..=100 from NDVI, nudged by growing conditions.
    fn fallback(&self) -> Option<Estimate> {
        let mut score = (self.ndvi() + 1.0) / 2.0 * 100.0;
        if (20.0..=30.0).contains(&self.temperature) {
            score *= 1.1;
        } else if self.temperature < 10.0 || self.temperature > 40.0 {
            score *= 0.8;
        }
        if (50.0..=200.0).contains(&self.rainfall) {
            score *= 1.05;
        } else if self.rainfall < 20.0 {
            score *= 0.85;
        }
        Some(Estimate::value(score.clamp(0.0, 100.0)))
    }

    /// Vegetation status is read from the index itself, not the health score.
    fn classification_value(&self, _value: f64) -> f64 {
        self.ndvi()
    }
}

// ── Market price ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRequest {
    pub crop: String,
    pub state: String,
    #[serde(default)]
    pub district: Option<String>,
    pub month: u32,
    pub year: i32,
}

impl PriceRequest {
    fn crop_key(&self) -> String {
        self.crop.trim().to_lowercase()
    }

    /// Relative market level per crop, applied to every price estimate.
    pub fn crop_multiplier(&self) -> f64 {
        match self.crop_key().as_str() {
            "rice" => 1.0,
            "wheat" => 1.08,
            "maize" => 0.9,
            "cotton" => 1.7,
            "soybean" => 1.3,
            "groundnut" => 1.5,
            "potato" => 0.85,
            "onion" => 0.95,
            "tomato" => 1.1,
            "sugarcane" => 0.2,
            _ => 1.0,
        }
    }
}

impl DomainInput for PriceRequest {
    fn domain(&self) -> Domain {
        Domain::Price
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "crop" => text(&self.crop),
            "state" => text(&self.state),
            "month" => num(self.month as f64),
            "year" => num(self.year as f64),
            _ => None,
        }
    }

    /// Base price per quintal with a harvest-season dip, a lean-season
    /// premium and 1.5 % yearly inflation from 2020.
    fn fallback(&self) -> Option<Estimate> {
        let mut base = match self.crop_key().as_str() {
            "rice" => 2000.0,
            "wheat" => 2200.0,
            "maize" => 1800.0,
            "cotton" => 6000.0,
            "sugarcane" => 350.0,
            "soybean" => 4200.0,
            "groundnut" => 5600.0,
            "potato" => 1500.0,
            "onion" => 2100.0,
            "tomato" => 2600.0,
            _ => 2500.0,
        };
        match self.month {
            3..=5 => base *= 0.9,
            8..=10 => base *= 1.1,
            _ => {}
        }
        base *= 1.0 + (self.year - 2020) as f64 * 0.015;
        Some(Estimate::value(base))
    }

    fn finalize(&self, value: f64) -> f64 {
        value * self.crop_multiplier()
    }
}

// ── Profit ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitRequest {
    pub crop: String,
    pub area_hectares: f64,
    pub cost_per_hectare: f64,
    pub expected_yield: f64,
    pub market_price: f64,
}

impl ProfitRequest {
    pub fn total_cost(&self) -> f64 {
        self.cost_per_hectare * self.area_hectares
    }

    pub fn total_revenue(&self) -> f64 {
        self.expected_yield * self.market_price * self.area_hectares
    }
}

impl DomainInput for ProfitRequest {
    fn domain(&self) -> Domain {
        Domain::Profit
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "crop" => text(&self.crop),
            "area_hectares" => num(self.area_hectares),
            "cost_per_hectare" => num(self.cost_per_hectare),
            "expected_yield" => num(self.expected_yield),
            "market_price" => num(self.market_price),
            _ => None,
        }
    }

    fn fallback(&self) -> Option<Estimate> {
        Some(Estimate::value(self.total_revenue() - self.total_cost()))
    }

    /// Profitability is bucketed on return on investment, in percent.
    fn classification_value(&self, value: f64) -> f64 {
        let cost = self.total_cost();
        if cost > 0.0 { value / cost * 100.0 } else { 0.0 }
    }
}

// ── Rainfall ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RainfallRequest {
    pub subdivision: String,
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
}

impl DomainInput for RainfallRequest {
    fn domain(&self) -> Domain {
        Domain::Rainfall
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "month" => num(self.month as f64),
            "year" => num(self.year as f64),
            "temperature" => opt(self.temperature),
            "humidity" => opt(self.humidity),
            "pressure" => opt(self.pressure),
            "subdivision" => text(&self.subdivision),
            _ => None,
        }
    }

    /// 100 mm scaled by a monsoon factor for the month, plus 2 mm per degree
    /// above 20 °C (25 °C assumed when unknown).
    fn fallback(&self) -> Option<Estimate> {
        let factor = match self.month {
            1 | 2 => 0.2,
            3 | 12 => 0.3,
            4 | 11 => 0.4,
            5 => 0.5,
            6 | 9 => 1.5,
            7 => 2.0,
            8 => 1.8,
            10 => 0.8,
            _ => 1.0,
        };
        let temperature = self.temperature.unwrap_or(25.0);
        let temp_effect = ((temperature - 20.0) * 2.0).max(0.0);
        Some(Estimate::value(100.0 * factor + temp_effect))
    }
}

// ── Soil health ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilHealthRequest {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub ph: f64,
    pub organic_carbon: f64,
    pub ec: f64,
}

impl DomainInput for SoilHealthRequest {
    fn domain(&self) -> Domain {
        Domain::SoilHealth
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "nitrogen" => num(self.nitrogen),
            "phosphorus" => num(self.phosphorus),
            "potassium" => num(self.potassium),
            "ph" => num(self.ph),
            "organic_carbon" => num(self.organic_carbon),
            "ec" => num(self.ec),
            _ => None,
        }
    }

    /// 20 points for each nutrient inside its optimal band.
    fn fallback(&self) -> Option<Estimate> {
        let checks = [
            (250.0..=500.0).contains(&self.nitrogen),
            (25.0..=50.0).contains(&self.phosphorus),
            (200.0..=300.0).contains(&self.potassium),
            (6.0..=7.5).contains(&self.ph),
            self.organic_carbon >= 0.75,
        ];
        let score = checks.iter().filter(|ok| **ok).count() as f64 * 20.0;
        Some(Estimate::value(score))
    }
}

// ── Soil type from image ──

/// Pre-decoded RGB image, row-major `height × width × channels`, values in 0..=1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilImageRequest {
    pub height: usize,
    pub width: usize,
    #[serde(default = "default_channels")]
    pub channels: usize,
    pub pixels: Vec<f32>,
}

fn default_channels() -> usize {
    3
}

impl DomainInput for SoilImageRequest {
    fn domain(&self) -> Domain {
        Domain::SoilType
    }

    fn field(&self, _name: &str) -> Option<FieldValue<'_>> {
        None
    }

    fn fallback(&self) -> Option<Estimate> {
        None
    }

    fn tensor(&self) -> Option<TensorInput<'_>> {
        Some(TensorInput {
            values: &self.pixels,
            shape: [1, self.height, self.width, self.channels],
        })
    }
}

// ── Plant disease from leaf image ──

/// Pre-decoded RGB leaf image, laid out like [`SoilImageRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafImageRequest {
    pub height: usize,
    pub width: usize,
    #[serde(default = "default_channels")]
    pub channels: usize,
    pub pixels: Vec<f32>,
}

impl DomainInput for LeafImageRequest {
    fn domain(&self) -> Domain {
        Domain::PlantDisease
    }

    fn field(&self, _name: &str) -> Option<FieldValue<'_>> {
        None
    }

    fn fallback(&self) -> Option<Estimate> {
        None
    }

    fn tensor(&self) -> Option<TensorInput<'_>> {
        Some(TensorInput {
            values: &self.pixels,
            shape: [1, self.height, self.width, self.channels],
        })
    }
}

// ── Storm ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StormRequest {
    pub state: String,
    pub month: u32,
    pub wind_speed: f64,
    pub pressure: f64,
    pub humidity: f64,
}

impl DomainInput for StormRequest {
    fn domain(&self) -> Domain {
        Domain::Storm
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "month" => num(self.month as f64),
            "wind_speed" => num(self.wind_speed),
            "pressure" => num(self.pressure),
            "humidity" => num(self.humidity),
            _ => None,
        }
    }

    /// Additive wind, low-pressure and humidity terms, boosted 30 % in the
    /// pre- and post-monsoon cyclone months.
    fn fallback(&self) -> Option<Estimate> {
        let wind = match self.wind_speed {
            w if w > 100.0 => 0.4,
            w if w > 60.0 => 0.25,
            w if w > 40.0 => 0.15,
            _ => 0.0,
        };
        let pressure = match self.pressure {
            p if p < 990.0 => 0.35,
            p if p < 1000.0 => 0.2,
            p if p < 1010.0 => 0.1,
            _ => 0.0,
        };
        let humidity = match self.humidity {
            h if h > 85.0 => 0.15,
            h if h > 70.0 => 0.1,
            _ => 0.0,
        };
        let mut risk: f64 = wind + pressure + humidity;
        if matches!(self.month, 4 | 5 | 10 | 11) {
            risk *= 1.3;
        }
        Some(Estimate::value(risk.min(1.0)))
    }
}

// ── Water requirement ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterRequest {
    pub crop: String,
    pub growth_stage: String,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_type: String,
    pub area_hectares: f64,
    #[serde(default)]
    pub rainfall: Option<f64>,
    #[serde(default)]
    pub soil_moisture: Option<f64>,
}

impl WaterRequest {
    /// (stage index, crop coefficient) for the growth stage.
    fn stage(&self) -> Option<(f64, f64)> {
        match self.growth_stage.trim().to_lowercase().as_str() {
            "seedling" => Some((0.0, 0.4)),
            "vegetative" => Some((1.0, 0.8)),
            "flowering" => Some((2.0, 1.15)),
            "maturity" => Some((3.0, 0.7)),
            _ => None,
        }
    }
}

impl DomainInput for WaterRequest {
    fn domain(&self) -> Domain {
        Domain::Water
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "temperature" => num(self.temperature),
            "humidity" => num(self.humidity),
            "rainfall" => opt(self.rainfall),
            "soil_moisture" => opt(self.soil_moisture),
            "crop_coefficient" => opt(self.stage().map(|(_, kc)| kc)),
            "growth_stage_index" => opt(self.stage().map(|(i, _)| i)),
            _ => None,
        }
    }

    fn fallback(&self) -> Option<Estimate> {
        None
    }
}

// ── Yield ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldRequest {
    pub crop: String,
    pub state: String,
    pub district: String,
    pub season: String,
    pub area_hectares: f64,
}

/// Yields below this are treated as a data artefact, not a forecast.
pub const MIN_YIELD_KG_PER_HA: f64 = 500.0;

impl DomainInput for YieldRequest {
    fn domain(&self) -> Domain {
        Domain::Yield
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "area_hectares" => num(self.area_hectares),
            _ => None,
        }
    }

    /// National average yield in kg/ha for the crop.
    fn fallback(&self) -> Option<Estimate> {
        let avg = match self.crop.trim().to_lowercase().as_str() {
            "rice" => 2500.0,
            "wheat" => 3000.0,
            "maize" => 2800.0,
            "cotton" => 400.0,
            "sugarcane" => 70000.0,
            "groundnut" => 1500.0,
            "soybean" => 1000.0,
            "potato" => 20000.0,
            "onion" => 15000.0,
            "tomato" => 20000.0,
            _ => 2000.0,
        };
        Some(Estimate::value(avg))
    }

    fn finalize(&self, value: f64) -> f64 {
        value.max(MIN_YIELD_KG_PER_HA)
    }
}

// ── Tagged envelope ──

/// Any validated request, tagged by `"domain"` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum DomainRequest {
    Aqi(AqiRequest),
    Co2(Co2Request),
    Crop(CropRequest),
    Flood(FloodRequest),
    Ndvi(NdviRequest),
    PlantDisease(LeafImageRequest),
    Price(PriceRequest),
    Profit(ProfitRequest),
    Rainfall(RainfallRequest),
    SoilHealth(SoilHealthRequest),
    SoilType(SoilImageRequest),
    Storm(StormRequest),
    Water(WaterRequest),
    Yield(YieldRequest),
}

impl DomainRequest {
    pub fn input(&self) -> &dyn DomainInput {
        match self {
            Self::Aqi(r) => r,
            Self::Co2(r) => r,
            Self::Crop(r) => r,
            Self::Flood(r) => r,
            Self::Ndvi(r) => r,
            Self::PlantDisease(r) => r,
            Self::Price(r) => r,
            Self::Profit(r) => r,
            Self::Rainfall(r) => r,
            Self::SoilHealth(r) => r,
            Self::SoilType(r) => r,
            Self::Storm(r) => r,
            Self::Water(r) => r,
            Self::Yield(r) => r,
        }
    }

    pub fn domain(&self) -> Domain {
        self.input().domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flood(rainfall_mm: f64, river_level: f64, elevation: f64, history: u32) -> FloodRequest {
        FloodRequest {
            state: "Bihar".into(),
            district: "Patna".into(),
            rainfall_mm,
            river_level,
            elevation,
            flood_history: history,
        }
    }

    fn aqi(pm25: f64, pm10: f64, no2: f64) -> AqiRequest {
        AqiRequest {
            city: "Delhi".into(),
            pm25,
            pm10,
            no2,
            so2: 10.0,
            co: 1.0,
            o3: 30.0,
            temperature: None,
            humidity: None,
            wind_speed: None,
            pressure: None,
            visibility: None,
        }
    }

    #[test]
    fn flood_fallback_heavy_rain_low_ground() {
        // 0.3 (rain) + 0.2 (river) + 0.15 (elevation) + 0.09 (history)
        let est = flood(250.0, 8.0, 40.0, 3).fallback().unwrap();
        assert!((est.value - 0.74).abs() < 1e-9, "got {}", est.value);
    }

    #[test]
    fn flood_fallback_caps_history_and_total() {
        let est = flood(500.0, 20.0, 0.0, 10).fallback().unwrap();
        // 0.4 + 0.3 + 0.15 + min(0.15, 0.3)
        assert!((est.value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn aqi_fallback_has_floor_of_fifty() {
        let est = aqi(5.0, 10.0, 5.0).fallback().unwrap();
        assert_eq!(est.value, 50.0);
    }

    #[test]
    fn aqi_fallback_takes_worst_sub_index() {
        // PM2.5 of 35.4 is the top of the 51..100 band.
        let est = aqi(35.4, 10.0, 5.0).fallback().unwrap();
        assert!((est.value - 100.0).abs() < 1e-9);
    }

    #[test]
    fn aqi_concentration_between_bands_contributes_zero() {
        assert_eq!(sub_index(12.05, PM25_BANDS), 0.0);
        assert_eq!(sub_index(900.0, PM25_BANDS), 0.0);
    }

    #[test]
    fn storm_fallback_cyclone_month_boost() {
        let calm_month = StormRequest {
            state: "Odisha".into(),
            month: 1,
            wind_speed: 70.0,
            pressure: 995.0,
            humidity: 80.0,
        };
        let cyclone_month = StormRequest {
            month: 10,
            ..calm_month.clone()
        };
        let a = calm_month.fallback().unwrap().value;
        let b = cyclone_month.fallback().unwrap().value;
        assert!((a - 0.55).abs() < 1e-9);
        assert!((b - 0.715).abs() < 1e-9);
    }

    #[test]
    fn co2_fallback_tracks_trend() {
        let req = Co2Request {
            year: 2020,
            month: 4,
            temperature: 15.0,
            humidity: 50.0,
            pressure: 1010.0,
            wind_speed: 10.0,
        };
        // 315 + 62 * 1.6, no seasonal or temperature term.
        let est = req.fallback().unwrap();
        assert!((est.value - 414.2).abs() < 1e-9);
    }

    #[test]
    fn rainfall_fallback_monsoon_peak() {
        let req = RainfallRequest {
            subdivision: "Konkan & Goa".into(),
            month: 7,
            year: 2024,
            temperature: None,
            humidity: None,
            pressure: None,
        };
        assert_eq!(req.fallback().unwrap().value, 210.0);
    }

    #[test]
    fn ndvi_index_and_classification_value() {
        let req = NdviRequest {
            red_band: 0.1,
            nir_band: 0.5,
            temperature: 25.0,
            rainfall: 100.0,
        };
        let ndvi = req.ndvi();
        assert!((ndvi - 0.4 / 0.6).abs() < 1e-9);
        assert_eq!(req.classification_value(12.0), ndvi);
        assert_eq!(NdviRequest { red_band: 0.0, nir_band: 0.0, ..req }.ndvi(), 0.0);
    }

    #[test]
    fn price_finalize_applies_crop_multiplier() {
        let req = PriceRequest {
            crop: " Cotton ".into(),
            state: "Gujarat".into(),
            district: None,
            month: 1,
            year: 2020,
        };
        assert_eq!(req.fallback().unwrap().value, 6000.0);
        assert!((req.finalize(6000.0) - 10200.0).abs() < 1e-9);
    }

    #[test]
    fn profit_roi_guards_zero_cost() {
        let req = ProfitRequest {
            crop: "wheat".into(),
            area_hectares: 2.0,
            cost_per_hectare: 0.0,
            expected_yield: 30.0,
            market_price: 2000.0,
        };
        assert_eq!(req.classification_value(1000.0), 0.0);
        assert_eq!(req.fallback().unwrap().value, 120000.0);
    }

    #[test]
    fn soil_health_scores_optimal_bands() {
        let req = SoilHealthRequest {
            nitrogen: 280.0,
            phosphorus: 35.0,
            potassium: 250.0,
            ph: 6.5,
            organic_carbon: 0.8,
            ec: 0.5,
        };
        assert_eq!(req.fallback().unwrap().value, 100.0);
    }

    #[test]
    fn yield_floor_applies_to_any_path() {
        let req = YieldRequest {
            crop: "Cotton".into(),
            state: "Punjab".into(),
            district: "Ludhiana".into(),
            season: "Kharif".into(),
            area_hectares: 5.0,
        };
        assert_eq!(req.fallback().unwrap().value, 400.0);
        assert_eq!(req.finalize(400.0), MIN_YIELD_KG_PER_HA);
        assert_eq!(req.finalize(2500.0), 2500.0);
    }

    #[test]
    fn water_stage_fields_zero_when_unknown() {
        let req = WaterRequest {
            crop: "rice".into(),
            growth_stage: "Flowering".into(),
            temperature: 30.0,
            humidity: 60.0,
            soil_type: "loamy".into(),
            area_hectares: 1.0,
            rainfall: None,
            soil_moisture: None,
        };
        assert_eq!(req.field("crop_coefficient"), Some(FieldValue::Number(1.15)));
        assert_eq!(req.field("rainfall"), None);
        let unknown = WaterRequest {
            growth_stage: "dormant".into(),
            ..req
        };
        assert_eq!(unknown.field("growth_stage_index"), None);
        assert!(unknown.fallback().is_none());
    }

    #[test]
    fn estimators_are_deterministic() {
        let requests = [
            DomainRequest::Aqi(aqi(80.0, 120.0, 40.0)),
            DomainRequest::Co2(Co2Request {
                year: 2023,
                month: 6,
                temperature: 31.0,
                humidity: 70.0,
                pressure: 1002.0,
                wind_speed: 12.0,
            }),
            DomainRequest::Crop(CropRequest {
                nitrogen: 90.0,
                phosphorus: 42.0,
                potassium: 43.0,
                temperature: 21.0,
                humidity: 82.0,
                ph: 6.5,
                rainfall: 203.0,
            }),
            DomainRequest::Flood(flood(120.0, 6.0, 80.0, 2)),
            DomainRequest::Ndvi(NdviRequest {
                red_band: 0.12,
                nir_band: 0.55,
                temperature: 27.0,
                rainfall: 90.0,
            }),
            DomainRequest::Price(PriceRequest {
                crop: "onion".into(),
                state: "Maharashtra".into(),
                district: Some("Nashik".into()),
                month: 11,
                year: 2024,
            }),
            DomainRequest::Profit(ProfitRequest {
                crop: "wheat".into(),
                area_hectares: 3.0,
                cost_per_hectare: 25000.0,
                expected_yield: 40.0,
                market_price: 2200.0,
            }),
            DomainRequest::Rainfall(RainfallRequest {
                subdivision: "Kerala".into(),
                month: 6,
                year: 2024,
                temperature: Some(29.0),
                humidity: Some(85.0),
                pressure: None,
            }),
            DomainRequest::SoilHealth(SoilHealthRequest {
                nitrogen: 180.0,
                phosphorus: 12.0,
                potassium: 300.0,
                ph: 8.1,
                organic_carbon: 0.4,
                ec: 1.2,
            }),
            DomainRequest::Storm(StormRequest {
                state: "Odisha".into(),
                month: 5,
                wind_speed: 110.0,
                pressure: 975.0,
                humidity: 88.0,
            }),
            DomainRequest::Yield(YieldRequest {
                crop: "rice".into(),
                state: "Punjab".into(),
                district: "Ludhiana".into(),
                season: "Kharif".into(),
                area_hectares: 2.0,
            }),
        ];
        for req in &requests {
            let a = req.input().fallback();
            let b = req.input().fallback();
            assert!(a.is_some(), "{} has no estimator", req.domain());
            assert_eq!(a, b, "{}", req.domain());
        }
        let covered: Vec<_> = requests.iter().map(DomainRequest::domain).collect();
        for domain in Domain::ALL.into_iter().filter(|d| !d.requires_model()) {
            assert!(covered.contains(&domain), "{domain} not exercised");
        }
    }

    #[test]
    fn tagged_request_parses_from_json() {
        let json = r#"{
            "domain": "flood",
            "state": "Bihar",
            "district": "Patna",
            "rainfall_mm": 250,
            "river_level": 8,
            "elevation": 40,
            "flood_history": 3
        }"#;
        let req: DomainRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.domain(), Domain::Flood);
        assert_eq!(req.input().field("river_level"), Some(FieldValue::Number(8.0)));
    }

    #[test]
    fn soil_image_exposes_nhwc_tensor() {
        let req = SoilImageRequest {
            height: 2,
            width: 2,
            channels: 3,
            pixels: vec![0.5; 12],
        };
        let t = req.tensor().unwrap();
        assert_eq!(t.shape, [1, 2, 2, 3]);
        assert_eq!(t.values.len(), 12);
        assert!(req.fallback().is_none());
    }

    #[test]
    fn leaf_image_parses_with_default_channels() {
        let json = r#"{"domain": "plant_disease", "height": 1, "width": 2, "pixels": [0, 0, 0, 1, 1, 1]}"#;
        let req: DomainRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.domain(), Domain::PlantDisease);
        let t = req.input().tensor().unwrap();
        assert_eq!(t.shape, [1, 1, 2, 3]);
        assert!(req.input().fallback().is_none());
    }
}
