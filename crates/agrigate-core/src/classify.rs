//! Threshold classification of numeric predictions into qualitative buckets.
//!
//! Each domain owns an ordered breakpoint table. Scanning from the low end,
//! the first breakpoint the value satisfies wins; a value past every
//! breakpoint lands in the terminal bucket. Tables are ordered from the
//! lowest bucket to the highest, so for risk domains a larger value never
//! maps to a safer bucket.

use crate::domain::Domain;

/// Upper bound of one bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub bound: f64,
    /// `true` for `value <= bound`, `false` for `value < bound`.
    pub inclusive: bool,
    pub bucket: &'static str,
}

const fn upto(bound: f64, bucket: &'static str) -> Breakpoint {
    Breakpoint {
        bound,
        inclusive: true,
        bucket,
    }
}

const fn below(bound: f64, bucket: &'static str) -> Breakpoint {
    Breakpoint {
        bound,
        inclusive: false,
        bucket,
    }
}

/// Ordered breakpoints plus the bucket for everything beyond them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdTable {
    pub breakpoints: &'static [Breakpoint],
    pub terminal: &'static str,
}

impl ThresholdTable {
    /// Position of the bucket `value` falls into, `0` being the lowest.
    ///
    /// NaN satisfies no breakpoint and lands in the terminal bucket.
    pub fn rank(&self, value: f64) -> usize {
        self.breakpoints
            .iter()
            .position(|bp| {
                if bp.inclusive {
                    value <= bp.bound
                } else {
                    value < bp.bound
                }
            })
            .unwrap_or(self.breakpoints.len())
    }

    pub fn bucket(&self, value: f64) -> &'static str {
        let rank = self.rank(value);
        self.breakpoints
            .get(rank)
            .map(|bp| bp.bucket)
            .unwrap_or(self.terminal)
    }

    /// Every bucket, lowest first.
    pub fn buckets(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.breakpoints
            .iter()
            .map(|bp| bp.bucket)
            .chain(std::iter::once(self.terminal))
    }
}

static AQI: ThresholdTable = ThresholdTable {
    breakpoints: &[
        upto(50.0, "good"),
        upto(100.0, "moderate"),
        upto(150.0, "unhealthy_sensitive"),
        upto(200.0, "unhealthy"),
        upto(300.0, "very_unhealthy"),
    ],
    terminal: "hazardous",
};

static RISK: ThresholdTable = ThresholdTable {
    breakpoints: &[below(0.4, "low"), below(0.7, "moderate")],
    terminal: "high",
};

static RAINFALL: ThresholdTable = ThresholdTable {
    breakpoints: &[
        below(50.0, "scanty"),
        below(100.0, "light"),
        below(200.0, "moderate"),
        below(400.0, "heavy"),
    ],
    terminal: "very_heavy",
};

static CO2: ThresholdTable = ThresholdTable {
    breakpoints: &[
        below(350.0, "normal"),
        below(400.0, "elevated"),
        below(450.0, "high"),
    ],
    terminal: "very_high",
};

static NDVI: ThresholdTable = ThresholdTable {
    breakpoints: &[
        below(0.1, "very_low"),
        below(0.3, "low"),
        below(0.6, "moderate"),
    ],
    terminal: "high",
};

static YIELD: ThresholdTable = ThresholdTable {
    breakpoints: &[upto(1500.0, "low"), upto(3000.0, "moderate")],
    terminal: "high",
};

static PROFIT: ThresholdTable = ThresholdTable {
    breakpoints: &[
        upto(0.0, "loss"),
        upto(20.0, "low"),
        upto(50.0, "moderate"),
    ],
    terminal: "high",
};

static SOIL_HEALTH: ThresholdTable = ThresholdTable {
    breakpoints: &[below(40.0, "poor"), below(70.0, "moderate")],
    terminal: "good",
};

static PRICE: ThresholdTable = ThresholdTable {
    breakpoints: &[],
    terminal: "stable",
};

static WATER: ThresholdTable = ThresholdTable {
    breakpoints: &[],
    terminal: "computed",
};

impl Domain {
    /// Threshold table for numeric domains. Categorical domains bucket by
    /// decoded class label instead and have no table.
    pub fn thresholds(&self) -> Option<&'static ThresholdTable> {
        match self {
            Self::Aqi => Some(&AQI),
            Self::Flood | Self::Storm => Some(&RISK),
            Self::Rainfall => Some(&RAINFALL),
            Self::Co2 => Some(&CO2),
            Self::Ndvi => Some(&NDVI),
            Self::Yield => Some(&YIELD),
            Self::Profit => Some(&PROFIT),
            Self::SoilHealth => Some(&SOIL_HEALTH),
            Self::Price => Some(&PRICE),
            Self::Water => Some(&WATER),
            Self::Crop | Self::PlantDisease | Self::SoilType => None,
        }
    }

    /// Bucket for a decoded class. Plant disease folds its many labels into
    /// a health status; other categorical domains bucket by the label itself.
    pub fn class_bucket(&self, label: &str, probability: f64) -> String {
        match self {
            Self::PlantDisease if label.to_ascii_lowercase().contains("healthy") => {
                "healthy".to_string()
            }
            Self::PlantDisease if probability < EARLY_STAGE_BELOW => "early_stage".to_string(),
            Self::PlantDisease => "diseased".to_string(),
            _ => label.to_string(),
        }
    }
}

/// A diseased class predicted with less certainty than this reads as early stage.
pub const EARLY_STAGE_BELOW: f64 = 0.90;

/// Bucket for `value` in `domain`, or `None` for categorical domains.
pub fn classify(domain: Domain, value: f64) -> Option<&'static str> {
    domain.thresholds().map(|t| t.bucket(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aqi_breakpoints_exact() {
        assert_eq!(classify(Domain::Aqi, 0.0), Some("good"));
        assert_eq!(classify(Domain::Aqi, 42.0), Some("good"));
        assert_eq!(classify(Domain::Aqi, 50.0), Some("good"));
        assert_eq!(classify(Domain::Aqi, 50.1), Some("moderate"));
        assert_eq!(classify(Domain::Aqi, 100.0), Some("moderate"));
        assert_eq!(classify(Domain::Aqi, 150.0), Some("unhealthy_sensitive"));
        assert_eq!(classify(Domain::Aqi, 200.0), Some("unhealthy"));
        assert_eq!(classify(Domain::Aqi, 300.0), Some("very_unhealthy"));
        assert_eq!(classify(Domain::Aqi, 300.5), Some("hazardous"));
    }

    #[test]
    fn flood_and_storm_share_risk_breakpoints() {
        for domain in [Domain::Flood, Domain::Storm] {
            assert_eq!(classify(domain, 0.39), Some("low"));
            assert_eq!(classify(domain, 0.4), Some("moderate"));
            assert_eq!(classify(domain, 0.69), Some("moderate"));
            assert_eq!(classify(domain, 0.7), Some("high"));
            assert_eq!(classify(domain, 1.0), Some("high"));
        }
    }

    #[test]
    fn rainfall_breakpoints_exact() {
        assert_eq!(classify(Domain::Rainfall, 49.9), Some("scanty"));
        assert_eq!(classify(Domain::Rainfall, 50.0), Some("light"));
        assert_eq!(classify(Domain::Rainfall, 199.9), Some("moderate"));
        assert_eq!(classify(Domain::Rainfall, 200.0), Some("heavy"));
        assert_eq!(classify(Domain::Rainfall, 400.0), Some("very_heavy"));
    }

    #[test]
    fn co2_breakpoints_exact() {
        assert_eq!(classify(Domain::Co2, 349.0), Some("normal"));
        assert_eq!(classify(Domain::Co2, 350.0), Some("elevated"));
        assert_eq!(classify(Domain::Co2, 420.0), Some("high"));
        assert_eq!(classify(Domain::Co2, 450.0), Some("very_high"));
    }

    #[test]
    fn yield_and_profit_use_strict_upper_comparisons() {
        assert_eq!(classify(Domain::Yield, 1500.0), Some("low"));
        assert_eq!(classify(Domain::Yield, 1500.5), Some("moderate"));
        assert_eq!(classify(Domain::Yield, 3000.5), Some("high"));
        assert_eq!(classify(Domain::Profit, 0.0), Some("loss"));
        assert_eq!(classify(Domain::Profit, 0.1), Some("low"));
        assert_eq!(classify(Domain::Profit, 50.0), Some("moderate"));
        assert_eq!(classify(Domain::Profit, 50.1), Some("high"));
    }

    #[test]
    fn categorical_domains_have_no_table() {
        assert_eq!(classify(Domain::Crop, 0.9), None);
        assert_eq!(classify(Domain::SoilType, 0.9), None);
        assert_eq!(classify(Domain::PlantDisease, 0.9), None);
    }

    #[test]
    fn plant_disease_buckets_by_health_status() {
        let d = Domain::PlantDisease;
        assert_eq!(d.class_bucket("Tomato___healthy", 0.4), "healthy");
        assert_eq!(d.class_bucket("Apple___Apple_scab", 0.89), "early_stage");
        assert_eq!(d.class_bucket("Apple___Apple_scab", 0.90), "diseased");
        assert_eq!(d.class_bucket("Apple___Apple_scab", 1.0), "diseased");
        assert_eq!(Domain::Crop.class_bucket("rice", 0.2), "rice");
    }

    #[test]
    fn tables_are_strictly_ascending() {
        for domain in Domain::ALL {
            let Some(table) = domain.thresholds() else {
                continue;
            };
            for pair in table.breakpoints.windows(2) {
                assert!(
                    pair[0].bound < pair[1].bound,
                    "{domain}: {} !< {}",
                    pair[0].bound,
                    pair[1].bound
                );
            }
        }
    }

    #[test]
    fn every_value_maps_to_exactly_one_bucket() {
        let probes = [
            f64::NEG_INFINITY,
            -1e9,
            -1.0,
            0.0,
            0.35,
            0.7,
            49.99,
            150.0,
            399.0,
            1e9,
            f64::INFINITY,
        ];
        for domain in Domain::ALL {
            let Some(table) = domain.thresholds() else {
                continue;
            };
            let buckets: Vec<_> = table.buckets().collect();
            for v in probes {
                let b = table.bucket(v);
                assert_eq!(buckets.iter().filter(|x| **x == b).count(), 1);
            }
        }
    }

    #[test]
    fn risk_never_gets_safer_as_value_rises() {
        for domain in [Domain::Flood, Domain::Storm, Domain::Aqi] {
            let table = domain.thresholds().unwrap();
            let mut prev = 0;
            let mut v = -0.5;
            while v < 600.0 {
                let rank = table.rank(v);
                assert!(rank >= prev, "{domain}: rank dropped at {v}");
                prev = rank;
                v += if v < 2.0 { 0.01 } else { 0.5 };
            }
        }
    }
}
