//! Air Quality Index transform.
//!
//! Maps raw pollutant concentrations onto the 0-500 EPA index with
//! piecewise-linear interpolation, takes the maximum sub-index as the
//! overall AQI and buckets it into six categories. This is the sole
//! source of training labels, so determinism matters more than speed.

mod breakpoints;


pub use breakpoints::Breakpoint;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Concentrations above this are treated as ug/m3 and converted to ppm.
/// CO never reaches 100 ppm in ambient data, while ug/m3 readings
/// routinely land in the hundreds.
const CO_UGM3_THRESHOLD: f64 = 100.0;

/// ug/m3 per ppm for CO at 25 C and 1 atm.
const CO_UGM3_PER_PPM: f64 = 1150.0;

// ============================================================================
// Pollutants
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pollutant {
    Pm25,
    Pm10,
    O3,
    Co,
    No2,
    So2,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::O3,
        Pollutant::Co,
        Pollutant::No2,
        Pollutant::So2,
    ];

    /// Canonical column name, matching the dataset headers.
    pub fn name(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::O3 => "O3",
            Pollutant::Co => "CO",
            Pollutant::No2 => "NO2",
            Pollutant::So2 => "SO2",
        }
    }

    pub fn from_name(name: &str) -> Option<Pollutant> {
        match name {
            "PM2.5" | "pm25" => Some(Pollutant::Pm25),
            "PM10" | "pm10" => Some(Pollutant::Pm10),
            "O3" | "o3" => Some(Pollutant::O3),
            "CO" | "co" => Some(Pollutant::Co),
            "NO2" | "no2" => Some(Pollutant::No2),
            "SO2" | "so2" => Some(Pollutant::So2),
            _ => None,
        }
    }

    fn table(&self) -> &'static [Breakpoint] {
        match self {
            Pollutant::Pm25 => breakpoints::PM25,
            Pollutant::Pm10 => breakpoints::PM10,
            Pollutant::O3 => breakpoints::O3,
            Pollutant::Co => breakpoints::CO,
            Pollutant::No2 => breakpoints::NO2,
            Pollutant::So2 => breakpoints::SO2,
        }
    }

    /// Truncate a reading to the precision of its breakpoint table,
    /// as the EPA computation prescribes. Keeps every non-negative
    /// value inside exactly one row.
    fn truncate(&self, concentration: f64) -> f64 {
        match self {
            Pollutant::Pm25 | Pollutant::Co => (concentration * 10.0).floor() / 10.0,
            _ => concentration.floor(),
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Sub-index and overall AQI
// ============================================================================

/// Sub-index for a single pollutant reading.
///
/// Returns `None` when the reading cannot contribute: NaN or negative.
/// Readings above the top breakpoint row clamp to the row's ceiling.
pub fn subindex(pollutant: Pollutant, concentration: f64) -> Option<f64> {
    if concentration.is_nan() || concentration < 0.0 {
        return None;
    }

    let concentration = match pollutant {
        Pollutant::Co if concentration > CO_UGM3_THRESHOLD => concentration / CO_UGM3_PER_PPM,
        _ => concentration,
    };
    let conc = pollutant.truncate(concentration);

    let table = pollutant.table();
    for row in table {
        if conc >= row.conc_lo && conc <= row.conc_hi {
            let span = row.conc_hi - row.conc_lo;
            let scaled = (row.index_hi - row.index_lo) / span * (conc - row.conc_lo);
            return Some(row.index_lo + scaled);
        }
    }

    table.last().map(|row| row.index_hi)
}

/// Overall AQI for a set of readings.
#[derive(Debug, Clone)]
pub struct AqiSummary {
    /// Maximum sub-index, rounded to the reported integer scale.
    pub aqi: f64,
    pub category: AqiCategory,
    /// Pollutant whose sub-index set the overall AQI.
    pub dominant: Option<Pollutant>,
    /// Every sub-index that contributed, unrounded.
    pub subindices: Vec<(Pollutant, f64)>,
}

/// Combine per-pollutant readings into an overall AQI.
///
/// Readings that yield no sub-index are skipped. With no usable
/// reading at all the AQI is 0, which buckets as Good.
pub fn overall(readings: &[(Pollutant, f64)]) -> AqiSummary {
    let mut subindices = Vec::with_capacity(readings.len());
    for &(pollutant, concentration) in readings {
        if let Some(value) = subindex(pollutant, concentration) {
            subindices.push((pollutant, value));
        }
    }

    let mut aqi = 0.0;
    let mut dominant = None;
    for &(pollutant, value) in &subindices {
        if value > aqi {
            aqi = value;
            dominant = Some(pollutant);
        }
    }

    let aqi = aqi.round();
    AqiSummary {
        aqi,
        category: AqiCategory::from_aqi(aqi),
        dominant,
        subindices,
    }
}

// ============================================================================
// Categories
// ============================================================================

/// The six AQI buckets, ordered from cleanest to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthySensitive,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    pub fn from_aqi(aqi: f64) -> AqiCategory {
        if aqi <= 50.0 {
            AqiCategory::Good
        } else if aqi <= 100.0 {
            AqiCategory::Moderate
        } else if aqi <= 150.0 {
            AqiCategory::UnhealthySensitive
        } else if aqi <= 200.0 {
            AqiCategory::Unhealthy
        } else if aqi <= 300.0 {
            AqiCategory::VeryUnhealthy
        } else {
            AqiCategory::Hazardous
        }
    }

    /// Display label, also used as the class string in trained models.
    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    /// Severity on a 1-6 scale, matching the dashboard legend.
    pub fn level(&self) -> u8 {
        match self {
            AqiCategory::Good => 1,
            AqiCategory::Moderate => 2,
            AqiCategory::UnhealthySensitive => 3,
            AqiCategory::Unhealthy => 4,
            AqiCategory::VeryUnhealthy => 5,
            AqiCategory::Hazardous => 6,
        }
    }

    /// UI color token for the category badge.
    pub fn color(&self) -> &'static str {
        match self {
            AqiCategory::Good => "bg-green-500",
            AqiCategory::Moderate => "bg-yellow-500",
            AqiCategory::UnhealthySensitive => "bg-orange-500",
            AqiCategory::Unhealthy => "bg-red-500",
            AqiCategory::VeryUnhealthy => "bg-purple-500",
            AqiCategory::Hazardous => "bg-purple-500",
        }
    }

    /// Parse a class label. Accepts the canonical labels plus the
    /// Vietnamese labels found in older dashboards and archives.
    pub fn parse(label: &str) -> Option<AqiCategory> {
        match label {
            "Good" | "Tốt" => Some(AqiCategory::Good),
            "Moderate" | "Trung bình" => Some(AqiCategory::Moderate),
            "Unhealthy for Sensitive Groups" | "Kém" | "Không tốt cho người nhạy cảm" => {
                Some(AqiCategory::UnhealthySensitive)
            }
            "Unhealthy" | "Xấu" | "Không tốt cho sức khỏe" => Some(AqiCategory::Unhealthy),
            "Very Unhealthy" | "Rất xấu" => Some(AqiCategory::VeryUnhealthy),
            "Hazardous" | "Nguy hại" => Some(AqiCategory::Hazardous),
            _ => None,
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
