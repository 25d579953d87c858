//! Feature schema and serve-time feature resolution.
//!
//! Training and serving must agree on what each column means. The
//! layout lives in [`layout`]; this module turns a client's sparse
//! feature map into the dense vector a model expects.

pub mod layout;

#[cfg(test)]
mod tests;

pub use layout::{layout_hash, FEATURE_VERSION};

use std::collections::HashMap;

/// PM10 is roughly total suspended particles scaled down.
pub const TSP_TO_PM10_RATIO: f64 = 1.5;

/// Keeps the PM ratio finite when PM10 is tiny.
pub const PM_RATIO_EPSILON: f64 = 1e-6;

/// Morning and evening traffic peaks, local time.
pub fn is_rush_hour(hour: u32) -> bool {
    matches!(hour, 7 | 8 | 17 | 18)
}

/// Build the dense input row for a model from a sparse sample.
///
/// A value the client sent always wins. Derivable columns are
/// recomputed from the raw values; anything else defaults to 0.
pub fn resolve(feature_names: &[String], sample: &HashMap<String, f64>) -> Vec<f64> {
    feature_names
        .iter()
        .map(|name| resolve_one(name, sample))
        .collect()
}

fn resolve_one(name: &str, sample: &HashMap<String, f64>) -> f64 {
    if let Some(&value) = sample.get(name) {
        return value;
    }
    match name {
        "PM10" => resolved_pm10(sample),
        "PM_ratio" => {
            let pm10 = resolved_pm10(sample);
            if pm10 <= 0.0 {
                0.0
            } else {
                raw(sample, "PM2.5") / (pm10 + PM_RATIO_EPSILON)
            }
        }
        "Temp_Humid_Idx" => raw(sample, "Temperature") * raw(sample, "Humidity") / 100.0,
        "Is_Rush_Hour" => {
            let hour = raw(sample, "Hour");
            if hour >= 0.0 && is_rush_hour(hour as u32) {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

fn raw(sample: &HashMap<String, f64>, key: &str) -> f64 {
    sample.get(key).copied().unwrap_or(0.0)
}

fn resolved_pm10(sample: &HashMap<String, f64>) -> f64 {
    if let Some(&pm10) = sample.get("PM10") {
        pm10
    } else if let Some(&tsp) = sample.get("TSP") {
        tsp / TSP_TO_PM10_RATIO
    } else {
        0.0
    }
}
