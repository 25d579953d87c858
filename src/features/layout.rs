//! Canonical feature layout.
//!
//! Rules:
//! - Order is part of the contract. Trained models store the exact
//!   column order they were fitted with.
//! - Renaming, reordering or adding a column bumps FEATURE_VERSION.

/// Version byte folded into the layout hash.
pub const FEATURE_VERSION: u8 = 1;

/// Raw sensor columns, in canonical dataset order.
pub const RAW_FEATURES: &[&str] = &[
    "TSP",
    "PM2.5",
    "PM10",
    "O3",
    "CO",
    "NO2",
    "SO2",
    "Temperature",
    "Humidity",
];

/// Columns derived from the raw sensors and the timestamp.
pub const DERIVED_FEATURES: &[&str] = &["PM_ratio", "Temp_Humid_Idx", "Hour", "Is_Rush_Hour"];

/// Per-station history columns, only present on forecast models.
pub const LAG_FEATURES: &[&str] = &[
    "PM2.5_lag1h",
    "PM2.5_mean3h",
    "Temperature_lag1h",
    "Temperature_mean3h",
    "Humidity_lag1h",
    "Humidity_mean3h",
];

/// CRC32 over the layout version and every known column name.
/// Stored in artifacts so a stale model is detectable at load time.
pub fn layout_hash() -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[FEATURE_VERSION]);
    for name in RAW_FEATURES
        .iter()
        .chain(DERIVED_FEATURES)
        .chain(LAG_FEATURES)
    {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}

pub fn is_known(name: &str) -> bool {
    RAW_FEATURES
        .iter()
        .chain(DERIVED_FEATURES)
        .chain(LAG_FEATURES)
        .any(|known| *known == name)
}
