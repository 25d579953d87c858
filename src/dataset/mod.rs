//! Dataset ingest and training-table preparation.
//!
//! Reads hourly station CSVs, fills gaps with column medians, labels
//! every row through the AQI transform and assembles the feature
//! matrix. Forecast models additionally get per-station history
//! columns and a label shifted `horizon` rows into the future.

pub mod balance;

#[cfg(test)]
mod tests;

pub use balance::{rebalance, BalanceStrategy};

use crate::aqi::{self, Pollutant};
use crate::error::{PipelineError, PipelineResult};
use crate::features;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use ndarray::{Array2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const STATION_COLUMN: &str = "Station_No";
pub const DATE_COLUMN: &str = "date";

/// Raw columns considered as model inputs, in canonical order.
/// TSP is deliberately absent: it only feeds the PM10 fallback.
const CANDIDATE_FEATURES: &[&str] = &[
    "PM2.5",
    "PM10",
    "O3",
    "CO",
    "NO2",
    "SO2",
    "Temperature",
    "Humidity",
];

/// Columns that get lag features on forecast models.
const LAG_BASES: &[&str] = &["PM2.5", "Temperature", "Humidity"];

// ============================================================================
// Parsing
// ============================================================================

/// A parsed CSV: numeric columns plus the station and timestamp
/// columns when the file has them.
#[derive(Debug, Clone)]
pub struct DataSet {
    /// Numeric column names in header order.
    pub columns: Vec<String>,
    values: HashMap<String, Vec<Option<f64>>>,
    pub stations: Option<Vec<String>>,
    pub timestamps: Option<Vec<Option<NaiveDateTime>>>,
    pub n_rows: usize,
}

impl DataSet {
    pub fn load(path: &Path) -> PipelineResult<DataSet> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> PipelineResult<DataSet> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = csv.headers()?.iter().map(|h| h.to_string()).collect();

        let station_col = headers.iter().position(|h| h == STATION_COLUMN);
        let date_col = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(DATE_COLUMN));

        let numeric: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != station_col && Some(*i) != date_col)
            .map(|(i, h)| (i, h.clone()))
            .collect();

        let mut parsed: Vec<Vec<Option<f64>>> = vec![Vec::new(); numeric.len()];
        let mut stations = station_col.map(|_| Vec::new());
        let mut timestamps = date_col.map(|_| Vec::new());
        let mut n_rows = 0;

        for record in csv.records() {
            let record = record?;
            for (slot, (i, _)) in parsed.iter_mut().zip(&numeric) {
                slot.push(parse_number(record.get(*i).unwrap_or("")));
            }
            if let (Some(col), Some(list)) = (station_col, stations.as_mut()) {
                list.push(record.get(col).unwrap_or("").to_string());
            }
            if let (Some(col), Some(list)) = (date_col, timestamps.as_mut()) {
                list.push(parse_timestamp(record.get(col).unwrap_or("")));
            }
            n_rows += 1;
        }

        let columns: Vec<String> = numeric.into_iter().map(|(_, name)| name).collect();
        let values: HashMap<String, Vec<Option<f64>>> =
            columns.iter().cloned().zip(parsed).collect();

        let dataset = DataSet {
            columns,
            values,
            stations,
            timestamps,
            n_rows,
        };

        let has_pollutant = Pollutant::ALL
            .iter()
            .any(|p| dataset.has_column(p.name()))
            || dataset.has_column("TSP");
        if !has_pollutant {
            return Err(PipelineError::Schema(
                "dataset has no pollutant columns".into(),
            ));
        }
        Ok(dataset)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.values.get(name).map(Vec::as_slice)
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return None;
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => None,
    }
}

/// Accepts the timestamp shapes seen in the station archives.
fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(cell, format) {
            return Some(ts);
        }
    }
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(cell, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

// ============================================================================
// Summary
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub stations: Vec<String>,
    pub date_range: Option<(String, String)>,
    pub pm25: Option<ColumnStats>,
}

impl DataSet {
    pub fn summary(&self) -> DatasetSummary {
        let mut stations: Vec<String> = self
            .stations
            .iter()
            .flatten()
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        stations.sort();

        let known_dates: Vec<NaiveDateTime> = self
            .timestamps
            .iter()
            .flatten()
            .flatten()
            .copied()
            .collect();
        let date_range = match (known_dates.iter().min(), known_dates.iter().max()) {
            (Some(first), Some(last)) => Some((
                first.format("%Y-%m-%d %H:%M:%S").to_string(),
                last.format("%Y-%m-%d %H:%M:%S").to_string(),
            )),
            _ => None,
        };

        DatasetSummary {
            rows: self.n_rows,
            columns: self.columns.clone(),
            stations,
            date_range,
            pm25: self.column("PM2.5").and_then(column_stats),
        }
    }
}

fn column_stats(values: &[Option<f64>]) -> Option<ColumnStats> {
    let known: Vec<f64> = values.iter().flatten().copied().collect();
    if known.is_empty() {
        return None;
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for &value in &known {
        min = min.min(value);
        max = max.max(value);
        sum += value;
    }
    Some(ColumnStats {
        min,
        max,
        mean: sum / known.len() as f64,
    })
}

/// Median of a sample; 0 for an empty one.
pub fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

// ============================================================================
// Preparation
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct PrepConfig {
    /// 0 builds a nowcast table, anything else shifts the label that
    /// many rows ahead per station and adds lag columns.
    pub horizon_hours: u32,
}

/// The assembled training table.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub feature_names: Vec<String>,
    pub x: Array2<f64>,
    pub labels: Vec<String>,
}

impl DataSet {
    pub fn prepare(&self, config: PrepConfig) -> PipelineResult<PreparedData> {
        if self.n_rows == 0 {
            return Err(PipelineError::Schema("dataset has no rows".into()));
        }

        // Imputed base columns in canonical order. PM10 falls back to
        // scaled TSP when the file has no PM10 column.
        let mut table: Vec<(String, Vec<f64>)> = Vec::new();
        for &name in CANDIDATE_FEATURES {
            if name == "PM10" && !self.has_column("PM10") {
                if let Some(tsp) = self.column("TSP") {
                    let scaled: Vec<Option<f64>> = tsp
                        .iter()
                        .map(|v| v.map(|t| t / features::TSP_TO_PM10_RATIO))
                        .collect();
                    table.push(("PM10".to_string(), imputed(&scaled)));
                }
                continue;
            }
            if let Some(column) = self.column(name) {
                table.push((name.to_string(), imputed(column)));
            }
        }

        // Labels come from the imputed pollutant columns.
        let labels = self.derive_labels(&table);

        self.push_derived_columns(&mut table);

        if config.horizon_hours == 0 {
            let feature_names: Vec<String> = table.iter().map(|(n, _)| n.clone()).collect();
            let x = assemble(&table, &(0..self.n_rows).collect::<Vec<_>>())?;
            return Ok(PreparedData {
                feature_names,
                x,
                labels,
            });
        }

        self.prepare_horizon(table, labels, config.horizon_hours as usize)
    }

    fn derive_labels(&self, table: &[(String, Vec<f64>)]) -> Vec<String> {
        let pollutant_columns: Vec<(Pollutant, &Vec<f64>)> = Pollutant::ALL
            .iter()
            .filter_map(|&p| {
                table
                    .iter()
                    .find(|(name, _)| name == p.name())
                    .map(|(_, col)| (p, col))
            })
            .collect();

        (0..self.n_rows)
            .map(|i| {
                let readings: Vec<(Pollutant, f64)> = pollutant_columns
                    .iter()
                    .map(|&(p, col)| (p, col[i]))
                    .collect();
                aqi::overall(&readings).category.label().to_string()
            })
            .collect()
    }

    fn push_derived_columns(&self, table: &mut Vec<(String, Vec<f64>)>) {
        let pm25 = find_column(table, "PM2.5").cloned();
        let pm10 = find_column(table, "PM10").cloned();
        if let (Some(pm25), Some(pm10)) = (pm25, pm10) {
            let ratio: Vec<f64> = pm25
                .iter()
                .zip(&pm10)
                .map(|(&fine, &coarse)| {
                    if coarse <= 0.0 {
                        0.0
                    } else {
                        fine / (coarse + features::PM_RATIO_EPSILON)
                    }
                })
                .collect();
            table.push(("PM_ratio".to_string(), ratio));
        }

        let temp = find_column(table, "Temperature").cloned();
        let humid = find_column(table, "Humidity").cloned();
        if let (Some(temp), Some(humid)) = (temp, humid) {
            let idx: Vec<f64> = temp.iter().zip(&humid).map(|(&t, &h)| t * h / 100.0).collect();
            table.push(("Temp_Humid_Idx".to_string(), idx));
        }

        if let Some(timestamps) = &self.timestamps {
            if timestamps.iter().any(Option::is_some) {
                let hours: Vec<f64> = timestamps
                    .iter()
                    .map(|ts| ts.map(|t| t.hour() as f64).unwrap_or(0.0))
                    .collect();
                let rush: Vec<f64> = hours
                    .iter()
                    .map(|&h| {
                        if features::is_rush_hour(h as u32) {
                            1.0
                        } else {
                            0.0
                        }
                    })
                    .collect();
                table.push(("Hour".to_string(), hours));
                table.push(("Is_Rush_Hour".to_string(), rush));
            }
        }
    }

    fn prepare_horizon(
        &self,
        table: Vec<(String, Vec<f64>)>,
        labels: Vec<String>,
        steps: usize,
    ) -> PipelineResult<PreparedData> {
        let stations = self.stations.as_ref().ok_or_else(|| {
            PipelineError::Schema(format!(
                "forecast models need a {} column",
                STATION_COLUMN
            ))
        })?;
        let timestamps = self.timestamps.as_ref().ok_or_else(|| {
            PipelineError::Schema(format!("forecast models need a {} column", DATE_COLUMN))
        })?;

        // Station-major, time-ordered row ids. Rows whose timestamp
        // did not parse drop out here.
        let mut ordered: Vec<usize> = (0..self.n_rows)
            .filter(|&i| timestamps[i].is_some())
            .collect();
        ordered.sort_by(|&a, &b| {
            stations[a]
                .cmp(&stations[b])
                .then(timestamps[a].cmp(&timestamps[b]))
                .then(a.cmp(&b))
        });

        let lag_columns: Vec<(String, &Vec<f64>)> = LAG_BASES
            .iter()
            .filter_map(|&base| find_column(&table, base).map(|col| (base.to_string(), col)))
            .collect();

        let mut feature_names: Vec<String> = table.iter().map(|(n, _)| n.clone()).collect();
        for (base, _) in &lag_columns {
            feature_names.push(format!("{}_lag1h", base));
            feature_names.push(format!("{}_mean3h", base));
        }

        let mut rows: Vec<f64> = Vec::new();
        let mut out_labels: Vec<String> = Vec::new();
        let mut n_kept = 0;

        let mut start = 0;
        while start < ordered.len() {
            let mut end = start + 1;
            while end < ordered.len() && stations[ordered[end]] == stations[ordered[start]] {
                end += 1;
            }
            let sequence = &ordered[start..end];

            // The 3-row window needs two predecessors and the target
            // needs `steps` successors.
            for k in 2..sequence.len() {
                if k + steps >= sequence.len() {
                    break;
                }
                let row_id = sequence[k];
                for (_, col) in &table {
                    rows.push(col[row_id]);
                }
                for (_, col) in &lag_columns {
                    rows.push(col[sequence[k - 1]]);
                    let window =
                        col[sequence[k - 2]] + col[sequence[k - 1]] + col[sequence[k]];
                    rows.push(window / 3.0);
                }
                out_labels.push(labels[sequence[k + steps]].clone());
                n_kept += 1;
            }
            start = end;
        }

        if n_kept == 0 {
            return Err(PipelineError::Training(format!(
                "not enough rows per station to build lagged features for a {}h horizon",
                steps
            )));
        }

        let x = Array2::from_shape_vec((n_kept, feature_names.len()), rows)
            .map_err(|e| PipelineError::Training(e.to_string()))?;
        Ok(PreparedData {
            feature_names,
            x,
            labels: out_labels,
        })
    }
}

fn find_column<'t>(table: &'t [(String, Vec<f64>)], name: &str) -> Option<&'t Vec<f64>> {
    table
        .iter()
        .find(|(column, _)| column == name)
        .map(|(_, values)| values)
}

fn imputed(values: &[Option<f64>]) -> Vec<f64> {
    let fill = median(values.iter().flatten().copied().collect());
    values.iter().map(|v| v.unwrap_or(fill)).collect()
}

fn assemble(table: &[(String, Vec<f64>)], rows: &[usize]) -> PipelineResult<Array2<f64>> {
    let width = table.len();
    let mut flat = Vec::with_capacity(rows.len() * width);
    for &i in rows {
        for (_, column) in table {
            flat.push(column[i]);
        }
    }
    Array2::from_shape_vec((rows.len(), width), flat)
        .map_err(|e| PipelineError::Training(e.to_string()))
}

// ============================================================================
// Splits
// ============================================================================

#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Array2<f64>,
    pub y_train: Vec<usize>,
    pub x_test: Array2<f64>,
    pub y_test: Vec<usize>,
}

/// Seeded stratified split. Every class keeps at least one training
/// row; classes too small to stratify go entirely to training.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &[usize],
    test_size: f64,
    seed: u64,
) -> PipelineResult<Split> {
    validate_split_input(x, y, test_size)?;

    let n_classes = y.iter().max().map_or(0, |&m| m + 1);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_rows: Vec<usize> = Vec::new();
    let mut test_rows: Vec<usize> = Vec::new();

    for class in 0..n_classes {
        let mut members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);
        let mut n_test = (members.len() as f64 * test_size).round() as usize;
        if n_test >= members.len() {
            n_test = members.len() - 1;
        }
        test_rows.extend(&members[..n_test]);
        train_rows.extend(&members[n_test..]);
    }

    if test_rows.is_empty() {
        return Err(PipelineError::Training(
            "test split is empty, add rows or raise test_size".into(),
        ));
    }
    train_rows.sort_unstable();
    test_rows.sort_unstable();
    Ok(select_rows(x, y, &train_rows, &test_rows))
}

/// Chronological split: the first rows train, the tail tests. Row
/// order is the station-major time order `prepare` produced.
pub fn time_ordered_split(x: &Array2<f64>, y: &[usize], test_size: f64) -> PipelineResult<Split> {
    validate_split_input(x, y, test_size)?;
    if x.nrows() < 2 {
        return Err(PipelineError::Training(
            "need at least two rows to split".into(),
        ));
    }

    let cut = ((x.nrows() as f64) * (1.0 - test_size)).round() as usize;
    let cut = cut.clamp(1, x.nrows() - 1);
    let train_rows: Vec<usize> = (0..cut).collect();
    let test_rows: Vec<usize> = (cut..x.nrows()).collect();
    Ok(select_rows(x, y, &train_rows, &test_rows))
}

fn validate_split_input(x: &Array2<f64>, y: &[usize], test_size: f64) -> PipelineResult<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::Training(format!(
            "feature matrix has {} rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if test_size <= 0.0 || test_size >= 1.0 {
        return Err(PipelineError::Training(
            "test_size must be between 0 and 1".into(),
        ));
    }
    Ok(())
}

fn select_rows(x: &Array2<f64>, y: &[usize], train: &[usize], test: &[usize]) -> Split {
    Split {
        x_train: x.select(Axis(0), train),
        y_train: train.iter().map(|&i| y[i]).collect(),
        x_test: x.select(Axis(0), test),
        y_test: test.iter().map(|&i| y[i]).collect(),
    }
}
