//! Class rebalancing for the skewed label distributions hourly AQI
//! data always has. Applied to training partitions only.

use crate::error::{PipelineError, PipelineResult};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::cmp::Ordering;
use std::str::FromStr;

const SMOTE_NEIGHBORS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceStrategy {
    None,
    /// Duplicate random minority rows until counts are equal.
    Oversample,
    /// Synthesize minority rows between nearest same-class neighbors.
    Smote,
}

impl BalanceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceStrategy::None => "none",
            BalanceStrategy::Oversample => "oversample",
            BalanceStrategy::Smote => "smote",
        }
    }
}

impl FromStr for BalanceStrategy {
    type Err = PipelineError;

    fn from_str(s: &str) -> PipelineResult<BalanceStrategy> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(BalanceStrategy::None),
            "oversample" => Ok(BalanceStrategy::Oversample),
            "smote" => Ok(BalanceStrategy::Smote),
            other => Err(PipelineError::Training(format!(
                "unknown balance strategy: {}",
                other
            ))),
        }
    }
}

/// Equalize class counts. Returns the input unchanged for `None`.
pub fn rebalance(
    x: &Array2<f64>,
    y: &[usize],
    strategy: BalanceStrategy,
    seed: u64,
) -> PipelineResult<(Array2<f64>, Vec<usize>)> {
    match strategy {
        BalanceStrategy::None => Ok((x.clone(), y.to_vec())),
        BalanceStrategy::Oversample => oversample(x, y, seed),
        BalanceStrategy::Smote => smote(x, y, seed),
    }
}

fn class_members(y: &[usize]) -> Vec<Vec<usize>> {
    let n_classes = y.iter().max().map_or(0, |&m| m + 1);
    let mut members = vec![Vec::new(); n_classes];
    for (i, &class) in y.iter().enumerate() {
        members[class].push(i);
    }
    members
}

fn oversample(x: &Array2<f64>, y: &[usize], seed: u64) -> PipelineResult<(Array2<f64>, Vec<usize>)> {
    let members = class_members(y);
    let target = members.iter().map(Vec::len).max().unwrap_or(0);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut flat: Vec<f64> = x.iter().copied().collect();
    let mut labels = y.to_vec();
    for (class, ids) in members.iter().enumerate() {
        if ids.is_empty() {
            continue;
        }
        for _ in ids.len()..target {
            let pick = ids[rng.gen_range(0..ids.len())];
            flat.extend(x.row(pick).iter().copied());
            labels.push(class);
        }
    }

    rebuild(flat, labels, x.ncols())
}

fn smote(x: &Array2<f64>, y: &[usize], seed: u64) -> PipelineResult<(Array2<f64>, Vec<usize>)> {
    let members = class_members(y);
    let target = members.iter().map(Vec::len).max().unwrap_or(0);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut flat: Vec<f64> = x.iter().copied().collect();
    let mut labels = y.to_vec();
    for (class, ids) in members.iter().enumerate() {
        if ids.is_empty() || ids.len() >= target {
            continue;
        }
        // A lone sample has nothing to interpolate against.
        if ids.len() < 2 {
            for _ in ids.len()..target {
                flat.extend(x.row(ids[0]).iter().copied());
                labels.push(class);
            }
            continue;
        }
        for _ in ids.len()..target {
            let base = ids[rng.gen_range(0..ids.len())];
            let neighbors = nearest_neighbors(x, ids, base, SMOTE_NEIGHBORS);
            let neighbor = neighbors[rng.gen_range(0..neighbors.len())];
            let t: f64 = rng.gen();
            for (b, n) in x.row(base).iter().zip(x.row(neighbor).iter()) {
                flat.push(b + t * (n - b));
            }
            labels.push(class);
        }
    }

    rebuild(flat, labels, x.ncols())
}

fn nearest_neighbors(x: &Array2<f64>, ids: &[usize], base: usize, k: usize) -> Vec<usize> {
    let mut ranked: Vec<(f64, usize)> = ids
        .iter()
        .copied()
        .filter(|&i| i != base)
        .map(|i| (squared_distance(x, base, i), i))
        .collect();
    ranked.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    ranked.truncate(k.max(1));
    ranked.into_iter().map(|(_, i)| i).collect()
}

fn squared_distance(x: &Array2<f64>, a: usize, b: usize) -> f64 {
    x.row(a)
        .iter()
        .zip(x.row(b).iter())
        .map(|(p, q)| (p - q) * (p - q))
        .sum()
}

fn rebuild(
    flat: Vec<f64>,
    labels: Vec<usize>,
    width: usize,
) -> PipelineResult<(Array2<f64>, Vec<usize>)> {
    let x = Array2::from_shape_vec((labels.len(), width), flat)
        .map_err(|e| PipelineError::Training(e.to_string()))?;
    Ok((x, labels))
}
