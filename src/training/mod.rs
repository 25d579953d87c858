//! Training orchestration: load, prepare, split, rebalance,
//! cross-validate, fit, evaluate, save.
//!
//! Every random step is seeded, so one config always produces the
//! same split, folds, synthetic rows and trees, and therefore the
//! same metrics.


use crate::dataset::{
    rebalance, time_ordered_split, train_test_split, BalanceStrategy, DataSet, PrepConfig,
};
use crate::error::{PipelineError, PipelineResult};
use crate::features;
use crate::model::{
    evaluate, Classifier, DecisionTree, ForestParams, LabelEncoder, Metrics, ModelArtifact,
    ModelKind, RandomForest, StandardScaler, TreeParams, SCHEMA_VERSION,
};
use chrono::Utc;
use ndarray::{Array2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    DecisionTree,
    RandomForest,
    /// Cross-validate both families and keep the better one.
    Compare,
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    pub model: ModelChoice,
    pub horizon_hours: u32,
    pub test_size: f64,
    pub folds: usize,
    pub seed: u64,
    pub balance: BalanceStrategy,
    pub scale: bool,
    pub tree: TreeParams,
    pub forest: ForestParams,
}

/// Cross-validation outcome for one candidate family.
#[derive(Debug, Clone)]
pub struct CvOutcome {
    pub kind: ModelKind,
    pub fold_accuracy: Vec<f64>,
    pub fold_f1: Vec<f64>,
    pub mean_accuracy: f64,
    pub mean_f1: f64,
    pub std_f1: f64,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub artifact_path: PathBuf,
    pub model_uid: Uuid,
    pub kind: ModelKind,
    pub metrics: Metrics,
    pub cv: Vec<CvOutcome>,
    pub n_train: usize,
    pub n_test: usize,
    pub classes: Vec<String>,
    pub feature_names: Vec<String>,
}

/// Run the whole pipeline and write the artifact.
pub fn run(config: &TrainConfig) -> PipelineResult<TrainReport> {
    if config.model == ModelChoice::Compare && config.folds < 2 {
        return Err(PipelineError::Training(
            "comparing model families needs at least 2 folds".into(),
        ));
    }

    let data = DataSet::load(&config.data_path)?;
    let summary = data.summary();
    tracing::info!(
        rows = summary.rows,
        columns = summary.columns.len(),
        stations = summary.stations.len(),
        "dataset loaded"
    );
    if let Some((first, last)) = &summary.date_range {
        tracing::info!("date range {} .. {}", first, last);
    }

    let prepared = data.prepare(PrepConfig {
        horizon_hours: config.horizon_hours,
    })?;
    let encoder = LabelEncoder::fit(&prepared.labels);
    if encoder.len() < 2 {
        return Err(PipelineError::Training(
            "dataset collapses to a single AQI category, nothing to learn".into(),
        ));
    }
    let y = encoder.transform(&prepared.labels)?;
    for (class, label) in encoder.classes.iter().enumerate() {
        let count = y.iter().filter(|&&c| c == class).count();
        tracing::info!("class {:<32} {:>7} rows", label, count);
    }

    // Forecast tables are in time order; a random split would leak
    // future rows into training.
    let split = if config.horizon_hours > 0 {
        time_ordered_split(&prepared.x, &y, config.test_size)?
    } else {
        train_test_split(&prepared.x, &y, config.test_size, config.seed)?
    };
    let mut x_train = split.x_train;
    let y_train = split.y_train;
    let mut x_test = split.x_test;
    let y_test = split.y_test;
    tracing::info!(train = x_train.nrows(), test = x_test.nrows(), "split");

    let scaler = if config.scale {
        let scaler = StandardScaler::fit(&x_train);
        scaler.transform(&mut x_train);
        scaler.transform(&mut x_test);
        Some(scaler)
    } else {
        None
    };

    let candidates: Vec<ModelKind> = match config.model {
        ModelChoice::DecisionTree => vec![ModelKind::DecisionTree],
        ModelChoice::RandomForest => vec![ModelKind::RandomForest],
        ModelChoice::Compare => vec![ModelKind::DecisionTree, ModelKind::RandomForest],
    };

    let mut cv = Vec::new();
    if config.folds >= 2 {
        for &kind in &candidates {
            let outcome = cross_validate(kind, &x_train, &y_train, &encoder.classes, config)?;
            tracing::info!(
                "cv {:<14} accuracy {:.3}  f1 {:.3} ± {:.3}",
                outcome.kind,
                outcome.mean_accuracy,
                outcome.mean_f1,
                outcome.std_f1
            );
            cv.push(outcome);
        }
    }

    let kind = select_candidate(config.model, &cv)?;
    if config.model == ModelChoice::Compare {
        tracing::info!("selected {}", kind);
    }

    // The held-out test partition never sees rebalancing.
    let (x_fit, y_fit) = rebalance(&x_train, &y_train, config.balance, config.seed)?;
    if config.balance != BalanceStrategy::None {
        tracing::info!(
            rows = y_fit.len(),
            strategy = config.balance.as_str(),
            "training partition rebalanced"
        );
    }
    let classifier = fit_candidate(kind, &x_fit, &y_fit, encoder.len(), config)?;

    let y_pred = predict_matrix(&classifier, &x_test);
    let metrics = evaluate(&y_test, &y_pred, &encoder.classes);
    tracing::info!(
        "test accuracy {:.3}, weighted f1 {:.3}",
        metrics.accuracy,
        metrics.weighted_f1
    );
    for line in metrics.report().lines() {
        tracing::info!("{}", line);
    }

    let artifact = ModelArtifact {
        schema_version: SCHEMA_VERSION,
        model_uid: Uuid::new_v4(),
        model: classifier,
        feature_names: prepared.feature_names.clone(),
        classes: encoder.classes.clone(),
        scaler,
        feature_version: features::FEATURE_VERSION,
        layout_hash: features::layout_hash(),
        horizon_hours: config.horizon_hours,
        trained_at: Utc::now(),
        metrics: Some(metrics.clone()),
    };
    artifact.save(&config.output_path)?;
    tracing::info!(path = %config.output_path.display(), "artifact saved");

    Ok(TrainReport {
        artifact_path: config.output_path.clone(),
        model_uid: artifact.model_uid,
        kind,
        metrics,
        cv,
        n_train: x_train.nrows(),
        n_test: x_test.nrows(),
        classes: encoder.classes.clone(),
        feature_names: prepared.feature_names,
    })
}

fn select_candidate(choice: ModelChoice, cv: &[CvOutcome]) -> PipelineResult<ModelKind> {
    match choice {
        ModelChoice::DecisionTree => Ok(ModelKind::DecisionTree),
        ModelChoice::RandomForest => Ok(ModelKind::RandomForest),
        ModelChoice::Compare => {
            let first = cv.first().ok_or_else(|| {
                PipelineError::Training("model comparison ran no folds".into())
            })?;
            let mut best = first.kind;
            let mut best_f1 = first.mean_f1;
            for outcome in &cv[1..] {
                if outcome.mean_f1 > best_f1 {
                    best = outcome.kind;
                    best_f1 = outcome.mean_f1;
                }
            }
            Ok(best)
        }
    }
}

/// Stratified k-fold scores for one candidate family. Each fold's
/// training side is rebalanced exactly like the final fit; the
/// held-out fold never is.
pub fn cross_validate(
    kind: ModelKind,
    x: &Array2<f64>,
    y: &[usize],
    classes: &[String],
    config: &TrainConfig,
) -> PipelineResult<CvOutcome> {
    let k = config.folds;
    if k < 2 {
        return Err(PipelineError::Training(
            "cross-validation needs at least 2 folds".into(),
        ));
    }
    if k > y.len() {
        return Err(PipelineError::Training(format!(
            "{} folds but only {} training rows",
            k,
            y.len()
        )));
    }

    let folds = stratified_folds(y, k, config.seed);
    let mut fold_accuracy = Vec::with_capacity(k);
    let mut fold_f1 = Vec::with_capacity(k);

    for fold in 0..k {
        let (train_rows, val_rows): (Vec<usize>, Vec<usize>) =
            (0..y.len()).partition(|&i| folds[i] != fold);
        if train_rows.is_empty() || val_rows.is_empty() {
            continue;
        }

        let x_fold = x.select(Axis(0), &train_rows);
        let y_fold: Vec<usize> = train_rows.iter().map(|&i| y[i]).collect();
        let (x_fit, y_fit) = rebalance(
            &x_fold,
            &y_fold,
            config.balance,
            config.seed.wrapping_add(fold as u64),
        )?;
        let model = fit_candidate(kind, &x_fit, &y_fit, classes.len(), config)?;

        let x_val = x.select(Axis(0), &val_rows);
        let y_val: Vec<usize> = val_rows.iter().map(|&i| y[i]).collect();
        let y_pred = predict_matrix(&model, &x_val);
        let fold_metrics = evaluate(&y_val, &y_pred, classes);
        fold_accuracy.push(fold_metrics.accuracy);
        fold_f1.push(fold_metrics.weighted_f1);
    }

    if fold_f1.is_empty() {
        return Err(PipelineError::Training(
            "every cross-validation fold was degenerate".into(),
        ));
    }

    let mean_accuracy = mean(&fold_accuracy);
    let mean_f1 = mean(&fold_f1);
    let std_f1 = std_dev(&fold_f1, mean_f1);
    Ok(CvOutcome {
        kind,
        fold_accuracy,
        fold_f1,
        mean_accuracy,
        mean_f1,
        std_f1,
    })
}

/// Fold assignment per row. Members of each class are dealt
/// round-robin so every fold sees roughly the class distribution.
fn stratified_folds(y: &[usize], k: usize, seed: u64) -> Vec<usize> {
    let n_classes = y.iter().max().map_or(0, |&m| m + 1);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; y.len()];
    for class in 0..n_classes {
        let mut members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        members.shuffle(&mut rng);
        for (slot, row) in members.into_iter().enumerate() {
            assignment[row] = slot % k;
        }
    }
    assignment
}

fn fit_candidate(
    kind: ModelKind,
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
    config: &TrainConfig,
) -> PipelineResult<Classifier> {
    match kind {
        ModelKind::DecisionTree => Ok(Classifier::DecisionTree(DecisionTree::fit(
            x,
            y,
            n_classes,
            config.tree,
        )?)),
        ModelKind::RandomForest => Ok(Classifier::RandomForest(RandomForest::fit(
            x,
            y,
            n_classes,
            config.forest,
        )?)),
    }
}

fn predict_matrix(model: &Classifier, x: &Array2<f64>) -> Vec<usize> {
    x.axis_iter(Axis(0))
        .map(|row| model.predict(&row.to_vec()))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|value| (value - mean) * (value - mean))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}
