//! AirSense trainer: label a station CSV through the AQI transform,
//! fit a classifier and write the model artifact.

use airsense::dataset::BalanceStrategy;
use airsense::model::{ForestParams, TreeParams};
use airsense::training::{self, ModelChoice, TrainConfig};
use anyhow::bail;
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(
    name = "airsense-train",
    about = "Train an air-quality category classifier from a station CSV"
)]
struct Cli {
    /// Input CSV with pollutant and weather columns
    #[arg(short, long)]
    data: PathBuf,

    /// Where to write the model artifact
    #[arg(short, long, default_value = "models/model.json")]
    output: PathBuf,

    /// Model family: tree, forest or compare
    #[arg(short, long, default_value = "compare")]
    model: String,

    /// Forecast horizon in hours; 0 trains a nowcast model
    #[arg(long, default_value_t = 0)]
    horizon: u32,

    /// Held-out test fraction
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,

    /// Cross-validation folds; below 2 skips CV
    #[arg(long, default_value_t = 5)]
    folds: usize,

    /// Seed for the split, rebalancing and forest bagging
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Class rebalancing: none, oversample or smote
    #[arg(long, default_value = "smote")]
    balance: String,

    /// Skip feature standardization
    #[arg(long)]
    no_scale: bool,

    /// Trees in the forest
    #[arg(long, default_value_t = 100)]
    trees: usize,

    /// Maximum tree depth
    #[arg(long, default_value_t = 15)]
    max_depth: usize,

    /// Minimum samples per leaf
    #[arg(long, default_value_t = 20)]
    min_samples_leaf: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    let model = match cli.model.as_str() {
        "tree" => ModelChoice::DecisionTree,
        "forest" => ModelChoice::RandomForest,
        "compare" => ModelChoice::Compare,
        other => bail!("unknown model family: {} (use tree, forest or compare)", other),
    };
    let balance = BalanceStrategy::from_str(&cli.balance)?;

    let config = TrainConfig {
        data_path: cli.data,
        output_path: cli.output,
        model,
        horizon_hours: cli.horizon,
        test_size: cli.test_size,
        folds: cli.folds,
        seed: cli.seed,
        balance,
        scale: !cli.no_scale,
        tree: TreeParams {
            max_depth: cli.max_depth,
            min_samples_leaf: cli.min_samples_leaf,
        },
        forest: ForestParams {
            n_trees: cli.trees,
            max_depth: cli.max_depth,
            min_samples_leaf: cli.min_samples_leaf,
            seed: cli.seed,
        },
    };

    let report = training::run(&config)?;

    println!(
        "Trained {} on {} rows ({} held out)",
        report.kind, report.n_train, report.n_test
    );
    println!(
        "Test accuracy {:.3}, weighted F1 {:.3}",
        report.metrics.accuracy, report.metrics.weighted_f1
    );
    println!("Artifact: {}", report.artifact_path.display());
    Ok(())
}
