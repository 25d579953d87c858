//! Random forest: seeded bootstrap bagging over CART trees with
//! sqrt-of-features subsampling at every split.

use super::tree::{DecisionTree, TreeParams};
use crate::error::{PipelineError, PipelineResult};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 15,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
    pub n_features: usize,
    pub n_classes: usize,
    pub params: ForestParams,
}

impl RandomForest {
    pub fn fit(
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        params: ForestParams,
    ) -> PipelineResult<RandomForest> {
        if params.n_trees == 0 {
            return Err(PipelineError::Training(
                "forest needs at least one tree".into(),
            ));
        }
        if x.nrows() == 0 {
            return Err(PipelineError::Training(
                "cannot fit a forest on an empty dataset".into(),
            ));
        }

        let n = x.nrows();
        let features_per_split = ((x.ncols() as f64).sqrt().round() as usize).max(1);
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let tree_seed: u64 = rng.gen();
            trees.push(DecisionTree::fit_subset(
                x,
                y,
                n_classes,
                tree_params,
                &sample,
                Some(features_per_split),
                tree_seed,
            )?);
        }

        Ok(RandomForest {
            trees,
            n_features: x.ncols(),
            n_classes,
            params,
        })
    }

    /// Mean of the member trees' leaf distributions.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut acc = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (slot, p) in acc.iter_mut().zip(tree.predict_proba(row)) {
                *slot += p;
            }
        }
        let n = self.trees.len() as f64;
        for slot in &mut acc {
            *slot /= n;
        }
        acc
    }

    pub fn predict(&self, row: &[f64]) -> usize {
        super::argmax(&self.predict_proba(row))
    }

    pub fn feature_importances(&self) -> Vec<f64> {
        let mut acc = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (slot, value) in acc.iter_mut().zip(&tree.feature_importances) {
                *slot += value;
            }
        }
        let n = self.trees.len() as f64;
        for slot in &mut acc {
            *slot /= n;
        }
        acc
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
