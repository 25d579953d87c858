//! CART decision tree with gini impurity.
//!
//! Nodes live in a flat arena so the whole tree serializes as plain
//! JSON and path extraction is an index walk. Splits always send
//! `value <= threshold` to the left child.

use crate::error::{PipelineError, PipelineResult};
use ndarray::Array2;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Splits below this impurity decrease are noise, not structure.
const MIN_IMPURITY_DECREASE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 15,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Split feature, `None` on leaves.
    pub feature: Option<usize>,
    pub threshold: f64,
    pub left: Option<usize>,
    pub right: Option<usize>,
    /// Training samples that reached this node.
    pub samples: usize,
    /// Training class distribution at this node.
    pub class_counts: Vec<usize>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.feature.is_none()
    }
}

/// One internal node crossed on the way to a leaf.
#[derive(Debug, Clone)]
pub struct PathStep {
    pub id: usize,
    pub feature: usize,
    pub threshold: f64,
    pub direction: &'static str,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
    pub n_features: usize,
    pub n_classes: usize,
    /// Normalized impurity-decrease importances, one per feature.
    pub feature_importances: Vec<f64>,
    pub params: TreeParams,
}

impl DecisionTree {
    pub fn fit(
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        params: TreeParams,
    ) -> PipelineResult<DecisionTree> {
        let indices: Vec<usize> = (0..x.nrows()).collect();
        Self::fit_subset(x, y, n_classes, params, &indices, None, 0)
    }

    /// Fit on a row subset, optionally restricting each split to a
    /// random draw of `features_per_split` columns. The forest uses
    /// this for its bootstrap members.
    pub(crate) fn fit_subset(
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        params: TreeParams,
        indices: &[usize],
        features_per_split: Option<usize>,
        seed: u64,
    ) -> PipelineResult<DecisionTree> {
        if indices.is_empty() || x.nrows() == 0 {
            return Err(PipelineError::Training(
                "cannot fit a tree on an empty dataset".into(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(PipelineError::Training(format!(
                "feature matrix has {} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if n_classes == 0 {
            return Err(PipelineError::Training("n_classes must be positive".into()));
        }
        if let Some(&bad) = y.iter().find(|&&class| class >= n_classes) {
            return Err(PipelineError::Training(format!(
                "label {} out of range for {} classes",
                bad, n_classes
            )));
        }

        let mut builder = TreeBuilder {
            x,
            y,
            n_classes,
            params,
            features_per_split,
            rng: StdRng::seed_from_u64(seed),
            nodes: Vec::new(),
            importances: vec![0.0; x.ncols()],
            n_total: indices.len(),
        };
        builder.build(indices.to_vec(), 0);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for value in &mut importances {
                *value /= total;
            }
        }

        Ok(DecisionTree {
            nodes: builder.nodes,
            n_features: x.ncols(),
            n_classes,
            feature_importances: importances,
            params,
        })
    }

    /// Class distribution at the leaf this row lands in.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let node = &self.nodes[self.leaf_for(row)];
        let total: usize = node.class_counts.iter().sum();
        if total == 0 {
            return vec![0.0; self.n_classes];
        }
        node.class_counts
            .iter()
            .map(|&count| count as f64 / total as f64)
            .collect()
    }

    pub fn predict(&self, row: &[f64]) -> usize {
        super::argmax(&self.predict_proba(row))
    }

    /// Internal nodes crossed on the way to this row's leaf.
    pub fn decision_path(&self, row: &[f64]) -> Vec<PathStep> {
        let mut steps = Vec::new();
        let mut id = 0;
        loop {
            let node = &self.nodes[id];
            let (Some(feature), Some(left), Some(right)) = (node.feature, node.left, node.right)
            else {
                return steps;
            };
            let value = row.get(feature).copied().unwrap_or(0.0);
            let goes_left = value <= node.threshold;
            steps.push(PathStep {
                id,
                feature,
                threshold: node.threshold,
                direction: if goes_left { "left" } else { "right" },
                samples: node.samples,
            });
            id = if goes_left { left } else { right };
        }
    }

    pub fn depth(&self) -> usize {
        self.depth_below(0)
    }

    fn depth_below(&self, id: usize) -> usize {
        let node = &self.nodes[id];
        match (node.left, node.right) {
            (Some(left), Some(right)) => {
                1 + self.depth_below(left).max(self.depth_below(right))
            }
            _ => 0,
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_leaf()).count()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn leaf_for(&self, row: &[f64]) -> usize {
        let mut id = 0;
        loop {
            let node = &self.nodes[id];
            match (node.feature, node.left, node.right) {
                (Some(feature), Some(left), Some(right)) => {
                    let value = row.get(feature).copied().unwrap_or(0.0);
                    id = if value <= node.threshold { left } else { right };
                }
                _ => return id,
            }
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    impurity_decrease: f64,
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    n_classes: usize,
    params: TreeParams,
    features_per_split: Option<usize>,
    rng: StdRng,
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
    n_total: usize,
}

impl TreeBuilder<'_> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&indices);
        let impurity = gini(&counts, indices.len());

        let splittable = depth < self.params.max_depth
            && impurity > 0.0
            && indices.len() >= self.params.min_samples_leaf * 2
            && indices.len() >= 2;

        if splittable {
            if let Some(split) = self.best_split(&indices, impurity) {
                self.importances[split.feature] +=
                    indices.len() as f64 / self.n_total as f64 * split.impurity_decrease;

                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .copied()
                    .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

                let id = self.nodes.len();
                self.nodes.push(TreeNode {
                    feature: Some(split.feature),
                    threshold: split.threshold,
                    left: None,
                    right: None,
                    samples: indices.len(),
                    class_counts: counts,
                });
                let left = self.build(left_rows, depth + 1);
                let right = self.build(right_rows, depth + 1);
                self.nodes[id].left = Some(left);
                self.nodes[id].right = Some(right);
                return id;
            }
        }

        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            feature: None,
            threshold: 0.0,
            left: None,
            right: None,
            samples: indices.len(),
            class_counts: counts,
        });
        id
    }

    /// Scan every candidate boundary of every candidate feature and
    /// keep the split with the largest impurity decrease. Ties keep
    /// the first candidate, which makes fitting deterministic.
    fn best_split(&mut self, indices: &[usize], node_impurity: f64) -> Option<Split> {
        let candidates = self.candidate_features();
        let n = indices.len();
        let total_counts = self.class_counts(indices);
        let mut best: Option<Split> = None;

        for &feature in &candidates {
            let mut order = indices.to_vec();
            order.sort_by(|&a, &b| {
                self.x[[a, feature]]
                    .partial_cmp(&self.x[[b, feature]])
                    .unwrap_or(Ordering::Equal)
            });

            let mut left_counts = vec![0usize; self.n_classes];
            let mut right_counts = total_counts.clone();

            for position in 0..n - 1 {
                let class = self.y[order[position]];
                left_counts[class] += 1;
                right_counts[class] -= 1;

                let here = self.x[[order[position], feature]];
                let next = self.x[[order[position + 1], feature]];
                if next <= here {
                    continue;
                }

                let n_left = position + 1;
                let n_right = n - n_left;
                if n_left < self.params.min_samples_leaf
                    || n_right < self.params.min_samples_leaf
                {
                    continue;
                }

                let weighted = (n_left as f64 * gini(&left_counts, n_left)
                    + n_right as f64 * gini(&right_counts, n_right))
                    / n as f64;
                let decrease = node_impurity - weighted;
                let floor = best.map_or(MIN_IMPURITY_DECREASE, |b| b.impurity_decrease);
                if decrease > floor {
                    best = Some(Split {
                        feature,
                        threshold: (here + next) / 2.0,
                        impurity_decrease: decrease,
                    });
                }
            }
        }

        best
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.x.ncols();
        match self.features_per_split {
            Some(m) if m < n_features => {
                let mut all: Vec<usize> = (0..n_features).collect();
                all.shuffle(&mut self.rng);
                all.truncate(m);
                all.sort_unstable();
                all
            }
            _ => (0..n_features).collect(),
        }
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }
}

pub(crate) fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&count| {
            let p = count as f64 / total;
            p * p
        })
        .sum::<f64>()
}
