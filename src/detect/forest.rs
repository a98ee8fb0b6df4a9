//! Isolation forest: an ensemble of random partitioning trees that scores a
//! point by how quickly it is isolated.
//!
//! Scores follow the usual convention of `-2^(-E[h(x)] / c(psi))`, so they are
//! negative and more negative means more anomalous. The decision offset is the
//! `contamination` quantile of the training scores.

use crate::config::ModelConfig;
use crate::detect::scaler::check_width;
use crate::detect::DetectError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl From<&ModelConfig> for ForestParams {
    fn from(cfg: &ModelConfig) -> Self {
        Self {
            n_estimators: cfg.n_estimators,
            max_samples: cfg.max_samples,
            contamination: cfg.contamination,
            seed: cfg.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One tree, stored as an arena with the root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(rows: &[Vec<f64>], indices: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(rows, indices, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        rows: &[Vec<f64>],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: indices.len() });

        if depth >= max_depth || indices.len() <= 1 {
            return id;
        }

        // Draw features in random order until one is not constant on this node.
        let width = rows[indices[0]].len();
        let mut candidates: Vec<usize> = (0..width).collect();
        candidates.shuffle(rng);

        let split = candidates.into_iter().find_map(|f| {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(rows[i][f]), hi.max(rows[i][f]))
            });
            (hi > lo).then_some((f, lo, hi))
        });
        let Some((feature, lo, hi)) = split else {
            return id;
        };

        let threshold = rng.gen_range(lo..hi);
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| rows[i][feature] <= threshold);

        let left = self.grow(rows, left_idx, depth + 1, max_depth, rng);
        let right = self.grow(rows, right_idx, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    /// Edges from the root to the leaf holding `x`, plus the expected depth of
    /// the unbuilt subtree below that leaf.
    fn path_length(&self, x: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

/// Average path length of an unsuccessful search in a binary search tree of `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    params: ForestParams,
    trees: Vec<IsolationTree>,
    /// Per-tree subsample size actually used.
    subsample: usize,
    n_features: usize,
    /// Scores below this are outliers.
    offset: f64,
}

impl IsolationForest {
    pub fn fit(rows: &[Vec<f64>], params: ForestParams) -> Result<Self, DetectError> {
        if rows.len() < 2 {
            return Err(DetectError::InsufficientSamples {
                needed: 2,
                have: rows.len(),
            });
        }
        let n_features = check_width(rows)?;
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(DetectError::NonFinite);
        }

        let subsample = params.max_samples.clamp(2, rows.len());
        let max_depth = (subsample as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators.max(1))
            .map(|_| {
                let indices = rand::seq::index::sample(&mut rng, rows.len(), subsample).into_vec();
                IsolationTree::build(rows, indices, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            params,
            trees,
            subsample,
            n_features,
            offset: 0.0,
        };

        let mut train_scores = forest.score_samples(rows)?;
        train_scores.sort_by(f64::total_cmp);
        forest.offset = percentile(&train_scores, forest.params.contamination);
        Ok(forest)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Raw scores, one per row; more negative is more anomalous.
    pub fn score_samples(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, DetectError> {
        let norm = average_path_length(self.subsample);
        rows.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(DetectError::DimensionMismatch {
                        expected: self.n_features,
                        got: row.len(),
                    });
                }
                let mean_depth = self.trees.iter().map(|t| t.path_length(row)).sum::<f64>()
                    / self.trees.len() as f64;
                Ok(-(2f64.powf(-mean_depth / norm)))
            })
            .collect()
    }

    /// Outlier labels for already-computed scores.
    pub fn label(&self, scores: &[f64]) -> Vec<bool> {
        scores.iter().map(|&s| s < self.offset).collect()
    }
}

/// Linear-interpolated quantile `q` in [0, 1] of an ascending slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
