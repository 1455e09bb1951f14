//! Random forest regression: bootstrap-sampled CART trees split on variance
//! reduction, averaged at prediction time.
//!
//! Tree `i` draws from its own PCG stream derived from the forest seed, so a
//! fitted forest is identical regardless of how rayon schedules the trees.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_pcg::Pcg64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
    pub bootstrap: bool,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_depth: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 300,
            seed: 42,
            bootstrap: true,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestError {
    #[error("cannot fit a forest without training rows")]
    EmptyTrainingSet,
    #[error("feature matrix has {rows} rows but {labels} labels were supplied")]
    ShapeMismatch { rows: usize, labels: usize },
    #[error("forest must contain at least one tree")]
    NoTrees,
    #[error("forest expects {found} features, not {expected}")]
    FeatureCount { expected: usize, found: usize },
    #[error("tree {tree} has no nodes")]
    EmptyTree { tree: usize },
    #[error("tree {tree} node {node} splits on unknown feature {feature}")]
    UnknownFeature {
        tree: usize,
        node: usize,
        feature: usize,
    },
    #[error("tree {tree} node {node} points at invalid child {child}")]
    InvalidChild {
        tree: usize,
        node: usize,
        child: usize,
    },
    #[error("tree {tree} node {node} holds a non-finite value")]
    NonFinite { tree: usize, node: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Children always sit after their parent, which rules out cycles.
    fn validate(&self, tree: usize, n_features: usize) -> Result<(), ForestError> {
        if self.nodes.is_empty() {
            return Err(ForestError::EmptyTree { tree });
        }

        for (node, entry) in self.nodes.iter().enumerate() {
            match *entry {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(ForestError::NonFinite { tree, node });
                }
                Node::Leaf { .. } => {}
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= n_features {
                        return Err(ForestError::UnknownFeature {
                            tree,
                            node,
                            feature,
                        });
                    }
                    if !threshold.is_finite() {
                        return Err(ForestError::NonFinite { tree, node });
                    }
                    if let Some(child) = [left, right]
                        .into_iter()
                        .find(|&child| child <= node || child >= self.nodes.len())
                    {
                        return Err(ForestError::InvalidChild { tree, node, child });
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        params: &ForestParams,
    ) -> Result<Self, ForestError> {
        let rows = x.nrows();
        if rows == 0 {
            return Err(ForestError::EmptyTrainingSet);
        }
        if rows != y.len() {
            return Err(ForestError::ShapeMismatch {
                rows,
                labels: y.len(),
            });
        }
        if params.n_trees == 0 {
            return Err(ForestError::NoTrees);
        }

        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|tree_index| {
                let mut rng = tree_rng(params.seed, tree_index);
                let samples: Vec<usize> = if params.bootstrap {
                    (0..rows).map(|_| rng.gen_range(0..rows)).collect()
                } else {
                    (0..rows).collect()
                };
                grow_tree(&x, &y, samples, params, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            n_features: x.ncols(),
        })
    }

    /// Mean of the tree outputs. `row` must hold `n_features` values.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        debug_assert_eq!(row.len(), self.n_features);
        let total: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| match row.as_slice() {
                Some(values) => self.predict_row(values),
                None => self.predict_row(&row.to_vec()),
            })
            .collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Checks a decoded forest can be evaluated on rows of `expected_features`
    /// values without indexing out of bounds or looping.
    pub fn validate(&self, expected_features: usize) -> Result<(), ForestError> {
        if self.n_features != expected_features {
            return Err(ForestError::FeatureCount {
                expected: expected_features,
                found: self.n_features,
            });
        }
        if self.trees.is_empty() {
            return Err(ForestError::NoTrees);
        }
        self.trees
            .iter()
            .enumerate()
            .try_for_each(|(index, tree)| tree.validate(index, self.n_features))
    }
}

fn tree_rng(seed: u64, tree_index: usize) -> Pcg64 {
    Pcg64::new(u128::from(seed), (tree_index as u128) << 1 | 1)
}

struct Candidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

fn grow_tree(
    x: &ArrayView2<'_, f64>,
    y: &ArrayView1<'_, f64>,
    samples: Vec<usize>,
    params: &ForestParams,
    rng: &mut Pcg64,
) -> RegressionTree {
    let mut nodes = vec![Node::Leaf { value: 0.0 }];
    let mut pending = vec![(0usize, samples, 0usize)];

    while let Some((slot, samples, depth)) = pending.pop() {
        let splittable = samples.len() >= params.min_samples_split.max(2)
            && params.max_depth.map_or(true, |limit| depth < limit);

        let candidate = if splittable {
            best_split(x, y, &samples, params.min_samples_leaf.max(1), rng)
        } else {
            None
        };

        let Some(candidate) = candidate else {
            nodes[slot] = Node::Leaf {
                value: mean_label(y, &samples),
            };
            continue;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&sample| x[[sample, candidate.feature]] <= candidate.threshold);

        let left_slot = nodes.len();
        let right_slot = left_slot + 1;
        nodes.push(Node::Leaf { value: 0.0 });
        nodes.push(Node::Leaf { value: 0.0 });
        nodes[slot] = Node::Split {
            feature: candidate.feature,
            threshold: candidate.threshold,
            left: left_slot,
            right: right_slot,
        };

        pending.push((right_slot, right, depth + 1));
        pending.push((left_slot, left, depth + 1));
    }

    RegressionTree { nodes }
}

fn mean_label(y: &ArrayView1<'_, f64>, samples: &[usize]) -> f64 {
    let total: f64 = samples.iter().map(|&sample| y[sample]).sum();
    total / samples.len() as f64
}

/// Lowest summed squared error split over every feature, or `None` when the
/// node is pure or no threshold separates distinct values.
fn best_split(
    x: &ArrayView2<'_, f64>,
    y: &ArrayView1<'_, f64>,
    samples: &[usize],
    min_samples_leaf: usize,
    rng: &mut Pcg64,
) -> Option<Candidate> {
    let count = samples.len();
    let (sum, sum_sq) = samples.iter().fold((0.0, 0.0), |(sum, sum_sq), &sample| {
        let label = y[sample];
        (sum + label, sum_sq + label * label)
    });
    let parent_sse = sum_sq - sum * sum / count as f64;
    if parent_sse <= f64::EPSILON * sum_sq.max(1.0) {
        return None;
    }

    let mut features: Vec<usize> = (0..x.ncols()).collect();
    features.shuffle(rng);

    let mut order = samples.to_vec();
    let mut best: Option<Candidate> = None;

    for feature in features {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for position in 0..count - 1 {
            let label = y[order[position]];
            left_sum += label;
            left_sq += label * label;

            let left_count = position + 1;
            let right_count = count - left_count;
            if left_count < min_samples_leaf || right_count < min_samples_leaf {
                continue;
            }

            let current = x[[order[position], feature]];
            let next = x[[order[position + 1], feature]];
            if next <= current {
                continue;
            }

            let right_sum = sum - left_sum;
            let right_sq = sum_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_count as f64)
                + (right_sq - right_sum * right_sum / right_count as f64);

            if best.as_ref().map_or(true, |best| sse < best.sse) {
                let mut threshold = current / 2.0 + next / 2.0;
                if threshold >= next || threshold < current {
                    threshold = current;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    sse,
                });
            }
        }
    }

    best.filter(|candidate| candidate.sse < parent_sse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn small_params(n_trees: usize) -> ForestParams {
        ForestParams {
            n_trees,
            ..ForestParams::default()
        }
    }

    #[test]
    fn single_tree_without_bootstrap_fits_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 50.0, 50.0, 50.0];
        let params = ForestParams {
            n_trees: 1,
            bootstrap: false,
            ..ForestParams::default()
        };

        let forest = RandomForest::fit(x.view(), y.view(), &params).expect("fit");
        assert_eq!(forest.predict_row(&[2.5]), 5.0);
        assert_eq!(forest.predict_row(&[11.5]), 50.0);
        assert_eq!(forest.predict_row(&[6.5]), 5.0);
        assert_eq!(forest.trees()[0].node_count(), 3);
    }

    #[test]
    fn constant_labels_produce_single_leaf_trees() {
        let x = array![[1.0, 4.0], [2.0, 3.0], [3.0, 2.0]];
        let y = array![7.0, 7.0, 7.0];

        let forest = RandomForest::fit(x.view(), y.view(), &small_params(4)).expect("fit");
        assert!(forest.trees().iter().all(|tree| tree.node_count() == 1));
        assert_eq!(forest.predict_row(&[100.0, -100.0]), 7.0);
    }

    #[test]
    fn predictions_stay_within_label_range() {
        let x = Array2::from_shape_fn((40, 2), |(row, column)| (row * (column + 1)) as f64);
        let y = Array1::from_shape_fn(40, |row| (row % 7) as f64 * 10.0);

        let forest = RandomForest::fit(x.view(), y.view(), &small_params(25)).expect("fit");
        let predictions = forest.predict(x.view());
        assert_eq!(predictions.len(), 40);
        assert!(predictions.iter().all(|value| (0.0..=60.0).contains(value)));
        assert!(forest.predict_row(&[-1.0e9, 1.0e9]).is_finite());
    }

    #[test]
    fn same_seed_builds_identical_forests() {
        let x = Array2::from_shape_fn((30, 3), |(row, column)| {
            ((row * 31 + column * 17) % 13) as f64
        });
        let y = Array1::from_shape_fn(30, |row| ((row * 7) % 11) as f64);

        let first = RandomForest::fit(x.view(), y.view(), &small_params(20)).expect("fit");
        let second = RandomForest::fit(x.view(), y.view(), &small_params(20)).expect("fit");
        assert_eq!(first, second);

        let reseeded = ForestParams {
            seed: 7,
            ..small_params(20)
        };
        let third = RandomForest::fit(x.view(), y.view(), &reseeded).expect("fit");
        assert_ne!(first, third);
    }

    fn split_tree(feature: usize, left: usize, right: usize) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                Node::Split {
                    feature,
                    threshold: 0.5,
                    left,
                    right,
                },
                Node::Leaf { value: 10.0 },
                Node::Leaf { value: 20.0 },
            ],
        }
    }

    fn forest_of(trees: Vec<RegressionTree>) -> RandomForest {
        RandomForest {
            trees,
            n_features: 2,
        }
    }

    #[test]
    fn fitted_forest_passes_validation() {
        let x = Array2::from_shape_fn((20, 2), |(row, column)| ((row * 3 + column) % 7) as f64);
        let y = Array1::from_shape_fn(20, |row| row as f64);

        let forest = RandomForest::fit(x.view(), y.view(), &small_params(5)).expect("fit");
        assert_eq!(forest.validate(2), Ok(()));
        assert_eq!(
            forest.validate(8),
            Err(ForestError::FeatureCount {
                expected: 8,
                found: 2
            })
        );
    }

    #[test]
    fn validation_rejects_malformed_trees() {
        assert_eq!(forest_of(vec![split_tree(1, 1, 2)]).validate(2), Ok(()));
        assert_eq!(forest_of(Vec::new()).validate(2), Err(ForestError::NoTrees));
        assert_eq!(
            forest_of(vec![RegressionTree { nodes: Vec::new() }]).validate(2),
            Err(ForestError::EmptyTree { tree: 0 })
        );
        assert_eq!(
            forest_of(vec![split_tree(1, 1, 2), split_tree(9, 1, 2)]).validate(2),
            Err(ForestError::UnknownFeature {
                tree: 1,
                node: 0,
                feature: 9
            })
        );
        assert_eq!(
            forest_of(vec![split_tree(0, 1, 7)]).validate(2),
            Err(ForestError::InvalidChild {
                tree: 0,
                node: 0,
                child: 7
            })
        );
        assert_eq!(
            forest_of(vec![split_tree(0, 0, 2)]).validate(2),
            Err(ForestError::InvalidChild {
                tree: 0,
                node: 0,
                child: 0
            })
        );

        let mut poisoned = split_tree(0, 1, 2);
        poisoned.nodes[2] = Node::Leaf { value: f64::NAN };
        assert_eq!(
            forest_of(vec![poisoned]).validate(2),
            Err(ForestError::NonFinite { tree: 0, node: 2 })
        );
    }

    #[test]
    fn fit_rejects_degenerate_inputs() {
        let empty = Array2::<f64>::zeros((0, 2));
        let no_labels = Array1::<f64>::zeros(0);
        assert_eq!(
            RandomForest::fit(empty.view(), no_labels.view(), &small_params(3)),
            Err(ForestError::EmptyTrainingSet)
        );

        let x = array![[1.0], [2.0]];
        let y = array![1.0];
        assert_eq!(
            RandomForest::fit(x.view(), y.view(), &small_params(3)),
            Err(ForestError::ShapeMismatch { rows: 2, labels: 1 })
        );

        let y = array![1.0, 2.0];
        assert_eq!(
            RandomForest::fit(x.view(), y.view(), &small_params(0)),
            Err(ForestError::NoTrees)
        );
    }
}
