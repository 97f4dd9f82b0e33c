//! CART adapter: a thin, greedy impurity-splitting trainer used as an
//! external point of comparison for the Bayesian searchers (spec.md §1,
//! §6 "CART adapter: max_depth and/or max_leaf_nodes").
//!
//! No pruning and no continuous-feature handling — both are out of scope.

use super::dataset::{Dataset, Subset};
use super::tree::Node;

/// Stopping criteria for [`fit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CartParams {
    pub max_depth: Option<u32>,
    pub max_leaf_nodes: Option<usize>,
}

/// Gini impurity of the label distribution within `mask`.
fn gini(dataset: &Dataset, mask: &Subset) -> f64 {
    let size = mask.size();
    if size == 0 {
        return 0.0;
    }
    let (n0, n1) = dataset.label_counts(mask);
    let p0 = n0 as f64 / size as f64;
    let p1 = n1 as f64 / size as f64;
    1.0 - p0 * p0 - p1 * p1
}

fn weighted_gini(dataset: &Dataset, left: &Subset, right: &Subset) -> f64 {
    let n = (left.size() + right.size()) as f64;
    let wl = left.size() as f64 / n;
    let wr = right.size() as f64 / n;
    wl * gini(dataset, left) + wr * gini(dataset, right)
}

/// Greedily fit a tree by recursively splitting on the feature with lowest
/// weighted Gini impurity, breaking ties by smallest feature index for
/// determinism, until `params` stops growth or no valid feature remains.
pub fn fit(dataset: &Dataset, subset: &Subset, params: &CartParams) -> Node {
    fit_at_depth(dataset, subset, params, 0, &mut 1)
}

fn fit_at_depth(
    dataset: &Dataset,
    subset: &Subset,
    params: &CartParams,
    depth: u32,
    leaf_count: &mut usize,
) -> Node {
    let depth_exhausted = params.max_depth.is_some_and(|max| depth >= max);
    let leaves_exhausted = params
        .max_leaf_nodes
        .is_some_and(|max| *leaf_count >= max);

    if depth_exhausted || leaves_exhausted {
        return Node::leaf();
    }

    let mut best: Option<(usize, f64)> = None;
    for f in dataset.valid_features(subset) {
        let (left, right) = dataset.split(subset, f);
        let score = weighted_gini(dataset, &left, &right);
        best = match best {
            Some((bf, bscore)) if bscore <= score => Some((bf, bscore)),
            _ => Some((f, score)),
        };
    }

    match best {
        None => Node::leaf(),
        Some((feature, _)) => {
            let (left_subset, right_subset) = dataset.split(subset, feature);
            // Splitting replaces one leaf slot with two.
            *leaf_count += 1;
            let left = fit_at_depth(dataset, &left_subset, params, depth + 1, leaf_count);
            let right = fit_at_depth(dataset, &right_subset, params, depth + 1, leaf_count);
            Node::internal(feature, left, right)
        }
    }
}
