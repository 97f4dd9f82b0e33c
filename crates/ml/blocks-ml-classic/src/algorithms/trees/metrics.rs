//! Shared scoring utilities used by every BCRT searcher and by tests:
//! accuracy of a fitted tree and the log-posterior of an arbitrary
//! (possibly externally constructed) tree (spec.md §2's "Scoring metrics /
//! shared utilities" row).

use blocks_stats_bayesian::Hyperparameters;

use super::dataset::{Dataset, Subset};
use super::tree::Node;
use crate::error::Result;

/// Fraction of samples in `subset` whose majority-vote leaf label matches
/// the true label.
pub fn accuracy(tree: &Node, dataset: &Dataset, subset: &Subset) -> Result<f64> {
    let predictions = tree.predict(dataset, subset)?;
    let total = predictions.len();
    if total == 0 {
        return Ok(0.0);
    }
    let mut correct = 0usize;
    for (sample, predicted) in predictions {
        if predicted == dataset.label_of(sample) {
            correct += 1;
        }
    }
    Ok(correct as f64 / total as f64)
}

/// `log_posterior` of a tree that was not necessarily produced by one of
/// this workspace's searchers (e.g. a tree parsed from a serialized string
/// in a test fixture).
pub fn log_posterior_of(
    tree: &Node,
    dataset: &Dataset,
    subset: &Subset,
    h: &Hyperparameters,
) -> f64 {
    tree.log_posterior(dataset, subset, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_perfect_split() {
        let ds = Dataset::from_rows(&[vec![0, 0], vec![0, 0], vec![1, 1], vec![1, 1]]).unwrap();
        let mask = ds.full_mask();
        let mut tree = Node::internal(0, Node::leaf(), Node::leaf());
        tree.fit(&ds, &mask);
        assert_eq!(accuracy(&tree, &ds, &mask).unwrap(), 1.0);
    }

    #[test]
    fn test_accuracy_single_leaf_majority_vote() {
        let ds = Dataset::from_rows(&[vec![0, 0], vec![0, 0], vec![0, 1]]).unwrap();
        let mask = ds.full_mask();
        let mut tree = Node::leaf();
        tree.fit(&ds, &mask);
        // majority label is 0 (2 of 3), so accuracy is 2/3.
        assert!((accuracy(&tree, &ds, &mask).unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }
}
