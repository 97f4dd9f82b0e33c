//! Chipman-style Metropolis-Hastings sampler over the tree posterior.
//!
//! Each iteration proposes one of four moves, chosen uniformly — GROW
//! (split a leaf), PRUNE (collapse an internal node whose children are both
//! leaves), CHANGE (swap the splitting feature of such a node) and SWAP
//! (swap the features of a parent/child pair) — and accepts it with
//! Metropolis probability `min(1, exp(log_acc))`.
//!
//! GROW and PRUNE are mirror images: each computes a Hastings correction
//! from the change in how many leaves/prunable-nodes/valid-features the
//! move had to choose among, then adds it to the full-tree log-posterior
//! difference. Grounded on `bdtmcmc.py`'s move set, reworked here to
//! recompute eligible-node counts by a fresh tree traversal each iteration
//! rather than maintaining incremental side tables (see `DESIGN.md`).

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use blocks_ml_classic::algorithms::trees::dataset::{Dataset, Subset};
use blocks_ml_classic::algorithms::trees::tree::Node;
use blocks_stats_bayesian::Hyperparameters;

use crate::error::{BcrtError, Result};
use crate::paths::{
    collect_paths, get_node, is_both_children_terminal, replace_node, subset_at, Path,
};

/// Parameters of a single sampling run.
#[derive(Debug, Clone, Copy)]
pub struct Params {
    pub hyper: Hyperparameters,
    pub iterations: u64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct McmcResult {
    pub final_tree: Node,
    pub best_tree: Node,
    pub best_log_posterior: f64,
    pub samples: Vec<Node>,
    pub log_posteriors: Vec<f64>,
    pub acceptance_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Grow,
    Prune,
    Change,
    Swap,
}

/// Run `params.iterations` steps of the sampler starting from a single
/// leaf, returning every visited tree.
///
/// MCMC and SMC both require a symmetric Beta prior (`rho0 == rho1`): the
/// move set assumes swapping a split's left and right children leaves the
/// prior unchanged.
pub fn run(dataset: &Dataset, subset: &Subset, params: &Params) -> Result<McmcResult> {
    if !params.hyper.symmetric_rho() {
        return Err(BcrtError::AsymmetricRho(params.hyper.rho0, params.hyper.rho1));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut tree = Node::leaf();
    let mut samples = Vec::with_capacity(params.iterations as usize);
    let mut log_posteriors = Vec::with_capacity(params.iterations as usize);
    let mut accepted = 0u64;
    let mut best_tree = tree.clone();
    let mut best_log_posterior = tree.log_posterior(dataset, subset, &params.hyper);

    for i in 0..params.iterations {
        let mv = match rng.gen_range(0..4u8) {
            0 => Move::Grow,
            1 => Move::Prune,
            2 => Move::Change,
            _ => Move::Swap,
        };
        let proposal = match mv {
            Move::Grow => propose_grow(dataset, subset, &tree, &mut rng),
            Move::Prune => propose_prune(dataset, subset, &tree, &mut rng),
            Move::Change => propose_change(dataset, subset, &tree, &mut rng),
            Move::Swap => propose_swap(dataset, subset, &tree, &mut rng),
        };

        if let Some((candidate, log_hastings)) = proposal {
            let old_post = tree.log_posterior(dataset, subset, &params.hyper);
            let new_post = candidate.log_posterior(dataset, subset, &params.hyper);
            let log_acc = (new_post - old_post) + log_hastings;
            let u: f64 = rng.gen();
            if log_acc >= 0.0 || u.ln() < log_acc {
                tree = candidate;
                accepted += 1;
            }
        }

        let post = tree.log_posterior(dataset, subset, &params.hyper);
        if post > best_log_posterior {
            best_log_posterior = post;
            best_tree = tree.clone();
        }
        samples.push(tree.clone());
        log_posteriors.push(post);
        trace!(iteration = i, mv = ?mv, accepted, "mcmc step");
    }

    Ok(McmcResult {
        final_tree: tree,
        best_tree,
        best_log_posterior,
        acceptance_rate: accepted as f64 / (params.iterations.max(1) as f64),
        samples,
        log_posteriors,
    })
}

/// Paths to the parent of every internal node whose own children are both
/// leaves (the only pairs this sampler's SWAP move considers, so the swap
/// can never leave a deeper, harder-to-validate split dangling — see
/// `DESIGN.md`). Returns `(path_to_parent, child_is_right)`.
fn collect_swap_candidates(root: &Node) -> Vec<(Path, bool)> {
    fn walk(node: &Node, path: &mut Path, out: &mut Vec<(Path, bool)>) {
        if let Node::Internal { left, right, .. } = node {
            if is_both_children_terminal(left) {
                out.push((path.clone(), false));
            }
            if is_both_children_terminal(right) {
                out.push((path.clone(), true));
            }
            path.push(0);
            walk(left, path, out);
            path.pop();
            path.push(1);
            walk(right, path, out);
            path.pop();
        }
    }
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk(root, &mut path, &mut out);
    out
}

fn propose_grow(
    dataset: &Dataset,
    root_subset: &Subset,
    tree: &Node,
    rng: &mut impl Rng,
) -> Option<(Node, f64)> {
    let leaves = collect_paths(tree, Node::is_leaf);
    let path = &leaves[rng.gen_range(0..leaves.len())];
    let (subset, _depth) = subset_at(dataset, root_subset, tree, path);
    let valid: Vec<usize> = dataset.valid_features(&subset).collect();
    if valid.is_empty() {
        return None;
    }
    let feature = valid[rng.gen_range(0..valid.len())];
    let new_tree = replace_node(tree, path, Node::internal(feature, Node::leaf(), Node::leaf()));
    let n_prunable_new = collect_paths(&new_tree, is_both_children_terminal).len();
    let log_hastings =
        (leaves.len() as f64).ln() + (valid.len() as f64).ln() - (n_prunable_new as f64).ln();
    Some((new_tree, log_hastings))
}

fn propose_prune(
    dataset: &Dataset,
    root_subset: &Subset,
    tree: &Node,
    rng: &mut impl Rng,
) -> Option<(Node, f64)> {
    let prunable = collect_paths(tree, is_both_children_terminal);
    if prunable.is_empty() {
        return None;
    }
    let path = &prunable[rng.gen_range(0..prunable.len())];
    let (subset, _depth) = subset_at(dataset, root_subset, tree, path);
    let v = dataset.num_valid_features(&subset);
    if v == 0 {
        return None;
    }
    let new_tree = replace_node(tree, path, Node::leaf());
    let n_leaves_new = collect_paths(&new_tree, Node::is_leaf).len();
    let log_hastings =
        (prunable.len() as f64).ln() - (n_leaves_new as f64).ln() - (v as f64).ln();
    Some((new_tree, log_hastings))
}

/// Changes the splitting feature of an internal node with two leaf
/// children, to a different valid feature on the same subset — restricted
/// to such nodes so the move can never make a deeper split invalid.
fn propose_change(
    dataset: &Dataset,
    root_subset: &Subset,
    tree: &Node,
    rng: &mut impl Rng,
) -> Option<(Node, f64)> {
    let candidates = collect_paths(tree, is_both_children_terminal);
    if candidates.is_empty() {
        return None;
    }
    let path = &candidates[rng.gen_range(0..candidates.len())];
    let old_feature = match get_node(tree, path) {
        Node::Internal { feature, .. } => *feature,
        Node::Leaf { .. } => unreachable!("collect_paths filtered to internal nodes"),
    };
    let (subset, _depth) = subset_at(dataset, root_subset, tree, path);
    let alts: Vec<usize> = dataset
        .valid_features(&subset)
        .filter(|&f| f != old_feature)
        .collect();
    if alts.is_empty() {
        return None;
    }
    let new_feature = alts[rng.gen_range(0..alts.len())];
    let new_tree = replace_node(tree, path, Node::internal(new_feature, Node::leaf(), Node::leaf()));
    // Symmetric proposal: the same node is eligible and offers the same
    // number of alternatives in both directions.
    Some((new_tree, 0.0))
}

/// Swaps the splitting features of a parent and a both-leaf-children
/// child, rejecting the swap if it would make either split degenerate.
fn propose_swap(
    dataset: &Dataset,
    root_subset: &Subset,
    tree: &Node,
    rng: &mut impl Rng,
) -> Option<(Node, f64)> {
    let candidates = collect_swap_candidates(tree);
    if candidates.is_empty() {
        return None;
    }
    let (parent_path, child_is_right) = &candidates[rng.gen_range(0..candidates.len())];

    let (parent_feature, left, right) = match get_node(tree, parent_path) {
        Node::Internal {
            feature,
            left,
            right,
        } => (*feature, (**left).clone(), (**right).clone()),
        Node::Leaf { .. } => unreachable!("swap candidates are internal nodes"),
    };
    let child = if *child_is_right { &right } else { &left };
    let child_feature = match child {
        Node::Internal { feature, .. } => *feature,
        Node::Leaf { .. } => unreachable!("swap candidates have an internal child"),
    };

    let (parent_subset, _depth) = subset_at(dataset, root_subset, tree, parent_path);
    let count = dataset.count_with_feature(&parent_subset, child_feature);
    if count == 0 || count == parent_subset.size() {
        return None;
    }
    let (parent_left, parent_right) = dataset.split(&parent_subset, child_feature);
    let child_subset = if *child_is_right {
        &parent_right
    } else {
        &parent_left
    };
    let child_count = dataset.count_with_feature(child_subset, parent_feature);
    if child_count == 0 || child_count == child_subset.size() {
        return None;
    }

    let new_child = Node::internal(parent_feature, Node::leaf(), Node::leaf());
    let (new_left, new_right) = if *child_is_right {
        (left, new_child)
    } else {
        (new_child, right)
    };
    let new_parent = Node::internal(child_feature, new_left, new_right);
    let new_tree = replace_node(tree, parent_path, new_parent);
    // Swapping is its own inverse: the candidate set has the same size
    // before and after.
    Some((new_tree, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor_dataset() -> Dataset {
        Dataset::from_rows(&[
            vec![0, 0, 0],
            vec![0, 1, 1],
            vec![1, 0, 1],
            vec![1, 1, 0],
        ])
        .unwrap()
    }

    fn hyper() -> Hyperparameters {
        Hyperparameters::new(0.95, 0.5, 2.5, 2.5).unwrap()
    }

    #[test]
    fn test_rejects_asymmetric_rho() {
        let ds = xor_dataset();
        let params = Params {
            hyper: Hyperparameters::new(0.95, 0.5, 1.0, 2.0).unwrap(),
            iterations: 10,
            seed: 1,
        };
        assert!(run(&ds, &ds.full_mask(), &params).is_err());
    }

    #[test]
    fn test_same_seed_reproducible() {
        let ds = xor_dataset();
        let params = Params {
            hyper: hyper(),
            iterations: 200,
            seed: 42,
        };
        let a = run(&ds, &ds.full_mask(), &params).unwrap();
        let b = run(&ds, &ds.full_mask(), &params).unwrap();
        assert_eq!(a.final_tree.serialize(), b.final_tree.serialize());
        assert_eq!(a.log_posteriors, b.log_posteriors);
    }

    #[test]
    fn test_acceptance_rate_in_unit_interval() {
        let ds = xor_dataset();
        let params = Params {
            hyper: hyper(),
            iterations: 300,
            seed: 7,
        };
        let result = run(&ds, &ds.full_mask(), &params).unwrap();
        assert!(result.acceptance_rate >= 0.0 && result.acceptance_rate <= 1.0);
        assert_eq!(result.samples.len(), 300);
    }

    #[test]
    fn test_chain_finds_the_perfect_split_on_s1() {
        let ds = Dataset::from_rows(&[vec![0, 0], vec![0, 0], vec![1, 1], vec![1, 1]]).unwrap();
        let params = Params {
            hyper: hyper(),
            iterations: 500,
            seed: 3,
        };
        let result = run(&ds, &ds.full_mask(), &params).unwrap();
        let map_tree = Node::internal(0, Node::leaf(), Node::leaf());
        let map_post = map_tree.log_posterior(&ds, &ds.full_mask(), &params.hyper);
        assert!((result.best_log_posterior - map_post).abs() < 1e-6);
    }
}
