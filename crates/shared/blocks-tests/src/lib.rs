/*!
Shared [`proptest`] strategies for the binary datasets and classification
trees used across the `blocks-ml-classic` and `blocks-ml-bcrt` crates.

Kept in its own crate so property tests in either crate (or in
integration tests under `blocks-ml-bcrt/tests`) can draw from the same
generators instead of hand-rolling fixtures per test module.
*/

use proptest::prelude::*;

use blocks_ml_classic::algorithms::trees::dataset::Dataset;
use blocks_ml_classic::algorithms::trees::tree::Node;

/// An `n x (d+1)` matrix of 0/1 entries, the last column being the label.
pub fn arb_binary_matrix(n: usize, d: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(0u8..=1, d + 1), n)
}

/// A dataset with `n` in `2..=max_n` samples and `d` in `1..=max_d`
/// features, entries drawn uniformly from `{0, 1}`.
pub fn arb_dataset(max_n: usize, max_d: usize) -> impl Strategy<Value = Dataset> {
    (2..=max_n, 1..=max_d).prop_flat_map(|(n, d)| {
        arb_binary_matrix(n, d).prop_map(|rows| Dataset::from_rows(&rows).expect("rows are well-formed by construction"))
    })
}

/// A structurally valid tree with feature indices in `0..num_features`
/// and depth at most `max_depth`, independent of any particular dataset's
/// split validity. Useful for shape/serialization properties; scoring
/// properties need a tree grounded in an actual dataset's valid splits
/// instead.
pub fn arb_tree(num_features: usize, max_depth: u32) -> impl Strategy<Value = Node> {
    fn go(num_features: usize, depth: u32) -> BoxedStrategy<Node> {
        if depth == 0 || num_features == 0 {
            Just(Node::leaf()).boxed()
        } else {
            prop_oneof![
                3 => Just(Node::leaf()),
                1 => (0..num_features, go(num_features, depth - 1), go(num_features, depth - 1))
                    .prop_map(|(f, l, r)| Node::internal(f, l, r)),
            ]
            .boxed()
        }
    }
    go(num_features, max_depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_arb_dataset_has_consistent_shape(ds in arb_dataset(8, 4)) {
            prop_assert!(ds.n_samples() >= 2);
            prop_assert!(ds.n_features() >= 1 && ds.n_features() <= 4);
        }

        #[test]
        fn test_arb_tree_respects_depth_bound(tree in arb_tree(4, 3)) {
            prop_assert!(tree.depth() <= 3);
        }

        #[test]
        fn test_arb_tree_serialize_parse_roundtrip(tree in arb_tree(4, 3)) {
            let serialized = tree.serialize();
            let parsed = Node::parse(Some(&serialized)).unwrap();
            prop_assert_eq!(parsed, tree);
        }
    }
}
