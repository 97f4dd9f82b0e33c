use blocks_stats_bayesian::{leaf_log_likelihood, log_prob_split, log_prob_stop, Hyperparameters};

use super::dataset::{Dataset, Subset};
use crate::error::{Error, Result};

/// A binary classification tree node (spec.md §3 "Tree node").
///
/// A tree is well-formed iff every [`Node::Internal`] has two children and
/// every [`Node::Leaf`] carries no feature. `Node` enforces this by
/// construction: there is no variant that can hold a feature without both
/// children.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf { counts: Option<(u64, u64)> },
    Internal {
        feature: usize,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn leaf() -> Node {
        Node::Leaf { counts: None }
    }

    pub fn internal(feature: usize, left: Node, right: Node) -> Node {
        Node::Internal {
            feature,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// `0` for a leaf, else `1 + max(depth(left), depth(right))`.
    pub fn depth(&self) -> u32 {
        match self {
            Node::Leaf { .. } => 0,
            Node::Internal { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// `1` for a leaf, else `1 + size(left) + size(right)`.
    pub fn size(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Internal { left, right, .. } => 1 + left.size() + right.size(),
        }
    }

    /// Populate leaf label counts with a single traversal of `(dataset,
    /// subset)`.
    pub fn fit(&mut self, dataset: &Dataset, subset: &Subset) {
        match self {
            Node::Leaf { counts } => {
                *counts = Some(dataset.label_counts(subset));
            }
            Node::Internal {
                feature,
                left,
                right,
            } => {
                let (left_subset, right_subset) = dataset.split(subset, *feature);
                left.fit(dataset, &left_subset);
                right.fit(dataset, &right_subset);
            }
        }
    }

    /// Predict a label per sample in `subset`, using the fitted leaf with
    /// the majority label (ties broken towards label 0, matching
    /// `numpy.argmax` on a `[n0, n1]` count array).
    pub fn predict_one(&self, dataset: &Dataset, subset: &Subset, sample: usize) -> Result<u8> {
        match self {
            Node::Leaf { counts } => {
                let (n0, n1) = counts.ok_or_else(|| {
                    Error::InvalidState("tree must be fitted before prediction".to_string())
                })?;
                Ok(if n1 > n0 { 1 } else { 0 })
            }
            Node::Internal {
                feature,
                left,
                right,
            } => {
                let (left_subset, right_subset) = dataset.split(subset, *feature);
                if left_subset.indices().any(|i| i == sample) {
                    left.predict_one(dataset, &left_subset, sample)
                } else if right_subset.indices().any(|i| i == sample) {
                    right.predict_one(dataset, &right_subset, sample)
                } else {
                    Err(Error::InvalidParameter(format!(
                        "sample {sample} not present in subset"
                    )))
                }
            }
        }
    }

    /// Predict every sample in `subset`, most-significant-leaf-first.
    pub fn predict(&self, dataset: &Dataset, subset: &Subset) -> Result<Vec<(usize, u8)>> {
        match self {
            Node::Leaf { counts } => {
                let (n0, n1) = counts.ok_or_else(|| {
                    Error::InvalidState("tree must be fitted before prediction".to_string())
                })?;
                let label = if n1 > n0 { 1 } else { 0 };
                Ok(subset.indices().map(|i| (i, label)).collect())
            }
            Node::Internal {
                feature,
                left,
                right,
            } => {
                let (left_subset, right_subset) = dataset.split(subset, *feature);
                let mut out = left.predict(dataset, &left_subset)?;
                out.extend(right.predict(dataset, &right_subset)?);
                Ok(out)
            }
        }
    }

    /// `log_prior(T)` under the CGM split prior (spec.md §4.1), `-inf` for
    /// any empty subset.
    pub fn log_prior(&self, dataset: &Dataset, subset: &Subset, h: &Hyperparameters) -> f64 {
        self.log_prior_at_depth(dataset, subset, h, 0)
    }

    fn log_prior_at_depth(
        &self,
        dataset: &Dataset,
        subset: &Subset,
        h: &Hyperparameters,
        depth: u32,
    ) -> f64 {
        if subset.is_empty() {
            return f64::NEG_INFINITY;
        }
        let num_valid = dataset.num_valid_features(subset);
        match self {
            Node::Leaf { .. } => {
                if num_valid > 0 {
                    log_prob_stop(depth, h.alpha, h.beta)
                } else {
                    0.0
                }
            }
            Node::Internal {
                feature,
                left,
                right,
            } => {
                let (left_subset, right_subset) = dataset.split(subset, *feature);
                log_prob_split(depth, h.alpha, h.beta) - (num_valid as f64).ln()
                    + left.log_prior_at_depth(dataset, &left_subset, h, depth + 1)
                    + right.log_prior_at_depth(dataset, &right_subset, h, depth + 1)
            }
        }
    }

    /// Sum of leaf Beta-Binomial marginal log-likelihoods.
    pub fn log_likelihood(&self, dataset: &Dataset, subset: &Subset, h: &Hyperparameters) -> f64 {
        match self {
            Node::Leaf { .. } => {
                let (n0, n1) = dataset.label_counts(subset);
                leaf_log_likelihood(n0, n1, h.rho0, h.rho1)
            }
            Node::Internal {
                feature,
                left,
                right,
            } => {
                let (left_subset, right_subset) = dataset.split(subset, *feature);
                left.log_likelihood(dataset, &left_subset, h)
                    + right.log_likelihood(dataset, &right_subset, h)
            }
        }
    }

    /// `log_prior + log_likelihood` (spec.md §4.1, testable property 1).
    pub fn log_posterior(&self, dataset: &Dataset, subset: &Subset, h: &Hyperparameters) -> f64 {
        self.log_prior(dataset, subset, h) + self.log_likelihood(dataset, subset, h)
    }

    /// Parenthesized recursive serialization (spec.md §6): a leaf is the
    /// empty string, an internal node is `"(" + left + feature + right +
    /// ")"`.
    pub fn serialize(&self) -> String {
        match self {
            Node::Leaf { .. } => String::new(),
            Node::Internal {
                feature,
                left,
                right,
            } => format!("({}{}{})", left.serialize(), feature, right.serialize()),
        }
    }

    /// Parse the format `serialize` produces. `None`, the empty string and
    /// the literal `"nan"` all parse to a single empty leaf.
    pub fn parse(s: Option<&str>) -> Result<Node> {
        let s = match s {
            None => return Ok(Node::leaf()),
            Some(s) if s.is_empty() || s == "nan" => return Ok(Node::leaf()),
            Some(s) => s,
        };
        let bytes = s.as_bytes();
        let (node, consumed) = parse_node(bytes, 0)?;
        if consumed != bytes.len() {
            return Err(Error::MalformedSerialization(format!(
                "trailing characters after position {consumed} in {s:?}"
            )));
        }
        Ok(node)
    }
}

fn parse_node(bytes: &[u8], i: usize) -> Result<(Node, usize)> {
    if i >= bytes.len() || bytes[i] != b'(' {
        return Ok((Node::leaf(), i));
    }
    let (left, i) = parse_node(bytes, i + 1)?;
    let (feature, i) = parse_feature(bytes, i)?;
    let (right, i) = parse_node(bytes, i)?;
    if i >= bytes.len() || bytes[i] != b')' {
        return Err(Error::MalformedSerialization(
            "expected closing ')'".to_string(),
        ));
    }
    Ok((Node::internal(feature, left, right), i + 1))
}

fn parse_feature(bytes: &[u8], i: usize) -> Result<(usize, usize)> {
    let start = i;
    let mut j = i;
    while j < bytes.len() && bytes[j] != b'(' && bytes[j] != b')' {
        j += 1;
    }
    let text = std::str::from_utf8(&bytes[start..j])
        .map_err(|_| Error::MalformedSerialization("non-utf8 feature index".to_string()))?;
    let feature = text
        .parse::<usize>()
        .map_err(|_| Error::MalformedSerialization(format!("invalid feature index {text:?}")))?;
    Ok((feature, j))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn xor_dataset() -> Dataset {
        Dataset::from_rows(&[
            vec![0, 0, 0],
            vec![0, 1, 1],
            vec![1, 0, 1],
            vec![1, 1, 0],
        ])
        .unwrap()
    }

    #[test]
    fn test_leaf_depth_and_size() {
        let n = Node::leaf();
        assert_eq!(n.depth(), 0);
        assert_eq!(n.size(), 1);
    }

    #[test]
    fn test_internal_depth_and_size() {
        let n = Node::internal(0, Node::leaf(), Node::internal(1, Node::leaf(), Node::leaf()));
        assert_eq!(n.depth(), 2);
        assert_eq!(n.size(), 5);
    }

    #[test]
    fn test_serialize_leaf_is_empty() {
        assert_eq!(Node::leaf().serialize(), "");
    }

    #[test]
    fn test_serialize_single_split() {
        let n = Node::internal(0, Node::leaf(), Node::leaf());
        assert_eq!(n.serialize(), "(0)");
    }

    #[test]
    fn test_parse_roundtrip_s1() {
        let original = Node::internal(0, Node::leaf(), Node::leaf());
        let serialized = original.serialize();
        let parsed = Node::parse(Some(&serialized)).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_parse_roundtrip_xor() {
        let original = Node::internal(
            0,
            Node::internal(1, Node::leaf(), Node::leaf()),
            Node::internal(1, Node::leaf(), Node::leaf()),
        );
        let serialized = original.serialize();
        let parsed = Node::parse(Some(&serialized)).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_parse_none_empty_and_nan_agree() {
        assert_eq!(Node::parse(None).unwrap(), Node::leaf());
        assert_eq!(Node::parse(Some("")).unwrap(), Node::leaf());
        assert_eq!(Node::parse(Some("nan")).unwrap(), Node::leaf());
    }

    #[test]
    fn test_parse_malformed_rejected() {
        assert!(Node::parse(Some("(0")).is_err());
        assert!(Node::parse(Some("(0))")).is_err());
    }

    #[test]
    fn test_fit_leaf_counts() {
        let ds = xor_dataset();
        let mut n = Node::leaf();
        n.fit(&ds, &ds.full_mask());
        assert_eq!(n, Node::Leaf { counts: Some((2, 2)) });
    }

    #[test]
    fn test_log_posterior_decomposition_s2_degenerate() {
        // S2: all-zero features, no valid split exists.
        let ds = Dataset::from_rows(&[
            vec![0, 0, 0],
            vec![0, 0, 0],
            vec![0, 0, 1],
            vec![0, 0, 1],
        ])
        .unwrap();
        let h = Hyperparameters::new(0.95, 0.5, 2.5, 2.5).unwrap();
        let mask = ds.full_mask();
        let tree = Node::leaf();
        let prior = tree.log_prior(&ds, &mask, &h);
        assert_relative_eq!(prior, 0.0, epsilon = 1e-12);
        let ll = tree.log_likelihood(&ds, &mask, &h);
        let post = tree.log_posterior(&ds, &mask, &h);
        assert_relative_eq!(post, prior + ll, epsilon = 1e-9);
    }

    #[test]
    fn test_log_posterior_decomposition_split() {
        let ds = xor_dataset();
        let h = Hyperparameters::new(0.95, 0.5, 2.5, 2.5).unwrap();
        let mask = ds.full_mask();
        let tree = Node::internal(0, Node::leaf(), Node::leaf());
        let prior = tree.log_prior(&ds, &mask, &h);
        let ll = tree.log_likelihood(&ds, &mask, &h);
        let post = tree.log_posterior(&ds, &mask, &h);
        assert_relative_eq!(post, prior + ll, epsilon = 1e-9);
        assert!(prior.is_finite());
    }

    #[test]
    fn test_empty_subset_prior_is_neg_infinity() {
        let ds = xor_dataset();
        // A split whose left child is empty (every row has feature 0 == mask).
        let empty = Subset(super::super::bitset::Bitset::zeros(ds.n_samples()));
        let tree = Node::leaf();
        assert_eq!(tree.log_prior(&ds, &empty, &Hyperparameters::new(0.95, 0.5, 2.5, 2.5).unwrap()), f64::NEG_INFINITY);
    }

    proptest::proptest! {
        #[test]
        fn test_serialize_parse_roundtrip_arbitrary_tree(tree in blocks_tests::arb_tree(5, 4)) {
            let parsed = Node::parse(Some(&tree.serialize())).unwrap();
            proptest::prop_assert_eq!(parsed, tree);
        }
    }
}
