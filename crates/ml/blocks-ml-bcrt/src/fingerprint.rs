use blocks_ml_classic::algorithms::trees::dataset::Subset;

/// Canonical identifier of an AND/OR graph subproblem: the set of training
/// indices reaching it, represented as its subset's backing words.
///
/// Two subproblems with identical index sets are interchangeable for the
/// search engine's memo table: the word vector is the subset mask itself, so
/// equal fingerprints imply equal subsets and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Vec<u64>);

impl Fingerprint {
    pub fn of(subset: &Subset) -> Fingerprint {
        Fingerprint(subset.words().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks_ml_classic::algorithms::trees::dataset::Dataset;

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
    fn test_same_subset_same_fingerprint() {
        let ds = xor_dataset();
        let (left_a, _) = ds.split(&ds.full_mask(), 0);
        let (left_b, _) = ds.split(&ds.full_mask(), 0);
        assert_eq!(Fingerprint::of(&left_a), Fingerprint::of(&left_b));
    }

    #[test]
    fn test_different_subsets_different_fingerprints() {
        let ds = xor_dataset();
        let (left, right) = ds.split(&ds.full_mask(), 0);
        assert_ne!(Fingerprint::of(&left), Fingerprint::of(&right));
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let ds = xor_dataset();
        let (left, right) = ds.split(&ds.full_mask(), 0);
        let mut fps = vec![Fingerprint::of(&right), Fingerprint::of(&left)];
        fps.sort();
        let mut again = vec![Fingerprint::of(&right), Fingerprint::of(&left)];
        again.sort();
        assert_eq!(fps, again);
    }
}
