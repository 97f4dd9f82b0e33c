use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use super::bitset::Bitset;
use crate::error::{Error, Result};

/// A training set of `n` samples with `d` binary features and a binary
/// label, stored column-major as one [`Bitset`] per feature plus one for
/// labels (spec.md §3 "Dataset").
///
/// Datasets are immutable after construction; every searcher in this
/// workspace takes `&Dataset` plus a [`Subset`] mask rather than copying
/// rows.
#[derive(Debug, Clone)]
pub struct Dataset {
    n: usize,
    d: usize,
    features: Vec<Bitset>,
    labels: Bitset,
}

/// A subset of a [`Dataset`]'s rows, represented as an `n`-bit mask.
///
/// Subset masks compose by bitwise AND; splitting a subset on a feature
/// never copies the parent dataset's feature columns, only allocates a new
/// `O(n/64)`-word mask (spec.md §4.2: "views ... share storage with the
/// parent").
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Subset(pub(crate) Bitset);

impl Subset {
    pub fn size(&self) -> usize {
        self.0.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The sample indices this subset contains, ascending.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter_ones()
    }

    /// Raw backing words, exposed so downstream crates (the MAP search
    /// engine's subproblem fingerprint) can derive a canonical hash without
    /// depending on this crate's private bitset representation.
    pub fn words(&self) -> &[u64] {
        self.0.words()
    }
}

impl Dataset {
    /// Build a dataset from rectangular rows of 0/1 entries, the last
    /// column of each row being the label (spec.md §6 dataset file format,
    /// minus the whitespace-delimited text framing handled by
    /// [`Dataset::from_reader`]).
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Dataset> {
        if rows.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let width = rows[0].len();
        if width < 2 {
            return Err(Error::InvalidParameter(
                "each row must have at least one feature plus a label".to_string(),
            ));
        }
        let d = width - 1;
        let n = rows.len();

        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(Error::ShapeMismatch {
                    row: row_idx,
                    expected: width,
                    got: row.len(),
                });
            }
            for (col, &value) in row.iter().enumerate() {
                if value > 1 {
                    return Err(Error::NonBinaryEntry {
                        row: row_idx,
                        col,
                        value,
                    });
                }
            }
        }

        let mut features = vec![Bitset::zeros(n); d];
        let mut labels = Bitset::zeros(n);
        for (row_idx, row) in rows.iter().enumerate() {
            for f in 0..d {
                if row[f] == 1 {
                    features[f].set(row_idx);
                }
            }
            if row[d] == 1 {
                labels.set(row_idx);
            }
        }

        Ok(Dataset {
            n,
            d,
            features,
            labels,
        })
    }

    /// Parse the whitespace-separated-integers text format of spec.md §6:
    /// one row per sample, `d + 1` fields per row, the last being the
    /// label.
    pub fn from_reader<R: Read>(reader: R) -> Result<Dataset> {
        let reader = BufReader::new(reader);
        let mut rows = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| Error::Other(Box::new(e)))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut row = Vec::new();
            for field in line.split_whitespace() {
                let value: u8 = field.parse().map_err(|_| {
                    Error::InvalidParameter(format!(
                        "line {line_no}: field {field:?} is not an integer"
                    ))
                })?;
                row.push(value);
            }
            rows.push(row);
        }
        Dataset::from_rows(&rows)
    }

    /// Thin wrapper opening a file and delegating to [`Dataset::from_reader`].
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        let file = std::fs::File::open(path).map_err(|e| Error::Other(Box::new(e)))?;
        Dataset::from_reader(file)
    }

    pub fn n_samples(&self) -> usize {
        self.n
    }

    pub fn n_features(&self) -> usize {
        self.d
    }

    /// A subset covering every sample.
    pub fn full_mask(&self) -> Subset {
        Subset(Bitset::ones(self.n))
    }

    pub fn subset_size(&self, mask: &Subset) -> usize {
        mask.size()
    }

    /// Number of samples in `mask` with feature `f` equal to 1.
    pub fn count_with_feature(&self, mask: &Subset, f: usize) -> usize {
        mask.0.and(&self.features[f]).count_ones()
    }

    /// Split `mask` into `(left, right)` where left is `f = 0` and right is
    /// `f = 1`.
    pub fn split(&self, mask: &Subset, f: usize) -> (Subset, Subset) {
        let right = mask.0.and(&self.features[f]);
        let left = mask.0.and_not(&self.features[f]);
        (Subset(left), Subset(right))
    }

    /// The true label of a single sample index.
    pub fn label_of(&self, sample: usize) -> u8 {
        self.labels.get(sample) as u8
    }

    /// `(n0, n1)` label counts within `mask`.
    pub fn label_counts(&self, mask: &Subset) -> (u64, u64) {
        let n1 = mask.0.and(&self.labels).count_ones() as u64;
        let n0 = mask.size() as u64 - n1;
        (n0, n1)
    }

    /// Features `f` for which `0 < count_with_feature(mask, f) <
    /// subset_size(mask)` — i.e. splitting on `f` would actually partition
    /// `mask` into two non-empty halves.
    pub fn valid_features<'a>(&'a self, mask: &'a Subset) -> impl Iterator<Item = usize> + 'a {
        let size = mask.size();
        (0..self.d).filter(move |&f| {
            let c = self.count_with_feature(mask, f);
            c > 0 && c < size
        })
    }

    pub fn num_valid_features(&self, mask: &Subset) -> usize {
        self.valid_features(mask).count()
    }
}
