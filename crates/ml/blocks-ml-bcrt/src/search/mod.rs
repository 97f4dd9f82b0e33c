//! Admissible AND/OR branch-and-bound search for the maximum a posteriori
//! tree over a fixed subset of a [`Dataset`].
//!
//! An OR-node is a subproblem (a training-index subset): it chooses between
//! stopping at a leaf or splitting on one of its valid features. Splitting
//! on feature `f` introduces an AND-node with two children, `f = 0` and `f =
//! 1`, each itself an OR-node over a strictly smaller subset. Because
//! splitting on `f` makes `f` constant within both children, no feature is
//! ever offered twice along a root-to-subproblem path — the recursion is
//! bounded by the number of features without any separate bookkeeping.
//!
//! Subproblems are memoized by [`Fingerprint`], so the same index subset
//! reached via different split sequences is solved once.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use blocks_ml_classic::algorithms::trees::dataset::{Dataset, Subset};
use blocks_ml_classic::algorithms::trees::tree::Node;
use blocks_stats_bayesian::{leaf_log_likelihood, log_prob_split, log_prob_stop, Hyperparameters};
use tracing::{debug, trace};

use crate::error::{BcrtError, Result};
use crate::fingerprint::Fingerprint;

const TOLERANCE: f64 = 1e-9;

/// Cooperative termination budget. A negative field means that budget is
/// unbounded; the search then runs until the root subproblem's bound gap
/// closes, which is guaranteed to happen in finitely many expansions.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub num_expansions: i64,
    pub time_limit_secs: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            num_expansions: -1,
            time_limit_secs: -1.0,
        }
    }
}

/// Outcome of a [`search`] run.
#[derive(Debug, Clone)]
pub struct MapResult {
    pub tree: Node,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub expansions: u64,
    pub elapsed: Duration,
    /// `true` if `limits` was exhausted before the root subproblem closed
    /// (`lower_bound < upper_bound`); `false` if the tree is certified
    /// optimal.
    pub exhausted_budget: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    ClosedOptimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BestAction {
    Leaf,
    Split(usize),
}

#[derive(Debug, Clone)]
struct Entry {
    subset: Subset,
    depth: u32,
    lb: f64,
    ub: f64,
    best_action: BestAction,
    status: Status,
    /// `(feature, left fingerprint, right fingerprint)`, populated the
    /// first time this subproblem is expanded.
    options: Vec<(usize, Fingerprint, Fingerprint)>,
    parents: Vec<Fingerprint>,
}

fn leaf_cost(dataset: &Dataset, subset: &Subset, depth: u32, h: &Hyperparameters) -> f64 {
    let (n0, n1) = dataset.label_counts(subset);
    let num_valid = dataset.num_valid_features(subset);
    let stop_cost = if num_valid > 0 {
        -log_prob_stop(depth, h.alpha, h.beta)
    } else {
        0.0
    };
    stop_cost - leaf_log_likelihood(n0, n1, h.rho0, h.rho1)
}

/// A cheap, optimistic lower bound on the cost of any tree rooted at
/// `subset`: the cost it would have if its labels happened to already be
/// pure. Strictly below [`leaf_cost`] whenever `subset` is mixed, which is
/// what keeps a freshly discovered subproblem's bound gap open until the
/// engine actually expands it.
fn optimistic_floor(dataset: &Dataset, subset: &Subset, depth: u32, h: &Hyperparameters) -> f64 {
    let size = subset.size() as u64;
    let num_valid = dataset.num_valid_features(subset);
    let stop_cost = if num_valid > 0 {
        -log_prob_stop(depth, h.alpha, h.beta)
    } else {
        0.0
    };
    let best_ll = leaf_log_likelihood(size, 0, h.rho0, h.rho1)
        .max(leaf_log_likelihood(0, size, h.rho0, h.rho1));
    stop_cost - best_ll
}

fn split_cost(depth: u32, num_valid: usize, h: &Hyperparameters) -> f64 {
    -log_prob_split(depth, h.alpha, h.beta) + (num_valid as f64).ln()
}

struct Engine<'a> {
    dataset: &'a Dataset,
    hyper: Hyperparameters,
    memo: HashMap<Fingerprint, Entry>,
    open: Vec<Fingerprint>,
}

impl<'a> Engine<'a> {
    fn new(dataset: &'a Dataset, hyper: Hyperparameters) -> Self {
        Engine {
            dataset,
            hyper,
            memo: HashMap::new(),
            open: Vec::new(),
        }
    }

    fn get_or_create(
        &mut self,
        subset: Subset,
        depth: u32,
        parent: Option<Fingerprint>,
    ) -> Result<Fingerprint> {
        let fp = Fingerprint::of(&subset);
        if let Some(entry) = self.memo.get_mut(&fp) {
            if let Some(parent) = parent {
                if !entry.parents.contains(&parent) {
                    entry.parents.push(parent);
                }
            }
            return Ok(fp);
        }

        let ub = leaf_cost(self.dataset, &subset, depth, &self.hyper);
        let num_valid = self.dataset.num_valid_features(&subset);
        let lb = if num_valid == 0 {
            // No feature can split this subset: it is a forced leaf, and
            // its cost is already exact.
            ub
        } else {
            optimistic_floor(self.dataset, &subset, depth, &self.hyper).min(ub)
        };
        debug_assert!(
            lb <= ub + TOLERANCE,
            "lower bound {lb} exceeds upper bound {ub} for a freshly created subproblem"
        );
        if lb > ub + TOLERANCE {
            return Err(BcrtError::InvariantViolation(format!(
                "lower bound {lb} exceeds upper bound {ub} for a freshly created subproblem"
            )));
        }
        let status = if num_valid == 0 || ub - lb <= TOLERANCE {
            Status::ClosedOptimal
        } else {
            Status::Open
        };

        let entry = Entry {
            subset,
            depth,
            lb,
            ub,
            best_action: BestAction::Leaf,
            status,
            options: Vec::new(),
            parents: parent.into_iter().collect(),
        };
        self.memo.insert(fp.clone(), entry);
        if status == Status::Open {
            self.open.push(fp.clone());
        }
        Ok(fp)
    }

    /// The open subproblem with the largest `ub - lb` gap, ties broken by
    /// the smaller fingerprint for bit-reproducible output.
    fn select_next(&self) -> Option<Fingerprint> {
        let mut best: Option<(&Fingerprint, f64)> = None;
        for fp in &self.open {
            let entry = match self.memo.get(fp) {
                Some(e) if e.status == Status::Open => e,
                _ => continue,
            };
            let gap = entry.ub - entry.lb;
            best = match best {
                None => Some((fp, gap)),
                Some((best_fp, best_gap)) => {
                    if gap > best_gap + TOLERANCE
                        || ((gap - best_gap).abs() <= TOLERANCE && fp < best_fp)
                    {
                        Some((fp, gap))
                    } else {
                        Some((best_fp, best_gap))
                    }
                }
            };
        }
        best.map(|(fp, _)| fp.clone())
    }

    fn expand(&mut self, fp: Fingerprint) -> Result<()> {
        let (subset, depth) = {
            let entry = self.memo.get(&fp).expect("frontier entry must be memoized");
            (entry.subset.clone(), entry.depth)
        };
        let valid: Vec<usize> = self.dataset.valid_features(&subset).collect();

        let mut options = Vec::with_capacity(valid.len());
        for f in valid {
            let (left, right) = self.dataset.split(&subset, f);
            let left_fp = self.get_or_create(left, depth + 1, Some(fp.clone()))?;
            let right_fp = self.get_or_create(right, depth + 1, Some(fp.clone()))?;
            options.push((f, left_fp, right_fp));
        }

        if let Some(entry) = self.memo.get_mut(&fp) {
            entry.options = options;
        }
        self.recompute(&fp)
    }

    /// Recompute a subproblem's bounds from its cached split options and
    /// their children's current bounds, then propagate any tightening to
    /// every parent that reaches it.
    ///
    /// `lb` must never fall and `ub` must never rise across a recompute, and
    /// the gap must never go negative; a violation here means the memo
    /// table itself is corrupt, not a bad input, so in debug builds it
    /// panics and in release it is surfaced as
    /// [`BcrtError::InvariantViolation`] instead of silently certifying a
    /// wrong tree as optimal.
    fn recompute(&mut self, fp: &Fingerprint) -> Result<()> {
        let (subset, depth, options, old_lb, old_ub, parents) = {
            let entry = self.memo.get(fp).expect("recompute on unknown fingerprint");
            (
                entry.subset.clone(),
                entry.depth,
                entry.options.clone(),
                entry.lb,
                entry.ub,
                entry.parents.clone(),
            )
        };

        let leaf = leaf_cost(self.dataset, &subset, depth, &self.hyper);
        let mut best_lb = leaf;
        let mut best_ub = leaf;
        let mut best_action = BestAction::Leaf;
        let num_valid = options.len();

        for (f, left_fp, right_fp) in &options {
            let cost = split_cost(depth, num_valid, &self.hyper);
            let (left_lb, left_ub) = self.bounds_of(left_fp);
            let (right_lb, right_ub) = self.bounds_of(right_fp);
            let split_lb = cost + left_lb + right_lb;
            let split_ub = cost + left_ub + right_ub;
            if split_lb < best_lb {
                best_lb = split_lb;
            }
            if split_ub < best_ub {
                best_ub = split_ub;
                best_action = BestAction::Split(*f);
            }
        }

        // Bounds only ever tighten: lb rises, ub falls.
        let new_lb = best_lb.max(old_lb);
        let new_ub = best_ub.min(old_ub);
        let closed = new_ub - new_lb <= TOLERANCE;
        let changed = (new_lb - old_lb).abs() > TOLERANCE || (new_ub - old_ub).abs() > TOLERANCE;

        debug_assert!(
            new_lb <= new_ub + TOLERANCE,
            "bound gap went negative at {fp:?}: lb={new_lb} ub={new_ub}"
        );
        debug_assert!(
            new_lb >= old_lb - TOLERANCE,
            "lower bound regressed at {fp:?}: {old_lb} -> {new_lb}"
        );
        debug_assert!(
            new_ub <= old_ub + TOLERANCE,
            "upper bound regressed at {fp:?}: {old_ub} -> {new_ub}"
        );
        if new_lb > new_ub + TOLERANCE || new_lb < old_lb - TOLERANCE || new_ub > old_ub + TOLERANCE {
            return Err(BcrtError::InvariantViolation(format!(
                "bound inconsistency at {fp:?}: old=({old_lb}, {old_ub}) new=({new_lb}, {new_ub})"
            )));
        }

        let entry = self.memo.get_mut(fp).expect("recompute on unknown fingerprint");
        entry.lb = new_lb;
        entry.ub = new_ub;
        if !options.is_empty() {
            entry.best_action = best_action;
        }
        if closed {
            entry.status = Status::ClosedOptimal;
        }

        if closed || changed {
            for parent in parents {
                self.recompute(&parent)?;
            }
        }
        Ok(())
    }

    fn bounds_of(&self, fp: &Fingerprint) -> (f64, f64) {
        let entry = self.memo.get(fp).expect("child must be memoized");
        (entry.lb, entry.ub)
    }

    fn reconstruct(&self, fp: &Fingerprint) -> Node {
        let entry = self.memo.get(fp).expect("reconstruct on unknown fingerprint");
        match entry.best_action {
            BestAction::Leaf => Node::leaf(),
            BestAction::Split(f) => {
                let (_, left_fp, right_fp) = entry
                    .options
                    .iter()
                    .find(|(feature, _, _)| *feature == f)
                    .expect("best_action feature must be among cached options");
                Node::internal(f, self.reconstruct(left_fp), self.reconstruct(right_fp))
            }
        }
    }
}

/// Find the maximum a posteriori tree over `subset` by admissible AND/OR
/// branch-and-bound search.
///
/// At each step the engine expands the open subproblem with the largest
/// `ub - lb` gap (ties broken by the smaller subproblem fingerprint, for
/// bit-reproducible output across runs). The search stops either when the
/// root subproblem's bounds meet — a certified-optimal tree — or when
/// `limits` is exhausted, whichever comes first.
pub fn search(
    dataset: &Dataset,
    subset: &Subset,
    hyper: &Hyperparameters,
    limits: Limits,
) -> Result<MapResult> {
    let mut engine = Engine::new(dataset, *hyper);
    let root_fp = engine.get_or_create(subset.clone(), 0, None)?;
    let start = Instant::now();
    let mut expansions: u64 = 0;
    let mut exhausted_budget = false;

    loop {
        let root_closed = engine
            .memo
            .get(&root_fp)
            .map(|e| e.status == Status::ClosedOptimal)
            .unwrap_or(false);
        if root_closed {
            break;
        }
        if limits.num_expansions >= 0 && expansions >= limits.num_expansions as u64 {
            exhausted_budget = true;
            break;
        }
        if limits.time_limit_secs >= 0.0 && start.elapsed().as_secs_f64() >= limits.time_limit_secs {
            exhausted_budget = true;
            break;
        }
        let next = match engine.select_next() {
            Some(fp) => fp,
            None => break,
        };
        trace!(expansions, "expanding subproblem");
        engine.expand(next)?;
        expansions += 1;
    }

    let root = engine.memo.get(&root_fp).expect("root must be memoized");
    let (lower_bound, upper_bound) = (root.lb, root.ub);
    let mut tree = engine.reconstruct(&root_fp);
    tree.fit(dataset, subset);

    debug!(expansions, lower_bound, upper_bound, "MAP search finished");

    Ok(MapResult {
        tree,
        lower_bound,
        upper_bound,
        expansions,
        elapsed: start.elapsed(),
        exhausted_budget,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hyper() -> Hyperparameters {
        Hyperparameters::new(0.95, 0.5, 2.5, 2.5).unwrap()
    }

    #[test]
    fn test_s1_single_feature_perfect_separation() {
        let ds = Dataset::from_rows(&[vec![0, 0], vec![0, 0], vec![1, 1], vec![1, 1]]).unwrap();
        let result = search(&ds, &ds.full_mask(), &hyper(), Limits::default()).unwrap();
        assert_eq!(result.tree.serialize(), "(0)");
        assert_relative_eq!(result.lower_bound, result.upper_bound, epsilon = 1e-6);
        assert!(!result.exhausted_budget);
    }

    #[test]
    fn test_s2_degenerate_subset_forces_leaf() {
        let ds = Dataset::from_rows(&[
            vec![0, 0, 0],
            vec![0, 0, 0],
            vec![0, 0, 1],
            vec![0, 0, 1],
        ])
        .unwrap();
        let result = search(&ds, &ds.full_mask(), &hyper(), Limits::default()).unwrap();
        assert!(result.tree.is_leaf());
        assert_relative_eq!(result.lower_bound, result.upper_bound, epsilon = 1e-9);
    }

    #[test]
    fn test_xor_requires_depth_two() {
        let ds = Dataset::from_rows(&[
            vec![0, 0, 0],
            vec![0, 1, 1],
            vec![1, 0, 1],
            vec![1, 1, 0],
        ])
        .unwrap();
        let result = search(&ds, &ds.full_mask(), &hyper(), Limits::default()).unwrap();
        assert_relative_eq!(result.lower_bound, result.upper_bound, epsilon = 1e-6);
        // Both leaves of the best first split must themselves split again
        // to separate the XOR labels.
        assert_eq!(result.tree.depth(), 2);
    }

    #[test]
    fn test_expansion_budget_leaves_gap_open() {
        let ds = Dataset::from_rows(&[
            vec![0, 0, 0],
            vec![0, 1, 1],
            vec![1, 0, 1],
            vec![1, 1, 0],
        ])
        .unwrap();
        let limits = Limits {
            num_expansions: 0,
            time_limit_secs: -1.0,
        };
        let result = search(&ds, &ds.full_mask(), &hyper(), limits).unwrap();
        assert!(result.exhausted_budget);
        assert!(result.lower_bound < result.upper_bound - 1e-12);
    }

    #[test]
    fn test_bounds_never_cross() {
        let ds = Dataset::from_rows(&[
            vec![0, 0, 0],
            vec![0, 1, 1],
            vec![1, 0, 1],
            vec![1, 1, 0],
        ])
        .unwrap();
        for budget in 0..6 {
            let limits = Limits {
                num_expansions: budget,
                time_limit_secs: -1.0,
            };
            let result = search(&ds, &ds.full_mask(), &hyper(), limits).unwrap();
            assert!(result.lower_bound <= result.upper_bound + 1e-9);
        }
    }

    #[test]
    fn test_search_is_deterministic_across_runs() {
        let ds = Dataset::from_rows(&[
            vec![0, 0, 0],
            vec![0, 1, 1],
            vec![1, 0, 1],
            vec![1, 1, 0],
        ])
        .unwrap();
        let a = search(&ds, &ds.full_mask(), &hyper(), Limits::default()).unwrap();
        let b = search(&ds, &ds.full_mask(), &hyper(), Limits::default()).unwrap();
        assert_eq!(a.tree.serialize(), b.tree.serialize());
    }

    proptest::proptest! {
        #[test]
        fn test_bounds_never_cross_on_arbitrary_datasets(
            ds in blocks_tests::arb_dataset(7, 3),
            budget in 0..8i64,
        ) {
            let limits = Limits { num_expansions: budget, time_limit_secs: -1.0 };
            let result = search(&ds, &ds.full_mask(), &hyper(), limits).unwrap();
            proptest::prop_assert!(result.lower_bound <= result.upper_bound + 1e-9);
        }
    }
}
