/*!
Bayesian CART over binary-featured, binary-labeled data.

This crate builds three searchers on top of [`blocks_ml_classic`]'s
[`Dataset`](blocks_ml_classic::algorithms::trees::dataset::Dataset) and
[`Node`](blocks_ml_classic::algorithms::trees::tree::Node) types, scored with
[`blocks_stats_bayesian`]'s Beta-Binomial marginal likelihood and CGM split
prior:

- [`search`]: an admissible AND/OR branch-and-bound search for the maximum a
  posteriori tree.
- [`mcmc`]: a Chipman-style Metropolis-Hastings sampler over the tree
  posterior (GROW/PRUNE/CHANGE/SWAP moves).
- [`smc`]: a sequential Monte Carlo particle sampler with island resampling,
  also producing a marginal likelihood estimate.

All three take deterministic seeds so runs are bit-reproducible.
*/

pub mod error;
mod fingerprint;
pub mod mcmc;
mod paths;
pub mod search;
pub mod smc;

pub use error::{BcrtError, Result};
pub use fingerprint::Fingerprint;
