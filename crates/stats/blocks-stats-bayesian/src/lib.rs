/*!
Scoring kernel for the Bayesian CART (BCRT) prior: a CGM-style split prior
combined with a per-leaf Beta-Binomial marginal likelihood.

# Available functions
- [`log_gamma`]: numerically stable natural log of the Gamma function.
- [`log_beta_fn`]: natural log of the Beta function, `B(a, b)`.
- [`leaf_log_likelihood`]: integrated leaf likelihood under a Beta prior.
- [`log_prob_split`] / [`log_prob_stop`]: CGM split-prior log-probabilities.

[`Hyperparameters`] bundles and validates the four scalars (`alpha`, `beta`,
`rho0`, `rho1`) these formulas share.
*/

mod error;
mod hyperparameters;
mod scoring;

pub use error::{BayesError, Result};
pub use hyperparameters::Hyperparameters;
pub use scoring::{leaf_log_likelihood, log_beta_fn, log_gamma, log_prob_split, log_prob_stop};
