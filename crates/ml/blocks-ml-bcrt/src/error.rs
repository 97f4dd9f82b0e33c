use thiserror::Error;

/// Errors from the MAP search engine, MCMC sampler and SMC sampler.
#[derive(Debug, Error)]
pub enum BcrtError {
    #[error("invalid hyperparameters: {0}")]
    InvalidHyperparameter(#[from] blocks_stats_bayesian::BayesError),

    /// MCMC and SMC require a symmetric Beta prior.
    #[error("rho0 and rho1 must be equal for this searcher, got ({0}, {1})")]
    AsymmetricRho(f64, f64),

    /// SMC requires the island count to evenly divide the particle count.
    #[error("number of islands ({islands}) must divide num_particles ({num_particles})")]
    IslandsDoNotDivideParticles { islands: usize, num_particles: usize },

    #[error("dataset error: {0}")]
    Dataset(#[from] blocks_ml_classic::Error),

    /// A memo-table bound regressed or a bound gap went negative: a bug in
    /// the search engine itself, not a recoverable condition. Checked with
    /// `debug_assert!` in debug builds and surfaced here so a release build
    /// aborts the search instead of certifying a wrong tree as optimal.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, BcrtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            BcrtError::AsymmetricRho(1.0, 2.0).to_string(),
            "rho0 and rho1 must be equal for this searcher, got (1, 2)"
        );
        assert_eq!(
            BcrtError::IslandsDoNotDivideParticles {
                islands: 3,
                num_particles: 10
            }
            .to_string(),
            "number of islands (3) must divide num_particles (10)"
        );
    }
}
