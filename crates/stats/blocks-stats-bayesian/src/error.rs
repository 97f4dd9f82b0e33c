use thiserror::Error;

/// Errors that can occur when constructing or validating Bayesian CART
/// hyperparameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BayesError {
    /// `alpha` (split-prior scale) must lie in (0, 1].
    #[error("alpha must be in (0, 1], got {0}")]
    InvalidAlpha(f64),

    /// `beta` (split-prior depth penalty) must be non-negative.
    #[error("beta must be >= 0, got {0}")]
    InvalidBeta(f64),

    /// The Beta prior shape parameters `rho0`/`rho1` must both be positive.
    #[error("rho must be strictly positive, got ({0}, {1})")]
    InvalidRho(f64, f64),
}

/// A specialized `Result` type for Bayesian scoring operations.
pub type Result<T> = std::result::Result<T, BayesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            BayesError::InvalidAlpha(0.0).to_string(),
            "alpha must be in (0, 1], got 0"
        );
        assert_eq!(
            BayesError::InvalidBeta(-1.0).to_string(),
            "beta must be >= 0, got -1"
        );
        assert_eq!(
            BayesError::InvalidRho(0.0, 2.5).to_string(),
            "rho must be strictly positive, got (0, 2.5)"
        );
    }
}
