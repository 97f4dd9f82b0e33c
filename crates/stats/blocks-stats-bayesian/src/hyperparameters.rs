use crate::error::{BayesError, Result};

/// Hyperparameters of the CGM-style BCRT prior.
///
/// `alpha` and `beta` control the split prior `p_split(d) = alpha * (1 +
/// d)^(-beta)`; `rho0`/`rho1` are the shape parameters of the symmetric Beta
/// prior over a leaf's label probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperparameters {
    pub alpha: f64,
    pub beta: f64,
    pub rho0: f64,
    pub rho1: f64,
}

impl Hyperparameters {
    /// Construct hyperparameters, validating the constraints in spec.md §4.1:
    /// `alpha` in (0, 1], `beta` >= 0, `rho0`/`rho1` > 0.
    pub fn new(alpha: f64, beta: f64, rho0: f64, rho1: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(BayesError::InvalidAlpha(alpha));
        }
        if !(beta >= 0.0) {
            return Err(BayesError::InvalidBeta(beta));
        }
        if !(rho0 > 0.0 && rho1 > 0.0) {
            return Err(BayesError::InvalidRho(rho0, rho1));
        }
        Ok(Self {
            alpha,
            beta,
            rho0,
            rho1,
        })
    }

    /// Whether `rho0 == rho1`, required by the MCMC and SMC entry points.
    pub fn symmetric_rho(&self) -> bool {
        (self.rho0 - self.rho1).abs() < 1e-12
    }
}
