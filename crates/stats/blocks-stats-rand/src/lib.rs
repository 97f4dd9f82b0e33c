/*!
Shared randomness utilities for the particle-based BCRT samplers (MCMC,
SMC): log-space weight normalization, effective sample size, and the two
resampling schemes SMC islands choose between.
*/

mod resampling;

pub use resampling::{
    effective_sample_size, logmeanexp, logsumexp, multinomial_resample, normalize_log_weights,
    resample, systematic_resample, ResampleScheme,
};
