use rand::Rng;

/// Numerically stable `ln(sum(exp(values)))`.
///
/// ```
/// # use blocks_stats_rand::logsumexp;
/// let lse = logsumexp(&[0.0, 0.0]);
/// assert!((lse - 2f64.ln()).abs() < 1e-9);
/// ```
pub fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// `logsumexp(values) - ln(len(values))`: the log-mean of exponentiated
/// values, used to average per-island log marginal likelihood estimates.
pub fn logmeanexp(values: &[f64]) -> f64 {
    logsumexp(values) - (values.len() as f64).ln()
}

/// Normalize log-weights into a probability simplex via the softmax
/// identity `w_i = exp(log_w_i - logsumexp(log_w))`.
pub fn normalize_log_weights(log_weights: &[f64]) -> Vec<f64> {
    let lse = logsumexp(log_weights);
    log_weights.iter().map(|w| (w - lse).exp()).collect()
}

/// Effective sample size `1 / sum(w_i^2)` for already-normalized weights.
pub fn effective_sample_size(normalized_weights: &[f64]) -> f64 {
    let sum_sq: f64 = normalized_weights.iter().map(|w| w * w).sum();
    if sum_sq == 0.0 {
        0.0
    } else {
        1.0 / sum_sq
    }
}

/// The two resampling schemes spec.md §4.5 allows an SMC island to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleScheme {
    Multinomial,
    Systematic,
}

/// Draw `n` indices into `weights` (assumed normalized) i.i.d. from the
/// categorical distribution they define.
pub fn multinomial_resample<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
    let cumulative = cumulative_sum(weights);
    (0..n)
        .map(|_| {
            let u: f64 = rng.gen_range(0.0..1.0);
            cumulative_index(&cumulative, u)
        })
        .collect()
}

/// Low-variance systematic resampling: a single uniform draw determines `n`
/// evenly spaced sample points along the cumulative distribution.
pub fn systematic_resample<R: Rng + ?Sized>(weights: &[f64], n: usize, rng: &mut R) -> Vec<usize> {
    let cumulative = cumulative_sum(weights);
    let u0: f64 = rng.gen_range(0.0..1.0) / n as f64;
    (0..n)
        .map(|i| {
            let u = u0 + i as f64 / n as f64;
            cumulative_index(&cumulative, u)
        })
        .collect()
}

fn cumulative_sum(weights: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    weights
        .iter()
        .map(|w| {
            acc += w;
            acc
        })
        .collect()
}

fn cumulative_index(cumulative: &[f64], u: f64) -> usize {
    match cumulative
        .iter()
        .position(|&c| u < c)
    {
        Some(idx) => idx,
        None => cumulative.len() - 1,
    }
}

/// Resample `n` indices using the given scheme.
pub fn resample(
    scheme: ResampleScheme,
    weights: &[f64],
    n: usize,
    rng: &mut impl Rng,
) -> Vec<usize> {
    match scheme {
        ResampleScheme::Multinomial => multinomial_resample(weights, n, rng),
        ResampleScheme::Systematic => systematic_resample(weights, n, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_logsumexp_uniform() {
        let v = vec![1.0_f64.ln(); 4];
        assert_relative_eq!(logsumexp(&v), 4f64.ln(), epsilon = 1e-9);
    }

    #[test]
    fn test_logsumexp_empty() {
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_normalize_log_weights_sums_to_one() {
        let w = normalize_log_weights(&[0.0, 1.0, 2.0]);
        let sum: f64 = w.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ess_uniform_weights_equals_n() {
        let w = vec![0.25; 4];
        assert_relative_eq!(effective_sample_size(&w), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ess_degenerate_weights_equals_one() {
        let w = vec![1.0, 0.0, 0.0, 0.0];
        assert_relative_eq!(effective_sample_size(&w), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_systematic_resample_deterministic_for_seed() {
        let w = normalize_log_weights(&[0.0, 0.0, 0.0, 0.0]);
        let mut rng1 = ChaCha8Rng::seed_from_u64(7);
        let mut rng2 = ChaCha8Rng::seed_from_u64(7);
        let a = systematic_resample(&w, 10, &mut rng1);
        let b = systematic_resample(&w, 10, &mut rng2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_multinomial_resample_favors_heavy_weight() {
        let w = vec![0.98, 0.01, 0.01];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let draws = multinomial_resample(&w, 200, &mut rng);
        let count0 = draws.iter().filter(|&&i| i == 0).count();
        assert!(count0 > 150);
    }
}
