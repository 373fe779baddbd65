//! Beta posterior sampling.

use rand::Rng;
use rand_distr::{Beta, Distribution};
use splitflow_core::types::VariantCounts;
use splitflow_core::{SplitflowError, SplitflowResult};

/// One draw from Beta(alpha, beta). Shape parameters must be strictly
/// positive and finite. The returned value lies strictly inside (0, 1);
/// extreme shapes can underflow to the bounds, so the draw is clamped back
/// into the open interval.
pub fn sample_beta<R: Rng + ?Sized>(alpha: f64, beta: f64, rng: &mut R) -> SplitflowResult<f64> {
    if !alpha.is_finite() || !beta.is_finite() || alpha <= 0.0 || beta <= 0.0 {
        return Err(SplitflowError::InvalidParameter(format!(
            "beta shape parameters must be positive and finite, got alpha={alpha}, beta={beta}"
        )));
    }
    let dist = Beta::new(alpha, beta)
        .map_err(|e| SplitflowError::InvalidParameter(format!("beta({alpha}, {beta}): {e}")))?;
    let sample: f64 = dist.sample(rng);
    Ok(sample.clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON))
}

/// Posterior draw for one variant: Beta(max(conversions, 1),
/// max(impressions - conversions, 1)).
pub fn posterior_draw<R: Rng + ?Sized>(
    counts: &VariantCounts,
    rng: &mut R,
) -> SplitflowResult<f64> {
    let (alpha, beta) = counts.posterior_shape();
    sample_beta(alpha, beta, rng)
}
