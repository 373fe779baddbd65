//! Posterior reporting for campaigns.
//!
//! The Monte Carlo report draws matched posterior samples per variant and
//! compares the control (the first variant code in order) against the
//! treatment. Its head-to-head fields are defined for A/B pairs only and are
//! reported as neutral zeros for any other variant count. The pairwise
//! comparison uses the closed-form results instead and covers every ordered
//! pair, so it works at any arity.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use splitflow_core::types::MAX_REPORT_SAMPLE_SIZE;
use splitflow_core::{SplitflowError, SplitflowResult};
use splitflow_stats::{expected_loss, posterior_draw, probability_greater};
use tracing::debug;
use utoipa::ToSchema;

use crate::store::VariantStore;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CampaignReport {
    pub campaign: String,
    /// Mean of the posterior draws per variant.
    pub posterior_means: BTreeMap<String, f64>,
    /// Fraction of draws where the control landed below the treatment.
    pub probability_control_worse: f64,
    /// Fraction of draws where the control landed above the treatment.
    pub probability_control_better: f64,
    /// Relative gap between treatment and control draw totals.
    pub lift: f64,
    pub variant_impressions: BTreeMap<String, u64>,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PairwiseComparison {
    pub variant: String,
    pub against: String,
    /// Closed-form P(`variant` rate > `against` rate).
    pub probability_better: f64,
    /// Expected regret from deploying `against` instead of `variant`.
    pub expected_loss: f64,
}

/// Draws `sample_size` posterior samples per variant and summarises them.
/// Sizes outside `1..=MAX_REPORT_SAMPLE_SIZE` are rejected before any draw
/// buffer is allocated.
pub fn campaign_report<R: Rng + ?Sized>(
    store: &VariantStore,
    campaign: &str,
    sample_size: usize,
    rng: &mut R,
) -> SplitflowResult<CampaignReport> {
    if sample_size == 0 || sample_size > MAX_REPORT_SAMPLE_SIZE {
        return Err(SplitflowError::InvalidParameter(format!(
            "report sample size must lie in [1, {MAX_REPORT_SAMPLE_SIZE}], got {sample_size}"
        )));
    }

    let snapshot = store.snapshot(campaign)?;

    let mut traces: Vec<(String, Vec<f64>)> = Vec::with_capacity(snapshot.len());
    for (code, counts) in &snapshot {
        let mut draws = Vec::with_capacity(sample_size);
        for _ in 0..sample_size {
            draws.push(posterior_draw(counts, rng)?);
        }
        traces.push((code.clone(), draws));
    }

    let posterior_means: BTreeMap<String, f64> = traces
        .iter()
        .map(|(code, draws)| (code.clone(), mean(draws)))
        .collect();
    let variant_impressions: BTreeMap<String, u64> = snapshot
        .iter()
        .map(|(code, counts)| (code.clone(), counts.impressions))
        .collect();

    let (probability_control_worse, probability_control_better, lift) =
        if let [(_, control), (_, treatment)] = traces.as_slice() {
            let mut below = 0usize;
            let mut above = 0usize;
            for (c, t) in control.iter().zip(treatment.iter()) {
                let delta = c - t;
                if delta < 0.0 {
                    below += 1;
                } else if delta > 0.0 {
                    above += 1;
                }
            }
            let control_sum: f64 = control.iter().sum();
            let treatment_sum: f64 = treatment.iter().sum();
            let lift = if treatment_sum != 0.0 {
                (treatment_sum - control_sum) / treatment_sum
            } else {
                0.0
            };
            (
                below as f64 / sample_size as f64,
                above as f64 / sample_size as f64,
                lift,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

    debug!(campaign, sample_size, "Campaign report generated");

    Ok(CampaignReport {
        campaign: campaign.to_string(),
        posterior_means,
        probability_control_worse,
        probability_control_better,
        lift,
        variant_impressions,
        sample_size,
    })
}

/// Closed-form comparison for every ordered variant pair of a campaign.
pub fn pairwise_comparisons(
    store: &VariantStore,
    campaign: &str,
) -> SplitflowResult<Vec<PairwiseComparison>> {
    let snapshot = store.snapshot(campaign)?;

    let mut rows = Vec::new();
    for (code, counts) in &snapshot {
        let (a, b) = counts.posterior_counts();
        for (other_code, other_counts) in &snapshot {
            if code == other_code {
                continue;
            }
            let (c, d) = other_counts.posterior_counts();
            rows.push(PairwiseComparison {
                variant: code.clone(),
                against: other_code.clone(),
                probability_better: probability_greater(a, b, c, d)?,
                expected_loss: expected_loss(a, b, c, d)?,
            });
        }
    }
    Ok(rows)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
