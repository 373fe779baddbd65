use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Pseudocount both counters are seeded with at campaign creation. Acts as a
/// smoothing prior so every variant has a proper Beta posterior from the
/// first request onward.
pub const PRIOR_PSEUDOCOUNT: u64 = 1;

/// Most Monte Carlo draws a single stats report may request.
pub const MAX_REPORT_SAMPLE_SIZE: usize = 1_000_000;

/// Most visits a single simulation run may replay.
pub const MAX_SIMULATION_VISITS: u64 = 1_000_000;

/// Impression/conversion tallies for one variant.
///
/// Invariant: `conversions <= impressions` at all times. The store enforces
/// it on every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VariantCounts {
    pub impressions: u64,
    pub conversions: u64,
}

impl VariantCounts {
    /// Counters as seeded at campaign creation.
    pub fn seeded() -> Self {
        Self {
            impressions: PRIOR_PSEUDOCOUNT,
            conversions: PRIOR_PSEUDOCOUNT,
        }
    }

    /// Observed conversion rate. The store never yields zero impressions,
    /// but raw snapshots can; those report 0.0 rather than NaN.
    pub fn conversion_rate(&self) -> f64 {
        if self.impressions == 0 {
            return 0.0;
        }
        self.conversions as f64 / self.impressions as f64
    }

    /// Posterior shape counts, floored at 1 so both stay positive even for
    /// counter states the seed normally rules out.
    pub fn posterior_counts(&self) -> (u64, u64) {
        let alpha = self.conversions.max(1);
        let beta = self.impressions.saturating_sub(self.conversions).max(1);
        (alpha, beta)
    }

    /// `posterior_counts` as floats, for samplers.
    pub fn posterior_shape(&self) -> (f64, f64) {
        let (alpha, beta) = self.posterior_counts();
        (alpha as f64, beta as f64)
    }
}

impl Default for VariantCounts {
    fn default() -> Self {
        Self::seeded()
    }
}

/// An A/B test campaign and its variant counters.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Campaign {
    pub id: Uuid,
    /// Unique name; doubles as the store key.
    pub name: String,
    pub active: bool,
    /// Whether repeat impressions from the same user should count. Stored
    /// for the session tier; allocation does not read it.
    pub allow_repeat_impression_by_same_user: bool,
    pub created_at: DateTime<Utc>,
    /// Variant code to counters, ordered by code. The first code acts as
    /// the control in two-variant reports.
    pub variants: BTreeMap<String, VariantCounts>,
}

impl Campaign {
    /// New campaign with every variant seeded at the prior. Shape validation
    /// happens at the store boundary, not here.
    pub fn new(name: impl Into<String>, variant_codes: &[String]) -> Self {
        let variants = variant_codes
            .iter()
            .map(|code| (code.clone(), VariantCounts::seeded()))
            .collect();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            active: true,
            allow_repeat_impression_by_same_user: true,
            created_at: Utc::now(),
            variants,
        }
    }
}
