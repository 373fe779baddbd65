//! Synthetic traffic driver.
//!
//! Each simulated visit allocates against a fresh counter snapshot, records
//! the impression, then converts with the variant's configured Bernoulli
//! rate. Conversions always follow the visit's own impression, so the
//! counter invariant holds throughout. Variants without a configured rate
//! convert at 0.5.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use splitflow_core::types::{MAX_SIMULATION_VISITS, VariantCounts};
use splitflow_core::{SplitflowError, SplitflowResult};
use tracing::info;
use utoipa::ToSchema;

use crate::store::VariantStore;
use crate::strategy::{select_variant, Strategy};

const DEFAULT_CONVERSION_RATE: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SimulationReport {
    pub campaign: String,
    pub strategy: Strategy,
    pub visits: u64,
    /// Visits allocated to each variant.
    pub assigned: BTreeMap<String, u64>,
    /// Simulated conversions per variant.
    pub converted: BTreeMap<String, u64>,
    pub final_counts: BTreeMap<String, VariantCounts>,
}

/// Runs `visits` synthetic visits through the live store. Counts above
/// `MAX_SIMULATION_VISITS` are rejected before any counter moves.
pub fn simulate_visits<R: Rng + ?Sized>(
    store: &VariantStore,
    campaign: &str,
    visits: u64,
    conversion_rates: &BTreeMap<String, f64>,
    strategy: Strategy,
    epsilon: f64,
    rng: &mut R,
) -> SplitflowResult<SimulationReport> {
    if visits > MAX_SIMULATION_VISITS {
        return Err(SplitflowError::InvalidParameter(format!(
            "visits must not exceed {MAX_SIMULATION_VISITS}, got {visits}"
        )));
    }
    for (code, rate) in conversion_rates {
        if !(0.0..=1.0).contains(rate) {
            return Err(SplitflowError::InvalidParameter(format!(
                "conversion rate for variant '{code}' must lie in [0, 1], got {rate}"
            )));
        }
    }

    let initial = store.snapshot(campaign)?;
    let mut assigned: BTreeMap<String, u64> = initial.keys().map(|c| (c.clone(), 0)).collect();
    let mut converted: BTreeMap<String, u64> = initial.keys().map(|c| (c.clone(), 0)).collect();

    for _ in 0..visits {
        let snapshot = store.snapshot(campaign)?;
        let code = select_variant(strategy, &snapshot, epsilon, rng)?;
        store.register_impression(campaign, &code)?;
        *assigned.entry(code.clone()).or_insert(0) += 1;

        let rate = conversion_rates
            .get(&code)
            .copied()
            .unwrap_or(DEFAULT_CONVERSION_RATE);
        if rng.gen_bool(rate) {
            store.register_conversion(campaign, &code)?;
            *converted.entry(code).or_insert(0) += 1;
        }
    }

    let final_counts = store.snapshot(campaign)?;
    info!(
        campaign,
        visits,
        strategy = strategy.as_str(),
        "Simulation finished"
    );

    Ok(SimulationReport {
        campaign: campaign.to_string(),
        strategy,
        visits,
        assigned,
        converted,
        final_counts,
    })
}
