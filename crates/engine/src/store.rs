//! In-memory variant store backed by DashMap.
//!
//! One entry per campaign; the entry lock is the per-campaign critical
//! section, so counter updates and the conversion capacity check cannot
//! interleave. Reads hand out detached copies.

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;
use splitflow_core::types::{Campaign, VariantCounts};
use splitflow_core::{SplitflowError, SplitflowResult};
use tracing::info;

/// Thread-safe store for campaigns and their variant counters.
pub struct VariantStore {
    campaigns: DashMap<String, Campaign>,
}

impl VariantStore {
    pub fn new() -> Self {
        info!("Variant store initialized (in-memory)");
        Self {
            campaigns: DashMap::new(),
        }
    }

    /// Create or replace a campaign. Recreating an existing name resets its
    /// counters to the seed. Returns the variant map as stored.
    pub fn create_campaign(
        &self,
        name: &str,
        variant_codes: &[String],
    ) -> SplitflowResult<BTreeMap<String, VariantCounts>> {
        validate_definition(name, variant_codes)?;
        let campaign = Campaign::new(name, variant_codes);
        let variants = campaign.variants.clone();
        let replaced = self.campaigns.insert(name.to_string(), campaign).is_some();
        info!(
            campaign = %name,
            variants = variant_codes.len(),
            replaced,
            "Campaign created"
        );
        Ok(variants)
    }

    /// Record one impression. Returns the new impression count.
    pub fn register_impression(&self, campaign: &str, variant: &str) -> SplitflowResult<u64> {
        let mut entry = self
            .campaigns
            .get_mut(campaign)
            .ok_or_else(|| campaign_not_found(campaign))?;
        let counts = entry
            .variants
            .get_mut(variant)
            .ok_or_else(|| variant_not_found(campaign, variant))?;
        counts.impressions += 1;
        Ok(counts.impressions)
    }

    /// Record one conversion. Returns the new conversion count, or rejects
    /// the update untouched when it would exceed the impression count.
    pub fn register_conversion(&self, campaign: &str, variant: &str) -> SplitflowResult<u64> {
        let mut entry = self
            .campaigns
            .get_mut(campaign)
            .ok_or_else(|| campaign_not_found(campaign))?;
        let counts = entry
            .variants
            .get_mut(variant)
            .ok_or_else(|| variant_not_found(campaign, variant))?;
        if counts.conversions >= counts.impressions {
            return Err(SplitflowError::InvariantViolation(format!(
                "cannot have more conversions than impressions for variant '{variant}' of campaign '{campaign}'"
            )));
        }
        counts.conversions += 1;
        Ok(counts.conversions)
    }

    /// Detached copy of all variant counters, keyed by code. Each counter
    /// pair is read atomically; the copy may trail concurrent writers by a
    /// few events.
    pub fn snapshot(&self, campaign: &str) -> SplitflowResult<BTreeMap<String, VariantCounts>> {
        let entry = self
            .campaigns
            .get(campaign)
            .ok_or_else(|| campaign_not_found(campaign))?;
        Ok(entry.variants.clone())
    }

    pub fn get(&self, campaign: &str) -> SplitflowResult<Campaign> {
        self.campaigns
            .get(campaign)
            .map(|r| r.value().clone())
            .ok_or_else(|| campaign_not_found(campaign))
    }

    pub fn list(&self) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> =
            self.campaigns.iter().map(|r| r.value().clone()).collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns
    }

    /// Flip the lifecycle flag. Informational state for operators;
    /// allocation does not consult it.
    pub fn set_active(&self, campaign: &str, active: bool) -> SplitflowResult<Campaign> {
        let mut entry = self
            .campaigns
            .get_mut(campaign)
            .ok_or_else(|| campaign_not_found(campaign))?;
        entry.active = active;
        info!(campaign = %campaign, active, "Campaign lifecycle updated");
        Ok(entry.value().clone())
    }

    /// Reset every variant's counters to the seed prior, keeping posteriors
    /// well-defined after the reset.
    pub fn reset_counters(
        &self,
        campaign: &str,
    ) -> SplitflowResult<BTreeMap<String, VariantCounts>> {
        let mut entry = self
            .campaigns
            .get_mut(campaign)
            .ok_or_else(|| campaign_not_found(campaign))?;
        for counts in entry.variants.values_mut() {
            *counts = VariantCounts::seeded();
        }
        info!(campaign = %campaign, "Campaign counters reset");
        Ok(entry.variants.clone())
    }

    /// Fixture campaign used by the quickstart docs: "Test Home Page" with
    /// a few dozen events already recorded.
    pub fn seed_demo_data(&self) -> SplitflowResult<()> {
        let name = "Test Home Page";
        self.create_campaign(name, &["A".to_string(), "B".to_string()])?;
        if let Some(mut entry) = self.campaigns.get_mut(name) {
            entry.variants.insert(
                "A".to_string(),
                VariantCounts {
                    impressions: 10,
                    conversions: 5,
                },
            );
            entry.variants.insert(
                "B".to_string(),
                VariantCounts {
                    impressions: 35,
                    conversions: 20,
                },
            );
        }
        info!(campaign = name, "Seeded demo campaign");
        Ok(())
    }
}

impl Default for VariantStore {
    fn default() -> Self {
        Self::new()
    }
}

fn campaign_not_found(campaign: &str) -> SplitflowError {
    SplitflowError::NotFound(format!("campaign '{campaign}'"))
}

fn variant_not_found(campaign: &str, variant: &str) -> SplitflowError {
    SplitflowError::NotFound(format!("variant '{variant}' of campaign '{campaign}'"))
}

fn validate_definition(name: &str, variant_codes: &[String]) -> SplitflowResult<()> {
    if name.trim().is_empty() {
        return Err(SplitflowError::InvalidParameter(
            "campaign name must not be empty".to_string(),
        ));
    }
    if variant_codes.is_empty() {
        return Err(SplitflowError::InvalidParameter(
            "campaign needs at least one variant".to_string(),
        ));
    }
    let mut seen = BTreeSet::new();
    for code in variant_codes {
        if code.trim().is_empty() {
            return Err(SplitflowError::InvalidParameter(
                "variant codes must not be empty".to_string(),
            ));
        }
        if !seen.insert(code.as_str()) {
            return Err(SplitflowError::InvalidParameter(format!(
                "duplicate variant code '{code}'"
            )));
        }
    }
    Ok(())
}
