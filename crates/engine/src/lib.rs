//! Bandit allocation engine — variant store, allocation strategies, sticky
//! assignment, and statistical reporting for A/B campaigns.

pub mod assignment;
pub mod reporter;
pub mod simulation;
pub mod store;
pub mod strategy;

pub use assignment::AssignmentCoordinator;
pub use reporter::{campaign_report, pairwise_comparisons, CampaignReport, PairwiseComparison};
pub use simulation::{simulate_visits, SimulationReport};
pub use store::VariantStore;
pub use strategy::{select_variant, Strategy};
